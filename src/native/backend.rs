use std::any::Any;
use std::sync::{Arc, Weak};

use crate::backend::{self, Backend, BackendCore};
use crate::context::Context;
use crate::device::Device;
use crate::error::Result;

use super::NativeDevice;

/// The host backend.
pub struct NativeBackend {
    core: BackendCore,
}

impl NativeBackend {
    pub const NAME: &'static str = "native";

    /// A backend owned by `ctx`, with the context's native device count.
    ///
    /// The instance is not registered in `ctx`; use
    /// [`Context::get_backend`] for the shared one.
    #[must_use]
    pub fn new(ctx: &Context) -> Arc<Self> {
        let count = ctx.native_device_count();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let handle: Weak<dyn Backend> = weak.clone();
            Self {
                core: BackendCore::new(handle, ctx.id(), count),
            }
        })
    }
}

impl Backend for NativeBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn create_device(&self, index: usize) -> Result<Arc<dyn Device>> {
        backend::check_device_index(self.name(), index, self.device_count())?;
        Ok(Arc::new(NativeDevice::new(self.core.handle(), index)))
    }

    /// Only pairs of this backend's own devices.
    fn supports_transfer(&self, src: &dyn Device, dst: &dyn Device) -> bool {
        let this = self as *const Self;
        backend::same_instance(&src.backend(), this) && backend::same_instance(&dst.backend(), this)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_native(&self) -> bool {
        true
    }
}
