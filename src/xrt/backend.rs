use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{self, Backend, BackendCore};
use crate::context::Context;
use crate::device::Device;
use crate::error::{Error, Result};

use super::local_service::{JobMap, XrtLocalService};
use super::XrtDevice;

/// The distributed backend.
pub struct XrtBackend {
    name: String,
    core: BackendCore,
    local_service: Mutex<Option<Arc<XrtLocalService>>>,
}

impl XrtBackend {
    pub const NAME: &'static str = "xrt";

    /// A backend owned by `ctx` with the context's xrt device count.
    ///
    /// The instance is not registered in `ctx`; use
    /// [`Context::get_backend`] for the shared one.
    #[must_use]
    pub fn new(ctx: &Context) -> Arc<Self> {
        Self::named(ctx, Self::NAME)
    }

    /// Like [`new`](Self::new) but reporting `name`. Used to register
    /// specialized variants under their own names.
    #[must_use]
    pub fn named(ctx: &Context, name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        let count = ctx.xrt_device_count();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let handle: Weak<dyn Backend> = weak.clone();
            Self {
                name,
                core: BackendCore::new(handle, ctx.id(), count),
                local_service: Mutex::new(None),
            }
        })
    }

    /// Builds and starts the cluster node for task `task_index` of
    /// `job_name`. The node stays reachable for the rest of the process.
    ///
    /// # Errors
    /// [`Error::Configuration`] for an invalid topology,
    /// [`Error::AlreadyStarted`] if this backend already runs a node and
    /// [`Error::Io`] if the task address cannot be bound.
    pub fn start_local_service(
        &self,
        jobs: &JobMap,
        job_name: &str,
        task_index: usize,
    ) -> Result<Arc<XrtLocalService>> {
        let mut slot = self.local_service.lock();
        if let Some(service) = slot.as_ref() {
            return Err(Error::AlreadyStarted(service.server_def().target()));
        }
        let service = Arc::new(XrtLocalService::new(jobs, job_name, task_index)?);
        service.start()?;
        info!(backend = %self.name, target_name = %service.server_def().target(), "backend joined cluster");
        *slot = Some(Arc::clone(&service));
        Ok(service)
    }

    /// The node started by [`start_local_service`](Self::start_local_service).
    #[must_use]
    pub fn local_service(&self) -> Option<Arc<XrtLocalService>> {
        self.local_service.lock().clone()
    }
}

impl Backend for XrtBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn create_device(&self, index: usize) -> Result<Arc<dyn Device>> {
        backend::check_device_index(self.name(), index, self.device_count())?;
        Ok(Arc::new(XrtDevice::new(self.core.handle(), index)))
    }

    /// Pairs of this backend's own devices, and pairs between one of its
    /// devices and a device of a native backend.
    fn supports_transfer(&self, src: &dyn Device, dst: &dyn Device) -> bool {
        let this = self as *const Self;
        let src_backend = src.backend();
        let dst_backend = dst.backend();
        let src_is_this = backend::same_instance(&src_backend, this);
        let dst_is_this = backend::same_instance(&dst_backend, this);
        let supported = (src_is_this && dst_is_this)
            || (src_is_this && dst_backend.is_native())
            || (dst_is_this && src_backend.is_native());
        debug!(
            backend = %self.name,
            src = %src.name(),
            dst = %dst.name(),
            supported,
            "transfer check"
        );
        supported
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
