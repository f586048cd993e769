//! Backend interface and the shared device registry.
//!
//! A [`Backend`] is one execution engine of a [`Context`](crate::Context),
//! identified by name (`"native"`, `"xrt"`, or a registered custom name).
//! It owns a fixed number of logical devices, created lazily on first
//! request and then handed out as the same `Arc` forever.
//!
//! # Identity
//!
//! Backends are compared by instance, never by name: two `"xrt"` backends of
//! different contexts are different backends. [`same_instance`] is the
//! comparison every transfer rule uses.
//!
//! # Transfer rules
//!
//! [`Backend::supports_transfer`] answers whether *this* backend can move
//! data between two devices. Specialized backends accept pairs where both
//! devices are their own, or where one side is theirs and the other lives on
//! a trivial host backend ([`Backend::is_native`]). The host backend only
//! accepts pairs of its own devices and leaves cross-backend decisions to the
//! specialized side.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::context::ContextId;
use crate::device::Device;
use crate::error::{Error, Result};

/// Whether `backend` is the object at `this`.
pub fn same_instance<T: ?Sized>(backend: &Arc<dyn Backend>, this: *const T) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(backend), this)
}

/// State every backend embeds: its own weak handle, the owning context id
/// and the lazily filled device slots.
pub struct BackendCore {
    weak_self: Weak<dyn Backend>,
    context_id: ContextId,
    device_count: usize,
    devices: Mutex<Vec<Option<Arc<dyn Device>>>>,
}

impl BackendCore {
    /// `weak_self` is the handle given by `Arc::new_cyclic` while the
    /// backend is being built. `device_count` is fixed from here on.
    pub fn new(weak_self: Weak<dyn Backend>, context_id: ContextId, device_count: usize) -> Self {
        Self {
            weak_self,
            context_id,
            device_count,
            devices: Mutex::new(vec![None; device_count]),
        }
    }

    /// The non-owning handle devices keep to their backend.
    #[must_use]
    pub fn handle(&self) -> Weak<dyn Backend> {
        self.weak_self.clone()
    }

    #[must_use]
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.device_count
    }

    /// Returns the device at `index`, creating it with `create` on first use.
    ///
    /// The slot lock is held across `create`, so concurrent first requests
    /// for one index construct exactly one device.
    ///
    /// # Errors
    /// [`Error::OutOfRange`] if `index` is negative or not below the device
    /// count, or whatever `create` reports.
    pub fn get_or_create(
        &self,
        backend_name: &str,
        index: isize,
        create: impl FnOnce(usize) -> Result<Arc<dyn Device>>,
    ) -> Result<Arc<dyn Device>> {
        let count = self.device_count;
        let mut devices = self.devices.lock();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| devices.get_mut(i).map(|slot| (i, slot)));
        let Some((i, slot)) = slot else {
            return Err(Error::OutOfRange(format!(
                "device index {index} out of range for backend `{backend_name}` with {count} devices"
            )));
        };
        if let Some(device) = slot {
            return Ok(Arc::clone(device));
        }
        let device = create(i)?;
        debug!(backend = backend_name, index = i, "created device");
        *slot = Some(Arc::clone(&device));
        Ok(device)
    }

    /// Drops every created device.
    pub(crate) fn clear(&self) {
        for slot in self.devices.lock().iter_mut() {
            *slot = None;
        }
    }
}

/// Checks `index` against `count` for [`Backend::create_device`].
pub(crate) fn check_device_index(backend_name: &str, index: usize, count: usize) -> Result<()> {
    if index < count {
        Ok(())
    } else {
        Err(Error::OutOfRange(format!(
            "device index {index} out of range for backend `{backend_name}` with {count} devices"
        )))
    }
}

/// An execution engine owning a fixed set of devices.
pub trait Backend: Send + Sync + 'static {
    /// Stable name used for lookup in a context.
    fn name(&self) -> &str;

    fn core(&self) -> &BackendCore;

    /// Builds the device at `index`. Only the device registry calls this;
    /// use [`get_device`](Backend::get_device) instead.
    ///
    /// # Errors
    /// [`Error::OutOfRange`] if `index >= device_count()`.
    fn create_device(&self, index: usize) -> Result<Arc<dyn Device>>;

    /// Whether this backend can move data between `src` and `dst`.
    fn supports_transfer(&self, src: &dyn Device, dst: &dyn Device) -> bool;

    fn as_any(&self) -> &dyn Any;

    /// Whether this is a trivial host backend that any specialized backend
    /// may exchange data with.
    fn is_native(&self) -> bool {
        false
    }

    /// Number of logical devices, fixed for the lifetime of the instance.
    fn device_count(&self) -> usize {
        self.core().device_count()
    }

    fn context_id(&self) -> ContextId {
        self.core().context_id()
    }

    /// Returns the device at `index`, creating it on first use.
    ///
    /// # Errors
    /// [`Error::OutOfRange`] if `index` is negative or not below
    /// [`device_count`](Backend::device_count).
    fn get_device(&self, index: isize) -> Result<Arc<dyn Device>> {
        self.core()
            .get_or_create(self.name(), index, |i| self.create_device(i))
    }
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name())
            .field("device_count", &self.device_count())
            .field("context", &self.context_id())
            .finish()
    }
}
