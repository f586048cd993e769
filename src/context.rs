//! The backend registry.
//!
//! A [`Context`] owns every backend created through it, keyed by name, and
//! through them every device. Lookups are create-or-return under one mutex,
//! so a name always resolves to the same backend instance and an address
//! such as `"xrt:1"` always resolves to the same device instance.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use xrt_runtime::{Backend, ContextConfig};
//!
//! let ctx = ContextConfig::new().xrt_device_count(2).build();
//! let a = ctx.get_device("xrt:1").unwrap();
//! let b = ctx.get_backend("xrt").unwrap().get_device(1).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert!(ctx.get_device("xrt:2").is_err());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing::debug;

use crate::backend::Backend;
use crate::config;
use crate::device::{Device, DeviceId};
use crate::error::{Error, Result};
use crate::native::NativeBackend;
use crate::xrt::XrtBackend;

/// Builds a backend for a context. Called at most once per context and
/// name, while the registry lock is held: a factory must not look up
/// backends of the context it is given.
pub type BackendFactory = Arc<dyn Fn(&Context) -> Arc<dyn Backend> + Send + Sync>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// Per-context settings.
#[derive(Clone, Default)]
pub struct ContextConfig {
    native_device_count: Option<usize>,
    xrt_device_count: Option<usize>,
    factories: HashMap<String, BackendFactory>,
}

impl ContextConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Device count of the `native` backend of this context.
    #[must_use]
    pub fn native_device_count(mut self, count: usize) -> Self {
        self.native_device_count = Some(count);
        self
    }

    /// Device count of the `xrt` backend of this context.
    #[must_use]
    pub fn xrt_device_count(mut self, count: usize) -> Self {
        self.xrt_device_count = Some(count);
        self
    }

    /// Registers a backend under `name`. A registered name shadows the
    /// built-in backend of the same name.
    #[must_use]
    pub fn register_backend<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Context) -> Arc<dyn Backend> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn build(self) -> Context {
        Context::with_config(self)
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ContextConfig")
            .field("native_device_count", &self.native_device_count)
            .field("xrt_device_count", &self.xrt_device_count)
            .field("factories", &names)
            .finish()
    }
}

/// Owner of backends and devices.
pub struct Context {
    id: ContextId,
    config: ContextConfig,
    backends: Mutex<HashMap<String, Arc<dyn Backend>>>,
}

impl Context {
    /// A context with the process-wide device-count settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ContextConfig) -> Self {
        let id = ContextId::next();
        debug!(context = %id, ?config, "created context");
        Self {
            id,
            config,
            backends: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Device count a `native` backend created by this context gets.
    #[must_use]
    pub fn native_device_count(&self) -> usize {
        self.config
            .native_device_count
            .unwrap_or_else(config::native_device_count)
    }

    /// Device count an `xrt` backend created by this context gets.
    #[must_use]
    pub fn xrt_device_count(&self) -> usize {
        self.config
            .xrt_device_count
            .unwrap_or_else(config::xrt_device_count)
    }

    /// Returns the backend called `name`, creating it on first use.
    ///
    /// # Errors
    /// [`Error::BackendNotFound`] if no factory is registered and the name is
    /// not a built-in backend.
    pub fn get_backend(&self, name: &str) -> Result<Arc<dyn Backend>> {
        let mut backends = self.backends.lock();
        if let Some(backend) = backends.get(name) {
            return Ok(Arc::clone(backend));
        }
        let backend = self.create_backend(name)?;
        debug!(
            context = %self.id,
            backend = name,
            devices = backend.device_count(),
            "created backend"
        );
        backends.insert(name.to_owned(), Arc::clone(&backend));
        Ok(backend)
    }

    fn create_backend(&self, name: &str) -> Result<Arc<dyn Backend>> {
        if let Some(factory) = self.config.factories.get(name) {
            return Ok(factory(self));
        }
        match name {
            NativeBackend::NAME => Ok(NativeBackend::new(self)),
            XrtBackend::NAME => Ok(XrtBackend::new(self)),
            _ => Err(Error::BackendNotFound(name.to_owned())),
        }
    }

    /// Resolves a `"<backend>:<index>"` address (a bare `"<backend>"` means
    /// index 0).
    ///
    /// # Errors
    /// [`Error::InvalidDeviceId`] for malformed addresses,
    /// [`Error::BackendNotFound`] for unknown backends and
    /// [`Error::OutOfRange`] for indices outside the device count.
    pub fn get_device(&self, address: &str) -> Result<Arc<dyn Device>> {
        self.get_device_by_id(&address.parse()?)
    }

    pub fn get_device_by_id(&self, id: &DeviceId) -> Result<Arc<dyn Device>> {
        self.get_backend(&id.backend)?.get_device(id.index)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let backends = std::mem::take(self.backends.get_mut());
        for backend in backends.values() {
            backend.core().clear();
        }
        debug!(context = %self.id, backends = backends.len(), "dropped context");
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.backends.lock().keys().cloned().collect();
        names.sort();
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("backends", &names)
            .finish()
    }
}

lazy_static! {
    static ref DEFAULT_CONTEXT: Context = Context::new();
}

/// The process-wide context, created on first use and never dropped.
pub fn default_context() -> &'static Context {
    &DEFAULT_CONTEXT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_ids_are_unique() {
        let a = Context::new();
        let b = Context::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn config_counts_win_over_process_settings() {
        let ctx = ContextConfig::new()
            .native_device_count(2)
            .xrt_device_count(3)
            .build();
        assert_eq!(ctx.native_device_count(), 2);
        assert_eq!(ctx.xrt_device_count(), 3);
    }

    #[test]
    fn unknown_backend() {
        let ctx = Context::new();
        assert!(matches!(
            ctx.get_backend("cuda"),
            Err(Error::BackendNotFound(name)) if name == "cuda"
        ));
    }

    #[test]
    fn default_context_is_shared() {
        assert!(std::ptr::eq(default_context(), default_context()));
    }
}
