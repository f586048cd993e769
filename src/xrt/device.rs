use std::any::Any;
use std::sync::{Arc, Weak};

use crate::backend::Backend;
use crate::device::{self, Device};
use crate::elementwise::Execution;

/// One logical device of an [`XrtBackend`](super::XrtBackend).
///
/// Memory is plain host memory; the per-element loop of large kernels is
/// split across the `rayon` pool.
pub struct XrtDevice {
    backend: Weak<dyn Backend>,
    index: usize,
}

impl XrtDevice {
    pub(crate) fn new(backend: Weak<dyn Backend>, index: usize) -> Self {
        Self { backend, index }
    }
}

impl Device for XrtDevice {
    fn backend(&self) -> Arc<dyn Backend> {
        device::upgrade_backend(&self.backend)
    }

    fn index(&self) -> usize {
        self.index
    }

    fn execution(&self) -> Execution {
        Execution::Parallel
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    device::host_memory_methods!();
}
