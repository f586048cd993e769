use std::any::Any;
use std::sync::{Arc, Weak};

use crate::backend::Backend;
use crate::device::{self, Device};
use crate::elementwise::Execution;

/// One logical host device. Kernels run sequentially on the calling thread.
pub struct NativeDevice {
    backend: Weak<dyn Backend>,
    index: usize,
}

impl NativeDevice {
    pub(crate) fn new(backend: Weak<dyn Backend>, index: usize) -> Self {
        Self { backend, index }
    }
}

impl Device for NativeDevice {
    fn backend(&self) -> Arc<dyn Backend> {
        device::upgrade_backend(&self.backend)
    }

    fn index(&self) -> usize {
        self.index
    }

    fn execution(&self) -> Execution {
        Execution::Sequential
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    device::host_memory_methods!();
}
