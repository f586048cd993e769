//! The `native` backend: plain host memory, sequential kernels.
//!
//! This is the trivial host backend every specialized backend may exchange
//! data with.

mod backend;
mod device;

pub use self::backend::NativeBackend;
pub use self::device::NativeDevice;
