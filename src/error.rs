//! Error types for the runtime.
//!
//! Recoverable conditions (bad lookups, shape or dtype problems, allocation
//! failure, cluster configuration) are reported through [`Error`]. Misuse of
//! the raw memory contract, such as copying between devices that cannot
//! exchange data, is a programming error and panics instead.

use thiserror::Error;

use crate::dtype::Dtype;

/// Result type alias using the runtime's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for backend, device and cluster operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("backend not found: {0}")]
    BackendNotFound(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("invalid device id: `{0}`")]
    InvalidDeviceId(String),

    #[error("device mismatch: expected {expected}, got {actual}")]
    DeviceMismatch { expected: String, actual: String },

    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("dtype mismatch: expected {expected}, got {got}")]
    DtypeMismatch { expected: Dtype, got: Dtype },

    #[error("invalid dtype name: `{0}`")]
    InvalidDtype(String),

    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(Dtype),

    #[error("invalid axis {axis} for an array with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("out of memory: failed to allocate {0} bytes")]
    OutOfMemory(usize),

    #[error("cluster configuration error: {0}")]
    Configuration(String),

    #[error("local service for {0} is already started")]
    AlreadyStarted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
