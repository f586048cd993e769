//! xrt_runtime: a pluggable compute-backend runtime for N-dimensional arrays.
//!
//! Interchangeable execution backends expose one device interface for
//! memory allocation, cross-device transfer and dtype-generic elementwise
//! kernels. The `xrt` backend can additionally join this process to a
//! cluster of named, indexed tasks.
//!
//! # Features
//!
//! - A per-[`Context`] registry of backends and devices, created lazily and
//!   safely from any number of threads.
//! - Two built-in backends: `native` (sequential host execution) and `xrt`
//!   (host memory, kernels on the `rayon` pool), plus custom backends
//!   registered through [`ContextConfig`].
//! - Transfer rules by backend instance, with raw copies between
//!   incompatible devices rejected.
//! - Runtime dtype dispatch ([`visit_dtype!`]) over explicit per-type byte
//!   conversions, feeding one strided, broadcasting elementwise engine.
//! - Cluster bootstrap through [`xrt::XrtLocalService`].
//!
//! # Modules
//!
//! - [`context`]: backend registry and device addressing.
//! - [`backend`], [`device`]: the backend and device interfaces.
//! - [`native`], [`xrt`]: the built-in backends.
//! - [`memory`]: reference-counted device memory blocks.
//! - [`dtype`], [`elementwise`], [`kernels`]: dispatch, engine and kernels.
//! - [`array`], [`routines`]: a minimal array view and allocating kernels.
//! - [`config`]: device-count settings.
//!
//! # Example
//!
//! ```rust
//! use xrt_runtime::{routines, Array, ContextConfig};
//!
//! let ctx = ContextConfig::new().xrt_device_count(2).build();
//! let native = ctx.get_device("native:0").unwrap();
//! let xrt = ctx.get_device("xrt:1").unwrap();
//!
//! let x = Array::from_vec(&[3], vec![-1.0f32, 0.0, 4.0], &native).unwrap();
//! let y = routines::sqrt(&x.to_device(&xrt).unwrap()).unwrap();
//! let back = y.to_device(&native).unwrap().to_vec::<f32>().unwrap();
//! assert!(back[0].is_nan());
//! assert_eq!(&back[1..], &[0.0, 2.0]);
//! ```

pub mod array;
pub mod backend;
pub mod config;
pub mod context;
pub mod device;
pub mod dtype;
pub mod elementwise;
pub mod error;
pub mod kernels;
pub mod memory;
pub mod native;
pub mod routines;
pub mod xrt;

pub use half;

pub use crate::array::Array;
pub use crate::backend::{Backend, BackendCore};
pub use crate::context::{default_context, Context, ContextConfig, ContextId};
pub use crate::device::{Device, DeviceId};
pub use crate::dtype::{Dtype, Element, FloatElement, Scalar};
pub use crate::error::{Error, Result};
pub use crate::memory::MemoryBlock;
