//! The `xrt` backend.
//!
//! Devices of this backend are host-addressable and run their kernels on the
//! `rayon` pool. The backend can additionally turn its process into one task
//! of a named cluster through [`XrtLocalService`].

mod backend;
mod device;
pub mod local_service;

pub use self::backend::XrtBackend;
pub use self::device::XrtDevice;
pub use self::local_service::{
    probe, ClusterSpec, JobMap, Server, ServerDef, ServiceState, XrtLocalService,
};
