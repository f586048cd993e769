//! The device interface.
//!
//! A [`Device`] is one logical compute unit of a [`Backend`]. It owns no
//! memory registry: it hands out [`MemoryBlock`]s, copies bytes between
//! them and runs the kernels of the [`kernels`](crate::kernels) module on
//! arrays that live on it.
//!
//! Devices are created by their backend, at most once per index, and hold a
//! non-owning back-reference to it. The owning [`Context`](crate::Context)
//! keeps both alive.

use std::any::Any;
use std::fmt;
use std::ptr;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use crate::array::Array;
use crate::backend::Backend;
use crate::context::ContextId;
use crate::dtype::Scalar;
use crate::elementwise::Execution;
use crate::error::{Error, Result};
use crate::kernels;
use crate::memory::{self, MemoryBlock};

/// A `"<backend>:<index>"` device address.
///
/// A bare `"<backend>"` parses as index `0`. The index is signed so that a
/// negative request can be reported as [`Error::OutOfRange`] by the lookup
/// instead of as a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub backend: String,
    pub index: isize,
}

impl DeviceId {
    pub fn new(backend: impl Into<String>, index: isize) -> Self {
        Self {
            backend: backend.into(),
            index,
        }
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (backend, index) = match s.split_once(':') {
            Some((backend, index)) => {
                let index = index
                    .parse::<isize>()
                    .map_err(|_| Error::InvalidDeviceId(s.to_owned()))?;
                (backend, index)
            }
            None => (s, 0),
        };
        if backend.is_empty() {
            return Err(Error::InvalidDeviceId(s.to_owned()));
        }
        Ok(Self::new(backend, index))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.index)
    }
}

/// Upgrades a device's back-reference.
///
/// # Panics
/// If the owning backend (and therefore its context) has been dropped while
/// the device handle was kept.
pub(crate) fn upgrade_backend(backend: &Weak<dyn Backend>) -> Arc<dyn Backend> {
    backend
        .upgrade()
        .unwrap_or_else(|| panic!("device outlived its backend; keep the owning Context alive"))
}

/// Whether data can move between `a` and `b`: either side's backend must
/// accept the pair.
pub fn transfer_compatible(a: &dyn Device, b: &dyn Device) -> bool {
    a.backend().supports_transfer(a, b) || b.backend().supports_transfer(a, b)
}

/// One logical compute unit of a backend.
///
/// Memory operations and the identity accessors are implemented per device
/// type; the kernel methods are provided and run the host kernels with the
/// device's [`Execution`] after checking that every operand lives on this
/// device.
pub trait Device: Send + Sync + 'static {
    /// The owning backend.
    ///
    /// # Panics
    /// If the owning context was dropped.
    fn backend(&self) -> Arc<dyn Backend>;

    fn index(&self) -> usize;

    /// How kernels on this device run their per-element loop.
    fn execution(&self) -> Execution;

    fn as_any(&self) -> &dyn Any;

    /// `"<backend>:<index>"`.
    fn name(&self) -> String {
        format!("{}:{}", self.backend().name(), self.index())
    }

    fn id(&self) -> DeviceId {
        DeviceId::new(self.backend().name(), self.index() as isize)
    }

    fn context_id(&self) -> ContextId {
        self.backend().context_id()
    }

    /// Allocates `bytesize` bytes. `0` gives the null block.
    ///
    /// # Errors
    /// [`Error::OutOfMemory`] if the allocator refuses the request.
    fn allocate(&self, bytesize: usize) -> Result<MemoryBlock>;

    /// Copies `bytesize` bytes from `src` (owned by `src_device`) into `dst`
    /// (owned by this device).
    ///
    /// # Panics
    /// If the two devices cannot exchange data.
    fn memory_copy_from(
        &self,
        dst: &MemoryBlock,
        dst_offset: usize,
        src: &MemoryBlock,
        src_offset: usize,
        bytesize: usize,
        src_device: &dyn Device,
    ) -> Result<()>;

    /// Copies `bytesize` bytes from `src` (owned by this device) into `dst`
    /// (owned by `dst_device`).
    ///
    /// # Panics
    /// If the two devices cannot exchange data.
    fn memory_copy_to(
        &self,
        dst: &MemoryBlock,
        dst_offset: usize,
        src: &MemoryBlock,
        src_offset: usize,
        bytesize: usize,
        dst_device: &dyn Device,
    ) -> Result<()>;

    /// Allocates `bytesize` bytes on this device and fills them from `src`
    /// on `src_device`, starting at `src_offset`.
    fn transfer_data_from(
        &self,
        src_device: &dyn Device,
        src: &MemoryBlock,
        src_offset: usize,
        bytesize: usize,
    ) -> Result<MemoryBlock>;

    /// Pushes `bytesize` bytes of `src` to `dst_device`, returning the new
    /// block there. Implementations delegate to the destination's
    /// [`transfer_data_from`](Device::transfer_data_from).
    fn transfer_data_to(
        &self,
        dst_device: &dyn Device,
        src: &MemoryBlock,
        src_offset: usize,
        bytesize: usize,
    ) -> Result<MemoryBlock>;

    /// Wraps a host block of `bytesize` bytes for use on this device.
    /// Host-addressable devices alias it.
    fn from_host_memory(&self, src: &MemoryBlock, bytesize: usize) -> Result<MemoryBlock>;

    /// Adopts a block produced outside the runtime.
    fn make_data_from_foreign_pointer(&self, data: MemoryBlock) -> MemoryBlock {
        data
    }

    /// Waits for outstanding work. Both built-in devices are synchronous.
    fn synchronize(&self) {}

    /// Checks that every array lives on this device.
    ///
    /// # Errors
    /// [`Error::DeviceMismatch`] naming the first foreign device.
    fn check_devices_compatible(&self, arrays: &[&Array]) -> Result<()> {
        for array in arrays {
            if !ptr::addr_eq(Arc::as_ptr(array.device()), self as *const Self) {
                return Err(Error::DeviceMismatch {
                    expected: self.name(),
                    actual: array.device().name(),
                });
            }
        }
        Ok(())
    }

    fn fill(&self, out: &Array, value: Scalar) -> Result<()> {
        self.check_devices_compatible(&[out])?;
        kernels::misc::fill(self.execution(), out, value)
    }

    fn copy(&self, src: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[src, out])?;
        kernels::misc::copy(self.execution(), src, out)
    }

    fn as_type(&self, src: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[src, out])?;
        kernels::misc::as_type(self.execution(), src, out)
    }

    fn equal(&self, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[lhs, rhs, out])?;
        kernels::misc::equal(self.execution(), lhs, rhs, out)
    }

    fn add(&self, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[lhs, rhs, out])?;
        kernels::arith::add(self.execution(), lhs, rhs, out)
    }

    fn subtract(&self, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[lhs, rhs, out])?;
        kernels::arith::subtract(self.execution(), lhs, rhs, out)
    }

    fn multiply(&self, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[lhs, rhs, out])?;
        kernels::arith::multiply(self.execution(), lhs, rhs, out)
    }

    fn multiply_scalar(&self, lhs: &Array, rhs: Scalar, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[lhs, out])?;
        kernels::arith::multiply_scalar(self.execution(), lhs, rhs, out)
    }

    fn divide(&self, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[lhs, rhs, out])?;
        kernels::arith::divide(self.execution(), lhs, rhs, out)
    }

    fn exp(&self, x: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[x, out])?;
        kernels::math::exp(self.execution(), x, out)
    }

    fn log(&self, x: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[x, out])?;
        kernels::math::log(self.execution(), x, out)
    }

    fn sqrt(&self, x: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[x, out])?;
        kernels::math::sqrt(self.execution(), x, out)
    }

    fn is_nan(&self, x: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[x, out])?;
        kernels::math::is_nan(self.execution(), x, out)
    }

    fn is_inf(&self, x: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[x, out])?;
        kernels::math::is_inf(self.execution(), x, out)
    }

    /// Sums `src` over `axes` into `out`.
    fn sum(&self, src: &Array, axes: &[usize], out: &Array) -> Result<()> {
        self.check_devices_compatible(&[src, out])?;
        kernels::reduction::sum(self.execution(), src, axes, out)
    }

    fn dot(&self, a: &Array, b: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[a, b, out])?;
        kernels::linalg::dot(self.execution(), a, b, out)
    }

    /// `out = x1 < x2 ? pos : neg`.
    fn if_less_else(
        &self,
        x1: &Array,
        x2: Scalar,
        pos: Scalar,
        neg: &Array,
        out: &Array,
    ) -> Result<()> {
        self.check_devices_compatible(&[x1, neg, out])?;
        kernels::misc::if_less_else(self.execution(), x1, x2, pos, neg, out)
    }

    /// `out = condition ? x : y`.
    fn where_(&self, condition: &Array, x: &Array, y: &Array, out: &Array) -> Result<()> {
        self.check_devices_compatible(&[condition, x, y, out])?;
        kernels::misc::where_(self.execution(), condition, x, y, out)
    }
}

impl fmt::Debug for dyn Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device({})", self.name())
    }
}

/// Memory primitives shared by the host-addressable devices.
pub(crate) mod host {
    use super::*;

    pub(crate) fn allocate(bytesize: usize) -> Result<MemoryBlock> {
        MemoryBlock::zeroed(bytesize)
    }

    /// Raw copy between two devices' blocks.
    ///
    /// # Panics
    /// If `src_device` and `dst_device` cannot exchange data.
    pub(crate) fn memory_copy(
        dst_device: &dyn Device,
        dst: &MemoryBlock,
        dst_offset: usize,
        src_device: &dyn Device,
        src: &MemoryBlock,
        src_offset: usize,
        bytesize: usize,
    ) -> Result<()> {
        assert!(
            transfer_compatible(src_device, dst_device),
            "devices {} and {} cannot exchange data",
            src_device.name(),
            dst_device.name()
        );
        memory::copy_bytes(dst, dst_offset, src, src_offset, bytesize)
    }

    /// Allocates on `dst_device` and copies `bytesize` bytes into it.
    pub(crate) fn transfer(
        dst_device: &dyn Device,
        src_device: &dyn Device,
        src: &MemoryBlock,
        src_offset: usize,
        bytesize: usize,
    ) -> Result<MemoryBlock> {
        let dst = dst_device.allocate(bytesize)?;
        memory_copy(dst_device, &dst, 0, src_device, src, src_offset, bytesize)?;
        tracing::debug!(
            src = %src_device.name(),
            dst = %dst_device.name(),
            bytesize,
            "transferred data"
        );
        Ok(dst)
    }

    /// Host memory is directly addressable: the block is shared as is.
    pub(crate) fn alias(src: &MemoryBlock, bytesize: usize) -> Result<MemoryBlock> {
        if src.len() < bytesize {
            return Err(Error::OutOfRange(format!(
                "host block of {} bytes is smaller than {bytesize}",
                src.len()
            )));
        }
        Ok(src.clone())
    }
}

/// Expands to the memory methods of a host-addressable [`Device`] impl.
macro_rules! host_memory_methods {
    () => {
        fn allocate(&self, bytesize: usize) -> $crate::Result<$crate::MemoryBlock> {
            $crate::device::host::allocate(bytesize)
        }

        fn memory_copy_from(
            &self,
            dst: &$crate::MemoryBlock,
            dst_offset: usize,
            src: &$crate::MemoryBlock,
            src_offset: usize,
            bytesize: usize,
            src_device: &dyn $crate::Device,
        ) -> $crate::Result<()> {
            $crate::device::host::memory_copy(
                self, dst, dst_offset, src_device, src, src_offset, bytesize,
            )
        }

        fn memory_copy_to(
            &self,
            dst: &$crate::MemoryBlock,
            dst_offset: usize,
            src: &$crate::MemoryBlock,
            src_offset: usize,
            bytesize: usize,
            dst_device: &dyn $crate::Device,
        ) -> $crate::Result<()> {
            $crate::device::host::memory_copy(
                dst_device, dst, dst_offset, self, src, src_offset, bytesize,
            )
        }

        fn transfer_data_from(
            &self,
            src_device: &dyn $crate::Device,
            src: &$crate::MemoryBlock,
            src_offset: usize,
            bytesize: usize,
        ) -> $crate::Result<$crate::MemoryBlock> {
            $crate::device::host::transfer(self, src_device, src, src_offset, bytesize)
        }

        fn transfer_data_to(
            &self,
            dst_device: &dyn $crate::Device,
            src: &$crate::MemoryBlock,
            src_offset: usize,
            bytesize: usize,
        ) -> $crate::Result<$crate::MemoryBlock> {
            dst_device.transfer_data_from(self, src, src_offset, bytesize)
        }

        fn from_host_memory(
            &self,
            src: &$crate::MemoryBlock,
            bytesize: usize,
        ) -> $crate::Result<$crate::MemoryBlock> {
            $crate::device::host::alias(src, bytesize)
        }
    };
}

pub(crate) use host_memory_methods;
