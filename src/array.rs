//! A minimal strided array view over a device memory block.
//!
//! This is not a tensor library: an [`Array`] only carries what the device
//! kernels and transfers need (shape, byte strides, offset, dtype, owning
//! device and memory block). Views created by [`Array::broadcast_to`] and
//! [`Array::transpose`] share the block of the array they come from.

use std::fmt;
use std::sync::Arc;

use crate::device::Device;
use crate::dtype::{Dtype, Element, Scalar};
use crate::elementwise::{self, indexer};
use crate::error::{Error, Result};
use crate::memory::MemoryBlock;

/// Row-major byte strides for a contiguous array.
#[must_use]
pub fn contiguous_strides(shape: &[usize], item_size: usize) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut step = item_size as isize;
    for (stride, &dim) in strides.iter_mut().zip(shape).rev() {
        *stride = step;
        step *= dim.max(1) as isize;
    }
    strides
}

/// Bytes needed by a contiguous array of `shape` and `dtype`.
///
/// # Errors
/// [`Error::OutOfMemory`] if the size exceeds `isize::MAX`.
fn byte_size(shape: &[usize], dtype: Dtype) -> Result<usize> {
    if shape.contains(&0) {
        return Ok(0);
    }
    shape
        .iter()
        .try_fold(dtype.item_size(), |acc, &dim| acc.checked_mul(dim))
        .filter(|&n| isize::try_from(n).is_ok())
        .ok_or(Error::OutOfMemory(usize::MAX))
}

/// A typed, strided view of a memory block living on one device.
#[derive(Clone)]
pub struct Array {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
    dtype: Dtype,
    device: Arc<dyn Device>,
    data: MemoryBlock,
}

impl Array {
    /// Wraps an existing block. The caller guarantees the view stays inside
    /// the block.
    pub(crate) fn from_parts(
        shape: Vec<usize>,
        strides: Vec<isize>,
        offset: usize,
        dtype: Dtype,
        device: Arc<dyn Device>,
        data: MemoryBlock,
    ) -> Self {
        Self {
            shape,
            strides,
            offset,
            dtype,
            device,
            data,
        }
    }

    /// Allocates an uninitialized-content contiguous array on `device`.
    pub fn empty(shape: &[usize], dtype: Dtype, device: &Arc<dyn Device>) -> Result<Self> {
        let nbytes = byte_size(shape, dtype)?;
        let data = device.allocate(nbytes)?;
        Ok(Self::from_parts(
            shape.to_vec(),
            contiguous_strides(shape, dtype.item_size()),
            0,
            dtype,
            Arc::clone(device),
            data,
        ))
    }

    /// An array filled with `value` converted to `dtype`.
    pub fn full(
        shape: &[usize],
        value: impl Into<Scalar>,
        dtype: Dtype,
        device: &Arc<dyn Device>,
    ) -> Result<Self> {
        let out = Self::empty(shape, dtype, device)?;
        device.fill(&out, value.into())?;
        Ok(out)
    }

    pub fn zeros(shape: &[usize], dtype: Dtype, device: &Arc<dyn Device>) -> Result<Self> {
        Self::full(shape, Scalar::Int(0), dtype, device)
    }

    /// Builds an array from host values, handing the host block to
    /// [`Device::from_host_memory`] (host-addressable devices alias it).
    ///
    /// # Errors
    /// [`Error::ShapeMismatch`] if `values` does not have exactly the number
    /// of elements `shape` describes.
    pub fn from_vec<T: Element>(
        shape: &[usize],
        values: Vec<T>,
        device: &Arc<dyn Device>,
    ) -> Result<Self> {
        let expected = shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        if expected != Some(values.len()) {
            return Err(Error::shape_mismatch(shape, &[values.len()]));
        }
        Self::from_host_block(shape, T::DTYPE, MemoryBlock::from_elements(&values), device)
    }

    /// Builds a contiguous array over a host block holding row-major data.
    ///
    /// # Errors
    /// [`Error::OutOfRange`] if the block is smaller than the array,
    /// [`Error::OutOfMemory`] if the array size overflows.
    pub fn from_host_block(
        shape: &[usize],
        dtype: Dtype,
        host: MemoryBlock,
        device: &Arc<dyn Device>,
    ) -> Result<Self> {
        let nbytes = byte_size(shape, dtype)?;
        if host.len() < nbytes {
            return Err(Error::OutOfRange(format!(
                "host block of {} bytes is smaller than the {nbytes} bytes of the array",
                host.len()
            )));
        }
        let data = device.from_host_memory(&host, nbytes)?;
        Ok(Self::from_parts(
            shape.to_vec(),
            contiguous_strides(shape, dtype.item_size()),
            0,
            dtype,
            Arc::clone(device),
            data,
        ))
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Strides in bytes.
    #[must_use]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Offset of the first element in bytes.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    #[must_use]
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    #[must_use]
    pub fn data(&self) -> &MemoryBlock {
        &self.data
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn nbytes(&self) -> usize {
        self.total_size() * self.dtype.item_size()
    }

    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.total_size() <= 1
            || self
                .shape
                .iter()
                .zip(&self.strides)
                .zip(contiguous_strides(&self.shape, self.dtype.item_size()))
                .all(|((&dim, &stride), want)| dim == 1 || stride == want)
    }

    /// A view of this array broadcast to `shape`.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self> {
        let strides = indexer::broadcast_strides(&self.shape, &self.strides, shape)?;
        Ok(Self {
            shape: shape.to_vec(),
            strides,
            ..self.clone()
        })
    }

    /// A view with the axis order reversed.
    #[must_use]
    pub fn transpose(&self) -> Self {
        Self {
            shape: self.shape.iter().rev().copied().collect(),
            strides: self.strides.iter().rev().copied().collect(),
            ..self.clone()
        }
    }

    /// A contiguous copy on the same device.
    pub fn copy(&self) -> Result<Self> {
        let out = Self::empty(&self.shape, self.dtype, &self.device)?;
        self.device.copy(self, &out)?;
        Ok(out)
    }

    /// A contiguous copy converted to `dtype`.
    pub fn as_type(&self, dtype: Dtype) -> Result<Self> {
        let out = Self::empty(&self.shape, dtype, &self.device)?;
        self.device.as_type(self, &out)?;
        Ok(out)
    }

    /// Moves the array to `dst`.
    ///
    /// Transferring to the device the array already lives on returns an
    /// alias sharing the same block. Otherwise the source backend is asked
    /// first whether it can push the data, then the destination backend
    /// whether it can pull it.
    ///
    /// # Errors
    /// [`Error::DeviceMismatch`] if neither backend supports the transfer.
    pub fn to_device(&self, dst: &Arc<dyn Device>) -> Result<Self> {
        let src = &self.device;
        if Arc::ptr_eq(src, dst) {
            return Ok(self.clone());
        }
        let src_backend = src.backend();
        let dst_backend = dst.backend();

        let packed = if self.is_contiguous() { self.clone() } else { self.copy()? };
        let data = if src_backend.supports_transfer(src.as_ref(), dst.as_ref()) {
            src.transfer_data_to(dst.as_ref(), &packed.data, packed.offset, packed.nbytes())?
        } else if dst_backend.supports_transfer(src.as_ref(), dst.as_ref()) {
            dst.transfer_data_from(src.as_ref(), &packed.data, packed.offset, packed.nbytes())?
        } else {
            return Err(Error::DeviceMismatch {
                expected: src.name(),
                actual: dst.name(),
            });
        };
        Ok(Self::from_parts(
            self.shape.clone(),
            contiguous_strides(&self.shape, self.dtype.item_size()),
            0,
            self.dtype,
            Arc::clone(dst),
            data,
        ))
    }

    /// Reads the elements back to the host in row-major logical order.
    ///
    /// # Errors
    /// [`Error::DtypeMismatch`] if `T` is not the array's element type.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        elementwise::gather::<T>(self, &self.shape)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("dtype", &self.dtype)
            .field("device", &self.device.name())
            .field("data", &self.data)
            .finish()
    }
}
