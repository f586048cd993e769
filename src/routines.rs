//! Allocating front-ends for the device kernels.
//!
//! Each routine picks the output shape and dtype, allocates the output on
//! the device of its first operand and calls the matching [`Device`]
//! kernel. Operands on other devices are rejected by the kernel with
//! [`Error::DeviceMismatch`](crate::Error::DeviceMismatch).
//!
//! [`Device`]: crate::Device

use crate::array::Array;
use crate::dtype::{Dtype, DtypeKind};
use crate::elementwise::indexer::broadcast_shapes;
use crate::error::Result;

/// The dtype both operands of a binary routine are promoted to.
///
/// Floats win over integers and wider types over narrower ones; mixing
/// `UInt8` with a signed type needs at least `Int16`.
#[must_use]
pub fn result_type(a: Dtype, b: Dtype) -> Dtype {
    fn rank(dtype: Dtype) -> u8 {
        match dtype {
            Dtype::Bool => 0,
            Dtype::UInt8 => 1,
            Dtype::Int8 => 2,
            Dtype::Int16 => 3,
            Dtype::Int32 => 4,
            Dtype::Int64 => 5,
            Dtype::Float16 => 6,
            Dtype::Float32 => 7,
            Dtype::Float64 => 8,
        }
    }
    if a == b {
        return a;
    }
    let wider = if rank(a) >= rank(b) { a } else { b };
    let mixes_sign = matches!(
        (a.kind(), b.kind()),
        (DtypeKind::UInt, DtypeKind::Int) | (DtypeKind::Int, DtypeKind::UInt)
    );
    if mixes_sign && wider == Dtype::Int8 {
        Dtype::Int16
    } else {
        wider
    }
}

/// Output dtype of the transcendental routines.
fn float_result(dtype: Dtype) -> Dtype {
    if dtype.is_float() { dtype } else { Dtype::Float32 }
}

fn unary(
    x: &Array,
    dtype: Dtype,
    kernel: impl FnOnce(&Array, &Array) -> Result<()>,
) -> Result<Array> {
    let out = Array::empty(x.shape(), dtype, x.device())?;
    kernel(x, &out)?;
    Ok(out)
}

fn binary(
    lhs: &Array,
    rhs: &Array,
    dtype: Dtype,
    kernel: impl FnOnce(&Array, &Array, &Array) -> Result<()>,
) -> Result<Array> {
    let shape = broadcast_shapes(lhs.shape(), rhs.shape())?;
    let out = Array::empty(&shape, dtype, lhs.device())?;
    kernel(lhs, rhs, &out)?;
    Ok(out)
}

pub fn exp(x: &Array) -> Result<Array> {
    unary(x, float_result(x.dtype()), |x, out| x.device().exp(x, out))
}

pub fn log(x: &Array) -> Result<Array> {
    unary(x, float_result(x.dtype()), |x, out| x.device().log(x, out))
}

/// Element-wise square root; negative inputs give NaN.
pub fn sqrt(x: &Array) -> Result<Array> {
    unary(x, float_result(x.dtype()), |x, out| x.device().sqrt(x, out))
}

pub fn is_nan(x: &Array) -> Result<Array> {
    unary(x, Dtype::Bool, |x, out| x.device().is_nan(x, out))
}

pub fn is_inf(x: &Array) -> Result<Array> {
    unary(x, Dtype::Bool, |x, out| x.device().is_inf(x, out))
}

pub fn add(lhs: &Array, rhs: &Array) -> Result<Array> {
    let dtype = result_type(lhs.dtype(), rhs.dtype());
    binary(lhs, rhs, dtype, |l, r, out| l.device().add(l, r, out))
}

pub fn subtract(lhs: &Array, rhs: &Array) -> Result<Array> {
    let dtype = result_type(lhs.dtype(), rhs.dtype());
    binary(lhs, rhs, dtype, |l, r, out| l.device().subtract(l, r, out))
}

pub fn multiply(lhs: &Array, rhs: &Array) -> Result<Array> {
    let dtype = result_type(lhs.dtype(), rhs.dtype());
    binary(lhs, rhs, dtype, |l, r, out| l.device().multiply(l, r, out))
}

pub fn divide(lhs: &Array, rhs: &Array) -> Result<Array> {
    let dtype = result_type(lhs.dtype(), rhs.dtype());
    binary(lhs, rhs, dtype, |l, r, out| l.device().divide(l, r, out))
}

pub fn equal(lhs: &Array, rhs: &Array) -> Result<Array> {
    binary(lhs, rhs, Dtype::Bool, |l, r, out| l.device().equal(l, r, out))
}

/// Sums over `axes`, dropping them from the shape. Booleans and integers
/// accumulate in `Int64`.
pub fn sum(x: &Array, axes: &[usize]) -> Result<Array> {
    let shape: Vec<usize> = x
        .shape()
        .iter()
        .enumerate()
        .filter(|(axis, _)| !axes.contains(axis))
        .map(|(_, &dim)| dim)
        .collect();
    let dtype = if x.dtype().is_float() { x.dtype() } else { Dtype::Int64 };
    let out = Array::empty(&shape, dtype, x.device())?;
    x.device().sum(x, axes, &out)?;
    Ok(out)
}

/// Matrix product of two 2-D arrays.
pub fn dot(a: &Array, b: &Array) -> Result<Array> {
    let m = a.shape().first().copied().unwrap_or(0);
    let n = b.shape().get(1).copied().unwrap_or(0);
    let out = Array::empty(&[m, n], result_type(a.dtype(), b.dtype()), a.device())?;
    a.device().dot(a, b, &out)?;
    Ok(out)
}

/// Selects from `x` where `condition` holds and from `y` elsewhere.
pub fn where_(condition: &Array, x: &Array, y: &Array) -> Result<Array> {
    let shape = broadcast_shapes(&broadcast_shapes(condition.shape(), x.shape())?, y.shape())?;
    let out = Array::empty(&shape, result_type(x.dtype(), y.dtype()), condition.device())?;
    condition.device().where_(condition, x, y, &out)?;
    Ok(out)
}
