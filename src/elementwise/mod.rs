//! The elementwise engine.
//!
//! Every elementwise device kernel goes through the drivers in this module:
//! inputs are gathered into typed host vectors along their (possibly
//! broadcast) strides, the per-element functor runs once per logical index
//! of the output, and the results are scattered back into the output block.
//!
//! # Design Highlights
//! - **One indexing path**: strides and broadcasting are resolved once per
//!   array by an [`Indexer`], never inside the functor.
//! - **No type punning**: bytes are decoded and encoded with the explicit
//!   [`Element`] conversions.
//! - **Deterministic**: the functor sees indices in row-major order; the
//!   parallel path partitions the output but every element's value depends
//!   only on its own index.
//! - **Aliasing-safe**: no lock is held while the functor runs, so an output
//!   may share its block with an input.
//!
//! # Example
//! ```
//! # use std::sync::Arc;
//! use xrt_runtime::{Array, Context};
//! use xrt_runtime::elementwise::{self, Execution};
//!
//! let ctx = Context::new();
//! let device = ctx.get_device("native:0").unwrap();
//! let x = Array::from_vec(&[3], vec![1.0f32, 2.0, 3.0], &device).unwrap();
//! let out = Array::empty(&[3], x.dtype(), &device).unwrap();
//! elementwise::unary::<f32, f32, _>(
//!     Execution::Sequential,
//!     |_, x, out| *out = x * 2.0,
//!     &x,
//!     &out,
//! )
//! .unwrap();
//! assert_eq!(out.to_vec::<f32>().unwrap(), vec![2.0, 4.0, 6.0]);
//! ```

pub mod indexer;

use rayon::prelude::*;

use crate::array::Array;
use crate::dtype::Element;
use crate::error::{Error, Result};

pub use self::indexer::Indexer;

/// Outputs smaller than this are never split across threads.
pub const PARALLEL_THRESHOLD: usize = 1 << 14;

/// How a device runs the per-element loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// One thread, in index order.
    #[default]
    Sequential,
    /// The `rayon` global pool, for outputs of at least
    /// [`PARALLEL_THRESHOLD`] elements.
    Parallel,
}

fn check_dtype<T: Element>(array: &Array) -> Result<()> {
    if array.dtype() == T::DTYPE {
        Ok(())
    } else {
        Err(Error::DtypeMismatch {
            expected: T::DTYPE,
            got: array.dtype(),
        })
    }
}

/// Reads `array` broadcast to `shape` into a row-major vector.
///
/// # Errors
/// [`Error::DtypeMismatch`] if `T` is not the array's dtype,
/// [`Error::ShapeMismatch`] if the array does not broadcast to `shape`.
pub fn gather<T: Element>(array: &Array, shape: &[usize]) -> Result<Vec<T>> {
    check_dtype::<T>(array)?;
    let indexer = Indexer::broadcast(array.shape(), array.strides(), array.offset(), shape)?;
    let size = T::DTYPE.item_size();
    Ok(array.data().with_bytes(|bytes| {
        indexer
            .offsets()
            .map(|o| T::read_le(&bytes[o..o + size]))
            .collect()
    }))
}

/// Writes row-major `values` into `out` along its strides.
///
/// # Errors
/// [`Error::DtypeMismatch`] if `T` is not the output's dtype,
/// [`Error::ShapeMismatch`] if `values` does not cover the output.
pub fn scatter<T: Element>(out: &Array, values: &[T]) -> Result<()> {
    check_dtype::<T>(out)?;
    if values.len() != out.total_size() {
        return Err(Error::shape_mismatch(out.shape(), &[values.len()]));
    }
    let indexer = Indexer::new(out.shape(), out.strides(), out.offset());
    let size = T::DTYPE.item_size();
    out.data().with_bytes_mut(|bytes| {
        for (o, value) in indexer.offsets().zip(values) {
            value.write_le(&mut bytes[o..o + size]);
        }
    });
    Ok(())
}

fn run<O, F>(execution: Execution, total: usize, f: F) -> Vec<O>
where
    O: Element,
    F: Fn(usize, &mut O) + Sync + Send,
{
    let mut out = vec![O::default(); total];
    match execution {
        Execution::Parallel if total >= PARALLEL_THRESHOLD => out
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, o)| f(i, o)),
        _ => out.iter_mut().enumerate().for_each(|(i, o)| f(i, o)),
    }
    out
}

/// Calls `f(index, &mut out)` for every element of `out`.
pub fn nullary<O, F>(execution: Execution, f: F, out: &Array) -> Result<()>
where
    O: Element,
    F: Fn(usize, &mut O) + Sync + Send,
{
    check_dtype::<O>(out)?;
    let values = run(execution, out.total_size(), f);
    scatter(out, &values)
}

/// Calls `f(index, a, &mut out)` for every element, broadcasting `a` to the
/// output shape.
pub fn unary<A, O, F>(execution: Execution, f: F, a: &Array, out: &Array) -> Result<()>
where
    A: Element,
    O: Element,
    F: Fn(usize, A, &mut O) + Sync + Send,
{
    check_dtype::<O>(out)?;
    let a = gather::<A>(a, out.shape())?;
    let values = run(execution, out.total_size(), |i, o| f(i, a[i], o));
    scatter(out, &values)
}

/// Calls `f(index, a, b, &mut out)` for every element, broadcasting both
/// inputs to the output shape.
pub fn binary<A, B, O, F>(
    execution: Execution,
    f: F,
    a: &Array,
    b: &Array,
    out: &Array,
) -> Result<()>
where
    A: Element,
    B: Element,
    O: Element,
    F: Fn(usize, A, B, &mut O) + Sync + Send,
{
    check_dtype::<O>(out)?;
    let a = gather::<A>(a, out.shape())?;
    let b = gather::<B>(b, out.shape())?;
    let values = run(execution, out.total_size(), |i, o| f(i, a[i], b[i], o));
    scatter(out, &values)
}

/// Calls `f(index, a, b, c, &mut out)` for every element, broadcasting all
/// inputs to the output shape.
pub fn ternary<A, B, C, O, F>(
    execution: Execution,
    f: F,
    a: &Array,
    b: &Array,
    c: &Array,
    out: &Array,
) -> Result<()>
where
    A: Element,
    B: Element,
    C: Element,
    O: Element,
    F: Fn(usize, A, B, C, &mut O) + Sync + Send,
{
    check_dtype::<O>(out)?;
    let a = gather::<A>(a, out.shape())?;
    let b = gather::<B>(b, out.shape())?;
    let c = gather::<C>(c, out.shape())?;
    let values = run(execution, out.total_size(), |i, o| {
        f(i, a[i], b[i], c[i], o);
    });
    scatter(out, &values)
}
