//! Fills, copies, conversions, comparisons and selections.

use crate::array::Array;
use crate::dtype::{self, Dtype, Element, Scalar};
use crate::elementwise::{self, Execution};
use crate::error::{Error, Result};
use crate::routines::result_type;
use crate::visit_dtype;

use super::cast_to;

pub fn fill(execution: Execution, out: &Array, value: Scalar) -> Result<()> {
    visit_dtype!(out.dtype(), T => {
        let value = T::from_scalar(value);
        elementwise::nullary::<T, _>(execution, move |_, out| *out = value, out)
    })
}

/// Copies `src` into `out`, broadcasting if needed. Dtypes must match.
pub fn copy(execution: Execution, src: &Array, out: &Array) -> Result<()> {
    if src.dtype() != out.dtype() {
        return Err(Error::DtypeMismatch {
            expected: out.dtype(),
            got: src.dtype(),
        });
    }
    visit_dtype!(out.dtype(), T => elementwise::unary::<T, T, _>(
        execution,
        |_, x, out| *out = x,
        src,
        out,
    ))
}

/// Converts `src` into the dtype of `out`.
pub fn as_type(execution: Execution, src: &Array, out: &Array) -> Result<()> {
    visit_dtype!(src.dtype(), S => visit_dtype!(out.dtype(), D => elementwise::unary::<S, D, _>(
        execution,
        |_, x, out| *out = dtype::cast::<S, D>(x),
        src,
        out,
    )))
}

/// `out = (lhs == rhs)`, comparing both sides in their promoted dtype.
pub fn equal(execution: Execution, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
    let common = result_type(lhs.dtype(), rhs.dtype());
    let lhs = cast_to(execution, lhs, common)?;
    let rhs = cast_to(execution, rhs, common)?;
    visit_dtype!(common, T => elementwise::binary::<T, T, bool, _>(
        execution,
        |_, a, b, out| *out = a == b,
        &lhs,
        &rhs,
        out,
    ))
}

/// `out = lhs < rhs ? pos : neg`, comparing in the dtype of `lhs`.
pub fn if_less_else(
    execution: Execution,
    lhs: &Array,
    rhs: Scalar,
    pos: Scalar,
    neg: &Array,
    out: &Array,
) -> Result<()> {
    let neg = cast_to(execution, neg, out.dtype())?;
    visit_dtype!(lhs.dtype(), L => {
        let rhs = L::from_scalar(rhs);
        visit_dtype!(out.dtype(), O => {
            let pos = O::from_scalar(pos);
            elementwise::binary::<L, O, O, _>(
                execution,
                move |_, l, n, out| *out = if l < rhs { pos } else { n },
                lhs,
                &neg,
                out,
            )
        })
    })
}

/// `out = condition ? x : y`.
pub fn where_(
    execution: Execution,
    condition: &Array,
    x: &Array,
    y: &Array,
    out: &Array,
) -> Result<()> {
    let condition = cast_to(execution, condition, Dtype::Bool)?;
    let x = cast_to(execution, x, out.dtype())?;
    let y = cast_to(execution, y, out.dtype())?;
    visit_dtype!(out.dtype(), T => elementwise::ternary::<bool, T, T, T, _>(
        execution,
        |_, c, x, y, out| *out = if c { x } else { y },
        &condition,
        &x,
        &y,
        out,
    ))
}
