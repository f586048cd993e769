//! Transcendental functions and floating-point predicates.

use crate::array::Array;
use crate::dtype::{Element, FloatElement};
use crate::elementwise::{self, Execution};
use crate::error::Result;
use crate::{visit_dtype, visit_float_dtype};

use super::cast_to;

/// `out = e^x`, computed in the output's floating-point dtype.
pub fn exp(execution: Execution, x: &Array, out: &Array) -> Result<()> {
    let x = cast_to(execution, x, out.dtype())?;
    visit_float_dtype!(out.dtype(), T => elementwise::unary::<T, T, _>(
        execution,
        |_, x, out| *out = FloatElement::exp(x),
        &x,
        out,
    ))
}

/// `out = ln(x)`, computed in the output's floating-point dtype.
pub fn log(execution: Execution, x: &Array, out: &Array) -> Result<()> {
    let x = cast_to(execution, x, out.dtype())?;
    visit_float_dtype!(out.dtype(), T => elementwise::unary::<T, T, _>(
        execution,
        |_, x, out| *out = FloatElement::ln(x),
        &x,
        out,
    ))
}

/// `out = sqrt(x)`; negative inputs give NaN.
pub fn sqrt(execution: Execution, x: &Array, out: &Array) -> Result<()> {
    let x = cast_to(execution, x, out.dtype())?;
    visit_float_dtype!(out.dtype(), T => elementwise::unary::<T, T, _>(
        execution,
        |_, x, out| *out = FloatElement::sqrt(x),
        &x,
        out,
    ))
}

/// `out = isnan(x)` into a `bool` output. Never true for integers.
pub fn is_nan(execution: Execution, x: &Array, out: &Array) -> Result<()> {
    visit_dtype!(x.dtype(), T => elementwise::unary::<T, bool, _>(
        execution,
        |_, x, out| *out = Element::is_nan(x),
        x,
        out,
    ))
}

/// `out = isinf(x)` into a `bool` output. Never true for integers.
pub fn is_inf(execution: Execution, x: &Array, out: &Array) -> Result<()> {
    visit_dtype!(x.dtype(), T => elementwise::unary::<T, bool, _>(
        execution,
        |_, x, out| *out = Element::is_inf(x),
        x,
        out,
    ))
}
