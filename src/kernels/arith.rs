//! Elementwise arithmetic.

use crate::array::Array;
use crate::dtype::{Element, Scalar};
use crate::elementwise::{self, Execution};
use crate::error::Result;
use crate::visit_dtype;

use super::cast_to;

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithOp {
    #[inline]
    fn apply<T: Element>(self, a: T, b: T) -> T {
        match self {
            Self::Add => Element::add(a, b),
            Self::Subtract => Element::sub(a, b),
            Self::Multiply => Element::mul(a, b),
            Self::Divide => Element::div(a, b),
        }
    }
}

fn binary_op(execution: Execution, op: ArithOp, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
    let lhs = cast_to(execution, lhs, out.dtype())?;
    let rhs = cast_to(execution, rhs, out.dtype())?;
    visit_dtype!(out.dtype(), T => elementwise::binary::<T, T, T, _>(
        execution,
        |_, a, b, out| *out = op.apply(a, b),
        &lhs,
        &rhs,
        out,
    ))
}

pub fn add(execution: Execution, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
    binary_op(execution, ArithOp::Add, lhs, rhs, out)
}

pub fn subtract(execution: Execution, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
    binary_op(execution, ArithOp::Subtract, lhs, rhs, out)
}

pub fn multiply(execution: Execution, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
    binary_op(execution, ArithOp::Multiply, lhs, rhs, out)
}

/// Integer division by zero yields zero.
pub fn divide(execution: Execution, lhs: &Array, rhs: &Array, out: &Array) -> Result<()> {
    binary_op(execution, ArithOp::Divide, lhs, rhs, out)
}

/// `out = lhs * rhs` for a scalar `rhs` converted to the output dtype.
pub fn multiply_scalar(execution: Execution, lhs: &Array, rhs: Scalar, out: &Array) -> Result<()> {
    let lhs = cast_to(execution, lhs, out.dtype())?;
    visit_dtype!(out.dtype(), T => {
        let rhs = T::from_scalar(rhs);
        elementwise::unary::<T, T, _>(execution, move |_, a, out| *out = Element::mul(a, rhs), &lhs, out)
    })
}
