//! Host kernels shared by every host-addressable device.
//!
//! Each kernel is a thin shell: it promotes its inputs to the output dtype
//! once (see [`cast_to`]), picks the concrete element type with
//! [`visit_dtype!`](crate::visit_dtype) and hands a per-element functor to
//! the [`elementwise`](crate::elementwise) engine. Device-compatibility
//! checks are done by the calling [`Device`](crate::Device) method.
//!
//! ## Implemented Ops
//!
//! - [`math`]: `exp`, `log`, `sqrt`, `is_nan`, `is_inf`
//! - [`arith`]: `add`, `subtract`, `multiply`, `multiply_scalar`, `divide`
//! - [`misc`]: `fill`, `copy`, `as_type`, `equal`, `if_less_else`, `where_`
//! - [`reduction`]: `sum`
//! - [`linalg`]: `dot`

pub mod arith;
pub mod linalg;
pub mod math;
pub mod misc;
pub mod reduction;

use std::borrow::Cow;

use crate::array::Array;
use crate::dtype::Dtype;
use crate::elementwise::Execution;
use crate::error::Result;

/// Returns `x` unchanged if it already has `dtype`, otherwise a converted
/// contiguous copy on the same device.
pub fn cast_to(execution: Execution, x: &Array, dtype: Dtype) -> Result<Cow<'_, Array>> {
    if x.dtype() == dtype {
        return Ok(Cow::Borrowed(x));
    }
    let out = Array::empty(x.shape(), dtype, x.device())?;
    misc::as_type(execution, x, &out)?;
    Ok(Cow::Owned(out))
}
