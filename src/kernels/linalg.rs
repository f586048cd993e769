//! Matrix products.

use rayon::prelude::*;

use crate::array::Array;
use crate::dtype::Element;
use crate::elementwise::{self, Execution};
use crate::error::{Error, Result};
use crate::visit_dtype;

use super::cast_to;

/// Matrix product `out = a × b` of two 2-D arrays (`a: m×k`, `b: k×n`,
/// `out: m×n`), accumulated in the output dtype.
///
/// Rows of the output are computed in parallel on devices that run with
/// [`Execution::Parallel`].
pub fn dot(execution: Execution, a: &Array, b: &Array, out: &Array) -> Result<()> {
    let (&[m, k], &[k2, n]) = (a.shape(), b.shape()) else {
        return Err(Error::shape_mismatch(&[0, 0], if a.ndim() == 2 { b.shape() } else { a.shape() }));
    };
    if k != k2 {
        return Err(Error::shape_mismatch(&[k, n], b.shape()));
    }
    if out.shape() != [m, n] {
        return Err(Error::shape_mismatch(&[m, n], out.shape()));
    }

    let a = cast_to(execution, a, out.dtype())?;
    let b = cast_to(execution, b, out.dtype())?;
    visit_dtype!(out.dtype(), T => {
        let a = elementwise::gather::<T>(&a, &[m, k])?;
        let b = elementwise::gather::<T>(&b, &[k, n])?;
        let mut c = vec![T::default(); m * n];
        if n > 0 {
            let row = |(i, row): (usize, &mut [T])| {
                for (j, cell) in row.iter_mut().enumerate() {
                    let mut acc = T::default();
                    for l in 0..k {
                        acc = Element::add(acc, Element::mul(a[i * k + l], b[l * n + j]));
                    }
                    *cell = acc;
                }
            };
            match execution {
                Execution::Parallel => c.par_chunks_mut(n).enumerate().for_each(row),
                Execution::Sequential => c.chunks_mut(n).enumerate().for_each(row),
            }
        }
        elementwise::scatter(out, &c)
    })
}
