//! Reductions.

use crate::array::{contiguous_strides, Array};
use crate::dtype::Element;
use crate::elementwise::{self, Execution, Indexer};
use crate::error::{Error, Result};
use crate::visit_dtype;

use super::cast_to;

/// Checks `axes` against `ndim` and returns them sorted.
fn normalize_axes(axes: &[usize], ndim: usize) -> Result<Vec<usize>> {
    let mut sorted = axes.to_vec();
    sorted.sort_unstable();
    for (i, &axis) in sorted.iter().enumerate() {
        if axis >= ndim || (i > 0 && sorted[i - 1] == axis) {
            return Err(Error::InvalidAxis { axis, ndim });
        }
    }
    Ok(sorted)
}

/// Sums `src` over `axes` into `out`.
///
/// `out` must have the source shape with the reduced axes either removed or
/// kept with length 1. The accumulation happens in the output dtype.
pub fn sum(execution: Execution, src: &Array, axes: &[usize], out: &Array) -> Result<()> {
    let axes = normalize_axes(axes, src.ndim())?;
    let kept: Vec<usize> = (0..src.ndim())
        .filter(|a| axes.binary_search(a).is_err())
        .map(|a| src.shape()[a])
        .collect();
    let keepdims: Vec<usize> = (0..src.ndim())
        .map(|a| if axes.binary_search(&a).is_ok() { 1 } else { src.shape()[a] })
        .collect();
    if out.shape() != kept.as_slice() && out.shape() != keepdims.as_slice() {
        return Err(Error::shape_mismatch(&kept, out.shape()));
    }

    // Element strides into the output, zero along reduced axes.
    let kept_strides = contiguous_strides(&kept, 1);
    let mut next_kept = kept_strides.iter();
    let strides: Vec<isize> = (0..src.ndim())
        .map(|a| {
            if axes.binary_search(&a).is_ok() {
                0
            } else {
                next_kept.next().copied().unwrap_or(0)
            }
        })
        .collect();
    let target = Indexer::new(src.shape(), &strides, 0);

    let src = cast_to(execution, src, out.dtype())?;
    visit_dtype!(out.dtype(), T => {
        let values = elementwise::gather::<T>(&src, src.shape())?;
        let mut acc = vec![T::default(); out.total_size()];
        for (value, o) in values.into_iter().zip(target.offsets()) {
            acc[o] = Element::add(acc[o], value);
        }
        elementwise::scatter(out, &acc)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes_are_sorted_and_checked() {
        assert_eq!(normalize_axes(&[2, 0], 3).unwrap(), vec![0, 2]);
        assert!(matches!(
            normalize_axes(&[3], 3),
            Err(Error::InvalidAxis { axis: 3, ndim: 3 })
        ));
        assert!(normalize_axes(&[1, 1], 3).is_err());
    }
}
