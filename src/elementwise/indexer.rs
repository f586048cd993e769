//! Strided index arithmetic, resolved once per array.

use crate::error::{Error, Result};

/// Walks a logical row-major index space and yields the storage offset of
/// each element for one array.
///
/// Strides are resolved when the indexer is built: axes an array broadcasts
/// over (size-1 or missing leading axes) get a zero stride, so the walk
/// itself is a plain odometer with no per-element division.
#[derive(Debug, Clone)]
pub struct Indexer {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl Indexer {
    /// Builds an indexer from an explicit shape, strides and base offset.
    ///
    /// # Panics
    /// Panics if `shape` and `strides` have different lengths.
    #[must_use]
    pub fn new(shape: &[usize], strides: &[isize], offset: usize) -> Self {
        assert_eq!(shape.len(), strides.len(), "shape/strides rank mismatch");
        Self {
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
        }
    }

    /// Builds an indexer that visits `target` while reading from an array of
    /// shape `shape` and `strides`, broadcasting size-1 and missing leading
    /// axes.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `shape` cannot be broadcast to
    /// `target`.
    pub fn broadcast(
        shape: &[usize],
        strides: &[isize],
        offset: usize,
        target: &[usize],
    ) -> Result<Self> {
        let strides = broadcast_strides(shape, strides, target)?;
        Ok(Self {
            shape: target.to_vec(),
            strides,
            offset,
        })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of logical elements visited.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Iterates over storage offsets in row-major logical order.
    #[must_use]
    pub fn offsets(&self) -> Offsets<'_> {
        Offsets {
            indexer: self,
            counter: vec![0; self.shape.len()],
            current: self.offset as isize,
            remaining: self.total_size(),
        }
    }
}

/// Strides of an array of `shape` viewed as `target`.
pub(crate) fn broadcast_strides(
    shape: &[usize],
    strides: &[isize],
    target: &[usize],
) -> Result<Vec<isize>> {
    if shape.len() > target.len() {
        return Err(Error::shape_mismatch(target, shape));
    }
    let lead = target.len() - shape.len();
    let mut out = vec![0isize; target.len()];
    for (axis, (&dim, &stride)) in shape.iter().zip(strides).enumerate() {
        let want = target[lead + axis];
        out[lead + axis] = if dim == want {
            stride
        } else if dim == 1 {
            0
        } else {
            return Err(Error::shape_mismatch(target, shape));
        };
    }
    Ok(out)
}

/// The shape both operands broadcast to.
pub(crate) fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let dim = |s: &[usize], i: usize| {
        let lead = ndim - s.len();
        if i < lead { 1 } else { s[i - lead] }
    };
    (0..ndim)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (x, y) if x == y => Ok(x),
            (1, y) => Ok(y),
            (x, 1) => Ok(x),
            _ => Err(Error::shape_mismatch(a, b)),
        })
        .collect()
}

/// Iterator returned by [`Indexer::offsets`].
pub struct Offsets<'a> {
    indexer: &'a Indexer,
    counter: Vec<usize>,
    current: isize,
    remaining: usize,
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let offset = self.current as usize;

        let Indexer { shape, strides, .. } = self.indexer;
        for axis in (0..shape.len()).rev() {
            self.counter[axis] += 1;
            self.current += strides[axis];
            if self.counter[axis] < shape[axis] {
                break;
            }
            self.current -= strides[axis] * shape[axis] as isize;
            self.counter[axis] = 0;
        }
        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Offsets<'_> {}
