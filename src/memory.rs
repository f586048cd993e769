//! Reference-counted device memory blocks.
//!
//! A [`MemoryBlock`] is an opaque, untyped byte buffer. Cloning a block
//! shares it; the bytes are freed when the last handle is dropped. A block
//! produced by a zero-byte allocation is *null*: it has no storage at all.
//!
//! Devices keep no registry of the blocks they hand out. Each block carries
//! its own lock so that concurrent copies stay memory safe, but there is no
//! transactional guarantee across blocks: callers coordinate writers.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dtype::Element;
use crate::error::{Error, Result};

type Storage = Arc<RwLock<Box<[u8]>>>;

/// A shared handle to a byte buffer, or null.
#[derive(Clone, Default)]
pub struct MemoryBlock {
    storage: Option<Storage>,
}

impl MemoryBlock {
    /// The null block.
    #[must_use]
    pub const fn null() -> Self {
        Self { storage: None }
    }

    /// Allocates `bytesize` zeroed bytes, reporting allocator failure instead
    /// of aborting.
    pub(crate) fn zeroed(bytesize: usize) -> Result<Self> {
        if bytesize == 0 {
            return Ok(Self::null());
        }
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(bytesize)
            .map_err(|_| Error::OutOfMemory(bytesize))?;
        bytes.resize(bytesize, 0);
        Ok(Self::from_vec(bytes))
    }

    /// Wraps host bytes without copying them. An empty vector gives the null
    /// block.
    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::null();
        }
        Self {
            storage: Some(Arc::new(RwLock::new(bytes.into_boxed_slice()))),
        }
    }

    /// Encodes `values` into a fresh host block.
    #[must_use]
    pub fn from_elements<T: Element>(values: &[T]) -> Self {
        let size = T::DTYPE.item_size();
        let mut bytes = vec![0u8; values.len() * size];
        for (chunk, value) in bytes.chunks_exact_mut(size).zip(values) {
            value.write_le(chunk);
        }
        Self::from_vec(bytes)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.storage.is_none()
    }

    /// Size of the block in bytes (`0` for null).
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.as_ref().map_or(0, |s| s.read().len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same storage. Two null blocks are
    /// considered the same.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Number of live handles sharing this storage (`0` for null).
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.storage.as_ref().map_or(0, Arc::strong_count)
    }

    /// Copies the bytes out to the host.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.with_bytes(<[u8]>::to_vec)
    }

    /// Decodes the whole block as a contiguous run of `T`.
    #[must_use]
    pub fn to_elements<T: Element>(&self) -> Vec<T> {
        let size = T::DTYPE.item_size();
        self.with_bytes(|bytes| bytes.chunks_exact(size).map(T::read_le).collect())
    }

    pub(crate) fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        match &self.storage {
            Some(s) => f(&s.read()),
            None => f(&[]),
        }
    }

    pub(crate) fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        match &self.storage {
            Some(s) => f(&mut s.write()),
            None => f(&mut []),
        }
    }

    fn addr(&self) -> usize {
        self.storage
            .as_ref()
            .map_or(0, |s| Arc::as_ptr(s).cast::<()>() as usize)
    }
}

impl fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            Some(_) => write!(f, "MemoryBlock({:#x}, {} bytes)", self.addr(), self.len()),
            None => f.write_str("MemoryBlock(null)"),
        }
    }
}

fn check_range(what: &str, block: &MemoryBlock, offset: usize, bytesize: usize) -> Result<()> {
    let len = block.len();
    match offset.checked_add(bytesize) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::OutOfRange(format!(
            "{what} range {offset}..{offset}+{bytesize} exceeds block of {len} bytes"
        ))),
    }
}

/// Copies `bytesize` bytes from `src[src_offset..]` to `dst[dst_offset..]`.
///
/// Locks are taken in address order so that two opposite copies between the
/// same pair of blocks cannot deadlock.
pub(crate) fn copy_bytes(
    dst: &MemoryBlock,
    dst_offset: usize,
    src: &MemoryBlock,
    src_offset: usize,
    bytesize: usize,
) -> Result<()> {
    if bytesize == 0 {
        return Ok(());
    }
    check_range("source", src, src_offset, bytesize)?;
    check_range("destination", dst, dst_offset, bytesize)?;

    let (Some(d), Some(s)) = (&dst.storage, &src.storage) else {
        return Ok(());
    };
    let src_range = src_offset..src_offset + bytesize;
    let dst_range = dst_offset..dst_offset + bytesize;

    if Arc::ptr_eq(d, s) {
        d.write().copy_within(src_range, dst_offset);
    } else if src.addr() < dst.addr() {
        let s = s.read();
        let mut d = d.write();
        d[dst_range].copy_from_slice(&s[src_range]);
    } else {
        let mut d = d.write();
        let s = s.read();
        d[dst_range].copy_from_slice(&s[src_range]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_allocation_is_null() {
        let block = MemoryBlock::zeroed(0).unwrap();
        assert!(block.is_null());
        assert_eq!(block.len(), 0);
        assert!(block.to_vec().is_empty());
    }

    #[test]
    fn clones_share_storage() {
        let a = MemoryBlock::from_vec(vec![1, 2, 3]);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.handle_count(), 2);
        b.with_bytes_mut(|bytes| bytes[0] = 9);
        assert_eq!(a.to_vec(), vec![9, 2, 3]);
        drop(b);
        assert_eq!(a.handle_count(), 1);
    }

    #[test]
    fn copy_respects_offsets() {
        let src = MemoryBlock::from_vec((0..8).collect());
        let dst = MemoryBlock::zeroed(4).unwrap();
        copy_bytes(&dst, 1, &src, 5, 3).unwrap();
        assert_eq!(dst.to_vec(), vec![0, 5, 6, 7]);
    }

    #[test]
    fn copy_within_the_same_block() {
        let block = MemoryBlock::from_vec(vec![1, 2, 3, 4]);
        copy_bytes(&block, 0, &block, 2, 2).unwrap();
        assert_eq!(block.to_vec(), vec![3, 4, 3, 4]);
    }

    #[test]
    fn copy_out_of_bounds_is_rejected() {
        let src = MemoryBlock::from_vec(vec![0; 4]);
        let dst = MemoryBlock::zeroed(4).unwrap();
        assert!(matches!(
            copy_bytes(&dst, 0, &src, 2, 3),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            copy_bytes(&dst, usize::MAX, &src, 0, 1),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn opposite_copies_do_not_deadlock() {
        let a = MemoryBlock::from_vec(vec![1; 1024]);
        let b = MemoryBlock::from_vec(vec![2; 1024]);
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..200 {
                    copy_bytes(&a, 0, &b, 0, 1024).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..200 {
                    copy_bytes(&b, 0, &a, 0, 1024).unwrap();
                }
            });
        });
    }

    #[test]
    fn elements_roundtrip_through_bytes() {
        let block = MemoryBlock::from_elements(&[0.0f32, 1.0, 2.0]);
        assert_eq!(block.len(), 12);
        assert_eq!(block.to_elements::<f32>(), vec![0.0, 1.0, 2.0]);
    }
}
