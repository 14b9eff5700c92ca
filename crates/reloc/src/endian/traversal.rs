//! Recursive in-place byte swapping driven by schema types.
//!
//! Composite types implement [`EndianSwappable`] by swapping each scalar
//! sub-field and recursing into arrays reached through offset fields. Offset
//! fields themselves are never swapped here: the fixup engine rewrites them
//! explicitly. Counts that gate array iteration go through
//! [`Swapper::count_u32`], which orders the swap and the read according to
//! the `counts_first` flag.

use std::collections::HashSet;

use super::Endian;
use crate::error::{Error, Result};
use crate::fixup;
use crate::offset::PointerWidth;

/// Representation of offset fields while a traversal runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetState {
    /// File-relative values in the given byte order (load, before fixup)
    Stored(Endian),
    /// Absolute buffer indices in host order (save, before un-fixup)
    Resolved,
}

/// Types whose scalar fields can be byte-swapped in place
pub trait EndianSwappable {
    /// Encoded size, used to step through arrays
    const SIZE: usize;

    /// Swap the value at origin-relative position `at`.
    ///
    /// `counts_first` is true when the buffer holds foreign-order scalars
    /// being normalized to host order: counts must be swapped before they
    /// are read. It is false in the opposite direction.
    fn swap_endian(s: &mut Swapper<'_>, at: usize, counts_first: bool) -> Result<()>;
}

/// Cursor-free view used by [`EndianSwappable`] implementations
pub struct Swapper<'a> {
    bytes: &'a mut [u8],
    origin: usize,
    width: PointerWidth,
    offsets: OffsetState,
    swapped: HashSet<usize>,
    visited: HashSet<usize>,
}

impl<'a> Swapper<'a> {
    /// `bytes` is the whole node buffer; positions are relative to `origin`.
    pub fn new(
        bytes: &'a mut [u8],
        origin: usize,
        width: PointerWidth,
        offsets: OffsetState,
    ) -> Self {
        Self {
            bytes,
            origin,
            width,
            offsets,
            swapped: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    /// Number of distinct scalars swapped so far
    pub fn swapped_count(&self) -> usize {
        self.swapped.len()
    }

    /// Reverse `len` bytes at `at`. A position is swapped at most once, so
    /// graphs that reach the same scalar twice stay consistent.
    pub fn swap_bytes(&mut self, at: usize, len: usize) -> Result<()> {
        let abs = self.absolute(at, len)?;
        if self.swapped.insert(abs) {
            self.bytes[abs..abs + len].reverse();
        }
        Ok(())
    }

    pub fn swap_u16(&mut self, at: usize) -> Result<()> {
        self.swap_bytes(at, 2)
    }

    pub fn swap_u32(&mut self, at: usize) -> Result<()> {
        self.swap_bytes(at, 4)
    }

    pub fn swap_u64(&mut self, at: usize) -> Result<()> {
        self.swap_bytes(at, 8)
    }

    /// Swap a 32-bit count and return its host-order value
    pub fn count_u32(&mut self, at: usize, counts_first: bool) -> Result<u32> {
        let abs = self.absolute(at, 4)?;
        let was_swapped = self.swapped.contains(&abs);
        if counts_first {
            self.swap_u32(at)?;
            Endian::NATIVE.read_u32(self.bytes, abs)
        } else {
            let raw = Endian::NATIVE.read_u32(self.bytes, abs)?;
            self.swap_u32(at)?;
            Ok(if was_swapped { raw.swap_bytes() } else { raw })
        }
    }

    /// Swap a 16-bit count and return its host-order value
    pub fn count_u16(&mut self, at: usize, counts_first: bool) -> Result<u16> {
        let abs = self.absolute(at, 2)?;
        let was_swapped = self.swapped.contains(&abs);
        if counts_first {
            self.swap_u16(at)?;
            Endian::NATIVE.read_u16(self.bytes, abs)
        } else {
            let raw = Endian::NATIVE.read_u16(self.bytes, abs)?;
            self.swap_u16(at)?;
            Ok(if was_swapped { raw.swap_bytes() } else { raw })
        }
    }

    /// Origin-relative target of the offset field at `at`, without
    /// modifying it.
    pub fn follow(&self, at: usize) -> Result<usize> {
        let abs = self.absolute(at, self.width.bytes())?;
        let limit = self.bytes.len().saturating_sub(self.origin) as u64;
        let out_of_bounds = |value: u64| Error::OutOfBoundsOffset {
            position: at as u64,
            value,
            limit,
        };

        let target = match self.offsets {
            OffsetState::Stored(endian) => {
                let raw = endian.read_uint(self.bytes, abs, self.width.bytes())?;
                fixup::stored_to_target(self.width, at as u64, raw)
                    .ok_or_else(|| out_of_bounds(raw))?
            }
            OffsetState::Resolved => {
                let raw = Endian::NATIVE.read_uint(self.bytes, abs, self.width.bytes())?;
                raw.checked_sub(self.origin as u64)
                    .ok_or_else(|| out_of_bounds(raw))?
            }
        };
        if target > limit {
            return Err(out_of_bounds(target));
        }
        Ok(target as usize)
    }

    /// Swap `count` consecutive values starting at `at`
    pub fn swap_array<T: EndianSwappable>(
        &mut self,
        at: usize,
        count: usize,
        counts_first: bool,
    ) -> Result<()> {
        for index in 0..count {
            T::swap_endian(self, at + index * T::SIZE, counts_first)?;
        }
        Ok(())
    }

    /// Follow the offset field at `field` and swap `count` values there.
    /// Empty arrays are not followed; each target is walked once.
    pub fn swap_pointee<T: EndianSwappable>(
        &mut self,
        field: usize,
        count: usize,
        counts_first: bool,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let target = self.follow(field)?;
        if !self.visited.insert(target) {
            return Ok(());
        }
        self.swap_array::<T>(target, count, counts_first)
    }

    fn absolute(&self, at: usize, len: usize) -> Result<usize> {
        let abs = self.origin.checked_add(at);
        match abs {
            Some(abs) if abs.checked_add(len).is_some_and(|end| end <= self.bytes.len()) => Ok(abs),
            _ => Err(Error::TruncatedInput {
                position: at as u64,
                need: len,
                have: self.bytes.len().saturating_sub(self.origin.saturating_add(at)),
            }),
        }
    }
}

impl EndianSwappable for u8 {
    const SIZE: usize = 1;

    fn swap_endian(_: &mut Swapper<'_>, _: usize, _: bool) -> Result<()> {
        Ok(())
    }
}

impl EndianSwappable for i8 {
    const SIZE: usize = 1;

    fn swap_endian(_: &mut Swapper<'_>, _: usize, _: bool) -> Result<()> {
        Ok(())
    }
}

macro_rules! primitive_swap {
    ($($ty:ty),*) => {
        $(
            impl EndianSwappable for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn swap_endian(s: &mut Swapper<'_>, at: usize, _: bool) -> Result<()> {
                    s.swap_bytes(at, Self::SIZE)
                }
            }
        )*
    };
}

primitive_swap!(u16, i16, u32, i32, f32, u64, i64, f64);

impl<T: EndianSwappable, const N: usize> EndianSwappable for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn swap_endian(s: &mut Swapper<'_>, at: usize, counts_first: bool) -> Result<()> {
        s.swap_array::<T>(at, N, counts_first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `{ count: u32, pad: u32, items: offset64 }` pointing at `[u16; count]`
    struct List;

    impl EndianSwappable for List {
        const SIZE: usize = 16;

        fn swap_endian(s: &mut Swapper<'_>, at: usize, counts_first: bool) -> Result<()> {
            let count = s.count_u32(at, counts_first)?;
            s.swap_u32(at + 4)?;
            s.swap_pointee::<u16>(at + 8, count as usize, counts_first)
        }
    }

    fn big_endian_list() -> Vec<u8> {
        let mut bytes = vec![0u8; 8];
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&7u32.to_be_bytes());
        bytes.extend_from_slice(&16u64.to_be_bytes());
        bytes.extend_from_slice(&0x0102u16.to_be_bytes());
        bytes.extend_from_slice(&0x0304u16.to_be_bytes());
        bytes
    }

    #[test]
    fn test_primitive_swap() {
        let mut bytes = vec![1, 2, 3, 4];
        let mut s = Swapper::new(&mut bytes, 0, PointerWidth::Bits64, OffsetState::Resolved);
        u32::swap_endian(&mut s, 0, true).unwrap();
        assert_eq!(bytes, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_scalar_swapped_once() {
        let mut bytes = vec![1, 2];
        let mut s = Swapper::new(&mut bytes, 0, PointerWidth::Bits64, OffsetState::Resolved);
        s.swap_u16(0).unwrap();
        s.swap_u16(0).unwrap();
        assert_eq!(s.swapped_count(), 1);
        assert_eq!(bytes, vec![2, 1]);
    }

    #[test]
    fn test_composite_normalizes_counts_before_walking() {
        let mut bytes = big_endian_list();
        let mut s = Swapper::new(
            &mut bytes,
            8,
            PointerWidth::Bits64,
            OffsetState::Stored(Endian::Big),
        );
        List::swap_endian(&mut s, 0, true).unwrap();

        let n = Endian::NATIVE;
        assert_eq!(n.read_u32(&bytes, 8).unwrap(), 2);
        assert_eq!(n.read_u32(&bytes, 12).unwrap(), 7);
        // the offset field is untouched
        assert_eq!(Endian::Big.read_u64(&bytes, 16).unwrap(), 16);
        assert_eq!(n.read_u16(&bytes, 24).unwrap(), 0x0102);
        assert_eq!(n.read_u16(&bytes, 26).unwrap(), 0x0304);
    }

    #[test]
    fn test_composite_reads_counts_before_swapping_out() {
        let mut bytes = vec![0u8; 8];
        let n = Endian::NATIVE;
        bytes.extend_from_slice(&n.u32_bytes(2));
        bytes.extend_from_slice(&n.u32_bytes(7));
        // resolved: absolute index of the array (origin 8 + 16)
        bytes.extend_from_slice(&n.uint_bytes(24, 8));
        bytes.extend_from_slice(&n.u16_bytes(0x0102));
        bytes.extend_from_slice(&n.u16_bytes(0x0304));

        let mut s = Swapper::new(&mut bytes, 8, PointerWidth::Bits64, OffsetState::Resolved);
        List::swap_endian(&mut s, 0, false).unwrap();

        let foreign = if n == Endian::Little { Endian::Big } else { Endian::Little };
        assert_eq!(foreign.read_u32(&bytes, 8).unwrap(), 2);
        assert_eq!(foreign.read_u16(&bytes, 24).unwrap(), 0x0102);
        assert_eq!(foreign.read_u16(&bytes, 26).unwrap(), 0x0304);
    }

    #[test]
    fn test_follow_32bit_is_field_relative() {
        let mut bytes = vec![0u8; 16];
        // field at origin-relative 4 holding -4: points at origin
        Endian::Little.write_u32(&mut bytes, 8 + 4, (-4i32) as u32).unwrap();
        let s = Swapper::new(
            &mut bytes,
            8,
            PointerWidth::Bits32,
            OffsetState::Stored(Endian::Little),
        );
        assert_eq!(s.follow(4).unwrap(), 0);
    }

    #[test]
    fn test_follow_out_of_bounds() {
        let mut bytes = vec![0u8; 16];
        Endian::Little.write_u64(&mut bytes, 0, 0x1000).unwrap();
        let s = Swapper::new(
            &mut bytes,
            0,
            PointerWidth::Bits64,
            OffsetState::Stored(Endian::Little),
        );
        assert!(matches!(s.follow(0), Err(Error::OutOfBoundsOffset { .. })));
    }

    #[test]
    fn test_follow_with_origin_past_buffer() {
        let mut bytes = vec![0u8; 8];
        let s = Swapper::new(&mut bytes, 32, PointerWidth::Bits64, OffsetState::Resolved);
        assert!(matches!(s.follow(0), Err(Error::TruncatedInput { .. })));
    }

    #[test]
    fn test_array_impl() {
        let mut bytes = vec![0, 1, 0, 2];
        let mut s = Swapper::new(&mut bytes, 0, PointerWidth::Bits32, OffsetState::Resolved);
        <[u16; 2]>::swap_endian(&mut s, 0, true).unwrap();
        assert_eq!(bytes, vec![1, 0, 2, 0]);
    }
}
