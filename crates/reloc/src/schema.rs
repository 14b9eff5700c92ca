//! Payload schemas and their capability hooks.
//!
//! A schema states how large its payload must be and how to build the
//! default value in place. Two capabilities are opt-in: byte swapping
//! through [`EndianSwappable`], and enumeration of offset fields through
//! [`OffsetEnumerable`]. A schema opting into neither is flat scalar data.

use serde::Serialize;

use crate::buffer::NodeBuffer;
use crate::endian::{EndianSwappable, Swapper};
use crate::error::Result;

/// An offset-bearing field of a payload, by origin-relative position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Field {
    /// References another location in the payload
    Pointer(u64),
    /// References a NUL-terminated string in the string table
    String(u64),
}

impl Field {
    pub fn position(self) -> u64 {
        match self {
            Self::Pointer(position) | Self::String(position) => position,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::String(_))
    }
}

/// Swap hook signature: whole-payload swap starting at the origin
pub type SwapHook = fn(&mut Swapper<'_>, bool) -> Result<()>;

/// Enumeration hook signature: push every offset field of a resolved payload
pub type EnumerateHook = fn(&NodeBuffer, &mut Vec<Field>) -> Result<()>;

/// Types that can list their offset fields from a resolved buffer
pub trait OffsetEnumerable {
    fn enumerate_offsets(buffer: &NodeBuffer, fields: &mut Vec<Field>) -> Result<()>;
}

pub trait Schema {
    /// Smallest payload a node of this schema may declare
    const MIN_PAYLOAD_SIZE: usize;

    /// Build the default value in a zeroed payload
    fn init_default(_payload: &mut [u8]) {}

    fn endian_hook() -> Option<SwapHook> {
        None
    }

    fn offset_hook() -> Option<EnumerateHook> {
        None
    }
}

/// Swap hook for a schema whose payload root is `T`
pub fn swap_root<T: EndianSwappable>(s: &mut Swapper<'_>, counts_first: bool) -> Result<()> {
    T::swap_endian(s, 0, counts_first)
}

/// Enumeration hook for a schema implementing [`OffsetEnumerable`]
pub fn enumerate_with<T: OffsetEnumerable>(
    buffer: &NodeBuffer,
    fields: &mut Vec<Field>,
) -> Result<()> {
    T::enumerate_offsets(buffer, fields)
}

/// Flat payload of any size; offsets are known only from the offset table
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Schema for Raw {
    const MIN_PAYLOAD_SIZE: usize = 0;
}
