//! Byte order handling.
//!
//! [`Endian`] reads and writes fixed-width scalars at a byte position in
//! either order. The [`traversal`] submodule walks schema types to
//! normalize their scalar fields in place.

mod traversal;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

pub use traversal::*;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Endian {
    #[default]
    #[strum(to_string = "little", serialize = "le")]
    Little,
    #[strum(to_string = "big", serialize = "be")]
    Big,
}

macro_rules! scalar_access {
    ($read:ident, $write:ident, $ty:ty, $n:expr) => {
        pub fn $read(self, buf: &[u8], at: usize) -> Result<$ty> {
            let bytes: [u8; $n] = field(buf, at)?;
            Ok(match self {
                Self::Little => <$ty>::from_le_bytes(bytes),
                Self::Big => <$ty>::from_be_bytes(bytes),
            })
        }

        pub fn $write(self, buf: &mut [u8], at: usize, value: $ty) -> Result<()> {
            let bytes = match self {
                Self::Little => value.to_le_bytes(),
                Self::Big => value.to_be_bytes(),
            };
            let have = buf.len().saturating_sub(at);
            let dst = buf.get_mut(at..at.saturating_add($n)).ok_or(Error::TruncatedInput {
                position: at as u64,
                need: $n,
                have,
            })?;
            dst.copy_from_slice(&bytes);
            Ok(())
        }
    };
}

impl Endian {
    /// Byte order of the running host
    pub const NATIVE: Self = if cfg!(target_endian = "big") {
        Self::Big
    } else {
        Self::Little
    };

    /// Decode the on-disk endianness flag (0 little, 1 big)
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }

    pub fn is_native(self) -> bool {
        self == Self::NATIVE
    }

    scalar_access!(read_u16, write_u16, u16, 2);
    scalar_access!(read_u32, write_u32, u32, 4);
    scalar_access!(read_u64, write_u64, u64, 8);

    /// Read an unsigned value of `width` bytes (4 or 8)
    pub fn read_uint(self, buf: &[u8], at: usize, width: usize) -> Result<u64> {
        if width == 8 {
            self.read_u64(buf, at)
        } else {
            self.read_u32(buf, at).map(u64::from)
        }
    }

    /// Write an unsigned value of `width` bytes (4 or 8); 4-byte writes
    /// keep the low 32 bits.
    pub fn write_uint(self, buf: &mut [u8], at: usize, width: usize, value: u64) -> Result<()> {
        if width == 8 {
            self.write_u64(buf, at, value)
        } else {
            self.write_u32(buf, at, value as u32)
        }
    }

    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    /// Encode `value` in `width` bytes (4 or 8)
    pub fn uint_bytes(self, value: u64, width: usize) -> Vec<u8> {
        let mut out = vec![0u8; width];
        // `out` is exactly `width` long, the write cannot fail
        let _ = self.write_uint(&mut out, 0, width, value);
        out
    }
}

fn field<const N: usize>(buf: &[u8], at: usize) -> Result<[u8; N]> {
    let slice = buf.get(at..at.saturating_add(N)).ok_or(Error::TruncatedInput {
        position: at as u64,
        need: N,
        have: buf.len().saturating_sub(at),
    })?;
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(slice);
    Ok(bytes)
}
