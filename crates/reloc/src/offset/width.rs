use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Width of the offset fields stored in a container
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum PointerWidth {
    #[serde(rename = "32")]
    #[strum(to_string = "32", serialize = "4")]
    Bits32,
    #[default]
    #[serde(rename = "64")]
    #[strum(to_string = "64", serialize = "8")]
    Bits64,
}

impl PointerWidth {
    /// Offset fields are always 4-byte aligned; deltas are counted in words.
    const WORD_SHIFT: u32 = 2;

    /// Decode the envelope's pointer-width byte
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            4 => Some(Self::Bits32),
            8 => Some(Self::Bits64),
            _ => None,
        }
    }

    /// Field size in bytes
    pub fn bytes(self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }

    /// Extra right shift applied to encoded deltas (1 for 64-bit fields)
    pub fn delta_shift(self) -> u32 {
        match self {
            Self::Bits32 => 0,
            Self::Bits64 => 1,
        }
    }

    /// Total shift between a byte delta and its encoded value
    pub fn shift(self) -> u32 {
        Self::WORD_SHIFT + self.delta_shift()
    }

    /// Granularity every offset-field position must respect
    pub fn unit(self) -> u64 {
        1 << self.shift()
    }
}
