//! Variable-length offset table encoding
//!
//! Each entry is the distance from the previous offset field (the first one
//! from origin), counted in pointer-width units and stored with a 2-bit tier
//! tag in the high bits of its first byte:
//!
//! ```text
//! 01dddddd                              6-bit delta   (<= 0x3F)
//! 10dddddd dddddddd                     14-bit delta  (<= 0x3FFF)
//! 11dddddd dddddddd dddddddd dddddddd   30-bit delta  (<= 0x3FFFFFFF)
//! 00......                              terminator
//! ```
//!
//! Multi-byte deltas are big-endian regardless of container byte order.

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use super::PointerWidth;
use crate::error::{Error, Result};
use crate::layout::{TABLE_ALIGN, align_up};

const TAG_SHIFT: u32 = 6;
const TAG_TERMINATOR: u8 = 0b00;
const TAG_6: u8 = 0b01;
const TAG_14: u8 = 0b10;
const TAG_30: u8 = 0b11;
const PAYLOAD_MASK: u8 = 0x3F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
pub enum Tier {
    #[strum(to_string = "6-bit")]
    Bits6,
    #[strum(to_string = "14-bit")]
    Bits14,
    #[strum(to_string = "30-bit")]
    Bits30,
}

impl Tier {
    /// Pick the smallest tier that holds `delta` (already scaled to units)
    pub fn for_delta(delta: u64) -> Option<Self> {
        if delta <= Self::Bits6.max() {
            Some(Self::Bits6)
        } else if delta <= Self::Bits14.max() {
            Some(Self::Bits14)
        } else if delta <= Self::Bits30.max() {
            Some(Self::Bits30)
        } else {
            None
        }
    }

    /// Largest delta this tier can carry
    pub fn max(self) -> u64 {
        match self {
            Self::Bits6 => 0x3F,
            Self::Bits14 => 0x3FFF,
            Self::Bits30 => 0x3FFF_FFFF,
        }
    }

    /// Encoded length in bytes
    pub fn encoded_len(self) -> usize {
        match self {
            Self::Bits6 => 1,
            Self::Bits14 => 2,
            Self::Bits30 => 4,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Bits6 => TAG_6,
            Self::Bits14 => TAG_14,
            Self::Bits30 => TAG_30,
        }
    }

    fn from_tag(byte: u8) -> Option<Self> {
        match byte >> TAG_SHIFT {
            TAG_6 => Some(Self::Bits6),
            TAG_14 => Some(Self::Bits14),
            TAG_30 => Some(Self::Bits30),
            _ => None,
        }
    }

    fn write(self, delta: u64, out: &mut Vec<u8>) {
        let bytes = (delta as u32).to_be_bytes();
        let body = &bytes[4 - self.encoded_len()..];
        out.push((self.tag() << TAG_SHIFT) | (body[0] & PAYLOAD_MASK));
        out.extend_from_slice(&body[1..]);
    }
}

/// Encode ascending origin-relative positions into a padded table.
///
/// Positions must be strictly increasing and multiples of the width's unit.
pub fn encode(positions: &[u64], width: PointerWidth) -> Result<Vec<u8>> {
    let unit = width.unit();
    let shift = width.shift();
    let mut out = Vec::with_capacity(align_up(positions.len()));
    let mut previous: Option<u64> = None;

    for &position in positions {
        if let Some(prev) = previous {
            if position <= prev {
                return Err(Error::UnsortedOffsets {
                    previous: prev,
                    current: position,
                });
            }
        }
        if position % unit != 0 {
            return Err(Error::MisalignedOffset { position, unit });
        }

        let delta = (position - previous.unwrap_or(0)) >> shift;
        let tier = Tier::for_delta(delta).ok_or(Error::DeltaOutOfRange { delta })?;
        tier.write(delta, &mut out);
        previous = Some(position);
    }

    out.resize(align_up(out.len()), TAG_TERMINATOR);
    debug_assert_eq!(out.len() % TABLE_ALIGN, 0);
    Ok(out)
}

/// Decode a table into origin-relative positions.
///
/// Stops at the first terminator byte, at a multi-byte entry cut short by the
/// end of `bytes`, or at the end of `bytes`.
pub fn decode(bytes: &[u8], width: PointerWidth) -> Vec<u64> {
    Entries::new(bytes, width).map(|entry| entry.position).collect()
}

/// One decoded table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub position: u64,
    pub tier: Tier,
}

/// Iterator over the entries of an encoded offset table
pub struct Entries<'a> {
    bytes: &'a [u8],
    pos: usize,
    shift: u32,
    cursor: u64,
}

impl<'a> Entries<'a> {
    pub fn new(bytes: &'a [u8], width: PointerWidth) -> Self {
        Self {
            bytes,
            pos: 0,
            shift: width.shift(),
            cursor: 0,
        }
    }

    /// Bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

impl Iterator for Entries<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let first = *self.bytes.get(self.pos)?;
        let tier = Tier::from_tag(first)?;
        let body = self.bytes.get(self.pos + 1..self.pos + tier.encoded_len())?;

        let delta = body
            .iter()
            .fold(u64::from(first & PAYLOAD_MASK), |acc, &b| (acc << 8) | u64::from(b));

        self.pos += tier.encoded_len();
        self.cursor += delta << self.shift;
        Some(Entry {
            position: self.cursor,
            tier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::for_delta(0), Some(Tier::Bits6));
        assert_eq!(Tier::for_delta(0x3F), Some(Tier::Bits6));
        assert_eq!(Tier::for_delta(0x40), Some(Tier::Bits14));
        assert_eq!(Tier::for_delta(0x3FFF), Some(Tier::Bits14));
        assert_eq!(Tier::for_delta(0x4000), Some(Tier::Bits30));
        assert_eq!(Tier::for_delta(0x3FFF_FFFF), Some(Tier::Bits30));
        assert_eq!(Tier::for_delta(0x4000_0000), None);
    }

    #[test]
    fn test_encode_scenario_32bit() {
        // deltas [0, 1, 64] in words; four bytes need no padding
        let bytes = encode(&[0, 4, 260], PointerWidth::Bits32).unwrap();
        assert_eq!(bytes, vec![0x40, 0x41, 0x80, 0x40]);

        let tiers: Vec<Tier> = Entries::new(&bytes, PointerWidth::Bits32)
            .map(|e| e.tier)
            .collect();
        assert_eq!(tiers, vec![Tier::Bits6, Tier::Bits6, Tier::Bits14]);
        assert_eq!(decode(&bytes, PointerWidth::Bits32), vec![0, 4, 260]);
    }

    #[test]
    fn test_encode_64bit_uses_extra_shift() {
        let bytes = encode(&[8, 16], PointerWidth::Bits64).unwrap();
        assert_eq!(bytes[..2], [0x41, 0x41]);
        assert_eq!(decode(&bytes, PointerWidth::Bits64), vec![8, 16]);
    }

    #[test]
    fn test_tier_boundary_roundtrip() {
        for delta in [0x3Fu64, 0x40, 0x3FFF, 0x4000, 0x3FFF_FFFF] {
            let position = delta * 4;
            let bytes = encode(&[position], PointerWidth::Bits32).unwrap();
            let entries: Vec<Entry> = Entries::new(&bytes, PointerWidth::Bits32).collect();
            assert_eq!(entries.len(), 1, "delta {:#x}", delta);
            assert_eq!(entries[0].position, position);
            assert_eq!(Some(entries[0].tier), Tier::for_delta(delta));
        }
    }

    #[test]
    fn test_30bit_layout() {
        let bytes = encode(&[0x4000 * 4], PointerWidth::Bits32).unwrap();
        assert_eq!(bytes, vec![0xC0, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn test_encode_rejects_unsorted() {
        assert!(matches!(
            encode(&[8, 4], PointerWidth::Bits32),
            Err(Error::UnsortedOffsets {
                previous: 8,
                current: 4
            })
        ));
        assert!(matches!(
            encode(&[4, 4], PointerWidth::Bits32),
            Err(Error::UnsortedOffsets { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_misaligned() {
        assert!(matches!(
            encode(&[4], PointerWidth::Bits64),
            Err(Error::MisalignedOffset { position: 4, unit: 8 })
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_delta() {
        let too_far = 0x4000_0000u64 * 4;
        assert!(matches!(
            encode(&[too_far], PointerWidth::Bits32),
            Err(Error::DeltaOutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_table() {
        assert!(encode(&[], PointerWidth::Bits64).unwrap().is_empty());
        assert!(decode(&[], PointerWidth::Bits64).is_empty());
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        let bytes = [0x41, 0x00, 0x41, 0x41];
        assert_eq!(decode(&bytes, PointerWidth::Bits32), vec![4]);
    }

    #[test]
    fn test_decode_stops_at_truncated_entry() {
        // a 30-bit entry needs 4 bytes but only 2 remain
        let bytes = [0x41, 0xC0, 0x01];
        let mut entries = Entries::new(&bytes, PointerWidth::Bits32);
        assert_eq!(entries.next().map(|e| e.position), Some(4));
        assert_eq!(entries.next(), None);
        assert_eq!(entries.consumed(), 1);
    }

    #[test]
    fn test_roundtrip_mixed_tiers() {
        let positions = vec![0, 8, 0x200, 0x208, 0x40000, 0x40008, 0x1000_0000];
        let bytes = encode(&positions, PointerWidth::Bits64).unwrap();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(decode(&bytes, PointerWidth::Bits64), positions);
    }

    /// xorshift64 stream, deterministic across runs
    fn generator(mut state: u64) -> impl FnMut(u64) -> u64 {
        move |bound| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state % bound
        }
    }

    #[test]
    fn test_generated_sequences_roundtrip() {
        let mut next = generator(0x2545_F491_4F6C_DD1D);
        for width in [PointerWidth::Bits32, PointerWidth::Bits64] {
            for round in 0..300 {
                let len = 1 + next(48) as usize;
                let mut positions = Vec::with_capacity(len);
                let mut cursor = 0u64;
                for i in 0..len {
                    let delta = match next(3) {
                        0 => next(0x40),
                        1 => 0x40 + next(0x3FFF - 0x40 + 1),
                        _ => 0x4000 + next(0x3FFF_FFFF - 0x4000 + 1),
                    };
                    let delta = if i == 0 { delta } else { delta.max(1) };
                    cursor += delta << width.shift();
                    positions.push(cursor);
                }

                let bytes = encode(&positions, width).unwrap();
                assert_eq!(bytes.len() % TABLE_ALIGN, 0);
                assert_eq!(
                    decode(&bytes, width),
                    positions,
                    "round {} at width {}",
                    round,
                    width
                );
            }
        }
    }
}
