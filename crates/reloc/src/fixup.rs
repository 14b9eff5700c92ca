//! Conversion between stored offsets and in-buffer references.
//!
//! Stored values are relative to the origin (the first payload byte). At
//! 64-bit width a field stores the target's distance from the origin; at
//! 32-bit width it stores a signed distance from the field itself. Resolved
//! fields hold the target's absolute index into the node buffer, in host
//! byte order.

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::offset::{OffsetTable, PointerWidth};

/// Origin-relative target encoded by `raw` in the field at `field`
pub fn stored_to_target(width: PointerWidth, field: u64, raw: u64) -> Option<u64> {
    match width {
        PointerWidth::Bits64 => Some(raw),
        PointerWidth::Bits32 => {
            let relative = i64::from(raw as u32 as i32);
            u64::try_from(field as i64 + relative).ok()
        }
    }
}

/// Stored value that makes the field at `field` reference `target`
pub fn target_to_stored(width: PointerWidth, field: u64, target: u64) -> Result<u64> {
    match width {
        PointerWidth::Bits64 => Ok(target),
        PointerWidth::Bits32 => {
            let relative = target as i64 - field as i64;
            i32::try_from(relative)
                .map(|value| u64::from(value as u32))
                .map_err(|_| Error::OutOfBoundsOffset {
                    position: field,
                    value: target,
                    limit: i32::MAX as u64,
                })
        }
    }
}

/// Node buffer geometry shared by both directions
#[derive(Debug, Clone, Copy)]
pub struct Region {
    /// Buffer index of the origin
    pub origin: usize,
    /// Origin-relative end of the area offset fields may occupy
    pub fields_end: usize,
    /// Origin-relative end of the area offsets may point into (inclusive)
    pub targets_end: usize,
    pub width: PointerWidth,
}

impl Region {
    /// Buffer index of the field at `position`, if it lies in the field area
    pub(crate) fn check_field(&self, position: u64) -> Result<usize> {
        let end = position.saturating_add(self.width.bytes() as u64);
        if end > self.fields_end as u64 {
            return Err(Error::OutOfBoundsOffset {
                position,
                value: position,
                limit: self.fields_end as u64,
            });
        }
        Ok(self.origin + position as usize)
    }
}

/// Rewrite every stored offset at `positions` as an absolute buffer index.
///
/// All positions are validated before the buffer is touched, so a failure
/// leaves `bytes` unchanged. Returns the origin-relative target of each
/// field, in input order.
pub fn resolve(
    bytes: &mut [u8],
    region: Region,
    positions: &[u64],
    stored: Endian,
) -> Result<Vec<u64>> {
    let size = region.width.bytes();
    let mut targets = Vec::with_capacity(positions.len());

    for &position in positions {
        let at = region.check_field(position)?;
        let raw = stored.read_uint(bytes, at, size)?;
        let target = stored_to_target(region.width, position, raw)
            .filter(|&target| target <= region.targets_end as u64)
            .ok_or(Error::OutOfBoundsOffset {
                position,
                value: raw,
                limit: region.targets_end as u64,
            })?;
        targets.push(target);
    }

    for (&position, &target) in positions.iter().zip(&targets) {
        let at = region.origin + position as usize;
        Endian::NATIVE.write_uint(bytes, at, size, region.origin as u64 + target)?;
    }
    Ok(targets)
}

/// Mirror of [`resolve`]: turn absolute indices back into stored values in
/// `target` byte order and record each position in `table`.
pub fn unresolve(
    bytes: &mut [u8],
    region: Region,
    positions: &[u64],
    target: Endian,
    table: &mut OffsetTable,
) -> Result<()> {
    let size = region.width.bytes();
    for &position in positions {
        let at = region.check_field(position)?;
        let absolute = Endian::NATIVE.read_uint(bytes, at, size)?;
        let relative = absolute
            .checked_sub(region.origin as u64)
            .filter(|&relative| relative <= region.targets_end as u64)
            .ok_or(Error::OutOfBoundsOffset {
                position,
                value: absolute,
                limit: (region.origin + region.targets_end) as u64,
            })?;
        let stored = target_to_stored(region.width, position, relative)?;
        target.write_uint(bytes, at, size, stored)?;
        table.push(position);
    }
    Ok(())
}
