use super::{PointerWidth, codec};
use crate::error::Result;

/// Write-side collection of offset-field positions.
///
/// Positions may arrive in any order; they are sorted and deduplicated
/// before encoding since the delta scheme only works on ascending input.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    width: PointerWidth,
    positions: Vec<u64>,
}

impl OffsetTable {
    pub fn new(width: PointerWidth) -> Self {
        Self {
            width,
            positions: Vec::new(),
        }
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    /// Record an origin-relative offset-field position
    pub fn push(&mut self, position: u64) {
        self.positions.push(position);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sorted, deduplicated positions
    pub fn positions(&self) -> Vec<u64> {
        let mut sorted = self.positions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
    }

    /// Encode the table into its padded byte stream
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.positions.sort_unstable();
        self.positions.dedup();
        codec::encode(&self.positions, self.width)
    }
}
