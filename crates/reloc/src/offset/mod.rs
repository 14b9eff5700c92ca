//! Offset table codec.
//!
//! Offset tables list every byte position (relative to origin) that holds an
//! offset field, in a compact delta encoding. The loader decodes the table
//! to drive fixup; the writer collects positions and encodes them after the
//! string table.

pub mod codec;
mod table;
mod width;

pub use codec::{Entries, Entry, Tier, decode, encode};
pub use table::OffsetTable;
pub use width::PointerWidth;
