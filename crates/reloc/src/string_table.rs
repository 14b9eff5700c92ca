//! Write-side string table.
//!
//! Strings are deduplicated by content. Each distinct string is written
//! once, then every field referencing it is backpatched in the already
//! written payload.

use std::collections::HashMap;
use std::io::{Seek, Write};

use tracing::trace;

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::fixup::target_to_stored;
use crate::layout::TABLE_ALIGN;
use crate::offset::PointerWidth;
use crate::stream::{SeekExt, WriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry {
    pub content: String,
    /// Origin-relative positions of the fields referencing this string
    pub references: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct StringTable {
    entries: Vec<StringEntry>,
    index: HashMap<String, usize>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the field at `position` references `content`.
    ///
    /// Content with an interior NUL cannot be stored NUL-terminated and is
    /// rejected with [`Error::InvalidString`].
    pub fn add(&mut self, content: &str, position: u64) -> Result<()> {
        if memchr::memchr(0, content.as_bytes()).is_some() {
            return Err(Error::InvalidString { position });
        }
        let slot = match self.index.get(content) {
            Some(&slot) => slot,
            None => {
                self.entries.push(StringEntry {
                    content: content.to_owned(),
                    references: Vec::new(),
                });
                self.index.insert(content.to_owned(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[slot].references.push(position);
        Ok(())
    }

    /// Distinct strings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &StringEntry> {
        self.entries.iter()
    }

    /// Write every string at the stream end and backpatch its references.
    ///
    /// `origin` is the stream position of the payload origin. Reference
    /// fields receive the same stored value as any offset field of the
    /// given width. The table is padded to 4 bytes relative to the origin.
    /// Returns the unpadded table size.
    pub fn flush<W: Write + Seek>(
        self,
        stream: &mut W,
        origin: u64,
        width: PointerWidth,
        endian: Endian,
    ) -> Result<u64> {
        let start = stream.tell()?;
        for entry in &self.entries {
            let position = stream.tell()?;
            stream.write_all(entry.content.as_bytes())?;
            stream.write_all(&[0])?;
            let end = stream.tell()?;

            let target = position - origin;
            for &field in &entry.references {
                let stored = target_to_stored(width, field, target)?;
                stream.seek_to(origin + field)?;
                stream.write_all(&endian.uint_bytes(stored, width.bytes()))?;
            }
            stream.seek_to(end)?;
        }

        let len = stream.tell()? - start;
        stream.pad_to(origin, TABLE_ALIGN as u64)?;
        trace!("Flushed {} strings ({} bytes)", self.entries.len(), len);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_add_deduplicates_by_content() {
        let mut table = StringTable::new();
        let owned = String::from("idle");
        table.add("idle", 0).unwrap();
        table.add("walk", 8).unwrap();
        table.add(&owned, 16).unwrap();

        assert_eq!(table.len(), 2);
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries[0].content, "idle");
        assert_eq!(entries[0].references, vec![0, 16]);
        assert_eq!(entries[1].references, vec![8]);
    }

    #[test]
    fn test_add_rejects_interior_nul() {
        let mut table = StringTable::new();
        table.add("a", 0).unwrap();
        assert!(matches!(
            table.add("a\0b", 8),
            Err(Error::InvalidString { position: 8 })
        ));
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().unwrap().references, vec![0]);
    }

    #[test]
    fn test_flush_writes_once_and_backpatches() {
        // 24-byte payload at origin 8 with three 64-bit string fields
        let mut cursor = Cursor::new(vec![0u8; 32]);
        cursor.seek_to(32).unwrap();

        let mut table = StringTable::new();
        table.add("run", 0).unwrap();
        table.add("jump", 8).unwrap();
        table.add("run", 16).unwrap();
        let len = table
            .flush(&mut cursor, 8, PointerWidth::Bits64, Endian::Little)
            .unwrap();
        assert_eq!(len, 4 + 5);

        let bytes = cursor.into_inner();
        assert_eq!(&bytes[32..41], b"run\0jump\0");
        // padded to 4 relative to origin
        assert_eq!(bytes.len(), 44);
        assert_eq!(Endian::Little.read_u64(&bytes, 8).unwrap(), 24);
        assert_eq!(Endian::Little.read_u64(&bytes, 16).unwrap(), 28);
        assert_eq!(Endian::Little.read_u64(&bytes, 24).unwrap(), 24);
    }

    #[test]
    fn test_flush_32bit_field_relative() {
        let mut cursor = Cursor::new(vec![0u8; 8]);
        cursor.seek_to(8).unwrap();

        let mut table = StringTable::new();
        table.add("a", 4).unwrap();
        table.flush(&mut cursor, 0, PointerWidth::Bits32, Endian::Big).unwrap();

        let bytes = cursor.into_inner();
        assert_eq!(Endian::Big.read_u32(&bytes, 4).unwrap(), 4);
        assert_eq!(&bytes[8..10], b"a\0");
    }
}
