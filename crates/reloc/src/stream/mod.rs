//! Stream contract used by the codec.
//!
//! The codec consumes plain `std::io::{Read, Write, Seek}` streams. These
//! extension traits add the `tell`/`seek` vocabulary and exact reads that
//! report short input as [`Error::TruncatedInput`].

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Position queries and absolute seeks
pub trait SeekExt: Seek {
    /// Current stream position
    fn tell(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    /// Seek to an absolute position
    fn seek_to(&mut self, position: u64) -> Result<()> {
        self.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Bytes between the current position and the end; the position is kept
    fn remaining(&mut self) -> Result<u64> {
        let position = self.tell()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek_to(position)?;
        Ok(end.saturating_sub(position))
    }
}

impl<S: Seek + ?Sized> SeekExt for S {}

/// Reads that never run past the available input
pub trait ReadExt: Read + Seek {
    /// Read as many bytes as are available, up to `buf.len()`.
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Fill `buf` completely or fail with `TruncatedInput`.
    fn read_fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let position = self.tell()?;
        let have = self.read_up_to(buf)?;
        if have < buf.len() {
            return Err(Error::TruncatedInput {
                position,
                need: buf.len(),
                have,
            });
        }
        Ok(())
    }

    /// Read exactly `len` bytes into a new buffer. Short input fails with
    /// `TruncatedInput` before anything is allocated or consumed.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let position = self.tell()?;
        let available = self.remaining()?;
        if available < len as u64 {
            return Err(Error::TruncatedInput {
                position,
                need: len,
                have: available as usize,
            });
        }
        let mut buf = vec![0u8; len];
        self.read_fill(&mut buf)?;
        Ok(buf)
    }

    /// Read a fixed-size array
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_fill(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read + Seek + ?Sized> ReadExt for R {}

/// Alignment padding on the write side
pub trait WriteExt: Write + Seek {
    /// Write zero bytes until `(position - base)` is a multiple of `align`.
    /// Returns the number of padding bytes written.
    fn pad_to(&mut self, base: u64, align: u64) -> Result<usize> {
        if align <= 1 {
            return Ok(0);
        }
        let position = self.tell()?;
        let rem = position.saturating_sub(base) % align;
        if rem == 0 {
            return Ok(0);
        }
        let pad = (align - rem) as usize;
        self.write_all(&vec![0u8; pad])?;
        Ok(pad)
    }
}

impl<W: Write + Seek + ?Sized> WriteExt for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_fill_reports_truncation() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        cursor.seek_to(1).unwrap();
        let mut buf = [0u8; 4];
        match cursor.read_fill(&mut buf) {
            Err(Error::TruncatedInput {
                position,
                need,
                have,
            }) => {
                assert_eq!(position, 1);
                assert_eq!(need, 4);
                assert_eq!(have, 2);
            }
            other => panic!("expected TruncatedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_read_array() {
        let mut cursor = Cursor::new(b"RLOC".to_vec());
        let magic: [u8; 4] = cursor.read_array().unwrap();
        assert_eq!(&magic, b"RLOC");
        assert_eq!(cursor.tell().unwrap(), 4);
    }

    #[test]
    fn test_pad_to() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(&[0xAA; 5]).unwrap();
        assert_eq!(cursor.pad_to(0, 4).unwrap(), 3);
        assert_eq!(cursor.pad_to(0, 4).unwrap(), 0);
        assert_eq!(cursor.pad_to(1, 4).unwrap(), 1);
        assert_eq!(cursor.into_inner().len(), 9);
    }

    #[test]
    fn test_pad_to_wide_alignment() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(&[0xAA; 3]).unwrap();
        assert_eq!(cursor.pad_to(0, 16).unwrap(), 13);
        assert_eq!(cursor.pad_to(0, 0).unwrap(), 0);
        assert_eq!(cursor.into_inner().len(), 16);
    }

    #[test]
    fn test_read_vec_checks_length_first() {
        let mut cursor = Cursor::new(vec![7u8; 32]);
        cursor.seek_to(4).unwrap();
        assert!(matches!(
            cursor.read_vec(0xF000_0000),
            Err(Error::TruncatedInput { position: 4, need: 0xF000_0000, have: 28 })
        ));
        assert_eq!(cursor.tell().unwrap(), 4);

        assert_eq!(cursor.read_vec(28).unwrap(), vec![7u8; 28]);
        assert_eq!(cursor.remaining().unwrap(), 0);
    }
}
