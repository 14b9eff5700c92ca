use std::io::{Read, Seek, Write};
use std::ops::Range;

use serde::Serialize;

use crate::config::{ArchiveToken, CodecConfig, Signature, Tag};
use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::layout::{archive, data_node, envelope, node};
use crate::offset::PointerWidth;
use crate::stream::{ReadExt, SeekExt};

/// Outermost header of a versioned container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub signature: Signature,
    pub version: u16,
    pub endian: Endian,
    pub pointer_width: PointerWidth,
    /// Container size in bytes, envelope included
    pub total_size: u32,
    pub node_count: u32,
}

impl Envelope {
    /// Envelope for a new single-node container; `total_size` is patched later.
    pub fn new(config: &CodecConfig, endian: Endian, pointer_width: PointerWidth) -> Self {
        Self {
            signature: config.versioned_signature,
            version: config.version_tag,
            endian,
            pointer_width,
            total_size: 0,
            node_count: 1,
        }
    }

    pub fn parse(bytes: &[u8; envelope::SIZE]) -> Result<Self> {
        let unrecognized = || Error::UnrecognizedSignature {
            found: bytes.to_vec(),
        };
        let endian = Endian::from_flag(bytes[envelope::ENDIAN]).ok_or_else(unrecognized)?;
        let pointer_width =
            PointerWidth::from_bytes(bytes[envelope::POINTER_WIDTH]).ok_or_else(unrecognized)?;

        Ok(Self {
            signature: Tag::from_prefix(bytes).ok_or_else(unrecognized)?,
            version: endian.read_u16(bytes, envelope::VERSION)?,
            endian,
            pointer_width,
            total_size: endian.read_u32(bytes, envelope::TOTAL_SIZE)?,
            node_count: endian.read_u32(bytes, envelope::NODE_COUNT)?,
        })
    }

    pub fn read<R: Read + Seek>(stream: &mut R) -> Result<Self> {
        let bytes: [u8; envelope::SIZE] = stream.read_array()?;
        Self::parse(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; envelope::SIZE] {
        let mut bytes = [0u8; envelope::SIZE];
        let e = self.endian;
        bytes[envelope::SIGNATURE..envelope::SIGNATURE + 4].copy_from_slice(self.signature.as_bytes());
        bytes[envelope::VERSION..envelope::VERSION + 2].copy_from_slice(&e.u16_bytes(self.version));
        bytes[envelope::ENDIAN] = e.flag();
        bytes[envelope::POINTER_WIDTH] = self.pointer_width.bytes() as u8;
        bytes[envelope::TOTAL_SIZE..envelope::TOTAL_SIZE + 4]
            .copy_from_slice(&e.u32_bytes(self.total_size));
        bytes[envelope::NODE_COUNT..envelope::NODE_COUNT + 4]
            .copy_from_slice(&e.u32_bytes(self.node_count));
        bytes
    }

    pub fn write<W: Write>(&self, stream: &mut W) -> Result<()> {
        stream.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Rewrite the total size field of an envelope already written at
    /// `start`, leaving the stream where it was.
    pub fn patch_total_size<W: Write + Seek>(
        &mut self,
        stream: &mut W,
        start: u64,
        total_size: u32,
    ) -> Result<()> {
        self.total_size = total_size;
        let resume = stream.tell()?;
        stream.seek_to(start + envelope::TOTAL_SIZE as u64)?;
        stream.write_all(&self.endian.u32_bytes(total_size))?;
        stream.seek_to(resume)?;
        Ok(())
    }
}

/// Signature + declared size heading every node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeHeader {
    pub signature: Signature,
    /// Node size in bytes, header included
    pub size: u32,
}

impl NodeHeader {
    pub fn parse(bytes: &[u8], endian: Endian) -> Result<Self> {
        let signature = Tag::from_prefix(bytes).ok_or(Error::TruncatedInput {
            position: 0,
            need: node::HEADER_SIZE,
            have: bytes.len(),
        })?;
        Ok(Self {
            signature,
            size: endian.read_u32(bytes, node::SIZE_FIELD)?,
        })
    }

    pub fn read<R: Read + Seek>(stream: &mut R, endian: Endian) -> Result<Self> {
        let bytes: [u8; node::HEADER_SIZE] = stream.read_array()?;
        Self::parse(&bytes, endian)
    }

    pub fn to_bytes(&self, endian: Endian) -> [u8; node::HEADER_SIZE] {
        let mut bytes = [0u8; node::HEADER_SIZE];
        bytes[node::SIGNATURE..node::SIGNATURE + 4].copy_from_slice(self.signature.as_bytes());
        bytes[node::SIZE_FIELD..node::SIZE_FIELD + 4].copy_from_slice(&endian.u32_bytes(self.size));
        bytes
    }

    pub fn write<W: Write>(&self, stream: &mut W, endian: Endian) -> Result<()> {
        stream.write_all(&self.to_bytes(endian))?;
        Ok(())
    }

    /// Bytes following the header; fails when the declared size cannot even
    /// hold the header itself.
    pub fn body_len(&self) -> Result<u64> {
        u64::from(self.size)
            .checked_sub(node::HEADER_SIZE as u64)
            .ok_or(Error::UndersizedDeclaration {
                declared: u64::from(self.size),
                minimum: node::HEADER_SIZE as u64,
            })
    }
}

/// Header of the data node: node header plus side-table bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataNodeHeader {
    pub node: NodeHeader,
    /// String table start, relative to origin
    pub string_table_offset: u32,
    pub string_table_size: u32,
    pub offset_table_size: u32,
}

impl DataNodeHeader {
    pub fn parse(bytes: &[u8], endian: Endian) -> Result<Self> {
        Ok(Self {
            node: NodeHeader::parse(bytes, endian)?,
            string_table_offset: endian.read_u32(bytes, data_node::STRING_TABLE_OFFSET)?,
            string_table_size: endian.read_u32(bytes, data_node::STRING_TABLE_SIZE)?,
            offset_table_size: endian.read_u32(bytes, data_node::OFFSET_TABLE_SIZE)?,
        })
    }

    /// Write the header into the first bytes of `buf`; the reserved region
    /// is zeroed.
    pub fn write_into(&self, buf: &mut [u8], endian: Endian) -> Result<()> {
        let have = buf.len();
        let head = buf
            .get_mut(..data_node::HEADER_SIZE)
            .ok_or(Error::TruncatedInput {
                position: 0,
                need: data_node::HEADER_SIZE,
                have,
            })?;
        head[..node::HEADER_SIZE].copy_from_slice(&self.node.to_bytes(endian));
        endian.write_u32(head, data_node::STRING_TABLE_OFFSET, self.string_table_offset)?;
        endian.write_u32(head, data_node::STRING_TABLE_SIZE, self.string_table_size)?;
        endian.write_u32(head, data_node::OFFSET_TABLE_SIZE, self.offset_table_size)?;
        head[data_node::RESERVED..].fill(0);
        Ok(())
    }

    pub fn to_bytes(&self, endian: Endian) -> [u8; data_node::HEADER_SIZE] {
        let mut bytes = [0u8; data_node::HEADER_SIZE];
        // the array is exactly one header long
        let _ = self.write_into(&mut bytes, endian);
        bytes
    }

    /// Check that both side tables sit inside the node, string table strictly
    /// after payload start and before the offset table.
    pub fn validate(&self) -> Result<()> {
        let size = u64::from(self.node.size);
        let minimum = data_node::HEADER_SIZE as u64;
        if size < minimum {
            return Err(Error::UndersizedDeclaration {
                declared: size,
                minimum,
            });
        }

        let body = size - minimum;
        let offset_table = u64::from(self.offset_table_size);
        if offset_table > body {
            return Err(Error::OutOfBoundsOffset {
                position: data_node::OFFSET_TABLE_SIZE as u64,
                value: offset_table,
                limit: body,
            });
        }

        let tables_start = body - offset_table;
        if self.string_table_size > 0 {
            let start = u64::from(self.string_table_offset);
            let end = start + u64::from(self.string_table_size);
            if start == 0 || end > tables_start {
                return Err(Error::OutOfBoundsOffset {
                    position: data_node::STRING_TABLE_OFFSET as u64,
                    value: start,
                    limit: tables_start,
                });
            }
        }
        Ok(())
    }

    /// Origin-relative start of the offset table
    pub fn offset_table_start(&self) -> usize {
        (self.node.size as usize)
            .saturating_sub(data_node::HEADER_SIZE)
            .saturating_sub(self.offset_table_size as usize)
    }

    /// Origin-relative payload length: everything before the string table
    /// (or before the offset table when there are no strings).
    pub fn payload_len(&self) -> usize {
        if self.string_table_size > 0 {
            self.string_table_offset as usize
        } else {
            self.offset_table_start()
        }
    }

    /// Origin-relative string table range
    pub fn string_table(&self) -> Range<usize> {
        let start = self.payload_len();
        start..start + self.string_table_size as usize
    }
}

/// Prefix of archive-style containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchivePrefix {
    pub signature: Signature,
    pub token: ArchiveToken,
}

impl ArchivePrefix {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            signature: Tag::from_prefix(bytes)?,
            token: Tag::from_prefix(bytes.get(archive::TOKEN..)?)?,
        })
    }

    /// Read a prefix; `None` when the bytes are not an archive prefix at all
    pub fn read<R: Read + Seek>(stream: &mut R, config: &CodecConfig) -> Result<Option<Self>> {
        let bytes: [u8; archive::PREFIX_SIZE] = stream.read_array()?;
        Ok(Self::parse(&bytes).filter(|p| p.signature == config.archive_signature))
    }

    pub fn to_bytes(&self) -> [u8; archive::PREFIX_SIZE] {
        let mut bytes = [0u8; archive::PREFIX_SIZE];
        bytes[archive::SIGNATURE..archive::SIGNATURE + 4].copy_from_slice(self.signature.as_bytes());
        bytes[archive::TOKEN..archive::TOKEN + archive::TOKEN_LEN]
            .copy_from_slice(self.token.as_bytes());
        bytes
    }

    pub fn write<W: Write>(&self, stream: &mut W) -> Result<()> {
        stream.write_all(&self.to_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn data_header(size: u32, st_off: u32, st_size: u32, ot_size: u32) -> DataNodeHeader {
        DataNodeHeader {
            node: NodeHeader {
                signature: Tag::new(*b"DATA"),
                size,
            },
            string_table_offset: st_off,
            string_table_size: st_size,
            offset_table_size: ot_size,
        }
    }

    #[test]
    fn test_envelope_byte_layout() {
        let mut env = Envelope::new(&CodecConfig::default(), Endian::Big, PointerWidth::Bits32);
        env.total_size = 0x0102_0304;
        let bytes = env.to_bytes();
        assert_eq!(&bytes[0..4], b"RLOC");
        assert_eq!(bytes[4..6], [0, 1]);
        assert_eq!(bytes[6], 1);
        assert_eq!(bytes[7], 4);
        assert_eq!(bytes[8..12], [1, 2, 3, 4]);
        assert_eq!(bytes[12..16], [0, 0, 0, 1]);
        assert_eq!(Envelope::parse(&bytes).unwrap(), env);
    }

    #[test]
    fn test_envelope_rejects_bad_flags() {
        let mut bytes = Envelope::new(&CodecConfig::default(), Endian::Little, PointerWidth::Bits64)
            .to_bytes();
        bytes[envelope::POINTER_WIDTH] = 6;
        assert!(matches!(
            Envelope::parse(&bytes),
            Err(Error::UnrecognizedSignature { .. })
        ));
    }

    #[test]
    fn test_patch_total_size_restores_position() {
        let mut env = Envelope::new(&CodecConfig::default(), Endian::Little, PointerWidth::Bits64);
        let mut cursor = Cursor::new(Vec::new());
        env.write(&mut cursor).unwrap();
        cursor.write_all(&[0xEE; 4]).unwrap();

        env.patch_total_size(&mut cursor, 0, 20).unwrap();
        assert_eq!(cursor.tell().unwrap(), 20);
        assert_eq!(env.total_size, 20);

        let bytes = cursor.into_inner();
        assert_eq!(bytes[8..12], [20, 0, 0, 0]);
        assert_eq!(bytes[16..], [0xEE; 4]);
    }

    #[test]
    fn test_node_header_body_len() {
        let header = NodeHeader {
            signature: Tag::new(*b"MISC"),
            size: 4,
        };
        assert!(matches!(
            header.body_len(),
            Err(Error::UndersizedDeclaration { declared: 4, minimum: 8 })
        ));
        let header = NodeHeader { size: 24, ..header };
        assert_eq!(header.body_len().unwrap(), 16);
    }

    #[test]
    fn test_data_header_roundtrip() {
        let header = data_header(96, 16, 20, 8);
        let bytes = header.to_bytes(Endian::Little);
        assert_eq!(&bytes[0..4], b"DATA");
        assert_eq!(bytes[8..12], [16, 0, 0, 0]);
        assert!(bytes[data_node::RESERVED..].iter().all(|&b| b == 0));
        assert_eq!(DataNodeHeader::parse(&bytes, Endian::Little).unwrap(), header);
    }

    #[test]
    fn test_data_header_write_into_short_buffer() {
        let header = data_header(96, 16, 20, 8);
        let mut short = [0xFFu8; 20];
        assert!(matches!(
            header.write_into(&mut short, Endian::Big),
            Err(Error::TruncatedInput { need: 32, have: 20, .. })
        ));
        assert!(short.iter().all(|&b| b == 0xFF));

        let mut long = [0xFFu8; 40];
        header.write_into(&mut long, Endian::Big).unwrap();
        assert_eq!(DataNodeHeader::parse(&long, Endian::Big).unwrap(), header);
        assert_eq!(long[32..], [0xFF; 8]);
    }

    #[test]
    fn test_data_header_validation() {
        // 96-byte node: 64 body bytes, offset table in the last 8
        assert!(data_header(96, 16, 20, 8).validate().is_ok());
        assert_eq!(data_header(96, 16, 20, 8).payload_len(), 16);
        assert_eq!(data_header(96, 16, 20, 8).offset_table_start(), 56);
        assert_eq!(data_header(96, 0, 0, 8).payload_len(), 56);

        // string table starting at origin
        assert!(data_header(96, 0, 4, 8).validate().is_err());
        // string table running into the offset table
        assert!(data_header(96, 40, 20, 8).validate().is_err());
        // offset table bigger than the node body
        assert!(data_header(96, 0, 0, 80).validate().is_err());
        assert!(matches!(
            data_header(16, 0, 0, 0).validate(),
            Err(Error::UndersizedDeclaration { .. })
        ));
    }

    #[test]
    fn test_archive_prefix_layout() {
        let prefix = ArchivePrefix {
            signature: Tag::new(*b"RARC"),
            token: Tag::new(*b"002"),
        };
        let bytes = prefix.to_bytes();
        assert_eq!(&bytes, b"RARC002\0");
        assert_eq!(ArchivePrefix::parse(&bytes), Some(prefix));
        assert_eq!(ArchivePrefix::parse(b"RARC0"), None);

        let config = CodecConfig::default();
        let mut cursor = Cursor::new(bytes.to_vec());
        assert_eq!(ArchivePrefix::read(&mut cursor, &config).unwrap(), Some(prefix));
        let mut cursor = Cursor::new(b"RLOC002\0".to_vec());
        assert_eq!(ArchivePrefix::read(&mut cursor, &config).unwrap(), None);
    }
}
