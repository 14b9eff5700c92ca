//! Load and save pipelines.
//!
//! Load: sniff, skip any archive prefix, locate the data node, read it into
//! one buffer, normalize byte order, then resolve offsets. Save runs the
//! mirror: byte order first, then un-fixup while collecting the offset and
//! string tables, then the tables are written and both headers patched.

use std::io::{Read, Seek, Write};

use serde::Serialize;
use tracing::{debug, trace};

use crate::buffer::NodeBuffer;
use crate::config::CodecConfig;
use crate::endian::{Endian, OffsetState, Swapper};
use crate::envelope::{
    ArchivePrefix, ContainerKind, DataNodeHeader, Envelope, NodeHeader, find_node, sniff,
};
use crate::error::{Error, Result};
use crate::fixup::{self, Region};
use crate::layout::{MIN_PROBE_LEN, TABLE_ALIGN, data_node};
use crate::offset::{OffsetTable, PointerWidth, decode};
use crate::schema::{Field, Schema};
use crate::stream::{ReadExt, SeekExt, WriteExt};
use crate::string_table::StringTable;

/// A loaded data node and what was learned about its container
#[derive(Debug, Clone)]
pub struct Loaded {
    pub kind: ContainerKind,
    /// Present for versioned bodies
    pub envelope: Option<Envelope>,
    pub endian: Endian,
    /// Data node header as stored
    pub header: DataNodeHeader,
    pub buffer: NodeBuffer,
}

/// Load the data node of the container at the current stream position.
pub fn load<S: Schema, R: Read + Seek>(stream: &mut R, config: &CodecConfig) -> Result<Loaded> {
    let kind = sniff(stream, config)?;
    if kind == ContainerKind::Unrecognized {
        let mut probe = [0u8; MIN_PROBE_LEN];
        let read = stream.read_up_to(&mut probe)?;
        return Err(Error::UnrecognizedSignature {
            found: probe[..read].to_vec(),
        });
    }
    if kind.is_archive() {
        ArchivePrefix::read(stream, config)?;
    }

    let (envelope, endian, width) = match kind.body() {
        ContainerKind::Versioned => {
            let envelope = Envelope::read(stream)?;
            find_node(stream, &envelope, config.data_signature)?;
            (Some(envelope), envelope.endian, envelope.pointer_width)
        }
        _ => (None, config.legacy_endian, config.legacy_pointer_width),
    };

    let start = stream.tell()?;
    let node = NodeHeader::read(stream, endian)?;
    if node.signature != config.data_signature {
        return Err(Error::UnrecognizedSignature {
            found: node.signature.as_bytes().to_vec(),
        });
    }
    stream.seek_to(start)?;

    let mut buffer = NodeBuffer::read_from::<S, _>(stream, node.size, width)?;
    let header = buffer.normalize_header(endian)?;
    let positions = decode(buffer.offset_table_bytes(), width);
    debug!(
        "Loading {} container: {} node bytes, {} offsets, {} string bytes",
        kind,
        node.size,
        positions.len(),
        header.string_table_size
    );

    if !endian.is_native()
        && let Some(swap) = S::endian_hook()
    {
        let mut swapper = buffer.swapper(OffsetState::Stored(endian));
        swap(&mut swapper, true)?;
        trace!("Swapped {} scalars", swapper.swapped_count());
    }
    buffer.resolve_offsets(&positions, endian)?;

    Ok(Loaded {
        kind,
        envelope,
        endian,
        header,
        buffer,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOptions {
    pub kind: ContainerKind,
    pub endian: Endian,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            kind: ContainerKind::Versioned,
            endian: Endian::NATIVE,
        }
    }
}

/// Summary of a save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub kind: ContainerKind,
    /// Bytes written, archive prefix included
    pub written: u64,
    pub node_size: u32,
    pub pointers: usize,
    pub strings: usize,
    pub string_references: usize,
    pub string_table_size: u32,
    pub offset_table_size: u32,
}

/// Save a resolved buffer as a container at the current stream position.
///
/// Offset fields come from the schema's enumeration hook when it has one,
/// otherwise from the fields the buffer recorded. The buffer is not
/// modified.
pub fn save<S: Schema, W: Write + Seek>(
    stream: &mut W,
    buffer: &NodeBuffer,
    config: &CodecConfig,
    options: &SaveOptions,
) -> Result<SaveReport> {
    if !buffer.is_resolved() {
        return Err(Error::OffsetsNotResolved);
    }
    let width = buffer.width();
    let endian = options.endian;
    check_target(config, options, width)?;

    let mut fields = match S::offset_hook() {
        Some(enumerate) => {
            let mut fields = Vec::new();
            enumerate(buffer, &mut fields)?;
            fields
        }
        None => buffer.fields().to_vec(),
    };
    fields.sort_unstable_by_key(|f| f.position());
    fields.dedup_by_key(|f| f.position());

    let origin = buffer.origin();
    let payload_len = buffer.payload().len();
    let mut scratch = buffer.as_bytes()[..origin + payload_len].to_vec();

    let region = Region {
        origin,
        fields_end: payload_len,
        targets_end: payload_len,
        width,
    };

    let mut strings = StringTable::new();
    let mut pointers = Vec::new();
    let mut points_at_end = false;
    let mut table = OffsetTable::new(width);
    for field in &fields {
        let position = field.position();
        match field {
            Field::String(_) => {
                let at = region.check_field(position)?;
                strings.add(buffer.str_at(position as usize)?, position)?;
                table.push(position);
                scratch[at..at + width.bytes()].fill(0);
            }
            Field::Pointer(_) => {
                let at = region.check_field(position)?;
                let target = Endian::NATIVE.read_uint(&scratch, at, width.bytes())?;
                points_at_end |= target == (origin + payload_len) as u64;
                pointers.push(position);
            }
        }
    }
    let string_count = strings.len();
    let string_references = fields.iter().filter(|f| f.is_string()).count();

    if !endian.is_native()
        && let Some(swap) = S::endian_hook()
    {
        let mut swapper = Swapper::new(&mut scratch, origin, width, OffsetState::Resolved);
        swap(&mut swapper, false)?;
    }

    fixup::unresolve(&mut scratch, region, &pointers, endian, &mut table)?;
    let offset_table = table.finish()?;

    let start = stream.tell()?;
    let token = match options.kind {
        ContainerKind::ArchiveV1 => Some(config.archive_v1_token),
        ContainerKind::ArchiveV2 => Some(config.archive_v2_token),
        _ => None,
    };
    if let Some(token) = token {
        ArchivePrefix {
            signature: config.archive_signature,
            token,
        }
        .write(stream)?;
    }

    let mut envelope = match options.kind.body() {
        ContainerKind::Versioned => {
            let envelope_start = stream.tell()?;
            let envelope = Envelope::new(config, endian, width);
            envelope.write(stream)?;
            Some((envelope_start, envelope))
        }
        _ => None,
    };

    let node_start = stream.tell()?;
    stream.write_all(&[0u8; data_node::HEADER_SIZE])?;
    let origin_pos = stream.tell()?;
    stream.write_all(&scratch[origin..])?;
    stream.pad_to(origin_pos, TABLE_ALIGN as u64)?;
    // keep end-of-payload pointers out of the string table range
    if points_at_end && string_count > 0 && stream.tell()? - origin_pos == payload_len as u64 {
        stream.write_all(&[0u8; TABLE_ALIGN])?;
    }

    let string_table_offset = stream.tell()? - origin_pos;
    let string_table_size = strings.flush(stream, origin_pos, width, endian)?;
    stream.write_all(&offset_table)?;
    let end = stream.tell()?;

    let node_size = to_u32(end - node_start)?;
    let header = DataNodeHeader {
        node: NodeHeader {
            signature: config.data_signature,
            size: node_size,
        },
        string_table_offset: if string_table_size > 0 {
            to_u32(string_table_offset)?
        } else {
            0
        },
        string_table_size: to_u32(string_table_size)?,
        offset_table_size: to_u32(offset_table.len() as u64)?,
    };
    stream.seek_to(node_start)?;
    stream.write_all(&header.to_bytes(endian))?;
    stream.seek_to(end)?;

    if let Some((envelope_start, envelope)) = envelope.as_mut() {
        let total = to_u32(end - *envelope_start)?;
        envelope.patch_total_size(stream, *envelope_start, total)?;
    }

    debug!(
        "Saved {} container: {} node bytes, {} pointers, {} strings",
        options.kind,
        node_size,
        pointers.len(),
        string_count
    );

    Ok(SaveReport {
        kind: options.kind,
        written: end - start,
        node_size,
        pointers: pointers.len(),
        strings: string_count,
        string_references,
        string_table_size: header.string_table_size,
        offset_table_size: header.offset_table_size,
    })
}

/// Legacy bodies carry no envelope, so they must match the configured
/// legacy byte order and width to be loadable again.
fn check_target(config: &CodecConfig, options: &SaveOptions, width: PointerWidth) -> Result<()> {
    match options.kind.body() {
        ContainerKind::Unrecognized => Err(Error::InvalidConfig(
            "cannot save an unrecognized container kind".to_string(),
        )),
        ContainerKind::Legacy
            if options.endian != config.legacy_endian || width != config.legacy_pointer_width =>
        {
            Err(Error::InvalidConfig(format!(
                "legacy containers are {}-endian {}-bit, got {}-endian {}-bit",
                config.legacy_endian, config.legacy_pointer_width, options.endian, width
            )))
        }
        _ => Ok(()),
    }
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::OutOfBoundsOffset {
        position: 0,
        value,
        limit: u64::from(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PayloadBuilder;
    use crate::schema::Raw;
    use std::io::Cursor;

    fn sample(width: PointerWidth) -> NodeBuffer {
        let mut builder = PayloadBuilder::new(width);
        builder.push_u32(0x1234);
        let link = builder.push_offset(0);
        builder.push_string("name");
        let target = builder.push_u32(99);
        builder.set_offset(link, target).unwrap();
        builder.finish::<Raw>().unwrap()
    }

    #[test]
    fn test_save_load_versioned() {
        let buffer = sample(PointerWidth::Bits64);
        let config = CodecConfig::default();
        let mut cursor = Cursor::new(Vec::new());
        let report = save::<Raw, _>(&mut cursor, &buffer, &config, &SaveOptions::default()).unwrap();
        assert_eq!(report.pointers, 1);
        assert_eq!(report.strings, 1);
        assert_eq!(report.written, cursor.get_ref().len() as u64);

        cursor.seek_to(0).unwrap();
        let loaded = load::<Raw, _>(&mut cursor, &config).unwrap();
        assert_eq!(loaded.kind, ContainerKind::Versioned);
        assert_eq!(loaded.envelope.unwrap().total_size as u64, report.written);
        assert_eq!(loaded.buffer.u32_at(0).unwrap(), 0x1234);
        assert_eq!(loaded.buffer.deref(8).unwrap(), 24);
        assert_eq!(loaded.buffer.str_at(16).unwrap(), "name");
        assert_eq!(loaded.buffer.fields(), buffer.fields());
    }

    #[test]
    fn test_save_leaves_buffer_untouched() {
        let buffer = sample(PointerWidth::Bits32);
        let before = buffer.clone();
        let config = CodecConfig::default();
        let options = SaveOptions {
            kind: ContainerKind::ArchiveV2,
            endian: Endian::Big,
        };
        save::<Raw, _>(&mut Cursor::new(Vec::new()), &buffer, &config, &options).unwrap();
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_legacy_save_must_match_config() {
        let buffer = sample(PointerWidth::Bits32);
        let options = SaveOptions {
            kind: ContainerKind::Legacy,
            endian: Endian::Little,
        };
        assert!(matches!(
            save::<Raw, _>(
                &mut Cursor::new(Vec::new()),
                &buffer,
                &CodecConfig::default(),
                &options
            ),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_unrecognized() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        assert!(matches!(
            load::<Raw, _>(&mut cursor, &CodecConfig::default()),
            Err(Error::UnrecognizedSignature { found }) if found == vec![1, 2, 3]
        ));
    }

    #[test]
    fn test_load_wrong_data_signature() {
        let mut cursor = Cursor::new(b"JUNKJUNKJUNKJUNK".to_vec());
        assert!(matches!(
            load::<Raw, _>(&mut cursor, &CodecConfig::default()),
            Err(Error::UnrecognizedSignature { found }) if found == b"JUNK".to_vec()
        ));
    }
}
