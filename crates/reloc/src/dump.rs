use std::io::{Read, Seek};

use serde::Serialize;

use crate::config::CodecConfig;
use crate::endian::Endian;
use crate::envelope::{
    ArchivePrefix, ContainerKind, DataNodeHeader, Envelope, NodeHeader, NodeLocation, list_nodes,
    sniff,
};
use crate::error::Result;
use crate::layout::data_node;
use crate::offset::{Entries, PointerWidth, Tier};
use crate::stream::{ReadExt, SeekExt};

/// Bytes of payload sampled into a dump
const PAYLOAD_SAMPLE_LEN: usize = 32;

/// Container structure for diagnostic purposes.
///
/// Built from the stored bytes only: nothing is swapped or resolved, so
/// containers that fail to load can still be inspected.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerDump {
    pub kind: ContainerKind,
    pub archive: Option<ArchivePrefix>,
    pub envelope: Option<Envelope>,
    pub nodes: Vec<NodeLocation>,
    pub data_node: Option<DataNodeDump>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataNodeDump {
    pub offset: u64,
    pub endian: Endian,
    pub pointer_width: PointerWidth,
    pub header: DataNodeHeader,
    /// Whether the header passed validation
    pub valid: bool,
    pub tiers: TierStats,
    pub offsets: Vec<u64>,
    pub strings: Vec<String>,
    pub payload_sample: String,
}

/// Offset table entries per encoding tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub bits6: usize,
    pub bits14: usize,
    pub bits30: usize,
    /// Encoded bytes consumed, padding excluded
    pub bytes: usize,
}

impl TierStats {
    pub fn from_table(bytes: &[u8], width: PointerWidth) -> (Self, Vec<u64>) {
        let mut stats = Self::default();
        let mut entries = Entries::new(bytes, width);
        let mut positions = Vec::new();
        for entry in entries.by_ref() {
            match entry.tier {
                Tier::Bits6 => stats.bits6 += 1,
                Tier::Bits14 => stats.bits14 += 1,
                Tier::Bits30 => stats.bits30 += 1,
            }
            positions.push(entry.position);
        }
        stats.bytes = entries.consumed();
        (stats, positions)
    }

    pub fn total(&self) -> usize {
        self.bits6 + self.bits14 + self.bits30
    }
}

impl ContainerDump {
    /// Inspect the container at the current stream position
    pub fn inspect<R: Read + Seek>(stream: &mut R, config: &CodecConfig) -> Result<Self> {
        let kind = sniff(stream, config)?;
        let mut dump = Self {
            kind,
            archive: None,
            envelope: None,
            nodes: Vec::new(),
            data_node: None,
        };
        if kind == ContainerKind::Unrecognized {
            return Ok(dump);
        }
        if kind.is_archive() {
            dump.archive = ArchivePrefix::read(stream, config)?;
        }

        let (endian, width) = match kind.body() {
            ContainerKind::Versioned => {
                let envelope = Envelope::read(stream)?;
                dump.nodes = list_nodes(stream, &envelope)?;
                dump.envelope = Some(envelope);
                (envelope.endian, envelope.pointer_width)
            }
            _ => {
                let offset = stream.tell()?;
                let header = NodeHeader::read(stream, config.legacy_endian)?;
                dump.nodes = vec![NodeLocation { offset, header }];
                (config.legacy_endian, config.legacy_pointer_width)
            }
        };

        let data = dump
            .nodes
            .iter()
            .find(|n| n.header.signature == config.data_signature)
            .copied();
        if let Some(location) = data {
            dump.data_node = Some(DataNodeDump::read(stream, location, endian, width)?);
        }
        Ok(dump)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl DataNodeDump {
    fn read<R: Read + Seek>(
        stream: &mut R,
        location: NodeLocation,
        endian: Endian,
        pointer_width: PointerWidth,
    ) -> Result<Self> {
        stream.seek_to(location.offset)?;
        let size = (location.header.size as usize).max(data_node::HEADER_SIZE);
        let bytes = stream.read_vec(size)?;

        let header = DataNodeHeader::parse(&bytes, endian)?;
        let valid = header.validate().is_ok();
        let body = &bytes[data_node::HEADER_SIZE..];

        let (tiers, offsets, strings) = if valid {
            let (tiers, offsets) =
                TierStats::from_table(&body[header.offset_table_start()..], pointer_width);
            (tiers, offsets, split_strings(&body[header.string_table()]))
        } else {
            (TierStats::default(), Vec::new(), Vec::new())
        };

        let sample_end = body.len().min(PAYLOAD_SAMPLE_LEN);
        Ok(Self {
            offset: location.offset,
            endian,
            pointer_width,
            header,
            valid,
            tiers,
            offsets,
            strings,
            payload_sample: body[..sample_end]
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" "),
        })
    }
}

/// Split a raw string table into its NUL-terminated entries
fn split_strings(table: &[u8]) -> Vec<String> {
    let mut strings = Vec::new();
    let mut rest = table;
    while let Some(nul) = memchr::memchr(0, rest) {
        strings.push(String::from_utf8_lossy(&rest[..nul]).into_owned());
        rest = &rest[nul + 1..];
    }
    strings
}
