use std::io::{Read, Seek};

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::trace;

use super::header::ArchivePrefix;
use crate::config::{CodecConfig, Tag};
use crate::error::Result;
use crate::layout::{MIN_PROBE_LEN, archive};
use crate::stream::{ReadExt, SeekExt};

/// Container version classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
pub enum ContainerKind {
    /// Bare data node, no envelope
    #[strum(to_string = "legacy")]
    Legacy,
    /// Envelope followed by a sequence of nodes
    #[strum(to_string = "versioned")]
    Versioned,
    /// Archive prefix wrapping a legacy body
    #[strum(to_string = "archive-v1")]
    ArchiveV1,
    /// Archive prefix wrapping a versioned body
    #[strum(to_string = "archive-v2")]
    ArchiveV2,
    #[strum(to_string = "unrecognized")]
    Unrecognized,
}

impl ContainerKind {
    pub fn is_archive(self) -> bool {
        matches!(self, Self::ArchiveV1 | Self::ArchiveV2)
    }

    /// Layout of the container body once any archive prefix is skipped
    pub fn body(self) -> Self {
        match self {
            Self::ArchiveV1 => Self::Legacy,
            Self::ArchiveV2 => Self::Versioned,
            other => other,
        }
    }

    /// Bytes preceding the body
    pub fn prefix_len(self) -> usize {
        if self.is_archive() {
            archive::PREFIX_SIZE
        } else {
            0
        }
    }
}

/// Classify the container at the current stream position.
///
/// The stream position is restored before returning, whatever the outcome.
/// Fewer than [`MIN_PROBE_LEN`] available bytes yield `Unrecognized`.
pub fn sniff<R: Read + Seek>(stream: &mut R, config: &CodecConfig) -> Result<ContainerKind> {
    let start = stream.tell()?;
    let mut probe = [0u8; MIN_PROBE_LEN];
    let read = stream.read_up_to(&mut probe);
    stream.seek_to(start)?;
    let read = read?;

    let kind = classify(&probe[..read], config);
    trace!("Sniffed {} at {:#x} ({} probe bytes)", kind, start, read);
    Ok(kind)
}

/// Classify probe bytes (no I/O)
pub fn classify(probe: &[u8], config: &CodecConfig) -> ContainerKind {
    if probe.len() < MIN_PROBE_LEN {
        return ContainerKind::Unrecognized;
    }

    let magic = Tag::from_prefix(probe);
    if magic == Some(config.versioned_signature) {
        return ContainerKind::Versioned;
    }
    if magic == Some(config.archive_signature) {
        return match ArchivePrefix::parse(probe).map(|p| p.token) {
            Some(token) if token == config.archive_v1_token => ContainerKind::ArchiveV1,
            Some(token) if token == config.archive_v2_token => ContainerKind::ArchiveV2,
            _ => ContainerKind::Unrecognized,
        };
    }
    ContainerKind::Legacy
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sniff_bytes(bytes: &[u8]) -> (ContainerKind, u64) {
        let mut cursor = Cursor::new(bytes.to_vec());
        let kind = sniff(&mut cursor, &CodecConfig::default()).unwrap();
        (kind, cursor.tell().unwrap())
    }

    #[test]
    fn test_sniff_versioned() {
        let (kind, pos) = sniff_bytes(b"RLOC\x01\x00\x00\x08rest");
        assert_eq!(kind, ContainerKind::Versioned);
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_sniff_archive_generations() {
        assert_eq!(sniff_bytes(b"RARC001\0....").0, ContainerKind::ArchiveV1);
        assert_eq!(sniff_bytes(b"RARC002\0....").0, ContainerKind::ArchiveV2);
        assert_eq!(sniff_bytes(b"RARC003\0....").0, ContainerKind::Unrecognized);
    }

    #[test]
    fn test_sniff_defaults_to_legacy() {
        assert_eq!(sniff_bytes(b"DATA\x40\0\0\0").0, ContainerKind::Legacy);
    }

    #[test]
    fn test_sniff_short_stream_is_unrecognized() {
        // an unrelated 4-byte value followed by too few bytes
        let (kind, pos) = sniff_bytes(b"\xDE\xAD\xBE\xEF\x01\x02");
        assert_eq!(kind, ContainerKind::Unrecognized);
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_sniff_restores_mid_stream_position() {
        let mut cursor = Cursor::new(b"xxxxRLOC\x01\x00\x00\x08".to_vec());
        cursor.seek_to(4).unwrap();
        let kind = sniff(&mut cursor, &CodecConfig::default()).unwrap();
        assert_eq!(kind, ContainerKind::Versioned);
        assert_eq!(cursor.tell().unwrap(), 4);
    }

    #[test]
    fn test_sniff_uses_configured_signatures() {
        let config = CodecConfig {
            versioned_signature: Tag::new(*b"MDL2"),
            ..Default::default()
        };
        assert_eq!(classify(b"MDL2\0\0\0\0", &config), ContainerKind::Versioned);
        assert_eq!(classify(b"RLOC\0\0\0\0", &config), ContainerKind::Legacy);
    }

    #[test]
    fn test_kind_body() {
        assert_eq!(ContainerKind::ArchiveV1.body(), ContainerKind::Legacy);
        assert_eq!(ContainerKind::ArchiveV2.body(), ContainerKind::Versioned);
        assert_eq!(ContainerKind::ArchiveV2.prefix_len(), 8);
        assert_eq!(ContainerKind::Versioned.prefix_len(), 0);
        assert_eq!(ContainerKind::ArchiveV1.to_string(), "archive-v1");
        assert_eq!("archive-v2".parse::<ContainerKind>().unwrap(), ContainerKind::ArchiveV2);
    }
}
