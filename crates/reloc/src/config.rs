//! Codec configuration.
//!
//! Signature constants, archive generation tokens and legacy defaults are
//! carried in a [`CodecConfig`] value that callers pass to the detector and
//! to save/load, rather than living in shared statics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::endian::Endian;
use crate::error::{Error, Result};
use crate::offset::PointerWidth;

/// Fixed-length ASCII tag (signatures, archive tokens)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag<const N: usize>(pub [u8; N]);

/// 4-byte node or container signature
pub type Signature = Tag<4>;

/// 3-byte archive generation token
pub type ArchiveToken = Tag<3>;

impl<const N: usize> Tag<N> {
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Build a tag from the leading bytes of `bytes`
    pub fn from_prefix(bytes: &[u8]) -> Option<Self> {
        let prefix = bytes.get(..N)?;
        let mut tag = [0u8; N];
        tag.copy_from_slice(prefix);
        Some(Self(tag))
    }
}

impl<const N: usize> fmt::Display for Tag<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl<const N: usize> fmt::Debug for Tag<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", self.to_string())
    }
}

/// Serialized form: one char per byte, so control and high bytes survive
/// a JSON round trip (JSON escapes them as `\u00XX`).
impl<const N: usize> TryFrom<String> for Tag<N> {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let invalid = || {
            Error::InvalidConfig(format!(
                "tag {:?} must be exactly {} characters in U+0000..=U+00FF",
                value, N
            ))
        };
        let bytes = value
            .chars()
            .map(u8::try_from)
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| invalid())?;
        if bytes.len() != N {
            return Err(invalid());
        }
        Self::from_prefix(&bytes).ok_or_else(invalid)
    }
}

impl<const N: usize> From<Tag<N>> for String {
    fn from(tag: Tag<N>) -> Self {
        tag.0.iter().map(|&b| char::from(b)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Magic of the versioned multi-node envelope
    pub versioned_signature: Signature,
    /// Magic of archive-style containers
    pub archive_signature: Signature,
    /// Token following the archive magic for first-generation archives
    pub archive_v1_token: ArchiveToken,
    /// Token following the archive magic for second-generation archives
    pub archive_v2_token: ArchiveToken,
    /// Signature of the data node this codec understands
    pub data_signature: Signature,
    /// Version tag stamped into written envelopes
    pub version_tag: u16,
    /// Byte order assumed for legacy containers
    pub legacy_endian: Endian,
    /// Offset-field width assumed for legacy containers
    pub legacy_pointer_width: PointerWidth,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            versioned_signature: Tag::new(*b"RLOC"),
            archive_signature: Tag::new(*b"RARC"),
            archive_v1_token: Tag::new(*b"001"),
            archive_v2_token: Tag::new(*b"002"),
            data_signature: Tag::new(*b"DATA"),
            version_tag: 1,
            legacy_endian: Endian::Little,
            legacy_pointer_width: PointerWidth::Bits64,
        }
    }
}

impl CodecConfig {
    /// Parse and validate a JSON config
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the detector could not tell apart
    pub fn validate(&self) -> Result<()> {
        if self.versioned_signature == self.archive_signature {
            return Err(Error::InvalidConfig(format!(
                "versioned and archive signatures are both '{}'",
                self.versioned_signature
            )));
        }
        if self.archive_v1_token == self.archive_v2_token {
            return Err(Error::InvalidConfig(format!(
                "archive tokens are both '{}'",
                self.archive_v1_token
            )));
        }
        Ok(())
    }
}
