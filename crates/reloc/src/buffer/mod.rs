//! Node allocator.
//!
//! A [`NodeBuffer`] owns one contiguous allocation holding the data node
//! header, the payload and the trailing tables. Positions handed to its
//! accessors are relative to the origin (first payload byte). Header
//! fields inside the buffer are kept in host byte order.

mod builder;

use std::io::{Read, Seek};

use memchr::memchr;
use tracing::trace;

use crate::endian::{Endian, OffsetState, Swapper};
use crate::envelope::DataNodeHeader;
use crate::error::{Error, Result};
use crate::fixup::{self, Region};
use crate::layout::{data_node, node};
use crate::offset::PointerWidth;
use crate::schema::{Field, Schema};
use crate::stream::ReadExt;

pub use builder::PayloadBuilder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBuffer {
    bytes: Vec<u8>,
    width: PointerWidth,
    /// Origin-relative end of the payload
    payload_len: usize,
    /// Origin-relative end of the string table (start of the offset table)
    tables_end: usize,
    resolved: bool,
    fields: Vec<Field>,
}

macro_rules! scalar_accessors {
    ($get:ident, $set:ident, $ty:ty, $read:ident, $write:ident) => {
        pub fn $get(&self, at: usize) -> Result<$ty> {
            Endian::NATIVE.$read(&self.bytes, self.absolute(at)?)
        }

        pub fn $set(&mut self, at: usize, value: $ty) -> Result<()> {
            let at = self.absolute(at)?;
            Endian::NATIVE.$write(&mut self.bytes, at, value)
        }
    };
}

impl NodeBuffer {
    /// Allocate a node of `declared_size` bytes holding the schema default.
    pub fn create<S: Schema>(declared_size: u32, width: PointerWidth) -> Result<Self> {
        let mut buffer = Self::allocate::<S>(declared_size, width)?;
        S::init_default(&mut buffer.bytes[data_node::HEADER_SIZE..]);
        Endian::NATIVE.write_u32(&mut buffer.bytes, node::SIZE_FIELD, declared_size)?;
        // nothing stored yet, so nothing to fix up
        buffer.resolved = true;
        Ok(buffer)
    }

    /// Allocate a node of `declared_size` bytes and fill it from `stream`,
    /// which must sit on the node header. Header fields and offsets are
    /// left exactly as stored. A stream shorter than the declaration fails
    /// before the node is allocated.
    pub fn read_from<S: Schema, R: Read + Seek>(
        stream: &mut R,
        declared_size: u32,
        width: PointerWidth,
    ) -> Result<Self> {
        Self::check_declared::<S>(declared_size)?;
        let bytes = stream.read_vec(declared_size as usize)?;
        trace!("Read {} node bytes", declared_size);
        Ok(Self::with_bytes(bytes, width))
    }

    fn allocate<S: Schema>(declared_size: u32, width: PointerWidth) -> Result<Self> {
        Self::check_declared::<S>(declared_size)?;
        Ok(Self::with_bytes(vec![0u8; declared_size as usize], width))
    }

    fn check_declared<S: Schema>(declared_size: u32) -> Result<()> {
        let minimum = (data_node::HEADER_SIZE + S::MIN_PAYLOAD_SIZE) as u64;
        if u64::from(declared_size) < minimum {
            return Err(Error::UndersizedDeclaration {
                declared: u64::from(declared_size),
                minimum,
            });
        }
        Ok(())
    }

    fn with_bytes(bytes: Vec<u8>, width: PointerWidth) -> Self {
        let payload_len = bytes.len() - data_node::HEADER_SIZE;
        Self {
            bytes,
            width,
            payload_len,
            tables_end: payload_len,
            resolved: false,
            fields: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        bytes: Vec<u8>,
        width: PointerWidth,
        payload_len: usize,
        fields: Vec<Field>,
    ) -> Self {
        let tables_end = bytes.len().saturating_sub(data_node::HEADER_SIZE);
        Self {
            bytes,
            width,
            payload_len,
            tables_end,
            resolved: true,
            fields,
        }
    }

    /// Parse and validate the stored header, then rewrite it in host order.
    pub(crate) fn normalize_header(&mut self, stored: Endian) -> Result<DataNodeHeader> {
        let header = DataNodeHeader::parse(&self.bytes, stored)?;
        header.validate()?;
        if header.node.size as usize != self.bytes.len() {
            return Err(Error::OutOfBoundsOffset {
                position: node::SIZE_FIELD as u64,
                value: u64::from(header.node.size),
                limit: self.bytes.len() as u64,
            });
        }
        header.write_into(&mut self.bytes, Endian::NATIVE)?;
        self.payload_len = header.payload_len();
        self.tables_end = header.offset_table_start();
        Ok(header)
    }

    /// Buffer index of the first payload byte
    pub const fn origin(&self) -> usize {
        data_node::HEADER_SIZE
    }

    /// Whole node size, header included
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Offset fields known to this buffer, sorted by position
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Header as currently held in the buffer
    pub fn header(&self) -> Result<DataNodeHeader> {
        DataNodeHeader::parse(&self.bytes, Endian::NATIVE)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.origin()..self.origin() + self.payload_len]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let origin = self.origin();
        &mut self.bytes[origin..origin + self.payload_len]
    }

    /// Raw string table bytes
    pub fn string_region(&self) -> &[u8] {
        &self.bytes[self.origin() + self.payload_len..self.origin() + self.tables_end]
    }

    /// Raw offset table bytes
    pub fn offset_table_bytes(&self) -> &[u8] {
        &self.bytes[self.origin() + self.tables_end..]
    }

    scalar_accessors!(u16_at, set_u16, u16, read_u16, write_u16);
    scalar_accessors!(u32_at, set_u32, u32, read_u32, write_u32);
    scalar_accessors!(u64_at, set_u64, u64, read_u64, write_u64);

    pub fn f32_at(&self, at: usize) -> Result<f32> {
        self.u32_at(at).map(f32::from_bits)
    }

    pub fn set_f32(&mut self, at: usize, value: f32) -> Result<()> {
        self.set_u32(at, value.to_bits())
    }

    /// Origin-relative target of the resolved offset field at `at`
    pub fn deref(&self, at: usize) -> Result<usize> {
        if !self.resolved {
            return Err(Error::OffsetsNotResolved);
        }
        let raw = Endian::NATIVE.read_uint(&self.bytes, self.absolute(at)?, self.width.bytes())?;
        raw.checked_sub(self.origin() as u64)
            .filter(|&target| target <= self.tables_end as u64)
            .map(|target| target as usize)
            .ok_or(Error::OutOfBoundsOffset {
                position: at as u64,
                value: raw,
                limit: (self.origin() + self.tables_end) as u64,
            })
    }

    /// NUL-terminated string referenced by the offset field at `at`
    pub fn str_at(&self, at: usize) -> Result<&str> {
        let start = self.origin() + self.deref(at)?;
        let end = self.origin() + self.tables_end;
        let invalid = || Error::InvalidString {
            position: at as u64,
        };
        let tail = self.bytes.get(start..end).ok_or_else(invalid)?;
        let nul = memchr(0, tail).ok_or_else(invalid)?;
        std::str::from_utf8(&tail[..nul]).map_err(|_| invalid())
    }

    /// Point the offset field at `at` to the payload position `target`
    pub fn set_offset(&mut self, at: usize, target: usize) -> Result<()> {
        if !self.resolved {
            return Err(Error::OffsetsNotResolved);
        }
        let unit = self.width.bytes();
        if at % unit != 0 {
            return Err(Error::MisalignedOffset {
                position: at as u64,
                unit: unit as u64,
            });
        }
        if at + unit > self.payload_len || target > self.payload_len {
            return Err(Error::OutOfBoundsOffset {
                position: at as u64,
                value: target as u64,
                limit: self.payload_len as u64,
            });
        }

        let absolute = (self.origin() + target) as u64;
        let index = self.absolute(at)?;
        Endian::NATIVE.write_uint(&mut self.bytes, index, unit, absolute)?;

        let field = Field::Pointer(at as u64);
        match self.fields.binary_search_by_key(&(at as u64), |f| f.position()) {
            Ok(existing) => self.fields[existing] = field,
            Err(slot) => self.fields.insert(slot, field),
        }
        Ok(())
    }

    /// Convert the stored offsets at `positions` into buffer references.
    ///
    /// Runs once per buffer; a second call fails with
    /// [`Error::DoubleFixupDetected`]. Fields targeting the string table
    /// are recorded as [`Field::String`]; a pointer to the end of the
    /// payload only stays a pointer when the string table starts after it,
    /// which [`crate::save`] guarantees.
    pub fn resolve_offsets(&mut self, positions: &[u64], stored: Endian) -> Result<()> {
        if self.resolved {
            return Err(Error::DoubleFixupDetected);
        }
        let region = self.region();
        let targets = fixup::resolve(&mut self.bytes, region, positions, stored)?;

        let strings = self.payload_len as u64..self.tables_end as u64;
        self.fields = positions
            .iter()
            .zip(targets)
            .map(|(&position, target)| {
                if strings.contains(&target) {
                    Field::String(position)
                } else {
                    Field::Pointer(position)
                }
            })
            .collect();
        self.fields.sort_unstable_by_key(|f| f.position());
        self.resolved = true;
        trace!("Resolved {} offsets", self.fields.len());
        Ok(())
    }

    /// Swapper over the whole buffer, positioned at the origin
    pub(crate) fn swapper(&mut self, offsets: OffsetState) -> Swapper<'_> {
        let origin = self.origin();
        let width = self.width;
        Swapper::new(&mut self.bytes, origin, width, offsets)
    }

    pub(crate) fn region(&self) -> Region {
        Region {
            origin: self.origin(),
            fields_end: self.payload_len,
            targets_end: self.tables_end,
            width: self.width,
        }
    }

    fn absolute(&self, at: usize) -> Result<usize> {
        let index = self.origin().checked_add(at).filter(|&i| i <= self.bytes.len());
        index.ok_or(Error::TruncatedInput {
            position: at as u64,
            need: 1,
            have: 0,
        })
    }
}
