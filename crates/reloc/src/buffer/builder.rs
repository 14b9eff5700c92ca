use std::collections::HashMap;

use super::NodeBuffer;
use crate::config::Tag;
use crate::endian::Endian;
use crate::envelope::{DataNodeHeader, NodeHeader};
use crate::error::{Error, Result};
use crate::layout::{align_up, data_node};
use crate::offset::PointerWidth;
use crate::schema::{Field, Schema};

/// Composes a payload in host order and lays it out as a resolved node.
///
/// Every `push_*` returns the origin-relative position of what it wrote.
/// Pointer and string fields are aligned to the pointer width.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    width: PointerWidth,
    payload: Vec<u8>,
    pointers: Vec<(usize, usize)>,
    strings: Vec<(usize, String)>,
}

impl PayloadBuilder {
    pub fn new(width: PointerWidth) -> Self {
        Self {
            width,
            payload: Vec::new(),
            pointers: Vec::new(),
            strings: Vec::new(),
        }
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        let at = self.payload.len();
        self.payload.extend_from_slice(bytes);
        at
    }

    pub fn push_u8(&mut self, value: u8) -> usize {
        self.push_bytes(&[value])
    }

    pub fn push_u16(&mut self, value: u16) -> usize {
        self.push_bytes(&value.to_ne_bytes())
    }

    pub fn push_u32(&mut self, value: u32) -> usize {
        self.push_bytes(&value.to_ne_bytes())
    }

    pub fn push_u64(&mut self, value: u64) -> usize {
        self.push_bytes(&value.to_ne_bytes())
    }

    pub fn push_f32(&mut self, value: f32) -> usize {
        self.push_bytes(&value.to_ne_bytes())
    }

    /// Zero-fill `len` bytes, to be patched later
    pub fn reserve(&mut self, len: usize) -> usize {
        let at = self.payload.len();
        self.payload.resize(at + len, 0);
        at
    }

    /// Pad with zeros to a multiple of `align`
    pub fn align(&mut self, align: usize) {
        let rem = self.payload.len() % align;
        if rem != 0 {
            self.reserve(align - rem);
        }
    }

    pub fn set_u32(&mut self, at: usize, value: u32) -> Result<()> {
        Endian::NATIVE.write_u32(&mut self.payload, at, value)
    }

    /// Append a pointer field referencing the payload position `target`
    pub fn push_offset(&mut self, target: usize) -> usize {
        self.align(self.width.bytes());
        let at = self.reserve(self.width.bytes());
        self.pointers.push((at, target));
        at
    }

    /// Retarget a pointer field, typically one pushed before its target existed
    pub fn set_offset(&mut self, at: usize, target: usize) -> Result<()> {
        let field = self
            .pointers
            .iter_mut()
            .find(|(position, _)| *position == at)
            .ok_or(Error::OutOfBoundsOffset {
                position: at as u64,
                value: target as u64,
                limit: self.payload.len() as u64,
            })?;
        field.1 = target;
        Ok(())
    }

    /// Append a string field; identical contents share one string table slot.
    /// Content holding a NUL byte makes [`PayloadBuilder::finish`] fail.
    pub fn push_string(&mut self, content: impl Into<String>) -> usize {
        self.align(self.width.bytes());
        let at = self.reserve(self.width.bytes());
        self.strings.push((at, content.into()));
        at
    }

    /// Lay out `[header][payload][strings]` and resolve every field.
    pub fn finish<S: Schema>(self) -> Result<NodeBuffer> {
        let payload_len = align_up(self.payload.len());
        if payload_len < S::MIN_PAYLOAD_SIZE {
            return Err(Error::UndersizedDeclaration {
                declared: (data_node::HEADER_SIZE + payload_len) as u64,
                minimum: (data_node::HEADER_SIZE + S::MIN_PAYLOAD_SIZE) as u64,
            });
        }

        let mut region = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();
        for (at, content) in &self.strings {
            if memchr::memchr(0, content.as_bytes()).is_some() {
                return Err(Error::InvalidString {
                    position: *at as u64,
                });
            }
            slots.entry(content.as_str()).or_insert_with(|| {
                let slot = region.len();
                region.extend_from_slice(content.as_bytes());
                region.push(0);
                slot
            });
        }
        let strings_len = region.len();
        region.resize(align_up(strings_len), 0);

        let total = data_node::HEADER_SIZE + payload_len + region.len();
        let size = u32::try_from(total).map_err(|_| Error::OutOfBoundsOffset {
            position: 0,
            value: total as u64,
            limit: u64::from(u32::MAX),
        })?;

        let origin = data_node::HEADER_SIZE;
        let mut bytes = vec![0u8; total];
        bytes[origin..origin + self.payload.len()].copy_from_slice(&self.payload);
        bytes[origin + payload_len..].copy_from_slice(&region);

        let width = self.width.bytes();
        let mut fields = Vec::with_capacity(self.pointers.len() + self.strings.len());
        for &(at, target) in &self.pointers {
            if target > payload_len {
                return Err(Error::OutOfBoundsOffset {
                    position: at as u64,
                    value: target as u64,
                    limit: payload_len as u64,
                });
            }
            Endian::NATIVE.write_uint(&mut bytes, origin + at, width, (origin + target) as u64)?;
            fields.push(Field::Pointer(at as u64));
        }
        for (at, content) in &self.strings {
            let target = origin + payload_len + slots[content.as_str()];
            Endian::NATIVE.write_uint(&mut bytes, origin + at, width, target as u64)?;
            fields.push(Field::String(*at as u64));
        }
        fields.sort_unstable_by_key(|f| f.position());

        let header = DataNodeHeader {
            node: NodeHeader {
                signature: Tag::new([0; 4]),
                size,
            },
            string_table_offset: if strings_len > 0 { payload_len as u32 } else { 0 },
            string_table_size: strings_len as u32,
            offset_table_size: 0,
        };
        header.write_into(&mut bytes, Endian::NATIVE)?;

        Ok(NodeBuffer::from_parts(bytes, self.width, payload_len, fields))
    }
}
