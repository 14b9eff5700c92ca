use std::io::{Read, Seek};

use serde::Serialize;
use tracing::{debug, trace};

use super::header::{Envelope, NodeHeader};
use crate::config::Signature;
use crate::error::{Error, Result};
use crate::layout::{envelope as envelope_layout, node};
use crate::stream::SeekExt;

/// A node header and the stream position it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeLocation {
    pub offset: u64,
    pub header: NodeHeader,
}

/// Walk the nodes following an envelope until one with `target` signature
/// is found.
///
/// The stream must sit on the first node header, right after the envelope.
/// On success it is left at the start of the matching node. Non-matching
/// nodes are skipped by their declared size; nothing beyond a node's header
/// is read, and no node may extend past the envelope's `total_size`.
pub fn find_node<R: Read + Seek>(
    stream: &mut R,
    envelope: &Envelope,
    target: Signature,
) -> Result<NodeLocation> {
    let end = container_end(stream, envelope)?;
    for index in 0..envelope.node_count {
        let location = next_node(stream, envelope, end)?;
        if location.header.signature == target {
            debug!("Found node {} #{} at {:#x}", target, index, location.offset);
            stream.seek_to(location.offset)?;
            return Ok(location);
        }
        trace!(
            "Skipped node {} at {:#x} ({} bytes)",
            location.header.signature, location.offset, location.header.size
        );
    }

    Err(Error::NodeNotFound {
        signature: target.to_string(),
        scanned: envelope.node_count,
    })
}

/// List every node header following an envelope, restoring the stream
/// position afterwards.
pub fn list_nodes<R: Read + Seek>(stream: &mut R, envelope: &Envelope) -> Result<Vec<NodeLocation>> {
    let start = stream.tell()?;
    let end = container_end(stream, envelope)?;
    let nodes: Result<Vec<NodeLocation>> = (0..envelope.node_count)
        .map(|_| next_node(stream, envelope, end))
        .collect();
    stream.seek_to(start)?;
    nodes
}

/// Stream position one past the container, from a stream sitting right
/// after the envelope
fn container_end<R: Seek>(stream: &mut R, envelope: &Envelope) -> Result<u64> {
    let envelope_start = stream.tell()?.saturating_sub(envelope_layout::SIZE as u64);
    Ok(envelope_start + u64::from(envelope.total_size))
}

/// Read the header at the current position and seek past the whole node
fn next_node<R: Read + Seek>(
    stream: &mut R,
    envelope: &Envelope,
    end: u64,
) -> Result<NodeLocation> {
    let offset = stream.tell()?;
    let header = NodeHeader::read(stream, envelope.endian)?;
    let node_end = offset + node::HEADER_SIZE as u64 + header.body_len()?;
    if node_end > end {
        return Err(Error::OutOfBoundsOffset {
            position: offset,
            value: node_end,
            limit: end,
        });
    }
    stream.seek_to(node_end)?;
    Ok(NodeLocation { offset, header })
}
