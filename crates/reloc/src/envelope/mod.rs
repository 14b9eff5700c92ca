//! Container envelope detection and node scanning.
//!
//! Three container layouts are recognized:
//!
//! ```text
//! legacy       [DATA node]
//! versioned    [envelope][node][node]...[DATA node]...
//! archive      [prefix: magic + 3-byte token][legacy | versioned body]
//! ```
//!
//! [`sniff`] classifies a stream without moving it; [`find_node`] walks a
//! versioned body to the data node.

mod detect;
mod header;
mod scan;

pub use detect::{ContainerKind, classify, sniff};
pub use header::{ArchivePrefix, DataNodeHeader, Envelope, NodeHeader};
pub use scan::{NodeLocation, find_node, list_nodes};
