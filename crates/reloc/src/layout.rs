//! Byte layout constants for container headers
//!
//! This module centralizes every fixed field offset used to read and write
//! containers. Offsets are relative to the start of the structure they belong
//! to; all multi-byte fields use the container's endianness.

/// Alignment of the string table and offset table byte streams
pub const TABLE_ALIGN: usize = 4;

/// Envelope at the start of a versioned container
pub mod envelope {
    pub const SIGNATURE: usize = 0;
    pub const VERSION: usize = 4;
    pub const ENDIAN: usize = 6;
    pub const POINTER_WIDTH: usize = 7;
    pub const TOTAL_SIZE: usize = 8;
    pub const NODE_COUNT: usize = 12;

    pub const SIZE: usize = 16;
}

/// Generic node header (signature + declared size)
pub mod node {
    pub const SIGNATURE: usize = 0;
    pub const SIZE_FIELD: usize = 4;

    pub const HEADER_SIZE: usize = 8;
}

/// Data node header; the first 8 bytes are a node header
pub mod data_node {
    pub const STRING_TABLE_OFFSET: usize = 8;
    pub const STRING_TABLE_SIZE: usize = 12;
    pub const OFFSET_TABLE_SIZE: usize = 16;
    pub const RESERVED: usize = 20;
    pub const RESERVED_LEN: usize = 12;

    /// Header size; the payload (and origin) begins here
    pub const HEADER_SIZE: usize = RESERVED + RESERVED_LEN;
}

/// Archive prefix (signature + generation token + pad)
pub mod archive {
    pub const SIGNATURE: usize = 0;
    pub const TOKEN: usize = 4;
    pub const TOKEN_LEN: usize = 3;

    pub const PREFIX_SIZE: usize = 8;
}

/// Shortest stream the detector will classify (one node header)
pub const MIN_PROBE_LEN: usize = node::HEADER_SIZE;

/// Round `len` up to the table alignment
pub const fn align_up(len: usize) -> usize {
    (len + TABLE_ALIGN - 1) & !(TABLE_ALIGN - 1)
}
