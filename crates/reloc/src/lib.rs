//! # reloc
//!
//! Codec for relocatable binary containers.
//!
//! A container holds one data node whose payload references other payload
//! locations through stored offsets. This crate provides:
//! - Container detection (legacy, versioned, two archive generations)
//! - The compact offset-table encoding
//! - Offset fixup on load and the mirror transform on save
//! - Deduplicating string tables with backpatching
//! - Schema-driven byte order normalization
//! - A single-allocation node buffer with typed accessors
//!
//! ## Example
//!
//! ```
//! use std::io::{Cursor, Seek, SeekFrom};
//! use reloc::{CodecConfig, PayloadBuilder, PointerWidth, Raw, SaveOptions, load, save};
//!
//! let mut builder = PayloadBuilder::new(PointerWidth::Bits64);
//! let name = builder.push_string("hero");
//! let buffer = builder.finish::<Raw>()?;
//!
//! let config = CodecConfig::default();
//! let mut file = Cursor::new(Vec::new());
//! save::<Raw, _>(&mut file, &buffer, &config, &SaveOptions::default())?;
//!
//! file.seek(SeekFrom::Start(0))?;
//! let loaded = load::<Raw, _>(&mut file, &config)?;
//! assert_eq!(loaded.buffer.str_at(name)?, "hero");
//! # Ok::<(), reloc::Error>(())
//! ```

pub mod buffer;
pub mod config;
pub mod container;
pub mod dump;
pub mod endian;
pub mod envelope;
pub mod error;
pub mod fixup;
pub mod layout;
pub mod offset;
pub mod schema;
pub mod stream;
pub mod string_table;

pub use buffer::{NodeBuffer, PayloadBuilder};
pub use config::{ArchiveToken, CodecConfig, Signature, Tag};
pub use container::{Loaded, SaveOptions, SaveReport, load, save};
pub use dump::{ContainerDump, DataNodeDump, TierStats};
pub use endian::{Endian, EndianSwappable, OffsetState, Swapper};
pub use envelope::{
    ArchivePrefix, ContainerKind, DataNodeHeader, Envelope, NodeHeader, NodeLocation, classify,
    find_node, list_nodes, sniff,
};
pub use error::{Error, Result};
pub use offset::{OffsetTable, PointerWidth, Tier};
pub use schema::{
    EnumerateHook, Field, OffsetEnumerable, Raw, Schema, SwapHook, enumerate_with, swap_root,
};
pub use string_table::{StringEntry, StringTable};
