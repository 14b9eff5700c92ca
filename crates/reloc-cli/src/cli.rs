use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reloc::{ContainerKind, Endian, PointerWidth};

#[derive(Parser)]
#[command(name = "reloc")]
#[command(about = "Relocatable container inspection and conversion")]
#[command(version)]
pub struct Cli {
    /// Codec config (JSON); defaults are used when missing
    #[arg(short, long, global = true, env = "RELOC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the container kind of a file
    Sniff {
        file: PathBuf,
    },
    /// Show envelope, nodes, data header, offset table and strings
    Inspect {
        file: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dump raw file bytes
    Hexdump {
        file: PathBuf,
        /// Start offset (hex)
        #[arg(short, long, default_value = "0")]
        offset: String,
        /// Number of bytes
        #[arg(short, long, default_value = "256")]
        size: usize,
        /// Show the ASCII column
        #[arg(long)]
        ascii: bool,
    },
    /// Encode origin-relative positions into an offset table
    EncodeOffsets {
        /// Pointer width: 32/64 or 4/8
        #[arg(short, long, default_value = "64")]
        width: PointerWidth,
        /// Positions (decimal, or hex with 0x prefix)
        #[arg(required = true)]
        positions: Vec<String>,
    },
    /// Decode an offset table given as hex bytes
    DecodeOffsets {
        /// Pointer width: 32/64 or 4/8
        #[arg(short, long, default_value = "64")]
        width: PointerWidth,
        /// Table bytes, e.g. "40 41 80 40"
        #[arg(required = true)]
        bytes: Vec<String>,
    },
    /// Load a container as flat data and save it again
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Output container kind (defaults to the input kind)
        #[arg(short, long)]
        format: Option<ContainerKind>,
        /// Output byte order (defaults to the input byte order)
        #[arg(short, long)]
        endian: Option<Endian>,
    },
    /// Write the active codec config as JSON
    InitConfig {
        output: PathBuf,
    },
}
