//! Sniff command implementation.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use reloc::{CodecConfig, ContainerKind, sniff};

/// Run the sniff command
pub fn run(file: &Path, config: &CodecConfig) -> Result<()> {
    let f = File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    let kind = sniff(&mut BufReader::new(f), config)?;

    if kind == ContainerKind::Unrecognized {
        println!("{}: {}", file.display(), kind.red());
    } else {
        println!("{}: {}", file.display(), kind.green());
    }
    Ok(())
}
