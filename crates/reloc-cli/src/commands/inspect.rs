//! Inspect command implementation.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use reloc::{CodecConfig, ContainerDump, DataNodeDump};

/// Offsets listed before the output is truncated
const MAX_LISTED_OFFSETS: usize = 32;

/// Run the inspect command
pub fn run(file: &Path, config: &CodecConfig, json: bool) -> Result<()> {
    let f = File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    let dump = ContainerDump::inspect(&mut BufReader::new(f), config)?;

    if json {
        println!("{}", dump.to_json()?);
        return Ok(());
    }

    println!("=== {} ===", file.display().bold());
    println!("Kind: {}", dump.kind.green());
    if let Some(prefix) = &dump.archive {
        println!("Archive: {} generation {}", prefix.signature, prefix.token);
    }
    if let Some(env) = &dump.envelope {
        println!(
            "Envelope: {} v{} {}-endian {}-bit, {} bytes, {} nodes",
            env.signature, env.version, env.endian, env.pointer_width, env.total_size, env.node_count
        );
    }

    println!();
    println!("=== Nodes ({}) ===", dump.nodes.len());
    for node in &dump.nodes {
        println!(
            "  0x{:06X}: {} ({} bytes)",
            node.offset, node.header.signature, node.header.size
        );
    }

    match &dump.data_node {
        Some(data) => print_data_node(data),
        None => {
            println!();
            println!("{} no {} node", "warning:".yellow(), config.data_signature);
        }
    }
    Ok(())
}

fn print_data_node(data: &DataNodeDump) {
    let header = &data.header;
    println!();
    println!("=== Data node at 0x{:X} ===", data.offset);
    if !data.valid {
        println!("{} header failed validation", "error:".red());
    }
    println!("  size:          {}", header.node.size);
    println!(
        "  string table:  offset {} size {}",
        header.string_table_offset, header.string_table_size
    );
    println!("  offset table:  size {}", header.offset_table_size);
    println!("  payload head:  {}", data.payload_sample);

    let tiers = &data.tiers;
    println!();
    println!(
        "=== Offsets ({}: {} 6-bit, {} 14-bit, {} 30-bit, {} bytes) ===",
        tiers.total(),
        tiers.bits6,
        tiers.bits14,
        tiers.bits30,
        tiers.bytes
    );
    for position in data.offsets.iter().take(MAX_LISTED_OFFSETS) {
        println!("  0x{:X}", position);
    }
    if data.offsets.len() > MAX_LISTED_OFFSETS {
        println!("  ... and {} more", data.offsets.len() - MAX_LISTED_OFFSETS);
    }

    println!();
    println!("=== Strings ({}) ===", data.strings.len());
    for (i, s) in data.strings.iter().enumerate() {
        println!("  [{}] {:?}", i, s);
    }
}
