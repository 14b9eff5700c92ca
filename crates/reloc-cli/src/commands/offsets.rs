//! Offset table encode/decode commands.

use anyhow::Result;
use reloc::PointerWidth;
use reloc::offset::{Entries, encode};

use super::hex_utils::{format_hex_bytes, parse_hex_bytes, parse_position};

/// Run the encode-offsets command
pub fn run_encode(positions: &[String], width: PointerWidth) -> Result<()> {
    let positions = positions
        .iter()
        .map(|p| parse_position(p))
        .collect::<Result<Vec<_>>>()?;
    let bytes = encode(&positions, width)?;
    println!("{}", format_hex_bytes(&bytes));
    Ok(())
}

/// Run the decode-offsets command
pub fn run_decode(words: &[String], width: PointerWidth) -> Result<()> {
    let bytes = parse_hex_bytes(words)?;
    let mut entries = Entries::new(&bytes, width);
    for entry in entries.by_ref() {
        println!("0x{:X} ({})", entry.position, entry.tier);
    }

    let consumed = entries.consumed();
    if consumed < bytes.len() {
        println!("-- stopped after {} of {} bytes", consumed, bytes.len());
    }
    Ok(())
}
