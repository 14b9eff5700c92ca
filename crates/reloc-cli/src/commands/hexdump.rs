//! Hexdump command implementation.
//!
//! Displays raw file bytes in traditional hexdump format, useful for
//! checking header fields and table placement by hand.
//!
//! # Output Format
//!
//! ```text
//! 0x000: 52 4C 4F 43 01 00 00 08  5C 00 00 00 01 00 00 00  |RLOC....\.......|
//! ```

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};

/// Run the hexdump command
pub fn run(file: &Path, offset: u64, size: usize, ascii: bool) -> Result<()> {
    let mut f = File::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    f.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::with_capacity(size);
    f.take(size as u64).read_to_end(&mut bytes)?;

    println!("Hexdump of {} at 0x{:X} ({} bytes):", file.display(), offset, bytes.len());
    println!();
    for line in format_lines(&bytes, offset, ascii) {
        println!("{}", line);
    }
    Ok(())
}

/// Format bytes as 16-byte hexdump lines labelled from `base`
pub fn format_lines(bytes: &[u8], base: u64, ascii: bool) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("0x{:03X}: ", base + (i * 16) as u64);

            for j in 0..16 {
                if j == 8 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(byte) => line.push_str(&format!("{:02X} ", byte)),
                    None => line.push_str("   "),
                }
            }

            if ascii {
                line.push_str(" |");
                for byte in chunk {
                    if (0x20..0x7F).contains(byte) {
                        line.push(*byte as char);
                    } else {
                        line.push('.');
                    }
                }
                for _ in chunk.len()..16 {
                    line.push(' ');
                }
                line.push('|');
            }
            line
        })
        .collect()
}
