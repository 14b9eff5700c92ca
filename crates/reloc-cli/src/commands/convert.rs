//! Convert command implementation.
//!
//! Loads the data node as flat data (offsets known only from the offset
//! table) and saves it again in the requested container kind.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use reloc::{CodecConfig, ContainerKind, Endian, Raw, SaveOptions, load, save};
use tracing::{info, warn};

/// Run the convert command
pub fn run(
    input: &Path,
    output: &Path,
    config: &CodecConfig,
    format: Option<ContainerKind>,
    endian: Option<Endian>,
) -> Result<()> {
    if format == Some(ContainerKind::Unrecognized) {
        bail!("Output format must be a recognized container kind");
    }

    let f = File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let loaded = match load::<Raw, _>(&mut BufReader::new(f), config) {
        Ok(loaded) => loaded,
        Err(e) if e.is_malformed() => {
            bail!("{} is not a loadable container: {}", input.display(), e)
        }
        Err(e) => return Err(e).with_context(|| format!("failed to load {}", input.display())),
    };
    info!(
        "Loaded {} ({}, {}-endian, {} offsets)",
        input.display(),
        loaded.kind,
        loaded.endian,
        loaded.buffer.fields().len()
    );

    let options = SaveOptions {
        kind: format.unwrap_or(loaded.kind),
        endian: endian.unwrap_or(loaded.endian),
    };
    if options.endian != loaded.endian {
        warn!("Flat conversion rewrites offsets only; scalar payload fields keep their byte order");
    }

    let out =
        File::create(output).with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(out);
    let report = save::<Raw, _>(&mut writer, &loaded.buffer, config, &options)?;
    writer.flush()?;

    println!(
        "Wrote {} ({}, {} bytes, {} pointers, {} strings)",
        output.display(),
        report.kind,
        report.written,
        report.pointers,
        report.strings
    );
    Ok(())
}
