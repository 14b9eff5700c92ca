use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reloc=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = config::load_config(args.config.as_deref());

    match args.command {
        Command::Sniff { file } => commands::sniff::run(&file, &config),
        Command::Inspect { file, json } => commands::inspect::run(&file, &config, json),
        Command::Hexdump {
            file,
            offset,
            size,
            ascii,
        } => {
            let offset = commands::hex_utils::parse_hex_address(&offset)?;
            commands::hexdump::run(&file, offset, size, ascii)
        }
        Command::EncodeOffsets { width, positions } => {
            commands::offsets::run_encode(&positions, width)
        }
        Command::DecodeOffsets { width, bytes } => commands::offsets::run_decode(&bytes, width),
        Command::Convert {
            input,
            output,
            format,
            endian,
        } => commands::convert::run(&input, &output, &config, format, endian),
        Command::InitConfig { output } => config::save_config(&config, &output),
    }
}
