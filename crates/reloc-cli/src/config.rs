//! Codec config file handling.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use reloc::CodecConfig;
use tracing::{info, warn};

/// Load the codec config, falling back to defaults on any failure
pub fn load_config(path: Option<&Path>) -> CodecConfig {
    let Some(path) = path else {
        return CodecConfig::default();
    };

    let loaded = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| CodecConfig::from_json(&content).map_err(anyhow::Error::from));
    match loaded {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Failed to load config {}: {}, using defaults", path.display(), e);
            CodecConfig::default()
        }
    }
}

pub fn save_config(config: &CodecConfig, path: &Path) -> Result<()> {
    let json = config.to_json()?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Config saved to: {}", path.display());
    Ok(())
}
