use crate::cli::ui::{self, StyleType};
use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example configuration to the default config location.
pub fn setup() -> Result<()> {
    let path = AppConfig::default_config_path()?;
    let written = setup_at_path(&path)?;
    println!(
        "{} {}",
        ui::style_text("Wrote example configuration to", StyleType::TotalLabel),
        written.display()
    );
    println!(
        "{}",
        ui::style_text("Edit the portfolio section, then run `fxfolio summary`.", StyleType::Subtle)
    );
    Ok(())
}

/// Writes the example configuration to `path`, creating parent directories.
/// An existing file is never overwritten.
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            anyhow::bail!("Configuration file already exists at {}", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {}", path.display()));
        }
    };
    file.write_all(EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!(path = %path.display(), "Created example configuration");
    Ok(path.to_path_buf())
}
