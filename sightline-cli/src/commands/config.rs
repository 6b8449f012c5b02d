//! Config command - inspect and create the config file

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use sightline_core::config::{sample_config, ConfigFile};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print where the config file lives
    Path,

    /// Print the config file and any warnings about it
    Show,

    /// Write the sample config to the config path
    Init {
        /// Replace an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the sample config
    Sample,
}

pub async fn config(config_path: Option<&Path>, args: ConfigArgs) -> Result<()> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(ConfigFile::default_path);

    match args.command {
        ConfigCommand::Path => {
            let note = if path.exists() { "exists" } else { "not created yet" };
            println!("{} ({})", path.display(), note);
            Ok(())
        }
        ConfigCommand::Show => show(&path),
        ConfigCommand::Init { force } => init(&path, force),
        ConfigCommand::Sample => {
            print!("{}", sample_config());
            Ok(())
        }
    }
}

fn show(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("{} does not exist; built-in defaults apply.", path.display());
        println!("Run 'sightline config init' to create it.");
        return Ok(());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    println!("# {}\n", path.display());
    println!("{}", text);

    // Parse the same way `record` and `serve` will
    let file = ConfigFile::load_from(path)?;
    let capture = file.capture_config()?;
    file.server_config()?;

    for warning in capture.validate() {
        println!("warning: {}", warning);
    }
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("{} already exists; pass --force to replace it.", path.display());
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, sample_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote sample configuration to {}", path.display());
    Ok(())
}
