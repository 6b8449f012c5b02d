//! CLI command implementations

mod config;
mod list;
mod record;
mod select;
mod serve;
mod status;
mod stop;

pub use config::{config, ConfigArgs};
pub use list::list_sources;
pub use record::{record, RecordArgs};
pub use select::{select, SelectArgs};
pub use serve::{serve, ServeArgs};
pub use status::status;
pub use stop::stop;

use anyhow::{Context, Result};
use sightline_core::ConfigFile;
use std::path::Path;

/// Load `path`, or the default config file when none is given
fn load_config(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => ConfigFile::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ConfigFile::load_or_default()),
    }
}
