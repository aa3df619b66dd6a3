use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

/// Paths used by a run. Read from `KG_*` environment variables over the
/// defaults below; CLI flags override single values afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Cached field maps; without it fields are flattened from the markup.
    #[serde(default)]
    pub fields_path: Option<PathBuf>,
    #[serde(default)]
    pub bundles_path: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("data_dir", "data/pages")?
            .set_default("db_path", "data/graph.sqlite")?
            .add_source(Environment::with_prefix("KG"))
            .build()
            .context("reading settings")?
            .try_deserialize()
            .context("invalid settings")
    }
}
