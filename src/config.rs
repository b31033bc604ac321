use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::instruments::InstrumentRegistry;

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub database_url: Option<String>,
    pub instruments_path: Option<PathBuf>,
}

impl Settings {
    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .context("DATABASE_URL must be set to a production Postgres instance")
    }

    pub fn load_registry(&self) -> anyhow::Result<InstrumentRegistry> {
        match &self.instruments_path {
            Some(path) => InstrumentRegistry::from_json_path(path)
                .with_context(|| format!("failed to load instruments from {}", path.display())),
            None => {
                info!("using built-in instrument catalogue");
                Ok(InstrumentRegistry::builtin()?)
            }
        }
    }
}

pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
