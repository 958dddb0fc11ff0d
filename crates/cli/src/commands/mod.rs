pub mod assemble;
pub mod config_cmd;
pub mod resolve;
pub mod select;

use std::path::{Path, PathBuf};

use contexture_config::{ConfigError, EngineConfig};
use contexture_engine::Diagnostic;
use contexture_store::{ContextService, InMemoryStore, Snapshot};

/// Load configuration from `path`, or from the default location.
///
/// Environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = EngineConfig::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => EngineConfig::load(),
    }
}

pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| EngineConfig::config_dir().join("config.toml"))
}

/// Load a snapshot into a store.
pub fn open_store(snapshot: &Path) -> Result<InMemoryStore, Box<dyn std::error::Error>> {
    let snapshot = Snapshot::load(snapshot)
        .map_err(|e| format!("Failed to load snapshot {}: {e}", snapshot.display()))?;
    Ok(snapshot.into_store())
}

pub fn open_service(
    snapshot: &Path,
    config: EngineConfig,
) -> Result<ContextService, Box<dyn std::error::Error>> {
    Ok(ContextService::from_store(open_store(snapshot)?, config))
}

/// Surface degradations on stderr.
pub fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        tracing::warn!("{diagnostic}");
    }
}
