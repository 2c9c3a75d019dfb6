use crate::error::RunnerError;
use connectors::adapter::Adapter;
use engine_config::settings::SourceSettings;
use engine_core::state::sled_store::SledStateStore;
use engine_processing::source::TableSource;
use std::path::{Path, PathBuf};
use tracing::info;

const STATE_DIR: &str = ".tableflow/state";

/// `~/.tableflow/state`, or `dir` when given.
pub fn state_dir(dir: Option<&Path>) -> Result<PathBuf, RunnerError> {
    if let Some(dir) = dir {
        return Ok(dir.to_path_buf());
    }
    let home_dir = dirs::home_dir().ok_or_else(|| {
        RunnerError::InitializationError("Could not determine home directory".to_string())
    })?;
    Ok(home_dir.join(STATE_DIR))
}

pub fn open_state_store(dir: Option<&Path>) -> Result<SledStateStore, RunnerError> {
    let path = state_dir(dir)?;
    info!(path = %path.display(), "Opening state store");
    Ok(SledStateStore::open(path)?)
}

pub async fn connect(settings: &SourceSettings) -> Result<Adapter, RunnerError> {
    let adapter = Adapter::connect(settings.connection.format, &settings.connection.url).await?;
    info!(source = %settings.name, format = %adapter.format(), "Connected to source database");
    Ok(adapter)
}

/// Connects to the database and builds an uninitialised source.
pub async fn create_source(settings: SourceSettings) -> Result<TableSource, RunnerError> {
    let adapter = connect(&settings).await?;
    Ok(TableSource::new(settings, adapter.sql()))
}
