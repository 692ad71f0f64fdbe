pub mod daemon;
pub mod init;
pub mod remote;
pub mod status;
pub mod sync;

use std::sync::Arc;

use anyhow::Result;
use calbridge_core::{Config, EventStore, FileStore, SyncEngine};

/// Wire the configured providers and the on-disk snapshot into an engine.
pub fn build_engine(config: &Config) -> Result<SyncEngine> {
    let store = open_store(config)?;

    Ok(SyncEngine::new(
        Arc::new(config.source_provider()),
        Arc::new(config.sink_provider()),
        store,
    )
    .with_policy(config.remote_policy())
    .with_time_zone(config.time_zone()?))
}

pub fn open_store(config: &Config) -> Result<EventStore> {
    let backend = FileStore::open(config.snapshot_dir()?)?;
    Ok(EventStore::load(Box::new(backend)))
}
