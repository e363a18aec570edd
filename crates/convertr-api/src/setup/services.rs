//! Storage, converters and worker pool construction

use crate::state::AppState;
use anyhow::{Context, Result};
use convertr_core::Config;
use convertr_processing::{ConversionCache, ConversionManager};
use convertr_storage::LocalStorage;
use std::sync::Arc;

pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let storage = LocalStorage::new(&config.storage_path)
        .await
        .with_context(|| format!("Failed to open storage at {}", config.storage_path))?;
    tracing::info!(path = %config.storage_path, "Local storage ready");

    let manager = ConversionManager::with_defaults(&config.ffmpeg_path).with_cache(
        ConversionCache::new(config.cache_max_entries, config.cache_ttl()),
    );
    tracing::info!(
        converters = ?manager.converter_names(),
        cache_max_entries = config.cache_max_entries,
        "Conversion manager ready"
    );

    Ok(Arc::new(AppState::new(
        config.clone(),
        Arc::new(storage),
        manager,
    )))
}
