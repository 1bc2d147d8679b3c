//! Settings Provider — read-through cache over durable protection settings.
//!
//! Settings change rarely but are consulted on every event, so they sit
//! behind a short TTL cache keyed by workspace id. A stale entry is never
//! served past the TTL; a missing row means protection is disabled.

use rampart_core::providers::DurableStore;
use rampart_core::ttl_cache::TtlCache;
use rampart_core::types::ProtectionSettings;
use rampart_core::{RampartError, RampartResult};
use std::sync::Arc;
use tracing::debug;

pub struct SettingsProvider {
    durable: Arc<dyn DurableStore>,
    cache: TtlCache<String, ProtectionSettings>,
}

impl SettingsProvider {
    pub fn new(durable: Arc<dyn DurableStore>, ttl_secs: i64) -> Self {
        Self {
            durable,
            cache: TtlCache::new(10_000, ttl_secs),
        }
    }

    pub fn settings_for(&self, workspace: &str, now: i64) -> RampartResult<ProtectionSettings> {
        if let Some(settings) = self.cache.get(&workspace.to_string(), now) {
            return Ok(settings);
        }
        let settings = match self.durable.load_settings(workspace)? {
            Some(blob) => serde_json::from_slice::<ProtectionSettings>(&blob)
                .map_err(RampartError::Serde)?,
            None => ProtectionSettings::default(),
        };
        debug!(workspace = %workspace, enabled = settings.enabled, "Loaded protection settings");
        self.cache.insert(workspace.to_string(), settings.clone(), now);
        Ok(settings)
    }

    /// Write-through update; the cache entry is replaced immediately.
    pub fn store(&self, workspace: &str, settings: &ProtectionSettings, now: i64) -> RampartResult<()> {
        let blob = serde_json::to_vec(settings)?;
        self.durable.store_settings(workspace, &blob)?;
        self.cache.insert(workspace.to_string(), settings.clone(), now);
        Ok(())
    }

    pub fn invalidate(&self, workspace: &str) {
        self.cache.invalidate(&workspace.to_string());
    }

    pub fn prune_expired(&self, now: i64) -> usize {
        self.cache.prune_expired(now)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache.hits()
    }
}
