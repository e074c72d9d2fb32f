use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{KeyValueStore, MemoryStore, NoopStore, ReviewerCache, SqliteStore};
use crate::config::{Config, StoreBackend};
use crate::github::client::GithubClient;
use crate::github::credentials::EnvToken;

/// Wire the configured store and the GitHub client into a cache.
pub fn build_cache(config: &Config) -> Result<ReviewerCache> {
  let store: Arc<dyn KeyValueStore> = match config.cache.backend {
    StoreBackend::Sqlite => Arc::new(SqliteStore::open(config.cache.path.as_deref())?),
    StoreBackend::Memory => Arc::new(MemoryStore::new()),
    StoreBackend::Disabled => Arc::new(NoopStore),
  };

  let client = GithubClient::new(&config.github, Arc::new(EnvToken))?;
  let stale_time = config.cache.stale_time();

  debug!(
    backend = ?config.cache.backend,
    stale_secs = stale_time.num_seconds(),
    "Reviewer cache ready"
  );

  Ok(ReviewerCache::new(store, Arc::new(client)).with_stale_time(stale_time))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_build_cache_uses_configured_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.cache.path = Some(dir.path().join("cache.db"));
    config.cache.ttl_secs = Some(42);

    let cache = build_cache(&config).unwrap();
    assert_eq!(cache.stale_time(), chrono::Duration::seconds(42));
    assert!(dir.path().join("cache.db").exists());
  }

  #[tokio::test]
  async fn test_build_cache_disabled_backend_keeps_nothing() {
    let mut config = Config::default();
    config.cache.backend = StoreBackend::Disabled;

    let cache = build_cache(&config).unwrap();
    assert!(cache.partitions().await.unwrap().is_empty());
  }
}
