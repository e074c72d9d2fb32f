//! Cache layer that serves reviewer lookups stale-while-revalidate.

use chrono::{Duration, Utc};
use color_eyre::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::entry::{parse_partition_key, partition_key, CacheEntry};
use super::traits::{KeyValueStore, LookupResult, ReviewerSource};
use crate::github::types::ReviewerMap;

/// Default time before a partition is considered stale (5 minutes).
pub const DEFAULT_STALE_MS: i64 = 300_000;

/// Cache layer between the UI and the reviewer source.
///
/// Fresh partitions are served from the store. Stale ones are served immediately while a
/// detached task refetches them. Anything not fully cached is fetched before answering.
#[derive(Clone)]
pub struct ReviewerCache {
  store: Arc<dyn KeyValueStore>,
  source: Arc<dyn ReviewerSource>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// Background refreshes that may still be running
  refreshes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ReviewerCache {
  pub fn new(store: Arc<dyn KeyValueStore>, source: Arc<dyn ReviewerSource>) -> Self {
    Self {
      store,
      source,
      stale_time: Duration::milliseconds(DEFAULT_STALE_MS),
      refreshes: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  /// Look up reviewers for `numbers` (non-empty, distinct) in `owner/repo`.
  ///
  /// 1. Fully cached and fresh: return cached data
  /// 2. Fully cached but stale: return cached data, refresh in the background
  /// 3. Otherwise: fetch, merge into the stored partition, return only what was fetched
  pub async fn get_results(&self, owner: &str, repo: &str, numbers: &[u64]) -> LookupResult {
    let key = partition_key(owner, repo);

    if let Some(entry) = read_entry(self.store.as_ref(), &key).await {
      if entry.covers(numbers) {
        let filtered = entry.filtered(numbers);

        if entry.is_stale(now_ms(), self.stale_time.num_milliseconds()) {
          debug!(owner, repo, ?numbers, "Serving stale reviewers, refreshing in background");
          self.spawn_refresh(owner, repo, numbers);
        } else {
          debug!(owner, repo, ?numbers, "Serving cached reviewers");
        }

        return LookupResult::from_cache(filtered);
      }
    }

    match self.source.fetch(owner, repo, numbers).await {
      Ok(fresh) => {
        if let Err(e) = merge_and_persist(self.store.as_ref(), &key, fresh.clone()).await {
          warn!(owner, repo, error = %e, "Failed to persist fetched reviewers");
        }
        LookupResult::from_network(fresh)
      }
      Err(e) => {
        warn!(owner, repo, ?numbers, error = %e, "Reviewer fetch failed");
        LookupResult::failure(e.to_string())
      }
    }
  }

  fn spawn_refresh(&self, owner: &str, repo: &str, numbers: &[u64]) {
    let store = Arc::clone(&self.store);
    let source = Arc::clone(&self.source);
    let owner = owner.to_string();
    let repo = repo.to_string();
    let numbers = numbers.to_vec();

    let handle = tokio::spawn(async move {
      refresh_partition(store.as_ref(), source.as_ref(), &owner, &repo, &numbers).await;
    });

    let mut refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
    refreshes.retain(|h| !h.is_finished());
    refreshes.push(handle);
  }

  /// Wait until every background refresh spawned so far has settled.
  pub async fn wait_for_refreshes(&self) {
    loop {
      let pending = {
        let mut refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *refreshes)
      };
      if pending.is_empty() {
        return;
      }
      for handle in pending {
        if let Err(e) = handle.await {
          warn!(error = %e, "Background refresh task panicked");
        }
      }
    }
  }

  /// The stored entry for a partition, if any.
  pub async fn inspect(&self, owner: &str, repo: &str) -> Option<CacheEntry> {
    read_entry(self.store.as_ref(), &partition_key(owner, repo)).await
  }

  /// Every cached `(owner, repo)` partition.
  pub async fn partitions(&self) -> Result<Vec<(String, String)>> {
    Ok(
      self
        .store
        .keys()
        .await?
        .iter()
        .filter_map(|key| parse_partition_key(key.as_str()))
        .collect(),
    )
  }

  pub async fn clear_partition(&self, owner: &str, repo: &str) -> Result<()> {
    self.store.remove(&partition_key(owner, repo)).await?;
    info!(owner, repo, "Cleared reviewer cache");
    Ok(())
  }

  /// Remove every reviewer partition, leaving unrelated keys alone.
  pub async fn clear_all(&self) -> Result<usize> {
    let partitions = self.partitions().await?;
    for (owner, repo) in &partitions {
      self.store.remove(&partition_key(owner, repo)).await?;
    }
    info!(count = partitions.len(), "Cleared reviewer cache");
    Ok(partitions.len())
  }
}

fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}

/// Read and decode a partition. Store errors and malformed values both count as a miss.
async fn read_entry(store: &dyn KeyValueStore, key: &str) -> Option<CacheEntry> {
  match store.get(key).await {
    Ok(raw) => {
      let present = raw.is_some();
      let entry = CacheEntry::decode(raw);
      if present && entry.is_none() {
        debug!(key, "Ignoring malformed cache entry");
      }
      entry
    }
    Err(e) => {
      warn!(key, error = %e, "Failed to read cache entry");
      None
    }
  }
}

/// Merge `fresh` into whatever is stored now and write it back with a new timestamp.
async fn merge_and_persist(store: &dyn KeyValueStore, key: &str, fresh: ReviewerMap) -> Result<()> {
  let now = now_ms();
  let mut entry = read_entry(store, key)
    .await
    .unwrap_or_else(|| CacheEntry::new(now, ReviewerMap::new()));
  entry.merge(fresh, now);
  store.set(key, entry.encode()?).await
}

async fn refresh_partition(
  store: &dyn KeyValueStore,
  source: &dyn ReviewerSource,
  owner: &str,
  repo: &str,
  numbers: &[u64],
) {
  match source.fetch(owner, repo, numbers).await {
    Ok(fresh) => {
      let key = partition_key(owner, repo);
      match merge_and_persist(store, &key, fresh).await {
        Ok(()) => debug!(owner, repo, ?numbers, "Background refresh stored"),
        Err(e) => warn!(owner, repo, error = %e, "Failed to persist refreshed reviewers"),
      }
    }
    Err(e) => warn!(owner, repo, ?numbers, error = %e, "Background reviewer refresh failed"),
  }
}
