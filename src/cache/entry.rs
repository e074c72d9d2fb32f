//! Persisted shape of a reviewer partition.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::github::types::{Reviewer, ReviewerMap};

/// Prefix for every reviewer partition key.
pub const PARTITION_PREFIX: &str = "reviewers:";

/// Storage key for one repository's partition.
pub fn partition_key(owner: &str, repo: &str) -> String {
  format!("{}{}/{}", PARTITION_PREFIX, owner, repo)
}

/// Inverse of [`partition_key`]. Returns `None` for keys that aren't reviewer partitions.
pub fn parse_partition_key(key: &str) -> Option<(String, String)> {
  let rest = key.strip_prefix(PARTITION_PREFIX)?;
  let (owner, repo) = rest.split_once('/')?;
  Some((owner.to_string(), repo.to_string()))
}

/// Cached reviewers for one repository, accumulated across fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// Epoch milliseconds of the fetch that last produced this entry
  pub timestamp: i64,
  pub data: ReviewerMap,
}

impl CacheEntry {
  pub fn new(timestamp: i64, data: ReviewerMap) -> Self {
    Self { timestamp, data }
  }

  /// Decode a stored value. Missing or malformed values decode to `None`.
  pub fn decode(raw: Option<Value>) -> Option<Self> {
    serde_json::from_value(raw?).ok()
  }

  pub fn encode(&self) -> Result<Value> {
    serde_json::to_value(self).map_err(|e| eyre!("Failed to encode cache entry: {}", e))
  }

  pub fn is_stale(&self, now_ms: i64, ttl_ms: i64) -> bool {
    now_ms - self.timestamp > ttl_ms
  }

  /// Whether every requested number has a cached value (an empty list counts).
  pub fn covers(&self, numbers: &[u64]) -> bool {
    numbers
      .iter()
      .all(|n| self.data.contains_key(&n.to_string()))
  }

  /// Cached values restricted to `numbers`.
  pub fn filtered(&self, numbers: &[u64]) -> ReviewerMap {
    numbers
      .iter()
      .filter_map(|n| {
        let key = n.to_string();
        let reviewers: &Vec<Reviewer> = self.data.get(&key)?;
        Some((key, reviewers.clone()))
      })
      .collect()
  }

  /// Union with `fresh` (fresh values win) and take `timestamp` as the new fetch time.
  pub fn merge(&mut self, fresh: ReviewerMap, timestamp: i64) {
    self.data.extend(fresh);
    self.timestamp = timestamp;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn reviewers(logins: &[&str]) -> Vec<Reviewer> {
    logins
      .iter()
      .map(|l| Reviewer::new(*l, format!("https://avatars/{}", l)))
      .collect()
  }

  #[test]
  fn test_partition_key_roundtrip() {
    let key = partition_key("octo", "hello-world");
    assert_eq!(key, "reviewers:octo/hello-world");
    assert_eq!(
      parse_partition_key(&key),
      Some(("octo".to_string(), "hello-world".to_string()))
    );
    assert_eq!(parse_partition_key("settings:token"), None);
  }

  #[test]
  fn test_decode_valid() {
    let entry = CacheEntry::decode(Some(json!({
      "timestamp": 1_700_000_000_000i64,
      "data": { "1": [{ "login": "amy", "avatarUrl": "a.png" }], "2": [] }
    })))
    .unwrap();

    assert_eq!(entry.timestamp, 1_700_000_000_000);
    assert_eq!(entry.data["1"], vec![Reviewer::new("amy", "a.png")]);
    assert!(entry.data["2"].is_empty());
  }

  #[test]
  fn test_decode_rejects_malformed() {
    assert_eq!(CacheEntry::decode(None), None);
    assert_eq!(CacheEntry::decode(Some(json!({ "timestamp": 1 }))), None);
    assert_eq!(CacheEntry::decode(Some(json!({ "data": {} }))), None);
    assert_eq!(CacheEntry::decode(Some(json!("garbage"))), None);
    assert_eq!(
      CacheEntry::decode(Some(json!({ "timestamp": "yesterday", "data": {} }))),
      None
    );
  }

  #[test]
  fn test_encode_matches_persisted_shape() {
    let mut data = ReviewerMap::new();
    data.insert("7".to_string(), reviewers(&["bob"]));
    let value = CacheEntry::new(42, data).encode().unwrap();

    assert_eq!(
      value,
      json!({
        "timestamp": 42,
        "data": { "7": [{ "login": "bob", "avatarUrl": "https://avatars/bob" }] }
      })
    );
  }

  #[test]
  fn test_is_stale_boundary() {
    let entry = CacheEntry::new(1_000, ReviewerMap::new());
    assert!(!entry.is_stale(1_000 + 300_000, 300_000));
    assert!(entry.is_stale(1_000 + 300_001, 300_000));
  }

  #[test]
  fn test_covers_counts_empty_lists() {
    let mut data = ReviewerMap::new();
    data.insert("1".to_string(), reviewers(&["amy"]));
    data.insert("5".to_string(), Vec::new());
    let entry = CacheEntry::new(0, data);

    assert!(entry.covers(&[1, 5]));
    assert!(!entry.covers(&[1, 2]));
  }

  #[test]
  fn test_filtered_only_requested() {
    let mut data = ReviewerMap::new();
    data.insert("1".to_string(), reviewers(&["amy"]));
    data.insert("2".to_string(), reviewers(&["bob"]));
    data.insert("3".to_string(), Vec::new());
    let entry = CacheEntry::new(0, data);

    let filtered = entry.filtered(&[3, 1, 9]);
    assert_eq!(filtered.len(), 2);
    assert!(filtered.contains_key("1"));
    assert!(filtered.contains_key("3"));
  }

  #[test]
  fn test_merge_keeps_untouched_and_overwrites_collisions() {
    let mut data = ReviewerMap::new();
    data.insert("1".to_string(), reviewers(&["amy"]));
    data.insert("2".to_string(), reviewers(&["bob"]));
    let mut entry = CacheEntry::new(10, data);

    let mut fresh = ReviewerMap::new();
    fresh.insert("2".to_string(), reviewers(&["cat", "dan"]));
    fresh.insert("3".to_string(), Vec::new());
    entry.merge(fresh, 99);

    assert_eq!(entry.timestamp, 99);
    assert_eq!(entry.data["1"], reviewers(&["amy"]));
    assert_eq!(entry.data["2"], reviewers(&["cat", "dan"]));
    assert!(entry.data["3"].is_empty());
  }
}
