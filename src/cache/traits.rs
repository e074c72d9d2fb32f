//! Core traits for the caching system.

use async_trait::async_trait;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::github::error::FetchError;
use crate::github::types::ReviewerMap;

/// Persistent async key-value store holding JSON values.
///
/// Implementations give no ordering guarantees between concurrent writers to the same key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  /// Get the value stored under `key`. Unreadable values are reported as absent.
  async fn get(&self, key: &str) -> Result<Option<Value>>;

  /// Store `value` under `key`, replacing whatever was there.
  async fn set(&self, key: &str, value: Value) -> Result<()>;

  /// Remove `key`. Removing a missing key is not an error.
  async fn remove(&self, key: &str) -> Result<()>;

  /// All keys currently stored.
  async fn keys(&self) -> Result<Vec<String>>;
}

/// Remote source of reviewer data for one repository.
#[async_trait]
pub trait ReviewerSource: Send + Sync {
  /// Fetch reviewers for `numbers` in a single batched call.
  ///
  /// Numbers the remote does not return are omitted from the result.
  async fn fetch(&self, owner: &str, repo: &str, numbers: &[u64]) -> Result<ReviewerMap, FetchError>;
}

/// Outcome of a lookup, in the shape sent back to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<ReviewerMap>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from_cache: Option<bool>,
}

impl LookupResult {
  /// Freshly fetched data.
  pub fn from_network(data: ReviewerMap) -> Self {
    Self {
      success: true,
      data: Some(data),
      error: None,
      from_cache: Some(false),
    }
  }

  /// Data served from the cache, fresh or stale.
  pub fn from_cache(data: ReviewerMap) -> Self {
    Self {
      success: true,
      data: Some(data),
      error: None,
      from_cache: Some(true),
    }
  }

  /// Success with no payload, for maintenance requests.
  pub fn done() -> Self {
    Self {
      success: true,
      data: None,
      error: None,
      from_cache: None,
    }
  }

  pub fn failure(error: impl Into<String>) -> Self {
    Self {
      success: false,
      data: None,
      error: Some(error.into()),
      from_cache: None,
    }
  }
}
