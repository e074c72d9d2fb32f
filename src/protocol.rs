//! Messages exchanged with the UI.
//!
//! Requests are JSON objects tagged by `type`; every request gets exactly one [`LookupResult`].

use serde::Deserialize;
use std::collections::HashSet;

use crate::cache::{LookupResult, ReviewerCache};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
  /// Reviewers for some pull requests of one repository
  GetReviewers {
    owner: String,
    repo: String,
    #[serde(rename = "prNumbers")]
    pr_numbers: Vec<u64>,
  },
  /// Drop one repository's cache, or all of it when both fields are omitted
  ClearCache {
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    repo: Option<String>,
  },
}

/// Parse and answer one raw message. Never fails; problems become failure results.
pub async fn handle_message(cache: &ReviewerCache, raw: &str) -> LookupResult {
  match serde_json::from_str::<Request>(raw) {
    Ok(request) => handle_request(cache, request).await,
    Err(e) => LookupResult::failure(format!("Invalid request: {}", e)),
  }
}

pub async fn handle_request(cache: &ReviewerCache, request: Request) -> LookupResult {
  match request {
    Request::GetReviewers {
      owner,
      repo,
      pr_numbers,
    } => {
      if owner.is_empty() || repo.is_empty() {
        return LookupResult::failure("owner and repo are required");
      }
      match normalize_numbers(&pr_numbers) {
        Ok(numbers) => cache.get_results(&owner, &repo, &numbers).await,
        Err(message) => LookupResult::failure(message),
      }
    }
    Request::ClearCache {
      owner: Some(owner),
      repo: Some(repo),
    } => match cache.clear_partition(&owner, &repo).await {
      Ok(()) => LookupResult::done(),
      Err(e) => LookupResult::failure(e.to_string()),
    },
    Request::ClearCache {
      owner: None,
      repo: None,
    } => match cache.clear_all().await {
      Ok(_) => LookupResult::done(),
      Err(e) => LookupResult::failure(e.to_string()),
    },
    Request::ClearCache { .. } => {
      LookupResult::failure("CLEAR_CACHE needs both owner and repo, or neither")
    }
  }
}

/// De-duplicate (first occurrence wins) and reject empty lists and zero.
fn normalize_numbers(numbers: &[u64]) -> Result<Vec<u64>, String> {
  if numbers.is_empty() {
    return Err("prNumbers must not be empty".to_string());
  }
  if numbers.contains(&0) {
    return Err("prNumbers must be positive".to_string());
  }

  let mut seen = HashSet::with_capacity(numbers.len());
  Ok(
    numbers
      .iter()
      .copied()
      .filter(|n| seen.insert(*n))
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{KeyValueStore, MemoryStore, ReviewerSource};
  use crate::github::error::FetchError;
  use crate::github::types::{Reviewer, ReviewerMap};
  use async_trait::async_trait;
  use std::sync::{Arc, Mutex};

  #[derive(Default)]
  struct EchoSource {
    calls: Mutex<Vec<Vec<u64>>>,
  }

  #[async_trait]
  impl ReviewerSource for EchoSource {
    async fn fetch(&self, _owner: &str, _repo: &str, numbers: &[u64]) -> Result<ReviewerMap, FetchError> {
      self.calls.lock().unwrap().push(numbers.to_vec());
      Ok(
        numbers
          .iter()
          .map(|n| (n.to_string(), vec![Reviewer::new("amy", "a.png")]))
          .collect(),
      )
    }
  }

  fn cache() -> (ReviewerCache, Arc<MemoryStore>, Arc<EchoSource>) {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(EchoSource::default());
    (
      ReviewerCache::new(store.clone(), source.clone()),
      store,
      source,
    )
  }

  #[test]
  fn test_parse_get_reviewers() {
    let request: Request = serde_json::from_str(
      r#"{"type":"GET_REVIEWERS","owner":"octo","repo":"hello","prNumbers":[3,1]}"#,
    )
    .unwrap();
    assert_eq!(
      request,
      Request::GetReviewers {
        owner: "octo".into(),
        repo: "hello".into(),
        pr_numbers: vec![3, 1],
      }
    );
  }

  #[test]
  fn test_parse_clear_cache() {
    let request: Request = serde_json::from_str(r#"{"type":"CLEAR_CACHE"}"#).unwrap();
    assert_eq!(
      request,
      Request::ClearCache {
        owner: None,
        repo: None
      }
    );
  }

  #[test]
  fn test_normalize_numbers() {
    assert_eq!(normalize_numbers(&[3, 1, 3, 2, 1]), Ok(vec![3, 1, 2]));
    assert!(normalize_numbers(&[]).is_err());
    assert!(normalize_numbers(&[1, 0]).is_err());
  }

  #[tokio::test]
  async fn test_handle_get_reviewers_dedupes_before_fetch() {
    let (cache, _store, source) = cache();
    let result = handle_message(
      &cache,
      r#"{"type":"GET_REVIEWERS","owner":"octo","repo":"hello","prNumbers":[2,2,4]}"#,
    )
    .await;

    assert!(result.success);
    assert_eq!(result.from_cache, Some(false));
    assert_eq!(*source.calls.lock().unwrap(), vec![vec![2, 4]]);
  }

  #[tokio::test]
  async fn test_handle_rejects_bad_messages() {
    let (cache, _store, source) = cache();

    for raw in [
      "not json",
      r#"{"type":"GET_SETTINGS"}"#,
      r#"{"type":"GET_REVIEWERS","owner":"octo","repo":"hello","prNumbers":[]}"#,
      r#"{"type":"GET_REVIEWERS","owner":"octo","repo":"hello","prNumbers":[-1]}"#,
      r#"{"type":"GET_REVIEWERS","owner":"","repo":"hello","prNumbers":[1]}"#,
      r#"{"type":"CLEAR_CACHE","owner":"octo"}"#,
    ] {
      let result = handle_message(&cache, raw).await;
      assert!(!result.success, "accepted {}", raw);
      assert!(!result.error.unwrap_or_default().is_empty());
    }
    assert!(source.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_handle_clear_cache() {
    let (cache, store, _source) = cache();
    cache.get_results("octo", "hello", &[1]).await;
    cache.get_results("octo", "world", &[1]).await;

    let result = handle_message(
      &cache,
      r#"{"type":"CLEAR_CACHE","owner":"octo","repo":"hello"}"#,
    )
    .await;
    assert_eq!(result, LookupResult::done());
    assert_eq!(store.keys().await.unwrap(), vec!["reviewers:octo/world".to_string()]);

    let result = handle_message(&cache, r#"{"type":"CLEAR_CACHE"}"#).await;
    assert!(result.success);
    assert!(store.keys().await.unwrap().is_empty());
  }

  #[test]
  fn test_response_wire_shape() {
    let mut data = ReviewerMap::new();
    data.insert("1".into(), vec![Reviewer::new("amy", "a.png")]);

    assert_eq!(
      serde_json::to_value(LookupResult::from_cache(data)).unwrap(),
      serde_json::json!({
        "success": true,
        "data": { "1": [{ "login": "amy", "avatarUrl": "a.png" }] },
        "fromCache": true
      })
    );
    assert_eq!(
      serde_json::to_value(LookupResult::failure("nope")).unwrap(),
      serde_json::json!({ "success": false, "error": "nope" })
    );
  }
}
