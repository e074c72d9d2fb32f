//! Serde-deserializable types matching GitHub GraphQL responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;
use std::collections::HashMap;

use super::types::{Reviewer, ReviewerMap};

/// Upper bound GitHub accepts for `first:` on a connection.
const REVIEW_REQUEST_PAGE: u32 = 100;

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiResponse {
  pub data: Option<ApiData>,
  pub errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
  #[serde(default)]
  pub message: String,
}

impl ApiResponse {
  /// First error message reported by the API, if any.
  pub fn first_error(&self) -> Option<String> {
    let first = self.errors.as_ref()?.first()?;
    if first.message.is_empty() {
      Some("Unknown GraphQL error".to_string())
    } else {
      Some(first.message.clone())
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiData {
  /// Aliased pull requests (`pr0`, `pr1`, ...). Sparse: aliases may be absent or null.
  pub repository: Option<HashMap<String, Option<ApiPullRequest>>>,
}

// ============================================================================
// Pull request fields
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPullRequest {
  #[serde(rename = "reviewRequests")]
  pub review_requests: Option<ApiConnection<ApiReviewRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiConnection<T> {
  pub nodes: Option<Vec<Option<T>>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiReviewRequest {
  #[serde(rename = "requestedReviewer")]
  pub requested_reviewer: Option<ApiUser>,
}

/// A requested reviewer. Teams come back as `{}` because only the User fragment is selected.
#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub login: Option<String>,
  #[serde(rename = "avatarUrl")]
  pub avatar_url: Option<String>,
}

// ============================================================================
// Batched query
// ============================================================================

/// One GraphQL document that asks for several pull requests at once.
///
/// Each number is aliased `pr{index}`; `aliases` maps the alias back to the number.
#[derive(Debug, Clone)]
pub struct ReviewerQuery {
  document: String,
  aliases: HashMap<String, u64>,
}

impl ReviewerQuery {
  pub fn new(numbers: &[u64]) -> Self {
    let mut aliases = HashMap::with_capacity(numbers.len());
    let mut selections = String::new();

    for (index, number) in numbers.iter().enumerate() {
      let alias = format!("pr{}", index);
      selections.push_str(&format!(
        "    {}: pullRequest(number: {}) {{ ...reviewers }}\n",
        alias, number
      ));
      aliases.insert(alias, *number);
    }

    let document = format!(
      "query($owner: String!, $name: String!) {{\n  repository(owner: $owner, name: $name) {{\n{}  }}\n}}\n\
       fragment reviewers on PullRequest {{\n  reviewRequests(first: {}) {{\n    nodes {{ requestedReviewer {{ ... on User {{ login avatarUrl }} }} }}\n  }}\n}}\n",
      selections, REVIEW_REQUEST_PAGE
    );

    Self { document, aliases }
  }

  pub fn document(&self) -> &str {
    &self.document
  }

  /// Request body with the repository passed as variables.
  pub fn body(&self, owner: &str, repo: &str) -> serde_json::Value {
    serde_json::json!({
      "query": self.document(),
      "variables": { "owner": owner, "name": repo },
    })
  }

  /// Map whatever aliases came back onto PR numbers. Unknown aliases are ignored.
  pub fn collect(&self, data: Option<ApiData>) -> ReviewerMap {
    let repository = match data.and_then(|d| d.repository) {
      Some(repository) => repository,
      None => return ReviewerMap::new(),
    };

    repository
      .into_iter()
      .filter_map(|(alias, pr)| {
        let number = self.aliases.get(&alias)?;
        Some((number.to_string(), pr?.into_reviewers()))
      })
      .collect()
  }
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiPullRequest {
  pub fn into_reviewers(self) -> Vec<Reviewer> {
    self
      .review_requests
      .and_then(|c| c.nodes)
      .unwrap_or_default()
      .into_iter()
      .flatten()
      .filter_map(|request| request.requested_reviewer)
      .filter_map(|user| {
        let login = user.login.filter(|l| !l.is_empty())?;
        Some(Reviewer::new(login, user.avatar_url.unwrap_or_default()))
      })
      .collect()
  }
}
