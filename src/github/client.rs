use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::ReviewerSource;
use crate::config::GithubConfig;

use super::api_types::{ApiResponse, ReviewerQuery};
use super::credentials::TokenProvider;
use super::error::FetchError;
use super::types::ReviewerMap;

/// GitHub GraphQL client for reviewer lookups
#[derive(Clone)]
pub struct GithubClient {
  http: reqwest::Client,
  graphql_url: Url,
  credentials: Arc<dyn TokenProvider>,
}

impl GithubClient {
  pub fn new(config: &GithubConfig, credentials: Arc<dyn TokenProvider>) -> Result<Self> {
    let graphql_url = Url::parse(&config.graphql_url)
      .map_err(|e| eyre!("Invalid GitHub GraphQL URL '{}': {}", config.graphql_url, e))?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("prlens/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      graphql_url,
      credentials,
    })
  }
}

#[async_trait]
impl ReviewerSource for GithubClient {
  async fn fetch(&self, owner: &str, repo: &str, numbers: &[u64]) -> Result<ReviewerMap, FetchError> {
    let token = self.credentials.token().ok_or(FetchError::MissingToken)?;
    let query = ReviewerQuery::new(numbers);

    debug!(owner, repo, ?numbers, "Fetching reviewers");

    let response = self
      .http
      .post(self.graphql_url.clone())
      .bearer_auth(token)
      .json(&query.body(owner, repo))
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Transport { status });
    }

    let payload: ApiResponse = response.json().await?;
    if let Some(message) = payload.first_error() {
      return Err(FetchError::Remote(message));
    }

    Ok(query.collect(payload.data))
  }
}
