use reqwest::StatusCode;
use thiserror::Error;

/// Errors from a reviewer fetch against the remote API.
#[derive(Error, Debug)]
pub enum FetchError {
  /// No API token is available from the credential provider
  #[error("GitHub API token not found. Set PRLENS_GITHUB_TOKEN or GITHUB_TOKEN.")]
  MissingToken,

  /// The API answered with a non-success HTTP status
  #[error("GitHub API request failed with status {status}")]
  Transport { status: StatusCode },

  /// The API answered 200 but reported errors in the GraphQL payload
  #[error("GitHub API error: {0}")]
  Remote(String),

  /// The request never produced a usable response (connect, timeout, decode)
  #[error("GitHub API request failed: {0}")]
  Network(#[from] reqwest::Error),
}
