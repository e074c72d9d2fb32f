//! API token lookup.
//!
//! Tokens are resolved on every fetch so a missing token fails the request, not startup.

/// Checked in order; the first non-blank value wins.
const TOKEN_VARS: [&str; 2] = ["PRLENS_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Supplies the bearer token for API calls.
pub trait TokenProvider: Send + Sync {
  fn token(&self) -> Option<String>;
}

/// Reads the token from the environment.
///
/// Checks PRLENS_GITHUB_TOKEN first, then GITHUB_TOKEN as fallback.
#[derive(Debug, Clone, Default)]
pub struct EnvToken;

impl TokenProvider for EnvToken {
  fn token(&self) -> Option<String> {
    first_token(|name| std::env::var(name).ok())
  }
}

fn first_token(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
  TOKEN_VARS
    .iter()
    .filter_map(|name| lookup(name))
    .map(|value| value.trim().to_string())
    .find(|value| !value.is_empty())
}

/// A fixed token, or none at all.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

#[cfg(test)]
impl TokenProvider for StaticToken {
  fn token(&self) -> Option<String> {
    self.0.clone().filter(|t| !t.is_empty())
  }
}
