use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A person shown next to a pull request in list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
  pub login: String,
  #[serde(default)]
  pub avatar_url: String,
}

impl Reviewer {
  pub fn new(login: impl Into<String>, avatar_url: impl Into<String>) -> Self {
    Self {
      login: login.into(),
      avatar_url: avatar_url.into(),
    }
  }
}

/// Reviewers per pull request, keyed by the PR number rendered as a string.
///
/// An empty list means "fetched, nobody requested" and is distinct from a missing key.
pub type ReviewerMap = BTreeMap<String, Vec<Reviewer>>;

/// `owner/repo` as typed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
  pub owner: String,
  pub repo: String,
}

impl FromStr for RepoSlug {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().split_once('/') {
      Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
        Ok(Self {
          owner: owner.to_string(),
          repo: repo.to_string(),
        })
      }
      _ => Err(format!("expected OWNER/REPO, got '{}'", s)),
    }
  }
}

impl fmt::Display for RepoSlug {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.owner, self.repo)
  }
}
