use chrono::{TimeZone, Utc};
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};

use crate::cache::ReviewerCache;
use crate::github::types::RepoSlug;
use crate::protocol::{self, Request};
use crate::serve;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Answer newline-delimited JSON requests on stdin (default)
  Serve,
  /// Look up reviewers for pull requests, e.g. `lookup rust-lang/cargo 123 456`
  Lookup {
    repo: RepoSlug,
    #[arg(required = true)]
    numbers: Vec<u64>,
  },
  /// Print the cached entry for a repository
  Show { repo: RepoSlug },
  /// List cached repositories
  List,
  /// Remove one repository's cache, or everything
  Clear { repo: Option<RepoSlug> },
}

pub async fn execute(cache: &ReviewerCache, command: Command) -> Result<()> {
  match command {
    Command::Serve => {
      let stdin = tokio::io::BufReader::new(tokio::io::stdin());
      serve::run(cache, stdin, tokio::io::stdout()).await
    }
    Command::Lookup { repo, numbers } => lookup(cache, repo, numbers).await,
    Command::Show { repo } => show(cache, &repo).await,
    Command::List => list(cache).await,
    Command::Clear { repo: Some(repo) } => {
      cache.clear_partition(&repo.owner, &repo.repo).await?;
      println!("Cleared {}", repo);
      Ok(())
    }
    Command::Clear { repo: None } => {
      let count = cache.clear_all().await?;
      println!("Cleared {} repositories", count);
      Ok(())
    }
  }
}

async fn lookup(cache: &ReviewerCache, repo: RepoSlug, numbers: Vec<u64>) -> Result<()> {
  let request = Request::GetReviewers {
    owner: repo.owner,
    repo: repo.repo,
    pr_numbers: numbers,
  };
  let result = protocol::handle_request(cache, request).await;

  let json =
    serde_json::to_string_pretty(&result).map_err(|e| eyre!("Failed to encode result: {}", e))?;
  println!("{}", json);

  // A stale hit started a refresh; let it land before the process exits
  cache.wait_for_refreshes().await;

  match result.error {
    Some(error) if !result.success => Err(eyre!(error)),
    _ => Ok(()),
  }
}

async fn show(cache: &ReviewerCache, repo: &RepoSlug) -> Result<()> {
  let entry = cache
    .inspect(&repo.owner, &repo.repo)
    .await
    .ok_or_else(|| eyre!("Nothing cached for {}", repo))?;

  let age = Utc::now().timestamp_millis() - entry.timestamp;
  let state = if age > cache.stale_time().num_milliseconds() {
    "stale"
  } else {
    "fresh"
  };
  let fetched_at = Utc
    .timestamp_millis_opt(entry.timestamp)
    .single()
    .map(|t| t.to_rfc3339())
    .unwrap_or_else(|| entry.timestamp.to_string());

  println!(
    "{}: {} pull requests, fetched {} ({}s ago, {})",
    repo,
    entry.data.len(),
    fetched_at,
    age / 1000,
    state
  );
  let json = serde_json::to_string_pretty(&entry.data)
    .map_err(|e| eyre!("Failed to encode entry: {}", e))?;
  println!("{}", json);
  Ok(())
}

async fn list(cache: &ReviewerCache) -> Result<()> {
  let partitions = cache.partitions().await?;
  if partitions.is_empty() {
    println!("Cache is empty");
    return Ok(());
  }

  for (owner, repo) in partitions {
    match cache.inspect(&owner, &repo).await {
      Some(entry) => println!("{}/{}\t{} pull requests", owner, repo, entry.data.len()),
      None => println!("{}/{}\t(unreadable)", owner, repo),
    }
  }
  Ok(())
}
