//! Newline-delimited JSON host: one request per input line, one response per output line.

use color_eyre::{eyre::eyre, Result};
use futures::{future, stream, StreamExt};
use std::string::FromUtf8Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::cache::{LookupResult, ReviewerCache};
use crate::protocol;

/// Requests handled concurrently. Responses still go out in request order.
const MAX_IN_FLIGHT: usize = 16;

/// Answer requests from `input` on `output` until `input` closes.
///
/// Background refreshes started while serving are awaited before returning.
pub async fn run<R, W>(cache: &ReviewerCache, input: R, mut output: W) -> Result<()>
where
  R: AsyncBufRead + Unpin,
  W: AsyncWrite + Unpin,
{
  info!("Serving reviewer requests");

  let lines = stream::unfold(input, |mut input| async move {
    let mut raw = Vec::new();
    match input.read_until(b'\n', &mut raw).await {
      Ok(0) => None,
      Ok(_) => Some((raw, input)),
      Err(e) => {
        warn!(error = %e, "Failed to read request, stopping");
        None
      }
    }
  });

  let responses = lines
    .filter_map(|raw| future::ready(decode_line(raw)))
    .map(|line| async move {
      match line {
        Ok(line) => protocol::handle_message(cache, &line).await,
        Err(e) => {
          warn!(error = %e, "Request line is not valid UTF-8");
          LookupResult::failure("Invalid request: not UTF-8")
        }
      }
    })
    .buffered(MAX_IN_FLIGHT);
  futures::pin_mut!(responses);

  let mut handled = 0usize;
  while let Some(response) = responses.next().await {
    let mut bytes =
      serde_json::to_vec(&response).map_err(|e| eyre!("Failed to encode response: {}", e))?;
    bytes.push(b'\n');
    output
      .write_all(&bytes)
      .await
      .map_err(|e| eyre!("Failed to write response: {}", e))?;
    output
      .flush()
      .await
      .map_err(|e| eyre!("Failed to flush response: {}", e))?;
    handled += 1;
  }

  info!(handled, "Input closed, waiting for background refreshes");
  cache.wait_for_refreshes().await;
  Ok(())
}

/// Blank lines yield `None`. Anything else is the line without its terminator.
fn decode_line(mut raw: Vec<u8>) -> Option<Result<String, FromUtf8Error>> {
  if raw.iter().all(u8::is_ascii_whitespace) {
    return None;
  }
  while matches!(raw.last(), Some(b'\n' | b'\r')) {
    raw.pop();
  }
  Some(String::from_utf8(raw))
}
