//! Append-only history of posted topics.
//!
//! The history file is the only durable state the bot owns: a
//! newline-delimited list of raw topic titles, one per successful post.
//! It is loaded once at run start into a set and appended exactly once when
//! a post goes out. The file is never rewritten or deduplicated; duplicate
//! lines collapse naturally when loaded into the set.

use std::collections::HashSet;
use std::error::Error;
use std::io::ErrorKind;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Load the posted-topic history from a newline-delimited file.
///
/// A missing file is a normal first run and yields an empty set. Blank
/// lines are skipped; titles are kept in their raw stored form.
///
/// # Errors
///
/// Returns an error for any I/O failure other than the file not existing.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn load_history(path: &str) -> Result<HashSet<String>, Box<dyn Error>> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No history file yet; starting with an empty set");
            return Ok(HashSet::new());
        }
        Err(e) => return Err(Box::new(e)),
    };

    let history: HashSet<String> = data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    info!(count = history.len(), "Loaded posted-topic history");
    debug!(?history, "History contents");
    Ok(history)
}

/// Append one topic to the history file, creating the file if needed.
///
/// Called only after a successful post, so a failed or skipped post never
/// grows the file.
#[instrument(level = "info", skip_all, fields(path = %path, topic = %topic))]
pub async fn append_topic(path: &str, topic: &str) -> Result<(), Box<dyn Error>> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", topic).as_bytes()).await?;
    info!("Recorded topic in history");
    Ok(())
}
