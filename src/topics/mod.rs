//! Topic selection for the daily spotlight post.
//!
//! Selection is an explicit ordered chain of strategies, each tried only
//! when the previous one yields nothing:
//!
//! 1. [`wiki`]: pick a random Wikipedia car category, filter its members
//!    against the denylist and the posted-topic history, pick a survivor.
//! 2. [`backup`]: pick from the curated backup list, filtered against
//!    history first.
//! 3. [`backup`] again, unfiltered: tolerate one repeat rather than post
//!    nothing at all.
//!
//! Titles are stored and matched in their raw Wikipedia form. No qualifier
//! stripping is applied anywhere, so `"Ford GT40"` and `"Ford GT40 (2004)"`
//! are distinct topics; that is the deduplication contract, limits and all.

use rand::Rng;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

pub mod backup;
pub mod wiki;

/// Which strategy in the fallback chain produced the topic. Carried for
/// logging so a repeat post is visible in the run output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Fresh title from a Wikipedia category.
    Wiki,
    /// Unposted title from the curated backup list.
    Backup,
    /// Backup list exhausted against history; a repeat was tolerated.
    BackupRepeat,
}

/// Choose the topic for this run via the wiki → backup → repeat chain.
///
/// Never fails: the backup list is the floor of the chain.
#[instrument(level = "info", skip_all)]
pub async fn choose_topic(
    http: &reqwest::Client,
    history: &HashSet<String>,
    rng: &mut impl Rng,
) -> (String, SelectionSource) {
    if let Some(topic) = wiki::select_topic(http, history, rng).await {
        info!(%topic, "Selected fresh topic from Wikipedia");
        return (topic, SelectionSource::Wiki);
    }

    warn!("Wikipedia yielded no unposted topic; falling back to backup list");
    let (topic, repeat) = backup::pick_backup(history, rng);
    if repeat {
        warn!(%topic, "Backup list exhausted against history; repeating a topic");
        (topic, SelectionSource::BackupRepeat)
    } else {
        info!(%topic, "Selected topic from backup list");
        (topic, SelectionSource::Backup)
    }
}
