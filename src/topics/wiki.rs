//! Wikipedia category-based topic discovery.
//!
//! Picks a random category from a fixed list of marque/engine/class
//! categories, fetches its members through the MediaWiki API, and filters
//! them down to specific, unposted car models. Random category sampling
//! with a bounded attempt budget trades completeness for a small, fixed
//! number of external calls per run: the selector may miss an available
//! title in an unsampled category, and that is accepted.

use crate::models::CategoryMembersResponse;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::error::Error;
use tracing::{debug, error, info, instrument};

const WIKI_API: &str = "https://en.wikipedia.org/w/api.php";

/// Category attempts per run. Each attempt costs one API call.
const MAX_ATTEMPTS: usize = 5;

/// Member entries requested per category.
const MEMBER_LIMIT: u32 = 150;

/// Categories sampled for topics. All are populated with specific models,
/// not just marque overview pages.
const WIKI_CATEGORIES: [&str; 16] = [
    "Category:Hypercars",
    "Category:Grand_tourers",
    "Category:Homologation_specials",
    "Category:V12_engine_automobiles",
    "Category:V10_engine_automobiles",
    "Category:Bugatti_vehicles",
    "Category:Koenigsegg_vehicles",
    "Category:Pagani_vehicles",
    "Category:McLaren_vehicles",
    "Category:Lamborghini_vehicles",
    "Category:Ferrari_vehicles",
    "Category:Porsche_vehicles",
    "Category:Aston_Martin_vehicles",
    "Category:Lotus_vehicles",
    "Category:Maserati_vehicles",
    "Category:Alfa_Romeo_vehicles",
];

/// Generic terms that name a class of car rather than a specific model.
/// Matched against the whole lowercased title.
const GENERIC_TERMS: [&str; 13] = [
    "luxury car",
    "concept car",
    "sports car",
    "supercar",
    "hypercar",
    "race car",
    "automobile",
    "vehicle",
    "car",
    "railcar",
    "limousine",
    "truck",
    "suv",
];

/// Namespace prefixes that mark non-article pages.
const NAMESPACE_PREFIXES: [&str; 4] = ["category:", "file:", "template:", "user:"];

/// Whether a category member title is a usable, unposted car model.
///
/// Rejects namespace pages, "List of ..." indexes, talk pages, denylisted
/// generic terms (exact match, case-insensitive), and anything already in
/// the history. History matching uses the raw title.
fn is_valid_member(title: &str, history: &HashSet<String>) -> bool {
    let lowered = title.to_lowercase();
    if NAMESPACE_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return false;
    }
    if lowered.contains("list of") || lowered.contains("talk:") {
        return false;
    }
    if GENERIC_TERMS.contains(&lowered.as_str()) {
        return false;
    }
    !history.contains(title)
}

/// Fetch the member titles of one category.
async fn fetch_category_members(
    http: &reqwest::Client,
    category: &str,
) -> Result<Vec<String>, Box<dyn Error>> {
    let limit = MEMBER_LIMIT.to_string();
    let response = http
        .get(WIKI_API)
        .query(&[
            ("action", "query"),
            ("list", "categorymembers"),
            ("cmtitle", category),
            ("cmlimit", limit.as_str()),
            ("format", "json"),
            ("origin", "*"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json::<CategoryMembersResponse>()
        .await?;

    let members = response
        .query
        .map(|q| q.categorymembers)
        .unwrap_or_default()
        .into_iter()
        .map(|m| m.title)
        .collect::<Vec<_>>();
    Ok(members)
}

/// Select one previously-unposted topic, or `None` if the attempt budget
/// is exhausted without a survivor.
///
/// Each attempt samples one category uniformly at random and re-filters its
/// members. Fetch or parse errors on an attempt are logged and treated as
/// zero survivors for that attempt; the run is never aborted from here.
#[instrument(level = "info", skip_all)]
pub async fn select_topic(
    http: &reqwest::Client,
    history: &HashSet<String>,
    rng: &mut impl Rng,
) -> Option<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let category = WIKI_CATEGORIES.choose(rng).copied()?;
        debug!(attempt, category, "Sampling category");

        let members = match fetch_category_members(http, category).await {
            Ok(members) => members,
            Err(e) => {
                error!(attempt, category, error = %e, "Category fetch failed");
                continue;
            }
        };

        let survivors: Vec<String> = members
            .into_iter()
            .filter(|title| is_valid_member(title, history))
            .collect();
        info!(
            attempt,
            category,
            survivors = survivors.len(),
            "Filtered category members"
        );

        if let Some(title) = survivors.choose(rng) {
            return Some(title.trim().to_string());
        }
    }
    None
}
