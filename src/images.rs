//! Image search, validation, and download for the spotlight thread.
//!
//! Two strategies are supported:
//!
//! - **Angles** (default): three fixed-order queries (front 3/4 hero, rear,
//!   engine-bay/interior detail), one downloaded image per angle. Maximizes
//!   variety across the thread.
//! - **Gallery**: walk a ranked list of trusted photo-gallery domains and
//!   take up to four images from the first domain that yields at least four
//!   validated candidates. Trades variety for images that usually come from
//!   the same photoshoot.
//!
//! Every candidate is validated before download: the topic is tokenized
//! into keywords and a candidate is accepted only when at least 75% of the
//! keywords appear in its title or snippet. A run-scoped used-URL set
//! guarantees no URL is downloaded twice. Search and download failures are
//! logged and degrade the result to fewer images; they never abort the run.

use crate::models::{ImageCandidate, ImageSearchResponse};
use chrono::Utc;
use clap::ValueEnum;
use itertools::Itertools;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const SEARCH_API: &str = "https://www.googleapis.com/customsearch/v1";

/// Minimum fraction of topic keywords a candidate must contain.
pub const MATCH_THRESHOLD: f64 = 0.75;

/// Results requested per angle query.
const ANGLE_RESULTS: u32 = 8;

/// Results requested per gallery-domain query.
const GALLERY_RESULTS: u32 = 10;

/// A gallery domain must yield this many validated candidates to win.
const GALLERY_MIN_VALIDATED: usize = 4;

/// Per-download HTTP timeout.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(8);

/// Fixed exclusion clause appended to every query: toys, renders, auction
/// and shopping noise.
const EXCLUSIONS: &str = "-site:pinterest.* -site:ebay.* -site:amazon.* -toy -model -diecast \
     -scale -lego -r/c -drawing -sketch -render -3d -videogame -assetto -forza";

/// Accent colors mixed into angle queries so runs don't all look alike.
const ACCENT_COLORS: [&str; 9] = [
    "Nardo Grey",
    "Rosso Corsa",
    "British Racing Green",
    "Gulf Livery",
    "Triple Black",
    "Liquid Silver",
    "Papaya Orange",
    "Chalk",
    "Midnight Blue",
];

/// Photo-gallery domains for the gallery strategy, best first.
const TRUSTED_GALLERIES: [&str; 5] = [
    "caranddriver.com",
    "motortrend.com",
    "topgear.com",
    "evo.co.uk",
    "supercars.net",
];

/// Credentials for the image-search API, built once at startup.
#[derive(Debug, Clone)]
pub struct ImageSearchConfig {
    /// Custom Search API key.
    pub api_key: String,
    /// Search engine (cx) identifier.
    pub engine_id: String,
}

/// How images are sourced for the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageStrategy {
    /// One image per semantic angle (hero, rear, detail).
    Angles,
    /// Up to four images from the first trusted gallery domain that
    /// produces enough validated candidates.
    Gallery,
}

/// One angle query: a semantic slot plus the composed search string.
#[derive(Debug)]
struct AngleQuery {
    angle: &'static str,
    query: String,
}

/// Compose the three angle queries for a topic, in fixed order.
fn angle_queries(topic: &str, color: &str) -> Vec<AngleQuery> {
    vec![
        AngleQuery {
            angle: "hero",
            query: format!("\"{topic}\" {color} car front 3/4 view 4k {EXCLUSIONS}"),
        },
        AngleQuery {
            angle: "rear",
            query: format!("\"{topic}\" {color} car rear view wallpaper {EXCLUSIONS}"),
        },
        AngleQuery {
            angle: "detail",
            query: format!("\"{topic}\" engine bay or interior cockpit detail {EXCLUSIONS}"),
        },
    ]
}

/// Compose the site-scoped query for one gallery domain.
fn gallery_query(topic: &str, domain: &str) -> String {
    format!("\"{topic}\" photo gallery site:{domain} {EXCLUSIONS}")
}

/// Tokenize a topic into lowercase keywords: words longer than two
/// characters, deduplicated, in order of first appearance.
pub fn topic_keywords(topic: &str) -> Vec<String> {
    topic
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .unique()
        .collect()
}

/// Keep only candidates clearing the match-ratio threshold, in ranked order.
fn validated(items: Vec<ImageCandidate>, keywords: &[String]) -> Vec<ImageCandidate> {
    items
        .into_iter()
        .filter(|c| c.match_ratio(keywords) >= MATCH_THRESHOLD)
        .collect()
}

/// Gallery accept decision: a domain wins only when it yields at least
/// [`GALLERY_MIN_VALIDATED`] validated candidates. The first winner takes
/// the whole batch and ends the domain scan.
fn gallery_selection(accepted: Vec<ImageCandidate>) -> Option<Vec<ImageCandidate>> {
    if accepted.len() >= GALLERY_MIN_VALIDATED {
        Some(accepted)
    } else {
        None
    }
}

/// Min-image gate for the post step: `min_images == 0` disables the gate,
/// otherwise at least that many downloaded images are required.
pub fn meets_image_floor(min_images: usize, available: usize) -> bool {
    min_images == 0 || available >= min_images
}

/// Issue one image search and return the raw candidates.
async fn search_images(
    http: &reqwest::Client,
    cfg: &ImageSearchConfig,
    query: &str,
    num: u32,
) -> Result<Vec<ImageCandidate>, Box<dyn Error>> {
    let num = num.to_string();
    let response = http
        .get(SEARCH_API)
        .query(&[
            ("q", query),
            ("cx", cfg.engine_id.as_str()),
            ("key", cfg.api_key.as_str()),
            ("searchType", "image"),
            ("imgSize", "xlarge"),
            ("num", num.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json::<ImageSearchResponse>()
        .await?;
    Ok(response.items.unwrap_or_default())
}

/// Download one candidate image to `dest`.
///
/// Rejects non-HTTP(S) links up front; search results occasionally contain
/// data: or ftp: URLs that reqwest would refuse anyway.
async fn download_image(
    http: &reqwest::Client,
    link: &str,
    dest: &Path,
) -> Result<(), Box<dyn Error>> {
    let parsed = Url::parse(link)?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("unsupported URL scheme: {}", parsed.scheme()).into());
    }

    let bytes = http
        .get(link)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    tokio::fs::write(dest, &bytes).await?;
    debug!(bytes = bytes.len(), path = %dest.display(), "Downloaded image");
    Ok(())
}

/// Unique temp path for download slot `slot` under `image_dir`.
fn temp_image_path(image_dir: &Path, slot: usize) -> PathBuf {
    image_dir.join(format!(
        "redline_{}_{}.jpg",
        slot,
        Utc::now().timestamp_millis()
    ))
}

/// Download the first unused validated candidate, marking its URL used.
///
/// Failed downloads roll over to the next candidate. Returns the local path
/// of the first success, or `None` when every candidate fails or was
/// already used.
async fn download_first_unused(
    http: &reqwest::Client,
    candidates: &[ImageCandidate],
    used_urls: &mut HashSet<String>,
    image_dir: &Path,
    slot: usize,
) -> Option<PathBuf> {
    for candidate in candidates {
        if used_urls.contains(&candidate.link) {
            continue;
        }
        let dest = temp_image_path(image_dir, slot);
        match download_image(http, &candidate.link, &dest).await {
            Ok(()) => {
                used_urls.insert(candidate.link.clone());
                return Some(dest);
            }
            Err(e) => {
                warn!(link = %candidate.link, error = %e, "Download failed; trying next candidate");
            }
        }
    }
    None
}

/// Fetch images for a topic using the requested strategy.
///
/// Returns the local paths of every downloaded image, possibly empty. The
/// caller owns cleanup via [`cleanup_images`].
#[instrument(level = "info", skip_all, fields(topic = %topic, strategy = ?strategy))]
pub async fn fetch_images(
    http: &reqwest::Client,
    cfg: &ImageSearchConfig,
    topic: &str,
    strategy: ImageStrategy,
    image_dir: &Path,
    rng: &mut impl Rng,
) -> Vec<PathBuf> {
    let keywords = topic_keywords(topic);
    if keywords.is_empty() {
        warn!("Topic produced no keywords; skipping image search");
        return Vec::new();
    }
    debug!(?keywords, "Topic keywords");

    match strategy {
        ImageStrategy::Angles => fetch_angle_images(http, cfg, topic, &keywords, image_dir, rng).await,
        ImageStrategy::Gallery => fetch_gallery_images(http, cfg, topic, &keywords, image_dir).await,
    }
}

/// Angles strategy: one validated image per angle, angles evaluated in
/// fixed order, each independent of the others.
async fn fetch_angle_images(
    http: &reqwest::Client,
    cfg: &ImageSearchConfig,
    topic: &str,
    keywords: &[String],
    image_dir: &Path,
    rng: &mut impl Rng,
) -> Vec<PathBuf> {
    let color = ACCENT_COLORS.choose(rng).copied().unwrap_or(ACCENT_COLORS[0]);
    let mut paths = Vec::new();
    let mut used_urls: HashSet<String> = HashSet::new();

    for (slot, aq) in angle_queries(topic, color).iter().enumerate() {
        let items = match search_images(http, cfg, &aq.query, ANGLE_RESULTS).await {
            Ok(items) => items,
            Err(e) => {
                error!(angle = aq.angle, error = %e, "Image search failed");
                continue;
            }
        };

        let accepted = validated(items, keywords);
        info!(angle = aq.angle, accepted = accepted.len(), "Validated candidates");
        if accepted.is_empty() {
            continue;
        }

        if let Some(path) =
            download_first_unused(http, &accepted, &mut used_urls, image_dir, slot).await
        {
            paths.push(path);
        }
    }

    info!(count = paths.len(), "Angle image fetch complete");
    paths
}

/// Gallery strategy: first trusted domain with enough validated candidates
/// wins; up to four images come from that domain alone.
async fn fetch_gallery_images(
    http: &reqwest::Client,
    cfg: &ImageSearchConfig,
    topic: &str,
    keywords: &[String],
    image_dir: &Path,
) -> Vec<PathBuf> {
    let mut used_urls: HashSet<String> = HashSet::new();

    for domain in TRUSTED_GALLERIES {
        let query = gallery_query(topic, domain);
        let items = match search_images(http, cfg, &query, GALLERY_RESULTS).await {
            Ok(items) => items,
            Err(e) => {
                error!(domain, error = %e, "Gallery search failed");
                continue;
            }
        };

        let accepted = match gallery_selection(validated(items, keywords)) {
            Some(accepted) => accepted,
            None => {
                debug!(domain, "Domain below validation floor");
                continue;
            }
        };

        info!(domain, accepted = accepted.len(), "Gallery domain selected");
        let mut paths = Vec::new();
        for slot in 0..GALLERY_MIN_VALIDATED {
            // Each pass rescans from the front; already-used URLs are skipped.
            match download_first_unused(http, &accepted, &mut used_urls, image_dir, slot).await {
                Some(path) => paths.push(path),
                None => break,
            }
        }
        info!(count = paths.len(), domain, "Gallery image fetch complete");
        return paths;
    }

    warn!("No gallery domain yielded enough validated candidates");
    Vec::new()
}

/// Best-effort removal of downloaded temp files. Runs at the end of every
/// run, success or failure; errors are logged and swallowed.
#[instrument(level = "info", skip_all, fields(count = paths.len()))]
pub async fn cleanup_images(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove temp image");
        }
    }
    info!("Temp image cleanup complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(link: &str, title: &str) -> ImageCandidate {
        ImageCandidate {
            link: link.to_string(),
            title: title.to_string(),
            snippet: None,
        }
    }

    #[test]
    fn test_topic_keywords_drops_short_words() {
        assert_eq!(topic_keywords("BMW M1"), vec!["bmw".to_string()]);
    }

    #[test]
    fn test_topic_keywords_lowercases_and_dedupes() {
        let kw = topic_keywords("Zonda zonda Roadster");
        assert_eq!(kw, vec!["zonda".to_string(), "roadster".to_string()]);
    }

    #[test]
    fn test_bugatti_chiron_review_is_accepted() {
        let kw = topic_keywords("Bugatti Chiron");
        let c = candidate("https://a.example/1.jpg", "2021 Bugatti Chiron Review");
        assert_eq!(c.match_ratio(&kw), 1.0);
        assert!(c.match_ratio(&kw) >= MATCH_THRESHOLD);
    }

    #[test]
    fn test_validated_filters_below_threshold() {
        let kw = topic_keywords("Lamborghini Countach LP400");
        let items = vec![
            candidate("https://a.example/1.jpg", "Lamborghini Countach LP400 press shot"),
            candidate("https://a.example/2.jpg", "Lamborghini factory"),
        ];
        let accepted = validated(items, &kw);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].link, "https://a.example/1.jpg");
    }

    #[test]
    fn test_validated_accepts_exact_threshold() {
        // 3 of 4 keywords = 0.75, accepted at the boundary.
        let kw = vec![
            "mercedes-benz".to_string(),
            "clk".to_string(),
            "gtr".to_string(),
            "strassenversion".to_string(),
        ];
        let c = candidate("https://a.example/3.jpg", "Mercedes-Benz CLK GTR coupe");
        assert!((c.match_ratio(&kw) - 0.75).abs() < f64::EPSILON);
        let accepted = validated(vec![c], &kw);
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn test_angle_queries_fixed_order_and_content() {
        let queries = angle_queries("McLaren F1", "Papaya Orange");
        let angles: Vec<&str> = queries.iter().map(|q| q.angle).collect();
        assert_eq!(angles, vec!["hero", "rear", "detail"]);
        for q in &queries {
            assert!(q.query.contains("\"McLaren F1\""));
            assert!(q.query.contains("-diecast"));
        }
        assert!(queries[0].query.contains("Papaya Orange"));
        assert!(queries[2].query.contains("interior"));
    }

    #[test]
    fn test_gallery_query_is_site_scoped() {
        let q = gallery_query("Pagani Zonda", "evo.co.uk");
        assert!(q.contains("site:evo.co.uk"));
        assert!(q.contains("\"Pagani Zonda\""));
        assert!(q.contains("-toy"));
    }

    #[test]
    fn test_gallery_selection_requires_four_validated() {
        let three: Vec<ImageCandidate> = (0..3)
            .map(|i| candidate(&format!("https://a.example/{i}.jpg"), "Pagani Zonda"))
            .collect();
        assert!(gallery_selection(three).is_none());

        let four: Vec<ImageCandidate> = (0..4)
            .map(|i| candidate(&format!("https://a.example/{i}.jpg"), "Pagani Zonda"))
            .collect();
        assert_eq!(gallery_selection(four).unwrap().len(), 4);
    }

    #[test]
    fn test_first_qualifying_domain_wins() {
        // Per-domain validated batches in ranked order: the scan must stop
        // at the first batch clearing the floor and take that batch whole.
        let batch = |n: usize, tag: &str| -> Vec<ImageCandidate> {
            (0..n)
                .map(|i| candidate(&format!("https://{tag}.example/{i}.jpg"), "Lexus LFA"))
                .collect()
        };
        let per_domain = vec![batch(2, "first"), batch(4, "second"), batch(5, "third")];

        let winner = per_domain
            .into_iter()
            .enumerate()
            .find_map(|(rank, b)| gallery_selection(b).map(|b| (rank, b)));

        let (rank, selected) = winner.unwrap();
        assert_eq!(rank, 1);
        assert_eq!(selected.len(), 4);
        assert!(selected.iter().all(|c| c.link.contains("second")));
    }

    #[test]
    fn test_image_floor_disabled_at_zero() {
        assert!(meets_image_floor(0, 0));
        assert!(meets_image_floor(0, 3));
    }

    #[test]
    fn test_image_floor_blocks_below_minimum() {
        assert!(!meets_image_floor(2, 0));
        assert!(!meets_image_floor(2, 1));
        assert!(meets_image_floor(2, 2));
        assert!(meets_image_floor(2, 3));
    }

    #[test]
    fn test_gallery_domains_are_ranked_and_unique() {
        let unique: HashSet<&str> = TRUSTED_GALLERIES.iter().copied().collect();
        assert_eq!(unique.len(), TRUSTED_GALLERIES.len());
        assert_eq!(TRUSTED_GALLERIES[0], "caranddriver.com");
    }

    #[tokio::test]
    async fn test_download_image_rejects_non_http_schemes() {
        let http = reqwest::Client::new();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.jpg");
        let err = download_image(&http, "ftp://example.com/a.jpg", &dest)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_cleanup_images_removes_files_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("redline_0_1.jpg");
        tokio::fs::write(&present, b"jpeg").await.unwrap();
        let missing = dir.path().join("redline_1_2.jpg");

        cleanup_images(&[present.clone(), missing]).await;
        assert!(!present.exists());
    }

    #[test]
    fn test_temp_image_path_embeds_slot() {
        let p = temp_image_path(Path::new("/tmp"), 2);
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("redline_2_"));
        assert!(name.ends_with(".jpg"));
    }
}
