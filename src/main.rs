//! # Redline Bot
//!
//! An automated supercar spotlight bot: picks a previously-unposted car from
//! Wikipedia's marque and class categories, asks an LLM for a three-segment
//! technical thread, finds matching photos via image search, and posts the
//! thread with the images attached.
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... GOOGLE_SEARCH_API_KEY=... SEARCH_ENGINE_ID=... \
//! X_ACCESS_TOKEN=... redline_bot
//! ```
//!
//! ## Architecture
//!
//! One sequential pipeline per process run:
//! 1. **Topic selection**: Wikipedia category sampling with a backup-list
//!    fallback chain, deduplicated against `posted_history.txt`
//! 2. **Generation**: Gemini thread copy with retry and a static fallback
//! 3. **Images**: keyword-validated image search and download (per-angle or
//!    gallery strategy)
//! 4. **Posting**: media upload, reply-chained thread, doomsday fallback
//! 5. **Bookkeeping**: history append on success, unconditional temp-file
//!    cleanup
//!
//! No phase failure is fatal: upstream errors degrade their phase's output
//! and the run always reaches cleanup.

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod history;
mod images;
mod models;
mod post;
mod topics;
mod utils;

use cli::Cli;
use images::ImageSearchConfig;
use post::XClient;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("redline_bot starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.history_file, ?args.image_strategy, min_images = args.min_images, "Parsed CLI arguments");

    // Early check: ensure the image download dir is writable
    let image_dir: PathBuf = match &args.image_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::temp_dir(),
    };
    if let Err(e) = ensure_writable_dir(&image_dir.to_string_lossy()).await {
        error!(
            path = %image_dir.display(),
            error = %e,
            "Image directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load history & build shared clients ----
    let posted_history = history::load_history(&args.history_file).await?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("redline_bot/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let mut rng = StdRng::from_os_rng();

    // ---- Topic selection ----
    let (topic, source) = topics::choose_topic(&http, &posted_history, &mut rng).await;
    info!(%topic, ?source, "Topic chosen for this run");

    // ---- Thread generation ----
    let thread_texts = match &args.gemini_api_key {
        Some(key) => api::generate_thread(&http, key, &topic, &mut rng).await,
        None => {
            warn!("GEMINI_API_KEY not set; using fallback thread copy");
            api::fallback_thread(&topic)
        }
    };
    for (i, text) in thread_texts.iter().enumerate() {
        debug!(index = i, chars = text.chars().count(), "Thread segment ready");
    }

    // ---- Image fetch ----
    let search_config = match (&args.google_search_api_key, &args.search_engine_id) {
        (Some(api_key), Some(engine_id)) => Some(ImageSearchConfig {
            api_key: api_key.clone(),
            engine_id: engine_id.clone(),
        }),
        _ => None,
    };
    let image_paths = match &search_config {
        Some(cfg) => {
            images::fetch_images(&http, cfg, &topic, args.image_strategy, &image_dir, &mut rng)
                .await
        }
        None => {
            warn!("Image search credentials not set; proceeding without media");
            Vec::new()
        }
    };
    info!(count = image_paths.len(), "Image fetch phase complete");

    // ---- Post ----
    let mut posted = false;
    if !images::meets_image_floor(args.min_images, image_paths.len()) {
        warn!(
            found = image_paths.len(),
            required = args.min_images,
            "Too few validated images; skipping the post"
        );
    } else if args.dry_run {
        for (i, text) in thread_texts.iter().enumerate() {
            info!(index = i, %text, "Dry run: thread segment");
        }
        info!(images = image_paths.len(), "Dry run: skipping upload and post");
    } else if let Some(token) = &args.x_access_token {
        let client = XClient::new(&http, token.clone());

        // Uploads are sequential: one awaited call per file, failures skipped.
        use futures::stream::{self, StreamExt};
        let media_ids: Vec<String> = stream::iter(image_paths.clone())
            .then(|path| {
                let client = client.clone();
                async move {
                    match client.upload_media(&path).await {
                        Ok(id) => Some(id),
                        Err(e) => {
                            error!(path = %path.display(), error = %e, "Media upload failed; skipping file");
                            None
                        }
                    }
                }
            })
            .filter_map(std::future::ready)
            .collect()
            .await;

        let items = post::compose_items(thread_texts, media_ids);
        match client.post_thread(&items).await {
            Ok(ids) => {
                posted = true;
                if let Some(first) = ids.first() {
                    info!(tweet_id = %first, url = %format!("https://x.com/i/status/{first}"), "Thread posted");
                }
                if let Err(e) = history::append_topic(&args.history_file, &topic).await {
                    error!(error = %e, "Failed to record topic in history");
                }
            }
            Err(e) => {
                error!(error = %e, "Thread post failed; attempting doomsday post");
                client.doomsday_post(&mut rng).await;
            }
        }
    } else {
        warn!("X_ACCESS_TOKEN not set; skipping the post");
    }

    // ---- Cleanup (unconditional) ----
    images::cleanup_images(&image_paths).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        posted,
        "Execution complete"
    );

    Ok(())
}
