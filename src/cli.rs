//! Command-line interface definitions for Redline Bot.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All credentials come from environment variables; knobs and paths can be
//! set via flags.

use crate::images::ImageStrategy;
use clap::Parser;

/// Command-line arguments for the Redline Bot application.
///
/// # Examples
///
/// ```sh
/// # Normal run with defaults
/// redline_bot
///
/// # Require at least two images and use the gallery strategy
/// redline_bot --min-images 2 --image-strategy gallery
///
/// # Generate everything but post nothing
/// redline_bot --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the newline-delimited posted-topic history file
    #[arg(long, default_value = "posted_history.txt")]
    pub history_file: String,

    /// Directory for temporary image downloads (defaults to the system temp dir)
    #[arg(long)]
    pub image_dir: Option<String>,

    /// Minimum validated images required to post; 0 disables the gate
    #[arg(long, default_value_t = 0)]
    pub min_images: usize,

    /// How images are sourced for the thread
    #[arg(long, value_enum, default_value = "angles")]
    pub image_strategy: ImageStrategy,

    /// Generate the thread and fetch images, but post nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Gemini API key for thread generation
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Google Custom Search API key for image search
    #[arg(long, env = "GOOGLE_SEARCH_API_KEY", hide_env_values = true)]
    pub google_search_api_key: Option<String>,

    /// Google Custom Search engine (cx) identifier
    #[arg(long, env = "SEARCH_ENGINE_ID")]
    pub search_engine_id: Option<String>,

    /// X API access token for media upload and posting
    #[arg(long, env = "X_ACCESS_TOKEN", hide_env_values = true)]
    pub x_access_token: Option<String>,
}
