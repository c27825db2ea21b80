//! Posting-service client: media upload, thread chaining, doomsday fallback.
//!
//! Thin wrapper over the X API v2. Two operations matter:
//! - upload a local image file and get back a media handle
//! - post a chain of tweets, each replying to the previous one
//!
//! A short delay separates thread posts so the reply target has propagated
//! before the next post references it. When the whole pipeline fails at the
//! posting step, [`XClient::doomsday_post`] sends one static post from a
//! small pool; its own failure is logged and swallowed.

use crate::models::ThreadItem;
use crate::utils::truncate_post;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const TWEETS_ENDPOINT: &str = "https://api.x.com/2/tweets";
const MEDIA_UPLOAD_ENDPOINT: &str = "https://api.x.com/2/media/upload";

/// Hard per-post character limit.
pub const MAX_POST_LEN: usize = 280;

/// Pause between thread posts so the reply target propagates.
const THREAD_POST_DELAY: Duration = Duration::from_secs(2);

/// Static posts for when the primary pipeline fails at the posting step.
const DOOMSDAY_POSTS: [&str; 3] = [
    "Some days the garage stays closed. Back tomorrow with another machine worth knowing. 🔧",
    "Pit stop today. Tomorrow: more engineering stories from the golden age of speed. 🏁",
    "Even the best engines need a cooldown lap. See you tomorrow. 🏎️",
];

// ---- wire models ----

#[derive(Serialize)]
struct TweetRequest {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<TweetMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<TweetReply>,
}

#[derive(Serialize)]
struct TweetMedia {
    media_ids: Vec<String>,
}

#[derive(Serialize)]
struct TweetReply {
    in_reply_to_tweet_id: String,
}

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Deserialize)]
struct MediaUploadResponse {
    data: MediaUploadData,
}

#[derive(Deserialize)]
struct MediaUploadData {
    id: String,
}

/// X API client holding the shared HTTP client and the access token.
#[derive(Clone)]
pub struct XClient {
    http: reqwest::Client,
    token: String,
}

impl fmt::Debug for XClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XClient")
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl XClient {
    /// Build a client sharing the process-wide HTTP client.
    pub fn new(http: &reqwest::Client, token: String) -> Self {
        Self {
            http: http.clone(),
            token,
        }
    }

    /// Upload one local image file; returns the media handle to attach.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn upload_media(&self, path: &Path) -> Result<String, Box<dyn Error>> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self
            .http
            .post(MEDIA_UPLOAD_ENDPOINT)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json::<MediaUploadResponse>()
            .await?;

        info!(media_id = %response.data.id, "Uploaded media");
        Ok(response.data.id)
    }

    /// Post one tweet, optionally with media and a reply target.
    async fn post_one(
        &self,
        text: &str,
        media_id: Option<&str>,
        reply_to: Option<&str>,
    ) -> Result<String, Box<dyn Error>> {
        let request = TweetRequest {
            text: truncate_post(text, MAX_POST_LEN),
            media: media_id.map(|id| TweetMedia {
                media_ids: vec![id.to_string()],
            }),
            reply: reply_to.map(|id| TweetReply {
                in_reply_to_tweet_id: id.to_string(),
            }),
        };

        let response = self
            .http
            .post(TWEETS_ENDPOINT)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<TweetResponse>()
            .await?;
        Ok(response.data.id)
    }

    /// Post a thread, chaining each item as a reply to the previous one.
    ///
    /// Returns the posted tweet ids in order. A failure partway through is
    /// an error for the whole thread; the ids posted so far are logged but
    /// the run treats the post as failed (no history append).
    #[instrument(level = "info", skip_all, fields(items = items.len()))]
    pub async fn post_thread(&self, items: &[ThreadItem]) -> Result<Vec<String>, Box<dyn Error>> {
        let mut ids: Vec<String> = Vec::with_capacity(items.len());

        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                sleep(THREAD_POST_DELAY).await;
            }
            let reply_to = ids.last().map(String::as_str);
            match self
                .post_one(&item.text, item.media_id.as_deref(), reply_to)
                .await
            {
                Ok(id) => {
                    info!(index = i, tweet_id = %id, "Posted thread segment");
                    ids.push(id);
                }
                Err(e) => {
                    error!(index = i, posted = ids.len(), error = %e, "Thread post failed");
                    return Err(e);
                }
            }
        }

        Ok(ids)
    }

    /// Best-effort static post for total pipeline failure. Never errors;
    /// a failure here is logged and dropped.
    #[instrument(level = "info", skip_all)]
    pub async fn doomsday_post(&self, rng: &mut impl Rng) {
        let text = DOOMSDAY_POSTS.choose(rng).copied().unwrap_or(DOOMSDAY_POSTS[0]);
        match self.post_one(text, None, None).await {
            Ok(id) => info!(tweet_id = %id, "Doomsday post sent"),
            Err(e) => warn!(error = %e, "Doomsday post failed"),
        }
    }
}

/// Pair thread texts with uploaded media handles: segment *i* carries media
/// *i*. Extra media handles are ignored; missing ones leave the segment
/// text-only.
pub fn compose_items(texts: Vec<String>, media_ids: Vec<String>) -> Vec<ThreadItem> {
    let mut media_ids = media_ids.into_iter();
    texts
        .into_iter()
        .map(|text| ThreadItem {
            text,
            media_id: media_ids.next(),
        })
        .collect()
}
