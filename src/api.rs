//! Generative-text client with bounded retry and fallback copy.
//!
//! Talks to the Gemini REST API to turn a car name into a three-segment
//! thread. The module uses a trait-based design:
//! - [`GenerateAsync`]: core trait for async text generation
//! - [`GeminiClient`]: reqwest-backed implementation
//! - [`RetryGenerate`]: decorator adding exponential backoff to any
//!   `GenerateAsync` implementation
//!
//! Generation can never sink the run: an unparseable response gets one
//! re-ask when it looks truncated, and anything still failing after that
//! falls back to [`fallback_thread`].
//!
//! # Retry Strategy
//!
//! - Maximum 3 retry attempts
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::utils::{looks_truncated, strip_code_fences, truncate_for_log};
use rand::seq::IndexedRandom;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// High creativity so two runs on similar cars don't read alike.
const GENERATION_TEMPERATURE: f32 = 0.85;

const MAX_RETRIES: usize = 3;

/// Persona instruction that keeps the copy technical instead of fluffy.
const SYSTEM_PERSONA: &str = "You are a Technical Automotive Historian. \
Your process: \
1. ANALYZE the specific car model (engine code, designer, production years, lap times). \
2. IDENTIFY what makes it unique. \
3. WRITE a 3-tweet thread based ONLY on these specific facts. \
4. Do NOT use generic fluff like \"masterpiece\" or \"legend\" without explaining WHY.";

/// Editorial angles, one chosen at random per run so threads vary.
const EDITORIAL_ANGLES: [&str; 3] = [
    "Engineering Focus (Chassis, Suspension, Aero)",
    "Powertrain Focus (Engine internals, Sound, Gearbox)",
    "Historical Context (Rivals, Racing heritage, Market impact)",
];

/// Trait for async text generation.
///
/// Implementors send a prompt to a model and return its text response. The
/// abstraction exists so decorators (retry) and test fakes can stand in for
/// the real client.
pub trait GenerateAsync {
    /// The type of response returned by the model.
    type Response;

    /// Send a prompt to the model and receive a response.
    async fn generate(&self, prompt: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Decorator that adds exponential backoff retry logic to any
/// [`GenerateAsync`] implementation.
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryGenerate<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryGenerate<T>
where
    T: GenerateAsync,
{
    /// Wrap an existing [`GenerateAsync`] implementation with retry logic.
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryGenerate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryGenerate")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> GenerateAsync for RetryGenerate<T>
where
    T: GenerateAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn generate(&self, prompt: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.generate(prompt).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "generate() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "generate() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

// ---- Gemini wire models ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: ContentBlock,
    contents: Vec<ContentBlock>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct ContentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini REST client implementing [`GenerateAsync`].
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: &'static str,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    /// Build a client sharing the process-wide HTTP client.
    pub fn new(http: &reqwest::Client, api_key: String) -> Self {
        Self {
            http: http.clone(),
            api_key,
            model: GEMINI_MODEL,
        }
    }
}

impl GenerateAsync for GeminiClient {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn generate(&self, prompt: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let request = GenerateRequest {
            system_instruction: ContentBlock {
                role: None,
                parts: vec![TextPart {
                    text: SYSTEM_PERSONA.to_string(),
                }],
            },
            contents: vec![ContentBlock {
                role: Some("user".to_string()),
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: GENERATION_TEMPERATURE,
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let dt = t0.elapsed();
        if text.is_empty() {
            warn!(elapsed_ms = dt.as_millis() as u128, "Model returned no candidates");
            return Err("empty generation response".into());
        }
        Ok(text)
    }
}

/// Compose the user prompt for one topic and editorial angle.
fn build_prompt(topic: &str, angle: &str) -> String {
    format!(
        "Topic: {topic}.\n\
         Selected Angle: {angle}.\n\n\
         Task: Write a 3-tweet thread.\n\
         - Tweet 1: Hook with HARD DATA (HP, 0-60, engine displacement).\n\
         - Tweet 2: Deep dive into the '{angle}'. Mention specific part names or technologies.\n\
         - Tweet 3: The verdict. Why does this car matter today? Include 4 relevant hashtags.\n\n\
         Constraints:\n\
         - Use technical vocabulary.\n\
         - Each tweet must be 250-280 characters long.\n\
         - Return ONLY a raw JSON array of strings: [\"tweet1\", \"tweet2\", \"tweet3\"]"
    )
}

/// Parse the model's response into thread segments.
///
/// Tolerates markdown fences and wrapping quotes around the JSON array.
pub fn parse_thread(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str::<Vec<String>>(&cleaned)
}

/// Static three-segment thread used when generation fails entirely.
pub fn fallback_thread(topic: &str) -> Vec<String> {
    let hashtag = topic.replace(' ', "");
    vec![
        format!("The {topic} is a definitive machine of its era. 🏎️"),
        "With engineering that pushes the limits of performance. ⚙️".to_string(),
        format!("A true icon of the road. #Supercars #{hashtag}"),
    ]
}

/// Generate the thread copy for a topic, with retry, one re-ask on
/// truncation, and a hardcoded fallback.
///
/// This is the only generation entry point the pipeline calls; it always
/// returns a usable thread.
#[instrument(level = "info", skip_all, fields(topic = %topic))]
pub async fn generate_thread(
    http: &reqwest::Client,
    api_key: &str,
    topic: &str,
    rng: &mut impl Rng,
) -> Vec<String> {
    let angle = EDITORIAL_ANGLES.choose(rng).copied().unwrap_or(EDITORIAL_ANGLES[0]);
    info!(angle, "Chosen editorial angle");
    let prompt = build_prompt(topic, angle);

    let client = GeminiClient::new(http, api_key.to_string());
    let api = RetryGenerate::new(client, MAX_RETRIES, StdDuration::from_secs(1));

    let raw = match api.generate(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "Generation failed; using fallback thread");
            return fallback_thread(topic);
        }
    };

    let mut parsed = parse_thread(&raw);

    // Token-limit truncation shows up as an EOF parse error; one re-ask
    // usually fixes it.
    if let Err(ref e) = parsed {
        if looks_truncated(e) {
            warn!(error = %e, "Response looks truncated; re-asking once");
            match api.generate(&prompt).await {
                Ok(raw2) => parsed = parse_thread(&raw2),
                Err(e2) => warn!(error = %e2, "Re-ask failed; will fall back"),
            }
        }
    }

    match parsed {
        Ok(segments) if !segments.is_empty() => {
            info!(segments = segments.len(), "Generated thread");
            segments
        }
        Ok(_) => {
            warn!("Model returned an empty thread; using fallback");
            fallback_thread(topic)
        }
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&raw, 300),
                "Model returned non-conforming JSON; using fallback thread"
            );
            fallback_thread(topic)
        }
    }
}
