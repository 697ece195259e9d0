//! Answer generation with bounded retry.
//!
//! Defines the [`Generator`] trait, the Gemini-backed implementation, and
//! [`generate_with_retry`], which retries rate-limited calls with
//! exponential backoff and degrades to a fixed apologetic message instead
//! of surfacing an error to the user.

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;

/// Shown when every attempt was rejected for rate limiting.
pub const RATE_LIMIT_FALLBACK: &str =
    "I'm experiencing high demand right now. Please try again in a moment.";

/// Shown when generation failed for any other reason.
pub const GENERATION_FALLBACK: &str = "I apologize, but I'm having trouble processing your \
     request right now. Please try rephrasing your question or try again later.";

/// Why a single generation attempt failed. Rate limits are the only
/// retryable variant.
#[derive(Debug)]
pub enum GenerationError {
    RateLimited(String),
    Failed(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::RateLimited(msg) => write!(f, "rate limited: {}", msg),
            GenerationError::Failed(msg) => write!(f, "generation failed: {}", msg),
        }
    }
}

impl std::error::Error for GenerationError {}

/// Trait for text generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-1.5-flash"`).
    fn model_name(&self) -> &str;
    /// Run one generation attempt for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Retry budget for [`generate_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt` failed: 1s, 2s, 4s, ...
    /// capped at 32s.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(5))
    }
}

/// Run `generator` against `prompt`, retrying rate-limited attempts with
/// exponential backoff.
///
/// Never returns an error: exhausted rate-limit retries yield
/// [`RATE_LIMIT_FALLBACK`], and any other failure yields
/// [`GENERATION_FALLBACK`] immediately.
pub async fn generate_with_retry(
    generator: &dyn Generator,
    prompt: &str,
    policy: RetryPolicy,
) -> String {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        match generator.generate(prompt).await {
            Ok(text) => return text,
            Err(GenerationError::RateLimited(msg)) => {
                if attempt + 1 < max_attempts {
                    eprintln!(
                        "Warning: rate limited (attempt {}/{}): {}",
                        attempt + 1,
                        max_attempts,
                        msg
                    );
                    tokio::time::sleep(policy.backoff(attempt)).await;
                } else {
                    eprintln!("Warning: rate limited on final attempt: {}", msg);
                    return RATE_LIMIT_FALLBACK.to_string();
                }
            }
            Err(GenerationError::Failed(msg)) => {
                eprintln!("Warning: generation failed: {}", msg);
                return GENERATION_FALLBACK.to_string();
            }
        }
    }

    RATE_LIMIT_FALLBACK.to_string()
}

/// Create the appropriate [`Generator`] based on configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "disabled" => bail!("Generation provider is disabled"),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ Gemini Generator ============

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generator backed by the Google Gemini API.
///
/// Calls `POST {url}/models/{model}:generateContent`. Requires the
/// `GOOGLE_API_KEY` environment variable to be set.
pub struct GeminiGenerator {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    timeout_secs: u64,
}

impl GeminiGenerator {
    /// Create a new Gemini generator from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `GOOGLE_API_KEY` is not in the environment.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY environment variable not set"))?;

        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_URL.to_string()),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Failed(e.to_string()))?;

        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
                "topP": 0.8,
                "topK": 40,
            }
        });

        let endpoint = format!(
            "{}/models/{}:generateContent?key={}",
            self.url, self.model, self.api_key
        );

        let response = client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Failed(format!("Gemini request failed: {}", e)))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::RateLimited(body_text));
        }

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            // Quota exhaustion sometimes comes back as 4xx with a quota
            // message rather than a bare 429.
            if body_text.to_lowercase().contains("quota") {
                return Err(GenerationError::RateLimited(body_text));
            }
            return Err(GenerationError::Failed(format!(
                "Gemini API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Failed(format!("Invalid Gemini response: {}", e)))?;

        json.pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::Failed("Gemini response missing candidate text".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Plays back a scripted sequence of attempt results.
    struct ScriptedGenerator {
        script: Mutex<Vec<Result<String, GenerationError>>>,
    }

    impl ScriptedGenerator {
        fn new(script: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.script
                .lock()
                .unwrap()
                .remove(0)
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let generator = ScriptedGenerator::new(vec![Ok("answer".to_string())]);
        let out = generate_with_retry(&generator, "p", RetryPolicy::default()).await;
        assert_eq!(out, "answer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retried_then_succeeds() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::RateLimited("busy".to_string())),
            Err(GenerationError::RateLimited("busy".to_string())),
            Ok("answer".to_string()),
        ]);

        let start = tokio::time::Instant::now();
        let out = generate_with_retry(&generator, "p", RetryPolicy::default()).await;
        assert_eq!(out, "answer");
        // Backoff slept 1s then 2s of paused time.
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausted_degrades() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::RateLimited("busy".to_string())),
            Err(GenerationError::RateLimited("busy".to_string())),
            Err(GenerationError::RateLimited("busy".to_string())),
        ]);

        let out = generate_with_retry(&generator, "p", RetryPolicy::default()).await;
        assert_eq!(out, RATE_LIMIT_FALLBACK);
    }

    #[tokio::test]
    async fn test_hard_failure_not_retried() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Failed("boom".to_string())),
            Ok("never reached".to_string()),
        ]);

        let out = generate_with_retry(&generator, "p", RetryPolicy::default()).await;
        assert_eq!(out, GENERATION_FALLBACK);
        assert_eq!(generator.script.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_treated_as_one() {
        let generator = ScriptedGenerator::new(vec![Ok("answer".to_string())]);
        let out = generate_with_retry(&generator, "p", RetryPolicy { max_attempts: 0 }).await;
        assert_eq!(out, "answer");
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(10), Duration::from_secs(32));
    }

    #[test]
    fn test_create_generator_unknown_provider() {
        let config = GenerationConfig {
            provider: "llama".to_string(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
