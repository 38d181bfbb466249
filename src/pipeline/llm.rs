//! LLM interaction: send one prompt, get one free-text answer.
//!
//! This is the only stage with network I/O. It makes exactly one attempt:
//! a failed call surfaces immediately as a [`TakeoffError`] and the caller
//! decides whether to resubmit. The per-call timeout lives here because it
//! is a transport concern, not part of the extraction logic.
//!
//! Provider errors arrive as free text. [`classify_transport_error`] sorts
//! them into the handful of cases a user can act on (bad key, unknown
//! model, rate limit, overload) using the markers both vendors put in their
//! error bodies.

use crate::config::ExtractionConfig;
use crate::error::TakeoffError;
use crate::provider::Provider;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

/// A provider's raw answer plus usage counters.
#[derive(Debug, Clone)]
pub struct LlmAnswer {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Send `prompt` as a single user message and return the answer text.
pub async fn ask(
    llm: &Arc<dyn LLMProvider>,
    provider: Provider,
    prompt: &str,
    config: &ExtractionConfig,
) -> Result<LlmAnswer, TakeoffError> {
    let start = Instant::now();
    let messages = vec![ChatMessage::user(prompt)];
    let options = build_options(config);

    info!(
        "Sending {} chars to {} ({})",
        prompt.len(),
        provider,
        config.effective_model()
    );

    let call = llm.chat(&messages, Some(&options));
    let response = match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
        Err(_) => {
            return Err(TakeoffError::ApiTimeout {
                provider: provider.display_name().to_string(),
                secs: config.api_timeout_secs,
            })
        }
        Ok(Err(e)) => {
            return Err(classify_transport_error(
                provider,
                config.effective_model(),
                &e.to_string(),
            ))
        }
        Ok(Ok(response)) => response,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(
        "{}: {} input tokens, {} output tokens, {}ms",
        provider, response.prompt_tokens, response.completion_tokens, duration_ms
    );

    if response.content.trim().is_empty() {
        return Err(TakeoffError::EmptyAnswer {
            provider: provider.display_name().to_string(),
        });
    }

    Ok(LlmAnswer {
        text: response.content,
        input_tokens: response.prompt_tokens as u64,
        output_tokens: response.completion_tokens as u64,
        duration_ms,
    })
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

static RE_HTTP_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([45]\d{2})\b").unwrap());

/// Map a provider error message to the most specific [`TakeoffError`].
pub fn classify_transport_error(provider: Provider, model: &str, message: &str) -> TakeoffError {
    let name = provider.display_name().to_string();
    let lower = message.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
    let status = RE_HTTP_STATUS
        .captures(message)
        .and_then(|c| c[1].parse::<u16>().ok());

    if matches!(status, Some(401 | 403))
        || has(&[
            "authentication",
            "invalid_api_key",
            "api_key_invalid",
            "api key not valid",
            "invalid x-api-key",
        ])
    {
        TakeoffError::AuthError {
            provider: name,
            env_var: provider.api_key_env().to_string(),
            detail: message.to_string(),
        }
    } else if status == Some(404)
        || has(&[
            "model_not_found",
            "invalid_model",
            "model_name_invalid",
            "model not found",
        ])
    {
        TakeoffError::ModelNotFound {
            provider: name,
            model: model.to_string(),
            detail: message.to_string(),
        }
    } else if status == Some(429)
        || has(&["rate_limit", "rate limit", "quota", "resource_exhausted"])
    {
        TakeoffError::RateLimitExceeded {
            provider: name,
            detail: message.to_string(),
        }
    } else if status == Some(503) || has(&["overloaded"]) {
        TakeoffError::ProviderOverloaded {
            provider: name,
            detail: message.to_string(),
        }
    } else {
        TakeoffError::LlmApiError {
            provider: name,
            status,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4000));
    }

    #[test]
    fn classify_auth() {
        let e = classify_transport_error(
            Provider::Claude,
            "m",
            "Claude API error: 401 - {\"type\":\"authentication_error\"}",
        );
        assert!(matches!(e, TakeoffError::AuthError { ref env_var, .. } if env_var == "ANTHROPIC_API_KEY"));

        let e = classify_transport_error(Provider::Gemini, "m", "API_KEY_INVALID: API key not valid");
        assert!(matches!(e, TakeoffError::AuthError { ref env_var, .. } if env_var == "GEMINI_API_KEY"));
    }

    #[test]
    fn classify_model_not_found() {
        let e = classify_transport_error(Provider::Gemini, "gemini-9", "models/gemini-9 is not found: 404");
        assert!(matches!(e, TakeoffError::ModelNotFound { ref model, .. } if model == "gemini-9"));
    }

    #[test]
    fn classify_rate_limit() {
        let e = classify_transport_error(Provider::Gemini, "m", "RESOURCE_EXHAUSTED: try later");
        assert!(matches!(e, TakeoffError::RateLimitExceeded { .. }));
        let e = classify_transport_error(Provider::Claude, "m", "status 429 Too Many Requests");
        assert!(matches!(e, TakeoffError::RateLimitExceeded { .. }));
    }

    #[test]
    fn classify_overloaded() {
        let e = classify_transport_error(Provider::Claude, "m", "{\"type\":\"overloaded_error\"}");
        assert!(matches!(e, TakeoffError::ProviderOverloaded { .. }));
    }

    #[test]
    fn classify_other_keeps_status() {
        let e = classify_transport_error(Provider::Claude, "m", "HTTP 500 internal server error");
        match e {
            TakeoffError::LlmApiError { status, ref message, .. } => {
                assert_eq!(status, Some(500));
                assert!(message.contains("internal"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let e = classify_transport_error(Provider::Claude, "m", "connection reset by peer");
        assert!(matches!(e, TakeoffError::LlmApiError { status: None, .. }));
    }

    #[test]
    fn classified_errors_name_the_provider() {
        let e = classify_transport_error(Provider::Gemini, "m", "boom");
        assert_eq!(e.provider(), Some("Gemini"));
    }
}
