//! The two hosted LLM services a takeoff request can be sent to.
//!
//! The set is closed: both providers receive a prompt built from one of two
//! fixed templates and return free text that goes through the same recovery
//! pipeline. The enum carries only what differs between them (naming,
//! default model, credential variable, which template to use).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which LLM service interprets the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Claude (default).
    #[default]
    Claude,
    /// Google Gemini.
    Gemini,
}

impl Provider {
    /// All providers, in menu order.
    pub const ALL: [Provider; 2] = [Provider::Claude, Provider::Gemini];

    /// Human-readable name used in every user-facing message.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Claude => "Claude",
            Provider::Gemini => "Gemini",
        }
    }

    /// Provider name understood by `edgequake_llm::ProviderFactory`.
    pub fn factory_name(self) -> &'static str {
        match self {
            Provider::Claude => "anthropic",
            Provider::Gemini => "gemini",
        }
    }

    /// Model used when the caller does not pick one.
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Claude => "claude-3-5-sonnet-20241022",
            Provider::Gemini => "gemini-1.5-flash-latest",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Provider::Claude),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(format!(
                "unknown provider '{other}' (expected 'claude' or 'gemini')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases_case_insensitively() {
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!("Anthropic".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!(" GEMINI ".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Gemini);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "openai".parse::<Provider>().unwrap_err();
        assert!(err.contains("openai"));
    }

    #[test]
    fn default_is_claude() {
        assert_eq!(Provider::default(), Provider::Claude);
    }

    #[test]
    fn serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Gemini).unwrap(), "\"gemini\"");
        let p: Provider = serde_json::from_str("\"claude\"").unwrap();
        assert_eq!(p, Provider::Claude);
    }

    #[test]
    fn display_matches_display_name() {
        for p in Provider::ALL {
            assert_eq!(p.to_string(), p.display_name());
        }
    }
}
