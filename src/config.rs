//! Configuration types.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Gemini model for both interviewing and extraction.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Sessions untouched for this long are dropped from the REST registry.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Process configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct BriefingConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Spreadsheet web-app URL. `None` disables submission.
    pub sheet_url: Option<String>,
    pub http_port: u16,
    /// Directory the CLI writes CSV exports into.
    pub export_dir: PathBuf,
    pub interview: InterviewConfig,
    /// Run the stdin REPL next to the REST server.
    pub cli: bool,
    /// Idle time after which a REST session is dropped.
    pub session_ttl: Duration,
}

impl BriefingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model = std::env::var("BRIEFING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let sheet_url = std::env::var("BRIEFING_SHEET_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let http_port = match std::env::var("BRIEFING_HTTP_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "BRIEFING_HTTP_PORT".to_string(),
                message: format!("'{raw}' is not a port number"),
            })?,
            Err(_) => 8080,
        };

        let export_dir = std::env::var("BRIEFING_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let mut interview = InterviewConfig::default();
        if let Some(temperature) = std::env::var("BRIEFING_TEMPERATURE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
        {
            interview.temperature = temperature;
        }

        let cli = cli_enabled(
            std::env::var("BRIEFING_CLI").ok().as_deref(),
            std::io::stdin().is_terminal(),
        );

        let session_ttl = match std::env::var("BRIEFING_SESSION_TTL_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "BRIEFING_SESSION_TTL_SECS".to_string(),
                message: format!("'{raw}' is not a number of seconds"),
            })?),
            Err(_) => Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            model,
            sheet_url,
            http_port,
            export_dir,
            interview,
            cli,
            session_ttl,
        })
    }
}

/// Whether the REPL runs. An explicit `BRIEFING_CLI` wins; otherwise only
/// when stdin is a terminal, so a detached process serves REST alone.
pub fn cli_enabled(explicit: Option<&str>, stdin_is_terminal: bool) -> bool {
    match explicit.map(|s| s.trim().to_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => stdin_is_terminal,
    }
}

/// Tuning for the interviewer's LLM calls.
#[derive(Debug, Clone)]
pub struct InterviewConfig {
    /// Temperature for conversational turns.
    pub temperature: f32,
    /// Max tokens for a conversational reply.
    pub max_tokens: u32,
    /// Max tokens for the extraction call (it also drafts the article).
    pub extraction_max_tokens: u32,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            extraction_max_tokens: 8192,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interview_defaults() {
        let cfg = InterviewConfig::default();
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
        assert!(cfg.extraction_max_tokens > cfg.max_tokens);
    }

    #[test]
    fn cli_follows_the_terminal_unless_overridden() {
        assert!(cli_enabled(None, true));
        assert!(!cli_enabled(None, false));
        assert!(!cli_enabled(Some("0"), true));
        assert!(cli_enabled(Some(" TRUE "), false));
        assert!(cli_enabled(Some("talvez"), true));
        assert!(!cli_enabled(Some("talvez"), false));
    }
}
