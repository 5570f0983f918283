//! Configuration for the chat service.
//!
//! Values are read once at startup and injected into the components that need
//! them; nothing below this module touches the process environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variables holding the service credential, in lookup order.
pub const API_KEY_ENV: [&str; 3] = ["DOCS_CHAT_API_KEY", "GEMINI_API_KEY", "API_KEY"];
/// Environment variable overriding the model name.
pub const MODEL_ENV: &str = "DOCS_CHAT_MODEL";
/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "DOCS_CHAT_BASE_URL";
/// Environment variable overriding the documentation domain.
pub const DOMAIN_ENV: &str = "DOCS_CHAT_DOMAIN";
/// Environment variable overriding the HTTP port.
pub const PORT_ENV: &str = "DOCS_CHAT_PORT";
/// Environment variable overriding the static asset directory.
pub const STATIC_DIR_ENV: &str = "DOCS_CHAT_STATIC_DIR";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default documentation domain answers are restricted to.
pub const DEFAULT_DOMAIN: &str = "docs.zama.ai";
/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No credential for the generation service.
    #[error("missing API key: set one of {}", API_KEY_ENV.join(", "))]
    MissingApiKey,

    /// Base URL does not parse.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// Any other out-of-range value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience result alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Chat service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Credential for the generation service. Never serialized.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// REST base URL (without trailing `/models`).
    pub base_url: String,
    /// Documentation domain retrieval is restricted to.
    pub domain: String,
    /// Overrides the system directive derived from `domain`.
    pub system_instruction: Option<String>,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Longest silence tolerated between two reads of a response body.
    /// Resets on every chunk, so a stream that keeps delivering is never cut off.
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,
    /// HTTP port of the browser-facing server.
    pub port: u16,
    /// Directory served at `/`.
    pub static_dir: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            system_instruction: None,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl ChatConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the process environment and validate.
    ///
    /// # Errors
    /// Returns an error if the credential is missing or a value is invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup and validate.
    ///
    /// # Errors
    /// Returns an error if the credential is missing or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self {
            api_key: API_KEY_ENV.iter().find_map(|name| non_empty(name)),
            ..Self::default()
        };

        if let Some(model) = non_empty(MODEL_ENV) {
            config.model = model;
        }
        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Some(domain) = non_empty(DOMAIN_ENV) {
            config.domain = domain;
        }
        if let Some(port) = non_empty(PORT_ENV) {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a port: {port}")))?;
        }
        if let Some(dir) = non_empty(STATIC_DIR_ENV) {
            config.static_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the credential.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the REST base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the documentation domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Override the system directive.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Set the idle read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if the credential is missing or a value is invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(ConfigError::MissingApiKey);
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.domain.trim().is_empty() || self.domain.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "domain must be a bare host name, got {:?}",
                self.domain
            )));
        }
        Url::parse(&self.base_url)?;
        Ok(())
    }

    /// Suffix appended to every user query to restrict retrieval to `domain`.
    #[must_use]
    pub fn domain_directive(&self) -> String {
        format!(" site:{}", self.domain)
    }

    /// System directive sent with every request.
    #[must_use]
    pub fn system_instruction(&self) -> String {
        self.system_instruction.clone().unwrap_or_else(|| {
            format!(
                "You are a helpful AI assistant for the documentation published at {domain}. \
                 Your knowledge is strictly limited to the content from the {domain} website. \
                 Answer user questions based *only* on the provided search results. \
                 If the answer is not in the context, say you cannot find the information \
                 in the {domain} documentation. Always cite your sources.",
                domain = self.domain
            )
        })
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let result = ChatConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));

        let blank = ChatConfig::from_lookup(lookup(&[("API_KEY", "   ")]));
        assert!(matches!(blank, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_api_key_lookup_order() {
        let config = ChatConfig::from_lookup(lookup(&[
            ("API_KEY", "generic"),
            ("GEMINI_API_KEY", "gemini"),
        ]))
        .ok();
        assert_eq!(
            config.and_then(|c| c.api_key).as_deref(),
            Some("gemini")
        );
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = ChatConfig::from_lookup(lookup(&[
            ("DOCS_CHAT_API_KEY", "k"),
            ("DOCS_CHAT_DOMAIN", "docs.rs"),
            ("DOCS_CHAT_PORT", "8080"),
        ]));
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.domain, "docs.rs");
        assert_eq!(config.port, 8080);
        assert_eq!(config.domain_directive(), " site:docs.rs");
    }

    #[test]
    fn test_invalid_port_and_url() {
        let port = ChatConfig::from_lookup(lookup(&[("API_KEY", "k"), ("DOCS_CHAT_PORT", "http")]));
        assert!(matches!(port, Err(ConfigError::Invalid(_))));

        let url = ChatConfig::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("DOCS_CHAT_BASE_URL", "not a url"),
        ]));
        assert!(matches!(url, Err(ConfigError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_system_instruction_mentions_domain_and_citations() {
        let config = ChatConfig::new().with_domain("docs.zama.ai");
        let instruction = config.system_instruction();
        assert!(instruction.contains("docs.zama.ai"));
        assert!(instruction.contains("cannot find the information"));
        assert!(instruction.contains("Always cite your sources"));

        let custom = config.with_system_instruction("custom");
        assert_eq!(custom.system_instruction(), "custom");
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = ChatConfig::new().with_api_key("secret");
        let json = serde_json::to_string(&config).unwrap_or_default();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"read_timeout\":120"));
    }
}
