use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use secrecy::SecretString;
use url::Url;

use crate::config::helpers::{
    optional_env, parse_bool_env, parse_csv, parse_env, parse_string_env,
};
use crate::error::ConfigError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_PORT: u16 = 8000;

/// Credentials and endpoint for the hosted Gemini API.
#[derive(Debug)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: Url,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Emit logs as JSON lines instead of the human-readable format.
    pub json: bool,
}

/// Top-level configuration for the case gateway process.
#[derive(Debug)]
pub struct GatewayConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Seed the store with the demo case at startup.
    pub seed_demo: bool,
    /// Extra CORS origins beyond the bound localhost origins.
    pub cors_origins: Vec<String>,
    /// `None` when no API key is set; the gateway then answers with fallback text.
    pub gemini: Option<GeminiConfig>,
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Resolve from the process environment.
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn resolve_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini = match optional_env(&lookup, "GOOGLE_API_KEY") {
            Some(api_key) => Some(GeminiConfig {
                api_key: SecretString::from(api_key),
                model: parse_string_env(&lookup, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                base_url: validate_base_url(&parse_string_env(
                    &lookup,
                    "GEMINI_BASE_URL",
                    DEFAULT_GEMINI_BASE_URL,
                ))?,
            }),
            None => None,
        };

        let cors_origins = match optional_env(&lookup, "CASEAID_CORS_ORIGINS") {
            Some(raw) => parse_csv(&raw)
                .into_iter()
                .map(|origin| validate_origin(&origin))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            host: parse_env(&lookup, "CASEAID_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parse_env(&lookup, "CASEAID_PORT", DEFAULT_PORT)?,
            seed_demo: parse_bool_env(&lookup, "CASEAID_SEED_DEMO", true)?,
            cors_origins,
            gemini,
            logging: LoggingConfig {
                json: parse_bool_env(&lookup, "CASEAID_LOG_JSON", false)?,
            },
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn validate_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: "GEMINI_BASE_URL".to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: "GEMINI_BASE_URL".to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn validate_origin(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: "CASEAID_CORS_ORIGINS".to_string(),
        message: format!("'{raw}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidValue {
            key: "CASEAID_CORS_ORIGINS".to_string(),
            message: format!("'{raw}' is not an http(s) origin"),
        });
    }
    // Origins never carry a path; `Url` would render one as a trailing slash.
    Ok(url.origin().ascii_serialization())
}
