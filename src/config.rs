//! Typed configuration parsed from environment variables.

pub const DEFAULT_AUTHORITY_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SESSION_STORE_PATH: &str = ".storegate/session.json";

/// Remote authority endpoints (decode + current user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityConfig {
    /// Base URL, trailing slash trimmed. `AUTH_API_BASE_URL`, with a local
    /// default so the gateway keeps working offline on the local decode.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl AuthorityConfig {
    /// Build from `AUTH_API_BASE_URL`, `AUTH_REQUEST_TIMEOUT_SECS`,
    /// `AUTH_CONNECT_TIMEOUT_SECS`. Every variable has a default.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("AUTH_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_AUTHORITY_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            base_url,
            request_timeout_secs: env_parse("AUTH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: env_parse("AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// HTTP client for the authority. Remote decode and hydrate calls
    /// inherit these timeouts; a timeout behaves like any other failure.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error if the TLS backend cannot
    /// initialize.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(self.connect_timeout_secs))
            .build()
    }
}

/// Where the session record lives on disk. `SESSION_STORE_PATH`.
#[must_use]
pub fn session_store_path() -> std::path::PathBuf {
    std::env::var("SESSION_STORE_PATH")
        .unwrap_or_else(|_| DEFAULT_SESSION_STORE_PATH.to_string())
        .into()
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Whether credential cookies are written with the `Secure` attribute:
/// explicit `COOKIE_SECURE`, else inferred from the authority URL scheme.
#[must_use]
pub fn cookie_secure(authority: &AuthorityConfig) -> bool {
    if let Some(value) = env_bool("COOKIE_SECURE") {
        return value;
    }
    authority.base_url.starts_with("https://")
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
