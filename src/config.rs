//! Forwarder configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Everything is read once at startup into an immutable `ProxyConfig`.
//! Invalid values fail startup instead of silently falling back, except for
//! the optional timeouts where `0` means "disabled".

use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::HeaderName;

pub const DEFAULT_INTERNAL_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MOUNT: &str = "/api";
pub const DEFAULT_STRIP_SUFFIXES: &[&str] = &["/api/v1", "/api"];
pub const DEFAULT_FORWARD_HEADERS: &[&str] = &["authorization"];
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `INTERNAL_API_URL` is not a usable absolute http(s) URL.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

// =============================================================================
// TYPES
// =============================================================================

/// What to do with an inbound body labelled JSON that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedJsonPolicy {
    /// Log a warning and forward the request without a body.
    #[default]
    Drop,
    /// Answer 400 without contacting the upstream.
    Reject,
    /// Log a warning and forward the original bytes untouched.
    Raw,
}

/// Optional upstream timeouts. `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpstreamTimeouts {
    pub request: Option<Duration>,
    pub connect: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Normalized upstream base, never ending in `/`.
    pub base_url: String,
    pub bind_addr: String,
    pub port: u16,
    /// Path prefix routed to the forwarder; `/` forwards everything.
    pub mount: String,
    /// Inbound headers copied onto the outbound request.
    pub forward_headers: Vec<HeaderName>,
    pub malformed_json: MalformedJsonPolicy,
    pub body_limit: usize,
    pub timeouts: UpstreamTimeouts,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INTERNAL_API_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            mount: DEFAULT_MOUNT.to_string(),
            forward_headers: DEFAULT_FORWARD_HEADERS
                .iter()
                .map(|&name| HeaderName::from_static(name))
                .collect(),
            malformed_json: MalformedJsonPolicy::default(),
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
            timeouts: UpstreamTimeouts::default(),
        }
    }
}

impl ProxyConfig {
    /// Build typed config from environment variables.
    ///
    /// All optional:
    /// - `INTERNAL_API_URL`: upstream base, default `http://127.0.0.1:8080`
    /// - `BIND_ADDR` / `PORT`: listen address, default `0.0.0.0:3000`
    /// - `PROXY_MOUNT`: forwarded path prefix, default `/api`
    /// - `PROXY_STRIP_SUFFIXES`: comma list, default `/api/v1,/api`
    /// - `PROXY_FORWARD_HEADERS`: comma list, default `authorization`
    /// - `PROXY_MALFORMED_JSON`: `drop` (default), `reject` or `raw`
    /// - `PROXY_BODY_LIMIT_BYTES`: default 2 MiB
    /// - `PROXY_REQUEST_TIMEOUT_SECS` / `PROXY_CONNECT_TIMEOUT_SECS`: unset or 0 disables
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_base = std::env::var("INTERNAL_API_URL").unwrap_or_else(|_| DEFAULT_INTERNAL_API_URL.to_string());
        let suffixes = env_list("PROXY_STRIP_SUFFIXES")
            .unwrap_or_else(|| DEFAULT_STRIP_SUFFIXES.iter().map(ToString::to_string).collect());
        let base_url = normalize_base_url(&raw_base, &suffixes)?;

        let forward_headers = match env_list("PROXY_FORWARD_HEADERS") {
            Some(names) => parse_header_names(&names)?,
            None => Self::default().forward_headers,
        };

        let timeouts = UpstreamTimeouts {
            request: env_parse::<u64>("PROXY_REQUEST_TIMEOUT_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            connect: env_parse::<u64>("PROXY_CONNECT_TIMEOUT_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        Ok(Self {
            base_url,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            port: env_parse("PORT")?.unwrap_or(DEFAULT_PORT),
            mount: normalize_mount(std::env::var("PROXY_MOUNT").ok().as_deref().unwrap_or(DEFAULT_MOUNT)),
            forward_headers,
            malformed_json: parse_malformed_json(std::env::var("PROXY_MALFORMED_JSON").ok().as_deref())?,
            body_limit: env_parse("PROXY_BODY_LIMIT_BYTES")?.unwrap_or(DEFAULT_BODY_LIMIT_BYTES),
            timeouts,
        })
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Normalize the upstream base URL.
///
/// The URL must be absolute `http`/`https` without query or fragment.
/// Trailing slashes are dropped, and if the path ends with one of
/// `strip_suffixes` (compared segment by segment, first match wins) that
/// suffix is removed so that appending an inbound `/api/...` path does not
/// duplicate it.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for unparsable or non-http URLs.
pub fn normalize_base_url<S: AsRef<str>>(raw: &str, strip_suffixes: &[S]) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl { url: raw.to_string(), reason };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed".into()));
    }

    let path = url.path().to_string();
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for suffix in strip_suffixes {
        let suffix_segments: Vec<&str> = suffix.as_ref().split('/').filter(|s| !s.is_empty()).collect();
        if !suffix_segments.is_empty() && segments.ends_with(&suffix_segments) {
            segments.truncate(segments.len() - suffix_segments.len());
            break;
        }
    }

    url.set_path(&format!("/{}", segments.join("/")));
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Normalize a mount prefix to `/segment[/segment...]`, or `/` for root.
pub fn normalize_mount(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

// =============================================================================
// PARSING HELPERS
// =============================================================================

fn parse_malformed_json(raw: Option<&str>) -> Result<MalformedJsonPolicy, ConfigError> {
    match raw.map(str::trim).unwrap_or("drop") {
        "drop" => Ok(MalformedJsonPolicy::Drop),
        "reject" => Ok(MalformedJsonPolicy::Reject),
        "raw" => Ok(MalformedJsonPolicy::Raw),
        other => Err(ConfigError::InvalidValue { var: "PROXY_MALFORMED_JSON", value: other.to_string() }),
    }
}

fn parse_header_names(names: &[String]) -> Result<Vec<HeaderName>, ConfigError> {
    names
        .iter()
        .map(|name| {
            HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
                .map_err(|_| ConfigError::InvalidValue { var: "PROXY_FORWARD_HEADERS", value: name.clone() })
        })
        .collect()
}

/// Comma-separated list. Present-but-empty yields an empty list.
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var: key, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
