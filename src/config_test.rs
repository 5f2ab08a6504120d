use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "INTERNAL_API_URL",
    "BIND_ADDR",
    "PORT",
    "PROXY_MOUNT",
    "PROXY_STRIP_SUFFIXES",
    "PROXY_FORWARD_HEADERS",
    "PROXY_MALFORMED_JSON",
    "PROXY_BODY_LIMIT_BYTES",
    "PROXY_REQUEST_TIMEOUT_SECS",
    "PROXY_CONNECT_TIMEOUT_SECS",
];

/// # Safety
/// Callers hold `ENV_LOCK` so no other test touches the environment concurrently.
unsafe fn clear_proxy_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

// =============================================================================
// normalize_base_url
// =============================================================================

#[test]
fn base_url_strips_trailing_slash() {
    let base = normalize_base_url("http://127.0.0.1:8080/", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "http://127.0.0.1:8080");
}

#[test]
fn base_url_strips_api_v1_suffix() {
    let base = normalize_base_url("http://backend:8080/api/v1", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "http://backend:8080");
}

#[test]
fn base_url_strips_api_v1_suffix_with_trailing_slash() {
    let base = normalize_base_url("http://backend:8080/api/v1/", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "http://backend:8080");
}

#[test]
fn base_url_strips_bare_api_suffix() {
    let base = normalize_base_url("https://example.test/api", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "https://example.test");
}

#[test]
fn base_url_strips_only_one_suffix() {
    let base = normalize_base_url("http://h/api/api/v1", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "http://h/api");
}

#[test]
fn base_url_keeps_leading_path_segments() {
    let base = normalize_base_url("http://h/gateway/api/v1", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "http://h/gateway");
}

#[test]
fn base_url_matches_whole_segments_only() {
    let base = normalize_base_url("http://h/myapi", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "http://h/myapi");

    let base = normalize_base_url("http://h/api/v10", DEFAULT_STRIP_SUFFIXES).unwrap();
    assert_eq!(base, "http://h/api/v10");
}

#[test]
fn base_url_without_suffixes_is_left_alone() {
    let none: &[&str] = &[];
    let base = normalize_base_url("http://h/api/v1/", none).unwrap();
    assert_eq!(base, "http://h/api/v1");
}

#[test]
fn base_url_rejects_non_http_scheme() {
    let err = normalize_base_url("ftp://h/api", DEFAULT_STRIP_SUFFIXES).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    assert!(err.to_string().contains("unsupported scheme"));
}

#[test]
fn base_url_rejects_relative_url() {
    let err = normalize_base_url("/api/v1", DEFAULT_STRIP_SUFFIXES).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
}

#[test]
fn base_url_rejects_query() {
    let err = normalize_base_url("http://h/api?x=1", DEFAULT_STRIP_SUFFIXES).unwrap_err();
    assert!(err.to_string().contains("query and fragment"));
}

// =============================================================================
// normalize_mount
// =============================================================================

#[test]
fn mount_is_normalized() {
    assert_eq!(normalize_mount("/api"), "/api");
    assert_eq!(normalize_mount("api/"), "/api");
    assert_eq!(normalize_mount("//api//v1/"), "/api/v1");
    assert_eq!(normalize_mount(""), "/");
    assert_eq!(normalize_mount("/"), "/");
}

// =============================================================================
// parse helpers
// =============================================================================

#[test]
fn malformed_json_policy_parses_known_values() {
    assert_eq!(parse_malformed_json(None).unwrap(), MalformedJsonPolicy::Drop);
    assert_eq!(parse_malformed_json(Some("drop")).unwrap(), MalformedJsonPolicy::Drop);
    assert_eq!(parse_malformed_json(Some("reject")).unwrap(), MalformedJsonPolicy::Reject);
    assert_eq!(parse_malformed_json(Some(" raw ")).unwrap(), MalformedJsonPolicy::Raw);
}

#[test]
fn malformed_json_policy_rejects_unknown_value() {
    let err = parse_malformed_json(Some("explode")).unwrap_err();
    assert!(err.to_string().contains("PROXY_MALFORMED_JSON"));
}

#[test]
fn header_names_are_lowercased() {
    let names = parse_header_names(&["Authorization".into(), "X-Request-Id".into()]).unwrap();
    assert_eq!(names, vec![HeaderName::from_static("authorization"), HeaderName::from_static("x-request-id")]);
}

#[test]
fn header_names_reject_invalid_characters() {
    let err = parse_header_names(&["bad header".into()]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { var: "PROXY_FORWARD_HEADERS", .. }));
}

// =============================================================================
// from_env
// =============================================================================

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_proxy_env() };

    let cfg = ProxyConfig::from_env().unwrap();
    assert_eq!(cfg, ProxyConfig::default());
    assert_eq!(cfg.base_url, DEFAULT_INTERNAL_API_URL);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.mount, "/api");
    assert_eq!(cfg.malformed_json, MalformedJsonPolicy::Drop);
    assert_eq!(cfg.timeouts, UpstreamTimeouts { request: None, connect: None });
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_proxy_env();
        std::env::set_var("INTERNAL_API_URL", "https://backend.internal/v2/");
        std::env::set_var("PORT", "4100");
        std::env::set_var("BIND_ADDR", "127.0.0.1");
        std::env::set_var("PROXY_MOUNT", "backend/");
        std::env::set_var("PROXY_STRIP_SUFFIXES", "/v2");
        std::env::set_var("PROXY_FORWARD_HEADERS", "Authorization, Cookie");
        std::env::set_var("PROXY_MALFORMED_JSON", "reject");
        std::env::set_var("PROXY_BODY_LIMIT_BYTES", "1024");
        std::env::set_var("PROXY_REQUEST_TIMEOUT_SECS", "30");
        std::env::set_var("PROXY_CONNECT_TIMEOUT_SECS", "0");
    }

    let cfg = ProxyConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://backend.internal");
    assert_eq!(cfg.port, 4100);
    assert_eq!(cfg.bind_addr, "127.0.0.1");
    assert_eq!(cfg.mount, "/backend");
    assert_eq!(cfg.forward_headers, vec![HeaderName::from_static("authorization"), HeaderName::from_static("cookie")]);
    assert_eq!(cfg.malformed_json, MalformedJsonPolicy::Reject);
    assert_eq!(cfg.body_limit, 1024);
    assert_eq!(cfg.timeouts.request, Some(Duration::from_secs(30)));
    assert_eq!(cfg.timeouts.connect, None);

    unsafe { clear_proxy_env() };
}

#[test]
fn from_env_empty_forward_headers_disables_passthrough() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_proxy_env();
        std::env::set_var("PROXY_FORWARD_HEADERS", "");
    }

    let cfg = ProxyConfig::from_env().unwrap();
    assert!(cfg.forward_headers.is_empty());

    unsafe { clear_proxy_env() };
}

#[test]
fn from_env_invalid_port_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_proxy_env();
        std::env::set_var("PORT", "not-a-port");
    }

    let err = ProxyConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { var: "PORT", .. }));

    unsafe { clear_proxy_env() };
}

#[test]
fn from_env_invalid_base_url_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_proxy_env();
        std::env::set_var("INTERNAL_API_URL", "not a url");
    }

    let err = ProxyConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

    unsafe { clear_proxy_env() };
}
