//! Integration tests for the logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_query, LogFormat, LoggingConfig,
};

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_credentials_are_redacted() {
    for field in [
        "access_token",
        "id_token",
        "refresh_token",
        "client_secret",
        "authorization",
        "api_key",
        "code",
    ] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]", "{field}");
    }
}

#[test]
fn test_normal_values_pass_through() {
    assert_eq!(redact_if_sensitive("state_matches", "true"), "true");
    assert_eq!(redact_if_sensitive("expires_in", "3600"), "3600");
    assert_eq!(redact_if_sensitive("status", "400"), "400");
}

#[test]
fn test_callback_urls_lose_their_query() {
    let url = "https://console.example.com/auth/callback?code=c0de&state=s7ate";
    let logged = strip_query(url);

    assert!(!logged.contains("c0de"));
    assert!(!logged.contains("s7ate"));
    assert_eq!(logged, "https://console.example.com/auth/callback");
}

#[test]
fn test_format_selection() {
    let config = LoggingConfig::default();

    #[cfg(debug_assertions)]
    assert_eq!(config.format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(config.format, LogFormat::Json);
}

#[test]
fn test_init_logging_only_once() {
    // The global subscriber can be installed once per process
    let first = init_logging(LoggingConfig::default().with_format(LogFormat::Compact));
    let second = init_logging(LoggingConfig::default());

    assert!(first.is_ok());
    assert!(second.is_err());
}

#[test]
fn test_invalid_filter_is_rejected() {
    let result = init_logging(LoggingConfig::default().with_filter("core_auth=loud"));
    assert!(result.is_err());
}
