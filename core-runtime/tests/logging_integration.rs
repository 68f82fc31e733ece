//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    // The first call may lose to another test binary's subscriber; the
    // second call must always fail.
    let _ = init_logging(config.clone());
    let second = init_logging(config);

    assert!(matches!(second, Err(Error::Logging(_))));
}

#[test]
fn test_invalid_filter_is_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("provider_google_drive=chatty");
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("access_token", "ya29.a0Af"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "1//0g"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("private_key", "-----BEGIN"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("client_secret", "GOCSPX-x"), "[REDACTED]");
}

#[test]
fn test_service_account_email_is_masked() {
    let redacted = redact_if_sensitive("client_email", "uploader@my-project.iam.gserviceaccount.com");

    assert!(redacted.starts_with('u'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("my-project"));
}

#[test]
fn test_drive_values_pass_through() {
    assert_eq!(redact_if_sensitive("file_id", "1a2B3c"), "1a2B3c");
    assert_eq!(redact_if_sensitive("mime_type", "text/plain"), "text/plain");
    assert_eq!(redact_if_sensitive("name", "Quarterly Report"), "Quarterly Report");
}

#[test]
fn test_key_paths_are_stripped() {
    assert_eq!(strip_path("/etc/drive/service-account.json"), "service-account.json");
    assert_eq!(strip_path("C:\\keys\\legacy.p12"), "legacy.p12");
    assert_eq!(strip_path("legacy.p12"), "legacy.p12");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}
