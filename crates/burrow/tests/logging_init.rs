//! Subscriber installation. Kept in its own test binary because the global
//! subscriber can only be set once per process.

use burrow::{init_logging, ConfigError, LogFormat, LoggingConfig};

#[test]
fn test_second_init_is_an_error() {
    let config = LoggingConfig {
        level: "burrow=debug".into(),
        format: LogFormat::Json,
        ansi: false,
    };
    init_logging(&config).unwrap();
    tracing::info!(target: "burrow", "subscriber installed");

    let err = init_logging(&LoggingConfig::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Logging(_)));
}
