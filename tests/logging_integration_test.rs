// Integration tests for logging functionality
// Note: These tests must be run separately as they initialize global state
// Run with: cargo test --test logging_integration_test -- --test-threads=1

use rsc_cache::infrastructure::logging::{
    info, instrument, LogConfig, LogFormat, LoggerImpl, RotationPolicy, LOG_FILE_NAME,
};
use rsc_cache::{Cache, DeferredValue, MirrorConfig};
use std::fs;
use tempfile::TempDir;

/// Main integration test that covers multiple scenarios
#[test]
fn test_logging_comprehensive() {
    let temp_dir = TempDir::new().unwrap();

    // File output only, always JSON
    let config = LogConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
        log_dir: Some(temp_dir.path().to_path_buf()),
        enable_stderr: false,
        rotation: RotationPolicy::Never,
    };

    let logger = LoggerImpl::init(&config).unwrap();

    // A second global subscriber is refused
    assert!(LoggerImpl::init(&config).is_err());

    info!("Test message 1");
    info!(key = "value", "Test message with fields");

    let result = instrumented_add(5, 7);
    assert_eq!(result, 12);

    // Cache operations log through the same subscriber
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let cache: Cache<String> =
            Cache::connect(&MirrorConfig::with_endpoint("ws://127.0.0.1:9"));
        cache.set("/logged", DeferredValue::resolved("x".to_string()));
        assert!(cache.get("/logged").is_some());
        cache.shutdown();
    });

    // Dropping the guard flushes the non-blocking writer
    drop(logger);

    let log_path = temp_dir.path().join(LOG_FILE_NAME);
    assert!(log_path.exists(), "Log file should be created");
    let contents = fs::read_to_string(&log_path).unwrap();

    assert!(
        contents.contains("Test message 1"),
        "Log should contain basic message"
    );
    assert!(
        contents.contains("Test message with fields"),
        "Log should contain message with fields"
    );
    assert!(
        contents.contains("entering instrumented function"),
        "Log should contain instrumented function traces"
    );
    assert!(
        contents.contains("RscCache.set"),
        "Log should contain cache operations"
    );

    // Every line is a standalone JSON object
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(parsed.get("level").is_some());
    }
}

#[instrument]
fn instrumented_add(a: i32, b: i32) -> i32 {
    info!("entering instrumented function");
    a + b
}
