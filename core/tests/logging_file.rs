//! Global subscriber setup; one test per binary since it can only happen once

use launch_core::logging::{init, LogSettings};
use launch_core::{CoreError, LaunchConfig};

#[test]
fn test_init_writes_json_lines_to_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = LaunchConfig::new("foo", "/bin/true", dir.path());
    config.enable_log_file = true;
    let path = config.log_file_path();

    let settings = LogSettings {
        level: "info".to_string(),
        file: Some(path.clone()),
    };
    let context = init(&settings).unwrap();
    assert_eq!(context.file_path(), Some(path.as_path()));

    tracing::info!(app = "foo", "hello from the test");
    tracing::debug!("filtered out at info");

    // A second subscriber cannot be installed
    match init(&LogSettings::default()) {
        Err(CoreError::InitializationError(_)) => {}
        other => panic!("expected InitializationError, got {:?}", other.map(|_| ())),
    }

    drop(context);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(path.ends_with("launch_log/foo.log"));
    let line = text
        .lines()
        .find(|l| l.contains("hello from the test"))
        .expect("event not written to file");
    assert!(line.starts_with('{'), "{}", line);
    assert!(line.contains("\"app\":\"foo\""), "{}", line);
    if std::env::var_os("RUST_LOG").is_none() {
        assert!(!text.contains("filtered out at info"));
    }
}
