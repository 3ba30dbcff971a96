use super::*;

#[test]
fn test_log_format_and_level_parse() {
    assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
    assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
    assert_eq!(LogFormat::parse("auto"), Some(LogFormat::Auto));
    assert_eq!(LogFormat::parse("yaml"), None);

    assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
    assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
    assert_eq!(LogLevel::parse("verbose"), Some(LogLevel::Trace));
    assert_eq!(LogLevel::parse("loud"), None);
}

#[test]
fn test_env_values_override_defaults() {
    let opts = apply_env_overrides(LogOptions::DEFAULT, Some("json"), Some("debug"));
    assert_eq!(opts.format, LogFormat::Json);
    assert_eq!(opts.level, LogLevel::Debug);

    let ignored = apply_env_overrides(LogOptions::DEFAULT, Some("xml"), None);
    assert_eq!(ignored, LogOptions::DEFAULT);
}

#[test]
fn test_cli_overrides_win_over_env() {
    let env_opts = apply_env_overrides(LogOptions::DEFAULT, Some("text"), Some("info"));
    let merged = env_opts.with_overrides(Some(LogFormat::Json), None);
    assert_eq!(merged.format, LogFormat::Json);
    assert_eq!(merged.level, LogLevel::Info);
}

#[test]
fn test_auto_format_resolves_to_text() {
    assert_eq!(LogOptions::DEFAULT.resolved().format, LogFormat::Text);
}
