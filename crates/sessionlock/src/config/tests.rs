use super::*;

const FULL: &str = r#"
[clients.default]
dsn = "redis://secret@localhost:6379/2"
logging = true

[clients.default.options]
connection_timeout = 3
pool_size = 4
prefix = "app:"
persistent = true

[clients.cache]
dsn = "redis:///var/run/redis.sock/1?alias=cache"

[session]
client = "default"
prefix = "sess_"
ttl = 1440
cookie_lifetime = 3600
spin_lock_wait = 50000
lock_max_wait = 10

[logging]
filter = "info,sessionlock_session=debug"
"#;

#[test]
fn parses_full_config() {
    let config: SessionLockConfig = FULL.parse().unwrap();
    assert_eq!(config.clients.len(), 2);

    let default = &config.clients["default"];
    assert!(default.logging);
    assert_eq!(default.dsn.password(), Some("secret"));
    assert_eq!(default.dsn.database(), Some(2));
    assert_eq!(
        default.options,
        ClientOptions {
            connection_timeout: 3,
            pool_size: 4,
            prefix: "app:".into(),
            persistent: true,
        }
    );

    let cache = &config.clients["cache"];
    assert!(!cache.logging);
    assert_eq!(cache.dsn.socket(), Some("/var/run/redis.sock"));
    assert_eq!(cache.dsn.alias(), Some("cache"));
    assert_eq!(cache.options, ClientOptions::default());

    let session = config.session.unwrap();
    assert_eq!(session.client, "default");
    assert_eq!(session.handler.prefix, "sess_");
    assert!(session.handler.locking);
    assert_eq!(session.handler.effective_ttl(), 3600);
    assert_eq!(session.handler.lock_max_wait(), 10);

    assert_eq!(
        config.logging.filter.as_deref(),
        Some("info,sessionlock_session=debug")
    );
}

#[test]
fn session_section_defaults() {
    let config: SessionLockConfig = r#"
        [clients.default]
        dsn = "redis://localhost"

        [session]
        client = "default"
    "#
    .parse()
    .unwrap();

    let session = config.session.unwrap();
    assert_eq!(session.handler, SessionConfig::default());
    assert!(config.logging.filter.is_none());
}

#[test]
fn client_options_map_to_redis_config() {
    let config: SessionLockConfig = FULL.parse().unwrap();
    let redis = config.clients["default"].redis_config();
    assert_eq!(redis.key_prefix, "app:");
    assert_eq!(redis.pool_size, 4);
    assert_eq!(redis.connection_timeout, Duration::from_secs(3));
    assert_eq!(redis.dsn.as_str(), "redis://secret@localhost:6379/2");
}

#[test]
fn empty_config_has_no_clients() {
    let err = "".parse::<SessionLockConfig>().unwrap_err();
    assert!(matches!(err, ConfigError::NoClients));
}

#[test]
fn invalid_dsn_is_rejected() {
    let err = r#"
        [clients.broken]
        dsn = "localhost:6379"
    "#
    .parse::<SessionLockConfig>()
    .unwrap_err();
    match err {
        ConfigError::InvalidDsn { alias } => assert_eq!(alias, "broken"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn session_must_reference_a_known_client() {
    let err = r#"
        [clients.default]
        dsn = "redis://localhost"

        [session]
        client = "sessions"
    "#
    .parse::<SessionLockConfig>()
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownClient(ref alias) if alias == "sessions"));
}

#[test]
fn session_settings_are_validated() {
    let err = r#"
        [clients.default]
        dsn = "redis://localhost"

        [session]
        client = "default"
        spin_lock_wait = 0
    "#
    .parse::<SessionLockConfig>()
    .unwrap_err();
    assert!(matches!(err, ConfigError::Session(_)));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = "[clients.default\ndsn = 1".parse::<SessionLockConfig>().unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = SessionLockConfig::load("/nonexistent/sessionlock.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
