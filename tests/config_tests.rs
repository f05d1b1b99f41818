use lnurld::config::Config;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.http_bind_port, 8000);
    assert_eq!(config.ln_service_ctx, "/lnservice");
    assert_eq!(config.api_ctx, "/api");
    assert_eq!(config.webhooks_ctx, "/webhooks");
    assert_eq!(config.retry_webhooks_timer_secs, 60);
    assert_eq!(config.check_expiration_timer_secs, 60);
}

#[test]
fn test_config_urls() {
    let mut config = Config::default();
    config.ln_service_server = "https://lnurl.example.com".to_string();
    config.ln_service_port = 443;

    assert_eq!(
        config.withdraw_request_url("t0k3n"),
        "https://lnurl.example.com:443/lnservice/withdrawRequest?s=t0k3n"
    );
    assert_eq!(
        config.withdraw_callback_url(),
        "https://lnurl.example.com:443/lnservice/withdraw"
    );
    assert_eq!(
        config.batch_webhook_url(),
        "https://lnurl.example.com:443/webhooks"
    );
    assert_eq!(config.withdraw_request_path(), "/lnservice/withdrawRequest");
    assert_eq!(config.withdraw_path(), "/lnservice/withdraw");
}

#[test]
fn test_config_save_load() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("test.toml");

    let mut original_config = Config::default();
    original_config.cn_api_id = "003".to_string();
    original_config.cn_api_key = "aabbcc".to_string();
    original_config.http_bind_port = 8080;
    original_config.retry_webhooks_timer_secs = 15;

    // Save config
    original_config.save_to_file(&config_path).unwrap();

    // Load config
    let loaded_config = Config::load_from_file(&config_path).unwrap();

    assert_eq!(loaded_config.cn_api_id, "003");
    assert_eq!(loaded_config.cn_api_key, "aabbcc");
    assert_eq!(loaded_config.http_bind_port, 8080);
    assert_eq!(loaded_config.retry_webhooks_timer_secs, 15);
}

#[test]
fn test_load_or_create_writes_defaults() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("lnurld.conf");

    let created = Config::load_or_create(&config_path).unwrap();
    assert!(config_path.exists());

    let loaded = Config::load_or_create(&config_path).unwrap();
    assert_eq!(created.http_bind_port, loaded.http_bind_port);
    assert_eq!(created.api_ctx, loaded.api_ctx);
}

#[test]
fn test_kebab_case_keys_round_trip() {
    let toml_str = r#"
        http-bind-ip = "0.0.0.0"
        http-bind-port = 9000
        ln-service-server = "https://lnurl.example.com"
        cn-api-id = "001"
        cn-api-key = "secret"
        retry-webhooks-timer = 30
        check-expiration-timer = 45
    "#;

    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.http_bind_ip, "0.0.0.0");
    assert_eq!(config.http_bind_port, 9000);
    assert_eq!(config.ln_service_server, "https://lnurl.example.com");
    assert_eq!(config.retry_webhooks_timer_secs, 30);
    assert_eq!(config.check_expiration_timer_secs, 45);

    // Unspecified keys fall back to defaults
    assert_eq!(config.api_ctx, "/api");
}
