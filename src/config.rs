use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server bind IP address
    #[serde(rename = "http-bind-ip", default = "default_bind_ip")]
    pub http_bind_ip: String,

    /// HTTP server bind port
    #[serde(rename = "http-bind-port", default = "default_bind_port")]
    pub http_bind_port: u16,

    /// Public scheme+host wallets reach this service on, e.g.
    /// "https://lnurl.example.com"
    #[serde(rename = "ln-service-server", default = "default_service_server")]
    pub ln_service_server: String,

    /// Public port of the service
    #[serde(rename = "ln-service-port", default = "default_bind_port")]
    pub ln_service_port: u16,

    /// Context path of the LNURL wallet-facing endpoints
    #[serde(rename = "ln-service-ctx", default = "default_ln_service_ctx")]
    pub ln_service_ctx: String,

    /// Context path of the withdraw-request (wallet step 1) endpoint
    #[serde(
        rename = "ln-service-withdraw-request-ctx",
        default = "default_withdraw_request_ctx"
    )]
    pub ln_service_withdraw_request_ctx: String,

    /// Context path of the withdraw (wallet step 2) endpoint
    #[serde(rename = "ln-service-withdraw-ctx", default = "default_withdraw_ctx")]
    pub ln_service_withdraw_ctx: String,

    /// Context path of the JSON-RPC API endpoint
    #[serde(rename = "api-ctx", default = "default_api_ctx")]
    pub api_ctx: String,

    /// Context path of the inbound webhooks endpoint
    #[serde(rename = "webhooks-ctx", default = "default_webhooks_ctx")]
    pub webhooks_ctx: String,

    /// Base URL of the Cyphernode gateway
    #[serde(rename = "cn-url", default = "default_cn_url")]
    pub cn_url: String,

    /// Cyphernode API id used in the auth token
    #[serde(rename = "cn-api-id", default)]
    pub cn_api_id: String,

    /// Cyphernode API key used to sign the auth token
    #[serde(rename = "cn-api-key", default)]
    pub cn_api_key: String,

    /// Base URL of the batching service
    #[serde(rename = "batcher-url", default = "default_batcher_url")]
    pub batcher_url: String,

    /// Seconds between callback-retry sweeps
    #[serde(
        rename = "retry-webhooks-timer",
        default = "default_retry_webhooks_timer"
    )]
    pub retry_webhooks_timer_secs: u64,

    /// Seconds between expired-withdrawal fallback sweeps
    #[serde(
        rename = "check-expiration-timer",
        default = "default_check_expiration_timer"
    )]
    pub check_expiration_timer_secs: u64,

    /// Data directory for the daemon (logs and config)
    #[serde(rename = "data-dir")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind_ip: default_bind_ip(),
            http_bind_port: default_bind_port(),
            ln_service_server: default_service_server(),
            ln_service_port: default_bind_port(),
            ln_service_ctx: default_ln_service_ctx(),
            ln_service_withdraw_request_ctx: default_withdraw_request_ctx(),
            ln_service_withdraw_ctx: default_withdraw_ctx(),
            api_ctx: default_api_ctx(),
            webhooks_ctx: default_webhooks_ctx(),
            cn_url: default_cn_url(),
            cn_api_id: String::new(),
            cn_api_key: String::new(),
            batcher_url: default_batcher_url(),
            retry_webhooks_timer_secs: default_retry_webhooks_timer(),
            check_expiration_timer_secs: default_check_expiration_timer(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists (important for Docker volumes)
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file atomically
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;

        // Write to a temporary file first, then rename, so the config file
        // is never left in a partially written state
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, contents)?;

        match std::fs::rename(&temp_path, path) {
            Ok(_) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e.into())
            }
        }
    }

    /// Load the configuration file, creating it with defaults when absent
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if path.exists() {
            Self::load_from_file(path)
        } else {
            let config = Self::default();
            config.save_to_file(path)?;
            Ok(config)
        }
    }

    /// Get the complete HTTP server bind address
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.http_bind_ip, self.http_bind_port)
    }

    /// Public base URL of the service
    pub fn service_base_url(&self) -> String {
        format!("{}:{}", self.ln_service_server, self.ln_service_port)
    }

    /// Full claim URL handed to the withdrawer before bech32 encoding
    pub fn withdraw_request_url(&self, secret_token: &str) -> String {
        format!(
            "{}{}{}?s={}",
            self.service_base_url(),
            self.ln_service_ctx,
            self.ln_service_withdraw_request_ctx,
            secret_token
        )
    }

    /// Callback URL a wallet hits to submit its invoice (wallet step 2)
    pub fn withdraw_callback_url(&self) -> String {
        format!(
            "{}{}{}",
            self.service_base_url(),
            self.ln_service_ctx,
            self.ln_service_withdraw_ctx
        )
    }

    /// URL the batching service calls back once a batch settles
    pub fn batch_webhook_url(&self) -> String {
        format!("{}{}", self.service_base_url(), self.webhooks_ctx)
    }

    /// Local route path of the withdraw-request endpoint
    pub fn withdraw_request_path(&self) -> String {
        format!(
            "{}{}",
            self.ln_service_ctx, self.ln_service_withdraw_request_ctx
        )
    }

    /// Local route path of the withdraw endpoint
    pub fn withdraw_path(&self) -> String {
        format!("{}{}", self.ln_service_ctx, self.ln_service_withdraw_ctx)
    }
}

// Default value functions
fn default_bind_ip() -> String {
    // Use 0.0.0.0 in containerized environments to allow external connections
    if std::env::var("DOCKER_CONTAINER").is_ok()
        || std::path::Path::new("/.dockerenv").exists()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
    {
        "0.0.0.0".to_string()
    } else {
        "127.0.0.1".to_string()
    }
}

fn default_bind_port() -> u16 {
    8000
}

fn default_service_server() -> String {
    "http://127.0.0.1".to_string()
}

fn default_ln_service_ctx() -> String {
    "/lnservice".to_string()
}

fn default_withdraw_request_ctx() -> String {
    "/withdrawRequest".to_string()
}

fn default_withdraw_ctx() -> String {
    "/withdraw".to_string()
}

fn default_api_ctx() -> String {
    "/api".to_string()
}

fn default_webhooks_ctx() -> String {
    "/webhooks".to_string()
}

fn default_cn_url() -> String {
    "https://gatekeeper:2009/v0".to_string()
}

fn default_batcher_url() -> String {
    "http://batcher:8000".to_string()
}

fn default_retry_webhooks_timer() -> u64 {
    60
}

fn default_check_expiration_timer() -> u64 {
    60
}
