use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use lnurld::backend::CyphernodeClient;
use lnurld::batcher::HttpBatchClient;
use lnurld::config::Config;
use lnurld::engine::WithdrawEngine;
use lnurld::observability::{init_logging, LoggingConfig};
use lnurld::router::build_router;
use lnurld::scheduler::Scheduler;
use lnurld::state::AppState;
use lnurld::store::MemoryWithdrawStore;
use lnurld::webhooks::HttpWebhookSender;

#[derive(Parser)]
#[clap(version, about = "LNURL-withdraw issuing daemon")]
struct Cli {
    /// Data directory path (contains config and logs)
    #[clap(long, env = "LNURLD_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Server address (overrides config)
    #[clap(long, env = "LNURLD_ADDR")]
    addr: Option<String>,

    /// Cyphernode API id (overrides config)
    #[clap(long, env = "LNURLD_CN_API_ID")]
    cn_api_id: Option<String>,

    /// Cyphernode API key (overrides config)
    #[clap(long, env = "LNURLD_CN_API_KEY")]
    cn_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli: Cli = Cli::parse();

    let log_config = LoggingConfig {
        level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        log_dir: cli.data_dir.join("logs"),
        console_output: !std::env::var("NO_CONSOLE_LOG").is_ok(),
        file_output: !std::env::var("NO_FILE_LOG").is_ok(),
        ..Default::default()
    };
    init_logging(log_config)?;

    std::fs::create_dir_all(&cli.data_dir)?;

    // Config file is always in data_dir
    let config_path = cli.data_dir.join("lnurld.conf");
    let mut config = Config::load_or_create(&config_path)?;

    // Override config with CLI arguments
    config.data_dir = Some(cli.data_dir.clone());
    if let Some(addr) = cli.addr {
        if let Some((ip, port_str)) = addr.split_once(':') {
            config.http_bind_ip = ip.to_string();
            if let Ok(port) = port_str.parse::<u16>() {
                config.http_bind_port = port;
            }
        }
    }
    if let Some(api_id) = cli.cn_api_id {
        config.cn_api_id = api_id;
    }
    if let Some(api_key) = cli.cn_api_key {
        config.cn_api_key = api_key;
    }

    let backend = Arc::new(CyphernodeClient::new(&config)?);
    let batcher = Arc::new(HttpBatchClient::new(&config)?);
    let webhooks = Arc::new(HttpWebhookSender::new()?);
    let store = Arc::new(MemoryWithdrawStore::new());

    let engine = Arc::new(WithdrawEngine::new(
        store,
        backend,
        batcher,
        webhooks,
        config.clone(),
    ));

    let scheduler = Scheduler::new(engine.clone());
    scheduler.start().await?;

    let state = AppState::new(engine, config_path);
    let app = build_router(&config, state);

    let addr = config.http_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("lnurld listening on {addr}");
    axum::serve(listener, app).await?;

    scheduler.stop().await?;
    Ok(())
}
