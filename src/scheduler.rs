use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, Mutex};
use tokio::time::interval;
use tracing::{error, info, instrument};

use crate::engine::WithdrawEngine;

/// Drives the two periodic sweeps: webhook retries and expired-withdrawal
/// fallbacks. Each sweep runs on its own interval; overlapping runs are
/// already serialized by the engine's keyed locks.
pub struct Scheduler {
    engine: Arc<WithdrawEngine>,
    shutdown_tx: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(engine: Arc<WithdrawEngine>) -> Self {
        Self {
            engine,
            shutdown_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Start both sweep tasks. Interval lengths come from the configuration
    /// active at start time.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let (shutdown_tx, _) = broadcast::channel(1);
        {
            let mut tx_guard = self.shutdown_tx.lock().await;
            *tx_guard = Some(shutdown_tx.clone());
        }

        let config = self.engine.config().await;
        let callback_interval = Duration::from_secs(config.retry_webhooks_timer_secs);
        let fallback_interval = Duration::from_secs(config.check_expiration_timer_secs);

        info!(
            callback_interval_secs = callback_interval.as_secs(),
            fallback_interval_secs = fallback_interval.as_secs(),
            "Starting sweep scheduler"
        );

        let engine = self.engine.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut timer = interval(callback_interval);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = engine.process_callbacks().await {
                            error!(error = %e, "Callback sweep failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Callback sweep received shutdown signal");
                        break;
                    }
                }
            }
        });

        let engine = self.engine.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut timer = interval(fallback_interval);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = engine.process_fallbacks().await {
                            error!(error = %e, "Fallback sweep failed");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Fallback sweep received shutdown signal");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let tx_guard = self.shutdown_tx.lock().await;
        if let Some(shutdown_tx) = tx_guard.as_ref() {
            let _ = shutdown_tx.send(());
        }
        Ok(())
    }
}
