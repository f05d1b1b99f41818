use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::WithdrawEngine;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WithdrawEngine>,
    /// Where the active configuration was loaded from, for `reloadConfig`
    pub config_path: PathBuf,
}

impl AppState {
    pub fn new(engine: Arc<WithdrawEngine>, config_path: PathBuf) -> Self {
        Self {
            engine,
            config_path,
        }
    }
}
