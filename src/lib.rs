pub mod backend;
pub mod batcher;
pub mod config;
pub mod engine;
pub mod error;
pub mod lnurl;
pub mod model;
pub mod observability;
pub mod router;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod webhooks;
