pub mod correlation;
pub mod logging;

pub use correlation::{request_id_middleware, REQUEST_ID_HEADER};
pub use logging::{init_logging, LoggingConfig};
