//! # callerid utilities
//!
//! Logging setup shared by processes embedding `callerid-core`, its demos and
//! its tests.

pub mod logging;

pub use logging::{
    dated_file_name, init_logging, init_logging_to_dir, init_logging_with_level, LogFormat, LogLevel, LoggingError,
};
pub use tracing::{debug, error, info, trace, warn};
