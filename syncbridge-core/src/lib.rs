pub mod config;
pub mod core_bridge;
pub mod logging;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use core_bridge::{BridgeError, BridgeResult, SyncBridge};
pub use logging::{init_logging, LogLevel};
