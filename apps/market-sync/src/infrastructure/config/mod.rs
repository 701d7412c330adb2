//! Configuration Module
//!
//! Configuration loading for the market sync service.

mod settings;

pub use settings::{
    AlertSettings, ConfigError, GatewaySettings, MAX_DURATION, ServerSettings, SyncConfig,
};
