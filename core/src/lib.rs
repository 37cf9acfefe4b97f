//! Shared building blocks for the Linode MCP server: validated account
//! configuration, provider resource models, error categories and token
//! fingerprinting.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;

pub use config::{AccountConfig, AccountsConfig, ConfigFile, DEFAULT_API_URL};
pub use error::{ConfigError, ErrorCategory};
