//! Configuration module for Redfish-Diver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use redfish_diver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("diver.toml")).unwrap();
//! println!("Request timeout: {}s", config.client.timeout);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ClientConfig, Config, ProxyConfig, StorageConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
