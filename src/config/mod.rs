//! Configuration module for Parcel-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Everything except `[output]` has defaults matching a New Jersey crawl.
//!
//! # Example
//!
//! ```no_run
//! use parcel_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Batch size: {}", config.crawler.batch_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, ScopeConfig, SourcesConfig, UserAgentConfig,
    DEFAULT_USER_AGENT, NJ_COUNTIES,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

// Re-export the identifier checks shared with CLI overrides
pub use validation::{validate_county_identifier, validate_state_code};
