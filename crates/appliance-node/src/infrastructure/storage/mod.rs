//! Storage infrastructure: the configuration file.
//!
//! The node only ever reads its configuration; nothing is written back.
//! See [`config`] for the file format and the validation rules.

pub mod config;

pub use config::{load_config, parse_config, ConfigError, NodeConfig};
