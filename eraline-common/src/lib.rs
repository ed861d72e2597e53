//! # Eraline Common Library
//!
//! Shared code for the eraline crates:
//! - Common error type
//! - Configuration loading (TOML file, environment, OS defaults)
//! - SQLite pool bootstrap and the attribution store schema

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
