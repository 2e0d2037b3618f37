//! Core types and configuration for the visual-markets system.
//!
//! This crate provides shared types used across all other crates:
//! - Order, trade and holdings types
//! - Session config files and per-round market configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ConfigStore, Endowment, MarketConfig, ReplacePolicy, RoundSettings, SessionConfigFile,
};
pub use error::{Error, Result};
pub use types::*;
