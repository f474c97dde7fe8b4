//! # MBP Common Library
//!
//! Shared code for the material batch pipeline crates:
//! - Error type shared by configuration and service layers
//! - TOML bootstrap configuration and config file discovery
//! - Batch event types and the broadcast `EventBus`

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
