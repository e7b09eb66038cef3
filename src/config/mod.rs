//! Configuration Module
//!
//! Handles settings loading and client configuration.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{ClientConfig, Settings};
