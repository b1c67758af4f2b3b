//! Shared-canvas client
//!
//! Wires the core geometry engine and session sync into one interactive
//! session: pointer and keyboard in, drawable frames out.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod logging;

pub use client::CanvasClient;
pub use config::{ClientConfig, ConfigError};
