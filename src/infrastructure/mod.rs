//! Infrastructure layer
//!
//! - `config`: figment-based configuration loading
//! - `logging`: tracing subscriber setup
//! - `mirror`: WebSocket link and observer

pub mod config;
pub mod logging;
pub mod mirror;
