//! # Dispatch Engine Configuration
//!
//! Runtime knobs of the message engine and the logging setup that goes with
//! them.
//!
//! ## Features
//!
//! - **EngineConfig**: buffer capacity, message size limit, log filter
//! - **Layered Loading**: defaults, then an optional TOML file, then
//!   `DISPATCH_*` environment variables
//! - **Tracing Setup**: `fmt` subscriber filtered by the configured directive
//!
//! ## Usage
//!
//! ```rust,no_run
//! use config::{init_tracing, EngineConfig};
//!
//! let config = EngineConfig::load(None).expect("configuration should load");
//! init_tracing(&config);
//! ```

pub mod engine;
pub mod logging;

pub use engine::{EngineConfig, ENV_PREFIX};
pub use logging::init_tracing;
