//! # kbvault-api
//!
//! Tool surface for kbvault: the tool catalogue and router, runtime
//! configuration, and the JSON-lines stdio driver used by the `kbvault`
//! binary.

pub mod config;
pub mod driver;
pub mod tools;

pub use config::{Config, LogFormat};
pub use tools::{error_response, tool_definitions, ToolDefinition, ToolRouter};
