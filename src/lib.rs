//! # HealthAgent MCP Server
//!
//! Model Context Protocol server for a conversational health agent, exposing
//! FHIR-backed clinical summaries as callable tools through standardized MCP
//! interfaces.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod fhir;
pub mod server;
pub mod transport;

// Re-export commonly used types
pub use config::AgentConfig;
pub use error::FetchError;
pub use server::AgentServer;

/// Current version of the MCP server
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
