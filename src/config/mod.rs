//! Configuration management

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Server host (default: localhost)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Log level (default: info)
    pub log_level: String,
    /// Enable HTTP transport
    pub http_transport: bool,
    /// Enable stdio transport
    pub stdio_transport: bool,
    /// Base URL of the FHIR server (default: public HAPI R4)
    pub fhir_base_url: String,
    /// Connection/read timeout for a single FHIR request, in seconds
    pub request_timeout_secs: u64,
    /// Shared wall-clock deadline for one whole aggregation, in seconds
    pub aggregation_deadline_secs: u64,
    /// How long one completion poll waits before re-checking the deadline,
    /// in milliseconds
    pub poll_interval_ms: u64,
    /// Page size (`_count`) for resource searches
    pub page_size: u32,
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn aggregation_deadline(&self) -> Duration {
        Duration::from_secs(self.aggregation_deadline_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            http_transport: true,
            stdio_transport: true,
            fhir_base_url: "https://hapi.fhir.org/baseR4".to_string(),
            request_timeout_secs: 15,
            aggregation_deadline_secs: 20,
            poll_interval_ms: 1000,
            page_size: 5,
        }
    }
}
