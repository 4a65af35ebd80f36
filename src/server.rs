//! Core MCP server implementation

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::aggregator::ClinicalAggregator;
use crate::cache::SummaryCache;
use crate::config::AgentConfig;
use crate::fhir::{FhirClient, ResourceFetcher};
use crate::transport::{McpMessage, MessageHandler, RpcError};

/// Name of the single tool exposed to the agent runtime
pub const SUMMARY_TOOL: &str = "get_clinical_summary_by_patient_id";

/// Main MCP server exposing the clinical summary tool
#[derive(Clone)]
pub struct AgentServer {
    config: AgentConfig,
    aggregator: ClinicalAggregator,
}

/// MCP server initialization result
#[derive(Debug, Clone)]
pub struct ServerInitResult {
    pub protocol_version: String,
    pub server_name: String,
    pub server_version: String,
    pub instructions: Option<String>,
}

/// Tool call result
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub success: bool,
    pub content: String,
    pub error: Option<String>,
}

/// Tool definition
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl AgentServer {
    /// Create a server backed by a live FHIR client.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let fetcher: Arc<dyn ResourceFetcher> = Arc::new(FhirClient::from_config(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Create a server with an injected clinical data source.
    pub fn with_fetcher(config: AgentConfig, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        let aggregator = ClinicalAggregator::from_config(fetcher, &config)
            .with_cache(Arc::new(SummaryCache::new()));
        Self { config, aggregator }
    }

    /// Get server configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the aggregator, e.g. for one-shot CLI invocations
    pub fn aggregator(&self) -> &ClinicalAggregator {
        &self.aggregator
    }

    /// Handle the clinical summary tool call
    #[instrument(skip(self))]
    pub async fn handle_clinical_summary(&self, patient_id: String) -> Result<ToolCallResult> {
        if patient_id.trim().is_empty() {
            return Ok(ToolCallResult {
                success: false,
                content: String::new(),
                error: Some("patient_id cannot be empty".to_string()),
            });
        }

        let summary = self.aggregator.summarize(patient_id.trim()).await;
        Ok(ToolCallResult {
            success: true,
            content: summary,
            error: None,
        })
    }

    /// Get MCP initialize result
    pub fn get_initialize_result(&self) -> ServerInitResult {
        ServerInitResult {
            protocol_version: "2024-11-05".to_string(),
            server_name: "healthagent-mcp".to_string(),
            server_version: crate::VERSION.to_string(),
            instructions: Some(
                "HealthAgent MCP Server - clinical summaries from FHIR patient records".to_string(),
            ),
        }
    }

    /// Get available tools list
    pub fn get_tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: SUMMARY_TOOL.to_string(),
            description: "Fetch a patient's FHIR record plus related clinical resources and render a human-readable clinical summary".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "patient_id": {
                        "type": "string",
                        "description": "FHIR patient identifier to summarize"
                    }
                },
                "required": ["patient_id"]
            }),
        }]
    }

    /// Handle MCP tool call by name
    pub async fn handle_tool_call(&self, name: &str, params: Value) -> Result<ToolCallResult> {
        match name {
            SUMMARY_TOOL => {
                let patient_id = params["patient_id"]
                    .as_str()
                    .ok_or_else(|| anyhow::Error::msg("Missing 'patient_id' parameter"))?
                    .to_string();

                self.handle_clinical_summary(patient_id).await
            }
            _ => Err(anyhow::Error::msg(format!("Unknown tool: {}", name))),
        }
    }
}

/// Implementation of MessageHandler for AgentServer
#[async_trait]
impl MessageHandler for AgentServer {
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>> {
        match message {
            McpMessage::Initialize { id, params } => {
                info!("Received initialize request from client: {}", params.client_info.name);

                let init_result = self.get_initialize_result();
                let response = McpMessage::Response {
                    id,
                    result: Some(serde_json::json!({
                        "protocolVersion": init_result.protocol_version,
                        "serverInfo": {
                            "name": init_result.server_name,
                            "version": init_result.server_version
                        },
                        "capabilities": {
                            "tools": {
                                "listChanged": false
                            }
                        },
                        "instructions": init_result.instructions
                    })),
                    error: None,
                };

                Ok(Some(response))
            }

            McpMessage::ToolsList { id } => {
                info!("Received tools list request");

                let tools_json: Vec<Value> = self
                    .get_tools()
                    .into_iter()
                    .map(|tool| {
                        serde_json::json!({
                            "name": tool.name,
                            "description": tool.description,
                            "inputSchema": tool.input_schema
                        })
                    })
                    .collect();

                Ok(Some(McpMessage::Response {
                    id,
                    result: Some(serde_json::json!({ "tools": tools_json })),
                    error: None,
                }))
            }

            McpMessage::ToolsCall { id, params } => {
                info!("Received tool call: {}", params.name);

                let tool_params = params.arguments.unwrap_or(Value::Null);
                match self.handle_tool_call(&params.name, tool_params).await {
                    Ok(result) if result.success => Ok(Some(McpMessage::Response {
                        id,
                        result: Some(serde_json::json!({
                            "content": [
                                {
                                    "type": "text",
                                    "text": result.content
                                }
                            ]
                        })),
                        error: None,
                    })),
                    Ok(result) => Ok(Some(McpMessage::Response {
                        id,
                        result: None,
                        error: Some(RpcError {
                            code: -1,
                            message: result.error.unwrap_or("Unknown error".to_string()),
                            data: None,
                        }),
                    })),
                    Err(e) => {
                        warn!("Tool call failed: {}", e);
                        Ok(Some(McpMessage::Response {
                            id,
                            result: None,
                            error: Some(RpcError {
                                code: -1,
                                message: e.to_string(),
                                data: None,
                            }),
                        }))
                    }
                }
            }

            McpMessage::Notification { method, params: _ } => {
                info!("Received notification: {}", method);
                Ok(None)
            }

            McpMessage::Response { .. } => {
                // This server doesn't initiate requests, so we shouldn't receive responses
                warn!("Received unexpected response message");
                Ok(None)
            }
        }
    }
}
