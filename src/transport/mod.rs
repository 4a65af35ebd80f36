//! Transport layer for the MCP protocol
//!
//! Two transports expose the agent's tools:
//! - stdio: line-delimited JSON-RPC for local agent-runtime integration
//! - http: REST endpoints for web access

pub mod http;
pub mod stdio;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// JSON-RPC 2.0 message wrapper for wire serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request {
        jsonrpc: String,
        id: Option<u64>,
        method: String,
        params: Option<Value>,
    },
    Response {
        jsonrpc: String,
        id: Option<u64>,
        result: Option<Value>,
        error: Option<RpcError>,
    },
    Notification {
        jsonrpc: String,
        method: String,
        params: Option<Value>,
    },
}

/// MCP message types (internal representation)
#[derive(Debug, Clone)]
pub enum McpMessage {
    Initialize { id: u64, params: InitializeParams },
    ToolsList { id: u64 },
    ToolsCall { id: u64, params: ToolsCallParams },
    Notification { method: String, params: Option<Value> },
    Response { id: u64, result: Option<Value>, error: Option<RpcError> },
}

/// Initialize parameters sent by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    pub protocol_version: String,
    pub client_info: ClientInfo,
}

/// Client identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Tool call parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    pub arguments: Option<Value>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl McpMessage {
    /// Convert to a JSON-RPC message for serialization
    pub fn to_jsonrpc(&self) -> JsonRpcMessage {
        match self {
            McpMessage::Initialize { id, params } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(*id),
                method: "initialize".to_string(),
                params: serde_json::to_value(params).ok(),
            },
            McpMessage::ToolsList { id } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(*id),
                method: "tools/list".to_string(),
                params: None,
            },
            McpMessage::ToolsCall { id, params } => JsonRpcMessage::Request {
                jsonrpc: "2.0".to_string(),
                id: Some(*id),
                method: "tools/call".to_string(),
                params: serde_json::to_value(params).ok(),
            },
            McpMessage::Notification { method, params } => JsonRpcMessage::Notification {
                jsonrpc: "2.0".to_string(),
                method: method.clone(),
                params: params.clone(),
            },
            McpMessage::Response { id, result, error } => JsonRpcMessage::Response {
                jsonrpc: "2.0".to_string(),
                id: Some(*id),
                result: result.clone(),
                error: error.clone(),
            },
        }
    }

    /// Convert an incoming JSON-RPC message to the internal representation
    pub fn from_jsonrpc(jsonrpc: JsonRpcMessage) -> Result<Self> {
        match jsonrpc {
            JsonRpcMessage::Request { id, method, params, .. } => {
                let id = id.ok_or_else(|| anyhow::Error::msg("Missing request ID"))?;
                match method.as_str() {
                    "initialize" => {
                        let params: InitializeParams = match params {
                            Some(p) => serde_json::from_value(p)
                                .map_err(|e| anyhow::Error::new(e).context("Failed to parse initialize params"))?,
                            None => return Err(anyhow::Error::msg("Missing initialize params")),
                        };
                        Ok(McpMessage::Initialize { id, params })
                    }
                    "tools/list" => Ok(McpMessage::ToolsList { id }),
                    "tools/call" => {
                        let params: ToolsCallParams = match params {
                            Some(p) => serde_json::from_value(p)
                                .map_err(|e| anyhow::Error::new(e).context("Failed to parse tool call params"))?,
                            None => return Err(anyhow::Error::msg("Missing tool call params")),
                        };
                        Ok(McpMessage::ToolsCall { id, params })
                    }
                    _ => Err(anyhow::Error::msg(format!("Unknown method: {}", method))),
                }
            }
            JsonRpcMessage::Response { id, result, error, .. } => {
                let id = id.ok_or_else(|| anyhow::Error::msg("Missing response ID"))?;
                Ok(McpMessage::Response { id, result, error })
            }
            JsonRpcMessage::Notification { method, params, .. } => {
                Ok(McpMessage::Notification { method, params })
            }
        }
    }
}

/// Message handler trait for processing incoming MCP messages
#[async_trait]
pub trait MessageHandler {
    /// Handle an incoming MCP message, returning a response when one is due
    async fn handle_message(&self, message: McpMessage) -> Result<Option<McpMessage>>;
}

/// Trait for all transport implementations
#[async_trait]
pub trait Transport {
    /// Start the transport and begin handling connections
    async fn start(&self, handler: Box<dyn MessageHandler + Send + Sync>) -> Result<()>;

    /// Stop the transport gracefully
    async fn shutdown(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_round_trip() {
        let message = McpMessage::ToolsCall {
            id: 7,
            params: ToolsCallParams {
                name: "get_clinical_summary_by_patient_id".to_string(),
                arguments: Some(serde_json::json!({ "patient_id": "599" })),
            },
        };

        let json_str = serde_json::to_string(&message.to_jsonrpc()).unwrap();
        assert!(json_str.contains("tools/call"));
        assert!(json_str.contains("599"));

        let parsed: JsonRpcMessage = serde_json::from_str(&json_str).unwrap();
        match McpMessage::from_jsonrpc(parsed).unwrap() {
            McpMessage::ToolsCall { id, params } => {
                assert_eq!(id, 7);
                assert_eq!(params.name, "get_clinical_summary_by_patient_id");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        let request = JsonRpcMessage::Request {
            jsonrpc: "2.0".to_string(),
            id: Some(1),
            method: "tools/uninstall".to_string(),
            params: None,
        };
        assert!(McpMessage::from_jsonrpc(request).is_err());
    }

    #[test]
    fn test_request_without_id_rejected() {
        let request = JsonRpcMessage::Request {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "tools/list".to_string(),
            params: None,
        };
        assert!(McpMessage::from_jsonrpc(request).is_err());
    }
}
