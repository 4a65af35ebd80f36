//! Integration tests for the MCP protocol surface of the agent server

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use healthagent_mcp::error::FetchError;
use healthagent_mcp::fhir::ResourceFetcher;
use healthagent_mcp::server::SUMMARY_TOOL;
use healthagent_mcp::transport::{
    ClientInfo, InitializeParams, JsonRpcMessage, McpMessage, MessageHandler, ToolsCallParams,
};
use healthagent_mcp::{AgentConfig, AgentServer};

struct StubFetcher;

#[async_trait]
impl ResourceFetcher for StubFetcher {
    async fn fetch_patient(&self, patient_id: &str) -> Result<Value, FetchError> {
        match patient_id {
            "599" => Ok(json!({
                "resourceType": "Patient",
                "id": "599",
                "name": [{ "given": ["John"], "family": "Doe" }],
                "gender": "male",
                "birthDate": "1990-01-01"
            })),
            _ => Err(FetchError::NotFound),
        }
    }

    async fn search_resources(
        &self,
        resource_type: &'static str,
        _patient_id: &str,
    ) -> Result<Vec<Value>, FetchError> {
        match resource_type {
            "Condition" => Ok(vec![json!({ "code": { "text": "Hypertension" } })]),
            _ => Ok(vec![]),
        }
    }
}

fn test_server() -> AgentServer {
    let config = AgentConfig {
        aggregation_deadline_secs: 5,
        poll_interval_ms: 20,
        ..AgentConfig::default()
    };
    AgentServer::with_fetcher(config, Arc::new(StubFetcher))
}

fn response_parts(message: Option<McpMessage>) -> (Option<Value>, Option<String>) {
    match message {
        Some(McpMessage::Response { result, error, .. }) => {
            (result, error.map(|e| e.message))
        }
        other => panic!("expected a response, got {other:?}"),
    }
}

#[tokio::test]
async fn test_initialize_handshake() {
    let server = test_server();
    let message = McpMessage::Initialize {
        id: 1,
        params: InitializeParams {
            protocol_version: "2024-11-05".to_string(),
            client_info: ClientInfo {
                name: "test-client".to_string(),
                version: "1.0.0".to_string(),
            },
        },
    };

    let (result, error) = response_parts(server.handle_message(message).await.unwrap());
    assert!(error.is_none());

    let result = result.unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "healthagent-mcp");
    assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
}

#[tokio::test]
async fn test_tools_list_exposes_summary_tool() {
    let server = test_server();

    let (result, error) = response_parts(
        server.handle_message(McpMessage::ToolsList { id: 2 }).await.unwrap(),
    );
    assert!(error.is_none());

    let tools = result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], SUMMARY_TOOL);
    assert_eq!(tools[0]["inputSchema"]["required"][0], "patient_id");
}

#[tokio::test]
async fn test_tool_call_returns_summary_text() {
    let server = test_server();
    let message = McpMessage::ToolsCall {
        id: 3,
        params: ToolsCallParams {
            name: SUMMARY_TOOL.to_string(),
            arguments: Some(json!({ "patient_id": "599" })),
        },
    };

    let (result, error) = response_parts(server.handle_message(message).await.unwrap());
    assert!(error.is_none());

    let text = result.unwrap()["content"][0]["text"].as_str().unwrap().to_string();
    assert!(text.contains("Patient ID: 599"));
    assert!(text.contains("Name: John Doe"));
    assert!(text.contains("Condition 1: Hypertension"));
}

#[tokio::test]
async fn test_tool_call_for_unknown_patient() {
    let server = test_server();
    let message = McpMessage::ToolsCall {
        id: 4,
        params: ToolsCallParams {
            name: SUMMARY_TOOL.to_string(),
            arguments: Some(json!({ "patient_id": "does-not-exist" })),
        },
    };

    let (result, error) = response_parts(server.handle_message(message).await.unwrap());
    assert!(error.is_none(), "a missing patient is a normal tool result, not an RPC error");

    let text = result.unwrap()["content"][0]["text"].as_str().unwrap().to_string();
    assert_eq!(text, "❌ Patient not found.");
}

#[tokio::test]
async fn test_unknown_tool_call_is_an_rpc_error() {
    let server = test_server();
    let message = McpMessage::ToolsCall {
        id: 5,
        params: ToolsCallParams {
            name: "summon_wizard".to_string(),
            arguments: None,
        },
    };

    let (result, error) = response_parts(server.handle_message(message).await.unwrap());
    assert!(result.is_none());
    assert!(error.unwrap().contains("Unknown tool"));
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let server = test_server();
    let message = McpMessage::Notification {
        method: "notifications/initialized".to_string(),
        params: None,
    };

    assert!(server.handle_message(message).await.unwrap().is_none());
}

#[tokio::test]
async fn test_wire_level_tool_call() {
    // Full round trip through the JSON-RPC representation, as the stdio
    // transport would see it on one line of stdin.
    let server = test_server();

    let line = json!({
        "jsonrpc": "2.0",
        "id": 9,
        "method": "tools/call",
        "params": {
            "name": SUMMARY_TOOL,
            "arguments": { "patient_id": "599" }
        }
    })
    .to_string();

    let parsed: JsonRpcMessage = serde_json::from_str(&line).unwrap();
    let message = McpMessage::from_jsonrpc(parsed).unwrap();
    let response = server.handle_message(message).await.unwrap().unwrap();

    let serialized = serde_json::to_string(&response.to_jsonrpc()).unwrap();
    assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
    assert!(serialized.contains("CLINICAL SUMMARY"));
}
