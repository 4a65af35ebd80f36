//! Standard I/O transport implementation
//!
//! Line-delimited JSON-RPC over stdin/stdout, the integration path used by
//! local agent runtimes that spawn the server as a child process. Logs go to
//! stderr so they never interleave with protocol traffic.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter},
    sync::Mutex,
};
use tracing::{debug, error, info, warn};

use super::{JsonRpcMessage, McpMessage, MessageHandler};

/// Result of one read attempt on stdin
enum ReadOutcome {
    /// A complete message was parsed
    Message(McpMessage),
    /// Blank line; nothing to do
    Skip,
    /// stdin closed; the session is over
    Eof,
}

/// Standard I/O transport for local agent-runtime integration
pub struct StdioTransport {
    writer: Arc<Mutex<BufWriter<tokio::io::Stdout>>>,
    shutdown_signal: Arc<Mutex<bool>>,
}

impl StdioTransport {
    /// Create a new stdio transport instance
    pub fn new() -> Self {
        Self {
            writer: Arc::new(Mutex::new(BufWriter::new(tokio::io::stdout()))),
            shutdown_signal: Arc::new(Mutex::new(false)),
        }
    }

    async fn is_shutdown_requested(&self) -> bool {
        *self.shutdown_signal.lock().await
    }

    async fn request_shutdown(&self) {
        *self.shutdown_signal.lock().await = true;
    }

    /// Serialize a message and write it as one line on stdout
    async fn write_message(&self, message: &McpMessage) -> Result<()> {
        let json_str = serde_json::to_string(&message.to_jsonrpc())
            .context("Failed to serialize message to JSON")?;

        debug!("Sending message: {}", json_str);

        let mut writer = self.writer.lock().await;
        writer
            .write_all(json_str.as_bytes())
            .await
            .context("Failed to write message to stdout")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to stdout")?;
        writer.flush().await.context("Failed to flush stdout")?;

        Ok(())
    }

    /// Read and parse the next JSON-RPC line from stdin
    async fn read_message(reader: &mut BufReader<tokio::io::Stdin>) -> Result<ReadOutcome> {
        let mut line = String::new();

        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("EOF received on stdin");
                Ok(ReadOutcome::Eof)
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return Ok(ReadOutcome::Skip);
                }

                debug!("Received line: {}", trimmed);

                let jsonrpc_message: JsonRpcMessage = serde_json::from_str(trimmed)
                    .map_err(|e| {
                        error!("Failed to parse JSON message: {} - Line: {}", e, trimmed);
                        anyhow::Error::new(e).context("Failed to parse JSON-RPC message")
                    })?;

                McpMessage::from_jsonrpc(jsonrpc_message)
                    .map(ReadOutcome::Message)
                    .map_err(|e| {
                        error!("Failed to convert JSON-RPC to MCP message: {}", e);
                        e
                    })
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                Err(anyhow::Error::new(e).context("Failed to read from stdin"))
            }
        }
    }

    /// Main message processing loop
    async fn process_messages(&self, handler: Box<dyn MessageHandler + Send + Sync>) -> Result<()> {
        let mut reader = BufReader::new(tokio::io::stdin());

        info!("Starting stdio message processing loop");

        loop {
            if self.is_shutdown_requested().await {
                info!("Shutdown requested, stopping message processing");
                break;
            }

            match Self::read_message(&mut reader).await {
                Ok(ReadOutcome::Message(message)) => match handler.handle_message(message).await {
                    Ok(Some(response)) => {
                        if let Err(e) = self.write_message(&response).await {
                            error!("Failed to send response: {}", e);
                        }
                    }
                    Ok(None) => debug!("No response generated for message"),
                    Err(e) => error!("Handler error: {}", e),
                },
                Ok(ReadOutcome::Skip) => continue,
                Ok(ReadOutcome::Eof) => {
                    info!("stdin closed, ending session");
                    break;
                }
                Err(e) => {
                    // Malformed input should not take the session down
                    warn!("Error reading message: {}", e);
                    continue;
                }
            }
        }

        info!("Message processing loop ended");
        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Transport for StdioTransport {
    async fn start(&self, handler: Box<dyn MessageHandler + Send + Sync>) -> Result<()> {
        info!("Starting stdio transport for MCP communication");

        *self.shutdown_signal.lock().await = false;
        self.process_messages(handler).await
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down stdio transport");

        self.request_shutdown().await;

        if let Ok(mut writer) = self.writer.try_lock() {
            if let Err(e) = writer.flush().await {
                warn!("Failed to flush output during shutdown: {}", e);
            }
        }

        Ok(())
    }
}
