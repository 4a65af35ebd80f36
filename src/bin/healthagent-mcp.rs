//! HealthAgent MCP Server - Main binary

use anyhow::Result;
use clap::Parser;
use healthagent_mcp::transport::{HttpTransport, StdioTransport, Transport};
use healthagent_mcp::{AgentConfig, AgentServer};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "healthagent-mcp")]
#[command(about = "HealthAgent Model Context Protocol Server")]
#[command(version)]
struct Cli {
    /// Host to bind to for HTTP transport
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to bind to for HTTP transport
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Transport mode: stdio, http, or both
    #[arg(long, default_value = "stdio", value_parser = ["stdio", "http", "both"])]
    transport: String,

    /// Base URL of the FHIR server
    #[arg(long, default_value = "https://hapi.fhir.org/baseR4")]
    fhir_base_url: String,

    /// Shared deadline for one aggregation, in seconds
    #[arg(long, default_value = "20")]
    deadline_secs: u64,

    /// Fetch a single clinical summary for this patient id and exit
    #[arg(long)]
    patient_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr under stdio transport so they never interfere with
    // MCP communication on stdout. One-shot mode keeps stdout clean too.
    if cli.transport == "stdio" || cli.patient_id.is_some() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(tracing_subscriber::EnvFilter::new(&cli.log_level))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(tracing_subscriber::EnvFilter::new(&cli.log_level))
            .init();
    }

    info!("Starting HealthAgent MCP Server v{}", healthagent_mcp::VERSION);

    let config = AgentConfig {
        host: cli.host.clone(),
        port: cli.port,
        log_level: cli.log_level,
        http_transport: cli.transport == "http" || cli.transport == "both",
        stdio_transport: cli.transport == "stdio" || cli.transport == "both",
        fhir_base_url: cli.fhir_base_url,
        aggregation_deadline_secs: cli.deadline_secs,
        ..AgentConfig::default()
    };

    let server = AgentServer::new(config)?;

    // One-shot CLI mode: print the summary and exit without starting a transport
    if let Some(patient_id) = cli.patient_id {
        let summary = server.aggregator().summarize(&patient_id).await;
        println!("{summary}");
        return Ok(());
    }

    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(_) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    };

    match cli.transport.as_str() {
        "stdio" => {
            info!("Starting stdio transport for MCP client integration");
            let transport = StdioTransport::new();

            tokio::select! {
                result = transport.start(Box::new(server.clone())) => {
                    match result {
                        Ok(_) => info!("Stdio transport completed successfully"),
                        Err(e) => error!("Stdio transport error: {}", e),
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, stopping stdio transport");
                    if let Err(e) = transport.shutdown().await {
                        error!("Error during stdio transport shutdown: {}", e);
                    }
                }
            }
        }
        "http" => {
            info!("Starting HTTP transport on {}:{}", cli.host, cli.port);
            let transport = HttpTransport::new(cli.host, cli.port);

            tokio::select! {
                result = transport.start(Box::new(server.clone())) => {
                    match result {
                        Ok(_) => info!("HTTP transport completed successfully"),
                        Err(e) => error!("HTTP transport error: {}", e),
                    }
                }
                _ = shutdown_signal => {
                    info!("Shutdown signal received, stopping HTTP transport");
                    if let Err(e) = transport.shutdown().await {
                        error!("Error during HTTP transport shutdown: {}", e);
                    }
                }
            }
        }
        "both" => {
            info!("Starting both stdio and HTTP transports");
            let stdio_transport = StdioTransport::new();
            let http_transport = HttpTransport::new(cli.host, cli.port);

            let server_clone = server.clone();
            let stdio_task = tokio::spawn(async move {
                if let Err(e) = stdio_transport.start(Box::new(server_clone)).await {
                    error!("Stdio transport error: {}", e);
                }
            });

            let http_task = tokio::spawn(async move {
                if let Err(e) = http_transport.start(Box::new(server)).await {
                    error!("HTTP transport error: {}", e);
                }
            });

            tokio::select! {
                _ = stdio_task => info!("Stdio transport task completed"),
                _ = http_task => info!("HTTP transport task completed"),
                _ = shutdown_signal => {
                    info!("Shutdown signal received, stopping all transports");
                }
            }
        }
        _ => {
            error!("Invalid transport mode: {}", cli.transport);
            return Err(anyhow::Error::msg("Invalid transport mode"));
        }
    }

    info!("HealthAgent MCP Server shutdown complete");
    Ok(())
}
