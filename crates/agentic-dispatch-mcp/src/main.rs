//! AgenticDispatch MCP Server: entry point.

use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use agentic_dispatch::CapabilityCategory;
use agentic_dispatch_mcp::config::ServerConfig;
use agentic_dispatch_mcp::protocol::ProtocolHandler;
use agentic_dispatch_mcp::transport::{ResponseOrder, StdioTransport};
use agentic_dispatch_mcp::types::MCP_VERSION;

#[derive(Parser)]
#[command(
    name = "agentic-dispatch-mcp",
    about = "MCP server for AgenticDispatch: tools, resources, and prompts over stdio",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Maximum number of handlers running at once.
    /// Also reads DISPATCH_MAX_CONCURRENT.
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Per-call timeout in milliseconds (0 disables it).
    /// Also reads DISPATCH_CALL_TIMEOUT_MS.
    #[arg(long, global = true)]
    call_timeout_ms: Option<u64>,

    /// How long a request may wait for a free slot, in milliseconds.
    /// Also reads DISPATCH_ADMISSION_TIMEOUT_MS.
    #[arg(long, global = true)]
    admission_timeout_ms: Option<u64>,

    /// Fail immediately instead of waiting when every slot is taken.
    #[arg(long, global = true)]
    reject_when_busy: bool,

    /// Ignore undeclared arguments instead of rejecting the call.
    #[arg(long, global = true)]
    lenient_arguments: bool,

    /// Write responses in request-arrival order.
    /// Also reads DISPATCH_ORDERED.
    #[arg(long, global = true)]
    ordered: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Print server capabilities and registered names as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   agentic-dispatch-mcp completions bash > ~/.local/share/bash-completion/completions/agentic-dispatch-mcp
    ///   agentic-dispatch-mcp completions zsh > ~/.zfunc/_agentic-dispatch-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

/// CLI flag > environment variable > default.
fn resolve_config(cli: &Cli) -> ServerConfig {
    let mut config = ServerConfig::from_env();
    if let Some(n) = cli.max_concurrent {
        config.max_concurrent = n.max(1);
    }
    if let Some(ms) = cli.call_timeout_ms {
        config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }
    if let Some(ms) = cli.admission_timeout_ms {
        config.admission_timeout = Duration::from_millis(ms);
    }
    if cli.reject_when_busy {
        config.reject_when_busy = true;
    }
    if cli.lenient_arguments {
        config.strict_arguments = false;
    }
    if cli.ordered {
        config.response_order = ResponseOrder::Arrival;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&cli);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!(
                max_concurrent = config.max_concurrent,
                call_timeout = ?config.call_timeout,
                order = ?config.response_order,
                "AgenticDispatch MCP server"
            );
            let dispatcher = config.build_dispatcher()?;
            let handler = ProtocolHandler::new(dispatcher);
            let transport = StdioTransport::new(handler).with_order(config.response_order);
            transport.run().await?;
        }

        Commands::Info => {
            let dispatcher = config.build_dispatcher()?;
            let names = |category| {
                dispatcher
                    .list(category)
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect::<Vec<_>>()
            };
            let session = dispatcher.session();
            let info = serde_json::json!({
                "server": {
                    "name": session.server_name(),
                    "version": session.server_version(),
                },
                "protocol_version": MCP_VERSION,
                "capabilities": session.capabilities(),
                "tools": names(CapabilityCategory::Tool),
                "resources": names(CapabilityCategory::Resource),
                "prompts": names(CapabilityCategory::Prompt),
                "limits": {
                    "max_concurrent": config.max_concurrent,
                    "admission_timeout_ms": config.admission_timeout.as_millis() as u64,
                    "call_timeout_ms": config.call_timeout.map(|t| t.as_millis() as u64),
                    "reject_when_busy": config.reject_when_busy,
                },
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "agentic-dispatch-mcp",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
