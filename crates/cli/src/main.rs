mod config;
mod error;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use auth::AuthGate;
use clap::{Parser, Subcommand};
use mcp::{Implementation, Server};
use serde_json::{Map, Value};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tools::{Dispatcher, ToolRegistry};
use tracing::{info, warn};
use transport::ConnectionManager;

use config::Config;
use error::{Error, Result};

const SERVER_NAME: &str = "revit-mcp";

#[derive(Parser)]
#[command(name = "revit-mcp")]
#[command(about = "MCP server that lets AI agents drive Autodesk Revit", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./revit-mcp.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout
    Serve,
    /// List the registered tools
    Tools,
    /// Run one tool call and print the result
    Call {
        /// Tool name
        name: String,
        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Print a fresh shared secret
    GenerateSecret,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::GenerateSecret) = cli.command {
        println!("{}", auth::generate_secret());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    match cli.command {
        Some(Commands::Serve) | None => cmd_serve(config).await,
        Some(Commands::Tools) => cmd_tools(config),
        Some(Commands::Call { name, args }) => cmd_call(config, &name, &args).await,
        Some(Commands::GenerateSecret) => Ok(()),
    }
}

fn build_dispatcher(config: Config) -> Result<Dispatcher> {
    let manager = ConnectionManager::new(config.manager_config());
    let dispatcher = Dispatcher::new(ToolRegistry::with_builtin()?, manager)
        .with_breaker_config(config.breaker_config());

    Ok(match config.auth {
        Some(auth) => {
            info!(
                allowed_clients = auth.allowed_clients.len(),
                max_requests = auth.rate_limit.max_requests,
                window_ms = auth.rate_limit.window_ms,
                "authentication enabled"
            );
            dispatcher.with_auth(AuthGate::new(auth))
        }
        None => {
            warn!("authentication disabled: set REVIT_MCP_API_KEY or [auth].shared_secret");
            dispatcher
        }
    })
}

async fn cmd_serve(config: Config) -> Result<()> {
    let address = config.manager_config().connection.address();
    let lifecycle = config.remote.lifecycle;
    let dispatcher = Arc::new(build_dispatcher(config)?);
    info!(
        %address,
        ?lifecycle,
        tools = dispatcher.registry().len(),
        "revit-mcp v{} serving on stdio",
        env!("CARGO_PKG_VERSION")
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let server = Server::new(
        Arc::clone(&dispatcher),
        Implementation::new(SERVER_NAME, env!("CARGO_PKG_VERSION")),
    );
    let served = server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), cancel)
        .await;

    dispatcher.shutdown().await;
    info!("shut down");
    Ok(served?)
}

fn cmd_tools(config: Config) -> Result<()> {
    let dispatcher = build_dispatcher(config)?;
    for tool in dispatcher.registry().iter() {
        let summary = tool.description().split(". ").next().unwrap_or_default();
        println!("{:<30}  {summary}", tool.name());
    }
    Ok(())
}

async fn cmd_call(config: Config, name: &str, args: &str) -> Result<()> {
    let arguments = parse_arguments(args)?;
    let dispatcher = build_dispatcher(config)?;
    let outcome = dispatcher.dispatch(name, arguments).await;
    dispatcher.shutdown().await;
    println!("{}", outcome?);
    Ok(())
}

fn parse_arguments(args: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(args) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::InvalidArguments(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(Error::InvalidArguments(e.to_string())),
    }
}

/// Cancel `token` on SIGINT or SIGTERM.
#[cfg(unix)]
async fn cancel_on_signal(token: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "cannot install signal handlers; stop with EOF");
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
    }
    token.cancel();
}

/// Cancel `token` on Ctrl+C.
#[cfg(not(unix))]
async fn cancel_on_signal(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received Ctrl+C, shutting down");
            token.cancel();
        }
        Err(e) => warn!(error = %e, "cannot install Ctrl+C handler; stop with EOF"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["revit-mcp"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn call_takes_name_and_args() {
        let cli = Cli::try_parse_from([
            "revit-mcp",
            "call",
            "delete_element",
            "--args",
            r#"{"elementId":"1"}"#,
            "--config",
            "bridge.toml",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Call { name, args }) => {
                assert_eq!(name, "delete_element");
                assert_eq!(parse_arguments(&args).unwrap()["elementId"], "1");
            }
            _ => panic!("expected call"),
        }
        assert_eq!(cli.config, Some(PathBuf::from("bridge.toml")));
    }

    #[test]
    fn arguments_must_be_an_object() {
        assert!(parse_arguments("{}").unwrap().is_empty());
        assert!(matches!(parse_arguments("[1]"), Err(Error::InvalidArguments(_))));
        assert!(matches!(parse_arguments("{"), Err(Error::InvalidArguments(_))));
    }

    #[test]
    fn dispatcher_respects_auth_section() {
        let open = build_dispatcher(Config::default()).unwrap();
        assert!(!open.is_authenticated());

        let mut config = Config::default();
        config
            .apply_env(|key| (key == "REVIT_MCP_API_KEY").then(|| "k".repeat(32)))
            .unwrap();
        let gated = build_dispatcher(config).unwrap();
        assert!(gated.is_authenticated());
        assert_eq!(gated.registry().len(), 15);
    }
}
