//! Datasphere command-line client
//!
//! Authenticates with three-legged OAuth2 — a silent refresh when a
//! credential is persisted, the browser flow otherwise — and runs one API
//! call per invocation.

mod api;
mod config;

use anyhow::{Context, Result, bail};
use datasphere_auth::{ApiResponse, AuthenticatedClient};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ConnectionConfig;

#[derive(Debug, PartialEq)]
enum Command {
    Login,
    Assets { space: String, top: u32 },
    TaskChain { space: String, chain: String },
}

fn usage() -> ! {
    eprintln!(
        "usage: dsp [--config <connection.json>] <command>\n\
         \n\
         commands:\n\
         \x20 login                          authenticate and store a refresh credential\n\
         \x20 assets <space> [--top <n>]     list catalog assets for a space\n\
         \x20 task-chain <space> <chain>     start a task chain"
    );
    std::process::exit(2);
}

/// Hand-rolled argument parsing: a `--config` flag plus one subcommand.
fn parse_args(args: &[String]) -> (Option<String>, Command) {
    let mut config_path = None;
    let mut rest: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).cloned().unwrap_or_else(|| usage()));
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }

    let command = match rest.first().map(String::as_str) {
        Some("login") => Command::Login,
        Some("assets") => {
            let space = rest.get(1).cloned().unwrap_or_else(|| usage());
            let top = match rest.iter().position(|a| a == "--top") {
                Some(pos) => rest
                    .get(pos + 1)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| usage()),
                None => 10,
            };
            Command::Assets { space, top }
        }
        Some("task-chain") => {
            let space = rest.get(1).cloned().unwrap_or_else(|| usage());
            let chain = rest.get(2).cloned().unwrap_or_else(|| usage());
            Command::TaskChain { space, chain }
        }
        _ => usage(),
    };

    (config_path, command)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (cli_config, command) = parse_args(&args);

    let connection_path = ConnectionConfig::resolve_path(cli_config.as_deref());
    info!(path = %connection_path.display(), "loading connection configuration");
    let connection = ConnectionConfig::load(&connection_path)
        .with_context(|| format!("failed to load connection file {}", connection_path.display()))?;

    let client_config = connection
        .into_client_config()
        .context("invalid connection configuration")?;
    let client = AuthenticatedClient::connect(client_config)
        .await
        .context("authentication failed")?;

    match command {
        Command::Login => {
            info!("authentication complete, refresh credential ready for the next run");
        }
        Command::Assets { space, top } => {
            render(api::list_assets(&client, &space, top).await?)?;
        }
        Command::TaskChain { space, chain } => {
            render(api::start_task_chain(&client, &space, &chain).await?)?;
        }
    }

    Ok(())
}

/// Print a response — status line plus pretty JSON when the body parses,
/// raw body otherwise — or fail the run when the request stayed
/// unauthorized after the retry.
fn render(response: Option<ApiResponse>) -> Result<()> {
    let Some(response) = response else {
        bail!("request stayed unauthorized after reauthentication");
    };

    println!("status: {}", response.status.as_u16());
    match response.json() {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.body),
    }
    Ok(())
}
