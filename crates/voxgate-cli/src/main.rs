//! vox — multi-session voice gateway controller.
//!
//! Loads one credential per token-file line, binds each to a registry slot,
//! and drives the pool from a small REPL: join/leave voice channels, toggle
//! mute/deafen/camera/stream, send messages, and list session status.

mod config;
mod parse;
mod render;
mod tokens;

use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use voxgate_client::{Connector, SessionConfig, SessionRegistry};
use voxgate_core::Command;

/// vox — multi-session voice gateway controller
#[derive(Parser)]
#[command(name = "vox", version, about = "Drive a pool of voice gateway sessions from one terminal")]
struct Cli {
    /// Guild id to operate in (overrides config; prompted if absent)
    #[arg(short, long)]
    guild: Option<String>,

    /// Token file path (one token per line)
    #[arg(long)]
    tokens: Option<String>,

    /// Config file path
    #[arg(long = "config")]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// One command line to run instead of the REPL, e.g.
    /// `vox -g 10 vc connect tok 0 -cid 20`
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("vox=debug,voxgate_cli=debug,voxgate_client=debug,voxgate_core=debug")
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("vox=warn,voxgate_cli=warn,voxgate_client=warn")
            .with_target(false)
            .init();
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("vox: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load config file.
    let config_path = cli.config.clone().unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_default();
        home.join(".voxgate")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    });
    let cfg = config::Config::load(&config_path).unwrap_or_default();

    // CLI flags override config values.
    let tokens_path = cli.tokens.clone().unwrap_or(cfg.default.tokens_path);
    let credentials = tokens::load_credentials(&tokens_path)?;
    println!("loaded {} credential slot(s)", credentials.len());

    let guild_id = match cli.guild.clone() {
        Some(guild) => guild,
        None if !cfg.default.guild_id.is_empty() => cfg.default.guild_id.clone(),
        None => prompt_guild_id()?,
    };

    let session_config = SessionConfig {
        api_base: cfg.default.api_base,
        ..SessionConfig::default()
    };
    let registry = Arc::new(SessionRegistry::new(
        credentials,
        guild_id,
        session_config,
        Connector::WebSocket,
    ));

    if cli.args.is_empty() {
        repl(&registry).await?;
    } else {
        let line = cli.args.join(" ");
        run_line(&registry, &line).await;
    }

    registry.disconnect_all().await;
    Ok(())
}

fn prompt_guild_id() -> Result<String> {
    loop {
        print!("guild id: ");
        std::io::stdout().flush().context("stdout flush failed")?;

        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("failed to read guild id")?;
        let guild = line.trim();
        if guild.is_empty() {
            continue;
        }
        if !guild.chars().all(|c| c.is_ascii_digit()) {
            eprintln!("guild id must be numeric");
            continue;
        }
        return Ok(guild.to_string());
    }
}

async fn repl(registry: &SessionRegistry) -> Result<()> {
    println!("{}", parse::USAGE.dark_grey());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("vox> ");
        std::io::stdout().flush().context("stdout flush failed")?;

        let Some(line) = lines.next_line().await.context("stdin read failed")? else {
            break; // EOF behaves like quit
        };
        match parse::parse_line(&line) {
            Ok(parse::ReplAction::Quit) => break,
            Ok(parse::ReplAction::Nothing) => {}
            Ok(parse::ReplAction::Dispatch(command)) => run_command(registry, &command).await,
            Err(e) => eprintln!("{}", e.to_string().red()),
        }
    }
    Ok(())
}

async fn run_line(registry: &SessionRegistry, line: &str) {
    match parse::parse_line(line) {
        Ok(parse::ReplAction::Dispatch(command)) => run_command(registry, &command).await,
        Ok(_) => {}
        Err(e) => eprintln!("{}", e.to_string().red()),
    }
}

async fn run_command(registry: &SessionRegistry, command: &Command) {
    if matches!(command, Command::ListSessions) {
        render::print_statuses(&registry.list().await);
        return;
    }

    let outcome = registry.dispatch(command).await;
    if outcome.ok {
        println!("{}", outcome.message.green());
    } else {
        eprintln!("{}", outcome.message.red());
    }
}
