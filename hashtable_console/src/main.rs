//! Standalone console binary.
//!
//! Usage:
//!   cargo run -p hashtable_console -- [--config tables.json] [--log debug]
//!
//! Tables listed in the config are created (and imported, when they carry
//! data) before the prompt appears.
//!
//! Console commands:
//!   create <id> <key_dtype> <value_dtype>
//!   import <id> <k1> <v1> [<k2> <v2> ...]
//!   find <id> <default> <k1> [<k2> ...]
//!   size <id>
//!   status
//!   quit

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use hashtable_console::TableSession;
use hashtable_shared::config::HashtableConfig;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    log: Option<String>,
}

fn parse_args() -> Args {
    let mut parsed = Args::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                parsed.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--log" if i + 1 < args.len() => {
                parsed.log = Some(args[i + 1].clone());
                i += 2;
            }
            _ => i += 1,
        }
    }
    parsed
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HashtableConfig> {
    let Some(path) = path else {
        return Ok(HashtableConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    HashtableConfig::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();
    let cfg = load_config(args.config.as_ref())?;

    let filter = args.log.clone().unwrap_or_else(|| cfg.log_filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .init();

    info!(config = ?args.config, tables = cfg.tables.len(), "Starting hashtable console");
    let mut session = TableSession::new(cfg).context("create session")?;

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    session.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Hashtable console ready. Type 'help' for commands, 'quit' to exit.");
    println!();

    let mut stdout = std::io::stdout();
    session.run(&mut stdout).await
}
