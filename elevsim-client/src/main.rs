//! Elevator simulation console client: entry point.
//!
//! ```text
//! elevsim-client                      Connect with defaults
//! elevsim-client --config <path>      Use custom config TOML
//! elevsim-client --server host:port   Override the server address
//! elevsim-client --json               Print the final state as JSON
//! elevsim-client --gen-config         Dump default config and exit
//! ```

use std::io::BufRead;
use std::path::PathBuf;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use elevsim_core::{Connection, ConnectionInfo};

use elevsim_client::config::ClientConfig;
use elevsim_client::session::{Exit, Session};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "elevsim-client", about = "Elevator simulation console client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "elevsim-client.toml")]
    config: PathBuf,

    /// Server address (overrides config). Example: 127.0.0.1:8080
    #[arg(short, long)]
    server: Option<String>,

    /// Print the final simulation state as JSON on exit.
    #[arg(long)]
    json: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(addr) = cli.server {
        config.network.server_address = addr;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("elevsim-client v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Connect ──────────────────────────────────────────────

    let server: ConnectionInfo = config.network.server_address.parse()?;
    let conn = Connection::connect_timeout(&server, config.connect_timeout()).await?;
    info!(%server, "connected");

    // ── 2. Console reader ───────────────────────────────────────

    // Stdin reads block; keep them off the runtime.
    let (line_tx, line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin error: {e}");
                    break;
                }
            }
        }
    });

    // ── 3. Bootstrap and event loop ─────────────────────────────

    let mut session = Session::new(conn, config.simulation.clone(), StdRng::from_entropy());
    session.bootstrap().await?;

    let exit = session.run(line_rx).await?;
    match &exit {
        Exit::ServerClosed(reason) => info!(%reason, "server closed the session"),
        Exit::Disconnected => warn!("server went away"),
        Exit::Quit | Exit::Interrupted => info!("shutting down"),
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    session.close().await;
    Ok(())
}
