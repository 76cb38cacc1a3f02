//! The mm CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mm_cli::commands::{self, JoinArgs};
use mm_cli::output::print_error;
use mm_core::MeshConfig;

#[derive(Parser)]
#[command(name = "mm")]
#[command(version, about = "Peer-to-peer mesh of terminal members")]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command in a PTY and join it to the mesh as a member
    Join {
        /// Command to run (defaults to $SHELL, then /bin/zsh)
        command: Option<String>,

        /// Member and peer name (defaults to the hostname)
        #[arg(long)]
        name: Option<String>,

        /// Host to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Seed peer to dial, as name@host:port (repeatable)
        #[arg(long = "peer")]
        peers: Vec<String>,

        /// Skip automatic peer discovery
        #[arg(long)]
        no_discovery: bool,
    },

    /// Type a message into a member's terminal
    Tell {
        /// Member name
        name: String,
        /// Text to type
        message: String,
        /// Mesh server host
        #[arg(long)]
        host: Option<String>,
        /// Mesh server port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List every member in the mesh
    List {
        /// Mesh server host
        #[arg(long)]
        host: Option<String>,
        /// Mesh server port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Stop join sessions: peer ids via the mesh, or --all local processes
    Kill {
        /// Peers to stop, as name@host:port
        peers: Vec<String>,
        /// Signal every local join session owned by you
        #[arg(long)]
        all: bool,
        /// Use SIGKILL instead of SIGTERM with --all
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = MeshConfig::load();
    if let Err(e) = run(cli, &config).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &MeshConfig) -> Result<()> {
    match cli.command {
        Some(Commands::Join {
            command,
            name,
            host,
            port,
            peers,
            no_discovery,
        }) => {
            commands::join_command(
                config,
                JoinArgs {
                    command,
                    name,
                    host,
                    port,
                    peers,
                    no_discovery,
                },
            )
            .await
        }

        Some(Commands::Tell {
            name,
            message,
            host,
            port,
        }) => commands::tell_command(config, &name, &message, host, port).await,

        Some(Commands::List { host, port }) => commands::list_command(config, host, port).await,

        Some(Commands::Kill { peers, all, force }) => {
            commands::kill_command(peers, all, force).await
        }

        // Bare `mm` lists the mesh
        None => commands::list_command(config, None, None).await,
    }
}
