use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use minidhcp::{Config, DhcpServer, LeaseTable, Result};

#[derive(Parser)]
#[command(name = "minidhcp")]
#[command(author, version, about = "A small single-threaded DHCP server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve DHCP requests until interrupted (default)
    Run,
    /// Print the effective configuration as JSON
    ShowConfig,
    /// Print the persisted lease table
    ListLeases,
    /// Drop expired and lapsed declined leases from the lease file
    CleanupLeases,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = Config::load_or_create(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Starting DHCP server with config: {:?}", cli.config);
            let mut server = DhcpServer::new(config).await?;

            let shutdown = Arc::new(AtomicBool::new(false));
            let signal = Arc::clone(&shutdown);
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received shutdown signal, stopping server...");
                        signal.store(true, Ordering::Relaxed);
                    }
                    Err(error) => error!("Failed to listen for shutdown signal: {}", error),
                }
            });

            server.run(&shutdown).await?;
            server.save_leases().await
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::ListLeases => {
            let table = LeaseTable::load_file(&config.leases_file).await?;

            if table.is_empty() {
                println!("No leases.");
                return Ok(());
            }

            let now = Utc::now();
            let mut leases: Vec<_> = table.iter().collect();
            leases.sort_by_key(|(_, lease)| lease.ip_address);

            println!(
                "{:<20} {:<16} {:<24} {:<10}",
                "MAC Address", "IP Address", "Expires At", "Remaining"
            );
            println!("{}", "-".repeat(72));

            for (mac, lease) in leases {
                let remaining = lease.remaining_seconds(now);
                let remaining_str = if remaining == 0 {
                    "expired".to_string()
                } else if lease.declined {
                    format!("declined ({}s)", remaining)
                } else {
                    format!("{}s", remaining)
                };

                println!(
                    "{:<20} {:<16} {:<24} {:<10}",
                    mac,
                    lease.ip_address,
                    lease.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    remaining_str
                );
            }

            println!(
                "{} active of {} in a pool of {}",
                table.active_count(now),
                table.len(),
                config.pool_size()
            );

            Ok(())
        }
        Commands::CleanupLeases => {
            let mut table = LeaseTable::load_file(&config.leases_file).await?;
            let count = table.purge_expired(Utc::now());
            table.save_file(&config.leases_file).await?;
            println!("Cleaned up {} expired lease(s).", count);
            Ok(())
        }
    }
}
