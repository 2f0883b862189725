//! Relay a live Icecast mountpoint to TCP and UDP replicas
//!
//! Run with: cargo run --example relay <SERVER> <MOUNTPOINT> <DEST>...
//!
//! Examples:
//!   cargo run --example relay radio.example:8000 live 127.0.0.1:9000
//!   cargo run --example relay radio.example:8000 live 10.0.0.5@9001 10.0.0.6:9000
//!
//! A destination written `host@port` is reached over UDP (one PDU per
//! datagram); `host:port` uses TCP with a 2-byte length before each PDU.
//!
//! Watch the PDUs arriving on a TCP replica with:
//!   nc -l 9000 | xxd | head

use std::time::Duration;

use icecast_relay::error::{Error, RelayError};
use icecast_relay::relay::{Relay, RelayConfig, ReplicaAddr};
use icecast_relay::session::IngestSession;
use icecast_relay::source::{IcecastClient, SourceConfig};

/// Pause between upstream reconnect attempts
const SOURCE_RETRY_DELAY: Duration = Duration::from_secs(3);

fn print_usage() {
    eprintln!("Usage: relay <SERVER> <MOUNTPOINT> <DEST>...");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  SERVER       Icecast server host:port");
    eprintln!("  MOUNTPOINT   Mountpoint name to relay");
    eprintln!("  DEST         host:port for TCP, host@port for UDP");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(if args.len() < 3 { 1 } else { 0 });
    }

    let server = &args[1];
    let mountpoint = &args[2];

    let mut replicas = Vec::new();
    for dest in &args[3..] {
        match dest.parse::<ReplicaAddr>() {
            Ok(addr) => replicas.push(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("icecast_relay=info".parse()?)
                .add_directive("relay=info".parse()?),
        )
        .init();

    let (intake, relay) = Relay::start(RelayConfig::with_replicas(replicas))?;
    let mut session = IngestSession::new(mountpoint.as_str(), intake);
    let client = IcecastClient::new(SourceConfig::new(server.as_str(), mountpoint.as_str()));

    let ingest = async {
        loop {
            let result = client.run(&mut session).await;
            session.end();

            match result {
                Err(Error::Relay(RelayError::IntakeClosed)) => {
                    tracing::warn!("Relay stopped, giving up on source");
                    break;
                }
                Err(e) => tracing::warn!(error = %e, "Source connection ended"),
                Ok(()) => tracing::info!("Source connection ended"),
            }

            tokio::time::sleep(SOURCE_RETRY_DELAY).await;
        }
    };

    // A stalled source blocks in `client.run`, so watch the relay as well
    tokio::select! {
        _ = ingest => {}
        _ = relay.stopped() => {
            tracing::warn!("Relay stopped, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    // Closing the intake stops the broadcaster and every replica worker
    drop(session);

    match relay.join().await {
        Ok(stats) => {
            println!("Relayed {} PDUs", stats.sequenced);
            for (slot, replica) in stats.replicas.iter().enumerate() {
                println!(
                    "  replica {}: enqueued={} dropped={}",
                    slot, replica.enqueued, replica.dropped
                );
            }
        }
        Err(e) => eprintln!("Relay error: {}", e),
    }

    Ok(())
}
