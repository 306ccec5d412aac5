//! Radio server serving a directory of songs
//!
//! Run with: cargo run --example radio_server [BIND_ADDR] [MUSIC_DIR]
//!
//! Examples:
//!   cargo run --example radio_server                        # 0.0.0.0:9000, ./songs
//!   cargo run --example radio_server localhost              # 127.0.0.1:9000
//!   cargo run --example radio_server 127.0.0.1:9001 ~/Music
//!
//! ## Listening
//!
//! With VLC:
//!   vlc http://localhost:9000/play/1
//!
//! With ffplay:
//!   ffplay "http://localhost:9000/play/hungarian%20dance"
//!
//! ## Browsing
//!
//!   curl http://localhost:9000/songs
//!   curl http://localhost:9000/search/brahms
//!
//! Every listener of the same song hears the same live stream. Tracks loop
//! until nobody has listened for 30 seconds.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use airwave::library::{LibraryConfig, TrackLibrary};
use airwave::server::config::DEFAULT_PORT;
use airwave::{RadioServer, ServerConfig, Station, StreamConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:9000
/// - "localhost:9001" -> 127.0.0.1:9001
/// - "127.0.0.1" -> 127.0.0.1:9000
/// - "0.0.0.0:9001" -> 0.0.0.0:9001
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: radio_server [BIND_ADDR] [MUSIC_DIR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:9000)");
    eprintln!("  MUSIC_DIR    Directory with audio files (default: ./songs)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    let music_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("songs"));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airwave=debug".parse()?)
                .add_directive("radio_server=debug".parse()?),
        )
        .init();

    let library = TrackLibrary::open(LibraryConfig::with_dir(&music_dir)).await?;
    if library.tracks().is_empty() {
        tracing::warn!(dir = %music_dir.display(), "No songs found");
    }
    for track in library.tracks() {
        println!("  [{}] {} ({})", track.id, track.title, track.format);
    }

    println!("Starting radio server on {}", config.bind_addr);
    println!("Listen: http://{}/play/1", config.bind_addr);
    println!();

    let station = Arc::new(Station::new(library, StreamConfig::default()));
    let server = RadioServer::new(config, station);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Failed to listen for Ctrl+C: {}", e);
        }
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
