use clap::Parser;
use log::info;
use server::config::{parse_port_input, ServerConfig, PROMPT_PORT_RANGE};
use server::network::Server;
use shared::{local_ip_towards, DEFAULT_SERVER_PORT};
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on (prompted for when omitted)
    #[arg(short, long)]
    port: Option<u16>,

    /// Milliseconds of silence before a client is dropped
    #[arg(long, default_value = "10000")]
    client_timeout_ms: u64,

    /// Milliseconds between liveness sweeps
    #[arg(long, default_value = "10000")]
    sweep_interval_ms: u64,
}

/// Asks for a port until the answer is valid.
fn prompt_port() -> Result<u16, Box<dyn std::error::Error>> {
    loop {
        print!(
            "Server port between {} and {} (default {}): ",
            PROMPT_PORT_RANGE.start(),
            PROMPT_PORT_RANGE.end(),
            DEFAULT_SERVER_PORT
        );
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            return Ok(DEFAULT_SERVER_PORT);
        }

        match parse_port_input(&line) {
            Ok(port) => return Ok(port),
            Err(e) => eprintln!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let port = match args.port {
        Some(port) => port,
        None => prompt_port()?,
    };

    let config = ServerConfig {
        host: args.host,
        port,
        client_timeout: Duration::from_millis(args.client_timeout_ms),
        sweep_interval: Duration::from_millis(args.sweep_interval_ms),
    };

    let server = Server::bind(config).await?;

    let lan_probe = SocketAddr::from(([8, 8, 8, 8], 80));
    info!(
        "Reachable on the local network at {}:{}",
        local_ip_towards(lan_probe),
        port
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
