use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// First port to try
    #[arg(short, long, env = "PORT", default_value = "3001")]
    port: u16,

    /// Consecutive ports to try when the first one is taken
    #[arg(long, default_value = "10")]
    port_attempts: u16,

    /// Maximum number of joined players
    #[arg(long, default_value = "16")]
    max_players: usize,

    /// Maximum number of open WebSocket connections
    #[arg(long, default_value = "64")]
    max_connections: usize,

    /// How long a projectile lives, in milliseconds
    #[arg(long, default_value = "3000")]
    projectile_lifetime_ms: u64,

    /// Seconds between server pings
    #[arg(long, default_value = "25")]
    ping_interval_secs: u64,

    /// Seconds of silence before a connection is dropped
    #[arg(long, default_value = "45")]
    client_timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            port_attempts: args.port_attempts,
            max_players: args.max_players,
            max_connections: args.max_connections,
            projectile_lifetime: Duration::from_millis(args.projectile_lifetime_ms),
            ping_interval: Duration::from_secs(args.ping_interval_secs),
            client_timeout: Duration::from_secs(args.client_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::from(args);

    info!(
        "Starting PolyWars server (max {} players, {}ms projectiles)",
        config.max_players,
        config.projectile_lifetime_ms()
    );

    let server = Server::bind(config).await?;
    let handle = server.handle();
    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown();
            let _ = server_task.await;
        }
    }

    Ok(())
}
