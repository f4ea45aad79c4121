//! Runtime configuration for the relay server
//!
//! There is no configuration file: the binary builds a [`ServerConfig`] from
//! command-line flags, and tests build one from [`ServerConfig::default`].

use shared::{MAX_PLAYERS, PROJECTILE_LIFETIME_MS};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_PORT_ATTEMPTS: u16 = 10;
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// First port to try
    pub port: u16,
    /// How many consecutive ports to try when the first one is taken
    pub port_attempts: u16,
    /// Concurrent joined players
    pub max_players: usize,
    /// Concurrent WebSocket connections, joined or not
    pub max_connections: usize,
    pub projectile_lifetime: Duration,
    pub ping_interval: Duration,
    /// Silence after which a connection is dropped
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            port_attempts: DEFAULT_PORT_ATTEMPTS,
            max_players: MAX_PLAYERS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            projectile_lifetime: Duration::from_millis(PROJECTILE_LIFETIME_MS),
            ping_interval: DEFAULT_PING_INTERVAL,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Candidate bind addresses, in the order they should be tried.
    ///
    /// Port 0 asks the OS for an ephemeral port, so there is nothing to retry.
    pub fn candidate_addrs(&self) -> Vec<String> {
        if self.port == 0 {
            return vec![format!("{}:0", self.host)];
        }

        let attempts = self.port_attempts.max(1);
        (0..attempts)
            .filter_map(|offset| self.port.checked_add(offset))
            .map(|port| format!("{}:{}", self.host, port))
            .collect()
    }

    pub fn projectile_lifetime_ms(&self) -> u64 {
        self.projectile_lifetime.as_millis().min(u64::MAX as u128) as u64
    }
}
