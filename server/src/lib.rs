//! # PolyWars Relay Server Library
//!
//! This library provides the session and state-broadcast relay for the
//! browser-based PolyWars shooter. It tracks joined players, relays their
//! poses, and manages short-lived projectile entities.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Handles the lifecycle of player sessions:
//! - Join handshake with a fixed player capacity
//! - Initial world snapshot for newcomers
//! - Teardown of sessions and owned projectiles on disconnect
//!
//! ### State Relay
//! The server is not authoritative over movement. Each pose update simply
//! overwrites the stored pose and is fanned out to the other players: last
//! write wins, with no validation and no reordering.
//!
//! ### Projectile Expiry
//! Projectiles are origin/velocity metadata with a fixed lifetime. Clients
//! simulate trajectories; the server only announces creation and removal.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! All state lives in one task. Per-socket tasks decode WebSocket framing
//! and forward messages over a channel, so every handler runs to completion
//! before the next one starts, without locks.
//!
//! ### WebSocket Transport
//! Each text frame carries one named event in a JSON envelope
//! (`{"event": "...", "data": ...}`). See the `shared` crate for the wire types.
//!
//! ## Module Organization
//!
//! ### Connection Module (`connection`)
//! Live sockets: identity issuance, connection cap, liveness, fan-out.
//!
//! ### Session Module (`session`)
//! Player records keyed by connection identity.
//!
//! ### Projectile Module (`projectile`)
//! Projectile records and their expiry queue.
//!
//! ### Relay Module (`relay`)
//! Maps inbound events to store mutations and audience-tagged outbound events.
//!
//! ### Network Module (`network`)
//! Listener, socket tasks, and the server loop tying everything together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         host: "127.0.0.1".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod network;
pub mod projectile;
pub mod relay;
pub mod session;
