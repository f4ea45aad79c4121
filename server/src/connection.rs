//! Connection tracking and outbound fan-out for the relay server
//!
//! This module handles the server-side view of live WebSocket connections:
//! - Identity issuance when a socket is accepted
//! - Transport-level capacity (independent of the player limit)
//! - Liveness tracking and timeout cleanup
//! - Resolving an [`Audience`] to concrete sockets and delivering frames
//!
//! A connection may exist without a player session; joining is arbitrated
//! by the session store, not here.

use crate::relay::{Audience, Outbound};
use log::{debug, error, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{encode, ConnectionId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const CONNECTION_ID_LEN: usize = 20;

/// Represents one accepted WebSocket connection
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Last time we received any frame from this connection
    pub last_seen: Instant,
    /// Queue drained by the connection's writer task
    sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            sender,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing was received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues a frame for the writer task. Returns false if the socket is gone.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Manages all live connections
///
/// The registry is owned by the server event loop; nothing else touches it,
/// so no locking is needed.
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    /// Maximum number of concurrent sockets allowed
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            max_connections,
        }
    }

    /// Admits a new connection and issues its identity
    ///
    /// Returns None if the server is at its connection cap.
    pub fn add_connection(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = self.generate_id();
        info!("A user connected: {} from {}", id, addr);
        self.connections
            .insert(id.clone(), Connection::new(id.clone(), addr, sender));

        Some(id)
    }

    /// Returns true if the connection was found and removed
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        if let Some(connection) = self.connections.remove(id) {
            debug!("Connection {} from {} closed", connection.id, connection.addr);
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self, id: &ConnectionId) {
        if let Some(connection) = self.connections.get_mut(id) {
            connection.touch();
        }
    }

    /// Removes connections that have been silent longer than `timeout`
    ///
    /// Returns the removed identities so their sessions can be torn down.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ConnectionId> {
        let timed_out: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|connection| connection.is_timed_out(timeout))
            .map(|connection| connection.id.clone())
            .collect();

        for id in &timed_out {
            info!("Connection {} timed out", id);
            self.remove_connection(id);
        }

        timed_out
    }

    /// Sends an outbound event to its audience
    ///
    /// The event is encoded once and the text shared by every recipient.
    /// Returns the number of connections the frame was queued for.
    pub fn deliver(&self, outbound: &Outbound) -> usize {
        let text = match encode(&outbound.event) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {}: {}", outbound.event.name(), e);
                return 0;
            }
        };

        let mut delivered = 0;
        for connection in self.recipients(&outbound.audience) {
            if connection.send(Message::Text(text.clone())) {
                delivered += 1;
            } else {
                debug!(
                    "Dropped {} for closed connection {}",
                    outbound.event.name(),
                    connection.id
                );
            }
        }

        delivered
    }

    fn recipients<'a>(&'a self, audience: &'a Audience) -> Vec<&'a Connection> {
        match audience {
            Audience::Only(id) => self.connections.get(id).into_iter().collect(),
            Audience::AllExcept(excluded) => self
                .connections
                .values()
                .filter(|connection| &connection.id != excluded)
                .collect(),
            Audience::All => self.connections.values().collect(),
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn generate_id(&self) -> ConnectionId {
        let mut rng = rand::thread_rng();
        loop {
            let candidate: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(CONNECTION_ID_LEN)
                .map(char::from)
                .collect();
            let id = ConnectionId::new(candidate);
            if !self.connections.contains_key(&id) {
                return id;
            }
        }
    }
}
