//! Server network layer handling WebSocket connections and the event loop

use crate::clock::ServerClock;
use crate::config::ServerConfig;
use crate::connection::ConnectionRegistry;
use crate::error::{Result, ServerError};
use crate::relay::{Outbound, Relay};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode, ClientEvent, ConnectionId};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Messages sent from socket tasks to the server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<Option<ConnectionId>>,
    },
    Frame {
        id: ConnectionId,
        text: String,
    },
    Heartbeat {
        id: ConnectionId,
    },
    Disconnected {
        id: ConnectionId,
    },
    Shutdown,
}

/// Cloneable handle for stopping a running server
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Relay server: owns every connection, session and projectile
///
/// Socket tasks only do framing. All state changes happen on the task
/// running [`Server::run`], one message at a time, so handlers never
/// interleave.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    connections: ConnectionRegistry,
    relay: Relay,
    clock: ServerClock,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listener, trying consecutive ports if the first is taken
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = bind_listener(&config).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            connections: ConnectionRegistry::new(config.max_connections),
            relay: Relay::from_config(&config),
            clock: ServerClock::new(),
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns the task accepting TCP connections
    fn spawn_acceptor(&mut self) -> Result<JoinHandle<()>> {
        let listener = self.listener.take().ok_or_else(|| {
            ServerError::Io(io::Error::new(
                io::ErrorKind::Other,
                "listener already consumed",
            ))
        })?;
        let server_tx = self.server_tx.clone();
        let ping_interval = self.config.ping_interval;

        Ok(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            server_tx.clone(),
                            ping_interval,
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }

                if server_tx.is_closed() {
                    break;
                }
            }
        }))
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                addr,
                sender,
                reply,
            } => {
                let admitted = self.connections.add_connection(addr, sender);
                if admitted.is_none() {
                    warn!(
                        "Rejected connection from {}: {} connections open",
                        addr,
                        self.connections.len()
                    );
                }
                if let Err(Some(id)) = reply.send(admitted) {
                    // socket task went away during the handshake
                    self.connections.remove_connection(&id);
                }
            }
            ServerMessage::Frame { id, text } => {
                self.connections.touch(&id);
                self.handle_frame(&id, &text);
            }
            ServerMessage::Heartbeat { id } => self.connections.touch(&id),
            ServerMessage::Disconnected { id } => self.disconnect(&id),
            ServerMessage::Shutdown => {}
        }
    }

    fn handle_frame(&mut self, id: &ConnectionId, text: &str) {
        if !self.connections.contains(id) {
            return;
        }

        match decode::<ClientEvent>(text) {
            Ok(event) => {
                let outbound = self.relay.handle(id, event, self.clock.now());
                self.dispatch(outbound);
            }
            Err(e) => warn!("Dropping frame from {}: {}", id, ServerError::from(e)),
        }
    }

    fn disconnect(&mut self, id: &ConnectionId) {
        if !self.connections.remove_connection(id) {
            // already torn down by the timeout check
            debug!("Disconnect for unregistered connection {}", id);
            return;
        }
        let outbound = self.relay.leave(id);
        self.dispatch(outbound);
    }

    fn check_timeouts(&mut self) {
        for id in self.connections.check_timeouts(self.config.client_timeout) {
            let outbound = self.relay.leave(&id);
            self.dispatch(outbound);
        }
    }

    fn expire_projectiles(&mut self) {
        let outbound = self.relay.expire(self.clock.now());
        self.dispatch(outbound);
    }

    fn dispatch(&self, outbound: Vec<Outbound>) {
        for message in &outbound {
            self.connections.deliver(message);
        }
    }

    /// Next projectile deadline as a timer instant
    fn next_expiry(&self) -> Option<Instant> {
        self.relay
            .next_expiry()
            .map(|deadline| self.clock.instant_at(deadline))
    }

    /// Main server loop
    pub async fn run(mut self) -> Result<()> {
        let acceptor = self.spawn_acceptor()?;

        let mut timeout_check = interval(TIMEOUT_CHECK_INTERVAL);
        timeout_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("PolyWars server running at ws://{}", self.local_addr);

        loop {
            let expiry = self.next_expiry();

            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                        Some(message) => self.handle_message(message),
                    }
                },

                _ = sleep_until(expiry.unwrap_or_else(Instant::now)), if expiry.is_some() => {
                    self.expire_projectiles();
                },

                _ = timeout_check.tick() => {
                    self.check_timeouts();
                },
            }
        }

        acceptor.abort();
        Ok(())
    }
}

async fn bind_listener(config: &ServerConfig) -> Result<TcpListener> {
    let attempted = config.candidate_addrs();
    let mut last_error = None;

    for addr in &attempted {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                warn!("Could not bind {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(ServerError::Bind {
        attempted,
        source: last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no address to bind")
        }),
    })
}

/// Runs one WebSocket connection until either side closes it
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    ping_interval: Duration,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, ServerError::from(e));
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let (reply_tx, reply_rx) = oneshot::channel();
    let connected = ServerMessage::Connected {
        addr,
        sender: out_tx,
        reply: reply_tx,
    };
    if server_tx.send(connected).is_err() {
        return;
    }

    let id = match reply_rx.await {
        Ok(Some(id)) => id,
        _ => {
            let refusal = Message::Close(Some(CloseFrame {
                code: CloseCode::Again,
                reason: "server at connection capacity".into(),
            }));
            let _ = write.send(refusal).await;
            return;
        }
    };

    let mut writer = tokio::spawn(async move {
        let mut ping = interval(ping_interval);
        // first tick completes immediately
        ping.tick().await;

        loop {
            tokio::select! {
                message = out_rx.recv() => match message {
                    Some(message) => {
                        if write.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if write.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let reader_tx = server_tx.clone();
    let reader_id = id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            let message = match frame {
                Ok(message) => message,
                Err(e) => {
                    debug!("Read error on {}: {}", reader_id, e);
                    break;
                }
            };

            let forwarded = match message {
                Message::Text(text) => reader_tx.send(ServerMessage::Frame {
                    id: reader_id.clone(),
                    text,
                }),
                Message::Binary(_) => {
                    warn!("Ignoring binary frame from {}", reader_id);
                    reader_tx.send(ServerMessage::Heartbeat {
                        id: reader_id.clone(),
                    })
                }
                Message::Ping(_) | Message::Pong(_) => reader_tx.send(ServerMessage::Heartbeat {
                    id: reader_id.clone(),
                }),
                Message::Close(_) => break,
                Message::Frame(_) => continue,
            };

            if forwarded.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    let _ = server_tx.send(ServerMessage::Disconnected { id });
}
