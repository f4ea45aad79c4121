//! Broadcast relay: inbound events in, audience-tagged outbound events out
//!
//! The relay owns the session store and the projectile registry and is the
//! only code that mutates them. Every handler runs to completion and returns
//! the events to fan out; it never talks to sockets itself, which keeps it
//! synchronous and directly testable.
//!
//! Client mistakes are never errors. A join at capacity is answered with
//! `serverFull`; updates and shots from connections without a session are
//! dropped without a reply.

use crate::config::ServerConfig;
use crate::projectile::ProjectileRegistry;
use crate::session::SessionStore;
use log::{debug, info};
use shared::{
    ClientEvent, ConnectionId, JoinRequest, PlayerMoved, PoseUpdate, ServerEvent, ShotRequest,
};

/// Who receives an outbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Only this connection
    Only(ConnectionId),
    /// Every connection except this one
    AllExcept(ConnectionId),
    /// Every connection
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub audience: Audience,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn new(audience: Audience, event: ServerEvent) -> Self {
        Self { audience, event }
    }

    fn only(id: &ConnectionId, event: ServerEvent) -> Self {
        Self::new(Audience::Only(id.clone()), event)
    }

    fn all_except(id: &ConnectionId, event: ServerEvent) -> Self {
        Self::new(Audience::AllExcept(id.clone()), event)
    }

    fn all(event: ServerEvent) -> Self {
        Self::new(Audience::All, event)
    }
}

#[derive(Debug, Clone)]
pub struct Relay {
    sessions: SessionStore,
    projectiles: ProjectileRegistry,
}

impl Relay {
    pub fn new(max_players: usize, projectile_lifetime_ms: u64) -> Self {
        Self {
            sessions: SessionStore::new(max_players),
            projectiles: ProjectileRegistry::new(projectile_lifetime_ms),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.max_players, config.projectile_lifetime_ms())
    }

    /// Dispatches one inbound event from `from`
    pub fn handle(&mut self, from: &ConnectionId, event: ClientEvent, now: u64) -> Vec<Outbound> {
        match event {
            ClientEvent::JoinGame(request) => self.join(from, request, now),
            ClientEvent::UpdatePlayer(update) => self.update_player(from, update, now),
            ClientEvent::ShootProjectile(shot) => self.shoot(from, shot, now),
        }
    }

    /// Creates a session and brings the new player up to date
    ///
    /// Replies to the joiner with the other players, the live projectiles and
    /// a confirmation carrying its stored position; everyone else is told
    /// about the new player.
    pub fn join(&mut self, from: &ConnectionId, request: JoinRequest, now: u64) -> Vec<Outbound> {
        let record = match self.sessions.join(from.clone(), request, now) {
            Some(record) => record.clone(),
            None => {
                info!("Join rejected for {}: server full", from);
                return vec![Outbound::only(from, ServerEvent::ServerFull)];
            }
        };

        vec![
            Outbound::only(
                from,
                ServerEvent::CurrentPlayers(self.sessions.snapshot_except(from)),
            ),
            Outbound::only(
                from,
                ServerEvent::CurrentProjectiles(self.projectiles.snapshot(now)),
            ),
            Outbound::all_except(from, ServerEvent::NewPlayer(record.clone())),
            Outbound::only(
                from,
                ServerEvent::JoinConfirmed {
                    id: record.id,
                    position: record.position,
                    timestamp: record.timestamp,
                },
            ),
        ]
    }

    /// Stores the new pose and relays it to everyone else. Last write wins.
    pub fn update_player(&mut self, from: &ConnectionId, update: PoseUpdate, now: u64) -> Vec<Outbound> {
        let Some(record) = self.sessions.update_pose(from, &update, now) else {
            debug!("Ignoring update from {} without a session", from);
            return Vec::new();
        };

        vec![Outbound::all_except(
            from,
            ServerEvent::PlayerMoved(PlayerMoved {
                id: record.id.clone(),
                position: record.position,
                rotation: record.rotation,
                timestamp: now,
                sequence: update.sequence,
            }),
        )]
    }

    /// Registers a projectile in the shooter's color and announces it to all
    pub fn shoot(&mut self, from: &ConnectionId, shot: ShotRequest, now: u64) -> Vec<Outbound> {
        let Some(color) = self.sessions.get(from).map(|record| record.color) else {
            debug!("Ignoring shot from {} without a session", from);
            return Vec::new();
        };

        let record = self.projectiles.spawn(from, color, shot, now);
        vec![Outbound::all(ServerEvent::NewProjectile(record))]
    }

    /// Tears down the session and owned projectiles of a closed connection
    ///
    /// Safe to call for connections that never joined or already left: that
    /// produces no events.
    pub fn leave(&mut self, id: &ConnectionId) -> Vec<Outbound> {
        if self.sessions.leave(id).is_none() {
            info!("Unknown user disconnected: {}", id);
            return Vec::new();
        }

        let mut outbound: Vec<Outbound> = self
            .projectiles
            .remove_all_for(id)
            .into_iter()
            .map(|projectile| Outbound::all(ServerEvent::RemoveProjectile(projectile)))
            .collect();
        outbound.push(Outbound::all(ServerEvent::PlayerDisconnected(id.clone())));
        outbound
    }

    /// Sweeps projectiles whose lifetime is over
    pub fn expire(&mut self, now: u64) -> Vec<Outbound> {
        self.projectiles
            .expire(now)
            .into_iter()
            .map(|projectile| Outbound::all(ServerEvent::RemoveProjectile(projectile)))
            .collect()
    }

    /// When [`Relay::expire`] should next be called
    pub fn next_expiry(&self) -> Option<u64> {
        self.projectiles.next_deadline()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn projectiles(&self) -> &ProjectileRegistry {
        &self.projectiles
    }
}
