use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const MAX_PLAYERS: usize = 16;
pub const PROJECTILE_LIFETIME_MS: u64 = 3000;
pub const SPAWN_POSITION: Vec3 = Vec3::new(0.0, 1.6, 0.0);
pub const DEMOCRATS_COLOR: u32 = 0x3b5998;
pub const REPUBLICANS_COLOR: u32 = 0xdb2828;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Opaque per-connection identity issued when a socket is accepted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Projectile identity: `<owner>-<counter>`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProjectileId(String);

impl ProjectileId {
    pub fn new(owner: &ConnectionId, counter: u64) -> Self {
        Self(format!("{}-{}", owner, counter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Team as declared by the client.
///
/// The server does not validate the value: unknown names are kept verbatim
/// and echoed back, and get the non-democrats color.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Team {
    Democrats,
    Republicans,
    Other(String),
}

impl Team {
    pub fn color(&self) -> u32 {
        match self {
            Team::Democrats => DEMOCRATS_COLOR,
            Team::Republicans | Team::Other(_) => REPUBLICANS_COLOR,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Team::Democrats => "democrats",
            Team::Republicans => "republicans",
            Team::Other(name) => name,
        }
    }
}

impl From<String> for Team {
    fn from(name: String) -> Self {
        match name.as_str() {
            "democrats" => Team::Democrats,
            "republicans" => Team::Republicans,
            _ => Team::Other(name),
        }
    }
}

impl From<Team> for String {
    fn from(team: Team) -> Self {
        match team {
            Team::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: ConnectionId,
    pub name: String,
    pub team: Team,
    pub position: Vec3,
    pub rotation: Vec3,
    pub color: u32,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileRecord {
    pub id: ProjectileId,
    pub player_id: ConnectionId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: u32,
    pub created_at: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JoinRequest {
    pub name: String,
    pub team: Team,
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub rotation: Option<Vec3>,
}

/// Pose update. `sequence` is relayed as-is and never used for ordering.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PoseUpdate {
    pub position: Vec3,
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShotRequest {
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerMoved {
    pub id: ConnectionId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// Client -> server events, one per text frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinGame(JoinRequest),
    UpdatePlayer(PoseUpdate),
    ShootProjectile(ShotRequest),
}

/// Server -> client events, one per text frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    ServerFull,
    CurrentPlayers(HashMap<ConnectionId, PlayerRecord>),
    CurrentProjectiles(HashMap<ProjectileId, ProjectileRecord>),
    JoinConfirmed {
        id: ConnectionId,
        position: Vec3,
        timestamp: u64,
    },
    NewPlayer(PlayerRecord),
    PlayerMoved(PlayerMoved),
    PlayerDisconnected(ConnectionId),
    NewProjectile(ProjectileRecord),
    RemoveProjectile(ProjectileId),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ServerFull => "serverFull",
            ServerEvent::CurrentPlayers(_) => "currentPlayers",
            ServerEvent::CurrentProjectiles(_) => "currentProjectiles",
            ServerEvent::JoinConfirmed { .. } => "joinConfirmed",
            ServerEvent::NewPlayer(_) => "newPlayer",
            ServerEvent::PlayerMoved(_) => "playerMoved",
            ServerEvent::PlayerDisconnected(_) => "playerDisconnected",
            ServerEvent::NewProjectile(_) => "newProjectile",
            ServerEvent::RemoveProjectile(_) => "removeProjectile",
        }
    }
}

/// Serializes an event into the `{"event": ..., "data": ...}` envelope.
pub fn encode<T: Serialize>(event: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(text)
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    (millis.min(u64::MAX as u128)) as u64
}
