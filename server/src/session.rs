//! Player session store
//!
//! One [`PlayerRecord`] per joined connection. Poses are overwritten
//! unconditionally on every update: last write wins, with no ordering or
//! plausibility checks.

use log::info;
use shared::{ConnectionId, JoinRequest, PlayerRecord, PoseUpdate, Vec3, SPAWN_POSITION};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: HashMap<ConnectionId, PlayerRecord>,
    max_players: usize,
}

impl SessionStore {
    pub fn new(max_players: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_players,
        }
    }

    /// Creates a session for `id`, or returns None if the server is full.
    ///
    /// A repeated join from a connection that already holds a session
    /// replaces its record and does not count against capacity twice.
    pub fn join(&mut self, id: ConnectionId, request: JoinRequest, now: u64) -> Option<&PlayerRecord> {
        if !self.sessions.contains_key(&id) && self.is_full() {
            return None;
        }

        let JoinRequest {
            name,
            team,
            position,
            rotation,
        } = request;

        let record = PlayerRecord {
            id: id.clone(),
            color: team.color(),
            name,
            team,
            position: position.unwrap_or(SPAWN_POSITION),
            rotation: rotation.unwrap_or(Vec3::ZERO),
            timestamp: now,
        };

        self.sessions.insert(id.clone(), record);
        let record = self.sessions.get(&id)?;
        info!(
            "Player joined: {} ({}), Total: {}",
            record.name,
            record.team,
            self.sessions.len()
        );
        Some(record)
    }

    /// Overwrites the pose of an existing session. Unknown ids are ignored.
    pub fn update_pose(&mut self, id: &ConnectionId, update: &PoseUpdate, now: u64) -> Option<&PlayerRecord> {
        let record = self.sessions.get_mut(id)?;
        record.position = update.position;
        record.rotation = update.rotation;
        record.timestamp = now;
        Some(record)
    }

    pub fn leave(&mut self, id: &ConnectionId) -> Option<PlayerRecord> {
        let record = self.sessions.remove(id)?;
        info!("Player disconnected: {}, ID: {}", record.name, id);
        Some(record)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&PlayerRecord> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Every session except `excluded`, keyed by connection identity
    pub fn snapshot_except(&self, excluded: &ConnectionId) -> HashMap<ConnectionId, PlayerRecord> {
        self.sessions
            .iter()
            .filter(|(id, _)| *id != excluded)
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_players
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Team, DEMOCRATS_COLOR, MAX_PLAYERS, REPUBLICANS_COLOR};

    fn request(name: &str, team: Team) -> JoinRequest {
        JoinRequest {
            name: name.to_string(),
            team,
            position: None,
            rotation: None,
        }
    }

    #[test]
    fn test_join_defaults_pose() {
        let mut store = SessionStore::new(MAX_PLAYERS);
        let record = store
            .join(ConnectionId::from("A"), request("Alice", Team::Democrats), 100)
            .unwrap();

        assert_eq!(record.name, "Alice");
        assert_eq!(record.color, DEMOCRATS_COLOR);
        assert_approx_eq!(record.position.y, 1.6);
        assert_eq!(record.rotation, Vec3::ZERO);
        assert_eq!(record.timestamp, 100);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_join_keeps_client_pose() {
        let mut store = SessionStore::new(MAX_PLAYERS);
        let mut join = request("Bob", Team::Republicans);
        join.position = Some(Vec3::new(4.0, 1.6, -3.0));
        join.rotation = Some(Vec3::new(0.0, 1.5, 0.0));

        let record = store.join(ConnectionId::from("B"), join, 0).unwrap();
        assert_approx_eq!(record.position.x, 4.0);
        assert_approx_eq!(record.rotation.y, 1.5);
        assert_eq!(record.color, REPUBLICANS_COLOR);
    }

    #[test]
    fn test_same_team_same_color() {
        let mut store = SessionStore::new(MAX_PLAYERS);
        let first = store
            .join(ConnectionId::from("A"), request("A", Team::Republicans), 0)
            .map(|r| r.color);
        let second = store
            .join(ConnectionId::from("B"), request("B", Team::Republicans), 0)
            .map(|r| r.color);

        assert_eq!(first, second);
    }

    #[test]
    fn test_capacity() {
        let mut store = SessionStore::new(2);
        assert!(store.join(ConnectionId::from("A"), request("A", Team::Democrats), 0).is_some());
        assert!(store.join(ConnectionId::from("B"), request("B", Team::Democrats), 0).is_some());
        assert!(store.join(ConnectionId::from("C"), request("C", Team::Democrats), 0).is_none());
        assert_eq!(store.len(), 2);
        assert!(!store.contains(&ConnectionId::from("C")));
    }

    #[test]
    fn test_rejoin_replaces_without_double_count() {
        let mut store = SessionStore::new(1);
        let id = ConnectionId::from("A");
        store.join(id.clone(), request("Alice", Team::Democrats), 0);

        let record = store
            .join(id.clone(), request("Alice2", Team::Republicans), 5)
            .unwrap();
        assert_eq!(record.name, "Alice2");
        assert_eq!(record.color, REPUBLICANS_COLOR);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_pose_overwrites() {
        let mut store = SessionStore::new(MAX_PLAYERS);
        let id = ConnectionId::from("A");
        store.join(id.clone(), request("Alice", Team::Democrats), 0);

        let update = PoseUpdate {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.1, 0.2, 0.3),
            sequence: None,
        };
        store.update_pose(&id, &update, 50);

        // an older-looking update still wins if it arrives later
        let stale = PoseUpdate {
            position: Vec3::new(-1.0, 0.0, 0.0),
            rotation: Vec3::ZERO,
            sequence: Some(1),
        };
        let record = store.update_pose(&id, &stale, 40).unwrap();

        assert_approx_eq!(record.position.x, -1.0);
        assert_eq!(record.timestamp, 40);
    }

    #[test]
    fn test_update_unknown_session_is_ignored() {
        let mut store = SessionStore::new(MAX_PLAYERS);
        let update = PoseUpdate {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            sequence: None,
        };
        assert!(store.update_pose(&ConnectionId::from("ghost"), &update, 0).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_leave() {
        let mut store = SessionStore::new(MAX_PLAYERS);
        let id = ConnectionId::from("A");
        store.join(id.clone(), request("Alice", Team::Democrats), 0);

        assert_eq!(store.leave(&id).map(|r| r.name), Some("Alice".to_string()));
        assert!(store.leave(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_except() {
        let mut store = SessionStore::new(MAX_PLAYERS);
        store.join(ConnectionId::from("A"), request("Alice", Team::Democrats), 0);
        store.join(ConnectionId::from("B"), request("Bob", Team::Republicans), 0);

        let snapshot = store.snapshot_except(&ConnectionId::from("B"));
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&ConnectionId::from("A")));
    }
}
