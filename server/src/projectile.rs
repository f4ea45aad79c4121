//! Projectile registry with time-based expiry
//!
//! Projectiles are metadata only (origin, velocity, owner, color); the server
//! never simulates them. Each one lives for a fixed window and is then swept.
//!
//! Deadlines sit in a min-heap. Removing a projectile early (owner left)
//! does not touch the heap: the stale deadline is popped later and the sweep
//! finds nothing to delete. Every removal path checks existence first, so a
//! projectile is reported as removed at most once.

use shared::{ConnectionId, ProjectileId, ProjectileRecord, ShotRequest};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone)]
struct Entry {
    record: ProjectileRecord,
    /// Spawn order, for deterministic bulk removal
    sequence: u64,
    expires_at: u64,
}

#[derive(Debug, Clone)]
pub struct ProjectileRegistry {
    projectiles: HashMap<ProjectileId, Entry>,
    deadlines: BinaryHeap<Reverse<(u64, ProjectileId)>>,
    /// Process-wide counter, never reset
    next_counter: u64,
    lifetime_ms: u64,
}

impl ProjectileRegistry {
    pub fn new(lifetime_ms: u64) -> Self {
        Self {
            projectiles: HashMap::new(),
            deadlines: BinaryHeap::new(),
            next_counter: 0,
            lifetime_ms,
        }
    }

    /// Registers a new projectile and schedules its expiry
    pub fn spawn(
        &mut self,
        owner: &ConnectionId,
        color: u32,
        shot: ShotRequest,
        now: u64,
    ) -> ProjectileRecord {
        let sequence = self.next_counter;
        self.next_counter += 1;

        let id = ProjectileId::new(owner, sequence);
        let record = ProjectileRecord {
            id: id.clone(),
            player_id: owner.clone(),
            position: shot.position,
            velocity: shot.velocity,
            color,
            created_at: now,
        };
        let expires_at = now.saturating_add(self.lifetime_ms);

        self.deadlines.push(Reverse((expires_at, id.clone())));
        self.projectiles.insert(
            id,
            Entry {
                record: record.clone(),
                sequence,
                expires_at,
            },
        );

        record
    }

    pub fn remove(&mut self, id: &ProjectileId) -> Option<ProjectileRecord> {
        self.projectiles.remove(id).map(|entry| entry.record)
    }

    /// Removes every projectile owned by `owner`, oldest first
    pub fn remove_all_for(&mut self, owner: &ConnectionId) -> Vec<ProjectileId> {
        let mut owned: Vec<(u64, ProjectileId)> = self
            .projectiles
            .iter()
            .filter(|(_, entry)| &entry.record.player_id == owner)
            .map(|(id, entry)| (entry.sequence, id.clone()))
            .collect();
        owned.sort();

        owned
            .into_iter()
            .filter_map(|(_, id)| self.remove(&id).map(|record| record.id))
            .collect()
    }

    /// Removes every projectile whose deadline is at or before `now`
    ///
    /// Returns the identities actually removed; deadlines of projectiles
    /// that are already gone are discarded silently.
    pub fn expire(&mut self, now: u64) -> Vec<ProjectileId> {
        let mut expired = Vec::new();

        while let Some(Reverse((deadline, _))) = self.deadlines.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((_, id))) = self.deadlines.pop() else {
                break;
            };
            if self.projectiles.remove(&id).is_some() {
                expired.push(id);
            }
        }

        expired
    }

    /// Earliest pending deadline, possibly for an already removed projectile
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// True if the projectile exists and has not reached its deadline
    pub fn contains(&self, id: &ProjectileId, now: u64) -> bool {
        self.projectiles
            .get(id)
            .is_some_and(|entry| now < entry.expires_at)
    }

    /// All live projectiles at `now`, keyed by identity
    ///
    /// Entries past their deadline are left out even if the sweep has not
    /// run yet.
    pub fn snapshot(&self, now: u64) -> HashMap<ProjectileId, ProjectileRecord> {
        self.projectiles
            .iter()
            .filter(|(_, entry)| now < entry.expires_at)
            .map(|(id, entry)| (id.clone(), entry.record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Vec3, PROJECTILE_LIFETIME_MS, REPUBLICANS_COLOR, SPAWN_POSITION};

    fn shot() -> ShotRequest {
        ShotRequest {
            position: SPAWN_POSITION,
            velocity: Vec3::new(0.0, 0.0, -0.7),
        }
    }

    #[test]
    fn test_spawn_assigns_global_counter_ids() {
        let mut registry = ProjectileRegistry::new(PROJECTILE_LIFETIME_MS);
        let a = ConnectionId::from("A");
        let b = ConnectionId::from("B");

        let first = registry.spawn(&b, REPUBLICANS_COLOR, shot(), 0);
        let second = registry.spawn(&a, REPUBLICANS_COLOR, shot(), 0);
        let third = registry.spawn(&b, REPUBLICANS_COLOR, shot(), 0);

        assert_eq!(first.id.as_str(), "B-0");
        assert_eq!(second.id.as_str(), "A-1");
        assert_eq!(third.id.as_str(), "B-2");
        assert_eq!(first.player_id, b);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_lifetime_window() {
        let mut registry = ProjectileRegistry::new(3000);
        let owner = ConnectionId::from("B");
        let id = registry.spawn(&owner, 0, shot(), 1000).id;

        assert!(registry.contains(&id, 1000));
        assert!(registry.contains(&id, 3999));
        assert!(!registry.contains(&id, 4000));
        assert!(registry.snapshot(4000).is_empty());
    }

    #[test]
    fn test_expire_sweeps_due_entries() {
        let mut registry = ProjectileRegistry::new(3000);
        let owner = ConnectionId::from("B");
        let early = registry.spawn(&owner, 0, shot(), 0).id;
        let late = registry.spawn(&owner, 0, shot(), 500).id;

        assert_eq!(registry.next_deadline(), Some(3000));
        assert!(registry.expire(2999).is_empty());
        assert_eq!(registry.expire(3000), vec![early]);
        assert_eq!(registry.next_deadline(), Some(3500));
        assert_eq!(registry.expire(10_000), vec![late]);
        assert!(registry.is_empty());
        assert_eq!(registry.next_deadline(), None);
    }

    #[test]
    fn test_remove_all_for_owner() {
        let mut registry = ProjectileRegistry::new(3000);
        let a = ConnectionId::from("A");
        let b = ConnectionId::from("B");
        registry.spawn(&a, 0, shot(), 0);
        registry.spawn(&b, 0, shot(), 0);
        registry.spawn(&a, 0, shot(), 0);

        let removed = registry.remove_all_for(&a);
        assert_eq!(
            removed,
            vec![ProjectileId::from("A-0"), ProjectileId::from("A-2")]
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_all_for(&a).is_empty());
    }

    #[test]
    fn test_expire_after_early_removal_is_noop() {
        let mut registry = ProjectileRegistry::new(3000);
        let owner = ConnectionId::from("A");
        registry.spawn(&owner, 0, shot(), 0);
        registry.remove_all_for(&owner);

        // stale deadline is still queued but reports nothing
        assert_eq!(registry.next_deadline(), Some(3000));
        assert!(registry.expire(3000).is_empty());
        assert_eq!(registry.next_deadline(), None);
    }

    #[test]
    fn test_snapshot_contains_live_only() {
        let mut registry = ProjectileRegistry::new(3000);
        let owner = ConnectionId::from("A");
        let old = registry.spawn(&owner, 0, shot(), 0).id;
        let new = registry.spawn(&owner, 0, shot(), 2000).id;

        let snapshot = registry.snapshot(3500);
        assert!(!snapshot.contains_key(&old));
        assert!(snapshot.contains_key(&new));
    }
}
