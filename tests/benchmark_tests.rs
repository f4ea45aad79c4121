//! Performance benchmarks for the relay hot paths

use server::relay::Relay;
use shared::{
    encode, ClientEvent, ConnectionId, JoinRequest, PoseUpdate, ShotRequest, Team, Vec3,
    MAX_PLAYERS, PROJECTILE_LIFETIME_MS,
};
use std::time::Instant;

fn populated_relay(players: usize) -> (Relay, Vec<ConnectionId>) {
    let mut relay = Relay::new(MAX_PLAYERS, PROJECTILE_LIFETIME_MS);
    let ids: Vec<ConnectionId> = (0..players)
        .map(|i| ConnectionId::new(format!("player{:02}", i)))
        .collect();

    for (i, id) in ids.iter().enumerate() {
        let team = if i % 2 == 0 {
            Team::Democrats
        } else {
            Team::Republicans
        };
        relay.handle(
            id,
            ClientEvent::JoinGame(JoinRequest {
                name: format!("p{}", i),
                team,
                position: None,
                rotation: None,
            }),
            0,
        );
    }

    (relay, ids)
}

/// Benchmarks pose updates from a full server
#[test]
fn benchmark_pose_updates() {
    let (mut relay, ids) = populated_relay(MAX_PLAYERS);
    let rounds = 10_000;
    let start = Instant::now();

    for round in 0..rounds {
        for id in &ids {
            let update = ClientEvent::UpdatePlayer(PoseUpdate {
                position: Vec3::new(round as f64 * 0.01, 1.6, 0.0),
                rotation: Vec3::ZERO,
                sequence: Some(round),
            });
            let outbound = relay.handle(id, update, round);
            assert_eq!(outbound.len(), 1);
        }
    }

    let duration = start.elapsed();
    let total = rounds as usize * ids.len();
    println!(
        "Pose updates: {} updates in {:?} ({:.2} ns/update)",
        total,
        duration,
        duration.as_nanos() as f64 / total as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks projectile spawning and expiry sweeping
#[test]
fn benchmark_projectile_churn() {
    let (mut relay, ids) = populated_relay(MAX_PLAYERS);
    let shots = 20_000u64;
    let start = Instant::now();

    for i in 0..shots {
        let shooter = &ids[(i as usize) % ids.len()];
        let shot = ClientEvent::ShootProjectile(ShotRequest {
            position: Vec3::new(0.0, 1.6, 0.0),
            velocity: Vec3::new(0.0, 0.0, -0.7),
        });
        relay.handle(shooter, shot, i);
    }

    let expired = relay.expire(shots + PROJECTILE_LIFETIME_MS);
    let duration = start.elapsed();

    println!(
        "Projectile churn: {} spawned and swept in {:?}",
        shots, duration
    );

    assert_eq!(expired.len(), shots as usize);
    assert!(relay.projectiles().is_empty());
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks encoding the join snapshot for a nearly full server
#[test]
fn benchmark_snapshot_encoding() {
    let (mut relay, _) = populated_relay(MAX_PLAYERS - 1);
    let newcomer = ConnectionId::from("newcomer");
    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        relay.leave(&newcomer);
        let outbound = relay.handle(
            &newcomer,
            ClientEvent::JoinGame(JoinRequest {
                name: "newcomer".to_string(),
                team: Team::Democrats,
                position: None,
                rotation: None,
            }),
            0,
        );
        for message in &outbound {
            let text = encode(&message.event).unwrap();
            assert!(!text.is_empty());
        }
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} joins in {:?} ({:.2} μs/join)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}
