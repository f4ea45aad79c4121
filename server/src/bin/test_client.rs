use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{decode, encode, ClientEvent, JoinRequest, PoseUpdate, ServerEvent, ShotRequest, Team, Vec3};
use std::time::Duration;
use tokio::time::{interval, sleep};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Headless bot that joins a running server, walks in a circle and shoots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3001")]
    server: String,

    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// democrats or republicans
    #[arg(short = 't', long, default_value = "democrats")]
    team: String,

    /// How long to stay connected, in seconds
    #[arg(short = 'd', long, default_value = "10")]
    duration: u64,

    /// Milliseconds between shots
    #[arg(long, default_value = "500")]
    shot_interval_ms: u64,
}

fn pose_at(step: u64) -> PoseUpdate {
    let angle = step as f64 * 0.05;
    PoseUpdate {
        position: Vec3::new(5.0 * angle.cos(), 1.6, 5.0 * angle.sin()),
        rotation: Vec3::new(0.0, angle, 0.0),
        sequence: Some(step),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let join = ClientEvent::JoinGame(JoinRequest {
        name: args.name.clone(),
        team: Team::from(args.team.clone()),
        position: None,
        rotation: None,
    });
    write.send(Message::Text(encode(&join)?)).await?;

    let mut movement = interval(Duration::from_millis(50));
    let mut shooting = interval(Duration::from_millis(args.shot_interval_ms.max(1)));
    let deadline = sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);

    let mut step = 0u64;
    let mut joined = false;

    loop {
        tokio::select! {
            frame = read.next() => {
                let Some(frame) = frame else {
                    info!("Server closed the connection");
                    break;
                };
                match frame? {
                    Message::Text(text) => match decode::<ServerEvent>(&text) {
                        Ok(ServerEvent::ServerFull) => {
                            warn!("Server is full");
                            break;
                        }
                        Ok(ServerEvent::JoinConfirmed { id, position, .. }) => {
                            info!("Joined as {} at ({}, {}, {})", id, position.x, position.y, position.z);
                            joined = true;
                        }
                        Ok(ServerEvent::PlayerMoved(_)) => {}
                        Ok(event) => info!("Received {}", event.name()),
                        Err(e) => warn!("Undecodable frame: {}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = movement.tick(), if joined => {
                step += 1;
                let update = ClientEvent::UpdatePlayer(pose_at(step));
                write.send(Message::Text(encode(&update)?)).await?;
            }
            _ = shooting.tick(), if joined => {
                let pose = pose_at(step);
                let shot = ClientEvent::ShootProjectile(ShotRequest {
                    position: pose.position,
                    velocity: Vec3::new(-0.7 * pose.rotation.y.sin(), 0.0, -0.7 * pose.rotation.y.cos()),
                });
                write.send(Message::Text(encode(&shot)?)).await?;
            }
            _ = &mut deadline => {
                info!("Done after {}s", args.duration);
                break;
            }
        }
    }

    let _ = write.send(Message::Close(None)).await;
    Ok(())
}
