//! Fixed-rate game loop: ticks the session and broadcasts its output
//!
//! Observers subscribe to a broadcast channel of encoded `ServerMessage`s.
//! Transport plumbing sits on the receiving side of that channel.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::events::SimEvent;
use crate::game::session::GameSession;
use crate::metrics::Metrics;
use crate::net::protocol::{encode, ServerMessage};

/// Encoded message shared by every subscriber
pub type Outbound = Arc<Vec<u8>>;

const STATS_INTERVAL_SECS: u64 = 30;

/// Encode and broadcast one message. Returns the encoded size.
pub fn broadcast_message(outbound: &broadcast::Sender<Outbound>, message: &ServerMessage) -> usize {
    let bytes = match encode(message) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to encode message for broadcast: {}", e);
            return 0;
        }
    };
    let len = bytes.len();
    // No subscribers is not an error; the tick goes on
    let _ = outbound.send(Arc::new(bytes));
    len
}

/// Start the game loop background task
pub fn start_game_loop(
    session: Arc<RwLock<GameSession>>,
    config: ServerConfig,
    metrics: Arc<Metrics>,
    outbound: broadcast::Sender<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tick_duration = Duration::from_secs_f32(config.dt());
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let snapshot_interval = config.snapshot_interval();
        let stats_every = config.tick_rate as u64 * STATS_INTERVAL_SECS;

        info!("Game loop started at {} Hz", config.tick_rate);
        let start = Instant::now();

        loop {
            ticker.tick().await;

            let (tick, events, snapshot, stats) = {
                let mut session = session.write().await;
                let tick_start = Instant::now();
                let events = session.tick();
                metrics.record_tick_time(tick_start.elapsed());

                let tick = session.tick_count();
                let snapshot = (tick % snapshot_interval == 0).then(|| session.snapshot());
                (tick, events, snapshot, session.stats())
            };

            metrics.observe_session(&stats);
            metrics.events_emitted.fetch_add(events.len() as u64, Ordering::Relaxed);

            for event in &events {
                log_event(event);
            }

            let mut sent = 0;
            if !events.is_empty() {
                sent += broadcast_message(&outbound, &ServerMessage::Events { tick, events });
            }
            if let Some(snapshot) = snapshot {
                sent += broadcast_message(&outbound, &ServerMessage::Snapshot(snapshot));
            }
            metrics.bytes_broadcast.fetch_add(sent as u64, Ordering::Relaxed);

            if tick % stats_every == 0 {
                info!(
                    "Game: {}s, tick {}, {}/{} players alive, {} enemies, {} bosses, {} projectiles | spawner {} | pvp {} | pool retained {} destroyed {} | tick p95 {}us",
                    start.elapsed().as_secs(),
                    tick,
                    stats.alive_players,
                    stats.players,
                    stats.enemies,
                    stats.bosses,
                    stats.projectiles,
                    if stats.spawner_running { "on" } else { "off" },
                    if stats.pvp_active { "on" } else { "off" },
                    stats.pool.retained,
                    stats.pool.destroyed,
                    metrics.tick_time_p95_us.load(Ordering::Relaxed),
                );
            }
        }
    })
}

fn log_event(event: &SimEvent) {
    match event {
        SimEvent::PhaseChanged { boss, from, to } => {
            debug!(boss, ?from, ?to, "Boss phase changed");
        }
        SimEvent::Died { target } => debug!(?target, "Died"),
        SimEvent::AttackCancelled { boss, attack } => debug!(boss, %attack, "Attack cancelled"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameDefinitions;
    use crate::net::protocol::decode;

    #[test]
    fn test_broadcast_reaches_subscribers() {
        let (tx, mut rx) = broadcast::channel(8);
        let sent = broadcast_message(&tx, &ServerMessage::Events { tick: 3, events: vec![SimEvent::PvpStarted] });
        assert!(sent > 0);

        let bytes = rx.try_recv().unwrap();
        assert_eq!(bytes.len(), sent);
        match decode::<ServerMessage>(&bytes).unwrap() {
            ServerMessage::Events { tick, events } => {
                assert_eq!(tick, 3);
                assert_eq!(events, vec![SimEvent::PvpStarted]);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let (tx, rx) = broadcast::channel::<Outbound>(1);
        drop(rx);
        assert!(broadcast_message(&tx, &ServerMessage::Events { tick: 0, events: vec![] }) > 0);
    }

    #[tokio::test]
    async fn test_loop_ticks_and_snapshots() {
        let config = ServerConfig {
            rng_seed: Some(1),
            ..ServerConfig::default()
        };
        let session = Arc::new(RwLock::new(GameSession::new(
            Arc::new(GameDefinitions::builtin()),
            &config,
        )));
        session.write().await.add_player("p1".into());

        let metrics = Arc::new(Metrics::new());
        let (tx, mut rx) = broadcast::channel(256);
        let handle = start_game_loop(session.clone(), config.clone(), metrics.clone(), tx);

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.abort();

        assert!(session.read().await.tick_count() >= 3);
        assert!(metrics.tick_count.load(Ordering::Relaxed) > 0);

        let mut snapshots = 0;
        while let Ok(bytes) = rx.try_recv() {
            if let Ok(ServerMessage::Snapshot(_)) = decode::<ServerMessage>(&bytes) {
                snapshots += 1;
            }
        }
        assert!(snapshots > 0);
    }
}
