//! Prometheus-compatible metrics endpoint
//!
//! Exposes simulation metrics in Prometheus text format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::session::SessionStats;

const TICK_HISTORY: usize = 1000;

/// Metrics registry for the simulation server
#[derive(Debug)]
pub struct Metrics {
    // Players
    pub total_players: AtomicU64,
    pub alive_players: AtomicU64,

    // Entities
    pub live_enemies: AtomicU64,
    pub active_bosses: AtomicU64,
    pub projectile_count: AtomicU64,
    pub pickup_count: AtomicU64,

    // Enemy pool
    pub pool_allocated: AtomicU64,
    pub pool_reused: AtomicU64,
    pub pool_retained: AtomicU64,
    pub pool_destroyed: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Session flags as 0/1
    pub spawner_running: AtomicU64,
    pub pvp_active: AtomicU64,

    pub rejected_intents: AtomicU64,
    pub events_emitted: AtomicU64,
    pub bytes_broadcast: AtomicU64,

    start_time: Instant,

    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_players: AtomicU64::new(0),
            alive_players: AtomicU64::new(0),
            live_enemies: AtomicU64::new(0),
            active_bosses: AtomicU64::new(0),
            projectile_count: AtomicU64::new(0),
            pickup_count: AtomicU64::new(0),
            pool_allocated: AtomicU64::new(0),
            pool_reused: AtomicU64::new(0),
            pool_retained: AtomicU64::new(0),
            pool_destroyed: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            spawner_running: AtomicU64::new(0),
            pvp_active: AtomicU64::new(0),
            rejected_intents: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            bytes_broadcast: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Copy session gauges after a tick
    pub fn observe_session(&self, stats: &SessionStats) {
        self.total_players.store(stats.players as u64, Ordering::Relaxed);
        self.alive_players.store(stats.alive_players as u64, Ordering::Relaxed);
        self.live_enemies.store(stats.enemies as u64, Ordering::Relaxed);
        self.active_bosses.store(stats.bosses as u64, Ordering::Relaxed);
        self.projectile_count.store(stats.projectiles as u64, Ordering::Relaxed);
        self.pickup_count.store(stats.pickups as u64, Ordering::Relaxed);
        self.pool_allocated.store(stats.pool.allocated, Ordering::Relaxed);
        self.pool_reused.store(stats.pool.reused, Ordering::Relaxed);
        self.pool_retained.store(stats.pool.retained, Ordering::Relaxed);
        self.pool_destroyed.store(stats.pool.destroyed, Ordering::Relaxed);
        self.spawner_running.store(stats.spawner_running as u64, Ordering::Relaxed);
        self.pvp_active.store(stats.pvp_active as u64, Ordering::Relaxed);
        self.rejected_intents.store(stats.rejected_intents, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("horde_players_total", "Players in the session", "gauge",
            self.total_players.load(Ordering::Relaxed));
        metric!("horde_players_alive", "Players still alive", "gauge",
            self.alive_players.load(Ordering::Relaxed));

        metric!("horde_enemies_live", "Live enemies, bosses included", "gauge",
            self.live_enemies.load(Ordering::Relaxed));
        metric!("horde_bosses_active", "Bosses with a running controller", "gauge",
            self.active_bosses.load(Ordering::Relaxed));
        metric!("horde_projectiles", "Projectiles in flight", "gauge",
            self.projectile_count.load(Ordering::Relaxed));
        metric!("horde_pickups", "Loot pickups on the ground", "gauge",
            self.pickup_count.load(Ordering::Relaxed));

        metric!("horde_pool_allocated_total", "Enemy instances built from scratch", "counter",
            self.pool_allocated.load(Ordering::Relaxed));
        metric!("horde_pool_reused_total", "Enemy instances reused from the free list", "counter",
            self.pool_reused.load(Ordering::Relaxed));
        metric!("horde_pool_retained_total", "Releases kept on the free list", "counter",
            self.pool_retained.load(Ordering::Relaxed));
        metric!("horde_pool_destroyed_total", "Releases dropped because the free list was full", "counter",
            self.pool_destroyed.load(Ordering::Relaxed));

        metric!("horde_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("horde_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("horde_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("horde_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("horde_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("horde_spawner_running", "Spawn director running (0/1)", "gauge",
            self.spawner_running.load(Ordering::Relaxed));
        metric!("horde_pvp_active", "PvP encounter active (0/1)", "gauge",
            self.pvp_active.load(Ordering::Relaxed));

        metric!("horde_intents_rejected_total", "Intents dropped by validation", "counter",
            self.rejected_intents.load(Ordering::Relaxed));
        metric!("horde_events_emitted_total", "Simulation events emitted", "counter",
            self.events_emitted.load(Ordering::Relaxed));
        metric!("horde_bytes_broadcast_total", "Encoded bytes handed to observers", "counter",
            self.bytes_broadcast.load(Ordering::Relaxed));
        metric!("horde_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same numbers for direct API access
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "players": {
                "total": self.total_players.load(Ordering::Relaxed),
                "alive": self.alive_players.load(Ordering::Relaxed),
            },
            "entities": {
                "enemies": self.live_enemies.load(Ordering::Relaxed),
                "bosses": self.active_bosses.load(Ordering::Relaxed),
                "projectiles": self.projectile_count.load(Ordering::Relaxed),
                "pickups": self.pickup_count.load(Ordering::Relaxed),
            },
            "pool": {
                "allocated": self.pool_allocated.load(Ordering::Relaxed),
                "reused": self.pool_reused.load(Ordering::Relaxed),
                "retained": self.pool_retained.load(Ordering::Relaxed),
                "destroyed": self.pool_destroyed.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
            },
            "session": {
                "spawner_running": self.spawner_running.load(Ordering::Relaxed) == 1,
                "pvp_active": self.pvp_active.load(Ordering::Relaxed) == 1,
                "rejected_intents": self.rejected_intents.load(Ordering::Relaxed),
                "uptime_seconds": self.uptime_seconds(),
            },
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

fn respond(metrics: &Metrics, request: &str) -> String {
    let (content_type, body) = if request.starts_with("GET /metrics/json") {
        ("application/json", metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ("text/plain; version=0.0.4", metrics.to_prometheus())
    } else if request.starts_with("GET /health") {
        ("text/plain", "OK".to_string())
    } else {
        return "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
    };

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::pool::PoolStats;

    #[test]
    fn test_record_tick_time() {
        let metrics = Metrics::new();
        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 100);
        assert_eq!(metrics.tick_time_max_us.load(Ordering::Relaxed), 1090);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) >= 1040);
        assert!(metrics.tick_time_p99_us.load(Ordering::Relaxed) >= metrics.tick_time_p95_us.load(Ordering::Relaxed));
    }

    #[test]
    fn test_observe_session() {
        let metrics = Metrics::new();
        metrics.observe_session(&SessionStats {
            players: 3,
            alive_players: 2,
            enemies: 40,
            bosses: 1,
            pickups: 3,
            spawner_running: true,
            rejected_intents: 5,
            pool: PoolStats {
                retained: 12,
                destroyed: 4,
                ..PoolStats::default()
            },
            ..SessionStats::default()
        });

        let output = metrics.to_prometheus();
        assert!(output.contains("horde_players_total 3"));
        assert!(output.contains("horde_players_alive 2"));
        assert!(output.contains("horde_enemies_live 40"));
        assert!(output.contains("horde_pool_retained_total 12"));
        assert!(output.contains("horde_pool_destroyed_total 4"));
        assert!(output.contains("horde_spawner_running 1"));
        assert!(output.contains("horde_intents_rejected_total 5"));
        assert!(output.contains("horde_pickups 3"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.live_enemies.store(17, Ordering::Relaxed);

        let value: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(value["entities"]["enemies"], 17);
        assert_eq!(value["session"]["pvp_active"], false);
    }

    #[test]
    fn test_routes() {
        let metrics = Metrics::new();
        assert!(respond(&metrics, "GET /metrics HTTP/1.1").contains("horde_tick_count"));
        assert!(respond(&metrics, "GET /metrics/json HTTP/1.1").contains("application/json"));
        assert!(respond(&metrics, "GET /health HTTP/1.1").ends_with("OK"));
        assert!(respond(&metrics, "GET /nope HTTP/1.1").starts_with("HTTP/1.1 404"));
    }
}
