//! Prometheus-compatible metrics
//!
//! Counters and gauges for the tick driver and the replication bridge.
//! Optional endpoint: http://localhost:<METRICS_PORT>/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::net::replication::InboundStats;

const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for one arena instance
#[derive(Debug)]
pub struct Metrics {
    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Entity gauges
    pub remote_entities: AtomicU64,
    pub ai_roamers: AtomicU64,
    pub colliding_remotes: AtomicU64,

    // Outbound replication
    pub publishes: AtomicU64,
    pub publish_failures: AtomicU64,

    // Inbound replication
    pub inbound_applied: AtomicU64,
    pub inbound_dropped: AtomicU64,
    pub echoes_suppressed: AtomicU64,

    // Simulation
    pub collisions_started: AtomicU64,
    pub velocity_rejections: AtomicU64,
    pub goals_assigned: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            remote_entities: AtomicU64::new(0),
            ai_roamers: AtomicU64::new(0),
            colliding_remotes: AtomicU64::new(0),
            publishes: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            inbound_applied: AtomicU64::new(0),
            inbound_dropped: AtomicU64::new(0),
            echoes_suppressed: AtomicU64::new(0),
            collisions_started: AtomicU64::new(0),
            velocity_rejections: AtomicU64::new(0),
            goals_assigned: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn record_publish(&self, ok: bool) {
        if ok {
            self.publishes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_inbound(&self, stats: &InboundStats) {
        self.inbound_applied
            .fetch_add(stats.applied() as u64, Ordering::Relaxed);
        self.inbound_dropped
            .fetch_add(stats.dropped as u64, Ordering::Relaxed);
        self.echoes_suppressed
            .fetch_add(stats.echoes as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("arena_tick_time_microseconds", "Last tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("arena_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("arena_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("arena_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("arena_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("arena_remote_entities", "Remote player proxies", "gauge",
            self.remote_entities.load(Ordering::Relaxed));
        metric!("arena_ai_roamers", "Locally simulated roamers", "gauge",
            self.ai_roamers.load(Ordering::Relaxed));
        metric!("arena_colliding_remotes", "Remotes overlapping the local player", "gauge",
            self.colliding_remotes.load(Ordering::Relaxed));

        metric!("arena_publishes_total", "Local record publishes", "counter",
            self.publishes.load(Ordering::Relaxed));
        metric!("arena_publish_failures_total", "Publishes rejected by the channel", "counter",
            self.publish_failures.load(Ordering::Relaxed));
        metric!("arena_inbound_applied_total", "Remote events applied", "counter",
            self.inbound_applied.load(Ordering::Relaxed));
        metric!("arena_inbound_dropped_total", "Remote events dropped as malformed or conflicting", "counter",
            self.inbound_dropped.load(Ordering::Relaxed));
        metric!("arena_echoes_suppressed_total", "Events about the local record ignored", "counter",
            self.echoes_suppressed.load(Ordering::Relaxed));

        metric!("arena_collisions_started_total", "Collision episodes started", "counter",
            self.collisions_started.load(Ordering::Relaxed));
        metric!("arena_velocity_rejections_total", "Velocity changes refused at the speed bound", "counter",
            self.velocity_rejections.load(Ordering::Relaxed));
        metric!("arena_goals_assigned_total", "Roamer goals reassigned on arrival", "counter",
            self.goals_assigned.load(Ordering::Relaxed));
        metric!("arena_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON form of the same numbers
    pub fn to_json(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        serde_json::json!({
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
            },
            "entities": {
                "remotes": load(&self.remote_entities),
                "roamers": load(&self.ai_roamers),
                "colliding": load(&self.colliding_remotes),
            },
            "replication": {
                "publishes": load(&self.publishes),
                "publish_failures": load(&self.publish_failures),
                "inbound_applied": load(&self.inbound_applied),
                "inbound_dropped": load(&self.inbound_dropped),
                "echoes_suppressed": load(&self.echoes_suppressed),
            },
            "simulation": {
                "collisions_started": load(&self.collisions_started),
                "velocity_rejections": load(&self.velocity_rejections),
                "goals_assigned": load(&self.goals_assigned),
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

#[cfg(feature = "metrics_server")]
fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Start the metrics HTTP server
#[cfg(feature = "metrics_server")]
pub async fn start_metrics_server(metrics: std::sync::Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tracing::{debug, info};

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

                    let response = if request.starts_with("GET /metrics/json") {
                        http_response("application/json", &metrics.to_json())
                    } else if request.starts_with("GET /metrics") {
                        http_response("text/plain; version=0.0.4", &metrics.to_prometheus())
                    } else if request.starts_with("GET /health") {
                        http_response("text/plain", "OK")
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_string()
                    };

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tick_time() {
        let metrics = Metrics::new();
        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 100);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) >= 1000);
        assert_eq!(metrics.tick_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_tick_history_is_bounded() {
        let metrics = Metrics::new();
        for _ in 0..(TICK_HISTORY_LEN + 50) {
            metrics.record_tick_time(Duration::from_micros(5));
        }
        assert_eq!(metrics.tick_history.read().len(), TICK_HISTORY_LEN);
    }

    #[test]
    fn test_publish_and_inbound_counters() {
        let metrics = Metrics::new();
        metrics.record_publish(true);
        metrics.record_publish(true);
        metrics.record_publish(false);
        metrics.record_inbound(&InboundStats {
            created: 1,
            updated: 2,
            deleted: 1,
            echoes: 3,
            dropped: 1,
        });

        assert_eq!(metrics.publishes.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.publish_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.inbound_applied.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.echoes_suppressed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.inbound_dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.remote_entities.store(3, Ordering::Relaxed);
        metrics.collisions_started.store(7, Ordering::Relaxed);

        let output = metrics.to_prometheus();

        assert!(output.contains("arena_remote_entities 3"));
        assert!(output.contains("arena_collisions_started_total 7"));
        assert!(output.contains("# TYPE arena_tick_count counter"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.ai_roamers.store(4, Ordering::Relaxed);

        let value: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(value["entities"]["roamers"], 4);
        assert_eq!(value["replication"]["publishes"], 0);
    }
}
