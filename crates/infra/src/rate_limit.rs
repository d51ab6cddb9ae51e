//! In-process per-client request rate limiting.
//!
//! A sliding window of request instants per client, all behind one mutex.
//! The critical section is a few deque operations; nothing awaits while the
//! lock is held. Idle clients are evicted by a periodic background sweep.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("rate limit exceeded, retry after {}s", .retry_after.as_secs().max(1))]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Debug)]
pub struct RequestRateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RequestRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Record a request from `client`, or reject it if the window is full.
    pub fn check(&self, client: &str) -> Result<(), RateLimited> {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), RateLimited> {
        let mut clients = self.lock();
        let hits = clients.entry(client.to_string()).or_default();

        while hits
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.config.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.config.max_requests as usize {
            let retry_after = hits
                .front()
                .map(|oldest| self.config.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.config.window);
            return Err(RateLimited { retry_after });
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drop clients with no request inside the window. Returns how many.
    pub fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    pub fn sweep_idle_at(&self, now: Instant) -> usize {
        let window = self.config.window;
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    // A poisoned map only ever holds timestamps; keep using it.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle for the background sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Spawn a tokio task that calls [`RequestRateLimiter::sweep_idle`] every
/// `sweep_interval`.
pub fn spawn_sweeper(limiter: Arc<RequestRateLimiter>) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let period = limiter.config.sweep_interval;

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = limiter.sweep_idle();
                    if evicted > 0 {
                        debug!(evicted, remaining = limiter.tracked_clients(), "rate limiter sweep");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("rate limiter sweeper stopped");
    });

    SweeperHandle {
        shutdown: shutdown_tx,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RequestRateLimiter {
        RequestRateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
            sweep_interval: Duration::from_millis(10),
        })
    }

    #[test]
    fn rejects_over_the_limit_and_reports_retry_after() {
        let rl = limiter(3, 60);
        let t0 = Instant::now();

        for i in 0..3 {
            assert_eq!(rl.check_at("a", t0 + Duration::from_secs(i)), Ok(()));
        }
        let err = rl.check_at("a", t0 + Duration::from_secs(10)).unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(50));

        // other clients are unaffected
        assert_eq!(rl.check_at("b", t0 + Duration::from_secs(10)), Ok(()));
    }

    #[test]
    fn window_slides() {
        let rl = limiter(2, 10);
        let t0 = Instant::now();

        rl.check_at("a", t0).unwrap();
        rl.check_at("a", t0 + Duration::from_secs(5)).unwrap();
        assert!(rl.check_at("a", t0 + Duration::from_secs(9)).is_err());

        // the first hit has aged out
        assert_eq!(rl.check_at("a", t0 + Duration::from_secs(10)), Ok(()));
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let rl = limiter(1, 10);
        let t0 = Instant::now();

        rl.check_at("a", t0).unwrap();
        for s in 1..10 {
            assert!(rl.check_at("a", t0 + Duration::from_secs(s)).is_err());
        }
        assert_eq!(rl.check_at("a", t0 + Duration::from_secs(10)), Ok(()));
    }

    #[test]
    fn sweep_evicts_only_idle_clients() {
        let rl = limiter(5, 10);
        let t0 = Instant::now();

        rl.check_at("old", t0).unwrap();
        rl.check_at("fresh", t0 + Duration::from_secs(8)).unwrap();

        assert_eq!(rl.sweep_idle_at(t0 + Duration::from_secs(12)), 1);
        assert_eq!(rl.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn background_sweeper_runs_and_stops() {
        let rl = Arc::new(RequestRateLimiter::new(RateLimitConfig {
            max_requests: 5,
            window: Duration::from_millis(1),
            sweep_interval: Duration::from_millis(5),
        }));
        rl.check("client").unwrap();

        let handle = spawn_sweeper(rl.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rl.tracked_clients(), 0);

        handle.shutdown().await;
    }
}
