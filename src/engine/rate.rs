use crate::error::ProbeError;
use crate::util::split_host_port;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Per-IP connection cooldown shared by every caller holding a clone.
///
/// The map records when each resolved address was last allowed through. A
/// rejected check leaves the entry untouched, so the cooldown is measured from
/// the last permitted connection rather than the last attempt.
///
/// Entries live as long as the limiter unless a retention bound is set with
/// [`RateLimiter::with_retention`].
#[derive(Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    retention: Option<Duration>,
    state: Arc<Mutex<State>>,
}

struct State {
    entries: HashMap<IpAddr, Instant>,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            retention: None,
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    /// Evicts entries idle for longer than `retention`. The effective bound is
    /// never shorter than the minimum interval.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention.max(self.min_interval));
        self
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Resolves `host` and checks the cooldown for its first address.
    ///
    /// Returns `Ok(true)` when a connection to that address was permitted less
    /// than the minimum interval ago. A trailing `:port` is ignored.
    pub async fn check(&self, host: &str) -> Result<bool, ProbeError> {
        debug!(host = %host, "resolving server name");
        let ip = resolve_first(host).await?;
        Ok(self.check_ip(ip).await)
    }

    /// Cooldown decision for an already resolved address.
    pub async fn check_ip(&self, ip: IpAddr) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(retention) = self.retention {
            if now.duration_since(state.last_sweep) >= retention {
                state
                    .entries
                    .retain(|_, last| now.duration_since(*last) < retention);
                state.last_sweep = now;
            }
        }

        if let Some(last) = state.entries.get(&ip) {
            // An interval past the clock's range never expires.
            let inside = last
                .checked_add(self.min_interval)
                .map_or(true, |until| now < until);
            if inside {
                debug!(%ip, "rate limit exceeded");
                return true;
            }
        }

        state.entries.insert(ip, now);
        false
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    pub async fn contains(&self, ip: IpAddr) -> bool {
        self.state.lock().await.entries.contains_key(&ip)
    }

    /// When `ip` was last allowed through, if ever.
    pub async fn last_permitted(&self, ip: IpAddr) -> Option<Instant> {
        self.state.lock().await.entries.get(&ip).copied()
    }
}

async fn resolve_first(host: &str) -> Result<IpAddr, ProbeError> {
    let (bare, _) = split_host_port(host);
    let mut addrs = lookup_host((bare, 0))
        .await
        .map_err(|err| ProbeError::Resolution {
            host: host.to_string(),
            reason: err.to_string(),
        })?;

    // Resolver order decides which address is keyed.
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ProbeError::Resolution {
            host: host.to_string(),
            reason: "no addresses found".into(),
        })
}
