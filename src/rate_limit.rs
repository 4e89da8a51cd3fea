// Sliding-window limiter. One check holds the client's entry guard throughout.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{AdmissionConfig, MAX_DURATION_SECS};
use crate::identity::ClientKey;
use crate::metrics::{EVICTED_KEYS, TRACKED_KEYS};

// How often (in checks) the map size is compared against max_tracked_keys
const PRESSURE_CHECK_EVERY: u64 = 64;
// Checks to wait after a pressure sweep that evicted nothing
const PRESSURE_BACKOFF: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitVerdict {
    Allowed,
    // still serving an earlier block
    Blocked { retry_after: Duration },
    // this request breached the limit and started a block
    RateLimited { retry_after: Duration },
}

impl LimitVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitVerdict::Allowed)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LimitVerdict::Allowed => None,
            LimitVerdict::Blocked { retry_after } | LimitVerdict::RateLimited { retry_after } => {
                Some(*retry_after)
            }
        }
    }
}

// Whole seconds rounded up, never below 1 (Retry-After style)
pub fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

// Per-client window log and block
#[derive(Debug)]
struct KeyState {
    // admitted request times inside the trailing window, oldest first
    log: VecDeque<Instant>,
    blocked_until: Option<Instant>,
    last_seen: Instant,
}

impl KeyState {
    fn new(now: Instant) -> Self {
        Self {
            log: VecDeque::new(),
            blocked_until: None,
            last_seen: now,
        }
    }

    fn is_blocked_at(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedKey {
    pub key: ClientKey,
    pub remaining: Duration,
}

// Point-in-time view for operators, taken without mutating the limiter
#[derive(Debug, Clone)]
pub struct LimiterSnapshot {
    pub tracked_keys: usize,
    // block entries still stored, including expired ones not yet cleared
    pub total_blocked: usize,
    // blocks still in force, longest remaining first
    pub blocked: Vec<BlockedKey>,
}

pub struct AdmissionLimiter {
    entries: DashMap<ClientKey, KeyState>,
    max_requests: usize,
    window: Duration,
    block_duration: Duration,
    idle_retention: Duration,
    sweep_every: u64,
    max_tracked_keys: usize,
    checks: AtomicU64,
    // no pressure sweep before this check count
    pressure_resume_at: AtomicU64,
}

impl AdmissionLimiter {
    // Expects a validated config (see AdmissionConfig::validate)
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests: config.max_requests as usize,
            window: config.window,
            block_duration: config
                .block_duration
                .min(Duration::from_secs(MAX_DURATION_SECS)),
            idle_retention: config.idle_retention,
            sweep_every: config.sweep_every.max(1),
            max_tracked_keys: config.max_tracked_keys,
            checks: AtomicU64::new(0),
            pressure_resume_at: AtomicU64::new(0),
        }
    }

    pub fn check(&self, key: &ClientKey, now: Instant) -> LimitVerdict {
        self.maybe_sweep(now);

        let verdict = {
            let mut entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| KeyState::new(now));
            self.decide(entry.value_mut(), now)
        };

        if let LimitVerdict::RateLimited { retry_after } = verdict {
            warn!(
                client = %key,
                block_secs = retry_after.as_secs(),
                "Client blocked for exceeding the request limit"
            );
        }
        verdict
    }

    // Runs under the entry guard
    fn decide(&self, state: &mut KeyState, now: Instant) -> LimitVerdict {
        state.last_seen = state.last_seen.max(now);

        if let Some(until) = state.blocked_until {
            if now < until {
                return LimitVerdict::Blocked {
                    retry_after: until - now,
                };
            }
            state.blocked_until = None;
        }

        // single pass from the front, the log is in arrival order
        while let Some(&oldest) = state.log.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                state.log.pop_front();
            } else {
                break;
            }
        }

        if state.log.len() >= self.max_requests {
            // unrepresentable expiry: the log stays full, so the client stays limited
            if let Some(until) = now.checked_add(self.block_duration) {
                state.blocked_until = Some(until);
            }
            return LimitVerdict::RateLimited {
                retry_after: self.block_duration,
            };
        }

        state.log.push_back(now);
        LimitVerdict::Allowed
    }

    fn maybe_sweep(&self, now: Instant) {
        let n = self.checks.fetch_add(1, Ordering::Relaxed) + 1;

        let due = n % self.sweep_every == 0;
        let pressured = n % PRESSURE_CHECK_EVERY == 0
            && n >= self.pressure_resume_at.load(Ordering::Relaxed)
            && self.entries.len() > self.max_tracked_keys;

        if due || pressured {
            let evicted = self.sweep(now);
            let resume_at = if evicted == 0 { n + PRESSURE_BACKOFF } else { 0 };
            self.pressure_resume_at.store(resume_at, Ordering::Relaxed);
        }
    }

    // Forget clients idle for idle_retention with no block in force.
    // Must not be called while holding an entry guard.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        let retention = self.idle_retention;

        self.entries.retain(|_, state| {
            state.is_blocked_at(now) || now.saturating_duration_since(state.last_seen) < retention
        });

        let after = self.entries.len();
        let evicted = before.saturating_sub(after);
        if evicted > 0 {
            EVICTED_KEYS.inc_by(evicted as f64);
            debug!(evicted, tracked = after, "Evicted idle clients");
        }
        TRACKED_KEYS.set(after as f64);
        evicted
    }

    pub fn snapshot(&self, now: Instant) -> LimiterSnapshot {
        let mut tracked_keys = 0;
        let mut total_blocked = 0;
        let mut blocked = Vec::new();

        for entry in self.entries.iter() {
            tracked_keys += 1;
            if let Some(until) = entry.value().blocked_until {
                total_blocked += 1;
                if now < until {
                    blocked.push(BlockedKey {
                        key: entry.key().clone(),
                        remaining: until - now,
                    });
                }
            }
        }

        blocked.sort_by(|a, b| b.remaining.cmp(&a.remaining).then_with(|| a.key.cmp(&b.key)));

        LimiterSnapshot {
            tracked_keys,
            total_blocked,
            blocked,
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }

    #[cfg(test)]
    fn logged(&self, key: &ClientKey) -> Vec<Instant> {
        self.entries
            .get(key)
            .map(|s| s.log.iter().copied().collect())
            .unwrap_or_default()
    }
}
