use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::rate_limit::ceil_secs;
use crate::state::AppState;

// Response of GET /admin/security-status
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SecurityStatus {
    pub rate_limiting: RateLimitingStatus,
    pub user_agent_filtering: AgentFilterStatus,
    pub protection_status: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RateLimitingStatus {
    pub max_requests_per_window: usize,
    pub window_duration_seconds: u64,
    pub block_duration_seconds: u64,
    pub active_keys_count: usize,
    pub currently_blocked_count: usize,
    pub total_blocked_keys: usize, // includes expired blocks not cleared yet
    pub blocked_keys: Vec<BlockedClient>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BlockedClient {
    pub key: String,
    pub blocked_until: DateTime<Utc>,
    pub time_remaining_seconds: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AgentFilterStatus {
    pub suspicious_patterns_count: usize,
    pub allowed_browsers_count: usize,
}

impl SecurityStatus {
    // `now` and `wall` must describe the same moment
    pub fn collect(state: &AppState, now: Instant, wall: DateTime<Utc>) -> Self {
        let limiter = &state.limiter;
        let snapshot = limiter.snapshot(now);

        let blocked_keys: Vec<BlockedClient> = snapshot
            .blocked
            .into_iter()
            .map(|b| BlockedClient {
                key: b.key.to_string(),
                blocked_until: expiry_at(wall, b.remaining),
                time_remaining_seconds: ceil_secs(b.remaining),
            })
            .collect();

        Self {
            rate_limiting: RateLimitingStatus {
                max_requests_per_window: limiter.max_requests(),
                window_duration_seconds: limiter.window().as_secs(),
                block_duration_seconds: limiter.block_duration().as_secs(),
                active_keys_count: snapshot.tracked_keys,
                currently_blocked_count: blocked_keys.len(),
                total_blocked_keys: snapshot.total_blocked,
                blocked_keys,
            },
            user_agent_filtering: AgentFilterStatus {
                suspicious_patterns_count: state.classifier.deny_len(),
                allowed_browsers_count: state.classifier.allow_len(),
            },
            protection_status: "ACTIVE".to_string(),
            generated_at: wall,
        }
    }
}

// Wall-clock end of a block, saturating at the latest representable time
fn expiry_at(wall: DateTime<Utc>, remaining: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(remaining)
        .ok()
        .and_then(|delta| wall.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
