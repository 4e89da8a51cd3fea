use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MAX_REQUESTS: u32 = 60;
pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_BLOCK_SECS: u64 = 300;
pub const DEFAULT_IDLE_RETENTION_SECS: u64 = 600;
pub const DEFAULT_SWEEP_EVERY: u64 = 1024;
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 100_000;
// Ceiling for window, block and retention (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "storefront-gateway")]
#[command(about = "Request admission gateway for the storefront")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "GATEWAY_PORT", default_value_t = 8000)]
    pub port: u16,

    // Storefront application to forward admitted requests to
    // Example: "http://localhost:8080"
    #[arg(short, long, env = "UPSTREAM_URL")]
    pub upstream: Option<String>,

    // Max requests per client within one window
    #[arg(long, env = "ADMISSION_MAX_REQUESTS", default_value_t = DEFAULT_MAX_REQUESTS)]
    pub max_requests: u32,

    // Sliding window length in seconds
    #[arg(long, env = "ADMISSION_WINDOW_SECS", default_value_t = DEFAULT_WINDOW_SECS)]
    pub window_secs: u64,

    // How long a client stays blocked after breaching the limit
    #[arg(long, env = "ADMISSION_BLOCK_SECS", default_value_t = DEFAULT_BLOCK_SECS)]
    pub block_secs: u64,

    // Paths exempt from rate limiting (comma-separated)
    #[arg(
        long,
        env = "ADMISSION_BYPASS_PREFIXES",
        value_delimiter = ',',
        default_value = "/static/"
    )]
    pub bypass_prefixes: Vec<String>,

    // Automation markers, empty means the built-in list
    #[arg(long, env = "ADMISSION_AGENT_DENY", value_delimiter = ',')]
    pub agent_deny: Vec<String>,

    // Browser engine tokens, empty means the built-in list
    #[arg(long, env = "ADMISSION_AGENT_ALLOW", value_delimiter = ',')]
    pub agent_allow: Vec<String>,

    // Idle clients without a block are forgotten after this many seconds
    #[arg(long, env = "ADMISSION_IDLE_RETENTION_SECS", default_value_t = DEFAULT_IDLE_RETENTION_SECS)]
    pub idle_retention_secs: u64,

    // Run an eviction sweep every N checks
    #[arg(long, env = "ADMISSION_SWEEP_EVERY", default_value_t = DEFAULT_SWEEP_EVERY)]
    pub sweep_every: u64,

    // Sweep early once this many clients are tracked
    #[arg(long, env = "ADMISSION_MAX_TRACKED_KEYS", default_value_t = DEFAULT_MAX_TRACKED_KEYS)]
    pub max_tracked_keys: usize,

    // Bearer token for /admin/security-status (endpoint disabled when unset)
    #[arg(long, env = "ADMIN_TOKEN")]
    pub admin_token: Option<String>,
}

impl Args {
    pub fn admission_config(&self) -> Result<AdmissionConfig, ConfigError> {
        let config = AdmissionConfig {
            max_requests: self.max_requests,
            window: Duration::from_secs(self.window_secs),
            block_duration: Duration::from_secs(self.block_secs),
            idle_retention: Duration::from_secs(self.idle_retention_secs),
            sweep_every: self.sweep_every,
            max_tracked_keys: self.max_tracked_keys,
            bypass_prefixes: clean_list(&self.bypass_prefixes),
        };
        config.validate()?;
        Ok(config)
    }
}

// Validated admission thresholds
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub block_duration: Duration,
    pub idle_retention: Duration,
    pub sweep_every: u64,
    pub max_tracked_keys: usize,
    pub bypass_prefixes: Vec<String>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            block_duration: Duration::from_secs(DEFAULT_BLOCK_SECS),
            idle_retention: Duration::from_secs(DEFAULT_IDLE_RETENTION_SECS),
            sweep_every: DEFAULT_SWEEP_EVERY,
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
            bypass_prefixes: vec!["/static/".to_string()],
        }
    }
}

impl AdmissionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::NonPositive { field: "max_requests" });
        }
        if self.window.is_zero() {
            return Err(ConfigError::NonPositive { field: "window_secs" });
        }
        if self.block_duration.is_zero() {
            return Err(ConfigError::NonPositive { field: "block_secs" });
        }
        if self.sweep_every == 0 {
            return Err(ConfigError::NonPositive { field: "sweep_every" });
        }
        if self.max_tracked_keys == 0 {
            return Err(ConfigError::NonPositive { field: "max_tracked_keys" });
        }
        for (field, value) in [
            ("window_secs", self.window),
            ("block_secs", self.block_duration),
            ("idle_retention_secs", self.idle_retention),
        ] {
            if value > Duration::from_secs(MAX_DURATION_SECS) {
                return Err(ConfigError::TooLarge {
                    field,
                    max_secs: MAX_DURATION_SECS,
                });
            }
        }
        // a shorter retention would forget live window entries
        if self.idle_retention < self.window {
            return Err(ConfigError::RetentionShorterThanWindow {
                retention: self.idle_retention.as_secs(),
                window: self.window.as_secs(),
            });
        }
        Ok(())
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

// trim entries and drop empty ones ("a, ,b" -> ["a", "b"])
pub fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
