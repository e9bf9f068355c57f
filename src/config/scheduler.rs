//! Scheduler, history and journal configuration structures.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::policy::PolicyKind;
use crate::core::AppResult;
use crate::util::clock::secs_to_ms;
use crate::util::serde::TimestampMs;

/// Prefix of every environment variable read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "GRID_SCHED_";

const ONE_WEEK_SECS: u64 = 7 * 24 * 60 * 60;

/// History bookkeeping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// EWMA smoothing factor, in `(0, 1]`.
    pub smoothing_alpha: f64,
    /// Entries untouched for longer than this are evicted; 0 keeps them forever.
    pub ttl_secs: u64,
    /// Dispatched jobs with no report after this long are counted as lost;
    /// 0 waits forever.
    pub lost_after_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.25,
            ttl_secs: ONE_WEEK_SECS,
            lost_after_secs: ONE_WEEK_SECS,
        }
    }
}

impl HistoryConfig {
    /// Validate history values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(format!(
                "smoothing_alpha must lie in (0, 1], got {}",
                self.smoothing_alpha
            ));
        }
        Ok(())
    }

    /// TTL in milliseconds.
    pub const fn ttl_ms(&self) -> TimestampMs {
        secs_to_ms(self.ttl_secs)
    }

    /// Lost-after age in milliseconds.
    pub const fn lost_after_ms(&self) -> TimestampMs {
        secs_to_ms(self.lost_after_secs)
    }
}

/// Load-adaptive pricing settings.
///
/// When enabled, every resource carries a price multiplier that rises while
/// its jobs sell below budget and falls while its requests go unanswered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Scale resource prices by the load multiplier.
    pub load_adaptive: bool,
    /// Multiplier step per request, in `(0, 1)`.
    pub multiply_delta: f64,
    /// Requests remembered per resource when computing its load.
    pub backlog: usize,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            load_adaptive: false,
            multiply_delta: 0.001,
            backlog: 100,
        }
    }
}

impl PricingConfig {
    /// Validate pricing values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.multiply_delta > 0.0 && self.multiply_delta < 1.0) {
            return Err(format!(
                "multiply_delta must lie in (0, 1), got {}",
                self.multiply_delta
            ));
        }
        if self.backlog < crate::core::load::SHORT_WINDOW {
            return Err(format!(
                "backlog must be at least {}, got {}",
                crate::core::load::SHORT_WINDOW,
                self.backlog
            ));
        }
        Ok(())
    }
}

/// Event journal backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalBackendConfig {
    /// Bounded in-memory log for development/testing.
    InMemory {
        /// Maximum retained events.
        capacity: usize,
    },
    /// Append-only JSON-lines file.
    File {
        /// Journal file path.
        path: PathBuf,
    },
    /// No journal.
    Disabled,
}

impl Default for JournalBackendConfig {
    fn default() -> Self {
        Self::InMemory { capacity: 10_000 }
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Policy used to pick among candidates.
    pub policy: PolicyKind,
    /// Maximum heartbeat age in seconds before a resource is not offered jobs.
    pub staleness_threshold_secs: u64,
    /// Jobs queued longer than this are expired; 0 disables expiry.
    pub expire_after_secs: u64,
    /// Maximum queued jobs before rejection.
    pub max_queue_depth: usize,
    /// Seed for the random policy; `None` seeds from the clock.
    pub random_seed: Option<u64>,
    /// History settings.
    pub history: HistoryConfig,
    /// Load-adaptive pricing settings.
    pub pricing: PricingConfig,
    /// Journal backend.
    pub journal: JournalBackendConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            staleness_threshold_secs: 600,
            expire_after_secs: 0,
            max_queue_depth: 100_000,
            random_seed: None,
            history: HistoryConfig::default(),
            pricing: PricingConfig::default(),
            journal: JournalBackendConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate all values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.staleness_threshold_secs == 0 {
            return Err("staleness_threshold_secs must be greater than 0".into());
        }
        self.history
            .validate()
            .map_err(|e| format!("history invalid: {e}"))?;
        self.pricing
            .validate()
            .map_err(|e| format!("pricing invalid: {e}"))?;
        match &self.journal {
            JournalBackendConfig::InMemory { capacity: 0 } => {
                return Err("journal capacity must be greater than 0".into());
            }
            JournalBackendConfig::File { path } if path.as_os_str().is_empty() => {
                return Err("journal path must not be empty".into());
            }
            _ => {}
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `GRID_SCHED_*` environment variables, loading
    /// a `.env` file first when present. Unset variables keep their defaults.
    ///
    /// Recognised variables: `POLICY`, `STALENESS_THRESHOLD_SECS`,
    /// `EXPIRE_AFTER_SECS`, `MAX_QUEUE_DEPTH`, `RANDOM_SEED`,
    /// `HISTORY_ALPHA`, `HISTORY_TTL_SECS`, `HISTORY_LOST_AFTER_SECS`,
    /// `LOAD_PRICING`, `LOAD_MULTIPLY_DELTA`, `JOURNAL_PATH`.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        if let Some(policy) = env_parse::<PolicyKind>("POLICY")? {
            cfg.policy = policy;
        }
        if let Some(secs) = env_parse("STALENESS_THRESHOLD_SECS")? {
            cfg.staleness_threshold_secs = secs;
        }
        if let Some(secs) = env_parse("EXPIRE_AFTER_SECS")? {
            cfg.expire_after_secs = secs;
        }
        if let Some(depth) = env_parse("MAX_QUEUE_DEPTH")? {
            cfg.max_queue_depth = depth;
        }
        cfg.random_seed = env_parse("RANDOM_SEED")?;
        if let Some(alpha) = env_parse("HISTORY_ALPHA")? {
            cfg.history.smoothing_alpha = alpha;
        }
        if let Some(ttl) = env_parse("HISTORY_TTL_SECS")? {
            cfg.history.ttl_secs = ttl;
        }
        if let Some(secs) = env_parse("HISTORY_LOST_AFTER_SECS")? {
            cfg.history.lost_after_secs = secs;
        }
        if let Some(enabled) = env_parse("LOAD_PRICING")? {
            cfg.pricing.load_adaptive = enabled;
        }
        if let Some(delta) = env_parse("LOAD_MULTIPLY_DELTA")? {
            cfg.pricing.multiply_delta = delta;
        }
        if let Some(path) = env_var("JOURNAL_PATH") {
            cfg.journal = JournalBackendConfig::File { path: path.into() };
        }
        cfg.validate()
            .map_err(anyhow::Error::msg)
            .context("invalid scheduler configuration from environment")?;
        Ok(cfg)
    }

    /// Staleness threshold in milliseconds.
    pub const fn staleness_threshold_ms(&self) -> TimestampMs {
        secs_to_ms(self.staleness_threshold_secs)
    }

    /// Expiry age in milliseconds; `None` when expiry is disabled.
    pub const fn expire_after_ms(&self) -> Option<TimestampMs> {
        if self.expire_after_secs == 0 {
            None
        } else {
            Some(secs_to_ms(self.expire_after_secs))
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = env_var(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("parsing {ENV_PREFIX}{name}={raw}"))
}
