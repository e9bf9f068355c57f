//! Scheduling policies.
//!
//! A policy only chooses among candidates the scheduler has already
//! filtered; it never touches the queue or history.

mod best_price;
mod first_fit;
mod random;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::job::Job;
use crate::core::load::Sale;
use crate::core::resource::Resource;
use crate::util::serde::TimestampMs;

pub use best_price::{price_environment, BestPrice};
pub use first_fit::FirstFit;
pub use random::RandomPolicy;

/// A job eligible for dispatch to the current resource.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Queue index recorded when the snapshot was taken.
    pub index: usize,
    /// The job, annotated for the current resource.
    pub job: Job,
}

/// Per-call inputs shared by all policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyContext {
    /// Decision time (ms since epoch).
    pub now_ms: TimestampMs,
    /// Factor applied to the resource's evaluated price.
    pub load_multiplier: f64,
}

impl PolicyContext {
    /// Context at `now_ms` with prices left unscaled.
    pub const fn new(now_ms: TimestampMs) -> Self {
        Self {
            now_ms,
            load_multiplier: 1.0,
        }
    }

    /// Scale prices by `multiplier`.
    #[must_use]
    pub const fn with_load_multiplier(mut self, multiplier: f64) -> Self {
        self.load_multiplier = multiplier;
        self
    }
}

/// A policy's choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Position of the chosen job in the candidate slice.
    pub candidate: usize,
    /// Why it was chosen, for the dispatch event.
    pub reason: String,
    /// Price and surplus, for policies that price candidates.
    pub sale: Option<Sale>,
}

/// Strategy for picking one candidate.
pub trait SchedulingPolicy: Send {
    /// Stable policy name, recorded in dispatch events.
    fn name(&self) -> &'static str;

    /// Choose a candidate for `resource`, or `None` to decline.
    ///
    /// `candidates` is never empty and every entry has already passed the
    /// filter. Errors evaluating a single candidate must only exclude that
    /// candidate.
    fn select(
        &mut self,
        candidates: &[Candidate],
        resource: &Resource,
        ctx: &PolicyContext,
    ) -> Option<Selection>;
}

/// Policy selection for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// [`FirstFit`].
    #[default]
    FirstFit,
    /// [`RandomPolicy`].
    Random,
    /// [`BestPrice`].
    BestPrice,
}

impl PolicyKind {
    /// Build the policy. `seed` only affects [`PolicyKind::Random`].
    pub fn build(self, seed: Option<u64>) -> Box<dyn SchedulingPolicy> {
        match self {
            Self::FirstFit => Box::new(FirstFit),
            Self::Random => Box::new(seed.map_or_else(RandomPolicy::new, RandomPolicy::with_seed)),
            Self::BestPrice => Box::new(BestPrice),
        }
    }

    /// Name shared with [`SchedulingPolicy::name`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstFit => "first_fit",
            Self::Random => "random",
            Self::BestPrice => "best_price",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "first_fit" | "fifo" => Ok(Self::FirstFit),
            "random" => Ok(Self::Random),
            "best_price" | "best_fit" => Ok(Self::BestPrice),
            other => Err(format!("unknown scheduling policy `{other}`")),
        }
    }
}
