//! Per-resource load tracking for load-adaptive pricing.
//!
//! Every job request a resource makes is remembered, sold or not, in a
//! fixed-length backlog. The price multiplier climbs while jobs sell below
//! their budget and sinks back towards 1 while requests go unanswered.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PricingConfig;

/// Most recent requests inspected for the sudden-drop fallback.
pub const SHORT_WINDOW: usize = 10;

const PRECISION: f64 = 1e16;

/// A job sold to a resource: the price charged and the budget left over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    /// Price charged for the job.
    pub price: f64,
    /// Budget minus price.
    pub surplus: f64,
}

/// Request backlog and price multiplier of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTracker {
    requests: VecDeque<Option<Sale>>,
    multiplier: f64,
    delta: f64,
}

impl LoadTracker {
    /// A tracker with an empty backlog and a multiplier of 1.
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            requests: std::iter::repeat_n(None, config.backlog).collect(),
            multiplier: 1.0,
            delta: config.multiply_delta,
        }
    }

    /// Current price multiplier, never below 1.
    pub const fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Fraction of the remembered requests that got a job.
    pub fn load(&self) -> f64 {
        Self::fraction(self.requests.iter())
    }

    fn fraction<'a>(window: impl ExactSizeIterator<Item = &'a Option<Sale>>) -> f64 {
        let len = window.len();
        if len == 0 {
            return 0.0;
        }
        let sold = window.filter(|r| r.is_some()).count();
        sold as f64 / len as f64
    }

    /// Remember one request and adjust the multiplier.
    ///
    /// After `SHORT_WINDOW` unanswered requests in a row the multiplier
    /// falls back by a tenth of its excess over 1 on every further miss.
    /// An unanswered request lowers it by one step. A sale with a positive
    /// surplus raises it by one step, or by less when a full step would
    /// push the price past the budget. Free sales leave it alone.
    pub fn record(&mut self, outcome: Option<Sale>) {
        if !self.requests.is_empty() {
            self.requests.pop_front();
            self.requests.push_back(outcome);
        }
        let quiet = !self.requests.iter().rev().take(SHORT_WINDOW).any(Option::is_some);
        if quiet && self.multiplier > 1.0 {
            self.multiplier = 0.9f64.mul_add(self.multiplier - 1.0, 1.0);
            info!("load multiplier falls back to {:.6}", self.multiplier);
        }
        match outcome {
            None => self.multiplier = (self.multiplier - self.delta).max(1.0),
            Some(sale) if sale.price <= 0.0 => {}
            Some(sale) if sale.surplus > 0.0 => {
                let rise = self.delta * sale.price / self.multiplier;
                if sale.surplus >= rise {
                    self.multiplier += self.delta;
                } else {
                    let step = (PRECISION * sale.surplus * self.multiplier / sale.price).floor();
                    self.multiplier += step / PRECISION;
                }
            }
            Some(_) => {}
        }
    }
}
