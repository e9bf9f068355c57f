//! Price-aware selection: the candidate with the largest budget surplus wins.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::warn;

use crate::core::job::Job;
use crate::core::load::Sale;
use crate::core::policy::{Candidate, PolicyContext, SchedulingPolicy, Selection};
use crate::core::resource::Resource;
use crate::expr::{is_identifier, Expression, ExpressionError};
use crate::util::clock::elapsed_secs;
use crate::util::serde::TimestampMs;

/// Variables visible to price expressions for `job` on `resource`.
///
/// `cputime`, `cpucount`, `nodecount`, `memory` and `disk` are the job's
/// requested amounts, `exec_delay` the seconds since submission. Every
/// runtime environment the resource offers whose name is a valid
/// identifier is bound to 1 when the job requires it and 0 otherwise.
///
/// The UTC calendar at `now_ms` is bound as `hour` (0-23), `wday`
/// (Monday is 0), `yday` (1-366), `date` (1-31), `month` (1-12) and `year`,
/// so prices can follow the time of day or week.
pub fn price_environment(
    job: &Job,
    resource: &Resource,
    now_ms: TimestampMs,
) -> HashMap<String, f64> {
    let req = job.requirements();
    let mut env: HashMap<String, f64> = resource
        .runtime_environments
        .iter()
        .filter(|name| is_identifier(name))
        .map(|name| {
            let wanted = req.runtime_environments.contains(name);
            (name.clone(), if wanted { 1.0 } else { 0.0 })
        })
        .collect();
    env.insert("cputime".into(), req.cpu_time_secs as f64);
    env.insert("cpucount".into(), f64::from(req.cpu_count));
    env.insert("nodecount".into(), f64::from(req.node_count));
    env.insert("memory".into(), req.memory_mb as f64);
    env.insert("disk".into(), req.disk_gb as f64);
    env.insert("exec_delay".into(), elapsed_secs(job.submitted_at_ms(), now_ms));
    insert_calendar(&mut env, now_ms);
    env
}

fn insert_calendar(env: &mut HashMap<String, f64>, now_ms: TimestampMs) {
    let Some(now) = i64::try_from(now_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
    else {
        warn!("timestamp {now_ms} outside the calendar, time variables unset");
        return;
    };
    env.insert("hour".into(), f64::from(now.hour()));
    env.insert("wday".into(), f64::from(now.weekday().num_days_from_monday()));
    env.insert("yday".into(), f64::from(now.ordinal()));
    env.insert("date".into(), f64::from(now.day()));
    env.insert("month".into(), f64::from(now.month()));
    env.insert("year".into(), f64::from(now.year()));
}

#[derive(Debug, Clone, Copy)]
struct Priced {
    pos: usize,
    price: f64,
    surplus: f64,
}

/// Maximises `budget - price` over candidates whose price fits their budget.
///
/// The price is the resource's price expression, clamped at 0 and scaled by
/// the context's load multiplier. Candidates without a budget accept any
/// price and rank with surplus `-price`. Ties go to the oldest submission,
/// then the smallest id.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestPrice;

impl BestPrice {
    fn price(
        job: &Job,
        resource: &Resource,
        price_expr: &Expression,
        ctx: &PolicyContext,
    ) -> Result<(f64, Option<f64>), ExpressionError> {
        let mut env = price_environment(job, resource, ctx.now_ms);
        let budget = match job.max_price() {
            Some(src) => Some(Expression::parse(src)?.eval(&env)?),
            None => None,
        };
        if let Some(b) = budget {
            env.insert("budget".into(), b);
        }
        let price = price_expr.eval(&env)?.max(0.0) * ctx.load_multiplier;
        Ok((price, budget))
    }
}

impl SchedulingPolicy for BestPrice {
    fn name(&self) -> &'static str {
        "best_price"
    }

    fn select(
        &mut self,
        candidates: &[Candidate],
        resource: &Resource,
        ctx: &PolicyContext,
    ) -> Option<Selection> {
        let price_expr = match Expression::parse(&resource.price_expression) {
            Ok(expr) => expr,
            Err(e) => {
                warn!(
                    resource_id = %resource.id,
                    "price expression `{}` rejected: {e}",
                    resource.price_expression
                );
                return None;
            }
        };

        let mut best: Option<Priced> = None;
        for (pos, cand) in candidates.iter().enumerate() {
            let (price, budget) = match Self::price(&cand.job, resource, &price_expr, ctx) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        job_id = %cand.job.id(),
                        resource_id = %resource.id,
                        "price evaluation failed, candidate skipped: {e}"
                    );
                    continue;
                }
            };
            let surplus = match budget {
                Some(b) if price > b => continue,
                Some(b) => b - price,
                None => 0.0 - price,
            };
            let priced = Priced { pos, price, surplus };
            best = match best {
                Some(current) if Self::rank(candidates, &current, &priced) != Ordering::Less => {
                    Some(current)
                }
                _ => Some(priced),
            };
        }

        best.map(|p| Selection {
            candidate: p.pos,
            reason: format!("price {:.4}, surplus {:.4}", p.price, p.surplus),
            sale: Some(Sale {
                price: p.price,
                surplus: p.surplus,
            }),
        })
    }
}

impl BestPrice {
    /// `Greater` when `a` ranks above `b`.
    fn rank(candidates: &[Candidate], a: &Priced, b: &Priced) -> Ordering {
        let (ja, jb) = (&candidates[a.pos].job, &candidates[b.pos].job);
        a.surplus
            .total_cmp(&b.surplus)
            .then_with(|| jb.submitted_at_ms().cmp(&ja.submitted_at_ms()))
            .then_with(|| jb.id().cmp(ja.id()))
    }
}
