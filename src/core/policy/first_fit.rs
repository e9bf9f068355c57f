//! First-fit: earliest queued candidate wins.

use crate::core::policy::{Candidate, PolicyContext, SchedulingPolicy, Selection};
use crate::core::resource::Resource;

/// Picks the candidate with the smallest queue index, then the smallest id.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl SchedulingPolicy for FirstFit {
    fn name(&self) -> &'static str {
        "first_fit"
    }

    fn select(
        &mut self,
        candidates: &[Candidate],
        _resource: &Resource,
        _ctx: &PolicyContext,
    ) -> Option<Selection> {
        let (pos, chosen) = candidates.iter().enumerate().min_by(|(_, a), (_, b)| {
            a.index
                .cmp(&b.index)
                .then_with(|| a.job.id().cmp(b.job.id()))
        })?;
        Some(Selection {
            candidate: pos,
            reason: format!("first fit at queue index {}", chosen.index),
            sale: None,
        })
    }
}
