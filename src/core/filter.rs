//! Job/resource compatibility filtering.
//!
//! The filter decides, for one job and one resource, whether the resource
//! can run the job now (`GO`), could run it once a slot frees up (`WAIT`),
//! or can never run it (`NEVER`). It is deterministic and never looks at
//! the job's price expression.

use std::fmt;

use tracing::debug;

use crate::core::job::{Job, JobType, ScheduleHint};
use crate::core::resource::Resource;
use crate::util::serde::TimestampMs;

/// Inputs the filter needs besides the job and resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    /// Current time (ms since epoch).
    pub now_ms: TimestampMs,
    /// Maximum heartbeat age before a resource is considered stale.
    pub staleness_threshold_ms: TimestampMs,
}

impl FilterContext {
    /// Create a context.
    pub const fn new(now_ms: TimestampMs, staleness_threshold_ms: TimestampMs) -> Self {
        Self {
            now_ms,
            staleness_threshold_ms,
        }
    }
}

/// Why a job cannot run on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    /// The resource id matches none of the job's resource patterns.
    ResourcePattern,
    /// Architecture tags differ.
    Architecture {
        /// Required by the job.
        required: String,
        /// Offered by the resource.
        offered: String,
    },
    /// Platform names differ.
    Platform {
        /// Required by the job.
        required: String,
        /// Offered by the resource.
        offered: String,
    },
    /// A required runtime environment is missing.
    RuntimeEnvironment(String),
    /// Too few CPUs.
    CpuCount,
    /// The job asks for more CPU time than the resource allows.
    CpuTime,
    /// Too few nodes.
    NodeCount,
    /// Not enough memory.
    Memory,
    /// Not enough disk.
    Disk,
    /// The resource is not a member of the job's virtual organization.
    Vgrid(String),
    /// The resource does not accept this job type.
    JobType(JobType),
    /// The job may not run on a sandbox resource.
    Sandbox,
    /// The resource heartbeat is older than the staleness threshold.
    Stale,
    /// Compatible, but no free slot right now.
    NoFreeSlots,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourcePattern => write!(f, "resource not among the requested ones"),
            Self::Architecture { required, offered } => {
                write!(f, "architecture {offered} does not match required {required}")
            }
            Self::Platform { required, offered } => {
                write!(f, "platform {offered:?} does not match required {required:?}")
            }
            Self::RuntimeEnvironment(name) => write!(f, "missing runtime environment {name}"),
            Self::CpuCount => write!(f, "not enough cpus"),
            Self::CpuTime => write!(f, "cpu time above the resource limit"),
            Self::NodeCount => write!(f, "not enough nodes"),
            Self::Memory => write!(f, "not enough memory"),
            Self::Disk => write!(f, "not enough disk"),
            Self::Vgrid(vgrid) => write!(f, "not a member of vgrid {vgrid}"),
            Self::JobType(job_type) => write!(f, "{job_type} jobs not accepted"),
            Self::Sandbox => write!(f, "job not allowed on sandbox resources"),
            Self::Stale => write!(f, "resource is stale"),
            Self::NoFreeSlots => write!(f, "no free slots"),
        }
    }
}

/// Filter outcome with the reason for anything but `GO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Computed hint.
    pub hint: ScheduleHint,
    /// Reason when the hint is not `GO`.
    pub reason: Option<Incompatibility>,
}

impl Verdict {
    const fn go() -> Self {
        Self {
            hint: ScheduleHint::Go,
            reason: None,
        }
    }

    const fn never(reason: Incompatibility) -> Self {
        Self {
            hint: ScheduleHint::Never,
            reason: Some(reason),
        }
    }
}

/// Compute the verdict for `job` on `resource` without mutating either.
pub fn check(job: &Job, resource: &Resource, ctx: &FilterContext) -> Verdict {
    if resource.is_stale(ctx.now_ms, ctx.staleness_threshold_ms) {
        return Verdict::never(Incompatibility::Stale);
    }
    if let Some(reason) = static_mismatch(job, resource) {
        return Verdict::never(reason);
    }
    if resource.free_slots == Some(0) {
        return Verdict {
            hint: ScheduleHint::Wait,
            reason: Some(Incompatibility::NoFreeSlots),
        };
    }
    Verdict::go()
}

fn static_mismatch(job: &Job, resource: &Resource) -> Option<Incompatibility> {
    let req = job.requirements();
    if !req.resource_patterns.is_empty() {
        let id = resource.id.to_string();
        if !req.resource_patterns.iter().any(|p| glob_match(p, &id)) {
            return Some(Incompatibility::ResourcePattern);
        }
    }
    if let Some(arch) = &req.architecture {
        if !arch.is_empty() && *arch != resource.architecture {
            return Some(Incompatibility::Architecture {
                required: arch.clone(),
                offered: resource.architecture.clone(),
            });
        }
    }
    if let Some(platform) = &req.platform {
        if !platform.eq_ignore_ascii_case(&resource.platform) {
            return Some(Incompatibility::Platform {
                required: platform.clone(),
                offered: resource.platform.clone(),
            });
        }
    }
    if let Some(missing) = req
        .runtime_environments
        .iter()
        .find(|re| !resource.runtime_environments.contains(*re))
    {
        return Some(Incompatibility::RuntimeEnvironment(missing.clone()));
    }
    if resource.cpu_count < req.cpu_count {
        return Some(Incompatibility::CpuCount);
    }
    if resource
        .max_cpu_time_secs
        .is_some_and(|limit| req.cpu_time_secs > limit)
    {
        return Some(Incompatibility::CpuTime);
    }
    if resource.node_count < req.node_count {
        return Some(Incompatibility::NodeCount);
    }
    if resource.memory_mb < req.memory_mb {
        return Some(Incompatibility::Memory);
    }
    if resource.disk_gb < req.disk_gb {
        return Some(Incompatibility::Disk);
    }
    if let Some(vgrid) = &req.vgrid {
        if !resource.is_member_of(vgrid) {
            return Some(Incompatibility::Vgrid(vgrid.clone()));
        }
    }
    if !resource.job_types.accepts(req.job_type) {
        return Some(Incompatibility::JobType(req.job_type));
    }
    if resource.sandbox && !req.sandbox_ok {
        return Some(Incompatibility::Sandbox);
    }
    None
}

/// Shell-style wildcard match of the whole of `text` against `pattern`.
///
/// `*` matches any run of characters, `?` any one character and `[...]` one
/// character from a set, with `a-z` ranges and a leading `!` negating it.
/// A `[` without a closing `]` is literal. Matching is case sensitive.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Last `*` seen and the text position it currently absorbs up to.
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        let step = match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
                continue;
            }
            Some('?') => Some(1),
            Some('[') => match class_match(&p[pi..], t[ti]) {
                Some((len, true)) => Some(len),
                Some((_, false)) => None,
                None => (t[ti] == '[').then_some(1),
            },
            Some(&c) => (c == t[ti]).then_some(1),
            None => None,
        };
        match (step, star) {
            (Some(len), _) => {
                pi += len;
                ti += 1;
            }
            (None, Some((sp, st))) => {
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            (None, None) => return false,
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Match `c` against the set opening `class`. Returns the set's length in
/// pattern characters and whether it matched, or `None` when unterminated.
fn class_match(class: &[char], c: char) -> Option<(usize, bool)> {
    let mut i = 1;
    let negate = class.get(i) == Some(&'!');
    if negate {
        i += 1;
    }
    let first = i;
    let mut matched = false;
    loop {
        let lo = *class.get(i)?;
        if lo == ']' && i > first {
            return Some((i + 1, matched != negate));
        }
        match (class.get(i + 1), class.get(i + 2)) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                matched |= (lo..=hi).contains(&c);
                i += 3;
            }
            _ => {
                matched |= lo == c;
                i += 1;
            }
        }
    }
}

/// Compute the hint for `job` on `resource` and record it on the job.
///
/// `GO` adds the resource to the job's schedule targets; any other hint
/// removes it. Applying the same inputs twice leaves the job unchanged.
pub fn annotate(job: &mut Job, resource: &Resource, ctx: &FilterContext) -> ScheduleHint {
    let verdict = check(job, resource, ctx);
    match &verdict.reason {
        None => job.add_target(&resource.id),
        Some(reason) => {
            debug!("job {} on {}: {} ({reason})", job.id(), resource.id, verdict.hint);
            job.remove_target(&resource.id);
        }
    }
    job.set_hint(verdict.hint);
    verdict.hint
}
