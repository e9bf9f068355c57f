//! Property tests over randomly generated queues and resources.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grid_scheduler::config::{HistoryConfig, JournalBackendConfig, SchedulerConfig};
use grid_scheduler::core::filter::{check, FilterContext};
use grid_scheduler::core::{
    BestPrice, Candidate, CompletionReport, ExitKind, FirstFit, History, Job, JobQueue,
    PolicyContext, RandomPolicy, Requirements, Resource, ScheduleHint, Scheduler,
    SchedulerError, SchedulingPolicy,
};
use grid_scheduler::expr::{Environment, Expression, ExpressionError, MAX_DEPTH, MAX_SOURCE_LEN};
use grid_scheduler::infra::InMemoryJobQueue;
use grid_scheduler::util::serde::ResourceId;

const ARCHES: [&str; 2] = ["X86_64", "ARM64"];

fn config() -> SchedulerConfig {
    SchedulerConfig {
        journal: JournalBackendConfig::Disabled,
        ..SchedulerConfig::default()
    }
}

fn random_job(rng: &mut StdRng, id: usize) -> Job {
    let req = Requirements {
        cpu_count: rng.random_range(0..8),
        memory_mb: rng.random_range(0..2048),
        disk_gb: rng.random_range(0..20),
        architecture: if rng.random_bool(0.5) {
            Some(ARCHES[rng.random_range(0..ARCHES.len())].to_string())
        } else {
            None
        },
        ..Requirements::default()
    };
    Job::new(format!("job-{id}"), "alice", id as u128, req).unwrap()
}

fn random_resource(rng: &mut StdRng, index: u32) -> Resource {
    Resource::new(
        ResourceId::new("grid.example.org", index),
        ARCHES[rng.random_range(0..ARCHES.len())],
        0,
    )
    .with_capacity(
        rng.random_range(1..8),
        rng.random_range(256..2048),
        rng.random_range(1..20),
    )
}

fn fits(job: &Job, resource: &Resource) -> bool {
    let req = job.requirements();
    req.cpu_count <= resource.cpu_count
        && req.memory_mb <= resource.memory_mb
        && req.disk_gb <= resource.disk_gb
        && req
            .architecture
            .as_ref()
            .is_none_or(|a| *a == resource.architecture)
}

fn policies() -> Vec<Box<dyn SchedulingPolicy>> {
    vec![
        Box::new(FirstFit),
        Box::new(RandomPolicy::with_seed(11)),
        Box::new(BestPrice),
    ]
}

#[test]
fn test_dispatched_jobs_always_fit() {
    for (seed, policy) in policies().into_iter().enumerate() {
        let name = policy.name();
        let mut rng = StdRng::seed_from_u64(seed as u64 + 1);
        let mut s = Scheduler::new(&config(), InMemoryJobQueue::new(1_000), policy);
        let mut budgets = HashMap::new();
        for id in 0..200 {
            let mut job = random_job(&mut rng, id);
            if rng.random_bool(0.5) {
                let budget = rng.random_range(0..40);
                job = job.with_max_price(budget.to_string()).unwrap();
                budgets.insert(job.id().to_string(), f64::from(budget));
            }
            s.enqueue(job, 0).unwrap();
        }
        let mut dispatched = 0;
        for round in 0..300 {
            let price = rng.random_range(0..30);
            let r = random_resource(&mut rng, round % 5).with_price(price.to_string());
            if let Some(d) = s.schedule(&r, None, 0).unwrap() {
                dispatched += 1;
                assert!(fits(&d.job, &r), "{name}: {} dispatched to {}", d.job.id(), r.id);
                if let Some(sale) = d.sale {
                    assert_eq!(sale.price, f64::from(price));
                    if let Some(budget) = budgets.get(d.job.id()) {
                        assert!(sale.price <= *budget, "{name}: {} over budget", d.job.id());
                    }
                }
            }
        }
        assert!(dispatched > 0, "{name} never dispatched");
    }
}

#[test]
fn test_queue_conserves_jobs() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut s = Scheduler::new(
        &config(),
        InMemoryJobQueue::new(1_000),
        Box::new(RandomPolicy::with_seed(3)),
    );
    for id in 0..100 {
        s.enqueue(random_job(&mut rng, id), 0).unwrap();
    }
    let mut dispatched = HashSet::new();
    for round in 0..400 {
        let r = random_resource(&mut rng, round % 3);
        if let Some(d) = s.schedule(&r, None, 0).unwrap() {
            assert!(dispatched.insert(d.job.id().to_string()), "dispatched twice");
            assert!(s.queue().get_by_id(d.job.id()).is_none());
        }
    }
    let queued: HashSet<String> = s
        .queue()
        .snapshot_iter()
        .iter()
        .map(|(_, j)| j.id().to_string())
        .collect();
    assert!(queued.is_disjoint(&dispatched));
    assert_eq!(queued.len() + dispatched.len(), 100);

    // remaining jobs keep their submission order
    let order: Vec<u128> = s
        .queue()
        .snapshot_iter()
        .iter()
        .map(|(_, j)| j.submitted_at_ms())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_filter_is_idempotent_and_go_means_target() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut s = Scheduler::new(&config(), InMemoryJobQueue::new(1_000), Box::new(FirstFit));
    for id in 0..50 {
        s.enqueue(random_job(&mut rng, id), 0).unwrap();
    }
    let r = random_resource(&mut rng, 0).with_free_slots(Some(0));
    let ctx = FilterContext::new(0, s.staleness_threshold_ms());

    // no free slots: nothing dispatched, every job waits or never fits
    assert!(s.schedule(&r, None, 0).unwrap().is_none());
    for (_, job) in s.queue().snapshot_iter().iter() {
        assert_ne!(job.hint(), ScheduleHint::Go);
        assert_eq!(check(job, &r, &ctx).hint, job.hint());
        assert!(!job.schedule_targets().contains(&r.id));
    }
    let hints = |s: &Scheduler| -> Vec<ScheduleHint> {
        s.queue().snapshot_iter().iter().map(|(_, j)| j.hint()).collect()
    };
    let first = hints(&s);
    assert!(s.schedule(&r, None, 0).unwrap().is_none());
    let second = hints(&s);
    assert_eq!(first, second);
}

#[test]
fn test_stale_resources_never_receive_jobs() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut s = Scheduler::new(&config(), InMemoryJobQueue::new(1_000), Box::new(FirstFit));
    for id in 0..50 {
        s.enqueue(random_job(&mut rng, id), 0).unwrap();
    }
    let threshold = s.staleness_threshold_ms();
    for round in 0..100 {
        let r = random_resource(&mut rng, round);
        let now = threshold + 1 + rng.random_range(0..1_000_000);
        assert!(s.schedule(&r, None, now).unwrap().is_none());
    }
    assert_eq!(s.queue().len(), 50);
}

#[test]
fn test_random_policy_chi_square() {
    const K: usize = 10_000;
    const N: usize = 4;
    let candidates: Vec<Candidate> = (0..N)
        .map(|i| Candidate {
            index: i,
            job: Job::new(format!("j{i}"), "alice", 0, Requirements::default()).unwrap(),
        })
        .collect();
    let resource = Resource::new(ResourceId::new("r", 0), "X86_64", 0);
    let ctx = PolicyContext::new(0);
    let mut policy = RandomPolicy::with_seed(99);

    let mut counts = [0usize; N];
    for _ in 0..K {
        let pick = policy.select(&candidates, &resource, &ctx).unwrap();
        counts[pick.candidate] += 1;
    }
    let expected = K as f64 / N as f64;
    let chi2: f64 = counts
        .iter()
        .map(|&c| (c as f64 - expected).powi(2) / expected)
        .sum();
    // 3 degrees of freedom; 30 is far beyond the 0.9999 quantile
    assert!(chi2 < 30.0, "chi-square {chi2} for counts {counts:?}");
}

#[test]
fn test_best_price_never_exceeds_budget() {
    let mut rng = StdRng::seed_from_u64(6);
    for round in 0..50 {
        let mut s = Scheduler::new(&config(), InMemoryJobQueue::new(100), Box::new(BestPrice));
        let mut budgets = HashMap::new();
        for id in 0..10 {
            let budget = rng.random_range(0..50);
            let job = Job::new(format!("job-{id}"), "alice", 0, Requirements::default())
                .unwrap()
                .with_max_price(budget.to_string())
                .unwrap();
            budgets.insert(job.id().to_string(), f64::from(budget));
            s.enqueue(job, 0).unwrap();
        }
        let price = rng.random_range(0..60);
        let r = Resource::new(ResourceId::new("grid.example.org", round), "X86_64", 0)
            .with_price(price.to_string());

        let best_surplus = budgets
            .values()
            .map(|b| b - f64::from(price))
            .filter(|s| *s >= 0.0)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
        match s.schedule(&r, None, 0).unwrap() {
            Some(d) => {
                let budget = budgets[d.job.id()];
                assert!(f64::from(price) <= budget);
                assert_eq!(Some(budget - f64::from(price)), best_surplus);
            }
            None => assert!(best_surplus.is_none()),
        }
    }
}

#[test]
fn test_ewma_matches_closed_form() {
    let alpha = 0.3;
    let mut history = History::new(&HistoryConfig {
        smoothing_alpha: alpha,
        ttl_secs: 0,
        lost_after_secs: 0,
    });
    let resource_id = ResourceId::new("grid.example.org", 0);
    let prices = [12.0, 3.5, 8.25, 0.0, 40.0, 17.0, 5.5];

    for (n, price) in prices.iter().enumerate() {
        let job = Job::new(format!("job-{n}"), "alice", 0, Requirements::default()).unwrap();
        history.record_dispatch(&job, &resource_id, n as u128);
        let report = CompletionReport {
            job_id: job.id().to_string(),
            resource_id: resource_id.clone(),
            observed_wall_secs: 1.0,
            observed_price: *price,
            exit_kind: ExitKind::Ok,
        };
        assert!(history.record_completion(&report, n as u128));
    }

    // s_n = (1-a)^(n-1) p_1 + sum_{k=2..n} a (1-a)^(n-k) p_k
    let n = prices.len();
    let mut closed = (1.0 - alpha).powi(n as i32 - 1) * prices[0];
    for (k, p) in prices.iter().enumerate().skip(1) {
        closed += alpha * (1.0 - alpha).powi((n - 1 - k) as i32) * p;
    }
    let entry = history.entry(&resource_id, "alice").unwrap();
    let ewma = entry.ewma_price.unwrap();
    assert!((ewma - closed).abs() < 1e-9, "{ewma} vs {closed}");
    assert_eq!(entry.completed, prices.len() as u64);
    assert_eq!(entry.wall_secs, prices.len() as f64);
}

#[test]
fn test_history_ignores_unusable_measurements() {
    let alpha = 0.5;
    let mut rng = StdRng::seed_from_u64(8);
    let mut history = History::new(&HistoryConfig {
        smoothing_alpha: alpha,
        ttl_secs: 0,
        lost_after_secs: 0,
    });
    let resource_id = ResourceId::new("grid.example.org", 0);
    let junk = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -1.0];
    let mut expected: Option<f64> = None;
    let mut wall = 0.0;

    for n in 0..200 {
        let job = Job::new(format!("job-{n}"), "alice", 0, Requirements::default()).unwrap();
        history.record_dispatch(&job, &resource_id, n);
        let usable = rng.random_bool(0.6);
        let (price, secs) = if usable {
            (f64::from(rng.random_range(0..100)), f64::from(rng.random_range(0..60)))
        } else {
            (junk[rng.random_range(0..junk.len())], junk[rng.random_range(0..junk.len())])
        };
        if usable {
            expected = Some(expected.map_or(price, |e| alpha.mul_add(price - e, e)));
            wall += secs;
        }
        let report = CompletionReport {
            job_id: job.id().to_string(),
            resource_id: resource_id.clone(),
            observed_wall_secs: secs,
            observed_price: price,
            exit_kind: ExitKind::Ok,
        };
        assert!(history.record_completion(&report, n));

        let entry = history.entry(&resource_id, "alice").unwrap();
        assert!(entry.wall_secs.is_finite());
        assert!(entry.ewma_price.is_none_or(f64::is_finite));
    }
    let entry = history.entry(&resource_id, "alice").unwrap();
    assert_eq!(entry.completed, 200);
    assert!((entry.wall_secs - wall).abs() < 1e-6);
    match (entry.ewma_price, expected) {
        (Some(got), Some(want)) => assert!((got - want).abs() < 1e-9, "{got} vs {want}"),
        (got, want) => assert_eq!(got, want),
    }
}

#[test]
fn test_in_flight_pairs_outlive_their_ttl() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut history = History::new(&HistoryConfig {
        smoothing_alpha: 0.5,
        ttl_secs: 1,
        lost_after_secs: 0,
    });
    let owners = ["alice", "bob", "carol"];
    let mut open: Vec<(Job, ResourceId)> = Vec::new();
    let mut now = 0;

    for n in 0..300 {
        now += rng.random_range(0..3_000);
        if !open.is_empty() && rng.random_bool(0.4) {
            let (job, resource_id) = open.swap_remove(rng.random_range(0..open.len()));
            let report = CompletionReport {
                job_id: job.id().to_string(),
                resource_id,
                observed_wall_secs: 1.0,
                observed_price: 1.0,
                exit_kind: ExitKind::Ok,
            };
            assert!(history.record_completion(&report, now));
        } else {
            let owner = owners[rng.random_range(0..owners.len())];
            let job = Job::new(format!("job-{n}"), owner, 0, Requirements::default()).unwrap();
            let resource_id = ResourceId::new("grid.example.org", rng.random_range(0..3));
            history.record_dispatch(&job, &resource_id, now);
            open.push((job, resource_id));
        }
        for (job, resource_id) in &open {
            assert_eq!(history.in_flight(job.id()), Some(resource_id));
            assert!(history.entry(resource_id, job.owner()).is_some());
        }
    }
    assert_eq!(history.in_flight_len(), open.len());
}

#[test]
fn test_longest_chains_are_rejected_at_every_boundary() {
    let chains = [
        format!("{}1", "1+".repeat((MAX_SOURCE_LEN - 1) / 2)),
        format!("{}2", "2*".repeat(MAX_DEPTH + 1)),
        format!("{}x", "x - ".repeat(MAX_DEPTH + 1)),
    ];
    for chain in &chains {
        assert!(chain.len() <= MAX_SOURCE_LEN);
        assert_eq!(
            Expression::parse(chain).unwrap_err(),
            ExpressionError::TooDeep { limit: MAX_DEPTH }
        );
        let job = Job::new("j", "alice", 0, Requirements::default()).unwrap();
        assert!(matches!(
            job.with_max_price(chain.as_str()),
            Err(SchedulerError::InvalidJob(_))
        ));
        let resource =
            Resource::new(ResourceId::new("grid.example.org", 0), "X86_64", 0).with_price(chain);
        assert!(matches!(resource.validate(), Err(SchedulerError::InvalidResource(_))));
    }

    // a resource that skipped validation costs its candidates, not the scheduler
    let mut s = Scheduler::new(&config(), InMemoryJobQueue::new(10), Box::new(BestPrice));
    s.enqueue(Job::new("j", "alice", 0, Requirements::default()).unwrap(), 0).unwrap();
    let r = Resource::new(ResourceId::new("grid.example.org", 0), "X86_64", 0)
        .with_price(chains[0].as_str());
    assert!(s.schedule(&r, None, 0).unwrap().is_none());
    assert_eq!(s.queue().len(), 1);
}

struct RecordingEnv {
    lookups: RefCell<Vec<String>>,
}

impl Environment for RecordingEnv {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.lookups.borrow_mut().push(name.to_string());
        Some(1.0)
    }
}

#[test]
fn test_hostile_expressions_touch_nothing() {
    let hostile = [
        "__import__('os')",
        "open('/etc/passwd')",
        "math.sin(1)",
        "lambda: 1",
        "[x for x in y]",
        "x.__class__",
        "exec(1)",
        "getattr(x, y)",
        "x = 1",
        "a; b",
        "f(1)(2)",
    ];
    for src in hostile {
        let env = RecordingEnv {
            lookups: RefCell::new(Vec::new()),
        };
        let result = Expression::parse(src).and_then(|e| e.eval(&env));
        assert!(result.is_err(), "`{src}` was accepted");
        assert!(env.lookups.borrow().is_empty(), "`{src}` read the environment");
    }
}

#[test]
fn test_expressions_read_only_their_identifiers() {
    let env = RecordingEnv {
        lookups: RefCell::new(Vec::new()),
    };
    let expr = Expression::parse("max(cputime, 2) * rate + min(1, 3)").unwrap();
    assert_eq!(expr.eval(&env).unwrap(), 3.0);
    let mut seen = env.lookups.into_inner();
    seen.sort();
    assert_eq!(seen, vec!["cputime".to_string(), "rate".to_string()]);
    assert_eq!(
        expr.identifiers().into_iter().collect::<Vec<_>>(),
        vec!["cputime".to_string(), "rate".to_string()]
    );
}
