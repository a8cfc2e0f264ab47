//! Greedy timetable generation for one cohort.
//!
//! Phases run in a fixed order on a private [`ScheduleIndex`]: reserved
//! hours, lectures, labs, then the reconciler. The result is checked by the
//! conflict detector, and any blocking finding leaves the run unaccepted.

mod labs;
mod plan;
pub mod reconcile;
pub mod roster;
mod theory;

use async_trait::async_trait;
use plan::Plan;
use sched_core::{audit, validate_request, GenerateError, Solver};
use tracing::{debug, info, warn};
use types::{
    Batch, BatchId, Day, EntryKind, GenerateOutcome, GenerateRequest, Scope,
};

pub use reconcile::reconcile;
pub use sched_core::ScheduleIndex;

pub struct GreedySolver;

impl GreedySolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GreedySolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Solver for GreedySolver {
    async fn solve(&self, req: GenerateRequest) -> anyhow::Result<GenerateOutcome> {
        Ok(generate(&req)?)
    }
}

pub fn generate(req: &GenerateRequest) -> Result<GenerateOutcome, GenerateError> {
    validate_request(req)?;
    let cohort = req.cohort();
    let c = &req.constraints;
    info!(
        %cohort,
        subjects = req.subjects.len(),
        external = req.external.len(),
        "generating timetable"
    );

    let batches = ensure_batches(req);
    let mut plan = Plan::new(cohort.clone(), c, &req.professors);
    let others: Vec<_> = req
        .external
        .iter()
        .filter(|e| e.cohort != cohort)
        .cloned()
        .collect();
    plan.index.seed_external(others.iter().cloned());

    place_reserved(&mut plan, req.semester);
    theory::schedule(&mut plan, &req.subjects);
    labs::schedule(&mut plan, &req.subjects, &batches);
    let fixes = reconcile(&mut plan.index, c);

    let Plan {
        index,
        mut conflicts,
        ..
    } = plan;
    let entries = index.into_entries();

    conflicts.extend(audit(&cohort, &entries, &others, c));

    let blocking = conflicts.iter().filter(|r| r.is_blocking()).count();
    let accepted = blocking == 0;
    if accepted {
        info!(%cohort, entries = entries.len(), conflicts = conflicts.len(), "timetable accepted");
    } else {
        warn!(%cohort, blocking, "timetable rejected");
    }

    let count = |k: EntryKind| entries.iter().filter(|e| e.kind == k).count();
    let stats = serde_json::json!({
        "method": "greedy",
        "theory": count(EntryKind::Theory),
        "labs": count(EntryKind::Lab),
        "reserved": entries.iter().filter(|e| e.kind.is_reserved()).count(),
        "fixes": fixes.len(),
        "conflicts": conflicts.len(),
        "blocking": blocking,
        "external": others.len(),
    });

    Ok(GenerateOutcome {
        cohort,
        accepted,
        entries,
        conflicts,
        fixes,
        stats,
    })
}

/// The cohort's two batches, ordered A then B. Missing ones get stable ids.
pub fn ensure_batches(req: &GenerateRequest) -> Vec<Batch> {
    (1..=2u8)
        .map(|n| {
            req.batches
                .iter()
                .find(|b| b.batch_number == n)
                .cloned()
                .unwrap_or_else(|| {
                    let id = BatchId(format!("{}-S{}-B{n}", req.branch, req.semester));
                    debug!(batch = %id, "synthesised missing batch");
                    Batch {
                        id,
                        branch_id: req.branch.clone(),
                        semester: req.semester,
                        batch_number: n,
                    }
                })
        })
        .collect()
}

fn place_reserved(plan: &mut Plan<'_>, semester: u8) {
    let c = plan.constraints;
    let mut reserved = Vec::new();
    for day in Day::ALL {
        for (kind, w) in c.breaks() {
            reserved.push((kind, day, w));
        }
    }
    reserved.push((EntryKind::Library, c.library_day, c.reserved_hour()));
    if semester >= c.project_min_semester {
        reserved.push((EntryKind::Project, c.project_day, c.reserved_hour()));
    }
    for (kind, day, w) in reserved {
        let e = plan.entry(kind, day, w, None, None, Scope::Common);
        plan.index.insert(e);
    }
    debug!(entries = plan.index.len(), "reserved hours placed");
}
