//! Lab placement per subject per batch.
//!
//! Each batch walks the week from Monday, keeping its labs for one subject
//! at least `min_lab_day_gap` days apart. Within a day, lab slots are tried
//! in the configured start preference; a slot where the sibling batch
//! already has this subject's lab goes last.

use crate::plan::Plan;
use crate::roster::lab_target;
use sched_core::slots::preference_rank;
use tracing::{debug, info, warn};
use types::{
    Batch, ConflictKind, ConflictRecord, Day, EntryKind, ProfessorId, Scope, Subject, TimeSlot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejected {
    OwnLecture,
    ProfessorBusy,
    LabFull,
    BatchBusy,
}

pub(crate) fn schedule(plan: &mut Plan<'_>, subjects: &[Subject], batches: &[Batch]) {
    for subject in subjects {
        let target = lab_target(subject, plan.constraints);
        if target == 0 {
            continue;
        }
        for batch in batches {
            let placed = place_for_batch(plan, subject, batch, target);
            info!(subject = %subject.code, batch = batch.label(), placed, target, "labs placed");

            let scope = Scope::Batch(batch.id.clone());
            let record = if placed == 0 {
                warn!(subject = %subject.code, batch = batch.label(), "no lab could be placed");
                ConflictRecord::new(
                    ConflictKind::LabShortfall,
                    format!("{}: no lab placed for batch {}", subject.code, batch.label()),
                )
            } else if placed < target {
                ConflictRecord::new(
                    ConflictKind::LabBelowTarget,
                    format!(
                        "{}: {placed} of {target} labs placed for batch {}",
                        subject.code,
                        batch.label()
                    ),
                )
            } else {
                continue;
            };
            plan.conflicts.push(
                record
                    .with_cohort(plan.cohort.clone())
                    .with_subject(subject.id.clone())
                    .with_scope(scope),
            );
        }
    }
}

fn place_for_batch(plan: &mut Plan<'_>, subject: &Subject, batch: &Batch, target: u32) -> u32 {
    let scope = Scope::Batch(batch.id.clone());
    let gap = plan.constraints.min_lab_day_gap;
    let mut placed = 0;
    let mut last: Option<Day> = None;

    for day in Day::ALL {
        if placed >= target {
            break;
        }
        if last.is_some_and(|l| day.index() - l.index() < gap) {
            continue;
        }
        for slot in ordered_slots(plan, subject, &scope, day) {
            let w = slot.window();
            match check(plan, subject, &scope, &slot) {
                Ok(professor) => {
                    plan.roster.commit(&subject.id, professor.as_ref());
                    let entry =
                        plan.entry(EntryKind::Lab, day, w, Some(subject), professor, scope.clone());
                    debug!(subject = %subject.code, batch = batch.label(), %day, slot = %w, "lab");
                    plan.index.insert(entry);
                    placed += 1;
                    last = Some(day);
                    break;
                }
                Err(why) => {
                    debug!(
                        subject = %subject.code,
                        batch = batch.label(),
                        %day,
                        slot = %w,
                        ?why,
                        "lab slot rejected"
                    );
                }
            }
        }
    }
    placed
}

fn ordered_slots(plan: &Plan<'_>, subject: &Subject, scope: &Scope, day: Day) -> Vec<TimeSlot> {
    let pref = &plan.constraints.lab_start_preference;
    let mut slots: Vec<TimeSlot> = plan.template.lab_slots_on(day).copied().collect();
    slots.sort_by_key(|s| {
        let sibling = plan.index.overlapping(day, s.window()).any(|e| {
            e.kind == EntryKind::Lab
                && e.subject_id.as_ref() == Some(&subject.id)
                && e.start == s.start
                && e.end == s.end
                && e.scope != *scope
        });
        (sibling, preference_rank(pref, s.start))
    });
    slots
}

fn check(
    plan: &Plan<'_>,
    subject: &Subject,
    scope: &Scope,
    slot: &TimeSlot,
) -> Result<Option<ProfessorId>, Rejected> {
    let (day, w) = (slot.day, slot.window());
    let own_lecture = plan
        .index
        .overlapping(day, w)
        .any(|e| e.kind == EntryKind::Theory && e.subject_id.as_ref() == Some(&subject.id));
    if own_lecture {
        return Err(Rejected::OwnLecture);
    }
    let professor = plan
        .free_professor(subject, day, w)
        .ok_or(Rejected::ProfessorBusy)?;
    if plan.index.lab_usage((day, slot.start, slot.end)) >= plan.constraints.lab_capacity {
        return Err(Rejected::LabFull);
    }
    if plan.index.scope_busy(scope, day, w) {
        return Err(Rejected::BatchBusy);
    }
    Ok(professor)
}
