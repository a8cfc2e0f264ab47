//! Repair pass run after placement. Any lecture still colliding with a
//! reserved hour or a lab is dropped; labs are never touched.

use sched_core::slots::session_fits;
use sched_core::ScheduleIndex;
use tracing::warn;
use types::{Constraints, EntryKind, Fix, ScheduleEntry};

type Rule = fn(&ScheduleEntry, &ScheduleEntry, &Constraints) -> Option<String>;

const PASSES: [Rule; 3] = [reserved_overlap, lab_overlap, professor_in_lab];

/// Library and project hours are exclusive. A break only evicts a lecture
/// that sits exactly on it or keeps too little teaching time around it.
fn reserved_overlap(
    lecture: &ScheduleEntry,
    other: &ScheduleEntry,
    c: &Constraints,
) -> Option<String> {
    let evicts = match other.kind {
        EntryKind::Library | EntryKind::Project => true,
        EntryKind::Break | EntryKind::Recess => {
            (lecture.start, lecture.end) == (other.start, other.end)
                || !session_fits(EntryKind::Theory, lecture.window(), c)
        }
        EntryKind::Theory | EntryKind::Lab => false,
    };
    evicts.then(|| format!("overlaps {} hour", other.kind))
}

fn lab_overlap(lecture: &ScheduleEntry, other: &ScheduleEntry, _: &Constraints) -> Option<String> {
    (other.kind == EntryKind::Lab && other.scope.intersects(&lecture.scope))
        .then(|| format!("overlaps lab {}", other.label()))
}

fn professor_in_lab(
    lecture: &ScheduleEntry,
    other: &ScheduleEntry,
    _: &Constraints,
) -> Option<String> {
    let shared = lecture.professor_id.is_some() && lecture.professor_id == other.professor_id;
    (other.kind == EntryKind::Lab && shared).then(|| {
        format!(
            "professor {} is teaching lab {}",
            other.professor_id.as_ref().map(|p| p.0.as_str()).unwrap_or("?"),
            other.label()
        )
    })
}

/// Removes lectures that break a hard rule and reports each removal.
pub fn reconcile(index: &mut ScheduleIndex, constraints: &Constraints) -> Vec<Fix> {
    let mut fixes = Vec::new();
    for rule in PASSES {
        for h in index.select(|e| e.kind == EntryKind::Theory) {
            let Some(lecture) = index.get(h) else {
                continue;
            };
            let cause = index
                .overlapping(lecture.day, lecture.window())
                .filter(|o| o.id != lecture.id)
                .find_map(|o| rule(lecture, o, constraints));
            let Some(cause) = cause else {
                continue;
            };
            if let Some(removed) = index.remove(h) {
                warn!(entry = %removed.label(), %cause, "removed lecture");
                fixes.push(Fix { removed, cause });
            }
        }
    }
    fixes
}
