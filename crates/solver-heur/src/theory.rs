//! Lecture placement: at most one lecture per subject per day, on the
//! least-loaded days first.

use crate::plan::Plan;
use crate::roster::lecture_target;
use sched_core::slots::session_fits;
use sched_core::EntryHandle;
use std::cmp::Reverse;
use tracing::{debug, info, warn};
use types::{ConflictKind, ConflictRecord, Day, EntryKind, Scope, Subject};

pub(crate) fn schedule(plan: &mut Plan<'_>, subjects: &[Subject]) {
    let mut order: Vec<(&Subject, u32)> = subjects
        .iter()
        .map(|s| (s, lecture_target(s, plan.constraints)))
        .filter(|(_, t)| *t > 0)
        .collect();
    order.sort_by_key(|(_, t)| Reverse(*t));

    for (subject, target) in order {
        let mut placed = place(plan, subject, target);
        let floor = plan.constraints.lecture_floor;
        if (placed.len() as u32) < target && target > floor {
            for h in placed.drain(..) {
                plan.index.remove(h);
            }
            debug!(
                subject = %subject.code,
                target = target - 1,
                "retrying lectures with a lower target"
            );
            placed = place(plan, subject, target - 1);
        }

        let n = placed.len() as u32;
        info!(subject = %subject.code, placed = n, target, "lectures placed");
        let record = if n < floor {
            warn!(subject = %subject.code, placed = n, "lecture shortfall");
            ConflictRecord::new(
                ConflictKind::LectureShortfall,
                format!("{}: only {n} of {target} lectures could be placed", subject.code),
            )
        } else if n < target {
            ConflictRecord::new(
                ConflictKind::LectureBelowTarget,
                format!("{}: {n} of {target} lectures placed", subject.code),
            )
        } else {
            continue;
        };
        plan.conflicts.push(
            record
                .with_cohort(plan.cohort.clone())
                .with_subject(subject.id.clone())
                .with_scope(Scope::Common),
        );
    }
}

fn place(plan: &mut Plan<'_>, subject: &Subject, target: u32) -> Vec<EntryHandle> {
    let mut days = Day::ALL.to_vec();
    days.sort_by_key(|&d| (plan.day_load(d), d.index()));

    let mut placed = Vec::new();
    for day in days {
        if placed.len() as u32 >= target {
            break;
        }
        let slots: Vec<_> = plan
            .template
            .theory_slots()
            .filter(|s| s.day == day)
            .map(|s| s.window())
            .collect();
        for w in slots {
            if plan.index.overlapping(day, w).next().is_some()
                || !session_fits(EntryKind::Theory, w, plan.constraints)
            {
                continue;
            }
            let Some(professor) = plan.free_professor(subject, day, w) else {
                continue;
            };
            plan.roster.commit(&subject.id, professor.as_ref());
            let entry = plan.entry(
                EntryKind::Theory,
                day,
                w,
                Some(subject),
                professor,
                Scope::Common,
            );
            debug!(subject = %subject.code, %day, slot = %w, "lecture");
            placed.push(plan.index.insert(entry));
            break;
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use types::{CohortKey, Constraints, Professor, SubjectKind};

    fn subject(id: &str, lectures: u32) -> Subject {
        Subject {
            id: id.into(),
            code: id.to_uppercase(),
            name: id.into(),
            kind: SubjectKind::Theory,
            weekly_lecture_target: lectures,
            weekly_lab_target: 0,
            credits: 0,
            semester: 3,
        }
    }

    #[test]
    fn one_lecture_per_day() {
        let c = Constraints::default();
        let mut plan = Plan::new(CohortKey::new("CE", 3), &c, &[]);
        schedule(&mut plan, &[subject("ds", 4)]);

        let days: Vec<_> = plan.index.iter().map(|(_, e)| e.day).collect();
        assert_eq!(days.len(), 3);
        assert_eq!(days.iter().collect::<BTreeSet<_>>().len(), 3);
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn busy_professor_causes_shortfall() {
        let c = Constraints::default();
        let profs = vec![Professor {
            id: "p1".into(),
            name: "P".into(),
            subjects: vec!["ds".into()],
        }];
        let mut plan = Plan::new(CohortKey::new("CE", 3), &c, &profs);
        // Professor is booked all week elsewhere except one Monday hour.
        let other = CohortKey::new("IT", 5);
        let external: Vec<_> = plan
            .template
            .theory_slots()
            .filter(|s| !(s.day == Day::Mon && s.block == 1 && s.start.minutes() == 9 * 60))
            .map(|s| {
                let mut e = plan.entry(
                    EntryKind::Theory,
                    s.day,
                    s.window(),
                    None,
                    Some("p1".into()),
                    Scope::Common,
                );
                e.cohort = other.clone();
                e
            })
            .collect();
        plan.index.seed_external(external);

        schedule(&mut plan, &[subject("ds", 3)]);
        assert_eq!(plan.index.len(), 1);
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].kind, ConflictKind::LectureShortfall);
        assert!(!plan.conflicts[0].is_blocking());
    }
}
