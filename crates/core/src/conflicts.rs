//! Read-only conflict detection over a set of schedule entries.
//!
//! Used as the acceptance gate at the end of a generation run and to audit
//! schedules that are already committed. Entries may span several cohorts;
//! professor and lab-capacity checks are institution-wide, everything else
//! is per cohort.

use crate::slots::{session_fits, SlotTemplate};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use types::{
    CohortKey, ConflictKind, ConflictRecord, Constraints, EntryId, EntryKind, ScheduleEntry, Scope,
};

/// Runs every check against `entries` with default expectations.
pub fn validate(entries: &[ScheduleEntry], constraints: &Constraints) -> Vec<ConflictRecord> {
    ConflictDetector::new(constraints).run(entries)
}

/// Checks one cohort's entries against everything committed elsewhere.
/// Other cohorts count towards professor and lab-capacity checks, but only
/// findings that touch `cohort` are returned.
pub fn audit(
    cohort: &CohortKey,
    own: &[ScheduleEntry],
    others: &[ScheduleEntry],
    constraints: &Constraints,
) -> Vec<ConflictRecord> {
    let ids: HashSet<&EntryId> = own.iter().map(|e| &e.id).collect();
    let mut all = own.to_vec();
    all.extend(others.iter().filter(|e| &e.cohort != cohort).cloned());
    ConflictDetector::new(constraints)
        .with_cohort(cohort.clone())
        .run(&all)
        .into_iter()
        .filter(|r| {
            r.cohort.as_ref() == Some(cohort) || r.entries.iter().any(|id| ids.contains(id))
        })
        .collect()
}

pub struct ConflictDetector<'a> {
    constraints: &'a Constraints,
    expected: BTreeSet<CohortKey>,
    records: Vec<ConflictRecord>,
    seen: HashSet<String>,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(constraints: &'a Constraints) -> Self {
        Self {
            constraints,
            expected: BTreeSet::new(),
            records: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Flags `cohort` as empty even when `entries` has nothing for it.
    pub fn with_cohort(mut self, cohort: CohortKey) -> Self {
        self.expected.insert(cohort);
        self
    }

    pub fn run(mut self, entries: &[ScheduleEntry]) -> Vec<ConflictRecord> {
        let mut ids = HashSet::new();
        let entries: Vec<&ScheduleEntry> = entries
            .iter()
            .filter(|e| ids.insert(e.id.clone()))
            .collect();

        self.professor_clashes(&entries);
        self.cohort_clashes(&entries);
        self.lab_capacity(&entries);
        self.break_spans(&entries);
        self.lab_spacing(&entries);
        self.batches_simultaneous(&entries);
        self.excessive_sessions(&entries);
        self.utilization(&entries);
        self.empty_schedules(&entries);
        self.records
    }

    fn push(&mut self, who: &str, labels: [&str; 2], record: ConflictRecord) {
        let key = format!("{:?}|{who}|{}|{}", record.kind, labels[0], labels[1]);
        if self.seen.insert(key) {
            self.records.push(record);
        }
    }

    fn professor_clashes(&mut self, entries: &[&ScheduleEntry]) {
        let mut groups: BTreeMap<_, Vec<&ScheduleEntry>> = BTreeMap::new();
        for e in entries.iter().copied().filter(|e| e.kind.is_class()) {
            if let Some(p) = &e.professor_id {
                groups.entry((p, e.day)).or_default().push(e);
            }
        }
        for ((prof, _), group) in groups {
            for (a, b) in overlapping_pairs(&group) {
                let (la, lb) = (a.label(), b.label());
                let record = ConflictRecord::new(
                    ConflictKind::ProfessorClash,
                    format!("professor {prof} double-booked: {la} and {lb}"),
                )
                .with_entries([a, b])
                .with_cohort(a.cohort.clone())
                .with_professor(prof.clone());
                self.push(&prof.0, [&la, &lb], record);
            }
        }
    }

    fn cohort_clashes(&mut self, entries: &[&ScheduleEntry]) {
        let mut groups: BTreeMap<_, Vec<&ScheduleEntry>> = BTreeMap::new();
        for e in entries.iter().copied() {
            groups.entry((&e.cohort, e.day)).or_default().push(e);
        }
        for ((cohort, _), group) in groups {
            for (a, b) in overlapping_pairs(&group) {
                if !a.scope.intersects(&b.scope) {
                    continue;
                }
                let (la, lb) = (a.label(), b.label());
                let (kind, scope) = match (a.kind.is_class(), b.kind.is_class()) {
                    (true, true) => {
                        let narrow = if a.scope == Scope::Common { &b.scope } else { &a.scope };
                        (ConflictKind::BatchClash, narrow.clone())
                    }
                    // Breaks are covered by the break-span rule.
                    (true, false) if matches!(b.kind, EntryKind::Library | EntryKind::Project) => {
                        (ConflictKind::ReservedSlotClash, a.scope.clone())
                    }
                    (false, true) if matches!(a.kind, EntryKind::Library | EntryKind::Project) => {
                        (ConflictKind::ReservedSlotClash, b.scope.clone())
                    }
                    _ => continue,
                };
                let record = ConflictRecord::new(
                    kind,
                    format!("{cohort} {scope} double-booked: {la} and {lb}"),
                )
                .with_entries([a, b])
                .with_cohort(cohort.clone())
                .with_scope(scope.clone());
                self.push(&format!("{cohort}|{scope}"), [&la, &lb], record);
            }
        }
    }

    fn lab_capacity(&mut self, entries: &[&ScheduleEntry]) {
        let cap = self.constraints.lab_capacity as usize;
        let mut usage: BTreeMap<_, Vec<&ScheduleEntry>> = BTreeMap::new();
        for e in entries.iter().copied().filter(|e| e.kind == EntryKind::Lab) {
            usage.entry((e.day, e.start, e.end)).or_default().push(e);
        }
        for ((day, start, end), labs) in usage {
            if labs.len() <= cap {
                continue;
            }
            let slot = format!("{day} {start}-{end}");
            let record = ConflictRecord::new(
                ConflictKind::LabCapacityExceeded,
                format!("{} labs at {slot}, capacity is {cap}", labs.len()),
            )
            .with_entries(labs.iter().copied());
            self.push(&slot, ["", ""], record);
        }
    }

    fn break_spans(&mut self, entries: &[&ScheduleEntry]) {
        for e in entries.iter().copied().filter(|e| e.kind.is_class()) {
            if session_fits(e.kind, e.window(), self.constraints) {
                continue;
            }
            let label = e.label();
            let record = ConflictRecord::new(
                ConflictKind::BreakSpan,
                format!("{label} spans a break"),
            )
            .with_entries([e])
            .with_cohort(e.cohort.clone())
            .with_scope(e.scope.clone());
            self.push(&e.cohort.to_string(), [&label, ""], record);
        }
    }

    fn lab_spacing(&mut self, entries: &[&ScheduleEntry]) {
        let gap = self.constraints.min_lab_day_gap;
        let mut groups: BTreeMap<_, Vec<&ScheduleEntry>> = BTreeMap::new();
        for e in entries.iter().copied().filter(|e| e.kind == EntryKind::Lab) {
            groups
                .entry((&e.cohort, &e.subject_id, &e.scope))
                .or_default()
                .push(e);
        }
        for ((cohort, subject, scope), mut labs) in groups {
            labs.sort_by_key(|e| (e.day, e.start));
            for pair in labs.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if b.day.index() - a.day.index() >= gap {
                    continue;
                }
                let (la, lb) = (a.label(), b.label());
                let mut record = ConflictRecord::new(
                    ConflictKind::LabSpacing,
                    format!("labs for {scope} less than {gap} days apart: {la} and {lb}"),
                )
                .with_entries([a, b])
                .with_cohort(cohort.clone())
                .with_scope(scope.clone());
                if let Some(s) = subject {
                    record = record.with_subject(s.clone());
                }
                self.push(&format!("{cohort}|{scope}"), [&la, &lb], record);
            }
        }
    }

    fn batches_simultaneous(&mut self, entries: &[&ScheduleEntry]) {
        let mut groups: BTreeMap<_, Vec<&ScheduleEntry>> = BTreeMap::new();
        for e in entries.iter().copied().filter(|e| e.kind == EntryKind::Lab) {
            if let Some(s) = &e.subject_id {
                groups
                    .entry((&e.cohort, s, e.day, e.start, e.end))
                    .or_default()
                    .push(e);
            }
        }
        for ((cohort, subject, ..), labs) in groups {
            let batches: BTreeSet<_> = labs.iter().filter_map(|e| e.scope.batch()).collect();
            if batches.len() < 2 {
                continue;
            }
            let label = labs[0].label();
            let record = ConflictRecord::new(
                ConflictKind::BatchesSimultaneous,
                format!("both batches of {cohort} in the same lab: {label}"),
            )
            .with_entries(labs.iter().copied())
            .with_cohort(cohort.clone())
            .with_subject(subject.clone());
            self.push(&cohort.to_string(), [&label, ""], record);
        }
    }

    fn excessive_sessions(&mut self, entries: &[&ScheduleEntry]) {
        let limit = self.constraints.excessive_session_threshold;
        let mut groups: BTreeMap<_, Vec<&ScheduleEntry>> = BTreeMap::new();
        for e in entries.iter().copied().filter(|e| e.kind.is_class()) {
            if let Some(s) = &e.subject_id {
                groups
                    .entry((&e.cohort, s, e.kind.as_str(), &e.scope))
                    .or_default()
                    .push(e);
            }
        }
        for ((cohort, subject, kind, scope), group) in groups {
            if group.len() <= limit {
                continue;
            }
            let code = group[0].subject_code.as_deref().unwrap_or(&subject.0);
            let record = ConflictRecord::new(
                ConflictKind::ExcessiveSessions,
                format!(
                    "{code} has {} {kind} sessions for {scope} this week",
                    group.len()
                ),
            )
            .with_entries(group.iter().copied())
            .with_cohort(cohort.clone())
            .with_subject(subject.clone())
            .with_scope(scope.clone());
            self.push(&format!("{cohort}|{scope}"), [code, kind], record);
        }
    }

    fn utilization(&mut self, entries: &[&ScheduleEntry]) {
        let template = SlotTemplate::new(self.constraints);
        let grid = template.grid_size();
        if grid == 0 {
            return;
        }
        let mut by_cohort: BTreeMap<&CohortKey, Vec<&ScheduleEntry>> = BTreeMap::new();
        for e in entries.iter().copied() {
            by_cohort.entry(&e.cohort).or_default().push(e);
        }
        for (cohort, group) in by_cohort {
            if !group.iter().any(|e| e.kind.is_class()) {
                continue;
            }
            let empty = template
                .theory_slots()
                .filter(|s| {
                    !group.iter().any(|e| {
                        !matches!(e.kind, EntryKind::Break | EntryKind::Recess)
                            && e.day == s.day
                            && e.window().overlaps(&s.window())
                    })
                })
                .count();
            let pct = ((empty * 200 + grid) / (2 * grid)) as u32;
            let kind = if pct > self.constraints.low_utilization_pct {
                ConflictKind::LowUtilization
            } else if pct > self.constraints.moderate_utilization_pct {
                ConflictKind::ModerateUtilization
            } else {
                continue;
            };
            let record = ConflictRecord::new(
                kind,
                format!("{cohort}: {empty} of {grid} teaching slots empty ({pct}%)"),
            )
            .with_cohort(cohort.clone());
            self.push(&cohort.to_string(), ["", ""], record);
        }
    }

    fn empty_schedules(&mut self, entries: &[&ScheduleEntry]) {
        let mut cohorts = std::mem::take(&mut self.expected);
        cohorts.extend(entries.iter().map(|e| e.cohort.clone()));
        for cohort in cohorts {
            let has_classes = entries
                .iter()
                .any(|e| e.cohort == cohort && e.kind.is_class());
            if has_classes {
                continue;
            }
            let record = ConflictRecord::new(
                ConflictKind::EmptySchedule,
                format!("{cohort} has no lectures or labs"),
            )
            .with_cohort(cohort.clone());
            self.push(&cohort.to_string(), ["", ""], record);
        }
    }
}

/// Overlapping pairs within one day's group, in start order.
fn overlapping_pairs<'e>(
    group: &[&'e ScheduleEntry],
) -> Vec<(&'e ScheduleEntry, &'e ScheduleEntry)> {
    let mut sorted = group.to_vec();
    sorted.sort_by_key(|e| (e.start, e.end));
    let mut pairs = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            if b.start >= a.end {
                break;
            }
            pairs.push((*a, *b));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{ClockTime, Day, Severity};

    fn at(h: u16, m: u16) -> ClockTime {
        ClockTime::from_hm(h, m)
    }

    fn class(
        id: &str,
        kind: EntryKind,
        day: Day,
        start: ClockTime,
        subject: &str,
        prof: &str,
        scope: Scope,
    ) -> ScheduleEntry {
        let mins = if kind == EntryKind::Lab { 120 } else { 60 };
        ScheduleEntry {
            id: EntryId(id.into()),
            cohort: CohortKey::new("CE", 3),
            day,
            start,
            end: start.plus(mins),
            kind,
            subject_id: Some(subject.into()),
            subject_code: Some(subject.to_uppercase()),
            professor_id: Some(prof.into()),
            scope,
        }
    }

    fn batch(id: &str) -> Scope {
        Scope::Batch(id.into())
    }

    fn kinds(records: &[ConflictRecord]) -> Vec<ConflictKind> {
        records.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn professor_double_booking_across_cohorts() {
        let c = Constraints::default();
        let a = class("1", EntryKind::Theory, Day::Mon, at(9, 0), "ds", "p1", Scope::Common);
        let mut b = class("2", EntryKind::Lab, Day::Mon, at(9, 0), "os", "p1", batch("x"));
        b.cohort = CohortKey::new("IT", 5);
        let out = validate(&[a, b], &c);
        let clash: Vec<_> = out
            .iter()
            .filter(|r| r.kind == ConflictKind::ProfessorClash)
            .collect();
        assert_eq!(clash.len(), 1);
        assert!(clash[0].is_blocking());
        assert_eq!(clash[0].entries.len(), 2);
    }

    #[test]
    fn common_lecture_clashes_with_batch_lab() {
        let c = Constraints::default();
        let lab = class("1", EntryKind::Lab, Day::Tue, at(14, 0), "os", "p1", batch("a"));
        let lec = class("2", EntryKind::Theory, Day::Tue, at(15, 0), "ds", "p2", Scope::Common);
        let other = class("3", EntryKind::Lab, Day::Tue, at(14, 0), "cn", "p3", batch("b"));
        let out = validate(&[lab, lec, other], &c);
        let clashes: Vec<_> = out
            .iter()
            .filter(|r| r.kind == ConflictKind::BatchClash)
            .collect();
        assert_eq!(clashes.len(), 2);
        assert!(clashes.iter().all(|r| r.severity == Severity::Critical));
    }

    #[test]
    fn lecture_in_library_hour_is_reserved_clash() {
        let c = Constraints::default();
        let lib = ScheduleEntry {
            id: EntryId("lib".into()),
            cohort: CohortKey::new("CE", 3),
            day: Day::Fri,
            start: at(16, 0),
            end: at(17, 0),
            kind: EntryKind::Library,
            subject_id: None,
            subject_code: None,
            professor_id: None,
            scope: Scope::Common,
        };
        let lec = class("1", EntryKind::Theory, Day::Fri, at(16, 0), "ds", "p1", Scope::Common);
        let out = validate(&[lib, lec], &c);
        assert!(kinds(&out).contains(&ConflictKind::ReservedSlotClash));
    }

    #[test]
    fn sixth_lab_in_one_triple_exceeds_capacity() {
        let c = Constraints::default();
        let labs: Vec<_> = (0..6)
            .map(|i| {
                let mut e = class(
                    &format!("l{i}"),
                    EntryKind::Lab,
                    Day::Mon,
                    at(9, 0),
                    "os",
                    &format!("p{i}"),
                    Scope::Batch(format!("b{i}").as_str().into()),
                );
                e.cohort = CohortKey::new(format!("BR{i}"), 3);
                e
            })
            .collect();
        let out = validate(&labs, &c);
        let over: Vec<_> = out
            .iter()
            .filter(|r| r.kind == ConflictKind::LabCapacityExceeded)
            .collect();
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].entries.len(), 6);
        assert!(validate(&labs[..5], &c)
            .iter()
            .all(|r| r.kind != ConflictKind::LabCapacityExceeded));
    }

    #[test]
    fn labs_on_adjacent_days_are_flagged() {
        let c = Constraints::default();
        let a = batch("a");
        let mon = class("1", EntryKind::Lab, Day::Mon, at(9, 0), "os", "p1", a.clone());
        let tue = class("2", EntryKind::Lab, Day::Tue, at(9, 0), "os", "p1", a.clone());
        let thu = class("3", EntryKind::Lab, Day::Thu, at(9, 0), "os", "p1", a);
        let out = validate(&[mon.clone(), tue], &c);
        assert!(kinds(&out).contains(&ConflictKind::LabSpacing));
        let out = validate(&[mon, thu], &c);
        assert!(!kinds(&out).contains(&ConflictKind::LabSpacing));
    }

    #[test]
    fn both_batches_in_one_lab_warns() {
        let c = Constraints::default();
        let a = class("1", EntryKind::Lab, Day::Wed, at(11, 15), "os", "p1", batch("a"));
        let b = class("2", EntryKind::Lab, Day::Wed, at(11, 15), "os", "p2", batch("b"));
        let out = validate(&[a, b], &c);
        let r = out
            .iter()
            .find(|r| r.kind == ConflictKind::BatchesSimultaneous)
            .unwrap();
        assert!(!r.is_blocking());
        assert_eq!(r.severity, Severity::Warning);
    }

    #[test]
    fn duplicate_ids_are_reported_once() {
        let c = Constraints::default();
        let a = class("1", EntryKind::Theory, Day::Mon, at(9, 0), "ds", "p1", Scope::Common);
        let b = class("2", EntryKind::Theory, Day::Mon, at(9, 0), "os", "p1", Scope::Common);
        let out = validate(&[a.clone(), b.clone(), a, b], &c);
        let n = out
            .iter()
            .filter(|r| r.kind == ConflictKind::ProfessorClash)
            .count();
        assert_eq!(n, 1);
    }

    #[test]
    fn lab_across_recess_spans_a_break() {
        let c = Constraints::default();
        let lab = class("1", EntryKind::Lab, Day::Mon, at(12, 15), "os", "p1", batch("a"));
        assert!(kinds(&validate(&[lab], &c)).contains(&ConflictKind::BreakSpan));
    }

    #[test]
    fn sparse_week_is_low_utilization() {
        let c = Constraints::default();
        let one = class("1", EntryKind::Theory, Day::Mon, at(9, 0), "ds", "p1", Scope::Common);
        let out = validate(&[one], &c);
        assert!(kinds(&out).contains(&ConflictKind::LowUtilization));
        assert!(out.iter().all(|r| !r.is_blocking()));
    }

    #[test]
    fn utilization_percentage_is_rounded() {
        let mut c = Constraints::default();
        c.low_utilization_pct = 42;
        // 20 of the 35 weekly theory slots taken: 15 empty is 42.86%.
        let week: Vec<_> = SlotTemplate::new(&c)
            .theory_slots()
            .take(20)
            .enumerate()
            .map(|(i, s)| {
                let code = format!("s{i}");
                let id = i.to_string();
                class(&id, EntryKind::Theory, s.day, s.start, &code, &code, Scope::Common)
            })
            .collect();
        let out = validate(&week, &c);
        let r = out
            .iter()
            .find(|r| r.kind == ConflictKind::LowUtilization)
            .unwrap();
        assert!(r.description.contains("15 of 35"));
        assert!(r.description.contains("(43%)"));
    }

    #[test]
    fn audit_reports_only_own_findings() {
        let c = Constraints::default();
        let lec = EntryKind::Theory;
        let own = vec![class("1", lec, Day::Mon, at(9, 0), "ds", "p1", Scope::Common)];
        let mut other = class("2", lec, Day::Mon, at(9, 30), "os", "p1", Scope::Common);
        other.cohort = CohortKey::new("IT", 5);
        let mut lonely = class("3", lec, Day::Fri, at(9, 0), "cn", "p9", Scope::Common);
        lonely.cohort = CohortKey::new("ME", 1);

        let out = audit(&CohortKey::new("CE", 3), &own, &[other, lonely], &c);
        assert!(kinds(&out).contains(&ConflictKind::ProfessorClash));
        assert!(out
            .iter()
            .all(|r| r.cohort == Some(CohortKey::new("CE", 3))
                || r.kind == ConflictKind::ProfessorClash));
    }

    #[test]
    fn expected_cohort_without_classes_is_empty() {
        let c = Constraints::default();
        let out = ConflictDetector::new(&c)
            .with_cohort(CohortKey::new("CE", 3))
            .run(&[]);
        assert_eq!(kinds(&out), vec![ConflictKind::EmptySchedule]);
        assert!(out[0].is_blocking());
    }
}
