use sched_core::validate;
use solver_heur::{generate, reconcile, ScheduleIndex};
use std::collections::BTreeSet;
use types::{
    BranchId, ClockTime, CohortKey, ConflictKind, Constraints, Day, EntryId, EntryKind,
    GenerateRequest, Professor, ScheduleEntry, Scope, Subject, SubjectKind,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn subject(id: &str, kind: SubjectKind, lectures: u32, labs: u32) -> Subject {
    Subject {
        id: id.into(),
        code: id.to_uppercase(),
        name: id.into(),
        kind,
        weekly_lecture_target: lectures,
        weekly_lab_target: labs,
        credits: 3,
        semester: 3,
    }
}

fn professor(id: &str, subjects: &[&str]) -> Professor {
    Professor {
        id: id.into(),
        name: id.to_uppercase(),
        subjects: subjects.iter().map(|s| (*s).into()).collect(),
    }
}

fn request(subjects: Vec<Subject>, professors: Vec<Professor>) -> GenerateRequest {
    GenerateRequest {
        branch: BranchId("CE".into()),
        semester: 3,
        subjects,
        professors,
        batches: vec![],
        constraints: Constraints::default(),
        external: vec![],
    }
}

fn of_kind<'a>(
    entries: &'a [ScheduleEntry],
    code: &str,
    kind: EntryKind,
) -> Vec<&'a ScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.kind == kind && e.subject_code.as_deref() == Some(code))
        .collect()
}

#[test]
fn four_requested_lectures_become_three_on_distinct_days() {
    init_tracing();
    let req = request(
        vec![subject("ds", SubjectKind::Theory, 4, 0)],
        vec![professor("p1", &["ds"])],
    );
    let out = generate(&req).unwrap();
    let lectures = of_kind(&out.entries, "DS", EntryKind::Theory);
    assert_eq!(lectures.len(), 3);
    let days: BTreeSet<Day> = lectures.iter().map(|e| e.day).collect();
    assert_eq!(days.len(), 3);
    assert!(out.accepted);
}

#[test]
fn lab_subject_gets_two_spaced_labs_per_batch() {
    init_tracing();
    let req = request(
        vec![subject("os", SubjectKind::Both, 0, 3)],
        vec![professor("p1", &["os"])],
    );
    let out = generate(&req).unwrap();
    let labs = of_kind(&out.entries, "OS", EntryKind::Lab);
    assert_eq!(labs.len(), 4);

    let scopes: BTreeSet<&Scope> = labs.iter().map(|e| &e.scope).collect();
    assert_eq!(scopes.len(), 2);
    for scope in scopes {
        let mut days: Vec<usize> = labs
            .iter()
            .filter(|e| &e.scope == scope)
            .map(|e| e.day.index())
            .collect();
        days.sort();
        assert_eq!(days.len(), 2);
        assert!(days[1] - days[0] >= 2, "labs too close: {days:?}");
    }
    assert_eq!(of_kind(&out.entries, "OS", EntryKind::Theory).len(), 3);
    assert!(out.accepted);
}

#[test]
fn shared_professor_is_never_double_booked() {
    init_tracing();
    let req = request(
        vec![
            subject("ds", SubjectKind::Theory, 3, 0),
            subject("os", SubjectKind::Both, 2, 2),
        ],
        vec![professor("p1", &["ds", "os"])],
    );
    let out = generate(&req).unwrap();
    assert!(out
        .conflicts
        .iter()
        .all(|r| r.kind != ConflictKind::ProfessorClash));

    let taught: Vec<_> = out
        .entries
        .iter()
        .filter(|e| e.professor_id.is_some())
        .collect();
    for (i, a) in taught.iter().enumerate() {
        for b in &taught[i + 1..] {
            assert!(!a.overlaps(b), "{} overlaps {}", a.label(), b.label());
        }
    }
    assert!(out.accepted);
}

#[test]
fn lecture_in_library_hour_is_reconciled() {
    init_tracing();
    let c = Constraints::default();
    let cohort = CohortKey::new("CE", 3);
    let mk = |kind, subject: Option<&str>| ScheduleEntry {
        id: EntryId::fresh(),
        cohort: cohort.clone(),
        day: Day::Fri,
        start: ClockTime::from_hm(16, 0),
        end: ClockTime::from_hm(17, 0),
        kind,
        subject_id: subject.map(Into::into),
        subject_code: subject.map(str::to_uppercase),
        professor_id: None,
        scope: Scope::Common,
    };
    let mut index = ScheduleIndex::new();
    index.insert(mk(EntryKind::Library, None));
    index.insert(mk(EntryKind::Theory, Some("ds")));

    let before: Vec<_> = index.iter().map(|(_, e)| e.clone()).collect();
    assert!(validate(&before, &c)
        .iter()
        .any(|r| r.kind == ConflictKind::ReservedSlotClash));

    let fixes = reconcile(&mut index, &c);
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].removed.subject_code.as_deref(), Some("DS"));

    let after = index.into_entries();
    assert_eq!(after.len(), 1);
    assert!(validate(&after, &c)
        .iter()
        .all(|r| r.kind != ConflictKind::ReservedSlotClash));
}

#[test]
fn sixth_lab_in_a_full_slot_is_deferred() {
    init_tracing();
    let monday_nine = |i: usize| ScheduleEntry {
        id: EntryId::fresh(),
        cohort: CohortKey::new(format!("BR{i}"), 3),
        day: Day::Mon,
        start: ClockTime::from_hm(9, 0),
        end: ClockTime::from_hm(11, 0),
        kind: EntryKind::Lab,
        subject_id: Some("x".into()),
        subject_code: Some("X".into()),
        professor_id: Some(format!("ext{i}").as_str().into()),
        scope: Scope::Batch(format!("BR{i}-S3-B1").as_str().into()),
    };
    let external: Vec<_> = (0..5).map(monday_nine).collect();

    let mut req = request(
        vec![subject("cn", SubjectKind::Lab, 0, 1)],
        vec![professor("p1", &["cn"])],
    );
    req.constraints.lab_start_preference = vec![ClockTime::from_hm(9, 0)];
    req.external = external.clone();

    let out = generate(&req).unwrap();
    let labs = of_kind(&out.entries, "CN", EntryKind::Lab);
    assert_eq!(labs.len(), 2);
    assert!(labs
        .iter()
        .all(|e| !(e.day == Day::Mon && e.start == ClockTime::from_hm(9, 0))));
    assert!(out.accepted);

    let mut everything = out.entries.clone();
    everything.extend(external);
    assert!(validate(&everything, &req.constraints)
        .iter()
        .all(|r| r.kind != ConflictKind::LabCapacityExceeded));

    // With room for one more the preferred slot is taken.
    req.constraints.lab_capacity = 6;
    let out = generate(&req).unwrap();
    assert!(of_kind(&out.entries, "CN", EntryKind::Lab)
        .iter()
        .any(|e| e.day == Day::Mon && e.start == ClockTime::from_hm(9, 0)));
}

#[test]
fn regeneration_is_a_full_replacement() {
    init_tracing();
    let req = request(
        vec![
            subject("ds", SubjectKind::Theory, 3, 0),
            subject("os", SubjectKind::Both, 2, 2),
        ],
        vec![professor("p1", &["ds"]), professor("p2", &["os"])],
    );
    let first = generate(&req).unwrap();
    let second = generate(&req).unwrap();
    assert_eq!(first.entries.len(), second.entries.len());

    let shape = |out: &types::GenerateOutcome| -> Vec<_> {
        out.entries
            .iter()
            .map(|e| (e.day, e.start, e.kind.as_str(), e.subject_code.clone(), e.scope.clone()))
            .collect()
    };
    assert_eq!(shape(&first), shape(&second));
    let ids: BTreeSet<_> = first.entries.iter().map(|e| &e.id).collect();
    assert!(second.entries.iter().all(|e| !ids.contains(&e.id)));
}

#[test]
fn own_cohort_in_external_list_is_ignored() {
    init_tracing();
    let mut req = request(vec![subject("ds", SubjectKind::Theory, 3, 0)], vec![]);
    let stale = generate(&req).unwrap().entries;
    req.external = stale;
    let out = generate(&req).unwrap();
    assert_eq!(of_kind(&out.entries, "DS", EntryKind::Theory).len(), 3);
    assert!(out.accepted);
}
