use crate::roster::Roster;
use sched_core::{ScheduleIndex, SlotTemplate};
use types::{
    CohortKey, ConflictRecord, Constraints, Day, EntryId, EntryKind, Professor, ProfessorId,
    ScheduleEntry, Scope, Subject, Window,
};

/// Working state of one generation run.
pub(crate) struct Plan<'a> {
    pub cohort: CohortKey,
    pub constraints: &'a Constraints,
    pub template: SlotTemplate,
    pub index: ScheduleIndex,
    pub roster: Roster,
    pub conflicts: Vec<ConflictRecord>,
}

impl<'a> Plan<'a> {
    pub fn new(cohort: CohortKey, constraints: &'a Constraints, professors: &[Professor]) -> Self {
        Self {
            cohort,
            constraints,
            template: SlotTemplate::new(constraints),
            index: ScheduleIndex::new(),
            roster: Roster::new(professors),
            conflicts: Vec::new(),
        }
    }

    pub fn entry(
        &self,
        kind: EntryKind,
        day: Day,
        w: Window,
        subject: Option<&Subject>,
        professor: Option<ProfessorId>,
        scope: Scope,
    ) -> ScheduleEntry {
        ScheduleEntry {
            id: EntryId::fresh(),
            cohort: self.cohort.clone(),
            day,
            start: w.start,
            end: w.end,
            kind,
            subject_id: subject.map(|s| s.id.clone()),
            subject_code: subject.map(|s| s.code.clone()),
            professor_id: professor,
            scope,
        }
    }

    /// First eligible professor free during `w`, in round-robin order.
    /// `Some(None)` means the subject has nobody assigned and runs unstaffed.
    pub fn free_professor(
        &self,
        subject: &Subject,
        day: Day,
        w: Window,
    ) -> Option<Option<ProfessorId>> {
        self.roster
            .candidates(&subject.id)
            .into_iter()
            .find(|p| match p {
                Some(p) => !self.index.professor_busy(p, day, w),
                None => true,
            })
    }

    /// Lectures and labs of this cohort already on `day`.
    pub fn day_load(&self, day: Day) -> usize {
        self.index
            .iter()
            .filter(|(_, e)| e.day == day && e.kind.is_class())
            .count()
    }
}
