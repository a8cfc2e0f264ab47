use std::collections::HashMap;
use types::{Constraints, Professor, ProfessorId, Subject, SubjectId};

/// Lectures per week: requested, else credits, else the default, kept
/// within the floor and cap.
pub fn lecture_target(s: &Subject, c: &Constraints) -> u32 {
    if !s.kind.has_lectures() {
        return 0;
    }
    let raw = if s.weekly_lecture_target > 0 {
        s.weekly_lecture_target
    } else if s.credits > 0 {
        s.credits
    } else {
        c.default_lectures
    };
    raw.max(c.lecture_floor).min(c.lecture_cap)
}

/// Labs per batch per week.
pub fn lab_target(s: &Subject, c: &Constraints) -> u32 {
    if !s.kind.has_labs() {
        return 0;
    }
    let raw = if s.weekly_lab_target > 0 {
        s.weekly_lab_target
    } else {
        c.default_labs
    };
    raw.min(c.lab_cap)
}

/// Eligible professors per subject, handed out round-robin.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    eligible: HashMap<SubjectId, Vec<ProfessorId>>,
    cursor: HashMap<SubjectId, usize>,
}

impl Roster {
    pub fn new(professors: &[Professor]) -> Self {
        let mut eligible: HashMap<SubjectId, Vec<ProfessorId>> = HashMap::new();
        for p in professors {
            for s in &p.subjects {
                let list = eligible.entry(s.clone()).or_default();
                if !list.contains(&p.id) {
                    list.push(p.id.clone());
                }
            }
        }
        Self {
            eligible,
            cursor: HashMap::new(),
        }
    }

    /// Professors to try for `subject`, starting at the cursor. A subject
    /// nobody teaches yields a single `None`.
    pub fn candidates(&self, subject: &SubjectId) -> Vec<Option<ProfessorId>> {
        let Some(list) = self.eligible.get(subject).filter(|l| !l.is_empty()) else {
            return vec![None];
        };
        let start = self.cursor.get(subject).copied().unwrap_or(0);
        (0..list.len())
            .map(|k| Some(list[(start + k) % list.len()].clone()))
            .collect()
    }

    /// Moves the cursor past `used`.
    pub fn commit(&mut self, subject: &SubjectId, used: Option<&ProfessorId>) {
        let (Some(list), Some(used)) = (self.eligible.get(subject), used) else {
            return;
        };
        if let Some(pos) = list.iter().position(|p| p == used) {
            self.cursor.insert(subject.clone(), (pos + 1) % list.len());
        }
    }
}
