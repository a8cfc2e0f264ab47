pub mod config;
pub mod conflicts;
pub mod index;
pub mod slots;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

pub use config::ConfigError;
pub use conflicts::{audit, validate, ConflictDetector};
pub use index::{EntryHandle, LabTriple, ScheduleIndex};
pub use slots::SlotTemplate;
pub use types::{
    Batch, CohortKey, ConflictRecord, Constraints, GenerateOutcome, GenerateRequest, Professor,
    ScheduleEntry, Subject,
};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no subjects found for cohort {0}")]
    NoSubjects(CohortKey),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Structural checks on a generation request. All problems are collected
/// and reported together.
pub fn validate_request(req: &GenerateRequest) -> Result<(), GenerateError> {
    if req.subjects.is_empty() {
        return Err(GenerateError::NoSubjects(req.cohort()));
    }
    config::check(&req.constraints)?;

    let mut errors: Vec<String> = Vec::new();

    fn chk_unique<I: ToString>(name: &str, ids: impl Iterator<Item = I>, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for id in ids {
            let s = id.to_string();
            if !seen.insert(s.clone()) {
                errors.push(format!("duplicate {name} id: {s}"));
            }
        }
    }
    chk_unique("subject", req.subjects.iter().map(|s| &s.id), &mut errors);
    chk_unique("professor", req.professors.iter().map(|p| &p.id), &mut errors);
    chk_unique("batch", req.batches.iter().map(|b| &b.id), &mut errors);

    let subjects: HashSet<_> = req.subjects.iter().map(|s| &s.id).collect();
    for p in &req.professors {
        for sid in &p.subjects {
            if !subjects.contains(sid) {
                errors.push(format!(
                    "professor {} references unknown subject {}",
                    p.id, sid
                ));
            }
        }
    }

    for s in &req.subjects {
        if s.semester != req.semester {
            errors.push(format!(
                "subject {} belongs to semester {}, not {}",
                s.code, s.semester, req.semester
            ));
        }
    }

    let mut numbers = HashSet::new();
    for b in &req.batches {
        if b.branch_id != req.branch || b.semester != req.semester {
            errors.push(format!("batch {} belongs to another cohort", b.id));
        }
        if !(b.batch_number == 1 || b.batch_number == 2) {
            errors.push(format!(
                "batch {} has invalid number {}",
                b.id, b.batch_number
            ));
        } else if !numbers.insert(b.batch_number) {
            errors.push(format!("batch number {} given twice", b.batch_number));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(GenerateError::InvalidInput(errors.join("; ")))
    }
}

/// JSON schema of [`GenerateRequest`] for the services that build requests.
pub fn request_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(GenerateRequest)
}

#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(&self, req: GenerateRequest) -> anyhow::Result<GenerateOutcome>;
}
