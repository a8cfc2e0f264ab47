//! Loading and checking [`Constraints`].

use thiserror::Error;
use tracing::info;
use types::Constraints;

pub const LAB_CAPACITY_ENV: &str = "UNISCHEDULE__LAB_CAPACITY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed constraints: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid constraints: {0}")]
    Invalid(String),
}

pub fn from_json(s: &str) -> Result<Constraints, ConfigError> {
    let c: Constraints = serde_json::from_str(s)?;
    check(&c)?;
    Ok(c)
}

/// Applies `UNISCHEDULE__*` overrides read through `lookup`.
pub fn apply_overrides(
    c: &mut Constraints,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(LAB_CAPACITY_ENV) {
        let cap = raw.trim().parse::<u32>().map_err(|_| {
            ConfigError::Invalid(format!("{LAB_CAPACITY_ENV} is not a number: {raw}"))
        })?;
        info!(cap, "lab capacity overridden from environment");
        c.lab_capacity = cap;
    }
    check(c)
}

pub fn apply_env_overrides(c: &mut Constraints) -> Result<(), ConfigError> {
    apply_overrides(c, |k| std::env::var(k).ok())
}

/// The day must read college start, tea break, recess, reserved hour,
/// college end in that order.
pub fn check(c: &Constraints) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    let order = [
        ("collegeStart", c.college_start),
        ("teaBreak.start", c.tea_break.start),
        ("teaBreak.end", c.tea_break.end),
        ("recess.start", c.recess.start),
        ("recess.end", c.recess.end),
        ("reservedHourStart", c.reserved_hour_start),
        ("collegeEnd", c.college_end),
    ];
    for w in order.windows(2) {
        let ((a_name, a), (b_name, b)) = (w[0], w[1]);
        if a > b {
            errors.push(format!("{a_name} ({a}) is after {b_name} ({b})"));
        }
    }
    if c.college_start >= c.college_end {
        errors.push("college day is empty".into());
    }
    if c.lab_capacity == 0 {
        errors.push("labCapacity must be at least 1".into());
    }
    if c.lecture_floor > c.lecture_cap {
        errors.push(format!(
            "lectureFloor {} exceeds lectureCap {}",
            c.lecture_floor, c.lecture_cap
        ));
    }
    if c.library_day == c.project_day {
        errors.push(format!(
            "libraryDay and projectDay are both {}",
            c.library_day
        ));
    }
    if c.min_lab_day_gap == 0 {
        errors.push("minLabDayGap must be at least 1".into());
    }
    if c.low_utilization_pct < c.moderate_utilization_pct {
        errors.push("lowUtilizationPct must not be below moderateUtilizationPct".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(errors.join("; ")))
    }
}
