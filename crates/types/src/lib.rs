use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}
id_newtype!(SubjectId);
id_newtype!(ProfessorId);
id_newtype!(BranchId);
id_newtype!(BatchId);
id_newtype!(EntryId);

impl EntryId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl Day {
    pub const ALL: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Mon => "MON",
            Day::Tue => "TUE",
            Day::Wed => "WED",
            Day::Thu => "THU",
            Day::Fri => "FRI",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid clock time {0:?}, expected HH:MM")]
pub struct ClockParseError(pub String);

/// Wall-clock time of day, stored as minutes since midnight.
///
/// Serialized as `"HH:MM"`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub const fn from_hm(hours: u16, minutes: u16) -> Self {
        Self(hours * 60 + minutes)
    }

    pub const fn from_minutes(minutes: u16) -> Self {
        Self(minutes)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn plus(self, minutes: u16) -> Self {
        Self(self.0 + minutes)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for ClockTime {
    type Err = ClockParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClockParseError(s.to_owned());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let h: u16 = h.parse().map_err(|_| err())?;
        let m: u16 = m.parse().map_err(|_| err())?;
        if h > 23 || m > 59 {
            return Err(err());
        }
        Ok(Self::from_hm(h, m))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ClockTime> for String {
    fn from(t: ClockTime) -> Self {
        t.to_string()
    }
}

impl JsonSchema for ClockTime {
    fn schema_name() -> String {
        "ClockTime".to_owned()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// Half-open time interval `[start, end)` within one day.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
pub struct Window {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl Window {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    pub fn minutes(&self) -> u16 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Minutes of `self` covered by `other`.
    pub fn overlap_minutes(&self, other: &Window) -> u16 {
        if !self.overlaps(other) {
            return 0;
        }
        let start = self.start.max(other.start).minutes();
        let end = self.end.min(other.end).minutes();
        end - start
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionKind {
    Theory,
    Lab,
}

impl SessionKind {
    pub fn minutes(self) -> u16 {
        match self {
            SessionKind::Theory => 60,
            SessionKind::Lab => 120,
        }
    }
}

/// One cell of the weekly slot grid.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
pub struct TimeSlot {
    pub day: Day,
    pub start: ClockTime,
    pub end: ClockTime,
    pub kind: SessionKind,
    /// Teaching block the slot belongs to, 1-based.
    pub block: u8,
}

impl TimeSlot {
    pub fn window(&self) -> Window {
        Window::new(self.start, self.end)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubjectKind {
    #[default]
    Theory,
    Lab,
    Both,
}

impl SubjectKind {
    pub fn has_lectures(self) -> bool {
        matches!(self, SubjectKind::Theory | SubjectKind::Both)
    }

    pub fn has_labs(self) -> bool {
        matches!(self, SubjectKind::Lab | SubjectKind::Both)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub kind: SubjectKind,
    /// Requested lectures per week; 0 means derive from credits.
    #[serde(default)]
    pub weekly_lecture_target: u32,
    /// Requested labs per batch per week; 0 means default.
    #[serde(default)]
    pub weekly_lab_target: u32,
    #[serde(default)]
    pub credits: u32,
    pub semester: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Professor {
    pub id: ProfessorId,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<SubjectId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: BatchId,
    pub branch_id: BranchId,
    pub semester: u8,
    pub batch_number: u8,
}

impl Batch {
    pub fn label(&self) -> &'static str {
        match self.batch_number {
            1 => "A",
            2 => "B",
            _ => "?",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct CohortKey {
    pub branch: BranchId,
    pub semester: u8,
}

impl CohortKey {
    pub fn new(branch: impl Into<BranchId>, semester: u8) -> Self {
        Self {
            branch: branch.into(),
            semester,
        }
    }
}

impl From<String> for BranchId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/S{}", self.branch, self.semester)
    }
}

/// Which part of a cohort an entry applies to.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// The whole cohort, i.e. both batches at once.
    Common,
    Batch(BatchId),
}

impl Scope {
    pub fn intersects(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::Common, _) | (_, Scope::Common) => true,
            (Scope::Batch(a), Scope::Batch(b)) => a == b,
        }
    }

    pub fn batch(&self) -> Option<&BatchId> {
        match self {
            Scope::Common => None,
            Scope::Batch(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Common => f.write_str("COMMON"),
            Scope::Batch(id) => write!(f, "batch {id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    Theory,
    Lab,
    Break,
    Recess,
    Library,
    Project,
}

impl EntryKind {
    pub fn is_class(self) -> bool {
        matches!(self, EntryKind::Theory | EntryKind::Lab)
    }

    pub fn is_reserved(self) -> bool {
        !self.is_class()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Theory => "THEORY",
            EntryKind::Lab => "LAB",
            EntryKind::Break => "BREAK",
            EntryKind::Recess => "RECESS",
            EntryKind::Library => "LIBRARY",
            EntryKind::Project => "PROJECT",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub cohort: CohortKey,
    pub day: Day,
    pub start: ClockTime,
    pub end: ClockTime,
    pub kind: EntryKind,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub subject_code: Option<String>,
    #[serde(default)]
    pub professor_id: Option<ProfessorId>,
    pub scope: Scope,
}

impl ScheduleEntry {
    pub fn window(&self) -> Window {
        Window::new(self.start, self.end)
    }

    /// Same day and overlapping time.
    pub fn overlaps(&self, other: &ScheduleEntry) -> bool {
        self.day == other.day && self.window().overlaps(&other.window())
    }

    pub fn label(&self) -> String {
        let subject = self.subject_code.as_deref().unwrap_or(self.kind.as_str());
        format!("{subject} ({}) {} {}", self.kind, self.day, self.window())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// Whether a finding stops the schedule from being accepted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Blocking,
    Advisory,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    ProfessorClash,
    BatchClash,
    ReservedSlotClash,
    LabCapacityExceeded,
    BreakSpan,
    EmptySchedule,
    LectureShortfall,
    LectureBelowTarget,
    LabShortfall,
    LabBelowTarget,
    LabSpacing,
    BatchesSimultaneous,
    ExcessiveSessions,
    LowUtilization,
    ModerateUtilization,
}

impl ConflictKind {
    pub fn severity(self) -> Severity {
        use ConflictKind::*;
        match self {
            ProfessorClash | BatchClash | ReservedSlotClash | LabCapacityExceeded | BreakSpan
            | EmptySchedule | LectureShortfall => Severity::Critical,
            LabShortfall | LabSpacing | BatchesSimultaneous | LowUtilization => Severity::Warning,
            LectureBelowTarget | LabBelowTarget | ExcessiveSessions | ModerateUtilization => {
                Severity::Info
            }
        }
    }

    /// Lecture shortfalls are labelled critical but never block: theory
    /// placement is best-effort.
    pub fn category(self) -> Category {
        use ConflictKind::*;
        match self {
            ProfessorClash | BatchClash | ReservedSlotClash | LabCapacityExceeded | BreakSpan
            | EmptySchedule => Category::Blocking,
            _ => Category::Advisory,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub category: Category,
    pub description: String,
    #[serde(default)]
    pub entries: Vec<EntryId>,
    #[serde(default)]
    pub cohort: Option<CohortKey>,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub professor_id: Option<ProfessorId>,
    #[serde(default)]
    pub scope: Option<Scope>,
}

impl ConflictRecord {
    pub fn new(kind: ConflictKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            category: kind.category(),
            description: description.into(),
            entries: Vec::new(),
            cohort: None,
            subject_id: None,
            professor_id: None,
            scope: None,
        }
    }

    pub fn with_entries<'a>(
        mut self,
        entries: impl IntoIterator<Item = &'a ScheduleEntry>,
    ) -> Self {
        self.entries.extend(entries.into_iter().map(|e| e.id.clone()));
        self
    }

    pub fn with_cohort(mut self, cohort: CohortKey) -> Self {
        self.cohort = Some(cohort);
        self
    }

    pub fn with_subject(mut self, subject: SubjectId) -> Self {
        self.subject_id = Some(subject);
        self
    }

    pub fn with_professor(mut self, professor: ProfessorId) -> Self {
        self.professor_id = Some(professor);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.category == Category::Blocking
    }
}

/// An entry removed by the reconciler, with the reason.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    pub removed: ScheduleEntry,
    pub cause: String,
}

/// Institution-wide scheduling rules.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    pub college_start: ClockTime,
    pub college_end: ClockTime,
    pub tea_break: Window,
    pub recess: Window,
    /// Start of the trailing hour used for library/project time; splits
    /// the last teaching block.
    pub reserved_hour_start: ClockTime,
    pub library_day: Day,
    pub project_day: Day,
    pub project_min_semester: u8,
    /// Simultaneous labs allowed on one exact (day, start, end) across
    /// every cohort.
    pub lab_capacity: u32,
    pub lab_start_preference: Vec<ClockTime>,
    pub lecture_floor: u32,
    pub lecture_cap: u32,
    pub default_lectures: u32,
    pub lab_cap: u32,
    pub default_labs: u32,
    pub min_lab_day_gap: usize,
    pub min_effective_theory_minutes: u16,
    pub excessive_session_threshold: usize,
    pub low_utilization_pct: u32,
    pub moderate_utilization_pct: u32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            college_start: ClockTime::from_hm(9, 0),
            college_end: ClockTime::from_hm(17, 0),
            tea_break: Window::new(ClockTime::from_hm(11, 0), ClockTime::from_hm(11, 15)),
            recess: Window::new(ClockTime::from_hm(13, 15), ClockTime::from_hm(14, 0)),
            reserved_hour_start: ClockTime::from_hm(16, 0),
            library_day: Day::Fri,
            project_day: Day::Thu,
            project_min_semester: 3,
            lab_capacity: 5,
            lab_start_preference: vec![
                ClockTime::from_hm(14, 0),
                ClockTime::from_hm(11, 15),
                ClockTime::from_hm(9, 0),
            ],
            lecture_floor: 2,
            lecture_cap: 3,
            default_lectures: 2,
            lab_cap: 2,
            default_labs: 2,
            min_lab_day_gap: 2,
            min_effective_theory_minutes: 45,
            excessive_session_threshold: 3,
            low_utilization_pct: 40,
            moderate_utilization_pct: 20,
        }
    }
}

impl Constraints {
    pub fn reserved_hour(&self) -> Window {
        Window::new(self.reserved_hour_start, self.college_end)
    }

    pub fn breaks(&self) -> [(EntryKind, Window); 2] {
        [(EntryKind::Break, self.tea_break), (EntryKind::Recess, self.recess)]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub branch: BranchId,
    pub semester: u8,
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub professors: Vec<Professor>,
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub constraints: Constraints,
    /// Committed entries of other cohorts. They constrain professors and
    /// lab capacity but are never emitted.
    #[serde(default)]
    pub external: Vec<ScheduleEntry>,
}

impl GenerateRequest {
    pub fn cohort(&self) -> CohortKey {
        CohortKey::new(self.branch.clone(), self.semester)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutcome {
    pub cohort: CohortKey,
    pub accepted: bool,
    pub entries: Vec<ScheduleEntry>,
    pub conflicts: Vec<ConflictRecord>,
    #[serde(default)]
    pub fixes: Vec<Fix>,
    pub stats: serde_json::Value,
}

impl GenerateOutcome {
    pub fn blocking(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.conflicts.iter().filter(|c| c.is_blocking())
    }
}
