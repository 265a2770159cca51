use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_GOAL: f64 = 75.0;
pub const DEFAULT_SEMESTER_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub attended: u32,
    pub total: u32,
    pub goal: f64,
}

impl Subject {
    pub fn new(name: impl Into<String>, attended: u32, total: u32, goal: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            attended,
            total,
            goal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub individual_goal: f64,
    pub aggregate_goal: f64,
    pub semester_end_date: NaiveDate,
}

impl Settings {
    /// Defaults used on first run and after a full reset.
    pub fn with_defaults(today: NaiveDate) -> Self {
        Self {
            individual_goal: DEFAULT_GOAL,
            aggregate_goal: DEFAULT_GOAL,
            semester_end_date: today + Duration::days(DEFAULT_SEMESTER_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub day: String,
    pub subjects: Vec<String>,
}

/// The persisted `attendanceData` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppData {
    pub subjects: Vec<Subject>,
    pub settings: Settings,
    #[serde(default)]
    pub timetable: Vec<TimetableEntry>,
}

impl AppData {
    pub fn with_defaults(today: NaiveDate) -> Self {
        Self {
            subjects: Vec::new(),
            settings: Settings::with_defaults(today),
            timetable: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSnapshot {
    pub attended: u32,
    pub total: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceCount {
    #[serde(deserialize_with = "crate::extraction::whole_count")]
    pub attended: u32,
    #[serde(deserialize_with = "crate::extraction::whole_count")]
    pub total: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaveTally {
    pub cocurricular: u32,
    pub medical: u32,
    pub attendance: Option<AttendanceCount>,
}

impl LeaveTally {
    pub fn leave_hours(&self) -> u32 {
        self.cocurricular.saturating_add(self.medical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Safe,
    Warning,
    Danger,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AttendanceStatus::Safe => "safe",
            AttendanceStatus::Warning => "warning",
            AttendanceStatus::Danger => "danger",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PotentialAttendance {
    pub current: f64,
    pub potential: f64,
    pub improvement: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalProjection {
    Met,
    ReachableBy { date: NaiveDate, classes: u32 },
    Unreachable { shortfall: u32 },
}

/// Derived per-subject numbers shown by `status` and the report.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub id: String,
    pub name: String,
    pub attended: u32,
    pub total: u32,
    pub goal: f64,
    pub percentage: f64,
    pub status: AttendanceStatus,
    pub projection: GoalProjection,
    pub bunking_buffer: u32,
}
