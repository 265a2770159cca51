use chrono::NaiveDate;
use tracing::debug;

use crate::calendar::WorkingCalendar;
use crate::models::{
    AggregateSnapshot, AttendanceStatus, GoalProjection, LeaveTally, PotentialAttendance, Subject,
};

/// Attendance as a percentage of classes held; 0 when nothing has been held.
///
/// Multiplies before dividing so an exact ratio compares exactly against an
/// integral goal (57/100 yields 57.0, not 56.99...).
pub fn percentage(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(attended) * 100.0 / f64::from(total)
}

pub fn attendance_status(
    current_percentage: f64,
    goal: f64,
    attended: u32,
    total: u32,
    calendar: &WorkingCalendar,
    semester_end: NaiveDate,
) -> AttendanceStatus {
    if current_percentage >= goal {
        return AttendanceStatus::Safe;
    }

    let remaining = calendar.remaining_working_days(semester_end);
    let best_case = percentage(
        attended.saturating_add(remaining),
        total.saturating_add(remaining),
    );
    debug!(remaining, best_case, goal, "projected best-case attendance");

    if best_case >= goal {
        AttendanceStatus::Warning
    } else {
        AttendanceStatus::Danger
    }
}

/// Smallest number of consecutive attended classes that lifts the ratio to
/// `goal`. A goal of 100 or more yields 0.
pub fn required_classes(attended: u32, total: u32, goal: f64) -> u32 {
    let numerator = goal * f64::from(total) - 100.0 * f64::from(attended);
    let denominator = 100.0 - goal;

    if denominator <= 0.0 {
        return 0;
    }
    to_count((numerator / denominator).ceil())
}

/// Largest number of classes that can be missed while staying at `goal`.
pub fn bunking_buffer(attended: u32, total: u32, goal: f64) -> u32 {
    let numerator = 100.0 * f64::from(attended) - goal * f64::from(total);

    if goal <= 0.0 || numerator <= 0.0 {
        return 0;
    }
    to_count((numerator / goal).floor())
}

/// Classes among the remaining working days that can be skipped while still
/// finishing the semester at `goal`, assuming one class per working day.
pub fn semester_bunk_buffer(attended: u32, total: u32, goal: f64, remaining_days: u32) -> u32 {
    let final_total = f64::from(total) + f64::from(remaining_days);
    let needed = (goal * final_total / 100.0).ceil();
    let best_attended = f64::from(attended) + f64::from(remaining_days);
    to_count(best_attended - needed)
}

pub fn aggregate(subjects: &[Subject]) -> AggregateSnapshot {
    let (attended, total) = subjects.iter().fold((0u32, 0u32), |(a, t), subject| {
        (
            a.saturating_add(subject.attended),
            t.saturating_add(subject.total),
        )
    });

    AggregateSnapshot {
        attended,
        total,
        percentage: percentage(attended, total),
    }
}

/// Where a goal stands: met, reachable by a date, or short by some classes.
pub fn project_goal(
    attended: u32,
    total: u32,
    goal: f64,
    calendar: &WorkingCalendar,
    semester_end: NaiveDate,
) -> GoalProjection {
    let current = percentage(attended, total);
    match attendance_status(current, goal, attended, total, calendar, semester_end) {
        AttendanceStatus::Safe => GoalProjection::Met,
        AttendanceStatus::Warning => {
            let classes = required_classes(attended, total, goal);
            GoalProjection::ReachableBy {
                date: calendar.advance_working_days(classes),
                classes,
            }
        }
        AttendanceStatus::Danger => {
            let required = required_classes(attended, total, goal);
            let remaining = calendar.remaining_working_days(semester_end);
            GoalProjection::Unreachable {
                shortfall: required.saturating_sub(remaining),
            }
        }
    }
}

/// Aggregate attendance if every counted leave hour were credited as attended.
pub fn potential_attendance(
    subjects: &[Subject],
    tally: &LeaveTally,
) -> Option<PotentialAttendance> {
    if subjects.is_empty() {
        return None;
    }

    let snapshot = aggregate(subjects);
    let potential = percentage(
        snapshot.attended.saturating_add(tally.leave_hours()),
        snapshot.total,
    );

    Some(PotentialAttendance {
        current: snapshot.percentage,
        potential,
        improvement: potential - snapshot.percentage,
    })
}

fn to_count(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        // Saturates at u32::MAX.
        value as u32
    }
}
