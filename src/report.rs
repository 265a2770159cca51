use std::fmt::Write;

use chrono::NaiveDate;

use crate::calculus;
use crate::calendar::WorkingCalendar;
use crate::models::{GoalProjection, LeaveTally, Subject, SubjectSummary};
use crate::state::AppState;

pub fn summarize_subjects(
    subjects: &[Subject],
    calendar: &WorkingCalendar,
    semester_end: NaiveDate,
) -> Vec<SubjectSummary> {
    subjects
        .iter()
        .map(|subject| {
            let percentage = calculus::percentage(subject.attended, subject.total);
            SubjectSummary {
                id: subject.id.clone(),
                name: subject.name.clone(),
                attended: subject.attended,
                total: subject.total,
                goal: subject.goal,
                percentage,
                status: calculus::attendance_status(
                    percentage,
                    subject.goal,
                    subject.attended,
                    subject.total,
                    calendar,
                    semester_end,
                ),
                projection: calculus::project_goal(
                    subject.attended,
                    subject.total,
                    subject.goal,
                    calendar,
                    semester_end,
                ),
                bunking_buffer: calculus::bunking_buffer(
                    subject.attended,
                    subject.total,
                    subject.goal,
                ),
            }
        })
        .collect()
}

pub fn subject_message(projection: &GoalProjection) -> String {
    match projection {
        GoalProjection::Met => "Goal met".to_string(),
        GoalProjection::ReachableBy { date, classes } => {
            format!("Goal by {date} ({classes} classes)")
        }
        GoalProjection::Unreachable { .. } => "Goal impossible".to_string(),
    }
}

pub fn aggregate_message(projection: &GoalProjection) -> String {
    match projection {
        GoalProjection::Met => "Goal achieved!".to_string(),
        GoalProjection::ReachableBy { date, .. } => format!("Goal will be reached by {date}"),
        GoalProjection::Unreachable { shortfall } => {
            format!("Impossible. Missed by {shortfall} hours.")
        }
    }
}

pub fn build_report(
    state: &AppState,
    calendar: &WorkingCalendar,
    leaves: Option<&LeaveTally>,
) -> String {
    let settings = &state.data.settings;
    let semester_end = settings.semester_end_date;
    let remaining = calendar.remaining_working_days(semester_end);
    let aggregate = state.aggregate();
    let summaries = summarize_subjects(state.subjects(), calendar, semester_end);

    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "Generated on {} (semester ends {}, {} working days left)",
        calendar.today(),
        semester_end,
        remaining
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall");

    if summaries.is_empty() {
        let _ = writeln!(output, "No subjects tracked yet.");
    } else {
        let projection = calculus::project_goal(
            aggregate.attended,
            aggregate.total,
            settings.aggregate_goal,
            calendar,
            semester_end,
        );
        let status = calculus::attendance_status(
            aggregate.percentage,
            settings.aggregate_goal,
            aggregate.attended,
            aggregate.total,
            calendar,
            semester_end,
        );
        let _ = writeln!(
            output,
            "- {}/{} attended ({:.1}%), goal {}% [{}]",
            aggregate.attended, aggregate.total, aggregate.percentage, settings.aggregate_goal, status
        );
        let _ = writeln!(output, "- {}", aggregate_message(&projection));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");

    if summaries.is_empty() {
        let _ = writeln!(output, "No subjects tracked yet.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {}/{} ({:.1}%), goal {}% [{}] {}",
                summary.name,
                summary.attended,
                summary.total,
                summary.percentage,
                summary.goal,
                summary.status,
                subject_message(&summary.projection)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Bunk Planner");
    let semester_buffer = calculus::semester_bunk_buffer(
        aggregate.attended,
        aggregate.total,
        settings.aggregate_goal,
        remaining,
    );
    let _ = writeln!(
        output,
        "- Overall: can skip {} of the remaining {} working days",
        semester_buffer, remaining
    );
    for summary in summaries.iter() {
        let _ = writeln!(
            output,
            "- {}: can miss {} classes",
            summary.name, summary.bunking_buffer
        );
    }

    if let Some(tally) = leaves {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Leave Analysis");
        let _ = writeln!(
            output,
            "- Co-curricular: {} hours, medical: {} hours",
            tally.cocurricular, tally.medical
        );
        match calculus::potential_attendance(state.subjects(), tally) {
            Some(potential) => {
                let _ = writeln!(
                    output,
                    "- If approved: {:.1}% -> {:.1}% (+{:.1} points)",
                    potential.current, potential.potential, potential.improvement
                );
            }
            None => {
                let _ = writeln!(output, "- Add subjects to see the potential impact.");
            }
        }
    }

    if !state.data.timetable.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Timetable");
        for entry in state.data.timetable.iter() {
            let _ = writeln!(output, "- {}: {}", entry.day, entry.subjects.join(", "));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn state_with(subjects: Vec<Subject>, semester_end: NaiveDate) -> AppState {
        let mut state = AppState::new(date(2026, 10, 19));
        state.data.subjects = subjects;
        state.data.settings.semester_end_date = semester_end;
        state
    }

    #[test]
    fn summaries_carry_status_and_buffer() {
        let calendar = WorkingCalendar::new(date(2026, 10, 19));
        let subjects = vec![
            Subject::new("Math", 20, 24, 75.0),
            Subject::new("Physics", 10, 20, 75.0),
        ];
        let summaries = summarize_subjects(&subjects, &calendar, date(2026, 10, 31));
        assert_eq!(summaries[0].status, AttendanceStatus::Safe);
        assert_eq!(summaries[0].bunking_buffer, 2);
        assert_eq!(summaries[1].status, AttendanceStatus::Danger);
        assert_eq!(
            summaries[1].projection,
            GoalProjection::Unreachable { shortfall: 8 }
        );
    }

    #[test]
    fn messages_match_projection() {
        let reachable = GoalProjection::ReachableBy {
            date: date(2026, 11, 11),
            classes: 20,
        };
        assert_eq!(subject_message(&reachable), "Goal by 2026-11-11 (20 classes)");
        assert_eq!(
            aggregate_message(&reachable),
            "Goal will be reached by 2026-11-11"
        );
        assert_eq!(
            aggregate_message(&GoalProjection::Unreachable { shortfall: 8 }),
            "Impossible. Missed by 8 hours."
        );
        assert_eq!(subject_message(&GoalProjection::Met), "Goal met");
    }

    #[test]
    fn report_includes_sections() {
        let calendar = WorkingCalendar::new(date(2026, 10, 19));
        let state = state_with(
            vec![Subject::new("Math", 18, 24, 75.0)],
            date(2026, 10, 25),
        );
        let tally = LeaveTally {
            cocurricular: 2,
            medical: 4,
            attendance: None,
        };
        let report = build_report(&state, &calendar, Some(&tally));

        assert!(report.contains("# Attendance Report"));
        assert!(report.contains("6 working days left"));
        assert!(report.contains("- Math: 18/24 (75.0%), goal 75% [safe] Goal met"));
        assert!(report.contains("## Leave Analysis"));
        assert!(report.contains("75.0% -> 100.0%"));
        assert!(!report.contains("## Timetable"));
    }

    #[test]
    fn empty_report_is_readable() {
        let calendar = WorkingCalendar::new(date(2026, 10, 19));
        let state = state_with(Vec::new(), date(2026, 10, 25));
        let report = build_report(&state, &calendar, None);
        assert!(report.contains("No subjects tracked yet."));
        assert!(!report.contains("## Leave Analysis"));
    }
}
