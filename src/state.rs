use std::io::Read;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::calculus;
use crate::error::{StateError, StoreError};
use crate::extraction::{AttendanceExtraction, TimetableExtraction};
use crate::models::{AggregateSnapshot, AppData, Subject};
use crate::store::{self, KeyValueStore, ATTENDANCE_DATA_KEY, DARK_MODE_KEY};

pub const NEW_SUBJECT_NAME: &str = "New Subject";

/// Field edits for a single subject; `None` leaves the field unchanged.
#[derive(Debug, Default, Clone)]
pub struct SubjectUpdate {
    pub name: Option<String>,
    pub attended: Option<u32>,
    pub total: Option<u32>,
    pub goal: Option<f64>,
}

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate {
    pub individual_goal: Option<f64>,
    pub aggregate_goal: Option<f64>,
    pub semester_end_date: Option<NaiveDate>,
}

/// The whole application state, owned by a single writer.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub data: AppData,
    pub dark_mode: bool,
}

impl AppState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            data: AppData::with_defaults(today),
            dark_mode: false,
        }
    }

    /// Load both records; absent records fall back to first-run defaults.
    pub fn load(store: &dyn KeyValueStore, today: NaiveDate) -> Result<Self, StoreError> {
        let mut state = Self::new(today);
        if let Some(data) = store::load_json::<AppData>(store, ATTENDANCE_DATA_KEY)? {
            state.data = data;
        }
        if let Some(dark_mode) = store::load_json::<bool>(store, DARK_MODE_KEY)? {
            state.dark_mode = dark_mode;
        }
        Ok(state)
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        store::save_json(store, ATTENDANCE_DATA_KEY, &self.data)?;
        store::save_json(store, DARK_MODE_KEY, &self.dark_mode)
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.data.subjects
    }

    pub fn aggregate(&self) -> AggregateSnapshot {
        calculus::aggregate(&self.data.subjects)
    }

    pub fn add_subject(&mut self, name: Option<String>) -> &Subject {
        let subject = Subject::new(
            name.unwrap_or_else(|| NEW_SUBJECT_NAME.to_string()),
            0,
            0,
            self.data.settings.individual_goal,
        );
        info!(id = %subject.id, name = %subject.name, "subject added");
        let index = self.data.subjects.len();
        self.data.subjects.push(subject);
        &self.data.subjects[index]
    }

    pub fn update_subject(
        &mut self,
        id: &str,
        update: SubjectUpdate,
    ) -> Result<&Subject, StateError> {
        if let Some(goal) = update.goal {
            check_goal(goal)?;
        }
        let subject = self
            .data
            .subjects
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StateError::UnknownSubject(id.to_string()))?;

        if let Some(name) = update.name {
            subject.name = name;
        }
        if let Some(attended) = update.attended {
            subject.attended = attended;
        }
        if let Some(total) = update.total {
            subject.total = total;
        }
        if let Some(goal) = update.goal {
            subject.goal = goal;
        }
        info!(id, "subject updated");
        Ok(subject)
    }

    pub fn delete_subject(&mut self, id: &str) -> Result<Subject, StateError> {
        let index = self
            .data
            .subjects
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| StateError::UnknownSubject(id.to_string()))?;
        let removed = self.data.subjects.remove(index);
        info!(id, name = %removed.name, "subject deleted");
        Ok(removed)
    }

    pub fn update_settings(&mut self, update: SettingsUpdate) -> Result<(), StateError> {
        let individual_goal = update.individual_goal.map(check_goal).transpose()?;
        let aggregate_goal = update.aggregate_goal.map(check_goal).transpose()?;

        let settings = &mut self.data.settings;
        if let Some(goal) = individual_goal {
            settings.individual_goal = goal;
        }
        if let Some(goal) = aggregate_goal {
            settings.aggregate_goal = goal;
        }
        if let Some(date) = update.semester_end_date {
            settings.semester_end_date = date;
        }
        info!(?settings, "settings updated");
        Ok(())
    }

    /// Reset subjects, settings and timetable to first-run defaults.
    pub fn clear(&mut self, today: NaiveDate) {
        self.data = AppData::with_defaults(today);
        info!("all attendance data cleared");
    }

    /// Append extracted subjects using the individual goal; returns the count.
    pub fn import_extracted_subjects(&mut self, extraction: &AttendanceExtraction) -> usize {
        let goal = self.data.settings.individual_goal;
        let added: Vec<Subject> = extraction
            .subjects
            .iter()
            .map(|s| Subject::new(s.name.clone(), s.attended, s.total, goal))
            .collect();
        let count = added.len();
        self.data.subjects.extend(added);
        info!(count, "subjects imported from extraction");
        count
    }

    pub fn set_timetable(&mut self, extraction: TimetableExtraction) {
        info!(days = extraction.schedule.len(), "timetable replaced");
        self.data.timetable = extraction.schedule;
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.data)
    }

    /// Replace the data with an exported document carrying `subjects` and `settings`.
    pub fn import_json(&mut self, text: &str) -> Result<(), StateError> {
        let value: Value = serde_json::from_str(text).map_err(StateError::InvalidJson)?;
        if value.get("subjects").is_none() || value.get("settings").is_none() {
            return Err(StateError::MissingKeys);
        }
        self.data = serde_json::from_value(value).map_err(StateError::InvalidJson)?;
        info!(subjects = self.data.subjects.len(), "attendance data imported");
        Ok(())
    }

    /// Append subjects from CSV rows `name,attended,total[,goal]`.
    pub fn import_csv<R: Read>(&mut self, reader: R) -> Result<usize, StateError> {
        #[derive(Deserialize)]
        struct CsvRow {
            name: String,
            attended: u32,
            total: u32,
            goal: Option<f64>,
        }

        let mut reader = csv::Reader::from_reader(reader);
        let mut added = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            let goal = match row.goal {
                Some(goal) => check_goal(goal)?,
                None => self.data.settings.individual_goal,
            };
            added.push(Subject::new(row.name, row.attended, row.total, goal));
        }

        let count = added.len();
        self.data.subjects.extend(added);
        info!(count, "subjects imported from csv");
        Ok(count)
    }
}

fn check_goal(goal: f64) -> Result<f64, StateError> {
    if !goal.is_finite() || !(0.0..=100.0).contains(&goal) {
        return Err(StateError::GoalOutOfRange(goal));
    }
    if goal.fract() != 0.0 {
        return Err(StateError::FractionalGoal(goal));
    }
    Ok(goal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractedSubject;
    use crate::models::TimetableEntry;
    use crate::store::{FileStore, MemoryStore};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn sample_state() -> AppState {
        let mut state = AppState::new(today());
        state.data.subjects = vec![
            Subject::new("Math", 18, 24, 75.0),
            Subject::new("Physics", 20, 24, 80.0),
        ];
        state.data.timetable = vec![TimetableEntry {
            day: "Monday".to_string(),
            subjects: vec!["Math".to_string()],
        }];
        state
    }

    #[test]
    fn load_without_records_uses_defaults() {
        let store = MemoryStore::default();
        let state = AppState::load(&store, today()).unwrap();
        assert_eq!(state, AppState::new(today()));
    }

    #[test]
    fn save_then_load_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        let mut state = sample_state();
        state.dark_mode = true;
        state.save(&mut store).unwrap();

        let loaded = AppState::load(&store, today()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn new_subject_uses_individual_goal() {
        let mut state = AppState::new(today());
        state
            .update_settings(SettingsUpdate {
                individual_goal: Some(85.0),
                ..SettingsUpdate::default()
            })
            .unwrap();
        let subject = state.add_subject(None);
        assert_eq!(subject.name, NEW_SUBJECT_NAME);
        assert_eq!(subject.goal, 85.0);
        assert_eq!((subject.attended, subject.total), (0, 0));
    }

    #[test]
    fn update_and_delete_by_id() {
        let mut state = sample_state();
        let id = state.subjects()[0].id.clone();

        let updated = state
            .update_subject(
                &id,
                SubjectUpdate {
                    attended: Some(19),
                    total: Some(25),
                    ..SubjectUpdate::default()
                },
            )
            .unwrap();
        assert_eq!((updated.attended, updated.total), (19, 25));
        assert_eq!(updated.name, "Math");

        let removed = state.delete_subject(&id).unwrap();
        assert_eq!(removed.name, "Math");
        assert_eq!(state.subjects().len(), 1);
        assert!(matches!(
            state.delete_subject(&id),
            Err(StateError::UnknownSubject(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_goals() {
        let mut state = sample_state();
        let err = state
            .update_settings(SettingsUpdate {
                aggregate_goal: Some(101.0),
                ..SettingsUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(err, StateError::GoalOutOfRange(_)));
        assert_eq!(state.data.settings.aggregate_goal, 75.0);
    }

    #[test]
    fn rejects_fractional_goals() {
        let mut state = sample_state();
        let id = state.subjects()[0].id.clone();

        let err = state
            .update_subject(
                &id,
                SubjectUpdate {
                    goal: Some(99.9),
                    ..SubjectUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StateError::FractionalGoal(_)));
        assert_eq!(state.subjects()[0].goal, 75.0);

        let err = state
            .update_settings(SettingsUpdate {
                individual_goal: Some(0.1),
                ..SettingsUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(err, StateError::FractionalGoal(_)));

        let err = state
            .import_csv("name,attended,total,goal\nMath,1,2,74.5\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, StateError::FractionalGoal(_)));

        state
            .update_settings(SettingsUpdate {
                individual_goal: Some(80.0),
                ..SettingsUpdate::default()
            })
            .unwrap();
        assert_eq!(state.data.settings.individual_goal, 80.0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = sample_state();
        state.clear(today());
        assert_eq!(state.data, AppData::with_defaults(today()));
    }

    #[test]
    fn extracted_subjects_are_appended() {
        let mut state = sample_state();
        let count = state.import_extracted_subjects(&AttendanceExtraction {
            subjects: vec![ExtractedSubject {
                name: "Chemistry".to_string(),
                attended: 25,
                total: 30,
            }],
        });
        assert_eq!(count, 1);
        let added = state.subjects().last().unwrap();
        assert_eq!(added.name, "Chemistry");
        assert_eq!(added.goal, 75.0);
    }

    #[test]
    fn export_import_round_trip() {
        let original = sample_state();
        let exported = original.export_json().unwrap();

        let mut restored = AppState::new(today());
        restored.import_json(&exported).unwrap();
        assert_eq!(restored.data, original.data);
    }

    #[test]
    fn import_requires_subjects_and_settings() {
        let mut state = sample_state();
        let before = state.clone();
        assert!(matches!(
            state.import_json(r#"{"subjects": []}"#),
            Err(StateError::MissingKeys)
        ));
        assert!(matches!(
            state.import_json("nope"),
            Err(StateError::InvalidJson(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn csv_rows_become_subjects() {
        let mut state = AppState::new(today());
        let csv = "name,attended,total,goal\nMath,18,24,\nBiology,10,12,80\n";
        let count = state.import_csv(csv.as_bytes()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(state.subjects()[0].goal, 75.0);
        assert_eq!(state.subjects()[1].goal, 80.0);
        assert_eq!(state.aggregate().attended, 28);
    }
}
