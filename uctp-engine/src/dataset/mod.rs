//! Scheduling input loading.
//!
//! The engine itself only sees typed [`Session`], [`Room`] and
//! [`Preference`] lists.  This module reads them from a YAML document so the
//! binary and the tests have something concrete to feed it.
//!
//! The expected YAML structure is:
//! ```yaml
//! sessions:
//!   - course: "Linear Algebra"
//!     class_group: 1DA          # year digit, D/N tag, letter
//!     professor: P017
//!     semester: 1
//!     class_type: T
//!     periods: 2
//!     room_type: Classroom      # optional
//!     expected_size: 45         # optional
//!     # id: optional, defaults to "<course>-<class_type>-<class_group>"
//!     # year: optional, defaults to the class group's first digit
//! rooms:
//!   - id: F1.12
//!     name: "Amphitheatre 1"    # optional, defaults to id
//!     capacity: 120             # optional
//!     type: Classroom
//!     building: F
//! preferences:
//!   - professor: P017
//!     day: Monday
//!     period: 3
//!     level: Preferred          # Preferred | Acceptable | Unwanted | Forbidden
//!   - professor: P017
//!     day: Friday
//!     period: 25
//!     available: false          # shorthand: true → Preferred, false → Forbidden
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::model::{Preference, PreferenceLevel, Room, Session};
use crate::period::PeriodModel;
use crate::problem::{Problem, ProblemError};

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatasetFile {
    sessions: Vec<SessionEntry>,
    rooms: Vec<RoomEntry>,
    preferences: Vec<PreferenceEntry>,
}

#[derive(Debug, Deserialize)]
struct SessionEntry {
    id: Option<String>,
    course: String,
    class_group: String,
    professor: String,
    year: Option<u8>,
    #[serde(default = "default_semester")]
    semester: u8,
    class_type: String,
    periods: u8,
    room_type: Option<String>,
    expected_size: Option<u32>,
}

fn default_semester() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
struct RoomEntry {
    id: String,
    name: Option<String>,
    capacity: Option<u32>,
    #[serde(rename = "type", default)]
    room_type: String,
    #[serde(default)]
    building: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceEntry {
    professor: String,
    day: String,
    period: u8,
    level: Option<String>,
    available: Option<bool>,
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl SessionEntry {
    fn into_session(self) -> Session {
        let id = self.id.unwrap_or_else(|| {
            format!("{}-{}-{}", self.course, self.class_type, self.class_group)
        });
        let year = self.year.unwrap_or_else(|| {
            self.class_group
                .chars()
                .next()
                .and_then(|c| c.to_digit(10))
                .map(|d| d as u8)
                .unwrap_or(0)
        });
        Session {
            id,
            course_name: self.course,
            class_group: self.class_group,
            professor_id: self.professor,
            year,
            semester: self.semester,
            class_type: self.class_type,
            periods_needed: self.periods,
            required_room_type: self.room_type.filter(|t| !t.trim().is_empty()),
            expected_size: self.expected_size,
        }
    }
}

impl RoomEntry {
    fn into_room(self) -> Room {
        Room {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            capacity: self.capacity,
            room_type: self.room_type,
            building: self.building,
        }
    }
}

impl PreferenceEntry {
    fn into_preference(self) -> Preference {
        let level = match (&self.level, self.available) {
            (Some(label), _) => PreferenceLevel::from_label(label),
            (None, Some(available)) => PreferenceLevel::from_available(available),
            (None, None) => PreferenceLevel::Neutral,
        };
        Preference {
            professor_id: self.professor,
            day: self.day,
            period: self.period,
            level,
        }
    }
}

// ── Dataset ───────────────────────────────────────────────────────────────────

/// The three input lists, typed but not yet validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub sessions: Vec<Session>,
    pub rooms: Vec<Room>,
    pub preferences: Vec<Preference>,
}

impl Dataset {
    /// Parse a YAML document.  Missing lists are empty.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: DatasetFile =
            serde_yaml::from_str(content).context("Failed to parse dataset")?;

        let dataset = Self {
            sessions: file.sessions.into_iter().map(SessionEntry::into_session).collect(),
            rooms: file.rooms.into_iter().map(RoomEntry::into_room).collect(),
            preferences: file
                .preferences
                .into_iter()
                .map(PreferenceEntry::into_preference)
                .collect(),
        };

        let neutral = dataset
            .preferences
            .iter()
            .filter(|p| p.level == PreferenceLevel::Neutral)
            .count();
        if neutral > 0 {
            warn!(count = neutral, "preferences without a recognised level are treated as neutral");
        }
        Ok(dataset)
    }

    /// Read and parse `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid (missing required fields included).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading dataset from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open dataset file: {}", path.display()))?;
        let dataset = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid dataset file: {}", path.display()))?;

        debug!(
            sessions = dataset.sessions.len(),
            rooms = dataset.rooms.len(),
            preferences = dataset.preferences.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }

    /// Validate against `periods` and intern.
    pub fn into_problem(self, periods: &PeriodModel) -> Result<Problem, ProblemError> {
        Problem::new(self.sessions, self.rooms, self.preferences, periods)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const SAMPLE: &str = r#"
sessions:
  - course: Algebra
    class_group: 1DA
    professor: P1
    class_type: T
    periods: 2
    expected_size: 40
  - id: prog-lab
    course: Programming
    class_group: 2NB
    professor: P2
    year: 3
    semester: 2
    class_type: PL
    periods: 3
    room_type: Lab
rooms:
  - id: F1
    capacity: 50
    type: Classroom
    building: F
  - id: L2
    name: Lab 2
    type: Lab
preferences:
  - professor: P1
    day: Monday
    period: 1
    level: unwanted
  - professor: P1
    day: Monday
    period: 2
    available: true
  - professor: P2
    day: Tuesday
    period: 22
    level: whenever
"#;

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn session_defaults_are_derived() {
        let d = Dataset::from_yaml_str(SAMPLE).unwrap();
        let s = &d.sessions[0];
        assert_eq!(s.id, "Algebra-T-1DA");
        assert_eq!(s.year, 1, "year comes from the class group");
        assert_eq!(s.semester, 1);
        assert_eq!(s.required_room_type, None);
        assert_eq!(s.expected_size, Some(40));

        let s = &d.sessions[1];
        assert_eq!(s.id, "prog-lab");
        assert_eq!((s.year, s.semester, s.periods_needed), (3, 2, 3));
        assert_eq!(s.required_room_type.as_deref(), Some("Lab"));
    }

    #[test]
    fn room_name_defaults_to_id() {
        let d = Dataset::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(d.rooms[0].name, "F1");
        assert_eq!(d.rooms[1].name, "Lab 2");
        assert_eq!(d.rooms[1].capacity, None);
        assert_eq!(d.rooms[1].building, "");
    }

    #[test]
    fn preference_levels_and_availability_shorthand() {
        let d = Dataset::from_yaml_str(SAMPLE).unwrap();
        let levels: Vec<_> = d.preferences.iter().map(|p| p.level).collect();
        assert_eq!(
            levels,
            vec![
                PreferenceLevel::Unwanted,
                PreferenceLevel::Preferred,
                PreferenceLevel::Neutral
            ]
        );
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let yaml = "sessions:\n  - course: X\n    class_group: 1DA\n    class_type: T\n    periods: 1\n";
        let err = Dataset::from_yaml_str(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("professor"), "{err:#}");
    }

    #[test]
    fn empty_document_is_an_empty_dataset() {
        assert_eq!(Dataset::from_yaml_str("  \n").unwrap(), Dataset::default());
        assert!(Dataset::from_yaml_str("rooms: []\n").unwrap().sessions.is_empty());
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn load_from_file_and_build_problem() {
        let f = yaml_tempfile(SAMPLE);
        let d = Dataset::load_from_file(f.path()).unwrap();
        let periods = PeriodModel::new(&GridConfig::default()).unwrap();
        let problem = d.into_problem(&periods).unwrap();
        assert_eq!(problem.session_count(), 2);
        assert_eq!(problem.room_count(), 2);
        assert_eq!(problem.preference_score(0, 0, crate::period::PeriodWindow::new(1, 2)), 0);
    }

    #[test]
    fn missing_file_returns_error() {
        assert!(Dataset::load_from_file(Path::new("/nonexistent/dataset.yaml")).is_err());
    }
}
