/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Ingestion-time validation and interning of the input lists.
//!
//! [`Problem::new`] is the single gate between loosely-checked collaborator
//! data and the engine: every required field is checked here, professors and
//! class groups are interned to dense indices, and professor preferences are
//! folded into one bitmask per (professor, day, level).  Nothing downstream
//! re-validates.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::model::{
    Booking, DayIdx, GroupAffinity, GroupIdx, Preference, PreferenceLevel, ProfessorIdx, Room,
    RoomIdx, Session, SessionIdx,
};
use crate::period::{PeriodModel, PeriodWindow};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Input records that cannot be scheduled at all.
///
/// Sessions that are merely unplaceable (no window, no free room) are not
/// errors; they surface as unassigned in the statistics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProblemError {
    #[error("session id '{0}' appears more than once")]
    DuplicateSession(String),

    #[error("room id '{0}' appears more than once")]
    DuplicateRoom(String),

    #[error("session '{session}' requires zero periods")]
    ZeroDuration { session: String },

    #[error("session '{session}' has an empty class group")]
    EmptyClassGroup { session: String },

    #[error("session '{session}' has no professor")]
    MissingProfessor { session: String },

    #[error("preference for '{professor}' names unknown day '{day}'")]
    UnknownPreferenceDay { professor: String, day: String },

    #[error("preference for '{professor}' on {day} names period {period} outside 1..={periods_per_day}")]
    PreferencePeriodOutOfRange {
        professor: String,
        day: String,
        period: u8,
        periods_per_day: u8,
    },
}

// ── Preference masks ──────────────────────────────────────────────────────────

/// One professor's stated preferences for one day, as a bitmask per level.
///
/// A period is set in at most one of the four masks; unset everywhere means
/// neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelMasks {
    masks: [u64; 4],
}

impl LevelMasks {
    fn slot(level: PreferenceLevel) -> Option<usize> {
        match level {
            PreferenceLevel::Preferred => Some(0),
            PreferenceLevel::Acceptable => Some(1),
            PreferenceLevel::Unwanted => Some(2),
            PreferenceLevel::Forbidden => Some(3),
            PreferenceLevel::Neutral => None,
        }
    }

    /// Record `level` for `period`, replacing any earlier level.
    pub fn set(&mut self, period: u8, level: PreferenceLevel) {
        let bit = crate::period::window::span_mask(period, 1);
        for m in &mut self.masks {
            *m &= !bit;
        }
        if let Some(i) = Self::slot(level) {
            self.masks[i] |= bit;
        }
    }

    pub fn mask(&self, level: PreferenceLevel) -> u64 {
        Self::slot(level).map(|i| self.masks[i]).unwrap_or(0)
    }

    pub fn level_at(&self, period: u8) -> PreferenceLevel {
        let bit = crate::period::window::span_mask(period, 1);
        PreferenceLevel::STATED
            .into_iter()
            .find(|&l| self.mask(l) & bit != 0)
            .unwrap_or(PreferenceLevel::Neutral)
    }

    /// Number of periods in `periods` stated at `level`.
    pub fn count(&self, level: PreferenceLevel, periods: u64) -> u32 {
        match level {
            PreferenceLevel::Neutral => {
                let stated = self.masks.iter().fold(0, |acc, m| acc | m);
                (periods & !stated).count_ones()
            }
            _ => (self.mask(level) & periods).count_ones(),
        }
    }

    /// Summed preference weight over `periods`.
    pub fn score(&self, periods: u64) -> i32 {
        PreferenceLevel::STATED
            .into_iter()
            .map(|l| l.weight() * self.count(l, periods) as i32)
            .sum()
    }
}

// ── Problem ───────────────────────────────────────────────────────────────────

/// Interned keys of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKeys {
    pub professor: ProfessorIdx,
    pub group: GroupIdx,
    pub affinity: GroupAffinity,
}

/// Validated, indexed scheduling input.
#[derive(Debug, Clone)]
pub struct Problem {
    sessions: Vec<Session>,
    rooms: Vec<Room>,
    professors: Vec<String>,
    groups: Vec<String>,
    keys: Vec<SessionKeys>,
    preferences: HashMap<(ProfessorIdx, DayIdx), LevelMasks>,
}

impl Problem {
    /// Validate the raw lists against `periods` and intern them.
    ///
    /// Preferences for professors who teach no session are dropped.  When the
    /// same (professor, day, period) is listed twice, the later entry wins.
    pub fn new(
        sessions: Vec<Session>,
        rooms: Vec<Room>,
        preferences: Vec<Preference>,
        periods: &PeriodModel,
    ) -> Result<Self, ProblemError> {
        let mut seen_sessions: HashMap<&str, ()> = HashMap::with_capacity(sessions.len());
        for s in &sessions {
            if seen_sessions.insert(s.id.as_str(), ()).is_some() {
                return Err(ProblemError::DuplicateSession(s.id.clone()));
            }
            if s.periods_needed == 0 {
                return Err(ProblemError::ZeroDuration {
                    session: s.id.clone(),
                });
            }
            if s.class_group.trim().is_empty() {
                return Err(ProblemError::EmptyClassGroup {
                    session: s.id.clone(),
                });
            }
            if s.professor_id.trim().is_empty() {
                return Err(ProblemError::MissingProfessor {
                    session: s.id.clone(),
                });
            }
        }

        let mut seen_rooms: HashMap<&str, ()> = HashMap::with_capacity(rooms.len());
        for r in &rooms {
            if seen_rooms.insert(r.id.as_str(), ()).is_some() {
                return Err(ProblemError::DuplicateRoom(r.id.clone()));
            }
        }

        // ── Interning ─────────────────────────────────────────────────────────
        let mut professors: Vec<String> = Vec::new();
        let mut professor_index: HashMap<String, ProfessorIdx> = HashMap::new();
        let mut groups: Vec<String> = Vec::new();
        let mut group_index: HashMap<String, GroupIdx> = HashMap::new();

        let keys: Vec<SessionKeys> = sessions
            .iter()
            .map(|s| {
                let professor = *professor_index
                    .entry(s.professor_id.clone())
                    .or_insert_with(|| {
                        professors.push(s.professor_id.clone());
                        professors.len() - 1
                    });
                let group = *group_index.entry(s.class_group.clone()).or_insert_with(|| {
                    groups.push(s.class_group.clone());
                    groups.len() - 1
                });
                SessionKeys {
                    professor,
                    group,
                    affinity: s.affinity(),
                }
            })
            .collect();

        // ── Preferences ───────────────────────────────────────────────────────
        let mut table: HashMap<(ProfessorIdx, DayIdx), LevelMasks> = HashMap::new();
        let mut dropped = 0usize;
        for p in &preferences {
            let day = periods
                .day_index(&p.day)
                .ok_or_else(|| ProblemError::UnknownPreferenceDay {
                    professor: p.professor_id.clone(),
                    day: p.day.clone(),
                })?;
            if p.period == 0 || p.period > periods.periods_per_day() {
                return Err(ProblemError::PreferencePeriodOutOfRange {
                    professor: p.professor_id.clone(),
                    day: p.day.clone(),
                    period: p.period,
                    periods_per_day: periods.periods_per_day(),
                });
            }
            let Some(&prof) = professor_index.get(&p.professor_id) else {
                dropped += 1;
                continue;
            };
            table.entry((prof, day)).or_default().set(p.period, p.level);
        }
        if dropped > 0 {
            debug!(dropped, "preferences for professors without sessions ignored");
        }

        info!(
            sessions = sessions.len(),
            rooms = rooms.len(),
            professors = professors.len(),
            class_groups = groups.len(),
            preference_days = table.len(),
            "problem loaded"
        );

        Ok(Self {
            sessions,
            rooms,
            professors,
            groups,
            keys,
            preferences: table,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, idx: SessionIdx) -> &Session {
        &self.sessions[idx]
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, idx: RoomIdx) -> &Room {
        &self.rooms[idx]
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn professors(&self) -> &[String] {
        &self.professors
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn keys(&self, idx: SessionIdx) -> SessionKeys {
        self.keys[idx]
    }

    /// Longest duration requested by any session.
    pub fn max_duration(&self) -> u8 {
        self.sessions.iter().map(|s| s.periods_needed).max().unwrap_or(0)
    }

    /// Total periods requested across all sessions.
    pub fn total_demand(&self) -> u64 {
        self.sessions.iter().map(|s| s.periods_needed as u64).sum()
    }

    /// Stated preferences of `professor` on `day`, if any.
    pub fn preference_masks(&self, professor: ProfessorIdx, day: DayIdx) -> Option<&LevelMasks> {
        self.preferences.get(&(professor, day))
    }

    /// Preference contribution of placing `professor` on `day` over `window`.
    pub fn preference_score(&self, professor: ProfessorIdx, day: DayIdx, window: PeriodWindow) -> i32 {
        self.preference_masks(professor, day)
            .map(|m| m.score(window.mask()))
            .unwrap_or(0)
    }

    /// Build the booking that places `session` at (`day`, `window`, `room`).
    pub fn booking(&self, session: SessionIdx, day: DayIdx, window: PeriodWindow, room: RoomIdx) -> Booking {
        let keys = self.keys[session];
        Booking {
            session,
            professor: keys.professor,
            group: keys.group,
            room,
            day,
            window,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;

    fn periods() -> PeriodModel {
        PeriodModel::new(&GridConfig::default()).unwrap()
    }

    fn session(id: &str, group: &str, prof: &str, duration: u8) -> Session {
        Session {
            id: id.into(),
            course_name: id.into(),
            class_group: group.into(),
            professor_id: prof.into(),
            year: 1,
            semester: 1,
            class_type: "T".into(),
            periods_needed: duration,
            ..Default::default()
        }
    }

    fn room(id: &str) -> Room {
        Room {
            id: id.into(),
            name: id.into(),
            ..Default::default()
        }
    }

    fn pref(prof: &str, day: &str, period: u8, level: PreferenceLevel) -> Preference {
        Preference {
            professor_id: prof.into(),
            day: day.into(),
            period,
            level,
        }
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn duplicate_session_ids_are_rejected() {
        let err = Problem::new(
            vec![session("a", "1DA", "p", 1), session("a", "1DB", "q", 1)],
            vec![room("r")],
            vec![],
            &periods(),
        )
        .unwrap_err();
        assert_eq!(err, ProblemError::DuplicateSession("a".into()));
    }

    #[test]
    fn duplicate_room_ids_are_rejected() {
        let err = Problem::new(vec![], vec![room("r"), room("r")], vec![], &periods()).unwrap_err();
        assert_eq!(err, ProblemError::DuplicateRoom("r".into()));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = Problem::new(vec![session("a", "1DA", "p", 0)], vec![], vec![], &periods())
            .unwrap_err();
        assert!(matches!(err, ProblemError::ZeroDuration { .. }));
    }

    #[test]
    fn blank_group_or_professor_is_rejected() {
        let p = periods();
        assert!(matches!(
            Problem::new(vec![session("a", " ", "p", 1)], vec![], vec![], &p),
            Err(ProblemError::EmptyClassGroup { .. })
        ));
        assert!(matches!(
            Problem::new(vec![session("a", "1DA", "", 1)], vec![], vec![], &p),
            Err(ProblemError::MissingProfessor { .. })
        ));
    }

    #[test]
    fn preference_with_unknown_day_is_rejected() {
        let err = Problem::new(
            vec![session("a", "1DA", "p", 1)],
            vec![],
            vec![pref("p", "Sunday", 1, PreferenceLevel::Preferred)],
            &periods(),
        )
        .unwrap_err();
        assert!(matches!(err, ProblemError::UnknownPreferenceDay { .. }));
    }

    #[test]
    fn preference_period_out_of_range_is_rejected() {
        let err = Problem::new(
            vec![session("a", "1DA", "p", 1)],
            vec![],
            vec![pref("p", "Monday", 31, PreferenceLevel::Preferred)],
            &periods(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProblemError::PreferencePeriodOutOfRange { period: 31, .. }
        ));
    }

    // ── Interning ─────────────────────────────────────────────────────────────

    #[test]
    fn professors_and_groups_are_interned_once() {
        let p = Problem::new(
            vec![
                session("a", "1DA", "p1", 1),
                session("b", "1DA", "p2", 1),
                session("c", "2NA", "p1", 2),
            ],
            vec![room("r")],
            vec![],
            &periods(),
        )
        .unwrap();
        assert_eq!(p.professors(), &["p1".to_string(), "p2".to_string()]);
        assert_eq!(p.groups().len(), 2);
        assert_eq!(p.keys(0).professor, p.keys(2).professor);
        assert_eq!(p.keys(0).group, p.keys(1).group);
        assert_eq!(p.keys(2).affinity, GroupAffinity::Night);
        assert_eq!(p.max_duration(), 2);
        assert_eq!(p.total_demand(), 4);
    }

    // ── Preferences ───────────────────────────────────────────────────────────

    #[test]
    fn preference_score_sums_weights_over_window() {
        let p = Problem::new(
            vec![session("a", "1DA", "p", 3)],
            vec![],
            vec![
                pref("p", "Monday", 1, PreferenceLevel::Preferred),
                pref("p", "monday", 2, PreferenceLevel::Acceptable),
                pref("p", "Monday", 3, PreferenceLevel::Forbidden),
            ],
            &periods(),
        )
        .unwrap();
        // 2 + 1 - 10
        assert_eq!(p.preference_score(0, 0, PeriodWindow::new(1, 3)), -7);
        // period 4 unspecified → neutral
        assert_eq!(p.preference_score(0, 0, PeriodWindow::new(4, 1)), 0);
        assert_eq!(p.preference_score(0, 1, PeriodWindow::new(1, 3)), 0);
    }

    #[test]
    fn later_duplicate_preference_replaces_earlier_one() {
        let p = Problem::new(
            vec![session("a", "1DA", "p", 1)],
            vec![],
            vec![
                pref("p", "Monday", 5, PreferenceLevel::Forbidden),
                pref("p", "Monday", 5, PreferenceLevel::Preferred),
            ],
            &periods(),
        )
        .unwrap();
        let masks = p.preference_masks(0, 0).unwrap();
        assert_eq!(masks.level_at(5), PreferenceLevel::Preferred);
        assert_eq!(masks.mask(PreferenceLevel::Forbidden), 0);
    }

    #[test]
    fn preferences_of_unknown_professors_are_ignored() {
        let p = Problem::new(
            vec![session("a", "1DA", "p", 1)],
            vec![],
            vec![pref("ghost", "Monday", 5, PreferenceLevel::Forbidden)],
            &periods(),
        )
        .unwrap();
        assert!(p.preference_masks(0, 0).is_none());
    }

    #[test]
    fn level_masks_count_neutral_periods() {
        let mut m = LevelMasks::default();
        m.set(2, PreferenceLevel::Unwanted);
        let w = PeriodWindow::new(1, 3).mask();
        assert_eq!(m.count(PreferenceLevel::Unwanted, w), 1);
        assert_eq!(m.count(PreferenceLevel::Neutral, w), 2);
        m.set(2, PreferenceLevel::Neutral);
        assert_eq!(m.count(PreferenceLevel::Neutral, w), 3);
    }
}
