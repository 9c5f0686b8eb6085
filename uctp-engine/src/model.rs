/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core data structures for the timetabling engine.
//!
//! ```text
//! dataset ──► Session / Room / Preference ──► Problem ──(scheduler)──► Booking ──► Timetable
//!             ↑ input records, immutable       ↑ validated,           ↑ one per placed session
//!                                                interned indices
//! ```
//!
//! # Ownership model
//! Input records are created once by the ingestion layer and never mutated.
//! [`Problem`](crate::problem::Problem) owns them for the lifetime of a build
//! and hands out dense indices; everything downstream (conflict tracker,
//! ranker, annealer) works on those indices and on `Copy` [`Booking`]s.

use serde::Serialize;

use crate::period::PeriodWindow;

/// Dense index of a session inside a [`Problem`](crate::problem::Problem).
pub type SessionIdx = usize;
/// Dense index of a room.
pub type RoomIdx = usize;
/// Dense index of an interned professor identifier.
pub type ProfessorIdx = usize;
/// Dense index of an interned class-group code.
pub type GroupIdx = usize;
/// Index into the configured day list.
pub type DayIdx = usize;

// ── Group affinity ────────────────────────────────────────────────────────────

/// Day/night tag carried by the second character of a class-group code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum GroupAffinity {
    /// `?D…` – morning and afternoon only.
    Day,
    /// `?N…` – night only.
    Night,
    /// Anything else – the whole day.
    #[default]
    Any,
}

impl GroupAffinity {
    pub const ALL: [GroupAffinity; 3] = [GroupAffinity::Day, GroupAffinity::Night, GroupAffinity::Any];

    /// Decode the affinity tag of a class-group code such as `"1DA"`.
    ///
    /// Codes shorter than two characters, or with any other tag, map to
    /// `Any`.
    pub fn from_class_group(code: &str) -> Self {
        match code.chars().nth(1) {
            Some('D') => GroupAffinity::Day,
            Some('N') => GroupAffinity::Night,
            _ => GroupAffinity::Any,
        }
    }
}

impl std::fmt::Display for GroupAffinity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupAffinity::Day => f.write_str("day"),
            GroupAffinity::Night => f.write_str("night"),
            GroupAffinity::Any => f.write_str("any"),
        }
    }
}

// ── Preference level ──────────────────────────────────────────────────────────

/// A professor's stated preference for one (day, period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PreferenceLevel {
    Preferred,
    Acceptable,
    Unwanted,
    /// Heavily penalised, never vetoed.
    Forbidden,
    /// No stated preference.
    #[default]
    Neutral,
}

impl PreferenceLevel {
    /// Levels that are stored explicitly (everything but `Neutral`).
    pub const STATED: [PreferenceLevel; 4] = [
        PreferenceLevel::Preferred,
        PreferenceLevel::Acceptable,
        PreferenceLevel::Unwanted,
        PreferenceLevel::Forbidden,
    ];

    /// Score contribution of one period at this level.
    pub fn weight(self) -> i32 {
        match self {
            PreferenceLevel::Preferred => 2,
            PreferenceLevel::Acceptable => 1,
            PreferenceLevel::Unwanted => -2,
            PreferenceLevel::Forbidden => -10,
            PreferenceLevel::Neutral => 0,
        }
    }

    /// Parse a level label.  Unknown labels map to `Neutral`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "preferred" => PreferenceLevel::Preferred,
            "acceptable" => PreferenceLevel::Acceptable,
            "unwanted" => PreferenceLevel::Unwanted,
            "forbidden" => PreferenceLevel::Forbidden,
            _ => PreferenceLevel::Neutral,
        }
    }

    /// Availability flag used by the source spreadsheets: available periods
    /// are preferred, unavailable ones forbidden.
    pub fn from_available(available: bool) -> Self {
        if available {
            PreferenceLevel::Preferred
        } else {
            PreferenceLevel::Forbidden
        }
    }
}

// ── Input records ─────────────────────────────────────────────────────────────

/// One schedulable unit: course × class type × class group × professor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub course_name: String,
    /// Cohort code: first character is the academic year, second the
    /// day/night tag.
    pub class_group: String,
    pub professor_id: String,
    pub year: u8,
    pub semester: u8,
    /// `T`, `TP`, `PL`, …
    pub class_type: String,
    /// Consecutive periods required.
    pub periods_needed: u8,
    pub required_room_type: Option<String>,
    pub expected_size: Option<u32>,
}

impl Session {
    pub fn affinity(&self) -> GroupAffinity {
        GroupAffinity::from_class_group(&self.class_group)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    /// `None` when the capacity is unknown.
    pub capacity: Option<u32>,
    pub room_type: String,
    /// Building / area tag.
    pub building: String,
}

impl Room {
    /// Case-insensitive room-type match.
    pub fn has_type(&self, room_type: &str) -> bool {
        self.room_type.trim().eq_ignore_ascii_case(room_type.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preference {
    pub professor_id: String,
    /// Day name, matched case-insensitively against the grid days.
    pub day: String,
    /// 1-based period.
    pub period: u8,
    pub level: PreferenceLevel,
}

// ── Booking ───────────────────────────────────────────────────────────────────

/// A committed placement: one session on one day, in one room, over a
/// consecutive window of periods.
///
/// Carries the interned professor and class-group keys so the conflict
/// tracker can maintain its bitmasks without looking back into the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Booking {
    pub session: SessionIdx,
    pub professor: ProfessorIdx,
    pub group: GroupIdx,
    pub room: RoomIdx,
    pub day: DayIdx,
    pub window: PeriodWindow,
}

impl Booking {
    /// Same session and entities, placed elsewhere.
    pub fn moved_to(&self, day: DayIdx, window: PeriodWindow, room: RoomIdx) -> Self {
        Self {
            day,
            window,
            room,
            ..*self
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
