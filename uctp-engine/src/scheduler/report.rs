/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Read-only validation and statistics over a finished timetable.
//!
//! Conflicts are recomputed here from the booking list, independently of
//! the tracker's bitmasks, so a soft-mode overlap is always visible in the
//! output even if the bitmask bookkeeping were wrong.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::config::ConstraintMode;
use crate::model::{Booking, PreferenceLevel, SessionIdx};
use crate::period::{Band, PeriodModel};
use crate::problem::Problem;

use super::anneal::AnnealReport;
use super::capacity::CapacityReport;
use super::error::UnassignedReason;
use super::ranker::CacheStats;
use super::tracker::Timetable;
use super::{room_type_mismatch, SearchCounters};

// ── Output types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnassignedSession {
    pub session_id: String,
    pub course_name: String,
    pub class_group: String,
    pub reason: String,
}

/// Extra occupants per (entity, day, period), summed per entity kind.
///
/// Zero everywhere for a hard-mode result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub professor: u32,
    pub room: u32,
    pub class_group: u32,
}

impl ConflictReport {
    pub fn total(&self) -> u32 {
        self.professor + self.room + self.class_group
    }
}

/// Scheduled periods per professor-preference level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreferenceTally {
    pub preferred: u32,
    pub acceptable: u32,
    pub unwanted: u32,
    pub forbidden: u32,
    pub neutral: u32,
}

impl PreferenceTally {
    fn add(&mut self, level: PreferenceLevel, periods: u32) {
        let slot = match level {
            PreferenceLevel::Preferred => &mut self.preferred,
            PreferenceLevel::Acceptable => &mut self.acceptable,
            PreferenceLevel::Unwanted => &mut self.unwanted,
            PreferenceLevel::Forbidden => &mut self.forbidden,
            PreferenceLevel::Neutral => &mut self.neutral,
        };
        *slot += periods;
    }
}

/// Everything a build reports to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    /// Mode of the pass that produced the timetable.
    pub mode: ConstraintMode,
    pub fallback_used: bool,
    pub parallel: bool,
    pub sessions: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub unassigned_sessions: Vec<UnassignedSession>,
    /// Occupied (day, period, room) cells.
    pub occupied_slots: usize,
    pub distinct_sessions: usize,
    /// Booked periods per professor id.
    pub professor_usage: BTreeMap<String, u32>,
    /// Booked periods per room id.
    pub room_usage: BTreeMap<String, u32>,
    /// Booked periods per class-group code.
    pub group_usage: BTreeMap<String, u32>,
    pub conflicts: ConflictReport,
    pub preferences: PreferenceTally,
    /// Scheduled periods inside the session's year-preferred band.
    pub year_band_periods: u32,
    pub room_type_mismatches: u32,
    /// Bookings in a room known to be smaller than the expected headcount.
    pub capacity_shortfalls: u32,
    pub search: SearchCounters,
    pub annealing: Option<AnnealReport>,
    pub ranker_cache: CacheStats,
    pub capacity: CapacityReport,
}

// ── Compilation ───────────────────────────────────────────────────────────────

/// Inputs of [`compile`].
pub struct ReportInput<'a> {
    pub problem: &'a Problem,
    pub periods: &'a PeriodModel,
    pub timetable: &'a Timetable,
    pub unassigned: &'a [(SessionIdx, UnassignedReason)],
    pub mode: ConstraintMode,
    pub fallback_used: bool,
    pub parallel: bool,
    pub counters: SearchCounters,
    pub annealing: Option<AnnealReport>,
    pub cache: CacheStats,
    pub capacity: CapacityReport,
}

/// Count extra occupants per (entity, day, period) for one entity kind.
fn residual_conflicts<'b>(
    bookings: impl Iterator<Item = &'b Booking>,
    entity: impl Fn(&Booking) -> usize,
) -> u32 {
    let mut occupants: HashMap<(usize, usize, u8), u32> = HashMap::new();
    for b in bookings {
        for period in b.window.periods() {
            *occupants.entry((entity(b), b.day, period)).or_insert(0) += 1;
        }
    }
    occupants.values().map(|&n| n.saturating_sub(1)).sum()
}

/// Recompute conflicts and aggregate the statistics of a finished build.
pub fn compile(input: ReportInput<'_>) -> Statistics {
    let ReportInput {
        problem,
        periods,
        timetable,
        unassigned,
        ..
    } = input;

    let conflicts = ConflictReport {
        professor: residual_conflicts(timetable.bookings(), |b| b.professor),
        room: residual_conflicts(timetable.bookings(), |b| b.room),
        class_group: residual_conflicts(timetable.bookings(), |b| b.group),
    };
    if conflicts.total() > 0 {
        warn!(
            professor = conflicts.professor,
            room = conflicts.room,
            class_group = conflicts.class_group,
            mode = %input.mode,
            "timetable contains overlapping bookings"
        );
    }

    let mut professor_usage: BTreeMap<String, u32> = BTreeMap::new();
    let mut room_usage: BTreeMap<String, u32> = BTreeMap::new();
    let mut group_usage: BTreeMap<String, u32> = BTreeMap::new();
    let mut preferences = PreferenceTally::default();
    let mut year_band_periods = 0u32;
    let mut room_type_mismatches = 0u32;
    let mut capacity_shortfalls = 0u32;

    for b in timetable.bookings() {
        let session = problem.session(b.session);
        let room = problem.room(b.room);
        let len = b.window.len as u32;

        *professor_usage.entry(session.professor_id.clone()).or_insert(0) += len;
        *room_usage.entry(room.id.clone()).or_insert(0) += len;
        *group_usage.entry(session.class_group.clone()).or_insert(0) += len;

        match problem.preference_masks(b.professor, b.day) {
            Some(masks) => {
                let window = b.window.mask();
                for level in PreferenceLevel::STATED {
                    preferences.add(level, masks.count(level, window));
                }
                preferences.add(PreferenceLevel::Neutral, masks.count(PreferenceLevel::Neutral, window));
            }
            None => preferences.add(PreferenceLevel::Neutral, len),
        }

        if let Some(band) = Band::preferred_for_year(session.year) {
            year_band_periods += periods.band_overlap(b.window, band);
        }
        if room_type_mismatch(problem, session, b.room) {
            room_type_mismatches += 1;
        }
        if let (Some(size), Some(cap)) = (session.expected_size, room.capacity) {
            if cap < size {
                capacity_shortfalls += 1;
            }
        }
    }

    let mut unassigned_sessions: Vec<UnassignedSession> = unassigned
        .iter()
        .map(|(idx, reason)| {
            let s = problem.session(*idx);
            UnassignedSession {
                session_id: s.id.clone(),
                course_name: s.course_name.clone(),
                class_group: s.class_group.clone(),
                reason: reason.to_string(),
            }
        })
        .collect();
    unassigned_sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

    let assigned = timetable.placed_count();
    let distinct_sessions = timetable
        .bookings()
        .map(|b| b.session)
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    Statistics {
        mode: input.mode,
        fallback_used: input.fallback_used,
        parallel: input.parallel,
        sessions: problem.session_count(),
        assigned,
        unassigned: problem.session_count() - assigned,
        unassigned_sessions,
        occupied_slots: timetable.occupied_cells(),
        distinct_sessions,
        professor_usage,
        room_usage,
        group_usage,
        conflicts,
        preferences,
        year_band_periods,
        room_type_mismatches,
        capacity_shortfalls,
        search: input.counters,
        annealing: input.annealing,
        ranker_cache: input.cache,
        capacity: input.capacity,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
