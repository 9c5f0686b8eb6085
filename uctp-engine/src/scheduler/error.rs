/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Error types for the timetable scheduler.
//!
//! Two enums model the two failure layers of a build:
//!
//! * [`UnassignedReason`]: why a single session could not be placed.  Never
//!   fatal; recorded in the statistics and the build carries on.
//! * [`SchedulerError`]: a broken invariant inside the engine (grid and
//!   bitmasks disagree, a booking names a missing entity).  Aborts the build.
//!
//! Every variant carries the indices or identifiers needed to emit a
//! fully-qualified `tracing` event without further lookups.

use thiserror::Error;

use crate::model::{DayIdx, GroupAffinity, RoomIdx, SessionIdx};
use crate::period::PeriodError;

// ── Per-session outcome ───────────────────────────────────────────────────────

/// Why a session ended up unassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnassignedReason {
    /// The grid has no consecutive window of this length for the group's
    /// affinity (after rest periods are removed).
    NoValidSequence { duration: u8, affinity: GroupAffinity },

    /// Every (day, window, room) combination was blocked by an occupied room.
    NoCandidate,

    /// Hard mode: every free candidate overlapped the professor or class
    /// group, or needed a room of the wrong type.
    NoConflictFreeCandidate,
}

impl std::fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnassignedReason::NoValidSequence { duration, affinity } => write!(
                f,
                "no {} consecutive periods available for a {} group",
                duration, affinity
            ),
            UnassignedReason::NoCandidate => {
                write!(f, "every room is occupied for every candidate window")
            }
            UnassignedReason::NoConflictFreeCandidate => write!(
                f,
                "no candidate free of professor, class-group and room-type conflicts"
            ),
        }
    }
}

// ── Fatal errors ──────────────────────────────────────────────────────────────

/// Invariant violations that abort a build attempt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// A commit would overwrite a grid cell that already holds a session.
    #[error("room {room} on day {day} period {period} already holds session {occupant}")]
    SlotOccupied {
        day: DayIdx,
        period: u8,
        room: RoomIdx,
        occupant: SessionIdx,
    },

    /// The session already has a committed booking.
    #[error("session {0} is already placed")]
    AlreadyPlaced(SessionIdx),

    /// `release` was called for a session without a booking.
    #[error("session {0} is not placed")]
    NotPlaced(SessionIdx),

    /// A booking references a day, room, session or period outside the grid.
    #[error("{kind} index {index} is out of range (limit {limit})")]
    EntityOutOfRange {
        kind: &'static str,
        index: usize,
        limit: usize,
    },

    /// The grid, the bitmask tables and the booking list no longer agree.
    #[error("timetable invariant violated: {detail}")]
    InvariantViolation { detail: String },
}

// ── Setup errors ──────────────────────────────────────────────────────────────

/// Why a [`TimetableScheduler`](super::TimetableScheduler) cannot be created.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    /// A setting rejected by [`EngineConfig::validate`](crate::config::EngineConfig::validate).
    #[error("invalid engine configuration: {0}")]
    Config(String),

    #[error("invalid grid: {0}")]
    Grid(#[from] PeriodError),
}
