/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Conflict tracker: the timetable grid plus its per-entity bitmask tables.
//!
//! ```text
//!   Timetable (read-only view)
//!   ├── grid       [day][period][room] → Option<SessionIdx>
//!   ├── bookings   [session]           → Option<Booking>
//!   ├── professors (professor, day)    → u64 occupied periods
//!   ├── rooms      (room, day)         → u64 occupied periods
//!   └── groups     (group, day)        → u64 occupied periods
//! ```
//!
//! [`ConflictTracker`] owns the [`Timetable`] and is the only type that can
//! mutate it.  Every commit and release updates the grid and all three
//! tables together, so a period bit is set exactly when some committed
//! booking covers that (entity, day, period).
//!
//! Soft-mode builds may commit a professor or class-group overlap.  The
//! extra occupants are counted in a side table so releasing one of two
//! overlapping bookings leaves the bit set for the other.  Rooms never
//! overlap: a commit onto an occupied grid cell is an error.

use std::collections::{BTreeMap, HashMap};

use crate::model::{Booking, DayIdx, GroupIdx, ProfessorIdx, RoomIdx, SessionIdx};
use crate::period::window::periods_of;
use crate::period::PeriodWindow;

use super::error::SchedulerError;

// ── OccupancyTable ────────────────────────────────────────────────────────────

/// Occupied periods per (entity, day).
///
/// No entry exists until the (entity, day) pair is first occupied; absent
/// entries read as zero.
#[derive(Debug, Clone, Default)]
pub struct OccupancyTable {
    masks: HashMap<(usize, DayIdx), u64>,
    /// Occupants beyond the first, per (entity, day, period).
    stacked: HashMap<(usize, DayIdx, u8), u16>,
}

impl OccupancyTable {
    pub fn mask(&self, entity: usize, day: DayIdx) -> u64 {
        self.masks.get(&(entity, day)).copied().unwrap_or(0)
    }

    /// Periods of `mask` already occupied by `entity` on `day`.
    pub fn overlap(&self, entity: usize, day: DayIdx, mask: u64) -> u64 {
        self.mask(entity, day) & mask
    }

    /// Number of (entity, day) pairs referenced so far.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Total periods held by more than one occupant.
    pub fn stacked_periods(&self) -> u32 {
        self.stacked.values().map(|&n| n as u32).sum()
    }

    fn occupy(&mut self, entity: usize, day: DayIdx, mask: u64) {
        let slot = self.masks.entry((entity, day)).or_insert(0);
        for period in periods_of(*slot & mask) {
            *self.stacked.entry((entity, day, period)).or_insert(0) += 1;
        }
        *slot |= mask;
    }

    fn vacate(&mut self, entity: usize, day: DayIdx, mask: u64) {
        let Some(slot) = self.masks.get_mut(&(entity, day)) else {
            return;
        };
        for period in periods_of(mask) {
            let key = (entity, day, period);
            match self.stacked.get_mut(&key) {
                Some(n) if *n > 1 => *n -= 1,
                Some(_) => {
                    self.stacked.remove(&key);
                }
                None => *slot &= !crate::period::window::span_mask(period, 1),
            }
        }
    }

    fn clear(&mut self) {
        self.masks.clear();
        self.stacked.clear();
    }

    /// Non-zero masks in key order, for comparisons.
    fn normalized(&self) -> BTreeMap<(usize, DayIdx), u64> {
        self.masks
            .iter()
            .filter(|(_, &m)| m != 0)
            .map(|(&k, &m)| (k, m))
            .collect()
    }

    fn normalized_stacked(&self) -> BTreeMap<(usize, DayIdx, u8), u16> {
        self.stacked.iter().map(|(&k, &n)| (k, n)).collect()
    }
}

// ── Conflicts ─────────────────────────────────────────────────────────────────

/// Periods of a candidate window already held by each entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Conflicts {
    pub professor: u64,
    pub room: u64,
    pub group: u64,
}

impl Conflicts {
    /// Distinct periods with at least one conflict.
    pub fn periods(&self) -> u32 {
        (self.professor | self.room | self.group).count_ones()
    }

    pub fn is_clear(&self) -> bool {
        self.professor | self.room | self.group == 0
    }
}

// ── Timetable ─────────────────────────────────────────────────────────────────

/// Dense (day, period, room) grid plus the bitmask tables that mirror it.
///
/// Only readable from outside this module; see [`ConflictTracker`].
#[derive(Debug, Clone)]
pub struct Timetable {
    days: usize,
    periods_per_day: u8,
    rooms: usize,
    grid: Vec<Option<SessionIdx>>,
    bookings: Vec<Option<Booking>>,
    professors: OccupancyTable,
    room_table: OccupancyTable,
    groups: OccupancyTable,
}

impl Timetable {
    fn new(days: usize, periods_per_day: u8, rooms: usize, sessions: usize) -> Self {
        Self {
            days,
            periods_per_day,
            rooms,
            grid: vec![None; days * periods_per_day as usize * rooms],
            bookings: vec![None; sessions],
            professors: OccupancyTable::default(),
            room_table: OccupancyTable::default(),
            groups: OccupancyTable::default(),
        }
    }

    fn index(&self, day: DayIdx, period: u8, room: RoomIdx) -> usize {
        (day * self.periods_per_day as usize + (period as usize - 1)) * self.rooms + room
    }

    pub fn day_count(&self) -> usize {
        self.days
    }

    pub fn periods_per_day(&self) -> u8 {
        self.periods_per_day
    }

    pub fn room_count(&self) -> usize {
        self.rooms
    }

    /// Session occupying (`day`, `period`, `room`), if any.
    ///
    /// Out-of-range coordinates read as empty.
    pub fn cell(&self, day: DayIdx, period: u8, room: RoomIdx) -> Option<SessionIdx> {
        if day >= self.days || period == 0 || period > self.periods_per_day || room >= self.rooms {
            return None;
        }
        self.grid[self.index(day, period, room)]
    }

    pub fn booking(&self, session: SessionIdx) -> Option<&Booking> {
        self.bookings.get(session).and_then(Option::as_ref)
    }

    /// Committed bookings in session order.
    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().flatten()
    }

    pub fn placed_count(&self) -> usize {
        self.bookings.iter().filter(|b| b.is_some()).count()
    }

    /// Grid cells holding a session.
    pub fn occupied_cells(&self) -> usize {
        self.grid.iter().filter(|c| c.is_some()).count()
    }

    pub fn professor_mask(&self, professor: ProfessorIdx, day: DayIdx) -> u64 {
        self.professors.mask(professor, day)
    }

    pub fn room_mask(&self, room: RoomIdx, day: DayIdx) -> u64 {
        self.room_table.mask(room, day)
    }

    pub fn group_mask(&self, group: GroupIdx, day: DayIdx) -> u64 {
        self.groups.mask(group, day)
    }

    pub fn professor_table(&self) -> &OccupancyTable {
        &self.professors
    }

    pub fn room_table(&self) -> &OccupancyTable {
        &self.room_table
    }

    pub fn group_table(&self) -> &OccupancyTable {
        &self.groups
    }
}

// ── ConflictTracker ───────────────────────────────────────────────────────────

/// Sole mutator of a [`Timetable`].
///
/// Also keeps the running counters the assigner orders by: periods booked
/// per day and bookings per room.
#[derive(Debug, Clone)]
pub struct ConflictTracker {
    table: Timetable,
    day_load: Vec<u32>,
    room_usage: Vec<u32>,
}

impl ConflictTracker {
    pub fn new(days: usize, periods_per_day: u8, rooms: usize, sessions: usize) -> Self {
        Self {
            table: Timetable::new(days, periods_per_day, rooms, sessions),
            day_load: vec![0; days],
            room_usage: vec![0; rooms],
        }
    }

    pub fn timetable(&self) -> &Timetable {
        &self.table
    }

    pub fn into_timetable(self) -> Timetable {
        self.table
    }

    /// Periods booked on `day` across all rooms.
    pub fn day_load(&self, day: DayIdx) -> u32 {
        self.day_load.get(day).copied().unwrap_or(0)
    }

    /// Number of bookings currently held by each room.
    pub fn room_usage(&self) -> &[u32] {
        &self.room_usage
    }

    pub fn placed_count(&self) -> usize {
        self.table.placed_count()
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Periods of `window` on `day` already held by the professor, the room
    /// or the class group.
    pub fn conflicts(
        &self,
        day: DayIdx,
        window: PeriodWindow,
        professor: ProfessorIdx,
        room: RoomIdx,
        group: GroupIdx,
    ) -> Conflicts {
        let mask = window.mask();
        Conflicts {
            professor: self.table.professors.overlap(professor, day, mask),
            room: self.table.room_table.overlap(room, day, mask),
            group: self.table.groups.overlap(group, day, mask),
        }
    }

    /// True when any period of `window` is taken for any of the three
    /// entities.
    pub fn has_conflict(
        &self,
        day: DayIdx,
        window: PeriodWindow,
        professor: ProfessorIdx,
        room: RoomIdx,
        group: GroupIdx,
    ) -> bool {
        !self.conflicts(day, window, professor, room, group).is_clear()
    }

    /// True when `room` is free for the whole of `window` on `day`.
    pub fn room_free(&self, day: DayIdx, window: PeriodWindow, room: RoomIdx) -> bool {
        self.table.room_table.overlap(room, day, window.mask()) == 0
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    fn check_bounds(&self, b: &Booking) -> Result<(), SchedulerError> {
        let t = &self.table;
        let out_of_range = |kind, index, limit| SchedulerError::EntityOutOfRange { kind, index, limit };
        if b.session >= t.bookings.len() {
            return Err(out_of_range("session", b.session, t.bookings.len()));
        }
        if b.day >= t.days {
            return Err(out_of_range("day", b.day, t.days));
        }
        if b.room >= t.rooms {
            return Err(out_of_range("room", b.room, t.rooms));
        }
        if b.window.len == 0 || b.window.start == 0 || b.window.end() > t.periods_per_day {
            return Err(out_of_range(
                "period",
                b.window.end() as usize,
                t.periods_per_day as usize,
            ));
        }
        Ok(())
    }

    /// Place `booking`: write its grid cells and set its bits in all three
    /// tables.
    ///
    /// Either everything is written or nothing is.
    ///
    /// # Errors
    /// - [`SchedulerError::EntityOutOfRange`] for coordinates outside the grid.
    /// - [`SchedulerError::AlreadyPlaced`] if the session has a booking.
    /// - [`SchedulerError::SlotOccupied`] if any covered cell is taken.
    pub fn commit(&mut self, booking: Booking) -> Result<(), SchedulerError> {
        self.check_bounds(&booking)?;
        if self.table.bookings[booking.session].is_some() {
            return Err(SchedulerError::AlreadyPlaced(booking.session));
        }
        for period in booking.window.periods() {
            let idx = self.table.index(booking.day, period, booking.room);
            if let Some(occupant) = self.table.grid[idx] {
                return Err(SchedulerError::SlotOccupied {
                    day: booking.day,
                    period,
                    room: booking.room,
                    occupant,
                });
            }
        }

        for period in booking.window.periods() {
            let idx = self.table.index(booking.day, period, booking.room);
            self.table.grid[idx] = Some(booking.session);
        }
        let mask = booking.window.mask();
        self.table.professors.occupy(booking.professor, booking.day, mask);
        self.table.room_table.occupy(booking.room, booking.day, mask);
        self.table.groups.occupy(booking.group, booking.day, mask);
        self.table.bookings[booking.session] = Some(booking);

        self.day_load[booking.day] += booking.window.len as u32;
        self.room_usage[booking.room] += 1;
        Ok(())
    }

    /// Remove the booking of `session` and clear its cells and bits.
    ///
    /// Returns the released booking so the caller can re-commit it.
    pub fn release(&mut self, session: SessionIdx) -> Result<Booking, SchedulerError> {
        let limit = self.table.bookings.len();
        let booking = self
            .table
            .bookings
            .get_mut(session)
            .ok_or(SchedulerError::EntityOutOfRange {
                kind: "session",
                index: session,
                limit,
            })?
            .take()
            .ok_or(SchedulerError::NotPlaced(session))?;

        for period in booking.window.periods() {
            let idx = self.table.index(booking.day, period, booking.room);
            self.table.grid[idx] = None;
        }
        let mask = booking.window.mask();
        self.table.professors.vacate(booking.professor, booking.day, mask);
        self.table.room_table.vacate(booking.room, booking.day, mask);
        self.table.groups.vacate(booking.group, booking.day, mask);

        self.day_load[booking.day] -= booking.window.len as u32;
        self.room_usage[booking.room] -= 1;
        Ok(booking)
    }

    /// Drop every booking.
    pub fn reset(&mut self) {
        self.table.grid.iter_mut().for_each(|c| *c = None);
        self.table.bookings.iter_mut().for_each(|b| *b = None);
        self.table.professors.clear();
        self.table.room_table.clear();
        self.table.groups.clear();
        self.day_load.iter_mut().for_each(|n| *n = 0);
        self.room_usage.iter_mut().for_each(|n| *n = 0);
    }

    /// Replace the current state with exactly `bookings`.
    pub fn restore(&mut self, bookings: &[Booking]) -> Result<(), SchedulerError> {
        self.reset();
        for &b in bookings {
            self.commit(b)?;
        }
        Ok(())
    }

    /// Snapshot of the committed bookings.
    pub fn snapshot(&self) -> Vec<Booking> {
        self.table.bookings().copied().collect()
    }

    // ── Verification ──────────────────────────────────────────────────────────

    /// Rebuild the grid and tables from the booking list and compare.
    ///
    /// # Errors
    /// [`SchedulerError::InvariantViolation`] naming the first disagreement.
    pub fn verify(&self) -> Result<(), SchedulerError> {
        let t = &self.table;
        let mut fresh = ConflictTracker::new(t.days, t.periods_per_day, t.rooms, t.bookings.len());
        for &b in t.bookings() {
            fresh.commit(b).map_err(|e| SchedulerError::InvariantViolation {
                detail: format!("booking of session {} cannot be replayed: {e}", b.session),
            })?;
        }
        let f = &fresh.table;

        if f.grid != t.grid {
            return Err(SchedulerError::InvariantViolation {
                detail: "grid cells disagree with the booking list".into(),
            });
        }
        let tables = [
            ("professor", &t.professors, &f.professors),
            ("room", &t.room_table, &f.room_table),
            ("class-group", &t.groups, &f.groups),
        ];
        for (kind, live, rebuilt) in tables {
            if live.normalized() != rebuilt.normalized()
                || live.normalized_stacked() != rebuilt.normalized_stacked()
            {
                return Err(SchedulerError::InvariantViolation {
                    detail: format!("{kind} bitmasks disagree with the booking list"),
                });
            }
        }
        if fresh.day_load != self.day_load || fresh.room_usage != self.room_usage {
            return Err(SchedulerError::InvariantViolation {
                detail: "load counters disagree with the booking list".into(),
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
