/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The weekly period grid.
//!
//! A week is a fixed list of days, each split into `periods_per_day`
//! numbered periods (1-based).  Three contiguous bands (morning, afternoon,
//! night) partition the teaching day, and a set of rest periods can never be
//! part of a session.
//!
//! At construction the model precomputes, for every class-group affinity and
//! every duration `1..=periods_per_day`, the list of consecutive windows a
//! session may occupy:
//!
//! | Affinity | Allowed periods |
//! |----------|-----------------|
//! | `Day` (`?D…` groups) | morning ∪ afternoon |
//! | `Night` (`?N…` groups) | night |
//! | `Any` | the whole day |
//!
//! Rest periods are removed from every allowed set.  A rest period that lies
//! inside a band is still a rest period: it wins over the band and is logged
//! with `warn!` when the model is built.

pub mod window;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::GridConfig;
use crate::model::GroupAffinity;
pub use window::PeriodWindow;
use window::{day_mask, periods_of, range_mask, span_mask, MAX_PERIODS_PER_DAY};

// ── Bands ─────────────────────────────────────────────────────────────────────

/// Time-of-day band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Band {
    Morning,
    Afternoon,
    Night,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Morning, Band::Afternoon, Band::Night];

    fn index(self) -> usize {
        match self {
            Band::Morning => 0,
            Band::Afternoon => 1,
            Band::Night => 2,
        }
    }

    /// Band favoured by a cohort's academic year.
    ///
    /// Years 1 and 3 lean towards the morning, year 2 towards the afternoon.
    /// Other years have no band preference.
    pub fn preferred_for_year(year: u8) -> Option<Band> {
        match year {
            1 | 3 => Some(Band::Morning),
            2 => Some(Band::Afternoon),
            _ => None,
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Band::Morning => "morning",
            Band::Afternoon => "afternoon",
            Band::Night => "night",
        };
        f.write_str(s)
    }
}

// ── Error type ────────────────────────────────────────────────────────────────

/// Reasons a grid definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// The day list is empty.
    NoDays,

    /// The same day name appears twice.
    DuplicateDay(String),

    /// `periods_per_day` is zero or does not fit in a `u64` bitmask.
    InvalidPeriodCount { requested: u8 },

    /// A band's range is inverted or runs outside `1..=periods_per_day`.
    BandOutOfRange {
        band: Band,
        first: u8,
        last: u8,
        periods_per_day: u8,
    },

    /// Two bands share at least one period.
    BandsOverlap { a: Band, b: Band },

    /// A rest period lies outside `1..=periods_per_day`.
    RestOutOfRange { period: u8, periods_per_day: u8 },

    /// A midweek day is not part of the day list.
    UnknownMidweekDay(String),
}

impl std::fmt::Display for PeriodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodError::NoDays => write!(f, "the grid has no days"),
            PeriodError::DuplicateDay(day) => write!(f, "day '{day}' is listed twice"),
            PeriodError::InvalidPeriodCount { requested } => write!(
                f,
                "periods_per_day must be within 1..={MAX_PERIODS_PER_DAY}, got {requested}"
            ),
            PeriodError::BandOutOfRange {
                band,
                first,
                last,
                periods_per_day,
            } => write!(
                f,
                "{band} band {first}..={last} is not inside 1..={periods_per_day}"
            ),
            PeriodError::BandsOverlap { a, b } => write!(f, "{a} and {b} bands overlap"),
            PeriodError::RestOutOfRange {
                period,
                periods_per_day,
            } => write!(
                f,
                "rest period {period} is not inside 1..={periods_per_day}"
            ),
            PeriodError::UnknownMidweekDay(day) => {
                write!(f, "midweek day '{day}' is not one of the grid days")
            }
        }
    }
}

impl std::error::Error for PeriodError {}

// ── PeriodModel ───────────────────────────────────────────────────────────────

/// Immutable description of the weekly grid plus the precomputed candidate
/// windows per (affinity, duration).
///
/// Built once per engine and shared read-only by every scheduling pass,
/// including the parallel workers.
#[derive(Debug, Clone)]
pub struct PeriodModel {
    days: Vec<String>,
    periods_per_day: u8,
    band_masks: [u64; 3],
    rest_mask: u64,
    midweek: Vec<usize>,
    sequences: HashMap<(GroupAffinity, u8), Vec<PeriodWindow>>,
}

impl PeriodModel {
    /// Validate `grid` and precompute all candidate windows.
    pub fn new(grid: &GridConfig) -> Result<Self, PeriodError> {
        if grid.days.is_empty() {
            return Err(PeriodError::NoDays);
        }
        for (i, day) in grid.days.iter().enumerate() {
            if grid.days[..i].iter().any(|d| d.eq_ignore_ascii_case(day)) {
                return Err(PeriodError::DuplicateDay(day.clone()));
            }
        }

        let ppd = grid.periods_per_day;
        if ppd == 0 || ppd > MAX_PERIODS_PER_DAY {
            return Err(PeriodError::InvalidPeriodCount { requested: ppd });
        }

        let ranges = [
            (Band::Morning, grid.bands.morning),
            (Band::Afternoon, grid.bands.afternoon),
            (Band::Night, grid.bands.night),
        ];
        let mut band_masks = [0u64; 3];
        for (band, (first, last)) in ranges {
            if first == 0 || last < first || last > ppd {
                return Err(PeriodError::BandOutOfRange {
                    band,
                    first,
                    last,
                    periods_per_day: ppd,
                });
            }
            band_masks[band.index()] = range_mask(first, last);
        }
        for (i, a) in Band::ALL.iter().enumerate() {
            for b in &Band::ALL[i + 1..] {
                if band_masks[a.index()] & band_masks[b.index()] != 0 {
                    return Err(PeriodError::BandsOverlap { a: *a, b: *b });
                }
            }
        }

        let mut rest_mask = 0u64;
        for &period in &grid.rest_periods {
            if period == 0 || period > ppd {
                return Err(PeriodError::RestOutOfRange {
                    period,
                    periods_per_day: ppd,
                });
            }
            rest_mask |= span_mask(period, 1);
        }
        for band in Band::ALL {
            let inside = rest_mask & band_masks[band.index()];
            if inside != 0 {
                warn!(
                    band = %band,
                    periods = ?periods_of(inside),
                    "rest periods inside a band are excluded from every candidate window"
                );
            }
        }

        let mut midweek = Vec::with_capacity(grid.midweek_days.len());
        for name in &grid.midweek_days {
            let idx = grid
                .days
                .iter()
                .position(|d| d.eq_ignore_ascii_case(name))
                .ok_or_else(|| PeriodError::UnknownMidweekDay(name.clone()))?;
            midweek.push(idx);
        }

        let mut model = Self {
            days: grid.days.clone(),
            periods_per_day: ppd,
            band_masks,
            rest_mask,
            midweek,
            sequences: HashMap::new(),
        };
        model.precompute_sequences();
        Ok(model)
    }

    fn precompute_sequences(&mut self) {
        for affinity in GroupAffinity::ALL {
            let allowed = self.allowed_mask(affinity);
            for duration in 1..=self.periods_per_day {
                let windows: Vec<PeriodWindow> = (1..=self.periods_per_day - duration + 1)
                    .map(|start| PeriodWindow::new(start, duration))
                    .filter(|w| w.mask() & allowed == w.mask())
                    .collect();
                self.sequences.insert((affinity, duration), windows);
            }
            debug!(
                affinity = %affinity,
                allowed = ?periods_of(allowed),
                "candidate windows precomputed"
            );
        }
    }

    // ── Grid accessors ────────────────────────────────────────────────────────

    pub fn days(&self) -> &[String] {
        &self.days
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn day_name(&self, day: usize) -> &str {
        self.days.get(day).map(String::as_str).unwrap_or("?")
    }

    /// Case-insensitive lookup of a day name.
    pub fn day_index(&self, name: &str) -> Option<usize> {
        self.days.iter().position(|d| d.eq_ignore_ascii_case(name.trim()))
    }

    pub fn periods_per_day(&self) -> u8 {
        self.periods_per_day
    }

    pub fn band_mask(&self, band: Band) -> u64 {
        self.band_masks[band.index()]
    }

    pub fn rest_mask(&self) -> u64 {
        self.rest_mask
    }

    /// Whether `day` is one of the configured midweek days.
    pub fn is_midweek(&self, day: usize) -> bool {
        self.midweek.contains(&day)
    }

    // ── Candidate windows ─────────────────────────────────────────────────────

    /// Periods a group with `affinity` may occupy, rest periods removed.
    pub fn allowed_mask(&self, affinity: GroupAffinity) -> u64 {
        let base = match affinity {
            GroupAffinity::Day => self.band_mask(Band::Morning) | self.band_mask(Band::Afternoon),
            GroupAffinity::Night => self.band_mask(Band::Night),
            GroupAffinity::Any => day_mask(self.periods_per_day),
        };
        base & !self.rest_mask
    }

    /// Number of periods per day a group with `affinity` can be booked into.
    pub fn bookable_periods(&self, affinity: GroupAffinity) -> u32 {
        self.allowed_mask(affinity).count_ones()
    }

    /// All consecutive windows of length `duration` valid for `affinity`.
    ///
    /// Empty when no such window exists, including `duration == 0` and
    /// durations longer than a day.
    pub fn valid_sequences(&self, affinity: GroupAffinity, duration: u8) -> &[PeriodWindow] {
        self.sequences
            .get(&(affinity, duration))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `window` is one of the candidate windows for `affinity`.
    pub fn is_valid_window(&self, affinity: GroupAffinity, window: PeriodWindow) -> bool {
        if window.len == 0 || window.start == 0 || window.end() > self.periods_per_day {
            return false;
        }
        let mask = window.mask();
        mask & self.allowed_mask(affinity) == mask
    }

    /// How many periods of `window` fall inside `band`.
    pub fn band_overlap(&self, window: PeriodWindow, band: Band) -> u32 {
        (window.mask() & self.band_mask(band)).count_ones()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BandConfig, GridConfig};

    fn default_model() -> PeriodModel {
        PeriodModel::new(&GridConfig::default()).unwrap()
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn default_grid_matches_weekly_layout() {
        let m = default_model();
        assert_eq!(m.day_count(), 5);
        assert_eq!(m.periods_per_day(), 30);
        assert_eq!(m.band_mask(Band::Morning), range_mask(1, 10));
        assert_eq!(m.band_mask(Band::Night), range_mask(21, 30));
        assert_eq!(m.day_index("wednesday"), Some(2));
        assert!(m.is_midweek(1) && m.is_midweek(3));
        assert!(!m.is_midweek(0) && !m.is_midweek(4));
    }

    #[test]
    fn empty_day_list_is_rejected() {
        let grid = GridConfig {
            days: vec![],
            midweek_days: vec![],
            ..GridConfig::default()
        };
        assert_eq!(PeriodModel::new(&grid).unwrap_err(), PeriodError::NoDays);
    }

    #[test]
    fn more_than_64_periods_is_rejected() {
        let grid = GridConfig {
            periods_per_day: 65,
            ..GridConfig::default()
        };
        assert!(matches!(
            PeriodModel::new(&grid),
            Err(PeriodError::InvalidPeriodCount { requested: 65 })
        ));
    }

    #[test]
    fn overlapping_bands_are_rejected() {
        let grid = GridConfig {
            bands: BandConfig {
                morning: (1, 12),
                afternoon: (11, 20),
                night: (21, 30),
            },
            ..GridConfig::default()
        };
        assert!(matches!(
            PeriodModel::new(&grid),
            Err(PeriodError::BandsOverlap { .. })
        ));
    }

    #[test]
    fn rest_period_out_of_range_is_rejected() {
        let grid = GridConfig {
            rest_periods: vec![31],
            ..GridConfig::default()
        };
        assert!(matches!(
            PeriodModel::new(&grid),
            Err(PeriodError::RestOutOfRange { period: 31, .. })
        ));
    }

    #[test]
    fn unknown_midweek_day_is_rejected() {
        let grid = GridConfig {
            midweek_days: vec!["Sunday".into()],
            ..GridConfig::default()
        };
        assert!(matches!(
            PeriodModel::new(&grid),
            Err(PeriodError::UnknownMidweekDay(_))
        ));
    }

    // ── Candidate windows ─────────────────────────────────────────────────────

    #[test]
    fn day_groups_only_get_morning_and_afternoon_windows() {
        let m = default_model();
        let windows = m.valid_sequences(GroupAffinity::Day, 2);
        // periods 1..=20 → 19 windows of length 2, crossing the band edge allowed
        assert_eq!(windows.len(), 19);
        assert!(windows.iter().all(|w| w.end() <= 20));
        assert!(windows.contains(&PeriodWindow::new(10, 2)));
    }

    #[test]
    fn night_groups_only_get_night_windows() {
        let m = default_model();
        let windows = m.valid_sequences(GroupAffinity::Night, 3);
        assert_eq!(windows.len(), 8);
        assert!(windows.iter().all(|w| w.start >= 21));
    }

    #[test]
    fn any_affinity_spans_the_whole_day() {
        let m = default_model();
        assert_eq!(m.valid_sequences(GroupAffinity::Any, 1).len(), 30);
        assert_eq!(m.valid_sequences(GroupAffinity::Any, 30).len(), 1);
    }

    #[test]
    fn durations_without_room_in_the_band_have_no_windows() {
        let m = default_model();
        assert!(m.valid_sequences(GroupAffinity::Night, 11).is_empty());
        assert!(m.valid_sequences(GroupAffinity::Any, 0).is_empty());
        assert!(m.valid_sequences(GroupAffinity::Any, 31).is_empty());
    }

    #[test]
    fn rest_periods_break_windows_even_inside_a_band() {
        let grid = GridConfig {
            rest_periods: vec![25],
            ..GridConfig::default()
        };
        let m = PeriodModel::new(&grid).unwrap();
        let singles = m.valid_sequences(GroupAffinity::Night, 1);
        assert_eq!(singles.len(), 9);
        assert!(!singles.contains(&PeriodWindow::new(25, 1)));
        // 21..=24 and 26..=30 are the only runs left
        let fives = m.valid_sequences(GroupAffinity::Night, 5);
        assert_eq!(fives, &[PeriodWindow::new(26, 5)]);
        assert!(!m.is_valid_window(GroupAffinity::Any, PeriodWindow::new(24, 2)));
    }

    #[test]
    fn is_valid_window_checks_bounds_and_affinity() {
        let m = default_model();
        assert!(m.is_valid_window(GroupAffinity::Day, PeriodWindow::new(19, 2)));
        assert!(!m.is_valid_window(GroupAffinity::Day, PeriodWindow::new(20, 2)));
        assert!(!m.is_valid_window(GroupAffinity::Any, PeriodWindow::new(30, 2)));
        assert!(!m.is_valid_window(GroupAffinity::Any, PeriodWindow::new(0, 1)));
    }

    #[test]
    fn band_overlap_counts_periods_in_band() {
        let m = default_model();
        assert_eq!(m.band_overlap(PeriodWindow::new(9, 4), Band::Morning), 2);
        assert_eq!(m.band_overlap(PeriodWindow::new(9, 4), Band::Afternoon), 2);
        assert_eq!(m.band_overlap(PeriodWindow::new(9, 4), Band::Night), 0);
    }

    #[test]
    fn preferred_band_by_year() {
        assert_eq!(Band::preferred_for_year(1), Some(Band::Morning));
        assert_eq!(Band::preferred_for_year(2), Some(Band::Afternoon));
        assert_eq!(Band::preferred_for_year(3), Some(Band::Morning));
        assert_eq!(Band::preferred_for_year(4), None);
    }
}
