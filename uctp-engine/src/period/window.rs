/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pure bitmask helpers for consecutive period windows.
//!
//! Periods are 1-based; bit `p - 1` of a `u64` mask stands for period `p`.
//! These are free functions and a small `Copy` value type so they can be
//! used by the period model, the conflict tracker and the annealer alike.

/// Largest number of periods a day may have (one `u64` bit per period).
pub const MAX_PERIODS_PER_DAY: u8 = 64;

/// Mask of `len` consecutive bits starting at 1-based period `start`.
///
/// Returns `0` for `len == 0` or `start == 0`, and saturates to the top bit
/// instead of overflowing when the window runs past period 64.
pub fn span_mask(start: u8, len: u8) -> u64 {
    if len == 0 || start == 0 || start > MAX_PERIODS_PER_DAY {
        return 0;
    }
    let low = if len >= MAX_PERIODS_PER_DAY {
        u64::MAX
    } else {
        (1u64 << len) - 1
    };
    low << (start - 1)
}

/// Mask with every period of an inclusive `first..=last` range set.
pub fn range_mask(first: u8, last: u8) -> u64 {
    if last < first {
        return 0;
    }
    span_mask(first, last - first + 1)
}

/// Mask of a whole day with `periods_per_day` periods.
pub fn day_mask(periods_per_day: u8) -> u64 {
    span_mask(1, periods_per_day)
}

/// Expand a mask into its 1-based period numbers, lowest first.
pub fn periods_of(mut mask: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(mask.count_ones() as usize);
    while mask != 0 {
        let bit = mask.trailing_zeros() as u8;
        out.push(bit + 1);
        mask &= mask - 1;
    }
    out
}

// ── PeriodWindow ──────────────────────────────────────────────────────────────

/// An ordered run of consecutive periods on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct PeriodWindow {
    /// First period of the run (1-based).
    pub start: u8,
    /// Number of consecutive periods.
    pub len: u8,
}

impl PeriodWindow {
    pub fn new(start: u8, len: u8) -> Self {
        Self { start, len }
    }

    /// Last period covered by the window (inclusive).
    pub fn end(&self) -> u8 {
        self.start + self.len.saturating_sub(1)
    }

    /// Bitmask of the covered periods.
    pub fn mask(&self) -> u64 {
        span_mask(self.start, self.len)
    }

    /// The covered period numbers, in order.
    pub fn periods(&self) -> impl Iterator<Item = u8> {
        self.start..self.start + self.len
    }

    /// Same start, different length.
    pub fn with_len(&self, len: u8) -> Self {
        Self {
            start: self.start,
            len,
        }
    }
}

impl std::fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.len <= 1 {
            write!(f, "P{}", self.start)
        } else {
            write!(f, "P{}-P{}", self.start, self.end())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
