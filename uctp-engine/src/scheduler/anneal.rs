/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Simulated-annealing post-pass.
//!
//! Each iteration picks two distinct placed sessions and swaps their
//! (day, start period, room); each keeps its own length.  The move is
//! discarded outright when a new window is invalid for the session's group,
//! when it would land on an occupied room, or (hard mode) when it would
//! create any professor / class-group overlap or room-type mismatch.
//!
//! Grid score:
//!
//! ```text
//! 10 × occupied cells − 50 × unscheduled sessions
//!   + Σ over scheduled sessions (1 + 0.1 × placement quality)
//!   − 20 × overlapping professor / class-group periods
//! ```
//!
//! Improving moves are always accepted; worse ones with probability
//! `exp(Δ / T)`.  The temperature is multiplied by the cooling rate every
//! iteration until it drops below the minimum, the iteration cap is hit, or
//! the optional time limit runs out.  The best grid seen is restored at the
//! end, so the result never scores below the constructive grid.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{AnnealConfig, ConstraintMode};
use crate::model::{Booking, SessionIdx};

use super::error::SchedulerError;
use super::tracker::ConflictTracker;
use super::{placement_quality, room_type_mismatch, SearchContext};

const OCCUPIED_WEIGHT: f64 = 10.0;
const UNSCHEDULED_PENALTY: f64 = 50.0;
const QUALITY_WEIGHT: f64 = 0.1;
const OVERLAP_PENALTY: f64 = 20.0;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The temperature fell below the minimum.
    Cooled,
    /// `max_iterations` reached.
    IterationCap,
    /// `time_limit_ms` elapsed.
    TimeLimit,
    /// Fewer than two sessions placed; no swap exists.
    NothingToSwap,
}

/// Counters of one annealing run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnealReport {
    pub iterations: u64,
    /// Proposals that passed the move checks.
    pub feasible_moves: u64,
    pub accepted: u64,
    /// Accepted moves that raised the score.
    pub improved: u64,
    pub initial_score: f64,
    pub best_score: f64,
    pub final_temperature: f64,
    pub stop: StopReason,
}

/// Sum of the parts of the score that change under a swap.
fn overlap_periods(tracker: &ConflictTracker) -> u32 {
    let t = tracker.timetable();
    t.professor_table().stacked_periods() + t.group_table().stacked_periods()
}

/// Full grid score.
pub fn grid_score(ctx: &SearchContext<'_>, tracker: &ConflictTracker) -> f64 {
    let t = tracker.timetable();
    let placed = t.placed_count();
    let unscheduled = ctx.problem.session_count() - placed;
    let bonus: f64 = t
        .bookings()
        .map(|b| 1.0 + QUALITY_WEIGHT * placement_quality(ctx.problem, ctx.periods, b) as f64)
        .sum();
    OCCUPIED_WEIGHT * t.occupied_cells() as f64 - UNSCHEDULED_PENALTY * unscheduled as f64 + bonus
        - OVERLAP_PENALTY * overlap_periods(tracker) as f64
}

pub struct Annealer<'a> {
    config: &'a AnnealConfig,
    mode: ConstraintMode,
}

impl<'a> Annealer<'a> {
    /// # Panics
    /// If the cooling rate is not strictly between 0 and 1; the loop would
    /// never terminate on temperature alone.
    pub fn new(config: &'a AnnealConfig, mode: ConstraintMode) -> Self {
        assert!(
            config.cooling_rate > 0.0 && config.cooling_rate < 1.0,
            "cooling rate must be in (0, 1), got {}",
            config.cooling_rate
        );
        Self { config, mode }
    }

    /// Anneal the bookings held by `tracker` in place, leaving the best grid
    /// seen.
    pub fn run(
        &self,
        ctx: &SearchContext<'_>,
        tracker: &mut ConflictTracker,
    ) -> Result<AnnealReport, SchedulerError> {
        let cfg = self.config;
        let placed: Vec<SessionIdx> = tracker.timetable().bookings().map(|b| b.session).collect();
        let initial_score = grid_score(ctx, tracker);

        let mut report = AnnealReport {
            iterations: 0,
            feasible_moves: 0,
            accepted: 0,
            improved: 0,
            initial_score,
            best_score: initial_score,
            final_temperature: cfg.initial_temperature,
            stop: StopReason::Cooled,
        };
        if placed.len() < 2 {
            report.stop = StopReason::NothingToSwap;
            info!(placed = placed.len(), "annealing skipped, nothing to swap");
            return Ok(report);
        }

        info!(
            placed = placed.len(),
            initial_score,
            scheduled_iterations = cfg.scheduled_iterations().min(cfg.max_iterations),
            seed = cfg.seed,
            "Executing simulated annealing"
        );

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let deadline = cfg
            .time_limit_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        // Per-session quality cache; only the two swapped entries change.
        let mut quality: Vec<f64> = vec![0.0; ctx.problem.session_count()];
        for b in tracker.timetable().bookings() {
            quality[b.session] = placement_quality(ctx.problem, ctx.periods, b) as f64;
        }

        let mut current = initial_score;
        let mut best_snapshot: Vec<Booking> = tracker.snapshot();
        let mut temperature = cfg.initial_temperature;
        let mut overlaps = overlap_periods(tracker);

        while temperature > cfg.min_temperature {
            if report.iterations >= cfg.max_iterations {
                report.stop = StopReason::IterationCap;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                report.stop = StopReason::TimeLimit;
                break;
            }
            report.iterations += 1;

            let i = rng.gen_range(0..placed.len());
            let mut j = rng.gen_range(0..placed.len() - 1);
            if j >= i {
                j += 1;
            }
            let (a, b) = (placed[i], placed[j]);

            if let Some((old_a, old_b)) = self.try_swap(ctx, tracker, a, b)? {
                report.feasible_moves += 1;
                let q_a = self.quality_of(ctx, tracker, a);
                let q_b = self.quality_of(ctx, tracker, b);
                let new_overlaps = overlap_periods(tracker);
                let delta = QUALITY_WEIGHT * (q_a + q_b - quality[a] - quality[b])
                    - OVERLAP_PENALTY * (new_overlaps as f64 - overlaps as f64);

                let accept = delta >= 0.0 || rng.gen::<f64>() < (delta / temperature).exp();
                if accept {
                    report.accepted += 1;
                    if delta > 0.0 {
                        report.improved += 1;
                    }
                    quality[a] = q_a;
                    quality[b] = q_b;
                    overlaps = new_overlaps;
                    current += delta;
                    if current > report.best_score {
                        report.best_score = current;
                        best_snapshot = tracker.snapshot();
                    }
                } else {
                    Self::undo(tracker, a, b, old_a, old_b)?;
                }
            }

            temperature *= cfg.cooling_rate;
        }
        report.final_temperature = temperature;

        if current < report.best_score {
            debug!(current, best = report.best_score, "restoring best grid");
            tracker.restore(&best_snapshot)?;
        }

        info!(
            iterations = report.iterations,
            accepted = report.accepted,
            improved = report.improved,
            best_score = report.best_score,
            stop = ?report.stop,
            "annealing done"
        );
        Ok(report)
    }

    fn quality_of(&self, ctx: &SearchContext<'_>, tracker: &ConflictTracker, session: SessionIdx) -> f64 {
        tracker
            .timetable()
            .booking(session)
            .map(|b| placement_quality(ctx.problem, ctx.periods, b) as f64)
            .unwrap_or(0.0)
    }

    /// Swap the placements of `a` and `b` if the move is allowed.
    ///
    /// Returns the previous bookings when the swap was applied; on `None`
    /// the tracker is unchanged.
    fn try_swap(
        &self,
        ctx: &SearchContext<'_>,
        tracker: &mut ConflictTracker,
        a: SessionIdx,
        b: SessionIdx,
    ) -> Result<Option<(Booking, Booking)>, SchedulerError> {
        let t = tracker.timetable();
        let (Some(&old_a), Some(&old_b)) = (t.booking(a), t.booking(b)) else {
            return Err(SchedulerError::InvariantViolation {
                detail: format!("annealer lost the booking of session {a} or {b}"),
            });
        };

        let new_a = old_a.moved_to(old_b.day, old_b.window.with_len(old_a.window.len), old_b.room);
        let new_b = old_b.moved_to(old_a.day, old_a.window.with_len(old_b.window.len), old_a.room);

        let problem = ctx.problem;
        let fits = |booking: &Booking| {
            ctx.periods
                .is_valid_window(problem.keys(booking.session).affinity, booking.window)
        };
        if !fits(&new_a) || !fits(&new_b) {
            return Ok(None);
        }
        if self.mode == ConstraintMode::Hard
            && (room_type_mismatch(problem, problem.session(a), new_a.room)
                || room_type_mismatch(problem, problem.session(b), new_b.room))
        {
            return Ok(None);
        }

        tracker.release(a)?;
        tracker.release(b)?;

        if !self.admissible(tracker, &new_a) {
            tracker.commit(old_a)?;
            tracker.commit(old_b)?;
            return Ok(None);
        }
        tracker.commit(new_a)?;
        if !self.admissible(tracker, &new_b) {
            tracker.release(a)?;
            tracker.commit(old_a)?;
            tracker.commit(old_b)?;
            return Ok(None);
        }
        tracker.commit(new_b)?;
        Ok(Some((old_a, old_b)))
    }

    fn admissible(&self, tracker: &ConflictTracker, b: &Booking) -> bool {
        match self.mode {
            ConstraintMode::Soft => tracker.room_free(b.day, b.window, b.room),
            ConstraintMode::Hard => !tracker.has_conflict(b.day, b.window, b.professor, b.room, b.group),
        }
    }

    fn undo(
        tracker: &mut ConflictTracker,
        a: SessionIdx,
        b: SessionIdx,
        old_a: Booking,
        old_b: Booking,
    ) -> Result<(), SchedulerError> {
        tracker.release(a)?;
        tracker.release(b)?;
        tracker.commit(old_a)?;
        tracker.commit(old_b)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
