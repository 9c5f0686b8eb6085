//! Timetable scheduler.
//!
//! [`TimetableScheduler`] places every [`Session`] of a [`Problem`] on a
//! (day, consecutive periods, room) slot of the weekly grid.  A build runs
//! these phases in order:
//!
//! 1. capacity pre-check (advisory, see [`capacity`])
//! 2. constructive pass in the configured mode, sequential or
//!    [`parallel`]
//! 3. hard-mode retry from scratch when a soft pass assigned nothing
//! 4. simulated annealing over the committed bookings ([`anneal`])
//! 5. invariant verification and statistics ([`report`])
//!
//! # Constructive pass
//!
//! Sessions are taken in (year, semester, longest first, id) order.  For each
//! one every (day × window × room) combination is scored and the best is
//! committed:
//!
//! | Term | Score |
//! |---|---|
//! | Period inside the year's preferred band | +3 each |
//! | Professor preference | +2 / +1 / −2 / −10 per period |
//! | Required room type not matched | −10 |
//! | Period already held by the professor or class group | −20 each |
//!
//! An occupied room is never a candidate.  In hard mode any professor or
//! class-group overlap, and any room-type mismatch, discards the candidate.
//! Ties keep the first candidate in enumeration order, so sequential builds
//! are deterministic.
//!
//! All per-build state lives in a [`SchedulerState`] created inside
//! [`TimetableScheduler::build`]; the scheduler itself is `Send + Sync` and
//! can run several builds.

pub mod anneal;
pub mod capacity;
pub mod error;
pub mod parallel;
pub mod ranker;
pub mod report;
pub mod tracker;

pub use error::{SchedulerError, SetupError, UnassignedReason};
pub use report::Statistics;
pub use tracker::{ConflictTracker, Conflicts, Timetable};

use std::cmp::Reverse;
use std::ops::AddAssign;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConstraintMode, EngineConfig};
use crate::model::{Booking, DayIdx, RoomIdx, Session, SessionIdx};
use crate::period::{Band, PeriodModel, PeriodWindow};
use crate::problem::Problem;

use anneal::{AnnealReport, Annealer};
use ranker::RoomRanker;

/// Penalty per period already held by the professor or the class group.
const CONFLICT_PENALTY: i32 = 20;
/// Bonus per period inside the year's preferred band.
const YEAR_BAND_BONUS: i32 = 3;
/// Penalty when the required room type is not matched.
const ROOM_TYPE_PENALTY: i32 = 10;

// ── Search counters ───────────────────────────────────────────────────────────

/// Traceability counters of the constructive passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchCounters {
    /// Sessions the search was run for (re-searches under the lock included).
    pub assignment_attempts: u64,
    /// (day, window, room) candidates checked against the tracker.
    pub conflict_checks: u64,
    /// Commits made by parallel workers.
    pub parallel_assignments: u64,
}

impl AddAssign for SearchCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.assignment_attempts += rhs.assignment_attempts;
        self.conflict_checks += rhs.conflict_checks;
        self.parallel_assignments += rhs.parallel_assignments;
    }
}

// ── Candidates ────────────────────────────────────────────────────────────────

/// Best placement found for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub booking: Booking,
    /// Soft score without the conflict term.
    pub quality: i32,
    pub conflicts: Conflicts,
}

impl Candidate {
    pub fn score(&self) -> i32 {
        self.quality - CONFLICT_PENALTY * self.conflicts.periods() as i32
    }
}

/// Whether `room` fails the session's required room type.
pub fn room_type_mismatch(problem: &Problem, session: &Session, room: RoomIdx) -> bool {
    session
        .required_room_type
        .as_deref()
        .is_some_and(|required| !problem.room(room).has_type(required))
}

/// Soft score of `booking` without the conflict term.
pub fn placement_quality(problem: &Problem, periods: &PeriodModel, booking: &Booking) -> i32 {
    let session = problem.session(booking.session);
    let mut quality = Band::preferred_for_year(session.year)
        .map(|band| YEAR_BAND_BONUS * periods.band_overlap(booking.window, band) as i32)
        .unwrap_or(0);
    quality += problem.preference_score(booking.professor, booking.day, booking.window);
    if room_type_mismatch(problem, session, booking.room) {
        quality -= ROOM_TYPE_PENALTY;
    }
    quality
}

/// Sessions in placement order: year, semester, longest first, then id.
pub fn session_order(problem: &Problem) -> Vec<SessionIdx> {
    let mut order: Vec<SessionIdx> = (0..problem.session_count()).collect();
    order.sort_by_key(|&i| {
        let s = problem.session(i);
        (s.year, s.semester, Reverse(s.periods_needed), s.id.as_str())
    });
    order
}

/// Read-only inputs shared by every search, including parallel workers.
pub struct SearchContext<'a> {
    pub problem: &'a Problem,
    pub periods: &'a PeriodModel,
    pub ranker: &'a RoomRanker,
}

impl SearchContext<'_> {
    /// Days least-loaded first; year-2 sessions try midweek days before the
    /// rest.
    fn day_order(&self, tracker: &ConflictTracker, year: u8) -> Vec<DayIdx> {
        let mut days: Vec<DayIdx> = (0..self.periods.day_count()).collect();
        days.sort_by_key(|&d| {
            let outside_midweek = year == 2 && !self.periods.is_midweek(d);
            (outside_midweek, tracker.day_load(d), d)
        });
        days
    }

    /// Valid windows, most periods in the year's preferred band first.
    fn window_order(&self, session: &Session) -> Vec<PeriodWindow> {
        let mut windows = self
            .periods
            .valid_sequences(session.affinity(), session.periods_needed)
            .to_vec();
        if let Some(band) = Band::preferred_for_year(session.year) {
            windows.sort_by_key(|&w| Reverse(self.periods.band_overlap(w, band)));
        }
        windows
    }

    /// Find the best candidate for `session` against the current tracker
    /// state.
    ///
    /// Never mutates the tracker.
    pub fn search(
        &self,
        tracker: &ConflictTracker,
        session: SessionIdx,
        mode: ConstraintMode,
        counters: &mut SearchCounters,
    ) -> Result<Candidate, UnassignedReason> {
        counters.assignment_attempts += 1;
        let s = self.problem.session(session);

        let windows = self.window_order(s);
        if windows.is_empty() {
            return Err(UnassignedReason::NoValidSequence {
                duration: s.periods_needed,
                affinity: s.affinity(),
            });
        }
        let days = self.day_order(tracker, s.year);
        let rooms = self.ranker.rank(self.problem, session, tracker.room_usage());
        let keys = self.problem.keys(session);

        let mut best: Option<Candidate> = None;
        let mut saw_free_room = false;
        for &day in &days {
            for &window in &windows {
                for &room in rooms.iter() {
                    counters.conflict_checks += 1;
                    let conflicts = tracker.conflicts(day, window, keys.professor, room, keys.group);
                    if conflicts.room != 0 {
                        continue;
                    }
                    saw_free_room = true;
                    if mode == ConstraintMode::Hard
                        && (!conflicts.is_clear() || room_type_mismatch(self.problem, s, room))
                    {
                        continue;
                    }
                    let booking = self.problem.booking(session, day, window, room);
                    let candidate = Candidate {
                        booking,
                        quality: placement_quality(self.problem, self.periods, &booking),
                        conflicts,
                    };
                    if best.map_or(true, |b| candidate.score() > b.score()) {
                        best = Some(candidate);
                    }
                }
            }
        }

        best.ok_or(if saw_free_room {
            UnassignedReason::NoConflictFreeCandidate
        } else {
            UnassignedReason::NoCandidate
        })
    }
}

// ── Per-build state ───────────────────────────────────────────────────────────

/// Everything a single constructive pass produces.
#[derive(Debug)]
pub struct SchedulerState {
    pub tracker: ConflictTracker,
    pub unassigned: Vec<(SessionIdx, UnassignedReason)>,
    pub counters: SearchCounters,
}

impl SchedulerState {
    pub fn new(problem: &Problem, periods: &PeriodModel) -> Self {
        Self {
            tracker: ConflictTracker::new(
                periods.day_count(),
                periods.periods_per_day(),
                problem.room_count(),
                problem.session_count(),
            ),
            unassigned: Vec::new(),
            counters: SearchCounters::default(),
        }
    }

    pub fn assigned(&self) -> usize {
        self.tracker.placed_count()
    }
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// Result of [`TimetableScheduler::build`]: the finalized grid plus its
/// statistics.
#[derive(Debug)]
pub struct ScheduleOutcome {
    pub timetable: Timetable,
    pub statistics: Statistics,
}

// ── TimetableScheduler ────────────────────────────────────────────────────────

/// The timetabling engine.
#[derive(Debug, Clone)]
pub struct TimetableScheduler {
    config: EngineConfig,
    periods: PeriodModel,
}

impl TimetableScheduler {
    /// Validate `config` and build the period model described by
    /// `config.grid`.
    ///
    /// # Errors
    /// [`SetupError::Config`] for settings the engine cannot run with,
    /// [`SetupError::Grid`] for an invalid grid.
    pub fn new(config: EngineConfig) -> Result<Self, SetupError> {
        config
            .validate()
            .map_err(|e| SetupError::Config(format!("{e:#}")))?;
        let periods = PeriodModel::new(&config.grid)?;
        Ok(Self { config, periods })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The grid problems must be built against.
    pub fn periods(&self) -> &PeriodModel {
        &self.periods
    }

    // ── Public entry point ────────────────────────────────────────────────────

    /// Schedule every session of `problem`.
    ///
    /// Sessions that cannot be placed are reported in the statistics; only
    /// broken engine invariants are returned as errors.
    ///
    /// `problem` must have been created against [`periods`](Self::periods).
    pub fn build(&self, problem: &Problem) -> Result<ScheduleOutcome, SchedulerError> {
        let search = &self.config.search;
        info!(
            sessions = problem.session_count(),
            rooms = problem.room_count(),
            mode = %search.mode,
            parallel = search.parallel,
            "=== TimetableScheduler::build() ==="
        );

        let capacity = capacity::analyse(problem, &self.periods);
        let ranker = RoomRanker::new(&self.config.ranker);
        let ctx = SearchContext {
            problem,
            periods: &self.periods,
            ranker: &ranker,
        };
        let order = session_order(problem);

        // ── Constructive pass + fallback ──────────────────────────────────────
        let mut mode = search.mode;
        let mut state = self.run_pass(&ctx, &order, mode)?;
        let mut counters = state.counters;
        let mut fallback_used = false;

        if state.assigned() == 0 && mode == ConstraintMode::Soft && !order.is_empty() {
            warn!("soft pass assigned nothing, rebuilding in hard mode");
            mode = ConstraintMode::Hard;
            fallback_used = true;
            ranker.clear();
            state = self.run_pass(&ctx, &order, mode)?;
            counters += state.counters;
        }
        if state.assigned() == 0 && !order.is_empty() {
            warn!(
                sessions = order.len(),
                "no session could be placed, returning an empty timetable"
            );
        }

        // ── Annealing ─────────────────────────────────────────────────────────
        let annealing: Option<AnnealReport> = if self.config.annealing.enabled && state.assigned() > 0 {
            let annealer = Annealer::new(&self.config.annealing, mode);
            Some(annealer.run(&ctx, &mut state.tracker)?)
        } else {
            None
        };

        // ── Verification + report ─────────────────────────────────────────────
        state.tracker.verify()?;
        let statistics = report::compile(report::ReportInput {
            problem,
            periods: &self.periods,
            timetable: state.tracker.timetable(),
            unassigned: &state.unassigned,
            mode,
            fallback_used,
            parallel: search.parallel,
            counters,
            annealing,
            cache: ranker.cache_stats(),
            capacity,
        });

        info!(
            assigned = statistics.assigned,
            unassigned = statistics.unassigned,
            occupied_slots = statistics.occupied_slots,
            mode = %mode,
            fallback = fallback_used,
            "=== Build complete ==="
        );

        Ok(ScheduleOutcome {
            timetable: state.tracker.into_timetable(),
            statistics,
        })
    }

    fn run_pass(
        &self,
        ctx: &SearchContext<'_>,
        order: &[SessionIdx],
        mode: ConstraintMode,
    ) -> Result<SchedulerState, SchedulerError> {
        if self.config.search.parallel {
            let workers = parallel::worker_count(self.config.search.workers, order.len());
            parallel::run_pass(ctx, order, mode, workers)
        } else {
            Self::run_sequential(ctx, order, mode)
        }
    }

    /// One constructive pass over `order` on the calling thread.
    pub fn run_sequential(
        ctx: &SearchContext<'_>,
        order: &[SessionIdx],
        mode: ConstraintMode,
    ) -> Result<SchedulerState, SchedulerError> {
        info!(mode = %mode, sessions = order.len(), "Executing sequential pass");
        let mut state = SchedulerState::new(ctx.problem, ctx.periods);

        for &session in order {
            match ctx.search(&state.tracker, session, mode, &mut state.counters) {
                Ok(candidate) => {
                    state.tracker.commit(candidate.booking)?;
                    log_placed(ctx, &candidate);
                }
                Err(reason) => {
                    log_unassigned(ctx, session, &reason);
                    state.unassigned.push((session, reason));
                }
            }
        }

        info!(
            mode = %mode,
            assigned = state.assigned(),
            unassigned = state.unassigned.len(),
            "sequential pass done"
        );
        Ok(state)
    }
}

fn log_placed(ctx: &SearchContext<'_>, c: &Candidate) {
    let b = &c.booking;
    debug!(
        session = %ctx.problem.session(b.session).id,
        day = %ctx.periods.day_name(b.day),
        periods = %b.window,
        room = %ctx.problem.room(b.room).id,
        score = c.score(),
        conflict_periods = c.conflicts.periods(),
        "✓ placed"
    );
}

fn log_unassigned(ctx: &SearchContext<'_>, session: SessionIdx, reason: &UnassignedReason) {
    warn!(
        session = %ctx.problem.session(session).id,
        reason = %reason,
        "✗ unassigned"
    );
}

// ── Tests ─────────────────────────────────────────────────────────────────────
