/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Parallel constructive pass.
//!
//! Workers pull sessions from a shared cursor over the placement order.
//! Each session goes through two phases:
//!
//! 1. **search** under a shared read lock: the candidate enumeration of
//!    [`SearchContext::search`], run concurrently by every worker.
//! 2. **check and commit** under one exclusive write lock: the candidate's
//!    conflicts are recomputed against the current state; if anything changed
//!    since the search, the search is repeated while the lock is held.  The
//!    commit happens before the lock is released.
//!
//! Step 2 is a single critical section per session, so two workers can never
//! both see a cell as free and book it twice.
//!
//! The result is valid but not reproducible: which worker commits first
//! depends on thread timing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::thread;

use tracing::{debug, info};

use crate::config::ConstraintMode;
use crate::model::SessionIdx;

use super::error::{SchedulerError, UnassignedReason};
use super::tracker::ConflictTracker;
use super::{log_placed, log_unassigned, Candidate, SchedulerState, SearchContext, SearchCounters};

/// Number of workers for `sessions` sessions.
///
/// `requested` can lower the count below the hardware parallelism, never
/// raise it.  The result is always at least 1 and never more than the number
/// of sessions.
pub fn worker_count(requested: Option<usize>, sessions: usize) -> usize {
    let hw = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    requested.unwrap_or(hw).min(hw).min(sessions).max(1)
}

/// What one worker hands back when the cursor runs out.
#[derive(Debug, Default)]
struct WorkerResult {
    unassigned: Vec<(SessionIdx, UnassignedReason)>,
    counters: SearchCounters,
}

/// Whether `candidate` would still be found with the same conflicts.
fn still_valid(tracker: &ConflictTracker, candidate: &Candidate) -> bool {
    let b = &candidate.booking;
    tracker.conflicts(b.day, b.window, b.professor, b.room, b.group) == candidate.conflicts
}

fn worker(
    id: usize,
    ctx: &SearchContext<'_>,
    order: &[SessionIdx],
    mode: ConstraintMode,
    cursor: &AtomicUsize,
    tracker: &RwLock<ConflictTracker>,
) -> Result<WorkerResult, SchedulerError> {
    let mut result = WorkerResult::default();

    loop {
        let next = cursor.fetch_add(1, Ordering::Relaxed);
        let Some(&session) = order.get(next) else {
            break;
        };

        // ── Phase 1: search under the read lock ──────────────────────────────
        let proposal = {
            let guard = tracker.read().unwrap_or_else(PoisonError::into_inner);
            ctx.search(&guard, session, mode, &mut result.counters)
        };

        // Placements only ever accumulate during a pass, so a session with no
        // candidate now will not gain one later.
        let proposal = match proposal {
            Ok(candidate) => candidate,
            Err(reason) => {
                log_unassigned(ctx, session, &reason);
                result.unassigned.push((session, reason));
                continue;
            }
        };

        // ── Phase 2: check + commit in one critical section ──────────────────
        let mut guard = tracker.write().unwrap_or_else(PoisonError::into_inner);
        let chosen = if still_valid(&guard, &proposal) {
            Ok(proposal)
        } else {
            debug!(worker = id, session, "candidate went stale, searching again under the lock");
            ctx.search(&guard, session, mode, &mut result.counters)
        };
        match chosen {
            Ok(candidate) => {
                guard.commit(candidate.booking)?;
                result.counters.parallel_assignments += 1;
                log_placed(ctx, &candidate);
            }
            Err(reason) => {
                log_unassigned(ctx, session, &reason);
                result.unassigned.push((session, reason));
            }
        }
    }

    debug!(
        worker = id,
        attempts = result.counters.assignment_attempts,
        commits = result.counters.parallel_assignments,
        "worker finished"
    );
    Ok(result)
}

/// One constructive pass over `order` spread across `workers` threads.
pub fn run_pass(
    ctx: &SearchContext<'_>,
    order: &[SessionIdx],
    mode: ConstraintMode,
    workers: usize,
) -> Result<SchedulerState, SchedulerError> {
    info!(mode = %mode, sessions = order.len(), workers, "Executing parallel pass");

    let SchedulerState {
        tracker,
        mut unassigned,
        mut counters,
    } = SchedulerState::new(ctx.problem, ctx.periods);
    let tracker = RwLock::new(tracker);
    let cursor = AtomicUsize::new(0);

    let results: Vec<Result<WorkerResult, SchedulerError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers.max(1))
            .map(|id| {
                let (tracker, cursor) = (&tracker, &cursor);
                scope.spawn(move || worker(id, ctx, order, mode, cursor, tracker))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    for result in results {
        let r = result?;
        unassigned.extend(r.unassigned);
        counters += r.counters;
    }
    // Report in placement order regardless of which worker finished first.
    let position = |s: SessionIdx| order.iter().position(|&o| o == s).unwrap_or(usize::MAX);
    unassigned.sort_by_key(|&(s, _)| position(s));

    let tracker = tracker.into_inner().unwrap_or_else(PoisonError::into_inner);
    let state = SchedulerState {
        tracker,
        unassigned,
        counters,
    };
    info!(
        mode = %mode,
        assigned = state.assigned(),
        unassigned = state.unassigned.len(),
        "parallel pass done"
    );
    Ok(state)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::model::{Room, Session};
    use crate::period::PeriodModel;
    use crate::problem::Problem;
    use crate::scheduler::ranker::RoomRanker;
    use crate::scheduler::session_order;

    fn problem(periods: &PeriodModel, sessions: usize, rooms: usize) -> Problem {
        let sessions = (0..sessions)
            .map(|i| Session {
                id: format!("s{i:03}"),
                class_group: format!("1D{}", i % 4),
                professor_id: format!("p{}", i % 6),
                year: 1,
                semester: 1,
                periods_needed: 1 + (i % 3) as u8,
                ..Default::default()
            })
            .collect();
        let rooms = (0..rooms)
            .map(|i| Room {
                id: format!("r{i}"),
                name: format!("r{i}"),
                ..Default::default()
            })
            .collect();
        Problem::new(sessions, rooms, vec![], periods).unwrap()
    }

    #[test]
    fn worker_count_is_clamped() {
        let hw = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(worker_count(Some(8), 3), 3.min(hw));
        assert_eq!(worker_count(Some(1), 100), 1);
        assert_eq!(worker_count(Some(4), 0), 1);
        assert_eq!(worker_count(None, 100), hw.min(100));
    }

    #[test]
    fn requested_workers_never_exceed_hardware_parallelism() {
        let hw = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(worker_count(Some(hw + 4), 1_000), hw);
    }

    #[test]
    fn parallel_pass_never_double_books() {
        let periods = PeriodModel::new(&GridConfig::default()).unwrap();
        let p = problem(&periods, 60, 3);
        let ranker = RoomRanker::new(&Default::default());
        let ctx = SearchContext {
            problem: &p,
            periods: &periods,
            ranker: &ranker,
        };
        let order = session_order(&p);

        for mode in [ConstraintMode::Soft, ConstraintMode::Hard] {
            let state = run_pass(&ctx, &order, mode, 4).unwrap();
            assert!(state.tracker.verify().is_ok());
            assert_eq!(state.assigned() + state.unassigned.len(), 60);
            assert_eq!(state.counters.parallel_assignments as usize, state.assigned());

            let t = state.tracker.timetable();
            let cells: usize = t.bookings().map(|b| b.window.len as usize).sum();
            assert_eq!(cells, t.occupied_cells(), "every booked period owns its cell");
            if mode == ConstraintMode::Hard {
                assert_eq!(t.professor_table().stacked_periods(), 0);
                assert_eq!(t.group_table().stacked_periods(), 0);
            }
        }
    }

    #[test]
    fn parallel_and_sequential_place_the_same_count_when_uncontended() {
        let periods = PeriodModel::new(&GridConfig::default()).unwrap();
        let p = problem(&periods, 20, 10);
        let ranker = RoomRanker::new(&Default::default());
        let ctx = SearchContext {
            problem: &p,
            periods: &periods,
            ranker: &ranker,
        };
        let order = session_order(&p);
        let par = run_pass(&ctx, &order, ConstraintMode::Hard, 3).unwrap();
        assert_eq!(par.assigned(), 20);
        assert!(par.unassigned.is_empty());
    }
}
