/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! End-to-end scenarios through the public API.

use std::collections::HashSet;

use uctp_engine::config::{BandConfig, ConstraintMode, EngineConfig, GridConfig};
use uctp_engine::dataset::Dataset;
use uctp_engine::model::{Booking, Preference, PreferenceLevel, Room, Session};
use uctp_engine::period::PeriodWindow;
use uctp_engine::problem::Problem;
use uctp_engine::scheduler::anneal::grid_score;
use uctp_engine::scheduler::ranker::RoomRanker;
use uctp_engine::scheduler::{
    ConflictTracker, ScheduleOutcome, SearchContext, TimetableScheduler, UnassignedReason,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn session(id: &str, group: &str, prof: &str, duration: u8) -> Session {
    Session {
        id: id.into(),
        course_name: format!("course {id}"),
        class_group: group.into(),
        professor_id: prof.into(),
        year: group
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
            .unwrap_or(1),
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
        capacity: Some(60),
        room_type: "Classroom".into(),
        building: "A".into(),
    }
}

fn config(mode: ConstraintMode, anneal: bool) -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.search.mode = mode;
    cfg.annealing.enabled = anneal;
    cfg.annealing.max_iterations = 3_000;
    cfg
}

/// One day of six periods: morning 1-2, afternoon 3-4, night 5-6.
fn one_day_grid() -> GridConfig {
    GridConfig {
        days: vec!["Monday".into()],
        periods_per_day: 6,
        bands: BandConfig {
            morning: (1, 2),
            afternoon: (3, 4),
            night: (5, 6),
        },
        rest_periods: vec![],
        midweek_days: vec![],
    }
}

fn build(
    cfg: EngineConfig,
    sessions: Vec<Session>,
    rooms: Vec<Room>,
    prefs: Vec<Preference>,
) -> ScheduleOutcome {
    let scheduler = TimetableScheduler::new(cfg).unwrap();
    let problem = Problem::new(sessions, rooms, prefs, scheduler.periods()).unwrap();
    scheduler.build(&problem).unwrap()
}

/// Every (day, period, room), (day, period, professor) and
/// (day, period, group) triple occupied at most once.
fn assert_no_clashes(bookings: &[Booking], check_people: bool) {
    let mut rooms = HashSet::new();
    let mut profs = HashSet::new();
    let mut groups = HashSet::new();
    for b in bookings {
        for p in b.window.periods() {
            assert!(rooms.insert((b.day, p, b.room)), "room double-booked: {b:?}");
            if check_people {
                assert!(profs.insert((b.day, p, b.professor)), "professor clash: {b:?}");
                assert!(groups.insert((b.day, p, b.group)), "group clash: {b:?}");
            }
        }
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn same_professor_and_group_with_one_room_are_spread_apart() {
    for mode in [ConstraintMode::Hard, ConstraintMode::Soft] {
        let out = build(
            config(mode, false),
            vec![session("a", "1DA", "p", 1), session("b", "1DA", "p", 1)],
            vec![room("only")],
            vec![],
        );
        assert_eq!(out.statistics.assigned, 2, "{mode}");
        let bookings: Vec<Booking> = out.timetable.bookings().copied().collect();
        assert_ne!(
            (bookings[0].day, bookings[0].window.start),
            (bookings[1].day, bookings[1].window.start)
        );
        assert_no_clashes(&bookings, true);
        assert_eq!(out.statistics.conflicts.total(), 0);
    }
}

#[test]
fn three_period_session_without_three_free_periods_is_unassigned() {
    let mut cfg = config(ConstraintMode::Soft, true);
    // night band 21-30 broken into runs of at most two periods
    cfg.grid.rest_periods = vec![23, 26, 29];
    let out = build(
        cfg,
        vec![session("long", "1NA", "p", 3)],
        vec![room("r1"), room("r2")],
        vec![],
    );
    assert_eq!(out.statistics.assigned, 0);
    assert_eq!(out.timetable.occupied_cells(), 0, "no partial placement");
    assert_eq!(
        out.statistics.unassigned_sessions[0].reason,
        UnassignedReason::NoValidSequence {
            duration: 3,
            affinity: uctp_engine::model::GroupAffinity::Night
        }
        .to_string()
    );
}

#[test]
fn full_grid_leaves_every_session_unassigned() {
    // no room at all: every (day, period) combination is "full"
    let sessions: Vec<Session> = (0..5)
        .map(|i| session(&format!("s{i}"), "1DA", &format!("p{i}"), 2))
        .collect();
    let out = build(config(ConstraintMode::Soft, true), sessions, vec![], vec![]);
    assert_eq!(out.statistics.assigned, 0);
    assert_eq!(out.statistics.unassigned_sessions.len(), 5);
    assert!(out.statistics.fallback_used);
    assert!(out
        .statistics
        .unassigned_sessions
        .iter()
        .all(|u| u.reason == UnassignedReason::NoCandidate.to_string()));
}

#[test]
fn forbidden_period_is_used_when_it_is_the_only_option() {
    let mut cfg = config(ConstraintMode::Soft, false);
    cfg.grid = one_day_grid();
    // day group: periods 1-4, three of them rest periods
    cfg.grid.rest_periods = vec![1, 2, 3];
    let prefs = vec![Preference {
        professor_id: "p".into(),
        day: "Monday".into(),
        period: 4,
        level: PreferenceLevel::Forbidden,
    }];
    let out = build(cfg, vec![session("s", "1DA", "p", 1)], vec![room("r")], prefs);

    assert_eq!(out.statistics.assigned, 1);
    let b = out.timetable.booking(0).unwrap();
    assert_eq!(b.window, PeriodWindow::new(4, 1));
    assert_eq!(out.statistics.preferences.forbidden, 1);
}

#[test]
fn hard_mode_never_double_books_anyone() {
    let sessions: Vec<Session> = (0..40)
        .map(|i| {
            session(
                &format!("s{i:02}"),
                ["1DA", "1DB", "2DA", "3NA"][i % 4],
                &format!("p{}", i % 5),
                1 + (i % 3) as u8,
            )
        })
        .collect();
    let rooms = vec![room("r1"), room("r2"), room("r3")];
    let out = build(config(ConstraintMode::Hard, true), sessions, rooms, vec![]);

    let bookings: Vec<Booking> = out.timetable.bookings().copied().collect();
    assert_no_clashes(&bookings, true);
    assert_eq!(out.statistics.conflicts.total(), 0);
    assert_eq!(out.statistics.assigned + out.statistics.unassigned, 40);
}

#[test]
fn parallel_build_never_double_books_a_room() {
    let sessions: Vec<Session> = (0..80)
        .map(|i| {
            session(
                &format!("s{i:02}"),
                ["1DA", "1DB", "2DA", "2DB", "3NA"][i % 5],
                &format!("p{}", i % 7),
                1 + (i % 4) as u8,
            )
        })
        .collect();
    for mode in [ConstraintMode::Soft, ConstraintMode::Hard] {
        let mut cfg = config(mode, false);
        cfg.search.parallel = true;
        cfg.search.workers = Some(4);
        let out = build(cfg, sessions.clone(), vec![room("r1"), room("r2")], vec![]);

        let bookings: Vec<Booking> = out.timetable.bookings().copied().collect();
        assert_no_clashes(&bookings, mode == ConstraintMode::Hard);
        assert_eq!(out.statistics.conflicts.room, 0);
        assert!(out.statistics.parallel);
        assert_eq!(
            out.statistics.search.parallel_assignments as usize,
            out.statistics.assigned
        );
    }
}

#[test]
fn annealed_grid_scores_at_least_the_constructive_grid() {
    let sessions: Vec<Session> = (0..24)
        .map(|i| {
            session(
                &format!("s{i:02}"),
                ["1DA", "2DA", "3DA"][i % 3],
                &format!("p{}", i % 4),
                1 + (i % 2) as u8,
            )
        })
        .collect();
    let prefs: Vec<Preference> = (1..=10)
        .map(|period| Preference {
            professor_id: "p0".into(),
            day: "Monday".into(),
            period,
            level: PreferenceLevel::Unwanted,
        })
        .collect();

    let scheduler = TimetableScheduler::new(config(ConstraintMode::Soft, true)).unwrap();
    let problem = Problem::new(sessions, vec![room("r1"), room("r2")], prefs, scheduler.periods()).unwrap();
    let out = scheduler.build(&problem).unwrap();
    let report = out.statistics.annealing.unwrap();
    assert!(report.best_score >= report.initial_score);

    // rescore the returned grid independently
    let ranker = RoomRanker::new(&Default::default());
    let ctx = SearchContext {
        problem: &problem,
        periods: scheduler.periods(),
        ranker: &ranker,
    };
    let mut tracker = ConflictTracker::new(
        scheduler.periods().day_count(),
        scheduler.periods().periods_per_day(),
        problem.room_count(),
        problem.session_count(),
    );
    let bookings: Vec<Booking> = out.timetable.bookings().copied().collect();
    tracker.restore(&bookings).unwrap();
    let rescored = grid_score(&ctx, &tracker);
    assert!(rescored + 1e-6 >= report.initial_score, "{rescored} < {}", report.initial_score);
}

#[test]
fn release_and_recommit_round_trip() {
    let mut t = ConflictTracker::new(5, 30, 2, 2);
    let b = Booking {
        session: 0,
        professor: 0,
        group: 0,
        room: 1,
        day: 2,
        window: PeriodWindow::new(7, 3),
    };
    t.commit(b).unwrap();
    for (prof, room, group) in [(0, 9, 9), (9, 1, 9), (9, 9, 0)] {
        assert!(t.has_conflict(2, PeriodWindow::new(9, 1), prof, room, group));
    }
    let masks = (
        t.timetable().professor_mask(0, 2),
        t.timetable().room_mask(1, 2),
        t.timetable().group_mask(0, 2),
    );

    let released = t.release(0).unwrap();
    assert!(!t.has_conflict(2, b.window, 0, 1, 0));
    t.commit(released).unwrap();
    assert_eq!(
        masks,
        (
            t.timetable().professor_mask(0, 2),
            t.timetable().room_mask(1, 2),
            t.timetable().group_mask(0, 2),
        )
    );
    assert!(t.verify().is_ok());
}

#[test]
fn yaml_dataset_and_config_drive_a_full_build() {
    let config = EngineConfig::from_yaml_str(
        r#"
grid:
  rest_periods: [10]
search:
  mode: hard
annealing:
  max_iterations: 500
  seed: 3
"#,
    )
    .unwrap();
    let dataset = Dataset::from_yaml_str(
        r#"
sessions:
  - { course: Algebra, class_group: 1DA, professor: P1, class_type: T, periods: 2 }
  - { course: Algebra, class_group: 1DA, professor: P1, class_type: TP, periods: 2, room_type: Lab }
  - { course: Databases, class_group: 2NA, professor: P2, class_type: T, periods: 3 }
rooms:
  - { id: F1, capacity: 40, type: Classroom, building: F }
  - { id: L1, capacity: 25, type: Lab, building: F }
preferences:
  - { professor: P1, day: Monday, period: 1, available: false }
"#,
    )
    .unwrap();

    let scheduler = TimetableScheduler::new(config).unwrap();
    let problem = dataset.into_problem(scheduler.periods()).unwrap();
    let out = scheduler.build(&problem).unwrap();

    assert_eq!(out.statistics.assigned, 3);
    assert_eq!(out.statistics.room_type_mismatches, 0);
    assert_eq!(out.statistics.preferences.forbidden, 0);
    let lab = out.timetable.booking(1).unwrap();
    assert_eq!(problem.room(lab.room).id, "L1");
    for b in out.timetable.bookings() {
        assert!(!b.window.periods().any(|p| p == 10), "rest period used: {b:?}");
    }
    let night = out.timetable.booking(2).unwrap();
    assert!(night.window.start >= 21);
}
