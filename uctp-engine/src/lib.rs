/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! UCTP engine – weekly course timetabling
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/         – engine configuration (grid, search, ranker, annealing)
//! ├── dataset/        – YAML loader for sessions, rooms and preferences
//! ├── model           – typed input records and bookings
//! ├── problem         – validation and interning of the input lists
//! ├── period/         – weekly grid, bands, candidate windows
//! └── scheduler/      – conflict tracker, room ranker, constructive pass,
//!                       parallel pass, annealing, statistics
//! ```

pub mod config;
pub mod dataset;
pub mod model;
pub mod period;
pub mod problem;
pub mod scheduler;
