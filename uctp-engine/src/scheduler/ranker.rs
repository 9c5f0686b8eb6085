/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Room ranking heuristic.
//!
//! | Factor | Score |
//! |---|---|
//! | Each earlier booking of the room | −2 |
//! | Required room type matches | +10 |
//! | Required room type differs (both specified) | −5 |
//! | Capacity ≥ expected headcount | +5 |
//! | … and capacity ≤ 1.2 × headcount | +3 |
//! | Known capacity below headcount | −10 |
//! | Room in a preferred building | +2 |
//!
//! The ranking of a session is computed once, against the room usage at that
//! moment, and memoised for the rest of the build.  The cache is bounded:
//! once `cache_capacity` rankings are stored, further rankings are computed
//! on every call and not stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::config::RankerConfig;
use crate::model::{Room, RoomIdx, Session, SessionIdx};
use crate::problem::Problem;

/// Hit / miss counters of the ranking cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Scores and orders rooms for a session.  Shared by reference across
/// parallel workers.
#[derive(Debug)]
pub struct RoomRanker {
    preferred_buildings: Vec<String>,
    cache_capacity: usize,
    cache: Mutex<HashMap<SessionIdx, Arc<[RoomIdx]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RoomRanker {
    pub fn new(config: &RankerConfig) -> Self {
        Self {
            preferred_buildings: config.preferred_buildings.clone(),
            cache_capacity: config.cache_capacity,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Heuristic score of `room` for `session`, given how many bookings the
    /// room already holds.
    pub fn score(&self, session: &Session, room: &Room, usage: u32) -> i32 {
        let mut score = -2 * usage as i32;

        if let Some(required) = session.required_room_type.as_deref() {
            if room.has_type(required) {
                score += 10;
            } else if !room.room_type.trim().is_empty() {
                score -= 5;
            }
        }

        if let (Some(size), Some(cap)) = (session.expected_size, room.capacity) {
            if cap >= size {
                score += 5;
                if cap as f64 <= size as f64 * 1.2 {
                    score += 3;
                }
            } else {
                score -= 10;
            }
        }

        if self
            .preferred_buildings
            .iter()
            .any(|b| b.eq_ignore_ascii_case(room.building.trim()))
        {
            score += 2;
        }
        score
    }

    /// Rooms ordered best first for `session`.  Ties keep room order.
    ///
    /// `usage[r]` is the number of bookings room `r` currently holds; it is
    /// only consulted on a cache miss.
    pub fn rank(&self, problem: &Problem, session: SessionIdx, usage: &[u32]) -> Arc<[RoomIdx]> {
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(&session) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(hit);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let s = problem.session(session);
        let mut scored: Vec<(i32, RoomIdx)> = problem
            .rooms()
            .iter()
            .enumerate()
            .map(|(idx, room)| {
                let used = usage.get(idx).copied().unwrap_or(0);
                (self.score(s, room, used), idx)
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let ranked: Arc<[RoomIdx]> = scored.into_iter().map(|(_, idx)| idx).collect();

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.len() < self.cache_capacity {
            cache.insert(session, Arc::clone(&ranked));
        } else if cache.len() == self.cache_capacity {
            debug!(capacity = self.cache_capacity, "room ranking cache full, no longer caching");
        }
        ranked
    }

    pub fn cache_stats(&self) -> CacheStats {
        let entries = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }

    /// Forget every ranking.  Hit and miss counters keep running.
    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
