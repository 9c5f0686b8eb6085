/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Demand / supply analysis run before every build.
//!
//! # Status: advisory
//!
//! The ratio is **computed and logged**, never enforced.  A build over
//! capacity still runs; the surplus sessions simply end up unassigned.
//!
//! | Check | Demand | Supply |
//! |---|---|---|
//! | Whole week | Σ `periods_needed` | days × bookable periods × rooms |
//! | Per class group | Σ `periods_needed` of the group | days × periods bookable for the group's affinity |
//!
//! A class group can never attend two sessions at once, so its own weekly
//! window bounds what it can be given even when rooms are plentiful.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::model::GroupAffinity;
use crate::period::PeriodModel;
use crate::problem::Problem;

/// Demand against supply for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Load {
    pub demand: u64,
    pub supply: u64,
}

impl Load {
    /// Demand as a fraction of supply; infinite when supply is zero and
    /// demand is not.
    pub fn ratio(&self) -> f64 {
        match (self.demand, self.supply) {
            (0, _) => 0.0,
            (_, 0) => f64::INFINITY,
            (d, s) => d as f64 / s as f64,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.demand > self.supply
    }
}

/// Result of [`analyse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityReport {
    pub total: Load,
    /// Class groups whose demand exceeds their weekly window, by code.
    pub overloaded_groups: BTreeMap<String, Load>,
}

/// Weekly periods bookable by a group with `affinity`.
pub fn weekly_supply(periods: &PeriodModel, affinity: GroupAffinity) -> u64 {
    periods.day_count() as u64 * periods.bookable_periods(affinity) as u64
}

/// Compare demand and supply, logging a warning for every overload.
pub fn analyse(problem: &Problem, periods: &PeriodModel) -> CapacityReport {
    let total = Load {
        demand: problem.total_demand(),
        supply: weekly_supply(periods, GroupAffinity::Any) * problem.room_count() as u64,
    };

    let mut per_group: BTreeMap<usize, (GroupAffinity, u64)> = BTreeMap::new();
    for (idx, session) in problem.sessions().iter().enumerate() {
        let keys = problem.keys(idx);
        per_group.entry(keys.group).or_insert((keys.affinity, 0)).1 += session.periods_needed as u64;
    }

    let overloaded_groups: BTreeMap<String, Load> = per_group
        .into_iter()
        .map(|(group, (affinity, demand))| {
            let load = Load {
                demand,
                supply: weekly_supply(periods, affinity),
            };
            (problem.groups()[group].clone(), load)
        })
        .filter(|(_, load)| load.exceeded())
        .collect();

    if total.exceeded() {
        warn!(
            demand = total.demand,
            supply = total.supply,
            ratio = total.ratio(),
            "requested periods exceed the weekly room supply"
        );
    } else {
        info!(
            demand = total.demand,
            supply = total.supply,
            ratio = total.ratio(),
            "capacity check passed"
        );
    }
    for (group, load) in &overloaded_groups {
        warn!(
            class_group = %group,
            demand = load.demand,
            supply = load.supply,
            "class group needs more periods than its weekly window allows"
        );
    }

    CapacityReport {
        total,
        overloaded_groups,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
