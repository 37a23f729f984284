//! Campus time-slot allocation.
//!
//! Each campus owns an independent pool of parallel fields; sessions at one
//! campus never draw from another campus's pool. Generators that interleave
//! phases across campuses call [`CampusAllocator::sync_phase`], which advances
//! every pool to the maximum busy-time across all pools before applying the
//! inter-phase break, so no campus's fields get scheduled into an overlapping
//! slot.

use crate::tournament::models::CampusId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-campus schedule configuration
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CampusScheduleConfig {
    pub match_minutes: i64,
    pub break_minutes: i64,
    pub parallel_fields: u32,
}

impl Default for CampusScheduleConfig {
    fn default() -> Self {
        Self {
            match_minutes: 60,
            break_minutes: 15,
            parallel_fields: 1,
        }
    }
}

impl CampusScheduleConfig {
    fn match_duration(&self) -> Duration {
        Duration::minutes(self.match_minutes)
    }

    fn break_duration(&self) -> Duration {
        Duration::minutes(self.break_minutes)
    }
}

/// One planned slot: campus, field and start time
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SlotAssignment {
    pub campus_id: CampusId,
    pub field_index: u32,
    pub start_time: DateTime<Utc>,
}

struct CampusPool {
    campus_id: CampusId,
    config: CampusScheduleConfig,
    /// Next free instant per field
    field_free_at: Vec<DateTime<Utc>>,
}

impl CampusPool {
    fn earliest_field(&self) -> (usize, DateTime<Utc>) {
        self.field_free_at
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|&(i, t)| (t, i))
            .expect("pool has at least one field")
    }

    fn busy_until(&self) -> DateTime<Utc> {
        self.field_free_at
            .iter()
            .copied()
            .max()
            .expect("pool has at least one field")
    }
}

/// Assigns time slots on independent per-venue field pools
pub struct CampusAllocator {
    pools: Vec<CampusPool>,
}

impl CampusAllocator {
    /// Build pools for the given campuses starting at `start`.
    ///
    /// Campuses without an override use the global default configuration.
    pub fn new(
        campus_ids: &[CampusId],
        start: DateTime<Utc>,
        default_config: CampusScheduleConfig,
        overrides: &HashMap<CampusId, CampusScheduleConfig>,
    ) -> Self {
        let pools = campus_ids
            .iter()
            .map(|&campus_id| {
                let config = overrides.get(&campus_id).copied().unwrap_or(default_config);
                let fields = config.parallel_fields.max(1) as usize;
                CampusPool {
                    campus_id,
                    config,
                    field_free_at: vec![start; fields],
                }
            })
            .collect();
        Self { pools }
    }

    /// Claim the earliest available field slot across all pools.
    pub fn allocate(&mut self) -> SlotAssignment {
        let (pool_idx, field_idx, start_time) = self
            .pools
            .iter()
            .enumerate()
            .map(|(i, pool)| {
                let (field, at) = pool.earliest_field();
                (i, field, at)
            })
            .min_by_key(|&(i, _, at)| (at, i))
            .expect("allocator has at least one campus");

        let pool = &mut self.pools[pool_idx];
        pool.field_free_at[field_idx] = start_time + pool.config.match_duration();

        SlotAssignment {
            campus_id: pool.campus_id,
            field_index: field_idx as u32,
            start_time,
        }
    }

    /// Align all pools after a phase: every field becomes free at the maximum
    /// busy-time across all pools, plus that pool's own break.
    pub fn sync_phase(&mut self) {
        let horizon = self
            .pools
            .iter()
            .map(CampusPool::busy_until)
            .max()
            .expect("allocator has at least one campus");

        for pool in &mut self.pools {
            let resume = horizon + pool.config.break_duration();
            for free_at in &mut pool.field_free_at {
                *free_at = resume;
            }
        }
    }
}
