//! Entities mirrored from the server: elevators, loads, configuration.
//!
//! Entities reference each other by opaque server-assigned id, never by
//! pointer. An elevator owns the set of load ids aboard; a load keeps the
//! id of the elevator it rides as a lookup key.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::opcode::Algorithm;

/// Weight in kg assumed for every passenger.
pub const DEFAULT_LOAD_WEIGHT: u32 = 60;

// ── Ids ──────────────────────────────────────────────────────────

/// Server-assigned elevator id, unique for the simulation's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElevatorId(pub u32);

/// Server-assigned load id, unique within a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(pub u32);

impl fmt::Display for ElevatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

// ── SimulationConfig ─────────────────────────────────────────────

/// Server-side simulation settings, replaced wholesale by
/// `NewSimulation` and patched by the `Set*` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub floor_count: u32,
    /// Maximum aboard weight per elevator in kg; `0` means unlimited.
    pub max_load: u32,
    /// Raw algorithm id; see [`SimulationConfig::algorithm`].
    pub algorithm_id: u32,
    /// Speed multiplier in hundredths (`300` = 3x).
    pub simulation_speed: u32,
    pub update_rate: u32,
}

impl SimulationConfig {
    /// The algorithm, if its id is one this build knows.
    pub fn algorithm(&self) -> Option<Algorithm> {
        Algorithm::try_from(self.algorithm_id).ok()
    }

    /// Speed multiplier as a float.
    pub fn speed_multiplier(&self) -> f64 {
        f64::from(self.simulation_speed) / 100.0
    }
}

// ── Elevator ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elevator {
    pub id: ElevatorId,
    pub current_floor: u32,
    /// `None` while idle.
    pub destination_floor: Option<u32>,
    pub loads: BTreeSet<LoadId>,
}

impl Elevator {
    pub fn new(id: ElevatorId, floor: u32) -> Self {
        Self {
            id,
            current_floor: floor,
            destination_floor: None,
            loads: BTreeSet::new(),
        }
    }

    /// Passenger capacity for a given max load; `None` when unlimited.
    pub fn capacity(max_load: u32) -> Option<u32> {
        (max_load > 0).then(|| max_load / DEFAULT_LOAD_WEIGHT)
    }
}

// ── Load ─────────────────────────────────────────────────────────

/// A passenger (or any unit of demand) waiting for or riding an elevator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    pub origin_floor: u32,
    pub destination_floor: u32,
    pub weight: u32,
    pub created_at_tick: u32,
    pub boarded_at_tick: Option<u32>,
    /// Present only while aboard.
    pub elevator: Option<ElevatorId>,
}

impl Load {
    pub fn new(id: LoadId, origin_floor: u32, destination_floor: u32, tick: u32) -> Self {
        Self {
            id,
            origin_floor,
            destination_floor,
            weight: DEFAULT_LOAD_WEIGHT,
            created_at_tick: tick,
            boarded_at_tick: None,
            elevator: None,
        }
    }

    pub fn is_aboard(&self) -> bool {
        self.elevator.is_some()
    }
}

// ── DeliveryStats ────────────────────────────────────────────────

/// Aggregates over loads that completed their trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub delivered: u64,
    /// Sum of `boarded - created` over delivered loads.
    pub total_wait_ticks: u64,
    /// Sum of `unloaded - boarded` over delivered loads.
    pub total_ride_ticks: u64,
}

impl DeliveryStats {
    pub(crate) fn record(&mut self, load: &Load, unloaded_at: u32) {
        let boarded = load.boarded_at_tick.unwrap_or(load.created_at_tick);
        self.delivered += 1;
        self.total_wait_ticks += u64::from(boarded.saturating_sub(load.created_at_tick));
        self.total_ride_ticks += u64::from(unloaded_at.saturating_sub(boarded));
    }

    pub fn average_wait(&self) -> Option<f64> {
        (self.delivered > 0).then(|| self.total_wait_ticks as f64 / self.delivered as f64)
    }

    pub fn average_ride(&self) -> Option<f64> {
        (self.delivered > 0).then(|| self.total_ride_ticks as f64 / self.delivered as f64)
    }
}
