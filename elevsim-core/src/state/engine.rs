//! Reconciliation engine.
//!
//! Holds the client's mirror of the simulation and patches it one server
//! event at a time, in arrival order. Nothing here does I/O or keeps the
//! transport; the engine is a reducer over [`ServerEvent`]s.
//!
//! Events that reference unknown entities (or otherwise contradict the
//! mirror) are skipped and reported as an [`Inconsistency`]; the rest of
//! the state is left untouched.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::{GameUpdate, PassengerSpawn, ServerEvent, StateUpdate};
use crate::state::model::{
    DeliveryStats, Elevator, ElevatorId, Load, LoadId, SimulationConfig,
};
use crate::state::phase::SimulationPhase;

// ── Inconsistency ────────────────────────────────────────────────

/// Why a well-formed event could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Inconsistency {
    #[error("event received before NewSimulation")]
    NotInitialized,

    #[error("elevator {0} already exists")]
    DuplicateElevator(ElevatorId),

    #[error("elevator {0} does not exist")]
    UnknownElevator(ElevatorId),

    #[error("load {0} already exists")]
    DuplicateLoad(LoadId),

    #[error("load {0} does not exist")]
    UnknownLoad(LoadId),

    #[error("load {load} is already aboard elevator {elevator}")]
    AlreadyAboard { load: LoadId, elevator: ElevatorId },

    #[error("load {load} is not aboard elevator {elevator}")]
    NotAboard { load: LoadId, elevator: ElevatorId },

    #[error("load {load} would exceed the max load of elevator {elevator}")]
    OverCapacity { load: LoadId, elevator: ElevatorId },

    #[error("tick went backwards: at {current}, received {received}")]
    TickRegression { current: u32, received: u32 },

    #[error("unknown update type {0}")]
    UnknownUpdateType(u32),
}

// ── Reconciled ───────────────────────────────────────────────────

/// What happened to one inbound event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Mutations that were applied.
    pub applied: usize,
    /// Parts of the event that were skipped, in order.
    pub skipped: Vec<Inconsistency>,
}

impl Reconciled {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn record(&mut self, result: Result<(), Inconsistency>) {
        match result {
            Ok(()) => self.applied += 1,
            Err(why) => {
                warn!(%why, "skipping inconsistent event");
                self.skipped.push(why);
            }
        }
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

/// Point-in-time copy of the mirror, for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub phase: SimulationPhase,
    pub tick: u32,
    pub config: Option<SimulationConfig>,
    pub elevators: Vec<Elevator>,
    pub loads: Vec<Load>,
    pub stats: DeliveryStats,
    pub dashboard: Option<String>,
    pub last_error: Option<String>,
    pub close_reason: Option<String>,
}

// ── Reconciler ───────────────────────────────────────────────────

/// The single owner of every mirrored entity on a connection.
#[derive(Debug, Default)]
pub struct Reconciler {
    phase: SimulationPhase,
    config: Option<SimulationConfig>,
    tick: u32,
    elevators: BTreeMap<ElevatorId, Elevator>,
    loads: BTreeMap<LoadId, Load>,
    stats: DeliveryStats,
    dashboard: Option<String>,
    last_error: Option<String>,
    close_reason: Option<String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn config(&self) -> Option<&SimulationConfig> {
        self.config.as_ref()
    }

    pub fn elevator(&self, id: ElevatorId) -> Option<&Elevator> {
        self.elevators.get(&id)
    }

    pub fn elevators(&self) -> impl Iterator<Item = &Elevator> {
        self.elevators.values()
    }

    pub fn load(&self, id: LoadId) -> Option<&Load> {
        self.loads.get(&id)
    }

    pub fn loads(&self) -> impl Iterator<Item = &Load> {
        self.loads.values()
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    pub fn dashboard(&self) -> Option<&str> {
        self.dashboard.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            tick: self.tick,
            config: self.config,
            elevators: self.elevators.values().cloned().collect(),
            loads: self.loads.values().cloned().collect(),
            stats: self.stats,
            dashboard: self.dashboard.clone(),
            last_error: self.last_error.clone(),
            close_reason: self.close_reason.clone(),
        }
    }

    /// `true` when every load→elevator key is mirrored by the elevator's
    /// load set and vice versa.
    pub fn links_consistent(&self) -> bool {
        let loads_ok = self.loads.values().all(|load| match load.elevator {
            Some(e) => self
                .elevators
                .get(&e)
                .is_some_and(|elevator| elevator.loads.contains(&load.id)),
            None => true,
        });
        let elevators_ok = self.elevators.values().all(|elevator| {
            elevator.loads.iter().all(|id| {
                self.loads
                    .get(id)
                    .is_some_and(|load| load.elevator == Some(elevator.id))
            })
        });
        loads_ok && elevators_ok
    }

    // ── Event application ─────────────────────────────────────────

    /// Apply one inbound event.
    pub fn apply(&mut self, event: &ServerEvent) -> Reconciled {
        debug!(opcode = %event.opcode(), tick = self.tick, "reconciling event");
        let mut outcome = Reconciled::default();

        match event {
            ServerEvent::NewSimulation(config) => {
                self.reset(*config);
                outcome.applied += 1;
            }
            ServerEvent::Dashboard(report) => {
                self.dashboard = Some(report.clone());
                outcome.applied += 1;
            }
            ServerEvent::Error(message) => {
                warn!(%message, "server reported an error");
                self.last_error = Some(message.clone());
                outcome.applied += 1;
            }
            ServerEvent::Close(reason) => {
                info!(%reason, "server closed the session");
                self.close_reason = Some(reason.clone());
                outcome.applied += 1;
            }
            _ if !self.phase.is_initialized() => {
                outcome.record(Err(Inconsistency::NotInitialized));
            }
            ServerEvent::StartSimulation => {
                outcome.record(self.phase.start());
                info!(phase = %self.phase, "simulation started");
            }
            ServerEvent::StopSimulation => {
                outcome.record(self.phase.stop());
                info!(phase = %self.phase, "simulation stopped");
            }
            ServerEvent::AddElevator { id, floor } => {
                outcome.record(self.add_elevator(*id, *floor));
            }
            ServerEvent::RemoveElevator { id } => {
                outcome.record(self.remove_elevator(*id));
            }
            ServerEvent::AddPassengers(spawns) => {
                for spawn in spawns {
                    outcome.record(self.add_load(spawn));
                }
            }
            ServerEvent::SetFloors(v) => outcome.record(self.patch(|c| c.floor_count = *v)),
            ServerEvent::SetAlgorithm(v) => outcome.record(self.patch(|c| c.algorithm_id = *v)),
            ServerEvent::SetSimulationSpeed(v) => {
                outcome.record(self.patch(|c| c.simulation_speed = *v))
            }
            ServerEvent::SetUpdateRate(v) => outcome.record(self.patch(|c| c.update_rate = *v)),
            ServerEvent::SetMaxLoad(v) => outcome.record(self.patch(|c| c.max_load = *v)),
            ServerEvent::GameUpdate(update) => self.apply_game_update(update, &mut outcome),
        }

        outcome
    }

    /// Apply a single state update inside the current tick.
    pub fn apply_update(&mut self, update: &StateUpdate) -> Result<(), Inconsistency> {
        if !self.phase.is_initialized() {
            return Err(Inconsistency::NotInitialized);
        }
        match *update {
            StateUpdate::ElevatorMove { elevator, floor } => {
                let e = self.elevator_mut(elevator)?;
                e.current_floor = floor;
                Ok(())
            }
            StateUpdate::ElevatorDestination { elevator, floor } => {
                let e = self.elevator_mut(elevator)?;
                e.destination_floor = floor;
                Ok(())
            }
            StateUpdate::LoadLoad { elevator, load } => self.board(elevator, load),
            StateUpdate::LoadUnload { elevator, load } => self.unload(elevator, load),
            StateUpdate::Unknown { code, .. } => Err(Inconsistency::UnknownUpdateType(code)),
        }
    }

    fn apply_game_update(&mut self, update: &GameUpdate, outcome: &mut Reconciled) {
        if update.tick < self.tick {
            outcome.record(Err(Inconsistency::TickRegression {
                current: self.tick,
                received: update.tick,
            }));
        } else {
            self.tick = update.tick;
        }
        for u in &update.updates {
            outcome.record(self.apply_update(u));
        }
    }

    // ── Rules ─────────────────────────────────────────────────────

    fn reset(&mut self, config: SimulationConfig) {
        info!(?config, "new simulation");
        self.phase.reset();
        self.config = Some(config);
        self.tick = 0;
        self.elevators.clear();
        self.loads.clear();
        self.stats = DeliveryStats::default();
        self.last_error = None;
        self.close_reason = None;
    }

    fn patch(&mut self, f: impl FnOnce(&mut SimulationConfig)) -> Result<(), Inconsistency> {
        let config = self.config.as_mut().ok_or(Inconsistency::NotInitialized)?;
        f(config);
        Ok(())
    }

    fn elevator_mut(&mut self, id: ElevatorId) -> Result<&mut Elevator, Inconsistency> {
        self.elevators
            .get_mut(&id)
            .ok_or(Inconsistency::UnknownElevator(id))
    }

    fn add_elevator(&mut self, id: ElevatorId, floor: u32) -> Result<(), Inconsistency> {
        if self.elevators.contains_key(&id) {
            return Err(Inconsistency::DuplicateElevator(id));
        }
        self.elevators.insert(id, Elevator::new(id, floor));
        Ok(())
    }

    fn remove_elevator(&mut self, id: ElevatorId) -> Result<(), Inconsistency> {
        let elevator = self
            .elevators
            .remove(&id)
            .ok_or(Inconsistency::UnknownElevator(id))?;
        for load_id in &elevator.loads {
            if let Some(load) = self.loads.get_mut(load_id) {
                load.elevator = None;
                load.boarded_at_tick = None;
            }
        }
        Ok(())
    }

    fn add_load(&mut self, spawn: &PassengerSpawn) -> Result<(), Inconsistency> {
        if self.loads.contains_key(&spawn.id) {
            return Err(Inconsistency::DuplicateLoad(spawn.id));
        }
        let load = Load::new(spawn.id, spawn.origin, spawn.destination, self.tick);
        self.loads.insert(spawn.id, load);
        Ok(())
    }

    /// Link a load and an elevator. Every precondition is checked before
    /// either side is touched.
    fn board(&mut self, elevator_id: ElevatorId, load_id: LoadId) -> Result<(), Inconsistency> {
        let elevator = self
            .elevators
            .get(&elevator_id)
            .ok_or(Inconsistency::UnknownElevator(elevator_id))?;
        let load = self
            .loads
            .get(&load_id)
            .ok_or(Inconsistency::UnknownLoad(load_id))?;
        if let Some(current) = load.elevator {
            return Err(Inconsistency::AlreadyAboard {
                load: load_id,
                elevator: current,
            });
        }
        let max_load = self.config.map_or(0, |c| c.max_load);
        if max_load > 0 {
            let aboard: u32 = elevator
                .loads
                .iter()
                .filter_map(|id| self.loads.get(id))
                .map(|l| l.weight)
                .sum();
            if aboard.saturating_add(load.weight) > max_load {
                return Err(Inconsistency::OverCapacity {
                    load: load_id,
                    elevator: elevator_id,
                });
            }
        }

        let tick = self.tick;
        if let (Some(elevator), Some(load)) = (
            self.elevators.get_mut(&elevator_id),
            self.loads.get_mut(&load_id),
        ) {
            elevator.loads.insert(load_id);
            load.elevator = Some(elevator_id);
            load.boarded_at_tick = Some(tick);
        }
        Ok(())
    }

    /// Unlink a load that reached its destination and stop tracking it.
    fn unload(&mut self, elevator_id: ElevatorId, load_id: LoadId) -> Result<(), Inconsistency> {
        if !self.elevators.contains_key(&elevator_id) {
            return Err(Inconsistency::UnknownElevator(elevator_id));
        }
        let load = self
            .loads
            .get(&load_id)
            .ok_or(Inconsistency::UnknownLoad(load_id))?;
        if load.elevator != Some(elevator_id) {
            return Err(Inconsistency::NotAboard {
                load: load_id,
                elevator: elevator_id,
            });
        }

        if let Some(elevator) = self.elevators.get_mut(&elevator_id) {
            elevator.loads.remove(&load_id);
        }
        if let Some(load) = self.loads.remove(&load_id) {
            self.stats.record(&load, self.tick);
        }
        Ok(())
    }
}
