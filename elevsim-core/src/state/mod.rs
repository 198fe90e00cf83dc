mod engine;
pub mod model;
mod phase;

pub use engine::{Inconsistency, Reconciled, Reconciler, Snapshot};
pub use model::{
    DEFAULT_LOAD_WEIGHT, DeliveryStats, Elevator, ElevatorId, Load, LoadId, SimulationConfig,
};
pub use phase::SimulationPhase;
