//! Simulation lifecycle as seen by the client.
//!
//! ```text
//!  Uninitialized ──NewSimulation──► Ready ──Start──► Running
//!                                     ▲  ▲             │  ▲
//!                                     │  │           Stop Start
//!                                     │  │             ▼  │
//!                                     │  └─Stop──── Paused
//!                                     └──── NewSimulation (from any state)
//! ```

use serde::Serialize;

use crate::state::Inconsistency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    /// No `NewSimulation` seen yet on this connection.
    #[default]
    Uninitialized,
    /// Configured, not started.
    Ready,
    Running,
    Paused,
}

impl std::fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
        }
    }
}

impl SimulationPhase {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Enter `Ready`. Valid from every state.
    pub fn reset(&mut self) {
        *self = Self::Ready;
    }

    /// Enter `Running`.
    ///
    /// Valid from: `Ready`, `Paused`, `Running` (repeated starts are
    /// harmless).
    pub fn start(&mut self) -> Result<(), Inconsistency> {
        match self {
            Self::Uninitialized => Err(Inconsistency::NotInitialized),
            _ => {
                *self = Self::Running;
                Ok(())
            }
        }
    }

    /// Enter `Paused`.
    ///
    /// Valid from: `Ready`, `Running`, `Paused`.
    pub fn stop(&mut self) -> Result<(), Inconsistency> {
        match self {
            Self::Uninitialized => Err(Inconsistency::NotInitialized),
            _ => {
                *self = Self::Paused;
                Ok(())
            }
        }
    }
}
