//! Opcode tables shared by both directions of the protocol.
//!
//! Uses proper enums with `TryFrom`; unknown values are errors, never panics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ElevsimError;

// ── OpCode ───────────────────────────────────────────────────────

/// Frame discriminator. The same numbering is used client→server and
/// server→client; the payload schema depends on the direction.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Server is closing the session (reason string).
    Close = 0,
    /// Server-side failure report (message string).
    Error = 1,

    // ── Simulation lifecycle ─────────────────────────────────────
    NewSimulation = 2,
    StartSimulation = 3,
    StopSimulation = 4,

    // ── Entities ─────────────────────────────────────────────────
    AddElevator = 5,
    RemoveElevator = 6,
    AddPassengers = 7,

    // ── Configuration ────────────────────────────────────────────
    SetFloors = 8,
    SetAlgorithm = 9,
    SetSimulationSpeed = 10,
    SetUpdateRate = 11,
    SetMaxLoad = 12,

    /// Batched per-tick state changes (server → client only).
    GameUpdateState = 13,

    /// Server pool status.
    Dashboard = 20,
}

impl TryFrom<u32> for OpCode {
    type Error = ElevsimError;

    // `Self::Error` would clash with the `Error` variant.
    fn try_from(value: u32) -> Result<Self, ElevsimError> {
        match value {
            0 => Ok(OpCode::Close),
            1 => Ok(OpCode::Error),
            2 => Ok(OpCode::NewSimulation),
            3 => Ok(OpCode::StartSimulation),
            4 => Ok(OpCode::StopSimulation),
            5 => Ok(OpCode::AddElevator),
            6 => Ok(OpCode::RemoveElevator),
            7 => Ok(OpCode::AddPassengers),
            8 => Ok(OpCode::SetFloors),
            9 => Ok(OpCode::SetAlgorithm),
            10 => Ok(OpCode::SetSimulationSpeed),
            11 => Ok(OpCode::SetUpdateRate),
            12 => Ok(OpCode::SetMaxLoad),
            13 => Ok(OpCode::GameUpdateState),
            20 => Ok(OpCode::Dashboard),
            _ => Err(ElevsimError::UnknownOpcode(value)),
        }
    }
}

impl From<OpCode> for u32 {
    fn from(op: OpCode) -> Self {
        op as u32
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── UpdateType ───────────────────────────────────────────────────

/// Kind of a single entry inside a `GameUpdateState` batch.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateType {
    ElevatorMove = 0,
    ElevatorDestination = 1,
    LoadUnload = 2,
    LoadLoad = 3,
}

impl TryFrom<u32> for UpdateType {
    type Error = ElevsimError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UpdateType::ElevatorMove),
            1 => Ok(UpdateType::ElevatorDestination),
            2 => Ok(UpdateType::LoadUnload),
            3 => Ok(UpdateType::LoadLoad),
            _ => Err(ElevsimError::UnknownVariant {
                type_name: "UpdateType",
                value,
            }),
        }
    }
}

// ── Algorithm ────────────────────────────────────────────────────

/// Dispatch algorithms the server knows about. The client never runs them;
/// the id only travels in `SetAlgorithm` / `NewSimulation`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    DestinationDispatch = 0,
    Fcfs = 1,
    Look = 2,
    NStepLook = 3,
    Rolling = 4,
    Scatter = 5,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::DestinationDispatch,
        Algorithm::Fcfs,
        Algorithm::Look,
        Algorithm::NStepLook,
        Algorithm::Rolling,
        Algorithm::Scatter,
    ];

    /// Human-readable name, as the server displays it.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::DestinationDispatch => "Destination Dispatch",
            Algorithm::Fcfs => "FCFS",
            Algorithm::Look => "LOOK",
            Algorithm::NStepLook => "NStepLOOK",
            Algorithm::Rolling => "Rolling",
            Algorithm::Scatter => "Scatter",
        }
    }
}

impl TryFrom<u32> for Algorithm {
    type Error = ElevsimError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Algorithm::ALL
            .into_iter()
            .find(|a| *a as u32 == value)
            .ok_or(ElevsimError::UnknownVariant {
                type_name: "Algorithm",
                value,
            })
    }
}

impl std::str::FromStr for Algorithm {
    type Err = ElevsimError;

    /// Accepts the display name (case-insensitive, `_`/`-`/space agnostic)
    /// or the numeric id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u32>() {
            return Algorithm::try_from(id);
        }
        let wanted = normalize(s);
        Algorithm::ALL
            .into_iter()
            .find(|a| normalize(a.name()) == wanted)
            .ok_or_else(|| ElevsimError::InvalidCommand(format!("unknown algorithm {s:?}")))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
