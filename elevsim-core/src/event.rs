//! Inbound events (server → client).
//!
//! The dispatcher switches on a validated frame's opcode and reads the
//! fields that opcode defines, in order. Unknown opcodes come back as
//! `ElevsimError::UnknownOpcode`; callers log them and move on.
//!
//! # Wire Protocol
//!
//! ```text
//! NewSimulation    [floors, max_load, algorithm_id, sim_speed, update_rate]
//! AddElevator      [id, floor]
//! RemoveElevator   [id]
//! AddPassengers    [count, (id, origin, dest) * count]
//! Set*             [value]
//! GameUpdateState  [tick, n, (update_type, elevator_id, parameter) * n]
//! Dashboard        [report: string]
//! Error            [message: string]
//! Close            [reason: string]
//! Start/Stop       []
//! ```

use crate::error::{ElevsimError, Result};
use crate::frame::{Field, Frame, PayloadReader};
use crate::opcode::{OpCode, UpdateType};
use crate::state::{ElevatorId, LoadId, SimulationConfig};
use crate::wire::{INT_WIDTH, to_wire_int};

/// A passenger announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassengerSpawn {
    pub id: LoadId,
    pub origin: u32,
    pub destination: u32,
}

/// One entry of a `GameUpdateState` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    ElevatorMove {
        elevator: ElevatorId,
        floor: u32,
    },
    /// `floor` is `None` when the server sends `0` (elevator went idle).
    ElevatorDestination {
        elevator: ElevatorId,
        floor: Option<u32>,
    },
    LoadLoad {
        elevator: ElevatorId,
        load: LoadId,
    },
    LoadUnload {
        elevator: ElevatorId,
        load: LoadId,
    },
    /// An update type this build does not know. Kept so the rest of the
    /// batch can still be applied.
    Unknown {
        code: u32,
        elevator_id: u32,
        parameter: u32,
    },
}

impl StateUpdate {
    fn from_triple(code: u32, elevator_id: u32, parameter: u32) -> Self {
        let elevator = ElevatorId(elevator_id);
        match UpdateType::try_from(code) {
            Ok(UpdateType::ElevatorMove) => StateUpdate::ElevatorMove {
                elevator,
                floor: parameter,
            },
            Ok(UpdateType::ElevatorDestination) => StateUpdate::ElevatorDestination {
                elevator,
                floor: (parameter != 0).then_some(parameter),
            },
            Ok(UpdateType::LoadLoad) => StateUpdate::LoadLoad {
                elevator,
                load: LoadId(parameter),
            },
            Ok(UpdateType::LoadUnload) => StateUpdate::LoadUnload {
                elevator,
                load: LoadId(parameter),
            },
            Err(_) => StateUpdate::Unknown {
                code,
                elevator_id,
                parameter,
            },
        }
    }

    fn to_triple(self) -> [u32; 3] {
        match self {
            StateUpdate::ElevatorMove { elevator, floor } => {
                [UpdateType::ElevatorMove as u32, elevator.0, floor]
            }
            StateUpdate::ElevatorDestination { elevator, floor } => [
                UpdateType::ElevatorDestination as u32,
                elevator.0,
                floor.unwrap_or(0),
            ],
            StateUpdate::LoadLoad { elevator, load } => {
                [UpdateType::LoadLoad as u32, elevator.0, load.0]
            }
            StateUpdate::LoadUnload { elevator, load } => {
                [UpdateType::LoadUnload as u32, elevator.0, load.0]
            }
            StateUpdate::Unknown {
                code,
                elevator_id,
                parameter,
            } => [code, elevator_id, parameter],
        }
    }
}

/// All changes the server made during one tick, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameUpdate {
    pub tick: u32,
    pub updates: Vec<StateUpdate>,
}

/// Every event a server can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    NewSimulation(SimulationConfig),
    StartSimulation,
    StopSimulation,
    AddElevator { id: ElevatorId, floor: u32 },
    RemoveElevator { id: ElevatorId },
    AddPassengers(Vec<PassengerSpawn>),
    SetFloors(u32),
    SetAlgorithm(u32),
    /// Hundredths.
    SetSimulationSpeed(u32),
    SetUpdateRate(u32),
    SetMaxLoad(u32),
    GameUpdate(GameUpdate),
    Dashboard(String),
    Error(String),
    Close(String),
}

impl ServerEvent {
    pub fn opcode(&self) -> OpCode {
        match self {
            ServerEvent::NewSimulation(_) => OpCode::NewSimulation,
            ServerEvent::StartSimulation => OpCode::StartSimulation,
            ServerEvent::StopSimulation => OpCode::StopSimulation,
            ServerEvent::AddElevator { .. } => OpCode::AddElevator,
            ServerEvent::RemoveElevator { .. } => OpCode::RemoveElevator,
            ServerEvent::AddPassengers(_) => OpCode::AddPassengers,
            ServerEvent::SetFloors(_) => OpCode::SetFloors,
            ServerEvent::SetAlgorithm(_) => OpCode::SetAlgorithm,
            ServerEvent::SetSimulationSpeed(_) => OpCode::SetSimulationSpeed,
            ServerEvent::SetUpdateRate(_) => OpCode::SetUpdateRate,
            ServerEvent::SetMaxLoad(_) => OpCode::SetMaxLoad,
            ServerEvent::GameUpdate(_) => OpCode::GameUpdateState,
            ServerEvent::Dashboard(_) => OpCode::Dashboard,
            ServerEvent::Error(_) => OpCode::Error,
            ServerEvent::Close(_) => OpCode::Close,
        }
    }

    /// Decode the typed event carried by a validated frame.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = OpCode::try_from(frame.opcode())?;
        let mut r = frame.reader();
        let event = match opcode {
            OpCode::NewSimulation => ServerEvent::NewSimulation(SimulationConfig {
                floor_count: r.read_int()?,
                max_load: r.read_int()?,
                algorithm_id: r.read_int()?,
                simulation_speed: r.read_int()?,
                update_rate: r.read_int()?,
            }),
            OpCode::StartSimulation => ServerEvent::StartSimulation,
            OpCode::StopSimulation => ServerEvent::StopSimulation,
            OpCode::AddElevator => ServerEvent::AddElevator {
                id: ElevatorId(r.read_int()?),
                floor: r.read_int()?,
            },
            OpCode::RemoveElevator => ServerEvent::RemoveElevator {
                id: ElevatorId(r.read_int()?),
            },
            OpCode::AddPassengers => {
                let count = read_count(&mut r, 3)?;
                let mut spawns = Vec::with_capacity(count);
                for _ in 0..count {
                    spawns.push(PassengerSpawn {
                        id: LoadId(r.read_int()?),
                        origin: r.read_int()?,
                        destination: r.read_int()?,
                    });
                }
                ServerEvent::AddPassengers(spawns)
            }
            OpCode::SetFloors => ServerEvent::SetFloors(r.read_int()?),
            OpCode::SetAlgorithm => ServerEvent::SetAlgorithm(r.read_int()?),
            OpCode::SetSimulationSpeed => ServerEvent::SetSimulationSpeed(r.read_int()?),
            OpCode::SetUpdateRate => ServerEvent::SetUpdateRate(r.read_int()?),
            OpCode::SetMaxLoad => ServerEvent::SetMaxLoad(r.read_int()?),
            OpCode::GameUpdateState => {
                let tick = r.read_int()?;
                let count = read_count(&mut r, 3)?;
                let mut updates = Vec::with_capacity(count);
                for _ in 0..count {
                    let code = r.read_int()?;
                    let elevator_id = r.read_int()?;
                    let parameter = r.read_int()?;
                    updates.push(StateUpdate::from_triple(code, elevator_id, parameter));
                }
                ServerEvent::GameUpdate(GameUpdate { tick, updates })
            }
            OpCode::Dashboard => ServerEvent::Dashboard(r.read_str()?),
            OpCode::Error => ServerEvent::Error(r.read_str()?),
            OpCode::Close => ServerEvent::Close(r.read_str()?),
        };
        r.finish()?;
        Ok(event)
    }

    /// Encode as a server would. Used by servers and test harnesses.
    pub fn to_frame(&self) -> Result<Frame> {
        let mut ints: Vec<u32> = Vec::new();
        let text: Option<&str> = match self {
            ServerEvent::Dashboard(s) | ServerEvent::Error(s) | ServerEvent::Close(s) => {
                Some(s.as_str())
            }
            _ => None,
        };
        match self {
            ServerEvent::NewSimulation(cfg) => ints.extend([
                cfg.floor_count,
                cfg.max_load,
                cfg.algorithm_id,
                cfg.simulation_speed,
                cfg.update_rate,
            ]),
            ServerEvent::AddElevator { id, floor } => ints.extend([id.0, *floor]),
            ServerEvent::RemoveElevator { id } => ints.push(id.0),
            ServerEvent::AddPassengers(spawns) => {
                ints.push(to_wire_int(spawns.len())?);
                for s in spawns {
                    ints.extend([s.id.0, s.origin, s.destination]);
                }
            }
            ServerEvent::SetFloors(v)
            | ServerEvent::SetAlgorithm(v)
            | ServerEvent::SetSimulationSpeed(v)
            | ServerEvent::SetUpdateRate(v)
            | ServerEvent::SetMaxLoad(v) => ints.push(*v),
            ServerEvent::GameUpdate(update) => {
                ints.push(update.tick);
                ints.push(to_wire_int(update.updates.len())?);
                for u in &update.updates {
                    ints.extend(u.to_triple());
                }
            }
            ServerEvent::StartSimulation
            | ServerEvent::StopSimulation
            | ServerEvent::Dashboard(_)
            | ServerEvent::Error(_)
            | ServerEvent::Close(_) => {}
        }

        let mut fields: Vec<Field<'_>> = ints.into_iter().map(Field::Int).collect();
        if let Some(s) = text {
            fields.push(Field::Str(s));
        }
        Frame::new(self.opcode(), &fields)
    }
}

/// Read an element count and make sure the payload can hold that many
/// records of `ints_per_record` integers before allocating for them.
fn read_count(r: &mut PayloadReader<'_>, ints_per_record: usize) -> Result<usize> {
    let count = r.read_int()? as usize;
    let record = ints_per_record * INT_WIDTH;
    if r.remaining() / record < count {
        return Err(ElevsimError::PayloadUnderrun {
            needed: count.saturating_mul(record),
            remaining: r.remaining(),
        });
    }
    Ok(count)
}
