//! Outbound commands (client → server).
//!
//! Each client intent maps to one opcode and an ordered field list. The
//! builder does no I/O: `to_frame` yields a [`Frame`] that the caller hands
//! to a connection. Encoding errors surface here, before anything is sent.
//!
//! ```text
//! AddElevator        [floor]
//! RemoveElevator     [elevator_id]
//! SetFloors          [count]
//! SetSimulationSpeed [round(speed * 100)]
//! SetUpdateRate      [rate]
//! AddPassengers      [count, origin_1, dest_1, ..., origin_n, dest_n]
//! SetAlgorithm       [algorithm_id]
//! SetMaxLoad         [value]
//! Start / Stop / NewSimulation / Dashboard   []
//! ```

use rand::Rng;

use crate::error::{ElevsimError, Result};
use crate::frame::{Field, Frame};
use crate::opcode::{Algorithm, OpCode};
use crate::wire::to_wire_int;

/// A trip requested by a passenger: origin and destination floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trip {
    pub origin: u32,
    pub destination: u32,
}

impl Trip {
    pub fn new(origin: u32, destination: u32) -> Self {
        Self {
            origin,
            destination,
        }
    }
}

/// Every command a client can send.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddElevator { floor: u32 },
    RemoveElevator { elevator_id: u32 },
    SetFloors { count: u32 },
    /// Simulation speed multiplier; travels as hundredths.
    SetSimulationSpeed { speed: f64 },
    SetUpdateRate { rate: u32 },
    AddPassengers { trips: Vec<Trip> },
    SetAlgorithm { algorithm: Algorithm },
    SetMaxLoad { value: u32 },
    StartSimulation,
    StopSimulation,
    NewSimulation,
    Dashboard,
}

impl Command {
    pub fn opcode(&self) -> OpCode {
        match self {
            Command::AddElevator { .. } => OpCode::AddElevator,
            Command::RemoveElevator { .. } => OpCode::RemoveElevator,
            Command::SetFloors { .. } => OpCode::SetFloors,
            Command::SetSimulationSpeed { .. } => OpCode::SetSimulationSpeed,
            Command::SetUpdateRate { .. } => OpCode::SetUpdateRate,
            Command::AddPassengers { .. } => OpCode::AddPassengers,
            Command::SetAlgorithm { .. } => OpCode::SetAlgorithm,
            Command::SetMaxLoad { .. } => OpCode::SetMaxLoad,
            Command::StartSimulation => OpCode::StartSimulation,
            Command::StopSimulation => OpCode::StopSimulation,
            Command::NewSimulation => OpCode::NewSimulation,
            Command::Dashboard => OpCode::Dashboard,
        }
    }

    /// `count` random passengers with floors drawn uniformly from
    /// `[1, floor_count]`. The destination is re-rolled until it differs
    /// from the origin.
    pub fn random_passengers<R: Rng>(
        count: u32,
        floor_count: u32,
        rng: &mut R,
    ) -> Result<Self> {
        if floor_count < 2 {
            return Err(ElevsimError::InvalidCommand(format!(
                "cannot generate passengers with {floor_count} floor(s)"
            )));
        }
        let trips = (0..count)
            .map(|_| {
                let origin = rng.gen_range(1..=floor_count);
                let mut destination = rng.gen_range(1..=floor_count);
                while destination == origin {
                    destination = rng.gen_range(1..=floor_count);
                }
                Trip::new(origin, destination)
            })
            .collect();
        Ok(Command::AddPassengers { trips })
    }

    /// Encode into a frame ready for the transport.
    pub fn to_frame(&self) -> Result<Frame> {
        let fields: Vec<Field<'_>> = match self {
            Command::AddElevator { floor } => vec![Field::Int(*floor)],
            Command::RemoveElevator { elevator_id } => vec![Field::Int(*elevator_id)],
            Command::SetFloors { count } => vec![Field::Int(*count)],
            Command::SetSimulationSpeed { speed } => vec![Field::Int(speed_to_wire(*speed)?)],
            Command::SetUpdateRate { rate } => vec![Field::Int(*rate)],
            Command::AddPassengers { trips } => {
                let mut fields = Vec::with_capacity(1 + 2 * trips.len());
                fields.push(Field::Int(to_wire_int(trips.len())?));
                for trip in trips {
                    fields.push(Field::Int(trip.origin));
                    fields.push(Field::Int(trip.destination));
                }
                fields
            }
            Command::SetAlgorithm { algorithm } => vec![Field::Int(*algorithm as u32)],
            Command::SetMaxLoad { value } => vec![Field::Int(*value)],
            Command::StartSimulation
            | Command::StopSimulation
            | Command::NewSimulation
            | Command::Dashboard => Vec::new(),
        };
        Frame::new(self.opcode(), &fields)
    }

    /// Parse a client frame. Used by servers and test harnesses.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = OpCode::try_from(frame.opcode())?;
        let mut r = frame.reader();
        let command = match opcode {
            OpCode::AddElevator => Command::AddElevator {
                floor: r.read_int()?,
            },
            OpCode::RemoveElevator => Command::RemoveElevator {
                elevator_id: r.read_int()?,
            },
            OpCode::SetFloors => Command::SetFloors {
                count: r.read_int()?,
            },
            OpCode::SetSimulationSpeed => Command::SetSimulationSpeed {
                speed: f64::from(r.read_int()?) / 100.0,
            },
            OpCode::SetUpdateRate => Command::SetUpdateRate {
                rate: r.read_int()?,
            },
            OpCode::AddPassengers => {
                let count = r.read_int()? as usize;
                let pair_bytes = 2 * crate::wire::INT_WIDTH;
                if r.remaining() / pair_bytes < count {
                    return Err(ElevsimError::PayloadUnderrun {
                        needed: count.saturating_mul(pair_bytes),
                        remaining: r.remaining(),
                    });
                }
                let mut trips = Vec::with_capacity(count);
                for _ in 0..count {
                    trips.push(Trip::new(r.read_int()?, r.read_int()?));
                }
                Command::AddPassengers { trips }
            }
            OpCode::SetAlgorithm => Command::SetAlgorithm {
                algorithm: Algorithm::try_from(r.read_int()?)?,
            },
            OpCode::SetMaxLoad => Command::SetMaxLoad {
                value: r.read_int()?,
            },
            OpCode::StartSimulation => Command::StartSimulation,
            OpCode::StopSimulation => Command::StopSimulation,
            OpCode::NewSimulation => Command::NewSimulation,
            OpCode::Dashboard => Command::Dashboard,
            OpCode::Close | OpCode::Error | OpCode::GameUpdateState => {
                return Err(ElevsimError::UnexpectedOpcode(frame.opcode()));
            }
        };
        r.finish()?;
        Ok(command)
    }
}

fn speed_to_wire(speed: f64) -> Result<u32> {
    let hundredths = (speed * 100.0).round();
    if !hundredths.is_finite() || hundredths < 0.0 || hundredths > f64::from(u32::MAX) {
        return Err(ElevsimError::NumberOutOfRange(speed.to_string()));
    }
    Ok(hundredths as u32)
}
