//! # elevsim-core
//!
//! Client-side protocol library for the elevator simulation server.
//!
//! This crate contains:
//! - **Wire primitives**: big-endian integers and Latin-1 strings (`wire`)
//! - **Framing**: `Frame`, the checksummed envelope around every message
//! - **Messages**: outbound `Command`s and inbound `ServerEvent`s keyed by `OpCode`
//! - **Codec**: `FrameCodec` for framed TCP I/O via `tokio_util`
//! - **Network**: `Connection` for a managed connection to the server
//! - **State**: `Reconciler`, the client-side mirror of the server's simulation
//! - **Error**: `ElevsimError`, a typed `thiserror`-based error hierarchy

pub mod checksum;
pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod frame;
pub mod network;
pub mod opcode;
pub mod state;
pub mod wire;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::FrameCodec;
pub use command::{Command, Trip};
pub use error::{ElevsimError, ErrorKind, Result};
pub use event::{GameUpdate, PassengerSpawn, ServerEvent, StateUpdate};
pub use frame::{
    END_MARKER, FRAME_OVERHEAD, Field, Frame, HEADER_SIZE, MAX_PAYLOAD_SIZE, PayloadReader,
    START_MARKER,
};
pub use network::{Connection, ConnectionInfo, ConnectionSender};
pub use opcode::{Algorithm, OpCode, UpdateType};
pub use state::{
    DeliveryStats, Elevator, ElevatorId, Inconsistency, Load, LoadId, Reconciled, Reconciler,
    SimulationConfig, SimulationPhase, Snapshot,
};
