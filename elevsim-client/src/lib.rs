//! # elevsim-client
//!
//! Console client for the elevator simulation.
//!
//! Connects to a simulation server, configures a simulation from a TOML
//! file, then mirrors the server's state with the `elevsim-core`
//! reconciler while accepting text commands on stdin.

pub mod config;
pub mod console;
pub mod session;
