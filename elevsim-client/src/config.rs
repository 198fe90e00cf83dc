//! Client configuration.

use std::path::Path;
use std::time::Duration;

use elevsim_core::{Algorithm, Command};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the console client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Simulation applied right after connecting.
    pub simulation: SimulationSettings,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Simulation server address (host:port).
    pub server_address: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

/// Simulation bootstrap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub floors: u32,
    /// Maximum aboard weight per elevator in kg; `0` means unlimited.
    pub max_load: u32,
    pub algorithm: Algorithm,
    /// Speed multiplier (`1.0` = real time).
    pub simulation_speed: f64,
    /// Server updates per second.
    pub update_rate: u32,
    /// Start floor of each elevator to add.
    pub elevators: Vec<u32>,
    /// Random passengers to spawn after the elevators.
    pub passengers: u32,
    /// Send `StartSimulation` once everything is configured.
    pub autostart: bool,
    /// Log a state summary every N ticks; `0` disables it.
    pub summary_every_ticks: u32,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8080".into(),
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            floors: 10,
            max_load: 900,
            algorithm: Algorithm::Look,
            simulation_speed: 1.0,
            update_rate: 10,
            elevators: vec![1, 1],
            passengers: 8,
            autostart: true,
            summary_every_ticks: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.network.connect_timeout_ms)
    }
}

impl SimulationSettings {
    /// Configuration commands sent after `NewSimulation`, in order.
    ///
    /// Passengers and the start command are left to the session since they
    /// need randomness and the elevators to exist first.
    pub fn setup_commands(&self) -> Vec<Command> {
        let mut commands = vec![
            Command::NewSimulation,
            Command::SetFloors { count: self.floors },
            Command::SetMaxLoad {
                value: self.max_load,
            },
            Command::SetAlgorithm {
                algorithm: self.algorithm,
            },
            Command::SetSimulationSpeed {
                speed: self.simulation_speed,
            },
            Command::SetUpdateRate {
                rate: self.update_rate,
            },
        ];
        commands.extend(
            self.elevators
                .iter()
                .map(|&floor| Command::AddElevator { floor }),
        );
        commands
    }
}

// ── Tests ────────────────────────────────────────────────────────
