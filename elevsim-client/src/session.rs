//! One client session: bootstrap, then the event loop.
//!
//! ```text
//!   server frames ──► ServerEvent::from_frame ──► Reconciler::apply
//!   console lines ──► console::parse_line ────► Connection::send
//!   Ctrl-C / quit / Close ──► exit
//! ```

use elevsim_core::{
    Command, Connection, ErrorKind, Frame, Reconciler, Result, ServerEvent, Snapshot,
};
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SimulationSettings;
use crate::console::{self, ConsoleAction, HELP};

/// Why the event loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// The server sent `Close`.
    ServerClosed(String),
    /// The transport went away without a `Close`.
    Disconnected,
    /// `quit` on the console.
    Quit,
    /// Ctrl-C.
    Interrupted,
}

pub struct Session {
    conn: Connection,
    state: Reconciler,
    settings: SimulationSettings,
    rng: StdRng,
    last_summary_tick: u32,
}

impl Session {
    pub fn new(conn: Connection, settings: SimulationSettings, rng: StdRng) -> Self {
        Self {
            conn,
            state: Reconciler::new(),
            settings,
            rng,
            last_summary_tick: 0,
        }
    }

    pub fn state(&self) -> &Reconciler {
        &self.state
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Send the configured simulation setup.
    pub async fn bootstrap(&mut self) -> Result<()> {
        for command in self.settings.setup_commands() {
            self.conn.send(&command).await?;
        }
        if self.settings.passengers > 0 {
            match Command::random_passengers(
                self.settings.passengers,
                self.settings.floors,
                &mut self.rng,
            ) {
                Ok(command) => self.conn.send(&command).await?,
                Err(e) => warn!(error = %e, "not spawning initial passengers"),
            }
        }
        if self.settings.autostart {
            self.conn.send(&Command::StartSimulation).await?;
        }
        info!(
            floors = self.settings.floors,
            elevators = self.settings.elevators.len(),
            passengers = self.settings.passengers,
            algorithm = %self.settings.algorithm,
            "simulation requested"
        );
        Ok(())
    }

    /// Run until the server closes, the transport drops, or the user quits.
    pub async fn run(&mut self, mut lines: mpsc::Receiver<String>) -> Result<Exit> {
        let mut console_open = true;
        loop {
            tokio::select! {
                frame = self.conn.recv() => {
                    let Some(frame) = frame else {
                        warn!("connection lost");
                        return Ok(Exit::Disconnected);
                    };
                    if let Some(exit) = self.on_frame(frame) {
                        return Ok(exit);
                    }
                }
                line = lines.recv(), if console_open => {
                    match line {
                        Some(line) => {
                            if let Some(exit) = self.on_line(&line).await? {
                                return Ok(exit);
                            }
                        }
                        None => {
                            debug!("console closed");
                            console_open = false;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    return Ok(Exit::Interrupted);
                }
            }
        }
    }

    pub async fn close(self) {
        self.conn.close().await;
    }

    // ── Inbound ───────────────────────────────────────────────────

    fn on_frame(&mut self, frame: Frame) -> Option<Exit> {
        let event = match ServerEvent::from_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), opcode = frame.opcode(), "discarding frame");
                return None;
            }
        };

        let outcome = self.state.apply(&event);
        debug!(
            opcode = %event.opcode(),
            applied = outcome.applied,
            skipped = outcome.skipped.len(),
            "event reconciled"
        );

        match event {
            ServerEvent::Dashboard(report) => info!("dashboard:\n{report}"),
            ServerEvent::GameUpdate(update) => self.maybe_summarize(update.tick),
            ServerEvent::NewSimulation(_) => self.last_summary_tick = 0,
            ServerEvent::Close(reason) => return Some(Exit::ServerClosed(reason)),
            _ => {}
        }
        None
    }

    fn maybe_summarize(&mut self, tick: u32) {
        let every = self.settings.summary_every_ticks;
        if every > 0 && tick >= self.last_summary_tick.saturating_add(every) {
            self.last_summary_tick = tick;
            self.log_summary();
        }
    }

    fn log_summary(&self) {
        let state = &self.state;
        let aboard = state.loads().filter(|l| l.is_aboard()).count();
        let waiting = state.loads().count() - aboard;
        let stats = state.stats();
        info!(
            phase = %state.phase(),
            tick = state.tick(),
            elevators = state.elevators().count(),
            waiting,
            aboard,
            delivered = stats.delivered,
            avg_wait = stats.average_wait().unwrap_or(0.0),
            avg_ride = stats.average_ride().unwrap_or(0.0),
            "summary"
        );
    }

    // ── Console ───────────────────────────────────────────────────

    async fn on_line(&mut self, line: &str) -> Result<Option<Exit>> {
        let action = match console::parse_line(line) {
            Ok(Some(action)) => action,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("{e}");
                return Ok(None);
            }
        };

        match action {
            ConsoleAction::Send(command) => self.send_or_warn(&command).await?,
            ConsoleAction::Passengers(count) => {
                let floors = self
                    .state
                    .config()
                    .map_or(self.settings.floors, |c| c.floor_count);
                match Command::random_passengers(count, floors, &mut self.rng) {
                    Ok(command) => self.send_or_warn(&command).await?,
                    Err(e) => warn!("{e}"),
                }
            }
            ConsoleAction::Status => {
                self.log_summary();
                for elevator in self.state.elevators() {
                    info!(
                        elevator = %elevator.id,
                        floor = elevator.current_floor,
                        destination = ?elevator.destination_floor,
                        loads = elevator.loads.len(),
                        "elevator"
                    );
                }
            }
            ConsoleAction::Help => info!("{HELP}"),
            ConsoleAction::Quit => return Ok(Some(Exit::Quit)),
        }
        Ok(None)
    }

    /// Encoding problems are the user's typo; only a dead transport is fatal.
    async fn send_or_warn(&self, command: &Command) -> Result<()> {
        match self.conn.send(command).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::Encoding => {
                warn!(error = %e, "command not sent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
