//! Text commands typed on stdin.
//!
//! ```text
//! elevator <floor>        add an elevator
//! remove <id>             remove an elevator
//! floors <n>              set the floor count
//! speed <x>               set the speed multiplier
//! rate <n>                set updates per second
//! passengers <n>          spawn n random passengers
//! algorithm <name|id>     switch dispatch algorithm
//! maxload <kg>            set the per-elevator max load
//! start | stop | new      simulation lifecycle
//! dashboard               ask the server for its report
//! status                  log the local mirror
//! help | quit
//! ```

use elevsim_core::{Algorithm, Command, ElevsimError, Result};

/// What a console line asks the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    /// Send a command as-is.
    Send(Command),
    /// Spawn random passengers over the mirrored floor count.
    Passengers(u32),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "commands: elevator <floor>, remove <id>, floors <n>, speed <x>, \
rate <n>, passengers <n>, algorithm <name|id>, maxload <kg>, start, stop, new, dashboard, \
status, help, quit";

/// Parse one line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleAction>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.collect::<Vec<_>>().join(" ");

    let action = match verb.to_ascii_lowercase().as_str() {
        "elevator" => ConsoleAction::Send(Command::AddElevator {
            floor: number(verb, &arg)?,
        }),
        "remove" => ConsoleAction::Send(Command::RemoveElevator {
            elevator_id: number(verb, &arg)?,
        }),
        "floors" => ConsoleAction::Send(Command::SetFloors {
            count: number(verb, &arg)?,
        }),
        "speed" => ConsoleAction::Send(Command::SetSimulationSpeed {
            speed: number(verb, &arg)?,
        }),
        "rate" => ConsoleAction::Send(Command::SetUpdateRate {
            rate: number(verb, &arg)?,
        }),
        "maxload" => ConsoleAction::Send(Command::SetMaxLoad {
            value: number(verb, &arg)?,
        }),
        "algorithm" => ConsoleAction::Send(Command::SetAlgorithm {
            algorithm: arg.parse::<Algorithm>()?,
        }),
        "passengers" => ConsoleAction::Passengers(number(verb, &arg)?),
        "start" => ConsoleAction::Send(Command::StartSimulation),
        "stop" => ConsoleAction::Send(Command::StopSimulation),
        "new" => ConsoleAction::Send(Command::NewSimulation),
        "dashboard" => ConsoleAction::Send(Command::Dashboard),
        "status" => ConsoleAction::Status,
        "help" | "?" => ConsoleAction::Help,
        "quit" | "exit" => ConsoleAction::Quit,
        _ => {
            return Err(ElevsimError::InvalidCommand(format!(
                "unknown command {verb:?}"
            )));
        }
    };
    Ok(Some(action))
}

fn number<T: std::str::FromStr>(verb: &str, arg: &str) -> Result<T> {
    if arg.is_empty() {
        return Err(ElevsimError::InvalidCommand(format!(
            "{verb} requires an argument"
        )));
    }
    arg.parse()
        .map_err(|_| ElevsimError::InvalidCommand(format!("{verb}: invalid number {arg:?}")))
}
