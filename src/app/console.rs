//! Serial operator console: line-oriented dispatch onto the app surfaces.
//!
//! **Transport-decoupled**: the console does not own a UART.  Callers feed
//! one line via [`Console::dispatch`] and get the reply text back; the
//! firmware binary bridges stdin/stdout to it from its own task.
//!
//! | Line                          | Effect                                |
//! |-------------------------------|---------------------------------------|
//! | `status`                      | StatusBoard snapshot as JSON          |
//! | `pump on` / `light off`       | rate-limited manual relay toggle      |
//! | `calibrate dry` / `... wet`   | queued `AppCommand::Calibrate`        |
//! | `logs [n]` / `events [n]`     | newest `n` journal entries as JSON    |
//! | `delete logs 1,3,5-10`        | administrative journal delete         |
//! | `save`                        | queued `AppCommand::SaveConfig`       |
//! | `shutdown`                    | stop after the current cycle          |
//!
//! Manual pump toggles last until the next cycle: the loop reconciles the
//! pump with the watering state and wins.

use core::fmt;

use log::{info, warn};
use serde::Serialize;

use crate::calibration::ReferencePoint;
use crate::control::manual::ManualControl;
use crate::records::{IdSelection, IdSelectionError, RelayId};

use super::commands::{AppCommand, CommandChannel, ShutdownSignal};
use super::ports::{ActuatorPort, Clock, RecordJournal};
use super::status::StatusBoard;

const DEFAULT_LIST_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalKind {
    Logs,
    Events,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleRequest {
    Status,
    Relay { relay: RelayId, on: bool },
    Calibrate(ReferencePoint),
    List { kind: JournalKind, limit: usize },
    Delete { kind: JournalKind, ids: IdSelection },
    SaveConfig,
    Shutdown,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand,
    MissingArgument,
    BadArgument,
    Ids(IdSelectionError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::UnknownCommand => write!(f, "unknown command (try `help`)"),
            Self::MissingArgument => write!(f, "missing argument"),
            Self::BadArgument => write!(f, "bad argument"),
            Self::Ids(e) => write!(f, "{e}"),
        }
    }
}

impl From<IdSelectionError> for ParseError {
    fn from(e: IdSelectionError) -> Self {
        Self::Ids(e)
    }
}

const HELP: &str = "status | pump on|off | light on|off | calibrate dry|wet | \
                    logs [n] | events [n] | delete logs|events <ids|all> | save | shutdown";

/// Parse one console line.  Keywords are case-insensitive.
pub fn parse(line: &str) -> Result<ConsoleRequest, ParseError> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Err(ParseError::Empty);
    };
    let cmd = cmd.to_ascii_lowercase();

    let request = match cmd.as_str() {
        "status" => ConsoleRequest::Status,
        "help" | "?" => ConsoleRequest::Help,
        "save" => ConsoleRequest::SaveConfig,
        "shutdown" => ConsoleRequest::Shutdown,
        "pump" | "light" => {
            let relay = if cmd == "pump" { RelayId::Pump } else { RelayId::Light };
            let on = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("on") => true,
                Some("off") => false,
                Some(_) => return Err(ParseError::BadArgument),
                None => return Err(ParseError::MissingArgument),
            };
            ConsoleRequest::Relay { relay, on }
        }
        "calibrate" => match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("dry") => ConsoleRequest::Calibrate(ReferencePoint::Dry),
            Some("wet") => ConsoleRequest::Calibrate(ReferencePoint::Wet),
            Some(_) => return Err(ParseError::BadArgument),
            None => return Err(ParseError::MissingArgument),
        },
        "logs" | "events" => {
            let kind = if cmd == "logs" { JournalKind::Logs } else { JournalKind::Events };
            let limit = match words.next() {
                Some(n) => n.parse().map_err(|_| ParseError::BadArgument)?,
                None => DEFAULT_LIST_LEN,
            };
            ConsoleRequest::List { kind, limit }
        }
        "delete" => {
            let kind = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("logs") => JournalKind::Logs,
                Some("events") => JournalKind::Events,
                Some(_) => return Err(ParseError::BadArgument),
                None => return Err(ParseError::MissingArgument),
            };
            // Ids may contain spaces after commas; take the rest of the line.
            let rest: Vec<&str> = words.by_ref().collect();
            if rest.is_empty() {
                return Err(ParseError::MissingArgument);
            }
            let ids = IdSelection::parse(&rest.join(" "))?;
            ConsoleRequest::Delete { kind, ids }
        }
        _ => return Err(ParseError::UnknownCommand),
    };

    if words.next().is_some() {
        return Err(ParseError::BadArgument);
    }
    Ok(request)
}

/// Everything the console reaches.  All of it is shared with the control
/// loop, so only `&` references are held.
pub struct Console<'a, A, J, C> {
    manual: ManualControl<'a, A>,
    journal: &'a J,
    clock: &'a C,
    status: &'a StatusBoard,
    commands: &'a CommandChannel,
    shutdown: &'a ShutdownSignal,
}

impl<'a, A, J, C> Console<'a, A, J, C>
where
    A: ActuatorPort,
    J: RecordJournal,
    C: Clock,
{
    pub fn new(
        manual: ManualControl<'a, A>,
        journal: &'a J,
        clock: &'a C,
        status: &'a StatusBoard,
        commands: &'a CommandChannel,
        shutdown: &'a ShutdownSignal,
    ) -> Self {
        Self {
            manual,
            journal,
            clock,
            status,
            commands,
            shutdown,
        }
    }

    /// Execute one line and render the reply (`OK ...` or `ERR ...`).
    pub fn dispatch(&mut self, line: &str) -> String {
        match parse(line) {
            Ok(request) => self.execute(request),
            Err(ParseError::Empty) => String::new(),
            Err(e) => format!("ERR {e}"),
        }
    }

    pub fn execute(&mut self, request: ConsoleRequest) -> String {
        match request {
            ConsoleRequest::Status => json_reply(&self.status.snapshot()),
            ConsoleRequest::Help => format!("OK {HELP}"),
            ConsoleRequest::Relay { relay, on } => {
                match self.manual.toggle(relay, on, self.journal, self.clock) {
                    Ok(event) => format!("OK {} {:?}", relay.name(), event.action),
                    Err(e) => format!("ERR {e}"),
                }
            }
            ConsoleRequest::Calibrate(point) => self.enqueue(AppCommand::Calibrate(point)),
            ConsoleRequest::SaveConfig => self.enqueue(AppCommand::SaveConfig),
            ConsoleRequest::Shutdown => {
                info!("console: shutdown requested");
                self.shutdown.request();
                "OK stopping after current cycle".into()
            }
            ConsoleRequest::List { kind, limit } => {
                let listed = match kind {
                    JournalKind::Logs => self.journal.log_records().map(|v| json_reply(newest(&v, limit))),
                    JournalKind::Events => self.journal.relay_events().map(|v| json_reply(newest(&v, limit))),
                };
                listed.unwrap_or_else(|e| format!("ERR {e}"))
            }
            ConsoleRequest::Delete { kind, ids } => {
                let removed = match kind {
                    JournalKind::Logs => self.journal.delete_log_records(&ids),
                    JournalKind::Events => self.journal.delete_relay_events(&ids),
                };
                match removed {
                    Ok(n) => {
                        info!("console: deleted {} {:?} entries", n, kind);
                        format!("OK deleted {n}")
                    }
                    Err(e) => format!("ERR {e}"),
                }
            }
        }
    }

    fn enqueue(&self, cmd: AppCommand) -> String {
        match self.commands.try_send(cmd) {
            Ok(()) => "OK queued for next cycle".into(),
            Err(_) => {
                warn!("console: command channel full");
                "ERR busy, retry".into()
            }
        }
    }
}

fn newest<T>(entries: &[T], limit: usize) -> &[T] {
    &entries[entries.len().saturating_sub(limit)..]
}

fn json_reply<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => format!("OK {json}"),
        Err(_) => "ERR encoding failed".into(),
    }
}
