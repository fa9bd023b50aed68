use std::str::FromStr;
use std::sync::Weak;

use crate::devices::ControlChannelPointer;
use crate::task::{PeriodicTask, TaskRegistry, Worker};

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Accumulates console bytes into a line.
///
/// Backspace and delete remove the last character; printable characters past
/// the capacity are dropped silently. `\n` or `\r` completes the line.
#[derive(Clone, Debug)]
pub struct LineBuffer {
    line: String,
    capacity: usize,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            line: String::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Feeds one byte, returning the finished line when a terminator arrives.
    /// Empty lines are not reported.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\n' | b'\r' => {
                if self.line.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.line))
                }
            }
            BACKSPACE | DELETE => {
                self.line.pop();
                None
            }
            0x20..=0x7e => {
                if self.line.len() < self.capacity {
                    self.line.push(char::from(byte));
                }
                None
            }
            _ => None,
        }
    }
}

/// Which workers a start/stop command addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    Display,
    Logger,
    Telemetry,
}

impl Scope {
    pub fn workers(self) -> &'static [Worker] {
        match self {
            Scope::All => &Worker::DATA,
            Scope::Display => &[Worker::Display],
            Scope::Logger => &[Worker::Logger],
            Scope::Telemetry => &[Worker::Telemetry],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Scope::All => "all tasks",
            Scope::Display => "display",
            Scope::Logger => "sd card logging",
            Scope::Telemetry => "firebase upload",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Start(Scope),
    Stop(Scope),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Case-insensitive; runs of whitespace count as one space.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let normalized = line
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join(" ");

        let (verb, target) = normalized
            .split_once(' ')
            .unwrap_or((normalized.as_str(), ""));

        let scope = match target {
            "" => Scope::All,
            "display" => Scope::Display,
            "sd card" => Scope::Logger,
            "firebase" => Scope::Telemetry,
            _ => return Err(UnknownCommand(line.trim().to_string())),
        };

        match verb {
            "help" if target.is_empty() => Ok(Command::Help),
            "start" => Ok(Command::Start(scope)),
            "stop" => Ok(Command::Stop(scope)),
            _ => Err(UnknownCommand(line.trim().to_string())),
        }
    }
}

const HELP: [&str; 5] = [
    "Commands:",
    "  help",
    "  start [display | sd card | firebase]",
    "  stop [display | sd card | firebase]",
    "  start/stop without a target applies to all tasks",
];

/// Reads operator commands and suspends or resumes the matching workers.
///
/// Holds only a weak reference to the registry: it steers tasks, it never
/// owns them, and it never touches the shared record or a bus.
pub struct CommandTask {
    channel: ControlChannelPointer,
    registry: Weak<TaskRegistry>,
    line: LineBuffer,
}

impl CommandTask {
    pub fn new(
        channel: ControlChannelPointer,
        registry: Weak<TaskRegistry>,
        max_line_len: usize,
    ) -> Self {
        Self {
            channel,
            registry,
            line: LineBuffer::new(max_line_len),
        }
    }

    fn execute(&mut self, line: &str) -> Result<Command, UnknownCommand> {
        self.channel.write_line(&format!("> {line}"));

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                log::warn!("Serial Task: {e}");
                self.channel
                    .write_line(&format!("Unknown command '{}'. Type 'help'.", e.0));
                return Err(e);
            }
        };

        match command {
            Command::Help => {
                for line in HELP {
                    self.channel.write_line(line);
                }
            }
            Command::Start(scope) => {
                if let Some(registry) = self.registry.upgrade() {
                    registry.resume_all(scope.workers());
                }
                self.channel.write_line(&format!("Started {}.", scope.label()));
            }
            Command::Stop(scope) => {
                if let Some(registry) = self.registry.upgrade() {
                    registry.suspend_all(scope.workers());
                }
                self.channel.write_line(&format!("Stopped {}.", scope.label()));
            }
        }

        log::info!("Serial Task: {command:?}");
        Ok(command)
    }
}

impl PeriodicTask for CommandTask {
    type Outcome = Vec<Result<Command, UnknownCommand>>;

    /// Drains every pending byte, executing each completed line.
    fn run_cycle(&mut self) -> Self::Outcome {
        let mut executed = Vec::new();
        while let Some(byte) = self.channel.read_byte() {
            if let Some(line) = self.line.push(byte) {
                executed.push(self.execute(&line));
            }
        }
        executed
    }
}
