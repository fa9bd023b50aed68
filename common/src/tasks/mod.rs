//! Bodies of the periodic worker tasks. Each one exposes a single `run_cycle`
//! so the supervisor's loop and the tests drive exactly the same code.

mod acquisition;
mod command;
mod display;
mod logger;
mod telemetry;

pub use acquisition::{AcquisitionCycle, AcquisitionTask};
pub use command::{Command, CommandTask, LineBuffer, Scope, UnknownCommand};
pub use display::{frame_lines, DisplayCycle, DisplayTask, DISPLAY_HEADER};
pub use logger::{LoggerCycle, LoggerTask};
pub use telemetry::{TelemetryCycle, TelemetryTask};

/// Why a cycle did nothing this time round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Skip {
    /// The sensor lock timed out.
    RecordBusy,
    /// The two-wire bus lock timed out.
    BusBusy,
    /// The health flag is down; the device is presumed absent.
    Unhealthy,
}

/// Why an averaged record was dropped instead of stored or sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Discard {
    ClockUnavailable,
    StorageBusy,
    Unhealthy,
    StorageFailed,
    RemoteNotReady,
}
