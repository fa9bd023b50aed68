//! Narrow capability interfaces to the hardware and services the station talks to.
//!
//! The station never sees register maps, pixel rendering or filesystem internals;
//! it only drives these traits. `crate::sim` has in-memory implementations.

use std::io;

use weather_station_model::LocalTime;

/// Controller of the two-wire bus shared by the sensor and the display.
pub trait BusController {
    /// Re-initializes the bus, clearing a possibly wedged transaction.
    fn reset(&mut self);

    /// Whether a device acknowledges at `address`, without initializing it.
    fn is_present(&mut self, address: u8) -> bool;
}

/// Barometric temperature/pressure sensor on the two-wire bus.
pub trait SensorDevice {
    fn address(&self) -> u8;

    /// Full initialization; `false` if the chip does not come up.
    fn begin(&mut self) -> bool;

    /// Degrees Celsius.
    fn read_temperature(&mut self) -> f32;

    /// Pascal.
    fn read_pressure(&mut self) -> f32;
}

/// Monochrome text display on the two-wire bus.
pub trait DisplayDevice {
    fn address(&self) -> u8;

    fn begin(&mut self) -> bool;

    fn clear(&mut self);

    fn set_cursor(&mut self, x: u8, y: u8);

    fn set_text_size(&mut self, size: u8);

    fn set_text_color(&mut self, color: u16);

    fn print_line(&mut self, text: &str);

    /// Pushes the drawn frame to the panel.
    fn commit(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or truncate.
    Write,
    Append,
}

/// Block storage (the removable card) with a flat path namespace.
pub trait Storage {
    /// Mounts the card; `false` if it is absent.
    fn begin(&mut self) -> bool;

    fn exists(&mut self, path: &str) -> bool;

    fn mkdir(&mut self, path: &str) -> io::Result<()>;

    /// Dropping the returned handle closes the file.
    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<Box<dyn io::Write + Send>>;
}

/// Local wall clock, `None` while time is not yet known.
pub trait WallClock {
    fn now_local(&self) -> Option<LocalTime>;
}

/// Network link the remote store depends on.
pub trait NetworkLink {
    fn is_connected(&mut self) -> bool;
}

pub trait StatusLed {
    fn set(&mut self, on: bool);
}

/// Line-oriented text channel for operator commands.
pub trait ControlChannel {
    /// Next pending input byte, if any. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;

    fn write_line(&mut self, line: &str);
}

pub type BusControllerPointer = Box<dyn BusController + Send>;
pub type SensorPointer = Box<dyn SensorDevice + Send>;
pub type DisplayPointer = Box<dyn DisplayDevice + Send>;
pub type StoragePointer = Box<dyn Storage + Send>;
pub type ClockPointer = std::sync::Arc<dyn WallClock + Send + Sync>;
pub type NetworkPointer = Box<dyn NetworkLink + Send>;
pub type LedPointer = Box<dyn StatusLed + Send>;
pub type ControlChannelPointer = Box<dyn ControlChannel + Send>;

/// Everything reachable over the two-wire bus. Owned by the bus lock.
pub struct TwoWireBus {
    pub controller: BusControllerPointer,
    pub sensor: SensorPointer,
    pub display: DisplayPointer,
}

impl std::fmt::Debug for TwoWireBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoWireBus")
            .field("sensor", &self.sensor.address())
            .field("display", &self.display.address())
            .finish()
    }
}

/// System local time from `chrono`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalClock;

impl WallClock for LocalClock {
    fn now_local(&self) -> Option<LocalTime> {
        Some(LocalTime::from(&chrono::Local::now()))
    }
}
