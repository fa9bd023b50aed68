//! In-memory stand-ins for the station's devices and services.
//!
//! Every simulated device shares its state through an `Arc`, so a test (or the
//! desktop runner) keeps a handle on the same switches and captures the station
//! drives, for example to unplug a device or read back the last frame.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use weather_station_model::{LocalTime, SensorSample};

use crate::config::StationConfig;
use crate::devices::{
    BusController, ControlChannel, DisplayDevice, NetworkLink, OpenMode, SensorDevice,
    StatusLed, Storage, TwoWireBus, WallClock,
};
use crate::error::RemoteError;
use crate::remote::{RemoteStore, RemoteWrite};
use crate::LockSet;

/// Locks a simulation mutex, ignoring poison: a panicking test thread must not
/// take the other assertions down with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct Presence {
    sensor: AtomicBool,
    display: AtomicBool,
    storage: AtomicBool,
    bus_resets: AtomicUsize,
    sensor_inits: AtomicUsize,
    display_inits: AtomicUsize,
    sensor_reads: AtomicUsize,
}

/// Plug state of the simulated devices plus counters of what was done to them.
#[derive(Clone, Debug)]
pub struct HardwarePresence(Arc<Presence>);

impl Default for HardwarePresence {
    fn default() -> Self {
        Self(Arc::new(Presence {
            sensor: AtomicBool::new(true),
            display: AtomicBool::new(true),
            storage: AtomicBool::new(true),
            bus_resets: AtomicUsize::new(0),
            sensor_inits: AtomicUsize::new(0),
            display_inits: AtomicUsize::new(0),
            sensor_reads: AtomicUsize::new(0),
        }))
    }
}

impl HardwarePresence {
    pub fn set_sensor(&self, present: bool) {
        self.0.sensor.store(present, Ordering::SeqCst);
    }

    pub fn set_display(&self, present: bool) {
        self.0.display.store(present, Ordering::SeqCst);
    }

    pub fn set_storage(&self, present: bool) {
        self.0.storage.store(present, Ordering::SeqCst);
    }

    /// Plugs or unplugs both two-wire devices at once.
    pub fn set_two_wire(&self, present: bool) {
        self.set_sensor(present);
        self.set_display(present);
    }

    pub fn sensor(&self) -> bool {
        self.0.sensor.load(Ordering::SeqCst)
    }

    pub fn display(&self) -> bool {
        self.0.display.load(Ordering::SeqCst)
    }

    pub fn storage(&self) -> bool {
        self.0.storage.load(Ordering::SeqCst)
    }

    pub fn bus_resets(&self) -> usize {
        self.0.bus_resets.load(Ordering::SeqCst)
    }

    pub fn sensor_inits(&self) -> usize {
        self.0.sensor_inits.load(Ordering::SeqCst)
    }

    pub fn display_inits(&self) -> usize {
        self.0.display_inits.load(Ordering::SeqCst)
    }

    pub fn sensor_reads(&self) -> usize {
        self.0.sensor_reads.load(Ordering::SeqCst)
    }
}

/// A complete set of simulated devices sharing one presence switchboard.
#[derive(Clone, Debug)]
pub struct SimulatedHardware {
    presence: HardwarePresence,
    reading: Arc<Mutex<Option<SensorSample>>>,
    frame: FrameCapture,
    storage: MemoryStorage,
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHardware {
    /// All devices plugged in, empty card, blank panel.
    pub fn new() -> Self {
        let presence = HardwarePresence::default();
        Self {
            storage: MemoryStorage {
                card: Default::default(),
                presence: presence.clone(),
            },
            presence,
            reading: Default::default(),
            frame: FrameCapture::default(),
        }
    }

    pub fn presence(&self) -> &HardwarePresence {
        &self.presence
    }

    /// Fixes what the sensor reports (pressure in hPa). Without a fixed
    /// reading the sensor drifts slowly around a mild spring day.
    pub fn set_reading(&self, sample: SensorSample) {
        *lock(&self.reading) = Some(sample);
    }

    pub fn frame(&self) -> &FrameCapture {
        &self.frame
    }

    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }

    pub fn two_wire_bus(&self, config: &StationConfig) -> TwoWireBus {
        TwoWireBus {
            controller: Box::new(SimulatedBus {
                presence: self.presence.clone(),
                sensor_address: config.devices.sensor_address,
                display_address: config.devices.display_address,
            }),
            sensor: Box::new(SimulatedSensor {
                presence: self.presence.clone(),
                address: config.devices.sensor_address,
                reading: self.reading.clone(),
                tick: 0,
            }),
            display: Box::new(SimulatedDisplay {
                presence: self.presence.clone(),
                address: config.devices.display_address,
                capture: self.frame.clone(),
                drawing: Vec::new(),
            }),
        }
    }

    /// Lock set wired to these devices and the in-memory card.
    pub fn lock_set(&self, config: &StationConfig) -> LockSet {
        LockSet::new(
            &config.locks,
            self.two_wire_bus(config),
            Box::new(self.storage.clone()),
        )
    }
}

/// Two-wire bus controller answering for whichever devices are plugged in.
#[derive(Debug)]
pub struct SimulatedBus {
    presence: HardwarePresence,
    sensor_address: u8,
    display_address: u8,
}

impl BusController for SimulatedBus {
    fn reset(&mut self) {
        self.presence.0.bus_resets.fetch_add(1, Ordering::SeqCst);
    }

    fn is_present(&mut self, address: u8) -> bool {
        if address == self.sensor_address {
            self.presence.sensor()
        } else if address == self.display_address {
            self.presence.display()
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct SimulatedSensor {
    presence: HardwarePresence,
    address: u8,
    reading: Arc<Mutex<Option<SensorSample>>>,
    tick: u32,
}

impl SimulatedSensor {
    fn current(&self) -> SensorSample {
        let fixed = *lock(&self.reading);
        fixed.unwrap_or_else(|| {
            let phase = self.tick as f32 / 60.0;
            SensorSample::new(18.0 + 2.0 * phase.sin(), 1013.25 + 1.5 * phase.cos())
        })
    }
}

impl SensorDevice for SimulatedSensor {
    fn address(&self) -> u8 {
        self.address
    }

    fn begin(&mut self) -> bool {
        self.presence.0.sensor_inits.fetch_add(1, Ordering::SeqCst);
        self.presence.sensor()
    }

    fn read_temperature(&mut self) -> f32 {
        self.presence.0.sensor_reads.fetch_add(1, Ordering::SeqCst);
        self.tick = self.tick.wrapping_add(1);
        if self.presence.sensor() {
            self.current().temperature
        } else {
            f32::NAN
        }
    }

    fn read_pressure(&mut self) -> f32 {
        if self.presence.sensor() {
            self.current().pressure * 100.0
        } else {
            f32::NAN
        }
    }
}

#[derive(Debug, Default)]
struct Frame {
    lines: Vec<String>,
    commits: usize,
}

/// What the simulated panel currently shows.
#[derive(Clone, Debug, Default)]
pub struct FrameCapture(Arc<Mutex<Frame>>);

impl FrameCapture {
    /// Lines of the last committed frame.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.0).lines.clone()
    }

    pub fn commits(&self) -> usize {
        lock(&self.0).commits
    }
}

#[derive(Debug)]
pub struct SimulatedDisplay {
    presence: HardwarePresence,
    address: u8,
    capture: FrameCapture,
    drawing: Vec<String>,
}

impl DisplayDevice for SimulatedDisplay {
    fn address(&self) -> u8 {
        self.address
    }

    fn begin(&mut self) -> bool {
        self.presence.0.display_inits.fetch_add(1, Ordering::SeqCst);
        self.presence.display()
    }

    fn clear(&mut self) {
        self.drawing.clear();
    }

    fn set_cursor(&mut self, _x: u8, _y: u8) {}

    fn set_text_size(&mut self, _size: u8) {}

    fn set_text_color(&mut self, _color: u16) {}

    fn print_line(&mut self, text: &str) {
        self.drawing.push(text.to_string());
    }

    fn commit(&mut self) {
        if !self.presence.display() {
            return;
        }
        let mut frame = lock(&self.capture.0);
        frame.lines = self.drawing.clone();
        frame.commits += 1;
    }
}

#[derive(Debug, Default)]
struct Card {
    folders: BTreeSet<String>,
    files: BTreeMap<String, String>,
    fail_writes: bool,
}

/// Storage card kept in memory. Unmounted while the storage presence switch is off.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    card: Arc<Mutex<Card>>,
    presence: HardwarePresence,
}

impl MemoryStorage {
    /// A card that is always plugged in.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_folder(&self, path: &str) -> bool {
        lock(&self.card).folders.contains(path)
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        lock(&self.card).files.get(path).cloned()
    }

    /// Makes every open fail until switched off again.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.card).fail_writes = fail;
    }

    fn mounted(&self) -> io::Result<()> {
        if self.presence.storage() {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "card not mounted"))
        }
    }
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

impl Storage for MemoryStorage {
    fn begin(&mut self) -> bool {
        self.presence.storage()
    }

    fn exists(&mut self, path: &str) -> bool {
        if self.mounted().is_err() {
            return false;
        }
        let card = lock(&self.card);
        card.folders.contains(path) || card.files.contains_key(path)
    }

    fn mkdir(&mut self, path: &str) -> io::Result<()> {
        self.mounted()?;
        lock(&self.card).folders.insert(path.to_string());
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<Box<dyn io::Write + Send>> {
        self.mounted()?;
        let mut card = lock(&self.card);
        if card.fail_writes {
            return Err(io::Error::other("injected write failure"));
        }
        let folder = parent(path);
        if !folder.is_empty() && !card.folders.contains(folder) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such folder"));
        }

        let file = card.files.entry(path.to_string()).or_default();
        if mode == OpenMode::Write {
            file.clear();
        }

        Ok(Box::new(MemoryFile {
            storage: self.clone(),
            path: path.to_string(),
        }))
    }
}

struct MemoryFile {
    storage: MemoryStorage,
    path: String,
}

impl io::Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.storage.mounted()?;
        let mut card = lock(&self.storage.card);
        if card.fail_writes {
            return Err(io::Error::other("injected write failure"));
        }
        let text = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        card.files
            .entry(self.path.clone())
            .or_default()
            .push_str(text);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wall clock frozen at a settable instant, or unavailable.
#[derive(Clone, Debug, Default)]
pub struct FixedClock(Arc<Mutex<Option<LocalTime>>>);

impl FixedClock {
    pub fn new(now: Option<LocalTime>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn set(&self, now: Option<LocalTime>) {
        *lock(&self.0) = now;
    }
}

impl WallClock for FixedClock {
    fn now_local(&self) -> Option<LocalTime> {
        *lock(&self.0)
    }
}

#[derive(Debug, Default)]
struct Recording {
    ready: AtomicBool,
    reject: AtomicBool,
    writes: Mutex<Vec<RemoteWrite>>,
}

/// Remote store that keeps every accepted write in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingRemote(Arc<Recording>);

impl RecordingRemote {
    pub fn new(ready: bool) -> Self {
        let remote = Self::default();
        remote.set_ready(ready);
        remote
    }

    pub fn set_ready(&self, ready: bool) {
        self.0.ready.store(ready, Ordering::SeqCst);
    }

    pub fn reject_writes(&self, reject: bool) {
        self.0.reject.store(reject, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<RemoteWrite> {
        lock(&self.0.writes).clone()
    }
}

impl RemoteStore for RecordingRemote {
    fn is_ready(&self) -> bool {
        self.0.ready.load(Ordering::SeqCst)
    }

    async fn apply(&mut self, write: &RemoteWrite) -> Result<(), RemoteError> {
        if !self.is_ready() {
            return Err(RemoteError::NotReady);
        }
        if self.0.reject.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected("write rejected by test".into()));
        }
        lock(&self.0.writes).push(write.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Console {
    input: VecDeque<u8>,
    output: Vec<String>,
}

/// Control channel fed from a script, capturing everything written back.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConsole(Arc<Mutex<Console>>);

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `line` followed by a newline.
    pub fn type_line(&self, line: &str) {
        let mut console = lock(&self.0);
        console.input.extend(line.as_bytes());
        console.input.push_back(b'\n');
    }

    pub fn output(&self) -> Vec<String> {
        lock(&self.0).output.clone()
    }
}

impl ControlChannel for ScriptedConsole {
    fn read_byte(&mut self) -> Option<u8> {
        lock(&self.0).input.pop_front()
    }

    fn write_line(&mut self, line: &str) {
        lock(&self.0).output.push(line.to_string());
    }
}

/// Network link with a switchable connection.
#[derive(Clone, Debug)]
pub struct SimulatedNetwork(Arc<AtomicBool>);

impl SimulatedNetwork {
    pub fn new(connected: bool) -> Self {
        Self(Arc::new(AtomicBool::new(connected)))
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

impl NetworkLink for SimulatedNetwork {
    fn is_connected(&mut self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Status LED that counts its pulses and logs them at trace level.
#[derive(Clone, Debug, Default)]
pub struct SimulatedLed(Arc<AtomicUsize>);

impl SimulatedLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the LED was switched on.
    pub fn pulses(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl StatusLed for SimulatedLed {
    fn set(&mut self, on: bool) {
        if on {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        log::trace!("status led {}", if on { "on" } else { "off" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_storage_needs_parent_folder() {
        let mut storage = MemoryStorage::new();
        assert!(storage.open("/May_2024/1_May_2024.csv", OpenMode::Write).is_err());

        storage.mkdir("/May_2024").unwrap();
        let mut file = storage
            .open("/May_2024/1_May_2024.csv", OpenMode::Write)
            .unwrap();
        file.write_all(b"a\n").unwrap();
        drop(file);

        let mut file = storage
            .open("/May_2024/1_May_2024.csv", OpenMode::Append)
            .unwrap();
        file.write_all(b"b\n").unwrap();
        assert_eq!(storage.contents("/May_2024/1_May_2024.csv").unwrap(), "a\nb\n");
    }

    #[test]
    fn test_unplugged_card_hides_its_files() {
        let hardware = SimulatedHardware::new();
        let mut storage = hardware.storage().clone();
        storage.mkdir("/x").unwrap();

        hardware.presence().set_storage(false);
        assert!(!storage.begin());
        assert!(!storage.exists("/x"));
        assert!(storage.mkdir("/y").is_err());
    }

    #[test]
    fn test_sensor_reports_pascal() {
        let hardware = SimulatedHardware::new();
        hardware.set_reading(SensorSample::new(20.0, 1000.0));
        let mut bus = hardware.two_wire_bus(&StationConfig::default());

        assert_eq!(bus.sensor.read_temperature(), 20.0);
        assert_eq!(bus.sensor.read_pressure(), 100_000.0);

        hardware.presence().set_sensor(false);
        assert!(bus.sensor.read_temperature().is_nan());
    }
}
