//! Runs the weather station on a desktop.
//!
//! The two-wire devices are simulated, the storage card is a directory, the
//! remote store is a JSON-lines journal and the terminal is the control channel.
//! Type `help` for the command vocabulary.

mod console;
mod journal;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;

use weather_station_common::devices::LocalClock;
use weather_station_common::sim::{SimulatedHardware, SimulatedLed, SimulatedNetwork};
use weather_station_common::{Station, StationConfig, StationDevices};

use crate::console::StdinConsole;
use crate::journal::JournalStore;
use crate::storage::DirectoryStorage;

const CONFIG_ENV: &str = "WEATHER_STATION_CONFIG";
const DATA_ENV: &str = "WEATHER_STATION_DATA";
const OUTAGE_ENV: &str = "WEATHER_STATION_OUTAGE";

/// A scheduled unplug of the two-wire devices.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Outage {
    start: Duration,
    duration: Duration,
}

impl Outage {
    /// Parses `<start_secs>:<duration_secs>`.
    fn parse(text: &str) -> anyhow::Result<Self> {
        let (start, duration) = text
            .split_once(':')
            .with_context(|| format!("expected <start>:<duration>, got {text:?}"))?;
        Ok(Self {
            start: Duration::try_from_secs_f64(start.trim().parse()?)?,
            duration: Duration::try_from_secs_f64(duration.trim().parse()?)?,
        })
    }

    fn schedule(self, hardware: SimulatedHardware) -> std::io::Result<()> {
        thread::Builder::new()
            .name("outage".into())
            .spawn(move || {
                thread::sleep(self.start);
                log::warn!("simulated outage: unplugging sensor and display");
                hardware.presence().set_two_wire(false);
                thread::sleep(self.duration);
                log::warn!("simulated outage over: plugging sensor and display back in");
                hardware.presence().set_two_wire(true);
            })
            .map(|_| ())
    }
}

/// Owns the configuration and the simulated hardware of a desktop station.
struct App {
    config: StationConfig,
    data_dir: PathBuf,
    hardware: SimulatedHardware,
    outage: Option<Outage>,
}

impl App {
    fn new() -> anyhow::Result<Self> {
        let config = match std::env::args().nth(1).or_else(|| std::env::var(CONFIG_ENV).ok()) {
            Some(path) => StationConfig::load(&path)
                .with_context(|| format!("loading config from {path}"))?,
            None => StationConfig::default(),
        };

        let data_dir = match std::env::var_os(DATA_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => directories::ProjectDirs::from("", "", "weather-station")
                .context("no home directory to keep station data in")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating {}", data_dir.display()))?;

        let outage = std::env::var(OUTAGE_ENV)
            .ok()
            .map(|text| Outage::parse(&text))
            .transpose()
            .with_context(|| format!("parsing {OUTAGE_ENV}"))?;

        Ok(Self {
            config,
            data_dir,
            hardware: SimulatedHardware::new(),
            outage,
        })
    }

    fn run(self) -> anyhow::Result<()> {
        log::info!("station data in {}", self.data_dir.display());

        let devices = StationDevices {
            bus: self.hardware.two_wire_bus(&self.config),
            storage: Box::new(DirectoryStorage::new(self.data_dir.join("card"))),
            clock: Arc::new(LocalClock),
            network: Box::new(SimulatedNetwork::new(true)),
            led: Box::new(SimulatedLed::new()),
            console: Box::new(StdinConsole::spawn()?),
        };
        let remote = JournalStore::new(self.data_dir.join("remote.jsonl"));

        if let Some(outage) = self.outage {
            outage.schedule(self.hardware.clone())?;
        }

        let station = Station::new(self.config, devices, remote).spawn()?;
        station
            .join()
            .map_err(|_| anyhow::anyhow!("system monitor panicked"))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let app = App::new()?;

    app.run()
}
