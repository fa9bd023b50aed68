//! Wires devices, locks, tasks and the supervisor into a running station.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use weather_station_model::SensorSample;

use crate::config::StationConfig;
use crate::devices::{
    ClockPointer, ControlChannel, ControlChannelPointer, LedPointer, NetworkPointer,
    StoragePointer, TwoWireBus,
};
use crate::probe::BusProbe;
use crate::remote::{self, RemoteStore, TelemetryLink};
use crate::supervisor::{Supervisor, WorkerGroup, SUPERVISOR_PRIORITY};
use crate::task::{spawn_periodic, TaskHandle, TaskRegistry, Worker};
use crate::tasks::{AcquisitionTask, CommandTask, DisplayTask, LoggerTask, TelemetryTask};
use crate::{HealthFlag, LockSet};

/// Everything the station talks to.
pub struct StationDevices {
    pub bus: TwoWireBus,
    pub storage: StoragePointer,
    pub clock: ClockPointer,
    pub network: NetworkPointer,
    pub led: LedPointer,
    pub console: ControlChannelPointer,
}

/// The control channel, shared with the command task so a failed spawn
/// leaves it in place for the next attempt.
#[derive(Clone)]
struct SharedConsole(Arc<Mutex<ControlChannelPointer>>);

impl SharedConsole {
    fn new(console: ControlChannelPointer) -> Self {
        Self(Arc::new(Mutex::new(console)))
    }

    fn lock(&self) -> MutexGuard<'_, ControlChannelPointer> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ControlChannel for SharedConsole {
    fn read_byte(&mut self) -> Option<u8> {
        self.lock().read_byte()
    }

    fn write_line(&mut self, line: &str) {
        self.lock().write_line(line)
    }
}

/// The five worker tasks, created on the first healthy probe.
pub struct StationWorkers {
    config: StationConfig,
    locks: LockSet,
    health: HealthFlag,
    clock: ClockPointer,
    link: TelemetryLink,
    console: SharedConsole,
    registry: Arc<TaskRegistry>,
}

impl StationWorkers {
    fn period(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn spawn(&mut self, worker: Worker) -> io::Result<()> {
        let handle = TaskHandle::new(worker);
        let timing = &self.config.timing;

        let spawned = match worker {
            Worker::Acquisition => spawn_periodic(
                handle.clone(),
                AcquisitionTask::new(self.locks.clone(), self.health.clone()),
                Self::period(timing.sensor_read_interval_ms),
            ),
            Worker::Display => spawn_periodic(
                handle.clone(),
                DisplayTask::new(
                    self.locks.clone(),
                    self.health.clone(),
                    self.config.devices.display_text_size,
                ),
                Self::period(timing.display_update_interval_ms),
            ),
            Worker::Logger => spawn_periodic(
                handle.clone(),
                LoggerTask::new(
                    self.locks.clone(),
                    self.health.clone(),
                    self.clock.clone(),
                    self.config.aggregation.log_samples,
                ),
                Self::period(timing.log_sample_interval_ms),
            ),
            Worker::Telemetry => spawn_periodic(
                handle.clone(),
                TelemetryTask::new(
                    self.locks.clone(),
                    self.link.clone(),
                    self.clock.clone(),
                    self.config.telemetry.root.clone(),
                    self.config.aggregation.telemetry_samples,
                ),
                Self::period(timing.telemetry_sample_interval_ms),
            ),
            Worker::Command => spawn_periodic(
                handle.clone(),
                CommandTask::new(
                    Box::new(self.console.clone()),
                    Arc::downgrade(&self.registry),
                    self.config.command.max_line_len,
                ),
                Self::period(timing.command_poll_interval_ms),
            ),
        };

        // Detached: workers run for the life of the process.
        spawned?;
        self.registry.install(handle);
        Ok(())
    }
}

impl WorkerGroup for StationWorkers {
    fn create_all(&mut self) -> io::Result<()> {
        for worker in Worker::ALL {
            if !self.registry.is_created(worker) {
                self.spawn(worker)?;
            }
        }
        Ok(())
    }

    fn suspend_all(&mut self) {
        self.registry.suspend_all(&Worker::ALL);
    }

    fn resume_all(&mut self) {
        self.registry.resume_all(&Worker::ALL);
    }
}

/// A station ready to boot.
pub struct Station<S> {
    config: StationConfig,
    devices: StationDevices,
    remote: S,
}

impl<S: RemoteStore + Send + 'static> Station<S> {
    pub fn new(config: StationConfig, devices: StationDevices, remote: S) -> Self {
        Self {
            config,
            devices,
            remote,
        }
    }

    /// Starts the network pump and the supervisor thread. Workers follow once
    /// the first hardware probe succeeds.
    pub fn spawn(self) -> io::Result<StationHandle> {
        let Self {
            config,
            devices,
            remote,
        } = self;

        let locks = LockSet::new(&config.locks, devices.bus, devices.storage);
        let health = HealthFlag::new(false);
        let registry = Arc::new(TaskRegistry::new());

        let (link, publisher) = remote::channel(
            remote,
            Duration::from_millis(config.telemetry.pump_interval_ms),
        );
        publisher.spawn()?;

        let workers = StationWorkers {
            config: config.clone(),
            locks: locks.clone(),
            health: health.clone(),
            clock: devices.clock,
            link,
            console: SharedConsole::new(devices.console),
            registry: registry.clone(),
        };
        let supervisor = Supervisor::new(
            BusProbe::new(locks.clone()),
            workers,
            health.clone(),
            &config.supervisor,
        );

        let network = devices.network;
        let led = devices.led;
        let supervisor = thread::Builder::new()
            .name("system-monitor".into())
            .spawn(move || {
                log::info!("system-monitor started (priority {SUPERVISOR_PRIORITY})");
                supervisor.run(network, led, &config.timing, &config.supervisor);
            })?;

        Ok(StationHandle {
            registry,
            health,
            locks,
            supervisor,
        })
    }
}

/// Observes a running station.
pub struct StationHandle {
    registry: Arc<TaskRegistry>,
    health: HealthFlag,
    locks: LockSet,
    supervisor: JoinHandle<()>,
}

impl StationHandle {
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    /// The shared record as the consumers see it, `None` on lock timeout.
    pub fn latest_sample(&self) -> Option<SensorSample> {
        self.locks.record.snapshot()
    }

    /// Blocks on the supervisor, which only ever returns by panicking.
    pub fn join(self) -> thread::Result<()> {
        self.supervisor.join()
    }
}
