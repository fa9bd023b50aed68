//! The top-level state machine: hardware presence, worker lifecycle and the status LED.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::{SupervisorConfig, TimingConfig};
use crate::devices::{LedPointer, NetworkPointer};
use crate::probe::HardwareProbe;
use crate::HealthFlag;

/// Scheduling priority of the supervisor, above every worker.
pub const SUPERVISOR_PRIORITY: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemState {
    HardwareInit,
    HardwareError,
    Running,
}

/// The worker tasks as a group, the only way the supervisor touches them.
pub trait WorkerGroup {
    /// Creates every worker not created yet. Called again after a partial
    /// failure, at most once after success.
    fn create_all(&mut self) -> std::io::Result<()>;

    fn suspend_all(&mut self);

    fn resume_all(&mut self);
}

pub struct Supervisor<P, W> {
    probe: P,
    workers: W,
    health: HealthFlag,
    state: SystemState,
    tasks_created: bool,
    /// Some workers may exist, suspended, from an earlier failed creation.
    partially_created: bool,
    check_interval: Duration,
    last_check: Option<Instant>,
}

impl<P: HardwareProbe, W: WorkerGroup> Supervisor<P, W> {
    pub fn new(probe: P, workers: W, health: HealthFlag, config: &SupervisorConfig) -> Self {
        Self {
            probe,
            workers,
            health,
            state: SystemState::HardwareInit,
            tasks_created: false,
            partially_created: false,
            check_interval: config.hardware_check_interval(),
            last_check: None,
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn tasks_created(&self) -> bool {
        self.tasks_created
    }

    pub fn workers(&self) -> &W {
        &self.workers
    }

    fn check_due(&self, now: Instant) -> bool {
        self.last_check
            .map_or(true, |last| now.saturating_duration_since(last) >= self.check_interval)
    }

    /// Advances the machine once. `HardwareInit` always probes; the other
    /// states probe only when the check interval has elapsed since the last one.
    pub fn step(&mut self, now: Instant) -> SystemState {
        self.state = match self.state {
            SystemState::HardwareInit => self.initialize(now),
            SystemState::HardwareError => {
                if self.check_due(now) {
                    log::info!("System Monitor: Checking hardware.");
                    if self.probe.probe().all_ok() {
                        SystemState::HardwareInit
                    } else {
                        self.last_check = Some(now);
                        SystemState::HardwareError
                    }
                } else {
                    SystemState::HardwareError
                }
            }
            SystemState::Running => {
                if self.check_due(now) {
                    self.last_check = Some(now);
                    if self.probe.probe().all_ok() {
                        SystemState::Running
                    } else {
                        log::error!("System Monitor: Hardware failure. Suspending tasks.");
                        self.health.set(false);
                        self.workers.suspend_all();
                        SystemState::HardwareError
                    }
                } else {
                    SystemState::Running
                }
            }
        };
        self.state
    }

    fn initialize(&mut self, now: Instant) -> SystemState {
        log::info!("System Monitor: Checking hardware.");
        self.last_check = Some(now);

        if !self.probe.probe().all_ok() {
            self.health.set(false);
            return SystemState::HardwareError;
        }

        self.health.set(true);
        if self.tasks_created {
            log::info!("System Monitor: Hardware recovery successful. Resuming tasks.");
            self.workers.resume_all();
        } else {
            log::info!("System Monitor: Hardware OK. Initializing system.");
            if let Err(e) = self.workers.create_all() {
                log::error!("System Monitor: could not create tasks: {e}");
                self.health.set(false);
                self.workers.suspend_all();
                self.partially_created = true;
                return SystemState::HardwareError;
            }
            if self.partially_created {
                self.workers.resume_all();
                self.partially_created = false;
            }
            self.tasks_created = true;
        }
        SystemState::Running
    }

    /// Blocks until the network link reports connected, polling every `retry`.
    pub fn wait_for_network(network: &mut NetworkPointer, retry: Duration) {
        log::info!("System Monitor: Connecting to network.");
        let mut attempts = 0u32;
        while !network.is_connected() {
            attempts += 1;
            if attempts % 10 == 0 {
                log::info!("System Monitor: still waiting for network ({attempts} attempts)");
            }
            thread::sleep(retry);
        }
        log::info!("System Monitor: Connected.");
    }

    /// Waits for the network, then runs the machine for the lifetime of the
    /// process. Never returns.
    pub fn run(
        mut self,
        mut network: NetworkPointer,
        mut led: LedPointer,
        timing: &TimingConfig,
        config: &SupervisorConfig,
    ) {
        Self::wait_for_network(
            &mut network,
            Duration::from_millis(timing.network_connect_interval_ms),
        );

        let pulse = Duration::from_millis(config.led_pulse_ms);
        loop {
            let blink = match self.step(Instant::now()) {
                SystemState::HardwareInit => continue,
                SystemState::HardwareError => config.error_blink_interval_ms,
                SystemState::Running => config.running_blink_interval_ms,
            };

            led.set(true);
            thread::sleep(pulse);
            led.set(false);
            thread::sleep(Duration::from_millis(blink));
        }
    }
}
