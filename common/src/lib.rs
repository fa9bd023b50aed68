//! Concurrency and fault-recovery core of the weather station.
//!
//! A fixed set of periodic worker threads shares one sensor record and two
//! buses through timed locks. A supervisor probes the hardware, creates the
//! workers once, and quarantines or resumes them as a group when devices
//! disappear or come back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod devices;
pub mod error;
pub mod lock;
pub mod probe;
pub mod record;
pub mod remote;
pub mod sim;
pub mod station;
pub mod supervisor;
pub mod task;
pub mod tasks;

pub use config::StationConfig;
pub use error::{ConfigError, RemoteError, StorageError};
pub use record::SharedRecord;
pub use station::{Station, StationDevices, StationHandle};
pub use supervisor::{Supervisor, SystemState};
pub use task::{TaskHandle, TaskRegistry, Worker};

use config::LockConfig;
use devices::{StoragePointer, TwoWireBus};
use lock::TimedMutex;

/// The three locks of the station and what they guard.
///
/// No task holds two of them at once: every multi-lock sequence releases the
/// first guard before asking for the next.
#[derive(Clone)]
pub struct LockSet {
    pub record: SharedRecord,
    pub bus: Arc<TimedMutex<TwoWireBus>>,
    pub storage: Arc<TimedMutex<StoragePointer>>,
}

impl LockSet {
    pub fn new(config: &LockConfig, bus: TwoWireBus, storage: StoragePointer) -> Self {
        Self {
            record: SharedRecord::new(Duration::from_millis(config.sensor_wait_ms)),
            bus: Arc::new(TimedMutex::new(
                "bus",
                bus,
                Duration::from_millis(config.bus_wait_ms),
            )),
            storage: Arc::new(TimedMutex::new(
                "storage",
                storage,
                Duration::from_millis(config.storage_wait_ms),
            )),
        }
    }
}

/// Outcome of the supervisor's most recent hardware probe, read by every
/// worker before it touches a bus.
#[derive(Clone, Debug, Default)]
pub struct HealthFlag(Arc<AtomicBool>);

impl HealthFlag {
    pub fn new(healthy: bool) -> Self {
        Self(Arc::new(AtomicBool::new(healthy)))
    }

    pub fn is_healthy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, healthy: bool) {
        self.0.store(healthy, Ordering::Release);
    }
}
