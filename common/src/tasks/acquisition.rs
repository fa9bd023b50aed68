use weather_station_model::SensorSample;

use super::Skip;
use crate::task::PeriodicTask;
use crate::{HealthFlag, LockSet};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AcquisitionCycle {
    Published(SensorSample),
    Skipped(Skip),
}

/// Reads the sensor and publishes the pair into the shared record.
pub struct AcquisitionTask {
    locks: LockSet,
    health: HealthFlag,
}

impl AcquisitionTask {
    pub fn new(locks: LockSet, health: HealthFlag) -> Self {
        Self { locks, health }
    }

    fn read(&self) -> Result<SensorSample, Skip> {
        let Some(mut bus) = self.locks.bus.acquire() else {
            return Err(Skip::BusBusy);
        };

        // Checked under the bus lock so a probe cannot flip it mid-read.
        if !self.health.is_healthy() {
            return Err(Skip::Unhealthy);
        }

        let temperature = bus.sensor.read_temperature();
        let pressure = bus.sensor.read_pressure() / 100.0;
        Ok(SensorSample::new(temperature, pressure))
    }
}

impl PeriodicTask for AcquisitionTask {
    type Outcome = AcquisitionCycle;

    fn run_cycle(&mut self) -> AcquisitionCycle {
        let sample = match self.read() {
            Ok(sample) => sample,
            Err(skip) => return AcquisitionCycle::Skipped(skip),
        };

        if self.locks.record.publish(sample) {
            AcquisitionCycle::Published(sample)
        } else {
            AcquisitionCycle::Skipped(Skip::RecordBusy)
        }
    }
}
