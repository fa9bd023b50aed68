use std::sync::Arc;
use std::time::Duration;

use weather_station_model::SensorSample;

use crate::lock::TimedMutex;

/// The latest sensor sample, shared between the acquisition task and its consumers.
///
/// Only two operations exist: replace the whole sample, or copy it out. Both are
/// bounded waits on the sensor lock and report a timeout as `false` / `None`.
#[derive(Clone, Debug)]
pub struct SharedRecord(Arc<TimedMutex<SensorSample>>);

impl SharedRecord {
    pub fn new(wait: Duration) -> Self {
        Self(Arc::new(TimedMutex::new(
            "sensor",
            SensorSample::default(),
            wait,
        )))
    }

    /// Replaces the stored sample. Returns `false` if the lock timed out, in
    /// which case the stored sample is untouched.
    pub fn publish(&self, sample: SensorSample) -> bool {
        match self.0.acquire() {
            Some(mut stored) => {
                *stored = sample;
                true
            }
            None => false,
        }
    }

    /// Copies the stored sample out, or `None` if the lock timed out.
    pub fn snapshot(&self) -> Option<SensorSample> {
        self.0.acquire().map(|stored| *stored)
    }

    #[cfg(test)]
    pub(crate) fn lock(&self) -> &TimedMutex<SensorSample> {
        &self.0
    }
}
