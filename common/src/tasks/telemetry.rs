use weather_station_model::{AggregationBuffer, RemoteRecordPath, SensorSample};

use super::{Discard, Skip};
use crate::devices::ClockPointer;
use crate::remote::TelemetryLink;
use crate::task::PeriodicTask;
use crate::LockSet;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TelemetryCycle {
    Buffered(usize),
    /// The averaged record was handed to the publisher; delivery is unconfirmed.
    Sent(SensorSample),
    Discarded(Discard),
    Skipped(Skip),
}

/// Averages samples and sends one record per full buffer to the remote store.
pub struct TelemetryTask {
    locks: LockSet,
    link: TelemetryLink,
    clock: ClockPointer,
    root: String,
    buffer: AggregationBuffer,
}

impl TelemetryTask {
    pub fn new(
        locks: LockSet,
        link: TelemetryLink,
        clock: ClockPointer,
        root: String,
        samples: usize,
    ) -> Self {
        Self {
            locks,
            link,
            clock,
            root,
            buffer: AggregationBuffer::new(samples),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn send(&self, average: SensorSample) -> TelemetryCycle {
        if !self.link.is_ready() {
            log::warn!("Firebase Task: Firebase not ready. Skipping upload.");
            return TelemetryCycle::Discarded(Discard::RemoteNotReady);
        }
        let Some(now) = self.clock.now_local() else {
            log::error!("Firebase Task: Failed to get time. Skipping upload.");
            return TelemetryCycle::Discarded(Discard::ClockUnavailable);
        };

        let record = RemoteRecordPath::new(&self.root, &now);
        self.link.set_float(
            record.field(RemoteRecordPath::TEMPERATURE_C),
            average.temperature,
        );
        self.link.set_float(
            record.field(RemoteRecordPath::TEMPERATURE_F),
            average.temperature_fahrenheit(),
        );
        self.link
            .set_float(record.field(RemoteRecordPath::PRESSURE_HPA), average.pressure);
        self.link
            .set_timestamp(record.timestamp_marker().to_string());

        log::debug!("Firebase Task: sent {:?} to {}", average, record.base());
        TelemetryCycle::Sent(average)
    }
}

impl PeriodicTask for TelemetryTask {
    type Outcome = TelemetryCycle;

    fn run_cycle(&mut self) -> TelemetryCycle {
        let Some(sample) = self.locks.record.snapshot() else {
            return TelemetryCycle::Skipped(Skip::RecordBusy);
        };

        match self.buffer.push(sample) {
            Some(average) => self.send(average),
            None => TelemetryCycle::Buffered(self.buffer.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{self, RemoteWrite};
    use crate::sim::{FixedClock, RecordingRemote, SimulatedHardware};
    use std::sync::Arc;
    use std::time::Duration;
    use weather_station_model::LocalTime;

    fn clock() -> FixedClock {
        FixedClock::new(Some(LocalTime {
            year: 2024,
            month: 2,
            day: 5,
            hour: 8,
            minute: 15,
            second: 0,
        }))
    }

    #[test]
    fn test_full_buffer_sends_three_fields_and_marker() {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        let remote = RecordingRemote::new(true);
        let (link, publisher) = remote::channel(remote.clone(), Duration::from_millis(5));
        let mut task = TelemetryTask::new(
            locks.clone(),
            link,
            Arc::new(clock()),
            "/devices/ws1".into(),
            2,
        );

        locks.record.publish(SensorSample::new(10.0, 1000.0));
        assert_eq!(task.run_cycle(), TelemetryCycle::Buffered(1));
        assert_eq!(
            task.run_cycle(),
            TelemetryCycle::Sent(SensorSample::new(10.0, 1000.0))
        );
        drop(task);

        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(publisher.run());

        let base = "/devices/ws1/2024/March/5/08_15_00";
        assert_eq!(
            remote.writes(),
            vec![
                RemoteWrite::Float {
                    path: format!("{base}/temperature_c"),
                    value: 10.0
                },
                RemoteWrite::Float {
                    path: format!("{base}/temperature_f"),
                    value: 50.0
                },
                RemoteWrite::Float {
                    path: format!("{base}/pressure_hpa"),
                    value: 1000.0
                },
                RemoteWrite::Timestamp {
                    path: "/devices/ws1/last_updated_timestamp".into()
                },
            ]
        );
    }

    #[test]
    fn test_not_ready_discards_the_average() {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        let remote = RecordingRemote::new(false);
        let (link, _publisher) = remote::channel(remote, Duration::from_millis(5));
        let mut task = TelemetryTask::new(locks.clone(), link, Arc::new(clock()), String::new(), 1);

        assert_eq!(
            task.run_cycle(),
            TelemetryCycle::Discarded(Discard::RemoteNotReady)
        );
        assert_eq!(task.buffered(), 0);
    }

    #[test]
    fn test_missing_clock_discards_the_average() {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        let (link, _publisher) =
            remote::channel(RecordingRemote::new(true), Duration::from_millis(5));
        let mut task = TelemetryTask::new(
            locks,
            link,
            Arc::new(FixedClock::new(None)),
            String::new(),
            1,
        );

        assert_eq!(
            task.run_cycle(),
            TelemetryCycle::Discarded(Discard::ClockUnavailable)
        );
    }
}
