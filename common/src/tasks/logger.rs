use std::io::Write;

use weather_station_model::{AggregationBuffer, LocalTime, LogPaths, SensorSample, LOG_HEADER};

use super::{Discard, Skip};
use crate::devices::{ClockPointer, OpenMode, Storage};
use crate::error::StorageError;
use crate::task::PeriodicTask;
use crate::{HealthFlag, LockSet};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoggerCycle {
    /// Sample added; the buffer now holds this many.
    Buffered(usize),
    /// An averaged row was appended.
    Logged(SensorSample),
    Discarded(Discard),
    Skipped(Skip),
}

/// Averages samples and appends one CSV row per full buffer to the daily log.
pub struct LoggerTask {
    locks: LockSet,
    health: HealthFlag,
    clock: ClockPointer,
    buffer: AggregationBuffer,
}

impl LoggerTask {
    pub fn new(locks: LockSet, health: HealthFlag, clock: ClockPointer, samples: usize) -> Self {
        Self {
            locks,
            health,
            clock,
            buffer: AggregationBuffer::new(samples),
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn flush(&mut self, average: SensorSample) -> LoggerCycle {
        let Some(now) = self.clock.now_local() else {
            log::error!("SD Card Task: Failed to get time. Skipping log.");
            return LoggerCycle::Discarded(Discard::ClockUnavailable);
        };
        let paths = LogPaths::for_time(&now);

        let Some(mut storage) = self.locks.storage.acquire() else {
            log::warn!("SD Card Task: storage bus busy. Skipping log.");
            return LoggerCycle::Discarded(Discard::StorageBusy);
        };
        if !self.health.is_healthy() {
            return LoggerCycle::Discarded(Discard::Unhealthy);
        }

        match append_row(&mut **storage, &paths, &now, &average) {
            Ok(()) => {
                log::debug!("SD Card Task: logged {:?} to {}", average, paths.file);
                LoggerCycle::Logged(average)
            }
            Err(e) => {
                log::error!("SD Card Task: {e}. Skipping log.");
                LoggerCycle::Discarded(Discard::StorageFailed)
            }
        }
    }
}

/// Creates the folder and the file (with header) as needed, then appends the row.
fn append_row(
    storage: &mut dyn Storage,
    paths: &LogPaths,
    time: &LocalTime,
    average: &SensorSample,
) -> Result<(), StorageError> {
    if !storage.exists(&paths.folder) {
        storage
            .mkdir(&paths.folder)
            .map_err(|source| StorageError::CreateFolder {
                path: paths.folder.clone(),
                source,
            })?;
    }

    if !storage.exists(&paths.file) {
        let create = |source| StorageError::CreateFile {
            path: paths.file.clone(),
            source,
        };
        let mut file = storage.open(&paths.file, OpenMode::Write).map_err(create)?;
        writeln!(file, "{LOG_HEADER}").map_err(create)?;
    }

    let mut file = storage
        .open(&paths.file, OpenMode::Append)
        .map_err(|source| StorageError::Open {
            path: paths.file.clone(),
            source,
        })?;
    file.write_all(LogPaths::row(time, average).as_bytes())
        .and_then(|()| file.flush())
        .map_err(|source| StorageError::Write {
            path: paths.file.clone(),
            source,
        })
}

impl PeriodicTask for LoggerTask {
    type Outcome = LoggerCycle;

    fn run_cycle(&mut self) -> LoggerCycle {
        let Some(sample) = self.locks.record.snapshot() else {
            return LoggerCycle::Skipped(Skip::RecordBusy);
        };

        match self.buffer.push(sample) {
            Some(average) => self.flush(average),
            None => LoggerCycle::Buffered(self.buffer.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{FixedClock, SimulatedHardware};
    use std::sync::Arc;

    const FILE: &str = "/March_2024/5_March_2024.csv";

    fn march_fifth() -> LocalTime {
        LocalTime {
            year: 2024,
            month: 2,
            day: 5,
            hour: 14,
            minute: 0,
            second: 30,
        }
    }

    fn setup(samples: usize) -> (SimulatedHardware, LockSet, FixedClock, LoggerTask) {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        let clock = FixedClock::new(Some(march_fifth()));
        let task = LoggerTask::new(
            locks.clone(),
            HealthFlag::new(true),
            Arc::new(clock.clone()),
            samples,
        );
        (hardware, locks, clock, task)
    }

    #[test]
    fn test_full_buffer_writes_header_and_row() {
        let (hardware, locks, _clock, mut task) = setup(2);

        locks.record.publish(SensorSample::new(20.0, 1000.0));
        assert_eq!(task.run_cycle(), LoggerCycle::Buffered(1));
        locks.record.publish(SensorSample::new(22.0, 1002.0));
        assert_eq!(
            task.run_cycle(),
            LoggerCycle::Logged(SensorSample::new(21.0, 1001.0))
        );

        assert!(hardware.storage().has_folder("/March_2024"));
        assert_eq!(
            hardware.storage().contents(FILE).unwrap(),
            "Time,Temperature_C,Temperature_F,Pressure_hPa\n14:00:30,21.00,69.80,1001.00\n"
        );
        assert_eq!(task.buffered(), 0);
    }

    #[test]
    fn test_existing_file_gets_rows_appended_without_second_header() {
        let (hardware, locks, _clock, mut task) = setup(1);
        locks.record.publish(SensorSample::new(20.0, 1000.0));

        task.run_cycle();
        task.run_cycle();

        let contents = hardware.storage().contents(FILE).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(contents.matches("Time,").count(), 1);
    }

    #[test]
    fn test_missing_clock_drops_the_batch() {
        let (hardware, locks, clock, mut task) = setup(2);
        clock.set(None);
        locks.record.publish(SensorSample::new(20.0, 1000.0));

        task.run_cycle();
        assert_eq!(
            task.run_cycle(),
            LoggerCycle::Discarded(Discard::ClockUnavailable)
        );
        assert_eq!(task.buffered(), 0);
        assert!(hardware.storage().contents(FILE).is_none());
    }

    #[test]
    fn test_write_failure_releases_the_storage_lock() {
        let (hardware, locks, _clock, mut task) = setup(1);
        locks.record.publish(SensorSample::new(20.0, 1000.0));
        hardware.storage().fail_writes(true);

        assert_eq!(
            task.run_cycle(),
            LoggerCycle::Discarded(Discard::StorageFailed)
        );
        assert!(locks.storage.acquire().is_some());

        hardware.storage().fail_writes(false);
        assert_eq!(
            task.run_cycle(),
            LoggerCycle::Logged(SensorSample::new(20.0, 1000.0))
        );
    }

    #[test]
    fn test_unmounted_card_fails_folder_creation() {
        let (hardware, locks, _clock, mut task) = setup(1);
        locks.record.publish(SensorSample::new(20.0, 1000.0));
        hardware.presence().set_storage(false);

        assert_eq!(
            task.run_cycle(),
            LoggerCycle::Discarded(Discard::StorageFailed)
        );
        assert!(locks.storage.acquire().is_some());
    }

    #[test]
    fn test_busy_storage_drops_the_batch() {
        let (hardware, locks, _clock, mut task) = setup(1);
        locks.record.publish(SensorSample::new(20.0, 1000.0));

        let held = locks.storage.acquire().unwrap();
        assert_eq!(
            task.run_cycle(),
            LoggerCycle::Discarded(Discard::StorageBusy)
        );
        drop(held);
        assert!(hardware.storage().contents(FILE).is_none());
    }

    #[test]
    fn test_record_lock_timeout_buffers_nothing() {
        let (_hardware, locks, _clock, mut task) = setup(2);

        let held = locks.record.lock().acquire().unwrap();
        assert_eq!(task.run_cycle(), LoggerCycle::Skipped(Skip::RecordBusy));
        drop(held);
        assert_eq!(task.buffered(), 0);
    }
}
