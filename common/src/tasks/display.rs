use weather_station_model::SensorSample;

use super::Skip;
use crate::task::PeriodicTask;
use crate::{HealthFlag, LockSet};

pub const DISPLAY_HEADER: &str = "BMP 280 Data:";

const TEXT_COLOR_WHITE: u16 = 1;

/// The text lines of one frame: two header lines, then °C, °F and hPa.
pub fn frame_lines(sample: &SensorSample) -> [String; 5] {
    [
        DISPLAY_HEADER.to_string(),
        String::new(),
        format!("{:.2} C", sample.temperature),
        format!("{:.2} F", sample.temperature_fahrenheit()),
        format!("{:.2} hPa", sample.pressure),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DisplayCycle {
    /// A frame was committed; `fresh` is false when it reused the last copy.
    Rendered { sample: SensorSample, fresh: bool },
    Skipped(Skip),
}

/// Renders the latest sample. A missed lock leaves the previous frame on screen.
pub struct DisplayTask {
    locks: LockSet,
    health: HealthFlag,
    text_size: u8,
    last: SensorSample,
}

impl DisplayTask {
    pub fn new(locks: LockSet, health: HealthFlag, text_size: u8) -> Self {
        Self {
            locks,
            health,
            text_size,
            last: SensorSample::default(),
        }
    }
}

impl PeriodicTask for DisplayTask {
    type Outcome = DisplayCycle;

    fn run_cycle(&mut self) -> DisplayCycle {
        // The sensor lock is released before the bus lock is taken.
        let fresh = match self.locks.record.snapshot() {
            Some(sample) => {
                self.last = sample;
                true
            }
            None => false,
        };

        let Some(mut bus) = self.locks.bus.acquire() else {
            return DisplayCycle::Skipped(Skip::BusBusy);
        };
        if !self.health.is_healthy() {
            return DisplayCycle::Skipped(Skip::Unhealthy);
        }

        let display = &mut bus.display;
        display.clear();
        display.set_text_color(TEXT_COLOR_WHITE);
        display.set_text_size(self.text_size);
        display.set_cursor(0, 0);
        for line in frame_lines(&self.last) {
            display.print_line(&line);
        }
        display.commit();

        DisplayCycle::Rendered {
            sample: self.last,
            fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHardware;

    #[test]
    fn test_frame_lines() {
        let lines = frame_lines(&SensorSample::new(25.0, 1013.25));
        assert_eq!(
            lines,
            ["BMP 280 Data:", "", "25.00 C", "77.00 F", "1013.25 hPa"].map(String::from)
        );
    }

    #[test]
    fn test_renders_latest_sample() {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        locks.record.publish(SensorSample::new(25.0, 1013.25));
        let mut task = DisplayTask::new(locks, HealthFlag::new(true), 2);

        let outcome = task.run_cycle();
        assert_eq!(
            outcome,
            DisplayCycle::Rendered {
                sample: SensorSample::new(25.0, 1013.25),
                fresh: true
            }
        );
        assert_eq!(hardware.frame().lines()[2], "25.00 C");
        assert_eq!(hardware.frame().commits(), 1);
    }

    #[test]
    fn test_record_lock_timeout_renders_last_copy() {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        let mut task = DisplayTask::new(locks.clone(), HealthFlag::new(true), 2);

        locks.record.publish(SensorSample::new(18.0, 1001.0));
        task.run_cycle();

        locks.record.publish(SensorSample::new(30.0, 1020.0));
        let held = locks.record.lock().acquire().unwrap();
        let outcome = task.run_cycle();
        drop(held);

        assert_eq!(
            outcome,
            DisplayCycle::Rendered {
                sample: SensorSample::new(18.0, 1001.0),
                fresh: false
            }
        );
        assert_eq!(hardware.frame().lines()[2], "18.00 C");
        assert_eq!(hardware.frame().commits(), 2);
    }

    #[test]
    fn test_unhealthy_keeps_previous_frame() {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        let health = HealthFlag::new(true);
        let mut task = DisplayTask::new(locks.clone(), health.clone(), 2);

        locks.record.publish(SensorSample::new(18.0, 1001.0));
        task.run_cycle();

        health.set(false);
        locks.record.publish(SensorSample::new(30.0, 1020.0));
        assert_eq!(task.run_cycle(), DisplayCycle::Skipped(Skip::Unhealthy));
        assert_eq!(hardware.frame().lines()[2], "18.00 C");
        assert_eq!(hardware.frame().commits(), 1);
    }
}
