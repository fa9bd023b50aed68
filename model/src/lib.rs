//! Data types shared by the station tasks: the sensor sample, calendar helpers,
//! the averaging buffer and the on-disk / remote record layouts.

mod aggregation;
mod calendar;
mod layout;

pub use aggregation::AggregationBuffer;
pub use calendar::{month_name, LocalTime, MONTH_NAMES};
pub use layout::{LogPaths, RemoteRecordPath, LOG_HEADER, REMOTE_TIMESTAMP_MARKER};

use serde::{Deserialize, Serialize};

/// One reading of the barometric sensor.
///
/// Samples are replaced as a whole, never field by field, so a temperature is
/// always paired with the pressure taken in the same read.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorSample {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Pressure in hectopascal.
    pub pressure: f32,
}

impl SensorSample {
    pub const fn new(temperature: f32, pressure: f32) -> Self {
        Self {
            temperature,
            pressure,
        }
    }

    pub fn temperature_fahrenheit(&self) -> f32 {
        to_fahrenheit(self.temperature)
    }
}

/// Converts degrees Celsius to degrees Fahrenheit.
pub fn to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

#[test]
fn test_fahrenheit_fixed_points() {
    assert_eq!(to_fahrenheit(0.0), 32.0);
    assert_eq!(to_fahrenheit(100.0), 212.0);
    assert_eq!(to_fahrenheit(-40.0), -40.0);
}

#[test]
fn test_sample_serializes_with_field_names() {
    let json = serde_json::to_string(&SensorSample::new(21.5, 1013.25)).unwrap();
    assert_eq!(json, r#"{"temperature":21.5,"pressure":1013.25}"#);
}
