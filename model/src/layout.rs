use crate::{LocalTime, SensorSample};

/// First line of every daily log file.
pub const LOG_HEADER: &str = "Time,Temperature_C,Temperature_F,Pressure_hPa";

/// Leaf name of the "last updated" marker under the remote root.
pub const REMOTE_TIMESTAMP_MARKER: &str = "last_updated_timestamp";

/// Location of the daily CSV log on the storage card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogPaths {
    /// `/<MonthName>_<Year>`
    pub folder: String,
    /// `/<MonthName>_<Year>/<Day>_<MonthName>_<Year>.csv`
    pub file: String,
}

impl LogPaths {
    pub fn for_time(time: &LocalTime) -> Self {
        let month = time.month_name();
        let folder = format!("/{}_{}", month, time.year);
        let file = format!("{}/{}_{}_{}.csv", folder, time.day, month, time.year);
        Self { folder, file }
    }

    /// One CSV row (`HH:MM:SS,tempC,tempF,pressureHPa`), newline terminated.
    pub fn row(time: &LocalTime, average: &SensorSample) -> String {
        format!(
            "{},{:.2},{:.2},{:.2}\n",
            time.clock_string(),
            average.temperature,
            average.temperature_fahrenheit(),
            average.pressure
        )
    }
}

/// Remote key layout for one averaged record:
/// `<root>/<Year>/<MonthName>/<Day>/<HH>_<MM>_<SS>/<field>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRecordPath {
    base: String,
    marker: String,
}

impl RemoteRecordPath {
    pub const TEMPERATURE_C: &'static str = "temperature_c";
    pub const TEMPERATURE_F: &'static str = "temperature_f";
    pub const PRESSURE_HPA: &'static str = "pressure_hpa";

    pub fn new(root: &str, time: &LocalTime) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            base: format!(
                "{}/{}/{}/{}/{:02}_{:02}_{:02}",
                root,
                time.year,
                time.month_name(),
                time.day,
                time.hour,
                time.minute,
                time.second
            ),
            marker: format!("{}/{}", root, REMOTE_TIMESTAMP_MARKER),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn field(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    pub fn timestamp_marker(&self) -> &str {
        &self.marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march_fifth() -> LocalTime {
        LocalTime {
            year: 2024,
            month: 2,
            day: 5,
            hour: 9,
            minute: 5,
            second: 3,
        }
    }

    #[test]
    fn test_log_paths_for_fixed_date() {
        let paths = LogPaths::for_time(&march_fifth());
        assert_eq!(paths.folder, "/March_2024");
        assert_eq!(paths.file, "/March_2024/5_March_2024.csv");
    }

    #[test]
    fn test_row_format() {
        let row = LogPaths::row(&march_fifth(), &SensorSample::new(20.0, 1013.254));
        assert_eq!(row, "09:05:03,20.00,68.00,1013.25\n");
    }

    #[test]
    fn test_remote_paths_without_root() {
        let path = RemoteRecordPath::new("", &march_fifth());
        assert_eq!(path.base(), "/2024/March/5/09_05_03");
        assert_eq!(
            path.field(RemoteRecordPath::PRESSURE_HPA),
            "/2024/March/5/09_05_03/pressure_hpa"
        );
        assert_eq!(path.timestamp_marker(), "/last_updated_timestamp");
    }

    #[test]
    fn test_remote_paths_with_root() {
        let path = RemoteRecordPath::new("/devices/weather_station_01/", &march_fifth());
        assert_eq!(
            path.field(RemoteRecordPath::TEMPERATURE_C),
            "/devices/weather_station_01/2024/March/5/09_05_03/temperature_c"
        );
        assert_eq!(
            path.timestamp_marker(),
            "/devices/weather_station_01/last_updated_timestamp"
        );
    }
}
