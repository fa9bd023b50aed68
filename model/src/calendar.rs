use serde::{Deserialize, Serialize};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English name of a zero-based month index, `"Unknown"` outside `0..12`.
pub fn month_name(month: i32) -> &'static str {
    usize::try_from(month)
        .ok()
        .and_then(|index| MONTH_NAMES.get(index))
        .copied()
        .unwrap_or("Unknown")
}

/// Broken-down local wall-clock time.
///
/// `month` is zero based (January is 0), the way the wall clock reports it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocalTime {
    pub year: i32,
    pub month: i32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl LocalTime {
    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }

    /// `HH:MM:SS`
    pub fn clock_string(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

#[cfg(feature = "chrono")]
impl<Tz: chrono::TimeZone> From<&chrono::DateTime<Tz>> for LocalTime {
    fn from(date_time: &chrono::DateTime<Tz>) -> Self {
        use chrono::{Datelike, Timelike};

        Self {
            year: date_time.year(),
            month: date_time.month0() as i32,
            day: date_time.day(),
            hour: date_time.hour(),
            minute: date_time.minute(),
            second: date_time.second(),
        }
    }
}

#[test]
fn test_month_name_bounds() {
    assert_eq!(month_name(0), "January");
    assert_eq!(month_name(2), "March");
    assert_eq!(month_name(11), "December");
    assert_eq!(month_name(-1), "Unknown");
    assert_eq!(month_name(12), "Unknown");
}

#[test]
fn test_clock_string_is_zero_padded() {
    let time = LocalTime {
        year: 2024,
        month: 2,
        day: 5,
        hour: 7,
        minute: 3,
        second: 9,
    };
    assert_eq!(time.clock_string(), "07:03:09");
}

#[cfg(feature = "chrono")]
#[test]
fn test_from_chrono_uses_zero_based_month() {
    use chrono::NaiveDate;

    let date_time = NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(12, 30, 45)
        .unwrap()
        .and_utc();
    let time = LocalTime::from(&date_time);

    assert_eq!(time.month, 2);
    assert_eq!(time.month_name(), "March");
    assert_eq!((time.day, time.hour, time.minute, time.second), (5, 12, 30, 45));
}
