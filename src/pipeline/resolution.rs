//! Candle resolutions and UTC time bucketing
//!
//! Bucket starts are computed by flooring calendar fields in UTC, not by
//! modular arithmetic on the epoch: `minute -= minute % divisor` (seconds
//! zeroed), `hour -= hour % divisor` (minutes and seconds zeroed), or midnight
//! for days. For divisors that divide 60/24 both agree.

use chrono::{DateTime, Timelike, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Minute,
    Hour,
    Day,
}

impl Timeframe {
    pub fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "minute" => Some(Timeframe::Minute),
            "hour" => Some(Timeframe::Hour),
            "day" => Some(Timeframe::Day),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute => "minute",
            Timeframe::Hour => "hour",
            Timeframe::Day => "day",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::Minute => 60,
            Timeframe::Hour => 3_600,
            Timeframe::Day => 86_400,
        }
    }
}

/// Start of the bucket containing `timestamp` (UTC seconds)
///
/// `Day` ignores the divisor. Returns 0 for timestamps chrono cannot represent.
pub fn bucket_start(timestamp: i64, timeframe: Timeframe, divisor: u32) -> i64 {
    let Some(dt) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
        return 0;
    };
    let divisor = divisor.max(1);

    let floored = match timeframe {
        Timeframe::Minute => {
            let minute = dt.minute();
            dt.with_minute(minute - minute % divisor)
                .and_then(|d| d.with_second(0))
        }
        Timeframe::Hour => {
            let hour = dt.hour();
            dt.with_hour(hour - hour % divisor)
                .and_then(|d| d.with_minute(0))
                .and_then(|d| d.with_second(0))
        }
        Timeframe::Day => dt
            .with_hour(0)
            .and_then(|d| d.with_minute(0))
            .and_then(|d| d.with_second(0)),
    };

    floored.map(|d| d.timestamp()).unwrap_or(0)
}

/// String-unit variant of [`bucket_start`]; unrecognized units yield 0
pub fn floor_by_unit(timestamp: i64, unit: &str, divisor: u32) -> i64 {
    match Timeframe::from_unit(unit) {
        Some(timeframe) => bucket_start(timestamp, timeframe, divisor),
        None => 0,
    }
}

/// One candle resolution: public interval label plus bucketing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Query contract label (`5m`, `1h`, `1d`, ...), never renamed
    pub label: &'static str,
    pub timeframe: Timeframe,
    pub divisor: u32,
}

impl Resolution {
    pub const fn new(label: &'static str, timeframe: Timeframe, divisor: u32) -> Self {
        Self {
            label,
            timeframe,
            divisor,
        }
    }

    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        bucket_start(timestamp, self.timeframe, self.divisor)
    }

    /// Bucket width in seconds
    pub fn seconds(&self) -> i64 {
        match self.timeframe {
            Timeframe::Day => Timeframe::Day.seconds(),
            tf => tf.seconds() * self.divisor.max(1) as i64,
        }
    }
}

pub const DAILY: Resolution = Resolution::new("1d", Timeframe::Day, 1);

/// Ordered set of resolutions every swap fans out into
#[derive(Debug, Clone)]
pub struct ResolutionTable {
    resolutions: Vec<Resolution>,
}

impl ResolutionTable {
    /// `5m, 15m, 30m, 1h, 4h, 8h, 12h, 1d`
    pub fn standard() -> Self {
        Self {
            resolutions: vec![
                Resolution::new("5m", Timeframe::Minute, 5),
                Resolution::new("15m", Timeframe::Minute, 15),
                Resolution::new("30m", Timeframe::Minute, 30),
                Resolution::new("1h", Timeframe::Hour, 1),
                Resolution::new("4h", Timeframe::Hour, 4),
                Resolution::new("8h", Timeframe::Hour, 8),
                Resolution::new("12h", Timeframe::Hour, 12),
                DAILY,
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions.iter()
    }

    pub fn get(&self, label: &str) -> Option<&Resolution> {
        self.resolutions.iter().find(|r| r.label == label)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.resolutions.iter().map(|r| r.label).collect()
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }
}

impl Default for ResolutionTable {
    fn default() -> Self {
        Self::standard()
    }
}
