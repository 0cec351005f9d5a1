use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle bucket sizes a strategy can read.
///
/// Ordered from the shortest to the longest bucket, so maps keyed by
/// `Timeframe` iterate in a stable order when the vision vector is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    FourHour,
    TwelveHour,
    OneDay,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::TwelveHour => 720,
            Timeframe::OneDay => 1440,
        }
    }

    /// Returns the duration in seconds
    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "M1",
            Timeframe::FiveMin => "M5",
            Timeframe::FifteenMin => "M15",
            Timeframe::ThirtyMin => "M30",
            Timeframe::OneHour => "H1",
            Timeframe::FourHour => "H4",
            Timeframe::TwelveHour => "H12",
            Timeframe::OneDay => "D1",
        }
    }

    /// Returns all available timeframes in ascending order
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::OneMin,
            Timeframe::FiveMin,
            Timeframe::FifteenMin,
            Timeframe::ThirtyMin,
            Timeframe::OneHour,
            Timeframe::FourHour,
            Timeframe::TwelveHour,
            Timeframe::OneDay,
        ]
    }
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m1" | "1m" | "1min" => Ok(Timeframe::OneMin),
            "m5" | "5m" | "5min" => Ok(Timeframe::FiveMin),
            "m15" | "15m" | "15min" => Ok(Timeframe::FifteenMin),
            "m30" | "30m" | "30min" => Ok(Timeframe::ThirtyMin),
            "h1" | "1h" | "1hour" => Ok(Timeframe::OneHour),
            "h4" | "4h" | "4hour" => Ok(Timeframe::FourHour),
            "h12" | "12h" | "12hour" => Ok(Timeframe::TwelveHour),
            "d1" | "1d" | "1day" => Ok(Timeframe::OneDay),
            _ => Err(ConfigError::invalid(
                "timeframe",
                format!(
                    "'{}' is not one of M1, M5, M15, M30, H1, H4, H12, D1",
                    s
                ),
            )),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Timeframe::from_str(&value)
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(Timeframe::OneMin.to_minutes(), 1);
        assert_eq!(Timeframe::ThirtyMin.to_minutes(), 30);
        assert_eq!(Timeframe::TwelveHour.to_minutes(), 720);
        assert_eq!(Timeframe::OneDay.to_minutes(), 1440);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Timeframe::from_str("M1").unwrap(), Timeframe::OneMin);
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::OneHour);
        assert_eq!(Timeframe::from_str("H12").unwrap(), Timeframe::TwelveHour);
        assert_eq!(Timeframe::from_str("d1").unwrap(), Timeframe::OneDay);
        assert!(Timeframe::from_str("W1").is_err());
    }

    #[test]
    fn test_ordering_is_ascending() {
        let all = Timeframe::all();
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
    }
}
