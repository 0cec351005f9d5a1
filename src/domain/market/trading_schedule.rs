//! Weekly trading schedule: one flag per hour of each weekday.

use crate::domain::errors::ConfigError;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSchedule {
    pub monday: Vec<bool>,
    pub tuesday: Vec<bool>,
    pub wednesday: Vec<bool>,
    pub thursday: Vec<bool>,
    pub friday: Vec<bool>,
    pub saturday: Vec<bool>,
    pub sunday: Vec<bool>,
}

impl TradingSchedule {
    /// Schedule that allows trading every hour of every day
    pub fn always() -> Self {
        let day = vec![true; HOURS_PER_DAY];
        Self {
            monday: day.clone(),
            tuesday: day.clone(),
            wednesday: day.clone(),
            thursday: day.clone(),
            friday: day.clone(),
            saturday: day.clone(),
            sunday: day,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, day) in self.days() {
            if day.len() != HOURS_PER_DAY {
                return Err(ConfigError::invalid(
                    &format!("strategy.trading_schedule.{}", name),
                    format!("expected {} hourly slots, got {}", HOURS_PER_DAY, day.len()),
                ));
            }
        }
        Ok(())
    }

    /// Whether trading is allowed in the hourly slot containing `date`.
    pub fn allows(&self, date: DateTime<Utc>) -> bool {
        let day = self.day(date.weekday());
        day.get(date.hour() as usize).copied().unwrap_or(false)
    }

    pub fn allows_timestamp(&self, timestamp: i64) -> bool {
        DateTime::from_timestamp(timestamp, 0)
            .map(|date| self.allows(date))
            .unwrap_or(false)
    }

    fn day(&self, weekday: Weekday) -> &[bool] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    fn days(&self) -> [(&'static str, &[bool]); 7] {
        [
            ("monday", self.monday.as_slice()),
            ("tuesday", self.tuesday.as_slice()),
            ("wednesday", self.wednesday.as_slice()),
            ("thursday", self.thursday.as_slice()),
            ("friday", self.friday.as_slice()),
            ("saturday", self.saturday.as_slice()),
            ("sunday", self.sunday.as_slice()),
        ]
    }
}
