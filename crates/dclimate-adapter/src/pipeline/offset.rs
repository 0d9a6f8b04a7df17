//! Frequency offsets written as pandas-style aliases (`1M`, `7D`, `12H`, ...).

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// `count` repetitions of a unit.
///
/// Minute/hour/day/week offsets are fixed durations. Month and year offsets
/// are anchored on period ends, so `1M` measured back from any day in
/// September lands on the end of August.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub count: u32,
    pub unit: OffsetUnit,
}

impl FromStr for Offset {
    type Err = String;

    fn from_str(alias: &str) -> Result<Self, Self::Err> {
        let alias = alias.trim();
        let split = alias
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("offset '{}' has no unit", alias))?;
        let (digits, unit) = alias.split_at(split);
        let count = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|e| format!("offset '{}': {}", alias, e))?
        };
        if count == 0 {
            return Err(format!("offset '{}' must be positive", alias));
        }
        let unit = match unit {
            "min" | "T" => OffsetUnit::Minute,
            "H" | "h" => OffsetUnit::Hour,
            "D" | "d" => OffsetUnit::Day,
            "W" | "w" => OffsetUnit::Week,
            "M" | "ME" => OffsetUnit::Month,
            "Y" | "YE" | "A" => OffsetUnit::Year,
            other => return Err(format!("unknown offset unit '{}'", other)),
        };
        Ok(Offset { count, unit })
    }
}

impl Offset {
    /// Fixed length of tick offsets; `None` for month and year.
    pub fn duration(&self) -> Option<Duration> {
        let n = i64::from(self.count);
        match self.unit {
            OffsetUnit::Minute => Duration::try_minutes(n),
            OffsetUnit::Hour => Duration::try_hours(n),
            OffsetUnit::Day => Duration::try_days(n),
            OffsetUnit::Week => Duration::try_weeks(n),
            OffsetUnit::Month | OffsetUnit::Year => None,
        }
    }

    /// Month and year offsets follow the calendar rather than a fixed length.
    pub fn is_calendar(&self) -> bool {
        matches!(self.unit, OffsetUnit::Month | OffsetUnit::Year)
    }

    /// Exclusive lower bound of the trailing window ending at `ts`.
    pub fn window_start(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        let n = i64::from(self.count);
        match self.unit {
            OffsetUnit::Month => Ok(with_date(ts, month_end_shifted(ts.date_naive(), -n)?)),
            OffsetUnit::Year => {
                let year = ts.year().checked_sub(self.years()?).ok_or_else(out_of_range)?;
                Ok(with_date(ts, year_end(year)?))
            }
            _ => ts.checked_sub_signed(self.tick()?).ok_or_else(out_of_range),
        }
    }

    /// Upper bound of the leading window starting at `ts`: inclusive for
    /// month and year offsets, exclusive for fixed durations.
    pub fn window_end(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        let n = i64::from(self.count);
        match self.unit {
            OffsetUnit::Month => Ok(with_date(ts, month_end_shifted(ts.date_naive(), n - 1)?)),
            OffsetUnit::Year => {
                let year = ts
                    .year()
                    .checked_add(self.years()? - 1)
                    .ok_or_else(out_of_range)?;
                Ok(with_date(ts, year_end(year)?))
            }
            _ => ts.checked_add_signed(self.tick()?).ok_or_else(out_of_range),
        }
    }

    /// Resampling bin label for `ts`. Tick bins are aligned to the epoch and
    /// labelled by their start; calendar bins are labelled by their last day.
    pub fn bin_label(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        let n = i64::from(self.count);
        match self.unit {
            OffsetUnit::Month => {
                let months = i64::from(ts.year()) * 12 + i64::from(ts.month0());
                let last = months.div_euclid(n) * n + n - 1;
                let date = month_end(to_year(last.div_euclid(12))?, last.rem_euclid(12) as u32 + 1)?;
                Ok(midnight(date))
            }
            OffsetUnit::Year => {
                let year = i64::from(ts.year());
                Ok(midnight(year_end(to_year(year.div_euclid(n) * n + n - 1)?)?))
            }
            _ => {
                let width = self.tick()?.num_seconds().max(1);
                let start = ts.timestamp().div_euclid(width) * width;
                Utc.timestamp_opt(start, 0).single().ok_or_else(out_of_range)
            }
        }
    }

    fn tick(&self) -> Result<Duration, String> {
        self.duration().ok_or_else(out_of_range)
    }

    fn years(&self) -> Result<i32, String> {
        i32::try_from(self.count).map_err(|_| out_of_range())
    }
}

fn out_of_range() -> String {
    "offset out of range".to_string()
}

fn to_year(year: i64) -> Result<i32, String> {
    i32::try_from(year).map_err(|_| out_of_range())
}

fn month_end(year: i32, month: u32) -> Result<NaiveDate, String> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1).ok_or_else(out_of_range)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(out_of_range)
}

/// Last day of the month `shift` months away from `date`'s month.
fn month_end_shifted(date: NaiveDate, shift: i64) -> Result<NaiveDate, String> {
    let months = i64::from(date.year()) * 12 + i64::from(date.month0()) + shift;
    month_end(to_year(months.div_euclid(12))?, months.rem_euclid(12) as u32 + 1)
}

fn year_end(year: i32) -> Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(out_of_range)
}

fn with_date(ts: DateTime<Utc>, date: NaiveDate) -> DateTime<Utc> {
    date.and_time(ts.time()).and_utc()
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
