//! Session-wide filter context shared by every page: the selected ticker and
//! the date range.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Ticker selection. `All` is the sentinel for "no ticker", which makes
/// endpoints return aggregate data instead of a per-ticker slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TickerScope {
    #[default]
    All,
    Ticker(String),
}

impl TickerScope {
    /// Empty input (or the literal "all") selects the sentinel.
    pub fn parse(input: &str) -> Self {
        let symbol = input.trim().to_uppercase();
        if symbol.is_empty() || symbol == "ALL" {
            Self::All
        } else {
            Self::Ticker(symbol)
        }
    }

    /// Value for a `ticker` query parameter; `None` means omit the parameter.
    pub fn as_param(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Ticker(symbol) => Some(symbol),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for TickerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Ticker(symbol) => f.write_str(symbol),
        }
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Reversed bounds are swapped rather than rejected.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// The `days` calendar days ending on `end`, inclusive.
    pub fn last_days(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self::new(end - Duration::days(span), end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start_param(), self.end_param())
    }
}

/// Quick range choices cycled from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
}

impl RangePreset {
    pub const ALL: [RangePreset; 5] = [
        RangePreset::Week,
        RangePreset::Month,
        RangePreset::Quarter,
        RangePreset::HalfYear,
        RangePreset::Year,
    ];

    pub fn days(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::HalfYear => 180,
            Self::Year => 365,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Week => "1W",
            Self::Month => "1M",
            Self::Quarter => "3M",
            Self::HalfYear => "6M",
            Self::Year => "1Y",
        }
    }

    /// Closest preset to a span of days, used to pick the next one in the cycle.
    pub fn nearest(days: i64) -> Self {
        Self::ALL
            .iter()
            .copied()
            .min_by_key(|p| (i64::from(p.days()) - days).abs())
            .unwrap_or(Self::Month)
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Global filter state. Lives for the whole session and only changes on
/// explicit user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub ticker: TickerScope,
    pub range: DateRange,
    default_days: u32,
}

impl FilterState {
    pub fn new(default_days: u32, today: NaiveDate) -> Self {
        Self {
            ticker: TickerScope::All,
            range: DateRange::last_days(today, default_days),
            default_days,
        }
    }

    pub fn set_ticker(&mut self, input: &str) {
        self.ticker = TickerScope::parse(input);
    }

    pub fn set_range(&mut self, range: DateRange) {
        self.range = range;
    }

    /// Advance to the next preset width, keeping the end date.
    pub fn cycle_preset(&mut self) -> RangePreset {
        let next = RangePreset::nearest(self.range.days()).next();
        self.range = DateRange::last_days(self.range.end, next.days());
        next
    }

    pub fn reset(&mut self, today: NaiveDate) {
        self.ticker = TickerScope::All;
        self.range = DateRange::last_days(today, self.default_days);
    }
}
