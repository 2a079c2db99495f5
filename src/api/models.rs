//! Response shapes returned by the backend. These are transport-level view
//! models: each one reflects the latest successful fetch and is replaced
//! wholesale by the next one.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSeries {
    pub ticker: String,
    #[serde(default)]
    pub candles: Vec<Candle>,
}

impl TickerSeries {
    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// Percent change between the first open and the last close.
    pub fn change_percent(&self) -> Option<f64> {
        let first = self.candles.first()?;
        let last = self.candles.last()?;
        if first.open == 0.0 {
            return None;
        }
        Some((last.close - first.open) / first.open * 100.0)
    }
}

/// Volume event flagged by the backend: `volume / median >= ratio threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpike {
    pub time: NaiveDate,
    pub volume: f64,
    pub median: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[serde(other)]
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_param(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub ticker: Option<String>,
    pub sentiment: Sentiment,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPage {
    #[serde(default)]
    pub items: Vec<NewsItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Hot-list row: per-ticker flow score computed server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSignal {
    pub ticker: String,
    pub score: f64,
    pub strength: f64,
    #[serde(default)]
    pub net_value: f64,
    #[serde(default)]
    pub stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    pub stage: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerFlow {
    pub broker: String,
    pub buy_value: f64,
    pub sell_value: f64,
    pub net_value: f64,
    #[serde(default)]
    pub buy_volume: f64,
    #[serde(default)]
    pub sell_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSummary {
    pub date: NaiveDate,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub rows: Vec<BrokerFlow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningTrade {
    pub time: NaiveTime,
    pub ticker: String,
    pub price: f64,
    pub lot: u64,
    pub side: TradeSide,
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default)]
    pub seller: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub ticker: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub points: Vec<ForecastPoint>,
}

/// Result of a scrape / sync / create / remove action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionStatus {
    pub fn describe(&self) -> String {
        match &self.message {
            Some(message) if !message.is_empty() => format!("{}: {}", self.status, message),
            _ => self.status.clone(),
        }
    }
}
