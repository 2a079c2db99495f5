//! Display-side helpers for flow data: hot-list ordering and broker summary
//! totals. The scores themselves come from the backend.

use std::cmp::Ordering;

use crate::api::models::{BrokerFlow, BrokerSummary, FlowSignal, RunningTrade, TradeSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Score,
    Strength,
    NetValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Ascending => "▲",
            Self::Descending => "▼",
        }
    }
}

/// Hot-list ordering. `None` keeps the backend's ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotListSort {
    pub column: Option<SortColumn>,
    pub direction: SortDirection,
}

impl Default for HotListSort {
    fn default() -> Self {
        Self {
            column: None,
            direction: SortDirection::Descending,
        }
    }
}

impl HotListSort {
    /// Same column flips direction; a new column starts descending.
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == Some(column) {
            self.direction = match self.direction {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::Ascending,
            };
        } else {
            self.column = Some(column);
            self.direction = SortDirection::Descending;
        }
    }

    pub fn header(&self, name: &str, column: SortColumn) -> String {
        if self.column == Some(column) {
            format!("{}{}", name, self.direction.arrow())
        } else {
            name.to_string()
        }
    }

    pub fn apply<'a>(&self, signals: &'a [FlowSignal]) -> Vec<&'a FlowSignal> {
        let mut rows: Vec<&FlowSignal> = signals.iter().collect();
        let Some(column) = self.column else {
            return rows;
        };
        let key = |s: &FlowSignal| match column {
            SortColumn::Score => s.score,
            SortColumn::Strength => s.strength,
            SortColumn::NetValue => s.net_value,
        };
        rows.sort_by(|a, b| {
            let cmp = key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal);
            match self.direction {
                SortDirection::Ascending => cmp,
                SortDirection::Descending => cmp.reverse(),
            }
        });
        rows
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowTotals {
    pub buy_value: f64,
    pub sell_value: f64,
    pub net_value: f64,
}

impl FlowTotals {
    pub fn of(rows: &[BrokerFlow]) -> Self {
        rows.iter().fold(Self::default(), |acc, row| Self {
            buy_value: acc.buy_value + row.buy_value,
            sell_value: acc.sell_value + row.sell_value,
            net_value: acc.net_value + row.net_value,
        })
    }

    /// Buy share of gross traded value, 0..=1; `None` with no value traded.
    pub fn buy_share(&self) -> Option<f64> {
        let gross = self.buy_value + self.sell_value;
        (gross > 0.0).then(|| self.buy_value / gross)
    }
}

/// Brokers ordered by net value, biggest net buyers first.
pub fn ranked_brokers(summary: &BrokerSummary) -> Vec<&BrokerFlow> {
    let mut rows: Vec<&BrokerFlow> = summary.rows.iter().collect();
    rows.sort_by(|a, b| b.net_value.partial_cmp(&a.net_value).unwrap_or(Ordering::Equal));
    rows
}

/// Running sum of net value down the ranking, for the area chart.
pub fn cumulative_net(rows: &[&BrokerFlow]) -> Vec<(f64, f64)> {
    rows.iter()
        .scan(0.0, |acc, row| {
            *acc += row.net_value;
            Some(*acc)
        })
        .enumerate()
        .map(|(i, v)| (i as f64, v))
        .collect()
}

/// Buy and sell lot totals on the trade tape.
pub fn tape_pressure(trades: &[RunningTrade]) -> (u64, u64) {
    trades.iter().fold((0, 0), |(buy, sell), t| match t.side {
        TradeSide::Buy => (buy + t.lot, sell),
        TradeSide::Sell => (buy, sell + t.lot),
    })
}

/// Compact value formatting: 1.2T / 3.4B / 5.6M / 7.8K.
pub fn format_value(value: f64) -> String {
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e12 {
        (value / 1e12, "T")
    } else if abs >= 1e9 {
        (value / 1e9, "B")
    } else if abs >= 1e6 {
        (value / 1e6, "M")
    } else if abs >= 1e3 {
        (value / 1e3, "K")
    } else {
        (value, "")
    };
    format!("{:.1}{}", scaled, suffix)
}
