//! Text candlesticks and volume bars. Rows are produced top to bottom; each
//! visible candle owns a fixed-width slot of columns and draws in its first
//! column.

use std::collections::BTreeSet;

use crate::api::models::{Candle, TickerSeries, VolumeSpike};

use super::sync::VisibleRange;

const BODY: char = '┃';
const HALF_BODY_TOP: char = '╹';
const HALF_BODY_BOTTOM: char = '╻';
const DOJI: char = '━';
const WICK: char = '│';
const CROSSHAIR: char = '┊';
const SPIKE: char = '▲';
const VOID: char = ' ';

/// Eighth-block levels for volume bars, empty to full.
const BAR_LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Up,
    Down,
    Marker,
    Crosshair,
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub ch: char,
    pub tone: Tone,
}

impl Glyph {
    const BLANK: Glyph = Glyph { ch: VOID, tone: Tone::Blank };
}

/// Glyph for `candle` in the price band `bottom..top`.
pub fn candle_glyph(candle: &Candle, top: f64, bottom: f64) -> char {
    let body_hi = candle.open.max(candle.close);
    let body_lo = candle.open.min(candle.close);
    let row = top - bottom;

    if body_hi == body_lo {
        if body_lo >= bottom && body_lo < top {
            return DOJI;
        }
    } else {
        let overlap = top.min(body_hi) - bottom.max(body_lo);
        if overlap > 0.0 {
            if overlap >= row * 0.75 {
                return BODY;
            }
            let centre = (top.min(body_hi) + bottom.max(body_lo)) / 2.0;
            return if centre >= bottom + row / 2.0 {
                HALF_BODY_TOP
            } else {
                HALF_BODY_BOTTOM
            };
        }
    }

    if candle.high > bottom && candle.low < top {
        WICK
    } else {
        VOID
    }
}

/// Built chart instance for one ticker series.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceChart {
    pub ticker: String,
    candles: Vec<Candle>,
    spikes: BTreeSet<usize>,
}

impl PriceChart {
    pub fn new(series: &TickerSeries) -> Self {
        Self {
            ticker: series.ticker.clone(),
            candles: series.candles.clone(),
            spikes: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn candle(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    /// Replace spike markers; spikes on dates outside the series are ignored.
    pub fn mark_spikes(&mut self, spikes: &[VolumeSpike]) {
        self.spikes = spikes
            .iter()
            .filter_map(|spike| self.candles.iter().position(|c| c.time == spike.time))
            .collect();
    }

    pub fn is_spike(&self, index: usize) -> bool {
        self.spikes.contains(&index)
    }

    pub fn spike_count(&self) -> usize {
        self.spikes.len()
    }

    fn visible(&self, range: VisibleRange) -> &[Candle] {
        let to = range.to.min(self.candles.len());
        let from = range.from.min(to);
        &self.candles[from..to]
    }

    /// Lowest low and highest high in `range`.
    pub fn price_bounds(&self, range: VisibleRange) -> Option<(f64, f64)> {
        let visible = self.visible(range);
        if visible.is_empty() {
            return None;
        }
        let low = visible.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high = visible.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        if high > low {
            Some((low, high))
        } else {
            // Flat series: give it a band so rows have height.
            let pad = (low.abs() * 0.01).max(1.0);
            Some((low - pad, high + pad))
        }
    }

    pub fn max_volume(&self, range: VisibleRange) -> f64 {
        self.visible(range).iter().map(|c| c.volume).fold(0.0, f64::max)
    }

    /// Columns per candle for a panel `width` columns wide.
    pub fn slot_width(range: VisibleRange, width: usize) -> usize {
        if range.is_empty() {
            1
        } else {
            (width / range.len()).max(1)
        }
    }

    /// Candle index under screen column `column`, if any.
    pub fn index_at(range: VisibleRange, width: usize, column: usize) -> Option<usize> {
        let slot = Self::slot_width(range, width);
        let index = range.from + column / slot;
        range.contains(index).then_some(index)
    }

    fn row_grid(width: usize, height: usize) -> Vec<Vec<Glyph>> {
        vec![vec![Glyph::BLANK; width]; height]
    }

    pub fn price_grid(
        &self,
        range: VisibleRange,
        width: usize,
        height: usize,
        crosshair: Option<usize>,
    ) -> Vec<Vec<Glyph>> {
        let mut grid = Self::row_grid(width, height);
        let Some((low, high)) = self.price_bounds(range) else {
            return grid;
        };
        if height == 0 {
            return grid;
        }
        let step = (high - low) / height as f64;
        let slot = Self::slot_width(range, width);

        for (offset, candle) in self.visible(range).iter().enumerate() {
            let column = offset * slot;
            if column >= width {
                break;
            }
            let index = range.from + offset;
            let tone = if candle.is_bullish() { Tone::Up } else { Tone::Down };
            for (row, cells) in grid.iter_mut().enumerate() {
                let top = high - row as f64 * step;
                let bottom = top - step;
                let ch = candle_glyph(candle, top, bottom);
                cells[column] = if ch != VOID {
                    Glyph { ch, tone }
                } else if crosshair == Some(index) {
                    Glyph { ch: CROSSHAIR, tone: Tone::Crosshair }
                } else {
                    Glyph::BLANK
                };
            }
        }
        grid
    }

    pub fn volume_grid(
        &self,
        range: VisibleRange,
        width: usize,
        height: usize,
        crosshair: Option<usize>,
    ) -> Vec<Vec<Glyph>> {
        let mut grid = Self::row_grid(width, height);
        let max = self.max_volume(range);
        if max <= 0.0 || height == 0 {
            return grid;
        }
        let slot = Self::slot_width(range, width);
        let total_levels = (height * 8) as f64;

        for (offset, candle) in self.visible(range).iter().enumerate() {
            let column = offset * slot;
            if column >= width {
                break;
            }
            let index = range.from + offset;
            let levels = (candle.volume / max * total_levels).round() as usize;
            let tone = if self.is_spike(index) {
                Tone::Marker
            } else if candle.is_bullish() {
                Tone::Up
            } else {
                Tone::Down
            };
            for (row, cells) in grid.iter_mut().enumerate() {
                let from_bottom = height - 1 - row;
                let fill = levels.saturating_sub(from_bottom * 8).min(8);
                cells[column] = if fill > 0 {
                    Glyph { ch: BAR_LEVELS[fill], tone }
                } else if crosshair == Some(index) {
                    Glyph { ch: CROSSHAIR, tone: Tone::Crosshair }
                } else {
                    Glyph::BLANK
                };
            }
        }
        grid
    }

    /// Marker row drawn above the candles.
    pub fn spike_row(&self, range: VisibleRange, width: usize) -> Vec<Glyph> {
        let mut row = vec![Glyph::BLANK; width];
        let slot = Self::slot_width(range, width);
        for index in self.spikes.range(range.from..range.to) {
            let column = (index - range.from) * slot;
            if column < width {
                row[column] = Glyph { ch: SPIKE, tone: Tone::Marker };
            }
        }
        row
    }
}
