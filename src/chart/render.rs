use chrono::{Datelike, NaiveDate};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::api::models::{Candle, Forecast};

use super::candles::{Glyph, PriceChart, Tone};
use super::sync::PanelView;

pub(crate) const BULLISH_COLOR: Color = Color::Rgb(52, 208, 88);
pub(crate) const BEARISH_COLOR: Color = Color::Rgb(234, 74, 90);
const MARKER_COLOR: Color = Color::Yellow;

/// Y-axis label width; narrowed on small terminals.
const Y_AXIS_WIDTH: u16 = 10;
const NARROW_Y_AXIS_WIDTH: u16 = 7;
const ADAPTIVE_Y_AXIS_THRESHOLD: u16 = 80;

pub fn y_axis_width(area: Rect) -> u16 {
    if area.width < ADAPTIVE_Y_AXIS_THRESHOLD {
        NARROW_Y_AXIS_WIDTH
    } else {
        Y_AXIS_WIDTH
    }
}

/// Columns left for candles inside a bordered panel.
pub fn plot_width(area: Rect) -> usize {
    area.width.saturating_sub(2 + y_axis_width(area)) as usize
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Up => Style::default().fg(BULLISH_COLOR),
        Tone::Down => Style::default().fg(BEARISH_COLOR),
        Tone::Marker => Style::default().fg(MARKER_COLOR).add_modifier(Modifier::BOLD),
        Tone::Crosshair => Style::default().fg(Color::DarkGray),
        Tone::Blank => Style::default(),
    }
}

fn glyph_line(axis: String, glyphs: &[Glyph]) -> Line<'static> {
    let mut spans = vec![Span::styled(axis, Style::default().fg(Color::Gray))];
    // Merge runs of equal tone to keep span count low.
    let mut run = String::new();
    let mut run_tone = Tone::Blank;
    for glyph in glyphs {
        if glyph.tone != run_tone && !run.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut run), tone_style(run_tone)));
        }
        run_tone = glyph.tone;
        run.push(glyph.ch);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, tone_style(run_tone)));
    }
    Line::from(spans)
}

fn format_price(price: f64) -> String {
    if price.abs() >= 10_000.0 {
        format!("{:.0}", price)
    } else {
        format!("{:.2}", price)
    }
}

pub fn render_price_panel(f: &mut Frame, area: Rect, chart: &PriceChart, view: &PanelView, title: String) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let axis_width = y_axis_width(area) as usize;
    let width = plot_width(area);
    // First inner row holds spike markers.
    let height = inner.height.saturating_sub(1) as usize;

    let Some((low, high)) = chart.price_bounds(view.range) else {
        f.render_widget(Paragraph::new("  No candles in range").style(Style::default().fg(Color::DarkGray)), inner);
        return;
    };

    let grid = chart.price_grid(view.range, width, height, view.crosshair);
    let step = if height > 0 { (high - low) / height as f64 } else { 0.0 };

    let mut lines = Vec::with_capacity(height + 1);
    lines.push(glyph_line(" ".repeat(axis_width), &chart.spike_row(view.range, width)));
    for (row, glyphs) in grid.iter().enumerate() {
        // Label every fourth row plus the last one.
        let label = if row % 4 == 0 || row + 1 == height {
            let price = high - row as f64 * step;
            format!("{:>w$} ", format_price(price), w = axis_width - 1)
        } else {
            " ".repeat(axis_width)
        };
        lines.push(glyph_line(label, glyphs));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

pub fn render_volume_panel(f: &mut Frame, area: Rect, chart: &PriceChart, view: &PanelView) {
    let block = Block::default().borders(Borders::ALL).title(" Volume ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let axis_width = y_axis_width(area) as usize;
    let width = plot_width(area);
    let height = inner.height as usize;
    let max = chart.max_volume(view.range);
    let grid = chart.volume_grid(view.range, width, height, view.crosshair);

    let lines: Vec<Line> = grid
        .iter()
        .enumerate()
        .map(|(row, glyphs)| {
            let label = if row == 0 {
                format!("{:>w$} ", format_volume(max), w = axis_width - 1)
            } else {
                " ".repeat(axis_width)
            };
            glyph_line(label, glyphs)
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

pub fn format_volume(volume: f64) -> String {
    if volume >= 1e9 {
        format!("{:.1}B", volume / 1e9)
    } else if volume >= 1e6 {
        format!("{:.1}M", volume / 1e6)
    } else if volume >= 1e3 {
        format!("{:.1}K", volume / 1e3)
    } else {
        format!("{:.0}", volume)
    }
}

/// One-line OHLCV readout for the candle under the crosshair.
pub fn crosshair_line(candle: Option<&Candle>, spike: bool) -> Line<'static> {
    let Some(c) = candle else {
        return Line::from(Span::styled(
            "  ,/. move crosshair  ←/→ pan  +/- zoom",
            Style::default().fg(Color::DarkGray),
        ));
    };
    let color = if c.is_bullish() { BULLISH_COLOR } else { BEARISH_COLOR };
    let mut spans = vec![
        Span::raw(format!("  {}  ", c.time.format("%Y-%m-%d"))),
        Span::styled(
            format!(
                "O {}  H {}  L {}  C {}",
                format_price(c.open),
                format_price(c.high),
                format_price(c.low),
                format_price(c.close)
            ),
            Style::default().fg(color),
        ),
        Span::raw(format!("  Vol {}", format_volume(c.volume))),
    ];
    if spike {
        spans.push(Span::styled("  ▲ volume spike", tone_style(Tone::Marker)));
    }
    Line::from(spans)
}

fn day_number(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
}

/// History, forecast and confidence band on one line chart.
pub fn render_forecast_chart(f: &mut Frame, area: Rect, history: &[Candle], forecast: &Forecast) {
    let history_data: Vec<(f64, f64)> = history.iter().map(|c| (day_number(c.time), c.close)).collect();
    let forecast_data: Vec<(f64, f64)> = forecast.points.iter().map(|p| (day_number(p.date), p.value)).collect();
    let upper: Vec<(f64, f64)> = forecast
        .points
        .iter()
        .filter_map(|p| p.upper.map(|u| (day_number(p.date), u)))
        .collect();
    let lower: Vec<(f64, f64)> = forecast
        .points
        .iter()
        .filter_map(|p| p.lower.map(|l| (day_number(p.date), l)))
        .collect();

    let all = || history_data.iter().chain(&forecast_data).chain(&upper).chain(&lower);
    let (Some((min_x, max_x)), Some((min_y, max_y))) = (bounds(all().map(|p| p.0)), bounds(all().map(|p| p.1))) else {
        let no_data = Paragraph::new("  No forecast data available")
            .block(Block::default().borders(Borders::ALL).title(" Forecast "))
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(no_data, area);
        return;
    };
    let min_y = min_y * 0.98;
    let max_y = max_y * 1.02;

    let mut datasets = vec![
        Dataset::default()
            .name("History")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&history_data),
        Dataset::default()
            .name("Forecast")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(&forecast_data),
    ];
    if !upper.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Upper")
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::DarkGray))
                .data(&upper),
        );
    }
    if !lower.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Lower")
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::DarkGray))
                .data(&lower),
        );
    }

    let first = history.first().map(|c| c.time).or_else(|| forecast.points.first().map(|p| p.date));
    let last = forecast.points.last().map(|p| p.date).or_else(|| history.last().map(|c| c.time));
    let label = |d: Option<NaiveDate>| Span::raw(d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default());

    let title = match &forecast.model {
        Some(model) => format!(" Forecast: {} ({}) ", forecast.ticker, model),
        None => format!(" Forecast: {} ", forecast.ticker),
    };

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([min_x, max_x.max(min_x + 1.0)])
                .labels(vec![label(first), label(last)]),
        )
        .y_axis(
            Axis::default()
                .title("Price")
                .style(Style::default().fg(Color::Gray))
                .bounds([min_y, max_y])
                .labels(vec![
                    Span::raw(format!("{:.1}", min_y)),
                    Span::raw(format!("{:.1}", max_y)),
                ]),
        );

    f.render_widget(chart, area);
}

/// Cumulative net value across the broker ranking, as a filled-looking line.
pub fn render_cumulative_chart(f: &mut Frame, area: Rect, points: &[(f64, f64)]) {
    let Some((min_y, max_y)) = bounds(points.iter().map(|p| p.1).chain(std::iter::once(0.0))) else {
        return;
    };
    let max_x = points.len().saturating_sub(1).max(1) as f64;
    let zero: Vec<(f64, f64)> = vec![(0.0, 0.0), (max_x, 0.0)];
    let color = if points.last().map(|p| p.1).unwrap_or(0.0) >= 0.0 {
        BULLISH_COLOR
    } else {
        BEARISH_COLOR
    };

    let datasets = vec![
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&zero),
        Dataset::default()
            .name("Cumulative net")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(points),
    ];

    let pad = ((max_y - min_y) * 0.05).max(1.0);
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(" Cumulative Net Flow "))
        .x_axis(
            Axis::default()
                .title("Brokers")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, max_x]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([min_y - pad, max_y + pad])
                .labels(vec![
                    Span::raw(crate::flow::format_value(min_y)),
                    Span::raw(crate::flow::format_value(max_y)),
                ]),
        );
    f.render_widget(chart, area);
}

/// Horizontal buy/sell share bar; the terminal stand-in for a pie.
pub fn render_share_bar(f: &mut Frame, area: Rect, buy_share: Option<f64>) {
    let block = Block::default().borders(Borders::ALL).title(" Buy / Sell Share ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(share) = buy_share else {
        f.render_widget(Paragraph::new("  No value traded").style(Style::default().fg(Color::DarkGray)), inner);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let width = inner.width as usize;
    let buy_cols = ((share * width as f64).round() as usize).min(width);
    let bar = Line::from(vec![
        Span::styled("█".repeat(buy_cols), Style::default().fg(BULLISH_COLOR)),
        Span::styled("█".repeat(width - buy_cols), Style::default().fg(BEARISH_COLOR)),
    ]);
    f.render_widget(Paragraph::new(bar), chunks[0]);

    let legend = Line::from(vec![
        Span::styled(format!(" Buy {:.1}%", share * 100.0), Style::default().fg(BULLISH_COLOR)),
        Span::raw("  "),
        Span::styled(format!("Sell {:.1}%", (1.0 - share) * 100.0), Style::default().fg(BEARISH_COLOR)),
    ]);
    if chunks.len() > 1 {
        f.render_widget(Paragraph::new(legend), chunks[1]);
    }
}

#[cfg(test)]
mod tests {
    use ratatui::{backend::TestBackend, Terminal};

    use super::*;
    use crate::api::models::{ForecastPoint, TickerSeries};
    use crate::chart::sync::VisibleRange;

    fn candles() -> Vec<Candle> {
        (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle {
                    time: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(i),
                    open: base,
                    high: base + 3.0,
                    low: base - 2.0,
                    close: base + if i % 2 == 0 { 1.5 } else { -1.0 },
                    volume: 1000.0 * (i + 1) as f64,
                }
            })
            .collect()
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn price_and_volume_panels_render() {
        let chart = PriceChart::new(&TickerSeries { ticker: "BBCA".into(), candles: candles() });
        let view = PanelView {
            range: VisibleRange::tail(20, 20),
            crosshair: Some(19),
        };
        let mut terminal = Terminal::new(TestBackend::new(60, 24)).unwrap();
        terminal
            .draw(|f| {
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(10), Constraint::Length(8)])
                    .split(f.area());
                render_price_panel(f, rows[0], &chart, &view, " BBCA ".into());
                render_volume_panel(f, rows[1], &chart, &view);
            })
            .unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("BBCA"));
        assert!(text.contains("Volume"));
        assert!(text.contains('█'));
        assert!(text.contains("20.0K"));
    }

    #[test]
    fn forecast_chart_renders_title() {
        let forecast = Forecast {
            ticker: "TLKM".into(),
            model: Some("prophet".into()),
            points: vec![ForecastPoint {
                date: NaiveDate::from_ymd_opt(2024, 3, 25).unwrap(),
                value: 121.0,
                lower: Some(118.0),
                upper: Some(124.0),
            }],
        };
        let mut terminal = Terminal::new(TestBackend::new(70, 20)).unwrap();
        terminal
            .draw(|f| render_forecast_chart(f, f.area(), &candles(), &forecast))
            .unwrap();
        assert!(buffer_text(&terminal).contains("Forecast: TLKM (prophet)"));
    }

    #[test]
    fn empty_forecast_shows_placeholder() {
        let forecast = Forecast { ticker: "TLKM".into(), model: None, points: vec![] };
        let mut terminal = Terminal::new(TestBackend::new(50, 8)).unwrap();
        terminal.draw(|f| render_forecast_chart(f, f.area(), &[], &forecast)).unwrap();
        assert!(buffer_text(&terminal).contains("No forecast data"));
    }

    #[test]
    fn crosshair_readout_mentions_spike() {
        let c = &candles()[0];
        let line = crosshair_line(Some(c), true);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.contains("2024-03-01"));
        assert!(text.contains("volume spike"));
    }

    #[test]
    fn volume_format() {
        assert_eq!(format_volume(950.0), "950");
        assert_eq!(format_volume(12_300.0), "12.3K");
        assert_eq!(format_volume(4_560_000.0), "4.6M");
    }
}
