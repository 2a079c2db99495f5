use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use super::{placeholder, status_suffix, titled};
use crate::api::models::{Sentiment, TradeSide};
use crate::app::{App, InputMode};
use crate::chart::render::{self, BEARISH_COLOR, BULLISH_COLOR};
use crate::flow::{self, format_value, FlowTotals, SortColumn};
use crate::news::SentimentBreakdown;
use crate::pagination::PageItem;

const HEADER_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);
const HIGHLIGHT_STYLE: Style = Style::new().bg(Color::DarkGray);

fn signed_color(value: f64) -> Color {
    if value >= 0.0 {
        BULLISH_COLOR
    } else {
        BEARISH_COLOR
    }
}

fn sentiment_color(sentiment: Sentiment) -> Color {
    match sentiment {
        Sentiment::Positive => BULLISH_COLOR,
        Sentiment::Negative => BEARISH_COLOR,
        Sentiment::Neutral => Color::Gray,
    }
}

/// Click targets for the data rows of a bordered table with one header row.
fn row_regions(area: Rect, offset: usize, count: usize) -> Vec<(Rect, usize)> {
    let first_y = area.y + 2; // border + header
    let last_y = area.y + area.height.saturating_sub(1);
    let width = area.width.saturating_sub(2);
    (offset..count)
        .zip(first_y..last_y)
        .map(|(index, y)| (Rect::new(area.x + 1, y, width, 1), index))
        .collect()
}

fn ticker_prompt(f: &mut Frame, area: Rect, what: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(format!("{} needs a single ticker.", what)),
        Line::from(""),
        Line::from("Press t to choose a ticker").style(Style::default().fg(Color::Yellow)),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", what)));
    f.render_widget(paragraph, area);
}

// ---- price ---------------------------------------------------------------

pub(super) fn render_price(f: &mut Frame, app: &mut App, area: Rect) {
    if app.ticker().is_none() {
        ticker_prompt(f, area, "Price chart");
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(7),
            Constraint::Length(1),
        ])
        .split(area);
    let (price_area, volume_area) = (chunks[1], chunks[2]);

    if !app.chart.is_mounted() {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(titled(format!(" {} ", app.filters.ticker), status_suffix(&app.series)));
        let inner = block.inner(price_area);
        f.render_widget(block, price_area);
        f.render_widget(placeholder(&app.series, "No price data for this range"), inner);
        return;
    }

    // Two columns per candle.
    let width = render::plot_width(price_area);
    app.set_chart_capacity(width / 2);

    let axis = render::y_axis_width(price_area);
    app.clickable_regions.price_plot = Rect::new(
        price_area.x + 1 + axis,
        price_area.y + 2,
        width as u16,
        price_area.height.saturating_sub(3),
    );
    app.clickable_regions.volume_plot = Rect::new(
        volume_area.x + 1 + axis,
        volume_area.y + 1,
        width as u16,
        volume_area.height.saturating_sub(2),
    );

    let Some(chart) = app.chart.get() else {
        return;
    };
    let price_view = *app.price_view.borrow();
    let volume_view = *app.volume_view.borrow();

    let mut header = vec![Span::styled(
        format!(" {} ", chart.ticker),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if let Some(series) = app.series.get() {
        if let Some(close) = series.last_close() {
            header.push(Span::raw(format!("{:.2} ", close)));
        }
        if let Some(change) = series.change_percent() {
            header.push(Span::styled(format!("{:+.2}% ", change), Style::default().fg(signed_color(change))));
        }
    }
    header.push(Span::styled(
        format!(
            " bars {}-{} of {}  spikes {}  {} ",
            price_view.range.from + 1,
            price_view.range.to,
            chart.len(),
            chart.spike_count(),
            if app.panels_linked { "linked" } else { "unlinked" },
        ),
        Style::default().fg(Color::DarkGray),
    ));
    header.extend(status_suffix(&app.series));
    header.extend(status_suffix(&app.spikes));
    f.render_widget(Paragraph::new(Line::from(header)), chunks[0]);

    let title = format!(" {} {} ", chart.ticker, app.filters.range);
    render::render_price_panel(f, price_area, chart, &price_view, title);
    render::render_volume_panel(f, volume_area, chart, &volume_view);

    let crosshair = price_view.crosshair;
    let candle = crosshair.and_then(|i| chart.candle(i));
    let spike = crosshair.is_some_and(|i| chart.is_spike(i));
    f.render_widget(Paragraph::new(render::crosshair_line(candle, spike)), chunks[3]);
}

// ---- news ----------------------------------------------------------------

pub(super) fn render_news(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(area);

    render_news_search(f, app, chunks[0]);
    render_news_table(f, app, chunks[1]);
    render_news_detail(f, app, chunks[2]);
    render_news_pager(f, app, chunks[3]);
}

fn render_news_search(f: &mut Frame, app: &App, area: Rect) {
    let editing = matches!(app.input_mode, InputMode::NewsSearch);
    let cursor = if editing { "█" } else { "" };
    let mut search = vec![
        Span::styled(" Search: ", Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{}{}", app.news.search_input, cursor), Style::default().fg(Color::Yellow)),
    ];
    if app.news.search_pending() {
        search.push(Span::styled("  …", Style::default().fg(Color::DarkGray)));
    }
    let filters = Line::from(vec![
        Span::styled(" Filters: ", Style::default().fg(Color::DarkGray)),
        Span::raw(app.news.filters.summary()),
    ]);

    let border = if editing { Color::Yellow } else { Color::Reset };
    let paragraph = Paragraph::new(vec![Line::from(search), filters]).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" News Library ")
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(paragraph, area);
}

fn render_news_table(f: &mut Frame, app: &mut App, area: Rect) {
    let total = app.news.results.get().map_or(0, |page| page.total);
    let (rows, breakdown, count) = {
        let visible = app.news.visible();
        let breakdown = SentimentBreakdown::of(visible.iter().copied());
        let rows: Vec<Row> = visible
            .iter()
            .map(|item| {
                Row::new(vec![
                    Cell::from(item.published_at.format("%Y-%m-%d %H:%M").to_string()),
                    Cell::from(item.ticker.clone().unwrap_or_else(|| "-".into())),
                    Cell::from(item.sentiment.to_string()).style(Style::default().fg(sentiment_color(item.sentiment))),
                    Cell::from(item.source.clone()),
                    Cell::from(item.title.clone()),
                ])
            })
            .collect();
        (rows, breakdown, visible.len())
    };

    let mut title = vec![
        Span::raw(format!(" {} items ", total)),
        Span::styled(format!("+{} ", breakdown.positive), Style::default().fg(BULLISH_COLOR)),
        Span::styled(format!("={} ", breakdown.neutral), Style::default().fg(Color::Gray)),
        Span::styled(format!("-{} ", breakdown.negative), Style::default().fg(BEARISH_COLOR)),
    ];
    title.extend(status_suffix(&app.news.results));
    let block = Block::default().borders(Borders::ALL).title(Line::from(title));

    if count == 0 {
        let empty = if app.news.filters.is_empty() {
            "No news for this range"
        } else {
            "No news matches the selected filters"
        };
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(placeholder(&app.news.results, empty), inner);
        return;
    }

    let header = Row::new(vec!["Published", "Ticker", "Sentiment", "Source", "Title"]).style(HEADER_STYLE);
    let widths = [
        Constraint::Length(16),
        Constraint::Length(7),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Min(20),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(HIGHLIGHT_STYLE);

    let mut state = TableState::default().with_selected(Some(app.news.selected));
    f.render_stateful_widget(table, area, &mut state);
    app.clickable_regions.rows = row_regions(area, state.offset(), count);
}

fn render_news_detail(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Detail ");
    let Some(item) = app.news.selected_item() else {
        f.render_widget(block, area);
        return;
    };
    let mut lines = vec![Line::from(Span::styled(
        item.title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    if let Some(summary) = &item.summary {
        lines.push(Line::from(summary.clone()));
    }
    if let Some(url) = &item.url {
        lines.push(Line::from(Span::styled(url.clone(), Style::default().fg(Color::Blue))));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }).block(block), area);
}

fn render_news_pager(f: &mut Frame, app: &mut App, area: Rect) {
    let current = app.news.page;
    let total = app.news.total_pages();
    if total == 0 {
        return;
    }

    let window = app.news.page_window();
    let regions = &mut app.clickable_regions.news_pages;
    let mut spans = Vec::new();
    let mut x = area.x + 1;
    let mut push = |spans: &mut Vec<Span<'static>>, label: String, style: Style, target: Option<u32>| {
        let width = label.chars().count() as u16;
        if let Some(page) = target {
            regions.push((Rect::new(x, area.y, width, 1), page));
        }
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
        x += width + 1;
    };

    spans.push(Span::raw(" "));
    let dim = Style::default().fg(Color::DarkGray);
    let prev = (current > 1).then(|| current - 1);
    push(&mut spans, "‹".to_string(), if prev.is_some() { Style::default() } else { dim }, prev);
    for item in window {
        match item {
            PageItem::Page(page) if page == current => push(
                &mut spans,
                format!("[{}]", page),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                None,
            ),
            PageItem::Page(page) => push(&mut spans, page.to_string(), Style::default(), Some(page)),
            PageItem::Ellipsis => push(&mut spans, item.to_string(), dim, None),
        }
    }
    let next = (current < total).then(|| current + 1);
    push(&mut spans, "›".to_string(), if next.is_some() { Style::default() } else { dim }, next);
    spans.push(Span::styled(format!(" page {} of {}", current, total), dim));

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ---- broker flow ---------------------------------------------------------

pub(super) fn render_flow(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(6)])
        .split(chunks[1]);

    let scope = app.filters.ticker.to_string();
    let Some(summary) = app.broker.get() else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(titled(format!(" Broker Summary {} ", scope), status_suffix(&app.broker)));
        let inner = block.inner(chunks[0]);
        f.render_widget(block, chunks[0]);
        f.render_widget(placeholder(&app.broker, "No broker activity"), inner);
        render::render_share_bar(f, right[0], None);
        render::render_cumulative_chart(f, right[1], &[]);
        return;
    };

    let ranked = flow::ranked_brokers(summary);
    let totals = FlowTotals::of(&summary.rows);

    let mut title = vec![
        Span::raw(format!(" Broker Summary {} {} ", summary.date, scope)),
        Span::styled(
            format!("net {} ", format_value(totals.net_value)),
            Style::default().fg(signed_color(totals.net_value)),
        ),
    ];
    title.extend(status_suffix(&app.broker));
    let block = Block::default().borders(Borders::ALL).title(Line::from(title));

    if ranked.is_empty() {
        let inner = block.inner(chunks[0]);
        f.render_widget(block, chunks[0]);
        f.render_widget(placeholder(&app.broker, "No broker activity"), inner);
    } else {
        let rows: Vec<Row> = ranked
            .iter()
            .enumerate()
            .map(|(i, row)| {
                Row::new(vec![
                    Cell::from(format!("{}", i + 1)),
                    Cell::from(row.broker.clone()),
                    Cell::from(format_value(row.buy_value)),
                    Cell::from(format_value(row.sell_value)),
                    Cell::from(format!("{:>9}", format_value(row.net_value)))
                        .style(Style::default().fg(signed_color(row.net_value))),
                ])
            })
            .collect();
        let header = Row::new(vec!["#", "Broker", "Buy", "Sell", "Net"]).style(HEADER_STYLE);
        let widths = [
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Min(9),
        ];
        f.render_widget(Table::new(rows, widths).header(header).block(block), chunks[0]);
    }

    render::render_share_bar(f, right[0], totals.buy_share());
    render::render_cumulative_chart(f, right[1], &flow::cumulative_net(&ranked));
}

// ---- running trade -------------------------------------------------------

pub(super) fn render_tape(f: &mut Frame, app: &App, area: Rect) {
    let trades = app.tape.get().map(Vec::as_slice).unwrap_or_default();
    let (buy, sell) = flow::tape_pressure(trades);

    let mut title = vec![
        Span::raw(format!(" Running Trade {} ", app.filters.ticker)),
        Span::styled(format!("buy {} lot ", buy), Style::default().fg(BULLISH_COLOR)),
        Span::styled(format!("sell {} lot ", sell), Style::default().fg(BEARISH_COLOR)),
    ];
    if app.live_mode {
        title.push(Span::styled("● LIVE ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)));
    }
    title.extend(status_suffix(&app.tape));
    let block = Block::default().borders(Borders::ALL).title(Line::from(title));

    if trades.is_empty() {
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(placeholder(&app.tape, "No trades yet"), inner);
        return;
    }

    let rows: Vec<Row> = trades
        .iter()
        .map(|t| {
            let (side, color) = match t.side {
                TradeSide::Buy => ("BUY", BULLISH_COLOR),
                TradeSide::Sell => ("SELL", BEARISH_COLOR),
            };
            Row::new(vec![
                Cell::from(t.time.format("%H:%M:%S").to_string()),
                Cell::from(t.ticker.clone()),
                Cell::from(format!("{:.0}", t.price)),
                Cell::from(t.lot.to_string()),
                Cell::from(side).style(Style::default().fg(color)),
                Cell::from(t.buyer.clone().unwrap_or_default()),
                Cell::from(t.seller.clone().unwrap_or_default()),
            ])
        })
        .collect();
    let header = Row::new(vec!["Time", "Ticker", "Price", "Lot", "Side", "Buyer", "Seller"]).style(HEADER_STYLE);
    let widths = [
        Constraint::Length(8),
        Constraint::Length(7),
        Constraint::Length(8),
        Constraint::Length(7),
        Constraint::Length(5),
        Constraint::Length(6),
        Constraint::Length(6),
    ];
    f.render_widget(Table::new(rows, widths).header(header).block(block), area);
}

// ---- hot list ------------------------------------------------------------

/// Sortable hot-list columns: header label, column, width.
const HOT_COLUMNS: [(&str, SortColumn, u16); 3] = [
    ("Score", SortColumn::Score, 10),
    ("Strength", SortColumn::Strength, 11),
    ("Net Value", SortColumn::NetValue, 12),
];
const HOT_TICKER_WIDTH: u16 = 8;

pub(super) fn render_hot_list(f: &mut Frame, app: &mut App, area: Rect) {
    let mut title = vec![Span::raw(format!(" Hot List {} ", app.filters.range))];
    title.extend(status_suffix(&app.hot_list));
    let block = Block::default().borders(Borders::ALL).title(Line::from(title));

    let (rows, count) = {
        let signals = app.hot_rows();
        let rows: Vec<Row> = signals
            .iter()
            .map(|s| {
                let watched = if app.watchlist.contains(&s.ticker) { "★" } else { "" };
                Row::new(vec![
                    Cell::from(format!("{}{}", s.ticker, watched)),
                    Cell::from(format!("{:.1}", s.score)),
                    Cell::from(format!("{:.2}", s.strength)),
                    Cell::from(format_value(s.net_value)).style(Style::default().fg(signed_color(s.net_value))),
                    Cell::from(s.stage.clone().unwrap_or_else(|| "-".into())),
                ])
            })
            .collect();
        (rows, signals.len())
    };

    if count == 0 {
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(placeholder(&app.hot_list, "No flow signals for this range"), inner);
        return;
    }

    // Header cells double as sort buttons.
    let mut x = area.x + 1 + HOT_TICKER_WIDTH + 1;
    let mut header = vec!["Ticker".to_string()];
    for (name, column, width) in HOT_COLUMNS {
        app.clickable_regions.hot_headers.push((Rect::new(x, area.y + 1, width, 1), column));
        header.push(app.hot_sort.header(name, column));
        x += width + 1;
    }
    header.push("Stage".to_string());

    let mut widths = vec![Constraint::Length(HOT_TICKER_WIDTH)];
    widths.extend(HOT_COLUMNS.iter().map(|&(_, _, w)| Constraint::Length(w)));
    widths.push(Constraint::Min(10));

    let table = Table::new(rows, widths)
        .header(Row::new(header).style(HEADER_STYLE))
        .block(block)
        .row_highlight_style(HIGHLIGHT_STYLE);
    let mut state = TableState::default().with_selected(Some(app.hot_selected));
    f.render_stateful_widget(table, area, &mut state);
    app.clickable_regions.rows = row_regions(area, state.offset(), count);
}

// ---- watchlist -----------------------------------------------------------

pub(super) fn render_watchlist(f: &mut Frame, app: &mut App, area: Rect) {
    let mut title = vec![Span::raw(" Watchlist ".to_string())];
    title.extend(status_suffix(&app.watchlist.entries));
    let block = Block::default().borders(Borders::ALL).title(Line::from(title));

    let entries = app.watchlist.rows();
    if entries.is_empty() {
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(placeholder(&app.watchlist.entries, "Watchlist is empty  (a to add)"), inner);
        return;
    }

    let rows: Vec<Row> = entries
        .iter()
        .map(|e| {
            Row::new(vec![
                Cell::from(e.ticker.clone()).style(Style::default().bold()),
                Cell::from(e.stage.clone()),
                Cell::from(e.score.map_or_else(|| "-".to_string(), |s| format!("{:.1}", s))),
                Cell::from(
                    e.added_at
                        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d").to_string()),
                ),
            ])
        })
        .collect();
    let count = rows.len();
    let header = Row::new(vec!["Ticker", "Stage", "Score", "Added"]).style(HEADER_STYLE);
    let widths = [
        Constraint::Length(8),
        Constraint::Length(14),
        Constraint::Length(7),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(HIGHLIGHT_STYLE);
    let mut state = TableState::default().with_selected(app.watchlist.selected_index());
    f.render_stateful_widget(table, area, &mut state);
    app.clickable_regions.rows = row_regions(area, state.offset(), count);
}

// ---- forecast ------------------------------------------------------------

pub(super) fn render_forecast(f: &mut Frame, app: &App, area: Rect) {
    let Some(ticker) = app.ticker() else {
        ticker_prompt(f, area, "Forecast");
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(1)])
        .split(area);

    let Some(forecast) = app.forecast.get() else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(titled(format!(" Forecast: {} ", ticker), status_suffix(&app.forecast)));
        let inner = block.inner(chunks[0]);
        f.render_widget(block, chunks[0]);
        f.render_widget(placeholder(&app.forecast, "No forecast data available"), inner);
        return;
    };

    let history = app
        .series
        .get()
        .filter(|s| s.ticker.eq_ignore_ascii_case(&forecast.ticker))
        .map(|s| s.candles.as_slice())
        .unwrap_or_default();
    render::render_forecast_chart(f, chunks[0], history, forecast);

    let mut info = Vec::new();
    if let Some(last) = forecast.points.last() {
        info.push(Span::raw(format!(" {} → {:.2}", last.date, last.value)));
        if let (Some(lower), Some(upper)) = (last.lower, last.upper) {
            info.push(Span::styled(
                format!("  band {:.2} – {:.2}", lower, upper),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    info.extend(status_suffix(&app.forecast));
    f.render_widget(Paragraph::new(Line::from(info)), chunks[1]);
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use super::super::tests::{app, draw};
    use super::*;
    use crate::api::models::{BrokerFlow, BrokerSummary, Candle, NewsItem, NewsPage, RunningTrade, TickerSeries};
    use crate::app::Page;

    fn news(id: &str, sentiment: Sentiment) -> NewsItem {
        NewsItem {
            id: id.into(),
            title: format!("Headline {}", id),
            ticker: Some("BBCA".into()),
            sentiment,
            source: "kontan".into(),
            published_at: Utc.with_ymd_and_hms(2024, 6, 27, 9, 30, 0).unwrap(),
            url: None,
            summary: Some("Quarterly results beat estimates".into()),
        }
    }

    fn series(n: usize) -> TickerSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        TickerSeries {
            ticker: "BBCA".into(),
            candles: (0..n)
                .map(|i| {
                    let base = 9000.0 + i as f64 * 10.0;
                    Candle {
                        time: start + chrono::Days::new(i as u64),
                        open: base,
                        high: base + 40.0,
                        low: base - 40.0,
                        close: base + 20.0,
                        volume: 1_000_000.0,
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn row_regions_skip_scrolled_rows_and_stop_at_border() {
        let area = Rect::new(0, 10, 40, 6); // 3 data rows fit
        let regions = row_regions(area, 2, 10);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0], (Rect::new(1, 12, 38, 1), 2));
        assert_eq!(regions[2].1, 4);
    }

    #[tokio::test]
    async fn news_page_renders_rows_breakdown_and_pager() {
        let mut app = app();
        app.page = Page::News;
        app.news.results.succeed(NewsPage {
            items: vec![news("a", Sentiment::Positive), news("b", Sentiment::Negative), news("c", Sentiment::Positive)],
            total: 95,
            page: 1,
            page_size: 20,
        });
        let screen = draw(&mut app, 120, 40);
        assert!(screen.contains("95 items"));
        assert!(screen.contains("+2"));
        assert!(screen.contains("-1"));
        assert!(screen.contains("Headline b"));
        assert!(screen.contains("Quarterly results beat estimates"));
        assert!(screen.contains("page 1 of 5"));
        assert_eq!(app.clickable_regions.rows.len(), 3);
        // Pages 2..=5 plus the next arrow are clickable.
        let targets: Vec<u32> = app.clickable_regions.news_pages.iter().map(|&(_, p)| p).collect();
        assert_eq!(targets, vec![2, 3, 4, 5, 2]);
    }

    #[tokio::test]
    async fn news_filters_with_no_match_show_reason() {
        let mut app = app();
        app.page = Page::News;
        app.news.results.succeed(NewsPage { items: vec![news("a", Sentiment::Positive)], total: 1, page: 1, page_size: 20 });
        app.news.filters.toggle_sentiment(Sentiment::Negative);
        let screen = draw(&mut app, 120, 40);
        assert!(screen.contains("No news matches the selected filters"));
        assert!(screen.contains("sentiment=negative"));
    }

    #[tokio::test]
    async fn price_page_mounts_plot_regions() {
        let mut app = app();
        app.set_ticker("BBCA");
        app.series.succeed(series(120));
        app.chart.mount(crate::chart::PriceChart::new(&series(120)));
        let screen = draw(&mut app, 100, 40);
        assert!(screen.contains("BBCA"));
        assert!(screen.contains("Volume"));
        let plot = app.clickable_regions.price_plot;
        assert!(plot.width > 0 && plot.height > 0);
        assert_eq!(plot.x, app.clickable_regions.volume_plot.x);
        // 100 columns, 10 wide axis and borders leave 88; two per candle.
        let view = *app.price_view.borrow();
        assert_eq!(view.range.len(), 44);
        assert_eq!(view.range.to, 120);
    }

    #[tokio::test]
    async fn price_page_reports_fetch_error() {
        let mut app = app();
        app.set_ticker("BBCA");
        app.series.fail("HTTP 404: unknown ticker");
        let screen = draw(&mut app, 100, 30);
        assert!(screen.contains("HTTP 404: unknown ticker"));
    }

    #[tokio::test]
    async fn flow_page_ranks_brokers_and_shows_share() {
        let mut app = app();
        app.page = Page::Flow;
        let broker = |name: &str, buy: f64, sell: f64| BrokerFlow {
            broker: name.into(),
            buy_value: buy,
            sell_value: sell,
            net_value: buy - sell,
            buy_volume: 0.0,
            sell_volume: 0.0,
        };
        app.broker.succeed(BrokerSummary {
            date: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
            ticker: None,
            rows: vec![broker("YP", 1.0e9, 3.0e9), broker("CC", 3.0e9, 1.0e9)],
        });
        let screen = draw(&mut app, 120, 30);
        assert!(screen.contains("Broker Summary 2024-06-28"));
        assert!(screen.contains("Buy 50.0%"));
        assert!(screen.find("CC").unwrap() < screen.find("YP").unwrap());
    }

    #[tokio::test]
    async fn tape_page_shows_pressure() {
        let mut app = app();
        app.page = Page::Tape;
        let trade = |side, lot| RunningTrade {
            time: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            ticker: "TLKM".into(),
            price: 3200.0,
            lot,
            side,
            buyer: Some("YP".into()),
            seller: Some("CC".into()),
        };
        app.tape.succeed(vec![trade(TradeSide::Buy, 12), trade(TradeSide::Sell, 5)]);
        let screen = draw(&mut app, 120, 30);
        assert!(screen.contains("buy 12 lot"));
        assert!(screen.contains("sell 5 lot"));
        assert!(screen.contains("09:15:00"));
    }

    #[tokio::test]
    async fn forecast_page_without_data() {
        let mut app = app();
        app.page = Page::Forecast;
        assert!(draw(&mut app, 100, 30).contains("Press t to choose a ticker"));
        app.set_ticker("BBCA");
        assert!(draw(&mut app, 100, 30).contains("No forecast data available"));
    }
}
