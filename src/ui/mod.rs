mod pages;

use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs},
    Frame,
};

use crate::app::{AddWatchlistState, App, BannerKind, ClickableRegions, InputMode, Page};
use crate::fetch::Resource;

pub fn ui(f: &mut Frame, app: &mut App) {
    // Clear clickable regions before each render
    app.clickable_regions = ClickableRegions::default();

    let banner_height = if app.banner.is_some() { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Tabs
            Constraint::Length(1),             // Filter bar
            Constraint::Length(banner_height), // Banner
            Constraint::Min(8),                // Page
            Constraint::Length(1),             // Footer
        ])
        .split(f.area());

    render_tabs(f, app, chunks[0]);
    render_filter_bar(f, app, chunks[1]);
    if banner_height > 0 {
        render_banner(f, app, chunks[2]);
    }
    match app.page {
        Page::Price => pages::render_price(f, app, chunks[3]),
        Page::News => pages::render_news(f, app, chunks[3]),
        Page::Flow => pages::render_flow(f, app, chunks[3]),
        Page::Tape => pages::render_tape(f, app, chunks[3]),
        Page::HotList => pages::render_hot_list(f, app, chunks[3]),
        Page::Watchlist => pages::render_watchlist(f, app, chunks[3]),
        Page::Forecast => pages::render_forecast(f, app, chunks[3]),
    }
    render_footer(f, app, chunks[4]);

    match &app.input_mode {
        InputMode::TickerInput(text) => render_ticker_dialog(f, text),
        InputMode::SourcePicker(highlight) => render_source_picker(f, app, *highlight),
        InputMode::AddWatchlist(state) => render_add_dialog(f, state),
        InputMode::ConfirmRemove(ticker) => {
            render_confirm_dialog(f, " Remove from Watchlist ", &format!("Remove {} from the watchlist?", ticker))
        }
        InputMode::ConfirmDeleteNews(id) => {
            render_confirm_dialog(f, " Delete News ", &format!("Delete news item {}?", id))
        }
        InputMode::Help => render_help(f),
        InputMode::Normal | InputMode::NewsSearch => {}
    }
}

fn render_tabs(f: &mut Frame, app: &mut App, area: Rect) {
    let mut titles: Vec<Line> = Vec::new();
    let mut current_x = area.x + 1; // Account for left border
    let tab_y = area.y + 1;

    for (i, page) in Page::ALL.iter().enumerate() {
        let title = format!(" {}:{} ", i + 1, page.title());
        let width = title.chars().count() as u16;
        app.clickable_regions.tabs.push((Rect::new(current_x, tab_y, width, 1), *page));
        current_x += width + 1; // +1 for divider "|"
        if *page == app.page {
            titles.push(Line::from(title).cyan().bold());
        } else {
            titles.push(Line::from(title).dark_gray());
        }
    }

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Market Intel ")
                .title(Line::from(format!(" {} ", app.base_url())).right_aligned().dark_gray()),
        )
        .divider("|")
        .padding("", "");

    f.render_widget(tabs, area);
}

fn render_filter_bar(f: &mut Frame, app: &App, area: Rect) {
    let ticker_style = if app.filters.ticker.is_all() {
        Style::default().fg(Color::Magenta).bold()
    } else {
        Style::default().fg(Color::Cyan).bold()
    };
    let line = Line::from(vec![
        Span::styled(" Ticker: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.filters.ticker.to_string(), ticker_style),
        Span::styled("   Range: ", Style::default().fg(Color::DarkGray)),
        Span::raw(app.filters.range.to_string()),
        Span::styled(format!(" ({}d)", app.filters.range.days()), Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_banner(f: &mut Frame, app: &App, area: Rect) {
    let Some(banner) = &app.banner else {
        return;
    };
    let (icon, color) = match banner.kind {
        BannerKind::Info => ("ℹ", Color::Cyan),
        BannerKind::Success => ("✓", Color::Green),
        BannerKind::Error => ("✗", Color::Red),
    };
    let line = Line::from(vec![
        Span::styled(format!(" {} {}", icon, banner.text), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled("  (Esc to dismiss)", Style::default().fg(Color::DarkGray)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn page_keys(page: Page) -> &'static str {
    match page {
        Page::Price => " ←→ pan  +/- zoom  ,. crosshair  m link  u sync  w watch ",
        Page::News => " / search  [] page  P/N/U sentiment  o source  T ticker  d day  c clear  S scrape  D delete ",
        Page::Flow => " p range  t ticker ",
        Page::Tape => " L live  t ticker ",
        Page::HotList => " ↑↓ select  s/g/v sort  w watch  Enter chart ",
        Page::Watchlist => " ↑↓ select  a add  d remove  Enter chart ",
        Page::Forecast => " t ticker  u sync ",
    }
}

fn render_footer(f: &mut Frame, app: &mut App, area: Rect) {
    let keys = page_keys(app.page);
    let live_key = if app.live_mode {
        let secs = app.live_interval().map_or(0, |d| d.as_secs());
        format!("L=Live:ON({}s)", secs)
    } else {
        "L=Live".to_string()
    };

    let mut x = area.x + keys.chars().count() as u16 + 1;
    let mut spans = vec![
        Span::styled(keys, Style::default().fg(Color::Yellow)),
        Span::raw("|"),
    ];
    let buttons = [
        (live_key, "live"),
        ("r=Refresh".to_string(), "refresh"),
        ("?=Help".to_string(), "help"),
        ("q=Quit".to_string(), "quit"),
    ];
    for (label, name) in buttons {
        let width = label.chars().count() as u16;
        app.clickable_regions.footer_buttons.push((Rect::new(x + 1, area.y, width, 1), name));
        x += width + 2;
        let style = if name == "live" && app.live_mode {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Yellow)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(
        format!(" {}", Local::now().format("%H:%M:%S")),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Block title suffix describing a resource's loading or error state.
fn status_suffix<T>(resource: &Resource<T>) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    if resource.loading {
        spans.push(Span::styled(" Loading… ", Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = &resource.error {
        spans.push(Span::styled(format!(" ⚠ {} ", error), Style::default().fg(Color::Red)));
    }
    spans
}

fn titled(title: String, resource_spans: Vec<Span<'static>>) -> Line<'static> {
    let mut spans = vec![Span::raw(title)];
    spans.extend(resource_spans);
    Line::from(spans)
}

/// Explicit empty-state text for a page body.
fn placeholder<T>(resource: &Resource<T>, empty: &str) -> Paragraph<'static> {
    let text = if resource.loading && resource.data.is_none() {
        "  Loading…".to_string()
    } else if let (Some(error), None) = (&resource.error, &resource.data) {
        format!("  {}  (r to retry)", error)
    } else {
        format!("  {}", empty)
    };
    Paragraph::new(text).style(Style::default().fg(Color::DarkGray))
}

fn render_ticker_dialog(f: &mut Frame, text: &str) {
    let area = centered_rect(40, 20, f.area());
    f.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from("  Ticker symbol (empty for all):"),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{}█", text), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(""),
        Line::from("  Enter=Apply, Esc=Cancel").style(Style::default().fg(Color::DarkGray)),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Select Ticker ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(paragraph, area);
}

fn render_add_dialog(f: &mut Frame, state: &AddWatchlistState) {
    let area = centered_rect(50, 30, f.area());
    f.render_widget(Clear, area);

    let step_style = |step: usize| {
        if step == state.step {
            Style::default().fg(Color::Yellow).bold()
        } else if step < state.step {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let cursor = if state.step == 0 { "█" } else { "" };
    let mut stage_spans = vec![Span::styled("  Stage:  ", step_style(1))];
    for (i, stage) in App::stages().iter().enumerate() {
        let style = if i == state.stage && state.step == 1 {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            step_style(1)
        };
        stage_spans.push(Span::styled(format!(" {} ", stage), style));
    }

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Ticker: ", step_style(0)),
            Span::styled(format!("{}{}", state.ticker, cursor), step_style(0)),
        ]),
        Line::from(""),
        Line::from(stage_spans),
        Line::from(""),
        Line::from("  Enter to continue, ←→ stage, Esc to cancel").style(Style::default().fg(Color::DarkGray)),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Add to Watchlist ")
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(paragraph, area);
}

fn render_confirm_dialog(f: &mut Frame, title: &str, question: &str) {
    let area = centered_rect(40, 20, f.area());
    f.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(format!("  {}", question)),
        Line::from(""),
        Line::from("  Press Y to confirm, any key to cancel").style(Style::default().fg(Color::DarkGray)),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(paragraph, area);
}

fn render_source_picker(f: &mut Frame, app: &App, highlight: usize) {
    let area = centered_rect(30, 50, f.area());
    f.render_widget(Clear, area);

    let options = app.source_options();
    let items: Vec<ListItem> = if options.is_empty() {
        vec![ListItem::new("  No sources known yet")]
    } else {
        options
            .iter()
            .map(|source| {
                let mark = if app.news.filters.sources.contains(source) { "[x]" } else { "[ ]" };
                ListItem::new(format!(" {} {}", mark, source))
            })
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Sources (Enter toggle, Esc close) ")
                .border_style(Style::default().fg(Color::Magenta)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = ListState::default().with_selected(Some(highlight));
    f.render_stateful_widget(list, area, &mut state);
}

const HELP: &[(&str, &str)] = &[
    ("1-7 / Tab", "switch page"),
    ("t", "choose ticker (empty = all)"),
    ("A", "all tickers"),
    ("p", "cycle date range preset"),
    ("x", "reset ticker and range"),
    ("r", "refresh current page"),
    ("L", "toggle live refresh"),
    ("↑↓ / jk", "move selection"),
    ("Esc", "dismiss banner"),
    ("", ""),
    ("Price", "←→ pan, +/- zoom, ,. crosshair, m link panels, u sync prices, w watch"),
    ("News", "/ search, [ ] pages, P N U sentiment, o sources, T ticker, d day, c clear"),
    ("", "S scrape, D delete, Enter open chart"),
    ("Hot list", "s score, g strength, v net value sort, w watch, Enter chart"),
    ("Watchlist", "a add, d remove, Enter chart"),
];

fn render_help(f: &mut Frame) {
    let area = centered_rect(70, 70, f.area());
    f.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];
    for (key, what) in HELP {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<12}", key), Style::default().fg(Color::Yellow).bold()),
            Span::raw(*what),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from("  Press any key to close").style(Style::default().fg(Color::DarkGray)));

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Keys ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::runtime::Handle;

    use super::*;
    use crate::api::models::{FlowSignal, WatchlistEntry};
    use crate::api::tests::ScriptedTransport;
    use crate::api::ApiClient;
    use crate::config::Config;

    pub(super) fn app() -> App {
        let api = ApiClient::new("http://backend", ScriptedTransport::with(vec![]));
        App::new(
            Config::default(),
            api,
            Handle::current(),
            NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
        )
    }

    pub(super) fn draw(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn tabs_register_click_regions() {
        let mut app = app();
        let screen = draw(&mut app, 120, 30);
        assert!(screen.contains("1:Price"));
        assert!(screen.contains("7:Forecast"));
        assert_eq!(app.clickable_regions.tabs.len(), 7);
        let (first, page) = app.clickable_regions.tabs[0];
        assert_eq!(page, Page::Price);
        assert_eq!((first.x, first.y), (1, 1));
        assert_eq!(app.clickable_regions.footer_buttons.len(), 4);
    }

    #[tokio::test]
    async fn price_page_without_ticker_prompts() {
        let mut app = app();
        let screen = draw(&mut app, 100, 30);
        assert!(screen.contains("Press t to choose a ticker"));
    }

    #[tokio::test]
    async fn banner_and_dialogs_render() {
        let mut app = app();
        app.notify(BannerKind::Error, "Scrape failed: HTTP 500".into());
        app.input_mode = InputMode::ConfirmRemove("BBCA".into());
        let screen = draw(&mut app, 100, 30);
        assert!(screen.contains("Scrape failed: HTTP 500"));
        assert!(screen.contains("Remove BBCA from the watchlist?"));

        app.input_mode = InputMode::Help;
        assert!(draw(&mut app, 100, 30).contains("cycle date range preset"));
    }

    #[tokio::test]
    async fn hot_list_shows_sort_arrow_and_headers() {
        let mut app = app();
        app.page = Page::HotList;
        app.hot_list.succeed(vec![
            FlowSignal { ticker: "ADRO".into(), score: 81.0, strength: 0.7, net_value: 2.1e9, stage: None },
            FlowSignal { ticker: "ANTM".into(), score: 64.0, strength: 0.9, net_value: -4.0e8, stage: Some("markup".into()) },
        ]);
        app.toggle_hot_sort(crate::flow::SortColumn::Strength);
        let screen = draw(&mut app, 100, 30);
        assert!(screen.contains("Strength▼"));
        assert!(screen.contains("2.1B"));
        assert_eq!(app.clickable_regions.hot_headers.len(), 3);
        assert_eq!(app.clickable_regions.rows.len(), 2);
        // Strength descending puts ANTM first.
        let antm = screen.find("ANTM").unwrap();
        let adro = screen.find("ADRO").unwrap();
        assert!(antm < adro);
    }

    #[tokio::test]
    async fn watchlist_empty_state_and_rows() {
        let mut app = app();
        app.page = Page::Watchlist;
        app.watchlist.load(vec![]);
        assert!(draw(&mut app, 100, 30).contains("Watchlist is empty"));

        app.watchlist.load(vec![WatchlistEntry {
            ticker: "BBCA".into(),
            stage: "accumulation".into(),
            score: Some(72.5),
            added_at: None,
        }]);
        let screen = draw(&mut app, 100, 30);
        assert!(screen.contains("BBCA"));
        assert!(screen.contains("accumulation"));
    }

    #[test]
    fn centered_rect_is_inside() {
        let outer = Rect::new(0, 0, 100, 50);
        let inner = centered_rect(40, 20, outer);
        assert_eq!(inner.width, 40);
        assert_eq!(inner.height, 10);
        assert!(inner.x >= 30 && inner.y >= 20);
    }
}
