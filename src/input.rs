use std::time::Instant;

use crossterm::event::{KeyCode, MouseButton, MouseEventKind};
use ratatui::layout::Rect;

use crate::api::models::Sentiment;
use crate::app::{Action, AddWatchlistState, App, InputMode, Page};
use crate::chart::{PriceChart, PRICE_PANEL, VOLUME_PANEL};
use crate::flow::SortColumn;

/// Candles moved per pan or zoom key press.
const PAN_STEP: isize = 5;
const ZOOM_STEP: isize = 10;

pub fn handle_input(app: &mut App, key: KeyCode) -> Action {
    match &mut app.input_mode {
        InputMode::Normal => handle_normal(app, key),
        InputMode::Help => {
            app.input_mode = InputMode::Normal;
            Action::None
        }
        InputMode::TickerInput(text) => match key {
            KeyCode::Esc => {
                app.input_mode = InputMode::Normal;
                Action::None
            }
            KeyCode::Enter => Action::SetTicker(text.clone()),
            KeyCode::Backspace => {
                text.pop();
                Action::None
            }
            KeyCode::Char(c) if c.is_ascii_alphanumeric() || c == '.' || c == '-' => {
                text.push(c.to_ascii_uppercase());
                Action::None
            }
            _ => Action::None,
        },
        InputMode::NewsSearch => match key {
            KeyCode::Enter => {
                app.news.commit_search();
                app.input_mode = InputMode::Normal;
                Action::None
            }
            KeyCode::Esc => {
                app.input_mode = InputMode::Normal;
                Action::None
            }
            KeyCode::Backspace => {
                app.news.backspace(Instant::now());
                Action::None
            }
            KeyCode::Char(c) => {
                app.news.type_char(c, Instant::now());
                Action::None
            }
            _ => Action::None,
        },
        InputMode::SourcePicker(highlight) => {
            let current = *highlight;
            pick_source(app, key, current)
        }
        InputMode::AddWatchlist(state) => match key {
            KeyCode::Esc => {
                app.input_mode = InputMode::Normal;
                Action::None
            }
            KeyCode::Enter => {
                if state.step == 0 {
                    if !state.ticker.trim().is_empty() {
                        state.step = 1;
                    }
                    Action::None
                } else {
                    let stages = App::stages();
                    let stage = stages[state.stage.min(stages.len() - 1)].to_string();
                    Action::AddWatchlist {
                        ticker: state.ticker.trim().to_uppercase(),
                        stage,
                    }
                }
            }
            KeyCode::Backspace if state.step == 0 => {
                state.ticker.pop();
                Action::None
            }
            KeyCode::Char(c) if state.step == 0 && c.is_ascii_alphanumeric() => {
                state.ticker.push(c.to_ascii_uppercase());
                Action::None
            }
            KeyCode::Left | KeyCode::Char('h') if state.step == 1 => {
                state.stage = state.stage.saturating_sub(1);
                Action::None
            }
            KeyCode::Right | KeyCode::Char('l') if state.step == 1 => {
                state.stage = (state.stage + 1).min(App::stages().len() - 1);
                Action::None
            }
            _ => Action::None,
        },
        InputMode::ConfirmRemove(ticker) => match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => Action::RemoveWatchlist(ticker.clone()),
            _ => {
                app.input_mode = InputMode::Normal;
                Action::None
            }
        },
        InputMode::ConfirmDeleteNews(id) => match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => Action::DeleteNews(id.clone()),
            _ => {
                app.input_mode = InputMode::Normal;
                Action::None
            }
        },
    }
}

fn pick_source(app: &mut App, key: KeyCode, current: usize) -> Action {
    let options = app.source_options();
    let next = match key {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            return Action::None;
        }
        KeyCode::Down | KeyCode::Char('j') => (current + 1).min(options.len().saturating_sub(1)),
        KeyCode::Up | KeyCode::Char('k') => current.saturating_sub(1),
        KeyCode::Enter | KeyCode::Char(' ') => {
            if let Some(source) = options.get(current) {
                app.news.filters.toggle_source(source);
                app.news.filters_changed();
            }
            current
        }
        _ => current,
    };
    app.input_mode = InputMode::SourcePicker(next);
    Action::None
}

fn handle_normal(app: &mut App, key: KeyCode) -> Action {
    // Global keys first, then the active page's own.
    match key {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char(c) if c.is_ascii_digit() => {
            return c
                .to_digit(10)
                .and_then(Page::from_digit)
                .map_or(Action::None, Action::SwitchPage);
        }
        KeyCode::Tab => return Action::SwitchPage(app.page.next()),
        KeyCode::BackTab => return Action::SwitchPage(app.page.prev()),
        KeyCode::Char('t') => {
            let current = app.ticker().unwrap_or_default().to_string();
            app.input_mode = InputMode::TickerInput(current);
            return Action::None;
        }
        KeyCode::Char('A') => return Action::SetTicker(String::new()),
        KeyCode::Char('p') => return Action::CyclePreset,
        KeyCode::Char('x') => return Action::ResetFilters,
        KeyCode::Char('r') => return Action::Refresh,
        KeyCode::Char('L') => return Action::ToggleLive,
        KeyCode::Char('?') => {
            app.input_mode = InputMode::Help;
            return Action::None;
        }
        KeyCode::Esc => {
            app.dismiss_banner();
            return Action::None;
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.select_next();
            return Action::None;
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.select_prev();
            return Action::None;
        }
        _ => {}
    }

    match app.page {
        Page::Price | Page::Forecast => price_keys(app, key),
        Page::News => news_keys(app, key),
        Page::HotList => match key {
            KeyCode::Char('s') => Action::SortHotList(SortColumn::Score),
            KeyCode::Char('g') => Action::SortHotList(SortColumn::Strength),
            KeyCode::Char('v') => Action::SortHotList(SortColumn::NetValue),
            KeyCode::Char('w') => {
                if let Some(ticker) = app.selected_hot().map(|s| s.ticker.clone()) {
                    app.input_mode = InputMode::AddWatchlist(AddWatchlistState {
                        step: 1,
                        ticker,
                        stage: 0,
                    });
                }
                Action::None
            }
            KeyCode::Enter => app
                .selected_hot()
                .map_or(Action::None, |s| Action::OpenPrice(s.ticker.clone())),
            _ => Action::None,
        },
        Page::Watchlist => match key {
            KeyCode::Char('a') => {
                app.input_mode = InputMode::AddWatchlist(AddWatchlistState::default());
                Action::None
            }
            KeyCode::Char('d') => {
                if let Some(ticker) = app.watchlist.selected_entry().map(|e| e.ticker.clone()) {
                    app.input_mode = InputMode::ConfirmRemove(ticker);
                }
                Action::None
            }
            KeyCode::Enter => app
                .watchlist
                .selected_entry()
                .map_or(Action::None, |e| Action::OpenPrice(e.ticker.clone())),
            _ => Action::None,
        },
        Page::Flow | Page::Tape => Action::None,
    }
}

fn price_keys(app: &mut App, key: KeyCode) -> Action {
    match key {
        KeyCode::Left | KeyCode::Char('h') => app.pan_chart(-PAN_STEP),
        KeyCode::Right | KeyCode::Char('l') => app.pan_chart(PAN_STEP),
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_chart(-ZOOM_STEP),
        KeyCode::Char('-') => app.zoom_chart(ZOOM_STEP),
        KeyCode::Char(',') => app.move_crosshair(-1),
        KeyCode::Char('.') => app.move_crosshair(1),
        KeyCode::Backspace => app.set_crosshair(PRICE_PANEL, None),
        KeyCode::Char('m') => app.toggle_panel_link(),
        KeyCode::Char('u') => return Action::SyncPrices,
        KeyCode::Char('w') => {
            if let Some(ticker) = app.ticker().map(String::from) {
                app.input_mode = InputMode::AddWatchlist(AddWatchlistState {
                    step: 1,
                    ticker,
                    stage: 0,
                });
            }
        }
        _ => {}
    }
    Action::None
}

fn news_keys(app: &mut App, key: KeyCode) -> Action {
    let toggle = |app: &mut App, sentiment: Sentiment| {
        app.news.filters.toggle_sentiment(sentiment);
        app.news.filters_changed();
    };
    match key {
        KeyCode::Char('/') => app.input_mode = InputMode::NewsSearch,
        KeyCode::Char(']') | KeyCode::PageDown => return Action::GoToNewsPage(app.news.page + 1),
        KeyCode::Char('[') | KeyCode::PageUp => {
            return Action::GoToNewsPage(app.news.page.saturating_sub(1).max(1));
        }
        KeyCode::Char('P') => toggle(app, Sentiment::Positive),
        KeyCode::Char('N') => toggle(app, Sentiment::Negative),
        KeyCode::Char('U') => toggle(app, Sentiment::Neutral),
        KeyCode::Char('o') => app.input_mode = InputMode::SourcePicker(0),
        KeyCode::Char('T') => {
            if let Some(ticker) = app.news.selected_item().and_then(|item| item.ticker.clone()) {
                app.news.filters.toggle_ticker(&ticker);
                app.news.filters_changed();
            }
        }
        KeyCode::Char('d') => {
            if let Some(day) = app.news.selected_item().map(|item| item.published_at.date_naive()) {
                app.news.filters.toggle_day(day);
                app.news.filters_changed();
            }
        }
        KeyCode::Char('c') => {
            app.news.filters.clear();
            app.news.filters_changed();
        }
        KeyCode::Char('S') => return Action::ScrapeNews,
        KeyCode::Char('D') => {
            if let Some(id) = app.news.selected_item().map(|item| item.id.clone()) {
                app.input_mode = InputMode::ConfirmDeleteNews(id);
            }
        }
        KeyCode::Enter => {
            if let Some(ticker) = app.news.selected_item().and_then(|item| item.ticker.clone()) {
                return Action::OpenPrice(ticker);
            }
        }
        _ => {}
    }
    Action::None
}

/// Check if a point (x, y) is inside a Rect
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

pub fn handle_mouse(app: &mut App, kind: MouseEventKind, x: u16, y: u16) -> Action {
    if !matches!(kind, MouseEventKind::Down(MouseButton::Left)) {
        return Action::None;
    }

    if matches!(app.input_mode, InputMode::Help) {
        app.input_mode = InputMode::Normal;
        return Action::None;
    }
    if !matches!(app.input_mode, InputMode::Normal) {
        return Action::None;
    }

    let regions = &app.clickable_regions;

    for (rect, page) in &regions.tabs {
        if point_in_rect(x, y, *rect) {
            return Action::SwitchPage(*page);
        }
    }

    for (rect, page) in &regions.news_pages {
        if point_in_rect(x, y, *rect) {
            return Action::GoToNewsPage(*page);
        }
    }

    for (rect, column) in &regions.hot_headers {
        if point_in_rect(x, y, *rect) {
            return Action::SortHotList(*column);
        }
    }

    for (rect, row) in &regions.rows {
        if point_in_rect(x, y, *rect) {
            return Action::SelectRow(*row);
        }
    }

    for (panel, rect) in [(PRICE_PANEL, regions.price_plot), (VOLUME_PANEL, regions.volume_plot)] {
        if point_in_rect(x, y, rect) {
            let view = if panel == PRICE_PANEL { &app.price_view } else { &app.volume_view };
            let range = view.borrow().range;
            let column = (x - rect.x) as usize;
            return PriceChart::index_at(range, rect.width as usize, column)
                .map_or(Action::None, |index| Action::Crosshair { panel, index });
        }
    }

    for (rect, name) in &regions.footer_buttons {
        if point_in_rect(x, y, *rect) {
            return match *name {
                "live" => Action::ToggleLive,
                "refresh" => Action::Refresh,
                "help" => {
                    app.input_mode = InputMode::Help;
                    Action::None
                }
                "quit" => Action::Quit,
                _ => Action::None,
            };
        }
    }

    Action::None
}
