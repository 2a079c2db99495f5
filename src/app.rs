//! Application state and the glue between key presses, background fetches
//! and the page views.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use ratatui::layout::Rect;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::api::models::{
    BrokerSummary, Forecast, FlowSignal, RunningTrade, TickerSeries, VolumeSpike,
};
use crate::api::{ApiClient, NewsQuery};
use crate::chart::{ChartHost, ChartSync, PanelView, PriceChart, SyncEvent, VisibleRange, PRICE_PANEL, VOLUME_PANEL};
use crate::config::Config;
use crate::fetch::{ActionOutcome, FetchMessage, Fetcher, InputTracker, Resource};
use crate::filter::{DateRange, FilterState, TickerScope};
use crate::flow::{HotListSort, SortColumn};
use crate::news::NewsLibrary;
use crate::watchlist::{WatchlistState, STAGES};

/// Candles shown when the chart is first mounted, before the panel width is known.
const DEFAULT_VISIBLE_CANDLES: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Price,
    News,
    Flow,
    Tape,
    HotList,
    Watchlist,
    Forecast,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Price,
        Page::News,
        Page::Flow,
        Page::Tape,
        Page::HotList,
        Page::Watchlist,
        Page::Forecast,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Price => "Price",
            Self::News => "News",
            Self::Flow => "Broker Flow",
            Self::Tape => "Running Trade",
            Self::HotList => "Hot List",
            Self::Watchlist => "Watchlist",
            Self::Forecast => "Forecast",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }

    pub fn from_digit(digit: u32) -> Option<Self> {
        let idx = (digit as usize).checked_sub(1)?;
        Self::ALL.get(idx).copied()
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Pages that show nothing until a single ticker is chosen.
    pub fn needs_ticker(self) -> bool {
        matches!(self, Self::Price | Self::Forecast)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddWatchlistState {
    pub step: usize,
    pub ticker: String,
    pub stage: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    TickerInput(String),
    NewsSearch,
    /// Picking a news source to toggle; holds the highlighted index.
    SourcePicker(usize),
    AddWatchlist(AddWatchlistState),
    ConfirmRemove(String),
    ConfirmDeleteNews(String),
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub kind: BannerKind,
    pub shown_at: Instant,
}

/// Tracks clickable UI regions for mouse interaction
#[derive(Debug, Default, Clone)]
pub struct ClickableRegions {
    pub tabs: Vec<(Rect, Page)>,
    /// Pagination buttons: (rect, page number)
    pub news_pages: Vec<(Rect, u32)>,
    /// Table body rows: (rect, row index) for the active page
    pub rows: Vec<(Rect, usize)>,
    pub hot_headers: Vec<(Rect, SortColumn)>,
    /// Plot areas of the price and volume panels, without axis labels
    pub price_plot: Rect,
    pub volume_plot: Rect,
    pub footer_buttons: Vec<(Rect, &'static str)>,
}

pub enum Action {
    None,
    Quit,
    SwitchPage(Page),
    SetTicker(String),
    Refresh,
    ToggleLive,
    CyclePreset,
    ResetFilters,
    GoToNewsPage(u32),
    SortHotList(SortColumn),
    SelectRow(usize),
    OpenPrice(String),
    AddWatchlist { ticker: String, stage: String },
    RemoveWatchlist(String),
    DeleteNews(String),
    ScrapeNews,
    SyncPrices,
    Crosshair { panel: usize, index: usize },
}

/// Inputs of the last request issued by each page.
#[derive(Debug, Default)]
struct Trackers {
    price: InputTracker<(String, DateRange)>,
    news: InputTracker<NewsQuery>,
    news_sources: InputTracker<()>,
    broker: InputTracker<(NaiveDate, TickerScope)>,
    tape: InputTracker<TickerScope>,
    hot_list: InputTracker<DateRange>,
    forecast: InputTracker<String>,
    watchlist: InputTracker<()>,
}

pub struct App {
    pub config: Config,
    api: ApiClient,
    pub page: Page,
    pub filters: FilterState,
    pub input_mode: InputMode,
    today: NaiveDate,

    pub series: Resource<TickerSeries>,
    pub spikes: Resource<Vec<VolumeSpike>>,
    pub chart: ChartHost<PriceChart>,
    pub price_view: Rc<RefCell<PanelView>>,
    pub volume_view: Rc<RefCell<PanelView>>,
    sync: ChartSync,
    pub panels_linked: bool,
    chart_capacity: usize,

    pub news: NewsLibrary,
    pub broker: Resource<BrokerSummary>,
    pub tape: Resource<Vec<RunningTrade>>,
    pub hot_list: Resource<Vec<FlowSignal>>,
    pub hot_sort: HotListSort,
    pub hot_selected: usize,
    pub forecast: Resource<Forecast>,
    pub watchlist: WatchlistState,

    pub banner: Option<Banner>,
    pub live_mode: bool,
    last_live_refresh: Instant,
    pub clickable_regions: ClickableRegions,

    fetcher: Fetcher,
    receiver: UnboundedReceiver<FetchMessage>,
    trackers: Trackers,
}

impl App {
    pub fn new(config: Config, api: ApiClient, runtime: Handle, today: NaiveDate) -> Self {
        let (fetcher, receiver) = Fetcher::new(runtime);
        let price_view = PanelView::shared();
        let volume_view = PanelView::shared();
        let mut sync = ChartSync::default();
        sync.link(PRICE_PANEL, price_view.clone());
        sync.link(VOLUME_PANEL, volume_view.clone());

        Self {
            filters: FilterState::new(config.default_range_days, today),
            news: NewsLibrary::new(config.news_page_size, config.search_debounce),
            config,
            api,
            page: Page::Price,
            input_mode: InputMode::Normal,
            today,
            series: Resource::default(),
            spikes: Resource::default(),
            chart: ChartHost::default(),
            price_view,
            volume_view,
            sync,
            panels_linked: true,
            chart_capacity: DEFAULT_VISIBLE_CANDLES,
            broker: Resource::default(),
            tape: Resource::default(),
            hot_list: Resource::default(),
            hot_sort: HotListSort::default(),
            hot_selected: 0,
            forecast: Resource::default(),
            watchlist: WatchlistState::default(),
            banner: None,
            live_mode: false,
            last_live_refresh: Instant::now(),
            clickable_regions: ClickableRegions::default(),
            fetcher,
            receiver,
            trackers: Trackers::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    /// The selected ticker, when the scope is a single symbol.
    pub fn ticker(&self) -> Option<&str> {
        self.filters.ticker.as_param()
    }

    // ---- fetching -------------------------------------------------------

    /// Issue the requests the active page needs, once per change of inputs.
    pub fn sync_fetches(&mut self) {
        match self.page {
            Page::Price => self.sync_price(),
            Page::News => self.sync_news(),
            Page::Flow => self.sync_broker(),
            Page::Tape => self.sync_tape(),
            Page::HotList => self.sync_hot_list(),
            Page::Watchlist => self.sync_watchlist(),
            Page::Forecast => {
                self.sync_price();
                self.sync_forecast();
            }
        }
    }

    fn sync_price(&mut self) {
        let Some(ticker) = self.ticker().map(String::from) else {
            return;
        };
        let range = self.filters.range;
        if !self.trackers.price.changed((ticker.clone(), range)) {
            return;
        }
        self.series.begin();
        self.spikes.clear();
        self.spikes.begin();

        let api = self.api.clone();
        let symbol = ticker.clone();
        self.fetcher.spawn("price", async move {
            FetchMessage::Series(api.price_series(&symbol, &range).await)
        });

        let api = self.api.clone();
        let ratio = self.config.spike_ratio;
        self.fetcher.spawn("spikes", async move {
            FetchMessage::Spikes(api.volume_spikes(&ticker, &range, ratio).await)
        });
    }

    fn sync_news(&mut self) {
        if self.trackers.news_sources.changed(()) {
            self.news.sources.begin();
            let api = self.api.clone();
            self.fetcher.spawn("news sources", async move {
                FetchMessage::NewsSources(api.news_sources().await)
            });
        }

        let query = self.news.query(&self.filters);
        if !self.trackers.news.changed(query.clone()) {
            return;
        }
        self.news.results.begin();
        let api = self.api.clone();
        self.fetcher.spawn("news", async move { FetchMessage::News(api.news(&query).await) });
    }

    fn sync_broker(&mut self) {
        // Broker summaries are daily; the range end picks the day.
        let date = self.filters.range.end;
        let scope = self.filters.ticker.clone();
        if !self.trackers.broker.changed((date, scope.clone())) {
            return;
        }
        self.broker.begin();
        let api = self.api.clone();
        self.fetcher.spawn("broker summary", async move {
            FetchMessage::BrokerSummary(api.broker_summary(date, &scope).await)
        });
    }

    fn sync_tape(&mut self) {
        let scope = self.filters.ticker.clone();
        if !self.trackers.tape.changed(scope.clone()) {
            return;
        }
        self.tape.begin();
        let api = self.api.clone();
        let limit = self.config.trade_tape_limit;
        self.fetcher.spawn("running trade", async move {
            FetchMessage::RunningTrade(api.running_trade(&scope, limit).await)
        });
    }

    fn sync_hot_list(&mut self) {
        let range = self.filters.range;
        if !self.trackers.hot_list.changed(range) {
            return;
        }
        self.hot_list.begin();
        let api = self.api.clone();
        let limit = self.config.hot_list_limit;
        self.fetcher.spawn("hot list", async move {
            FetchMessage::HotList(api.hot_list(limit, Some(&range)).await)
        });
    }

    fn sync_forecast(&mut self) {
        let Some(ticker) = self.ticker().map(String::from) else {
            return;
        };
        if !self.trackers.forecast.changed(ticker.clone()) {
            return;
        }
        self.forecast.begin();
        let api = self.api.clone();
        let horizon = self.config.forecast_horizon;
        self.fetcher.spawn("forecast", async move {
            FetchMessage::Forecast(api.forecast(&ticker, horizon).await)
        });
    }

    fn sync_watchlist(&mut self) {
        if !self.trackers.watchlist.changed(()) {
            return;
        }
        self.watchlist.entries.begin();
        let api = self.api.clone();
        self.fetcher.spawn("watchlist", async move {
            FetchMessage::Watchlist(api.watchlist().await)
        });
    }

    /// Forget the inputs of the active page so the next sync refetches it.
    fn invalidate_page(&mut self) {
        let t = &mut self.trackers;
        match self.page {
            Page::Price => t.price.invalidate(),
            Page::News => {
                t.news.invalidate();
                t.news_sources.invalidate();
            }
            Page::Flow => t.broker.invalidate(),
            Page::Tape => t.tape.invalidate(),
            Page::HotList => t.hot_list.invalidate(),
            Page::Watchlist => t.watchlist.invalidate(),
            Page::Forecast => {
                t.price.invalidate();
                t.forecast.invalidate();
            }
        }
    }

    pub fn refresh(&mut self) {
        info!("manual refresh of {}", self.page.title());
        self.invalidate_page();
        self.sync_fetches();
    }

    /// Drain every message the fetch tasks have sent so far.
    pub fn process_messages(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.apply_message(message);
            handled += 1;
        }
        handled
    }

    fn apply_message(&mut self, message: FetchMessage) {
        match message {
            FetchMessage::Series(Ok(series)) => {
                debug!("series {} with {} candles", series.ticker, series.candles.len());
                if self.page == Page::Price && self.series_in_scope(&series) {
                    self.mount_chart(&series);
                }
                self.series.succeed(series);
            }
            FetchMessage::Series(Err(err)) => {
                warn!("series fetch failed: {}", err);
                self.series.fail(err);
            }
            FetchMessage::Spikes(result) => {
                if let (Ok(spikes), Some(chart)) = (&result, self.chart.get_mut()) {
                    chart.mark_spikes(spikes);
                }
                self.spikes.settle(result);
            }
            FetchMessage::News(result) => {
                self.news.results.settle(result);
                let len = self.news.visible().len();
                self.news.selected = self.news.selected.min(len.saturating_sub(1));
            }
            FetchMessage::NewsSources(result) => self.news.sources.settle(result),
            FetchMessage::BrokerSummary(result) => self.broker.settle(result),
            FetchMessage::RunningTrade(result) => self.tape.settle(result),
            FetchMessage::HotList(result) => {
                self.hot_list.settle(result);
                let len = self.hot_list.get().map_or(0, Vec::len);
                self.hot_selected = self.hot_selected.min(len.saturating_sub(1));
            }
            FetchMessage::Forecast(result) => self.forecast.settle(result),
            FetchMessage::Watchlist(Ok(entries)) => self.watchlist.load(entries),
            FetchMessage::Watchlist(Err(err)) => self.watchlist.entries.fail(err),
            FetchMessage::Action(outcome) => self.apply_outcome(outcome),
        }
    }

    fn apply_outcome(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::WatchlistAdded(Ok(entry)) => {
                let text = format!("Added {} to watchlist ({})", entry.ticker, entry.stage);
                self.watchlist.apply_added(entry);
                self.notify(BannerKind::Success, text);
            }
            ActionOutcome::WatchlistAdded(Err(err)) => {
                self.notify(BannerKind::Error, format!("Add to watchlist failed: {}", err));
            }
            ActionOutcome::WatchlistRemoved { ticker, result: Ok(_) } => {
                self.watchlist.apply_removed(&ticker);
                self.notify(BannerKind::Success, format!("Removed {} from watchlist", ticker));
            }
            ActionOutcome::WatchlistRemoved { ticker, result: Err(err) } => {
                self.notify(BannerKind::Error, format!("Remove {} failed: {}", ticker, err));
            }
            ActionOutcome::Scrape(Ok(status)) => {
                self.notify(BannerKind::Info, format!("Scrape {}", status.describe()));
            }
            ActionOutcome::Scrape(Err(err)) => {
                self.notify(BannerKind::Error, format!("Scrape failed: {}", err));
            }
            ActionOutcome::Sync { ticker, result: Ok(status) } => {
                self.notify(BannerKind::Success, format!("{} sync {}", ticker, status.describe()));
                if self.ticker() == Some(ticker.as_str()) {
                    self.trackers.price.invalidate();
                    if self.page.needs_ticker() {
                        self.sync_fetches();
                    }
                }
            }
            ActionOutcome::Sync { ticker, result: Err(err) } => {
                self.notify(BannerKind::Error, format!("{} sync failed: {}", ticker, err));
            }
            ActionOutcome::NewsDeleted { id, result: Ok(_) } => {
                self.news.remove_item(&id);
                self.notify(BannerKind::Success, "News item deleted".to_string());
            }
            ActionOutcome::NewsDeleted { result: Err(err), .. } => {
                self.notify(BannerKind::Error, format!("Delete failed: {}", err));
            }
        }
    }

    // ---- banners and timers ---------------------------------------------

    pub fn notify(&mut self, kind: BannerKind, text: String) {
        match kind {
            BannerKind::Error => warn!("{}", text),
            _ => info!("{}", text),
        }
        self.banner = Some(Banner {
            text,
            kind,
            shown_at: Instant::now(),
        });
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Timer work for one loop iteration: banner expiry, debounced search,
    /// live refresh and any fetches the current inputs call for.
    pub fn tick(&mut self, now: Instant) {
        if let Some(banner) = &self.banner {
            if now.saturating_duration_since(banner.shown_at) >= self.config.banner_ttl {
                self.banner = None;
            }
        }

        self.news.poll_debounce(now);

        if let (true, Some(every)) = (self.live_mode, self.config.live_refresh) {
            if matches!(self.input_mode, InputMode::Normal)
                && now.saturating_duration_since(self.last_live_refresh) >= every
            {
                self.last_live_refresh = now;
                debug!("live refresh of {}", self.page.title());
                self.invalidate_page();
            }
        }

        self.sync_fetches();
    }

    pub fn toggle_live(&mut self) {
        if self.config.live_refresh.is_none() {
            self.notify(BannerKind::Info, "Live refresh is disabled in config".to_string());
            return;
        }
        self.live_mode = !self.live_mode;
        self.last_live_refresh = Instant::now();
    }

    pub fn live_interval(&self) -> Option<Duration> {
        self.config.live_refresh
    }

    // ---- filters --------------------------------------------------------

    pub fn set_ticker(&mut self, input: &str) {
        let before = self.filters.ticker.clone();
        self.filters.set_ticker(input);
        if self.filters.ticker != before {
            self.chart.unmount();
        }
        self.news.filters_changed();
        debug!("ticker scope is now {}", self.filters.ticker);
    }

    pub fn cycle_preset(&mut self) {
        let preset = self.filters.cycle_preset();
        self.news.filters_changed();
        self.notify(BannerKind::Info, format!("Range {} ({})", preset.label(), self.filters.range));
    }

    pub fn reset_filters(&mut self) {
        let before = self.filters.ticker.clone();
        self.filters.reset(self.today);
        if self.filters.ticker != before {
            self.chart.unmount();
        }
        self.news.filters.clear();
        self.news.filters_changed();
    }

    /// The chart lives only while the price page is shown; coming back
    /// remounts it from the cached series when that still matches the scope.
    pub fn switch_page(&mut self, page: Page) {
        self.page = page;
        if page == Page::Price {
            self.remount_chart();
        } else {
            self.chart.unmount();
        }
        self.sync_fetches();
    }

    // ---- chart ----------------------------------------------------------

    fn series_in_scope(&self, series: &TickerSeries) -> bool {
        self.ticker().is_some_and(|ticker| ticker.eq_ignore_ascii_case(&series.ticker))
    }

    fn remount_chart(&mut self) {
        if self.chart.is_mounted() {
            return;
        }
        let cached = self.series.get().filter(|series| self.series_in_scope(series)).cloned();
        if let Some(series) = cached {
            self.mount_chart(&series);
        }
    }

    fn mount_chart(&mut self, series: &TickerSeries) {
        let mut chart = PriceChart::new(series);
        if let Some(spikes) = self.spikes.get() {
            chart.mark_spikes(spikes);
        }
        let total = chart.len();
        self.chart.mount(chart);
        let range = VisibleRange::tail(total, self.chart_capacity);
        *self.price_view.borrow_mut() = PanelView::default();
        *self.volume_view.borrow_mut() = PanelView::default();
        self.set_range(PRICE_PANEL, range);
        self.volume_view.borrow_mut().apply(&SyncEvent::Range(range));
    }

    fn view_of(&self, panel: usize) -> &Rc<RefCell<PanelView>> {
        if panel == VOLUME_PANEL {
            &self.volume_view
        } else {
            &self.price_view
        }
    }

    /// Apply an event to `panel` and forward it to the linked panels.
    fn emit(&mut self, panel: usize, event: SyncEvent) {
        self.view_of(panel).borrow_mut().apply(&event);
        self.sync.publish(panel, event);
    }

    fn set_range(&mut self, panel: usize, range: VisibleRange) {
        self.emit(panel, SyncEvent::Range(range));
    }

    fn chart_len(&self) -> usize {
        self.chart.get().map_or(0, PriceChart::len)
    }

    pub fn pan_chart(&mut self, delta: isize) {
        let total = self.chart_len();
        let range = self.price_view.borrow().range.pan(delta, total);
        self.set_range(PRICE_PANEL, range);
    }

    pub fn zoom_chart(&mut self, delta: isize) {
        let total = self.chart_len();
        let range = self.price_view.borrow().range.zoom(delta, total, self.chart_capacity);
        self.set_range(PRICE_PANEL, range);
    }

    pub fn move_crosshair(&mut self, delta: isize) {
        let view = *self.price_view.borrow();
        if view.range.is_empty() {
            return;
        }
        let last = view.range.to - 1;
        let index = match view.crosshair {
            Some(i) => (i as isize + delta).clamp(view.range.from as isize, last as isize) as usize,
            None if delta < 0 => last,
            None => view.range.from,
        };
        self.emit(PRICE_PANEL, SyncEvent::Crosshair(Some(index)));
    }

    pub fn set_crosshair(&mut self, panel: usize, index: Option<usize>) {
        self.emit(panel, SyncEvent::Crosshair(index));
    }

    /// Link or unlink the volume panel from the price panel.
    pub fn toggle_panel_link(&mut self) {
        if self.panels_linked {
            self.sync.unsubscribe(VOLUME_PANEL);
            self.sync.unsubscribe(PRICE_PANEL);
        } else {
            self.sync.link(PRICE_PANEL, self.price_view.clone());
            self.sync.link(VOLUME_PANEL, self.volume_view.clone());
            let view = *self.price_view.borrow();
            *self.volume_view.borrow_mut() = view;
        }
        self.panels_linked = !self.panels_linked;
    }

    /// Called by the renderer with the number of candles the panel can show.
    pub fn set_chart_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.chart_capacity {
            return;
        }
        self.chart_capacity = capacity;
        let total = self.chart_len();
        let range = self.price_view.borrow().range.fit(total, capacity);
        self.set_range(PRICE_PANEL, range);
        if !self.panels_linked {
            let volume = self.volume_view.borrow().range.fit(total, capacity);
            self.set_range(VOLUME_PANEL, volume);
        }
    }

    // ---- selections -----------------------------------------------------

    pub fn hot_rows(&self) -> Vec<&FlowSignal> {
        self.hot_list
            .get()
            .map(|signals| self.hot_sort.apply(signals))
            .unwrap_or_default()
    }

    pub fn selected_hot(&self) -> Option<&FlowSignal> {
        self.hot_rows().get(self.hot_selected).copied()
    }

    pub fn select_next(&mut self) {
        match self.page {
            Page::News => self.news.select_next(),
            Page::HotList => {
                let len = self.hot_rows().len();
                if len > 0 {
                    self.hot_selected = (self.hot_selected + 1).min(len - 1);
                }
            }
            Page::Watchlist => self.watchlist.select_next(),
            _ => {}
        }
    }

    pub fn select_prev(&mut self) {
        match self.page {
            Page::News => self.news.select_prev(),
            Page::HotList => self.hot_selected = self.hot_selected.saturating_sub(1),
            Page::Watchlist => self.watchlist.select_prev(),
            _ => {}
        }
    }

    pub fn select_row(&mut self, index: usize) {
        match self.page {
            Page::News => self.news.selected = index,
            Page::HotList => self.hot_selected = index,
            Page::Watchlist => {
                self.watchlist.selected = self.watchlist.rows().get(index).map(|e| e.ticker.clone());
            }
            _ => {}
        }
    }

    pub fn toggle_hot_sort(&mut self, column: SortColumn) {
        self.hot_sort.toggle(column);
        self.hot_selected = 0;
    }

    /// Source names offered by the picker: backend list, else those on the page.
    pub fn source_options(&self) -> Vec<String> {
        if let Some(sources) = self.news.sources.get().filter(|s| !s.is_empty()) {
            return sources.clone();
        }
        let mut names: Vec<String> = self
            .news
            .results
            .get()
            .map(|page| page.items.iter().map(|i| i.source.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names.dedup();
        names
    }

    // ---- actions --------------------------------------------------------

    pub fn add_watchlist(&mut self, ticker: String, stage: String) {
        let api = self.api.clone();
        self.fetcher.spawn("add watchlist", async move {
            FetchMessage::Action(ActionOutcome::WatchlistAdded(api.add_watchlist(&ticker, &stage).await))
        });
    }

    pub fn remove_watchlist(&mut self, ticker: String) {
        let api = self.api.clone();
        self.fetcher.spawn("remove watchlist", async move {
            let result = api.remove_watchlist(&ticker).await;
            FetchMessage::Action(ActionOutcome::WatchlistRemoved { ticker, result })
        });
    }

    pub fn scrape_news(&mut self) {
        let api = self.api.clone();
        let scope = self.filters.ticker.clone();
        self.notify(BannerKind::Info, format!("Requesting news scrape for {}", scope));
        self.fetcher.spawn("scrape", async move {
            FetchMessage::Action(ActionOutcome::Scrape(api.scrape_news(&scope).await))
        });
    }

    pub fn delete_news(&mut self, id: String) {
        let api = self.api.clone();
        self.fetcher.spawn("delete news", async move {
            let result = api.delete_news(&id).await;
            FetchMessage::Action(ActionOutcome::NewsDeleted { id, result })
        });
    }

    pub fn sync_prices(&mut self) {
        let Some(ticker) = self.ticker().map(String::from) else {
            self.notify(BannerKind::Info, "Select a ticker to sync prices".to_string());
            return;
        };
        let api = self.api.clone();
        let range = self.filters.range;
        self.notify(BannerKind::Info, format!("Syncing {} prices", ticker));
        self.fetcher.spawn("sync prices", async move {
            let result = api.sync_prices(&ticker, &range).await;
            FetchMessage::Action(ActionOutcome::Sync { ticker, result })
        });
    }

    /// Applies an action produced by the input handlers. Returns false on quit.
    pub fn dispatch(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return false,
            Action::None => {}
            Action::SwitchPage(page) => self.switch_page(page),
            Action::SetTicker(input) => {
                self.set_ticker(&input);
                self.input_mode = InputMode::Normal;
            }
            Action::Refresh => self.refresh(),
            Action::ToggleLive => self.toggle_live(),
            Action::CyclePreset => self.cycle_preset(),
            Action::ResetFilters => self.reset_filters(),
            Action::GoToNewsPage(page) => {
                self.news.go_to_page(page);
            }
            Action::SortHotList(column) => self.toggle_hot_sort(column),
            Action::SelectRow(index) => self.select_row(index),
            Action::OpenPrice(ticker) => {
                self.set_ticker(&ticker);
                self.switch_page(Page::Price);
            }
            Action::AddWatchlist { ticker, stage } => {
                self.input_mode = InputMode::Normal;
                self.add_watchlist(ticker, stage);
            }
            Action::RemoveWatchlist(ticker) => {
                self.input_mode = InputMode::Normal;
                self.remove_watchlist(ticker);
            }
            Action::DeleteNews(id) => {
                self.input_mode = InputMode::Normal;
                self.delete_news(id);
            }
            Action::ScrapeNews => self.scrape_news(),
            Action::SyncPrices => self.sync_prices(),
            Action::Crosshair { panel, index } => self.set_crosshair(panel, Some(index)),
        }
        true
    }

    /// Stage names offered by the add dialog.
    pub fn stages() -> &'static [&'static str] {
        &STAGES
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::tests::ScriptedTransport;
    use crate::api::transport::Response;
    use crate::error::ApiError;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    fn app_with(transport: &Arc<ScriptedTransport>) -> App {
        let api = ApiClient::new("http://backend", transport.clone());
        App::new(Config::default(), api, Handle::current(), today())
    }

    /// Wait for `n` fetch messages and apply them.
    async fn settle(app: &mut App, n: usize) {
        for _ in 0..n {
            let message = app.receiver.recv().await.expect("channel closed");
            app.apply_message(message);
        }
    }

    fn requests(transport: &ScriptedTransport) -> usize {
        transport.requests.lock().unwrap().len()
    }

    const WATCHLIST: &str = r#"[{"ticker":"BBCA","stage":"watch"},{"ticker":"TLKM","stage":"markup"}]"#;

    #[tokio::test]
    async fn empty_ticker_requests_unscoped_data() {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok("[]"))]);
        let mut app = app_with(&transport);
        app.dispatch(Action::SetTicker("   ".into()));
        app.dispatch(Action::SwitchPage(Page::Tape));
        settle(&mut app, 1).await;

        let request = transport.last_request();
        assert!(request.url.ends_with("/api/running-trade"));
        assert_eq!(request.query_value("ticker"), None);
        assert_eq!(app.tape.get().map(Vec::len), Some(0));
        assert!(!app.tape.loading);
    }

    #[tokio::test]
    async fn one_fetch_per_input_change() {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok("[]")), Ok(Response::ok("[]"))]);
        let mut app = app_with(&transport);
        app.switch_page(Page::HotList);
        app.sync_fetches();
        app.sync_fetches();
        settle(&mut app, 1).await;
        assert_eq!(requests(&transport), 1);

        app.cycle_preset();
        app.sync_fetches();
        settle(&mut app, 1).await;
        assert_eq!(requests(&transport), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_rows() {
        let transport = ScriptedTransport::with(vec![
            Ok(Response::ok(r#"[{"ticker":"ADRO","score":80.0,"strength":0.7}]"#)),
            Err(ApiError::Transport("connection refused".into())),
        ]);
        let mut app = app_with(&transport);
        app.switch_page(Page::HotList);
        settle(&mut app, 1).await;
        app.refresh();
        assert!(app.hot_list.loading);
        settle(&mut app, 1).await;

        assert_eq!(app.hot_list.get().map(Vec::len), Some(1));
        assert_eq!(app.hot_list.error.as_deref(), Some("network error: connection refused"));
        assert!(!app.hot_list.loading);
    }

    #[tokio::test]
    async fn removing_selected_watchlist_entry_clears_selection() {
        let transport = ScriptedTransport::with(vec![
            Ok(Response::ok(WATCHLIST)),
            Ok(Response::ok(r#"{"status":"removed"}"#)),
        ]);
        let mut app = app_with(&transport);
        app.switch_page(Page::Watchlist);
        settle(&mut app, 1).await;
        app.select_next();
        app.select_next();
        assert_eq!(app.watchlist.selected.as_deref(), Some("TLKM"));

        app.dispatch(Action::RemoveWatchlist("TLKM".into()));
        settle(&mut app, 1).await;

        assert_eq!(app.watchlist.selected, None);
        assert_eq!(app.watchlist.rows().len(), 1);
        assert!(transport.last_request().url.ends_with("/api/watchlist/TLKM/remove"));
        assert_eq!(app.banner.as_ref().map(|b| b.kind), Some(BannerKind::Success));
    }

    #[tokio::test]
    async fn failed_remove_changes_nothing() {
        let transport = ScriptedTransport::with(vec![
            Ok(Response::ok(WATCHLIST)),
            Ok(Response {
                status: 500,
                body: r#"{"detail":"database locked"}"#.into(),
            }),
        ]);
        let mut app = app_with(&transport);
        app.switch_page(Page::Watchlist);
        settle(&mut app, 1).await;
        app.select_next();

        app.dispatch(Action::RemoveWatchlist("BBCA".into()));
        settle(&mut app, 1).await;

        assert_eq!(app.watchlist.rows().len(), 2);
        assert_eq!(app.watchlist.selected.as_deref(), Some("BBCA"));
        let banner = app.banner.as_ref().unwrap();
        assert_eq!(banner.kind, BannerKind::Error);
        assert!(banner.text.contains("database locked"));
    }

    #[tokio::test]
    async fn price_page_waits_for_a_ticker() {
        let transport = ScriptedTransport::with(vec![]);
        let mut app = app_with(&transport);
        app.switch_page(Page::Price);
        app.switch_page(Page::Forecast);
        assert_eq!(requests(&transport), 0);
        assert!(!app.series.loading);
    }

    const SERIES: &str = r#"{"ticker":"BBCA","candles":[
        {"time":"2024-06-24","open":100,"high":110,"low":95,"close":108,"volume":1000},
        {"time":"2024-06-25","open":108,"high":112,"low":100,"close":102,"volume":4000},
        {"time":"2024-06-26","open":102,"high":104,"low":90,"close":92,"volume":2000},
        {"time":"2024-06-27","open":92,"high":99,"low":91,"close":97,"volume":1500},
        {"time":"2024-06-28","open":97,"high":101,"low":96,"close":100,"volume":1200},
        {"time":"2024-07-01","open":100,"high":103,"low":98,"close":99,"volume":900},
        {"time":"2024-07-02","open":99,"high":105,"low":97,"close":104,"volume":1800}]}"#;
    const SPIKES: &str = r#"[{"time":"2024-06-25","volume":4000,"median":1500,"ratio":2.67}]"#;

    async fn price_app() -> (App, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok(SERIES)), Ok(Response::ok(SPIKES))]);
        let mut app = app_with(&transport);
        app.set_ticker("bbca");
        app.switch_page(Page::Price);
        settle(&mut app, 2).await;
        (app, transport)
    }

    #[tokio::test]
    async fn series_mounts_one_chart_with_spikes() {
        let (mut app, transport) = price_app().await;
        assert_eq!(transport.last_request().query_value("ratio"), Some("2"));
        assert_eq!(app.chart.live(), 1);
        let chart = app.chart.get().unwrap();
        assert_eq!(chart.len(), 7);
        assert!(chart.is_spike(1));
        assert_eq!(app.price_view.borrow().range, VisibleRange { from: 0, to: 7 });

        transport.responses.lock().unwrap().push_back(Ok(Response::ok(SERIES)));
        app.refresh();
        settle(&mut app, 2).await;
        assert_eq!(app.chart.live(), 1);
    }

    #[tokio::test]
    async fn clearing_ticker_tears_down_chart() {
        let (mut app, _transport) = price_app().await;
        app.dispatch(Action::SetTicker(String::new()));
        assert_eq!(app.chart.live(), 0);
        assert!(!app.chart.is_mounted());
    }

    #[tokio::test]
    async fn leaving_price_page_tears_down_and_return_remounts() {
        let (mut app, _transport) = price_app().await;
        app.dispatch(Action::SwitchPage(Page::News));
        assert_eq!(app.chart.live(), 0);

        // Same scope and range: the cached series is drawn again without a refetch.
        app.dispatch(Action::SwitchPage(Page::Price));
        assert_eq!(app.chart.live(), 1);
        assert!(!app.series.loading);
        assert_eq!(app.chart.get().map(PriceChart::len), Some(7));
    }

    #[tokio::test]
    async fn failed_series_for_new_ticker_shows_no_stale_chart() {
        let (mut app, transport) = price_app().await;
        {
            let mut responses = transport.responses.lock().unwrap();
            responses.push_back(Err(ApiError::Transport("connection refused".into())));
            responses.push_back(Err(ApiError::Transport("connection refused".into())));
        }
        app.set_ticker("tlkm");
        assert!(!app.chart.is_mounted());
        app.sync_fetches();
        settle(&mut app, 2).await;
        assert!(app.series.error.is_some());
        assert_eq!(app.chart.live(), 0);
    }

    #[tokio::test]
    async fn linked_panels_follow_each_other() {
        let (mut app, _transport) = price_app().await;
        app.set_chart_capacity(5);
        assert_eq!(app.price_view.borrow().range, VisibleRange { from: 2, to: 7 });
        assert_eq!(app.volume_view.borrow().range, app.price_view.borrow().range);

        app.pan_chart(-1);
        assert_eq!(app.volume_view.borrow().range, VisibleRange { from: 1, to: 6 });

        app.set_crosshair(VOLUME_PANEL, Some(3));
        assert_eq!(app.price_view.borrow().crosshair, Some(3));

        app.toggle_panel_link();
        app.pan_chart(-1);
        assert_eq!(app.price_view.borrow().range, VisibleRange { from: 0, to: 5 });
        assert_eq!(app.volume_view.borrow().range, VisibleRange { from: 1, to: 6 });

        app.toggle_panel_link();
        assert_eq!(app.volume_view.borrow().range, VisibleRange { from: 0, to: 5 });
    }

    #[tokio::test]
    async fn banner_expires_after_ttl() {
        let transport = ScriptedTransport::with(vec![]);
        let mut app = app_with(&transport);
        app.notify(BannerKind::Info, "hello".into());
        let shown = app.banner.as_ref().unwrap().shown_at;

        app.tick(shown + Duration::from_secs(1));
        assert!(app.banner.is_some());
        app.tick(shown + app.config.banner_ttl);
        assert!(app.banner.is_none());
    }

    #[tokio::test]
    async fn news_search_fetches_after_debounce() {
        let page = r#"{"items":[],"total":0,"page":1,"page_size":20}"#;
        let transport = ScriptedTransport::with(vec![
            Ok(Response::ok(r#"["kontan"]"#)),
            Ok(Response::ok(page)),
            Ok(Response::ok(page)),
        ]);
        let mut app = app_with(&transport);
        app.switch_page(Page::News);
        settle(&mut app, 2).await;
        assert_eq!(requests(&transport), 2);

        let start = Instant::now();
        for c in "divid".chars() {
            app.news.type_char(c, start);
        }
        app.tick(start + Duration::from_millis(100));
        assert_eq!(requests(&transport), 2);

        app.tick(start + app.config.search_debounce);
        settle(&mut app, 1).await;
        assert_eq!(requests(&transport), 3);
        assert_eq!(transport.last_request().query_value("q"), Some("divid"));
    }

    #[tokio::test]
    async fn sync_action_refetches_price() {
        let (mut app, transport) = price_app().await;
        transport
            .responses
            .lock()
            .unwrap()
            .push_back(Ok(Response::ok(r#"{"status":"synced"}"#)));
        app.dispatch(Action::SyncPrices);
        settle(&mut app, 1).await;
        assert_eq!(requests(&transport), 3);
        // Sync success invalidates the price inputs: series and spikes again.
        settle(&mut app, 2).await;
        assert_eq!(requests(&transport), 5);
        assert_eq!(app.banner.as_ref().map(|b| b.kind), Some(BannerKind::Success));
    }
}
