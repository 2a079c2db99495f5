//! News library: server-side paging plus client-side filter toggles and a
//! debounced search box.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::api::models::{NewsItem, NewsPage, Sentiment};
use crate::api::NewsQuery;
use crate::fetch::{Debouncer, Resource};
use crate::filter::{DateRange, FilterState};
use crate::pagination::{self, PageItem};

/// Multi-select filters applied to the fetched page. An empty set places no
/// constraint on its dimension; active dimensions combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsFilters {
    pub sentiments: BTreeSet<Sentiment>,
    pub sources: BTreeSet<String>,
    pub tickers: BTreeSet<String>,
    pub range: Option<DateRange>,
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

impl NewsFilters {
    pub fn toggle_sentiment(&mut self, sentiment: Sentiment) {
        toggle(&mut self.sentiments, sentiment);
    }

    pub fn toggle_source(&mut self, source: &str) {
        toggle(&mut self.sources, source.to_string());
    }

    pub fn toggle_ticker(&mut self, ticker: &str) {
        toggle(&mut self.tickers, ticker.to_uppercase());
    }

    /// Narrow to a single publish day, or drop the day filter when that
    /// day is already the one selected.
    pub fn toggle_day(&mut self, day: NaiveDate) {
        let only_day = DateRange::new(day, day);
        self.range = if self.range == Some(only_day) { None } else { Some(only_day) };
    }

    pub fn is_empty(&self) -> bool {
        self.sentiments.is_empty() && self.sources.is_empty() && self.tickers.is_empty() && self.range.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, item: &NewsItem) -> bool {
        if !self.sentiments.is_empty() && !self.sentiments.contains(&item.sentiment) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(&item.source) {
            return false;
        }
        if !self.tickers.is_empty() {
            let Some(ticker) = &item.ticker else {
                return false;
            };
            if !self.tickers.contains(&ticker.to_uppercase()) {
                return false;
            }
        }
        if let Some(range) = &self.range {
            if !range.contains(item.published_at.date_naive()) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, items: &'a [NewsItem]) -> Vec<&'a NewsItem> {
        items.iter().filter(|item| self.matches(item)).collect()
    }

    /// The one selected value of a dimension, if exactly one is selected;
    /// such a filter can be pushed down to the server.
    fn single<T: Clone>(set: &BTreeSet<T>) -> Option<T> {
        if set.len() == 1 {
            set.iter().next().cloned()
        } else {
            None
        }
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.sentiments.is_empty() {
            let s: Vec<_> = self.sentiments.iter().map(|s| s.as_param()).collect();
            parts.push(format!("sentiment={}", s.join("|")));
        }
        if !self.sources.is_empty() {
            let s: Vec<_> = self.sources.iter().map(String::as_str).collect();
            parts.push(format!("source={}", s.join("|")));
        }
        if !self.tickers.is_empty() {
            let s: Vec<_> = self.tickers.iter().map(String::as_str).collect();
            parts.push(format!("ticker={}", s.join("|")));
        }
        if let Some(range) = &self.range {
            if range.days() == 1 {
                parts.push(format!("date={}", range.start_param()));
            } else {
                parts.push(format!("date={range}"));
            }
        }
        if parts.is_empty() {
            String::from("none")
        } else {
            parts.join("  ")
        }
    }
}

/// Counts per sentiment in the currently visible rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentBreakdown {
    pub fn of<'a>(items: impl IntoIterator<Item = &'a NewsItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut acc, item| {
            match item.sentiment {
                Sentiment::Positive => acc.positive += 1,
                Sentiment::Neutral => acc.neutral += 1,
                Sentiment::Negative => acc.negative += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }
}

#[derive(Debug, Clone)]
pub struct NewsLibrary {
    pub page: u32,
    pub page_size: u32,
    pub results: Resource<NewsPage>,
    pub sources: Resource<Vec<String>>,
    pub filters: NewsFilters,
    /// Text being typed into the search box.
    pub search_input: String,
    /// Search text that has settled past the debounce delay.
    pub search: String,
    pub selected: usize,
    debounce: Debouncer,
}

impl NewsLibrary {
    pub fn new(page_size: u32, debounce: Duration) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            results: Resource::default(),
            sources: Resource::default(),
            filters: NewsFilters::default(),
            search_input: String::new(),
            search: String::new(),
            selected: 0,
            debounce: Debouncer::new(debounce),
        }
    }

    /// Server request for the current inputs.
    pub fn query(&self, global: &FilterState) -> NewsQuery {
        NewsQuery {
            page: self.page,
            page_size: self.page_size,
            ticker: global.ticker.clone(),
            sentiment: NewsFilters::single(&self.filters.sentiments),
            source: NewsFilters::single(&self.filters.sources),
            range: Some(global.range),
            search: Some(self.search.clone()).filter(|s| !s.is_empty()),
        }
    }

    pub fn type_char(&mut self, c: char, now: Instant) {
        self.search_input.push(c);
        self.debounce.touch(now);
    }

    pub fn backspace(&mut self, now: Instant) {
        if self.search_input.pop().is_some() {
            self.debounce.touch(now);
        }
    }

    /// Commit the search text immediately (Enter).
    pub fn commit_search(&mut self) -> bool {
        self.debounce.cancel();
        self.settle_search()
    }

    /// Promotes the typed text to the active search once the delay passed.
    /// Returns true when the active search changed.
    pub fn poll_debounce(&mut self, now: Instant) -> bool {
        if self.debounce.fire(now) {
            return self.settle_search();
        }
        false
    }

    pub fn search_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    fn settle_search(&mut self) -> bool {
        let next = self.search_input.trim().to_string();
        if next == self.search {
            return false;
        }
        self.search = next;
        self.page = 1;
        self.selected = 0;
        true
    }

    pub fn visible(&self) -> Vec<&NewsItem> {
        self.results
            .get()
            .map(|page| self.filters.apply(&page.items))
            .unwrap_or_default()
    }

    pub fn selected_item(&self) -> Option<&NewsItem> {
        self.visible().get(self.selected).copied()
    }

    pub fn total_pages(&self) -> u32 {
        self.results
            .get()
            .map(|page| pagination::total_pages(page.total, self.page_size))
            .unwrap_or(0)
    }

    pub fn page_window(&self) -> Vec<PageItem> {
        pagination::page_window(self.page, self.total_pages())
    }

    pub fn go_to_page(&mut self, page: u32) -> bool {
        let total = self.total_pages().max(1);
        let page = page.clamp(1, total);
        if page == self.page {
            return false;
        }
        self.page = page;
        self.selected = 0;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_sub(1))
    }

    pub fn select_next(&mut self) {
        let len = self.visible().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Filters changed: back to the first page.
    pub fn filters_changed(&mut self) {
        self.page = 1;
        self.selected = 0;
    }

    pub fn remove_item(&mut self, id: &str) {
        if let Some(page) = self.results.data.as_mut() {
            let before = page.items.len();
            page.items.retain(|item| item.id != id);
            if page.items.len() < before {
                page.total = page.total.saturating_sub(1);
            }
        }
        let len = self.visible().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn item(id: &str, ticker: Option<&str>, sentiment: Sentiment, source: &str, day: u32) -> NewsItem {
        NewsItem {
            id: id.into(),
            title: format!("headline {id}"),
            ticker: ticker.map(String::from),
            sentiment,
            source: source.into(),
            published_at: Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
            url: None,
            summary: None,
        }
    }

    fn sample() -> Vec<NewsItem> {
        vec![
            item("1", Some("BBCA"), Sentiment::Positive, "kontan", 1),
            item("2", Some("BBCA"), Sentiment::Negative, "cnbc", 2),
            item("3", Some("TLKM"), Sentiment::Positive, "cnbc", 3),
            item("4", None, Sentiment::Neutral, "kontan", 4),
            item("5", Some("tlkm"), Sentiment::Positive, "kontan", 5),
        ]
    }

    fn ids(items: &[&NewsItem]) -> Vec<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn no_filters_shows_everything() {
        let items = sample();
        assert_eq!(NewsFilters::default().apply(&items).len(), 5);
    }

    #[test]
    fn filters_combine_with_and() {
        let items = sample();
        let mut filters = NewsFilters::default();
        filters.toggle_sentiment(Sentiment::Positive);
        assert_eq!(ids(&filters.apply(&items)), ["1", "3", "5"]);

        filters.toggle_source("kontan");
        assert_eq!(ids(&filters.apply(&items)), ["1", "5"]);

        filters.toggle_ticker("tlkm");
        assert_eq!(ids(&filters.apply(&items)), ["5"]);

        for shown in filters.apply(&items) {
            assert_eq!(shown.sentiment, Sentiment::Positive);
            assert_eq!(shown.source, "kontan");
        }
    }

    #[test]
    fn values_within_a_dimension_are_alternatives() {
        let items = sample();
        let mut filters = NewsFilters::default();
        filters.toggle_sentiment(Sentiment::Positive);
        filters.toggle_sentiment(Sentiment::Neutral);
        assert_eq!(ids(&filters.apply(&items)), ["1", "3", "4", "5"]);
    }

    #[test]
    fn toggling_twice_removes_filter() {
        let mut filters = NewsFilters::default();
        filters.toggle_source("cnbc");
        filters.toggle_source("cnbc");
        assert!(filters.is_empty());
    }

    #[test]
    fn ticker_filter_excludes_untagged_items() {
        let items = sample();
        let mut filters = NewsFilters::default();
        filters.toggle_ticker("BBCA");
        assert_eq!(ids(&filters.apply(&items)), ["1", "2"]);
    }

    #[test]
    fn range_filter_uses_publish_date() {
        let items = sample();
        let filters = NewsFilters {
            range: Some(DateRange::new(
                NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            )),
            ..Default::default()
        };
        assert_eq!(ids(&filters.apply(&items)), ["2", "3"]);
    }

    #[test]
    fn day_toggle_narrows_then_clears() {
        let items = sample();
        let mut filters = NewsFilters::default();
        let day = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        filters.toggle_day(day);
        assert_eq!(ids(&filters.apply(&items)), ["3"]);
        assert_eq!(filters.summary(), "date=2024-05-03");

        filters.toggle_day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(ids(&filters.apply(&items)), ["1"]);

        filters.toggle_day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(filters.is_empty());
    }

    fn library_with(total: u64) -> NewsLibrary {
        let mut lib = NewsLibrary::new(20, Duration::from_millis(400));
        lib.results.succeed(NewsPage {
            items: sample(),
            total,
            page: 1,
            page_size: 20,
        });
        lib
    }

    #[test]
    fn same_response_gives_same_view() {
        let a = library_with(5);
        let b = library_with(5);
        assert_eq!(ids(&a.visible()), ids(&b.visible()));
        assert_eq!(a.page_window(), b.page_window());
    }

    #[test]
    fn paging_is_clamped_to_total() {
        let mut lib = library_with(45);
        assert_eq!(lib.total_pages(), 3);
        assert!(lib.next_page());
        assert!(lib.next_page());
        assert!(!lib.next_page());
        assert_eq!(lib.page, 3);
        assert!(lib.go_to_page(1));
        assert!(!lib.prev_page());
    }

    #[test]
    fn search_is_debounced_and_resets_page() {
        let start = Instant::now();
        let mut lib = library_with(200);
        lib.go_to_page(4);
        lib.type_char('b', start);
        lib.type_char('i', start + Duration::from_millis(100));

        assert!(!lib.poll_debounce(start + Duration::from_millis(300)));
        assert_eq!(lib.search, "");
        assert!(lib.poll_debounce(start + Duration::from_millis(500)));
        assert_eq!(lib.search, "bi");
        assert_eq!(lib.page, 1);
    }

    #[test]
    fn unchanged_search_does_not_refetch() {
        let mut lib = library_with(5);
        lib.search_input = "  ".into();
        assert!(!lib.commit_search());
    }

    #[test]
    fn single_selection_is_pushed_to_server() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let global = FilterState::new(30, today);
        let mut lib = NewsLibrary::new(20, Duration::from_millis(400));
        lib.filters.toggle_sentiment(Sentiment::Negative);
        lib.filters.toggle_source("cnbc");
        lib.filters.toggle_source("kontan");

        let query = lib.query(&global);
        assert_eq!(query.sentiment, Some(Sentiment::Negative));
        assert_eq!(query.source, None);
        assert!(query.ticker.is_all());
        assert_eq!(query.search, None);
        assert_eq!(query.range, Some(global.range));
    }

    #[test]
    fn removing_item_updates_totals_and_selection() {
        let mut lib = library_with(5);
        lib.selected = 4;
        lib.remove_item("5");
        assert_eq!(lib.visible().len(), 4);
        assert_eq!(lib.selected, 3);
        assert_eq!(lib.results.get().unwrap().total, 4);
    }

    #[test]
    fn breakdown_counts_visible_rows() {
        let items = sample();
        let b = SentimentBreakdown::of(items.iter());
        assert_eq!((b.positive, b.neutral, b.negative), (3, 1, 1));
        assert_eq!(b.total(), 5);
    }
}
