use crate::api::models::WatchlistEntry;
use crate::fetch::Resource;

/// Stages offered when adding an entry.
pub const STAGES: [&str; 4] = ["watch", "accumulation", "markup", "distribution"];

/// Watchlist page state. Entries only change after the backend confirmed a
/// create or remove call.
#[derive(Debug, Clone, Default)]
pub struct WatchlistState {
    pub entries: Resource<Vec<WatchlistEntry>>,
    pub selected: Option<String>,
}

impl WatchlistState {
    pub fn rows(&self) -> &[WatchlistEntry] {
        self.entries.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn selected_index(&self) -> Option<usize> {
        let ticker = self.selected.as_ref()?;
        self.rows().iter().position(|e| &e.ticker == ticker)
    }

    pub fn selected_entry(&self) -> Option<&WatchlistEntry> {
        self.selected_index().and_then(|i| self.rows().get(i))
    }

    /// Replace the list after a fetch, dropping a selection that no longer exists.
    pub fn load(&mut self, entries: Vec<WatchlistEntry>) {
        self.entries.succeed(entries);
        if self.selected_index().is_none() {
            self.selected = None;
        }
    }

    pub fn apply_added(&mut self, entry: WatchlistEntry) {
        let mut rows = self.entries.data.take().unwrap_or_default();
        match rows.iter_mut().find(|e| e.ticker == entry.ticker) {
            Some(existing) => *existing = entry,
            None => rows.push(entry),
        }
        self.entries.data = Some(rows);
    }

    pub fn apply_removed(&mut self, ticker: &str) {
        if let Some(rows) = self.entries.data.as_mut() {
            rows.retain(|e| e.ticker != ticker);
        }
        if self.selected.as_deref() == Some(ticker) {
            self.selected = None;
        }
    }

    pub fn select_next(&mut self) {
        let rows = self.rows();
        if rows.is_empty() {
            return;
        }
        let next = match self.selected_index() {
            Some(i) => (i + 1).min(rows.len() - 1),
            None => 0,
        };
        self.selected = Some(rows[next].ticker.clone());
    }

    pub fn select_prev(&mut self) {
        let rows = self.rows();
        if rows.is_empty() {
            return;
        }
        let prev = self.selected_index().map(|i| i.saturating_sub(1)).unwrap_or(0);
        self.selected = Some(rows[prev].ticker.clone());
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.rows().iter().any(|e| e.ticker == ticker)
    }
}
