//! Links chart panels so that scrolling, zooming or moving the crosshair in
//! one panel is mirrored in the others.

use std::cell::RefCell;
use std::rc::Rc;

pub type PanelId = usize;

pub const PRICE_PANEL: PanelId = 0;
pub const VOLUME_PANEL: PanelId = 1;

/// Fewest candles a zoomed-in view may show.
const MIN_VISIBLE: usize = 5;

/// Half-open range of candle indices on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleRange {
    pub from: usize,
    pub to: usize,
}

impl VisibleRange {
    /// The last `len` of `total` items.
    pub fn tail(total: usize, len: usize) -> Self {
        let len = len.min(total);
        Self {
            from: total - len,
            to: total,
        }
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.from && index < self.to
    }

    /// Shift by `delta` candles, staying inside `0..total`.
    pub fn pan(self, delta: isize, total: usize) -> Self {
        let len = self.len().min(total);
        let max_from = total - len;
        let from = (self.from as isize + delta).clamp(0, max_from as isize) as usize;
        Self { from, to: from + len }
    }

    /// Grow (positive) or shrink (negative) the window around its right edge.
    pub fn zoom(self, delta: isize, total: usize, max_len: usize) -> Self {
        let upper = max_len.min(total);
        let lower = MIN_VISIBLE.min(upper);
        let len = (self.len() as isize + delta).clamp(lower as isize, upper as isize) as usize;
        let to = self.to.clamp(len, total);
        Self { from: to - len, to }
    }

    /// Clamp into `0..total` with at most `max_len` items.
    pub fn fit(self, total: usize, max_len: usize) -> Self {
        if self.is_empty() || self.to > total {
            return Self::tail(total, max_len);
        }
        let len = self.len().min(max_len).max(MIN_VISIBLE.min(max_len)).min(total);
        let to = self.to.max(len);
        Self { from: to - len, to }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    Range(VisibleRange),
    Crosshair(Option<usize>),
}

/// Viewport state of one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelView {
    pub range: VisibleRange,
    pub crosshair: Option<usize>,
}

impl PanelView {
    pub fn shared() -> Rc<RefCell<PanelView>> {
        Rc::new(RefCell::new(PanelView::default()))
    }

    pub fn apply(&mut self, event: &SyncEvent) {
        match *event {
            SyncEvent::Range(range) => {
                self.range = range;
                if let Some(index) = self.crosshair {
                    if !range.contains(index) {
                        self.crosshair = None;
                    }
                }
            }
            SyncEvent::Crosshair(index) => self.crosshair = index,
        }
    }
}

type Listener = Box<dyn FnMut(&SyncEvent)>;

/// Callback registry. Listeners only apply incoming events to their own
/// panel; they never publish, so forwarding cannot echo back.
#[derive(Default)]
pub struct ChartSync {
    listeners: Vec<(PanelId, Listener)>,
}

impl std::fmt::Debug for ChartSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let panels: Vec<PanelId> = self.listeners.iter().map(|(id, _)| *id).collect();
        f.debug_struct("ChartSync").field("panels", &panels).finish()
    }
}

impl ChartSync {
    pub fn subscribe(&mut self, panel: PanelId, listener: impl FnMut(&SyncEvent) + 'static) {
        self.listeners.push((panel, Box::new(listener)));
    }

    /// Registers a panel whose listener applies events to `view`.
    pub fn link(&mut self, panel: PanelId, view: Rc<RefCell<PanelView>>) {
        self.subscribe(panel, move |event| view.borrow_mut().apply(event));
    }

    pub fn unsubscribe(&mut self, panel: PanelId) {
        self.listeners.retain(|(id, _)| *id != panel);
    }

    /// Deliver `event` to every panel except `source`. Returns how many
    /// listeners received it.
    pub fn publish(&mut self, source: PanelId, event: SyncEvent) -> usize {
        let mut delivered = 0;
        for (panel, listener) in self.listeners.iter_mut() {
            if *panel != source {
                listener(&event);
                delivered += 1;
            }
        }
        delivered
    }
}
