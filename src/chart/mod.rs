//! Terminal charts: candlestick and volume panels kept in step by
//! [`ChartSync`], plus line charts for forecasts and broker flow.

pub mod candles;
pub mod host;
pub mod render;
pub mod sync;

pub use candles::PriceChart;
pub use host::ChartHost;
pub use sync::{ChartSync, PanelView, SyncEvent, VisibleRange, PRICE_PANEL, VOLUME_PANEL};
