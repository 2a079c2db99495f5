//! In-process backend for demo mode (`--demo` or `DEMO=1`). Answers every
//! endpoint with deterministic synthetic data so the dashboard can be
//! explored without a running server.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Mutex;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::models::{
    BrokerFlow, BrokerSummary, Candle, Forecast, ForecastPoint, FlowSignal, NewsItem, NewsPage, RunningTrade,
    Sentiment, TickerSeries, TradeSide, VolumeSpike, WatchlistEntry,
};
use crate::api::transport::{Method, Request, Response, Transport};
use crate::error::ApiError;

const TICKERS: [&str; 8] = ["BBCA", "BBRI", "TLKM", "ASII", "ADRO", "ANTM", "GOTO", "UNVR"];
const BROKERS: [&str; 10] = ["YP", "CC", "AK", "BK", "ZP", "KZ", "PD", "NI", "DX", "RX"];
const SOURCES: [&str; 4] = ["kontan", "cnbc", "bisnis", "detik"];
const HEADLINES: [&str; 6] = [
    "posts quarterly earnings ahead of estimates",
    "announces interim dividend",
    "foreign investors trim holdings",
    "expands regional operations",
    "faces regulatory review",
    "shares rally on heavy volume",
];
const NEWS_COUNT: usize = 137;

/// Generator seeded from `text`, so each data set is stable across runs.
fn seeded(text: &str) -> fastrand::Rng {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    fastrand::Rng::with_seed(hasher.finish())
}

fn between(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.f64()
}

#[derive(Debug)]
pub struct DemoTransport {
    today: NaiveDate,
    watchlist: Mutex<Vec<WatchlistEntry>>,
    deleted_news: Mutex<BTreeSet<String>>,
}

impl DemoTransport {
    pub fn new(today: NaiveDate) -> Self {
        let watchlist = vec![
            WatchlistEntry {
                ticker: "BBCA".into(),
                stage: "accumulation".into(),
                score: Some(72.5),
                added_at: Utc.with_ymd_and_hms(2024, 1, 8, 2, 0, 0).single(),
            },
            WatchlistEntry {
                ticker: "ADRO".into(),
                stage: "markup".into(),
                score: Some(64.0),
                added_at: None,
            },
        ];
        Self {
            today,
            watchlist: Mutex::new(watchlist),
            deleted_news: Mutex::new(BTreeSet::new()),
        }
    }

    fn route(&self, request: &Request) -> Response {
        let path = request
            .url
            .find("/api/")
            .map(|i| &request.url[i..])
            .unwrap_or(&request.url)
            .to_string();
        let segments: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string()))
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["api", "price", ticker]) => self.price(ticker, request),
            (Method::Get, ["api", "price", ticker, "spikes"]) => self.spikes(ticker, request),
            (Method::Get, ["api", "news"]) => self.news(request),
            (Method::Get, ["api", "news", "sources"]) => json_response(&SOURCES),
            (Method::Post, ["api", "news", "scrape"]) => {
                let scope = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("ticker"))
                    .and_then(Value::as_str)
                    .unwrap_or("all tickers")
                    .to_string();
                json_response(&json!({"status": "started", "message": format!("scraping news for {scope}")}))
            }
            (Method::Delete, ["api", "news", id]) => {
                if let Ok(mut deleted) = self.deleted_news.lock() {
                    deleted.insert(id.to_string());
                }
                json_response(&json!({"status": "deleted"}))
            }
            (Method::Get, ["api", "broker-summary"]) => self.broker_summary(request),
            (Method::Get, ["api", "running-trade"]) => self.running_trade(request),
            (Method::Get, ["api", "flow", "hot"]) => self.hot_list(request),
            (Method::Get, ["api", "forecast", ticker]) => self.forecast(ticker, request),
            (Method::Get, ["api", "watchlist"]) => match self.watchlist.lock() {
                Ok(list) => json_response(&*list),
                Err(_) => error_response(500, "watchlist unavailable"),
            },
            (Method::Post, ["api", "watchlist"]) => self.add_watchlist(request),
            (Method::Post, ["api", "watchlist", ticker, "remove"]) => self.remove_watchlist(ticker),
            (Method::Post, ["api", "sync", ticker]) => {
                json_response(&json!({"status": "synced", "message": format!("{ticker} prices refreshed")}))
            }
            _ => error_response(404, "Not Found"),
        }
    }

    fn date_param(&self, request: &Request, name: &str, fallback: NaiveDate) -> NaiveDate {
        request
            .query_value(name)
            .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
            .unwrap_or(fallback)
    }

    fn series(&self, ticker: &str, request: &Request) -> TickerSeries {
        let end = self.date_param(request, "end", self.today);
        let start = self.date_param(request, "start", end - Duration::days(90));
        let mut rng = seeded(ticker);
        let mut price = between(&mut rng, 500.0, 9000.0).round();
        let mut candles = Vec::new();
        let mut day = start;
        while day <= end {
            let open = price;
            let close = (open * (1.0 + between(&mut rng, -0.03, 0.03))).round().max(1.0);
            let high = open.max(close) * (1.0 + between(&mut rng, 0.0, 0.015));
            let low = open.min(close) * (1.0 - between(&mut rng, 0.0, 0.015));
            let burst = if rng.f64() > 0.92 { between(&mut rng, 2.5, 4.0) } else { 1.0 };
            let volume = (between(&mut rng, 2.0e5, 1.2e6) * burst).round();
            candles.push(Candle {
                time: day,
                open,
                high: high.round(),
                low: low.round(),
                close,
                volume,
            });
            price = close;
            day += Duration::days(1);
        }
        TickerSeries {
            ticker: ticker.to_string(),
            candles,
        }
    }

    fn price(&self, ticker: &str, request: &Request) -> Response {
        json_response(&self.series(ticker, request))
    }

    fn spikes(&self, ticker: &str, request: &Request) -> Response {
        let ratio: f64 = request.query_value("ratio").and_then(|r| r.parse().ok()).unwrap_or(2.0);
        let series = self.series(ticker, request);
        let mut volumes: Vec<f64> = series.candles.iter().map(|c| c.volume).collect();
        volumes.sort_by(|a, b| a.total_cmp(b));
        let median = volumes.get(volumes.len() / 2).copied().unwrap_or(0.0);
        let spikes: Vec<VolumeSpike> = series
            .candles
            .iter()
            .filter(|c| median > 0.0 && c.volume / median >= ratio)
            .map(|c| VolumeSpike {
                time: c.time,
                volume: c.volume,
                median,
                ratio: c.volume / median,
            })
            .collect();
        json_response(&spikes)
    }

    fn all_news(&self) -> Vec<NewsItem> {
        let deleted = self.deleted_news.lock().map(|d| d.clone()).unwrap_or_default();
        let mut rng = seeded("news");
        let now = self.today.and_hms_opt(16, 0, 0).unwrap_or_default().and_utc();
        (0..NEWS_COUNT)
            .map(|i| {
                let ticker = TICKERS[i % TICKERS.len()];
                let sentiment = Sentiment::ALL[rng.usize(..Sentiment::ALL.len())];
                let headline = HEADLINES[(i * 7) % HEADLINES.len()];
                NewsItem {
                    id: format!("n{:04}", i),
                    title: format!("{ticker} {headline}"),
                    ticker: (i % 11 != 0).then(|| ticker.to_string()),
                    sentiment,
                    source: SOURCES[i % SOURCES.len()].to_string(),
                    published_at: now - Duration::hours(i as i64 * 9),
                    url: Some(format!("https://news.example.com/{i}")),
                    summary: Some(format!("Synthetic summary for story {i} about {ticker}.")),
                }
            })
            .filter(|item| !deleted.contains(&item.id))
            .collect()
    }

    fn news(&self, request: &Request) -> Response {
        let page: u32 = request.query_value("page").and_then(|v| v.parse().ok()).unwrap_or(1).max(1);
        let page_size: u32 = request
            .query_value("page_size")
            .and_then(|v| v.parse().ok())
            .unwrap_or(20)
            .max(1);
        let ticker = request.query_value("ticker");
        let sentiment = request.query_value("sentiment");
        let source = request.query_value("source");
        let q = request.query_value("q").map(str::to_lowercase);
        let start = request.query_value("start").and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok());
        let end = request.query_value("end").and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok());

        let matching: Vec<NewsItem> = self
            .all_news()
            .into_iter()
            .filter(|n| ticker.map_or(true, |t| n.ticker.as_deref() == Some(t)))
            .filter(|n| sentiment.map_or(true, |s| n.sentiment.as_param() == s))
            .filter(|n| source.map_or(true, |s| n.source == s))
            .filter(|n| q.as_ref().map_or(true, |q| n.title.to_lowercase().contains(q)))
            .filter(|n| start.map_or(true, |s| n.published_at.date_naive() >= s))
            .filter(|n| end.map_or(true, |e| n.published_at.date_naive() <= e))
            .collect();

        let total = matching.len() as u64;
        let skip = ((page - 1) * page_size) as usize;
        let items = matching.into_iter().skip(skip).take(page_size as usize).collect();
        json_response(&NewsPage {
            items,
            total,
            page,
            page_size,
        })
    }

    fn broker_summary(&self, request: &Request) -> Response {
        let date = self.date_param(request, "date", self.today);
        let ticker = request.query_value("ticker").map(String::from);
        let mut rng = seeded(&format!("{}{}", date, ticker.as_deref().unwrap_or("*")));
        let scale = if ticker.is_some() { 1.0e9 } else { 2.5e10 };
        let rows = BROKERS
            .iter()
            .map(|broker| {
                let buy_value = (between(&mut rng, 0.1, 1.0) * scale).round();
                let sell_value = (between(&mut rng, 0.1, 1.0) * scale).round();
                BrokerFlow {
                    broker: broker.to_string(),
                    buy_value,
                    sell_value,
                    net_value: buy_value - sell_value,
                    buy_volume: (buy_value / 5000.0).round(),
                    sell_volume: (sell_value / 5000.0).round(),
                }
            })
            .collect();
        json_response(&BrokerSummary { date, ticker, rows })
    }

    fn running_trade(&self, request: &Request) -> Response {
        let limit: usize = request.query_value("limit").and_then(|v| v.parse().ok()).unwrap_or(50);
        let ticker = request.query_value("ticker");
        let mut rng = seeded(ticker.unwrap_or("tape"));
        let open = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
        let trades: Vec<RunningTrade> = (0..limit)
            .map(|i| {
                let symbol = ticker.unwrap_or(TICKERS[rng.usize(..TICKERS.len())]);
                let side = if rng.f64() > 0.5 { TradeSide::Buy } else { TradeSide::Sell };
                RunningTrade {
                    time: open + Duration::seconds((limit - i) as i64 * 17),
                    ticker: symbol.to_string(),
                    price: (between(&mut rng, 900.0, 9500.0) / 5.0).round() * 5.0,
                    lot: between(&mut rng, 1.0, 500.0).round() as u64,
                    side,
                    buyer: Some(BROKERS[i % BROKERS.len()].to_string()),
                    seller: Some(BROKERS[(i + 3) % BROKERS.len()].to_string()),
                }
            })
            .collect();
        json_response(&trades)
    }

    fn hot_list(&self, request: &Request) -> Response {
        let limit: usize = request.query_value("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
        let mut rng = seeded(request.query_value("end").unwrap_or("hot"));
        let stages = ["accumulation", "markup", "distribution"];
        let mut signals: Vec<FlowSignal> = TICKERS
            .iter()
            .map(|ticker| FlowSignal {
                ticker: ticker.to_string(),
                score: (between(&mut rng, 20.0, 95.0) * 10.0).round() / 10.0,
                strength: (between(&mut rng, 0.0, 1.0) * 100.0).round() / 100.0,
                net_value: (between(&mut rng, -5.0, 8.0) * 1.0e9).round(),
                stage: Some(stages[rng.usize(..stages.len())].to_string()),
            })
            .collect();
        signals.sort_by(|a, b| b.score.total_cmp(&a.score));
        signals.truncate(limit);
        json_response(&signals)
    }

    fn forecast(&self, ticker: &str, request: &Request) -> Response {
        let horizon: i64 = request.query_value("horizon").and_then(|v| v.parse().ok()).unwrap_or(14);
        let series = self.series(ticker, &Request::new(Method::Get, ""));
        let Some(last) = series.candles.last() else {
            return error_response(404, "no history to forecast from");
        };
        let mut rng = seeded(&format!("forecast{ticker}"));
        let drift = between(&mut rng, -0.004, 0.006);
        let points = (1..=horizon)
            .map(|step| {
                let value = last.close * (1.0 + drift * step as f64);
                let spread = last.close * 0.01 * (step as f64).sqrt();
                ForecastPoint {
                    date: last.time + Duration::days(step),
                    value: value.round(),
                    lower: Some((value - spread).round()),
                    upper: Some((value + spread).round()),
                }
            })
            .collect();
        json_response(&Forecast {
            ticker: ticker.to_string(),
            model: Some("demo-drift".into()),
            points,
        })
    }

    fn add_watchlist(&self, request: &Request) -> Response {
        let body = request.body.as_ref();
        let Some(ticker) = body.and_then(|b| b.get("ticker")).and_then(Value::as_str) else {
            return error_response(422, "ticker is required");
        };
        let stage = body
            .and_then(|b| b.get("stage"))
            .and_then(Value::as_str)
            .unwrap_or("watch");
        let entry = WatchlistEntry {
            ticker: ticker.to_uppercase(),
            stage: stage.to_string(),
            score: Some(between(&mut seeded(ticker), 30.0, 90.0).round()),
            added_at: self.today.and_hms_opt(9, 0, 0).map(|d| d.and_utc()),
        };
        let Ok(mut list) = self.watchlist.lock() else {
            return error_response(500, "watchlist unavailable");
        };
        match list.iter_mut().find(|e| e.ticker == entry.ticker) {
            Some(existing) => *existing = entry.clone(),
            None => list.push(entry.clone()),
        }
        json_response(&entry)
    }

    fn remove_watchlist(&self, ticker: &str) -> Response {
        let Ok(mut list) = self.watchlist.lock() else {
            return error_response(500, "watchlist unavailable");
        };
        let before = list.len();
        list.retain(|e| e.ticker != ticker);
        if list.len() == before {
            return error_response(404, &format!("{ticker} is not on the watchlist"));
        }
        json_response(&json!({"status": "removed"}))
    }
}

fn json_response<T: Serialize + ?Sized>(value: &T) -> Response {
    match serde_json::to_string(value) {
        Ok(body) => Response::ok(body),
        Err(err) => error_response(500, &err.to_string()),
    }
}

fn error_response(status: u16, detail: &str) -> Response {
    Response {
        status,
        body: json!({ "detail": detail }).to_string(),
    }
}

impl Transport for DemoTransport {
    fn send<'a>(
        &'a self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send + 'a>> {
        let response = self.route(&request);
        Box::pin(async move { Ok(response) })
    }
}
