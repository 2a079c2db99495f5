//! Thin client for the market-intelligence backend. One method per endpoint,
//! each a single best-effort request: no retry, no backoff, no caching.

pub mod models;
pub mod transport;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::filter::{DateRange, TickerScope};
use models::{
    ActionStatus, BrokerSummary, Forecast, FlowSignal, NewsPage, RunningTrade, Sentiment,
    TickerSeries, VolumeSpike, WatchlistEntry,
};
use transport::{Method, Request, Transport};

/// Parameters of a news library page request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewsQuery {
    pub page: u32,
    pub page_size: u32,
    pub ticker: TickerScope,
    pub sentiment: Option<Sentiment>,
    pub source: Option<String>,
    pub range: Option<DateRange>,
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.base_url).finish()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, transport }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn segment(value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }

    /// Sends the request and decodes a 2xx body into `T`.
    async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let method = request.method;
        let url = request.url.clone();
        debug!("{} {}", method.as_str(), url);

        let response = self.transport.send(request).await.inspect_err(|e| {
            warn!("{} {} failed: {}", method.as_str(), url, e);
        })?;

        if !response.is_success() {
            let detail = error_detail(response.status, &response.body);
            warn!("{} {} returned {}: {}", method.as_str(), url, response.status, detail);
            return Err(ApiError::Status {
                status: response.status,
                detail,
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn price_series(&self, ticker: &str, range: &DateRange) -> Result<TickerSeries, ApiError> {
        let request = Request::new(Method::Get, self.url(&format!("/api/price/{}", Self::segment(ticker))))
            .param("start", range.start_param())
            .param("end", range.end_param());
        self.execute(request).await
    }

    pub async fn volume_spikes(
        &self,
        ticker: &str,
        range: &DateRange,
        ratio: f64,
    ) -> Result<Vec<VolumeSpike>, ApiError> {
        let request = Request::new(
            Method::Get,
            self.url(&format!("/api/price/{}/spikes", Self::segment(ticker))),
        )
        .param("start", range.start_param())
        .param("end", range.end_param())
        .param("ratio", ratio);
        self.execute(request).await
    }

    pub async fn news(&self, query: &NewsQuery) -> Result<NewsPage, ApiError> {
        let request = Request::new(Method::Get, self.url("/api/news"))
            .param("page", query.page)
            .param("page_size", query.page_size)
            .param_opt("ticker", query.ticker.as_param())
            .param_opt("sentiment", query.sentiment.map(Sentiment::as_param))
            .param_opt("source", query.source.as_deref())
            .param_opt("start", query.range.map(|r| r.start_param()))
            .param_opt("end", query.range.map(|r| r.end_param()))
            .param_opt("q", query.search.as_deref().filter(|q| !q.is_empty()));
        self.execute(request).await
    }

    pub async fn news_sources(&self) -> Result<Vec<String>, ApiError> {
        self.execute(Request::new(Method::Get, self.url("/api/news/sources"))).await
    }

    pub async fn scrape_news(&self, ticker: &TickerScope) -> Result<ActionStatus, ApiError> {
        let request = Request::new(Method::Post, self.url("/api/news/scrape"))
            .with_body(json!({ "ticker": ticker.as_param() }));
        self.execute(request).await
    }

    pub async fn delete_news(&self, id: &str) -> Result<ActionStatus, ApiError> {
        let request = Request::new(Method::Delete, self.url(&format!("/api/news/{}", Self::segment(id))));
        self.execute(request).await
    }

    pub async fn broker_summary(&self, date: NaiveDate, ticker: &TickerScope) -> Result<BrokerSummary, ApiError> {
        let request = Request::new(Method::Get, self.url("/api/broker-summary"))
            .param("date", date.format("%Y-%m-%d"))
            .param_opt("ticker", ticker.as_param());
        self.execute(request).await
    }

    pub async fn running_trade(&self, ticker: &TickerScope, limit: u32) -> Result<Vec<RunningTrade>, ApiError> {
        let request = Request::new(Method::Get, self.url("/api/running-trade"))
            .param_opt("ticker", ticker.as_param())
            .param("limit", limit);
        self.execute(request).await
    }

    pub async fn hot_list(&self, limit: u32, range: Option<&DateRange>) -> Result<Vec<FlowSignal>, ApiError> {
        let request = Request::new(Method::Get, self.url("/api/flow/hot"))
            .param("limit", limit)
            .param_opt("start", range.map(|r| r.start_param()))
            .param_opt("end", range.map(|r| r.end_param()));
        self.execute(request).await
    }

    pub async fn forecast(&self, ticker: &str, horizon: u32) -> Result<Forecast, ApiError> {
        let request = Request::new(Method::Get, self.url(&format!("/api/forecast/{}", Self::segment(ticker))))
            .param("horizon", horizon);
        self.execute(request).await
    }

    pub async fn watchlist(&self) -> Result<Vec<WatchlistEntry>, ApiError> {
        self.execute(Request::new(Method::Get, self.url("/api/watchlist"))).await
    }

    pub async fn add_watchlist(&self, ticker: &str, stage: &str) -> Result<WatchlistEntry, ApiError> {
        let request = Request::new(Method::Post, self.url("/api/watchlist"))
            .with_body(json!({ "ticker": ticker, "stage": stage }));
        self.execute(request).await
    }

    pub async fn remove_watchlist(&self, ticker: &str) -> Result<ActionStatus, ApiError> {
        let request = Request::new(
            Method::Post,
            self.url(&format!("/api/watchlist/{}/remove", Self::segment(ticker))),
        );
        self.execute(request).await
    }

    pub async fn sync_prices(&self, ticker: &str, range: &DateRange) -> Result<ActionStatus, ApiError> {
        let request = Request::new(Method::Post, self.url(&format!("/api/sync/{}", Self::segment(ticker))))
            .param("start", range.start_param())
            .param("end", range.end_param());
        self.execute(request).await
    }
}

/// Human-readable message for a failed response: the JSON `detail` field
/// when the backend sent one, else the status reason phrase.
fn error_detail(status: u16, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body).ok().and_then(|v| match v.get("detail") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    });

    from_body.unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("request failed")
            .to_string()
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::transport::Response;
    use super::*;

    /// Replays queued responses and records every request it sees.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub responses: Mutex<VecDeque<Result<Response, ApiError>>>,
        pub requests: Mutex<Vec<Request>>,
    }

    impl ScriptedTransport {
        pub fn with(responses: Vec<Result<Response, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn last_request(&self) -> Request {
            self.requests.lock().unwrap().last().cloned().expect("no request sent")
        }
    }

    impl Transport for ScriptedTransport {
        fn send<'a>(
            &'a self,
            request: Request,
        ) -> Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send + 'a>> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Response::ok("null")));
            Box::pin(async move { next })
        }
    }

    fn client(transport: &Arc<ScriptedTransport>) -> ApiClient {
        ApiClient::new("http://backend:8000/", transport.clone())
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
        )
    }

    const SERIES: &str = r#"{"ticker":"BBCA","candles":[
        {"time":"2024-04-01","open":9800,"high":9900,"low":9750,"close":9875,"volume":120000},
        {"time":"2024-04-02","open":9875,"high":9950,"low":9800,"close":9825,"volume":98000}]}"#;

    #[tokio::test]
    async fn price_series_builds_path_and_range() {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok(SERIES))]);
        let series = client(&transport).price_series("BBCA", &range()).await.unwrap();

        assert_eq!(series.candles.len(), 2);
        let req = transport.last_request();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, "http://backend:8000/api/price/BBCA");
        assert_eq!(req.query_value("start"), Some("2024-04-01"));
        assert_eq!(req.query_value("end"), Some("2024-04-30"));
    }

    #[tokio::test]
    async fn identical_responses_map_to_identical_models() {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok(SERIES)), Ok(Response::ok(SERIES))]);
        let api = client(&transport);
        let first = api.price_series("BBCA", &range()).await.unwrap();
        let second = api.price_series("BBCA", &range()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn all_scope_omits_ticker_param() {
        let body = r#"{"items":[],"total":0,"page":1,"page_size":20}"#;
        let transport = ScriptedTransport::with(vec![Ok(Response::ok(body))]);
        let query = NewsQuery {
            page: 1,
            page_size: 20,
            ticker: TickerScope::parse(""),
            sentiment: None,
            source: None,
            range: None,
            search: Some(String::new()),
        };
        let page = client(&transport).news(&query).await.unwrap();

        assert!(page.items.is_empty());
        let req = transport.last_request();
        assert_eq!(req.query_value("ticker"), None);
        assert_eq!(req.query_value("q"), None);
        assert_eq!(req.query_value("page"), Some("1"));
    }

    #[tokio::test]
    async fn scoped_news_query_sends_filters() {
        let body = r#"{"items":[],"total":0,"page":3,"page_size":10}"#;
        let transport = ScriptedTransport::with(vec![Ok(Response::ok(body))]);
        let query = NewsQuery {
            page: 3,
            page_size: 10,
            ticker: TickerScope::parse("tlkm"),
            sentiment: Some(Sentiment::Negative),
            source: Some("cnbc".into()),
            range: Some(range()),
            search: Some("dividend".into()),
        };
        client(&transport).news(&query).await.unwrap();

        let req = transport.last_request();
        assert_eq!(req.query_value("ticker"), Some("TLKM"));
        assert_eq!(req.query_value("sentiment"), Some("negative"));
        assert_eq!(req.query_value("source"), Some("cnbc"));
        assert_eq!(req.query_value("start"), Some("2024-04-01"));
        assert_eq!(req.query_value("q"), Some("dividend"));
    }

    #[tokio::test]
    async fn non_success_uses_detail_field() {
        let transport = ScriptedTransport::with(vec![Ok(Response {
            status: 404,
            body: r#"{"detail":"Ticker not found"}"#.into(),
        })]);
        let err = client(&transport).forecast("XXXX", 5).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                detail: "Ticker not found".into()
            }
        );
        assert_eq!(err.to_string(), "HTTP 404: Ticker not found");
    }

    #[tokio::test]
    async fn non_success_without_detail_uses_reason() {
        let transport = ScriptedTransport::with(vec![Ok(Response {
            status: 502,
            body: "<html>bad gateway</html>".into(),
        })]);
        let err = client(&transport).watchlist().await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let transport = ScriptedTransport::with(vec![Err(ApiError::Transport("connection refused".into()))]);
        let err = client(&transport).hot_list(20, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok("{\"ticker\":"))]);
        let err = client(&transport).price_series("BBCA", &range()).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn empty_array_is_not_an_error() {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok("[]"))]);
        let trades = client(&transport).running_trade(&TickerScope::All, 50).await.unwrap();
        assert!(trades.is_empty());
    }

    #[tokio::test]
    async fn watchlist_actions_use_post_and_body() {
        let created = r#"{"ticker":"ADRO","stage":"accumulation","score":71.5}"#;
        let removed = r#"{"status":"removed"}"#;
        let transport = ScriptedTransport::with(vec![Ok(Response::ok(created)), Ok(Response::ok(removed))]);
        let api = client(&transport);

        let entry = api.add_watchlist("ADRO", "accumulation").await.unwrap();
        assert_eq!(entry.ticker, "ADRO");
        let req = transport.last_request();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body, Some(json!({"ticker": "ADRO", "stage": "accumulation"})));

        let status = api.remove_watchlist("ADRO").await.unwrap();
        assert_eq!(status.status, "removed");
        let req = transport.last_request();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "http://backend:8000/api/watchlist/ADRO/remove");
    }

    #[tokio::test]
    async fn delete_news_uses_delete_and_encodes_id() {
        let transport = ScriptedTransport::with(vec![Ok(Response::ok(r#"{"status":"deleted"}"#))]);
        client(&transport).delete_news("a b/c").await.unwrap();
        let req = transport.last_request();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.url, "http://backend:8000/api/news/a%20b%2Fc");
    }
}
