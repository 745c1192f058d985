//! Yahoo Finance data provider.
//!
//! Daily OHLCV comes from the v8 chart API, company metadata from the v10
//! quoteSummary API. Both share one retry loop with exponential backoff and
//! the circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.
//! quoteSummary needs a session cookie plus the matching crumb token. The
//! provider primes its cookie jar and fetches the crumb once, on the first
//! profile request. If that fails the profile degrades to the company name
//! seen in the chart metadata.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, RawBar};
use crate::domain::{CompanyProfile, UNKNOWN_SECTOR};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com";
/// Any response from this host sets the session cookie the crumb is bound to.
const COOKIE_URL: &str = "https://fc.yahoo.com";

// ── chart API ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

// ── quoteSummary API ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<SummaryData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryData {
    price: Option<PriceModule>,
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    market_cap: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNumber {
    raw: Option<f64>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    cookie_url: String,
    max_retries: u32,
    base_delay: Duration,
    /// Upper bound on a server-requested `Retry-After` wait.
    max_retry_wait: Duration,
    /// Fetched once per provider; `None` when Yahoo refused to hand one out.
    crumb: OnceLock<Option<String>>,
    /// Company names seen in chart metadata, used when quoteSummary is refused.
    chart_names: Mutex<HashMap<String, String>>,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Self::with_endpoints(circuit_breaker, BASE_URL, COOKIE_URL)
    }

    /// Provider against another Yahoo-compatible host. Cookie priming goes to the same host.
    pub fn with_base_url(
        circuit_breaker: Arc<CircuitBreaker>,
        base_url: &str,
    ) -> Result<Self, DataError> {
        Self::with_endpoints(circuit_breaker, base_url, base_url)
    }

    fn with_endpoints(
        circuit_breaker: Arc<CircuitBreaker>,
        base_url: &str,
        cookie_url: &str,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .cookie_store(true)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_retry_wait: Duration::from_secs(60),
            crumb: OnceLock::new(),
            chart_names: Mutex::new(HashMap::new()),
        })
    }

    /// Override the backoff base and the cap on `Retry-After` waits.
    pub fn with_retry_policy(mut self, base_delay: Duration, max_retry_wait: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_retry_wait = max_retry_wait;
        self
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc().timestamp();
        let end_ts = end.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc().timestamp();
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }

    fn summary_url(&self, symbol: &str, crumb: Option<&str>) -> String {
        let url = format!(
            "{}/v10/finance/quoteSummary/{symbol}?modules=price,assetProfile",
            self.base_url
        );
        match crumb.map(|c| reqwest::Url::parse_with_params(&url, &[("crumb", c)])) {
            Some(Ok(with_crumb)) => with_crumb.to_string(),
            _ => url,
        }
    }

    /// Session crumb for quoteSummary, fetched on first use.
    fn crumb(&self) -> Option<&str> {
        self.crumb.get_or_init(|| self.fetch_crumb()).as_deref()
    }

    fn fetch_crumb(&self) -> Option<String> {
        if !self.circuit_breaker.is_allowed() {
            return None;
        }
        // status is irrelevant here, only the Set-Cookie header matters
        if let Err(e) = self.client.get(&self.cookie_url).send() {
            tracing::info!(error = %e, "cookie priming failed");
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let resp = match self.client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::info!(status = %resp.status(), "crumb request refused");
                return None;
            }
            Err(e) => {
                tracing::info!(error = %e, "crumb request failed");
                return None;
            }
        };
        let crumb = resp.text().ok()?.trim().to_string();
        // an HTML error page is not a crumb
        if crumb.is_empty() || crumb.contains('<') || crumb.contains(char::is_whitespace) {
            return None;
        }
        tracing::debug!("obtained quoteSummary crumb");
        Some(crumb)
    }

    /// Parse the chart API response into RawBars plus the company name from its metadata.
    fn parse_chart(
        symbol: &str,
        resp: ChartResponse,
    ) -> Result<(Vec<RawBar>, Option<String>), DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let name = data
            .meta
            .and_then(|m| m.long_name.or(m.short_name))
            .filter(|n| !n.trim().is_empty());

        let timestamps = data.timestamp.ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Holidays / halted sessions come back as all-null rows
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let close = close.unwrap_or(f64::NAN);
            bars.push(RawBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close,
                volume: volume.unwrap_or(0),
                adj_close: adj_closes
                    .as_ref()
                    .and_then(|v| v.get(i).copied().flatten())
                    .unwrap_or(close),
            });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok((bars, name))
    }

    /// Merge quoteSummary output with the fallback profile field by field.
    fn parse_summary(
        symbol: &str,
        resp: SummaryResponse,
        fallback: CompanyProfile,
    ) -> Result<CompanyProfile, DataError> {
        let data = match resp.quote_summary.result.and_then(|r| r.into_iter().next()) {
            Some(d) => d,
            None => {
                return Err(match resp.quote_summary.error {
                    Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    },
                    Some(err) => DataError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.description
                    )),
                    None => DataError::ResponseFormatChanged("empty quoteSummary result".into()),
                })
            }
        };

        let (company, market_cap) = match data.price {
            Some(price) => (
                price.long_name.or(price.short_name),
                price.market_cap.and_then(|m| m.raw),
            ),
            None => (None, None),
        };
        let sector = data.asset_profile.and_then(|p| p.sector);

        Ok(CompanyProfile {
            company: company
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(fallback.company),
            sector: sector
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(fallback.sector),
            market_cap: market_cap
                .filter(|m| m.is_finite() && *m > 0.0)
                .map(|m| m as u64)
                .unwrap_or(fallback.market_cap),
        })
    }

    /// GET a JSON document with retry and circuit breaker logic.
    fn get_json<T: DeserializeOwned>(&self, symbol: &str, url: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;
        let mut retry_after = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.base_delay * 2u32.pow(attempt - 1);
                let delay = retry_wait(backoff, retry_after.take(), self.max_retry_wait);
                tracing::debug!(symbol, attempt, ?delay, "retrying request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            // Rate limits are waited out, not counted against the breaker
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                tracing::info!(symbol, ?retry_after, "rate limited");
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after.unwrap_or(60),
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(format!(
                    "Yahoo Finance refused {url}"
                )));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body = resp.json::<T>().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn remember_name(&self, symbol: &str, name: String) {
        let mut names = self
            .chart_names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        names.insert(symbol.to_string(), name);
    }

    fn chart_profile(&self, symbol: &str) -> CompanyProfile {
        let names = self
            .chart_names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut profile = CompanyProfile::fallback(symbol);
        if let Some(name) = names.get(symbol) {
            profile.company = name.clone();
        }
        profile
    }
}

/// Wait before the next attempt: the backoff, or the server's `Retry-After`
/// (capped at `cap`) when that is longer.
fn retry_wait(backoff: Duration, retry_after_secs: Option<u64>, cap: Duration) -> Duration {
    match retry_after_secs {
        Some(secs) => backoff.max(Duration::from_secs(secs).min(cap)),
        None => backoff,
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let chart: ChartResponse = self.get_json(symbol, &self.chart_url(symbol, start, end))?;
        let (bars, name) = Self::parse_chart(symbol, chart)?;
        if let Some(name) = name {
            self.remember_name(symbol, name);
        }
        tracing::debug!(symbol, bars = bars.len(), "fetched chart history");
        Ok(bars)
    }

    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, DataError> {
        let fallback = self.chart_profile(symbol);
        let url = self.summary_url(symbol, self.crumb());
        match self.get_json::<SummaryResponse>(symbol, &url) {
            Ok(summary) => Self::parse_summary(symbol, summary, fallback),
            Err(DataError::CircuitBreakerTripped) => Err(DataError::CircuitBreakerTripped),
            Err(e) => {
                tracing::info!(
                    symbol,
                    error = %e,
                    "quoteSummary unavailable, using chart metadata"
                );
                Ok(fallback)
            }
        }
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
