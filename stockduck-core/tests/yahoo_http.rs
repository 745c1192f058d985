//! Yahoo provider HTTP handling against a local scripted server.

use chrono::NaiveDate;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use stockduck_core::data::circuit_breaker::BreakerState;
use stockduck_core::data::{CircuitBreaker, DataError, DataProvider, YahooProvider};
use stockduck_core::CompanyProfile;

const CHART_JSON: &str = r#"{"chart":{"result":[{
    "meta": {"longName": "Apple Inc."},
    "timestamp": [1704205800],
    "indicators": {
        "quote": [{"open": [187.15], "high": [188.44], "low": [183.89],
                   "close": [185.64], "volume": [82488700]}],
        "adjclose": [{"adjclose": [184.29]}]
    }
}],"error":null}}"#;

const SUMMARY_JSON: &str = r#"{"quoteSummary":{"result":[{
    "price": {"longName": "Microsoft Corporation", "marketCap": {"raw": 3100000000000}},
    "assetProfile": {"sector": "Technology"}
}],"error":null}}"#;

struct Reply {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: &'static str,
}

fn reply(status: u16, body: &'static str) -> Reply {
    Reply {
        status,
        headers: vec![],
        body,
    }
}

fn with_header(mut r: Reply, name: &'static str, value: &'static str) -> Reply {
    r.headers.push((name, value));
    r
}

/// Serve one scripted reply per connection; returns the base URL and the
/// request heads seen so far.
fn serve(replies: Vec<Reply>) -> (String, Arc<Mutex<Vec<String>>>) {
    // keep a system proxy from intercepting loopback requests
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    thread::spawn(move || {
        for r in replies {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&chunk[..n]),
                }
            }
            log.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&head).into_owned());

            let mut out = format!(
                "HTTP/1.1 {} Scripted\r\ncontent-length: {}\r\nconnection: close\r\n",
                r.status,
                r.body.len()
            );
            for (name, value) in &r.headers {
                out.push_str(&format!("{name}: {value}\r\n"));
            }
            out.push_str("\r\n");
            out.push_str(r.body);
            let _ = stream.write_all(out.as_bytes());
        }
    });

    (base, seen)
}

fn provider(base: &str, breaker: &Arc<CircuitBreaker>) -> YahooProvider {
    YahooProvider::with_base_url(Arc::clone(breaker), base)
        .unwrap()
        .with_retry_policy(Duration::from_millis(1), Duration::from_millis(100))
}

fn jan() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
}

#[test]
fn rate_limit_waits_for_retry_after_without_tripping_breaker() {
    let limited = || with_header(reply(429, ""), "retry-after", "1");
    let (base, seen) = serve(vec![limited(), limited(), limited(), reply(200, CHART_JSON)]);
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let yahoo = provider(&base, &breaker);
    let (start, end) = jan();

    let started = Instant::now();
    let bars = yahoo.fetch_history("AAPL", start, end).unwrap();

    assert_eq!(bars.len(), 1);
    assert_eq!(seen.lock().unwrap().len(), 4);
    // three waits, each the capped Retry-After rather than the 1/2/4 ms backoff
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn rate_limit_exhausting_retries_reports_retry_after() {
    let limited = || with_header(reply(429, ""), "retry-after", "7");
    let (base, _) = serve(vec![limited(), limited(), limited(), limited()]);
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let (start, end) = jan();

    let err = provider(&base, &breaker)
        .fetch_history("AAPL", start, end)
        .unwrap_err();

    assert!(matches!(err, DataError::RateLimited { retry_after_secs: 7 }));
    assert!(breaker.is_allowed());
}

#[test]
fn forbidden_trips_breaker_and_stops_requests() {
    let (base, seen) = serve(vec![reply(403, "")]);
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let yahoo = provider(&base, &breaker);
    let (start, end) = jan();

    let first = yahoo.fetch_history("AAPL", start, end).unwrap_err();
    assert!(matches!(first, DataError::CircuitBreakerTripped));
    assert!(!yahoo.is_available());

    let second = yahoo.fetch_history("MSFT", start, end).unwrap_err();
    assert!(matches!(second, DataError::CircuitBreakerTripped));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn unauthorized_and_not_found_are_not_retried() {
    let (base, seen) = serve(vec![reply(401, ""), reply(404, "")]);
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let yahoo = provider(&base, &breaker);
    let (start, end) = jan();

    let auth = yahoo.fetch_history("AAPL", start, end).unwrap_err();
    assert!(matches!(auth, DataError::AuthenticationRequired(_)));

    let missing = yahoo.fetch_history("ZZZZ", start, end).unwrap_err();
    assert!(matches!(missing, DataError::SymbolNotFound { ref symbol } if symbol == "ZZZZ"));

    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn server_errors_retry_three_times() {
    let (base, seen) = serve(vec![
        reply(500, ""),
        reply(502, ""),
        reply(503, ""),
        reply(500, ""),
    ]);
    let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(60), 10));
    let (start, end) = jan();

    let err = provider(&base, &breaker)
        .fetch_history("AAPL", start, end)
        .unwrap_err();

    assert!(matches!(err, DataError::Other(_)));
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[test]
fn profile_sends_session_cookie_and_crumb() {
    let (base, seen) = serve(vec![
        with_header(reply(404, ""), "set-cookie", "B=session42; Path=/"),
        reply(200, "cr/umb"),
        reply(200, SUMMARY_JSON),
    ]);
    let breaker = Arc::new(CircuitBreaker::default_provider());

    let profile = provider(&base, &breaker).fetch_profile("MSFT").unwrap();

    assert_eq!(profile.company, "Microsoft Corporation");
    assert_eq!(profile.sector, "Technology");
    assert_eq!(profile.market_cap, 3_100_000_000_000);

    let seen = seen.lock().unwrap();
    assert!(seen[1].starts_with("GET /v1/test/getcrumb"));
    assert!(seen[1].to_ascii_lowercase().contains("cookie: b=session42"));
    assert!(seen[2].starts_with("GET /v10/finance/quoteSummary/MSFT?"));
    assert!(seen[2].contains("crumb=cr%2Fumb"));
}

#[test]
fn refused_crumb_falls_back_to_default_profile() {
    let (base, seen) = serve(vec![reply(404, ""), reply(401, ""), reply(401, "")]);
    let breaker = Arc::new(CircuitBreaker::default_provider());

    let profile = provider(&base, &breaker).fetch_profile("MSFT").unwrap();

    assert_eq!(profile, CompanyProfile::fallback("MSFT"));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(!seen[2].contains("crumb="));
}
