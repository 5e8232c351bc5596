//! Mock land-cover lookup service
//!
//! Stands in for the remote classification service during local runs.
//!
//! Endpoints (single path, selected by query):
//! - `GET /landcover?request=getValues&coords=<lon>,<lat>` -> `{"data": ["<code>"]}`
//! - `GET /landcover?request=getLegend` -> `{"data": {"<code>": "<class>", ...}}`
//!
//! Codes are derived deterministically from the coordinate, so repeated runs
//! over the same file give the same classes. One grid slot in seventeen
//! answers with an empty list, another with a code missing from the legend.
//!
//! Usage:
//!   cargo run --bin mock-landcover -- --port 9300 --latency-ms 20

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use track_enrich::infra::logging;

/// CORINE-style codes and class names served by the mock
const LEGEND: [(&str, &str); 8] = [
    ("111", "Continuous urban fabric"),
    ("211", "Non-irrigated arable land"),
    ("223", "Olive groves"),
    ("311", "Broad-leaved forest"),
    ("312", "Coniferous forest"),
    ("321", "Natural grasslands"),
    ("411", "Inland marshes"),
    ("512", "Water bodies"),
];

/// Not part of `LEGEND`
const UNLISTED_CODE: &str = "999";

#[derive(Parser, Debug)]
#[command(name = "mock-landcover")]
#[command(about = "Mock land-cover lookup service for local runs")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "9300")]
    port: u16,

    /// Artificial latency added to every getValues request (ms)
    #[arg(long, default_value = "0")]
    latency_ms: u64,

    /// Answer every Nth getValues request with HTTP 503 (0 disables)
    #[arg(long, default_value = "0")]
    fail_every: u64,
}

struct MockState {
    latency: Duration,
    fail_every: u64,
    requests: AtomicU64,
}

/// Deterministic code for a coordinate, `None` for "no data"
fn classify(lon: f64, lat: f64) -> Option<&'static str> {
    // 0.01 degree grid
    let cell = ((lon * 100.0).floor() as i64).wrapping_mul(31) ^ ((lat * 100.0).floor() as i64);
    let slot = cell.rem_euclid(17) as usize;
    match slot {
        16 => None,
        15 => Some(UNLISTED_CODE),
        n => Some(LEGEND[n % LEGEND.len()].0),
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn parse_coords(value: &str) -> Option<(f64, f64)> {
    // `,` may arrive percent-encoded
    let value = value.replace("%2C", ",").replace("%2c", ",");
    let (lon, lat) = value.split_once(',')?;
    Some((lon.trim().parse().ok()?, lat.trim().parse().ok()?))
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn legend_body() -> String {
    let data: serde_json::Map<String, serde_json::Value> =
        LEGEND.iter().map(|(code, name)| (code.to_string(), (*name).into())).collect();
    serde_json::json!({ "data": data }).to_string()
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<MockState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        let body = r#"{"error":"GET only"}"#.to_string();
        return Ok(json_response(StatusCode::METHOD_NOT_ALLOWED, body));
    }

    let query = req.uri().query().unwrap_or("");
    match query_param(query, "request") {
        Some("getLegend") => {
            info!("legend_requested");
            Ok(json_response(StatusCode::OK, legend_body()))
        }
        Some("getValues") => {
            let n = state.requests.fetch_add(1, Ordering::Relaxed) + 1;
            if !state.latency.is_zero() {
                tokio::time::sleep(state.latency).await;
            }
            if state.fail_every > 0 && n % state.fail_every == 0 {
                return Ok(json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    r#"{"error":"busy"}"#.into(),
                ));
            }

            let Some((lon, lat)) = query_param(query, "coords").and_then(parse_coords) else {
                return Ok(json_response(
                    StatusCode::BAD_REQUEST,
                    r#"{"error":"coords must be <lon>,<lat>"}"#.into(),
                ));
            };

            let data = match classify(lon, lat) {
                Some(code) => serde_json::json!([code]),
                None => serde_json::json!([]),
            };
            debug!(lon = %lon, lat = %lat, data = %data, "values_requested");
            Ok(json_response(StatusCode::OK, serde_json::json!({ "data": data }).to_string()))
        }
        _ => Ok(json_response(StatusCode::NOT_FOUND, r#"{"error":"unknown request"}"#.into())),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logging::init(false);
    let args = Args::parse();

    let state = Arc::new(MockState {
        latency: Duration::from_millis(args.latency_ms),
        fail_every: args.fail_every,
        requests: AtomicU64::new(0),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        latency_ms = %args.latency_ms,
        fail_every = %args.fail_every,
        "mock_landcover_started"
    );

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = Arc::clone(&state);

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = Arc::clone(&state);
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "mock_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "mock_accept_error");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let requests = state.requests.load(Ordering::Relaxed);
                info!(requests = %requests, "mock_landcover_shutdown");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_deterministic() {
        assert_eq!(classify(14.2681, 40.8518), classify(14.2681, 40.8518));
        assert_eq!(classify(14.26812, 40.85181), classify(14.2681, 40.8518));
    }

    #[test]
    fn test_classify_covers_no_data_and_unlisted() {
        let outcomes: Vec<Option<&str>> =
            (0..400).map(|i| classify(10.0 + i as f64 * 0.01, 45.0)).collect();
        assert!(outcomes.iter().any(Option::is_none));
        assert!(outcomes.contains(&Some(UNLISTED_CODE)));
        assert!(outcomes.contains(&Some("311")));
    }

    #[test]
    fn test_query_parsing() {
        let query = "request=getValues&coords=14.25,40.5";
        assert_eq!(query_param(query, "request"), Some("getValues"));
        assert_eq!(query_param(query, "coords").and_then(parse_coords), Some((14.25, 40.5)));
        assert_eq!(parse_coords("14.25%2C40.5"), Some((14.25, 40.5)));
        assert_eq!(parse_coords("14.25"), None);
        assert_eq!(query_param(query, "missing"), None);
    }

    #[test]
    fn test_legend_body_lists_every_code() {
        let value: serde_json::Value = serde_json::from_str(&legend_body()).unwrap();
        assert_eq!(value["data"].as_object().unwrap().len(), LEGEND.len());
        assert_eq!(value["data"]["512"], "Water bodies");
    }
}
