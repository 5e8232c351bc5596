//! Land-cover lookup service client
//!
//! Two request shapes against one endpoint:
//! - `?request=getValues&coords=<lon>,<lat>` -> `{"data": [code, ...]}`
//! - `?request=getLegend` -> `{"data": {code: className, ...}}`
//!
//! A values response may carry several candidate codes; only the first is used.

use crate::domain::error::{FailureReason, LookupFailure};
use crate::domain::types::{LandcoverCode, LegendMap};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Something that can classify a coordinate and provide the legend.
///
/// The enricher only depends on this trait so tests can substitute fakes.
#[async_trait]
pub trait LandcoverClient: Send + Sync {
    /// Classify one coordinate. No retries.
    async fn lookup(&self, lon: f64, lat: f64) -> Result<LandcoverCode, LookupFailure>;

    /// Fetch the code -> class name legend
    async fn fetch_legend(&self) -> Result<LegendMap, LookupFailure>;
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct LegendResponse {
    data: serde_json::Map<String, Value>,
}

/// Render a JSON scalar as a code string. Strings verbatim, numbers as decimal text.
fn code_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a getValues body, taking the first element as the code
pub fn parse_values_response(body: &[u8]) -> Result<LandcoverCode, LookupFailure> {
    let response: ValuesResponse = serde_json::from_slice(body)
        .map_err(|e| LookupFailure::new(FailureReason::Parse(e.to_string())))?;

    let first = response.data.first().ok_or(LookupFailure::new(FailureReason::NoData))?;
    match first {
        Value::Null => Err(LookupFailure::new(FailureReason::NoData)),
        other => code_from_value(other).map(LandcoverCode).ok_or_else(|| {
            LookupFailure::new(FailureReason::Parse(format!("unexpected code value {other}")))
        }),
    }
}

/// Parse a getLegend body into a legend map
pub fn parse_legend_response(body: &[u8]) -> Result<LegendMap, LookupFailure> {
    let response: LegendResponse = serde_json::from_slice(body)
        .map_err(|e| LookupFailure::new(FailureReason::Parse(e.to_string())))?;

    if response.data.is_empty() {
        return Err(LookupFailure::new(FailureReason::NoData));
    }

    response
        .data
        .into_iter()
        .map(|(code, name)| {
            let name = code_from_value(&name).ok_or_else(|| {
                LookupFailure::new(FailureReason::Parse(format!(
                    "legend entry {code} has non-scalar name"
                )))
            })?;
            Ok((LandcoverCode(code), name))
        })
        .collect()
}

/// Build a request URL, appending to any query the endpoint already carries
fn request_url(endpoint: &str, query: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}{query}")
}

/// HTTP implementation backed by a shared reqwest client
pub struct HttpLandcoverClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpLandcoverClient {
    /// Create the client once for reuse (connection pooling)
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LookupFailure> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupFailure::new(FailureReason::Transport(e.to_string())))?;

        let endpoint = endpoint.into();
        info!(
            endpoint = %endpoint,
            timeout_ms = %timeout.as_millis(),
            "landcover_client_initialized"
        );
        Ok(Self { endpoint, http })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, LookupFailure> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| LookupFailure::new(FailureReason::Transport(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupFailure::new(FailureReason::UpstreamStatus(status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupFailure::new(FailureReason::Transport(e.to_string())))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl LandcoverClient for HttpLandcoverClient {
    async fn lookup(&self, lon: f64, lat: f64) -> Result<LandcoverCode, LookupFailure> {
        let url = request_url(&self.endpoint, &format!("request=getValues&coords={lon},{lat}"));
        let body = self.get(&url).await?;
        let code = parse_values_response(&body)?;
        debug!(lon = %lon, lat = %lat, code = %code, "landcover_lookup");
        Ok(code)
    }

    async fn fetch_legend(&self) -> Result<LegendMap, LookupFailure> {
        let url = request_url(&self.endpoint, "request=getLegend");
        let body = self.get(&url).await?;
        let legend = parse_legend_response(&body)?;
        info!(classes = %legend.len(), "legend_fetched");
        Ok(legend)
    }
}
