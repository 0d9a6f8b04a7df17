//! HTTP gateway to the data provider.
//!
//! Each call is POSTed as JSON to `<base_url>/<endpoint_key>`, and the
//! gateway answers with a reply tagged by `kind`:
//!
//! ```json
//! {"kind": "series", "name": "precip", "index": ["2022-09-01T00:00:00Z"], "values": [1.5], "unit": "mm"}
//! {"kind": "table", "index": [...], "columns": {"tmin": [...], "tmax": [...]}, "unit": "degF"}
//! {"kind": "scalar", "value": 301.2, "unit": "K"}
//! {"kind": "metadata", "document": {...}}
//! {"kind": "binary", "bytes": [...]}
//! ```
//!
//! Missing observations are sent as `null`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use super::{FetchCapability, FetchError, FetchResponse, FetchedData};
use crate::grammar::CallDescriptor;
use crate::pipeline::Dataset;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum GatewayReply {
    Series {
        #[serde(default)]
        name: String,
        index: Vec<DateTime<Utc>>,
        values: Vec<Option<f64>>,
        #[serde(default)]
        unit: Option<String>,
    },
    Table {
        index: Vec<DateTime<Utc>>,
        columns: IndexMap<String, Vec<Option<f64>>>,
        #[serde(default)]
        unit: Option<String>,
    },
    Scalar {
        value: f64,
        #[serde(default)]
        unit: Option<String>,
    },
    Metadata {
        document: serde_json::Map<String, serde_json::Value>,
    },
    Binary {
        bytes: Vec<u8>,
    },
}

fn fill_missing(values: Vec<Option<f64>>) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

impl GatewayReply {
    fn into_response(self) -> Result<FetchResponse, FetchError> {
        let response = match self {
            GatewayReply::Series {
                name,
                index,
                values,
                unit,
            } => {
                if index.is_empty() {
                    return Err(FetchError::NoData);
                }
                let series =
                    Dataset::series(name, index, fill_missing(values)).map_err(FetchError::Decode)?;
                FetchResponse::new(FetchedData::Frame(series), unit)
            }
            GatewayReply::Table {
                index,
                columns,
                unit,
            } => {
                if index.is_empty() {
                    return Err(FetchError::NoData);
                }
                let columns = columns
                    .into_iter()
                    .map(|(name, values)| (name, fill_missing(values)))
                    .collect();
                let table = Dataset::table(index, columns).map_err(FetchError::Decode)?;
                FetchResponse::new(FetchedData::Frame(table), unit)
            }
            GatewayReply::Scalar { value, unit } => {
                FetchResponse::new(FetchedData::Scalar(value), unit)
            }
            GatewayReply::Metadata { document } => {
                FetchResponse::new(FetchedData::Metadata(document), None)
            }
            GatewayReply::Binary { bytes } => FetchResponse::new(FetchedData::Binary(bytes), None),
        };
        Ok(response)
    }
}

/// Fetch capability backed by the provider's HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayCapability {
    base_url: String,
    client: reqwest::Client,
}

impl GatewayCapability {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl FetchCapability for GatewayCapability {
    async fn fetch(&self, call: &CallDescriptor) -> Result<FetchResponse, FetchError> {
        let url = self.endpoint_url(&call.endpoint_key);
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .json(call)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GatewayReply = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        log::debug!("gateway {} answered in {:?}", url, start.elapsed());
        reply.into_response()
    }
}
