//! Inbound request envelope and the success-shaped response.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, AdapterResult};
use crate::pipeline::Reduced;

/// Job id used when the caller sends none.
pub const DEFAULT_JOB_ID: &str = "2";

/// HTTP status reported inside every response body.
pub const STATUS_OK: u16 = 200;

fn default_job_id() -> Value {
    Value::String(DEFAULT_JOB_ID.to_string())
}

/// `{ "id": ..., "data": {...} }` as posted by the oracle node.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default = "default_job_id")]
    pub id: Value,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Default for RequestEnvelope {
    fn default() -> Self {
        Self {
            id: default_job_id(),
            data: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Validated contents of the envelope's `data` field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequestData {
    pub request_url: String,
    #[serde(default)]
    pub request_ops: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub request_params: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spatial_parameters: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temporal_parameters: Vec<Value>,
}

impl RequestData {
    /// Validate and decode the envelope's `data` field.
    pub fn from_envelope(data: Option<&Value>) -> AdapterResult<Self> {
        let fields = match data {
            Some(Value::Object(fields)) if !fields.is_empty() => fields,
            _ => return Err(AdapterError::empty_request()),
        };
        match fields.get("request_url") {
            None | Some(Value::Null) => return Err(AdapterError::missing_url()),
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(AdapterError::MalformedRequest(
                    "request_url must be a string".to_string(),
                ))
            }
        }
        serde_json::from_value(Value::Object(fields.clone()))
            .map_err(|e| AdapterError::MalformedRequest(format!("invalid request data: {}", e)))
    }

    /// Spatial then temporal v4 tokens, as text.
    pub fn parameter_tokens(&self) -> Vec<String> {
        self.spatial_parameters
            .iter()
            .chain(&self.temporal_parameters)
            .map(|token| match token {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// `{ "unit": ..., "data": ... }`. On failure `unit` carries the error
/// message and `data` is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub unit: String,
    pub data: i128,
}

impl ResultPayload {
    pub fn failure(error: &AdapterError) -> Self {
        Self {
            unit: error.to_string(),
            data: 0,
        }
    }
}

impl From<Reduced> for ResultPayload {
    fn from(reduced: Reduced) -> Self {
        Self {
            unit: reduced.unit,
            data: reduced.data,
        }
    }
}

/// Response body, always reported with status 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    #[serde(rename = "jobRunID")]
    pub job_run_id: Value,
    pub result: ResultPayload,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl AdapterResponse {
    pub fn new(job_run_id: Value, result: ResultPayload) -> Self {
        Self {
            job_run_id,
            result,
            status_code: STATUS_OK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_defaults() {
        let envelope: RequestEnvelope = serde_json::from_value(json!({})).unwrap();
        assert_eq!(envelope.id, json!("2"));
        assert!(envelope.data.is_none());

        let envelope: RequestEnvelope = serde_json::from_value(json!({"id": 7})).unwrap();
        assert_eq!(envelope.id, json!(7));
    }

    #[test]
    fn test_empty_data_rejected() {
        for data in [None, Some(json!(null)), Some(json!({})), Some(json!("x"))] {
            let err = RequestData::from_envelope(data.as_ref()).unwrap_err();
            assert_eq!(err.to_string(), "request data empty");
        }
    }

    #[test]
    fn test_missing_url_rejected() {
        let data = json!({"request_ops": ["mean"]});
        assert_eq!(
            RequestData::from_envelope(Some(&data)).unwrap_err().to_string(),
            "request_url missing"
        );
        let data = json!({"request_url": 12});
        assert!(matches!(
            RequestData::from_envelope(Some(&data)),
            Err(AdapterError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_request_data_fields() {
        let data = json!({
            "request_url": "/apiv4/geo_temporal_query/era5",
            "request_params": null,
            "spatial_parameters": ["point_params", 1.375, "103.875"],
            "temporal_parameters": ["time_range", "2022-09-01", "2022-09-30"]
        });
        let request = RequestData::from_envelope(Some(&data)).unwrap();
        assert!(request.request_ops.is_none());
        assert!(request.request_params.is_empty());
        assert_eq!(
            request.parameter_tokens(),
            vec!["point_params", "1.375", "103.875", "time_range", "2022-09-01", "2022-09-30"]
        );
    }

    #[test]
    fn test_response_shape() {
        let response = AdapterResponse::new(
            json!(0),
            ResultPayload::failure(&AdapterError::NoTerminalStep),
        );
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            json!({
                "jobRunID": 0,
                "result": {"unit": "No return specified", "data": 0},
                "statusCode": 200
            })
        );
    }

    #[test]
    fn test_large_fixed_point_serializes_as_integer() {
        let payload = ResultPayload {
            unit: "mm * 1e+18".into(),
            data: 72_000_000_000_000_000_000,
        };
        let text = serde_json::to_string(&payload).unwrap();
        assert_eq!(text, r#"{"unit":"mm * 1e+18","data":72000000000000000000}"#);
    }
}
