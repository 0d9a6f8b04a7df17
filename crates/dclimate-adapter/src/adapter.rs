//! Request boundary.
//!
//! Every request produces a success-shaped [`AdapterResponse`]; failures are
//! reported through the `unit` field with `data` set to zero.

use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::Dispatcher;
use crate::error::{AdapterError, AdapterResult};
use crate::grammar::{ParsedRequest, RequestTarget};
use crate::pipeline::Reduced;
use crate::request::{AdapterResponse, RequestData, RequestEnvelope, ResultPayload};
use crate::schema::SchemaTable;

#[derive(Debug, Clone)]
pub struct Adapter {
    table: Arc<SchemaTable>,
    dispatcher: Dispatcher,
}

impl Adapter {
    pub fn new(table: SchemaTable) -> Self {
        let table = Arc::new(table);
        Self {
            dispatcher: Dispatcher::new(table.clone()),
            table,
        }
    }

    pub fn table(&self) -> &SchemaTable {
        &self.table
    }

    /// Translate a request into a call descriptor and pipeline without
    /// fetching anything.
    pub fn parse(&self, request: &RequestData) -> AdapterResult<ParsedRequest> {
        let target = RequestTarget::parse(&request.request_url)?;
        let (version, rest) =
            self.table
                .version_for(&target.path)
                .ok_or_else(|| AdapterError::UnsupportedVersion {
                    supported: self.table.supported_versions(),
                })?;
        let parsed = version.grammar.parse(rest, &target, request, version)?;
        log::info!(
            "Request for {}{} parsed",
            version.base_path,
            parsed.call.endpoint_key
        );
        Ok(parsed)
    }

    async fn serve(&self, data: Option<&Value>) -> AdapterResult<Reduced> {
        let request = RequestData::from_envelope(data)?;
        let parsed = self.parse(&request)?;
        self.dispatcher.execute(parsed).await
    }

    /// Handle one envelope. Never fails: errors become the response's unit.
    pub async fn handle(&self, envelope: RequestEnvelope) -> AdapterResponse {
        let result = match self.serve(envelope.data.as_ref()).await {
            Ok(reduced) => ResultPayload::from(reduced),
            Err(e) => {
                log::warn!("Request {} failed: {}", envelope.id, e);
                ResultPayload::failure(&e)
            }
        };
        AdapterResponse::new(envelope.id, result)
    }

    /// Handle a raw request body. Bodies that are not a JSON envelope are
    /// treated as carrying no request data.
    pub async fn handle_body(&self, body: &[u8]) -> AdapterResponse {
        let envelope = match serde_json::from_slice::<RequestEnvelope>(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("Unreadable request body: {}", e);
                RequestEnvelope::default()
            }
        };
        self.handle(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CapabilityRegistry, FixtureCapability};
    use crate::schema::ApiDocument;
    use serde_json::json;

    const DOC: &str = r#"{
        "basePath": "/apiv3",
        "paths": {"/ghcn-history/{station_id}/{weather_variable}": {}}
    }"#;

    fn adapter() -> Adapter {
        let registry = CapabilityRegistry::with_defaults(Arc::new(FixtureCapability::new()));
        let doc = ApiDocument::from_json(DOC).unwrap();
        Adapter::new(SchemaTable::build(&[doc], &registry, Some("/apiv4")).unwrap())
    }

    fn envelope(body: Value) -> RequestEnvelope {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_version() {
        let response = adapter()
            .handle(envelope(json!({"id": 1, "data": {"request_url": "/apiv2/ghcn-history/a/b"}})))
            .await;
        assert_eq!(response.job_run_id, json!(1));
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.result.unit,
            "Incompatible API version, please use /apiv3/ or /apiv4"
        );
        assert_eq!(response.result.data, 0);
    }

    #[tokio::test]
    async fn test_empty_and_garbage_bodies() {
        let adapter = adapter();
        let response = adapter.handle(envelope(json!({"id": "a", "data": {}}))).await;
        assert_eq!(response.result.unit, "request data empty");

        let response = adapter.handle_body(b"not json").await;
        assert_eq!(response.job_run_id, json!("2"));
        assert_eq!(response.result.unit, "request data empty");
    }

    #[tokio::test]
    async fn test_fetch_failure_in_envelope() {
        let response = adapter()
            .handle(envelope(json!({"data": {"request_url": "/apiv3/ghcn-history/USW00003016/TMAX"}})))
            .await;
        assert_eq!(
            response.result.unit,
            "Request errored: No data returned for request"
        );
    }

    #[test]
    fn test_parse_only() {
        let request = RequestData {
            request_url: "/apiv3/ghcn-history/USW00003016/TMAX".into(),
            ..RequestData::default()
        };
        let parsed = adapter().parse(&request).unwrap();
        assert_eq!(parsed.call.endpoint_key, "ghcn-history");
        assert_eq!(parsed.call.version, "/apiv3/");
    }
}
