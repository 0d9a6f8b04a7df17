//! Request dispatcher: hands a parsed call to the capability bound to its
//! endpoint and reduces what comes back.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{AdapterError, AdapterResult};
use crate::grammar::{CallDescriptor, ParsedRequest};
use crate::pipeline::{scaled_unit, to_fixed_point, Reduced};
use crate::provider::{FetchResponse, FetchedData};
use crate::schema::SchemaTable;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<SchemaTable>,
}

impl Dispatcher {
    pub fn new(table: Arc<SchemaTable>) -> Self {
        Self { table }
    }

    /// Call the capability bound to `call`'s endpoint, with the endpoint's
    /// default arguments filled in.
    pub async fn fetch(&self, mut call: CallDescriptor) -> AdapterResult<FetchResponse> {
        let endpoint = self
            .table
            .resolve(&call.version, &call.endpoint_key)
            .ok_or_else(|| AdapterError::UnknownEndpoint {
                key: call.endpoint_key.clone(),
            })?;
        call.apply_defaults(&endpoint.fetch.defaults);

        let start = Instant::now();
        let result = endpoint.fetch.capability.fetch(&call).await;
        log::info!(
            "{} fetch took {:.3}s",
            call.endpoint_key,
            start.elapsed().as_secs_f64()
        );
        result.map_err(|e| AdapterError::FetchFailure(e.to_string()))
    }

    /// Fetch and reduce. Pre-reduced scalars skip the pipeline.
    pub async fn execute(&self, request: ParsedRequest) -> AdapterResult<Reduced> {
        let ParsedRequest { call, pipeline } = request;
        let response = self.fetch(call).await?;
        let unit = response.unit.as_deref();
        match &response.data {
            FetchedData::Scalar(value) => Ok(Reduced {
                data: to_fixed_point(*value)?,
                unit: scaled_unit(unit),
            }),
            data => pipeline.unwrap_or_default().run(data, unit),
        }
    }

    pub fn table(&self) -> &SchemaTable {
        &self.table
    }
}
