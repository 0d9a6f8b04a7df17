//! dClimate oracle adapter
//!
//! Translates oracle job requests into data-provider calls and reduces the
//! fetched data to a single fixed-point integer.
//!
//! # Flow
//!
//! - `request_url` is matched against the schema table by version base path
//! - the version's grammar (v3 or v4) parses it into a [`CallDescriptor`]
//! - the dispatcher calls the capability bound to the endpoint
//! - the requested operation pipeline reduces the result, scaled by 1e18

pub mod adapter;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod grammar;
pub mod pipeline;
pub mod provider;
pub mod request;
pub mod schema;
pub mod value;

pub use adapter::Adapter;
pub use config::{AdapterConfig, ConfigError};
pub use dispatch::Dispatcher;
pub use error::{AdapterError, AdapterResult};
pub use grammar::{CallDescriptor, ParsedRequest, RequestGrammar};
pub use pipeline::{Pipeline, PipelineStep, Reduced};
pub use provider::{CapabilityRegistry, FetchCapability, FetchError, FetchResponse, FetchedData};
pub use request::{AdapterResponse, RequestEnvelope, ResultPayload};
pub use schema::{ApiDocument, SchemaError, SchemaTable};
pub use value::ParamValue;
