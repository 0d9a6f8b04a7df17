//! Fetch capabilities: the boundary to the external data provider.
//!
//! Request handling never talks to the provider directly. Each endpoint key is
//! bound to a [`FetchCapability`] in a [`CapabilityRegistry`], together with
//! the default arguments that endpoint has always been called with. Tests bind
//! the in-memory [`FixtureCapability`] instead of the HTTP gateway.

pub mod fixture;
pub mod gateway;

pub use fixture::FixtureCapability;
pub use gateway::GatewayCapability;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::grammar::CallDescriptor;
use crate::pipeline::Dataset;
use crate::value::ParamValue;

/// Endpoint key of the v4 geo-temporal query.
pub const GEO_TEMPORAL_QUERY: &str = "geo_temporal_query";

/// v3 endpoint keys with a data-retrieval binding.
pub const V3_ENDPOINTS: &[&str] = &[
    "cme-history",
    "drought-monitor",
    "dutch-station-history",
    "forecasts",
    "german-station-history",
    "ghcn-history",
    "grid-history",
    "japan-station-history",
];

/// Errors from fetch capabilities. Their text is passed through to the
/// response without interpretation.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable provider reply: {0}")]
    Decode(String),
    #[error("No data returned for request")]
    NoData,
}

/// What a capability hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedData {
    /// Time-indexed series or table
    Frame(Dataset),
    /// Pre-reduced number (geo-temporal queries)
    Scalar(f64),
    /// Key-value metadata document
    Metadata(serde_json::Map<String, serde_json::Value>),
    /// Opaque bytes
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub data: FetchedData,
    pub unit: Option<String>,
}

impl FetchResponse {
    pub fn new(data: FetchedData, unit: Option<String>) -> Self {
        Self { data, unit }
    }
}

/// A source of data for one or more endpoint keys.
#[async_trait]
pub trait FetchCapability: Send + Sync {
    async fn fetch(&self, call: &CallDescriptor) -> Result<FetchResponse, FetchError>;
}

/// A capability plus the arguments it is called with unless the request
/// supplies its own.
#[derive(Clone)]
pub struct Binding {
    pub capability: Arc<dyn FetchCapability>,
    pub defaults: IndexMap<String, ParamValue>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// Endpoint key → binding. Keys without a binding are left out of the
/// schema table.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    bindings: HashMap<String, Binding>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every known endpoint key to `capability` with its standard defaults.
    pub fn with_defaults(capability: Arc<dyn FetchCapability>) -> Self {
        let mut registry = Self::new();
        for key in V3_ENDPOINTS.iter().chain(std::iter::once(&GEO_TEMPORAL_QUERY)) {
            registry.bind_with_defaults(key, capability.clone(), endpoint_defaults(key));
        }
        registry
    }

    pub fn bind(&mut self, key: &str, capability: Arc<dyn FetchCapability>) {
        self.bind_with_defaults(key, capability, IndexMap::new());
    }

    pub fn bind_with_defaults(
        &mut self,
        key: &str,
        capability: Arc<dyn FetchCapability>,
        defaults: IndexMap<String, ParamValue>,
    ) {
        self.bindings.insert(
            key.to_string(),
            Binding {
                capability,
                defaults,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&Binding> {
        self.bindings.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Default arguments each endpoint is called with.
pub fn endpoint_defaults(key: &str) -> IndexMap<String, ParamValue> {
    let flag = ParamValue::Bool;
    let text = |s: &str| ParamValue::Str(s.to_string());
    let entries: Vec<(&str, ParamValue)> = match key {
        "grid-history" => vec![
            ("also_return_metadata", flag(false)),
            ("also_return_snapped_coordinates", flag(true)),
            ("use_imperial_units", flag(true)),
            ("desired_units", ParamValue::Null),
            ("as_of", ParamValue::Null),
            ("convert_to_local_time", flag(true)),
        ],
        "forecasts" => vec![
            ("also_return_metadata", flag(false)),
            ("also_return_snapped_coordinates", flag(true)),
            ("use_imperial_units", flag(true)),
            ("desired_units", ParamValue::Null),
            ("convert_to_local_time", flag(true)),
        ],
        "cme-history" => vec![("desired_units", ParamValue::Null)],
        "dutch-station-history" => vec![
            ("dataset", text("dutch_stations-daily")),
            ("desired_units", ParamValue::Null),
        ],
        "german-station-history" => vec![
            ("dataset", text("dwd_stations-daily")),
            ("desired_units", ParamValue::Null),
        ],
        "ghcn-history" => vec![
            ("dataset", text("ghcnd")),
            ("use_imperial_units", flag(true)),
            ("desired_units", ParamValue::Null),
        ],
        GEO_TEMPORAL_QUERY => vec![("as_of", ParamValue::Null), ("point_limit", ParamValue::Null)],
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_binds_all_endpoints() {
        let registry = CapabilityRegistry::with_defaults(Arc::new(FixtureCapability::new()));
        assert_eq!(registry.len(), V3_ENDPOINTS.len() + 1);
        assert!(registry.contains("grid-history"));
        assert!(registry.contains(GEO_TEMPORAL_QUERY));
        assert!(!registry.contains("metadata"));
    }

    #[test]
    fn test_endpoint_defaults() {
        let grid = endpoint_defaults("grid-history");
        assert_eq!(grid["use_imperial_units"], ParamValue::Bool(true));
        assert_eq!(grid["as_of"], ParamValue::Null);
        assert!(!endpoint_defaults("forecasts").contains_key("as_of"));
        assert_eq!(
            endpoint_defaults("german-station-history")["dataset"],
            ParamValue::Str("dwd_stations-daily".into())
        );
        assert!(endpoint_defaults("japan-station-history").is_empty());
    }

    #[test]
    fn test_no_data_message() {
        assert_eq!(FetchError::NoData.to_string(), "No data returned for request");
    }
}
