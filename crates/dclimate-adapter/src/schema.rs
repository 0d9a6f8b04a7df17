//! Endpoint schema table built from API description documents.
//!
//! Each document (swagger-style JSON) contributes one API version. For every
//! documented data-retrieval path the table records the endpoint key, the
//! positional parameters named by the path template, the query parameters
//! with their declared types, and the fetch capability bound to the key.
//! The table is built once at startup and only read afterwards.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use crate::grammar::RequestGrammar;
use crate::provider::{Binding, CapabilityRegistry, GEO_TEMPORAL_QUERY};

/// `{name}` placeholders in a path template.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

/// Path fragments marking administrative, validation-only or unsupported paths.
const SKIPPED_PATH_MARKERS: [&str; 3] = ["user", "valid", "biomass"];

/// Query parameter that carries credentials, never an endpoint argument.
const AUTHORIZATION_PARAMETER: &str = "Authorization";

/// Startup-fatal problems with the API description documents.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("IO error reading {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Malformed API document: {0}")]
    Parse(String),
    #[error("Invalid base path '{0}': must start with '/'")]
    InvalidBasePath(String),
    #[error("Base path '{0}' is declared by more than one document")]
    DuplicateVersion(String),
}

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Boolean,
    /// `number` or `integer`
    Number,
    /// Arrays, objects and anything else written as a literal
    Composite,
}

impl ParamType {
    fn from_declared(declared: Option<&str>) -> Self {
        match declared {
            None | Some("string") => ParamType::String,
            Some("boolean") => ParamType::Boolean,
            Some("number") | Some("integer") => ParamType::Number,
            Some(_) => ParamType::Composite,
        }
    }
}

/// A swagger-style API description.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDocument {
    #[serde(rename = "basePath")]
    pub base_path: String,
    pub paths: IndexMap<String, PathItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub parameters: Vec<ParameterDoc>,
    #[serde(default)]
    pub get: Option<OperationDoc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationDoc {
    #[serde(default)]
    pub parameters: Vec<ParameterDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterDoc {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: Option<String>,
}

impl ApiDocument {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&contents)
    }
}

/// Everything needed to parse and serve one endpoint.
#[derive(Clone)]
pub struct EndpointSchema {
    /// Documented path template
    pub name: String,
    pub primary_params: Vec<String>,
    pub secondary_params: BTreeSet<String>,
    pub param_types: HashMap<String, ParamType>,
    pub fetch: Binding,
}

impl std::fmt::Debug for EndpointSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSchema")
            .field("name", &self.name)
            .field("primary_params", &self.primary_params)
            .field("secondary_params", &self.secondary_params)
            .field("param_types", &self.param_types)
            .finish_non_exhaustive()
    }
}

impl EndpointSchema {
    pub fn param_type(&self, name: &str) -> ParamType {
        self.param_types
            .get(name)
            .copied()
            .unwrap_or(ParamType::String)
    }
}

/// Endpoints of one API version, and the grammar its URLs are written in.
#[derive(Debug, Clone)]
pub struct VersionSchema {
    pub base_path: String,
    pub grammar: RequestGrammar,
    pub endpoints: IndexMap<String, EndpointSchema>,
}

/// Version base path → endpoints.
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    versions: IndexMap<String, VersionSchema>,
}

/// Endpoint key of a documented path: the segment before the first
/// placeholder, or the whole path without its leading `/`.
fn endpoint_key(path: &str) -> &str {
    let key = match path.find("/{") {
        Some(idx) => &path[..idx],
        None => path,
    };
    key.strip_prefix('/').unwrap_or(key)
}

fn placeholders(path: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(path)
        .map(|caps| caps[1].to_string())
        .collect()
}

impl SchemaTable {
    /// Build the table from v3 `documents`, binding capabilities from
    /// `registry`. When `v4_base_path` is set and the registry binds the
    /// geo-temporal query, a v4 version is registered under that base path.
    pub fn build(
        documents: &[ApiDocument],
        registry: &CapabilityRegistry,
        v4_base_path: Option<&str>,
    ) -> Result<Self, SchemaError> {
        let mut table = SchemaTable::default();
        for document in documents {
            let version = Self::build_version(document, registry)?;
            table.insert(version)?;
        }
        if let (Some(base_path), Some(binding)) = (v4_base_path, registry.get(GEO_TEMPORAL_QUERY)) {
            table.insert(Self::geo_temporal_version(base_path, binding.clone())?)?;
        }
        log::info!(
            "Schema table ready: {} version(s), {} endpoint(s)",
            table.versions.len(),
            table.versions.values().map(|v| v.endpoints.len()).sum::<usize>()
        );
        Ok(table)
    }

    fn insert(&mut self, version: VersionSchema) -> Result<(), SchemaError> {
        if self.versions.contains_key(&version.base_path) {
            return Err(SchemaError::DuplicateVersion(version.base_path));
        }
        self.versions.insert(version.base_path.clone(), version);
        Ok(())
    }

    fn build_version(
        document: &ApiDocument,
        registry: &CapabilityRegistry,
    ) -> Result<VersionSchema, SchemaError> {
        if !document.base_path.starts_with('/') {
            return Err(SchemaError::InvalidBasePath(document.base_path.clone()));
        }
        let base_path = format!("{}/", document.base_path.trim_end_matches('/'));

        let mut endpoints = IndexMap::new();
        for (path, item) in &document.paths {
            if SKIPPED_PATH_MARKERS.iter().any(|m| path.contains(m)) {
                log::debug!("Skipping {}{}: not a data endpoint", base_path, path);
                continue;
            }
            let key = endpoint_key(path);
            let Some(binding) = registry.get(key) else {
                log::debug!("Skipping {}{}: no capability bound to '{}'", base_path, path, key);
                continue;
            };

            let mut param_types = HashMap::new();
            for param in &item.parameters {
                param_types.insert(
                    param.name.clone(),
                    ParamType::from_declared(param.param_type.as_deref()),
                );
            }
            let mut secondary_params = BTreeSet::new();
            let query_params = item.get.as_ref().map(|g| g.parameters.as_slice()).unwrap_or(&[]);
            for param in query_params {
                if param.name == AUTHORIZATION_PARAMETER {
                    continue;
                }
                secondary_params.insert(param.name.clone());
                param_types.insert(
                    param.name.clone(),
                    ParamType::from_declared(param.param_type.as_deref()),
                );
            }

            endpoints.insert(
                key.to_string(),
                EndpointSchema {
                    name: path.clone(),
                    primary_params: placeholders(path),
                    secondary_params,
                    param_types,
                    fetch: binding.clone(),
                },
            );
        }

        Ok(VersionSchema {
            base_path,
            grammar: RequestGrammar::V3,
            endpoints,
        })
    }

    fn geo_temporal_version(base_path: &str, binding: Binding) -> Result<VersionSchema, SchemaError> {
        if !base_path.starts_with('/') {
            return Err(SchemaError::InvalidBasePath(base_path.to_string()));
        }
        let mut param_types = HashMap::new();
        param_types.insert("dataset_name".to_string(), ParamType::String);
        param_types.insert("output_format".to_string(), ParamType::String);

        let mut endpoints = IndexMap::new();
        endpoints.insert(
            GEO_TEMPORAL_QUERY.to_string(),
            EndpointSchema {
                name: format!("/{}/{{dataset_name}}", GEO_TEMPORAL_QUERY),
                primary_params: vec!["dataset_name".to_string()],
                secondary_params: BTreeSet::from(["output_format".to_string()]),
                param_types,
                fetch: binding,
            },
        );
        Ok(VersionSchema {
            base_path: base_path.trim_end_matches('/').to_string(),
            grammar: RequestGrammar::V4,
            endpoints,
        })
    }

    /// Version whose base path prefixes `path`, with the base path stripped.
    /// The prefix must end on a segment boundary, so `/apiv4extra` is not v4.
    pub fn version_for<'a>(&self, path: &'a str) -> Option<(&VersionSchema, &'a str)> {
        self.versions.values().find_map(|v| {
            let rest = path.strip_prefix(v.base_path.as_str())?;
            let on_boundary =
                v.base_path.ends_with('/') || rest.is_empty() || rest.starts_with('/');
            on_boundary.then_some((v, rest))
        })
    }

    pub fn version(&self, base_path: &str) -> Option<&VersionSchema> {
        self.versions.get(base_path)
    }

    pub fn resolve(&self, base_path: &str, key: &str) -> Option<&EndpointSchema> {
        self.versions.get(base_path)?.endpoints.get(key)
    }

    /// Registered base paths, as quoted back to clients using an unknown version.
    pub fn supported_versions(&self) -> String {
        self.versions
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" or ")
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FixtureCapability;
    use std::sync::Arc;

    const DOC: &str = r#"{
        "basePath": "/apiv3",
        "paths": {
            "/grid-history/{dataset}/{lat}_{lon}": {
                "parameters": [
                    {"name": "dataset", "in": "path", "type": "string"},
                    {"name": "lat", "in": "path", "type": "number"},
                    {"name": "lon", "in": "path", "type": "number"}
                ],
                "get": {"parameters": [
                    {"name": "Authorization", "in": "header", "type": "string"},
                    {"name": "use_imperial_units", "in": "query", "type": "boolean"},
                    {"name": "desired_units", "in": "query"}
                ]}
            },
            "/metadata/{dataset}": {"parameters": [{"name": "dataset", "type": "string"}]},
            "/user/login": {},
            "/rma-code-lookups/valid_states": {},
            "/ceda-biomass/{year}": {}
        }
    }"#;

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::with_defaults(Arc::new(FixtureCapability::new()))
    }

    #[test]
    fn test_endpoint_key_and_placeholders() {
        assert_eq!(endpoint_key("/grid-history/{dataset}/{lat}_{lon}"), "grid-history");
        assert_eq!(endpoint_key("/heads"), "heads");
        assert_eq!(
            placeholders("/forecasts/{dataset}/{forecast_date}/{lat}_{lon}"),
            vec!["dataset", "forecast_date", "lat", "lon"]
        );
        assert!(placeholders("/heads").is_empty());
    }

    #[test]
    fn test_build_from_document() {
        let doc = ApiDocument::from_json(DOC).unwrap();
        let table = SchemaTable::build(&[doc], &registry(), None).unwrap();
        assert_eq!(table.len(), 1);

        let version = table.version("/apiv3/").unwrap();
        assert_eq!(version.grammar, RequestGrammar::V3);
        assert_eq!(version.endpoints.len(), 1);

        let grid = table.resolve("/apiv3/", "grid-history").unwrap();
        assert_eq!(grid.primary_params, vec!["dataset", "lat", "lon"]);
        assert!(grid.secondary_params.contains("use_imperial_units"));
        assert!(!grid.secondary_params.contains("Authorization"));
        assert_eq!(grid.param_type("use_imperial_units"), ParamType::Boolean);
        assert_eq!(grid.param_type("desired_units"), ParamType::String);
        assert_eq!(grid.param_type("lat"), ParamType::Number);
    }

    #[test]
    fn test_v4_version_registered() {
        let doc = ApiDocument::from_json(DOC).unwrap();
        let table = SchemaTable::build(&[doc], &registry(), Some("/apiv4")).unwrap();
        assert_eq!(table.supported_versions(), "/apiv3/ or /apiv4");

        let (version, rest) = table.version_for("/apiv4/geo_temporal_query/era5").unwrap();
        assert_eq!(version.grammar, RequestGrammar::V4);
        assert_eq!(rest, "/geo_temporal_query/era5");

        let (version, rest) = table.version_for("/apiv3/grid-history/x/1_2").unwrap();
        assert_eq!(version.base_path, "/apiv3/");
        assert_eq!(rest, "grid-history/x/1_2");

        assert!(table.version_for("/apiv2/grid-history").is_none());
        assert!(table.version_for("/apiv4extra/geo_temporal_query/era5").is_none());
        assert!(table.version_for("/apiv3grid-history/x/1_2").is_none());
    }

    #[test]
    fn test_malformed_documents_are_fatal() {
        assert!(matches!(
            ApiDocument::from_json("{not json"),
            Err(SchemaError::Parse(_))
        ));
        assert!(matches!(
            ApiDocument::from_json(r#"{"paths": {}}"#),
            Err(SchemaError::Parse(_))
        ));

        let relative = ApiDocument::from_json(r#"{"basePath": "apiv3", "paths": {}}"#).unwrap();
        assert!(matches!(
            SchemaTable::build(&[relative], &registry(), None),
            Err(SchemaError::InvalidBasePath(_))
        ));

        let doc = ApiDocument::from_json(DOC).unwrap();
        assert!(matches!(
            SchemaTable::build(&[doc.clone(), doc], &registry(), None),
            Err(SchemaError::DuplicateVersion(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ApiDocument::from_file("/nonexistent/apiv3.json").unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
    }
}
