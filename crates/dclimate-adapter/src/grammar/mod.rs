//! Request URL grammars.
//!
//! Two URL dialects share one endpoint table. v3 encodes everything in the
//! path and query string; v4 names only the endpoint and dataset in the path
//! and carries its spatial/temporal instructions in separate token lists.
//! Both produce the same [`CallDescriptor`].

pub mod v3;
pub mod v4;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{AdapterError, AdapterResult};
use crate::pipeline::Pipeline;
use crate::request::RequestData;
use crate::schema::VersionSchema;
use crate::value::ParamValue;

/// Canonical, typed form of a parsed request, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallDescriptor {
    /// Base path of the version that owns the endpoint
    #[serde(skip)]
    pub version: String,
    pub endpoint_key: String,
    pub primary_args: IndexMap<String, ParamValue>,
    pub secondary_args: IndexMap<String, ParamValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl CallDescriptor {
    pub fn new(endpoint_key: &str) -> Self {
        Self {
            version: String::new(),
            endpoint_key: endpoint_key.to_string(),
            primary_args: IndexMap::new(),
            secondary_args: IndexMap::new(),
            dataset_name: None,
            output_format: None,
        }
    }

    /// Fill in `defaults` for arguments the request did not supply.
    pub fn apply_defaults(&mut self, defaults: &IndexMap<String, ParamValue>) {
        for (name, value) in defaults {
            if !self.primary_args.contains_key(name) && !self.secondary_args.contains_key(name) {
                self.secondary_args.insert(name.clone(), value.clone());
            }
        }
    }
}

/// A call plus the post-fetch pipeline requested with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub call: CallDescriptor,
    pub pipeline: Option<Pipeline>,
}

/// Path and raw query string of a `request_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub path: String,
    pub query: Option<String>,
}

impl RequestTarget {
    /// Split `request_url` into path and query. Absolute URLs are accepted;
    /// only their path and query are kept.
    pub fn parse(request_url: &str) -> AdapterResult<Self> {
        if request_url.contains("://") {
            let url = url::Url::parse(request_url).map_err(|e| {
                AdapterError::MalformedRequest(format!("invalid request_url: {}", e))
            })?;
            return Ok(Self {
                path: url.path().to_string(),
                query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
            });
        }
        let without_fragment = request_url.split('#').next().unwrap_or_default();
        let (path, query) = match without_fragment.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (without_fragment, None),
        };
        Ok(Self {
            path: path.to_string(),
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// Percent-decoded `name=value` pairs, in order. A literal `+` stays a
    /// plus sign so values like `1e+5` or `deg+C` arrive unchanged.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| {
                let q = q.replace('+', "%2B");
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(name, value)| (name.into_owned(), value.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// URL dialect of an API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestGrammar {
    V3,
    V4,
}

impl RequestGrammar {
    /// Parse `path` (already stripped of the version's base path) and the
    /// target's query string against `version`'s endpoints.
    pub fn parse(
        &self,
        path: &str,
        target: &RequestTarget,
        request: &RequestData,
        version: &VersionSchema,
    ) -> AdapterResult<ParsedRequest> {
        let mut parsed = match self {
            RequestGrammar::V3 => v3::parse(path, target, request, version)?,
            RequestGrammar::V4 => v4::parse(path, target, request, version)?,
        };
        parsed.call.version = version.base_path.clone();
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_target() {
        let target =
            RequestTarget::parse("/apiv3/grid-history/era5/1.375_103.875?use_imperial_units=true")
                .unwrap();
        assert_eq!(target.path, "/apiv3/grid-history/era5/1.375_103.875");
        assert_eq!(
            target.query_pairs(),
            vec![("use_imperial_units".to_string(), "true".to_string())]
        );
    }

    #[test]
    fn test_absolute_target() {
        let target =
            RequestTarget::parse("https://api.dclimate.net/apiv4/geo_temporal_query/era5?output_format=array")
                .unwrap();
        assert_eq!(target.path, "/apiv4/geo_temporal_query/era5");
        assert_eq!(target.query.as_deref(), Some("output_format=array"));
        assert!(RequestTarget::parse("https://").is_err());
    }

    #[test]
    fn test_query_is_percent_decoded() {
        let target = RequestTarget::parse("/apiv3/x?desired_units=deg%20C&as_of=2022-01-01").unwrap();
        let pairs = target.query_pairs();
        assert_eq!(pairs[0].1, "deg C");
        assert_eq!(pairs.len(), 2);
        assert!(RequestTarget::parse("/apiv3/x?").unwrap().query.is_none());
    }

    #[test]
    fn test_query_plus_is_literal() {
        let target = RequestTarget::parse("/apiv4/x/y?point_limit=1e+5&desired_units=deg+C").unwrap();
        assert_eq!(
            target.query_pairs(),
            vec![
                ("point_limit".to_string(), "1e+5".to_string()),
                ("desired_units".to_string(), "deg+C".to_string()),
            ]
        );
        let absolute = RequestTarget::parse("https://host/apiv3/x?radius=2e%2B1").unwrap();
        assert_eq!(absolute.query_pairs()[0].1, "2e+1");
    }

    #[test]
    fn test_defaults_do_not_override_request() {
        let mut call = CallDescriptor::new("grid-history");
        call.secondary_args
            .insert("use_imperial_units".into(), ParamValue::Bool(false));
        let mut defaults = IndexMap::new();
        defaults.insert("use_imperial_units".to_string(), ParamValue::Bool(true));
        defaults.insert("as_of".to_string(), ParamValue::Null);
        call.apply_defaults(&defaults);
        assert_eq!(call.secondary_args["use_imperial_units"], ParamValue::Bool(false));
        assert_eq!(call.secondary_args["as_of"], ParamValue::Null);
    }

    #[test]
    fn test_descriptor_serializes_without_version() {
        let mut call = CallDescriptor::new("grid-history");
        call.version = "/apiv3/".into();
        call.primary_args.insert("lat".into(), ParamValue::Float(1.5));
        let json = serde_json::to_value(&call).unwrap();
        assert!(json.get("version").is_none());
        assert!(json.get("dataset_name").is_none());
        assert_eq!(json["primary_args"]["lat"], 1.5);
    }
}
