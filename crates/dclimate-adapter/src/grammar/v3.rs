//! v3 URLs: `<key>/<positional params>?<query params>`.
//!
//! Positional values are separated by `/` or `_`. Endpoints whose first
//! positional parameter is `dataset` keep that segment whole, since dataset
//! names may themselves contain underscores.

use indexmap::IndexMap;

use super::{CallDescriptor, ParsedRequest, RequestTarget};
use crate::error::{AdapterError, AdapterResult};
use crate::pipeline::Pipeline;
use crate::request::RequestData;
use crate::schema::{EndpointSchema, ParamType, VersionSchema};
use crate::value::{parse_boolean, parse_literal, ParamValue};

/// Fields always decoded as floats, whatever their declared type.
const FLOAT_FIELDS: [&str; 7] = ["lat", "lon", "radius", "min_lat", "min_lon", "max_lat", "max_lon"];

/// Endpoints still addressed with `-` between positional values
/// (`drought-monitor/CA-Fresno`). Only these get the rewrite.
const HYPHENATED_PARAMETER_ENDPOINTS: [&str; 1] = ["drought-monitor"];

pub(super) fn parse(
    path: &str,
    target: &RequestTarget,
    request: &RequestData,
    version: &VersionSchema,
) -> AdapterResult<ParsedRequest> {
    let (key, rest) = path.split_once('/').unwrap_or((path, ""));
    let endpoint = version
        .endpoints
        .get(key)
        .ok_or_else(|| AdapterError::UnknownEndpoint {
            key: key.to_string(),
        })?;

    let rest = if HYPHENATED_PARAMETER_ENDPOINTS.contains(&key) {
        rest.replace('-', "_")
    } else {
        rest.to_string()
    };
    let values = positional_values(endpoint, &rest);
    if values.len() != endpoint.primary_params.len() {
        return Err(AdapterError::ParameterCountMismatch {
            expected: endpoint.primary_params.len(),
            found: values.len(),
        });
    }

    let mut call = CallDescriptor::new(key);
    call.primary_args = primary_args(endpoint, &values)?;
    call.secondary_args = secondary_args(endpoint, target)?;

    let pipeline = match &request.request_ops {
        Some(ops) => Some(Pipeline::parse(ops, &request.request_params)?),
        None => None,
    };
    Ok(ParsedRequest { call, pipeline })
}

fn positional_values<'a>(endpoint: &EndpointSchema, rest: &'a str) -> Vec<&'a str> {
    if rest.is_empty() {
        return Vec::new();
    }
    if endpoint.primary_params.iter().any(|p| p == "dataset") {
        let mut segments = rest.split('/');
        let mut values: Vec<&str> = segments.next().into_iter().collect();
        values.extend(segments.flat_map(|segment| segment.split('_')));
        values
    } else {
        rest.split(['_', '/']).collect()
    }
}

fn decode_float(name: &str, text: &str) -> AdapterResult<ParamValue> {
    text.trim()
        .parse::<f64>()
        .map(ParamValue::Float)
        .map_err(|e| AdapterError::mismatch(name, format!("'{}' is not a number: {}", text, e)))
}

fn primary_args(
    endpoint: &EndpointSchema,
    values: &[&str],
) -> AdapterResult<IndexMap<String, ParamValue>> {
    endpoint
        .primary_params
        .iter()
        .zip(values)
        .map(|(name, text)| -> AdapterResult<(String, ParamValue)> {
            let value = if FLOAT_FIELDS.contains(&name.as_str()) {
                decode_float(name, text)?
            } else {
                ParamValue::Str(text.to_string())
            };
            Ok((name.clone(), value))
        })
        .collect()
}

fn secondary_args(
    endpoint: &EndpointSchema,
    target: &RequestTarget,
) -> AdapterResult<IndexMap<String, ParamValue>> {
    let mut args = IndexMap::new();
    for (name, text) in target.query_pairs() {
        if !endpoint.secondary_params.contains(&name) {
            return Err(AdapterError::mismatch(name, "not a declared query parameter"));
        }
        let value = if FLOAT_FIELDS.contains(&name.as_str()) {
            decode_float(&name, &text)?
        } else {
            decode_typed(endpoint.param_type(&name), &text)
                .map_err(|reason| AdapterError::mismatch(&name, reason))?
        };
        args.insert(name, value);
    }
    Ok(args)
}

fn decode_typed(param_type: ParamType, text: &str) -> Result<ParamValue, String> {
    match param_type {
        ParamType::String => Ok(ParamValue::Str(text.to_string())),
        ParamType::Boolean => parse_boolean(text).map(ParamValue::Bool),
        ParamType::Number => match parse_literal(text)? {
            value @ (ParamValue::Int(_) | ParamValue::Float(_)) => Ok(value),
            other => Err(format!("expected a number, found {}", other.type_name())),
        },
        ParamType::Composite => parse_literal(text),
    }
}
