//! v4 geo-temporal queries: `/<key>/<dataset>?output_format=<fmt>`.
//!
//! Spatial and temporal instructions are flat token lists such as
//! `["point_params", "1.375", "103.875", "time_range", "2022-09-01", "2022-09-30"]`.
//! A recognized label owns a fixed number of following tokens; anything else
//! is skipped one token at a time, so a misplaced label silently loses its
//! group instead of failing the request.

use indexmap::IndexMap;

use super::{CallDescriptor, ParsedRequest, RequestTarget};
use crate::error::{AdapterError, AdapterResult};
use crate::request::RequestData;
use crate::schema::VersionSchema;
use crate::value::{parse_iso_datetime, ParamValue};

/// Output format when the query string names none.
pub const DEFAULT_OUTPUT_FORMAT: &str = "array";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Float,
    Int,
    Text,
    DateTime,
}

impl Conversion {
    fn apply(&self, token: &str) -> Result<ParamValue, String> {
        match self {
            Conversion::Float => token
                .trim()
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|e| format!("'{}': {}", token, e)),
            Conversion::Int => token
                .trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|e| format!("'{}': {}", token, e)),
            Conversion::Text => Ok(ParamValue::Str(token.to_string())),
            Conversion::DateTime => parse_iso_datetime(token).map(ParamValue::DateTime),
        }
    }
}

/// A parameter-group label and the fields that follow it. Groups without
/// field names decode to a positional list.
struct GroupSpec {
    label: &'static str,
    names: &'static [&'static str],
    fields: &'static [Conversion],
}

use Conversion::{DateTime as D, Float as F, Int as I, Text as S};

const GROUPS: &[GroupSpec] = &[
    GroupSpec {
        label: "point_params",
        names: &["lat", "lon"],
        fields: &[F, F],
    },
    GroupSpec {
        label: "circle_params",
        names: &["center_lat", "center_lon", "radius"],
        fields: &[F, F, F],
    },
    GroupSpec {
        label: "rectangle_params",
        names: &["min_lat", "min_lon", "max_lat", "max_lon"],
        fields: &[F, F, F, F],
    },
    GroupSpec {
        label: "polygon_params",
        names: &["epsg_crs"],
        fields: &[I],
    },
    GroupSpec {
        label: "multiple_points_params",
        names: &["epsg_crs"],
        fields: &[I],
    },
    GroupSpec {
        label: "spatial_agg_params",
        names: &["agg_method"],
        fields: &[S],
    },
    GroupSpec {
        label: "time_range",
        names: &[],
        fields: &[D, D],
    },
    GroupSpec {
        label: "temporal_agg_params",
        names: &["time_period", "agg_method", "time_unit"],
        fields: &[S, S, I],
    },
    GroupSpec {
        label: "rolling_add_params",
        names: &["window_size", "agg_method"],
        fields: &[I, S],
    },
];

/// Argument name a group is stored under.
fn group_key(label: &str) -> String {
    label.replace("_params", "_kwargs")
}

/// Scan `tokens` left to right, decoding every recognized group.
pub fn scan_parameter_groups(tokens: &[String]) -> AdapterResult<IndexMap<String, ParamValue>> {
    let mut groups = IndexMap::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let Some(spec) = GROUPS.iter().find(|g| g.label == tokens[idx]) else {
            log::debug!("Skipping unrecognized parameter token '{}'", tokens[idx]);
            idx += 1;
            continue;
        };
        let arity = spec.fields.len();
        let values = tokens
            .get(idx + 1..idx + 1 + arity)
            .ok_or_else(|| AdapterError::ParameterCountMismatch {
                expected: arity,
                found: tokens.len() - idx - 1,
            })?;

        let mut decoded = Vec::with_capacity(arity);
        for (position, (conversion, token)) in spec.fields.iter().zip(values).enumerate() {
            let field = spec.names.get(position).copied().unwrap_or(spec.label);
            decoded.push(
                conversion
                    .apply(token)
                    .map_err(|reason| AdapterError::mismatch(field, reason))?,
            );
        }

        let value = if spec.names.is_empty() {
            ParamValue::List(decoded)
        } else {
            ParamValue::Map(
                spec.names
                    .iter()
                    .map(|n| n.to_string())
                    .zip(decoded)
                    .collect(),
            )
        };
        groups.insert(group_key(spec.label), value);
        idx += 1 + arity;
    }
    Ok(groups)
}

pub(super) fn parse(
    path: &str,
    target: &RequestTarget,
    request: &RequestData,
    version: &VersionSchema,
) -> AdapterResult<ParsedRequest> {
    let mut segments = path.split('/').skip(1);
    let key = segments.next().unwrap_or_default();
    let endpoint = version
        .endpoints
        .get(key)
        .ok_or_else(|| AdapterError::UnknownEndpoint {
            key: key.to_string(),
        })?;
    let dataset_name = match segments.next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err(AdapterError::ParameterCountMismatch {
                expected: endpoint.primary_params.len(),
                found: 0,
            })
        }
    };

    let mut output_format = DEFAULT_OUTPUT_FORMAT.to_string();
    for (name, value) in target.query_pairs() {
        if !endpoint.secondary_params.contains(&name) {
            return Err(AdapterError::mismatch(name, "not a declared query parameter"));
        }
        if name == "output_format" {
            output_format = value;
        }
    }

    if request.request_ops.is_some() {
        log::debug!("Ignoring request_ops on a v4 request");
    }

    let tokens: Vec<String> = request.parameter_tokens();
    let mut call = CallDescriptor::new(key);
    call.primary_args.insert(
        "dataset_name".to_string(),
        ParamValue::Str(dataset_name.clone()),
    );
    call.secondary_args = scan_parameter_groups(&tokens)?;
    call.dataset_name = Some(dataset_name);
    call.output_format = Some(output_format);
    Ok(ParsedRequest {
        call,
        pipeline: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_point_time_range_and_aggregation() {
        let groups = scan_parameter_groups(&tokens(&[
            "point_params",
            "1.375",
            "103.875",
            "time_range",
            "2022-09-01",
            "2022-09-30",
            "temporal_agg_params",
            "all",
            "max",
            "1",
        ]))
        .unwrap();
        assert_eq!(groups.len(), 3);

        let ParamValue::Map(point) = &groups["point_kwargs"] else {
            panic!("point group should be a mapping");
        };
        assert_eq!(point["lat"], ParamValue::Float(1.375));
        assert_eq!(point["lon"], ParamValue::Float(103.875));

        let start = NaiveDate::from_ymd_opt(2022, 9, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let ParamValue::List(range) = &groups["time_range"] else {
            panic!("time range should be a list");
        };
        assert_eq!(range[0], ParamValue::DateTime(start));
        assert_eq!(range.len(), 2);

        let ParamValue::Map(agg) = &groups["temporal_agg_kwargs"] else {
            panic!("aggregation group should be a mapping");
        };
        assert_eq!(agg["time_unit"], ParamValue::Int(1));
    }

    #[test]
    fn test_every_label_consumes_its_arity() {
        let groups = scan_parameter_groups(&tokens(&[
            "circle_params", "1", "2", "3",
            "rectangle_params", "1", "2", "3", "4",
            "polygon_params", "4326",
            "spatial_agg_params", "mean",
            "rolling_add_params", "7", "sum",
        ]))
        .unwrap();
        assert_eq!(
            groups.keys().collect::<Vec<_>>(),
            vec![
                "circle_kwargs",
                "rectangle_kwargs",
                "polygon_kwargs",
                "spatial_agg_kwargs",
                "rolling_add_kwargs"
            ]
        );
    }

    #[test]
    fn test_unrecognized_tokens_are_skipped() {
        // Known weak spot: a stray token before a label is dropped silently.
        let groups =
            scan_parameter_groups(&tokens(&["bogus", "point_params", "1", "2", "trailing"]))
                .unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key("point_kwargs"));
    }

    #[test]
    fn test_label_as_field_value_is_consumed() {
        // A missing field lets the next label be read as data.
        let err = scan_parameter_groups(&tokens(&["point_params", "1", "time_range", "2022-01-01"]))
            .unwrap_err();
        assert!(matches!(err, AdapterError::ParameterMismatch { .. }));
    }

    #[test]
    fn test_short_group_and_bad_values() {
        assert!(matches!(
            scan_parameter_groups(&tokens(&["point_params", "1"])),
            Err(AdapterError::ParameterCountMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            scan_parameter_groups(&tokens(&["polygon_params", "4326.5"])),
            Err(AdapterError::ParameterMismatch { .. })
        ));
        assert!(matches!(
            scan_parameter_groups(&tokens(&["time_range", "yesterday", "today"])),
            Err(AdapterError::ParameterMismatch { .. })
        ));
    }
}
