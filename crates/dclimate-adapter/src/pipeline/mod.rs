//! Post-fetch operation pipeline.
//!
//! A pipeline is decoded once per request from the parallel `request_ops` /
//! `request_params` lists. Each step names a registered [`Operation`] and two
//! control flags:
//!
//! - `return_result`: normalize this step's result and stop.
//! - `carry_forward`: feed this step's result to the next step instead of the
//!   original dataset.
//!
//! Returned numbers are scaled by [`PRECISION`] and rounded to an integer so
//! they can be carried on-chain without fractions.

pub mod dataset;
pub mod offset;
pub mod ops;

pub use dataset::{Dataset, Shape};
pub use offset::{Offset, OffsetUnit};
pub use ops::{Aggregation, OpValue, Operation};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::error::{AdapterError, AdapterResult};
use crate::provider::FetchedData;
use crate::value::parse_literal_list;

/// Fixed-point scale applied to returned numbers.
pub const PRECISION: f64 = 1e18;

/// How the scale is written in unit labels.
pub const PRECISION_LABEL: &str = "1e+18";

/// Unit reported for timestamp results.
pub const TIMESTAMP_UNIT: &str = "ms since epoch";

/// A transport-ready result: an integer plus the unit it is expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reduced {
    pub data: i128,
    pub unit: String,
}

/// Unit label for a scaled number: `"<unit> * 1e+18"`, or empty when the
/// dataset carries no unit.
pub fn scaled_unit(unit: Option<&str>) -> String {
    match unit {
        Some(u) if !u.is_empty() => format!("{} * {}", u, PRECISION_LABEL),
        _ => String::new(),
    }
}

/// `round(value * 1e18)`. Non-finite values have no fixed-point form.
pub fn to_fixed_point(value: f64) -> AdapterResult<i128> {
    let scaled = (value * PRECISION).round();
    if !scaled.is_finite() || scaled.abs() >= i128::MAX as f64 {
        return Err(AdapterError::UnsupportedOperationResult);
    }
    Ok(scaled as i128)
}

fn timestamp_millis(ts: DateTime<Utc>) -> Reduced {
    Reduced {
        data: i128::from(ts.timestamp_millis()),
        unit: TIMESTAMP_UNIT.to_string(),
    }
}

/// Turn a returned operation value into its transport form.
pub fn normalize(value: OpValue, unit: Option<&str>) -> AdapterResult<Reduced> {
    match value {
        OpValue::Frame(ds) => normalize(
            OpValue::Number(Aggregation::Mean.apply(&ds.valid_values())),
            unit,
        ),
        OpValue::Number(v) => Ok(Reduced {
            data: to_fixed_point(v)?,
            unit: scaled_unit(unit),
        }),
        OpValue::Timestamp(ts) => Ok(timestamp_millis(ts)),
        OpValue::Date(date) => Ok(timestamp_millis(
            date.and_time(NaiveTime::MIN).and_utc(),
        )),
        OpValue::Time(time) => Ok(timestamp_millis(
            NaiveDate::default().and_time(time).and_utc(),
        )),
        OpValue::Text(_) | OpValue::Nothing => Err(AdapterError::UnsupportedOperationResult),
    }
}

/// One decoded `request_ops[i]` / `request_params[i]` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStep {
    pub name: String,
    pub operation: Operation,
    pub return_result: bool,
    pub carry_forward: bool,
}

impl PipelineStep {
    /// Decode `encoded` (`[return_result, carry_forward, args...]`) against
    /// the parameter schema of `name`.
    pub fn parse(name: &str, encoded: &str) -> AdapterResult<Self> {
        let items =
            parse_literal_list(encoded).map_err(|reason| AdapterError::step_params(name, reason))?;
        let (return_result, carry_forward) = match (items.first(), items.get(1)) {
            (Some(r), Some(c)) => match (r.as_bool(), c.as_bool()) {
                (Some(r), Some(c)) => (r, c),
                _ => {
                    return Err(AdapterError::step_params(
                        name,
                        "return and carry-forward flags must be booleans",
                    ))
                }
            },
            _ => {
                return Err(AdapterError::step_params(
                    name,
                    "missing return and carry-forward flags",
                ))
            }
        };
        Ok(Self {
            name: name.to_string(),
            operation: Operation::parse(name, &items[2..])?,
            return_result,
            carry_forward,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Pair operations with their encoded parameter lists, index by index.
    pub fn parse(ops: &[String], params: &[String]) -> AdapterResult<Self> {
        if ops.len() != params.len() {
            return Err(AdapterError::InvalidPipeline(format!(
                "{} operation(s) but {} parameter list(s)",
                ops.len(),
                params.len()
            )));
        }
        let steps = ops
            .iter()
            .zip(params)
            .map(|(op, encoded)| PipelineStep::parse(op, encoded))
            .collect::<AdapterResult<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn from_steps(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step over `data` until one returns.
    pub fn run(&self, data: &FetchedData, unit: Option<&str>) -> AdapterResult<Reduced> {
        let reset = match data {
            FetchedData::Frame(ds) => ds,
            FetchedData::Scalar(_) | FetchedData::Metadata(_) | FetchedData::Binary(_) => {
                return Err(AdapterError::UnsupportedDatasetShape)
            }
        };
        reset.validate().map_err(AdapterError::DatasetInvariant)?;

        let mut carried: Option<OpValue> = None;
        for step in &self.steps {
            let input = match &carried {
                None => reset,
                Some(OpValue::Frame(ds)) => ds,
                Some(other) => {
                    return Err(AdapterError::op_failed(
                        &step.name,
                        format!("previous step produced a {}, not a dataset", other.kind()),
                    ))
                }
            };
            let result = step
                .operation
                .apply(input)
                .map_err(|reason| AdapterError::op_failed(&step.name, reason))?;
            log::debug!(
                "step '{}' produced a {} (return={}, carry={})",
                step.name,
                result.kind(),
                step.return_result,
                step.carry_forward
            );

            if step.return_result {
                return normalize(result, unit);
            }
            carried = if step.carry_forward {
                Some(result)
            } else {
                None
            };
        }
        Err(AdapterError::NoTerminalStep)
    }
}
