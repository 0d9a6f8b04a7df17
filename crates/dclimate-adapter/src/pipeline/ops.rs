//! Operation registry: every operation a pipeline step may name, with the
//! parameter signature its encoded arguments are decoded against.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use super::dataset::{Dataset, Shape};
use super::offset::Offset;
use crate::error::{AdapterError, AdapterResult};
use crate::value::{parse_iso_datetime, ParamValue};

/// Reduction used by `resample` and `rolling`, and by the plain reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Sum,
    Min,
    Max,
    Median,
    Std,
    Var,
    Count,
    First,
    Last,
}

impl Aggregation {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "mean" => Aggregation::Mean,
            "sum" => Aggregation::Sum,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "median" => Aggregation::Median,
            "std" => Aggregation::Std,
            "var" => Aggregation::Var,
            "count" => Aggregation::Count,
            "first" => Aggregation::First,
            "last" => Aggregation::Last,
            _ => return None,
        })
    }

    /// Reduce `values`, skipping `NaN`. Empty input yields `NaN` except for
    /// `sum` and `count`, which yield zero.
    pub fn apply(&self, values: &[f64]) -> f64 {
        let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let n = valid.len() as f64;
        match self {
            Aggregation::Sum => valid.iter().sum(),
            Aggregation::Count => n,
            _ if valid.is_empty() => f64::NAN,
            Aggregation::Mean => valid.iter().sum::<f64>() / n,
            Aggregation::Min => valid.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Median => quantile(&valid, 0.5),
            Aggregation::Var => sample_variance(&valid),
            Aggregation::Std => sample_variance(&valid).sqrt(),
            Aggregation::First => valid[0],
            Aggregation::Last => valid[valid.len() - 1],
        }
    }
}

fn sample_variance(valid: &[f64]) -> f64 {
    if valid.len() < 2 {
        return f64::NAN;
    }
    let n = valid.len() as f64;
    let mean = valid.iter().sum::<f64>() / n;
    valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Linear-interpolated quantile of non-empty `valid`.
fn quantile(valid: &[f64], q: f64) -> f64 {
    if valid.is_empty() {
        return f64::NAN;
    }
    let mut sorted = valid.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
}

/// A decoded, ready-to-run operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Reduce(Aggregation),
    Quantile(f64),
    IdxMax,
    IdxMin,
    FirstValidIndex,
    LastValidIndex,
    Name,
    Head(usize),
    Tail(usize),
    First(Offset),
    Last(Offset),
    Truncate {
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    },
    Dropna,
    NLargest(usize),
    NSmallest(usize),
    Abs,
    Cumsum,
    Diff(i64),
    Arithmetic(Arithmetic, f64),
    Clip {
        lower: Option<f64>,
        upper: Option<f64>,
    },
    Resample {
        rule: Offset,
        how: Aggregation,
    },
    Rolling {
        window: usize,
        how: Aggregation,
    },
}

/// Result of applying one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpValue {
    Frame(Dataset),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Text(String),
    Nothing,
}

impl OpValue {
    pub fn kind(&self) -> &'static str {
        match self {
            OpValue::Frame(_) => "dataset",
            OpValue::Number(_) => "number",
            OpValue::Timestamp(_) => "timestamp",
            OpValue::Date(_) => "date",
            OpValue::Time(_) => "time",
            OpValue::Text(_) => "text",
            OpValue::Nothing => "nothing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Number,
    Count,
    Integer,
    Offset,
    Aggregation,
    Timestamp,
}

/// Positional parameter schema of one registered operation.
struct Signature {
    name: &'static str,
    params: &'static [ParamKind],
    required: usize,
}

const fn sig(name: &'static str, params: &'static [ParamKind], required: usize) -> Signature {
    Signature {
        name,
        params,
        required,
    }
}

use ParamKind as K;

const REGISTRY: &[Signature] = &[
    sig("mean", &[], 0),
    sig("sum", &[], 0),
    sig("min", &[], 0),
    sig("max", &[], 0),
    sig("median", &[], 0),
    sig("std", &[], 0),
    sig("var", &[], 0),
    sig("count", &[], 0),
    sig("quantile", &[K::Number], 0),
    sig("idxmax", &[], 0),
    sig("idxmin", &[], 0),
    sig("first_valid_index", &[], 0),
    sig("last_valid_index", &[], 0),
    sig("name", &[], 0),
    sig("head", &[K::Count], 0),
    sig("tail", &[K::Count], 0),
    sig("first", &[K::Offset], 1),
    sig("last", &[K::Offset], 1),
    sig("truncate", &[K::Timestamp, K::Timestamp], 0),
    sig("dropna", &[], 0),
    sig("nlargest", &[K::Count], 0),
    sig("nsmallest", &[K::Count], 0),
    sig("abs", &[], 0),
    sig("cumsum", &[], 0),
    sig("diff", &[K::Integer], 0),
    sig("add", &[K::Number], 1),
    sig("sub", &[K::Number], 1),
    sig("mul", &[K::Number], 1),
    sig("div", &[K::Number], 1),
    sig("clip", &[K::Number, K::Number], 0),
    sig("resample", &[K::Offset, K::Aggregation], 1),
    sig("rolling", &[K::Count, K::Aggregation], 1),
];

/// Names accepted in `request_ops`.
pub fn registered_operations() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|s| s.name)
}

#[derive(Debug, Clone)]
enum Arg {
    Number(f64),
    Count(usize),
    Integer(i64),
    Offset(Offset),
    Aggregation(Aggregation),
    Timestamp(DateTime<Utc>),
}

fn decode_arg(kind: ParamKind, value: &ParamValue) -> Result<Arg, String> {
    let mismatch = || format!("expected {:?}, found {}", kind, value.type_name());
    match kind {
        ParamKind::Number => value.as_f64().map(Arg::Number).ok_or_else(mismatch),
        ParamKind::Integer => value.as_i64().map(Arg::Integer).ok_or_else(mismatch),
        ParamKind::Count => match value.as_i64() {
            Some(n) if n > 0 => Ok(Arg::Count(n as usize)),
            Some(n) => Err(format!("expected a positive count, found {}", n)),
            None => Err(mismatch()),
        },
        ParamKind::Offset => value
            .as_str()
            .ok_or_else(mismatch)?
            .parse::<Offset>()
            .map(Arg::Offset),
        ParamKind::Aggregation => {
            let name = value.as_str().ok_or_else(mismatch)?;
            Aggregation::parse(name)
                .map(Arg::Aggregation)
                .ok_or_else(|| format!("unknown aggregation '{}'", name))
        }
        ParamKind::Timestamp => {
            let text = value.as_str().ok_or_else(mismatch)?;
            parse_iso_datetime(text).map(|dt| Arg::Timestamp(dt.and_utc()))
        }
    }
}

impl Operation {
    /// Look up `name` and decode `params` against its signature. `None`
    /// literals stand for omitted optional parameters.
    pub fn parse(name: &str, params: &[ParamValue]) -> AdapterResult<Self> {
        let signature = REGISTRY
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| AdapterError::UnknownOperation(name.to_string()))?;
        if params.len() > signature.params.len() {
            return Err(AdapterError::step_params(
                name,
                format!(
                    "takes at most {} parameter(s), got {}",
                    signature.params.len(),
                    params.len()
                ),
            ));
        }

        let mut args: Vec<Option<Arg>> = Vec::with_capacity(signature.params.len());
        for (position, kind) in signature.params.iter().enumerate() {
            let arg = match params.get(position) {
                Some(value) if !value.is_null() => Some(
                    decode_arg(*kind, value)
                        .map_err(|reason| AdapterError::step_params(name, reason))?,
                ),
                _ => None,
            };
            if arg.is_none() && position < signature.required {
                return Err(AdapterError::step_params(
                    name,
                    format!("missing required parameter {}", position + 1),
                ));
            }
            args.push(arg);
        }

        Self::build(name, args).map_err(|reason| AdapterError::step_params(name, reason))
    }

    fn build(name: &str, mut args: Vec<Option<Arg>>) -> Result<Self, String> {
        let mut next = || if args.is_empty() { None } else { args.remove(0) };
        let op = match name {
            "quantile" => {
                let q = match next() {
                    Some(Arg::Number(q)) => q,
                    _ => 0.5,
                };
                if !(0.0..=1.0).contains(&q) {
                    return Err(format!("quantile {} outside [0, 1]", q));
                }
                Operation::Quantile(q)
            }
            "idxmax" => Operation::IdxMax,
            "idxmin" => Operation::IdxMin,
            "first_valid_index" => Operation::FirstValidIndex,
            "last_valid_index" => Operation::LastValidIndex,
            "name" => Operation::Name,
            "head" | "tail" | "nlargest" | "nsmallest" => {
                let n = match next() {
                    Some(Arg::Count(n)) => n,
                    _ => 5,
                };
                match name {
                    "head" => Operation::Head(n),
                    "tail" => Operation::Tail(n),
                    "nlargest" => Operation::NLargest(n),
                    _ => Operation::NSmallest(n),
                }
            }
            "first" | "last" => match next() {
                Some(Arg::Offset(offset)) if name == "first" => Operation::First(offset),
                Some(Arg::Offset(offset)) => Operation::Last(offset),
                _ => return Err("missing offset".to_string()),
            },
            "truncate" => {
                let mut timestamp = || match next() {
                    Some(Arg::Timestamp(ts)) => Some(ts),
                    _ => None,
                };
                let before = timestamp();
                let after = timestamp();
                if let (Some(b), Some(a)) = (before, after) {
                    if b > a {
                        return Err(format!("truncate start {} is after end {}", b, a));
                    }
                }
                Operation::Truncate { before, after }
            }
            "dropna" => Operation::Dropna,
            "abs" => Operation::Abs,
            "cumsum" => Operation::Cumsum,
            "diff" => match next() {
                Some(Arg::Integer(periods)) => Operation::Diff(periods),
                _ => Operation::Diff(1),
            },
            "add" | "sub" | "mul" | "div" => {
                let operand = match next() {
                    Some(Arg::Number(x)) => x,
                    _ => return Err("missing operand".to_string()),
                };
                let kind = match name {
                    "add" => Arithmetic::Add,
                    "sub" => Arithmetic::Sub,
                    "mul" => Arithmetic::Mul,
                    _ => Arithmetic::Div,
                };
                Operation::Arithmetic(kind, operand)
            }
            "clip" => {
                let mut bound = || match next() {
                    Some(Arg::Number(x)) => Some(x),
                    _ => None,
                };
                let lower = bound();
                let upper = bound();
                if let (Some(l), Some(u)) = (lower, upper) {
                    if l > u {
                        return Err(format!("clip lower bound {} exceeds upper bound {}", l, u));
                    }
                }
                Operation::Clip { lower, upper }
            }
            "resample" | "rolling" => {
                let first = next();
                let how = match next() {
                    Some(Arg::Aggregation(how)) => how,
                    _ => Aggregation::Mean,
                };
                match (name, first) {
                    ("resample", Some(Arg::Offset(rule))) => Operation::Resample { rule, how },
                    ("rolling", Some(Arg::Count(window))) => Operation::Rolling { window, how },
                    _ => return Err("missing window".to_string()),
                }
            }
            reduction => match Aggregation::parse(reduction) {
                Some(agg) => Operation::Reduce(agg),
                None => return Err(format!("no builder for '{}'", reduction)),
            },
        };
        Ok(op)
    }

    /// Apply to `input`. Errors carry a human-readable reason.
    pub fn apply(&self, input: &Dataset) -> Result<OpValue, String> {
        let value = match self {
            Operation::Reduce(agg) => OpValue::Number(agg.apply(&input.valid_values())),
            Operation::Quantile(q) => OpValue::Number(quantile(&input.valid_values(), *q)),
            Operation::IdxMax | Operation::IdxMin => {
                let values = series_only(input, "idxmax/idxmin")?;
                let better = |candidate: f64, best: f64| match self {
                    Operation::IdxMax => candidate > best,
                    _ => candidate < best,
                };
                let mut best: Option<(usize, f64)> = None;
                for (row, &v) in values.iter().enumerate() {
                    if v.is_nan() {
                        continue;
                    }
                    if best.map_or(true, |(_, b)| better(v, b)) {
                        best = Some((row, v));
                    }
                }
                let (row, _) = best.ok_or("attempt to get argmax of an empty sequence")?;
                OpValue::Timestamp(input.index()[row])
            }
            Operation::FirstValidIndex => (0..input.len())
                .find(|&r| input.row_has_value(r))
                .map_or(OpValue::Nothing, |r| OpValue::Timestamp(input.index()[r])),
            Operation::LastValidIndex => (0..input.len())
                .rev()
                .find(|&r| input.row_has_value(r))
                .map_or(OpValue::Nothing, |r| OpValue::Timestamp(input.index()[r])),
            Operation::Name => input
                .name()
                .map_or(OpValue::Nothing, |n| OpValue::Text(n.to_string())),
            Operation::Head(n) => {
                let rows: Vec<usize> = (0..input.len().min(*n)).collect();
                OpValue::Frame(input.select_rows(&rows))
            }
            Operation::Tail(n) => {
                let rows: Vec<usize> = (input.len().saturating_sub(*n)..input.len()).collect();
                OpValue::Frame(input.select_rows(&rows))
            }
            Operation::First(offset) => match input.index().first() {
                None => OpValue::Frame(input.clone()),
                Some(&start) => {
                    let end = offset.window_end(start)?;
                    if offset.is_calendar() {
                        OpValue::Frame(input.filter_index(|ts| *ts <= end))
                    } else {
                        OpValue::Frame(input.filter_index(|ts| *ts < end))
                    }
                }
            },
            Operation::Last(offset) => match input.index().last() {
                None => OpValue::Frame(input.clone()),
                Some(&end) => {
                    let start = offset.window_start(end)?;
                    OpValue::Frame(input.filter_index(|ts| *ts > start))
                }
            },
            Operation::Truncate { before, after } => OpValue::Frame(input.filter_index(|ts| {
                before.map_or(true, |b| *ts >= b) && after.map_or(true, |a| *ts <= a)
            })),
            Operation::Dropna => {
                let rows: Vec<usize> = (0..input.len()).filter(|&r| input.row_is_complete(r)).collect();
                OpValue::Frame(input.select_rows(&rows))
            }
            Operation::NLargest(n) | Operation::NSmallest(n) => {
                let values = series_only(input, "nlargest/nsmallest")?;
                let mut rows: Vec<usize> = (0..values.len()).filter(|&r| !values[r].is_nan()).collect();
                rows.sort_by(|&a, &b| match self {
                    Operation::NLargest(_) => values[b].total_cmp(&values[a]),
                    _ => values[a].total_cmp(&values[b]),
                });
                rows.truncate(*n);
                rows.sort_unstable();
                OpValue::Frame(input.select_rows(&rows))
            }
            Operation::Abs => OpValue::Frame(input.map_values(f64::abs)),
            Operation::Cumsum => OpValue::Frame(input.map_columns(|values| {
                let mut total = 0.0;
                values
                    .iter()
                    .map(|&v| {
                        if v.is_nan() {
                            f64::NAN
                        } else {
                            total += v;
                            total
                        }
                    })
                    .collect()
            })),
            Operation::Diff(periods) => {
                let periods = *periods;
                OpValue::Frame(input.map_columns(|values| {
                    let len = values.len() as i64;
                    (0..len)
                        .map(|i| match i.checked_sub(periods) {
                            Some(j) if (0..len).contains(&j) => {
                                values[i as usize] - values[j as usize]
                            }
                            _ => f64::NAN,
                        })
                        .collect()
                }))
            }
            Operation::Arithmetic(kind, operand) => {
                let x = *operand;
                OpValue::Frame(match kind {
                    Arithmetic::Add => input.map_values(|v| v + x),
                    Arithmetic::Sub => input.map_values(|v| v - x),
                    Arithmetic::Mul => input.map_values(|v| v * x),
                    Arithmetic::Div => input.map_values(|v| v / x),
                })
            }
            Operation::Clip { lower, upper } => {
                let (lower, upper) = (*lower, *upper);
                OpValue::Frame(input.map_values(|v| {
                    let v = lower.map_or(v, |l| if v < l { l } else { v });
                    upper.map_or(v, |u| if v > u { u } else { v })
                }))
            }
            Operation::Resample { rule, how } => {
                let grouped = input.group_by(|ts| rule.bin_label(*ts), |group| how.apply(group))?;
                OpValue::Frame(grouped)
            }
            Operation::Rolling { window, how } => {
                let window = *window;
                OpValue::Frame(input.map_columns(|values| {
                    (0..values.len())
                        .map(|i| {
                            if i + 1 < window {
                                return f64::NAN;
                            }
                            let span = &values[i + 1 - window..=i];
                            if span.iter().any(|v| v.is_nan()) {
                                f64::NAN
                            } else {
                                how.apply(span)
                            }
                        })
                        .collect()
                }))
            }
        };
        Ok(value)
    }
}

fn series_only<'a>(input: &'a Dataset, op: &str) -> Result<&'a [f64], String> {
    match input.shape() {
        Shape::Series => input
            .series_values()
            .ok_or_else(|| format!("{} requires a series", op)),
        Shape::Table => Err(format!("{} requires a series, found a table", op)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, m, d, 0, 0, 0).unwrap()
    }

    fn sample() -> Dataset {
        Dataset::from_pairs(
            "precip",
            [
                (day(8, 30), 4.0),
                (day(8, 31), f64::NAN),
                (day(9, 1), 1.0),
                (day(9, 15), 3.0),
                (day(9, 30), 2.0),
            ],
        )
    }

    fn frame(value: OpValue) -> Dataset {
        match value {
            OpValue::Frame(ds) => ds,
            other => panic!("expected a frame, got {:?}", other),
        }
    }

    fn op(name: &str, params: &[ParamValue]) -> Operation {
        Operation::parse(name, params).unwrap()
    }

    #[test]
    fn test_unknown_operation_rejected_at_parse() {
        let err = Operation::parse("__class__", &[]).unwrap_err();
        assert!(matches!(err, AdapterError::UnknownOperation(_)));
    }

    #[test]
    fn test_arity_and_type_checked_at_parse() {
        assert!(matches!(
            Operation::parse("mean", &[ParamValue::Int(1)]),
            Err(AdapterError::InvalidStepParams { .. })
        ));
        assert!(Operation::parse("last", &[]).is_err());
        assert!(Operation::parse("last", &[ParamValue::Int(3)]).is_err());
        assert!(Operation::parse("head", &[ParamValue::Int(0)]).is_err());
        assert!(Operation::parse("resample", &[ParamValue::Str("1M".into()), ParamValue::Str("mode".into())]).is_err());
        assert!(Operation::parse("quantile", &[ParamValue::Float(1.5)]).is_err());
    }

    #[test]
    fn test_defaults_and_none_placeholders() {
        assert_eq!(op("head", &[]), Operation::Head(5));
        assert_eq!(op("diff", &[]), Operation::Diff(1));
        assert_eq!(
            op("clip", &[ParamValue::Null, ParamValue::Int(2)]),
            Operation::Clip {
                lower: None,
                upper: Some(2.0)
            }
        );
        assert_eq!(
            op("resample", &[ParamValue::Str("1M".into())]),
            Operation::Resample {
                rule: "1M".parse().unwrap(),
                how: Aggregation::Mean
            }
        );
    }

    #[test]
    fn test_registry_is_closed() {
        let names: Vec<_> = registered_operations().collect();
        assert!(names.contains(&"mean"));
        assert!(names.contains(&"last"));
        assert!(!names.contains(&"to_csv"));
        for name in names {
            let needs_arg = ["first", "last", "add", "sub", "mul", "div", "resample", "rolling"];
            if !needs_arg.contains(&name) {
                assert!(Operation::parse(name, &[]).is_ok(), "{} should parse bare", name);
            }
        }
    }

    #[test]
    fn test_reductions_skip_missing() {
        let ds = sample();
        assert_eq!(op("mean", &[]).apply(&ds).unwrap(), OpValue::Number(2.5));
        assert_eq!(op("sum", &[]).apply(&ds).unwrap(), OpValue::Number(10.0));
        assert_eq!(op("max", &[]).apply(&ds).unwrap(), OpValue::Number(4.0));
        assert_eq!(op("count", &[]).apply(&ds).unwrap(), OpValue::Number(4.0));
        assert_eq!(op("median", &[]).apply(&ds).unwrap(), OpValue::Number(2.5));
    }

    #[test]
    fn test_std_uses_sample_denominator() {
        let ds = Dataset::from_pairs("t", [(day(1, 1), 1.0), (day(1, 2), 3.0)]);
        match op("var", &[]).apply(&ds).unwrap() {
            OpValue::Number(v) => assert!((v - 2.0).abs() < 1e-12),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_last_month_window() {
        let ds = sample();
        let window = frame(op("last", &[ParamValue::Str("1M".into())]).apply(&ds).unwrap());
        assert_eq!(window.index(), &[day(9, 1), day(9, 15), day(9, 30)]);
    }

    #[test]
    fn test_first_month_window() {
        let ds = sample();
        let window = frame(op("first", &[ParamValue::Str("1M".into())]).apply(&ds).unwrap());
        assert_eq!(window.index(), &[day(8, 30), day(8, 31)]);
    }

    #[test]
    fn test_idxmax_returns_timestamp() {
        assert_eq!(
            op("idxmax", &[]).apply(&sample()).unwrap(),
            OpValue::Timestamp(day(8, 30))
        );
        assert_eq!(
            op("idxmin", &[]).apply(&sample()).unwrap(),
            OpValue::Timestamp(day(9, 1))
        );
    }

    #[test]
    fn test_idxmax_empty_fails() {
        let empty = Dataset::from_pairs("t", []);
        assert!(op("idxmax", &[]).apply(&empty).is_err());
    }

    #[test]
    fn test_resample_monthly_sum() {
        let ds = sample();
        let monthly = frame(
            op("resample", &[ParamValue::Str("1M".into()), ParamValue::Str("sum".into())])
                .apply(&ds)
                .unwrap(),
        );
        assert_eq!(monthly.index(), &[day(8, 31), day(9, 30)]);
        assert_eq!(monthly.series_values().unwrap(), &[4.0, 6.0]);
    }

    #[test]
    fn test_rolling_window() {
        let ds = Dataset::from_pairs(
            "t",
            [(day(1, 1), 1.0), (day(1, 2), 2.0), (day(1, 3), 3.0), (day(1, 4), 4.0)],
        );
        let rolled = frame(op("rolling", &[ParamValue::Int(2)]).apply(&ds).unwrap());
        let values = rolled.series_values().unwrap();
        assert!(values[0].is_nan());
        assert_eq!(&values[1..], &[1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_cumsum_and_diff() {
        let ds = sample();
        let cumulative = frame(op("cumsum", &[]).apply(&ds).unwrap());
        let values = cumulative.series_values().unwrap();
        assert_eq!(values[0], 4.0);
        assert!(values[1].is_nan());
        assert_eq!(&values[2..], &[5.0, 8.0, 10.0]);

        let diffs = frame(op("diff", &[]).apply(&ds).unwrap());
        assert_eq!(diffs.series_values().unwrap()[4], -1.0);
    }

    #[test]
    fn test_nlargest_keeps_index_order() {
        let top = frame(op("nlargest", &[ParamValue::Int(2)]).apply(&sample()).unwrap());
        assert_eq!(top.index(), &[day(8, 30), day(9, 15)]);
    }

    #[test]
    fn test_truncate_and_clip() {
        let ds = sample();
        let cut = frame(
            op(
                "truncate",
                &[ParamValue::Str("2022-09-01".into()), ParamValue::Str("2022-09-15".into())],
            )
            .apply(&ds)
            .unwrap(),
        );
        assert_eq!(cut.len(), 2);

        let clipped = frame(op("clip", &[ParamValue::Int(2), ParamValue::Int(3)]).apply(&ds).unwrap());
        assert_eq!(clipped.series_values().unwrap()[0], 3.0);
        assert_eq!(clipped.series_values().unwrap()[2], 2.0);
    }

    #[test]
    fn test_table_reductions_span_all_cells() {
        let mut columns = indexmap::IndexMap::new();
        columns.insert("tmin".to_string(), vec![1.0, 2.0]);
        columns.insert("tmax".to_string(), vec![5.0, 8.0]);
        let table = Dataset::table(vec![day(1, 1), day(1, 2)], columns).unwrap();
        assert_eq!(op("mean", &[]).apply(&table).unwrap(), OpValue::Number(4.0));
        assert!(op("idxmax", &[]).apply(&table).is_err());
        assert_eq!(op("name", &[]).apply(&table).unwrap(), OpValue::Nothing);
    }
}
