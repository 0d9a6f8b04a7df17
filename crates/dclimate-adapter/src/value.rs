//! Typed parameter values and the literal decoder used for query values and
//! encoded step parameter lists such as `[False, True, '1M']`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::separated_list0,
    number::complete::recognize_float,
    sequence::{delimited, pair, terminated},
    IResult,
};
use serde::Serialize;

/// A decoded request argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
    List(Vec<ParamValue>),
    Map(IndexMap<String, ParamValue>),
}

impl ParamValue {
    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Null => "none",
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "string",
            ParamValue::DateTime(_) => "datetime",
            ParamValue::List(_) => "list",
            ParamValue::Map(_) => "mapping",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view; ints widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

/// Decode a boolean query value: `true`, `TRUE` and `True` are all accepted.
pub fn parse_boolean(text: &str) -> Result<bool, String> {
    let mut chars = text.chars();
    let normalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    match normalized.as_str() {
        "True" => Ok(true),
        "False" => Ok(false),
        _ => Err(format!("'{}' is not a boolean", text)),
    }
}

/// Parse an ISO-8601 date or date-time. Offsets are normalized to UTC and a
/// bare date is promoted to midnight.
pub fn parse_iso_datetime(text: &str) -> Result<NaiveDateTime, String> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc());
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("'{}' is not an ISO-8601 date", text))
}

/// Decode a single literal (number, quoted string, boolean, `None`, or list).
pub fn parse_literal(text: &str) -> Result<ParamValue, String> {
    all_consuming(ws(literal))(text)
        .map(|(_, v)| v)
        .map_err(|e| format!("cannot decode literal '{}': {}", text, e))
}

/// Decode a literal that must be a list or tuple.
pub fn parse_literal_list(text: &str) -> Result<Vec<ParamValue>, String> {
    match parse_literal(text)? {
        ParamValue::List(items) => Ok(items),
        other => Err(format!("expected a list, found {}", other.type_name())),
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn literal(input: &str) -> IResult<&str, ParamValue> {
    alt((list, quoted, keyword, number))(input)
}

fn list(input: &str) -> IResult<&str, ParamValue> {
    map(
        alt((
            delimited(char('['), items, char(']')),
            delimited(char('('), items, char(')')),
        )),
        ParamValue::List,
    )(input)
}

fn items(input: &str) -> IResult<&str, Vec<ParamValue>> {
    terminated(
        separated_list0(char(','), ws(literal)),
        pair(opt(char(',')), multispace0),
    )(input)
}

fn quoted(input: &str) -> IResult<&str, ParamValue> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| ParamValue::Str(s.to_string()),
    )(input)
}

fn keyword(input: &str) -> IResult<&str, ParamValue> {
    alt((
        value(ParamValue::Bool(true), alt((tag("True"), tag("true")))),
        value(ParamValue::Bool(false), alt((tag("False"), tag("false")))),
        value(ParamValue::Null, alt((tag("None"), tag("null")))),
    ))(input)
}

fn number(input: &str) -> IResult<&str, ParamValue> {
    map_res(recognize_float, |text: &str| {
        if text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
            return text.parse::<f64>().map(ParamValue::Float);
        }
        match text.parse::<i64>() {
            Ok(i) => Ok(ParamValue::Int(i)),
            Err(_) => text.parse::<f64>().map(ParamValue::Float),
        }
    })(input)
}
