//! Response normalization at the transport boundary
//!
//! Endpoints answer either with standard SPARQL JSON results
//! (`{"results": {"bindings": [...]}}`) or with a bare array of row objects.
//! Both shapes are reduced to [`Row`]s here; anything else becomes a
//! [`MalformedResponse`] that callers log and treat as "no rows".

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

/// One result row: variable name -> lexical value
pub type Row = HashMap<String, String>;

/// Which accepted shape a body was recognised as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    SparqlJson,
    BareRows,
}

/// Non-fatal warning for a body that matched neither accepted shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedResponse {
    pub reason: String,
}

impl MalformedResponse {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MalformedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unexpected SPARQL response format: {}", self.reason)
    }
}

/// Normalized rows plus the shape they were read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRows {
    pub shape: ResponseShape,
    pub rows: Vec<Row>,
}

/// Classify `body` and extract its rows
pub fn parse_rows(body: &Value) -> Result<ParsedRows, MalformedResponse> {
    match body {
        Value::Object(obj) => {
            let bindings = obj
                .get("results")
                .and_then(|results| results.get("bindings"))
                .ok_or_else(|| MalformedResponse::new("missing results.bindings"))?;
            let Value::Array(bindings) = bindings else {
                return Err(MalformedResponse::new("results.bindings is not an array"));
            };
            Ok(ParsedRows {
                shape: ResponseShape::SparqlJson,
                rows: rows_from_array(bindings)?,
            })
        }
        Value::Array(rows) => Ok(ParsedRows {
            shape: ResponseShape::BareRows,
            rows: rows_from_array(rows)?,
        }),
        other => Err(MalformedResponse::new(format!(
            "expected an object or array, got {}",
            json_kind(other)
        ))),
    }
}

fn rows_from_array(items: &[Value]) -> Result<Vec<Row>, MalformedResponse> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(fields) => Ok(row_from_fields(fields)),
            other => Err(MalformedResponse::new(format!(
                "row {} is {}, expected an object",
                i,
                json_kind(other)
            ))),
        })
        .collect()
}

/// Fields are either `{"type": ..., "value": ...}` terms or plain scalars;
/// fields without a usable value are left out of the row
fn row_from_fields(fields: &Map<String, Value>) -> Row {
    fields
        .iter()
        .filter_map(|(name, term)| {
            let value = match term {
                Value::Object(term) => scalar(term.get("value")?)?,
                other => scalar(other)?,
            };
            Some((name.clone(), value))
        })
        .collect()
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
