//! Closed per-event payload schemas.
//!
//! Every inbound event payload is checked against the schema registered for
//! its event name before a handler sees it. Schemas are closed (undeclared
//! fields are rejected) and scalar values are coerced to the declared type
//! first, so `"12"` satisfies an integer field and `5` satisfies a string
//! field. All violations are reported at once.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use corkboard_types::events::{
    CREATE_STICKER, DELETE_STICKER, FieldViolation, JOIN_BOARD, UPDATE_STICKER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text { min_length: usize },
    Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

const TEXT: FieldKind = FieldKind::Text { min_length: 1 };

pub const JOIN_BOARD_FIELDS: &[Field] = &[Field::required("boardId", FieldKind::Integer)];

pub const CREATE_STICKER_FIELDS: &[Field] = &[
    Field::required("boardId", FieldKind::Integer),
    Field::required("authorId", FieldKind::Integer),
    Field::required("x", FieldKind::Integer),
    Field::required("y", FieldKind::Integer),
    Field::required("text", TEXT),
    Field::optional("color", FieldKind::Integer),
    Field::optional("zIndex", FieldKind::Integer),
];

pub const UPDATE_STICKER_FIELDS: &[Field] = &[
    Field::required("id", FieldKind::Uuid),
    Field::optional("x", FieldKind::Integer),
    Field::optional("y", FieldKind::Integer),
    Field::optional("text", TEXT),
    Field::optional("color", FieldKind::Integer),
    Field::optional("zIndex", FieldKind::Integer),
];

pub const DELETE_STICKER_FIELDS: &[Field] = &[Field::required("id", FieldKind::Uuid)];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed with {} violation(s)", .violations.len())]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    fn single(violation: FieldViolation) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

/// A schema prepared for lookups: field table plus the required list in
/// declaration order.
#[derive(Debug)]
pub struct CompiledSchema {
    fields: HashMap<&'static str, FieldKind>,
    required: Vec<&'static str>,
}

impl CompiledSchema {
    pub fn compile(fields: &[Field]) -> Self {
        Self {
            fields: fields.iter().map(|f| (f.name, f.kind)).collect(),
            required: fields.iter().filter(|f| f.required).map(|f| f.name).collect(),
        }
    }

    /// Check a payload and return its coerced form.
    pub fn validate(&self, payload: Value) -> Result<Value, ValidationError> {
        let payload = match payload {
            // Some clients send the payload as a JSON-encoded string
            Value::String(raw) => serde_json::from_str(&raw)
                .map_err(|_| ValidationError::single(not_an_object()))?,
            other => other,
        };

        let Value::Object(object) = payload else {
            return Err(ValidationError::single(not_an_object()));
        };

        let mut violations = Vec::new();

        for name in &self.required {
            if !object.contains_key(*name) {
                violations.push(FieldViolation {
                    instance_path: String::new(),
                    keyword: "required".into(),
                    message: format!("must have required property '{}'", name),
                    params: json!({ "missingProperty": name }),
                });
            }
        }

        let mut coerced = Map::new();
        for (key, value) in object {
            let Some(kind) = self.fields.get(key.as_str()) else {
                violations.push(FieldViolation {
                    instance_path: String::new(),
                    keyword: "additionalProperties".into(),
                    message: "must NOT have additional properties".into(),
                    params: json!({ "additionalProperty": key }),
                });
                continue;
            };

            match check_field(&key, *kind, value) {
                Ok(value) => {
                    coerced.insert(key, value);
                }
                Err(violation) => violations.push(violation),
            }
        }

        if violations.is_empty() {
            Ok(Value::Object(coerced))
        } else {
            Err(ValidationError { violations })
        }
    }
}

/// Event name -> compiled schema. Built once, read-only afterwards.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: HashMap<&'static str, CompiledSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Registry holding the four board events.
    pub fn new() -> Self {
        let schemas = [
            (JOIN_BOARD, JOIN_BOARD_FIELDS),
            (CREATE_STICKER, CREATE_STICKER_FIELDS),
            (UPDATE_STICKER, UPDATE_STICKER_FIELDS),
            (DELETE_STICKER, DELETE_STICKER_FIELDS),
        ]
        .into_iter()
        .map(|(event, fields)| (event, CompiledSchema::compile(fields)))
        .collect();

        Self { schemas }
    }

    /// Validate a payload for `event`. An event without a schema is
    /// rejected.
    pub fn validate(&self, event: &str, payload: Value) -> Result<Value, ValidationError> {
        match self.schemas.get(event) {
            Some(schema) => schema.validate(payload),
            None => Err(ValidationError::single(FieldViolation {
                instance_path: String::new(),
                keyword: "event".into(),
                message: format!("no schema registered for event '{}'", event),
                params: json!({ "event": event }),
            })),
        }
    }

    /// Validate, then decode into the event's command type.
    pub fn decode<T: DeserializeOwned>(
        &self,
        event: &str,
        payload: Value,
    ) -> Result<T, ValidationError> {
        let value = self.validate(event, payload)?;
        serde_json::from_value(value).map_err(|e| {
            ValidationError::single(FieldViolation {
                instance_path: String::new(),
                keyword: "type".into(),
                message: e.to_string(),
                params: Value::Null,
            })
        })
    }
}

fn not_an_object() -> FieldViolation {
    FieldViolation {
        instance_path: String::new(),
        keyword: "type".into(),
        message: "must be object".into(),
        params: json!({ "type": "object" }),
    }
}

fn check_field(name: &str, kind: FieldKind, value: Value) -> Result<Value, FieldViolation> {
    let path = format!("/{}", name);
    match kind {
        FieldKind::Integer => coerce_integer(&value).ok_or_else(|| FieldViolation {
            instance_path: path,
            keyword: "type".into(),
            message: "must be integer".into(),
            params: json!({ "type": "integer" }),
        }),

        FieldKind::Text { min_length } => {
            let text = coerce_string(value).ok_or_else(|| must_be_string(&path))?;
            if text.chars().count() < min_length {
                return Err(FieldViolation {
                    instance_path: path,
                    keyword: "minLength".into(),
                    message: format!("must NOT have fewer than {} characters", min_length),
                    params: json!({ "limit": min_length }),
                });
            }
            Ok(Value::String(text))
        }

        FieldKind::Uuid => {
            let text = coerce_string(value).ok_or_else(|| must_be_string(&path))?;
            parse_uuid(&text)
                .map(|id| Value::String(id.hyphenated().to_string()))
                .ok_or_else(|| FieldViolation {
                    instance_path: path,
                    keyword: "format".into(),
                    message: "must match format \"uuid\"".into(),
                    params: json!({ "format": "uuid" }),
                })
        }
    }
}

fn must_be_string(path: &str) -> FieldViolation {
    FieldViolation {
        instance_path: path.to_string(),
        keyword: "type".into(),
        message: "must be string".into(),
        params: json!({ "type": "string" }),
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_f64))
            .map(Value::from),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                .map(Value::from)
        }
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        Value::Null => Some(Value::from(0)),
        _ => None,
    }
}

fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn coerce_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() => number_text(f),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Text form of a float as a JavaScript client would print it: `1.0` is
/// `"1"`, and magnitudes from 1e21 up or below 1e-6 use `e+`/`e-` notation.
fn number_text(f: f64) -> String {
    let magnitude = f.abs();
    if magnitude == 0.0 {
        return "0".into();
    }
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let text = format!("{:e}", f);
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => text,
        };
    }
    format!("{}", f)
}

/// Canonical 8-4-4-4-12 form, optionally prefixed with `urn:uuid:`.
fn parse_uuid(text: &str) -> Option<Uuid> {
    let bare = text.strip_prefix("urn:uuid:").unwrap_or(text);
    if bare.len() != 36 {
        return None;
    }
    Uuid::try_parse(bare).ok()
}
