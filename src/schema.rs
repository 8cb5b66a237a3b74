//! Schema coercion: degrade gracefully, annotate, let the caller choose.
//!
//! LLM output is frequently almost right: one field missing, one field the
//! wrong type. Strict deserialization would discard the whole object over
//! that, so this layer instead fills absent required fields with `null`,
//! records every deviation, and keeps the partial data.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Recursion cap shared by `merge` and nested salvage.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Marker keys the calling pipeline inspects to decide on an upstream retry.
pub const VALIDATION_STATUS_KEY: &str = "_validation_status";
pub const VALIDATION_ERRORS_KEY: &str = "_validation_errors";
pub const PARSING_ERROR_KEY: &str = "_parsing_error";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaSpec {
    pub required: BTreeSet<String>,
    /// `Some` enables strict-mode pruning of keys outside required ∪ optional.
    pub optional: Option<BTreeSet<String>>,
    pub strict: bool,
}

impl SchemaSpec {
    pub fn required<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: fields.into_iter().map(Into::into).collect(),
            optional: None,
            strict: false,
        }
    }

    pub fn with_optional<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn allows(&self, key: &str) -> bool {
        self.required.contains(key)
            || self
                .optional
                .as_ref()
                .is_some_and(|opt| opt.contains(key))
    }
}

/// Validates `value` against `schema`. Absent required fields are inserted as
/// `null` and recorded; with strict mode and an optional-field list, unknown
/// keys are dropped and recorded. Non-object input is returned unchanged with
/// an error entry. Never fails.
pub fn coerce(value: &Value, schema: &SchemaSpec) -> (Value, BTreeMap<String, String>) {
    let mut errors = BTreeMap::new();

    let Some(obj) = value.as_object() else {
        errors.insert(
            "_root".to_string(),
            format!("expected object, got {}", type_name(value)),
        );
        return (value.clone(), errors);
    };

    let mut out = Map::new();
    for (key, v) in obj {
        if schema.strict && schema.optional.is_some() && !schema.allows(key) {
            errors.insert(key.clone(), "unexpected field dropped".to_string());
            continue;
        }
        out.insert(key.clone(), v.clone());
    }

    for field in &schema.required {
        if !out.contains_key(field) {
            errors.insert(field.clone(), "required field missing".to_string());
            out.insert(field.clone(), Value::Null);
        }
    }

    if !errors.is_empty() {
        tracing::warn!(errors = errors.len(), "schema coercion recorded deviations");
    }
    (Value::Object(out), errors)
}

/// Outcome of typed coercion. `typed` is `None` when construction failed; the
/// annotated `value` keeps the partial data either way.
#[derive(Debug)]
pub struct TypedCoercion<T> {
    pub typed: Option<T>,
    pub value: Value,
    pub errors: BTreeMap<String, String>,
}

/// Field-coerces `value`, then attempts to build `T` from it. On failure the
/// coerced value is returned annotated with `_validation_status: "failed"`
/// and the field-level messages under `_validation_errors`, never discarded.
pub fn coerce_typed<T: DeserializeOwned>(value: &Value, schema: &SchemaSpec) -> TypedCoercion<T> {
    let (coerced, mut errors) = coerce(value, schema);

    match serde_json::from_value::<T>(coerced.clone()) {
        Ok(typed) => TypedCoercion {
            typed: Some(typed),
            value: coerced,
            errors,
        },
        Err(err) => {
            errors.insert("_construct".to_string(), err.to_string());
            tracing::warn!(error = %err, "typed validation failed, returning annotated partial");
            let mut annotated = match coerced {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            };
            annotated.insert(
                VALIDATION_STATUS_KEY.to_string(),
                Value::String("failed".to_string()),
            );
            annotated.insert(
                VALIDATION_ERRORS_KEY.to_string(),
                Value::Object(
                    errors
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                ),
            );
            TypedCoercion {
                typed: None,
                value: Value::Object(annotated),
                errors,
            }
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Deep merge. Object+object recurses; array+array either takes `secondary`
/// wholesale (`override_conflicts`) or appends its non-duplicate items; any
/// other conflict resolves to `secondary` when `override_conflicts`, else
/// `primary`. Depth-capped: past the cap the primary side wins untouched.
pub fn merge(primary: &Value, secondary: &Value, override_conflicts: bool) -> Value {
    merge_depth(primary, secondary, override_conflicts, DEFAULT_MAX_DEPTH)
}

fn merge_depth(primary: &Value, secondary: &Value, override_conflicts: bool, depth: usize) -> Value {
    if depth == 0 {
        tracing::warn!("merge recursion depth exceeded, keeping primary subtree");
        return primary.clone();
    }
    match (primary, secondary) {
        (Value::Object(a), Value::Object(b)) => {
            let mut out = a.clone();
            for (key, bv) in b {
                match out.get(key) {
                    Some(av) => {
                        let merged = merge_depth(av, bv, override_conflicts, depth - 1);
                        out.insert(key.clone(), merged);
                    }
                    None => {
                        out.insert(key.clone(), bv.clone());
                    }
                }
            }
            Value::Object(out)
        }
        (Value::Array(a), Value::Array(b)) => {
            if override_conflicts {
                Value::Array(b.clone())
            } else {
                let mut out = a.clone();
                for item in b {
                    if !out.contains(item) {
                        out.push(item.clone());
                    }
                }
                Value::Array(out)
            }
        }
        _ => {
            if override_conflicts {
                secondary.clone()
            } else {
                primary.clone()
            }
        }
    }
}
