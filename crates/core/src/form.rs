//! Submission parsing and the candidate traits merge.
//!
//! Both transports normalize into a [`Submission`]: the browser sends
//! `application/x-www-form-urlencoded` pairs, the API sends a flat JSON
//! object. Keys beginning with `profile.traits.` address trait leaves
//! by dotted path.
//!
//! Merging is two-layered: the `parsed` document carries best-effort
//! typed values for validation and persistence, while the `echo` map
//! preserves the raw submitted representation so the UI can render the
//! user's input verbatim after a validation failure.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::flow::FlowType;
use crate::schema::{Leaf, LeafType, TraitSchema};
use crate::ui::CSRF_TOKEN_FIELD;

/// Form field selecting the strategy, e.g. `profile`.
pub const METHOD_FIELD: &str = "method";

/// Prefix of form fields that address trait leaves.
pub const TRAITS_FIELD_PREFIX: &str = "profile.traits.";

/// A submitted field value before typing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Form-encoded transport: everything is a string.
    Text(String),
    /// JSON transport: the client already sent a typed value.
    Json(Value),
}

/// The raw representation a leaf had in the last submission.
#[derive(Debug, Clone, PartialEq)]
pub enum EchoValue {
    Raw(String),
    Json(Value),
    Cleared,
}

pub type EchoMap = IndexMap<String, EchoValue>;

/// A normalized settings submission.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub method: Option<String>,
    pub csrf_token: Option<String>,
    /// Trait fields keyed by dotted path (prefix stripped).
    pub fields: IndexMap<String, RawValue>,
}

impl Submission {
    /// Build from decoded form pairs. Unknown keys are ignored.
    pub fn from_form_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut submission = Submission::default();
        for (key, value) in pairs {
            submission.ingest(&key, RawValue::Text(value));
        }
        submission
    }

    /// Build from a flat JSON object body.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut submission = Submission::default();
        for (key, value) in object {
            submission.ingest(key, RawValue::Json(value.clone()));
        }
        submission
    }

    fn ingest(&mut self, key: &str, value: RawValue) {
        let as_text = |v: &RawValue| match v {
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Json(Value::String(s)) => Some(s.clone()),
            RawValue::Json(_) => None,
        };

        if key == METHOD_FIELD {
            self.method = as_text(&value);
        } else if key == CSRF_TOKEN_FIELD {
            self.csrf_token = as_text(&value);
        } else if let Some(path) = key.strip_prefix(TRAITS_FIELD_PREFIX) {
            if !path.is_empty() {
                self.fields.insert(path.to_string(), value);
            }
        }
    }

    /// True when the submission carries no trait fields at all; the
    /// engine treats such a submission as a no-op.
    pub fn has_no_fields(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The result of merging a submission over the stored traits.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Typed merged document, input to validation and persistence.
    pub traits: Value,
    /// Raw per-leaf submitted values, input to the UI re-projection.
    pub echo: EchoMap,
}

/// Merge a submission over `current`, leaf by leaf.
///
/// - absent key: stored value is unchanged, except boolean leaves on
///   the browser transport, where an unchecked checkbox is simply not
///   submitted and therefore means `false`;
/// - empty form value or JSON `null`: clears the stored value;
/// - otherwise the value is parsed to the leaf's declared type where
///   possible; unparseable input is kept as a string so the validator
///   reports the type error and the UI echoes the input verbatim.
///
/// Submitted keys that match no schema leaf are ignored.
pub fn merge_submission(
    schema: &TraitSchema,
    current: &Value,
    submission: &Submission,
    transport: FlowType,
) -> Candidate {
    let mut traits = match current {
        Value::Object(_) => current.clone(),
        _ => Value::Object(Map::new()),
    };
    let mut echo = EchoMap::new();

    for leaf in schema.leaves() {
        match submission.fields.get(&leaf.name) {
            // Form values, and JSON strings bound to non-string leaves,
            // coerce through the scalar parser.
            Some(RawValue::Text(text)) | Some(RawValue::Json(Value::String(text))) => {
                if text.is_empty() {
                    remove_path(&mut traits, &leaf.segments);
                    echo.insert(leaf.name.clone(), EchoValue::Cleared);
                } else {
                    set_path(&mut traits, &leaf.segments, parse_scalar(leaf, text));
                    echo.insert(leaf.name.clone(), EchoValue::Raw(text.clone()));
                }
            }
            Some(RawValue::Json(value)) => {
                if value.is_null() {
                    remove_path(&mut traits, &leaf.segments);
                    echo.insert(leaf.name.clone(), EchoValue::Cleared);
                } else {
                    set_path(&mut traits, &leaf.segments, value.clone());
                    echo.insert(leaf.name.clone(), EchoValue::Json(value.clone()));
                }
            }
            None => {
                if transport == FlowType::Browser
                    && leaf.leaf_type == LeafType::Boolean
                    && !submission.fields.is_empty()
                {
                    set_path(&mut traits, &leaf.segments, Value::Bool(false));
                    echo.insert(leaf.name.clone(), EchoValue::Json(Value::Bool(false)));
                }
            }
        }
    }

    Candidate { traits, echo }
}

/// The protected leaves whose value would change if `candidate`
/// replaced `current`. Equality is value-based: `2.5 == 2.5` even when
/// one side was stored as an integer-backed number.
pub fn changed_protected_leaves<'a>(
    schema: &'a TraitSchema,
    current: &Value,
    candidate: &Value,
) -> Vec<&'a Leaf> {
    schema
        .leaves()
        .iter()
        .filter(|leaf| leaf.protected)
        .filter(|leaf| {
            !values_equal(
                get_path(current, &leaf.segments),
                get_path(candidate, &leaf.segments),
            )
        })
        .collect()
}

fn parse_scalar(leaf: &Leaf, text: &str) -> Value {
    match leaf.leaf_type {
        LeafType::Number => match text.parse::<f64>() {
            Ok(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(text.to_string())),
            Err(_) => Value::String(text.to_string()),
        },
        LeafType::Integer => match text.parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => match text.parse::<f64>() {
                Ok(n) => serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(text.to_string())),
                Err(_) => Value::String(text.to_string()),
            },
        },
        LeafType::Boolean => match text {
            "true" | "on" | "1" => Value::Bool(true),
            "false" | "off" | "0" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        LeafType::String => Value::String(text.to_string()),
    }
}

/// Look up a value by path segments.
pub fn get_path<'a>(document: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut cursor = document;
    for segment in segments {
        cursor = cursor.as_object()?.get(segment)?;
    }
    Some(cursor)
}

fn set_path(document: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = document;
    for segment in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        cursor = cursor
            .as_object_mut()
            .expect("cursor was just made an object")
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Some(object) = cursor.as_object_mut() {
        object.insert(last.clone(), value);
    }
}

fn remove_path(document: &mut Value, segments: &[String]) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = document;
    for segment in parents {
        match cursor.as_object_mut().and_then(|o| o.get_mut(segment)) {
            Some(next) => cursor = next,
            None => return,
        }
    }
    if let Some(object) = cursor.as_object_mut() {
        object.remove(last);
    }
}

fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (x, y) => x == y,
    }
}
