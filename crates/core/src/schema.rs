//! Identity trait schemas: parsing, leaf metadata, and validation.
//!
//! A trait schema is a JSON-schema-style document whose
//! `properties.traits` subtree describes the user-editable profile
//! fields. Leaves carry the declared type, optional constraints
//! (`minLength`, `minimum`, ...), a `format` hint, and a vendor
//! extension block:
//!
//! ```json
//! "email": {
//!     "type": "string",
//!     "format": "email",
//!     "ext": {"protected": true, "verification": {"via": "email"}}
//! }
//! ```
//!
//! `protected` leaves require a recently-authenticated session to
//! change (sudo mode); `verification.via` marks the leaf as a
//! verifiable address source.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use validator::ValidateEmail;

use crate::error::CoreError;
use crate::form::get_path;
use crate::identity::VerifiableAddress;
use crate::ui::text;

/// Schema id used when a deployment registers a single schema.
pub const DEFAULT_SCHEMA_ID: &str = "default";

/// Declared JSON type of a schema leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafType {
    String,
    Number,
    Integer,
    Boolean,
}

impl LeafType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(LeafType::String),
            "number" => Some(LeafType::Number),
            "integer" => Some(LeafType::Integer),
            "boolean" => Some(LeafType::Boolean),
            _ => None,
        }
    }
}

/// A single editable field of the traits document.
#[derive(Debug, Clone)]
pub struct Leaf {
    /// Dotted path under `traits`, e.g. `email` or `address.city`.
    pub name: String,
    /// JSON pointer into the traits document, e.g. `/address/city`.
    pub pointer: String,
    pub segments: Vec<String>,
    pub leaf_type: LeafType,
    pub format: Option<String>,
    pub required: bool,
    /// Changing a protected leaf requires sudo mode.
    pub protected: bool,
    /// Set when the leaf value is a verifiable address; holds the
    /// delivery channel (e.g. `"email"`).
    pub verification_via: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl Leaf {
    /// Form field name used on the wire, e.g. `profile.traits.email`.
    pub fn field_name(&self) -> String {
        format!("profile.traits.{}", self.name)
    }
}

/// A validation failure anchored to a traits document location.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub pointer: String,
    pub code: u32,
    pub message: String,
}

impl FieldError {
    fn new(pointer: &str, code: u32, message: String) -> Self {
        Self {
            pointer: pointer.to_string(),
            code,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw document shape (serde)
// ---------------------------------------------------------------------------

// IndexMap keeps the author's property order; it drives UI node order.

#[derive(Deserialize)]
struct RawSchema {
    properties: Option<RawRootProperties>,
}

#[derive(Deserialize)]
struct RawRootProperties {
    traits: Option<RawProperty>,
}

#[derive(Deserialize)]
struct RawProperty {
    #[serde(rename = "type")]
    type_: Option<String>,
    format: Option<String>,
    #[serde(rename = "minLength")]
    min_length: Option<u64>,
    #[serde(rename = "maxLength")]
    max_length: Option<u64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    #[serde(default)]
    properties: IndexMap<String, RawProperty>,
    #[serde(default)]
    required: Vec<String>,
    ext: Option<RawExt>,
}

#[derive(Deserialize)]
struct RawExt {
    #[serde(default)]
    protected: bool,
    verification: Option<RawVerification>,
}

#[derive(Deserialize)]
struct RawVerification {
    via: String,
}

// ---------------------------------------------------------------------------
// TraitSchema
// ---------------------------------------------------------------------------

/// A parsed trait schema: an ordered list of leaves.
#[derive(Debug, Clone)]
pub struct TraitSchema {
    pub id: String,
    leaves: Vec<Leaf>,
}

impl TraitSchema {
    /// Parse a schema document. Fails when the document is not valid
    /// JSON or a leaf declares an unsupported type.
    pub fn parse(id: impl Into<String>, raw: &str) -> Result<Self, CoreError> {
        let doc: RawSchema = serde_json::from_str(raw)
            .map_err(|e| CoreError::Validation(format!("invalid identity schema: {e}")))?;

        let mut leaves = Vec::new();
        if let Some(traits) = doc.properties.and_then(|p| p.traits) {
            collect_leaves(&traits, &mut Vec::new(), &mut leaves)?;
        }

        Ok(Self {
            id: id.into(),
            leaves,
        })
    }

    /// Leaves in schema traversal order.
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn leaf(&self, name: &str) -> Option<&Leaf> {
        self.leaves.iter().find(|l| l.name == name)
    }

    /// Validate a traits document against the schema.
    pub fn validate(&self, traits: &Value) -> Vec<FieldError> {
        let mut errors = Vec::new();

        for leaf in &self.leaves {
            match get_path(traits, &leaf.segments) {
                None | Some(Value::Null) => {
                    if leaf.required {
                        errors.push(FieldError::new(
                            &leaf.pointer,
                            text::ERR_PROPERTY_MISSING,
                            format!("property {} is missing", leaf.name),
                        ));
                    }
                }
                Some(value) => validate_leaf(leaf, value, &mut errors),
            }
        }

        errors
    }

    /// Extract the verifiable addresses declared by the schema from a
    /// traits document. Addresses start out unverified; the caller
    /// reconciles against the identity's stored set.
    pub fn verifiable_addresses(&self, traits: &Value) -> Vec<VerifiableAddress> {
        self.leaves
            .iter()
            .filter_map(|leaf| {
                let via = leaf.verification_via.as_ref()?;
                let value = get_path(traits, &leaf.segments)?.as_str()?;
                if value.is_empty() {
                    return None;
                }
                Some(VerifiableAddress {
                    value: value.to_string(),
                    via: via.clone(),
                    verified: false,
                })
            })
            .collect()
    }
}

fn collect_leaves(
    node: &RawProperty,
    path: &mut Vec<String>,
    leaves: &mut Vec<Leaf>,
) -> Result<(), CoreError> {
    for (key, prop) in &node.properties {
        path.push(key.clone());

        if !prop.properties.is_empty() {
            collect_leaves(prop, path, leaves)?;
        } else {
            let declared = prop.type_.as_deref().unwrap_or("string");
            let leaf_type = LeafType::parse(declared).ok_or_else(|| {
                CoreError::Validation(format!(
                    "unsupported type {declared:?} for trait {}",
                    path.join(".")
                ))
            })?;

            leaves.push(Leaf {
                name: path.join("."),
                pointer: format!("/{}", path.join("/")),
                segments: path.clone(),
                leaf_type,
                format: prop.format.clone(),
                required: node.required.contains(key),
                protected: prop.ext.as_ref().is_some_and(|e| e.protected),
                verification_via: prop
                    .ext
                    .as_ref()
                    .and_then(|e| e.verification.as_ref())
                    .map(|v| v.via.clone()),
                min_length: prop.min_length,
                max_length: prop.max_length,
                minimum: prop.minimum,
                maximum: prop.maximum,
            });
        }

        path.pop();
    }
    Ok(())
}

fn validate_leaf(leaf: &Leaf, value: &Value, errors: &mut Vec<FieldError>) {
    match leaf.leaf_type {
        LeafType::String => {
            let Some(s) = value.as_str() else {
                errors.push(FieldError::new(
                    &leaf.pointer,
                    text::ERR_TYPE_MISMATCH,
                    format!("expected string, but got {}", json_kind(value)),
                ));
                return;
            };
            let length = s.chars().count() as u64;
            if let Some(min) = leaf.min_length {
                if length < min {
                    errors.push(FieldError::new(
                        &leaf.pointer,
                        text::ERR_LENGTH,
                        format!("length must be >= {min}, but got {length}"),
                    ));
                }
            }
            if let Some(max) = leaf.max_length {
                if length > max {
                    errors.push(FieldError::new(
                        &leaf.pointer,
                        text::ERR_LENGTH,
                        format!("length must be <= {max}, but got {length}"),
                    ));
                }
            }
            if leaf.format.as_deref() == Some("email") && !s.validate_email() {
                errors.push(FieldError::new(
                    &leaf.pointer,
                    text::ERR_FORMAT,
                    format!("{s:?} is not valid \"email\""),
                ));
            }
        }
        LeafType::Number | LeafType::Integer => {
            if !value.is_number() {
                errors.push(FieldError::new(
                    &leaf.pointer,
                    text::ERR_TYPE_MISMATCH,
                    format!("expected number, but got {}", json_kind(value)),
                ));
                return;
            }
            let number = value.as_f64().unwrap_or_default();
            if leaf.leaf_type == LeafType::Integer && number.fract() != 0.0 {
                errors.push(FieldError::new(
                    &leaf.pointer,
                    text::ERR_TYPE_MISMATCH,
                    "expected integer, but got number".to_string(),
                ));
                return;
            }
            if let Some(min) = leaf.minimum {
                if number < min {
                    errors.push(FieldError::new(
                        &leaf.pointer,
                        text::ERR_RANGE,
                        format!(
                            "must be >= {} but found {}",
                            fmt_number(min),
                            fmt_number(number)
                        ),
                    ));
                }
            }
            if let Some(max) = leaf.maximum {
                if number > max {
                    errors.push(FieldError::new(
                        &leaf.pointer,
                        text::ERR_RANGE,
                        format!(
                            "must be <= {} but found {}",
                            fmt_number(max),
                            fmt_number(number)
                        ),
                    ));
                }
            }
        }
        LeafType::Boolean => {
            if !value.is_boolean() {
                errors.push(FieldError::new(
                    &leaf.pointer,
                    text::ERR_TYPE_MISMATCH,
                    format!("expected boolean, but got {}", json_kind(value)),
                ));
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a float without a trailing `.0` for whole values, so error
/// texts read `must be >= 1200` rather than `must be >= 1200.0`.
fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ---------------------------------------------------------------------------
// SchemaRegistry
// ---------------------------------------------------------------------------

/// Registered trait schemas keyed by schema id.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<TraitSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TraitSchema) {
        self.schemas.insert(schema.id.clone(), Arc::new(schema));
    }

    pub fn get(&self, id: &str) -> Result<Arc<TraitSchema>, CoreError> {
        self.schemas
            .get(id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "identity schema",
                id: id.to_string(),
            })
    }
}
