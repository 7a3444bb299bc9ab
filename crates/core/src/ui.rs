//! Declarative form projection.
//!
//! A settings flow carries a [`UiContainer`]: the CSRF node first, then
//! one input node per schema leaf in schema traversal order. The
//! projection is two-layered on purpose: after a failed validation the
//! node values echo the user's raw submitted strings verbatim, while an
//! accepted submission re-projects typed values from the updated traits
//! document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::form::{get_path, EchoMap, EchoValue};
use crate::schema::{FieldError, LeafType, TraitSchema};

/// Form field carrying the CSRF synchronizer token.
pub const CSRF_TOKEN_FIELD: &str = "csrf_token";

/// Stable message ids, modeled on the numbering scheme of the original
/// self-service platform: 1xxxxxx informational, 4xxxxxx user error.
pub mod text {
    pub const INFO_SETTINGS_SAVED: u32 = 1_050_001;

    pub const ERR_VALIDATION: u32 = 4_000_001;
    pub const ERR_PROPERTY_MISSING: u32 = 4_000_002;
    pub const ERR_TYPE_MISMATCH: u32 = 4_000_003;
    pub const ERR_LENGTH: u32 = 4_000_004;
    pub const ERR_RANGE: u32 = 4_000_005;
    pub const ERR_FORMAT: u32 = 4_000_006;
    pub const ERR_FLOW_OWNERSHIP: u32 = 4_000_007;
    pub const ERR_HOOK_FAILED: u32 = 4_000_008;
}

/// A human-readable message attached to a node or to the whole flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiText {
    pub id: u32,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: TextKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Info,
    Error,
}

impl UiText {
    pub fn info(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            kind: TextKind::Info,
        }
    }

    pub fn error(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            kind: TextKind::Error,
        }
    }

    /// Info message shown on a flow that reached `success`.
    pub fn settings_saved() -> Self {
        Self::info(text::INFO_SETTINGS_SAVED, "Your changes have been saved!")
    }

    /// Fixed ownership error. The wording is load-bearing: clients and
    /// tests match on "initiated by another person".
    pub fn initiated_by_another() -> Self {
        Self::error(
            text::ERR_FLOW_OWNERSHIP,
            "The flow was initiated by another person and has been blocked for security reasons.",
        )
    }

    /// Synthetic error left on a flow rolled back after a hook failure.
    pub fn hook_failed() -> Self {
        Self::error(
            text::ERR_HOOK_FAILED,
            "An error occurred while processing your changes. Please try again.",
        )
    }
}

/// A typed input node value. `Null` renders as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl NodeValue {
    /// Best-effort conversion from a JSON value; non-scalar values
    /// degrade to their compact JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => NodeValue::Null,
            Value::Bool(b) => NodeValue::Bool(*b),
            Value::Number(n) => NodeValue::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => NodeValue::Str(s.clone()),
            other => NodeValue::Str(other.to_string()),
        }
    }
}

/// HTML input type of a node, mapped from the schema leaf type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Number,
    Checkbox,
    Hidden,
}

impl From<LeafType> for InputType {
    fn from(leaf_type: LeafType) -> Self {
        match leaf_type {
            // An "email" format hint still renders as a text input.
            LeafType::String => InputType::Text,
            LeafType::Number | LeafType::Integer => InputType::Number,
            LeafType::Boolean => InputType::Checkbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAttributes {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    pub value: NodeValue,
}

/// A single element of the declarative form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub group: String,
    pub attributes: InputAttributes,
    #[serde(default)]
    pub messages: Vec<UiText>,
}

impl UiNode {
    pub fn input(
        group: impl Into<String>,
        name: impl Into<String>,
        input_type: InputType,
        value: NodeValue,
    ) -> Self {
        Self {
            node_type: "input".to_string(),
            group: group.into(),
            attributes: InputAttributes {
                name: name.into(),
                input_type,
                value,
            },
            messages: Vec::new(),
        }
    }
}

/// The declarative form of a flow: where to submit and what to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiContainer {
    pub action: String,
    pub method: String,
    pub nodes: Vec<UiNode>,
    #[serde(default)]
    pub messages: Vec<UiText>,
}

impl UiContainer {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            method: "POST".to_string(),
            nodes: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Prepend a flow-level message (newest first).
    pub fn push_message(&mut self, message: UiText) {
        self.messages.insert(0, message);
    }
}

/// Project the settings form for a schema and traits document.
///
/// - `csrf_token` is empty on the API transport.
/// - `echo` carries the raw values of the last submission; when a leaf
///   is present there, that value wins over the traits document so the
///   user sees exactly what they typed.
/// - `errors` are attached to the node whose pointer matches; errors
///   without a matching leaf land on the container.
pub fn project_form(
    schema: &TraitSchema,
    action: &str,
    csrf_token: &str,
    traits: &Value,
    echo: Option<&EchoMap>,
    errors: &[FieldError],
) -> UiContainer {
    let mut ui = UiContainer::new(action);

    ui.nodes.push(UiNode::input(
        "default",
        CSRF_TOKEN_FIELD,
        InputType::Hidden,
        NodeValue::Str(csrf_token.to_string()),
    ));

    for leaf in schema.leaves() {
        let value = echo
            .and_then(|e| e.get(&leaf.name))
            .map(|echoed| match echoed {
                EchoValue::Raw(s) => NodeValue::Str(s.clone()),
                EchoValue::Json(v) => NodeValue::from_json(v),
                EchoValue::Cleared => NodeValue::Null,
            })
            .or_else(|| get_path(traits, &leaf.segments).map(NodeValue::from_json))
            .unwrap_or(NodeValue::Null);

        let mut node = UiNode::input(
            "profile",
            leaf.field_name(),
            InputType::from(leaf.leaf_type),
            value,
        );
        node.messages = errors
            .iter()
            .filter(|e| e.pointer == leaf.pointer)
            .map(|e| UiText::error(e.code, e.message.clone()))
            .collect();
        ui.nodes.push(node);
    }

    // Anything not anchored to a leaf becomes a flow-level message.
    for error in errors {
        if schema.leaves().iter().all(|l| l.pointer != error.pointer) {
            ui.messages.push(UiText::error(error.code, error.message.clone()));
        }
    }

    ui
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::form::EchoValue;
    use crate::schema::TraitSchema;

    fn schema() -> TraitSchema {
        TraitSchema::parse(
            "default",
            r##"{
                "$id": "https://example.com/person.schema.json",
                "type": "object",
                "properties": {
                    "traits": {
                        "type": "object",
                        "properties": {
                            "email": {"type": "string", "format": "email"},
                            "numby": {"type": "number"},
                            "booly": {"type": "boolean"}
                        }
                    }
                }
            }"##,
        )
        .unwrap()
    }

    #[test]
    fn csrf_node_comes_first_then_leaves_in_schema_order() {
        let schema = schema();
        let traits = json!({"email": "a@example.com", "numby": 2.5, "booly": false});
        let ui = project_form(&schema, "http://x/submit", "tok", &traits, None, &[]);

        let names: Vec<&str> = ui.nodes.iter().map(|n| n.attributes.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "csrf_token",
                "profile.traits.email",
                "profile.traits.numby",
                "profile.traits.booly"
            ]
        );
        assert_eq!(ui.nodes[0].attributes.input_type, InputType::Hidden);
        assert_eq!(ui.nodes[0].attributes.value, NodeValue::Str("tok".into()));
        assert_eq!(ui.nodes[2].attributes.input_type, InputType::Number);
        assert_eq!(ui.nodes[2].attributes.value, NodeValue::Number(2.5));
        assert_eq!(ui.nodes[3].attributes.input_type, InputType::Checkbox);
    }

    #[test]
    fn echoed_raw_value_wins_over_traits() {
        let schema = schema();
        let traits = json!({"numby": 2.5});
        let mut echo = EchoMap::new();
        echo.insert(
            "numby".to_string(),
            EchoValue::Raw("this-is-not-a-number".to_string()),
        );

        let ui = project_form(&schema, "http://x/submit", "", &traits, Some(&echo), &[]);
        let numby = ui
            .nodes
            .iter()
            .find(|n| n.attributes.name == "profile.traits.numby")
            .unwrap();
        assert_eq!(
            numby.attributes.value,
            NodeValue::Str("this-is-not-a-number".into())
        );
    }

    #[test]
    fn field_errors_attach_to_matching_node() {
        let schema = schema();
        let traits = json!({});
        let errors = vec![FieldError {
            pointer: "/numby".to_string(),
            code: text::ERR_TYPE_MISMATCH,
            message: "expected number, but got string".to_string(),
        }];

        let ui = project_form(&schema, "http://x/submit", "", &traits, None, &errors);
        let numby = ui
            .nodes
            .iter()
            .find(|n| n.attributes.name == "profile.traits.numby")
            .unwrap();
        assert_eq!(numby.messages.len(), 1);
        assert_eq!(numby.messages[0].text, "expected number, but got string");
        assert!(ui.messages.is_empty());
    }
}
