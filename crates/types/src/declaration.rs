//! Activity extension declarations.
//!
//! These models mirror the authoring shape of the activity extension elements: input/output
//! parameters, form data, a form key, the formal ioSpecification port graph, connector wiring,
//! properties, and loop characteristics. They are loaded once per activity definition and are
//! never mutated afterwards; every mutable concern lives on an activation in the engine.
//!
//! Authoring order is preserved everywhere (plain `Vec`s) because parameter evaluation is
//! left-to-right and each parameter may reference the ones declared before it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Complete extension declaration for a single activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDeclaration {
    /// Activity identifier used in diagnostics.
    pub id: String,
    /// Plain input/output parameters.
    #[serde(default)]
    pub input_output: Option<InputOutputDeclaration>,
    /// Form data with explicitly declared fields.
    #[serde(default)]
    pub form: Option<FormDeclaration>,
    /// Form key expression; used when no form data is declared.
    #[serde(default)]
    pub form_key: Option<String>,
    /// Formal data input/output port graph.
    #[serde(default)]
    pub io_specification: Option<IoSpecificationDeclaration>,
    /// Name/value properties resolved per activation.
    #[serde(default)]
    pub properties: Vec<PropertyDeclaration>,
    /// Synthesizes an implicit `<resultVariable> = ${result}` output parameter.
    #[serde(default)]
    pub result_variable: Option<String>,
    /// Connector invocation remapping.
    #[serde(default)]
    pub connector: Option<ConnectorDeclaration>,
    /// Multi-instance loop characteristics.
    #[serde(default)]
    pub loop_characteristics: Option<LoopDeclaration>,
}

impl ActivityDeclaration {
    /// Creates an empty declaration for the given activity id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Ordered input and output parameter declarations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InputOutputDeclaration {
    #[serde(default)]
    pub input_parameters: Vec<ParameterDeclaration>,
    #[serde(default)]
    pub output_parameters: Vec<ParameterDeclaration>,
}

/// A single input or output parameter.
///
/// `value` carries the inline text (a literal, or an expression when it contains `${`). When
/// neither `value` nor `definition` is present the parameter is a name-only passthrough.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDeclaration {
    pub name: String,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub definition: Option<DefinitionDeclaration>,
}

impl ParameterDeclaration {
    /// Parameter with an inline literal or expression value.
    pub fn with_value(name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            definition: None,
        }
    }

    /// Name-only parameter.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parameter with a structured definition.
    pub fn with_definition(name: impl Into<String>, definition: DefinitionDeclaration) -> Self {
        Self {
            name: name.into(),
            value: None,
            definition: Some(definition),
        }
    }
}

/// Kind tag of a structured parameter definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DefinitionKind {
    Script,
    List,
    Map,
    Expression,
    /// Any definition type this engine does not know; it never contributes a value.
    #[serde(other)]
    Unknown,
}

/// Raw structured parameter definition as authored.
///
/// The engine compiles this into a tagged source kind; an absent `type` is treated the same
/// as an unknown one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionDeclaration {
    #[serde(default, rename = "type")]
    pub kind: Option<DefinitionKind>,
    #[serde(default)]
    pub script_format: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<ListItemDeclaration>>,
    #[serde(default)]
    pub entries: Option<Vec<MapEntryDeclaration>>,
}

impl DefinitionDeclaration {
    pub fn script(script_format: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: Some(DefinitionKind::Script),
            script_format: Some(script_format.into()),
            value: Some(source.into()),
            ..Default::default()
        }
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            kind: Some(DefinitionKind::Expression),
            value: Some(expression.into()),
            ..Default::default()
        }
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: Some(DefinitionKind::List),
            items: Some(items.into_iter().map(|value| ListItemDeclaration { value: value.into() }).collect()),
            ..Default::default()
        }
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            kind: Some(DefinitionKind::Map),
            entries: Some(
                entries
                    .into_iter()
                    .map(|(key, value)| MapEntryDeclaration {
                        key: key.into(),
                        value: value.into(),
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListItemDeclaration {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MapEntryDeclaration {
    pub key: String,
    pub value: String,
}

/// Form data with an ordered list of fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormDeclaration {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormFieldDeclaration>,
}

/// A single form field. `label` and `default_value` are expressions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldDeclaration {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default, rename = "type")]
    pub value_type: Option<String>,
}

/// Formal data input/output ports and the associations wiring them to data objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IoSpecificationDeclaration {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data_inputs: Vec<DataPortDeclaration>,
    #[serde(default)]
    pub data_outputs: Vec<DataPortDeclaration>,
    #[serde(default)]
    pub data_input_associations: Vec<DataAssociationDeclaration>,
    #[serde(default)]
    pub data_output_associations: Vec<DataAssociationDeclaration>,
    /// Process-level references; an association target may name one of these instead of a
    /// data object directly.
    #[serde(default)]
    pub data_object_references: Vec<DataObjectReferenceDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DataPortDeclaration {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataAssociationDeclaration {
    #[serde(default)]
    pub id: Option<String>,
    pub source_ref: String,
    pub target_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectReferenceDeclaration {
    pub id: String,
    pub data_object_ref: String,
}

/// Named external-service invocation whose arguments come from its own input parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDeclaration {
    pub connector_id: String,
    #[serde(default)]
    pub input_output: Option<InputOutputDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Multi-instance loop characteristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoopDeclaration {
    #[serde(default)]
    pub is_sequential: bool,
    /// Collection expression, e.g. `${variables.list}`.
    #[serde(default)]
    pub collection: Option<String>,
    /// Extra top-level name bound to the current element.
    #[serde(default)]
    pub element_variable: Option<String>,
    /// Upper bound on the number of iterations.
    #[serde(default)]
    pub cardinality: Option<usize>,
}
