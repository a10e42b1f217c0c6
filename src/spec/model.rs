//! Typed Swagger 2.0 document model.
//!
//! Only the parts the analyser reads are modelled; every other key (including
//! all `x-` vendor extensions) is kept in the flattened [`Extensions`] map.

use crate::utils::split_csv;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unrecognised keys of a document node, vendor extensions included
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extensions(pub IndexMap<String, Value>);

impl Extensions {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Reads a boolean extension; `"true"` strings are accepted as well
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Reads a comma separated extension; `None` when the key is absent
    #[must_use]
    pub fn get_csv(&self, key: &str) -> Option<Vec<String>> {
        match self.0.get(key)? {
            Value::String(s) => Some(split_csv(s)),
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .flat_map(split_csv)
                    .collect(),
            ),
            _ => Some(Vec::new()),
        }
    }

    /// Overlays `other` on top of `self`; keys present in both take `other`'s value
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerDocument {
    #[serde(default)]
    pub swagger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
    #[serde(default)]
    pub definitions: IndexMap<String, Schema>,
    #[serde(default)]
    pub security_definitions: IndexMap<String, SecurityDefinitionObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<IndexMap<String, Vec<String>>>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub responses: IndexMap<String, Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<IndexMap<String, Vec<String>>>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Operation {
    /// The schema of the `in: body` parameter, if any
    #[must_use]
    pub fn body_schema(&self) -> Option<&Schema> {
        self.parameters
            .iter()
            .find(|p| p.location == crate::constants::PARAM_IN_BODY)
            .and_then(|p| p.schema.as_ref())
    }

    #[must_use]
    pub fn response(&self, status: u16) -> Option<&Response> {
        self.responses.get(status.to_string().as_str())
    }

    /// First successful (200, 201, 202) response carrying a schema
    #[must_use]
    pub fn success_response_schema(&self) -> Option<&Schema> {
        [201u16, 200, 202]
            .iter()
            .filter_map(|code| self.response(*code))
            .find_map(|r| r.schema.as_ref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "in", default)]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// A (possibly nested) JSON schema fragment after `$ref` expansion.
///
/// `reference` is only still set for cyclic references the expander left in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "required_list"
    )]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Schema {
    #[must_use]
    pub fn is_type(&self, ty: &str) -> bool {
        self.schema_type.as_deref() == Some(ty)
    }

    /// Object schemas: explicit `type: object` or an untyped schema with properties
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.is_type(crate::constants::TYPE_OBJECT)
            || (self.schema_type.is_none() && !self.properties.is_empty())
    }

    #[must_use]
    pub fn has_properties(&self) -> bool {
        !self.properties.is_empty()
    }

    /// Canonical JSON form used for structural equality
    #[must_use]
    pub fn canonical(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Accepts the `required: [..]` list; a stray boolean (seen on property level in
/// hand-written documents) is read as "no required children"
fn required_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RequiredField {
        List(Vec<String>),
        Flag(bool),
    }

    Ok(match RequiredField::deserialize(deserializer)? {
        RequiredField::List(names) => names,
        RequiredField::Flag(_) => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityDefinitionObject {
    #[serde(rename = "type", default)]
    pub scheme_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extensions: Extensions,
}
