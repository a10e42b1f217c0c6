//! Compiles `OpenAPI` schema fragments into the typed property model resources
//! are built from.

use crate::constants;
use crate::error::Error;
use crate::spec::model::Schema;
use crate::utils::to_snake_case;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Bool,
    List,
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaProperty {
    /// Name on the wire
    pub name: String,
    pub preferred_name: Option<String>,
    pub property_type: PropertyType,
    pub item_type: Option<PropertyType>,
    /// Properties of an object, or of the items of a list of objects
    pub nested: Option<Box<SchemaDefinition>>,
    pub required: bool,
    pub read_only: bool,
    /// Set through `x-terraform-computed`
    pub computed: bool,
    pub force_new: bool,
    pub immutable: bool,
    pub sensitive: bool,
    pub is_identifier: bool,
    pub is_status_field: bool,
    pub ignore_item_order: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl SchemaProperty {
    /// Name exposed to the host, normalised to snake case
    #[must_use]
    pub fn terraform_name(&self) -> String {
        to_snake_case(self.preferred_name.as_deref().unwrap_or(&self.name))
    }

    /// Settable by users while its final value may come from the API
    #[must_use]
    pub const fn is_optional_computed(&self) -> bool {
        !self.required && !self.read_only && (self.computed || self.default.is_some())
    }

    /// Value produced by the API (read-only or optional-computed)
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        self.read_only || self.is_optional_computed()
    }

    /// Value users may send in create and update requests
    #[must_use]
    pub const fn is_input(&self) -> bool {
        !self.read_only
    }
}

/// Ordered property list of an object schema; order follows the document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDefinition {
    pub properties: Vec<SchemaProperty>,
}

impl SchemaDefinition {
    /// Looks a property up by wire name or host name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties
            .iter()
            .find(|p| p.name == name || p.terraform_name() == name)
    }

    /// The `x-terraform-id` property, or else the one named `id`
    #[must_use]
    pub fn identifier(&self) -> Option<&SchemaProperty> {
        self.properties
            .iter()
            .find(|p| p.is_identifier)
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|p| p.terraform_name() == constants::PROPERTY_ID)
            })
    }

    /// Checks the identifier rules of a resource schema.
    ///
    /// # Errors
    ///
    /// Returns `ResourceCompilation` when more than one property carries the
    /// identifier extension or no identifier can be found.
    pub fn validate_identifier(&self) -> Result<&SchemaProperty, Error> {
        let tagged = self.properties.iter().filter(|p| p.is_identifier).count();
        if tagged > 1 {
            return Err(Error::resource_compilation(
                "",
                format!("{tagged} properties are marked with {}", constants::EXT_ID),
            ));
        }
        self.identifier().ok_or_else(|| {
            Error::resource_compilation(
                "",
                format!(
                    "schema has no '{}' property and none is marked with {}",
                    constants::PROPERTY_ID,
                    constants::EXT_ID
                ),
            )
        })
    }

    /// Wire-name path to the status field: the property tagged with
    /// `x-terraform-field-status` (searched through nested objects), or else the
    /// top-level property named `status`
    #[must_use]
    pub fn status_field_path(&self) -> Option<Vec<String>> {
        self.tagged_status_path().or_else(|| {
            self.properties
                .iter()
                .find(|p| p.terraform_name() == constants::PROPERTY_STATUS)
                .map(|p| vec![p.name.clone()])
        })
    }

    fn tagged_status_path(&self) -> Option<Vec<String>> {
        if let Some(p) = self.properties.iter().find(|p| p.is_status_field) {
            return Some(vec![p.name.clone()]);
        }
        self.properties
            .iter()
            .filter(|p| p.property_type == PropertyType::Object)
            .find_map(|p| {
                let nested = p.nested.as_ref()?.tagged_status_path()?;
                let mut path = vec![p.name.clone()];
                path.extend(nested);
                Some(path)
            })
    }

    /// Properties users may send
    pub fn input_properties(&self) -> impl Iterator<Item = &SchemaProperty> {
        self.properties.iter().filter(|p| p.is_input())
    }
}

/// Translates schema fragments, resolving leftover `$ref`s against the
/// document's definitions
pub struct SchemaCompiler<'a> {
    definitions: &'a IndexMap<String, Schema>,
}

impl<'a> SchemaCompiler<'a> {
    #[must_use]
    pub const fn new(definitions: &'a IndexMap<String, Schema>) -> Self {
        Self { definitions }
    }

    /// Compiles every property of an object schema.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProperty` naming the first property that violates a rule.
    pub fn compile_definition(&self, schema: &Schema) -> Result<SchemaDefinition, Error> {
        self.check_reference("", schema)?;

        let properties = schema
            .properties
            .iter()
            .map(|(name, property)| self.compile_property(name, property, &schema.required))
            .collect::<Result<Vec<_>, _>>()?;

        let identifiers: Vec<&str> = properties
            .iter()
            .filter(|p| p.is_identifier)
            .map(|p| p.name.as_str())
            .collect();
        if identifiers.len() > 1 {
            return Err(Error::invalid_property(
                identifiers.join(", "),
                format!("only one property may be marked with {}", constants::EXT_ID),
            ));
        }

        Ok(SchemaDefinition { properties })
    }

    /// Compiles a single property.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProperty` for unsupported types, lists of lists,
    /// unresolvable references and conflicting flags.
    pub fn compile_property(
        &self,
        name: &str,
        schema: &Schema,
        required: &[String],
    ) -> Result<SchemaProperty, Error> {
        self.check_reference(name, schema)?;
        let ext = &schema.extensions;

        let property_type = property_type(name, schema)?;
        let (item_type, nested) = match property_type {
            PropertyType::List => {
                let items = schema.items.as_deref().ok_or_else(|| {
                    Error::invalid_property(name, "array property does not declare 'items'")
                })?;
                self.check_reference(name, items)?;
                let item_type = self::property_type(name, items)?;
                match item_type {
                    PropertyType::List => {
                        return Err(Error::invalid_property(
                            name,
                            "lists of lists are not supported",
                        ))
                    }
                    PropertyType::Object => {
                        let nested = self.compile_definition(items).map_err(|e| nest(name, e))?;
                        (Some(item_type), Some(Box::new(nested)))
                    }
                    _ => (Some(item_type), None),
                }
            }
            PropertyType::Object => {
                let nested = self.compile_definition(schema).map_err(|e| nest(name, e))?;
                (None, Some(Box::new(nested)))
            }
            _ => (None, None),
        };

        let mut property = SchemaProperty {
            name: name.to_string(),
            preferred_name: ext.get_str(constants::EXT_FIELD_NAME).map(str::to_string),
            property_type,
            item_type,
            nested,
            required: required.iter().any(|r| r == name),
            read_only: schema.read_only,
            computed: ext.get_bool(constants::EXT_COMPUTED),
            force_new: ext.get_bool(constants::EXT_FORCE_NEW),
            immutable: ext.get_bool(constants::EXT_IMMUTABLE),
            sensitive: ext.get_bool(constants::EXT_SENSITIVE),
            is_identifier: ext.get_bool(constants::EXT_ID),
            is_status_field: ext.get_bool(constants::EXT_FIELD_STATUS),
            ignore_item_order: ext.get_bool(constants::EXT_IGNORE_ORDER),
            default: schema.default.clone().filter(|v| !v.is_null()),
            description: schema.description.clone(),
        };

        validate(&mut property)?;
        Ok(property)
    }

    fn check_reference(&self, name: &str, schema: &Schema) -> Result<(), Error> {
        let Some(reference) = &schema.reference else {
            return Ok(());
        };
        let known = reference
            .strip_prefix(constants::DEFINITIONS_PREFIX)
            .is_some_and(|key| self.definitions.contains_key(key));
        if known {
            Err(Error::invalid_property(
                name,
                format!("cyclic schema reference {reference} is not supported"),
            ))
        } else {
            Err(Error::invalid_property(
                name,
                format!("missing schema for ref {reference}"),
            ))
        }
    }
}

fn property_type(name: &str, schema: &Schema) -> Result<PropertyType, Error> {
    match schema.schema_type.as_deref() {
        Some(constants::TYPE_STRING) => Ok(PropertyType::String),
        Some(constants::TYPE_INTEGER) => Ok(PropertyType::Integer),
        Some(constants::TYPE_NUMBER) => Ok(PropertyType::Number),
        Some(constants::TYPE_BOOLEAN) => Ok(PropertyType::Bool),
        Some(constants::TYPE_ARRAY) => Ok(PropertyType::List),
        Some(constants::TYPE_OBJECT) => Ok(PropertyType::Object),
        None if schema.has_properties() => Ok(PropertyType::Object),
        None => Ok(PropertyType::String),
        Some(other) => Err(Error::invalid_property(
            name,
            format!("type '{other}' is not supported"),
        )),
    }
}

fn nest(parent: &str, err: Error) -> Error {
    match err {
        Error::InvalidProperty { property, reason } if property.is_empty() => {
            Error::invalid_property(parent, reason)
        }
        Error::InvalidProperty { property, reason } => {
            Error::invalid_property(format!("{parent}.{property}"), reason)
        }
        other => other,
    }
}

fn validate(property: &mut SchemaProperty) -> Result<(), Error> {
    let name = property.name.as_str();

    if property.required && property.read_only {
        return Err(Error::invalid_property(
            name,
            "a property cannot be both required and readOnly",
        ));
    }
    if property.computed && property.read_only {
        return Err(Error::invalid_property(
            name,
            format!("{} cannot be combined with readOnly", constants::EXT_COMPUTED),
        ));
    }
    if property.computed && property.default.is_some() {
        return Err(Error::invalid_property(
            name,
            format!("{} cannot be combined with a default value", constants::EXT_COMPUTED),
        ));
    }
    if property.is_status_field && !property.read_only {
        return Err(Error::invalid_property(
            name,
            format!("{} must be readOnly", constants::EXT_FIELD_STATUS),
        ));
    }
    if property.read_only && property.default.is_some() {
        warn!("property '{name}' is readOnly; its default value is ignored");
        property.default = None;
    }
    if property.ignore_item_order && property.property_type != PropertyType::List {
        warn!(
            "property '{name}' is not a list; {} has no effect",
            constants::EXT_IGNORE_ORDER
        );
        property.ignore_item_order = false;
    }
    Ok(())
}
