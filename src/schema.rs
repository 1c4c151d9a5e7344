// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structural subset of JSON Schema.
//!
//! A [`Schema`] describes both the data a template may reference and the type
//! a template is inferred to produce. Only the keywords needed to walk paths
//! and compare scalar types are modelled:
//!
//! - `type` (a single tag or an array of tags)
//! - `properties`, `required`
//! - `items`
//! - `enum`, `const`
//! - `anyOf`, `oneOf`, `allOf`
//! - `description`
//!
//! Every other keyword (`format`, `pattern`, `minimum`, ...) is accepted and
//! ignored; no value is ever validated against a schema here.
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": {
//!     "user": {
//!       "anyOf": [
//!         { "properties": { "name": { "type": "string" } } },
//!         { "properties": { "id": { "type": "integer" } } }
//!       ]
//!     },
//!     "tags": { "type": "array", "items": { "type": "string" } }
//!   }
//! }
//! ```
//!
//! Paths resolve through combinators: `user.id` finds `id` in the second
//! `anyOf` branch.

use crate::error::TemplateError;
use crate::literal::LiteralCategory;
use crate::value::Value;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Schemas for the side data sources selected by a trailing `:N` on a path.
pub type IdentifierSchemas = BTreeMap<u64, Schema>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Array,
    Object,
}

impl SchemaType {
    pub fn of_value(value: &Value) -> Option<SchemaType> {
        Some(match value {
            Value::Null => SchemaType::Null,
            Value::Bool(_) => SchemaType::Boolean,
            Value::Number(n) if n.is_integer() => SchemaType::Integer,
            Value::Number(_) => SchemaType::Number,
            Value::String(_) => SchemaType::String,
            Value::Array(_) => SchemaType::Array,
            Value::Object(_) => SchemaType::Object,
            Value::Undefined => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        }
    }
}

/// The `type` keyword: `"string"` or `["string", "null"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeTag {
    Single(SchemaType),
    Many(Vec<SchemaType>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<TypeTag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,
}

impl Schema {
    /// Schema with no constraints at all.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn of_type(t: SchemaType) -> Self {
        Self {
            type_tag: Some(TypeTag::Single(t)),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of_type(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::of_type(SchemaType::Number)
    }

    pub fn integer() -> Self {
        Self::of_type(SchemaType::Integer)
    }

    pub fn boolean() -> Self {
        Self::of_type(SchemaType::Boolean)
    }

    pub fn null() -> Self {
        Self::of_type(SchemaType::Null)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            type_tag: Some(TypeTag::Single(SchemaType::Array)),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// Object schema in which every listed property is required.
    pub fn object(properties: BTreeMap<String, Schema>) -> Self {
        let required = properties.keys().cloned().collect();
        Self {
            type_tag: Some(TypeTag::Single(SchemaType::Object)),
            properties,
            required,
            ..Self::default()
        }
    }

    /// Schema of a literal value.
    pub fn of_value(value: &Value) -> Self {
        match SchemaType::of_value(value) {
            Some(t) => Self::of_type(t),
            None => Self::any(),
        }
    }

    pub fn from_serde_json_value(schema: serde_json::Value) -> Result<Self, TemplateError> {
        serde_json::from_value(schema).map_err(|e| TemplateError::Schema(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self, TemplateError> {
        serde_json::from_str(s).map_err(|e| TemplateError::Schema(e.to_string()))
    }

    fn declared_types(&self) -> Option<BTreeSet<SchemaType>> {
        match &self.type_tag {
            Some(TypeTag::Single(t)) => Some([*t].into_iter().collect()),
            Some(TypeTag::Many(ts)) => Some(ts.iter().copied().collect()),
            None => {
                let values: Vec<&Value> = match (&self.const_value, &self.enum_values) {
                    (Some(c), _) => vec![c],
                    (None, Some(vs)) if !vs.is_empty() => vs.iter().collect(),
                    _ => return None,
                };
                values.into_iter().map(SchemaType::of_value).collect()
            }
        }
    }

    /// Set of JSON types this schema admits, or `None` when unconstrained.
    /// `anyOf`/`oneOf` contribute the union of their branches.
    pub fn type_set(&self) -> Option<BTreeSet<SchemaType>> {
        if let Some(types) = self.declared_types() {
            return Some(types);
        }
        let branches = if !self.any_of.is_empty() {
            &self.any_of
        } else {
            &self.one_of
        };
        if branches.is_empty() {
            return self
                .all_of
                .iter()
                .find_map(|s| s.type_set());
        }
        let mut all = BTreeSet::new();
        for branch in branches {
            all.extend(branch.type_set()?);
        }
        Some(all)
    }

    pub fn has_type(&self, t: SchemaType) -> bool {
        matches!(self.type_set(), Some(types) if types.contains(&t))
    }

    /// True when this schema is exactly `{"type": "string"}` in effect.
    pub fn is_string(&self) -> bool {
        matches!(self.type_set(), Some(types) if types.len() == 1 && types.contains(&SchemaType::String))
    }

    pub fn is_array_typed(&self) -> bool {
        if self.has_type(SchemaType::Array) {
            return true;
        }
        if self.type_tag.is_none() && self.items.is_some() {
            return true;
        }
        let branches = if !self.any_of.is_empty() {
            &self.any_of
        } else {
            &self.one_of
        };
        if !branches.is_empty() && branches.iter().all(Schema::is_array_typed) {
            return true;
        }
        self.all_of.iter().any(Schema::is_array_typed)
    }

    /// Element schema of an array schema, looking through combinators.
    pub fn array_items(&self) -> Option<&Schema> {
        if let Some(items) = &self.items {
            return Some(items);
        }
        self.branches().find_map(|b| b.array_items())
    }

    fn branches(&self) -> impl Iterator<Item = &Schema> {
        self.any_of
            .iter()
            .chain(self.one_of.iter())
            .chain(self.all_of.iter())
    }

    /// Look up a property, falling back to combinator branches (first match wins).
    pub fn property(&self, name: &str) -> Option<&Schema> {
        if let Some(s) = self.properties.get(name) {
            return Some(s);
        }
        self.branches().find_map(|b| b.property(name))
    }

    /// All property names reachable from this schema, sorted.
    pub fn property_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        self.collect_property_names(&mut names);
        names.into_iter().collect()
    }

    fn collect_property_names(&self, names: &mut BTreeSet<String>) {
        names.extend(self.properties.keys().cloned());
        for b in self.branches() {
            b.collect_property_names(names);
        }
    }

    /// Whether a value described by `actual` may be passed where `self` is
    /// expected. Unconstrained schemas on either side are always compatible,
    /// and an integer is acceptable where a number is expected.
    pub fn accepts(&self, actual: &Schema) -> bool {
        let (Some(expected), Some(actual)) = (self.type_set(), actual.type_set()) else {
            return true;
        };
        actual.iter().all(|t| {
            expected.contains(t)
                || (*t == SchemaType::Integer && expected.contains(&SchemaType::Number))
        })
    }

    /// Scalar category of a schema that can only produce one kind of literal.
    pub fn literal_category(&self) -> Option<LiteralCategory> {
        let types = self.type_set()?;
        let numeric = types
            .iter()
            .all(|t| matches!(t, SchemaType::Number | SchemaType::Integer));
        match types.iter().next() {
            Some(_) if numeric => Some(LiteralCategory::Number),
            Some(SchemaType::Boolean) if types.len() == 1 => Some(LiteralCategory::Boolean),
            Some(SchemaType::Null) if types.len() == 1 => Some(LiteralCategory::Null),
            _ => None,
        }
    }

    /// Short description of the admitted types, for messages.
    pub fn describe(&self) -> String {
        match self.type_set() {
            Some(types) if !types.is_empty() => types
                .iter()
                .map(SchemaType::name)
                .collect::<Vec<_>>()
                .join(" | "),
            _ => "any".to_string(),
        }
    }
}
