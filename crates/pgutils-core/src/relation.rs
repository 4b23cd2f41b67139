//! Relation maps: configuration trees whose leaves are SQL identifiers.
//!
//! A relation map is built once from a nested mapping, typically the
//! `relations` section of a YAML config, and is read-only afterwards.
//!
//! ```yaml
//! schema: tile_index
//! table: bag_index_test
//! fields:
//!   geometry: geom
//!   primary_key: id
//!   type: bladnr
//! ```
//!
//! Mapping keys that are Rust keywords are stored with a trailing `_`
//! (`type` becomes `type_`). Lookups accept either spelling.

use std::ops::Add;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::identifier::{Identifier, QualifiedIdentifier};
use crate::inject::ParameterValue;
use crate::literal::Literal;

/// Strict and reserved Rust keywords.
const RESERVED_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Escape a field name that collides with a reserved keyword.
pub fn escape_field_name(name: &str) -> String {
    if RESERVED_KEYWORDS.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// A node of a relation map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_yaml::Value")]
pub enum RelationMap {
    /// A relation name.
    Leaf(Identifier),
    /// Named children, in declaration order.
    Node(IndexMap<String, RelationMap>),
    /// An ordered sequence of children.
    List(Vec<RelationMap>),
}

impl RelationMap {
    /// Build a relation map from a YAML value.
    pub fn from_yaml(value: &serde_yaml::Value) -> CoreResult<Self> {
        use serde_yaml::Value;

        match value {
            Value::String(s) => Ok(RelationMap::Leaf(Identifier::new(s.as_str())?)),
            Value::Mapping(mapping) => {
                let mut fields = IndexMap::with_capacity(mapping.len());
                for (key, child) in mapping {
                    let key = match key {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(CoreError::TypeMismatch {
                                expected: "string key",
                                found: yaml_kind(other),
                            });
                        }
                    };
                    insert_field(&mut fields, &key, Self::from_yaml(child)?);
                }
                Ok(RelationMap::Node(fields))
            }
            Value::Sequence(items) => items
                .iter()
                .map(Self::from_yaml)
                .collect::<CoreResult<Vec<_>>>()
                .map(RelationMap::List),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            other => Err(CoreError::TypeMismatch {
                expected: "string, mapping or sequence",
                found: yaml_kind(other),
            }),
        }
    }

    /// Build a relation map from a JSON value.
    pub fn from_json(value: &serde_json::Value) -> CoreResult<Self> {
        use serde_json::Value;

        match value {
            Value::String(s) => Ok(RelationMap::Leaf(Identifier::new(s.as_str())?)),
            Value::Object(object) => {
                let mut fields = IndexMap::with_capacity(object.len());
                for (key, child) in object {
                    insert_field(&mut fields, key, Self::from_json(child)?);
                }
                Ok(RelationMap::Node(fields))
            }
            Value::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<CoreResult<Vec<_>>>()
                .map(RelationMap::List),
            Value::Null => Err(mismatch("string, mapping or sequence", "null")),
            Value::Bool(_) => Err(mismatch("string, mapping or sequence", "boolean")),
            Value::Number(_) => Err(mismatch("string, mapping or sequence", "number")),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RelationMap::Leaf(_) => "identifier",
            RelationMap::Node(_) => "mapping",
            RelationMap::List(_) => "sequence",
        }
    }

    /// Look up a direct child by field name.
    pub fn field(&self, name: &str) -> CoreResult<&RelationMap> {
        let RelationMap::Node(fields) = self else {
            return Err(mismatch("mapping", self.kind()));
        };
        fields
            .get(name)
            .or_else(|| fields.get(&escape_field_name(name)))
            .ok_or_else(|| CoreError::unknown_field(name))
    }

    /// Look up an element of a sequence node.
    pub fn at(&self, index: usize) -> CoreResult<&RelationMap> {
        let RelationMap::List(items) = self else {
            return Err(mismatch("sequence", self.kind()));
        };
        items
            .get(index)
            .ok_or_else(|| CoreError::unknown_field(index.to_string()))
    }

    /// Follow a dotted path such as `fields.geometry` or `tables.0.name`.
    /// Numeric segments index into sequences.
    pub fn path(&self, path: &str) -> CoreResult<&RelationMap> {
        path.split('.').try_fold(self, |node, segment| match node {
            RelationMap::List(_) => {
                let index = segment
                    .parse::<usize>()
                    .map_err(|_| CoreError::unknown_field(segment))?;
                node.at(index)
            }
            _ => node.field(segment),
        })
    }

    /// The identifier held by a leaf.
    pub fn identifier(&self) -> CoreResult<&Identifier> {
        match self {
            RelationMap::Leaf(id) => Ok(id),
            other => Err(mismatch("identifier", other.kind())),
        }
    }

    /// The leaf's name as a literal, for value positions such as catalog
    /// lookups by name.
    pub fn literal(&self) -> CoreResult<Literal> {
        self.identifier().map(|id| Literal::new(id.as_str()))
    }

    /// Combine two leaves into `schema.relation`.
    pub fn qualify(&self, relation: &RelationMap) -> CoreResult<QualifiedIdentifier> {
        Ok(self.identifier()?.qualify(relation.identifier()?))
    }

    /// Field names of a mapping node, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let fields = match self {
            RelationMap::Node(fields) => Some(fields.keys().map(String::as_str)),
            _ => None,
        };
        fields.into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        match self {
            RelationMap::Leaf(_) => 1,
            RelationMap::Node(fields) => fields.len(),
            RelationMap::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<serde_yaml::Value> for RelationMap {
    type Error = CoreError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        Self::from_yaml(&value)
    }
}

impl TryFrom<&RelationMap> for ParameterValue {
    type Error = CoreError;

    fn try_from(value: &RelationMap) -> Result<Self, Self::Error> {
        value.identifier().map(ParameterValue::from)
    }
}

impl Add<&RelationMap> for &RelationMap {
    type Output = CoreResult<QualifiedIdentifier>;

    fn add(self, relation: &RelationMap) -> Self::Output {
        self.qualify(relation)
    }
}

fn insert_field(fields: &mut IndexMap<String, RelationMap>, key: &str, value: RelationMap) {
    let escaped = escape_field_name(key);
    if fields.insert(escaped.clone(), value).is_some() {
        tracing::warn!(field = %escaped, "duplicate relation map field, later value wins");
    }
}

fn mismatch(expected: &'static str, found: &'static str) -> CoreError {
    CoreError::TypeMismatch { expected, found }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
