//! SQL identifiers and schema-qualified relation names.
//!
//! An [`Identifier`] holds one unquoted name segment. Its [`render`] form is
//! always double-quoted with embedded quotes doubled, so it can be spliced
//! into SQL text verbatim. Quoting preserves case and makes reserved words
//! safe without consulting a keyword list.
//!
//! ```
//! use pgutils_core::Identifier;
//!
//! let schema = Identifier::new("tile_index").unwrap();
//! let table = Identifier::new("bag_index_test").unwrap();
//! let qualified = schema + table;
//!
//! assert_eq!(qualified.render(), r#""tile_index"."bag_index_test""#);
//! assert_eq!(qualified.to_string(), "tile_index.bag_index_test");
//! ```
//!
//! [`render`]: Identifier::render

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::inject::ParameterValue;

/// A single SQL name segment (schema, table or column).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier from its unquoted name.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::invalid_identifier(
                name,
                "identifier cannot be empty",
            ));
        }
        if name.contains('\0') {
            return Err(CoreError::invalid_identifier(
                name,
                "identifier cannot contain NUL characters",
            ));
        }
        Ok(Self(name))
    }

    /// Parse a rendered identifier back into its unquoted name.
    ///
    /// Quoted input keeps its case; bare input is folded to lower case the
    /// way the server folds unquoted names.
    pub fn parse(rendered: &str) -> CoreResult<Self> {
        let (ident, rest) = scan_segment(rendered, 0)?;
        if !rest.is_empty() {
            return Err(CoreError::invalid_identifier(
                rendered,
                "unexpected characters after identifier",
            ));
        }
        Ok(ident)
    }

    /// The unquoted name. For logging and display, never for SQL splicing.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The dialect-quoted form, safe to splice into SQL text.
    pub fn render(&self) -> String {
        quote_ident(&self.0)
    }

    /// Qualify `relation` with this identifier as its schema.
    pub fn qualify(&self, relation: &Identifier) -> QualifiedIdentifier {
        QualifiedIdentifier::from_parts(self.clone(), relation.clone())
    }

    /// Qualify with a dynamically typed operand.
    ///
    /// Fails with [`CoreError::TypeMismatch`] unless `other` is a plain
    /// identifier.
    pub fn try_qualify(&self, other: &ParameterValue) -> CoreResult<QualifiedIdentifier> {
        match other {
            ParameterValue::Identifier(relation) => Ok(self.qualify(relation)),
            other => Err(CoreError::TypeMismatch {
                expected: "identifier",
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl Add for Identifier {
    type Output = QualifiedIdentifier;

    fn add(self, relation: Identifier) -> QualifiedIdentifier {
        QualifiedIdentifier::from_parts(self, relation)
    }
}

impl Add<&Identifier> for &Identifier {
    type Output = QualifiedIdentifier;

    fn add(self, relation: &Identifier) -> QualifiedIdentifier {
        self.qualify(relation)
    }
}

/// Conversion accepted wherever a name may be given either raw or already
/// wrapped. Wrapping an [`Identifier`] is idempotent.
pub trait IntoIdentifier {
    fn into_identifier(self) -> CoreResult<Identifier>;
}

impl IntoIdentifier for Identifier {
    fn into_identifier(self) -> CoreResult<Identifier> {
        Ok(self)
    }
}

impl IntoIdentifier for &Identifier {
    fn into_identifier(self) -> CoreResult<Identifier> {
        Ok(self.clone())
    }
}

impl IntoIdentifier for &str {
    fn into_identifier(self) -> CoreResult<Identifier> {
        Identifier::new(self)
    }
}

impl IntoIdentifier for String {
    fn into_identifier(self) -> CoreResult<Identifier> {
        Identifier::new(self)
    }
}

impl IntoIdentifier for &String {
    fn into_identifier(self) -> CoreResult<Identifier> {
        Identifier::new(self.as_str())
    }
}

/// A relation name qualified by its schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedIdentifier {
    schema: Identifier,
    relation: Identifier,
}

impl QualifiedIdentifier {
    /// Create a qualified name from raw or wrapped parts.
    pub fn new(schema: impl IntoIdentifier, relation: impl IntoIdentifier) -> CoreResult<Self> {
        Ok(Self {
            schema: schema.into_identifier()?,
            relation: relation.into_identifier()?,
        })
    }

    /// Create a qualified name from already validated parts.
    pub fn from_parts(schema: Identifier, relation: Identifier) -> Self {
        Self { schema, relation }
    }

    /// Parse the rendered `"schema"."relation"` form (bare segments allowed).
    pub fn parse(rendered: &str) -> CoreResult<Self> {
        let (schema, rest) = scan_segment(rendered, 0)?;
        let Some(rest) = rest.strip_prefix('.') else {
            return Err(CoreError::invalid_identifier(
                rendered,
                "expected a schema-qualified name",
            ));
        };
        let offset = rendered.len() - rest.len();
        let (relation, rest) = scan_segment(rest, offset)?;
        if !rest.is_empty() {
            return Err(CoreError::invalid_identifier(
                rendered,
                "unexpected characters after qualified name",
            ));
        }
        Ok(Self { schema, relation })
    }

    pub fn schema(&self) -> &Identifier {
        &self.schema
    }

    pub fn relation(&self) -> &Identifier {
        &self.relation
    }

    /// The dialect-quoted `"schema"."relation"` form.
    pub fn render(&self) -> String {
        format!("{}.{}", self.schema.render(), self.relation.render())
    }

    pub fn into_parts(self) -> (Identifier, Identifier) {
        (self.schema, self.relation)
    }
}

impl fmt::Display for QualifiedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.relation)
    }
}

/// Quote a Postgres identifier unconditionally, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Scan one quoted or bare segment from the front of `input`.
///
/// `offset` is only used to report positions relative to the full input.
fn scan_segment(input: &str, offset: usize) -> CoreResult<(Identifier, &str)> {
    if let Some(body) = input.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = body.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch != '"' {
                name.push(ch);
                continue;
            }
            if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
                name.push('"');
                continue;
            }
            let rest = &body[idx + 1..];
            return Ok((Identifier::new(name)?, rest));
        }
        return Err(CoreError::invalid_identifier(
            input,
            format!("unterminated quoted identifier at position {offset}"),
        ));
    }

    let end = input.find('.').unwrap_or(input.len());
    let (bare, rest) = input.split_at(end);
    let valid_start = bare
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    if !valid_start || !bare.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return Err(CoreError::invalid_identifier(
            bare,
            format!("not a valid bare identifier at position {offset}"),
        ));
    }
    Ok((Identifier::new(bare.to_lowercase())?, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Identifier {
        Identifier::new(name).unwrap()
    }

    #[test]
    fn test_render_quotes_every_identifier() {
        assert_eq!(ident("users").render(), "\"users\"");
        assert_eq!(ident("Users").render(), "\"Users\"");
        assert_eq!(ident("select").render(), "\"select\"");
        assert_eq!(ident("my table").render(), "\"my table\"");
        assert_eq!(ident("user\"name").render(), "\"user\"\"name\"");
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let err = Identifier::new("").unwrap_err();
        assert!(matches!(err, CoreError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_nul_identifier_rejected() {
        let err = Identifier::new("a\0b").unwrap_err();
        assert!(matches!(err, CoreError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_render_parse_round_trip() {
        for name in [
            "tile_index",
            "MixedCase",
            "order",
            "with space",
            "dot.inside",
            "quote\"inside",
            "\"",
            "ünïcødé",
        ] {
            let id = ident(name);
            let parsed = Identifier::parse(&id.render()).unwrap();
            assert_eq!(parsed.to_string(), name);
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn test_parse_bare_identifier_folds_case() {
        assert_eq!(Identifier::parse("MyTable").unwrap().as_str(), "mytable");
        assert!(Identifier::parse("1table").is_err());
        assert!(Identifier::parse("\"unterminated").is_err());
        assert!(Identifier::parse("\"a\"b").is_err());
    }

    #[test]
    fn test_add_builds_qualified_identifier() {
        let qualified = ident("schema") + ident("table");
        assert_eq!(qualified.render(), "\"schema\".\"table\"");
        assert_eq!(qualified.to_string(), "schema.table");
        assert_eq!(qualified.schema().as_str(), "schema");
        assert_eq!(qualified.relation().as_str(), "table");

        let by_ref = &ident("a") + &ident("b");
        assert_eq!(by_ref.render(), "\"a\".\"b\"");
    }

    #[test]
    fn test_try_qualify_rejects_non_identifier() {
        let schema = ident("schema");
        let err = schema
            .try_qualify(&ParameterValue::Literal(Literal::new("table")))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::TypeMismatch {
                expected: "identifier",
                found: "literal"
            }
        ));

        let qualified = QualifiedIdentifier::new("a", "b").unwrap();
        let err = schema
            .try_qualify(&ParameterValue::Qualified(qualified))
            .unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));

        let ok = schema
            .try_qualify(&ParameterValue::Identifier(ident("table")))
            .unwrap();
        assert_eq!(ok.render(), "\"schema\".\"table\"");
    }

    #[test]
    fn test_qualified_new_accepts_raw_and_wrapped_parts() {
        let schema = ident("myschema");
        let a = QualifiedIdentifier::new(&schema, "mytable").unwrap();
        let b = QualifiedIdentifier::new("myschema".to_string(), ident("mytable")).unwrap();
        assert_eq!(a, b);
        assert!(QualifiedIdentifier::new("", "mytable").is_err());
        assert!(QualifiedIdentifier::new("myschema", "").is_err());
    }

    #[test]
    fn test_qualified_parse_round_trip() {
        let q = QualifiedIdentifier::new("My.Schema", "Ta\"ble").unwrap();
        assert_eq!(QualifiedIdentifier::parse(&q.render()).unwrap(), q);

        let bare = QualifiedIdentifier::parse("public.Users").unwrap();
        assert_eq!(bare.render(), "\"public\".\"users\"");

        assert!(QualifiedIdentifier::parse("\"only_one\"").is_err());
        assert!(QualifiedIdentifier::parse("a.b.c").is_err());
    }

    #[test]
    fn test_identifier_serde() {
        let id: Identifier = serde_json::from_str("\"tile_index\"").unwrap();
        assert_eq!(id.as_str(), "tile_index");
        assert!(serde_json::from_str::<Identifier>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"tile_index\"");
    }
}
