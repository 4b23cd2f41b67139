//! Parameter injection into SQL templates.
//!
//! Templates use `{name}` placeholders. Each parameter value is classified
//! independently:
//!
//! | Value                                      | Rendered as            |
//! |--------------------------------------------|------------------------|
//! | [`Identifier`] / [`QualifiedIdentifier`]   | quoted identifier      |
//! | anything else                              | escaped [`Literal`]    |
//!
//! A bare string is always a literal. Passing `"mytable"` where a relation
//! name was intended yields a valid query that compares against the string
//! `'mytable'`; callers must wrap names explicitly.
//!
//! `{{` and `}}` produce literal braces. Parameters that no placeholder
//! references are ignored.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::identifier::{Identifier, QualifiedIdentifier};
use crate::literal::{Literal, Scalar};

/// A classified parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Identifier(Identifier),
    Qualified(QualifiedIdentifier),
    Literal(Literal),
}

impl ParameterValue {
    pub fn render(&self) -> String {
        match self {
            ParameterValue::Identifier(id) => id.render(),
            ParameterValue::Qualified(id) => id.render(),
            ParameterValue::Literal(lit) => lit.render(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParameterValue::Identifier(_) => "identifier",
            ParameterValue::Qualified(_) => "qualified identifier",
            ParameterValue::Literal(_) => "literal",
        }
    }

    pub fn is_identifier(&self) -> bool {
        !matches!(self, ParameterValue::Literal(_))
    }
}

impl From<Identifier> for ParameterValue {
    fn from(v: Identifier) -> Self {
        ParameterValue::Identifier(v)
    }
}

impl From<&Identifier> for ParameterValue {
    fn from(v: &Identifier) -> Self {
        ParameterValue::Identifier(v.clone())
    }
}

impl From<QualifiedIdentifier> for ParameterValue {
    fn from(v: QualifiedIdentifier) -> Self {
        ParameterValue::Qualified(v)
    }
}

impl From<&QualifiedIdentifier> for ParameterValue {
    fn from(v: &QualifiedIdentifier) -> Self {
        ParameterValue::Qualified(v.clone())
    }
}

impl From<Literal> for ParameterValue {
    fn from(v: Literal) -> Self {
        ParameterValue::Literal(v)
    }
}

macro_rules! parameter_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParameterValue {
                fn from(v: $ty) -> Self {
                    ParameterValue::Literal(Literal::new(v))
                }
            }
        )*
    };
}

parameter_from_scalar!(
    Scalar, bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, &str, String, &String
);

impl<T: Into<Scalar>> From<Option<T>> for ParameterValue {
    fn from(v: Option<T>) -> Self {
        ParameterValue::Literal(Literal::new(v))
    }
}

/// Named template parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, ParameterValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParameterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// A fully composed SQL statement with no remaining placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Composed(String);

impl Composed {
    /// Wrap trusted SQL text as-is. No placeholder processing happens.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Single-line form for logs: whitespace runs collapse to one space.
    pub fn pretty(&self) -> String {
        self.0.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Display for Composed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Composed {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Composed> for String {
    fn from(value: Composed) -> Self {
        value.0
    }
}

/// Substitute every `{name}` placeholder in `template` with the rendered
/// form of the matching parameter.
///
/// # Example
///
/// ```
/// use pgutils_core::{inject_parameters, Params, QualifiedIdentifier};
///
/// let table = QualifiedIdentifier::new("myschema", "mytable").unwrap();
/// let query = inject_parameters(
///     "select * from {t} where x = {v}",
///     &Params::new().with("t", table).with("v", 1),
/// )
/// .unwrap();
///
/// assert_eq!(query.as_str(), r#"select * from "myschema"."mytable" where x = 1"#);
/// ```
pub fn inject_parameters(template: &str, params: &Params) -> CoreResult<Composed> {
    let mut out = String::with_capacity(template.len());
    let mut used: Vec<&str> = Vec::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let start = pos + 1;
                let Some(len) = template[start..].find('}') else {
                    return Err(CoreError::malformed(pos, "unclosed placeholder"));
                };
                let name = &template[start..start + len];
                validate_placeholder(name, pos)?;

                let value = params
                    .get(name)
                    .ok_or_else(|| CoreError::MissingParameter(name.to_string()))?;
                out.push_str(&value.render());
                used.push(name);

                // Skip the placeholder body and its closing brace.
                while let Some((idx, _)) = chars.next() {
                    if idx == start + len {
                        break;
                    }
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                    continue;
                }
                return Err(CoreError::malformed(pos, "single '}' encountered"));
            }
            other => out.push(other),
        }
    }

    if tracing::enabled!(tracing::Level::TRACE) {
        let unused: Vec<&str> = params.names().filter(|n| !used.contains(n)).collect();
        if !unused.is_empty() {
            tracing::trace!(?unused, "parameters not referenced by template");
        }
    }

    Ok(Composed(out))
}

fn validate_placeholder(name: &str, pos: usize) -> CoreResult<()> {
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(CoreError::malformed(
            pos,
            "positional placeholders are not supported",
        ));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(CoreError::malformed(
            pos,
            format!("invalid placeholder name '{name}'"),
        ));
    }
    Ok(())
}
