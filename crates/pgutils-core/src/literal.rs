//! SQL literals for value positions.

use std::fmt;

use crate::error::CoreError;

/// A scalar value that can be embedded as a SQL literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "text",
        }
    }
}

/// A value marked for embedding as an escaped SQL literal.
///
/// A literal is never interpreted as identifier text, even when it holds a
/// string that looks like a relation name.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal(Scalar);

impl Literal {
    pub fn new(value: impl Into<Scalar>) -> Self {
        Self(value.into())
    }

    pub fn null() -> Self {
        Self(Scalar::Null)
    }

    pub fn value(&self) -> &Scalar {
        &self.0
    }

    /// The escaped literal form, safe to splice into a value position.
    pub fn render(&self) -> String {
        match &self.0 {
            Scalar::Null => "NULL".to_string(),
            Scalar::Bool(true) => "true".to_string(),
            Scalar::Bool(false) => "false".to_string(),
            // A leading space keeps `1-{v}` from becoming a `--` comment.
            Scalar::Int(v) if *v < 0 => format!(" {v}"),
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) if v.is_nan() => "'NaN'::float8".to_string(),
            Scalar::Float(v) if v.is_infinite() && *v > 0.0 => "'Infinity'::float8".to_string(),
            Scalar::Float(v) if v.is_infinite() => "'-Infinity'::float8".to_string(),
            Scalar::Float(v) if v.is_sign_negative() => format!(" {v:?}"),
            Scalar::Float(v) => format!("{v:?}"),
            Scalar::Text(s) => quote_literal(s),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Quote a string literal the way libpq's `PQescapeLiteral` does.
///
/// Backslashes switch to the `E'...'` escape-string form so the result is
/// independent of `standard_conforming_strings`.
pub(crate) fn quote_literal(value: &str) -> String {
    let has_backslash = value.contains('\\');
    let mut out = String::with_capacity(value.len() + 3);
    if has_backslash {
        out.push('E');
    }
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

macro_rules! scalar_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::Int(i64::from(v))
                }
            }
        )*
    };
}

scalar_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Float(f64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<&String> for Scalar {
    fn from(v: &String) -> Self {
        Scalar::Text(v.clone())
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}

impl TryFrom<serde_json::Value> for Scalar {
    type Error = CoreError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Scalar::Null),
            Value::Bool(b) => Ok(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Scalar::Int(i)),
                None => n.as_f64().map(Scalar::Float).ok_or(CoreError::TypeMismatch {
                    expected: "scalar",
                    found: "number",
                }),
            },
            Value::String(s) => Ok(Scalar::Text(s)),
            Value::Array(_) => Err(CoreError::TypeMismatch {
                expected: "scalar",
                found: "array",
            }),
            Value::Object(_) => Err(CoreError::TypeMismatch {
                expected: "scalar",
                found: "object",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_scalars() {
        assert_eq!(Literal::null().render(), "NULL");
        assert_eq!(Literal::new(true).render(), "true");
        assert_eq!(Literal::new(false).render(), "false");
        assert_eq!(Literal::new(1).render(), "1");
        assert_eq!(Literal::new(-5i64).render(), " -5");
        assert_eq!(Literal::new(1.5).render(), "1.5");
        assert_eq!(Literal::new(2.0).render(), "2.0");
        assert_eq!(Literal::new(-0.25).render(), " -0.25");
        assert_eq!(Literal::new(f64::NAN).render(), "'NaN'::float8");
        assert_eq!(Literal::new(f64::INFINITY).render(), "'Infinity'::float8");
        assert_eq!(
            Literal::new(f64::NEG_INFINITY).render(),
            "'-Infinity'::float8"
        );
        assert_eq!(Literal::new(None::<i32>).render(), "NULL");
        assert_eq!(Literal::new(Some("x")).render(), "'x'");
    }

    #[test]
    fn test_render_text_escapes_quotes() {
        assert_eq!(Literal::new("hello").render(), "'hello'");
        assert_eq!(Literal::new("O'Reilly").render(), "'O''Reilly'");
        assert_eq!(Literal::new("'; DROP TABLE x; --").render(), "'''; DROP TABLE x; --'");
        assert_eq!(Literal::new("").render(), "''");
    }

    #[test]
    fn test_render_text_with_backslash_uses_escape_form() {
        assert_eq!(Literal::new(r"C:\path").render(), r"E'C:\\path'");
        assert_eq!(Literal::new(r"\'").render(), r"E'\\'''");
    }

    #[test]
    fn test_negative_literal_cannot_start_comment() {
        let sql = format!("SELECT 1-{}", Literal::new(-1).render());
        assert!(!sql.contains("--"));
    }

    #[test]
    fn test_scalar_from_json() {
        use serde_json::json;

        assert_eq!(Scalar::try_from(json!(null)).unwrap(), Scalar::Null);
        assert_eq!(Scalar::try_from(json!(3)).unwrap(), Scalar::Int(3));
        assert_eq!(Scalar::try_from(json!(0.5)).unwrap(), Scalar::Float(0.5));
        assert_eq!(
            Scalar::try_from(json!("geom")).unwrap(),
            Scalar::Text("geom".to_string())
        );
        assert!(matches!(
            Scalar::try_from(json!([1, 2])),
            Err(CoreError::TypeMismatch { found: "array", .. })
        ));
    }
}
