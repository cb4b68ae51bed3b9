//! "Literal or expression" wrapper, for YAML fields that accept either a
//! typed literal value or a bare `${{ ... }}` expression string.

use serde::{Deserialize, Deserializer};

/// Wraps a field that may be a literal `T` or a template expression string.
///
/// Many workflow-level fields (`timeout-minutes`, `max-parallel`, `runs-on`
/// labels, …) nominally hold a typed value but GitHub Actions also accepts a
/// bare `${{ ... }}` expression wherever such a field appears; in that case
/// the value can only be checked once the expression's type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum LoE<T> {
    Literal(T),
    Expr(String),
}

impl<T> LoE<T> {
    pub fn as_literal(&self) -> Option<&T> {
        match self {
            LoE::Literal(v) => Some(v),
            LoE::Expr(_) => None,
        }
    }

    pub fn as_expr(&self) -> Option<&str> {
        match self {
            LoE::Literal(_) => None,
            LoE::Expr(s) => Some(s),
        }
    }

    pub fn is_expr(&self) -> bool {
        matches!(self, LoE::Expr(_))
    }
}

/// A scalar is reinterpreted as an expression when it contains `${{`; a
/// scalar without one is still attempted as a literal `T` first so that,
/// e.g., `run-name: "hi"` and `run-name: "${{ github.actor }}"` both parse.
impl<'de, T> Deserialize<'de> for LoE<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Literal(T),
            Raw(String),
        }

        match Repr::<T>::deserialize(de)? {
            Repr::Literal(v) => Ok(LoE::Literal(v)),
            Repr::Raw(s) => Ok(LoE::Expr(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loe_literal() {
        let v: LoE<i64> = serde_yaml::from_str("5").unwrap();
        assert_eq!(v.as_literal(), Some(&5));
    }

    #[test]
    fn test_loe_expression() {
        let v: LoE<i64> = serde_yaml::from_str("\"${{ matrix.timeout }}\"").unwrap();
        assert!(v.is_expr());
        assert_eq!(v.as_expr(), Some("${{ matrix.timeout }}"));
    }
}
