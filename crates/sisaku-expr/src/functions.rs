//! Built-in function signature table (spec §4.5).

use crate::types::{ObjectType, Type};

/// A single overload of a built-in function.
///
/// `required` lists the types of the fixed leading parameters. `variadic`,
/// when present, is the type every trailing argument must be assignable to;
/// an overload with `variadic = None` accepts exactly `required.len()` args.
pub struct Signature {
    pub required: Vec<Type>,
    pub variadic: Option<Type>,
    pub ret: Type,
}

impl Signature {
    fn fixed(required: Vec<Type>, ret: Type) -> Self {
        Self { required, variadic: None, ret }
    }

    fn variadic(required: Vec<Type>, tail: Type, ret: Type) -> Self {
        Self { required, variadic: Some(tail), ret }
    }

    /// Checks whether `args` matches this overload's arity and types.
    fn matches(&self, args: &[Type]) -> bool {
        match &self.variadic {
            None => {
                args.len() == self.required.len()
                    && args
                        .iter()
                        .zip(&self.required)
                        .all(|(a, p)| p.assignable(a))
            }
            Some(tail) => {
                if args.len() < self.required.len() {
                    return false;
                }
                let (head, rest) = args.split_at(self.required.len());
                head.iter().zip(&self.required).all(|(a, p)| p.assignable(a))
                    && rest.iter().all(|a| tail.assignable(a))
            }
        }
    }
}

pub struct Builtin {
    pub name: &'static str,
    pub overloads: Vec<Signature>,
}

/// Looks up a built-in function by its (already-lowercased) name.
pub fn lookup(name: &str) -> Option<Builtin> {
    let any_array = Type::array(Type::Unknown);
    let overloads = match name {
        "contains" => vec![
            Signature::fixed(vec![Type::String, Type::String], Type::Bool),
            Signature::fixed(vec![any_array, Type::Unknown], Type::Bool),
        ],
        "startswith" => vec![Signature::fixed(
            vec![Type::String, Type::String],
            Type::Bool,
        )],
        "endswith" => vec![Signature::fixed(
            vec![Type::String, Type::String],
            Type::Bool,
        )],
        "format" => vec![Signature::variadic(
            vec![Type::String],
            Type::Unknown,
            Type::String,
        )],
        "join" => vec![
            Signature::fixed(
                vec![Type::array(Type::String), Type::String],
                Type::String,
            ),
            Signature::fixed(vec![Type::array(Type::String)], Type::String),
            Signature::fixed(vec![Type::String, Type::String], Type::String),
            Signature::fixed(vec![Type::String], Type::String),
        ],
        "tojson" => vec![Signature::fixed(vec![Type::Unknown], Type::String)],
        "fromjson" => vec![Signature::fixed(vec![Type::String], Type::Unknown)],
        "hashfiles" => vec![Signature::variadic(vec![], Type::String, Type::String)],
        "success" | "always" | "canceled" | "cancelled" | "failure" => {
            vec![Signature::fixed(vec![], Type::Bool)]
        }
        _ => return None,
    };
    Some(Builtin { name: builtin_static_name(name), overloads })
}

/// Returns `&'static str` for a known builtin name, used so callers don't
/// need to carry the caller's owned `String` around.
fn builtin_static_name(name: &str) -> &'static str {
    match name {
        "contains" => "contains",
        "startswith" => "startsWith",
        "endswith" => "endsWith",
        "format" => "format",
        "join" => "join",
        "tojson" => "toJSON",
        "fromjson" => "fromJSON",
        "hashfiles" => "hashFiles",
        "success" => "success",
        "always" => "always",
        "canceled" => "canceled",
        "cancelled" => "cancelled",
        "failure" => "failure",
        _ => "",
    }
}

/// Names of the functions restricted by `setSpecialFunctionAvailability`.
pub const SPECIAL_FUNCTIONS: &[&str] =
    &["success", "always", "failure", "canceled", "cancelled", "hashfiles"];

/// Resolution outcome for a call against a builtin's overload set.
pub enum Resolution {
    /// An overload matched; carries its return type.
    Ok(Type),
    /// No overload matched this call's arity/argument types.
    NoOverload,
}

/// Resolves a call to `builtin` given the (already type-checked) argument
/// types, returning the first overload that matches.
pub fn resolve(builtin: &Builtin, args: &[Type]) -> Resolution {
    for sig in &builtin.overloads {
        if sig.matches(args) {
            return Resolution::Ok(sig.ret.clone());
        }
    }
    Resolution::NoOverload
}

/// Validates `format()`'s placeholder usage against a literal format string.
///
/// Returns the set of problems found: indices referenced in `{n}` form that
/// have no corresponding extra argument, and argument indices with no
/// corresponding `{n}` placeholder in the format string.
pub struct FormatProblems {
    pub unmatched_placeholders: Vec<usize>,
    pub unused_args: Vec<usize>,
}

pub fn check_format_placeholders(fmt: &str, extra_arg_count: usize) -> FormatProblems {
    let mut referenced = std::collections::BTreeSet::new();
    let chars: Vec<char> = fmt.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => i += 2,
            '}' if chars.get(i + 1) == Some(&'}') => i += 2,
            '{' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j > start && chars.get(j) == Some(&'}') {
                    let n: usize = chars[start..j].iter().collect::<String>().parse().unwrap_or(0);
                    referenced.insert(n);
                    i = j + 1;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    let unmatched_placeholders = referenced
        .iter()
        .copied()
        .filter(|n| *n >= extra_arg_count)
        .collect();
    let unused_args = (0..extra_arg_count)
        .filter(|n| !referenced.contains(n))
        .collect();

    FormatProblems { unmatched_placeholders, unused_args }
}

/// Shorthand used by the type checker when synthesizing an object type from
/// a literal (non-expression) YAML mapping value.
pub fn strict_object(fields: impl IntoIterator<Item = (String, Type)>) -> Type {
    Type::object(ObjectType::strict(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_overload_resolution() {
        let b = lookup("contains").unwrap();
        assert!(matches!(
            resolve(&b, &[Type::String, Type::String]),
            Resolution::Ok(Type::Bool)
        ));
        assert!(matches!(
            resolve(&b, &[Type::array(Type::Unknown), Type::Number]),
            Resolution::Ok(Type::Bool)
        ));
    }

    #[test]
    fn test_join_variants() {
        let b = lookup("join").unwrap();
        assert!(matches!(
            resolve(&b, &[Type::array(Type::String)]),
            Resolution::Ok(_)
        ));
        assert!(matches!(resolve(&b, &[Type::String]), Resolution::Ok(_)));
    }

    #[test]
    fn test_nullary_special_functions() {
        for name in ["success", "always", "canceled", "cancelled", "failure"] {
            let b = lookup(name).unwrap();
            assert!(matches!(resolve(&b, &[]), Resolution::Ok(Type::Bool)));
            assert!(matches!(resolve(&b, &[Type::String]), Resolution::NoOverload));
        }
    }

    #[test]
    fn test_format_variadic_accepts_any_arity() {
        let b = lookup("format").unwrap();
        assert!(matches!(
            resolve(&b, &[Type::String, Type::Number, Type::Bool]),
            Resolution::Ok(Type::String)
        ));
        assert!(matches!(
            resolve(&b, &[Type::String]),
            Resolution::Ok(Type::String)
        ));
    }

    #[test]
    fn test_unknown_function_not_found() {
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn test_format_placeholder_missing_and_extra() {
        // format('hello {0} {2}', 'a', 'b') -> {1} unused arg, {2} has no arg.
        let problems = check_format_placeholders("hello {0} {2}", 2);
        assert_eq!(problems.unmatched_placeholders, vec![2]);
        assert_eq!(problems.unused_args, vec![1]);
    }

    #[test]
    fn test_format_placeholder_exact_match_is_clean() {
        let problems = check_format_placeholders("{0}-{1}", 2);
        assert!(problems.unmatched_placeholders.is_empty());
        assert!(problems.unused_args.is_empty());
    }

    #[test]
    fn test_format_escaped_braces_ignored() {
        let problems = check_format_placeholders("{{literal}} {0}", 1);
        assert!(problems.unmatched_placeholders.is_empty());
        assert!(problems.unused_args.is_empty());
    }
}
