//! The gradual type lattice used to type-check expressions (spec §4.4).

use std::collections::BTreeMap;

/// A type in the gradual lattice.
///
/// `Unknown` is both top and bottom: it is assignable to, and from,
/// everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Unknown,
    Null,
    Number,
    Bool,
    String,
    Array {
        elem: Box<Type>,
        /// Whether this array's shape originates from an object-filter
        /// (`.*`) projection.
        deref: bool,
    },
    Object(ObjectType),
}

/// An object type: either strict (closed, `mapped = None`), loose (open to
/// any key with `any` value, `mapped = Some(Unknown)`), or a map (every key
/// maps to `T`, `mapped = Some(T)` with `T != Unknown`).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub props: BTreeMap<String, Type>,
    pub mapped: Option<Box<Type>>,
}

impl ObjectType {
    pub fn strict(props: impl IntoIterator<Item = (String, Type)>) -> Self {
        Self {
            props: props.into_iter().collect(),
            mapped: None,
        }
    }

    pub fn loose() -> Self {
        Self {
            props: BTreeMap::new(),
            mapped: Some(Box::new(Type::Unknown)),
        }
    }

    pub fn map_of(value: Type) -> Self {
        Self {
            props: BTreeMap::new(),
            mapped: Some(Box::new(value)),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.mapped.is_none()
    }

    pub fn is_loose(&self) -> bool {
        matches!(self.mapped.as_deref(), Some(Type::Unknown))
    }

    /// Looks up a property, falling back to the mapped type (for loose/map
    /// objects) and finally to `None` (strict objects with an undefined
    /// property; spec §9 Open Question (a) leaves this silent at the
    /// checker layer, which turns `None` into `Type::Unknown`).
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.props.get(name).or(self.mapped.as_deref())
    }
}

impl Type {
    pub fn object(o: ObjectType) -> Type {
        Type::Object(o)
    }

    pub fn array(elem: Type) -> Type {
        Type::Array { elem: Box::new(elem), deref: false }
    }

    /// `self.assignable(other)`: can a value of type `other` be used where
    /// `self` is expected?
    pub fn assignable(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Unknown, _) | (_, Type::Unknown) => true,
            (Type::Null, Type::Null) => true,
            (Type::Number, Type::Number) => true,
            (Type::Bool, _) => true,
            (Type::String, Type::String | Type::Number) => true,
            (Type::Array { elem: e1, .. }, Type::Array { elem: e2, .. }) => e1.assignable(e2),
            (Type::Object(lhs), Type::Object(rhs)) => Self::object_assignable(lhs, rhs),
            _ => false,
        }
    }

    fn object_assignable(lhs: &ObjectType, rhs: &ObjectType) -> bool {
        if lhs.is_strict() {
            // Every prop lhs declares must be supplied by rhs and assignable.
            lhs.props.iter().all(|(k, lt)| match rhs.get(k) {
                Some(rt) => lt.assignable(rt),
                None => false,
            })
        } else {
            // Loose/map lhs: every rhs prop's value must be assignable to
            // lhs.mapped.
            let Some(mapped) = lhs.mapped.as_deref() else {
                return false;
            };
            rhs.props.values().all(|rt| mapped.assignable(rt))
                && rhs
                    .mapped
                    .as_deref()
                    .is_none_or(|rm| mapped.assignable(rm))
        }
    }

    /// Unifies two types at a join point (e.g. the result of `||`).
    pub fn merge(a: &Type, b: &Type) -> Type {
        match (a, b) {
            (Type::Unknown, t) | (t, Type::Unknown) => t.clone(),
            (Type::Null, Type::Null) => Type::Null,
            (Type::Number, Type::Number) => Type::Number,
            (Type::Bool, Type::Bool) => Type::Bool,
            (Type::String, Type::String) => Type::String,
            (Type::String, Type::Number) | (Type::Number, Type::String) => Type::String,
            (Type::String, Type::Bool) | (Type::Bool, Type::String) => Type::String,
            (Type::Array { elem: e1, .. }, Type::Array { elem: e2, .. }) => {
                if e1 == e2 {
                    Type::Array { elem: e1.clone(), deref: false }
                } else {
                    Type::array(Type::merge(e1, e2))
                }
            }
            (Type::Object(o1), Type::Object(o2)) => Type::Object(Self::merge_objects(o1, o2)),
            _ => Type::Unknown,
        }
    }

    fn merge_objects(a: &ObjectType, b: &ObjectType) -> ObjectType {
        let mut props = a.props.clone();
        for (k, bt) in &b.props {
            props
                .entry(k.clone())
                .and_modify(|at| *at = Type::merge(at, bt))
                .or_insert_with(|| bt.clone());
        }
        let mapped = match (&a.mapped, &b.mapped) {
            (None, None) => None,
            (Some(m), None) | (None, Some(m)) => Some(m.clone()),
            (Some(m1), Some(m2)) => Some(Box::new(Type::merge(m1, m2))),
        };
        ObjectType { props, mapped }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Type::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignable_reflexive() {
        for t in [
            Type::Unknown,
            Type::Null,
            Type::Number,
            Type::Bool,
            Type::String,
            Type::array(Type::String),
            Type::object(ObjectType::strict([("a".to_string(), Type::String)])),
        ] {
            assert!(t.assignable(&t), "{t:?} should be self-assignable");
        }
    }

    #[test]
    fn test_unknown_absorbs() {
        for t in [Type::Null, Type::Number, Type::Bool, Type::String] {
            assert!(Type::Unknown.assignable(&t));
            assert!(t.assignable(&Type::Unknown));
        }
    }

    #[test]
    fn test_merge_disjoint_scalars_is_unknown() {
        assert_eq!(Type::merge(&Type::Null, &Type::Number), Type::Unknown);
    }

    #[test]
    fn test_string_absorbs_number_and_bool() {
        assert!(Type::String.assignable(&Type::Number));
        assert!(Type::String.assignable(&Type::Bool));
        assert!(!Type::Number.assignable(&Type::String));
    }

    #[test]
    fn test_bool_universal_coercion() {
        for t in [Type::Null, Type::Number, Type::String, Type::Unknown] {
            assert!(Type::Bool.assignable(&t));
        }
    }

    #[test]
    fn test_strict_object_rejects_missing_prop() {
        let lhs = Type::object(ObjectType::strict([("a".to_string(), Type::String)]));
        let rhs_missing_a =
            Type::object(ObjectType::strict([("b".to_string(), Type::Number)]));
        assert!(!lhs.assignable(&rhs_missing_a));

        let rhs_has_a = Type::object(ObjectType::strict([
            ("a".to_string(), Type::String),
            ("b".to_string(), Type::Number),
        ]));
        assert!(lhs.assignable(&rhs_has_a));
    }

    #[test]
    fn test_loose_object_accepts_anything() {
        let lhs = Type::object(ObjectType::loose());
        let rhs = Type::object(ObjectType::strict([("a".to_string(), Type::String)]));
        assert!(lhs.assignable(&rhs));
    }

    #[test]
    fn test_map_object_requires_uniform_value_type() {
        let lhs = Type::object(ObjectType::map_of(Type::String));
        let rhs_ok = Type::object(ObjectType::strict([("a".to_string(), Type::String)]));
        let rhs_bad = Type::object(ObjectType::strict([(
            "a".to_string(),
            Type::object(ObjectType::loose()),
        )]));
        assert!(lhs.assignable(&rhs_ok));
        assert!(!lhs.assignable(&rhs_bad));
    }
}
