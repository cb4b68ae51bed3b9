//! Semantic checker for expression ASTs (spec §4.5).

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{CompareKind, Expr, LogicalKind, SpannedExpr};
use crate::functions::{self, Resolution, SPECIAL_FUNCTIONS};
use crate::position::Position;
use crate::types::{ObjectType, Type};
use crate::untrusted;

/// A diagnostic raised by the checker. Carries no file path: the caller
/// (the rule that owns this checker) attaches that when it merges results
/// into the run's overall diagnostic list.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub pos: Position,
    pub message: String,
    pub rule_kind: &'static str,
}

impl Diagnostic {
    fn expr(pos: Position, message: impl Into<String>) -> Self {
        Self { pos, message: message.into(), rule_kind: "expression" }
    }
}

const BUILTIN_CONTEXTS: &[&str] = &[
    "github", "env", "job", "steps", "runner", "secrets", "strategy", "matrix", "needs",
    "inputs", "vars",
];

/// The checker's mutable environment: a copy-on-write map of context name to
/// type, plus the availability restrictions currently in force.
#[derive(Clone)]
pub struct Env {
    vars: Rc<BTreeMap<String, Type>>,
    context_availability: Option<Rc<Vec<String>>>,
    special_function_availability: Option<Rc<Vec<String>>>,
    config_vars: Option<Rc<Vec<String>>>,
}

impl Default for Env {
    fn default() -> Self {
        let mut vars = BTreeMap::new();
        for ctx in BUILTIN_CONTEXTS {
            vars.insert((*ctx).to_string(), Type::object(ObjectType::loose()));
        }
        Self {
            vars: Rc::new(vars),
            context_availability: None,
            special_function_availability: None,
            config_vars: None,
        }
    }
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&mut self, name: &str, ty: Type) {
        Rc::make_mut(&mut self.vars).insert(name.to_string(), ty);
    }

    pub fn update_matrix(&mut self, ty: Type) {
        self.set("matrix", ty);
    }

    pub fn update_steps(&mut self, ty: Type) {
        self.set("steps", ty);
    }

    pub fn update_needs(&mut self, ty: Type) {
        self.set("needs", ty);
    }

    pub fn update_secrets(&mut self, ty: Type) {
        self.set("secrets", ty);
    }

    pub fn update_inputs(&mut self, ty: Type) {
        self.set("inputs", ty);
    }

    pub fn update_dispatch_inputs(&mut self, ty: Type) {
        // github.event.inputs is nested under the `github` context; merge it
        // in without disturbing the rest of `github`'s (loose) shape.
        let github = self
            .vars
            .get("github")
            .cloned()
            .unwrap_or_else(|| Type::object(ObjectType::loose()));
        let Type::Object(mut gh) = github else {
            return;
        };
        let event = gh
            .props
            .get("event")
            .cloned()
            .unwrap_or_else(|| Type::object(ObjectType::loose()));
        let Type::Object(mut event_obj) = event else {
            return;
        };
        event_obj.props.insert("inputs".to_string(), ty);
        gh.props.insert("event".to_string(), Type::Object(event_obj));
        self.set("github", Type::Object(gh));
    }

    pub fn update_jobs(&mut self, ty: Type) {
        self.set("jobs", ty);
    }

    pub fn set_context_availability(&mut self, allowed: Vec<String>) {
        self.context_availability = if allowed.is_empty() { None } else { Some(Rc::new(allowed)) };
    }

    pub fn set_special_function_availability(&mut self, allowed: Vec<String>) {
        self.special_function_availability =
            if allowed.is_empty() { None } else { Some(Rc::new(allowed)) };
    }

    pub fn set_config_vars(&mut self, vars: Option<Vec<String>>) {
        self.config_vars = vars.map(Rc::new);
    }

    fn context_allowed(&self, name: &str) -> bool {
        self.context_availability
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|a| a == name))
    }

    fn special_function_allowed(&self, name: &str) -> bool {
        self.special_function_availability
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|a| a == name))
    }

    /// Type-checks `node` and collects its untrusted-input findings,
    /// returning the node's synthesized type alongside all diagnostics.
    pub fn check(&self, node: &SpannedExpr) -> (Type, Vec<Diagnostic>) {
        let mut diags = Vec::new();
        let ty = self.check_node(node, &mut diags);
        for finding in untrusted::scan(node) {
            let path_list = finding.paths.join("', '");
            diags.push(Diagnostic::expr(
                finding.pos,
                format!("reference to untrusted input: '{path_list}'"),
            ));
        }
        (ty, diags)
    }

    fn check_node(&self, node: &SpannedExpr, diags: &mut Vec<Diagnostic>) -> Type {
        match &node.node {
            Expr::Null => Type::Null,
            Expr::Bool(_) => Type::Bool,
            Expr::Int(_) | Expr::Float(_) => Type::Number,
            Expr::String(_) => Type::String,
            Expr::Variable(name) => self.check_variable(node.pos, name, diags),
            Expr::ObjectDeref { receiver, property } => {
                self.check_object_deref(node.pos, receiver, property, diags)
            }
            Expr::ArrayDeref { receiver } => self.check_array_deref(receiver, diags),
            Expr::IndexAccess { operand, index } => {
                self.check_index_access(operand, index, diags)
            }
            Expr::FuncCall { callee, args } => self.check_func_call(node.pos, callee, args, diags),
            Expr::NotOp { operand } => {
                self.check_node(operand, diags);
                Type::Bool
            }
            Expr::CompareOp { left, right, .. } => {
                self.check_node(left, diags);
                self.check_node(right, diags);
                Type::Bool
            }
            Expr::LogicalOp { kind: _, left, right } => {
                let lt = self.check_node(left, diags);
                let rt = self.check_node(right, diags);
                Type::merge(&lt, &rt)
            }
        }
    }

    fn check_variable(&self, pos: Position, name: &str, diags: &mut Vec<Diagnostic>) -> Type {
        if !self.context_allowed(name) {
            let allowed = self
                .context_availability
                .as_ref()
                .map(|a| a.join(", "))
                .unwrap_or_default();
            diags.push(Diagnostic::expr(
                pos,
                format!("context '{name}' is not available here; allowed: {allowed}"),
            ));
        }
        match self.vars.get(name) {
            Some(ty) => ty.clone(),
            None => {
                diags.push(Diagnostic::expr(pos, format!("undefined variable '{name}'")));
                Type::Unknown
            }
        }
    }

    fn check_object_deref(
        &self,
        pos: Position,
        receiver: &SpannedExpr,
        property: &str,
        diags: &mut Vec<Diagnostic>,
    ) -> Type {
        let recv_ty = self.check_node(receiver, diags);

        if matches!(&receiver.node, Expr::Variable(name) if name == "vars") {
            self.check_config_var(pos, property, diags);
        }

        match recv_ty {
            Type::Unknown => Type::Unknown,
            Type::Object(o) => o.get(property).cloned().unwrap_or(Type::Unknown),
            Type::Array { elem, deref: true } => match *elem {
                Type::Object(o) => o.get(property).cloned().unwrap_or(Type::Unknown),
                Type::Unknown => Type::Unknown,
                _ => {
                    diags.push(Diagnostic::expr(
                        pos,
                        format!("'{property}' accessed on a non-object array filter"),
                    ));
                    Type::Unknown
                }
            },
            _ => {
                diags.push(Diagnostic::expr(
                    pos,
                    format!("'{property}' accessed on a non-object value"),
                ));
                Type::Unknown
            }
        }
    }

    fn check_config_var(&self, pos: Position, name: &str, diags: &mut Vec<Diagnostic>) {
        let valid_shape =
            !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid_shape {
            diags.push(Diagnostic::expr(
                pos,
                format!("'{name}' is not a valid configuration variable name"),
            ));
            return;
        }
        if name.starts_with("github_") {
            diags.push(Diagnostic::expr(
                pos,
                format!("'{name}' uses the reserved 'github_' prefix"),
            ));
            return;
        }
        match &self.config_vars {
            None => {}
            Some(declared) => {
                if !declared.iter().any(|d| d == name) {
                    diags.push(Diagnostic::expr(
                        pos,
                        format!("'vars.{name}' is not declared in the project configuration"),
                    ));
                }
            }
        }
    }

    fn check_array_deref(&self, receiver: &SpannedExpr, diags: &mut Vec<Diagnostic>) -> Type {
        let recv_ty = self.check_node(receiver, diags);
        match recv_ty {
            Type::Array { elem, .. } => Type::Array { elem, deref: true },
            Type::Object(o) => {
                if let Some(mapped) = &o.mapped {
                    Type::Array { elem: mapped.clone(), deref: true }
                } else if o.props.values().any(Type::is_object) {
                    Type::Array { elem: Box::new(Type::Unknown), deref: true }
                } else {
                    diags.push(Diagnostic::expr(
                        receiver.pos,
                        "object filter '.*' requires at least one object-valued property",
                    ));
                    Type::Unknown
                }
            }
            Type::Unknown => Type::array(Type::Unknown),
            _ => {
                diags.push(Diagnostic::expr(receiver.pos, "'.*' requires an array or object"));
                Type::Unknown
            }
        }
    }

    fn check_index_access(
        &self,
        operand: &SpannedExpr,
        index: &SpannedExpr,
        diags: &mut Vec<Diagnostic>,
    ) -> Type {
        let operand_ty = self.check_node(operand, diags);
        let index_ty = self.check_node(index, diags);

        match &operand_ty {
            Type::Array { elem, .. } => {
                if !matches!(index_ty, Type::Number | Type::Unknown) {
                    diags.push(Diagnostic::expr(index.pos, "array index must be numeric"));
                }
                (**elem).clone()
            }
            Type::Object(o) => {
                if let Expr::String(literal) = &index.node {
                    o.get(literal).cloned().unwrap_or(Type::Unknown)
                } else {
                    o.mapped.as_deref().cloned().unwrap_or(Type::Unknown)
                }
            }
            Type::Unknown => Type::Unknown,
            _ => {
                diags.push(Diagnostic::expr(operand.pos, "value is not indexable"));
                Type::Unknown
            }
        }
    }

    fn check_func_call(
        &self,
        pos: Position,
        callee: &str,
        args: &[SpannedExpr],
        diags: &mut Vec<Diagnostic>,
    ) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_node(a, diags)).collect();

        if SPECIAL_FUNCTIONS.contains(&callee) && !self.special_function_allowed(callee) {
            diags.push(Diagnostic::expr(
                pos,
                format!("'{callee}()' is not available at this workflow key"),
            ));
        }

        let Some(builtin) = functions::lookup(callee) else {
            diags.push(Diagnostic::expr(pos, format!("unknown function '{callee}'")));
            return Type::Unknown;
        };

        if callee == "format" {
            if let Some(first) = args.first() {
                if let Expr::String(fmt) = &first.node {
                    let problems = functions::check_format_placeholders(fmt, args.len() - 1);
                    for missing in problems.unused_args {
                        diags.push(Diagnostic::expr(
                            pos,
                            format!("{{{missing}}} is missing in format string"),
                        ));
                    }
                    for extra in problems.unmatched_placeholders {
                        diags.push(Diagnostic::expr(
                            pos,
                            format!("placeholder {{{extra}}} has no argument"),
                        ));
                    }
                }
            }
        }

        match functions::resolve(&builtin, &arg_types) {
            Resolution::Ok(ret) => ret,
            Resolution::NoOverload => {
                diags.push(Diagnostic::expr(
                    pos,
                    format!("no overload of '{}' matches the given arguments", builtin.name),
                ));
                Type::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;

    fn check(src: &str, env: &Env) -> (Type, Vec<Diagnostic>) {
        let expr = parse(&format!("{src} }}}}")).unwrap();
        env.check(&expr)
    }

    #[test]
    fn test_undefined_variable_diagnosed() {
        let env = Env::new();
        let (_, diags) = check("nonsense", &env);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("undefined variable"));
    }

    #[test]
    fn test_known_context_roots_resolve() {
        let env = Env::new();
        for ctx in BUILTIN_CONTEXTS {
            let (_, diags) = check(ctx, &env);
            assert!(diags.is_empty(), "{ctx} should resolve cleanly");
        }
    }

    #[test]
    fn test_context_availability_restriction() {
        let mut env = Env::new();
        env.set_context_availability(vec!["github".to_string(), "env".to_string()]);
        let (_, diags) = check("secrets", &env);
        assert!(diags.iter().any(|d| d.message.contains("not available")));
        let (_, diags) = check("github", &env);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_special_function_restricted() {
        let mut env = Env::new();
        env.set_special_function_availability(vec!["always".to_string()]);
        let (_, diags) = check("success()", &env);
        assert!(diags.iter().any(|d| d.message.contains("not available")));
        let (_, diags) = check("always()", &env);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_matrix_update_resolves_property() {
        let mut env = Env::new();
        env.update_matrix(Type::object(ObjectType::strict([(
            "os".to_string(),
            Type::String,
        )])));
        let (ty, diags) = check("matrix.os", &env);
        assert!(diags.is_empty());
        assert_eq!(ty, Type::String);
    }

    #[test]
    fn test_format_arity_mismatch_reports_both() {
        let env = Env::new();
        let (_, diags) = check("format('hello {0} {2}', 'a', 'b')", &env);
        assert!(diags.iter().any(|d| d.message.contains("{1} is missing")));
        assert!(diags.iter().any(|d| d.message.contains("placeholder {2} has no argument")));
    }

    #[test]
    fn test_config_var_reserved_prefix() {
        let env = Env::new();
        let (_, diags) = check("vars.github_token", &env);
        assert!(diags.iter().any(|d| d.message.contains("reserved")));
    }

    #[test]
    fn test_config_var_undeclared_when_list_present() {
        let mut env = Env::new();
        env.set_config_vars(Some(vec!["known".to_string()]));
        let (_, diags) = check("vars.known", &env);
        assert!(diags.is_empty());
        let (_, diags) = check("vars.unknown", &env);
        assert!(diags.iter().any(|d| d.message.contains("not declared")));
    }

    #[test]
    fn test_config_var_skipped_when_none() {
        let env = Env::new();
        let (_, diags) = check("vars.anything", &env);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_untrusted_input_surfaced_through_check() {
        let env = Env::new();
        let (_, diags) = check("github.event.issue.title", &env);
        assert!(diags.iter().any(|d| d.message.contains("untrusted input")));
    }

    #[test]
    fn test_logical_or_merges_types() {
        let mut env = Env::new();
        env.update_inputs(Type::object(ObjectType::strict([(
            "count".to_string(),
            Type::Number,
        )])));
        let (ty, _) = check("inputs.count || 'default'", &env);
        assert_eq!(ty, Type::String);
    }
}
