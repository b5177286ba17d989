use std::collections::BTreeSet;

use log::trace;

use crate::surface::Expr;

use super::super::types::{Kind, Type, TypeVarId};
use super::super::TypeEnv;
use super::TypeChecker;

impl TypeChecker {
    /// Quantifies the variables of `ty` that the environment does not mention.
    /// A variable whose kind mentions another variable is quantified inside
    /// it, so instantiation always sees the outer variable first.
    pub(super) fn generalize(&self, ty: &Type, env: &TypeEnv) -> Type {
        let ty = self.resolve(ty);
        let env_vars = self.closed_under_kinds(
            env.values()
                .flat_map(|bound| self.resolve(bound).free_type_variables())
                .collect(),
        );
        let candidates = self.closed_under_kinds(ty.free_type_variables());
        let quantified: BTreeSet<TypeVarId> =
            candidates.difference(&env_vars).copied().collect();
        if quantified.is_empty() {
            return ty;
        }

        let mut order = Vec::new();
        let mut visited = BTreeSet::new();
        for var in &quantified {
            self.order_by_kind(*var, &quantified, &mut visited, &mut order);
        }

        let range = ty.range;
        let scheme = order.iter().rev().fold(ty, |body, var| {
            Type::forall(range, *var, self.kind_of(*var), body)
        });
        trace!("generalized to {scheme}");
        scheme
    }

    /// Adds the variables mentioned by the kinds of `vars`, transitively.
    fn closed_under_kinds(&self, vars: BTreeSet<TypeVarId>) -> BTreeSet<TypeVarId> {
        let mut closed = BTreeSet::new();
        let mut pending: Vec<TypeVarId> = vars.into_iter().collect();
        while let Some(var) = pending.pop() {
            if !closed.insert(var) {
                continue;
            }
            pending.extend(self.kind_of(var).free_type_variables());
        }
        closed
    }

    fn order_by_kind(
        &self,
        var: TypeVarId,
        quantified: &BTreeSet<TypeVarId>,
        visited: &mut BTreeSet<TypeVarId>,
        order: &mut Vec<TypeVarId>,
    ) {
        if !visited.insert(var) {
            return;
        }
        if let Kind::Record(_) = self.kind_of(var) {
            for dep in self.kind_of(var).free_type_variables() {
                if quantified.contains(&dep) {
                    self.order_by_kind(dep, quantified, visited, order);
                }
            }
        }
        order.push(var);
    }
}

/// Expressions whose evaluation cannot allocate a reference cell. Only these
/// are generalized at `let`.
pub(super) fn is_syntactic_value(expr: &Expr) -> bool {
    match expr {
        Expr::Literal { .. } | Expr::Var(_) | Expr::Lambda { .. } => true,
        Expr::Construct { arg, .. } => arg.as_deref().map_or(true, is_syntactic_value),
        Expr::Tuple { items, .. } | Expr::List { items, .. } => {
            items.iter().all(is_syntactic_value)
        }
        Expr::Record { fields, .. } => fields.iter().all(|(_, value)| is_syntactic_value(value)),
        Expr::Annot { expr, .. } => is_syntactic_value(expr),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::surface::parse_program;

    fn value(source: &str) -> bool {
        let program = parse_program(lex(source).expect("lex")).expect("parse");
        is_syntactic_value(&program.body)
    }

    #[test]
    fn functions_and_constructed_values_are_values() {
        assert!(value("fun x -> x"));
        assert!(value("Some (fun x -> x)"));
        assert!(value("([], {a = 1})"));
    }

    #[test]
    fn applications_and_refs_are_not_values() {
        assert!(!value("ref []"));
        assert!(!value("(fun x -> x) 1"));
        assert!(!value("Some (ref 1)"));
    }
}
