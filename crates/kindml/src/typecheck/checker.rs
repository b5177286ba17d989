use crate::diagnostics::Range;
use crate::elaborated::CoreExpr;

use super::kind_env::KindEnv;
use super::subst::Substitution;
use super::types::{Kind, Type, TypeMain, TypeVarGen, TypeVarId};
use super::variant_env::VariantEnv;
use super::{CheckOptions, Checked, TypeEnv, TypecheckError, TypecheckWarning};

mod generalize;
mod infer_expr;
mod patterns;
mod register;
mod type_expr;

/// State of one inference session. Type variable ids come from `gen`, which
/// starts above every id already present in the environments it was given.
pub(super) struct TypeChecker {
    variants: VariantEnv,
    kinds: KindEnv,
    subst: Substitution,
    gen: TypeVarGen,
    options: CheckOptions,
    warnings: Vec<TypecheckWarning>,
}

impl TypeChecker {
    pub(super) fn new(
        variants: VariantEnv,
        kinds: KindEnv,
        env: &TypeEnv,
        options: CheckOptions,
    ) -> Self {
        let used = variants
            .mentioned_variables()
            .chain(kinds.iter().flat_map(|(id, kind)| {
                let mut ids = vec![*id];
                if let Kind::Record(fields) = kind {
                    ids.extend(fields.values().flat_map(Type::mentioned_variables));
                }
                ids
            }))
            .chain(env.values().flat_map(Type::mentioned_variables))
            .collect::<Vec<_>>();
        Self {
            variants,
            kinds,
            subst: Substitution::with_trace(options.trace_unification),
            gen: TypeVarGen::starting_after(used),
            options,
            warnings: Vec::new(),
        }
    }

    pub(super) fn fresh_var(&mut self, range: Range) -> Type {
        Type::var(range, self.gen.fresh())
    }

    /// A fresh variable constrained by `kind`.
    pub(super) fn fresh_kinded(&mut self, range: Range, kind: Kind) -> Result<Type, TypecheckError> {
        let id = self.gen.fresh();
        if let Kind::Record(_) = kind {
            self.kinds = self.kinds.extend(id, kind)?;
        }
        Ok(Type::var(range, id))
    }

    /// Unifies, reporting a failure at `range`.
    pub(super) fn unify(
        &mut self,
        expected: &Type,
        found: &Type,
        range: Range,
    ) -> Result<(), TypecheckError> {
        self.subst
            .unify(expected, found, &mut self.kinds)
            .map_err(|source| TypecheckError::Contradiction { range, source })
    }

    pub(super) fn resolve(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    /// Strips the outer quantifiers of `ty`, giving each bound variable a fresh
    /// id that inherits the quantifier's kind.
    pub(super) fn instantiate(&mut self, ty: &Type, range: Range) -> Result<Type, TypecheckError> {
        let mut current = ty.clone();
        while let TypeMain::Forall { var, kind, body } = current.main {
            let fresh = self.fresh_kinded(range, kind)?;
            current = body.substitute_variable(var, &fresh);
        }
        Ok(current.with_range(range))
    }

    pub(super) fn kind_of(&self, id: TypeVarId) -> Kind {
        self.subst.apply_kind(&self.kinds.kind_of(id))
    }

    pub(super) fn warn(&mut self, warning: TypecheckWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub(super) fn finish(self, core: CoreExpr, ty: Type) -> Checked {
        let finalize = |ty: &Type| self.subst.apply(ty).erase_range();
        let expr = core.map_types(&finalize);
        let ty = finalize(&ty);
        let kind = match ty.main {
            TypeMain::Var(id) => self.kind_of(id).erase_range(),
            _ => Kind::Universal,
        };
        Checked {
            expr,
            ty,
            kind,
            warnings: self.warnings,
        }
    }
}
