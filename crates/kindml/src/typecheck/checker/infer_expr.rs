use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::Exhaustiveness;
use crate::diagnostics::Range;
use crate::elaborated::{CoreArm, CoreExpr, CoreRecBinding};
use crate::surface::{expr_range, Expr, MatchArm, RecBinding, SpannedName};

use super::super::exhaustive::check_match;
use super::super::types::{Kind, Type, TypeMain};
use super::super::{TypeEnv, TypecheckError, TypecheckWarning};
use super::generalize::is_syntactic_value;
use super::patterns::literal_type;
use super::type_expr::TypeVarScope;
use super::TypeChecker;

type Inferred = Result<(CoreExpr, Type), TypecheckError>;

impl TypeChecker {
    pub(crate) fn infer_expr(&mut self, expr: &Expr, env: &TypeEnv) -> Inferred {
        match expr {
            Expr::Literal { value, range } => {
                Ok((CoreExpr::Literal(value.clone()), literal_type(value, *range)))
            }
            Expr::Var(name) => {
                let scheme = env
                    .get(&name.name)
                    .ok_or_else(|| TypecheckError::UnboundVariable {
                        name: name.name.clone(),
                        range: name.range,
                    })?;
                let ty = self.instantiate(scheme, name.range)?;
                Ok((CoreExpr::Var(name.name.clone()), ty))
            }
            Expr::Lambda { param, body, range } => {
                let param_ty = self.fresh_var(param.range);
                let inner = env.update(param.name.clone(), param_ty.clone());
                let (body, body_ty) = self.infer_expr(body, &inner)?;
                Ok((
                    CoreExpr::Lambda {
                        param: param.name.clone(),
                        param_ty: param_ty.clone(),
                        body: Arc::new(body),
                    },
                    Type::func(*range, param_ty, body_ty),
                ))
            }
            Expr::Apply { func, arg, range } => self.infer_apply(func, arg, *range, env),
            Expr::Let {
                name,
                value,
                body,
                ..
            } => {
                let (value_core, value_ty) = self.infer_expr(value, env)?;
                let scheme = if is_syntactic_value(value) {
                    self.generalize(&value_ty, env)
                } else {
                    value_ty
                };
                let inner = env.update(name.name.clone(), scheme.clone());
                let (body, body_ty) = self.infer_expr(body, &inner)?;
                Ok((
                    CoreExpr::Let {
                        name: name.name.clone(),
                        ty: scheme,
                        value: Box::new(value_core),
                        body: Box::new(body),
                    },
                    body_ty,
                ))
            }
            Expr::LetRec { bindings, body, .. } => self.infer_let_rec(bindings, body, env),
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let (cond_core, cond_ty) = self.infer_expr(cond, env)?;
                let cond_range = expr_range(cond);
                self.unify(&Type::bool(cond_range), &cond_ty, cond_range)?;
                let (then_core, then_ty) = self.infer_expr(then_branch, env)?;
                let (else_core, else_ty) = self.infer_expr(else_branch, env)?;
                self.unify(&then_ty, &else_ty, expr_range(else_branch))?;
                Ok((
                    CoreExpr::If {
                        cond: Box::new(cond_core),
                        then_branch: Box::new(then_core),
                        else_branch: Box::new(else_core),
                    },
                    then_ty,
                ))
            }
            Expr::List { items, range } => {
                let elem = self.fresh_var(*range);
                let mut cores = Vec::with_capacity(items.len());
                for item in items {
                    let (core, ty) = self.infer_expr(item, env)?;
                    self.unify(&elem, &ty, expr_range(item))?;
                    cores.push(core);
                }
                Ok((CoreExpr::List(cores), Type::list(*range, elem)))
            }
            Expr::Tuple { items, range } => {
                let mut cores = Vec::with_capacity(items.len());
                let mut tys = Vec::with_capacity(items.len());
                for item in items {
                    let (core, ty) = self.infer_expr(item, env)?;
                    cores.push(core);
                    tys.push(ty);
                }
                Ok((CoreExpr::Tuple(cores), Type::product(*range, tys)))
            }
            Expr::Record { fields, range } => {
                let (cores, tys) = self.infer_fields(fields, env)?;
                Ok((CoreExpr::Record(cores), Type::record(*range, tys)))
            }
            Expr::Field { base, field, range } => {
                let (base_core, base_ty) = self.infer_expr(base, env)?;
                let field_ty = self.fresh_var(field.range);
                let mut required = BTreeMap::new();
                required.insert(field.name.clone(), field_ty.clone());
                let record = self.fresh_kinded(*range, Kind::Record(required))?;
                self.unify(&record, &base_ty, expr_range(base))?;
                Ok((
                    CoreExpr::Field {
                        base: Box::new(base_core),
                        field: field.name.clone(),
                    },
                    field_ty,
                ))
            }
            Expr::Update {
                base,
                fields,
                range,
            } => {
                let (base_core, base_ty) = self.infer_expr(base, env)?;
                let (cores, tys) = self.infer_fields(fields, env)?;
                let record = self.fresh_kinded(*range, Kind::Record(tys))?;
                self.unify(&record, &base_ty, expr_range(base))?;
                Ok((
                    CoreExpr::Update {
                        base: Box::new(base_core),
                        fields: cores,
                    },
                    base_ty,
                ))
            }
            Expr::Construct { ctor, arg, range } => {
                self.infer_construct(ctor, arg.as_deref(), *range, env)
            }
            Expr::Match {
                scrutinee,
                arms,
                range,
            } => self.infer_match(scrutinee, arms, *range, env),
            Expr::Ref { value, range } => {
                let (core, ty) = self.infer_expr(value, env)?;
                Ok((CoreExpr::Ref(Box::new(core)), Type::reference(*range, ty)))
            }
            Expr::Deref { target, range } => {
                let (core, ty) = self.infer_expr(target, env)?;
                let pointee = self.fresh_var(*range);
                let target_range = expr_range(target);
                self.unify(
                    &Type::reference(target_range, pointee.clone()),
                    &ty,
                    target_range,
                )?;
                Ok((CoreExpr::Deref(Box::new(core)), pointee))
            }
            Expr::Assign {
                target,
                value,
                range,
            } => {
                let (target_core, target_ty) = self.infer_expr(target, env)?;
                let (value_core, value_ty) = self.infer_expr(value, env)?;
                let pointee = self.fresh_var(*range);
                let target_range = expr_range(target);
                self.unify(
                    &Type::reference(target_range, pointee.clone()),
                    &target_ty,
                    target_range,
                )?;
                self.unify(&pointee, &value_ty, expr_range(value))?;
                Ok((
                    CoreExpr::Assign {
                        target: Box::new(target_core),
                        value: Box::new(value_core),
                    },
                    Type::unit(*range),
                ))
            }
            Expr::Sequence { first, second, .. } => {
                let (first_core, first_ty) = self.infer_expr(first, env)?;
                let first_range = expr_range(first);
                self.unify(&Type::unit(first_range), &first_ty, first_range)?;
                let (second_core, second_ty) = self.infer_expr(second, env)?;
                Ok((
                    CoreExpr::Sequence {
                        first: Box::new(first_core),
                        second: Box::new(second_core),
                    },
                    second_ty,
                ))
            }
            Expr::Annot { expr, ty, .. } => {
                let (core, found) = self.infer_expr(expr, env)?;
                let mut vars = HashMap::new();
                let annotated = self.translate_type(ty, &mut TypeVarScope::Annotation(&mut vars))?;
                self.unify(&annotated, &found, expr_range(expr))?;
                Ok((
                    CoreExpr::Annot {
                        expr: Box::new(core),
                        ty: annotated.clone(),
                    },
                    annotated,
                ))
            }
        }
    }

    fn infer_apply(&mut self, func: &Expr, arg: &Expr, range: Range, env: &TypeEnv) -> Inferred {
        let (func_core, func_ty) = self.infer_expr(func, env)?;
        let (arg_core, arg_ty) = self.infer_expr(arg, env)?;
        let core = CoreExpr::Apply {
            func: Box::new(func_core),
            arg: Box::new(arg_core),
        };
        // A known function type lets the error point at the argument.
        let resolved = self.resolve(&func_ty);
        if let TypeMain::Func(param, result) = &resolved.expand_synonyms().main {
            self.unify(param, &arg_ty, expr_range(arg))?;
            return Ok((core, result.as_ref().clone().with_range(range)));
        }
        let result = self.fresh_var(range);
        let expected = Type::func(expr_range(func), arg_ty, result.clone());
        self.unify(&expected, &func_ty, expr_range(func))?;
        Ok((core, result))
    }

    fn infer_let_rec(&mut self, bindings: &[RecBinding], body: &Expr, env: &TypeEnv) -> Inferred {
        let mut inner = env.clone();
        let mut placeholders = Vec::with_capacity(bindings.len());
        for binding in bindings {
            if !matches!(binding.value, Expr::Lambda { .. }) {
                return Err(TypecheckError::RecNotFunction {
                    name: binding.name.name.clone(),
                    range: binding.range,
                });
            }
            if placeholders
                .iter()
                .any(|(name, _): &(String, Type)| *name == binding.name.name)
            {
                return Err(TypecheckError::DuplicateBinding {
                    name: binding.name.name.clone(),
                    range: binding.name.range,
                });
            }
            let placeholder = self.fresh_var(binding.name.range);
            inner.insert(binding.name.name.clone(), placeholder.clone());
            placeholders.push((binding.name.name.clone(), placeholder));
        }

        let mut values = Vec::with_capacity(bindings.len());
        for (binding, (_, placeholder)) in bindings.iter().zip(&placeholders) {
            let (core, ty) = self.infer_expr(&binding.value, &inner)?;
            self.unify(placeholder, &ty, binding.range)?;
            values.push(core);
        }

        let mut outer = env.clone();
        let mut cores = Vec::with_capacity(bindings.len());
        for ((name, placeholder), value) in placeholders.into_iter().zip(values) {
            let scheme = self.generalize(&placeholder, env);
            outer.insert(name.clone(), scheme.clone());
            cores.push(CoreRecBinding {
                name,
                ty: scheme,
                value,
            });
        }
        let (body, body_ty) = self.infer_expr(body, &outer)?;
        Ok((
            CoreExpr::LetRec {
                bindings: cores,
                body: Box::new(body),
            },
            body_ty,
        ))
    }

    fn infer_fields(
        &mut self,
        fields: &[(SpannedName, Expr)],
        env: &TypeEnv,
    ) -> Result<(Vec<(String, CoreExpr)>, BTreeMap<String, Type>), TypecheckError> {
        let mut cores = Vec::with_capacity(fields.len());
        let mut tys = BTreeMap::new();
        for (name, value) in fields {
            let (core, ty) = self.infer_expr(value, env)?;
            if tys.insert(name.name.clone(), ty).is_some() {
                return Err(TypecheckError::DuplicateField {
                    name: name.name.clone(),
                    range: name.range,
                });
            }
            cores.push((name.name.clone(), core));
        }
        Ok((cores, tys))
    }

    /// The variant type of `ctor` and its argument types, with the variant's
    /// parameters replaced by fresh variables.
    pub(super) fn instantiate_constructor(
        &mut self,
        ctor: &SpannedName,
    ) -> Result<(Type, Vec<Type>), TypecheckError> {
        let info = self.variants.lookup_constructor(&ctor.name, ctor.range)?.clone();
        let type_args: Vec<Type> = info
            .params
            .iter()
            .map(|_| self.fresh_var(ctor.range))
            .collect();
        let arg_tys = info.instantiate_args(&type_args);
        Ok((Type::variant(ctor.range, info.variant, type_args), arg_tys))
    }

    fn infer_construct(
        &mut self,
        ctor: &SpannedName,
        arg: Option<&Expr>,
        range: Range,
        env: &TypeEnv,
    ) -> Inferred {
        let (variant_ty, arg_tys) = self.instantiate_constructor(ctor)?;
        let args: Vec<&Expr> = match (arg_tys.len(), arg) {
            (0, None) => Vec::new(),
            (1, Some(arg)) => vec![arg],
            (n, Some(Expr::Tuple { items, .. })) if n > 1 && items.len() == n => {
                items.iter().collect()
            }
            (expected, arg) => {
                let found = match arg {
                    None => 0,
                    Some(Expr::Tuple { items, .. }) => items.len(),
                    Some(_) => 1,
                };
                return Err(TypecheckError::ConstructorArity {
                    name: ctor.name.clone(),
                    expected,
                    found,
                    range,
                });
            }
        };
        let mut cores = Vec::with_capacity(args.len());
        for (arg, expected) in args.into_iter().zip(&arg_tys) {
            let (core, found) = self.infer_expr(arg, env)?;
            self.unify(expected, &found, expr_range(arg))?;
            cores.push(core);
        }
        Ok((
            CoreExpr::Construct {
                ctor: ctor.name.clone(),
                args: cores,
            },
            variant_ty.with_range(range),
        ))
    }

    fn infer_match(
        &mut self,
        scrutinee: &Expr,
        arms: &[MatchArm],
        range: Range,
        env: &TypeEnv,
    ) -> Inferred {
        let (scrutinee_core, scrutinee_ty) = self.infer_expr(scrutinee, env)?;
        let result = self.fresh_var(range);
        let mut core_arms = Vec::with_capacity(arms.len());
        for arm in arms {
            let mut bindings = Vec::new();
            let pattern = self.check_pattern(&arm.pattern, &scrutinee_ty, &mut bindings)?;
            let mut inner = env.clone();
            for (name, ty) in bindings {
                inner.insert(name, ty);
            }
            let (body, body_ty) = self.infer_expr(&arm.body, &inner)?;
            self.unify(&result, &body_ty, expr_range(&arm.body))?;
            core_arms.push(CoreArm { pattern, body });
        }

        let patterns: Vec<_> = core_arms.iter().map(|arm| &arm.pattern).collect();
        let report = check_match(&self.variants, &patterns);
        for index in report.unused_arms {
            self.warn(TypecheckWarning::UnusedArm {
                range: arms[index].range,
            });
        }
        if let Some(missing) = report.missing {
            match self.options.exhaustiveness {
                Exhaustiveness::Error => {
                    return Err(TypecheckError::NonExhaustive { missing, range });
                }
                Exhaustiveness::Warn => {
                    self.warn(TypecheckWarning::NonExhaustive { missing, range });
                }
            }
        }

        Ok((
            CoreExpr::Match {
                scrutinee: Box::new(scrutinee_core),
                scrutinee_ty,
                arms: core_arms,
            },
            result,
        ))
    }
}
