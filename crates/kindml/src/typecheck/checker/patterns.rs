use crate::diagnostics::Range;
use crate::elaborated::CorePattern;
use crate::surface::{pattern_range, Literal, Pattern, SpannedName};

use super::super::types::Type;
use super::super::TypecheckError;
use super::TypeChecker;

/// Variables bound by a pattern, in binding order.
pub(super) type PatternBindings = Vec<(String, Type)>;

impl TypeChecker {
    /// Checks `pattern` against the type of the value it will inspect.
    pub(super) fn check_pattern(
        &mut self,
        pattern: &Pattern,
        expected: &Type,
        bindings: &mut PatternBindings,
    ) -> Result<CorePattern, TypecheckError> {
        match pattern {
            Pattern::Wildcard(_) => Ok(CorePattern::Wildcard),
            Pattern::Var(name) => {
                bind_name(bindings, name, expected)?;
                Ok(CorePattern::Var(name.name.clone()))
            }
            Pattern::Literal { value, range } => {
                let found = literal_type(value, *range);
                self.unify(expected, &found, *range)?;
                Ok(CorePattern::Literal(value.clone()))
            }
            Pattern::Tuple { items, range } => {
                let item_tys: Vec<Type> = items
                    .iter()
                    .map(|item| self.fresh_var(pattern_range(item)))
                    .collect();
                self.unify(expected, &Type::product(*range, item_tys.clone()), *range)?;
                let items = items
                    .iter()
                    .zip(&item_tys)
                    .map(|(item, ty)| self.check_pattern(item, ty, bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CorePattern::Tuple(items))
            }
            Pattern::Nil(range) => {
                let elem = self.fresh_var(*range);
                self.unify(expected, &Type::list(*range, elem), *range)?;
                Ok(CorePattern::Nil)
            }
            Pattern::Cons { head, tail, range } => {
                let elem = self.fresh_var(pattern_range(head));
                let list = Type::list(*range, elem.clone());
                self.unify(expected, &list, *range)?;
                let head = self.check_pattern(head, &elem, bindings)?;
                let tail = self.check_pattern(tail, &list, bindings)?;
                Ok(CorePattern::Cons {
                    head: Box::new(head),
                    tail: Box::new(tail),
                })
            }
            Pattern::Constructor { ctor, arg, range } => {
                let (variant_ty, arg_tys) = self.instantiate_constructor(ctor)?;
                self.unify(expected, &variant_ty, *range)?;
                let arg_patterns: Vec<&Pattern> = match (arg_tys.len(), arg.as_deref()) {
                    (0, None) => Vec::new(),
                    (1, Some(arg)) => vec![arg],
                    // `C _` matches every argument of a constructor of any arity.
                    (n, Some(Pattern::Wildcard(_))) if n > 1 => {
                        return Ok(CorePattern::Constructor {
                            ctor: ctor.name.clone(),
                            args: vec![CorePattern::Wildcard; n],
                        });
                    }
                    (n, Some(Pattern::Tuple { items, .. })) if n > 1 && items.len() == n => {
                        items.iter().collect()
                    }
                    (expected_arity, arg) => {
                        return Err(TypecheckError::ConstructorArity {
                            name: ctor.name.clone(),
                            expected: expected_arity,
                            found: given_pattern_arity(arg),
                            range: *range,
                        });
                    }
                };
                let args = arg_patterns
                    .into_iter()
                    .zip(&arg_tys)
                    .map(|(arg, ty)| self.check_pattern(arg, ty, bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CorePattern::Constructor {
                    ctor: ctor.name.clone(),
                    args,
                })
            }
            Pattern::As { pattern, name, .. } => {
                let inner = self.check_pattern(pattern, expected, bindings)?;
                bind_name(bindings, name, expected)?;
                Ok(CorePattern::As {
                    pattern: Box::new(inner),
                    name: name.name.clone(),
                })
            }
        }
    }
}

fn bind_name(
    bindings: &mut PatternBindings,
    name: &SpannedName,
    ty: &Type,
) -> Result<(), TypecheckError> {
    if bindings.iter().any(|(bound, _)| *bound == name.name) {
        return Err(TypecheckError::DuplicateBinding {
            name: name.name.clone(),
            range: name.range,
        });
    }
    bindings.push((name.name.clone(), ty.clone()));
    Ok(())
}

fn given_pattern_arity(arg: Option<&Pattern>) -> usize {
    match arg {
        None => 0,
        Some(Pattern::Tuple { items, .. }) => items.len(),
        Some(_) => 1,
    }
}

pub(super) fn literal_type(literal: &Literal, range: Range) -> Type {
    match literal {
        Literal::Unit => Type::unit(range),
        Literal::Bool(_) => Type::bool(range),
        Literal::Int(_) => Type::int(range),
        Literal::String(_) => Type::string(range),
    }
}
