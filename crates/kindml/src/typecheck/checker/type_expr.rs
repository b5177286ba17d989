use std::collections::{BTreeMap, HashMap};

use crate::surface::{SpannedName, TypeExpr};

use super::super::types::Type;
use super::super::variant_env::VariantEnvError;
use super::super::TypecheckError;
use super::TypeChecker;

/// How `'a` names inside a type expression are resolved.
pub(super) enum TypeVarScope<'a> {
    /// Annotations: unknown names become fresh variables, shared within the
    /// annotation.
    Annotation(&'a mut HashMap<String, Type>),
    /// Declarations: only the declared parameters may appear.
    Declaration(&'a HashMap<String, Type>),
}

impl TypeChecker {
    pub(super) fn translate_type(
        &mut self,
        ty: &TypeExpr,
        scope: &mut TypeVarScope<'_>,
    ) -> Result<Type, TypecheckError> {
        match ty {
            TypeExpr::Var(name) => self.translate_type_var(name, scope),
            TypeExpr::Name { args, name, range } => {
                let args = args
                    .iter()
                    .map(|arg| self.translate_type(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                let builtin = match (name.name.as_str(), args.len()) {
                    ("int", 0) => Some(Type::int(*range)),
                    ("bool", 0) => Some(Type::bool(*range)),
                    ("string", 0) => Some(Type::string(*range)),
                    ("unit", 0) => Some(Type::unit(*range)),
                    ("list", 1) => Some(Type::list(*range, args[0].clone())),
                    ("ref", 1) => Some(Type::reference(*range, args[0].clone())),
                    ("int" | "bool" | "string" | "unit", found) => {
                        return Err(arity_error(name, 0, found));
                    }
                    ("list" | "ref", found) => return Err(arity_error(name, 1, found)),
                    _ => None,
                };
                match builtin {
                    Some(ty) => Ok(ty),
                    None => Ok(self
                        .variants
                        .resolve_type_name(&name.name, args, *range)?),
                }
            }
            TypeExpr::Func {
                param,
                result,
                range,
            } => {
                let param = self.translate_type(param, scope)?;
                let result = self.translate_type(result, scope)?;
                Ok(Type::func(*range, param, result))
            }
            TypeExpr::Product { items, range } => {
                let items = items
                    .iter()
                    .map(|item| self.translate_type(item, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::product(*range, items))
            }
            TypeExpr::Record { fields, range } => {
                let mut translated = BTreeMap::new();
                for (name, field_ty) in fields {
                    let field_ty = self.translate_type(field_ty, scope)?;
                    if translated.insert(name.name.clone(), field_ty).is_some() {
                        return Err(TypecheckError::DuplicateField {
                            name: name.name.clone(),
                            range: name.range,
                        });
                    }
                }
                Ok(Type::record(*range, translated))
            }
        }
    }

    fn translate_type_var(
        &mut self,
        name: &SpannedName,
        scope: &mut TypeVarScope<'_>,
    ) -> Result<Type, TypecheckError> {
        match scope {
            TypeVarScope::Annotation(vars) => {
                if let Some(ty) = vars.get(&name.name) {
                    return Ok(ty.clone().with_range(name.range));
                }
                let fresh = self.fresh_var(name.range);
                vars.insert(name.name.clone(), fresh.clone());
                Ok(fresh)
            }
            TypeVarScope::Declaration(params) => params
                .get(&name.name)
                .map(|ty| ty.clone().with_range(name.range))
                .ok_or_else(|| TypecheckError::UnboundTypeParameter {
                    name: name.name.clone(),
                    range: name.range,
                }),
        }
    }
}

fn arity_error(name: &SpannedName, expected: usize, found: usize) -> TypecheckError {
    TypecheckError::VariantEnv(VariantEnvError::TypeArity {
        name: name.name.clone(),
        expected,
        found,
        range: name.range,
    })
}
