use std::collections::HashMap;

use log::debug;

use crate::surface::{SpannedName, TypeDecl};

use super::super::types::{Type, TypeVarId};
use super::super::TypecheckError;
use super::type_expr::TypeVarScope;
use super::TypeChecker;

impl TypeChecker {
    /// Registers one `type ... and ...` group. Variants are declared first so
    /// that constructors and synonyms may refer to any variant of the group;
    /// synonyms may only use synonyms declared before them.
    pub(crate) fn register_type_group(&mut self, group: &[TypeDecl]) -> Result<(), TypecheckError> {
        let mut params_of = Vec::with_capacity(group.len());
        for decl in group {
            let params = match decl {
                TypeDecl::Variant { params, .. } | TypeDecl::Synonym { params, .. } => params,
            };
            params_of.push(self.declare_params(params)?);
        }

        for (decl, (ids, _)) in group.iter().zip(&params_of) {
            if let TypeDecl::Variant { name, .. } = decl {
                self.variants
                    .declare_variant(&name.name, ids.clone(), name.range)?;
            }
        }

        for (decl, (ids, scope)) in group.iter().zip(&params_of) {
            if let TypeDecl::Synonym { name, body, .. } = decl {
                let body = self.translate_type(body, &mut TypeVarScope::Declaration(scope))?;
                self.variants
                    .add_synonym(&name.name, ids.clone(), body, name.range)?;
            }
        }

        for (decl, (_, scope)) in group.iter().zip(&params_of) {
            if let TypeDecl::Variant {
                name, constructors, ..
            } = decl
            {
                for ctor in constructors {
                    let args = ctor
                        .args
                        .iter()
                        .map(|arg| self.translate_type(arg, &mut TypeVarScope::Declaration(scope)))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.variants
                        .add_constructor(&name.name, &ctor.name.name, args, ctor.name.range)?;
                }
            }
        }

        debug!(
            "registered type group: {}",
            group
                .iter()
                .map(|decl| decl.name().name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    fn declare_params(
        &mut self,
        params: &[SpannedName],
    ) -> Result<(Vec<TypeVarId>, HashMap<String, Type>), TypecheckError> {
        let mut ids = Vec::with_capacity(params.len());
        let mut scope = HashMap::new();
        for param in params {
            let id = self.gen.fresh();
            if scope
                .insert(param.name.clone(), Type::var(param.range, id))
                .is_some()
            {
                return Err(TypecheckError::DuplicateBinding {
                    name: format!("'{}", param.name),
                    range: param.range,
                });
            }
            ids.push(id);
        }
        Ok((ids, scope))
    }
}
