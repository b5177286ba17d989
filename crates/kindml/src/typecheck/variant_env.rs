use crate::diagnostics::Range;

use super::types::{Type, TypeVarId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VariantEnvError {
    #[error("at {range}: undefined constructor '{name}'")]
    ConstructorNotFound { name: String, range: Range },
    #[error("at {range}: undefined type '{name}'")]
    TypeNotFound { name: String, range: Range },
    #[error("at {range}: type '{name}' expects {expected} argument(s) but is given {found}")]
    TypeArity {
        name: String,
        expected: usize,
        found: usize,
        range: Range,
    },
    #[error("at {range}: type '{name}' is defined more than once")]
    DuplicateType { name: String, range: Range },
    #[error("at {range}: constructor '{name}' is defined more than once")]
    DuplicateConstructor { name: String, range: Range },
}

impl VariantEnvError {
    pub fn range(&self) -> Range {
        match self {
            VariantEnvError::ConstructorNotFound { range, .. }
            | VariantEnvError::TypeNotFound { range, .. }
            | VariantEnvError::TypeArity { range, .. }
            | VariantEnvError::DuplicateType { range, .. }
            | VariantEnvError::DuplicateConstructor { range, .. } => *range,
        }
    }
}

/// What a constructor belongs to. `args` mention the owning variant's `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorInfo {
    pub variant: String,
    pub params: Vec<TypeVarId>,
    pub args: Vec<Type>,
}

impl ConstructorInfo {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Argument types with the variant parameters replaced by `type_args`.
    pub fn instantiate_args(&self, type_args: &[Type]) -> Vec<Type> {
        self.args
            .iter()
            .map(|arg| {
                self.params
                    .iter()
                    .zip(type_args)
                    .fold(arg.clone(), |ty, (param, replacement)| {
                        ty.substitute_variable(*param, replacement)
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Variant {
        params: Vec<TypeVarId>,
        constructors: Vec<String>,
    },
    Synonym {
        params: Vec<TypeVarId>,
        body: Type,
    },
}

impl TypeDefinition {
    pub fn params(&self) -> &[TypeVarId] {
        match self {
            TypeDefinition::Variant { params, .. } | TypeDefinition::Synonym { params, .. } => {
                params
            }
        }
    }
}

/// Declared variant types, their constructors, and type synonyms.
#[derive(Debug, Clone, Default)]
pub struct VariantEnv {
    definitions: im::HashMap<String, TypeDefinition>,
    constructors: im::HashMap<String, ConstructorInfo>,
}

impl VariantEnv {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup_constructor(
        &self,
        name: &str,
        range: Range,
    ) -> Result<&ConstructorInfo, VariantEnvError> {
        self.constructors
            .get(name)
            .ok_or_else(|| VariantEnvError::ConstructorNotFound {
                name: name.to_string(),
                range,
            })
    }

    /// Constructor names of a variant, in declaration order.
    pub fn lookup_variant_definition(
        &self,
        type_name: &str,
        range: Range,
    ) -> Result<&[String], VariantEnvError> {
        match self.definitions.get(type_name) {
            Some(TypeDefinition::Variant { constructors, .. }) => Ok(constructors),
            _ => Err(VariantEnvError::TypeNotFound {
                name: type_name.to_string(),
                range,
            }),
        }
    }

    pub fn lookup_type(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(type_name)
    }

    pub fn declare_variant(
        &mut self,
        name: &str,
        params: Vec<TypeVarId>,
        range: Range,
    ) -> Result<(), VariantEnvError> {
        self.ensure_type_is_new(name, range)?;
        self.definitions.insert(
            name.to_string(),
            TypeDefinition::Variant {
                params,
                constructors: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn add_constructor(
        &mut self,
        variant: &str,
        name: &str,
        args: Vec<Type>,
        range: Range,
    ) -> Result<(), VariantEnvError> {
        if self.constructors.contains_key(name) {
            return Err(VariantEnvError::DuplicateConstructor {
                name: name.to_string(),
                range,
            });
        }
        let Some(TypeDefinition::Variant {
            params,
            constructors,
        }) = self.definitions.get_mut(variant)
        else {
            return Err(VariantEnvError::TypeNotFound {
                name: variant.to_string(),
                range,
            });
        };
        constructors.push(name.to_string());
        let info = ConstructorInfo {
            variant: variant.to_string(),
            params: params.clone(),
            args,
        };
        self.constructors.insert(name.to_string(), info);
        Ok(())
    }

    pub fn add_synonym(
        &mut self,
        name: &str,
        params: Vec<TypeVarId>,
        body: Type,
        range: Range,
    ) -> Result<(), VariantEnvError> {
        self.ensure_type_is_new(name, range)?;
        self.definitions
            .insert(name.to_string(), TypeDefinition::Synonym { params, body });
        Ok(())
    }

    /// Builds the type named `name` applied to `args`: a variant type, or a
    /// synonym that records its expansion.
    pub fn resolve_type_name(
        &self,
        name: &str,
        args: Vec<Type>,
        range: Range,
    ) -> Result<Type, VariantEnvError> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| VariantEnvError::TypeNotFound {
                name: name.to_string(),
                range,
            })?;
        let params = definition.params();
        if params.len() != args.len() {
            return Err(VariantEnvError::TypeArity {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
                range,
            });
        }
        match definition {
            TypeDefinition::Variant { .. } => Ok(Type::variant(range, name, args)),
            TypeDefinition::Synonym { params, body } => {
                let expanded = params
                    .iter()
                    .zip(&args)
                    .fold(body.clone(), |ty, (param, arg)| {
                        ty.substitute_variable(*param, arg)
                    });
                Ok(Type::new(
                    range,
                    super::types::TypeMain::Synonym {
                        args,
                        name: name.to_string(),
                        body: Box::new(expanded),
                    },
                ))
            }
        }
    }

    /// Installs a predefined variant without the duplicate checks.
    pub(crate) fn insert_builtin_variant(
        &mut self,
        name: &str,
        params: Vec<TypeVarId>,
        constructors: Vec<(&str, Vec<Type>)>,
    ) {
        let names = constructors
            .iter()
            .map(|(ctor, _)| ctor.to_string())
            .collect();
        for (ctor, args) in constructors {
            self.constructors.insert(
                ctor.to_string(),
                ConstructorInfo {
                    variant: name.to_string(),
                    params: params.clone(),
                    args,
                },
            );
        }
        self.definitions.insert(
            name.to_string(),
            TypeDefinition::Variant {
                params,
                constructors: names,
            },
        );
    }

    /// Every type variable id mentioned by a definition, bound or free.
    pub(crate) fn mentioned_variables(&self) -> impl Iterator<Item = TypeVarId> + '_ {
        let params = self
            .definitions
            .values()
            .flat_map(|definition| definition.params().to_vec());
        let in_synonyms = self.definitions.values().flat_map(|definition| {
            match definition {
                TypeDefinition::Synonym { body, .. } => body.mentioned_variables(),
                TypeDefinition::Variant { .. } => Vec::new(),
            }
        });
        let in_ctors = self
            .constructors
            .values()
            .flat_map(|info| info.args.iter().flat_map(Type::mentioned_variables));
        params.chain(in_synonyms).chain(in_ctors)
    }

    fn ensure_type_is_new(&self, name: &str, range: Range) -> Result<(), VariantEnvError> {
        if self.definitions.contains_key(name) || is_builtin_type_name(name) {
            return Err(VariantEnvError::DuplicateType {
                name: name.to_string(),
                range,
            });
        }
        Ok(())
    }
}

pub fn is_builtin_type_name(name: &str) -> bool {
    matches!(name, "int" | "bool" | "string" | "unit" | "list" | "ref")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typecheck::types::{TypeMain, TypeVarGen};

    fn dummy() -> Range {
        Range::dummy("test")
    }

    fn option_env(gen: &mut TypeVarGen) -> VariantEnv {
        let a = gen.fresh();
        let mut env = VariantEnv::empty();
        env.declare_variant("option", vec![a], dummy()).expect("declare");
        env.add_constructor("option", "None", Vec::new(), dummy())
            .expect("None");
        env.add_constructor("option", "Some", vec![Type::var(dummy(), a)], dummy())
            .expect("Some");
        env
    }

    #[test]
    fn constructors_map_back_to_their_variant() {
        let mut gen = TypeVarGen::new();
        let env = option_env(&mut gen);
        let info = env.lookup_constructor("Some", dummy()).expect("Some");
        assert_eq!(info.variant, "option");
        assert_eq!(info.arity(), 1);
        assert_eq!(
            info.instantiate_args(&[Type::int(dummy())]),
            vec![Type::int(dummy())]
        );
        assert_eq!(
            env.lookup_variant_definition("option", dummy()).expect("option"),
            &["None".to_string(), "Some".to_string()]
        );
    }

    #[test]
    fn missing_names_are_reported() {
        let mut gen = TypeVarGen::new();
        let env = option_env(&mut gen);
        assert!(matches!(
            env.lookup_constructor("Nope", dummy()),
            Err(VariantEnvError::ConstructorNotFound { .. })
        ));
        assert!(matches!(
            env.lookup_variant_definition("tree", dummy()),
            Err(VariantEnvError::TypeNotFound { .. })
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut gen = TypeVarGen::new();
        let mut env = option_env(&mut gen);
        assert!(matches!(
            env.declare_variant("option", Vec::new(), dummy()),
            Err(VariantEnvError::DuplicateType { .. })
        ));
        env.declare_variant("other", Vec::new(), dummy())
            .expect("declare");
        assert!(matches!(
            env.add_constructor("other", "Some", Vec::new(), dummy()),
            Err(VariantEnvError::DuplicateConstructor { .. })
        ));
    }

    #[test]
    fn synonyms_expand_with_their_arguments() {
        let mut gen = TypeVarGen::new();
        let a = gen.fresh();
        let mut env = VariantEnv::empty();
        let body = Type::product(dummy(), vec![Type::var(dummy(), a), Type::var(dummy(), a)]);
        env.add_synonym("pair", vec![a], body, dummy())
            .expect("synonym");
        let resolved = env
            .resolve_type_name("pair", vec![Type::int(dummy())], dummy())
            .expect("resolve");
        let TypeMain::Synonym { body, .. } = &resolved.main else {
            panic!("expected synonym");
        };
        assert_eq!(
            **body,
            Type::product(dummy(), vec![Type::int(dummy()), Type::int(dummy())])
        );
        assert!(matches!(
            env.resolve_type_name("pair", Vec::new(), dummy()),
            Err(VariantEnvError::TypeArity { expected: 1, found: 0, .. })
        ));
    }
}
