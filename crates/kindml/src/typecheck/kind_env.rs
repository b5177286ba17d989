use super::types::{Kind, TypeVarId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KindEnvError {
    #[error("type variable #{} already has a kind", .0.index())]
    AlreadyBound(TypeVarId),
}

/// Kinds of the type variables introduced during one inference. Extending
/// yields a new environment; the original is left untouched.
#[derive(Debug, Clone, Default)]
pub struct KindEnv {
    kinds: im::HashMap<TypeVarId, Kind>,
}

impl KindEnv {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: TypeVarId) -> Option<&Kind> {
        self.kinds.get(&id)
    }

    /// Missing entries are unconstrained.
    pub fn kind_of(&self, id: TypeVarId) -> Kind {
        self.lookup(id).cloned().unwrap_or(Kind::Universal)
    }

    pub fn extend(&self, id: TypeVarId, kind: Kind) -> Result<KindEnv, KindEnvError> {
        if self.kinds.contains_key(&id) {
            return Err(KindEnvError::AlreadyBound(id));
        }
        Ok(KindEnv {
            kinds: self.kinds.update(id, kind),
        })
    }

    /// Strengthens the kind of a variable after two record kinds were merged.
    pub(crate) fn refine(&mut self, id: TypeVarId, kind: Kind) {
        self.kinds.insert(id, kind);
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeVarId, &Kind)> {
        self.kinds.iter()
    }
}
