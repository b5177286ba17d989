use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::diagnostics::Range;

use super::kind_env::KindEnv;
use super::types::{Kind, Type, TypeMain, TypePrinter, TypeVarId};

/// Why two types could not be made equal.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Mismatch,
    Occurs { var: TypeVarId, ty: Type },
    Arity { expected: usize, found: usize },
    MissingField(String),
    NotARecord { required: Vec<String> },
    KindMismatch,
    EscapingQuantifier(TypeVarId),
}

/// A unification failure. `expected` and `found` are the two types handed
/// to the unifier, with the substitution applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", self.describe())]
pub struct ContradictionError {
    pub reason: Reason,
    pub expected: Type,
    pub found: Type,
    /// Record kinds of the variables mentioned by `expected` and `found`.
    pub kinds: BTreeMap<TypeVarId, Kind>,
}

impl ContradictionError {
    pub fn describe(&self) -> String {
        let mut printer = TypePrinter::new();
        let found = printer.print_type(&self.found);
        let expected = printer.print_type(&self.expected);
        let mut message = format!("this expression has type {found} but is expected of type {expected}");
        if !self.kinds.is_empty() {
            let constraints: Vec<String> = self
                .kinds
                .iter()
                .map(|(var, kind)| {
                    let var = printer.print_type(&Type::var(Range::erased(), *var));
                    format!("{var} :: {}", printer.print_kind(kind))
                })
                .collect();
            message.push_str(&format!(" where {}", constraints.join(", ")));
        }
        let detail = match &self.reason {
            Reason::Mismatch => None,
            Reason::Occurs { var, ty } => {
                let var = printer.print_type(&Type::var(Range::erased(), *var));
                Some(format!(
                    "the type variable {var} occurs inside {}",
                    printer.print_type(ty)
                ))
            }
            Reason::Arity { expected, found } => Some(format!(
                "type arity mismatch: expected {expected} component(s) but found {found}"
            )),
            Reason::MissingField(field) => Some(format!("missing field '{field}'")),
            Reason::NotARecord { required } => Some(format!(
                "a record with field(s) {} is required",
                required.join(", ")
            )),
            Reason::KindMismatch => Some("the quantified kinds differ".to_string()),
            Reason::EscapingQuantifier(var) => Some(format!(
                "the quantified variable {} would escape its scope",
                printer.print_type(&Type::var(Range::erased(), *var))
            )),
        };
        if let Some(detail) = detail {
            message.push_str(&format!(" ({detail})"));
        }
        message
    }

    pub fn range(&self) -> Range {
        if self.found.range.is_invalid() {
            self.expected.range
        } else {
            self.found.range
        }
    }
}

/// Inner failure carrying only the reason; the public entry points attach
/// the outermost pair of types.
type UnifyResult = Result<(), Reason>;

/// Mapping from type variables to types, grown by unification.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: im::HashMap<TypeVarId, Type>,
    trace: bool,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(trace: bool) -> Self {
        Self {
            map: im::HashMap::new(),
            trace,
        }
    }

    pub fn lookup(&self, id: TypeVarId) -> Option<&Type> {
        self.map.get(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Resolves every bound variable in `ty`, transitively. The result never
    /// mentions a variable bound by this substitution, so applying twice is the
    /// same as applying once.
    pub fn apply(&self, ty: &Type) -> Type {
        self.apply_under(ty, &mut Vec::new())
    }

    pub fn apply_kind(&self, kind: &Kind) -> Kind {
        match kind {
            Kind::Universal => Kind::Universal,
            Kind::Record(fields) => Kind::Record(self.apply_fields(fields, &mut Vec::new())),
        }
    }

    fn apply_fields(
        &self,
        fields: &BTreeMap<String, Type>,
        bound: &mut Vec<TypeVarId>,
    ) -> BTreeMap<String, Type> {
        fields
            .iter()
            .map(|(name, ty)| (name.clone(), self.apply_under(ty, bound)))
            .collect()
    }

    fn apply_under(&self, ty: &Type, bound: &mut Vec<TypeVarId>) -> Type {
        let main = match &ty.main {
            TypeMain::Base(_) => return ty.clone(),
            TypeMain::Var(var) => {
                if bound.contains(var) {
                    return ty.clone();
                }
                return match self.map.get(var) {
                    Some(target) => self.apply_under(target, bound),
                    None => ty.clone(),
                };
            }
            TypeMain::Func(param, result) => TypeMain::Func(
                Box::new(self.apply_under(param, bound)),
                Box::new(self.apply_under(result, bound)),
            ),
            TypeMain::List(elem) => TypeMain::List(Box::new(self.apply_under(elem, bound))),
            TypeMain::Ref(pointee) => TypeMain::Ref(Box::new(self.apply_under(pointee, bound))),
            TypeMain::Product(items) => TypeMain::Product(
                items.iter().map(|item| self.apply_under(item, bound)).collect(),
            ),
            TypeMain::Synonym { args, name, body } => TypeMain::Synonym {
                args: args.iter().map(|arg| self.apply_under(arg, bound)).collect(),
                name: name.clone(),
                body: Box::new(self.apply_under(body, bound)),
            },
            TypeMain::Variant { args, name } => TypeMain::Variant {
                args: args.iter().map(|arg| self.apply_under(arg, bound)).collect(),
                name: name.clone(),
            },
            TypeMain::Forall { var, kind, body } => {
                bound.push(*var);
                let kind = match kind {
                    Kind::Universal => Kind::Universal,
                    Kind::Record(fields) => Kind::Record(self.apply_fields(fields, bound)),
                };
                let body = self.apply_under(body, bound);
                bound.pop();
                TypeMain::Forall {
                    var: *var,
                    kind,
                    body: Box::new(body),
                }
            }
            TypeMain::Record(fields) => TypeMain::Record(self.apply_fields(fields, bound)),
        };
        Type::new(ty.range, main)
    }

    /// Makes `expected` and `found` equal, extending the substitution and
    /// strengthening kinds as needed. On failure neither the substitution nor
    /// `kinds` is changed.
    pub fn unify(
        &mut self,
        expected: &Type,
        found: &Type,
        kinds: &mut KindEnv,
    ) -> Result<(), ContradictionError> {
        let saved_map = self.map.clone();
        let saved_kinds = kinds.clone();
        match self.unify_inner(expected, found, kinds) {
            Ok(()) => Ok(()),
            Err(reason) => {
                self.map = saved_map;
                *kinds = saved_kinds;
                let expected = self.apply(expected);
                let found = self.apply(found);
                Err(ContradictionError {
                    reason,
                    kinds: self.record_kinds_of(&[&expected, &found], kinds),
                    expected,
                    found,
                })
            }
        }
    }

    /// Merges two kinds into the weakest kind that implies both. Record kinds
    /// are lower bounds, so the merge is the union of their fields and shared
    /// fields must unify.
    pub fn unify_kinds(
        &mut self,
        left: &Kind,
        right: &Kind,
        kinds: &mut KindEnv,
    ) -> Result<Kind, ContradictionError> {
        let saved_map = self.map.clone();
        let saved_kinds = kinds.clone();
        match self.merge_kinds(left, right, kinds) {
            Ok(kind) => Ok(self.apply_kind(&kind)),
            Err(reason) => {
                self.map = saved_map;
                *kinds = saved_kinds;
                let (expected, found) = kind_witnesses(left, right);
                let expected = self.apply(&expected);
                let found = self.apply(&found);
                Err(ContradictionError {
                    reason,
                    kinds: self.record_kinds_of(&[&expected, &found], kinds),
                    expected,
                    found,
                })
            }
        }
    }

    fn unify_inner(&mut self, expected: &Type, found: &Type, kinds: &mut KindEnv) -> UnifyResult {
        let expected = self.apply(expected);
        let found = self.apply(found);
        let expected = expected.expand_synonyms();
        let found = found.expand_synonyms();
        if self.trace {
            trace!("unify {expected} ~ {found}");
        }

        match (&expected.main, &found.main) {
            (TypeMain::Var(left), TypeMain::Var(right)) if left == right => Ok(()),
            (TypeMain::Var(var), _) => self.bind(*var, found, kinds),
            (_, TypeMain::Var(var)) => self.bind(*var, expected, kinds),
            (TypeMain::Base(left), TypeMain::Base(right)) if left == right => Ok(()),
            (TypeMain::Func(p1, r1), TypeMain::Func(p2, r2)) => {
                self.unify_inner(p1, p2, kinds)?;
                self.unify_inner(r1, r2, kinds)
            }
            (TypeMain::List(left), TypeMain::List(right))
            | (TypeMain::Ref(left), TypeMain::Ref(right)) => self.unify_inner(left, right, kinds),
            (TypeMain::Product(left), TypeMain::Product(right)) => {
                self.unify_all(left, right, kinds)
            }
            (
                TypeMain::Variant {
                    args: left,
                    name: left_name,
                },
                TypeMain::Variant {
                    args: right,
                    name: right_name,
                },
            ) if left_name == right_name => self.unify_all(left, right, kinds),
            (TypeMain::Record(left), TypeMain::Record(right)) => {
                if let Some(missing) = left.keys().find(|name| !right.contains_key(*name)) {
                    return Err(Reason::MissingField(missing.clone()));
                }
                if let Some(extra) = right.keys().find(|name| !left.contains_key(*name)) {
                    return Err(Reason::MissingField(extra.clone()));
                }
                for (name, left_ty) in left {
                    self.unify_inner(left_ty, &right[name], kinds)?;
                }
                Ok(())
            }
            (
                TypeMain::Forall {
                    var: v1,
                    kind: k1,
                    body: b1,
                },
                TypeMain::Forall {
                    var: v2,
                    kind: k2,
                    body: b2,
                },
            ) => {
                let outer: BTreeSet<TypeVarId> = expected
                    .free_type_variables()
                    .union(&found.free_type_variables())
                    .copied()
                    .collect();
                let renamed = Type::var(Range::erased(), *v1);
                let k2 = k2.substitute_variable(*v2, &renamed);
                let b2 = b2.substitute_variable(*v2, &renamed);
                self.unify_kinds_exactly(k1, &k2, kinds)?;
                self.unify_inner(b1, &b2, kinds)?;
                // The binder may neither be solved nor flow into a variable
                // that lives outside both quantifiers.
                if self.map.contains_key(v1)
                    || outer.iter().any(|var| self.reaches(*var, *v1, kinds))
                {
                    return Err(Reason::EscapingQuantifier(*v1));
                }
                Ok(())
            }
            _ => Err(Reason::Mismatch),
        }
    }

    fn unify_all(&mut self, left: &[Type], right: &[Type], kinds: &mut KindEnv) -> UnifyResult {
        if left.len() != right.len() {
            return Err(Reason::Arity {
                expected: left.len(),
                found: right.len(),
            });
        }
        for (left, right) in left.iter().zip(right) {
            self.unify_inner(left, right, kinds)?;
        }
        Ok(())
    }

    fn record_kinds_of(&self, types: &[&Type], kinds: &KindEnv) -> BTreeMap<TypeVarId, Kind> {
        types
            .iter()
            .flat_map(|ty| ty.free_type_variables())
            .filter_map(|var| match self.apply_kind(&kinds.kind_of(var)) {
                Kind::Record(fields) => Some((var, Kind::Record(fields))),
                Kind::Universal => None,
            })
            .collect()
    }

    /// Whether `binder` occurs in what `var` now stands for, or in its kind.
    fn reaches(&self, var: TypeVarId, binder: TypeVarId, kinds: &KindEnv) -> bool {
        self.apply(&Type::var(Range::erased(), var)).contains_var(binder)
            || self
                .apply_kind(&kinds.kind_of(var))
                .free_type_variables()
                .contains(&binder)
    }

    /// Binds `var` (already known to be unbound) to `target` (already applied).
    fn bind(&mut self, var: TypeVarId, target: &Type, kinds: &mut KindEnv) -> UnifyResult {
        if let TypeMain::Var(other) = target.main {
            let merged = self.merge_kinds(&kinds.kind_of(var), &kinds.kind_of(other), kinds)?;
            self.map.insert(var, target.clone());
            if let Kind::Record(fields) = self.apply_kind(&merged) {
                // A record kind mentioning its own variable would describe an infinite record.
                let shape = Type::record(target.range, fields);
                if shape.contains_var(other) {
                    return Err(Reason::Occurs { var: other, ty: shape });
                }
                kinds.refine(other, merged);
            }
            return Ok(());
        }

        if target.contains_var(var) {
            return Err(Reason::Occurs {
                var,
                ty: target.clone(),
            });
        }
        self.map.insert(var, target.clone());
        let kind = kinds.kind_of(var);
        self.satisfy_kind(&kind, target, kinds)
    }

    /// Checks that `ty` meets the lower bound `kind`.
    fn satisfy_kind(&mut self, kind: &Kind, ty: &Type, kinds: &mut KindEnv) -> UnifyResult {
        let Kind::Record(required) = kind else {
            return Ok(());
        };
        let ty = self.apply(ty);
        match &ty.expand_synonyms().main {
            TypeMain::Record(fields) => {
                for (name, required_ty) in required {
                    let field_ty = fields
                        .get(name)
                        .ok_or_else(|| Reason::MissingField(name.clone()))?;
                    self.unify_inner(required_ty, field_ty, kinds)?;
                }
                Ok(())
            }
            TypeMain::Var(var) => {
                let merged = self.merge_kinds(kind, &kinds.kind_of(*var), kinds)?;
                kinds.refine(*var, merged);
                Ok(())
            }
            _ => Err(Reason::NotARecord {
                required: required.keys().cloned().collect(),
            }),
        }
    }

    fn merge_kinds(&mut self, left: &Kind, right: &Kind, kinds: &mut KindEnv) -> Result<Kind, Reason> {
        match (left, right) {
            (Kind::Universal, other) | (other, Kind::Universal) => Ok(other.clone()),
            (Kind::Record(left), Kind::Record(right)) => {
                let mut merged = left.clone();
                for (name, right_ty) in right {
                    match left.get(name) {
                        Some(left_ty) => self.unify_inner(left_ty, right_ty, kinds)?,
                        None => {
                            merged.insert(name.clone(), right_ty.clone());
                        }
                    }
                }
                Ok(Kind::Record(merged))
            }
        }
    }

    /// Quantifier kinds must agree exactly, not just be compatible.
    fn unify_kinds_exactly(&mut self, left: &Kind, right: &Kind, kinds: &mut KindEnv) -> UnifyResult {
        match (left, right) {
            (Kind::Universal, Kind::Universal) => Ok(()),
            (Kind::Record(left), Kind::Record(right))
                if left.keys().eq(right.keys()) =>
            {
                for (name, left_ty) in left {
                    self.unify_inner(left_ty, &right[name], kinds)?;
                }
                Ok(())
            }
            _ => Err(Reason::KindMismatch),
        }
    }
}

fn kind_witnesses(left: &Kind, right: &Kind) -> (Type, Type) {
    let as_record = |kind: &Kind| match kind {
        Kind::Universal => Type::record(Range::erased(), BTreeMap::new()),
        Kind::Record(fields) => Type::record(Range::erased(), fields.clone()),
    };
    (as_record(left), as_record(right))
}
