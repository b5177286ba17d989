use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::diagnostics::Range;

/// Identity of a type variable. Ids come from one [`TypeVarGen`] per checking
/// session and are never reused within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(u32);

impl TypeVarId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct TypeVarGen {
    next: u32,
}

impl TypeVarGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose ids are all greater than every id in `used`.
    pub fn starting_after(used: impl IntoIterator<Item = TypeVarId>) -> Self {
        let next = used.into_iter().map(|id| id.0 + 1).max().unwrap_or(0);
        Self { next }
    }

    pub fn fresh(&mut self) -> TypeVarId {
        let id = TypeVarId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Unit,
    Bool,
    Int,
    String,
}

impl BaseType {
    pub fn name(self) -> &'static str {
        match self {
            BaseType::Unit => "unit",
            BaseType::Bool => "bool",
            BaseType::Int => "int",
            BaseType::String => "string",
        }
    }
}

/// A type together with the range it was written at (or a dummy range).
/// Equality ignores the range.
#[derive(Debug, Clone)]
pub struct Type {
    pub range: Range,
    pub main: TypeMain,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeMain {
    Base(BaseType),
    Func(Box<Type>, Box<Type>),
    List(Box<Type>),
    Ref(Box<Type>),
    Product(Vec<Type>),
    Var(TypeVarId),
    Synonym {
        args: Vec<Type>,
        name: String,
        body: Box<Type>,
    },
    Variant {
        args: Vec<Type>,
        name: String,
    },
    Forall {
        var: TypeVarId,
        kind: Kind,
        body: Box<Type>,
    },
    Record(BTreeMap<String, Type>),
}

/// Constraint on a type variable. A record kind is a lower bound: the type
/// must be a record with at least these fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Kind {
    #[default]
    Universal,
    Record(BTreeMap<String, Type>),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.main == other.main
    }
}

impl Type {
    pub fn new(range: Range, main: TypeMain) -> Self {
        Self { range, main }
    }

    pub fn base(range: Range, base: BaseType) -> Self {
        Self::new(range, TypeMain::Base(base))
    }

    pub fn unit(range: Range) -> Self {
        Self::base(range, BaseType::Unit)
    }

    pub fn bool(range: Range) -> Self {
        Self::base(range, BaseType::Bool)
    }

    pub fn int(range: Range) -> Self {
        Self::base(range, BaseType::Int)
    }

    pub fn string(range: Range) -> Self {
        Self::base(range, BaseType::String)
    }

    pub fn var(range: Range, id: TypeVarId) -> Self {
        Self::new(range, TypeMain::Var(id))
    }

    pub fn func(range: Range, param: Type, result: Type) -> Self {
        Self::new(range, TypeMain::Func(Box::new(param), Box::new(result)))
    }

    pub fn list(range: Range, elem: Type) -> Self {
        Self::new(range, TypeMain::List(Box::new(elem)))
    }

    pub fn reference(range: Range, pointee: Type) -> Self {
        Self::new(range, TypeMain::Ref(Box::new(pointee)))
    }

    pub fn product(range: Range, items: Vec<Type>) -> Self {
        Self::new(range, TypeMain::Product(items))
    }

    pub fn record(range: Range, fields: BTreeMap<String, Type>) -> Self {
        Self::new(range, TypeMain::Record(fields))
    }

    pub fn variant(range: Range, name: impl Into<String>, args: Vec<Type>) -> Self {
        Self::new(
            range,
            TypeMain::Variant {
                args,
                name: name.into(),
            },
        )
    }

    pub fn forall(range: Range, var: TypeVarId, kind: Kind, body: Type) -> Self {
        Self::new(
            range,
            TypeMain::Forall {
                var,
                kind,
                body: Box::new(body),
            },
        )
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn is_base(&self, base: BaseType) -> bool {
        matches!(self.main, TypeMain::Base(b) if b == base)
    }

    /// Follows synonyms down to the first non-synonym type.
    pub fn expand_synonyms(&self) -> &Type {
        let mut current = self;
        while let TypeMain::Synonym { body, .. } = &current.main {
            current = body;
        }
        current
    }

    /// Replaces every free occurrence of `id`. Occurrences bound by an inner
    /// `Forall` over the same id are left alone.
    pub fn substitute_variable(&self, id: TypeVarId, replacement: &Type) -> Type {
        let iter = |ty: &Type| ty.substitute_variable(id, replacement);
        let main = match &self.main {
            TypeMain::Base(_) => return self.clone(),
            TypeMain::Var(var) if *var == id => return replacement.clone(),
            TypeMain::Var(_) => return self.clone(),
            TypeMain::Func(param, result) => {
                TypeMain::Func(Box::new(iter(param)), Box::new(iter(result)))
            }
            TypeMain::List(elem) => TypeMain::List(Box::new(iter(elem))),
            TypeMain::Ref(pointee) => TypeMain::Ref(Box::new(iter(pointee))),
            TypeMain::Product(items) => TypeMain::Product(items.iter().map(iter).collect()),
            TypeMain::Synonym { args, name, body } => TypeMain::Synonym {
                args: args.iter().map(iter).collect(),
                name: name.clone(),
                body: Box::new(iter(body)),
            },
            TypeMain::Variant { args, name } => TypeMain::Variant {
                args: args.iter().map(iter).collect(),
                name: name.clone(),
            },
            TypeMain::Forall { var, .. } if *var == id => return self.clone(),
            TypeMain::Forall { var, kind, body } => TypeMain::Forall {
                var: *var,
                kind: kind.substitute_variable(id, replacement),
                body: Box::new(iter(body)),
            },
            TypeMain::Record(fields) => TypeMain::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), iter(ty)))
                    .collect(),
            ),
        };
        Type::new(self.range, main)
    }

    /// Replaces every range with the canonical erased range.
    pub fn erase_range(&self) -> Type {
        let main = match &self.main {
            TypeMain::Base(base) => TypeMain::Base(*base),
            TypeMain::Var(var) => TypeMain::Var(*var),
            TypeMain::Func(param, result) => TypeMain::Func(
                Box::new(param.erase_range()),
                Box::new(result.erase_range()),
            ),
            TypeMain::List(elem) => TypeMain::List(Box::new(elem.erase_range())),
            TypeMain::Ref(pointee) => TypeMain::Ref(Box::new(pointee.erase_range())),
            TypeMain::Product(items) => {
                TypeMain::Product(items.iter().map(Type::erase_range).collect())
            }
            TypeMain::Synonym { args, name, body } => TypeMain::Synonym {
                args: args.iter().map(Type::erase_range).collect(),
                name: name.clone(),
                body: Box::new(body.erase_range()),
            },
            TypeMain::Variant { args, name } => TypeMain::Variant {
                args: args.iter().map(Type::erase_range).collect(),
                name: name.clone(),
            },
            TypeMain::Forall { var, kind, body } => TypeMain::Forall {
                var: *var,
                kind: kind.erase_range(),
                body: Box::new(body.erase_range()),
            },
            TypeMain::Record(fields) => TypeMain::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.erase_range()))
                    .collect(),
            ),
        };
        Type::new(Range::erased(), main)
    }

    pub fn free_type_variables(&self) -> BTreeSet<TypeVarId> {
        let mut out = BTreeSet::new();
        self.collect_free_variables(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free_variables(&self, bound: &mut Vec<TypeVarId>, out: &mut BTreeSet<TypeVarId>) {
        match &self.main {
            TypeMain::Base(_) => {}
            TypeMain::Var(var) => {
                if !bound.contains(var) {
                    out.insert(*var);
                }
            }
            TypeMain::Func(param, result) => {
                param.collect_free_variables(bound, out);
                result.collect_free_variables(bound, out);
            }
            TypeMain::List(inner) | TypeMain::Ref(inner) => {
                inner.collect_free_variables(bound, out)
            }
            TypeMain::Product(items)
            | TypeMain::Variant { args: items, .. }
            | TypeMain::Synonym { args: items, .. } => {
                // A synonym's body only mentions variables that occur in its arguments.
                for item in items {
                    item.collect_free_variables(bound, out);
                }
            }
            TypeMain::Forall { var, kind, body } => {
                bound.push(*var);
                kind.collect_free_variables(bound, out);
                body.collect_free_variables(bound, out);
                bound.pop();
            }
            TypeMain::Record(fields) => {
                for ty in fields.values() {
                    ty.collect_free_variables(bound, out);
                }
            }
        }
    }

    pub fn contains_var(&self, id: TypeVarId) -> bool {
        self.free_type_variables().contains(&id)
    }

    /// Every variable id occurring anywhere in the type, binders included.
    pub fn mentioned_variables(&self) -> Vec<TypeVarId> {
        let mut out = Vec::new();
        self.collect_mentioned(&mut out);
        out
    }

    fn collect_mentioned(&self, out: &mut Vec<TypeVarId>) {
        match &self.main {
            TypeMain::Base(_) => {}
            TypeMain::Var(var) => out.push(*var),
            TypeMain::Func(param, result) => {
                param.collect_mentioned(out);
                result.collect_mentioned(out);
            }
            TypeMain::List(inner) | TypeMain::Ref(inner) => inner.collect_mentioned(out),
            TypeMain::Product(items) | TypeMain::Variant { args: items, .. } => {
                items.iter().for_each(|item| item.collect_mentioned(out))
            }
            TypeMain::Synonym { args, body, .. } => {
                args.iter().for_each(|arg| arg.collect_mentioned(out));
                body.collect_mentioned(out);
            }
            TypeMain::Forall { var, kind, body } => {
                out.push(*var);
                if let Kind::Record(fields) = kind {
                    fields.values().for_each(|ty| ty.collect_mentioned(out));
                }
                body.collect_mentioned(out);
            }
            TypeMain::Record(fields) => fields.values().for_each(|ty| ty.collect_mentioned(out)),
        }
    }
}

impl Kind {
    pub fn substitute_variable(&self, id: TypeVarId, replacement: &Type) -> Kind {
        match self {
            Kind::Universal => Kind::Universal,
            Kind::Record(fields) => Kind::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.substitute_variable(id, replacement)))
                    .collect(),
            ),
        }
    }

    pub fn erase_range(&self) -> Kind {
        match self {
            Kind::Universal => Kind::Universal,
            Kind::Record(fields) => Kind::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.erase_range()))
                    .collect(),
            ),
        }
    }

    pub fn free_type_variables(&self) -> BTreeSet<TypeVarId> {
        let mut out = BTreeSet::new();
        self.collect_free_variables(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free_variables(&self, bound: &mut Vec<TypeVarId>, out: &mut BTreeSet<TypeVarId>) {
        if let Kind::Record(fields) = self {
            for ty in fields.values() {
                ty.collect_free_variables(bound, out);
            }
        }
    }
}

pub fn erase_range_of_type(ty: &Type) -> Type {
    ty.erase_range()
}

pub fn erase_range_of_kind(kind: &Kind) -> Kind {
    kind.erase_range()
}

/// Prints types with stable `'a`, `'b`, ... names. One printer shared across
/// several types keeps variable names consistent between them.
#[derive(Debug, Default)]
pub struct TypePrinter {
    names: HashMap<TypeVarId, String>,
}

impl TypePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    fn var_name(&mut self, id: TypeVarId) -> String {
        let next = self.names.len();
        self.names
            .entry(id)
            .or_insert_with(|| {
                let letter = (b'a' + (next % 26) as u8) as char;
                if next < 26 {
                    format!("'{letter}")
                } else {
                    format!("'{letter}{}", next / 26)
                }
            })
            .clone()
    }

    pub fn print_type(&mut self, ty: &Type) -> String {
        self.print_arrow(ty)
    }

    pub fn print_kind(&mut self, kind: &Kind) -> String {
        match kind {
            Kind::Universal => "(universal)".to_string(),
            Kind::Record(fields) => self.print_fields(fields),
        }
    }

    fn print_fields(&mut self, fields: &BTreeMap<String, Type>) -> String {
        let items: Vec<String> = fields
            .iter()
            .map(|(name, ty)| format!("{name} : {}", self.print_arrow(ty)))
            .collect();
        format!("{{{}}}", items.join(", "))
    }

    fn print_arrow(&mut self, ty: &Type) -> String {
        match &ty.main {
            TypeMain::Func(param, result) => {
                let param = self.print_product(param);
                let result = self.print_arrow(result);
                format!("{param} -> {result}")
            }
            TypeMain::Forall { var, kind, body } => {
                let name = self.var_name(*var);
                let binder = match kind {
                    Kind::Universal => name,
                    Kind::Record(fields) => format!("({name} :: {})", self.print_fields(fields)),
                };
                format!("forall {binder}. {}", self.print_arrow(body))
            }
            _ => self.print_product(ty),
        }
    }

    fn print_product(&mut self, ty: &Type) -> String {
        match &ty.main {
            TypeMain::Product(items) => items
                .iter()
                .map(|item| self.print_postfix(item))
                .collect::<Vec<_>>()
                .join(" * "),
            _ => self.print_postfix(ty),
        }
    }

    fn print_postfix(&mut self, ty: &Type) -> String {
        match &ty.main {
            TypeMain::List(elem) => format!("{} list", self.print_postfix(elem)),
            TypeMain::Ref(pointee) => format!("{} ref", self.print_postfix(pointee)),
            TypeMain::Variant { args, name } | TypeMain::Synonym { args, name, .. } => {
                match args.len() {
                    0 => name.clone(),
                    1 => format!("{} {name}", self.print_postfix(&args[0])),
                    _ => {
                        let args: Vec<String> =
                            args.iter().map(|arg| self.print_arrow(arg)).collect();
                        format!("({}) {name}", args.join(", "))
                    }
                }
            }
            _ => self.print_atom(ty),
        }
    }

    fn print_atom(&mut self, ty: &Type) -> String {
        match &ty.main {
            TypeMain::Base(base) => base.name().to_string(),
            TypeMain::Var(id) => self.var_name(*id),
            TypeMain::Record(fields) => self.print_fields(fields),
            _ => format!("({})", self.print_arrow(ty)),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&TypePrinter::new().print_type(self))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&TypePrinter::new().print_kind(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Position;

    fn source_range() -> Range {
        Range::new(
            Position { line: 3, column: 1 },
            Position { line: 3, column: 4 },
        )
    }

    fn dummy() -> Range {
        Range::dummy("test")
    }

    #[test]
    fn substitution_replaces_free_occurrences_only() {
        let mut gen = TypeVarGen::new();
        let a = gen.fresh();
        let inner = Type::forall(
            dummy(),
            a,
            Kind::Universal,
            Type::func(dummy(), Type::var(dummy(), a), Type::var(dummy(), a)),
        );
        let ty = Type::product(dummy(), vec![Type::var(dummy(), a), inner.clone()]);
        let replaced = ty.substitute_variable(a, &Type::int(dummy()));
        assert_eq!(
            replaced,
            Type::product(dummy(), vec![Type::int(dummy()), inner])
        );
    }

    #[test]
    fn substitution_recurses_into_records_variants_and_kinds() {
        let mut gen = TypeVarGen::new();
        let a = gen.fresh();
        let b = gen.fresh();
        let mut fields = BTreeMap::new();
        fields.insert("x".to_string(), Type::var(dummy(), a));
        let kinded = Type::forall(
            dummy(),
            b,
            Kind::Record(fields.clone()),
            Type::variant(dummy(), "option", vec![Type::var(dummy(), a)]),
        );
        let replaced = kinded.substitute_variable(a, &Type::string(dummy()));
        let TypeMain::Forall { kind, body, .. } = replaced.main else {
            panic!("expected forall");
        };
        let Kind::Record(fields) = kind else {
            panic!("expected record kind");
        };
        assert_eq!(fields["x"], Type::string(dummy()));
        assert_eq!(
            *body,
            Type::variant(dummy(), "option", vec![Type::string(dummy())])
        );
    }

    #[test]
    fn equality_ignores_ranges_and_erase_normalises_them() {
        let left = Type::list(source_range(), Type::int(source_range()));
        let right = Type::list(dummy(), Type::int(dummy()));
        assert_eq!(left, right);
        let erased = left.erase_range();
        assert_eq!(erased.range, Range::erased());
        let TypeMain::List(elem) = &erased.main else {
            panic!("expected list");
        };
        assert_eq!(elem.range, Range::erased());
    }

    #[test]
    fn free_variables_skip_bound_ones() {
        let mut gen = TypeVarGen::new();
        let a = gen.fresh();
        let b = gen.fresh();
        let ty = Type::forall(
            dummy(),
            a,
            Kind::Universal,
            Type::func(dummy(), Type::var(dummy(), a), Type::var(dummy(), b)),
        );
        assert_eq!(ty.free_type_variables().into_iter().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn printer_names_variables_consistently() {
        let mut gen = TypeVarGen::new();
        let a = gen.fresh();
        let b = gen.fresh();
        let ty = Type::func(
            dummy(),
            Type::list(dummy(), Type::var(dummy(), a)),
            Type::product(dummy(), vec![Type::var(dummy(), b), Type::var(dummy(), a)]),
        );
        assert_eq!(ty.to_string(), "'a list -> 'b * 'a");
        let nested = Type::func(
            dummy(),
            Type::func(dummy(), Type::int(dummy()), Type::bool(dummy())),
            Type::reference(dummy(), Type::string(dummy())),
        );
        assert_eq!(nested.to_string(), "(int -> bool) -> string ref");
    }
}
