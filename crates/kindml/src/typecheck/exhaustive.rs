//! Match exhaustiveness and redundancy via the usefulness of pattern vectors.
//!
//! A row of patterns is useful with respect to a matrix when some value is
//! matched by the row and by no row of the matrix. A match is exhaustive when
//! the all-wildcard row is useless after every arm; an arm is unused when it
//! is useless with respect to the arms before it.

use crate::diagnostics::Range;
use crate::elaborated::CorePattern;
use crate::surface::Literal;

use super::variant_env::VariantEnv;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ctor {
    Bool(bool),
    Unit,
    Nil,
    Cons,
    Tuple(usize),
    Variant(String),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone)]
enum Pat {
    Wild,
    Ctor(Ctor, Vec<Pat>),
}

#[derive(Debug, Default)]
pub(crate) struct MatchReport {
    /// A value no arm matches, printed as a pattern.
    pub(crate) missing: Option<String>,
    /// Indices of arms that can never be selected.
    pub(crate) unused_arms: Vec<usize>,
}

pub(crate) fn check_match(variants: &VariantEnv, patterns: &[&CorePattern]) -> MatchReport {
    let analysis = Analysis { variants };
    let rows: Vec<Vec<Pat>> = patterns.iter().map(|p| vec![lower(p)]).collect();

    let mut report = MatchReport::default();
    for (index, row) in rows.iter().enumerate() {
        if !analysis.is_useful(&rows[..index], row) {
            report.unused_arms.push(index);
        }
    }
    report.missing = analysis
        .missing(&rows, 1)
        .and_then(|witness| witness.into_iter().next())
        .map(|pat| print_pat(&pat, false));
    report
}

fn lower(pattern: &CorePattern) -> Pat {
    match pattern {
        CorePattern::Wildcard | CorePattern::Var(_) => Pat::Wild,
        CorePattern::As { pattern, .. } => lower(pattern),
        CorePattern::Literal(literal) => {
            let ctor = match literal {
                Literal::Unit => Ctor::Unit,
                Literal::Bool(value) => Ctor::Bool(*value),
                Literal::Int(value) => Ctor::Int(*value),
                Literal::String(value) => Ctor::Str(value.clone()),
            };
            Pat::Ctor(ctor, Vec::new())
        }
        CorePattern::Tuple(items) => {
            Pat::Ctor(Ctor::Tuple(items.len()), items.iter().map(lower).collect())
        }
        CorePattern::Nil => Pat::Ctor(Ctor::Nil, Vec::new()),
        CorePattern::Cons { head, tail } => Pat::Ctor(Ctor::Cons, vec![lower(head), lower(tail)]),
        CorePattern::Constructor { ctor, args } => Pat::Ctor(
            Ctor::Variant(ctor.clone()),
            args.iter().map(lower).collect(),
        ),
    }
}

struct Analysis<'a> {
    variants: &'a VariantEnv,
}

impl Analysis<'_> {
    /// All constructors of the type `ctor` belongs to, with arities, or `None`
    /// when that set is infinite or unknown.
    fn signature(&self, ctor: &Ctor) -> Option<Vec<(Ctor, usize)>> {
        match ctor {
            Ctor::Bool(_) => Some(vec![(Ctor::Bool(false), 0), (Ctor::Bool(true), 0)]),
            Ctor::Unit => Some(vec![(Ctor::Unit, 0)]),
            Ctor::Nil | Ctor::Cons => Some(vec![(Ctor::Nil, 0), (Ctor::Cons, 2)]),
            Ctor::Tuple(arity) => Some(vec![(Ctor::Tuple(*arity), *arity)]),
            Ctor::Variant(name) => {
                let range = Range::dummy("exhaustiveness");
                let info = self.variants.lookup_constructor(name, range).ok()?;
                let names = self
                    .variants
                    .lookup_variant_definition(&info.variant, range)
                    .ok()?;
                names
                    .iter()
                    .map(|name| {
                        let arity = self.variants.lookup_constructor(name, range).ok()?.arity();
                        Some((Ctor::Variant(name.clone()), arity))
                    })
                    .collect()
            }
            Ctor::Int(_) | Ctor::Str(_) => None,
        }
    }

    fn head_ctors(rows: &[Vec<Pat>]) -> Vec<Ctor> {
        let mut heads: Vec<Ctor> = Vec::new();
        for row in rows {
            if let Some(Pat::Ctor(ctor, _)) = row.first() {
                if !heads.contains(ctor) {
                    heads.push(ctor.clone());
                }
            }
        }
        heads
    }

    /// The full signature, if every constructor of it heads some row.
    fn complete_signature(&self, heads: &[Ctor]) -> Option<Vec<(Ctor, usize)>> {
        let signature = self.signature(heads.first()?)?;
        signature
            .iter()
            .all(|(ctor, _)| heads.contains(ctor))
            .then_some(signature)
    }

    fn is_useful(&self, rows: &[Vec<Pat>], row: &[Pat]) -> bool {
        let Some((first, rest)) = row.split_first() else {
            return rows.is_empty();
        };
        match first {
            Pat::Ctor(ctor, args) => {
                let specialized = specialize(rows, ctor, args.len());
                let mut next = args.clone();
                next.extend_from_slice(rest);
                self.is_useful(&specialized, &next)
            }
            Pat::Wild => {
                let heads = Self::head_ctors(rows);
                match self.complete_signature(&heads) {
                    Some(signature) => signature.iter().any(|(ctor, arity)| {
                        let specialized = specialize(rows, ctor, *arity);
                        let mut next = vec![Pat::Wild; *arity];
                        next.extend_from_slice(rest);
                        self.is_useful(&specialized, &next)
                    }),
                    None => self.is_useful(&default_rows(rows), rest),
                }
            }
        }
    }

    /// A vector of `width` patterns matched by no row, if one exists.
    fn missing(&self, rows: &[Vec<Pat>], width: usize) -> Option<Vec<Pat>> {
        if width == 0 {
            return rows.is_empty().then(Vec::new);
        }
        let heads = Self::head_ctors(rows);
        if let Some(signature) = self.complete_signature(&heads) {
            for (ctor, arity) in signature {
                let specialized = specialize(rows, &ctor, arity);
                if let Some(mut witness) = self.missing(&specialized, arity + width - 1) {
                    let rest = witness.split_off(arity);
                    let mut out = vec![Pat::Ctor(ctor, witness)];
                    out.extend(rest);
                    return Some(out);
                }
            }
            return None;
        }

        let mut witness = self.missing(&default_rows(rows), width - 1)?;
        let head = heads
            .first()
            .and_then(|first| self.signature(first))
            .and_then(|signature| {
                signature
                    .into_iter()
                    .find(|(ctor, _)| !heads.contains(ctor))
            })
            .map(|(ctor, arity)| Pat::Ctor(ctor, vec![Pat::Wild; arity]))
            .unwrap_or(Pat::Wild);
        witness.insert(0, head);
        Some(witness)
    }
}

fn specialize(rows: &[Vec<Pat>], ctor: &Ctor, arity: usize) -> Vec<Vec<Pat>> {
    rows.iter()
        .filter_map(|row| {
            let (first, rest) = row.split_first()?;
            let mut next = match first {
                Pat::Ctor(head, args) if head == ctor => args.clone(),
                Pat::Ctor(..) => return None,
                Pat::Wild => vec![Pat::Wild; arity],
            };
            next.extend_from_slice(rest);
            Some(next)
        })
        .collect()
}

fn default_rows(rows: &[Vec<Pat>]) -> Vec<Vec<Pat>> {
    rows.iter()
        .filter_map(|row| match row.split_first() {
            Some((Pat::Wild, rest)) => Some(rest.to_vec()),
            _ => None,
        })
        .collect()
}

fn print_pat(pat: &Pat, nested: bool) -> String {
    let Pat::Ctor(ctor, args) = pat else {
        return "_".to_string();
    };
    let text = match ctor {
        Ctor::Bool(value) => return value.to_string(),
        Ctor::Unit => return "()".to_string(),
        Ctor::Nil => return "[]".to_string(),
        Ctor::Int(value) => return value.to_string(),
        Ctor::Str(value) => return format!("{value:?}"),
        Ctor::Tuple(_) => {
            let items: Vec<String> = args.iter().map(|arg| print_pat(arg, false)).collect();
            return format!("({})", items.join(", "));
        }
        Ctor::Cons => format!("{} :: {}", print_pat(&args[0], true), print_pat(&args[1], false)),
        Ctor::Variant(name) => match args.as_slice() {
            [] => return name.clone(),
            [arg] => format!("{name} {}", print_pat(arg, true)),
            args => {
                let items: Vec<String> = args.iter().map(|arg| print_pat(arg, false)).collect();
                format!("{name} ({})", items.join(", "))
            }
        },
    };
    if nested {
        format!("({text})")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typecheck::types::{Type, TypeVarGen};

    fn shapes() -> VariantEnv {
        let range = Range::dummy("test");
        let mut gen = TypeVarGen::new();
        let a = gen.fresh();
        let mut env = VariantEnv::empty();
        env.declare_variant("shape", vec![a], range).expect("declare");
        env.add_constructor("shape", "Dot", Vec::new(), range)
            .expect("Dot");
        env.add_constructor("shape", "Circle", vec![Type::var(range, a)], range)
            .expect("Circle");
        env.add_constructor(
            "shape",
            "Rect",
            vec![Type::var(range, a), Type::var(range, a)],
            range,
        )
        .expect("Rect");
        env
    }

    fn ctor(name: &str, args: Vec<CorePattern>) -> CorePattern {
        CorePattern::Constructor {
            ctor: name.to_string(),
            args,
        }
    }

    fn report(env: &VariantEnv, patterns: &[CorePattern]) -> MatchReport {
        let refs: Vec<&CorePattern> = patterns.iter().collect();
        check_match(env, &refs)
    }

    #[test]
    fn covering_every_constructor_is_exhaustive() {
        let env = shapes();
        let arms = [
            ctor("Dot", Vec::new()),
            ctor("Circle", vec![CorePattern::Wildcard]),
            ctor("Rect", vec![CorePattern::Var("w".into()), CorePattern::Wildcard]),
        ];
        let report = report(&env, &arms);
        assert_eq!(report.missing, None);
        assert!(report.unused_arms.is_empty());
    }

    #[test]
    fn names_a_missing_constructor() {
        let env = shapes();
        let arms = [ctor("Dot", Vec::new()), ctor("Circle", vec![CorePattern::Wildcard])];
        assert_eq!(report(&env, &arms).missing.as_deref(), Some("Rect (_, _)"));
    }

    #[test]
    fn nested_lists_need_every_length() {
        let env = VariantEnv::empty();
        let cons = |head, tail| CorePattern::Cons {
            head: Box::new(head),
            tail: Box::new(tail),
        };
        let arms = [
            CorePattern::Nil,
            cons(CorePattern::Wildcard, CorePattern::Nil),
        ];
        assert_eq!(
            report(&env, &arms).missing.as_deref(),
            Some("_ :: _ :: _")
        );
    }

    #[test]
    fn integers_need_a_catch_all() {
        let env = VariantEnv::empty();
        let arms = [CorePattern::Literal(Literal::Int(0))];
        assert_eq!(report(&env, &arms).missing.as_deref(), Some("_"));
        let arms = [
            CorePattern::Literal(Literal::Int(0)),
            CorePattern::Var("n".into()),
        ];
        assert_eq!(report(&env, &arms).missing, None);
    }

    #[test]
    fn booleans_in_tuples() {
        let env = VariantEnv::empty();
        let pair = |a, b| {
            CorePattern::Tuple(vec![
                CorePattern::Literal(Literal::Bool(a)),
                CorePattern::Literal(Literal::Bool(b)),
            ])
        };
        let arms = [pair(true, true), pair(false, false), pair(true, false)];
        assert_eq!(
            report(&env, &arms).missing.as_deref(),
            Some("(false, true)")
        );
    }

    #[test]
    fn arms_after_a_catch_all_are_unused() {
        let env = shapes();
        let arms = [
            CorePattern::Wildcard,
            ctor("Dot", Vec::new()),
            CorePattern::Var("x".into()),
        ];
        let report = report(&env, &arms);
        assert_eq!(report.missing, None);
        assert_eq!(report.unused_arms, vec![1, 2]);
    }
}
