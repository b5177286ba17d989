//! Property tests for the substitution and unifier.
//!
//! 1. Applying a substitution is idempotent.
//! 2. `unify(t, t)` always succeeds and binds nothing new.
//! 3. After a successful `unify(a, b)`, `apply(a) == apply(b)`.
//! 4. Binding a variable to a type that strictly contains it fails the occurs check.
//! 5. A failed unification leaves the substitution unchanged.

use std::collections::BTreeMap;

use proptest::prelude::*;

use crate::diagnostics::Range;

use super::{KindEnv, Reason, Substitution, Type, TypeVarGen, TypeVarId};

const VAR_POOL: usize = 6;
const FIELD_POOL: &[&str] = &["a", "b", "c", "x"];

fn vars() -> Vec<TypeVarId> {
    let mut gen = TypeVarGen::new();
    (0..VAR_POOL).map(|_| gen.fresh()).collect()
}

fn range() -> Range {
    Range::dummy("prop")
}

fn arb_var() -> impl Strategy<Value = TypeVarId> {
    (0..VAR_POOL).prop_map(|index| vars()[index])
}

fn arb_leaf() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::int(range())),
        Just(Type::bool(range())),
        Just(Type::string(range())),
        Just(Type::unit(range())),
        arb_var().prop_map(|id| Type::var(range(), id)),
    ]
}

/// Quantifier-free types of bounded depth.
fn arb_type() -> impl Strategy<Value = Type> {
    arb_leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(param, result)| Type::func(range(), param, result)),
            inner.clone().prop_map(|elem| Type::list(range(), elem)),
            inner.clone().prop_map(|pointee| Type::reference(range(), pointee)),
            prop::collection::vec(inner.clone(), 2..=3)
                .prop_map(|items| Type::product(range(), items)),
            prop::collection::btree_map(
                prop::sample::select(FIELD_POOL).prop_map(str::to_string),
                inner,
                1..=3,
            )
            .prop_map(|fields: BTreeMap<String, Type>| Type::record(range(), fields)),
        ]
    })
}

fn arb_pairs() -> impl Strategy<Value = Vec<(Type, Type)>> {
    prop::collection::vec((arb_type(), arb_type()), 0..6)
}

/// Runs every pair through one substitution, ignoring contradictions.
fn unify_all(pairs: &[(Type, Type)]) -> (Substitution, KindEnv) {
    let mut subst = Substitution::new();
    let mut kinds = KindEnv::empty();
    for (left, right) in pairs {
        let _ = subst.unify(left, right, &mut kinds);
    }
    (subst, kinds)
}

proptest! {
    #[test]
    fn apply_is_idempotent(pairs in arb_pairs(), sample in arb_type()) {
        let (subst, _) = unify_all(&pairs);
        let once = subst.apply(&sample);
        prop_assert_eq!(subst.apply(&once), once);
    }

    #[test]
    fn unify_is_reflexive(pairs in arb_pairs(), ty in arb_type()) {
        let (mut subst, mut kinds) = unify_all(&pairs);
        let before = subst.len();
        prop_assert!(subst.unify(&ty, &ty, &mut kinds).is_ok());
        prop_assert_eq!(subst.len(), before);
    }

    #[test]
    fn successful_unify_equates_both_sides(left in arb_type(), right in arb_type()) {
        let mut subst = Substitution::new();
        let mut kinds = KindEnv::empty();
        if subst.unify(&left, &right, &mut kinds).is_ok() {
            prop_assert_eq!(subst.apply(&left), subst.apply(&right));
        }
    }

    #[test]
    fn occurs_check_rejects_cyclic_bindings(var in arb_var(), other in arb_type()) {
        let var_ty = Type::var(range(), var);
        let containing = Type::func(range(), var_ty.clone(), other);
        let mut subst = Substitution::new();
        let mut kinds = KindEnv::empty();
        let err = subst.unify(&var_ty, &containing, &mut kinds).unwrap_err();
        prop_assert!(matches!(err.reason, Reason::Occurs { .. }), "{:?}", err.reason);
        prop_assert!(subst.is_empty());
    }

    #[test]
    fn failed_unify_restores_the_substitution(
        pairs in arb_pairs(),
        left in arb_type(),
        right in arb_type(),
        sample in arb_type(),
    ) {
        let (mut subst, mut kinds) = unify_all(&pairs);
        let before = subst.clone();
        let kinds_before = kinds.len();
        if subst.unify(&left, &right, &mut kinds).is_err() {
            prop_assert_eq!(subst.len(), before.len());
            prop_assert_eq!(subst.apply(&sample), before.apply(&sample));
            prop_assert_eq!(kinds.len(), kinds_before);
        }
    }

    #[test]
    fn fresh_ids_never_collide_with_mentioned_ones(ty in arb_type()) {
        let mentioned = ty.mentioned_variables();
        let mut gen = TypeVarGen::starting_after(mentioned.iter().copied());
        for _ in 0..4 {
            let fresh = gen.fresh();
            prop_assert!(!mentioned.contains(&fresh));
        }
    }
}
