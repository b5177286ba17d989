//! Elaborated expressions produced by the typechecker and consumed by the
//! evaluator. Same shapes as the surface tree, minus source ranges, with
//! resolved types attached at binding sites.

use std::sync::Arc;

use crate::surface::Literal;
use crate::typecheck::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreExpr {
    Literal(Literal),
    Var(String),
    Lambda {
        param: String,
        param_ty: Type,
        body: Arc<CoreExpr>,
    },
    Apply {
        func: Box<CoreExpr>,
        arg: Box<CoreExpr>,
    },
    Let {
        name: String,
        ty: Type,
        value: Box<CoreExpr>,
        body: Box<CoreExpr>,
    },
    LetRec {
        bindings: Vec<CoreRecBinding>,
        body: Box<CoreExpr>,
    },
    If {
        cond: Box<CoreExpr>,
        then_branch: Box<CoreExpr>,
        else_branch: Box<CoreExpr>,
    },
    List(Vec<CoreExpr>),
    Tuple(Vec<CoreExpr>),
    Record(Vec<(String, CoreExpr)>),
    Field {
        base: Box<CoreExpr>,
        field: String,
    },
    Update {
        base: Box<CoreExpr>,
        fields: Vec<(String, CoreExpr)>,
    },
    Construct {
        ctor: String,
        args: Vec<CoreExpr>,
    },
    Match {
        scrutinee: Box<CoreExpr>,
        scrutinee_ty: Type,
        arms: Vec<CoreArm>,
    },
    Ref(Box<CoreExpr>),
    Deref(Box<CoreExpr>),
    Assign {
        target: Box<CoreExpr>,
        value: Box<CoreExpr>,
    },
    Sequence {
        first: Box<CoreExpr>,
        second: Box<CoreExpr>,
    },
    Annot {
        expr: Box<CoreExpr>,
        ty: Type,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreRecBinding {
    pub name: String,
    pub ty: Type,
    pub value: CoreExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreArm {
    pub pattern: CorePattern,
    pub body: CoreExpr,
}

/// Constructor patterns always carry exactly as many sub-patterns as the
/// constructor's arity.
#[derive(Debug, Clone, PartialEq)]
pub enum CorePattern {
    Wildcard,
    Var(String),
    Literal(Literal),
    Tuple(Vec<CorePattern>),
    Nil,
    Cons {
        head: Box<CorePattern>,
        tail: Box<CorePattern>,
    },
    Constructor {
        ctor: String,
        args: Vec<CorePattern>,
    },
    As {
        pattern: Box<CorePattern>,
        name: String,
    },
}

impl CoreExpr {
    /// Rebuilds the expression with every attached type passed through `f`.
    pub fn map_types(&self, f: &impl Fn(&Type) -> Type) -> CoreExpr {
        let map = |expr: &CoreExpr| Box::new(expr.map_types(f));
        let map_fields = |fields: &[(String, CoreExpr)]| -> Vec<(String, CoreExpr)> {
            fields
                .iter()
                .map(|(name, expr)| (name.clone(), expr.map_types(f)))
                .collect()
        };
        match self {
            CoreExpr::Literal(_) | CoreExpr::Var(_) => self.clone(),
            CoreExpr::Lambda {
                param,
                param_ty,
                body,
            } => CoreExpr::Lambda {
                param: param.clone(),
                param_ty: f(param_ty),
                body: Arc::new(body.map_types(f)),
            },
            CoreExpr::Apply { func, arg } => CoreExpr::Apply {
                func: map(func),
                arg: map(arg),
            },
            CoreExpr::Let {
                name,
                ty,
                value,
                body,
            } => CoreExpr::Let {
                name: name.clone(),
                ty: f(ty),
                value: map(value),
                body: map(body),
            },
            CoreExpr::LetRec { bindings, body } => CoreExpr::LetRec {
                bindings: bindings
                    .iter()
                    .map(|binding| CoreRecBinding {
                        name: binding.name.clone(),
                        ty: f(&binding.ty),
                        value: binding.value.map_types(f),
                    })
                    .collect(),
                body: map(body),
            },
            CoreExpr::If {
                cond,
                then_branch,
                else_branch,
            } => CoreExpr::If {
                cond: map(cond),
                then_branch: map(then_branch),
                else_branch: map(else_branch),
            },
            CoreExpr::List(items) => {
                CoreExpr::List(items.iter().map(|item| item.map_types(f)).collect())
            }
            CoreExpr::Tuple(items) => {
                CoreExpr::Tuple(items.iter().map(|item| item.map_types(f)).collect())
            }
            CoreExpr::Record(fields) => CoreExpr::Record(map_fields(fields)),
            CoreExpr::Field { base, field } => CoreExpr::Field {
                base: map(base),
                field: field.clone(),
            },
            CoreExpr::Update { base, fields } => CoreExpr::Update {
                base: map(base),
                fields: map_fields(fields),
            },
            CoreExpr::Construct { ctor, args } => CoreExpr::Construct {
                ctor: ctor.clone(),
                args: args.iter().map(|arg| arg.map_types(f)).collect(),
            },
            CoreExpr::Match {
                scrutinee,
                scrutinee_ty,
                arms,
            } => CoreExpr::Match {
                scrutinee: map(scrutinee),
                scrutinee_ty: f(scrutinee_ty),
                arms: arms
                    .iter()
                    .map(|arm| CoreArm {
                        pattern: arm.pattern.clone(),
                        body: arm.body.map_types(f),
                    })
                    .collect(),
            },
            CoreExpr::Ref(value) => CoreExpr::Ref(map(value)),
            CoreExpr::Deref(target) => CoreExpr::Deref(map(target)),
            CoreExpr::Assign { target, value } => CoreExpr::Assign {
                target: map(target),
                value: map(value),
            },
            CoreExpr::Sequence { first, second } => CoreExpr::Sequence {
                first: map(first),
                second: map(second),
            },
            CoreExpr::Annot { expr, ty } => CoreExpr::Annot {
                expr: map(expr),
                ty: f(ty),
            },
        }
    }
}
