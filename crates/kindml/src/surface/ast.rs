use crate::diagnostics::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedName {
    pub name: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        range: Range,
    },
    Var(SpannedName),
    Lambda {
        param: SpannedName,
        body: Box<Expr>,
        range: Range,
    },
    Apply {
        func: Box<Expr>,
        arg: Box<Expr>,
        range: Range,
    },
    Let {
        name: SpannedName,
        value: Box<Expr>,
        body: Box<Expr>,
        range: Range,
    },
    LetRec {
        bindings: Vec<RecBinding>,
        body: Box<Expr>,
        range: Range,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        range: Range,
    },
    List {
        items: Vec<Expr>,
        range: Range,
    },
    Tuple {
        items: Vec<Expr>,
        range: Range,
    },
    Record {
        fields: Vec<(SpannedName, Expr)>,
        range: Range,
    },
    Field {
        base: Box<Expr>,
        field: SpannedName,
        range: Range,
    },
    Update {
        base: Box<Expr>,
        fields: Vec<(SpannedName, Expr)>,
        range: Range,
    },
    Construct {
        ctor: SpannedName,
        arg: Option<Box<Expr>>,
        range: Range,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        range: Range,
    },
    Ref {
        value: Box<Expr>,
        range: Range,
    },
    Deref {
        target: Box<Expr>,
        range: Range,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        range: Range,
    },
    Sequence {
        first: Box<Expr>,
        second: Box<Expr>,
        range: Range,
    },
    Annot {
        expr: Box<Expr>,
        ty: TypeExpr,
        range: Range,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecBinding {
    pub name: SpannedName,
    pub value: Expr,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard(Range),
    Var(SpannedName),
    Literal {
        value: Literal,
        range: Range,
    },
    Tuple {
        items: Vec<Pattern>,
        range: Range,
    },
    Nil(Range),
    Cons {
        head: Box<Pattern>,
        tail: Box<Pattern>,
        range: Range,
    },
    Constructor {
        ctor: SpannedName,
        arg: Option<Box<Pattern>>,
        range: Range,
    },
    As {
        pattern: Box<Pattern>,
        name: SpannedName,
        range: Range,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Var(SpannedName),
    Name {
        args: Vec<TypeExpr>,
        name: SpannedName,
        range: Range,
    },
    Func {
        param: Box<TypeExpr>,
        result: Box<TypeExpr>,
        range: Range,
    },
    Product {
        items: Vec<TypeExpr>,
        range: Range,
    },
    Record {
        fields: Vec<(SpannedName, TypeExpr)>,
        range: Range,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CtorDecl {
    pub name: SpannedName,
    pub args: Vec<TypeExpr>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDecl {
    Variant {
        params: Vec<SpannedName>,
        name: SpannedName,
        constructors: Vec<CtorDecl>,
        range: Range,
    },
    Synonym {
        params: Vec<SpannedName>,
        name: SpannedName,
        body: TypeExpr,
        range: Range,
    },
}

impl TypeDecl {
    pub fn name(&self) -> &SpannedName {
        match self {
            TypeDecl::Variant { name, .. } | TypeDecl::Synonym { name, .. } => name,
        }
    }
}

/// A parsed program: type declaration groups (each group is mutually recursive)
/// followed by the main expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub type_groups: Vec<Vec<TypeDecl>>,
    pub body: Expr,
}

pub fn expr_range(expr: &Expr) -> Range {
    match expr {
        Expr::Var(name) => name.range,
        Expr::Literal { range, .. }
        | Expr::Lambda { range, .. }
        | Expr::Apply { range, .. }
        | Expr::Let { range, .. }
        | Expr::LetRec { range, .. }
        | Expr::If { range, .. }
        | Expr::List { range, .. }
        | Expr::Tuple { range, .. }
        | Expr::Record { range, .. }
        | Expr::Field { range, .. }
        | Expr::Update { range, .. }
        | Expr::Construct { range, .. }
        | Expr::Match { range, .. }
        | Expr::Ref { range, .. }
        | Expr::Deref { range, .. }
        | Expr::Assign { range, .. }
        | Expr::Sequence { range, .. }
        | Expr::Annot { range, .. } => *range,
    }
}

pub fn pattern_range(pattern: &Pattern) -> Range {
    match pattern {
        Pattern::Wildcard(range) | Pattern::Nil(range) => *range,
        Pattern::Var(name) => name.range,
        Pattern::Literal { range, .. }
        | Pattern::Tuple { range, .. }
        | Pattern::Cons { range, .. }
        | Pattern::Constructor { range, .. }
        | Pattern::As { range, .. } => *range,
    }
}

pub fn type_expr_range(ty: &TypeExpr) -> Range {
    match ty {
        TypeExpr::Var(name) => name.range,
        TypeExpr::Name { range, .. }
        | TypeExpr::Func { range, .. }
        | TypeExpr::Product { range, .. }
        | TypeExpr::Record { range, .. } => *range,
    }
}
