use crate::diagnostics::Range;
use crate::lexer::{Token, TokenKind};

use super::ast::*;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at {range}")]
pub struct ParseError {
    pub message: String,
    pub range: Range,
}

type ParseResult<T> = Result<T, ParseError>;

/// Deepest syntax tree the parser hands on. Later stages recurse over the
/// tree, so this also bounds their stack use.
pub const MAX_NESTING: usize = 1_000;

pub fn parse_program(tokens: Vec<Token>) -> ParseResult<Program> {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;
    if !parser.at_eof() {
        return Err(parser.error_here("unexpected token after end of program"));
    }
    if nesting_depth(&program) > MAX_NESTING {
        return Err(ParseError {
            message: format!("program is nested more than {MAX_NESTING} levels deep"),
            range: expr_range(&program.body),
        });
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    fresh: usize,
    depth: usize,
}

fn binary_prec(op: &str) -> Option<(u8, bool)> {
    // (precedence, right associative)
    match op {
        "||" => Some((1, true)),
        "&&" => Some((2, true)),
        "==" | "<>" | "<" | ">" | "<=" | ">=" => Some((3, false)),
        "::" => Some((4, true)),
        "^" => Some((5, true)),
        "+" | "-" => Some((6, false)),
        "*" | "/" | "mod" => Some((7, false)),
        _ => None,
    }
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |token| token.kind != TokenKind::Eof) {
            let range = tokens.last().map_or_else(Range::erased, |token| token.range);
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                range,
            });
        }
        Self {
            tokens,
            pos: 0,
            fresh: 0,
            depth: 0,
        }
    }

    /// Enters one level of nesting. Callers undo it by decrementing `depth`.
    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here("program is nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn previous_range(&self) -> Range {
        self.pos
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .map(|token| token.range)
            .unwrap_or_else(|| self.peek().range)
    }

    fn check_symbol(&self, symbol: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Symbol && token.text == symbol
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Keyword && token.text == keyword
    }

    fn consume_symbol(&mut self, symbol: &str) -> bool {
        if self.check_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> ParseResult<Range> {
        if self.check_symbol(symbol) {
            Ok(self.advance().range)
        } else {
            Err(self.error_here(&format!("expected '{symbol}'")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<Range> {
        if self.check_keyword(keyword) {
            Ok(self.advance().range)
        } else {
            Err(self.error_here(&format!("expected '{keyword}'")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> ParseResult<SpannedName> {
        let token = self.peek();
        if token.kind == TokenKind::Ident {
            let token = self.advance();
            Ok(SpannedName {
                name: token.text,
                range: token.range,
            })
        } else {
            Err(self.error_here(&format!("expected {what}")))
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("'{}'", token.text)
        };
        ParseError {
            message: format!("{message}, found {found}"),
            range: token.range,
        }
    }

    fn fresh_name(&mut self, range: Range) -> SpannedName {
        self.fresh += 1;
        SpannedName {
            name: format!("%arg{}", self.fresh),
            range,
        }
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut type_groups = Vec::new();
        while self.check_keyword("type") {
            self.advance();
            let mut group = vec![self.parse_type_decl()?];
            while self.consume_keyword("and") {
                group.push(self.parse_type_decl()?);
            }
            self.expect_keyword("in")?;
            type_groups.push(group);
        }
        let body = self.parse_expr()?;
        Ok(Program { type_groups, body })
    }

    // ---- declarations -------------------------------------------------

    fn parse_type_decl(&mut self) -> ParseResult<TypeDecl> {
        let start = self.peek().range;
        let params = self.parse_type_params()?;
        let name = self.expect_ident("a type name")?;
        self.expect_symbol("=")?;
        let is_variant = self.check_symbol("|") || self.peek().kind == TokenKind::Constructor;
        if !is_variant {
            let body = self.parse_type()?;
            let range = start.merge(type_expr_range(&body));
            return Ok(TypeDecl::Synonym {
                params,
                name,
                body,
                range,
            });
        }
        self.consume_symbol("|");
        let mut constructors = vec![self.parse_ctor_decl()?];
        while self.consume_symbol("|") {
            constructors.push(self.parse_ctor_decl()?);
        }
        let range = start.merge(self.previous_range());
        Ok(TypeDecl::Variant {
            params,
            name,
            constructors,
            range,
        })
    }

    fn parse_type_params(&mut self) -> ParseResult<Vec<SpannedName>> {
        let mut params = Vec::new();
        if self.peek().kind == TokenKind::TypeVar {
            let token = self.advance();
            params.push(SpannedName {
                name: token.text,
                range: token.range,
            });
        } else if self.check_symbol("(")
            && self
                .peek_at(1)
                .is_some_and(|token| token.kind == TokenKind::TypeVar)
        {
            self.advance();
            loop {
                let token = self.peek().clone();
                if token.kind != TokenKind::TypeVar {
                    return Err(self.error_here("expected a type parameter"));
                }
                self.advance();
                params.push(SpannedName {
                    name: token.text,
                    range: token.range,
                });
                if !self.consume_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
        }
        Ok(params)
    }

    fn parse_ctor_decl(&mut self) -> ParseResult<CtorDecl> {
        let token = self.peek().clone();
        if token.kind != TokenKind::Constructor {
            return Err(self.error_here("expected a constructor name"));
        }
        self.advance();
        let name = SpannedName {
            name: token.text,
            range: token.range,
        };
        let mut args = Vec::new();
        if self.consume_keyword("of") {
            args.push(self.parse_type_app()?);
            while self.consume_symbol("*") {
                args.push(self.parse_type_app()?);
            }
        }
        let range = name.range.merge(self.previous_range());
        Ok(CtorDecl { name, args, range })
    }

    // ---- types --------------------------------------------------------

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        self.nested(Self::parse_type_arrow)
    }

    fn parse_type_arrow(&mut self) -> ParseResult<TypeExpr> {
        let param = self.parse_type_product()?;
        if self.consume_symbol("->") {
            let result = self.parse_type()?;
            let range = type_expr_range(&param).merge(type_expr_range(&result));
            return Ok(TypeExpr::Func {
                param: Box::new(param),
                result: Box::new(result),
                range,
            });
        }
        Ok(param)
    }

    fn parse_type_product(&mut self) -> ParseResult<TypeExpr> {
        let first = self.parse_type_app()?;
        if !self.check_symbol("*") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.consume_symbol("*") {
            items.push(self.parse_type_app()?);
        }
        let range = type_expr_range(&items[0]).merge(self.previous_range());
        Ok(TypeExpr::Product { items, range })
    }

    fn parse_type_app(&mut self) -> ParseResult<TypeExpr> {
        let mut args = self.parse_type_atom()?;
        let mut applied = 0;
        while self.peek().kind == TokenKind::Ident {
            self.descend()?;
            applied += 1;
            let token = self.advance();
            let name = SpannedName {
                name: token.text,
                range: token.range,
            };
            let range = args
                .first()
                .map(type_expr_range)
                .unwrap_or(name.range)
                .merge(name.range);
            args = vec![TypeExpr::Name { args, name, range }];
        }
        self.depth -= applied;
        match args.len() {
            1 => Ok(args.remove(0)),
            _ => Err(self.error_here("expected a type constructor after type arguments")),
        }
    }

    /// Parses an atomic type. `('a, 'b)` yields several arguments awaiting a
    /// type constructor name.
    fn parse_type_atom(&mut self) -> ParseResult<Vec<TypeExpr>> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::TypeVar => {
                self.advance();
                Ok(vec![TypeExpr::Var(SpannedName {
                    name: token.text,
                    range: token.range,
                })])
            }
            TokenKind::Ident => {
                self.advance();
                Ok(vec![TypeExpr::Name {
                    args: Vec::new(),
                    name: SpannedName {
                        name: token.text,
                        range: token.range,
                    },
                    range: token.range,
                }])
            }
            TokenKind::Symbol if token.text == "(" => {
                self.advance();
                let mut items = vec![self.parse_type()?];
                while self.consume_symbol(",") {
                    items.push(self.parse_type()?);
                }
                self.expect_symbol(")")?;
                Ok(items)
            }
            TokenKind::Symbol if token.text == "{" => {
                self.advance();
                let mut fields = Vec::new();
                if !self.check_symbol("}") {
                    loop {
                        let field = self.expect_ident("a field name")?;
                        self.expect_symbol(":")?;
                        let ty = self.parse_type()?;
                        fields.push((field, ty));
                        if !self.consume_symbol(",") {
                            break;
                        }
                    }
                }
                let end = self.expect_symbol("}")?;
                Ok(vec![TypeExpr::Record {
                    fields,
                    range: token.range.merge(end),
                }])
            }
            _ => Err(self.error_here("expected a type")),
        }
    }

    // ---- expressions --------------------------------------------------

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut stmts = vec![self.parse_stmt()?];
        while self.consume_symbol(";") {
            if stmts.len() >= MAX_NESTING {
                return Err(self.error_here("program is nested too deeply"));
            }
            stmts.push(self.parse_stmt()?);
        }
        let mut rest = stmts.into_iter().rev();
        let Some(mut expr) = rest.next() else {
            return Err(self.error_here("expected an expression"));
        };
        for first in rest {
            let range = expr_range(&first).merge(expr_range(&expr));
            expr = Expr::Sequence {
                first: Box::new(first),
                second: Box::new(expr),
                range,
            };
        }
        Ok(expr)
    }

    fn parse_stmt(&mut self) -> ParseResult<Expr> {
        self.nested(Self::parse_stmt_form)
    }

    fn parse_stmt_form(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        if token.kind == TokenKind::Keyword {
            match token.text.as_str() {
                "let" => return self.parse_let(),
                "fun" => return self.parse_fun(),
                "if" => return self.parse_if(),
                "match" => return self.parse_match(),
                _ => {}
            }
        }
        self.parse_assign()
    }

    fn parse_let(&mut self) -> ParseResult<Expr> {
        let start = self.expect_keyword("let")?;
        if self.consume_keyword("rec") {
            let mut bindings = vec![self.parse_rec_binding()?];
            while self.consume_keyword("and") {
                bindings.push(self.parse_rec_binding()?);
            }
            self.expect_keyword("in")?;
            let body = self.parse_expr()?;
            let range = start.merge(expr_range(&body));
            return Ok(Expr::LetRec {
                bindings,
                body: Box::new(body),
                range,
            });
        }

        let pattern = self.parse_pattern()?;
        let Pattern::Var(name) = pattern else {
            // `let (a, b) = e in body` is a single-armed match.
            self.expect_symbol("=")?;
            let value = self.parse_expr()?;
            self.expect_keyword("in")?;
            let body = self.parse_expr()?;
            let arm_range = pattern_range(&pattern).merge(expr_range(&body));
            let range = start.merge(expr_range(&body));
            return Ok(Expr::Match {
                scrutinee: Box::new(value),
                arms: vec![MatchArm {
                    pattern,
                    body,
                    range: arm_range,
                }],
                range,
            });
        };
        let value = self.parse_binding_rhs()?;
        self.expect_keyword("in")?;
        let body = self.parse_expr()?;
        let range = start.merge(expr_range(&body));
        Ok(Expr::Let {
            name,
            value: Box::new(value),
            body: Box::new(body),
            range,
        })
    }

    fn parse_rec_binding(&mut self) -> ParseResult<RecBinding> {
        let name = self.expect_ident("a function name")?;
        let value = self.parse_binding_rhs()?;
        let range = name.range.merge(expr_range(&value));
        Ok(RecBinding { name, value, range })
    }

    /// Parses `p1 p2 ... [: t] = e` after a binder name, desugaring parameters
    /// into nested lambdas.
    fn parse_binding_rhs(&mut self) -> ParseResult<Expr> {
        let mut params = Vec::new();
        while !self.check_symbol("=") && !self.check_symbol(":") {
            params.push(self.parse_pattern_atom()?);
        }
        let annotation = if self.consume_symbol(":") {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect_symbol("=")?;
        let mut value = self.parse_expr()?;
        if let Some(ty) = annotation {
            let range = expr_range(&value);
            value = Expr::Annot {
                expr: Box::new(value),
                ty,
                range,
            };
        }
        Ok(self.wrap_lambdas(params, value))
    }

    fn wrap_lambdas(&mut self, params: Vec<Pattern>, body: Expr) -> Expr {
        let mut body = body;
        for pattern in params.into_iter().rev() {
            let range = pattern_range(&pattern).merge(expr_range(&body));
            let param = match pattern {
                Pattern::Var(name) => name,
                pattern => {
                    let param = self.fresh_name(pattern_range(&pattern));
                    let arm_range = range;
                    body = Expr::Match {
                        scrutinee: Box::new(Expr::Var(param.clone())),
                        arms: vec![MatchArm {
                            pattern,
                            body,
                            range: arm_range,
                        }],
                        range,
                    };
                    param
                }
            };
            body = Expr::Lambda {
                param,
                body: Box::new(body),
                range,
            };
        }
        body
    }

    fn parse_fun(&mut self) -> ParseResult<Expr> {
        let start = self.expect_keyword("fun")?;
        let mut params = vec![self.parse_pattern_atom()?];
        while !self.check_symbol("->") {
            params.push(self.parse_pattern_atom()?);
        }
        self.expect_symbol("->")?;
        let body = self.parse_expr()?;
        let lambda = self.wrap_lambdas(params, body);
        Ok(match lambda {
            Expr::Lambda { param, body, range } => Expr::Lambda {
                param,
                body,
                range: start.merge(range),
            },
            other => other,
        })
    }

    fn parse_if(&mut self) -> ParseResult<Expr> {
        let start = self.expect_keyword("if")?;
        let cond = self.parse_expr()?;
        self.expect_keyword("then")?;
        let then_branch = self.parse_stmt()?;
        self.expect_keyword("else")?;
        let else_branch = self.parse_stmt()?;
        let range = start.merge(expr_range(&else_branch));
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            range,
        })
    }

    fn parse_match(&mut self) -> ParseResult<Expr> {
        let start = self.expect_keyword("match")?;
        let scrutinee = self.parse_expr()?;
        self.expect_keyword("with")?;
        self.consume_symbol("|");
        let mut arms = vec![self.parse_match_arm()?];
        while self.consume_symbol("|") {
            arms.push(self.parse_match_arm()?);
        }
        let range = start.merge(self.previous_range());
        Ok(Expr::Match {
            scrutinee: Box::new(scrutinee),
            arms,
            range,
        })
    }

    fn parse_match_arm(&mut self) -> ParseResult<MatchArm> {
        let pattern = self.parse_pattern()?;
        self.expect_symbol("->")?;
        let body = self.parse_stmt()?;
        let range = pattern_range(&pattern).merge(expr_range(&body));
        Ok(MatchArm {
            pattern,
            body,
            range,
        })
    }

    fn parse_assign(&mut self) -> ParseResult<Expr> {
        let target = self.parse_binary(0)?;
        if self.consume_symbol(":=") {
            let value = self.parse_stmt()?;
            let range = expr_range(&target).merge(expr_range(&value));
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
                range,
            });
        }
        Ok(target)
    }

    fn peek_binary_op(&self) -> Option<String> {
        let token = self.peek();
        let is_op = match token.kind {
            TokenKind::Symbol => binary_prec(&token.text).is_some(),
            TokenKind::Keyword => token.text == "mod",
            _ => false,
        };
        is_op.then(|| token.text.clone())
    }

    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut folded = 0;
        while let Some(op) = self.peek_binary_op() {
            let Some((prec, right_assoc)) = binary_prec(&op) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.descend()?;
            folded += 1;
            let op_range = self.advance().range;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;
            left = desugar_binary(&op, op_range, left, right);
        }
        self.depth -= folded;
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.check_symbol("-") {
            let start = self.advance().range;
            if self.peek().kind == TokenKind::Number {
                let token = self.advance();
                let value = format!("-{}", token.text)
                    .parse::<i64>()
                    .map_err(|_| ParseError {
                        message: "integer literal is out of range".to_string(),
                        range: token.range,
                    })?;
                return Ok(Expr::Literal {
                    value: Literal::Int(value),
                    range: start.merge(token.range),
                });
            }
            let operand = self.nested(Self::parse_unary)?;
            let zero = Expr::Literal {
                value: Literal::Int(0),
                range: start,
            };
            return Ok(desugar_binary("-", start, zero, operand));
        }
        if self.check_keyword("ref") {
            let start = self.advance().range;
            let value = self.parse_postfix()?;
            let range = start.merge(expr_range(&value));
            return Ok(Expr::Ref {
                value: Box::new(value),
                range,
            });
        }
        self.parse_application()
    }

    fn starts_atom(&self) -> bool {
        let token = self.peek();
        match token.kind {
            TokenKind::Number | TokenKind::String | TokenKind::Constructor => true,
            TokenKind::Ident => token.text != "_",
            TokenKind::Keyword => matches!(token.text.as_str(), "true" | "false"),
            TokenKind::Symbol => matches!(token.text.as_str(), "(" | "[" | "{" | "!"),
            _ => false,
        }
    }

    fn parse_application(&mut self) -> ParseResult<Expr> {
        if self.peek().kind == TokenKind::Constructor {
            let token = self.advance();
            let ctor = SpannedName {
                name: token.text,
                range: token.range,
            };
            let arg = if self.starts_atom() {
                Some(Box::new(self.parse_postfix()?))
            } else {
                None
            };
            let range = arg
                .as_ref()
                .map(|arg| ctor.range.merge(expr_range(arg)))
                .unwrap_or(ctor.range);
            return Ok(Expr::Construct { ctor, arg, range });
        }
        let mut func = self.parse_postfix()?;
        let mut applied = 0;
        while self.starts_atom() {
            self.descend()?;
            applied += 1;
            let arg = self.parse_postfix()?;
            let range = expr_range(&func).merge(expr_range(&arg));
            func = Expr::Apply {
                func: Box::new(func),
                arg: Box::new(arg),
                range,
            };
        }
        self.depth -= applied;
        Ok(func)
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_atom()?;
        let mut accessed = 0;
        while self.consume_symbol(".") {
            self.descend()?;
            accessed += 1;
            let field = self.expect_ident("a field name")?;
            let range = expr_range(&expr).merge(field.range);
            expr = Expr::Field {
                base: Box::new(expr),
                field,
                range,
            };
        }
        self.depth -= accessed;
        Ok(expr)
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let value = token.text.parse::<i64>().map_err(|_| ParseError {
                    message: "integer literal is out of range".to_string(),
                    range: token.range,
                })?;
                Ok(Expr::Literal {
                    value: Literal::Int(value),
                    range: token.range,
                })
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::String(token.text),
                    range: token.range,
                })
            }
            TokenKind::Keyword if token.text == "true" || token.text == "false" => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Bool(token.text == "true"),
                    range: token.range,
                })
            }
            TokenKind::Ident if token.text != "_" => {
                self.advance();
                Ok(Expr::Var(SpannedName {
                    name: token.text,
                    range: token.range,
                }))
            }
            TokenKind::Constructor => {
                self.advance();
                Ok(Expr::Construct {
                    ctor: SpannedName {
                        name: token.text,
                        range: token.range,
                    },
                    arg: None,
                    range: token.range,
                })
            }
            TokenKind::Symbol => match token.text.as_str() {
                "!" => {
                    self.advance();
                    let target = self.nested(Self::parse_atom)?;
                    let range = token.range.merge(expr_range(&target));
                    Ok(Expr::Deref {
                        target: Box::new(target),
                        range,
                    })
                }
                "(" => self.parse_paren(),
                "[" => self.parse_list(),
                "{" => self.parse_record(),
                _ => Err(self.error_here("expected an expression")),
            },
            _ => Err(self.error_here("expected an expression")),
        }
    }

    fn parse_paren(&mut self) -> ParseResult<Expr> {
        let start = self.expect_symbol("(")?;
        if self.check_symbol(")") {
            let end = self.advance().range;
            return Ok(Expr::Literal {
                value: Literal::Unit,
                range: start.merge(end),
            });
        }
        let first = self.parse_expr()?;
        if self.consume_symbol(":") {
            let ty = self.parse_type()?;
            let end = self.expect_symbol(")")?;
            return Ok(Expr::Annot {
                expr: Box::new(first),
                ty,
                range: start.merge(end),
            });
        }
        if self.check_symbol(",") {
            let mut items = vec![first];
            while self.consume_symbol(",") {
                items.push(self.parse_expr()?);
            }
            let end = self.expect_symbol(")")?;
            return Ok(Expr::Tuple {
                items,
                range: start.merge(end),
            });
        }
        self.expect_symbol(")")?;
        Ok(first)
    }

    fn parse_list(&mut self) -> ParseResult<Expr> {
        let start = self.expect_symbol("[")?;
        let mut items = Vec::new();
        if !self.check_symbol("]") {
            loop {
                items.push(self.parse_expr()?);
                if !self.consume_symbol(",") {
                    break;
                }
            }
        }
        let end = self.expect_symbol("]")?;
        Ok(Expr::List {
            items,
            range: start.merge(end),
        })
    }

    fn parse_record(&mut self) -> ParseResult<Expr> {
        let start = self.expect_symbol("{")?;
        let is_field_start = self.peek().kind == TokenKind::Ident
            && self
                .peek_at(1)
                .is_some_and(|token| token.kind == TokenKind::Symbol && token.text == "=");
        if self.check_symbol("}") || is_field_start {
            let fields = self.parse_record_fields()?;
            let end = self.expect_symbol("}")?;
            return Ok(Expr::Record {
                fields,
                range: start.merge(end),
            });
        }
        let base = self.parse_postfix()?;
        self.expect_keyword("with")?;
        let fields = self.parse_record_fields()?;
        if fields.is_empty() {
            return Err(self.error_here("expected at least one field in record update"));
        }
        let end = self.expect_symbol("}")?;
        Ok(Expr::Update {
            base: Box::new(base),
            fields,
            range: start.merge(end),
        })
    }

    fn parse_record_fields(&mut self) -> ParseResult<Vec<(SpannedName, Expr)>> {
        let mut fields = Vec::new();
        if self.check_symbol("}") {
            return Ok(fields);
        }
        loop {
            let name = self.expect_ident("a field name")?;
            self.expect_symbol("=")?;
            let value = self.parse_stmt()?;
            fields.push((name, value));
            if !self.consume_symbol(",") {
                break;
            }
        }
        Ok(fields)
    }

    // ---- patterns -----------------------------------------------------

    fn parse_pattern(&mut self) -> ParseResult<Pattern> {
        self.nested(Self::parse_pattern_as)
    }

    fn parse_pattern_as(&mut self) -> ParseResult<Pattern> {
        let pattern = self.parse_pattern_cons()?;
        if self.consume_keyword("as") {
            let name = self.expect_ident("a binder name after 'as'")?;
            let range = pattern_range(&pattern).merge(name.range);
            return Ok(Pattern::As {
                pattern: Box::new(pattern),
                name,
                range,
            });
        }
        Ok(pattern)
    }

    fn parse_pattern_cons(&mut self) -> ParseResult<Pattern> {
        let head = self.parse_pattern_ctor()?;
        if self.consume_symbol("::") {
            let tail = self.nested(Self::parse_pattern_cons)?;
            let range = pattern_range(&head).merge(pattern_range(&tail));
            return Ok(Pattern::Cons {
                head: Box::new(head),
                tail: Box::new(tail),
                range,
            });
        }
        Ok(head)
    }

    fn parse_pattern_ctor(&mut self) -> ParseResult<Pattern> {
        if self.peek().kind == TokenKind::Constructor {
            let token = self.advance();
            let ctor = SpannedName {
                name: token.text,
                range: token.range,
            };
            let arg = if self.starts_pattern_atom() {
                Some(Box::new(self.parse_pattern_atom()?))
            } else {
                None
            };
            let range = arg
                .as_ref()
                .map(|arg| ctor.range.merge(pattern_range(arg)))
                .unwrap_or(ctor.range);
            return Ok(Pattern::Constructor { ctor, arg, range });
        }
        self.parse_pattern_atom()
    }

    fn starts_pattern_atom(&self) -> bool {
        let token = self.peek();
        match token.kind {
            TokenKind::Number | TokenKind::String | TokenKind::Ident | TokenKind::Constructor => {
                true
            }
            TokenKind::Keyword => matches!(token.text.as_str(), "true" | "false"),
            TokenKind::Symbol => matches!(token.text.as_str(), "(" | "[" | "-"),
            _ => false,
        }
    }

    fn parse_pattern_atom(&mut self) -> ParseResult<Pattern> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident if token.text == "_" => {
                self.advance();
                Ok(Pattern::Wildcard(token.range))
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Pattern::Var(SpannedName {
                    name: token.text,
                    range: token.range,
                }))
            }
            TokenKind::Constructor => {
                self.advance();
                Ok(Pattern::Constructor {
                    ctor: SpannedName {
                        name: token.text,
                        range: token.range,
                    },
                    arg: None,
                    range: token.range,
                })
            }
            TokenKind::Number => {
                self.advance();
                let value = token.text.parse::<i64>().map_err(|_| ParseError {
                    message: "integer literal is out of range".to_string(),
                    range: token.range,
                })?;
                Ok(Pattern::Literal {
                    value: Literal::Int(value),
                    range: token.range,
                })
            }
            TokenKind::String => {
                self.advance();
                Ok(Pattern::Literal {
                    value: Literal::String(token.text),
                    range: token.range,
                })
            }
            TokenKind::Keyword if token.text == "true" || token.text == "false" => {
                self.advance();
                Ok(Pattern::Literal {
                    value: Literal::Bool(token.text == "true"),
                    range: token.range,
                })
            }
            TokenKind::Symbol if token.text == "-" => {
                self.advance();
                let number = self.peek().clone();
                if number.kind != TokenKind::Number {
                    return Err(self.error_here("expected an integer after '-' in pattern"));
                }
                self.advance();
                let value = format!("-{}", number.text)
                    .parse::<i64>()
                    .map_err(|_| ParseError {
                        message: "integer literal is out of range".to_string(),
                        range: number.range,
                    })?;
                Ok(Pattern::Literal {
                    value: Literal::Int(value),
                    range: token.range.merge(number.range),
                })
            }
            TokenKind::Symbol if token.text == "(" => {
                self.advance();
                if self.check_symbol(")") {
                    let end = self.advance().range;
                    return Ok(Pattern::Literal {
                        value: Literal::Unit,
                        range: token.range.merge(end),
                    });
                }
                let first = self.parse_pattern()?;
                if !self.check_symbol(",") {
                    self.expect_symbol(")")?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.consume_symbol(",") {
                    items.push(self.parse_pattern()?);
                }
                let end = self.expect_symbol(")")?;
                Ok(Pattern::Tuple {
                    items,
                    range: token.range.merge(end),
                })
            }
            TokenKind::Symbol if token.text == "[" => {
                self.advance();
                let mut items = Vec::new();
                if !self.check_symbol("]") {
                    loop {
                        items.push(self.parse_pattern()?);
                        if !self.consume_symbol(",") {
                            break;
                        }
                    }
                }
                let end = self.expect_symbol("]")?;
                // `[p, q]` is sugar for `p :: q :: []`.
                let mut pattern = Pattern::Nil(end);
                for item in items.into_iter().rev() {
                    let range = pattern_range(&item).merge(end);
                    pattern = Pattern::Cons {
                        head: Box::new(item),
                        tail: Box::new(pattern),
                        range,
                    };
                }
                if let Pattern::Nil(_) = pattern {
                    pattern = Pattern::Nil(token.range.merge(end));
                }
                Ok(pattern)
            }
            _ => Err(self.error_here("expected a pattern")),
        }
    }
}

/// Binary operators become applications of the primitive of the same name;
/// `&&` and `||` become conditionals so the right operand is only evaluated
/// when needed.
fn desugar_binary(op: &str, op_range: Range, left: Expr, right: Expr) -> Expr {
    let range = expr_range(&left).merge(expr_range(&right));
    let literal = |value: bool| Expr::Literal {
        value: Literal::Bool(value),
        range: op_range,
    };
    match op {
        "&&" => Expr::If {
            cond: Box::new(left),
            then_branch: Box::new(right),
            else_branch: Box::new(literal(false)),
            range,
        },
        "||" => Expr::If {
            cond: Box::new(left),
            then_branch: Box::new(literal(true)),
            else_branch: Box::new(right),
            range,
        },
        _ => {
            let func = Expr::Var(SpannedName {
                name: op.to_string(),
                range: op_range,
            });
            let partial = Expr::Apply {
                func: Box::new(func),
                arg: Box::new(left),
                range,
            };
            Expr::Apply {
                func: Box::new(partial),
                arg: Box::new(right),
                range,
            }
        }
    }
}

enum Node<'a> {
    Expr(&'a Expr),
    Pattern(&'a Pattern),
    Type(&'a TypeExpr),
}

/// Depth of the deepest path in the program, measured without recursion.
fn nesting_depth(program: &Program) -> usize {
    let mut pending = vec![(Node::Expr(&program.body), 1)];
    for decl in program.type_groups.iter().flatten() {
        match decl {
            TypeDecl::Variant { constructors, .. } => {
                for ctor in constructors {
                    pending.extend(ctor.args.iter().map(|arg| (Node::Type(arg), 1)));
                }
            }
            TypeDecl::Synonym { body, .. } => pending.push((Node::Type(body), 1)),
        }
    }
    let mut deepest = 0;
    while let Some((node, depth)) = pending.pop() {
        deepest = deepest.max(depth);
        let below = depth + 1;
        match node {
            Node::Expr(expr) => match expr {
                Expr::Literal { .. } | Expr::Var(_) => {}
                Expr::Lambda { body, .. } => pending.push((Node::Expr(body), below)),
                Expr::Apply { func, arg, .. } => {
                    pending.push((Node::Expr(func), below));
                    pending.push((Node::Expr(arg), below));
                }
                Expr::Let { value, body, .. } => {
                    pending.push((Node::Expr(value), below));
                    pending.push((Node::Expr(body), below));
                }
                Expr::LetRec { bindings, body, .. } => {
                    pending.extend(bindings.iter().map(|b| (Node::Expr(&b.value), below)));
                    pending.push((Node::Expr(body), below));
                }
                Expr::If {
                    cond,
                    then_branch,
                    else_branch,
                    ..
                } => {
                    pending.push((Node::Expr(cond), below));
                    pending.push((Node::Expr(then_branch), below));
                    pending.push((Node::Expr(else_branch), below));
                }
                Expr::List { items, .. } | Expr::Tuple { items, .. } => {
                    pending.extend(items.iter().map(|item| (Node::Expr(item), below)));
                }
                Expr::Record { fields, .. } => {
                    pending.extend(fields.iter().map(|(_, value)| (Node::Expr(value), below)));
                }
                Expr::Field { base, .. } => pending.push((Node::Expr(base), below)),
                Expr::Update { base, fields, .. } => {
                    pending.push((Node::Expr(base), below));
                    pending.extend(fields.iter().map(|(_, value)| (Node::Expr(value), below)));
                }
                Expr::Construct { arg, .. } => {
                    if let Some(arg) = arg {
                        pending.push((Node::Expr(arg), below));
                    }
                }
                Expr::Match {
                    scrutinee, arms, ..
                } => {
                    pending.push((Node::Expr(scrutinee), below));
                    for arm in arms {
                        pending.push((Node::Pattern(&arm.pattern), below));
                        pending.push((Node::Expr(&arm.body), below));
                    }
                }
                Expr::Ref { value: inner, .. } | Expr::Deref { target: inner, .. } => {
                    pending.push((Node::Expr(inner), below));
                }
                Expr::Assign { target, value, .. } => {
                    pending.push((Node::Expr(target), below));
                    pending.push((Node::Expr(value), below));
                }
                Expr::Sequence { first, second, .. } => {
                    pending.push((Node::Expr(first), below));
                    pending.push((Node::Expr(second), below));
                }
                Expr::Annot { expr, ty, .. } => {
                    pending.push((Node::Expr(expr), below));
                    pending.push((Node::Type(ty), below));
                }
            },
            Node::Pattern(pattern) => match pattern {
                Pattern::Wildcard(_)
                | Pattern::Var(_)
                | Pattern::Literal { .. }
                | Pattern::Nil(_)
                | Pattern::Constructor { arg: None, .. } => {}
                Pattern::Tuple { items, .. } => {
                    pending.extend(items.iter().map(|item| (Node::Pattern(item), below)));
                }
                Pattern::Cons { head, tail, .. } => {
                    pending.push((Node::Pattern(head), below));
                    pending.push((Node::Pattern(tail), below));
                }
                Pattern::Constructor {
                    arg: Some(inner), ..
                }
                | Pattern::As { pattern: inner, .. } => {
                    pending.push((Node::Pattern(inner), below));
                }
            },
            Node::Type(ty) => match ty {
                TypeExpr::Var(_) => {}
                TypeExpr::Name { args: items, .. } | TypeExpr::Product { items, .. } => {
                    pending.extend(items.iter().map(|item| (Node::Type(item), below)));
                }
                TypeExpr::Func { param, result, .. } => {
                    pending.push((Node::Type(param), below));
                    pending.push((Node::Type(result), below));
                }
                TypeExpr::Record { fields, .. } => {
                    pending.extend(fields.iter().map(|(_, field)| (Node::Type(field), below)));
                }
            },
        }
    }
    deepest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse(source: &str) -> Program {
        parse_program(lex(source).expect("lex")).expect("parse")
    }

    fn parse_err(source: &str) -> ParseError {
        parse_program(lex(source).expect("lex")).unwrap_err()
    }

    fn var_name(expr: &Expr) -> &str {
        match expr {
            Expr::Var(name) => &name.name,
            other => panic!("expected variable, got {other:?}"),
        }
    }

    #[test]
    fn binary_operators_respect_precedence() {
        let program = parse("1 + 2 * 3");
        let Expr::Apply { func, arg, .. } = &program.body else {
            panic!("expected application");
        };
        let Expr::Apply { func: op, .. } = func.as_ref() else {
            panic!("expected partial application");
        };
        assert_eq!(var_name(op), "+");
        let Expr::Apply { func: inner, .. } = arg.as_ref() else {
            panic!("expected multiplication on the right");
        };
        let Expr::Apply { func: op, .. } = inner.as_ref() else {
            panic!("expected partial application");
        };
        assert_eq!(var_name(op), "*");
    }

    #[test]
    fn logical_operators_desugar_to_conditionals() {
        let program = parse("true && false");
        assert!(matches!(program.body, Expr::If { .. }));
    }

    #[test]
    fn let_with_parameters_builds_lambdas() {
        let program = parse("let f x y = x in f");
        let Expr::Let { name, value, .. } = &program.body else {
            panic!("expected let");
        };
        assert_eq!(name.name, "f");
        let Expr::Lambda { param, body, .. } = value.as_ref() else {
            panic!("expected lambda");
        };
        assert_eq!(param.name, "x");
        assert!(matches!(body.as_ref(), Expr::Lambda { .. }));
    }

    #[test]
    fn tuple_let_becomes_match() {
        let program = parse("let (a, b) = (1, 2) in a");
        let Expr::Match { arms, .. } = &program.body else {
            panic!("expected match");
        };
        assert!(matches!(arms[0].pattern, Pattern::Tuple { .. }));
    }

    #[test]
    fn parses_type_declarations() {
        let program = parse(
            "type 'a tree = Leaf | Node of 'a tree * 'a * 'a tree \
             and point = {x : int, y : int} in Leaf",
        );
        assert_eq!(program.type_groups.len(), 1);
        let group = &program.type_groups[0];
        let TypeDecl::Variant { constructors, params, .. } = &group[0] else {
            panic!("expected variant");
        };
        assert_eq!(params.len(), 1);
        assert_eq!(constructors[1].args.len(), 3);
        assert!(matches!(group[1], TypeDecl::Synonym { .. }));
    }

    #[test]
    fn record_forms() {
        let program = parse("{ {a = 1} with a = 2 }.a");
        let Expr::Field { base, field, .. } = &program.body else {
            panic!("expected field access");
        };
        assert_eq!(field.name, "a");
        assert!(matches!(base.as_ref(), Expr::Update { .. }));
    }

    #[test]
    fn list_patterns_desugar_to_cons() {
        let program = parse("match [1] with | [x] -> x | _ -> 0");
        let Expr::Match { arms, .. } = &program.body else {
            panic!("expected match");
        };
        assert!(matches!(arms[0].pattern, Pattern::Cons { .. }));
        assert!(matches!(arms[1].pattern, Pattern::Wildcard(_)));
    }

    #[test]
    fn sequence_and_assignment() {
        let program = parse("let r = ref 0 in r := 1; !r");
        let Expr::Let { body, .. } = &program.body else {
            panic!("expected let");
        };
        let Expr::Sequence { first, second, .. } = body.as_ref() else {
            panic!("expected sequence");
        };
        assert!(matches!(first.as_ref(), Expr::Assign { .. }));
        assert!(matches!(second.as_ref(), Expr::Deref { .. }));
    }

    #[test]
    fn annotation_in_parentheses() {
        let program = parse("(fun x -> x : int -> int)");
        assert!(matches!(program.body, Expr::Annot { .. }));
    }

    #[test]
    fn reports_missing_in() {
        let err = parse_err("let x = 1 x");
        assert!(err.message.starts_with("expected 'in'"), "{}", err.message);
    }

    #[test]
    fn reports_trailing_tokens() {
        let err = parse_err("1 )");
        assert!(err.message.contains("unexpected token"));
    }

    #[test]
    fn long_operator_chains_hit_the_nesting_limit() {
        let terms = vec!["1"; 5000].join(" + ");
        let err = parse_err(&terms);
        assert!(err.message.contains("nested too deeply"), "{err}");

        let terms = vec!["1"; 200].join(" + ");
        let program = parse(&terms);
        assert!(nesting_depth(&program) <= MAX_NESTING);
    }

    #[test]
    fn deeply_parenthesised_expressions_are_rejected() {
        let source = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
        let err = parse_err(&source);
        assert!(err.message.contains("nested too deeply"), "{err}");
        let source = format!("(1 : {}int{})", "(".repeat(3000), ")".repeat(3000));
        let err = parse_err(&source);
        assert!(err.message.contains("nested too deeply"), "{err}");
    }

    #[test]
    fn long_sequences_are_parsed_without_recursion() {
        let program = parse(&vec!["()"; 500].join("; "));
        assert!(matches!(program.body, Expr::Sequence { .. }));
        let err = parse_err(&vec!["()"; 5000].join("; "));
        assert!(err.message.contains("nested too deeply"), "{err}");
    }

    #[test]
    fn empty_token_streams_are_a_parse_error() {
        assert!(parse_program(Vec::new()).is_err());
    }
}
