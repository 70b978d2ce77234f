//! Recursive-descent parser for the formula language.
//!
//! Two concrete syntaxes feed the same surface tree:
//!
//! - the infix grammar (`forall ?x:T. Man(?x) => Mortal(?x)`), with the
//!   standard precedence `¬ > ∧ > ∨ > ⇒ > ≡` and right-associative `⇒`;
//! - the S-expression serialization form (`(forall (?x T) (app Man ?x))`),
//!   which is what the printer emits.
//!
//! A leading `(` is ambiguous between the two. When the token after it can
//! head a serialized form (`app`, `modal`, `define`, a connective, or a
//! binder keyword), the reader is tried first and the parser backtracks to
//! an infix group if it fails; a connective token cannot begin an infix
//! formula, so every successful serialized reading is unambiguous.
//!
//! The parser is pure and re-entrant: it reads a token slice, allocates
//! into the caller's arenas, and keeps no other state.

use noesis_base::{Interner, Span, Symbol};
use noesis_kernel::{ConnectiveKind, ModalOp, QuantKind};

use crate::error::ParseError;
use crate::surface::{Arenas, Binder, SurfaceExpr, SurfaceType};
use crate::token::{Token, TokenKind};

/// Contextual keywords recognized in S-expression head position.
#[derive(Debug, Clone, Copy)]
pub struct Keywords {
    pub app: Symbol,
    pub modal: Symbol,
    pub knows: Symbol,
    pub believes: Symbol,
}

impl Keywords {
    pub fn intern(interner: &mut Interner) -> Self {
        Keywords {
            app: interner.intern("app"),
            modal: interner.intern("modal"),
            knows: interner.intern("knows"),
            believes: interner.intern("believes"),
        }
    }
}

/// Parses a complete input: one definition or one formula, then EOF.
pub fn parse<'a>(
    tokens: &[Token],
    arenas: &'a Arenas,
    kw: Keywords,
) -> Result<&'a SurfaceExpr<'a>, ParseError> {
    let mut p = Parser { tokens, pos: 0, arenas, kw };
    let expr = if p.at(&TokenKind::Define) {
        p.parse_define()?
    } else {
        p.parse_formula()?
    };
    p.expect_eof()?;
    Ok(expr)
}

/// Parses a standalone type, accepting both the serialized and the infix
/// form (used by the snapshot reader).
pub fn parse_type_surface<'a>(
    tokens: &[Token],
    arenas: &'a Arenas,
    kw: Keywords,
) -> Result<SurfaceType<'a>, ParseError> {
    let mut p = Parser { tokens, pos: 0, arenas, kw };
    if let Ok(ty) = p.parse_sexpr_type() {
        if p.expect_eof().is_ok() {
            return Ok(ty);
        }
    }
    let mut p = Parser { tokens, pos: 0, arenas, kw };
    let ty = p.parse_type()?;
    p.expect_eof()?;
    Ok(ty)
}

struct Parser<'a, 't> {
    tokens: &'t [Token],
    pos: usize,
    arenas: &'a Arenas,
    kw: Keywords,
}

impl<'a, 't> Parser<'a, 't> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(ParseError::syntax(what, self.peek().span))
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(ParseError::syntax("end of input", self.peek().span))
        }
    }

    fn alloc(&self, e: SurfaceExpr<'a>) -> &'a SurfaceExpr<'a> {
        self.arenas.expr(e)
    }

    fn alloc_refs(&self, items: Vec<&'a SurfaceExpr<'a>>) -> &'a [&'a SurfaceExpr<'a>] {
        self.arenas.expr_list(items)
    }

    // ------------------------------------------------------------------
    // Infix grammar
    // ------------------------------------------------------------------

    fn parse_formula(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        self.parse_iff()
    }

    fn parse_iff(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let mut lhs = self.parse_implies()?;
        while self.at(&TokenKind::Iff) {
            self.bump();
            let rhs = self.parse_implies()?;
            let span = lhs.span().merge(rhs.span());
            lhs = self.alloc(SurfaceExpr::Connective {
                kind: ConnectiveKind::Equiv,
                operands: self.alloc_refs(vec![lhs, rhs]),
                span,
            });
        }
        Ok(lhs)
    }

    fn parse_implies(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let lhs = self.parse_or()?;
        if self.at(&TokenKind::Implies) {
            self.bump();
            // Right-associative.
            let rhs = self.parse_implies()?;
            let span = lhs.span().merge(rhs.span());
            return Ok(self.alloc(SurfaceExpr::Connective {
                kind: ConnectiveKind::Implies,
                operands: self.alloc_refs(vec![lhs, rhs]),
                span,
            }));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let first = self.parse_and()?;
        if !self.at(&TokenKind::Or) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(&TokenKind::Or) {
            operands.push(self.parse_and()?);
        }
        let span = operands[0].span().merge(operands.last().unwrap().span());
        Ok(self.alloc(SurfaceExpr::Connective {
            kind: ConnectiveKind::Or,
            operands: self.alloc_refs(operands),
            span,
        }))
    }

    fn parse_and(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let first = self.parse_unary()?;
        if !self.at(&TokenKind::And) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(&TokenKind::And) {
            operands.push(self.parse_unary()?);
        }
        let span = operands[0].span().merge(operands.last().unwrap().span());
        Ok(self.alloc(SurfaceExpr::Connective {
            kind: ConnectiveKind::And,
            operands: self.alloc_refs(operands),
            span,
        }))
    }

    fn parse_unary(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Not => {
                self.bump();
                let body = self.parse_unary()?;
                let span = tok.span.merge(body.span());
                Ok(self.alloc(SurfaceExpr::Connective {
                    kind: ConnectiveKind::Not,
                    operands: self.alloc_refs(vec![body]),
                    span,
                }))
            }
            TokenKind::Box => {
                self.bump();
                let body = self.parse_unary()?;
                let span = tok.span.merge(body.span());
                Ok(self.alloc(SurfaceExpr::Modal {
                    op: ModalOp::Necessity,
                    index: None,
                    body,
                    span,
                }))
            }
            TokenKind::Diamond => {
                self.bump();
                let body = self.parse_unary()?;
                let span = tok.span.merge(body.span());
                Ok(self.alloc(SurfaceExpr::Modal {
                    op: ModalOp::Possibility,
                    index: None,
                    body,
                    span,
                }))
            }
            TokenKind::Knows(agent) => {
                let agent = *agent;
                self.bump();
                let body = self.parse_unary()?;
                let span = tok.span.merge(body.span());
                let index = self.alloc(SurfaceExpr::Ident { name: agent, span: tok.span });
                Ok(self.alloc(SurfaceExpr::Modal {
                    op: ModalOp::Knows,
                    index: Some(index),
                    body,
                    span,
                }))
            }
            TokenKind::Believes(agent) => {
                let agent = *agent;
                self.bump();
                let body = self.parse_unary()?;
                let span = tok.span.merge(body.span());
                let index = self.alloc(SurfaceExpr::Ident { name: agent, span: tok.span });
                Ok(self.alloc(SurfaceExpr::Modal {
                    op: ModalOp::Believes,
                    index: Some(index),
                    body,
                    span,
                }))
            }
            TokenKind::Forall => {
                self.bump();
                self.parse_quantified(QuantKind::Forall, tok.span)
            }
            TokenKind::Exists => {
                self.bump();
                self.parse_quantified(QuantKind::Exists, tok.span)
            }
            TokenKind::Lambda => {
                self.bump();
                let binders = self.parse_binders()?;
                self.expect(&TokenKind::Dot, "'.' after lambda binders")?;
                let body = self.parse_formula()?;
                let span = tok.span.merge(body.span());
                Ok(self.alloc(SurfaceExpr::Lambda { binders, body, span }))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_quantified(
        &mut self,
        kind: QuantKind,
        start: Span,
    ) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let binders = self.parse_binders()?;
        self.expect(&TokenKind::Dot, "'.' after quantifier binders")?;
        let body = self.parse_formula()?;
        let span = start.merge(body.span());
        Ok(self.alloc(SurfaceExpr::Quant { kind, binders, body, span }))
    }

    /// One or more `?x[:type]` binders, separated by commas or juxtaposed.
    fn parse_binders(&mut self) -> Result<&'a [Binder<'a>], ParseError> {
        let mut binders = Vec::new();
        loop {
            let tok = self.peek().clone();
            let name = match tok.kind {
                TokenKind::Var(sym) => {
                    self.bump();
                    sym
                }
                _ => {
                    if binders.is_empty() {
                        return Err(ParseError::syntax("binder variable (?x)", tok.span));
                    }
                    break;
                }
            };
            let ty = if self.eat(&TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            binders.push(Binder { name, ty, span: tok.span });
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if matches!(self.peek().kind, TokenKind::Var(_)) {
                continue;
            }
            break;
        }
        Ok(self.arenas.binder_list(binders))
    }

    fn parse_primary(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::LParen => {
                // A serialized form and an infix group both start with '('.
                // If the head token can open an S-expression, try that
                // reading first and fall back to the infix group on
                // failure: `(and P Q)` is serialized (a connective cannot
                // start an infix formula), `(not P and Q)` is infix.
                if self.sexpr_head_follows() {
                    let saved = self.pos;
                    match self.parse_sexpr() {
                        Ok(e) => return Ok(e),
                        Err(_) => self.pos = saved,
                    }
                }
                self.bump();
                let inner = self.parse_formula()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                let name = *name;
                self.bump();
                if self.at(&TokenKind::LParen) {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_formula()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let close = self.expect(&TokenKind::RParen, "')' after arguments")?;
                    let head = self.alloc(SurfaceExpr::Ident { name, span: tok.span });
                    let span = tok.span.merge(close.span);
                    return Ok(self.alloc(SurfaceExpr::App {
                        head,
                        args: self.alloc_refs(args),
                        span,
                    }));
                }
                Ok(self.alloc(SurfaceExpr::Ident { name, span: tok.span }))
            }
            TokenKind::Var(name) => {
                let name = *name;
                self.bump();
                Ok(self.alloc(SurfaceExpr::Var { name, span: tok.span }))
            }
            TokenKind::Int(v) => {
                let v = *v;
                self.bump();
                Ok(self.alloc(SurfaceExpr::Int { value: v, span: tok.span }))
            }
            TokenKind::Real(v) => {
                let v = *v;
                self.bump();
                Ok(self.alloc(SurfaceExpr::Real { value: v, span: tok.span }))
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Ok(self.alloc(SurfaceExpr::Str { value: self.arenas.text(&s), span: tok.span }))
            }
            _ => Err(ParseError::syntax("a formula or term", tok.span)),
        }
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn parse_type(&mut self) -> Result<SurfaceType<'a>, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Ident(name) => {
                let name = *name;
                self.bump();
                if self.eat(&TokenKind::LParen) {
                    let mut args = Vec::new();
                    loop {
                        args.push(self.parse_type()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen, "')' after type arguments")?;
                    return Ok(SurfaceType::Applied {
                        ctor: name,
                        args: self.arenas.type_list(args),
                    });
                }
                Ok(SurfaceType::Named(name))
            }
            TokenKind::Var(name) => {
                let name = *name;
                self.bump();
                Ok(SurfaceType::Var(name))
            }
            TokenKind::LParen => {
                // `(A, B) -> C`
                self.bump();
                let mut args = Vec::new();
                if !self.at(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_type()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "')' in function type")?;
                self.expect(&TokenKind::Arrow, "'->' in function type")?;
                let ret = self.parse_type()?;
                Ok(SurfaceType::Func {
                    args: self.arenas.type_list(args),
                    ret: self.arenas.ty(ret),
                })
            }
            _ => Err(ParseError::syntax("a type", tok.span)),
        }
    }

    fn parse_define(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let start = self.expect(&TokenKind::Define, "'define'")?;
        let name_tok = self.bump();
        let name = match name_tok.kind {
            TokenKind::Ident(sym) => sym,
            _ => return Err(ParseError::syntax("a name after 'define'", name_tok.span)),
        };
        self.expect(&TokenKind::Colon, "':' after definition name")?;
        let ty = self.parse_type()?;
        self.expect(&TokenKind::Eq, "'=' before definition body")?;
        let body = self.parse_formula()?;
        let span = start.span.merge(body.span());
        Ok(self.alloc(SurfaceExpr::Define { name, ty, body, span }))
    }

    // ------------------------------------------------------------------
    // S-expression reader
    // ------------------------------------------------------------------

    /// `true` when the token after a `(` can head a serialized form.
    fn sexpr_head_follows(&self) -> bool {
        match &self.peek_at(1).kind {
            TokenKind::Ident(sym) => *sym == self.kw.app || *sym == self.kw.modal,
            TokenKind::Define
            | TokenKind::Not
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Implies
            | TokenKind::Iff
            | TokenKind::Forall
            | TokenKind::Exists
            | TokenKind::Lambda => true,
            _ => false,
        }
    }

    fn parse_sexpr(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let open = self.expect(&TokenKind::LParen, "'('")?;
        let head = self.bump();
        match &head.kind {
            TokenKind::Ident(sym) if *sym == self.kw.app => {
                let op = self.parse_sexpr_operand()?;
                let mut args = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    args.push(self.parse_sexpr_operand()?);
                }
                let close = self.expect(&TokenKind::RParen, "')'")?;
                Ok(self.alloc(SurfaceExpr::App {
                    head: op,
                    args: self.alloc_refs(args),
                    span: open.span.merge(close.span),
                }))
            }
            TokenKind::Ident(sym) if *sym == self.kw.modal => {
                let op = self.parse_modal_name()?;
                let mut operands = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    operands.push(self.parse_sexpr_operand()?);
                }
                let close = self.expect(&TokenKind::RParen, "')'")?;
                let span = open.span.merge(close.span);
                match operands.len() {
                    1 => Ok(self.alloc(SurfaceExpr::Modal {
                        op,
                        index: None,
                        body: operands[0],
                        span,
                    })),
                    2 => Ok(self.alloc(SurfaceExpr::Modal {
                        op,
                        index: Some(operands[0]),
                        body: operands[1],
                        span,
                    })),
                    _ => Err(ParseError::syntax("one or two modal operands", span)),
                }
            }
            TokenKind::Not | TokenKind::And | TokenKind::Or | TokenKind::Implies
            | TokenKind::Iff => {
                let kind = match head.kind {
                    TokenKind::Not => ConnectiveKind::Not,
                    TokenKind::And => ConnectiveKind::And,
                    TokenKind::Or => ConnectiveKind::Or,
                    TokenKind::Implies => ConnectiveKind::Implies,
                    _ => ConnectiveKind::Equiv,
                };
                let mut operands = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    operands.push(self.parse_sexpr_operand()?);
                }
                let close = self.expect(&TokenKind::RParen, "')'")?;
                Ok(self.alloc(SurfaceExpr::Connective {
                    kind,
                    operands: self.alloc_refs(operands),
                    span: open.span.merge(close.span),
                }))
            }
            TokenKind::Forall | TokenKind::Exists | TokenKind::Lambda => {
                let mut binders = Vec::new();
                // Binder groups: `(?x T)`, repeated. The body starts at the
                // first parenthesized form that is not a binder group.
                while self.at(&TokenKind::LParen)
                    && matches!(self.peek_at(1).kind, TokenKind::Var(_))
                {
                    self.bump();
                    let var_tok = self.bump();
                    let name = match var_tok.kind {
                        TokenKind::Var(sym) => sym,
                        _ => unreachable!(),
                    };
                    let ty = if self.at(&TokenKind::RParen) {
                        None
                    } else {
                        Some(self.parse_sexpr_type()?)
                    };
                    self.expect(&TokenKind::RParen, "')' after binder")?;
                    binders.push(Binder { name, ty, span: var_tok.span });
                }
                if binders.is_empty() {
                    return Err(ParseError::syntax("a binder group '(?x T)'", self.peek().span));
                }
                let body = self.parse_sexpr_operand()?;
                let close = self.expect(&TokenKind::RParen, "')'")?;
                let span = open.span.merge(close.span);
                let binders = self.arenas.binder_list(binders);
                match head.kind {
                    TokenKind::Forall => Ok(self.alloc(SurfaceExpr::Quant {
                        kind: QuantKind::Forall,
                        binders,
                        body,
                        span,
                    })),
                    TokenKind::Exists => Ok(self.alloc(SurfaceExpr::Quant {
                        kind: QuantKind::Exists,
                        binders,
                        body,
                        span,
                    })),
                    _ => Ok(self.alloc(SurfaceExpr::Lambda { binders, body, span })),
                }
            }
            TokenKind::Define => {
                let name_tok = self.bump();
                let name = match name_tok.kind {
                    TokenKind::Ident(sym) => sym,
                    _ => return Err(ParseError::syntax("a name after 'define'", name_tok.span)),
                };
                let ty = self.parse_sexpr_type()?;
                let body = self.parse_sexpr_operand()?;
                let close = self.expect(&TokenKind::RParen, "')'")?;
                Ok(self.alloc(SurfaceExpr::Define {
                    name,
                    ty,
                    body,
                    span: open.span.merge(close.span),
                }))
            }
            _ => Err(ParseError::syntax("an S-expression head", head.span)),
        }
    }

    fn parse_modal_name(&mut self) -> Result<ModalOp, ParseError> {
        let tok = self.bump();
        match &tok.kind {
            TokenKind::Box => Ok(ModalOp::Necessity),
            TokenKind::Diamond => Ok(ModalOp::Possibility),
            TokenKind::Ident(sym) if *sym == self.kw.knows => Ok(ModalOp::Knows),
            TokenKind::Ident(sym) if *sym == self.kw.believes => Ok(ModalOp::Believes),
            _ => Err(ParseError::syntax("box, diamond, knows, or believes", tok.span)),
        }
    }

    fn parse_sexpr_operand(&mut self) -> Result<&'a SurfaceExpr<'a>, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::LParen => self.parse_sexpr(),
            TokenKind::Ident(name) => {
                let name = *name;
                self.bump();
                Ok(self.alloc(SurfaceExpr::Ident { name, span: tok.span }))
            }
            TokenKind::Var(name) => {
                let name = *name;
                self.bump();
                Ok(self.alloc(SurfaceExpr::Var { name, span: tok.span }))
            }
            TokenKind::Int(v) => {
                let v = *v;
                self.bump();
                Ok(self.alloc(SurfaceExpr::Int { value: v, span: tok.span }))
            }
            TokenKind::Real(v) => {
                let v = *v;
                self.bump();
                Ok(self.alloc(SurfaceExpr::Real { value: v, span: tok.span }))
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Ok(self.alloc(SurfaceExpr::Str { value: self.arenas.text(&s), span: tok.span }))
            }
            _ => Err(ParseError::syntax("an S-expression operand", tok.span)),
        }
    }

    /// Types in serialized form: `Entity`, `?a`, `(List Entity)`,
    /// `(-> (A B) C)`.
    fn parse_sexpr_type(&mut self) -> Result<SurfaceType<'a>, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Ident(name) => {
                let name = *name;
                self.bump();
                Ok(SurfaceType::Named(name))
            }
            TokenKind::Var(name) => {
                let name = *name;
                self.bump();
                Ok(SurfaceType::Var(name))
            }
            TokenKind::LParen => {
                self.bump();
                if self.eat(&TokenKind::Arrow) {
                    self.expect(&TokenKind::LParen, "'(' before argument types")?;
                    let mut args = Vec::new();
                    while !self.at(&TokenKind::RParen) {
                        args.push(self.parse_sexpr_type()?);
                    }
                    self.expect(&TokenKind::RParen, "')' after argument types")?;
                    let ret = self.parse_sexpr_type()?;
                    self.expect(&TokenKind::RParen, "')' after function type")?;
                    return Ok(SurfaceType::Func {
                        args: self.arenas.type_list(args),
                        ret: self.arenas.ty(ret),
                    });
                }
                let ctor_tok = self.bump();
                let ctor = match ctor_tok.kind {
                    TokenKind::Ident(sym) => sym,
                    _ => return Err(ParseError::syntax("a type constructor", ctor_tok.span)),
                };
                let mut args = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    args.push(self.parse_sexpr_type()?);
                }
                self.expect(&TokenKind::RParen, "')' after type arguments")?;
                Ok(SurfaceType::Applied { ctor, args: self.arenas.type_list(args) })
            }
            _ => Err(ParseError::syntax("a type", tok.span)),
        }
    }
}
