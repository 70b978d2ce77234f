//! Arena-allocated surface syntax.
//!
//! The parser produces this tree; it carries spans and unresolved names
//! but no types. Lowering resolves names against the signature table,
//! assigns types, and interns the result into the kernel's term store,
//! after which the whole tree is dropped at once.
//!
//! # Allocation discipline
//!
//! One parse, one [`Arenas`], one bump allocation region. Nodes reference
//! each other by plain `&'a` borrows tied to the arena, so there is no
//! per-node box or reference count, and freeing the parse is freeing the
//! bump. Because a bump region never runs destructors, nothing owning heap
//! memory may live in the tree: string literals are copied into the arena
//! as `&'a str` rather than held as `String`.

use bumpalo::Bump;
use noesis_base::{Span, Symbol};
use noesis_kernel::{ConnectiveKind, ModalOp, QuantKind};

/// The allocation region backing one parse.
pub struct Arenas {
    bump: Bump,
}

impl Arenas {
    pub fn new() -> Self {
        Arenas { bump: Bump::new() }
    }

    /// Allocates one expression node.
    pub fn expr<'a>(&'a self, e: SurfaceExpr<'a>) -> &'a SurfaceExpr<'a> {
        self.bump.alloc(e)
    }

    /// Allocates an operand list (application arguments, connective
    /// operands).
    pub fn expr_list<'a>(&'a self, items: Vec<&'a SurfaceExpr<'a>>) -> &'a [&'a SurfaceExpr<'a>] {
        self.bump.alloc_slice_fill_iter(items)
    }

    /// Allocates a binder list for a quantifier or lambda.
    pub fn binder_list<'a>(&'a self, items: Vec<Binder<'a>>) -> &'a [Binder<'a>] {
        self.bump.alloc_slice_fill_iter(items)
    }

    /// Allocates one type expression.
    pub fn ty<'a>(&'a self, t: SurfaceType<'a>) -> &'a SurfaceType<'a> {
        self.bump.alloc(t)
    }

    /// Allocates a type-argument list.
    pub fn type_list<'a>(&'a self, items: Vec<SurfaceType<'a>>) -> &'a [SurfaceType<'a>] {
        self.bump.alloc_slice_fill_iter(items)
    }

    /// Copies literal text into the arena. The tree must not own heap
    /// memory (the bump runs no destructors), so string literals live here
    /// as borrowed slices.
    pub fn text<'a>(&'a self, s: &str) -> &'a str {
        self.bump.alloc_str(s)
    }
}

impl Default for Arenas {
    fn default() -> Self {
        Self::new()
    }
}

/// A quantifier or lambda binder: `?x` with an optional type annotation.
#[derive(Debug)]
pub struct Binder<'a> {
    pub name: Symbol,
    pub ty: Option<SurfaceType<'a>>,
    pub span: Span,
}

/// An unresolved type expression.
#[derive(Debug, Clone, Copy)]
pub enum SurfaceType<'a> {
    /// `Entity`, `Boolean`, ...
    Named(Symbol),
    /// `List(Entity)`.
    Applied { ctor: Symbol, args: &'a [SurfaceType<'a>] },
    /// `(A, B) -> C`.
    Func { args: &'a [SurfaceType<'a>], ret: &'a SurfaceType<'a> },
    /// `?a` in type position.
    Var(Symbol),
}

/// A parsed expression before name resolution and typing.
#[derive(Debug)]
pub enum SurfaceExpr<'a> {
    /// Constant or predicate name.
    Ident { name: Symbol, span: Span },

    /// `?x`.
    Var { name: Symbol, span: Span },

    /// Integer literal.
    Int { value: i64, span: Span },

    /// Real literal.
    Real { value: f64, span: Span },

    /// String literal, copied into the arena.
    Str { value: &'a str, span: Span },

    /// `f(a, b)` or `(app f a b)`.
    App {
        head: &'a SurfaceExpr<'a>,
        args: &'a [&'a SurfaceExpr<'a>],
        span: Span,
    },

    /// Connective application; `operands` length follows the connective.
    Connective {
        kind: ConnectiveKind,
        operands: &'a [&'a SurfaceExpr<'a>],
        span: Span,
    },

    /// `forall ?x:T. body` / `exists ?x:T. body`.
    Quant {
        kind: QuantKind,
        binders: &'a [Binder<'a>],
        body: &'a SurfaceExpr<'a>,
        span: Span,
    },

    /// `λ?x:T. body`.
    Lambda {
        binders: &'a [Binder<'a>],
        body: &'a SurfaceExpr<'a>,
        span: Span,
    },

    /// `□φ`, `◇φ`, `K_a φ`, `B_a φ`.
    Modal {
        op: ModalOp,
        index: Option<&'a SurfaceExpr<'a>>,
        body: &'a SurfaceExpr<'a>,
        span: Span,
    },

    /// `define name : T = body`.
    Define {
        name: Symbol,
        ty: SurfaceType<'a>,
        body: &'a SurfaceExpr<'a>,
        span: Span,
    },
}

impl<'a> SurfaceExpr<'a> {
    pub fn span(&self) -> Span {
        match self {
            SurfaceExpr::Ident { span, .. }
            | SurfaceExpr::Var { span, .. }
            | SurfaceExpr::Int { span, .. }
            | SurfaceExpr::Real { span, .. }
            | SurfaceExpr::Str { span, .. }
            | SurfaceExpr::App { span, .. }
            | SurfaceExpr::Connective { span, .. }
            | SurfaceExpr::Quant { span, .. }
            | SurfaceExpr::Lambda { span, .. }
            | SurfaceExpr::Modal { span, .. }
            | SurfaceExpr::Define { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_survives_in_the_arena() {
        let arenas = Arenas::new();
        let copied = {
            let owned = String::from("hello");
            arenas.text(&owned)
        };
        // The source string is gone; the arena copy is still valid.
        assert_eq!(copied, "hello");
    }

    #[test]
    fn lists_preserve_order() {
        let arenas = Arenas::new();
        let a = arenas.expr(SurfaceExpr::Int { value: 1, span: Span::dummy() });
        let b = arenas.expr(SurfaceExpr::Int { value: 2, span: Span::dummy() });
        let list = arenas.expr_list(vec![a, b]);
        assert!(matches!(list[0], SurfaceExpr::Int { value: 1, .. }));
        assert!(matches!(list[1], SurfaceExpr::Int { value: 2, .. }));
    }

    #[test]
    fn empty_lists_are_fine() {
        let arenas = Arenas::new();
        assert!(arenas.expr_list(Vec::new()).is_empty());
        assert!(arenas.type_list(Vec::new()).is_empty());
    }
}
