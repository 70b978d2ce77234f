//! The formula language: text in, typed terms out, and back again.
//!
//! The pipeline is lex → parse (arena surface tree) → lower (resolve,
//! type, intern). [`Frontend`] bundles the pieces and keeps the free
//! variable registry that makes `?x` mean the same variable across parses.
//!
//! ```
//! use noesis_kernel::{prelude, TermStore, TypeTable};
//! use noesis_language::Frontend;
//!
//! let mut store = TermStore::new();
//! let mut types = TypeTable::new();
//! let core = prelude::install(&mut types, &mut store).unwrap();
//! let mut frontend = Frontend::new();
//!
//! let t = frontend
//!     .parse("forall ?x. Man(?x) => Mortal(?x)", &mut store, &mut types, &core)
//!     .unwrap();
//! let text = frontend.print(&mut store, t);
//! let back = frontend.parse(&text, &mut store, &mut types, &core).unwrap();
//! assert!(store.equal_mod_alpha(t, back));
//! ```

mod error;
mod lexer;
mod lower;
mod parser;
mod printer;
mod surface;
mod token;

pub use error::{ParseError, ParseErrorKind};
pub use lexer::lex;
pub use lower::Lowerer;
pub use parser::{parse as parse_surface, parse_type_surface, Keywords};
pub use printer::{print, print_type};
pub use surface::{Arenas, Binder, SurfaceExpr, SurfaceType};
pub use token::{Token, TokenKind};

use noesis_base::Span;
use noesis_kernel::{CoreTypes, TermId, TermStore, Type, TypeTable};

/// Parsing facade: owns the lowering state (free-variable registry,
/// strictness) and drives the full pipeline.
pub struct Frontend {
    lowerer: Lowerer,
}

impl Frontend {
    /// A forgiving frontend: unknown names are declared on first use.
    pub fn new() -> Self {
        Frontend { lowerer: Lowerer::new() }
    }

    /// A strict frontend: unknown names are errors.
    pub fn strict() -> Self {
        Frontend { lowerer: Lowerer::new().strict() }
    }

    /// Parses one formula or definition into a typed term.
    pub fn parse(
        &mut self,
        source: &str,
        store: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
    ) -> Result<TermId, Vec<ParseError>> {
        let kw = Keywords::intern(store.interner_mut());
        let tokens = lex(source, store.interner_mut())
            .map_err(|e| vec![ParseError::syntax(e.message, e.span)])?;
        let arenas = Arenas::new();
        let surface = parse_surface(&tokens, &arenas, kw).map_err(|e| vec![e])?;
        self.lowerer
            .lower(store, types, core, surface)
            .map_err(|e| vec![e])
    }

    /// Prints a term in the canonical serialized form.
    pub fn print(&self, store: &mut TermStore, t: TermId) -> String {
        print(store, t)
    }

    /// Parses a standalone type expression.
    pub fn parse_type(
        &mut self,
        source: &str,
        store: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
    ) -> Result<Type, Vec<ParseError>> {
        let kw = Keywords::intern(store.interner_mut());
        let tokens = lex(source, store.interner_mut())
            .map_err(|e| vec![ParseError::syntax(e.message, e.span)])?;
        let arenas = Arenas::new();
        let surface = parse_type_surface(&tokens, &arenas, kw).map_err(|e| vec![e])?;
        self.lowerer
            .resolve_type(store, types, core, &surface, Span::dummy())
            .map_err(|e| vec![e])
    }

    /// The registered free variable for `name`, if `?name` has been parsed.
    pub fn free_var(&self, name: noesis_base::Symbol) -> Option<TermId> {
        self.lowerer.free_var(name)
    }
}

impl Default for Frontend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_kernel::prelude;

    struct Fixture {
        store: TermStore,
        types: TypeTable,
        core: CoreTypes,
        frontend: Frontend,
    }

    fn fixture() -> Fixture {
        let mut store = TermStore::new();
        let mut types = TypeTable::new();
        let core = prelude::install(&mut types, &mut store).unwrap();
        Fixture { store, types, core, frontend: Frontend::new() }
    }

    fn roundtrip(fx: &mut Fixture, src: &str) {
        let t = fx
            .frontend
            .parse(src, &mut fx.store, &mut fx.types, &fx.core)
            .unwrap_or_else(|e| panic!("parse '{}': {:?}", src, e));
        let printed = fx.frontend.print(&mut fx.store, t);
        let back = fx
            .frontend
            .parse(&printed, &mut fx.store, &mut fx.types, &fx.core)
            .unwrap_or_else(|e| panic!("reparse '{}': {:?}", printed, e));
        assert!(
            fx.store.equal_mod_alpha(t, back),
            "round-trip changed '{}' -> '{}'",
            src,
            printed
        );
        // Printing the reparsed term must give back the same text.
        let printed_again = fx.frontend.print(&mut fx.store, back);
        assert_eq!(printed, printed_again);
    }

    #[test]
    fn roundtrips_ground_atom() {
        let mut fx = fixture();
        roundtrip(&mut fx, "Man(Socrates)");
    }

    #[test]
    fn roundtrips_quantified_rule() {
        let mut fx = fixture();
        roundtrip(&mut fx, "forall ?x. Man(?x) => Mortal(?x)");
    }

    #[test]
    fn roundtrips_modal_formula() {
        let mut fx = fixture();
        roundtrip(&mut fx, "□(P => Q) => (□P => □Q)");
    }

    #[test]
    fn roundtrips_epistemic_formula() {
        let mut fx = fixture();
        roundtrip(&mut fx, "K_alice Raining => B_bob Raining");
    }

    #[test]
    fn roundtrips_lambda() {
        let mut fx = fixture();
        roundtrip(&mut fx, "lambda ?x:Entity. Mortal(?x)");
    }

    #[test]
    fn roundtrips_nested_quantifiers() {
        let mut fx = fixture();
        roundtrip(&mut fx, "forall ?x. exists ?y. Loves(?x, ?y)");
    }

    #[test]
    fn roundtrips_free_variables() {
        let mut fx = fixture();
        roundtrip(&mut fx, "Mortal(?who)");
    }

    #[test]
    fn roundtrips_literals() {
        let mut fx = fixture();
        roundtrip(&mut fx, "Age(Socrates, 70)");
    }

    #[test]
    fn alpha_variants_print_identically() {
        let mut fx = fixture();
        let a = fx
            .frontend
            .parse("forall ?x. Mortal(?x)", &mut fx.store, &mut fx.types, &fx.core)
            .unwrap();
        let b = fx
            .frontend
            .parse("forall ?y. Mortal(?y)", &mut fx.store, &mut fx.types, &fx.core)
            .unwrap();
        assert_eq!(
            fx.frontend.print(&mut fx.store, a),
            fx.frontend.print(&mut fx.store, b)
        );
    }

    #[test]
    fn syntax_error_carries_span() {
        let mut fx = fixture();
        let errs = fx
            .frontend
            .parse("forall . P", &mut fx.store, &mut fx.types, &fx.core)
            .unwrap_err();
        assert!(!errs.is_empty());
    }
}
