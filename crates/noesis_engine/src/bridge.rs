//! External theory bridges (interface only).
//!
//! A bridge answers satisfiability questions for a fragment the core does
//! not decide itself — arithmetic, arrays, bitvectors, probabilistic
//! weights. The coordinator owns a registry keyed by theory tag, hands the
//! bridge the relevant subterms, and splices the verdict back into the
//! proof object as a single step. No concrete external tool lives in this
//! crate.

use noesis_kernel::{TermId, TermStore};

/// Options forwarded to a bridge invocation.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Wall-clock budget for the external call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        BridgeOptions { timeout_ms: 2_000 }
    }
}

/// A bridge's reply.
#[derive(Debug, Clone)]
pub enum TheoryVerdict {
    /// Satisfiable, optionally with a printable model.
    Sat { model: Option<String> },
    /// Unsatisfiable, optionally with an unsat core of assumption terms.
    Unsat { core: Vec<TermId> },
    /// No answer; the reason is surfaced to the caller.
    Unknown { reason: String },
}

/// The adapter contract for external decision procedures.
pub trait TheoryBridge {
    /// The tag this bridge answers for, e.g. `"arithmetic"`.
    fn theory_tag(&self) -> &str;

    /// Symbols whose presence in a goal routes it to this bridge.
    fn symbols(&self) -> Vec<&str>;

    /// Checks satisfiability of `formula` under `assumptions`.
    fn check_sat(
        &self,
        store: &mut TermStore,
        formula: TermId,
        assumptions: &[TermId],
        options: &BridgeOptions,
    ) -> TheoryVerdict;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A canned bridge for coordinator tests.
    pub struct FixedVerdictBridge {
        pub tag: String,
        pub trigger_symbols: Vec<String>,
        pub verdict: fn() -> TheoryVerdict,
    }

    impl TheoryBridge for FixedVerdictBridge {
        fn theory_tag(&self) -> &str {
            &self.tag
        }

        fn symbols(&self) -> Vec<&str> {
            self.trigger_symbols.iter().map(String::as_str).collect()
        }

        fn check_sat(
            &self,
            _store: &mut TermStore,
            _formula: TermId,
            _assumptions: &[TermId],
            _options: &BridgeOptions,
        ) -> TheoryVerdict {
            (self.verdict)()
        }
    }
}
