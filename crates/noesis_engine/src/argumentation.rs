//! Argumentation over strict and defeasible rules.
//!
//! Arguments are trees: facts and strict-rule applications at the leaves,
//! rule applications above them. Strictness propagates — an argument is
//! defeasible as soon as any defeasible rule appears in its tree. The
//! attack relation has the three classical forms:
//!
//! - **rebuttal**: conflicting conclusions, resolved by rule priority —
//!   the side with the strictly lower priority fails to attack back;
//!   strict conclusions cannot be rebutted at all;
//! - **undermining**: attacking the conclusion of a defeasible
//!   sub-argument;
//! - **undercutting**: concluding `¬applicable(r)` for a named defeasible
//!   rule `r` attacks every argument using that rule.
//!
//! Extensions: grounded (iterate "accept what every attacker of which is
//! already defeated" to fixpoint) and preferred (maximal admissible sets,
//! credulous membership).

use log::debug;
use noesis_base::Symbol;
use noesis_kernel::{substitute, Subst, TermData, TermId, TermStore};
use noesis_store::{match_terms, Binding};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::limits::{Budget, CancelFlag, ResourceLimits};

/// A defeasible rule `body ⇝ head`, optionally named for undercutting.
#[derive(Debug, Clone)]
pub struct DefeasibleRule {
    pub name: Option<Symbol>,
    pub body: Vec<TermId>,
    pub head: TermId,
    /// Higher priority wins rebuttals. Defaults to 0.
    pub priority: u32,
}

/// Which extension to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantics {
    /// Skeptical fixpoint.
    Grounded,
    /// Credulous membership in some maximal admissible set.
    Preferred,
}

#[derive(Debug, Clone)]
struct Argument {
    conclusion: TermId,
    /// Canonical id of the conclusion, for conflict detection.
    canon: TermId,
    sub_args: Vec<usize>,
    /// Index into the defeasible rule list, if the top rule is defeasible.
    defeasible_rule: Option<usize>,
    /// Name of the top defeasible rule, for undercutting.
    rule_name: Option<Symbol>,
    /// Any defeasible rule anywhere in the tree.
    defeasible: bool,
    /// Minimum priority of the defeasible rules used (u32::MAX if none).
    priority: u32,
}

/// The argumentation framework `(A, ⇁)`.
pub struct Framework {
    args: Vec<Argument>,
    attacks: Vec<(usize, usize)>,
}

impl Framework {
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn attack_count(&self) -> usize {
        self.attacks.len()
    }
}

/// Splits a strict statement into rule form where it is an implication.
fn split_strict(store: &TermStore, stmt: TermId) -> Option<(Vec<TermId>, TermId)> {
    use noesis_kernel::{ConnectiveKind, QuantKind};
    let implication = match store.data(stmt) {
        TermData::Quantifier { kind: QuantKind::Forall, body, .. } => *body,
        TermData::Connective { kind: ConnectiveKind::Implies, .. } => stmt,
        _ => return None,
    };
    match store.data(implication) {
        TermData::Connective { kind: ConnectiveKind::Implies, operands }
            if operands.len() == 2 =>
        {
            let body = match store.data(operands[0]) {
                TermData::Connective { kind: ConnectiveKind::And, operands: conj } => conj.clone(),
                _ => vec![operands[0]],
            };
            Some((body, operands[1]))
        }
        _ => None,
    }
}

/// Detects an undercutting conclusion `¬applicable(r)`, returning the rule
/// name.
fn undercut_target(store: &TermStore, conclusion: TermId) -> Option<Symbol> {
    use noesis_kernel::ConnectiveKind;
    let inner = match store.data(conclusion) {
        TermData::Connective { kind: ConnectiveKind::Not, operands } => operands[0],
        _ => return None,
    };
    if let TermData::Application { operator, arguments } = store.data(inner) {
        if arguments.len() == 1 {
            if let TermData::Constant { name, .. } = store.data(*operator) {
                if store.interner().resolve(*name) == "applicable" {
                    if let TermData::Constant { name: target, .. } = store.data(arguments[0]) {
                        return Some(*target);
                    }
                }
            }
        }
    }
    None
}

/// Builds the framework from strict statements and defeasible rules.
pub fn build_framework(
    store: &mut TermStore,
    core: &noesis_kernel::CoreTypes,
    strict: &[TermId],
    defeasible: &[DefeasibleRule],
    budget: &mut Budget,
) -> Framework {
    let mut args: Vec<Argument> = Vec::new();
    let mut seen: FxHashSet<(TermId, Option<usize>)> = FxHashSet::default();

    let mut strict_rules: Vec<(Vec<TermId>, TermId)> = Vec::new();
    for stmt in strict {
        match split_strict(store, *stmt) {
            Some(rule) => strict_rules.push(rule),
            None => {
                let canon = store.canon(*stmt);
                if seen.insert((canon, None)) {
                    args.push(Argument {
                        conclusion: *stmt,
                        canon,
                        sub_args: Vec::new(),
                        defeasible_rule: None,
                        rule_name: None,
                        defeasible: false,
                        priority: u32::MAX,
                    });
                }
            }
        }
    }

    // Forward chaining to a fixpoint (rule applications only ever combine
    // existing arguments, so this terminates once no new conclusion
    // appears).
    loop {
        if budget.tick().is_some() {
            break;
        }
        let before = args.len();

        for (body, head) in strict_rules.clone() {
            apply_rule(store, &mut args, &mut seen, &body, head, None, None, u32::MAX);
        }
        for (idx, rule) in defeasible.iter().enumerate() {
            apply_rule(
                store,
                &mut args,
                &mut seen,
                &rule.body,
                rule.head,
                Some(idx),
                rule.name,
                rule.priority,
            );
        }

        if args.len() == before {
            break;
        }
    }

    // Attack relation.
    let mut attacks = Vec::new();
    for (a_idx, a) in args.iter().enumerate() {
        for (b_idx, b) in args.iter().enumerate() {
            if a_idx == b_idx {
                continue;
            }
            if attacks_argument(store, core, &args, a, b) {
                attacks.push((a_idx, b_idx));
            }
        }
    }
    debug!("argumentation: {} arguments, {} attacks", args.len(), attacks.len());
    Framework { args, attacks }
}

/// Applies one rule in all ways its body can be satisfied by existing
/// argument conclusions.
#[allow(clippy::too_many_arguments)]
fn apply_rule(
    store: &mut TermStore,
    args: &mut Vec<Argument>,
    seen: &mut FxHashSet<(TermId, Option<usize>)>,
    body: &[TermId],
    head: TermId,
    rule_idx: Option<usize>,
    rule_name: Option<Symbol>,
    priority: u32,
) {
    let mut matches: Vec<(Binding, Vec<usize>)> = Vec::new();
    satisfy(store, args, body, 0, Binding::default(), Vec::new(), &mut matches);
    for (binding, subs) in matches {
        let subst: Subst = binding.iter().map(|(v, t)| (*v, *t)).collect();
        let conclusion = substitute(store, head, &subst);
        if !noesis_kernel::free_variables(store, conclusion).is_empty() {
            continue;
        }
        let canon = store.canon(conclusion);
        if !seen.insert((canon, rule_idx)) {
            continue;
        }
        let defeasible =
            rule_idx.is_some() || subs.iter().any(|s| args[*s].defeasible);
        let sub_priority =
            subs.iter().map(|s| args[*s].priority).min().unwrap_or(u32::MAX);
        args.push(Argument {
            conclusion,
            canon,
            sub_args: subs,
            defeasible_rule: rule_idx,
            rule_name,
            defeasible,
            priority: priority.min(sub_priority),
        });
    }
}

fn satisfy(
    store: &mut TermStore,
    args: &[Argument],
    body: &[TermId],
    idx: usize,
    binding: Binding,
    subs: Vec<usize>,
    out: &mut Vec<(Binding, Vec<usize>)>,
) {
    if idx == body.len() {
        out.push((binding, subs));
        return;
    }
    for (a_idx, arg) in args.iter().enumerate() {
        let mut extended = binding.clone();
        if match_terms(store, &mut extended, body[idx], arg.conclusion) {
            let mut subs2 = subs.clone();
            subs2.push(a_idx);
            satisfy(store, args, body, idx + 1, extended, subs2, out);
        }
    }
}

/// Does `a` attack `b`?
fn attacks_argument(
    store: &mut TermStore,
    core: &noesis_kernel::CoreTypes,
    args: &[Argument],
    a: &Argument,
    b: &Argument,
) -> bool {
    // Undercut: a concludes that one of b's defeasible rules (anywhere in
    // its tree) does not apply.
    if let Some(target) = undercut_target(store, a.conclusion) {
        if uses_rule_named(args, b, target) {
            return true;
        }
    }

    // Rebuttal of b itself or undermining of a defeasible sub-argument.
    let neg_a = noesis_store::negate(store, core, a.conclusion);
    let neg_a_canon = store.canon(neg_a);
    let mut targets = vec![b];
    let mut stack: Vec<usize> = b.sub_args.clone();
    while let Some(s) = stack.pop() {
        targets.push(&args[s]);
        stack.extend(args[s].sub_args.iter().copied());
    }
    for target in targets {
        if target.canon != neg_a_canon {
            continue;
        }
        // Strict conclusions cannot be attacked.
        if !target.defeasible {
            continue;
        }
        // Preference: the attack fails when the target is strictly
        // preferred (higher priority) and the attacker is defeasible too.
        if a.defeasible && target.priority > a.priority {
            continue;
        }
        return true;
    }
    false
}

/// Does `b` (or any sub-argument) use a defeasible rule with this name?
fn uses_rule_named(args: &[Argument], b: &Argument, name: Symbol) -> bool {
    if b.rule_name == Some(name) {
        return true;
    }
    let mut stack: Vec<usize> = b.sub_args.clone();
    while let Some(s) = stack.pop() {
        if args[s].rule_name == Some(name) {
            return true;
        }
        stack.extend(args[s].sub_args.iter().copied());
    }
    false
}

/// Conclusions justified under the requested semantics.
pub fn justified_beliefs(
    store: &mut TermStore,
    core: &noesis_kernel::CoreTypes,
    strict: &[TermId],
    defeasible: &[DefeasibleRule],
    semantics: Semantics,
    limits: ResourceLimits,
) -> FxHashSet<TermId> {
    let mut budget = Budget::with_cancel(limits, CancelFlag::new());
    let fw = build_framework(store, core, strict, defeasible, &mut budget);
    let accepted = match semantics {
        Semantics::Grounded => grounded_extension(&fw),
        Semantics::Preferred => preferred_members(&fw),
    };
    accepted.into_iter().map(|i| fw.args[i].conclusion).collect()
}

/// The grounded extension: iteratively accept arguments all of whose
/// attackers are already defeated.
fn grounded_extension(fw: &Framework) -> FxHashSet<usize> {
    let n = fw.args.len();
    let mut accepted: FxHashSet<usize> = FxHashSet::default();
    let mut defeated: FxHashSet<usize> = FxHashSet::default();
    loop {
        let mut changed = false;
        for i in 0..n {
            if accepted.contains(&i) || defeated.contains(&i) {
                continue;
            }
            let undefeated_attacker = fw
                .attacks
                .iter()
                .any(|(from, to)| *to == i && !defeated.contains(from));
            if !undefeated_attacker {
                accepted.insert(i);
                changed = true;
                for (from, to) in &fw.attacks {
                    if accepted.contains(from) && !defeated.contains(to) {
                        defeated.insert(*to);
                    }
                }
            }
        }
        if !changed {
            return accepted;
        }
    }
}

/// Arguments belonging to at least one preferred extension (credulous
/// acceptance): maximal admissible sets, enumerated over conflict-free
/// candidates.
fn preferred_members(fw: &Framework) -> FxHashSet<usize> {
    let n = fw.args.len();
    let mut admissible_sets: Vec<FxHashSet<usize>> = Vec::new();

    // Depth-first enumeration of conflict-free sets, keeping admissible
    // ones. Argument counts here are small (rule bases, not clause sets);
    // the exponential worst case is accepted and bounded by the caller's
    // input size.
    let mut stack: Vec<(usize, FxHashSet<usize>)> = vec![(0, FxHashSet::default())];
    while let Some((next, current)) = stack.pop() {
        if next == n {
            if is_admissible(fw, &current) {
                admissible_sets.push(current);
            }
            continue;
        }
        // Exclude `next`.
        stack.push((next + 1, current.clone()));
        // Include `next` if conflict-free.
        let conflict = fw.attacks.iter().any(|(from, to)| {
            (*from == next && current.contains(to))
                || (*to == next && current.contains(from))
                || (*from == next && *to == next)
        });
        if !conflict {
            let mut with = current;
            with.insert(next);
            stack.push((next + 1, with));
        }
    }

    // Keep only maximal admissible sets.
    let mut members = FxHashSet::default();
    for (i, set) in admissible_sets.iter().enumerate() {
        let maximal = !admissible_sets
            .iter()
            .enumerate()
            .any(|(j, other)| i != j && set.is_subset(other) && set.len() < other.len());
        if maximal {
            members.extend(set.iter().copied());
        }
    }
    members
}

fn is_admissible(fw: &Framework, set: &FxHashSet<usize>) -> bool {
    // Every member must be defended: each attacker of a member is itself
    // attacked by some member.
    for member in set {
        for (from, to) in &fw.attacks {
            if to == member {
                let defended = fw
                    .attacks
                    .iter()
                    .any(|(f2, t2)| t2 == from && set.contains(f2));
                if !defended {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_kernel::{prelude, CoreTypes, TypeTable};
    use noesis_language::Frontend;

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

    fn parse(fx: &mut Fixture, src: &str) -> TermId {
        fx.frontend
            .parse(src, &mut fx.store, &mut fx.types, &fx.core)
            .unwrap_or_else(|e| panic!("parse '{}': {:?}", src, e))
    }

    fn defeasible(fx: &mut Fixture, body: &str, head: &str, priority: u32) -> DefeasibleRule {
        let body = parse(fx, body);
        let head = parse(fx, head);
        DefeasibleRule { name: None, body: vec![body], head, priority }
    }

    #[test]
    fn tweety_flies_until_penguinhood_is_known() {
        let mut fx = fixture();
        let strict = vec![
            parse(&mut fx, "Bird(Tweety)"),
            parse(&mut fx, "Penguin(Tweety)"),
            parse(&mut fx, "forall ?x. Penguin(?x) => not Flies(?x)"),
        ];
        let rules = vec![defeasible(&mut fx, "Bird(?x)", "Flies(?x)", 0)];

        let justified = justified_beliefs(
            &mut fx.store,
            &fx.core,
            &strict,
            &rules,
            Semantics::Grounded,
            ResourceLimits::default(),
        );
        let not_flies = parse(&mut fx, "not Flies(Tweety)");
        let flies = parse(&mut fx, "Flies(Tweety)");
        let canon_set: FxHashSet<TermId> =
            justified.iter().map(|t| fx.store.canon(*t)).collect();
        assert!(canon_set.contains(&fx.store.canon(not_flies)));
        assert!(!canon_set.contains(&fx.store.canon(flies)));
    }

    #[test]
    fn defeasible_conclusion_stands_unopposed() {
        let mut fx = fixture();
        let strict = vec![parse(&mut fx, "Bird(Tweety)")];
        let rules = vec![defeasible(&mut fx, "Bird(?x)", "Flies(?x)", 0)];
        let justified = justified_beliefs(
            &mut fx.store,
            &fx.core,
            &strict,
            &rules,
            Semantics::Grounded,
            ResourceLimits::default(),
        );
        let flies = parse(&mut fx, "Flies(Tweety)");
        let canon_set: FxHashSet<TermId> =
            justified.iter().map(|t| fx.store.canon(*t)).collect();
        assert!(canon_set.contains(&fx.store.canon(flies)));
    }

    #[test]
    fn priority_decides_rebuttal_between_defeasible_rules() {
        let mut fx = fixture();
        let strict = vec![
            parse(&mut fx, "Quaker(Nixon)"),
            parse(&mut fx, "Republican(Nixon)"),
        ];
        let rules = vec![
            defeasible(&mut fx, "Quaker(?x)", "Pacifist(?x)", 1),
            defeasible(&mut fx, "Republican(?x)", "not Pacifist(?x)", 5),
        ];
        let justified = justified_beliefs(
            &mut fx.store,
            &fx.core,
            &strict,
            &rules,
            Semantics::Grounded,
            ResourceLimits::default(),
        );
        let not_pacifist = parse(&mut fx, "not Pacifist(Nixon)");
        let pacifist = parse(&mut fx, "Pacifist(Nixon)");
        let canon_set: FxHashSet<TermId> =
            justified.iter().map(|t| fx.store.canon(*t)).collect();
        assert!(canon_set.contains(&fx.store.canon(not_pacifist)));
        assert!(!canon_set.contains(&fx.store.canon(pacifist)));
    }

    #[test]
    fn equal_priority_rebuttals_leave_both_out_of_grounded() {
        let mut fx = fixture();
        let strict = vec![
            parse(&mut fx, "Quaker(Nixon)"),
            parse(&mut fx, "Republican(Nixon)"),
        ];
        let rules = vec![
            defeasible(&mut fx, "Quaker(?x)", "Pacifist(?x)", 1),
            defeasible(&mut fx, "Republican(?x)", "not Pacifist(?x)", 1),
        ];
        let justified = justified_beliefs(
            &mut fx.store,
            &fx.core,
            &strict,
            &rules,
            Semantics::Grounded,
            ResourceLimits::default(),
        );
        let pacifist = parse(&mut fx, "Pacifist(Nixon)");
        let not_pacifist = parse(&mut fx, "not Pacifist(Nixon)");
        let canon_set: FxHashSet<TermId> =
            justified.iter().map(|t| fx.store.canon(*t)).collect();
        assert!(!canon_set.contains(&fx.store.canon(pacifist)));
        assert!(!canon_set.contains(&fx.store.canon(not_pacifist)));
    }

    #[test]
    fn undercutting_disables_a_named_rule() {
        let mut fx = fixture();
        let strict = vec![
            parse(&mut fx, "Bird(Tweety)"),
            parse(&mut fx, "Oiled(Tweety)"),
            // An oiled bird is no evidence for flight: undercut the rule
            // itself rather than its conclusion.
            parse(&mut fx, "forall ?x. Oiled(?x) => not applicable(birds_fly)"),
        ];
        let name = fx.store.interner_mut().intern("birds_fly");
        let mut rule = defeasible(&mut fx, "Bird(?x)", "Flies(?x)", 0);
        rule.name = Some(name);
        let justified = justified_beliefs(
            &mut fx.store,
            &fx.core,
            &strict,
            &[rule],
            Semantics::Grounded,
            ResourceLimits::default(),
        );
        let flies = parse(&mut fx, "Flies(Tweety)");
        let canon_set: FxHashSet<TermId> =
            justified.iter().map(|t| fx.store.canon(*t)).collect();
        assert!(!canon_set.contains(&fx.store.canon(flies)));
    }

    #[test]
    fn preferred_semantics_accepts_credulously() {
        let mut fx = fixture();
        let strict = vec![
            parse(&mut fx, "Quaker(Nixon)"),
            parse(&mut fx, "Republican(Nixon)"),
        ];
        let rules = vec![
            defeasible(&mut fx, "Quaker(?x)", "Pacifist(?x)", 1),
            defeasible(&mut fx, "Republican(?x)", "not Pacifist(?x)", 1),
        ];
        let justified = justified_beliefs(
            &mut fx.store,
            &fx.core,
            &strict,
            &rules,
            Semantics::Preferred,
            ResourceLimits::default(),
        );
        // Credulously, both sides appear in some preferred extension.
        let pacifist = parse(&mut fx, "Pacifist(Nixon)");
        let not_pacifist = parse(&mut fx, "not Pacifist(Nixon)");
        let canon_set: FxHashSet<TermId> =
            justified.iter().map(|t| fx.store.canon(*t)).collect();
        assert!(canon_set.contains(&fx.store.canon(pacifist)));
        assert!(canon_set.contains(&fx.store.canon(not_pacifist)));
    }
}
