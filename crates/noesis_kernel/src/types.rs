//! The type system: atomic, function, and parametric types over a subtyping
//! DAG, with Robinson-style unification of type variables.
//!
//! # Structure
//!
//! A [`TypeTable`] owns three things:
//!
//! - the set of declared atomic and parametric type constructors,
//! - the subtyping DAG over atomic names (acyclic by construction), and
//! - the signature table mapping symbol names to declared [`Type`]s.
//!
//! Subtyping is the reflexive-transitive closure of the declared edges.
//! Function types are contravariant in their arguments and covariant in the
//! result; instantiated parametric types are covariant in their arguments.
//!
//! # Unification
//!
//! [`TypeTable::unify_types`] computes a most general substitution over
//! [`Type::Var`]s, with a mandatory occurs-check. Substitutions compose by
//! map-merge with re-application to ranges, so the returned map is idempotent.

use noesis_base::{Interner, Symbol};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

use crate::error::TypeError;

/// A type expression.
///
/// `Var` is a unification variable; all other variants are ground once their
/// components are ground.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A declared atomic type such as `Boolean` or `Entity`.
    Atomic(Symbol),

    /// A function type `(args...) -> ret`.
    Function { args: Vec<Type>, ret: Box<Type> },

    /// A parametric constructor of known arity, e.g. `List/1`, not yet applied.
    ParametricCtor { name: Symbol, arity: usize },

    /// A parametric constructor applied to argument types, e.g. `List(Entity)`.
    Instantiated { ctor: Symbol, args: Vec<Type> },

    /// A type variable subject to unification.
    Var { name: Symbol, id: u32 },
}

impl Type {
    /// Convenience constructor for `(args...) -> ret`.
    pub fn function(args: Vec<Type>, ret: Type) -> Type {
        Type::Function { args, ret: Box::new(ret) }
    }

    /// Returns `true` if no type variable occurs anywhere in this type.
    pub fn is_ground(&self) -> bool {
        match self {
            Type::Atomic(_) | Type::ParametricCtor { .. } => true,
            Type::Var { .. } => false,
            Type::Function { args, ret } => args.iter().all(Type::is_ground) && ret.is_ground(),
            Type::Instantiated { args, .. } => args.iter().all(Type::is_ground),
        }
    }

    /// Collects the ids of all type variables in this type.
    pub fn vars(&self, out: &mut FxHashSet<u32>) {
        match self {
            Type::Atomic(_) | Type::ParametricCtor { .. } => {}
            Type::Var { id, .. } => {
                out.insert(*id);
            }
            Type::Function { args, ret } => {
                for a in args {
                    a.vars(out);
                }
                ret.vars(out);
            }
            Type::Instantiated { args, .. } => {
                for a in args {
                    a.vars(out);
                }
            }
        }
    }
}

impl fmt::Display for Type {
    /// Symbol indices only; use [`TypeTable::render`] for resolved names.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Atomic(s) => write!(f, "#{}", s.index()),
            Type::Function { args, ret } => {
                write!(f, "(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::ParametricCtor { name, arity } => write!(f, "#{}/{}", name.index(), arity),
            Type::Instantiated { ctor, args } => {
                write!(f, "#{}(", ctor.index())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Type::Var { name, id } => write!(f, "?#{}.{}", name.index(), id),
        }
    }
}

/// A substitution over type variables, keyed by variable id.
pub type TypeSubst = FxHashMap<u32, Type>;

/// Applies a substitution to a type, bottom-up.
pub fn apply_type_subst(ty: &Type, subst: &TypeSubst) -> Type {
    match ty {
        Type::Atomic(_) | Type::ParametricCtor { .. } => ty.clone(),
        Type::Var { id, .. } => match subst.get(id) {
            // Bindings are idempotent, but a chain can form while solving;
            // follow it to the representative.
            Some(bound) => apply_type_subst(bound, subst),
            None => ty.clone(),
        },
        Type::Function { args, ret } => Type::Function {
            args: args.iter().map(|a| apply_type_subst(a, subst)).collect(),
            ret: Box::new(apply_type_subst(ret, subst)),
        },
        Type::Instantiated { ctor, args } => Type::Instantiated {
            ctor: *ctor,
            args: args.iter().map(|a| apply_type_subst(a, subst)).collect(),
        },
    }
}

/// Declared types, the subtyping DAG, and the signature table.
pub struct TypeTable {
    /// Atomic type name -> direct supertypes.
    atomics: FxHashMap<Symbol, Vec<Symbol>>,

    /// Parametric constructor name -> arity.
    parametrics: FxHashMap<Symbol, usize>,

    /// Symbol name -> declared type.
    signatures: FxHashMap<Symbol, Type>,

    /// Declaration order, significant for snapshots (forward references).
    decl_order: Vec<Symbol>,

    /// Signature insertion order, for snapshots.
    sig_order: Vec<Symbol>,

    /// Fresh type-variable counter.
    next_var: u32,
}

impl TypeTable {
    /// Creates an empty table with no declared types.
    pub fn new() -> Self {
        TypeTable {
            atomics: FxHashMap::default(),
            parametrics: FxHashMap::default(),
            signatures: FxHashMap::default(),
            decl_order: Vec::new(),
            sig_order: Vec::new(),
            next_var: 0,
        }
    }

    /// Declares an atomic type with the given direct supertypes.
    ///
    /// Re-declaring an existing atomic adds the new supertype edges. Fails
    /// with [`TypeError::CyclicSubtype`] (leaving the DAG unchanged) if any
    /// new edge would close a cycle, and with
    /// [`TypeError::UndefinedSymbol`] if a supertype is not declared.
    pub fn define_atomic(
        &mut self,
        name: Symbol,
        supertypes: &[Symbol],
        interner: &Interner,
    ) -> Result<(), TypeError> {
        for sup in supertypes {
            if !self.atomics.contains_key(sup) {
                return Err(TypeError::UndefinedSymbol(interner.resolve(*sup).to_string()));
            }
            // An edge name -> sup cycles iff name is already reachable from sup.
            if self.reaches(*sup, name) {
                return Err(TypeError::CyclicSubtype {
                    name: interner.resolve(name).to_string(),
                });
            }
        }
        let is_new = !self.atomics.contains_key(&name);
        let entry = self.atomics.entry(name).or_default();
        for sup in supertypes {
            if !entry.contains(sup) {
                entry.push(*sup);
            }
        }
        if is_new {
            self.decl_order.push(name);
        }
        Ok(())
    }

    /// Declares a function symbol with argument and result types.
    pub fn define_function(
        &mut self,
        name: Symbol,
        args: Vec<Type>,
        ret: Type,
    ) -> Result<(), TypeError> {
        self.declare(name, Type::function(args, ret));
        Ok(())
    }

    /// Declares a parametric type constructor of the given arity.
    pub fn define_parametric(&mut self, name: Symbol, arity: usize) -> Result<(), TypeError> {
        if !self.parametrics.contains_key(&name) {
            self.decl_order.push(name);
        }
        self.parametrics.insert(name, arity);
        Ok(())
    }

    /// Records a symbol's declared type in the signature table.
    pub fn declare(&mut self, name: Symbol, ty: Type) {
        if !self.signatures.contains_key(&name) {
            self.sig_order.push(name);
        }
        self.signatures.insert(name, ty);
    }

    /// Looks up a symbol's declared type.
    pub fn get_type(&self, name: Symbol) -> Option<&Type> {
        self.signatures.get(&name)
    }

    /// Returns `true` if `name` is a declared atomic type.
    pub fn is_atomic(&self, name: Symbol) -> bool {
        self.atomics.contains_key(&name)
    }

    /// Arity of a declared parametric constructor.
    pub fn parametric_arity(&self, name: Symbol) -> Option<usize> {
        self.parametrics.get(&name).copied()
    }

    /// Declared types in declaration order (atomics and parametrics).
    pub fn declared_in_order(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.decl_order.iter().copied()
    }

    /// Direct supertypes of an atomic type.
    pub fn supertypes_of(&self, name: Symbol) -> &[Symbol] {
        self.atomics.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Signature entries in insertion order.
    pub fn signatures_in_order(&self) -> impl Iterator<Item = (Symbol, &Type)> + '_ {
        self.sig_order.iter().map(move |s| (*s, &self.signatures[s]))
    }

    /// Mints a fresh type variable.
    pub fn fresh_var(&mut self, name: Symbol) -> Type {
        let id = self.next_var;
        self.next_var += 1;
        Type::Var { name, id }
    }

    /// Reachability in the supertype DAG (reflexive).
    fn reaches(&self, from: Symbol, to: Symbol) -> bool {
        if from == to {
            return true;
        }
        let mut stack = vec![from];
        let mut seen = FxHashSet::default();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if let Some(sups) = self.atomics.get(&cur) {
                for s in sups {
                    if *s == to {
                        return true;
                    }
                    stack.push(*s);
                }
            }
        }
        false
    }

    /// Subtype check: reflexive-transitive closure of the declared DAG.
    ///
    /// Functions are contravariant in arguments and covariant in result;
    /// instantiated parametric types are covariant in their arguments.
    /// Type variables are subtypes only of themselves.
    pub fn is_subtype(&self, a: &Type, b: &Type) -> bool {
        match (a, b) {
            _ if a == b => true,
            (Type::Atomic(x), Type::Atomic(y)) => self.reaches(*x, *y),
            (
                Type::Function { args: a_args, ret: a_ret },
                Type::Function { args: b_args, ret: b_ret },
            ) => {
                a_args.len() == b_args.len()
                    && a_args
                        .iter()
                        .zip(b_args.iter())
                        .all(|(x, y)| self.is_subtype(y, x))
                    && self.is_subtype(a_ret, b_ret)
            }
            (
                Type::Instantiated { ctor: c1, args: a1 },
                Type::Instantiated { ctor: c2, args: a2 },
            ) => {
                c1 == c2
                    && a1.len() == a2.len()
                    && a1.iter().zip(a2.iter()).all(|(x, y)| self.is_subtype(x, y))
            }
            _ => false,
        }
    }

    /// Computes the most general unifier of two types.
    ///
    /// Returns `None` when no unifier exists (constructor clash, arity
    /// clash, or occurs-check failure). The returned substitution is
    /// idempotent: applying it to either input yields syntactically equal
    /// types.
    pub fn unify_types(&self, t1: &Type, t2: &Type) -> Option<TypeSubst> {
        let mut subst = TypeSubst::default();
        self.unify_into(t1, t2, &mut subst).ok()?;
        // Normalize: re-apply the substitution to every range so bindings
        // contain no solved variables.
        let keys: Vec<u32> = subst.keys().copied().collect();
        for k in keys {
            let resolved = apply_type_subst(&subst[&k], &subst);
            subst.insert(k, resolved);
        }
        Some(subst)
    }

    /// Unification worker accumulating bindings into an existing
    /// substitution; callers composing several unification problems (the
    /// lowering pass, application inference) use this directly.
    pub fn unify_into(
        &self,
        t1: &Type,
        t2: &Type,
        subst: &mut TypeSubst,
    ) -> Result<(), TypeError> {
        let a = apply_type_subst(t1, subst);
        let b = apply_type_subst(t2, subst);
        match (&a, &b) {
            _ if a == b => Ok(()),
            (Type::Var { name, id }, other) | (other, Type::Var { name, id }) => {
                let mut occurs = FxHashSet::default();
                other.vars(&mut occurs);
                if occurs.contains(id) {
                    return Err(TypeError::OccursCheck { var: format!("?{}", name.index()) });
                }
                subst.insert(*id, other.clone());
                Ok(())
            }
            (
                Type::Function { args: a1, ret: r1 },
                Type::Function { args: a2, ret: r2 },
            ) => {
                if a1.len() != a2.len() {
                    return Err(TypeError::TypeMismatch { expected: a, actual: b });
                }
                for (x, y) in a1.iter().zip(a2.iter()) {
                    self.unify_into(x, y, subst)?;
                }
                self.unify_into(r1, r2, subst)
            }
            (
                Type::Instantiated { ctor: c1, args: a1 },
                Type::Instantiated { ctor: c2, args: a2 },
            ) => {
                if c1 != c2 || a1.len() != a2.len() {
                    return Err(TypeError::TypeMismatch { expected: a, actual: b });
                }
                for (x, y) in a1.iter().zip(a2.iter()) {
                    self.unify_into(x, y, subst)?;
                }
                Ok(())
            }
            _ => Err(TypeError::TypeMismatch { expected: a, actual: b }),
        }
    }

    /// Renders a type with names resolved through the interner.
    pub fn render(&self, ty: &Type, interner: &Interner) -> String {
        match ty {
            Type::Atomic(s) => interner.resolve(*s).to_string(),
            Type::Function { args, ret } => {
                let rendered: Vec<String> =
                    args.iter().map(|a| self.render(a, interner)).collect();
                format!("({}) -> {}", rendered.join(", "), self.render(ret, interner))
            }
            Type::ParametricCtor { name, arity } => {
                format!("{}/{}", interner.resolve(*name), arity)
            }
            Type::Instantiated { ctor, args } => {
                let rendered: Vec<String> =
                    args.iter().map(|a| self.render(a, interner)).collect();
                format!("{}({})", interner.resolve(*ctor), rendered.join(", "))
            }
            Type::Var { name, id } => format!("?{}#{}", interner.resolve(*name), id),
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}
