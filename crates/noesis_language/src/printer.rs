//! Canonical S-expression printing.
//!
//! Printing always goes through the alpha-canonical representative, so
//! bound variables come out as `?v0, ?v1, ...` in introduction order and
//! alpha-equivalent terms print identically. `var_id`s are not serialized.
//! Parsing a printed term and printing it again is the identity.

use noesis_kernel::{
    ConnectiveKind, Literal, ModalOp, QuantKind, TermData, TermId, TermStore, Type,
};

/// Prints a term in the serialized S-expression form.
pub fn print(store: &mut TermStore, t: TermId) -> String {
    let canonical = store.canon(t);
    let mut out = String::new();
    write_term(store, canonical, &mut out);
    out
}

fn write_term(store: &TermStore, t: TermId, out: &mut String) {
    match store.data(t) {
        TermData::Constant { name, value } => match value {
            Some(Literal::Int(n)) => out.push_str(&n.to_string()),
            Some(Literal::Real(x)) => out.push_str(&format!("{:?}", x)),
            Some(Literal::Text(s)) => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            None => out.push_str(store.interner().resolve(*name)),
        },
        TermData::Variable { name, .. } => {
            out.push('?');
            out.push_str(store.interner().resolve(*name));
        }
        TermData::Application { operator, arguments } => {
            out.push_str("(app ");
            write_term(store, *operator, out);
            for a in arguments {
                out.push(' ');
                write_term(store, *a, out);
            }
            out.push(')');
        }
        TermData::Quantifier { kind, bound, body } => {
            out.push('(');
            out.push_str(match kind {
                QuantKind::Forall => "forall",
                QuantKind::Exists => "exists",
            });
            write_binders(store, bound, out);
            out.push(' ');
            write_term(store, *body, out);
            out.push(')');
        }
        TermData::Lambda { bound, body } => {
            out.push_str("(lambda");
            write_binders(store, bound, out);
            out.push(' ');
            write_term(store, *body, out);
            out.push(')');
        }
        TermData::Connective { kind, operands } => {
            out.push('(');
            out.push_str(match kind {
                ConnectiveKind::Not => "not",
                ConnectiveKind::And => "and",
                ConnectiveKind::Or => "or",
                ConnectiveKind::Implies => "implies",
                ConnectiveKind::Equiv => "iff",
            });
            for o in operands {
                out.push(' ');
                write_term(store, *o, out);
            }
            out.push(')');
        }
        TermData::Modal { op, index, body } => {
            out.push_str("(modal ");
            out.push_str(match op {
                ModalOp::Necessity => "box",
                ModalOp::Possibility => "diamond",
                ModalOp::Knows => "knows",
                ModalOp::Believes => "believes",
            });
            if let Some(i) = index {
                out.push(' ');
                write_term(store, *i, out);
            }
            out.push(' ');
            write_term(store, *body, out);
            out.push(')');
        }
        TermData::Definition { symbol, declared_type, body } => {
            out.push_str("(define ");
            out.push_str(store.interner().resolve(*symbol));
            out.push(' ');
            write_type(store, declared_type, out);
            out.push(' ');
            write_term(store, *body, out);
            out.push(')');
        }
    }
}

fn write_binders(store: &TermStore, bound: &[TermId], out: &mut String) {
    for b in bound {
        out.push_str(" (");
        if let TermData::Variable { name, .. } = store.data(*b) {
            out.push('?');
            out.push_str(store.interner().resolve(*name));
        }
        out.push(' ');
        write_type(store, store.ty(*b), out);
        out.push(')');
    }
}

/// Prints a type in the serialized S-expression form.
pub fn print_type(store: &TermStore, ty: &Type) -> String {
    let mut out = String::new();
    write_type(store, ty, &mut out);
    out
}

fn write_type(store: &TermStore, ty: &Type, out: &mut String) {
    match ty {
        Type::Atomic(name) => out.push_str(store.interner().resolve(*name)),
        Type::Function { args, ret } => {
            out.push_str("(-> (");
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_type(store, a, out);
            }
            out.push_str(") ");
            write_type(store, ret, out);
            out.push(')');
        }
        Type::ParametricCtor { name, .. } => out.push_str(store.interner().resolve(*name)),
        Type::Instantiated { ctor, args } => {
            out.push('(');
            out.push_str(store.interner().resolve(*ctor));
            for a in args {
                out.push(' ');
                write_type(store, a, out);
            }
            out.push(')');
        }
        Type::Var { name, .. } => {
            out.push('?');
            out.push_str(store.interner().resolve(*name));
        }
    }
}
