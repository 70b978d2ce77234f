//! Length-prefixed KR snapshots.
//!
//! A snapshot is a sequence of framed blocks, each a big-endian `u32`
//! length followed by that many bytes of UTF-8 text:
//!
//! 1. a magic block (`noesis-snapshot 1`),
//! 2. the type-declaration block, order-significant for forward
//!    references (`atomic Name Sup...` / `parametric Name arity`),
//! 3. the signature block (`sig name type-sexpr`),
//! 4. one block per context: a header line
//!    (`context NAME [parent] kind`) followed by the context's own
//!    statements in insertion order, one serialized term per line.
//!
//! Framing makes partial reads fail cleanly: a truncated file surfaces as
//! a framing error, never as a half-loaded store.
//!
//! Restoring rebuilds contexts in creation order; a child therefore
//! inherits the parent's restored contents rather than the exact snapshot
//! the child saw at branch time. Retraction tombstones are not persisted.

use std::io::{self, Read, Write};

use noesis_kernel::Type;
use noesis_store::ContextKind;

use crate::{Session, SessionError};

const MAGIC: &str = "noesis-snapshot 1";

/// Writes one framed block.
fn write_block(w: &mut impl Write, text: &str) -> io::Result<()> {
    let bytes = text.as_bytes();
    w.write_all(&(bytes.len() as u32).to_be_bytes())?;
    w.write_all(bytes)
}

/// Reads one framed block; `None` at clean end-of-file.
fn read_block(r: &mut impl Read) -> Result<Option<String>, SessionError> {
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(SessionError::Io(e.to_string())),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|_| SessionError::Io("truncated snapshot block".to_string()))?;
    String::from_utf8(buf).map(Some).map_err(|_| {
        SessionError::Io("snapshot block is not valid UTF-8".to_string())
    })
}

fn kind_name(kind: ContextKind) -> &'static str {
    match kind {
        ContextKind::Standard => "standard",
        ContextKind::ConsistentOnly => "consistent",
        ContextKind::Frozen => "frozen",
    }
}

fn kind_from(name: &str) -> Option<ContextKind> {
    match name {
        "standard" => Some(ContextKind::Standard),
        "consistent" => Some(ContextKind::ConsistentOnly),
        "frozen" => Some(ContextKind::Frozen),
        _ => None,
    }
}

/// Serializes the session's KR state.
pub fn write_snapshot(session: &mut Session, w: &mut impl Write) -> Result<(), SessionError> {
    write_block(w, MAGIC).map_err(|e| SessionError::Io(e.to_string()))?;

    // Type declarations, in declaration order.
    let mut decls = String::new();
    for sym in session.types.declared_in_order().collect::<Vec<_>>() {
        if session.types.is_atomic(sym) {
            decls.push_str("atomic ");
            decls.push_str(session.terms.interner().resolve(sym));
            for sup in session.types.supertypes_of(sym).to_vec() {
                decls.push(' ');
                decls.push_str(session.terms.interner().resolve(sup));
            }
            decls.push('\n');
        } else if let Some(arity) = session.types.parametric_arity(sym) {
            decls.push_str("parametric ");
            decls.push_str(session.terms.interner().resolve(sym));
            decls.push(' ');
            decls.push_str(&arity.to_string());
            decls.push('\n');
        }
    }
    write_block(w, &decls).map_err(|e| SessionError::Io(e.to_string()))?;

    // Signatures.
    let mut sigs = String::new();
    let entries: Vec<(String, Type)> = session
        .types
        .signatures_in_order()
        .map(|(sym, ty)| {
            (session.terms.interner().resolve(sym).to_string(), ty.clone())
        })
        .collect();
    for (name, ty) in entries {
        sigs.push_str("sig ");
        sigs.push_str(&name);
        sigs.push(' ');
        sigs.push_str(&noesis_language::print_type(&session.terms, &ty));
        sigs.push('\n');
    }
    write_block(w, &sigs).map_err(|e| SessionError::Io(e.to_string()))?;

    // One block per context.
    for (name, parent, kind) in session.kb.contexts_in_order() {
        let ctx = session.kb.resolve(&name).map_err(SessionError::Store)?;
        let mut block = String::from("context ");
        block.push_str(&name);
        if let Some(p) = &parent {
            block.push_str(" parent=");
            block.push_str(p);
        }
        block.push_str(" kind=");
        block.push_str(kind_name(kind));
        block.push('\n');
        for stmt in session.kb.statements_in_order(ctx).map_err(SessionError::Store)? {
            block.push_str(&session.frontend.print(&mut session.terms, stmt));
            block.push('\n');
        }
        write_block(w, &block).map_err(|e| SessionError::Io(e.to_string()))?;
    }
    Ok(())
}

/// Rebuilds a session from a snapshot.
pub fn read_snapshot(r: &mut impl Read) -> Result<Session, SessionError> {
    let magic = read_block(r)?
        .ok_or_else(|| SessionError::Io("empty snapshot".to_string()))?;
    if magic != MAGIC {
        return Err(SessionError::Io(format!("bad snapshot magic '{}'", magic)));
    }
    let mut session = Session::new();

    let decls = read_block(r)?
        .ok_or_else(|| SessionError::Io("snapshot missing type block".to_string()))?;
    for line in decls.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("atomic") => {
                let name = parts
                    .next()
                    .ok_or_else(|| SessionError::Io("malformed atomic decl".to_string()))?;
                let name_sym = session.terms.interner_mut().intern(name);
                let sups: Vec<_> = parts
                    .map(|s| session.terms.interner_mut().intern(s))
                    .collect();
                session
                    .types
                    .define_atomic(name_sym, &sups, session.terms.interner())
                    .map_err(|e| SessionError::Io(e.to_string()))?;
            }
            Some("parametric") => {
                let name = parts
                    .next()
                    .ok_or_else(|| SessionError::Io("malformed parametric decl".to_string()))?;
                let arity: usize = parts
                    .next()
                    .and_then(|a| a.parse().ok())
                    .ok_or_else(|| SessionError::Io("malformed parametric arity".to_string()))?;
                let name_sym = session.terms.interner_mut().intern(name);
                session
                    .types
                    .define_parametric(name_sym, arity)
                    .map_err(|e| SessionError::Io(e.to_string()))?;
            }
            _ => {}
        }
    }

    let sigs = read_block(r)?
        .ok_or_else(|| SessionError::Io("snapshot missing signature block".to_string()))?;
    for line in sigs.lines() {
        let rest = match line.strip_prefix("sig ") {
            Some(rest) => rest,
            None => continue,
        };
        let (name, ty_text) = rest
            .split_once(' ')
            .ok_or_else(|| SessionError::Io("malformed signature line".to_string()))?;
        let name_sym = session.terms.interner_mut().intern(name);
        let ty = session
            .frontend
            .parse_type(ty_text, &mut session.terms, &mut session.types, &session.core)
            .map_err(SessionError::Parse)?;
        session.types.declare(name_sym, ty);
    }

    while let Some(block) = read_block(r)? {
        let mut lines = block.lines();
        let header = lines
            .next()
            .ok_or_else(|| SessionError::Io("empty context block".to_string()))?;
        let mut parts = header.split_whitespace();
        if parts.next() != Some("context") {
            return Err(SessionError::Io("malformed context header".to_string()));
        }
        let name = parts
            .next()
            .ok_or_else(|| SessionError::Io("context block without a name".to_string()))?;
        let mut parent: Option<String> = None;
        let mut kind = ContextKind::Standard;
        for part in parts {
            if let Some(p) = part.strip_prefix("parent=") {
                parent = Some(p.to_string());
            } else if let Some(k) = part.strip_prefix("kind=") {
                kind = kind_from(k)
                    .ok_or_else(|| SessionError::Io(format!("unknown context kind '{}'", k)))?;
            }
        }
        // The default context already exists in a fresh session.
        if !session.kb.has_context(name) {
            session
                .kb
                .create_context(name, parent.as_deref(), kind)
                .map_err(SessionError::Store)?;
        }
        let ctx = session.kb.resolve(name).map_err(SessionError::Store)?;
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let stmt = session
                .frontend
                .parse(line, &mut session.terms, &mut session.types, &session.core)
                .map_err(SessionError::Parse)?;
            session
                .kb
                .add(&mut session.terms, &session.types, &session.core, stmt, ctx)
                .map_err(SessionError::Store)?;
        }
    }
    Ok(session)
}
