//! Hand-rolled lexer for the formula language.
//!
//! One pass over the source, producing a token vector. Every operator has a
//! unicode glyph and an ASCII spelling; both lex to the same [`TokenKind`]:
//!
//! | glyph | ascii | token |
//! |-------|-------|-------|
//! | `¬` | `not` | `Not` |
//! | `∧` | `and` | `And` |
//! | `∨` | `or` | `Or` |
//! | `⇒` | `=>` / `implies` | `Implies` |
//! | `≡` | `<=>` / `iff` | `Iff` |
//! | `∀` | `forall` | `Forall` |
//! | `∃` | `exists` | `Exists` |
//! | `λ` | `lambda` | `Lambda` |
//! | `□` | `box` | `Box` |
//! | `◇` | `diamond` | `Diamond` |
//!
//! `K_a` and `B_a` lex as modal operators carrying their agent symbol.
//! Variables are `?`-prefixed. The lexer is pure: same input, same tokens.

use noesis_base::{Interner, Span, SpannedError};

use crate::token::{Token, TokenKind};

/// Tokenizes `source`, interning names through `interner`.
pub fn lex(source: &str, interner: &mut Interner) -> Result<Vec<Token>, SpannedError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            ';' => {
                // Comment to end of line.
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::new(TokenKind::LParen, Span::new(pos, pos + 1)));
                i += 1;
            }
            ')' => {
                tokens.push(Token::new(TokenKind::RParen, Span::new(pos, pos + 1)));
                i += 1;
            }
            ',' => {
                tokens.push(Token::new(TokenKind::Comma, Span::new(pos, pos + 1)));
                i += 1;
            }
            '.' => {
                tokens.push(Token::new(TokenKind::Dot, Span::new(pos, pos + 1)));
                i += 1;
            }
            ':' => {
                tokens.push(Token::new(TokenKind::Colon, Span::new(pos, pos + 1)));
                i += 1;
            }
            '¬' => {
                tokens.push(Token::new(TokenKind::Not, span_for(pos, c)));
                i += 1;
            }
            '∧' => {
                tokens.push(Token::new(TokenKind::And, span_for(pos, c)));
                i += 1;
            }
            '∨' => {
                tokens.push(Token::new(TokenKind::Or, span_for(pos, c)));
                i += 1;
            }
            '⇒' => {
                tokens.push(Token::new(TokenKind::Implies, span_for(pos, c)));
                i += 1;
            }
            '≡' => {
                tokens.push(Token::new(TokenKind::Iff, span_for(pos, c)));
                i += 1;
            }
            '∀' => {
                tokens.push(Token::new(TokenKind::Forall, span_for(pos, c)));
                i += 1;
            }
            '∃' => {
                tokens.push(Token::new(TokenKind::Exists, span_for(pos, c)));
                i += 1;
            }
            'λ' => {
                tokens.push(Token::new(TokenKind::Lambda, span_for(pos, c)));
                i += 1;
            }
            '□' => {
                tokens.push(Token::new(TokenKind::Box, span_for(pos, c)));
                i += 1;
            }
            '◇' => {
                tokens.push(Token::new(TokenKind::Diamond, span_for(pos, c)));
                i += 1;
            }
            '=' => {
                // `=>` or `=`.
                if i + 1 < chars.len() && chars[i + 1].1 == '>' {
                    tokens.push(Token::new(TokenKind::Implies, Span::new(pos, pos + 2)));
                    i += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Eq, Span::new(pos, pos + 1)));
                    i += 1;
                }
            }
            '<' => {
                // `<=>`.
                if i + 2 < chars.len() && chars[i + 1].1 == '=' && chars[i + 2].1 == '>' {
                    tokens.push(Token::new(TokenKind::Iff, Span::new(pos, pos + 3)));
                    i += 3;
                } else {
                    return Err(SpannedError::new("unexpected '<'", Span::new(pos, pos + 1)));
                }
            }
            '-' => {
                if i + 1 < chars.len() && chars[i + 1].1 == '>' {
                    tokens.push(Token::new(TokenKind::Arrow, Span::new(pos, pos + 2)));
                    i += 2;
                } else if i + 1 < chars.len() && chars[i + 1].1.is_ascii_digit() {
                    let (tok, next) = lex_number(&chars, i)?;
                    tokens.push(tok);
                    i = next;
                } else {
                    return Err(SpannedError::new("unexpected '-'", Span::new(pos, pos + 1)));
                }
            }
            '?' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && is_ident_char(chars[j].1) {
                    j += 1;
                }
                if j == start {
                    return Err(SpannedError::new(
                        "expected variable name after '?'",
                        Span::new(pos, pos + 1),
                    ));
                }
                let end = byte_end(&chars, j, source);
                let name: String = chars[start..j].iter().map(|(_, c)| *c).collect();
                let sym = interner.intern(&name);
                tokens.push(Token::new(TokenKind::Var(sym), Span::new(pos, end)));
                i = j;
            }
            '"' => {
                let mut j = i + 1;
                let mut text = String::new();
                let mut closed = false;
                while j < chars.len() {
                    if chars[j].1 == '"' {
                        closed = true;
                        break;
                    }
                    text.push(chars[j].1);
                    j += 1;
                }
                if !closed {
                    return Err(SpannedError::new(
                        "unterminated string literal",
                        Span::new(pos, source.len()),
                    ));
                }
                let end = chars[j].0 + 1;
                tokens.push(Token::new(TokenKind::Str(text), Span::new(pos, end)));
                i = j + 1;
            }
            c if c.is_ascii_digit() => {
                let (tok, next) = lex_number(&chars, i)?;
                tokens.push(tok);
                i = next;
            }
            c if is_ident_start(c) => {
                let mut j = i;
                while j < chars.len() && is_ident_char(chars[j].1) {
                    j += 1;
                }
                let end = byte_end(&chars, j, source);
                let word: String = chars[i..j].iter().map(|(_, c)| *c).collect();
                let kind = classify_word(&word, interner);
                tokens.push(Token::new(kind, Span::new(pos, end)));
                i = j;
            }
            other => {
                return Err(SpannedError::new(
                    format!("unexpected character '{}'", other),
                    span_for(pos, other),
                ));
            }
        }
    }

    tokens.push(Token::new(TokenKind::Eof, Span::new(source.len(), source.len())));
    Ok(tokens)
}

fn span_for(pos: usize, c: char) -> Span {
    Span::new(pos, pos + c.len_utf8())
}

fn byte_end(chars: &[(usize, char)], j: usize, source: &str) -> usize {
    if j < chars.len() {
        chars[j].0
    } else {
        source.len()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

fn lex_number(chars: &[(usize, char)], start: usize) -> Result<(Token, usize), SpannedError> {
    let pos = chars[start].0;
    let mut j = start;
    if chars[j].1 == '-' {
        j += 1;
    }
    while j < chars.len() && chars[j].1.is_ascii_digit() {
        j += 1;
    }
    let mut is_real = false;
    // A fraction part needs a digit after the dot, so `1.` stays Int + Dot
    // (the dot is the quantifier-body separator).
    if j + 1 < chars.len() && chars[j].1 == '.' && chars[j + 1].1.is_ascii_digit() {
        is_real = true;
        j += 1;
        while j < chars.len() && chars[j].1.is_ascii_digit() {
            j += 1;
        }
    }
    let end = if j < chars.len() { chars[j].0 } else { chars.last().map(|(p, c)| p + c.len_utf8()).unwrap_or(pos) };
    let text: String = chars[start..j].iter().map(|(_, c)| *c).collect();
    let span = Span::new(pos, end);
    let kind = if is_real {
        TokenKind::Real(
            text.parse::<f64>()
                .map_err(|_| SpannedError::new("invalid real literal", span))?,
        )
    } else {
        TokenKind::Int(
            text.parse::<i64>()
                .map_err(|_| SpannedError::new("invalid integer literal", span))?,
        )
    };
    Ok((Token::new(kind, span), j))
}

/// Keyword recognition, including the `K_a`/`B_a` modal forms.
fn classify_word(word: &str, interner: &mut Interner) -> TokenKind {
    match word {
        "not" => TokenKind::Not,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "implies" => TokenKind::Implies,
        "iff" => TokenKind::Iff,
        "forall" => TokenKind::Forall,
        "exists" => TokenKind::Exists,
        "lambda" => TokenKind::Lambda,
        "box" => TokenKind::Box,
        "diamond" => TokenKind::Diamond,
        "define" => TokenKind::Define,
        _ => {
            if let Some(agent) = word.strip_prefix("K_") {
                if !agent.is_empty() {
                    return TokenKind::Knows(interner.intern(agent));
                }
            }
            if let Some(agent) = word.strip_prefix("B_") {
                if !agent.is_empty() {
                    return TokenKind::Believes(interner.intern(agent));
                }
            }
            TokenKind::Ident(interner.intern(word))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut interner = Interner::new();
        lex(src, &mut interner).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_application_syntax() {
        let mut interner = Interner::new();
        let toks = lex("Man(Socrates)", &mut interner).unwrap();
        assert_eq!(toks.len(), 5); // ident, lparen, ident, rparen, eof
        assert!(matches!(toks[0].kind, TokenKind::Ident(_)));
        assert_eq!(toks[1].kind, TokenKind::LParen);
    }

    #[test]
    fn unicode_and_ascii_spellings_agree() {
        assert_eq!(kinds("¬ ∧ ∨ ⇒ ≡"), kinds("not and or => <=>"));
        assert_eq!(kinds("∀ ∃ λ □ ◇"), kinds("forall exists lambda box diamond"));
    }

    #[test]
    fn lexes_variables() {
        let mut interner = Interner::new();
        let toks = lex("?x", &mut interner).unwrap();
        match &toks[0].kind {
            TokenKind::Var(sym) => assert_eq!(interner.resolve(*sym), "x"),
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn lexes_epistemic_operator_with_agent() {
        let mut interner = Interner::new();
        let toks = lex("K_alice P", &mut interner).unwrap();
        match &toks[0].kind {
            TokenKind::Knows(agent) => assert_eq!(interner.resolve(*agent), "alice"),
            other => panic!("expected K_ operator, got {:?}", other),
        }
    }

    #[test]
    fn quantifier_dot_is_not_a_decimal_point() {
        let mut interner = Interner::new();
        let toks = lex("forall ?x:T. P(?x)", &mut interner).unwrap();
        assert!(toks.iter().any(|t| t.kind == TokenKind::Dot));
    }

    #[test]
    fn numbers_and_strings() {
        let ks = kinds("42 3.5 \"hello\"");
        assert_eq!(ks[0], TokenKind::Int(42));
        assert_eq!(ks[1], TokenKind::Real(3.5));
        assert_eq!(ks[2], TokenKind::Str("hello".to_string()));
    }

    #[test]
    fn comments_are_skipped() {
        let ks = kinds("P ; trailing words\nQ");
        assert_eq!(ks.len(), 3); // P, Q, eof
    }

    #[test]
    fn rejects_stray_characters() {
        let mut interner = Interner::new();
        assert!(lex("P @ Q", &mut interner).is_err());
    }
}
