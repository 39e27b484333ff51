//! Minimal s-expression parsing shared by the symbolic and rewrite backends.
//!
//! Both the MeTTa store and the MORK download endpoint hand results back as
//! whitespace-separated s-expressions. This module tokenizes that text and
//! flattens match results into atom tuples for the unifier.

use annoq_core::{Error, Result};

/// A parsed s-expression: a bare atom or a parenthesized list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

impl SExpr {
    /// Depth-first flatten into the atoms this expression contains.
    pub fn atoms(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<String>) {
        match self {
            SExpr::Atom(a) => out.push(a.clone()),
            SExpr::List(items) => {
                for item in items {
                    item.collect_atoms(out);
                }
            }
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            SExpr::Atom(_) => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) => Some(a),
            SExpr::List(_) => None,
        }
    }
}

/// Parse a sequence of s-expressions from raw text.
pub fn parse_many(input: &str) -> Result<Vec<SExpr>> {
    let mut tokens = tokenize(input);
    tokens.reverse(); // pop from the back
    let mut out = Vec::new();
    while !tokens.is_empty() {
        out.push(parse_one(&mut tokens)?);
    }
    Ok(out)
}

/// Flatten backend match results into atom tuples.
///
/// A result document is a sequence of match expressions, possibly wrapped in
/// grouping lists or comma forms (`(, a b)`). Wrappers and comma groups are
/// expanded; each remaining match becomes one tuple of its atoms, and empty
/// matches are skipped.
pub fn tuples(input: &str) -> Result<Vec<Vec<String>>> {
    let parsed = parse_many(input)?;
    let mut items = Vec::new();
    for expr in parsed {
        flatten_item(expr, &mut items);
    }
    Ok(items
        .iter()
        .map(SExpr::atoms)
        .filter(|t| !t.is_empty())
        .collect())
}

fn flatten_item(expr: SExpr, out: &mut Vec<SExpr>) {
    match expr {
        SExpr::List(inner) => {
            let is_comma = inner.first().and_then(SExpr::as_atom) == Some(",");
            let is_wrapper =
                !inner.is_empty() && inner.iter().all(|e| matches!(e, SExpr::List(_)));
            if is_comma {
                for item in inner.into_iter().skip(1) {
                    flatten_item(item, out);
                }
            } else if is_wrapper {
                for item in inner {
                    flatten_item(item, out);
                }
            } else {
                out.push(SExpr::List(inner));
            }
        }
        atom => out.push(atom),
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut atom = String::new();
    for ch in input.chars() {
        match ch {
            '(' | ')' => {
                if !atom.is_empty() {
                    tokens.push(Token::Atom(std::mem::take(&mut atom)));
                }
                tokens.push(if ch == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => {
                if !atom.is_empty() {
                    tokens.push(Token::Atom(std::mem::take(&mut atom)));
                }
            }
            c => atom.push(c),
        }
    }
    if !atom.is_empty() {
        tokens.push(Token::Atom(atom));
    }
    tokens
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Atom(String),
}

fn parse_one(tokens: &mut Vec<Token>) -> Result<SExpr> {
    match tokens.pop() {
        Some(Token::Atom(a)) => Ok(SExpr::Atom(a)),
        Some(Token::Open) => {
            let mut items = Vec::new();
            loop {
                match tokens.last() {
                    Some(Token::Close) => {
                        tokens.pop();
                        return Ok(SExpr::List(items));
                    }
                    Some(_) => items.push(parse_one(tokens)?),
                    None => {
                        return Err(Error::Serialization(
                            "unbalanced s-expression: missing ')'".to_string(),
                        ))
                    }
                }
            }
        }
        Some(Token::Close) => Err(Error::Serialization(
            "unbalanced s-expression: unexpected ')'".to_string(),
        )),
        None => Err(Error::Serialization("empty s-expression".to_string())),
    }
}
