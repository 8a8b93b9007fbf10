//! File-scope declaration parser for stub headers
//!
//! Walks the token stream of a header and records every macro, typedef,
//! tag, prototype and global it declares. Bodies of struct/union definitions
//! are only inspected for by-value members.

use kcorpus_shared::types::stub::{StubSymbol, SymbolKind, TagDecl, TagKind};
use kcorpus_shared::utils::normalize_whitespace;

use crate::lexer::{Directive, Lexed, Token, TokenKind};

/// Symbols and tags in declaration order
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub symbols: Vec<StubSymbol>,
    pub tags: Vec<TagDecl>,
}

fn join(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 && t.space_before {
            out.push(' ');
        }
        out.push_str(&t.text);
    }
    normalize_whitespace(&out)
}

fn macro_symbol(d: &Directive) -> Option<StubSymbol> {
    let name = d.tokens.first().filter(|t| t.is_ident())?;
    let function_like = d
        .tokens
        .get(1)
        .is_some_and(|t| t.is_punct("(") && !t.space_before);

    if function_like {
        let close = d
            .tokens
            .iter()
            .position(|t| t.is_punct(")"))
            .unwrap_or(d.tokens.len() - 1);
        let params = join(&d.tokens[1..=close]);
        let body = join(&d.tokens[close + 1..]);
        let detail = if body.is_empty() {
            params
        } else {
            format!("{} {}", params, body)
        };
        Some(StubSymbol::new(&name.text, SymbolKind::FunctionMacro, d.line, detail))
    } else {
        Some(StubSymbol::new(
            &name.text,
            SymbolKind::Macro,
            d.line,
            join(&d.tokens[1..]),
        ))
    }
}

/// Matching closer for the opener at `open`, or the last index if unbalanced
fn close_of(toks: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, t) in toks.iter().enumerate().skip(open) {
        if t.kind != TokenKind::Punct {
            continue;
        }
        match t.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    toks.len().saturating_sub(1)
}

/// Split at depth-0 commas
fn segments(toks: &[Token]) -> Vec<&[Token]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < toks.len() {
        let t = &toks[i];
        if t.is_punct("(") || t.is_punct("[") || t.is_punct("{") {
            i = close_of(toks, i) + 1;
            continue;
        }
        if t.is_punct(",") {
            out.push(&toks[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    out.push(&toks[start..]);
    out
}

/// Name introduced by one declarator: `(*name)(...)`, `name[...]`, `name = ...`
fn declarator_name(seg: &[Token]) -> Option<(usize, &Token)> {
    let mut last = None;
    let mut i = 0;
    while i < seg.len() {
        let t = &seg[i];
        if t.is_punct("[") || t.is_punct("=") || t.is_punct(":") {
            break;
        }
        if t.is_punct("(") {
            let star = seg.get(i + 1).is_some_and(|n| n.is_punct("*"));
            if let (true, Some(name)) = (star, seg.get(i + 2).filter(|n| n.is_ident())) {
                return Some((i + 2, name));
            }
            i = close_of(seg, i) + 1;
            continue;
        }
        if t.is_punct("{") {
            i = close_of(seg, i) + 1;
            continue;
        }
        if t.is_ident() && t.text != "__attribute__" {
            last = Some((i, t));
        }
        i += 1;
    }
    last
}

/// Tags embedded by value in a struct/union body (pointers are fine)
fn by_value_members(body: &[Token]) -> Vec<(TagKind, String)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut at_member_start = true;
    for (i, t) in body.iter().enumerate() {
        if t.is_punct("{") {
            depth += 1;
        } else if t.is_punct("}") {
            depth = depth.saturating_sub(1);
        } else if t.is_punct(";") && depth == 0 {
            at_member_start = true;
            continue;
        }
        if depth == 0 && at_member_start && t.kind == TokenKind::Keyword {
            if let Some(kind) = TagKind::from_keyword(&t.text) {
                let named = body.get(i + 1).filter(|n| n.is_ident());
                let by_value = body.get(i + 2).is_some_and(|n| n.is_ident());
                if let (Some(name), true) = (named, by_value) {
                    if kind != TagKind::Enum {
                        out.push((kind, name.text.clone()));
                    }
                }
            }
        }
        if depth == 0 && !t.is_punct("}") {
            at_member_start = false;
        }
    }
    out
}

fn enumerators(body: &[Token], line: usize, out: &mut Vec<StubSymbol>) {
    for seg in segments(body) {
        if let Some(t) = seg.first().filter(|t| t.is_ident()) {
            out.push(StubSymbol::new(&t.text, SymbolKind::Enumerator, t.line.max(line), join(seg)));
        }
    }
}

/// Records a tag body (if any) found in `decl` and returns the index just past it
fn tag_in_decl(decl: &[Token], out: &mut Declarations) -> Option<usize> {
    let kw = decl
        .iter()
        .position(|t| t.kind == TokenKind::Keyword && TagKind::from_keyword(&t.text).is_some())?;
    let kind = TagKind::from_keyword(&decl[kw].text)?;
    let name = decl.get(kw + 1).filter(|t| t.is_ident());
    let brace = kw + if name.is_some() { 2 } else { 1 };

    if !decl.get(brace).is_some_and(|t| t.is_punct("{")) {
        return None;
    }
    let close = close_of(decl, brace);
    let body = &decl[brace + 1..close];

    if kind == TagKind::Enum {
        enumerators(body, decl[kw].line, &mut out.symbols);
    }
    if let Some(name) = name {
        out.symbols.push(StubSymbol::new(
            &name.text,
            SymbolKind::Tag,
            name.line,
            join(&decl[kw..=close]),
        ));
        out.tags.push(TagDecl {
            kind,
            name: name.text.clone(),
            line: name.line,
            defined: true,
            by_value_members: by_value_members(body),
        });
    }
    Some(close + 1)
}

fn declaration(decl: &[Token], out: &mut Declarations) {
    let Some(first) = decl.first() else {
        return;
    };
    let line = first.line;

    // struct x;
    if decl.len() == 2 && decl[1].is_ident() && first.kind == TokenKind::Keyword {
        if let Some(kind) = TagKind::from_keyword(&first.text) {
            out.symbols.push(StubSymbol::new(
                &decl[1].text,
                SymbolKind::Tag,
                line,
                format!("{} {}", first.text, decl[1].text),
            ));
            out.tags.push(TagDecl::forward(kind, &decl[1].text, line));
            return;
        }
    }

    let is_typedef = first.is_keyword("typedef");
    let after_body = tag_in_decl(decl, out);

    // A bare tag definition declares nothing else
    if after_body == Some(decl.len()) && !is_typedef {
        return;
    }

    if is_typedef {
        let segs = segments(&decl[1..]);
        let base_end = segs
            .first()
            .and_then(|s| declarator_name(s).map(|(i, _)| i))
            .unwrap_or(0);
        let base = segs.first().map(|s| &s[..base_end]).unwrap_or(&[]);
        let base_text = join(base);
        for (n, seg) in segs.iter().enumerate() {
            if let Some((i, name)) = declarator_name(seg) {
                let mut detail = if n == 0 {
                    base_text.clone()
                } else {
                    format!("{} {}", base_text, join(&seg[..i]))
                };
                let suffix = join(&seg[i + 1..]);
                if !suffix.is_empty() {
                    detail = format!("{} {}", detail, suffix);
                }
                out.symbols.push(StubSymbol::new(
                    &name.text,
                    SymbolKind::Typedef,
                    name.line,
                    normalize_whitespace(&detail),
                ));
            }
        }
        return;
    }

    // Prototype: an identifier followed by a parameter list at depth 0
    let start = after_body.unwrap_or(0);
    let mut i = start;
    while i < decl.len() {
        let t = &decl[i];
        if t.is_punct("{") || t.is_punct("[") {
            i = close_of(decl, i) + 1;
            continue;
        }
        if t.is_punct("(") {
            let fn_ptr = decl.get(i + 1).is_some_and(|n| n.is_punct("*"));
            let prev = i.checked_sub(1).map(|p| &decl[p]);
            if let (false, Some(name)) = (fn_ptr, prev.filter(|p| p.is_ident() && p.text != "__attribute__")) {
                out.symbols.push(StubSymbol::new(
                    &name.text,
                    SymbolKind::Function,
                    name.line,
                    join(decl),
                ));
                return;
            }
            i = close_of(decl, i) + 1;
            continue;
        }
        i += 1;
    }

    // Otherwise one or more variables
    let rest = &decl[start..];
    let segs = segments(rest);
    let base_end = segs
        .first()
        .and_then(|s| declarator_name(s).map(|(i, _)| i))
        .unwrap_or(0);
    let base_text = segs.first().map(|s| join(&s[..base_end])).unwrap_or_default();
    for (n, seg) in segs.iter().enumerate() {
        if let Some((i, name)) = declarator_name(seg) {
            let detail = if n == 0 {
                join(seg)
            } else {
                format!("{} {}", base_text, join(&seg[..=i]))
            };
            out.symbols.push(StubSymbol::new(
                &name.text,
                SymbolKind::Variable,
                name.line,
                normalize_whitespace(&detail),
            ));
        }
    }
}

/// Parse every file-scope declaration of a lexed header
pub fn parse_declarations(lexed: &Lexed) -> Declarations {
    let mut out = Declarations::default();

    for d in &lexed.directives {
        if d.name == "define" {
            if let Some(sym) = macro_symbol(d) {
                out.symbols.push(sym);
            }
        }
    }

    let toks = &lexed.tokens;
    let mut start = 0;
    let mut i = 0;
    while i < toks.len() {
        let t = &toks[i];
        if t.is_punct("(") || t.is_punct("[") {
            i = close_of(toks, i) + 1;
            continue;
        }
        if t.is_punct("{") {
            let close = close_of(toks, i);
            // Function definition: `) {` ends the declaration at the closing brace
            if i > start && toks[i - 1].is_punct(")") {
                declaration(&toks[start..i], &mut out);
                i = close + 1;
                start = i;
                continue;
            }
            i = close + 1;
            continue;
        }
        if t.is_punct(";") {
            declaration(&toks[start..i], &mut out);
            start = i + 1;
        }
        i += 1;
    }
    if start < toks.len() {
        declaration(&toks[start..], &mut out);
    }

    out.symbols.sort_by_key(|s| s.line);
    out.tags.sort_by_key(|t| t.line);
    out
}
