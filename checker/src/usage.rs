//! Identifier usage analysis
//!
//! Splits the bare identifiers of a snippet into the ones it defines itself
//! (functions, parameters, locals, labels, enumerators, macros) and the ones
//! it expects from elsewhere. Without a real preprocessor or symbol table the
//! declaration detection is heuristic: a declarator chain has to start with
//! something type-like and its last identifier is the declared name.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use kcorpus_shared::types::report::UsageKind;
use kcorpus_shared::types::stub::TagKind;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexer::{is_builtin, Directive, Lexed, Token, TokenKind};

static SYSCALL_DEFINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:COMPAT_)?SYSCALL_DEFINE\d$").expect("invalid syscall define regex")
});

/// Occurrences of one identifier, split by how it was used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UseStat {
    pub call: usize,
    pub type_use: usize,
    pub value: usize,
    pub macro_condition: usize,
    pub first_line: usize,
}

impl UseStat {
    pub fn total(&self) -> usize {
        self.call + self.type_use + self.value + self.macro_condition
    }

    /// Type and call uses win over plain values: they decide what kind of
    /// declaration a stub needs.
    pub fn dominant(&self) -> UsageKind {
        if self.type_use > 0 {
            UsageKind::Type
        } else if self.call > 0 {
            UsageKind::Call
        } else if self.macro_condition > 0 {
            UsageKind::MacroCondition
        } else {
            UsageKind::Value
        }
    }

    fn record(&mut self, kind: UsageKind, line: usize) {
        match kind {
            UsageKind::Call => self.call += 1,
            UsageKind::Type => self.type_use += 1,
            UsageKind::Value => self.value += 1,
            UsageKind::MacroCondition => self.macro_condition += 1,
        }
        if self.first_line == 0 || line < self.first_line {
            self.first_line = line;
        }
    }

    pub fn merge(&mut self, other: &UseStat) {
        self.call += other.call;
        self.type_use += other.type_use;
        self.value += other.value;
        self.macro_condition += other.macro_condition;
        if self.first_line == 0 || (other.first_line != 0 && other.first_line < self.first_line) {
            self.first_line = other.first_line;
        }
    }
}

/// Result of analysing one snippet
#[derive(Debug, Clone, Default)]
pub struct Usage {
    /// Names the snippet defines itself
    pub declared: BTreeSet<String>,
    /// Every bare identifier use, keyed by name
    pub uses: BTreeMap<String, UseStat>,
    /// struct / union / enum tags referenced
    pub tags: BTreeSet<(TagKind, String)>,
    /// Tags the snippet gives a body
    pub defined_tags: BTreeSet<(TagKind, String)>,
}

impl Usage {
    /// Uses of names the snippet does not define
    pub fn external(&self) -> impl Iterator<Item = (&String, &UseStat)> {
        self.uses
            .iter()
            .filter(move |(name, _)| !self.declared.contains(*name))
    }

    /// Referenced tags without a body in the snippet
    pub fn external_tags(&self) -> impl Iterator<Item = &(TagKind, String)> {
        self.tags
            .iter()
            .filter(move |tag| !self.defined_tags.contains(*tag))
    }

    fn record(&mut self, name: &str, kind: UsageKind, line: usize) {
        self.uses
            .entry(name.to_string())
            .or_default()
            .record(kind, line);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    /// After `;`, `{`, `}` or at the start of input
    Statement,
    /// Inside the parameter list of a function declarator
    Param,
    /// Any other parenthesis or comma-separated list
    Paren,
}

fn is_base_type_kw(s: &str) -> bool {
    matches!(
        s,
        "void" | "char" | "short" | "int" | "long" | "float" | "double" | "signed"
            | "unsigned" | "_Bool" | "_Complex" | "__signed__" | "__signed"
            | "__builtin_va_list"
    )
}

fn is_qualifier_kw(s: &str) -> bool {
    matches!(
        s,
        "const" | "volatile" | "restrict" | "__restrict" | "__restrict__" | "_Atomic"
            | "__volatile__" | "__volatile" | "static" | "extern" | "auto" | "register"
            | "inline" | "__inline" | "__inline__" | "typedef" | "_Thread_local"
            | "_Noreturn" | "__extension__"
    )
}

struct Chain {
    idents: Vec<usize>,
    base: bool,
    qualifier: bool,
    adjacent_idents: bool,
    fn_ptr_name: Option<usize>,
    /// Index of the token that ended the chain
    end: usize,
}

struct Analyzer<'a> {
    toks: &'a [Token],
    known_types: &'a HashSet<String>,
    matching: Vec<usize>,
    enclosing: Vec<Option<usize>>,
    declared_at: HashSet<usize>,
    type_at: HashSet<usize>,
    skip_at: HashSet<usize>,
    param_lists: HashSet<usize>,
    usage: Usage,
}

impl<'a> Analyzer<'a> {
    fn new(toks: &'a [Token], known_types: &'a HashSet<String>) -> Self {
        let (matching, enclosing) = bracket_tables(toks);
        Self {
            toks,
            known_types,
            matching,
            enclosing,
            declared_at: HashSet::new(),
            type_at: HashSet::new(),
            skip_at: HashSet::new(),
            param_lists: HashSet::new(),
            usage: Usage::default(),
        }
    }

    fn punct(&self, i: usize, p: &str) -> bool {
        self.toks.get(i).is_some_and(|t| t.is_punct(p))
    }

    fn ident(&self, i: usize) -> bool {
        self.toks.get(i).is_some_and(|t| t.is_ident())
    }

    fn context_at(&self, i: usize) -> Option<Ctx> {
        if i == 0 {
            return Some(Ctx::Statement);
        }
        let prev = &self.toks[i - 1];
        if prev.kind != TokenKind::Punct {
            return None;
        }
        match prev.text.as_str() {
            ";" | "{" | "}" => Some(Ctx::Statement),
            "(" if self.param_lists.contains(&(i - 1)) => Some(Ctx::Param),
            "(" => Some(Ctx::Paren),
            "," => match self.enclosing[i - 1] {
                Some(open) if self.param_lists.contains(&open) => Some(Ctx::Param),
                _ => Some(Ctx::Paren),
            },
            _ => None,
        }
    }

    fn chain(&self, start: usize) -> Chain {
        let toks = self.toks;
        let mut chain = Chain {
            idents: Vec::new(),
            base: false,
            qualifier: false,
            adjacent_idents: false,
            fn_ptr_name: None,
            end: start,
        };
        let mut j = start;
        let mut prev_was_ident = false;

        while let Some(t) = toks.get(j) {
            match t.kind {
                TokenKind::Keyword if is_base_type_kw(&t.text) => {
                    chain.base = true;
                    j += 1;
                    prev_was_ident = false;
                }
                TokenKind::Keyword if is_qualifier_kw(&t.text) => {
                    chain.qualifier = true;
                    j += 1;
                    prev_was_ident = false;
                }
                TokenKind::Keyword if TagKind::from_keyword(&t.text).is_some() => {
                    chain.base = true;
                    j += 1;
                    if self.ident(j) {
                        j += 1;
                    }
                    if self.punct(j, "{") {
                        j = self.matching[j] + 1;
                    }
                    prev_was_ident = false;
                }
                TokenKind::Keyword
                    if matches!(t.text.as_str(), "typeof" | "__typeof__" | "__typeof") =>
                {
                    chain.base = true;
                    j += 1;
                    if self.punct(j, "(") {
                        j = self.matching[j] + 1;
                    }
                    prev_was_ident = false;
                }
                TokenKind::Ident if t.text == "__attribute__" && self.punct(j + 1, "(") => {
                    j = self.matching[j + 1] + 1;
                }
                TokenKind::Ident => {
                    if prev_was_ident {
                        chain.adjacent_idents = true;
                    }
                    chain.idents.push(j);
                    prev_was_ident = true;
                    j += 1;
                }
                TokenKind::Punct if t.text == "*" => {
                    prev_was_ident = false;
                    j += 1;
                }
                TokenKind::Punct
                    if t.text == "("
                        && self.punct(j + 1, "*")
                        && self.ident(j + 2)
                        && self.punct(j + 3, ")")
                        && self.has_type_evidence(&chain) =>
                {
                    chain.fn_ptr_name = Some(j + 2);
                    j += 4;
                    break;
                }
                _ => break,
            }
        }

        chain.end = j;
        chain
    }

    /// A lone identifier before `(*p)` is a call with a dereferenced argument
    fn has_type_evidence(&self, chain: &Chain) -> bool {
        chain.base
            || chain.qualifier
            || chain.adjacent_idents
            || chain
                .idents
                .first()
                .is_some_and(|&x| self.known_types.contains(&self.toks[x].text))
    }

    /// Decide whether a chain declares a name, and which token it is
    fn declared_name(&self, chain: &Chain, ctx: Ctx) -> Option<usize> {
        if let Some(name) = chain.fn_ptr_name {
            return Some(name);
        }
        let name = *chain.idents.last()?;
        if name + 1 != chain.end {
            return None;
        }
        let term = self.toks.get(chain.end)?;
        if !(term.kind == TokenKind::Punct
            && matches!(term.text.as_str(), ";" | "=" | "," | "[" | ")" | "(" | ":"))
        {
            return None;
        }

        let type_idents = chain.idents.len() - 1;
        let accepted = if chain.base {
            true
        } else if type_idents == 0 {
            false
        } else {
            match ctx {
                Ctx::Statement | Ctx::Param => true,
                Ctx::Paren => {
                    chain.adjacent_idents
                        || chain.qualifier
                        || self.known_types.contains(&self.toks[chain.idents[0]].text)
                }
            }
        };
        accepted.then_some(name)
    }

    fn declare(&mut self, i: usize) {
        self.declared_at.insert(i);
        self.usage.declared.insert(self.toks[i].text.clone());
    }

    /// Continue a declarator list after the first declarator: `int a = 1, *b, c[4];`
    fn continue_declarators(&mut self, mut k: usize) {
        let toks = self.toks;
        loop {
            while let Some(t) = toks.get(k) {
                if t.kind == TokenKind::Punct {
                    match t.text.as_str() {
                        "(" | "[" | "{" => {
                            k = self.matching[k] + 1;
                            continue;
                        }
                        "," | ";" | ")" | "}" => break,
                        _ => {}
                    }
                }
                k += 1;
            }
            if !self.punct(k, ",") {
                return;
            }
            k += 1;
            while toks
                .get(k)
                .is_some_and(|t| t.is_punct("*") || (t.kind == TokenKind::Keyword && is_qualifier_kw(&t.text)))
            {
                k += 1;
            }
            if self.punct(k, "(") && self.punct(k + 1, "*") && self.ident(k + 2) {
                self.declare(k + 2);
                k += 3;
            } else if self.ident(k) && !self.punct(k + 1, "(") {
                self.declare(k);
                k += 1;
            } else {
                return;
            }
        }
    }

    /// `SYSCALL_DEFINE3(name, type, arg, type, arg)` expands to a function
    /// definition: the first argument and every second one after it are names.
    fn syscall_define(&mut self, i: usize) {
        let open = i + 1;
        let close = self.matching[open];
        let mut args: Vec<(usize, usize)> = Vec::new();
        let mut start = open + 1;
        let mut k = open + 1;
        while k < close {
            let t = &self.toks[k];
            if t.is_punct("(") || t.is_punct("[") || t.is_punct("{") {
                k = self.matching[k] + 1;
                continue;
            }
            if t.is_punct(",") {
                args.push((start, k));
                start = k + 1;
            }
            k += 1;
        }
        args.push((start, close));

        for (n, &(from, to)) in args.iter().enumerate() {
            let idents: Vec<usize> = (from..to).filter(|&x| self.ident(x)).collect();
            if n == 0 || n % 2 == 0 {
                if let Some(&last) = idents.last() {
                    self.declare(last);
                }
            } else {
                for x in idents {
                    self.type_at.insert(x);
                }
            }
        }
    }

    fn enumerators(&mut self, open: usize) {
        let close = self.matching[open];
        let mut expect_name = true;
        let mut k = open + 1;
        while k < close {
            let t = &self.toks[k];
            if t.is_punct("(") || t.is_punct("[") || t.is_punct("{") {
                k = self.matching[k] + 1;
                continue;
            }
            if t.is_punct(",") {
                expect_name = true;
            } else if expect_name && t.is_ident() {
                self.declare(k);
                expect_name = false;
            } else {
                expect_name = false;
            }
            k += 1;
        }
    }

    fn declarations(&mut self) {
        let toks = self.toks;
        for i in 0..toks.len() {
            let t = &toks[i];

            // enum bodies declare their constants
            if t.is_keyword("enum") {
                let open = if self.ident(i + 1) { i + 2 } else { i + 1 };
                if self.punct(open, "{") {
                    self.enumerators(open);
                }
            }

            // labels
            if t.is_ident()
                && self.punct(i + 1, ":")
                && (i == 0
                    || toks[i - 1].is_punct(";")
                    || toks[i - 1].is_punct("{")
                    || toks[i - 1].is_punct("}")
                    || toks[i - 1].is_punct(":"))
            {
                self.declare(i);
                self.skip_at.insert(i);
                continue;
            }

            // goto targets
            if t.is_keyword("goto") && self.ident(i + 1) {
                self.skip_at.insert(i + 1);
            }

            let Some(ctx) = self.context_at(i) else {
                continue;
            };

            if ctx == Ctx::Statement
                && t.is_ident()
                && SYSCALL_DEFINE_RE.is_match(&t.text)
                && self.punct(i + 1, "(")
            {
                self.syscall_define(i);
                continue;
            }

            let chain = self.chain(i);
            let Some(name) = self.declared_name(&chain, ctx) else {
                continue;
            };
            self.declare(name);
            for &x in &chain.idents {
                if x != name {
                    self.type_at.insert(x);
                }
            }

            if self.punct(chain.end, "(") {
                self.param_lists.insert(chain.end);
            } else if ctx != Ctx::Param {
                self.continue_declarators(chain.end);
            }
        }
    }

    fn is_cast_like(&self, i: usize) -> bool {
        if i == 0 || !self.toks[i - 1].is_punct("(") {
            return false;
        }
        // `if (x)`, `f (x)`: the parenthesis belongs to a statement or a call
        if let Some(before) = i.checked_sub(2).map(|p| &self.toks[p]) {
            let control = before.kind == TokenKind::Keyword
                && matches!(before.text.as_str(), "if" | "while" | "switch" | "for");
            if control || before.is_ident() {
                return false;
            }
        }
        let mut k = i + 1;
        let mut stars = 0;
        while self.punct(k, "*") {
            stars += 1;
            k += 1;
        }
        if !self.punct(k, ")") {
            return false;
        }
        if stars > 0 {
            return true;
        }
        self.toks.get(k + 1).is_some_and(|next| {
            matches!(next.kind, TokenKind::Ident | TokenKind::Number | TokenKind::Str)
                || next.is_punct("(")
                || next.is_punct("&")
        })
    }

    fn uses(&mut self) {
        let toks = self.toks;
        for (i, t) in toks.iter().enumerate() {
            if !t.is_ident() || is_builtin(&t.text) || t.text == "__attribute__" {
                continue;
            }
            if self.declared_at.contains(&i) || self.skip_at.contains(&i) {
                continue;
            }
            if let Some(prev) = i.checked_sub(1).map(|p| &toks[p]) {
                if prev.is_punct(".") || prev.is_punct("->") {
                    continue;
                }
                if let Some(kind) = TagKind::from_keyword(&prev.text).filter(|_| prev.kind == TokenKind::Keyword) {
                    if self.punct(i + 1, "{") {
                        self.usage.defined_tags.insert((kind, t.text.clone()));
                    }
                    self.usage.tags.insert((kind, t.text.clone()));
                    continue;
                }
            }

            let kind = if self.type_at.contains(&i) || self.is_cast_like(i) {
                UsageKind::Type
            } else if self.punct(i + 1, "(") {
                UsageKind::Call
            } else {
                UsageKind::Value
            };
            self.usage.record(&t.text, kind, t.line);
        }
    }
}

/// Matching bracket index for every opener, and the innermost open bracket
/// enclosing every token. Unbalanced input is tolerated.
fn bracket_tables(toks: &[Token]) -> (Vec<usize>, Vec<Option<usize>>) {
    let mut matching: Vec<usize> = (0..toks.len()).collect();
    let mut enclosing = vec![None; toks.len()];
    let mut stack: Vec<usize> = Vec::new();

    for (i, t) in toks.iter().enumerate() {
        enclosing[i] = stack.last().copied();
        if t.kind != TokenKind::Punct {
            continue;
        }
        let opener = match t.text.as_str() {
            "(" | "[" | "{" => {
                stack.push(i);
                continue;
            }
            ")" => "(",
            "]" => "[",
            "}" => "{",
            _ => continue,
        };
        if let Some(pos) = stack.iter().rposition(|&o| toks[o].text == opener) {
            matching[stack[pos]] = i;
            stack.truncate(pos);
        }
    }
    for open in stack {
        matching[open] = toks.len().saturating_sub(1);
    }
    (matching, enclosing)
}

fn directive_uses(usage: &mut Usage, d: &Directive) {
    match d.name.as_str() {
        "define" => {
            let Some(name) = d.tokens.first().filter(|t| t.is_ident()) else {
                return;
            };
            usage.declared.insert(name.text.clone());

            let mut params: HashSet<&str> = HashSet::new();
            let mut body_start = 1;
            if d.tokens.get(1).is_some_and(|t| t.is_punct("(") && !t.space_before) {
                let mut k = 2;
                while let Some(t) = d.tokens.get(k) {
                    k += 1;
                    if t.is_punct(")") {
                        break;
                    }
                    if t.is_ident() {
                        params.insert(t.text.as_str());
                    }
                }
                body_start = k;
            }

            let body = &d.tokens[body_start.min(d.tokens.len())..];
            for (j, t) in body.iter().enumerate() {
                if !t.is_ident() || is_builtin(&t.text) || params.contains(t.text.as_str()) {
                    continue;
                }
                let prev = j.checked_sub(1).and_then(|p| body.get(p));
                let next = body.get(j + 1);
                if prev.is_some_and(|p| p.is_punct("##") || p.is_punct("#") || p.is_punct(".") || p.is_punct("->"))
                    || next.is_some_and(|n| n.is_punct("##"))
                {
                    continue;
                }
                if let Some(kind) = prev
                    .filter(|p| p.kind == TokenKind::Keyword)
                    .and_then(|p| TagKind::from_keyword(&p.text))
                {
                    usage.tags.insert((kind, t.text.clone()));
                    continue;
                }
                let kind = if next.is_some_and(|n| n.is_punct("(")) {
                    UsageKind::Call
                } else {
                    UsageKind::Value
                };
                usage.record(&t.text, kind, t.line);
            }
        }
        "if" | "elif" => {
            for (j, t) in d.tokens.iter().enumerate() {
                if t.is_ident()
                    && t.text != "defined"
                    && !is_builtin(&t.text)
                    && d.tokens.get(j + 1).is_some_and(|n| n.is_punct("("))
                {
                    usage.record(&t.text, UsageKind::MacroCondition, t.line);
                }
            }
        }
        _ => {}
    }
}

/// Analyse a lexed snippet. `known_types` (typically the stub's typedef
/// names) helps recognise declarations inside parentheses.
pub fn analyze(lexed: &Lexed, known_types: &HashSet<String>) -> Usage {
    let mut analyzer = Analyzer::new(&lexed.tokens, known_types);
    analyzer.declarations();
    analyzer.uses();

    let mut usage = analyzer.usage;
    for d in &lexed.directives {
        directive_uses(&mut usage, d);
    }
    usage
}
