//! C tokenizer for kernel snippets
//!
//! Good enough to find identifiers in isolated kernel functions and stub
//! headers. There is no preprocessing: directives are returned separately
//! with their own token list and comments are kept so the leading comment
//! of a sample can be inspected.

use std::collections::HashSet;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Number,
    Str,
    Char,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based source line
    pub line: usize,
    /// Whitespace or a comment separates this token from the previous one
    pub space_before: bool,
}

impl Token {
    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_keyword(&self, k: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == k
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub line: usize,
}

/// A preprocessor line such as `#define likely(x) (x)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// `define`, `ifdef`, ... Empty for the null directive `#`.
    pub name: String,
    pub tokens: Vec<Token>,
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub directives: Vec<Directive>,
    pub comments: Vec<Comment>,
}

impl Lexed {
    /// Comments that appear before the first code token or directive
    pub fn leading_comments(&self) -> Vec<&Comment> {
        let first_code = self
            .tokens
            .first()
            .map(|t| t.line)
            .into_iter()
            .chain(self.directives.first().map(|d| d.line))
            .min()
            .unwrap_or(usize::MAX);
        self.comments
            .iter()
            .take_while(|c| c.line < first_code)
            .collect()
    }
}

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // C11
        "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
        "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
        "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch",
        "typedef", "union", "unsigned", "void", "volatile", "while", "_Alignas", "_Alignof",
        "_Atomic", "_Bool", "_Complex", "_Generic", "_Imaginary", "_Noreturn",
        "_Static_assert", "_Thread_local",
        // GNU spellings
        "typeof", "__typeof__", "__typeof", "asm", "__asm__", "__asm", "__volatile__",
        "__volatile", "__inline__", "__inline", "__extension__", "__alignof__", "__alignof",
        "__restrict", "__restrict__", "__signed__", "__signed", "__label__",
        "__builtin_va_list",
    ]
    .into_iter()
    .collect()
});

static BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "__func__",
        "__FUNCTION__",
        "__PRETTY_FUNCTION__",
        "__LINE__",
        "__FILE__",
        "__DATE__",
        "__TIME__",
        "__COUNTER__",
        "__STDC__",
        "__STDC_VERSION__",
        "__VA_ARGS__",
        "__VA_OPT__",
    ]
    .into_iter()
    .collect()
});

/// Reserved words, including the GNU alternate spellings kernel code uses
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

/// Names every C front end predefines
pub fn is_builtin(word: &str) -> bool {
    BUILTINS.contains(word) || word.starts_with("__builtin_")
}

const PUNCT3: [&str; 3] = ["<<=", ">>=", "..."];
const PUNCT2: [&str; 19] = [
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "^=", "|=",
];

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    at_line_start: bool,
    spaced: bool,
    comments: Vec<Comment>,
}

impl Cursor {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            at_line_start: true,
            spaced: false,
            comments: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    /// Skip whitespace, comments and line continuations. Returns `true` when
    /// a newline (or EOF) was reached and `stop_at_newline` is set.
    fn skip_trivia(&mut self, stop_at_newline: bool) -> bool {
        loop {
            match self.peek(0) {
                None => return true,
                Some(' ') | Some('\t') | Some('\r') | Some('\x0c') => {
                    self.pos += 1;
                    self.spaced = true;
                }
                Some('\\') if self.peek(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                    self.spaced = true;
                }
                Some('\\') if self.peek(1) == Some('\r') && self.peek(2) == Some('\n') => {
                    self.pos += 3;
                    self.line += 1;
                    self.spaced = true;
                }
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                    self.at_line_start = true;
                    self.spaced = true;
                    if stop_at_newline {
                        return true;
                    }
                }
                Some('/') if self.peek(1) == Some('/') => {
                    let start = self.pos + 2;
                    let line = self.line;
                    while let Some(c) = self.peek(0) {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                    let text: String = self.chars[start..self.pos].iter().collect();
                    self.comments.push(Comment {
                        text: text.trim().to_string(),
                        line,
                    });
                    self.spaced = true;
                }
                Some('/') if self.peek(1) == Some('*') => {
                    let line = self.line;
                    self.pos += 2;
                    let start = self.pos;
                    let mut end = self.chars.len();
                    while let Some(c) = self.peek(0) {
                        if c == '*' && self.peek(1) == Some('/') {
                            end = self.pos;
                            self.pos += 2;
                            break;
                        }
                        if c == '\n' {
                            self.line += 1;
                        }
                        self.pos += 1;
                    }
                    if end == self.chars.len() {
                        self.pos = self.chars.len();
                    }
                    let text: String = self.chars[start..end].iter().collect();
                    self.comments.push(Comment {
                        text: text.trim().to_string(),
                        line,
                    });
                    self.spaced = true;
                }
                Some(_) => return false,
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while let Some(c) = self.peek(0) {
            if !pred(c) {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn quoted(&mut self, quote: char) -> String {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.line += 1;
                    }
                    self.pos += 2;
                }
                '\n' => break,
                c if c == quote => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        let end = self.pos.min(self.chars.len());
        self.chars[start..end].iter().collect()
    }

    fn next_token(&mut self) -> Token {
        let line = self.line;
        let space_before = std::mem::take(&mut self.spaced);
        let c = self.peek(0).unwrap_or('\0');

        let (kind, text) = if is_ident_start(c) {
            let word = self.take_while(is_ident_char);
            let next = self.peek(0);
            if matches!(word.as_str(), "L" | "u" | "U" | "u8") && matches!(next, Some('"') | Some('\'')) {
                let quote = next.unwrap_or('"');
                let body = self.quoted(quote);
                let kind = if quote == '"' { TokenKind::Str } else { TokenKind::Char };
                (kind, format!("{}{}", word, body))
            } else if is_keyword(&word) {
                (TokenKind::Keyword, word)
            } else {
                (TokenKind::Ident, word)
            }
        } else if c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) {
            let start = self.pos;
            self.pos += 1;
            while let Some(ch) = self.peek(0) {
                let prev = self.chars[self.pos - 1];
                if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
                    self.pos += 1;
                } else if (ch == '+' || ch == '-') && matches!(prev, 'e' | 'E' | 'p' | 'P') {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            (TokenKind::Number, self.chars[start..self.pos].iter().collect())
        } else if c == '"' {
            (TokenKind::Str, self.quoted('"'))
        } else if c == '\'' {
            (TokenKind::Char, self.quoted('\''))
        } else if c == '#' && self.peek(1) == Some('#') {
            self.pos += 2;
            (TokenKind::Punct, "##".to_string())
        } else if let Some(p) = PUNCT3.iter().find(|p| self.starts_with(p)) {
            self.pos += 3;
            (TokenKind::Punct, p.to_string())
        } else if let Some(p) = PUNCT2.iter().find(|p| self.starts_with(p)) {
            self.pos += 2;
            (TokenKind::Punct, p.to_string())
        } else {
            self.pos += 1;
            (TokenKind::Punct, c.to_string())
        };

        Token {
            kind,
            text,
            line,
            space_before,
        }
    }

    fn directive(&mut self) -> Directive {
        let line = self.line;
        self.pos += 1; // '#'
        self.at_line_start = false;

        let mut tokens = Vec::new();
        let mut name = String::new();
        let mut ended = self.skip_trivia(true);
        if !ended && self.peek(0).is_some_and(is_ident_start) {
            name = self.take_while(is_ident_char);
            self.spaced = false;
        }

        while !ended {
            ended = self.skip_trivia(true);
            if !ended {
                tokens.push(self.next_token());
            }
        }

        Directive { name, tokens, line }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize C source
pub fn lex(source: &str) -> Lexed {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();
    let mut directives = Vec::new();

    loop {
        if cursor.skip_trivia(false) {
            break;
        }
        if cursor.peek(0) == Some('#') && cursor.at_line_start {
            directives.push(cursor.directive());
            continue;
        }
        cursor.at_line_start = false;
        tokens.push(cursor.next_token());
    }

    Lexed {
        tokens,
        directives,
        comments: cursor.comments,
    }
}
