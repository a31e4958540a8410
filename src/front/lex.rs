//! A regex-matcher-based lexer, same shape as the rest of this pipeline's
//! table-driven passes: an ordered list of `(pattern, classifier)` pairs
//! tried at the current cursor, longest keyword match taking priority over
//! the identifier pattern via match order.

use regex::Regex;
use thiserror::Error;

use crate::common::{Id, Location};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TokenKind {
    Ident,
    IntLit,
    FloatLit,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    KwIf,
    KwElse,
    KwWhile,
    KwPrint,
    KwRead,
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: Location,
}

#[derive(Error, Debug)]
pub enum LexError {
    #[error("{0}: unrecognized character {1:?}")]
    UnexpectedChar(Location, char),
}

struct Rule {
    pattern: Regex,
    kind: TokenKind,
}

/// Lexer rules, in priority order: keywords before the general identifier
/// pattern, two-character operators before their one-character prefixes.
fn rules() -> Vec<Rule> {
    let r = |pat: &str, kind: TokenKind| Rule {
        pattern: Regex::new(pat).unwrap(),
        kind,
    };
    vec![
        r(r"^if\b", TokenKind::KwIf),
        r(r"^else\b", TokenKind::KwElse),
        r(r"^while\b", TokenKind::KwWhile),
        r(r"^print\b", TokenKind::KwPrint),
        r(r"^read\b", TokenKind::KwRead),
        r(r"^[A-Za-z_][A-Za-z0-9_]*", TokenKind::Ident),
        r(r"^[0-9]+\.[0-9]+", TokenKind::FloatLit),
        r(r"^[0-9]+", TokenKind::IntLit),
        r(r"^==", TokenKind::EqEq),
        r(r"^!=", TokenKind::NotEq),
        r(r"^<=", TokenKind::Le),
        r(r"^>=", TokenKind::Ge),
        r(r"^<", TokenKind::Lt),
        r(r"^>", TokenKind::Gt),
        r(r"^=", TokenKind::Assign),
        r(r"^\+", TokenKind::Plus),
        r(r"^-", TokenKind::Minus),
        r(r"^\*", TokenKind::Star),
        r(r"^/", TokenKind::Slash),
        r(r"^\(", TokenKind::LParen),
        r(r"^\)", TokenKind::RParen),
        r(r"^\{", TokenKind::LBrace),
        r(r"^\}", TokenKind::RBrace),
        r(r"^;", TokenKind::Semi),
    ]
}

pub struct Lexer {
    file: Id,
    src: String,
    pos: usize,
    line: u32,
    rules: Vec<Rule>,
}

impl Lexer {
    pub fn new(file: Id, src: &str) -> Self {
        Lexer {
            file,
            src: src.to_string(),
            pos: 0,
            line: 1,
            rules: rules(),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.src[self.pos..].chars().next() {
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                Some(c) if c.is_whitespace() => self.pos += c.len_utf8(),
                Some('#') => {
                    let rest = &self.src[self.pos..];
                    let skip = rest.find('\n').unwrap_or(rest.len());
                    self.pos += skip;
                }
                _ => break,
            }
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.file, self.line)
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_trivia();
        if self.pos >= self.src.len() {
            return Ok(None);
        }
        let rest = &self.src[self.pos..];
        for rule in &self.rules {
            if let Some(m) = rule.pattern.find(rest) {
                let text = m.as_str().to_string();
                let location = self.location();
                self.pos += text.len();
                return Ok(Some(Token { kind: rule.kind, text, location }));
            }
        }
        Err(LexError::UnexpectedChar(self.location(), rest.chars().next().unwrap()))
    }

    /// Tokenize the whole input, appending a trailing `Eof` token so the
    /// parser never needs to special-case running off the end.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        while let Some(tok) = self.next()? {
            out.push(tok);
        }
        out.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            location: self.location(),
        });
        Ok(out)
    }
}
