//! Source tokenization: string-literal extraction, then whitespace split.

use std::collections::VecDeque;
use std::fmt;

use stackarch_core::isa::TokenMeta;

/// A source word with its location (1-based line and word number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub val: String,
    pub line: usize,
    pub num: usize,
}

impl Token {
    pub fn meta(&self) -> TokenMeta {
        TokenMeta {
            val: self.val.clone(),
            line: self.line,
            num: self.num,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | (ln:{}, wrd num:{})", self.val, self.line, self.num)
    }
}

/// Pull every `." body"` literal out of the source, replacing it with the
/// bare `."` marker. Bodies may contain whitespace but neither `"` nor a
/// newline; an unterminated literal is left untouched and surfaces later
/// as an `ExpectedStringLiteral`.
pub fn extract_string_literals(src: &str) -> (String, VecDeque<String>) {
    let mut clean = String::with_capacity(src.len());
    let mut literals = VecDeque::new();
    let mut rest = src;
    while let Some(pos) = rest.find(".\" ") {
        clean.push_str(&rest[..pos]);
        let body_on = &rest[pos + 3..];
        match body_on.find(['"', '\n']) {
            Some(end) if body_on.as_bytes()[end] == b'"' => {
                literals.push_back(body_on[..end].to_string());
                clean.push_str(".\"");
                rest = &body_on[end + 1..];
            }
            _ => {
                clean.push_str(".\" ");
                rest = body_on;
            }
        }
    }
    clean.push_str(rest);
    (clean, literals)
}

/// Split on whitespace, attaching line/word-number metadata.
pub fn tokenize(src: &str) -> VecDeque<Token> {
    src.lines()
        .enumerate()
        .flat_map(|(line_n, line)| {
            line.split_whitespace()
                .enumerate()
                .map(move |(word_n, word)| Token {
                    val: word.to_string(),
                    line: line_n + 1,
                    num: word_n + 1,
                })
        })
        .collect()
}
