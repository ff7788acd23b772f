//! Lexer and argument parser for template tags
//!
//! The text between `{%` and `%}` is a tag call: a tag name, a channel
//! argument (bare or quoted), then zero or more `key=value` options.
//! Quoted arguments use `\x` escapes, so channel names may contain spaces
//! or `=` when quoted.

use logos::Logos;

/// Parse failure inside a tag body; `offset` is relative to the body.
#[derive(Debug, Clone, PartialEq)]
pub struct TagParseError {
    pub offset: usize,
    pub message: String,
}

impl TagParseError {
    fn new(offset: usize, message: impl Into<String>) -> TagParseError {
        TagParseError {
            offset,
            message: message.into(),
        }
    }
}

fn unescape_quoted(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum TagToken {
    #[token("=")]
    Equals,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape_quoted(lex.slice()))]
    Quoted(String),

    #[regex(r#"[^"=\s]+"#, |lex| lex.slice().to_string())]
    Bare(String),
}

/// A parsed tag call, arguments still unexpanded.
#[derive(Debug, Clone, PartialEq)]
pub struct TagCall {
    pub name: String,
    /// Channel argument as written; macro references inside it are
    /// expanded at evaluation time
    pub channel: String,
    pub options: Vec<(String, String)>,
}

/// Parse the body of a `{% ... %}` tag.
pub fn parse_tag(body: &str) -> Result<TagCall, TagParseError> {
    let mut tokens = Vec::new();
    for (token, span) in TagToken::lexer(body).spanned() {
        match token {
            Ok(t) => tokens.push((t, span.start)),
            Err(()) => {
                return Err(TagParseError::new(
                    span.start,
                    "unrecognized character in tag",
                ))
            }
        }
    }

    let mut iter = tokens.into_iter();

    let name = match iter.next() {
        Some((TagToken::Bare(name), _)) => name,
        Some((_, offset)) => return Err(TagParseError::new(offset, "expected a tag name")),
        None => return Err(TagParseError::new(0, "empty tag")),
    };

    let channel = match iter.next() {
        Some((TagToken::Bare(text), _)) | Some((TagToken::Quoted(text), _)) => text,
        Some((TagToken::Equals, offset)) => {
            return Err(TagParseError::new(offset, "expected a channel argument"))
        }
        None => {
            return Err(TagParseError::new(
                body.len(),
                "missing channel argument",
            ))
        }
    };

    let mut options = Vec::new();
    while let Some((token, offset)) = iter.next() {
        let key = match token {
            TagToken::Bare(key) => key,
            _ => return Err(TagParseError::new(offset, "expected an option name")),
        };
        match iter.next() {
            Some((TagToken::Equals, _)) => {}
            Some((_, offset)) => {
                return Err(TagParseError::new(offset, "expected '=' after option name"))
            }
            None => {
                return Err(TagParseError::new(
                    body.len(),
                    "expected '=' after option name",
                ))
            }
        }
        let value = match iter.next() {
            Some((TagToken::Bare(v), _)) | Some((TagToken::Quoted(v), _)) => v,
            Some((TagToken::Equals, offset)) => {
                return Err(TagParseError::new(offset, "expected an option value"))
            }
            None => {
                return Err(TagParseError::new(body.len(), "expected an option value"))
            }
        };
        options.push((key, value));
    }

    Ok(TagCall {
        name,
        channel,
        options,
    })
}
