//! Scanner for inline macro-definition strings
//!
//! The syntax is `NAME=VALUE,NAME2=VALUE2,...`. A value is the
//! concatenation of adjacent quoted and bare segments up to the next `,`
//! (`A=foo"bar"` is `foobar`); a name with no `=` binds to the empty
//! string. Inside quotes `\"` is an escaped quote and `\x` is a literal
//! `x` for any character. End of input completes the pending assignment,
//! so `A=1,B` is `{A: "1", B: ""}`.
//!
//! This is a hand-written character scanner rather than a lexer grammar:
//! the escape rules reach across token boundaries and every failure must
//! carry the exact byte offset of the offending character.

use crate::error::MacroError;
use crate::macros::MacroContext;

/// One lexical unit of a macro string, tagged with its start offset.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Run of characters containing none of `"`, `=`, `,`; trimmed of
    /// surrounding whitespace
    Bare(String, usize),
    /// `"`-delimited string with escapes resolved
    Quoted(String, usize),
    /// `=` or `,`
    Separator(char, usize),
}

/// Pull the next token starting at `*pos`, or `None` at end of input.
fn next_token(input: &str, pos: &mut usize) -> Result<Option<Token>, MacroError> {
    // skip inter-token whitespace
    while let Some(c) = input[*pos..].chars().next() {
        if c.is_whitespace() {
            *pos += c.len_utf8();
        } else {
            break;
        }
    }
    let start = *pos;
    let Some(first) = input[start..].chars().next() else {
        return Ok(None);
    };

    match first {
        '=' | ',' => {
            *pos += 1;
            Ok(Some(Token::Separator(first, start)))
        }
        '"' => {
            let mut text = String::new();
            let mut i = start + 1;
            loop {
                let Some(c) = input[i..].chars().next() else {
                    return Err(MacroError::new(start, "unterminated quoted string", input));
                };
                match c {
                    '"' => {
                        *pos = i + 1;
                        return Ok(Some(Token::Quoted(text, start)));
                    }
                    '\\' => {
                        let Some(escaped) = input[i + 1..].chars().next() else {
                            return Err(MacroError::new(
                                start,
                                "unterminated quoted string",
                                input,
                            ));
                        };
                        text.push(escaped);
                        i += 1 + escaped.len_utf8();
                    }
                    _ => {
                        text.push(c);
                        i += c.len_utf8();
                    }
                }
            }
        }
        _ => {
            let mut end = start;
            for c in input[start..].chars() {
                if matches!(c, '"' | '=' | ',') {
                    break;
                }
                end += c.len_utf8();
            }
            *pos = end;
            Ok(Some(Token::Bare(input[start..end].trim().to_string(), start)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    ExpectName,
    ExpectSeparatorOrEnd,
    ExpectValue,
    InValueConcat,
}

/// Parse a macro-definition string into an ordered name -> value mapping.
pub fn parse_macros(input: &str) -> Result<MacroContext, MacroError> {
    let mut ctx = MacroContext::new();
    let mut state = State::ExpectName;
    let mut name = String::new();
    let mut value = String::new();
    let mut pos = 0usize;

    loop {
        let token = next_token(input, &mut pos)?;
        match state {
            State::ExpectName => match token {
                None => break,
                Some(Token::Bare(text, _)) => {
                    name = text;
                    state = State::ExpectSeparatorOrEnd;
                }
                Some(Token::Separator(c, offset)) => {
                    return Err(MacroError::new(
                        offset,
                        format!("separator '{c}' where a macro name was expected"),
                        input,
                    ));
                }
                Some(Token::Quoted(_, offset)) => {
                    return Err(MacroError::new(
                        offset,
                        "quoted value where a macro name was expected",
                        input,
                    ));
                }
            },
            State::ExpectSeparatorOrEnd => match token {
                None => {
                    ctx.insert(std::mem::take(&mut name), "");
                    break;
                }
                Some(Token::Separator('=', _)) => state = State::ExpectValue,
                Some(Token::Separator(_, _)) => {
                    ctx.insert(std::mem::take(&mut name), "");
                    state = State::ExpectName;
                }
                Some(Token::Bare(_, offset)) | Some(Token::Quoted(_, offset)) => {
                    return Err(MacroError::new(
                        offset,
                        format!("value before '=' in assignment to '{name}'"),
                        input,
                    ));
                }
            },
            State::ExpectValue => match token {
                None => {
                    ctx.insert(std::mem::take(&mut name), "");
                    break;
                }
                Some(Token::Bare(text, _)) | Some(Token::Quoted(text, _)) => {
                    value = text;
                    state = State::InValueConcat;
                }
                Some(Token::Separator(',', _)) => {
                    ctx.insert(std::mem::take(&mut name), "");
                    state = State::ExpectName;
                }
                Some(Token::Separator(c, offset)) => {
                    return Err(MacroError::new(
                        offset,
                        format!("unexpected '{c}' in value of '{name}'"),
                        input,
                    ));
                }
            },
            State::InValueConcat => match token {
                None => {
                    ctx.insert(std::mem::take(&mut name), std::mem::take(&mut value));
                    break;
                }
                Some(Token::Bare(text, _)) | Some(Token::Quoted(text, _)) => {
                    value.push_str(&text);
                }
                Some(Token::Separator(',', _)) => {
                    ctx.insert(std::mem::take(&mut name), std::mem::take(&mut value));
                    state = State::ExpectName;
                }
                Some(Token::Separator(c, offset)) => {
                    return Err(MacroError::new(
                        offset,
                        format!("unexpected '{c}' in value of '{name}'"),
                        input,
                    ));
                }
            },
        }
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parsed(input: &str) -> Vec<(String, String)> {
        parse_macros(input)
            .expect("should parse")
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_assignments() {
        assert_eq!(
            parsed("P=SIM:,N=3"),
            pairs(&[("P", "SIM:"), ("N", "3")])
        );
    }

    #[test]
    fn test_quoted_value_may_contain_separators() {
        assert_eq!(
            parsed(r#"NAME=VAL,OTHER="a,b""#),
            pairs(&[("NAME", "VAL"), ("OTHER", "a,b")])
        );
    }

    #[test]
    fn test_adjacent_segments_concatenate() {
        assert_eq!(parsed(r#"NAME=foo"bar""#), pairs(&[("NAME", "foobar")]));
        assert_eq!(
            parsed(r#"NAME="a"b"c""#),
            pairs(&[("NAME", "abc")])
        );
    }

    #[test]
    fn test_name_alone_binds_empty() {
        assert_eq!(parsed("NAME"), pairs(&[("NAME", "")]));
        assert_eq!(parsed("A,B=2"), pairs(&[("A", ""), ("B", "2")]));
        assert_eq!(parsed("A=,B=2"), pairs(&[("A", ""), ("B", "2")]));
    }

    #[test]
    fn test_end_of_input_completes_pending_assignment() {
        assert_eq!(parsed("A=1,B"), pairs(&[("A", "1"), ("B", "")]));
        assert_eq!(parsed("A="), pairs(&[("A", "")]));
    }

    #[test]
    fn test_escaped_quote_and_literal_escape() {
        assert_eq!(
            parsed(r#"MSG="say \"hi\"""#),
            pairs(&[("MSG", r#"say "hi""#)])
        );
        assert_eq!(parsed(r#"X="a\,b""#), pairs(&[("X", "a,b")]));
    }

    #[test]
    fn test_bare_tokens_keep_interior_whitespace() {
        assert_eq!(parsed("A=foo bar"), pairs(&[("A", "foo bar")]));
        assert_eq!(parsed("X=1, Y=2"), pairs(&[("X", "1"), ("Y", "2")]));
    }

    #[test]
    fn test_empty_input_is_empty_context() {
        assert_eq!(parsed(""), pairs(&[]));
        assert_eq!(parsed("   "), pairs(&[]));
    }

    #[test]
    fn test_trailing_comma_accepted() {
        assert_eq!(parsed("A=1,"), pairs(&[("A", "1")]));
    }

    #[test]
    fn test_duplicate_name_last_wins() {
        assert_eq!(parsed("A=1,A=2"), pairs(&[("A", "2")]));
    }

    #[test]
    fn test_leading_separator_is_error() {
        let err = parse_macros(",A=1").expect_err("should fail");
        assert_eq!(err.offset, 0);
        assert!(err.message.contains("','"));
        assert_eq!(err.input, ",A=1");
    }

    #[test]
    fn test_quoted_where_name_expected_is_error() {
        let err = parse_macros(r#""A"=1"#).expect_err("should fail");
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_value_before_equals_is_error() {
        let err = parse_macros(r#"A"v""#).expect_err("should fail");
        assert_eq!(err.offset, 1);
        assert!(err.message.contains("before '='"));
    }

    #[test]
    fn test_second_equals_in_value_is_error() {
        let err = parse_macros("A=1=2").expect_err("should fail");
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let err = parse_macros(r#"A="open"#).expect_err("should fail");
        assert_eq!(err.offset, 2);
        assert!(err.message.contains("unterminated"));
    }
}
