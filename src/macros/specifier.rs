//! File specifier parsing
//!
//! A raw command-line token names a template file, optionally followed by
//! an inline macro string: `path` or `path:NAME=VALUE,...`. The split is
//! on the first unescaped `:`; a `\:` is a literal colon belonging to the
//! path.

use std::path::{Path, PathBuf};

use crate::error::MacroError;
use crate::macros::{parse_macros, MacroContext};

/// A template file plus its inline macro definitions, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSpecifier {
    pub path: PathBuf,
    pub macros: Option<MacroContext>,
}

impl FileSpecifier {
    /// Parse a raw CLI token into a specifier.
    ///
    /// The macro segment, when present, is parsed eagerly so a malformed
    /// string is reported against this one specifier and never aborts the
    /// others.
    pub fn parse(raw: &str) -> Result<FileSpecifier, MacroError> {
        let (path, macro_segment) = split_raw(raw);
        let macros = match macro_segment {
            Some(segment) => Some(parse_macros(segment)?),
            None => None,
        };
        Ok(FileSpecifier {
            path: PathBuf::from(path),
            macros,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Split a raw token on the first unescaped `:`, resolving `\:` escapes
/// in the path part.
fn split_raw(raw: &str) -> (String, Option<&str>) {
    let mut path = String::with_capacity(raw.len());
    let mut indices = raw.char_indices();
    while let Some((i, c)) = indices.next() {
        match c {
            '\\' => match raw[i + 1..].chars().next() {
                Some(':') => {
                    path.push(':');
                    indices.next();
                }
                _ => path.push('\\'),
            },
            ':' => return (path, Some(&raw[i + 1..])),
            _ => path.push(c),
        }
    }
    (path, None)
}
