//! Error types shared across the expansion pipeline

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Parse failure in a macro-definition string.
///
/// Carries the byte offset of the offending character together with the
/// original string, so the failure can be reported in context instead of
/// silently dropping the assignment.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed macro string at offset {offset}: {message}")]
pub struct MacroError {
    /// Byte offset of the offending character in `input`
    pub offset: usize,
    /// What went wrong at that position
    pub message: String,
    /// The macro string that failed to parse
    pub input: String,
}

impl MacroError {
    pub fn new(offset: usize, message: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            input: input.into(),
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, origin: &str) -> String {
        let mut buf = Vec::new();
        let span = self.offset..(self.offset + 1).min(self.input.len().max(1));
        Report::build(ReportKind::Error, origin, self.offset)
            .with_message(&self.message)
            .with_label(
                Label::new((origin, span))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((origin, Source::from(self.input.as_str())), &mut buf)
            .ok();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Synchronous failures surfaced by [`ValueCache::fetch`](crate::cache::ValueCache::fetch).
///
/// These are immediate, caller-side mistakes. An unreachable or timed-out
/// channel is not an error at this level; it yields a renderable
/// `Disconnected` value instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The channel reference was empty or otherwise unusable
    #[error("invalid channel reference: {reason}")]
    InvalidReference { reason: String },

    /// An option name or value was not recognized
    #[error("unknown option {name}={value}")]
    UnknownOption { name: String, value: String },
}

impl FetchError {
    pub fn invalid_reference(reason: impl Into<String>) -> Self {
        FetchError::InvalidReference {
            reason: reason.into(),
        }
    }

    pub fn unknown_option(name: impl Into<String>, value: impl Into<String>) -> Self {
        FetchError::UnknownOption {
            name: name.into(),
            value: value.into(),
        }
    }
}
