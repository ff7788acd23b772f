//! Channel value model and request options
//!
//! A channel is a named external live value. Requests against a channel
//! carry a small option set: a retrieval format, an optional data-type
//! override, and a flag requesting property-change notifications. Options
//! arrive as loose `(name, value)` string pairs from the template tags and
//! are canonicalized into a typed [`ChannelRequest`] here, so equivalent
//! option sets compare equal no matter how the call site spelled them.

pub mod client;
pub mod sim;

use std::time::SystemTime;

use crate::error::FetchError;

/// Alarm severity attached to a delivered sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    Normal,
    Minor,
    Major,
    Invalid,
}

impl Severity {
    /// Human-readable label; empty for normal severity.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Normal => "",
            Severity::Minor => "Minor",
            Severity::Major => "Major",
            Severity::Invalid => "Invalid",
        }
    }

    pub fn from_level(level: u8) -> Severity {
        match level {
            0 => Severity::Normal,
            1 => Severity::Minor,
            2 => Severity::Major,
            _ => Severity::Invalid,
        }
    }
}

/// One delivered value of a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Value rendered to text by the client, per the requested data type
    pub text: String,
    pub severity: Severity,
    pub timestamp: Option<SystemTime>,
}

impl Sample {
    pub fn new(text: impl Into<String>, severity: Severity) -> Sample {
        Sample {
            text: text.into(),
            severity,
            timestamp: Some(SystemTime::now()),
        }
    }
}

/// The current state of a channel as seen through the cache.
///
/// `Disconnected` is a normal, renderable value, not an error: templates
/// show a status string for unreachable channels instead of aborting.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelValue {
    #[default]
    Disconnected,
    Sample(Sample),
}

impl ChannelValue {
    pub fn sample(text: impl Into<String>, severity: Severity) -> ChannelValue {
        ChannelValue::Sample(Sample::new(text, severity))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelValue::Sample(_))
    }

    /// Severity label, with `Disconnected` standing in when no value has
    /// ever been delivered.
    pub fn severity_label(&self) -> &'static str {
        match self {
            ChannelValue::Disconnected => "Disconnected",
            ChannelValue::Sample(s) => s.severity.label(),
        }
    }

    /// The value as display text, or `no value` when disconnected.
    pub fn value_text(&self) -> &str {
        match self {
            ChannelValue::Disconnected => "no value",
            ChannelValue::Sample(s) => &s.text,
        }
    }
}

/// Retrieval format requested from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    Raw,
    /// Value plus timestamp and severity (the default)
    #[default]
    Time,
    /// Value plus display metadata; `GR` is an accepted alias
    Ctrl,
}

impl Format {
    fn parse(value: &str) -> Option<Format> {
        match value.to_ascii_uppercase().as_str() {
            "RAW" => Some(Format::Raw),
            "TIME" => Some(Format::Time),
            "CTRL" | "GR" => Some(Format::Ctrl),
            _ => None,
        }
    }
}

/// Data-type override requested from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Char,
    Short,
    Long,
    Enum,
    Float,
    Double,
    CharStr,
}

impl DataType {
    fn parse(value: &str) -> Option<DataType> {
        match value.to_ascii_uppercase().as_str() {
            "STRING" => Some(DataType::String),
            "CHAR" => Some(DataType::Char),
            "SHORT" => Some(DataType::Short),
            "LONG" => Some(DataType::Long),
            "ENUM" => Some(DataType::Enum),
            "FLOAT" => Some(DataType::Float),
            "DOUBLE" => Some(DataType::Double),
            "CHAR_STR" => Some(DataType::CharStr),
            _ => None,
        }
    }

    /// Whether values of this type render as integers.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            DataType::Char | DataType::Short | DataType::Long | DataType::Enum
        )
    }
}

/// Canonicalized request options.
///
/// Two requests built from the same logical option set are equal, which is
/// what makes cache keys collide correctly: option order never matters and
/// aliases (`GR` for `CTRL`) collapse during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ChannelRequest {
    pub format: Format,
    pub datatype: Option<DataType>,
    /// Request change-of-property notifications in monitor mode
    pub property_events: bool,
}

impl ChannelRequest {
    /// Build a request from loose `(name, value)` option pairs.
    ///
    /// Recognized names are `format`, `dtype` and `events` (value `prop`);
    /// names and values match case-insensitively and a repeated name takes
    /// its last value. Anything else is an `UnknownOption` error.
    pub fn from_options<S: AsRef<str>>(options: &[(S, S)]) -> Result<ChannelRequest, FetchError> {
        let mut request = ChannelRequest::default();
        for (name, value) in options {
            let (name, value) = (name.as_ref(), value.as_ref());
            match name.to_ascii_lowercase().as_str() {
                "format" => {
                    request.format = Format::parse(value)
                        .ok_or_else(|| FetchError::unknown_option(name, value))?;
                }
                "dtype" => {
                    request.datatype = Some(
                        DataType::parse(value)
                            .ok_or_else(|| FetchError::unknown_option(name, value))?,
                    );
                }
                "events" => {
                    if !value.eq_ignore_ascii_case("prop") {
                        return Err(FetchError::unknown_option(name, value));
                    }
                    request.property_events = true;
                }
                _ => return Err(FetchError::unknown_option(name, value)),
            }
        }
        Ok(request)
    }

    pub fn with_datatype(mut self, datatype: DataType) -> Self {
        self.datatype = Some(datatype);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn opts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_request_uses_time_format() {
        let request = ChannelRequest::from_options::<&str>(&[]).unwrap();
        assert_eq!(request.format, Format::Time);
        assert_eq!(request.datatype, None);
        assert!(!request.property_events);
    }

    #[test]
    fn test_option_order_does_not_matter() {
        let a = ChannelRequest::from_options(&opts(&[("format", "RAW"), ("dtype", "DOUBLE")]))
            .unwrap();
        let b = ChannelRequest::from_options(&opts(&[("dtype", "DOUBLE"), ("format", "RAW")]))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gr_is_an_alias_for_ctrl() {
        let gr = ChannelRequest::from_options(&opts(&[("format", "GR")])).unwrap();
        let ctrl = ChannelRequest::from_options(&opts(&[("format", "CTRL")])).unwrap();
        assert_eq!(gr, ctrl);
    }

    #[test]
    fn test_case_insensitive_names_and_values() {
        let request =
            ChannelRequest::from_options(&opts(&[("Format", "time"), ("DTYPE", "long")])).unwrap();
        assert_eq!(request.format, Format::Time);
        assert_eq!(request.datatype, Some(DataType::Long));
    }

    #[test]
    fn test_repeated_option_last_wins() {
        let request =
            ChannelRequest::from_options(&opts(&[("format", "RAW"), ("format", "CTRL")])).unwrap();
        assert_eq!(request.format, Format::Ctrl);
    }

    #[test]
    fn test_unknown_option_name_rejected() {
        let err = ChannelRequest::from_options(&opts(&[("count", "4")])).expect_err("should fail");
        assert_eq!(
            err,
            crate::error::FetchError::unknown_option("count", "4")
        );
    }

    #[test]
    fn test_unknown_option_value_rejected() {
        assert!(ChannelRequest::from_options(&opts(&[("format", "WIDE")])).is_err());
        assert!(ChannelRequest::from_options(&opts(&[("dtype", "BLOB")])).is_err());
        assert!(ChannelRequest::from_options(&opts(&[("events", "all")])).is_err());
    }

    #[test]
    fn test_disconnected_renders_status_text() {
        let value = ChannelValue::Disconnected;
        assert_eq!(value.severity_label(), "Disconnected");
        assert_eq!(value.value_text(), "no value");
    }

    #[test]
    fn test_sample_severity_labels() {
        assert_eq!(ChannelValue::sample("1", Severity::Normal).severity_label(), "");
        assert_eq!(
            ChannelValue::sample("1", Severity::Major).severity_label(),
            "Major"
        );
    }
}
