//! chanexpand - template expansion from live channel values
//!
//! Renders text templates whose content is populated by values read from
//! named external channels, either once or continuously as the values
//! change. Channel references are deduplicated through a process-wide
//! [`ValueCache`]; in continuous mode every monitored update feeds a
//! single coalesced change signal that drives re-expansion.
//!
//! # Example
//!
//! Inline macro strings attach per-file substitutions to a specifier:
//!
//! ```rust
//! use chanexpand::macros::FileSpecifier;
//!
//! let spec = FileSpecifier::parse("status.html:P=SIM:,TITLE=\"Cell 1\"").unwrap();
//! assert_eq!(spec.path(), std::path::Path::new("status.html"));
//! let macros = spec.macros.unwrap();
//! assert_eq!(macros.get("P"), Some("SIM:"));
//! assert_eq!(macros.get("TITLE"), Some("Cell 1"));
//! ```

pub mod cache;
pub mod channel;
pub mod error;
pub mod macros;
pub mod render;
pub mod scheduler;

pub use cache::{CacheConfig, ChangeAggregator, FetchMode, ValueCache, Wake};
pub use channel::client::{ChannelClient, ClientError, Subscription, UpdateSink};
pub use channel::{ChannelRequest, ChannelValue, DataType, Format, Sample, Severity};
pub use error::{FetchError, MacroError};
pub use macros::{parse_macros, FileSpecifier, MacroContext};
pub use render::{RenderContext, RenderError, Renderer, TagRenderer};
pub use scheduler::{effective_timeout, ExpansionScheduler, PassOutcome, SchedulerConfig};
