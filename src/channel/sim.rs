//! Simulated channel backend
//!
//! A small in-process backend for demos and tests, configured from a TOML
//! file mapping channel names to generator definitions:
//!
//! ```toml
//! [channels."SIM:label"]
//! kind = "constant"
//! value = "Vacuum OK"
//!
//! [channels."SIM:count"]
//! kind = "counter"
//! step = 1.0
//! interval = 1.0
//!
//! [channels."SIM:temp"]
//! kind = "sine"
//! period = 30.0
//! amplitude = 5.0
//! offset = 21.0
//! ```
//!
//! Channels not defined in the file behave as unreachable: a one-shot read
//! fails and a monitor never delivers, so templates render the
//! disconnected status path.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::channel::client::{ChannelClient, ClientError, Subscription, UpdateSink};
use crate::channel::{ChannelRequest, ChannelValue, DataType, Severity};

/// Errors that can occur when loading channel definitions
#[derive(Debug, Error)]
pub enum SimConfigError {
    #[error("failed to read channel definitions: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse channel definitions: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_interval() -> f64 {
    1.0
}

fn default_step() -> f64 {
    1.0
}

fn default_period() -> f64 {
    60.0
}

fn default_amplitude() -> f64 {
    1.0
}

/// Generator definition for one simulated channel
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelSpec {
    /// Fixed value, delivered once per subscription
    Constant {
        value: String,
        /// Alarm level 0..=3
        #[serde(default)]
        severity: u8,
    },
    /// Monotonic counter advancing by `step` every `interval` seconds
    Counter {
        #[serde(default = "default_step")]
        step: f64,
        #[serde(default = "default_interval")]
        interval: f64,
    },
    /// Sine wave around `offset`
    Sine {
        #[serde(default = "default_period")]
        period: f64,
        #[serde(default = "default_amplitude")]
        amplitude: f64,
        #[serde(default)]
        offset: f64,
        #[serde(default = "default_interval")]
        interval: f64,
    },
}

impl ChannelSpec {
    fn update_interval(&self) -> Option<Duration> {
        match self {
            ChannelSpec::Constant { .. } => None,
            ChannelSpec::Counter { interval, .. } | ChannelSpec::Sine { interval, .. } => {
                Some(Duration::from_secs_f64(interval.max(0.01)))
            }
        }
    }

    fn value_at(&self, elapsed: f64, request: &ChannelRequest) -> ChannelValue {
        match self {
            ChannelSpec::Constant { value, severity } => ChannelValue::sample(
                render_text(value, request.datatype),
                Severity::from_level(*severity),
            ),
            ChannelSpec::Counter { step, interval } => {
                let ticks = (elapsed / interval.max(0.01)).floor();
                ChannelValue::sample(render_number(ticks * step, request.datatype), Severity::Normal)
            }
            ChannelSpec::Sine {
                period,
                amplitude,
                offset,
                ..
            } => {
                let phase = elapsed / period.max(0.01) * std::f64::consts::TAU;
                let level = offset + amplitude * phase.sin();
                ChannelValue::sample(render_number(level, request.datatype), Severity::Normal)
            }
        }
    }
}

/// Render a numeric level per the requested data type.
fn render_number(level: f64, datatype: Option<DataType>) -> String {
    match datatype {
        Some(t) if t.is_integral() => format!("{}", level.round() as i64),
        _ => {
            let text = format!("{level:.3}");
            let trimmed = text.trim_end_matches('0').trim_end_matches('.');
            trimmed.to_string()
        }
    }
}

/// Render a configured text value, converting through the numeric path
/// when an integral data type was requested and the text is numeric.
fn render_text(value: &str, datatype: Option<DataType>) -> String {
    match (datatype, value.parse::<f64>()) {
        (Some(t), Ok(level)) if t.is_integral() => format!("{}", level.round() as i64),
        _ => value.to_string(),
    }
}

struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// TOML file layout
#[derive(Debug, Default, Deserialize)]
struct SimFile {
    #[serde(default)]
    channels: HashMap<String, ChannelSpec>,
}

/// In-process simulated backend.
#[derive(Debug)]
pub struct SimClient {
    channels: HashMap<String, ChannelSpec>,
    epoch: Instant,
}

impl SimClient {
    /// A backend with no channels; every reference is unreachable.
    pub fn empty() -> SimClient {
        SimClient {
            channels: HashMap::new(),
            epoch: Instant::now(),
        }
    }

    pub fn from_file(path: &Path) -> Result<SimClient, SimConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<SimClient, SimConfigError> {
        let parsed: SimFile = toml::from_str(content)?;
        Ok(SimClient {
            channels: parsed.channels,
            epoch: Instant::now(),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn elapsed(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

#[async_trait]
impl ChannelClient for SimClient {
    async fn get(
        &self,
        channel: &str,
        request: &ChannelRequest,
    ) -> Result<ChannelValue, ClientError> {
        match self.channels.get(channel) {
            Some(spec) => Ok(spec.value_at(self.elapsed(), request)),
            None => Err(ClientError::Unreachable {
                channel: channel.to_string(),
            }),
        }
    }

    async fn monitor(
        &self,
        channel: &str,
        request: &ChannelRequest,
        sink: UpdateSink,
    ) -> Result<Subscription, ClientError> {
        let Some(spec) = self.channels.get(channel).cloned() else {
            // unknown channels stay silent; the consumer keeps its
            // disconnected placeholder
            return Ok(Subscription::inert());
        };

        let request = request.clone();
        let epoch = self.epoch;
        let interval = spec.update_interval();
        let handle = tokio::spawn(async move {
            loop {
                let elapsed = epoch.elapsed().as_secs_f64();
                sink(spec.value_at(elapsed, &request));
                match interval {
                    Some(period) => tokio::time::sleep(period).await,
                    // constants deliver once
                    None => break,
                }
            }
        });
        Ok(Subscription::new(AbortOnDrop(handle)))
    }
}
