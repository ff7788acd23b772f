//! Instrument-access client boundary
//!
//! The cache talks to instruments through this trait; the wire protocol
//! behind it is deliberately unspecified. A backend must support a single
//! round-trip read and a continuous subscription whose updates arrive on
//! the backend's own delivery path, never blocking on the consumer.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::channel::{ChannelRequest, ChannelValue};

/// Failures reported by a backend.
///
/// The cache maps all of these to the renderable `Disconnected` value;
/// they never propagate to template expansion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("channel '{channel}' is unreachable")]
    Unreachable { channel: String },

    #[error("protocol error on '{channel}': {message}")]
    Protocol { channel: String, message: String },
}

/// Callback invoked by a backend for every delivered update, including
/// disconnect transitions. Must be cheap and non-blocking.
pub type UpdateSink = Arc<dyn Fn(ChannelValue) + Send + Sync>;

/// Keeps a monitor subscription alive; dropping it ends delivery.
pub struct Subscription {
    _guard: Box<dyn Any + Send>,
}

impl Subscription {
    /// Wrap any owner whose `Drop` tears the subscription down.
    pub fn new(guard: impl Any + Send) -> Subscription {
        Subscription {
            _guard: Box::new(guard),
        }
    }

    /// A subscription with nothing behind it, for channels that will never
    /// deliver.
    pub fn inert() -> Subscription {
        Subscription::new(())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}

/// A pub/sub or request/response client for named live values.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// One blocking round-trip for the channel's current value.
    async fn get(
        &self,
        channel: &str,
        request: &ChannelRequest,
    ) -> Result<ChannelValue, ClientError>;

    /// Open a continuous subscription. Every update (value or disconnect)
    /// is pushed into `sink` from the backend's own delivery path.
    async fn monitor(
        &self,
        channel: &str,
        request: &ChannelRequest,
        sink: UpdateSink,
    ) -> Result<Subscription, ClientError>;
}
