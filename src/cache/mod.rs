//! Deduplicating cache over live channel values
//!
//! Every template tag that references a channel goes through
//! [`ValueCache::fetch`]. The cache keys on the channel name plus the
//! canonicalized request options, so any number of references to the same
//! logical value share one entry (and, in monitor mode, one subscription).
//! Entries are created on first reference and live until process shutdown;
//! the working set is bounded by the number of distinct references across
//! all templates, which is small and stable in practice.

mod entry;
mod signal;

pub use signal::{ChangeAggregator, Wake};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::channel::client::{ChannelClient, UpdateSink};
use crate::channel::{ChannelRequest, ChannelValue};
use crate::error::FetchError;
use entry::CacheEntry;

/// Retrieval mode, selected once at startup for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One blocking round-trip per entry; values never change afterwards
    Get,
    /// Continuous subscription per entry; values update asynchronously
    Monitor,
}

/// Cache construction parameters.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub mode: FetchMode,
    /// Bound on a single one-shot round-trip
    pub timeout: Duration,
    /// Allow tags to request property-change notifications
    pub use_property_events: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            mode: FetchMode::Get,
            timeout: Duration::from_secs(5),
            use_property_events: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    channel: String,
    request: ChannelRequest,
}

/// The process-wide channel value cache.
pub struct ValueCache {
    client: Arc<dyn ChannelClient>,
    config: CacheConfig,
    entries: Mutex<HashMap<CacheKey, Arc<CacheEntry>>>,
    changes: Arc<ChangeAggregator>,
}

impl ValueCache {
    pub fn new(client: Arc<dyn ChannelClient>, config: CacheConfig) -> ValueCache {
        ValueCache {
            client,
            config,
            entries: Mutex::new(HashMap::new()),
            changes: Arc::new(ChangeAggregator::new()),
        }
    }

    /// The shared change signal fed by all monitored entries.
    pub fn changes(&self) -> Arc<ChangeAggregator> {
        self.changes.clone()
    }

    /// Number of distinct entries created so far.
    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Fetch the current value for `channel` under loose option pairs.
    ///
    /// See [`ChannelRequest::from_options`] for the recognized options.
    pub async fn fetch<S: AsRef<str>>(
        &self,
        channel: &str,
        options: &[(S, S)],
    ) -> Result<ChannelValue, FetchError> {
        let request = ChannelRequest::from_options(options)?;
        self.fetch_request(channel, request).await
    }

    /// Fetch the current value for `channel` under an already-typed
    /// request.
    ///
    /// On a cache hit this is a non-blocking read of the entry's current
    /// value. On a miss, get mode performs one bounded round-trip and
    /// monitor mode opens the subscription; either way the entry is
    /// created exactly once per key, even under racing first fetches.
    pub async fn fetch_request(
        &self,
        channel: &str,
        mut request: ChannelRequest,
    ) -> Result<ChannelValue, FetchError> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(FetchError::invalid_reference("channel name is empty"));
        }
        if !self.config.use_property_events {
            request.property_events = false;
        }

        let key = CacheKey {
            channel: channel.to_string(),
            request,
        };

        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(&key) {
            return Ok(entry.current());
        }

        let entry = match self.config.mode {
            FetchMode::Get => Arc::new(CacheEntry::fixed(self.one_shot(&key).await)),
            FetchMode::Monitor => self.subscribe(&key).await,
        };
        let value = entry.current();
        entries.insert(key, entry);
        Ok(value)
    }

    /// One bounded round-trip; failures and timeouts become the terminal
    /// disconnected value rather than errors.
    async fn one_shot(&self, key: &CacheKey) -> ChannelValue {
        let read = self.client.get(&key.channel, &key.request);
        match tokio::time::timeout(self.config.timeout, read).await {
            Ok(Ok(value)) => {
                debug!(channel = %key.channel, value = %value.value_text(), "one-shot read");
                value
            }
            Ok(Err(err)) => {
                debug!(channel = %key.channel, error = %err, "one-shot read failed");
                ChannelValue::Disconnected
            }
            Err(_) => {
                debug!(
                    channel = %key.channel,
                    timeout = ?self.config.timeout,
                    "one-shot read timed out"
                );
                ChannelValue::Disconnected
            }
        }
    }

    /// Open the subscription feeding a live entry. The delivery closure
    /// writes the value slot and signals the aggregator; it never blocks
    /// on the scheduler.
    async fn subscribe(&self, key: &CacheKey) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry::live());
        let sink: UpdateSink = {
            let entry = entry.clone();
            let changes = self.changes.clone();
            let channel = key.channel.clone();
            Arc::new(move |value: ChannelValue| {
                if !value.is_connected() {
                    debug!(channel = %channel, "monitor disconnect");
                }
                entry.store(value);
                changes.signal();
            })
        };

        match self.client.monitor(&key.channel, &key.request, sink).await {
            Ok(subscription) => {
                debug!(channel = %key.channel, "monitor opened");
                entry.attach(subscription);
            }
            Err(err) => {
                warn!(channel = %key.channel, error = %err, "monitor failed to open");
            }
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::client::{ClientError, Subscription, UpdateSink};
    use crate::channel::Severity;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scripted client: counts calls, records requests, captures monitor
    /// sinks so tests can drive updates by hand.
    #[derive(Default)]
    struct MockClient {
        get_calls: AtomicUsize,
        monitor_calls: AtomicUsize,
        responses: StdMutex<Vec<ChannelValue>>,
        requests: StdMutex<Vec<ChannelRequest>>,
        sinks: StdMutex<Vec<UpdateSink>>,
        get_delay: Option<Duration>,
    }

    impl MockClient {
        fn with_responses(values: &[&str]) -> MockClient {
            MockClient {
                responses: StdMutex::new(
                    values
                        .iter()
                        .rev()
                        .map(|v| ChannelValue::sample(*v, Severity::Normal))
                        .collect(),
                ),
                ..MockClient::default()
            }
        }

        fn drive_update(&self, value: ChannelValue) {
            for sink in self.sinks.lock().unwrap().iter() {
                sink(value.clone());
            }
        }
    }

    #[async_trait]
    impl ChannelClient for MockClient {
        async fn get(
            &self,
            _channel: &str,
            request: &ChannelRequest,
        ) -> Result<ChannelValue, ClientError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.get_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| ChannelValue::sample("0", Severity::Normal)))
        }

        async fn monitor(
            &self,
            _channel: &str,
            request: &ChannelRequest,
            sink: UpdateSink,
        ) -> Result<Subscription, ClientError> {
            self.monitor_calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.sinks.lock().unwrap().push(sink);
            Ok(Subscription::inert())
        }
    }

    fn get_cache(client: Arc<MockClient>) -> ValueCache {
        ValueCache::new(client, CacheConfig::default())
    }

    fn monitor_cache(client: Arc<MockClient>) -> ValueCache {
        ValueCache::new(
            client,
            CacheConfig {
                mode: FetchMode::Monitor,
                ..CacheConfig::default()
            },
        )
    }

    fn opts(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_equal_keys_share_one_entry() {
        let client = Arc::new(MockClient::with_responses(&["1", "2"]));
        let cache = get_cache(client.clone());

        let first = cache
            .fetch("T:A", &opts(&[("format", "RAW"), ("dtype", "DOUBLE")]))
            .await
            .unwrap();
        let second = cache
            .fetch("T:A", &opts(&[("dtype", "DOUBLE"), ("format", "RAW")]))
            .await
            .unwrap();

        assert_eq!(client.get_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.entry_count().await, 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_distinct_options_get_distinct_entries() {
        let client = Arc::new(MockClient::with_responses(&["1", "2"]));
        let cache = get_cache(client.clone());

        cache.fetch("T:A", &opts(&[("format", "RAW")])).await.unwrap();
        cache.fetch("T:A", &opts(&[("format", "TIME")])).await.unwrap();

        assert_eq!(client.get_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.entry_count().await, 2);
    }

    #[tokio::test]
    async fn test_get_value_never_changes() {
        let client = Arc::new(MockClient::with_responses(&["1", "2"]));
        let cache = get_cache(client.clone());

        let first = cache.fetch::<&str>("T:A", &[]).await.unwrap();
        let second = cache.fetch::<&str>("T:A", &[]).await.unwrap();
        assert_eq!(first.value_text(), "1");
        assert_eq!(second.value_text(), "1");
    }

    #[tokio::test]
    async fn test_get_timeout_yields_disconnected() {
        let client = Arc::new(MockClient {
            get_delay: Some(Duration::from_millis(250)),
            ..MockClient::default()
        });
        let cache = ValueCache::new(
            client,
            CacheConfig {
                timeout: Duration::from_millis(20),
                ..CacheConfig::default()
            },
        );

        let value = cache.fetch::<&str>("T:SLOW", &[]).await.unwrap();
        assert_eq!(value, ChannelValue::Disconnected);
        // the failure is terminal for this key
        let again = cache.fetch::<&str>("T:SLOW", &[]).await.unwrap();
        assert_eq!(again, ChannelValue::Disconnected);
    }

    #[tokio::test]
    async fn test_empty_channel_name_is_invalid_reference() {
        let cache = get_cache(Arc::new(MockClient::default()));
        assert!(matches!(
            cache.fetch::<&str>("", &[]).await,
            Err(FetchError::InvalidReference { .. })
        ));
        assert!(matches!(
            cache.fetch::<&str>("   ", &[]).await,
            Err(FetchError::InvalidReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_option_is_synchronous_error() {
        let client = Arc::new(MockClient::default());
        let cache = get_cache(client.clone());
        let err = cache
            .fetch("T:A", &opts(&[("mode", "fast")]))
            .await
            .expect_err("should fail");
        assert_eq!(err, FetchError::unknown_option("mode", "fast"));
        // no entry was created for the bad request
        assert_eq!(cache.entry_count().await, 0);
        assert_eq!(client.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_monitor_first_fetch_is_disconnected_placeholder() {
        let client = Arc::new(MockClient::default());
        let cache = monitor_cache(client.clone());

        let value = cache.fetch::<&str>("T:A", &[]).await.unwrap();
        assert_eq!(value, ChannelValue::Disconnected);
        assert_eq!(client.monitor_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_monitor_updates_are_observed_and_signaled() {
        let client = Arc::new(MockClient::default());
        let cache = monitor_cache(client.clone());
        let changes = cache.changes();

        cache.fetch::<&str>("T:A", &[]).await.unwrap();
        assert_eq!(changes.signal_count(), 0);

        client.drive_update(ChannelValue::sample("7", Severity::Normal));
        assert_eq!(changes.signal_count(), 1);
        assert_eq!(cache.fetch::<&str>("T:A", &[]).await.unwrap().value_text(), "7");

        client.drive_update(ChannelValue::Disconnected);
        assert_eq!(changes.signal_count(), 2);
        assert_eq!(
            cache.fetch::<&str>("T:A", &[]).await.unwrap(),
            ChannelValue::Disconnected
        );
    }

    #[tokio::test]
    async fn test_monitor_subscribes_once_per_key() {
        let client = Arc::new(MockClient::default());
        let cache = monitor_cache(client.clone());

        cache.fetch::<&str>("T:A", &[]).await.unwrap();
        cache.fetch::<&str>("T:A", &[]).await.unwrap();
        cache.fetch::<&str>("T:B", &[]).await.unwrap();

        assert_eq!(client.monitor_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_property_events_suppressed_when_disabled() {
        let client = Arc::new(MockClient::default());
        let cache = ValueCache::new(
            client.clone(),
            CacheConfig {
                use_property_events: false,
                ..CacheConfig::default()
            },
        );

        cache
            .fetch("T:A", &opts(&[("events", "prop")]))
            .await
            .unwrap();
        cache.fetch::<&str>("T:A", &[]).await.unwrap();

        // with notifications disabled both spellings share one entry and
        // the backend never sees the flag
        assert_eq!(client.get_calls.load(Ordering::SeqCst), 1);
        assert!(client
            .requests
            .lock()
            .unwrap()
            .iter()
            .all(|r| !r.property_events));
    }
}
