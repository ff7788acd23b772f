//! A single cached channel entry

use std::sync::{Mutex, RwLock};

use crate::channel::client::Subscription;
use crate::channel::ChannelValue;

/// One cache entry, alive for the rest of the process.
///
/// A fixed entry captures its value at construction and never changes. A
/// live entry starts on the disconnected placeholder and is overwritten
/// from the subscription's delivery path; readers always observe a
/// fully-formed value because the slot is swapped under its own lock.
#[derive(Debug)]
pub struct CacheEntry {
    value: RwLock<ChannelValue>,
    live: bool,
    subscription: Mutex<Option<Subscription>>,
}

impl CacheEntry {
    /// An entry whose value was captured once and never updates.
    pub fn fixed(value: ChannelValue) -> CacheEntry {
        CacheEntry {
            value: RwLock::new(value),
            live: false,
            subscription: Mutex::new(None),
        }
    }

    /// An entry fed by a subscription, starting disconnected.
    pub fn live() -> CacheEntry {
        CacheEntry {
            value: RwLock::new(ChannelValue::Disconnected),
            live: true,
            subscription: Mutex::new(None),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Current value, cloned out from under the slot lock.
    pub fn current(&self) -> ChannelValue {
        self.value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the current value. Only the delivery path of a live entry
    /// calls this.
    pub fn store(&self, value: ChannelValue) {
        let mut slot = self
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = value;
    }

    /// Attach the subscription keeping this entry's updates flowing; held
    /// until process shutdown.
    pub fn attach(&self, subscription: Subscription) {
        let mut slot = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Severity;

    #[test]
    fn test_fixed_entry_keeps_value() {
        let entry = CacheEntry::fixed(ChannelValue::sample("42", Severity::Normal));
        assert_eq!(entry.current().value_text(), "42");
        assert!(!entry.is_live());
    }

    #[test]
    fn test_live_entry_starts_disconnected() {
        let entry = CacheEntry::live();
        assert_eq!(entry.current(), ChannelValue::Disconnected);
    }

    #[test]
    fn test_live_entry_store_replaces_value() {
        let entry = CacheEntry::live();
        entry.store(ChannelValue::sample("7", Severity::Minor));
        assert_eq!(entry.current().value_text(), "7");
        entry.store(ChannelValue::Disconnected);
        assert_eq!(entry.current(), ChannelValue::Disconnected);
    }
}
