//! Last-write-wins bookkeeping for overlapping requests.
//!
//! Each request takes a token when it is issued. When it completes, its
//! result is kept only if no newer request has been issued since; a late
//! answer to a superseded request is dropped instead of overwriting a newer one.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn seq(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestToken {
        RequestToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.issued.load(Ordering::SeqCst) == token.0
    }
}

/// Holds the result of the most recently issued request.
#[derive(Debug)]
pub struct LatestSlot<T> {
    sequencer: RequestSequencer,
    value: Mutex<Option<(RequestToken, T)>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            sequencer: RequestSequencer::new(),
            value: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestToken {
        self.sequencer.issue()
    }

    /// Store `value` if `token` is still the newest issued. Returns whether it was kept.
    pub fn complete(&self, token: RequestToken, value: T) -> bool {
        let mut slot = self.value.lock().unwrap_or_else(|e| e.into_inner());
        if !self.sequencer.is_current(token) {
            tracing::debug!(seq = token.seq(), "discarding superseded result");
            return false;
        }
        *slot = Some((token, value));
        true
    }

    pub fn get(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn tokens_increase_monotonically() {
        let seq = RequestSequencer::new();
        let a = seq.issue();
        let b = seq.issue();
        assert!(b > a);
        assert!(!seq.is_current(a));
        assert!(seq.is_current(b));
    }

    #[test]
    fn late_result_of_superseded_request_is_dropped() {
        let slot = LatestSlot::new();
        let first = slot.issue();
        let second = slot.issue();
        assert!(slot.complete(second, "newer"));
        assert!(!slot.complete(first, "older"));
        assert_eq!(slot.get(), Some("newer"));
    }

    #[test]
    fn empty_until_first_completion() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        let t = slot.issue();
        assert_eq!(slot.get(), None);
        assert!(slot.complete(t, 7));
        assert_eq!(slot.get(), Some(7));
    }

    #[tokio::test]
    async fn arrival_order_does_not_matter() {
        let slot = Arc::new(LatestSlot::new());
        let slow = slot.issue();
        let fast = slot.issue();

        let s = Arc::clone(&slot);
        let slow_task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            s.complete(slow, "slow")
        });
        let s = Arc::clone(&slot);
        let fast_task = tokio::spawn(async move { s.complete(fast, "fast") });

        assert!(fast_task.await.unwrap());
        assert!(!slow_task.await.unwrap());
        assert_eq!(slot.get(), Some("fast"));
    }
}
