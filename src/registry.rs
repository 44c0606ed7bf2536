//! Roster of live push subscribers.
//!
//! The gateway registers a subscriber once its WebSocket upgrade completes and
//! unregisters it when the connection ends. The broadcast loop enumerates a
//! copied membership view each cycle and unregisters anyone whose push failed.
//! Both sides may race to unregister the same id; the second call is a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::PushError;

/// Outbound half of a subscriber's transport.
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    /// Transmit one serialized snapshot frame.
    async fn send_frame(&self, frame: Arc<str>) -> Result<(), PushError>;
}

/// Opaque, monotonically increasing subscriber handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A registered push channel.
#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub connected_at: DateTime<Utc>,
    pub sink: Arc<dyn SubscriberSink>,
    /// Ends the owning connection task when cancelled
    pub session: CancellationToken,
}

impl Subscriber {
    /// Tell the connection task to close its transport. Idempotent.
    pub fn evict(&self) {
        self.session.cancel();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

/// Thread-safe subscriber registry. Cloning shares the same roster.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    /// Keyed by monotonic id, so iteration order is registration order
    members: RwLock<BTreeMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with a session token nobody watches.
    #[cfg(test)]
    pub async fn register(&self, sink: Arc<dyn SubscriberSink>) -> SubscriberId {
        self.register_with_session(sink, CancellationToken::new()).await
    }

    /// Add a live subscriber. It becomes eligible from the next broadcast cycle.
    /// `session` is cancelled if the broadcast loop evicts it.
    pub async fn register_with_session(
        &self,
        sink: Arc<dyn SubscriberSink>,
        session: CancellationToken,
    ) -> SubscriberId {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let subscriber = Subscriber {
            id,
            connected_at: Utc::now(),
            sink,
            session,
        };
        self.inner.members.write().await.insert(id, subscriber);
        id
    }

    /// Remove a subscriber. Returns `true` only for the call that actually
    /// removed it; repeated calls are harmless no-ops.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        self.inner.members.write().await.remove(&id).is_some()
    }

    /// Point-in-time copy of the membership in registration order.
    pub async fn snapshot_membership(&self) -> Vec<Subscriber> {
        self.inner.members.read().await.values().cloned().collect()
    }

    #[allow(clippy::len_without_is_empty)]
    pub async fn len(&self) -> usize {
        self.inner.members.read().await.len()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every frame it is sent; optionally fails every send.
    #[derive(Default)]
    pub struct RecordingSink {
        pub fail: bool,
        pub frames: Mutex<Vec<Arc<str>>>,
        pub attempts: AtomicU64,
    }

    impl RecordingSink {
        pub fn ok() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(RecordingSink {
                fail: true,
                ..Default::default()
            })
        }

        pub fn frames(&self) -> Vec<Arc<str>> {
            self.frames.lock().unwrap().clone()
        }

        pub fn attempts(&self) -> u64 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SubscriberSink for RecordingSink {
        async fn send_frame(&self, frame: Arc<str>) -> Result<(), PushError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PushError::Transport("stub failure".to_string()));
            }
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[tokio::test]
    async fn test_register_assigns_distinct_ordered_ids() {
        let registry = SubscriberRegistry::new();
        let a = registry.register(RecordingSink::ok()).await;
        let b = registry.register(RecordingSink::ok()).await;
        let c = registry.register(RecordingSink::ok()).await;
        assert!(a < b && b < c);

        let ids: Vec<_> = registry
            .snapshot_membership()
            .await
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(a.to_string(), "sub-1");
    }

    #[tokio::test]
    async fn test_double_unregister_is_noop() {
        let registry = SubscriberRegistry::new();
        let a = registry.register(RecordingSink::ok()).await;
        let b = registry.register(RecordingSink::ok()).await;

        assert!(registry.unregister(a).await);
        assert!(!registry.unregister(a).await);
        assert!(!registry.unregister(a).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.snapshot_membership().await[0].id, b);
    }

    #[tokio::test]
    async fn test_membership_view_is_isolated_from_later_mutation() {
        let registry = SubscriberRegistry::new();
        let a = registry.register(RecordingSink::ok()).await;
        let view = registry.snapshot_membership().await;

        registry.unregister(a).await;
        registry.register(RecordingSink::ok()).await;

        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, a);
    }

    #[tokio::test]
    async fn test_evict_cancels_the_registered_session() {
        let registry = SubscriberRegistry::new();
        let session = CancellationToken::new();
        registry
            .register_with_session(RecordingSink::ok(), session.clone())
            .await;

        let member = registry.snapshot_membership().await.remove(0);
        assert!(!session.is_cancelled());
        member.evict();
        member.evict();
        assert!(session.is_cancelled());
    }

    #[tokio::test]
    async fn test_concurrent_register_and_unregister() {
        let registry = SubscriberRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = registry.register(RecordingSink::ok()).await;
                // Gateway and broadcast loop racing on the same id
                let (x, y) = tokio::join!(registry.unregister(id), registry.unregister(id));
                assert!(x ^ y);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(registry.len().await, 0);
    }
}
