use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Outstanding approval requests, keyed by correlation id.
///
/// One completion signal per id, single writer and single reader. Resolution
/// races cleanup from the timed-out requester; whichever side removes the
/// entry first owns the sender, so the first resolution wins atomically.
#[derive(Default)]
pub struct PendingApprovals {
    inner: DashMap<Uuid, oneshot::Sender<bool>>,
}

impl PendingApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh request and hand back its completion signal
    pub fn register(&self) -> (Uuid, oneshot::Receiver<bool>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.inner.insert(id, tx);
        (id, rx)
    }

    /// Resolve the first pending request whose id starts with `prefix`.
    ///
    /// Inbound payloads carry a truncated correlation id, so matching is by
    /// prefix. Returns the resolved id, or `None` when nothing matched (stale
    /// or duplicate decisions are benign no-ops).
    pub fn resolve_prefix(&self, prefix: &str, approved: bool) -> Option<Uuid> {
        let id = self
            .inner
            .iter()
            .map(|entry| *entry.key())
            .find(|id| id.to_string().starts_with(prefix))?;

        let (_, sender) = self.inner.remove(&id)?;
        // A dropped receiver means the requester already timed out; that race
        // resolves in the requester's favor and the send result is moot.
        let _ = sender.send(approved);
        Some(id)
    }

    /// Drop a request's signal; no-op when already resolved
    pub fn remove(&self, id: &Uuid) {
        self.inner.remove(id);
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
