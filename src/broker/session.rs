//! Single-active-session slot.
//!
//! The broker serves at most one client at a time. The slot holds the
//! identifier of the currently tracked connection; installing a new one
//! evicts any prior one inside a single evict-then-assign critical section,
//! so two handlers can never both believe they are active.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Identifier of one accepted connection.
pub type SessionId = u64;

struct ActiveSession {
    id: SessionId,
    close_tx: mpsc::Sender<()>,
}

/// Holds the at-most-one active session.
#[derive(Default)]
pub struct SessionSlot {
    inner: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl SessionSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evicts any current session and installs a new one.
    ///
    /// The evicted handler is signalled to close its socket; signalling a
    /// handler that is already gone is swallowed, never escalated. Returns
    /// the new session's id and the receiver its handler must watch for the
    /// eviction signal.
    pub async fn claim(&self) -> (SessionId, mpsc::Receiver<()>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (close_tx, close_rx) = mpsc::channel(1);

        let mut slot = self.inner.lock().await;
        if let Some(old) = slot.take() {
            debug!(evicted = old.id, replaced_by = id, "Displacing active session");
            let _ = old.close_tx.try_send(());
        }
        *slot = Some(ActiveSession { id, close_tx });

        (id, close_rx)
    }

    /// Empties the slot if `id` is still the tracked session.
    ///
    /// Releasing a session that has already been evicted is a no-op.
    pub async fn release(&self, id: SessionId) {
        let mut slot = self.inner.lock().await;
        if matches!(slot.as_ref(), Some(s) if s.id == id) {
            *slot = None;
        }
    }

    /// Returns true if `id` is the currently tracked session.
    pub async fn is_active(&self, id: SessionId) -> bool {
        matches!(self.inner.lock().await.as_ref(), Some(s) if s.id == id)
    }

    /// Returns the id of the currently tracked session, if any.
    pub async fn active_id(&self) -> Option<SessionId> {
        self.inner.lock().await.as_ref().map(|s| s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_installs_session() {
        let slot = SessionSlot::new();
        let (id, _rx) = slot.claim().await;

        assert!(slot.is_active(id).await);
        assert_eq!(slot.active_id().await, Some(id));
    }

    #[tokio::test]
    async fn test_second_claim_evicts_first() {
        let slot = SessionSlot::new();
        let (first, mut first_rx) = slot.claim().await;
        let (second, _second_rx) = slot.claim().await;

        assert!(!slot.is_active(first).await);
        assert!(slot.is_active(second).await);
        // The evicted handler received the close signal
        assert!(first_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_release_empties_slot() {
        let slot = SessionSlot::new();
        let (id, _rx) = slot.claim().await;

        slot.release(id).await;

        assert!(!slot.is_active(id).await);
        assert_eq!(slot.active_id().await, None);
    }

    #[tokio::test]
    async fn test_release_of_evicted_session_is_noop() {
        let slot = SessionSlot::new();
        let (first, _first_rx) = slot.claim().await;
        let (second, _second_rx) = slot.claim().await;

        // The evicted handler releasing must not disturb the new session
        slot.release(first).await;

        assert!(slot.is_active(second).await);
    }

    #[tokio::test]
    async fn test_evicting_a_dead_handler_is_swallowed() {
        let slot = SessionSlot::new();
        let (_first, first_rx) = slot.claim().await;
        drop(first_rx); // handler already gone

        // Claim must still succeed even though the close signal cannot land
        let (second, _second_rx) = slot.claim().await;
        assert!(slot.is_active(second).await);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let slot = SessionSlot::new();
        let (a, _rx_a) = slot.claim().await;
        let (b, _rx_b) = slot.claim().await;
        assert_ne!(a, b);
    }
}
