//! Shared application state and the access registry.

use crate::relay::WebhookRelay;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Default session TTL in minutes.
pub const DEFAULT_TTL_MINUTES: u64 = 7;

/// One recorded access. Never mutated after insertion.
#[derive(Debug)]
pub struct SessionRecord {
    pub id: Uuid,
    pub created_at: Instant,
}

/// Snapshot returned by the status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub users_online: usize,
    pub ttl_minutes: u64,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, SessionRecord>,
    active: usize,
}

/// In-memory registry of self-expiring access sessions.
///
/// All operations take the same lock and never await while holding it.
pub struct AccessRegistry {
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl AccessRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_ttl_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record a new access and return its identifier.
    pub fn register(&self) -> Uuid {
        self.register_and_count().0
    }

    /// Record a new access, returning its identifier together with the count
    /// produced by the sweep that followed the insert.
    pub fn register_and_count(&self) -> (Uuid, usize) {
        let id = Uuid::new_v4();
        let mut inner = self.lock();
        inner.sessions.insert(
            id,
            SessionRecord {
                id,
                created_at: Instant::now(),
            },
        );
        let active = self.sweep_locked(&mut inner);
        (id, active)
    }

    /// Drop every expired session and return the refreshed count.
    pub fn sweep(&self) -> usize {
        let mut inner = self.lock();
        self.sweep_locked(&mut inner)
    }

    /// Count computed by the most recent sweep.
    pub fn count(&self) -> usize {
        self.lock().active
    }

    /// Sweep, then snapshot the count and TTL for presentation.
    pub fn report(&self) -> StatusReport {
        StatusReport {
            users_online: self.sweep(),
            ttl_minutes: self.ttl.as_secs() / 60,
        }
    }

    fn sweep_locked(&self, inner: &mut Inner) -> usize {
        let now = Instant::now();
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, s| now.saturating_duration_since(s.created_at) < self.ttl);
        let evicted = before - inner.sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = inner.sessions.len(), "Evicted expired sessions");
        }
        inner.active = inner.sessions.len();
        inner.active
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Bookkeeping cannot be left half-done by a panic, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AccessRegistry {
    fn default() -> Self {
        Self::with_ttl_minutes(DEFAULT_TTL_MINUTES)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AccessRegistry>,
    pub relay: Arc<WebhookRelay>,
}

impl AppState {
    pub fn new(registry: Arc<AccessRegistry>, relay: Arc<WebhookRelay>) -> Self {
        Self { registry, relay }
    }
}
