//! Periodic sync of the active count to the display surface.

use crate::display::DisplaySurface;
use crate::state::AccessRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{info, warn};

/// Default time between reconciler ticks.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Delay between failed connection attempts.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Label shown for a given active count.
pub fn label_for(count: usize) -> String {
    let glyph = if count > 0 { "🟢" } else { "🔴" };
    format!("{} Users: {}", glyph, count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Unchanged,
    Applied,
    Failed,
}

pub struct Reconciler<D: ?Sized> {
    registry: Arc<AccessRegistry>,
    surface: Arc<D>,
    period: Duration,
    last_applied: Option<String>,
}

impl<D: DisplaySurface + ?Sized> Reconciler<D> {
    pub fn new(registry: Arc<AccessRegistry>, surface: Arc<D>, period: Duration) -> Self {
        Self {
            registry,
            surface,
            period,
            last_applied: None,
        }
    }

    pub fn last_applied(&self) -> Option<&str> {
        self.last_applied.as_deref()
    }

    /// Sweep once and push the label if it differs from the last one applied.
    pub async fn tick(&mut self) -> TickOutcome {
        let count = self.registry.sweep();
        let label = label_for(count);
        if self.last_applied.as_deref() == Some(label.as_str()) {
            return TickOutcome::Unchanged;
        }

        match self.surface.set_label(&label).await {
            Ok(()) => {
                info!(label = %label, "Display updated");
                self.last_applied = Some(label);
                TickOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, label = %label, "Failed to update display, retrying next tick");
                TickOutcome::Failed
            }
        }
    }

    /// Connect to the surface, then tick on a fixed cadence until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if !self.connect(&mut shutdown).await {
            return;
        }

        match self.surface.current_label().await {
            Ok(current) => self.last_applied = current,
            Err(e) => warn!(error = %e, "Could not read current display label"),
        }

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("Reconciler stopped");
    }

    /// Retry until connected. Returns false if shutdown fired first.
    async fn connect(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            if *shutdown.borrow() {
                return false;
            }
            match self.surface.connect().await {
                Ok(name) => {
                    info!(identity = %name, "Display surface connected");
                    return true;
                }
                Err(e) => warn!(error = %e, "Display connection failed, retrying"),
            }
            tokio::select! {
                _ = sleep(CONNECT_RETRY_DELAY) => {}
                _ = shutdown.changed() => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DisplayError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const TTL: Duration = Duration::from_secs(7 * 60);

    #[derive(Default)]
    struct FakeSurface {
        calls: Mutex<Vec<String>>,
        fail_next: AtomicUsize,
        connect_failures: AtomicUsize,
        initial: Option<String>,
    }

    #[async_trait]
    impl DisplaySurface for FakeSurface {
        async fn connect(&self) -> Result<String, DisplayError> {
            if self.connect_failures.load(Ordering::SeqCst) > 0 {
                self.connect_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(DisplayError::Status(StatusCode::BAD_GATEWAY));
            }
            Ok("fake".to_string())
        }

        async fn current_label(&self) -> Result<Option<String>, DisplayError> {
            Ok(self.initial.clone())
        }

        async fn set_label(&self, label: &str) -> Result<(), DisplayError> {
            self.calls.lock().unwrap().push(label.to_string());
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(DisplayError::Status(StatusCode::TOO_MANY_REQUESTS));
            }
            Ok(())
        }
    }

    fn setup() -> (Arc<AccessRegistry>, Arc<FakeSurface>) {
        (
            Arc::new(AccessRegistry::new(TTL)),
            Arc::new(FakeSurface::default()),
        )
    }

    #[test]
    fn test_label_format() {
        assert_eq!(label_for(0), "🔴 Users: 0");
        assert_eq!(label_for(1), "🟢 Users: 1");
        assert_eq!(label_for(12), "🟢 Users: 12");
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_only_on_label_change() {
        let (registry, surface) = setup();
        let mut reconciler = Reconciler::new(registry.clone(), surface.clone(), Duration::from_secs(60));
        // Start from a channel already showing zero.
        reconciler.last_applied = Some(label_for(0));

        assert_eq!(reconciler.tick().await, TickOutcome::Unchanged);
        assert_eq!(reconciler.tick().await, TickOutcome::Unchanged);

        for _ in 0..3 {
            registry.register();
        }
        assert_eq!(reconciler.tick().await, TickOutcome::Applied);
        assert_eq!(reconciler.tick().await, TickOutcome::Unchanged);

        tokio::time::advance(TTL).await;
        assert_eq!(reconciler.tick().await, TickOutcome::Applied);

        let calls = surface.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["🟢 Users: 3".to_string(), "🔴 Users: 0".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_update_is_retried_next_tick() {
        let (registry, surface) = setup();
        surface.fail_next.store(1, Ordering::SeqCst);
        let mut reconciler = Reconciler::new(registry.clone(), surface.clone(), Duration::from_secs(60));

        registry.register();
        assert_eq!(reconciler.tick().await, TickOutcome::Failed);
        assert_eq!(reconciler.last_applied(), None);

        assert_eq!(reconciler.tick().await, TickOutcome::Applied);
        assert_eq!(reconciler.last_applied(), Some("🟢 Users: 1"));
        assert_eq!(reconciler.tick().await, TickOutcome::Unchanged);
        assert_eq!(surface.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_seeds_from_current_label_and_stops_on_shutdown() {
        let registry = Arc::new(AccessRegistry::new(TTL));
        let surface = Arc::new(FakeSurface {
            initial: Some(label_for(0)),
            connect_failures: AtomicUsize::new(2),
            ..Default::default()
        });
        let (tx, rx) = watch::channel(false);
        let reconciler = Reconciler::new(registry.clone(), surface.clone(), Duration::from_secs(60));
        let handle = tokio::spawn(reconciler.run(rx));

        // Two failed connects, then a first tick that matches the seeded label.
        tokio::time::sleep(CONNECT_RETRY_DELAY * 2 + Duration::from_secs(1)).await;
        assert!(surface.calls.lock().unwrap().is_empty());

        registry.register();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*surface.calls.lock().unwrap(), vec!["🟢 Users: 1".to_string()]);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_if_shutdown_before_connect() {
        let (registry, surface) = setup();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        Reconciler::new(registry, surface.clone(), Duration::from_secs(60))
            .run(rx)
            .await;
        assert!(surface.calls.lock().unwrap().is_empty());
    }
}
