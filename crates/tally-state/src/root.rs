//! The root store: the lock around the [`State`], the committed revision
//! counter, readiness, and the background save loop.
//!
//! Mutations happen through [`Root::lock`]. The returned [`StateGuard`]
//! gives `&mut State`; dropping it ends the batch and commits at most one
//! revision bump, however many values changed inside it.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::StoreConfig;
use crate::persist::{LoadReport, SaveReport};
use crate::state::State;

/// Process-wide owner of the state tree.
///
/// Construct one at startup and share it (usually as `Arc<Root>`) with
/// every component that reads or writes state.
#[derive(Debug)]
pub struct Root {
    state: Mutex<State>,
    config: StoreConfig,
    revision: AtomicU64,
    ready: AtomicBool,
}

impl Root {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            state: Mutex::new(State::new()),
            config,
            revision: AtomicU64::new(0),
            ready: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open a mutation batch, blocking until no other batch is open.
    pub fn lock(&self) -> StateGuard<'_> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.begin_batch();
        StateGuard { guard, root: self }
    }

    /// Last committed revision. Readable without the lock.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Load every backing file into the registered entries, in one batch.
    pub fn load_saved_configs(&self) -> LoadReport {
        self.lock().load_saved_configs(&self.config)
    }

    /// Flush dirty entries to disk, in one batch.
    pub fn save_all_needed(&self) -> SaveReport {
        self.lock().save_all_needed(&self.config)
    }

    /// Periodically flush dirty entries until `shutdown` turns `true` (or
    /// its sender is dropped), then flush once more.
    ///
    /// Marks the root ready before the first flush.
    pub async fn save_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.save_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.set_ready(true);
        info!(period_ms = period.as_millis() as u64, "save loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    flush(Arc::clone(&self)).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let report = flush(Arc::clone(&self)).await;
        info!(saved = report.saved.len(), failed = report.failed.len(), "save loop stopped");
    }
}

/// Run one save pass on the blocking pool.
async fn flush(root: Arc<Root>) -> SaveReport {
    match tokio::task::spawn_blocking(move || root.save_all_needed()).await {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "save task failed");
            SaveReport::default()
        }
    }
}

/// An open mutation batch. Dropping it commits the batch.
pub struct StateGuard<'a> {
    guard: MutexGuard<'a, State>,
    root: &'a Root,
}

impl Deref for StateGuard<'_> {
    type Target = State;

    fn deref(&self) -> &State {
        &self.guard
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut State {
        &mut self.guard
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        let revision = self.guard.end_batch();
        self.root.revision.store(revision, Ordering::Release);
    }
}
