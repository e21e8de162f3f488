//! Change-notification subscriptions.
//!
//! A subscription binds a filter to a consumer through the owning
//! [`ObservableFs`](crate::fs::ObservableFs). The shared machinery lives in
//! [`WatcherCore`]; [`SingleEntryWatcher`] handles literal paths and
//! [`PatternWatcher`] handles glob filters. Both follow the same cycle on
//! every native signal: re-arm first, re-read, diff, dispatch.

pub mod diff;
pub mod glob;
pub mod single;

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use sentinelfs_model::ChangeEvent;

use crate::dispose::{ChildId, Disposable, DisposalCoordinator, DisposeError};
use crate::fs::ObservableFs;
use crate::store::ChangeSignal;

pub use self::glob::PatternWatcher;
pub use self::single::SingleEntryWatcher;

/// Consumer of change events from one subscription.
pub trait ChangeConsumer: Send + Sync {
    /// Deliver one batch of events. All events of a batch share one capture
    /// timestamp; ordering within the batch is unspecified.
    fn on_events(&self, events: &[ChangeEvent]);

    /// Completion notice, invoked exactly once when the subscription is torn
    /// down. A failure here is captured into the teardown aggregate, never
    /// propagated to other children.
    fn on_completed(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// A live subscription.
pub trait Watcher: Disposable {
    /// Shared subscription state.
    fn core(&self) -> &WatcherCore;

    /// React to one native change signal.
    fn on_signal(&self);
}

/// State shared by every watcher kind.
///
/// Holds the non-owning back-reference to the owning filesystem (used for
/// deregistration only), the filter, the consumer, optional opaque caller
/// state, and the subscription's own teardown coordinator.
pub struct WatcherCore {
    /// Owning filesystem. Non-owning: once deregistered, no reference
    /// remains in either direction.
    fs: Weak<ObservableFs>,
    /// The subscription filter, literal or glob.
    filter: String,
    consumer: Arc<dyn ChangeConsumer>,
    /// Opaque caller state carried for the consumer's benefit.
    caller_state: Option<Box<dyn Any + Send + Sync>>,
    coordinator: DisposalCoordinator,
    /// Subscription id, unique per filesystem.
    id: u64,
    /// Armed native signal, taken and disarmed at teardown.
    signal: Mutex<Option<Arc<dyn ChangeSignal>>>,
    /// Registration in the filesystem's child set.
    registration: Mutex<Option<ChildId>>,
}

impl WatcherCore {
    pub(crate) fn new(
        fs: Weak<ObservableFs>,
        filter: String,
        consumer: Arc<dyn ChangeConsumer>,
        caller_state: Option<Box<dyn Any + Send + Sync>>,
        id: u64,
    ) -> Self {
        Self {
            fs,
            filter,
            consumer,
            caller_state,
            coordinator: DisposalCoordinator::new(),
            id,
            signal: Mutex::new(None),
            registration: Mutex::new(None),
        }
    }

    /// The subscription filter.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Subscription id, unique within the owning filesystem.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Opaque caller state passed at subscribe time.
    pub fn caller_state(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.caller_state.as_deref()
    }

    /// The subscription's teardown coordinator.
    pub fn coordinator(&self) -> &DisposalCoordinator {
        &self.coordinator
    }

    /// True until teardown has been claimed.
    pub(crate) fn active(&self) -> bool {
        !self.coordinator.teardown_started()
    }

    pub(crate) fn fs(&self) -> Option<Arc<ObservableFs>> {
        self.fs.upgrade()
    }

    pub(crate) fn install_signal(&self, signal: Arc<dyn ChangeSignal>) {
        *self.signal.lock() = Some(signal);
    }

    pub(crate) fn set_registration(&self, id: ChildId) {
        *self.registration.lock() = Some(id);
    }

    pub(crate) fn take_registration(&self) -> Option<ChildId> {
        self.registration.lock().take()
    }

    /// Re-arm the native signal. Failures are logged, not propagated: the
    /// watcher favors continued monitoring over strict error propagation.
    pub(crate) fn rearm(&self) {
        let signal: Option<Arc<dyn ChangeSignal>> = self.signal.lock().clone();
        if let Some(signal) = signal {
            if let Err(e) = signal.rearm() {
                tracing::warn!(filter = %self.filter, "Signal re-arm failed: {}", e);
            }
        }
    }

    /// Hand a batch of events to the owning filesystem's sink.
    pub(crate) fn emit(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        match self.fs.upgrade() {
            Some(fs) => fs.deliver(self.consumer.clone(), events),
            // Filesystem already gone; deliver inline.
            None => self.consumer.on_events(&events),
        }
    }
}

/// Install the teardown hook tying a watcher's coordinator to its cleanup.
///
/// Hook order: disarm the native signal, deregister from the owning
/// filesystem (so no dangling back-reference survives), then the consumer's
/// completion notice exactly once, with its failure captured into the
/// aggregate.
pub(crate) fn install_teardown_hook<W>(watcher: &Arc<W>)
where
    W: Watcher + 'static,
{
    let weak: Weak<W> = Arc::downgrade(watcher);
    watcher.core().coordinator().set_hook(move || {
        let watcher: Arc<W> = match weak.upgrade() {
            Some(watcher) => watcher,
            None => return Ok(()),
        };
        let core: &WatcherCore = watcher.core();

        if let Some(signal) = core.signal.lock().take() {
            signal.disarm();
        }
        if let Some(fs) = core.fs() {
            let as_dyn: Arc<dyn Watcher> = watcher.clone();
            fs.deregister(&as_dyn);
        }
        core.consumer.on_completed().map_err(DisposeError::Hook)
    });
}

/// Arm the store's change signal with a weak callback into the watcher.
///
/// The callback holds only a `Weak`, so an armed signal never keeps a
/// dropped watcher alive.
pub(crate) fn arm_signal<W>(
    watcher: &Arc<W>,
    fs: &ObservableFs,
    path: &str,
) -> Result<(), crate::error::SubscribeError>
where
    W: Watcher + 'static,
{
    let weak: Weak<W> = Arc::downgrade(watcher);
    let callback: crate::store::ChangeCallback = Box::new(move || {
        if let Some(watcher) = weak.upgrade() {
            watcher.on_signal();
        }
    });
    let signal: Arc<dyn ChangeSignal> = fs.store().arm_change_signal(path, callback)?;
    watcher.core().install_signal(signal);
    Ok(())
}
