//! Watcher for a single literal path.

use std::any::Any;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use sentinelfs_model::{ChangeEvent, ChangeKind, Entry};

use super::{arm_signal, diff, install_teardown_hook, ChangeConsumer, Watcher, WatcherCore};
use crate::dispose::{Disposable, DisposeError};
use crate::error::SubscribeError;
use crate::fs::ObservableFs;

/// Subscription on one literal file path.
///
/// Applies when the filter has no wildcard and does not denote a directory.
/// Each signal re-reads the single entry and classifies the transition
/// against the previously stored read.
///
/// A bare separator-terminated directory filter is accepted but intentionally
/// inert: a directory path alone never changes independent of its children,
/// so no signal is armed and no events are ever produced. Callers needing
/// subtree monitoring use a glob filter instead.
pub struct SingleEntryWatcher {
    core: WatcherCore,
    /// Entry from the previous read; `None` while the path is absent.
    previous: Mutex<Option<Entry>>,
    /// True for the inert directory-literal form.
    directory_literal: bool,
}

impl SingleEntryWatcher {
    /// Build, register teardown, arm the signal, and take the initial read.
    pub(crate) fn start(
        fs: &Arc<ObservableFs>,
        filter: String,
        consumer: Arc<dyn ChangeConsumer>,
        caller_state: Option<Box<dyn Any + Send + Sync>>,
        id: u64,
    ) -> Result<Arc<Self>, SubscribeError> {
        let directory_literal: bool = filter.ends_with('/');
        let watcher: Arc<Self> = Arc::new(Self {
            core: WatcherCore::new(Arc::downgrade(fs), filter, consumer, caller_state, id),
            previous: Mutex::new(None),
            directory_literal,
        });
        install_teardown_hook(&watcher);

        if directory_literal {
            tracing::debug!(
                filter = %watcher.core.filter(),
                "Directory-literal subscription registered as inert"
            );
            return Ok(watcher);
        }

        arm_signal(&watcher, fs, watcher.core.filter())?;
        let initial: Option<Entry> = fs.store().read_entry(watcher.core.filter())?;
        *watcher.previous.lock() = initial;
        Ok(watcher)
    }
}

impl Watcher for SingleEntryWatcher {
    fn core(&self) -> &WatcherCore {
        &self.core
    }

    fn on_signal(&self) {
        if self.directory_literal || !self.core.active() {
            return;
        }

        // Re-arm before reading so no notification window is missed.
        self.core.rearm();

        let fs: Arc<ObservableFs> = match self.core.fs() {
            Some(fs) => fs,
            None => return,
        };
        let current: Option<Entry> = match fs.store().read_entry(self.core.filter()) {
            Ok(entry) => entry,
            Err(e) => {
                // No event this cycle; the signal stays armed for the next.
                tracing::warn!(filter = %self.core.filter(), "Poll failed: {}", e);
                return;
            }
        };

        let kind: Option<ChangeKind> = {
            let mut previous = self.previous.lock();
            let kind: Option<ChangeKind> = diff::classify(previous.as_ref(), current.as_ref());
            *previous = current;
            kind
        };

        if let Some(kind) = kind {
            let event: ChangeEvent = ChangeEvent::new(
                kind,
                self.core.filter(),
                SystemTime::now(),
                self.core.id(),
            );
            self.core.emit(vec![event]);
        }
    }
}

impl Disposable for SingleEntryWatcher {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.core.coordinator().dispose()
    }
}
