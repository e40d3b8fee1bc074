//! Navigation stack manager.
//!
//! This module contains the core of the crate:
//! - `HistoryManager`: keeps an in-memory stack of screen entries in step
//!   with the navigation primitive of one document
//! - `Host`: the primitive, its notification channel and the two stores
//! - `Entry`: one screen descriptor
//!
//! The manager is constructed once per document load. Operations that must
//! wait for the primitive (`set_up`, `go`, `collapse`) are async and settle
//! when the awaited position-changed notification arrives.

mod dispatch;
mod entry;
mod operations;
mod setup;
#[cfg(test)]
mod tests;

pub use entry::Entry;
pub use operations::ReplaceOptions;
pub use setup::SetUpReason;

use crate::config::Config;
use crate::error::{HistoryError, HistoryResult};
use crate::events::{Handler, ListenerId, Listeners, Observable};
use crate::navigation::{
    HistoryId, HistoryState, NavigationPrimitive, PositionChanged, PositionChanges,
};
use crate::screen::{Controller, ScreenCallbacks, ScreenRegistry};
use crate::storage::{KeyValueStore, NamespacedStorage, RecoveryStorage};
use log::*;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

/// Pause given to the primitive before stepping forward during a replay.
///
pub(crate) const SETTLE_DELAY: Duration = Duration::from_millis(16);

pub(crate) const CURRENT_INDEX: &str = "currentIndex";
pub(crate) const MAX_INDEX: &str = "maxIndex";
pub(crate) const HISTORY_LENGTH: &str = "historyLength";

/// Everything the manager needs from the surrounding document.
///
pub struct Host {
    history: Box<dyn NavigationPrimitive>,
    changes: PositionChanges,
    local_storage: Rc<dyn KeyValueStore>,
    session_storage: Rc<dyn KeyValueStore>,
}

impl Host {
    /// Bundle a primitive with the channel of the loaded document, the store
    /// that survives a browser restart and the store scoped to the tab.
    ///
    pub fn new<H>(
        history: H,
        changes: PositionChanges,
        local_storage: Rc<dyn KeyValueStore>,
        session_storage: Rc<dyn KeyValueStore>,
    ) -> Self
    where
        H: NavigationPrimitive + 'static,
    {
        Host {
            history: Box::new(history),
            changes,
            local_storage,
            session_storage,
        }
    }
}

/// Stores written on every observed change once set-up has finished.
///
struct Bookkeeping {
    recovery: RecoveryStorage,
    tab: NamespacedStorage,
    context: NamespacedStorage,
}

pub struct HistoryManager {
    config: Config,
    history: Box<dyn NavigationPrimitive>,
    changes: PositionChanges,
    local_storage: Rc<dyn KeyValueStore>,
    session_storage: Rc<dyn KeyValueStore>,
    screens: ScreenRegistry,
    entries: Vec<Option<Entry>>,
    history_id: Option<HistoryId>,
    during_silent_operation: bool,
    observed_current: Observable,
    observed_max: Observable,
    listeners: Listeners,
    bookkeeping: Option<Bookkeeping>,
    supported: Option<bool>,
}

impl HistoryManager {
    /// Return a manager for the loaded document. Only the built-in screens
    /// are registered.
    ///
    pub fn new(host: Host, config: Config) -> Self {
        HistoryManager {
            config,
            history: host.history,
            changes: host.changes,
            local_storage: host.local_storage,
            session_storage: host.session_storage,
            screens: ScreenRegistry::new(),
            entries: Vec::new(),
            history_id: None,
            during_silent_operation: false,
            observed_current: Observable::new(),
            observed_max: Observable::new(),
            listeners: Listeners::new(),
            bookkeeping: None,
            supported: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn register(&mut self, screen_type: &str, callbacks: ScreenCallbacks) {
        self.screens.register(screen_type, callbacks);
    }

    /// Return whether the primitive keeps a payload written to it. The probe
    /// runs once; the active payload is put back afterwards.
    ///
    pub fn is_supported(&mut self) -> bool {
        if let Some(supported) = self.supported {
            return supported;
        }
        let original = self.history.state();
        let probe = Value::from(chrono::Utc::now().timestamp_millis());
        self.history.replace_state(Some(probe.clone()));
        let supported = self.history.state().as_ref() == Some(&probe);
        self.history.replace_state(original);
        debug!("Navigation primitive supported: {}", supported);
        self.supported = Some(supported);
        supported
    }

    /// Index of the active entry relative to index 0 of this context, read
    /// from the active payload. -1 while the primitive carries no payload of
    /// ours.
    ///
    pub fn current_index(&self) -> i64 {
        index_of(self.history.state().as_ref())
    }

    pub fn max_index(&self) -> i64 {
        self.entries.len() as i64 - 1
    }

    pub fn history_id(&self) -> Option<HistoryId> {
        self.history_id
    }

    pub fn entry(&self, index: i64) -> Option<&Entry> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .and_then(Option::as_ref)
    }

    pub fn controller(&self, index: i64) -> Option<&Controller> {
        self.entry(index).map(Entry::controller)
    }

    /// Return whether notifications are currently kept from dispatching.
    ///
    pub fn is_silent(&self) -> bool {
        self.during_silent_operation
    }

    /// Subscribe to a topic: `change:currentIndex`, `change:maxIndex`,
    /// `show` or `show:<type>`.
    ///
    pub fn on(&mut self, topic: &str, handler: Handler) -> ListenerId {
        self.listeners.on(topic, handler)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    pub fn off_all(&mut self) {
        self.listeners.clear();
    }

    /// Wait for the next position-changed notification and dispatch it.
    ///
    pub async fn handle_next(&mut self) -> HistoryResult<()> {
        let change = self.next_change().await?;
        self.on_position_changed(change)
    }

    /// Dispatch every notification already delivered, without waiting.
    /// Returns how many were handled.
    ///
    pub fn handle_pending(&mut self) -> HistoryResult<usize> {
        let mut handled = 0;
        loop {
            match self.changes.try_recv() {
                Ok(change) => {
                    self.on_position_changed(change)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) => return Ok(handled),
                Err(TryRecvError::Disconnected) => return Err(HistoryError::DocumentUnloaded),
            }
        }
    }

    /// Forget the pending index. Called when the document unloads so a
    /// later browser restart does not try to recover it.
    ///
    pub fn unload(&mut self) {
        if let Some(bookkeeping) = &self.bookkeeping {
            debug!("Unloading; clearing pending index");
            bookkeeping.recovery.remove(CURRENT_INDEX);
        }
    }

    /// Return the store scoped to the current history id. It survives a
    /// reload of the same context.
    ///
    pub fn context_storage(&self) -> HistoryResult<NamespacedStorage> {
        let history_id = self.history_id.ok_or(HistoryError::HistoryIdUninitialized)?;
        Ok(NamespacedStorage::new(
            Rc::clone(&self.session_storage),
            &["historySpecified", &history_id.to_string()],
        ))
    }

    async fn next_change(&mut self) -> HistoryResult<PositionChanged> {
        self.changes
            .recv()
            .await
            .ok_or(HistoryError::DocumentUnloaded)
    }

    /// Decoded payload at the active index, if it is one of ours.
    ///
    fn current_state(&self) -> Option<HistoryState> {
        self.history
            .state()
            .as_ref()
            .and_then(HistoryState::from_value)
    }

    /// Create an entry for `screen_type` at `index`, handing the factory the
    /// controller one index below.
    ///
    fn create_entry(&self, screen_type: &str, options: Value, index: i64) -> HistoryResult<Entry> {
        let screen = self.screens.get(screen_type)?;
        let parent = if index > 0 {
            self.controller(index - 1)
        } else {
            None
        };
        let controller = screen.create(parent, &options);
        trace!("Created '{}' entry for index {}", screen_type, index);
        Ok(Entry::new(screen_type, options, controller))
    }

    fn put_entry(&mut self, index: i64, entry: Entry) {
        let Ok(slot) = usize::try_from(index) else {
            warn!("Dropping entry for negative index {}", index);
            return;
        };
        if self.entries.len() <= slot {
            self.entries.resize_with(slot + 1, || None);
        }
        self.entries[slot] = Some(entry);
    }

    /// Encoded payload for the entry held at `index`.
    ///
    fn state_at(&self, index: i64) -> HistoryResult<Value> {
        let history_id = self.history_id.ok_or(HistoryError::HistoryIdUninitialized)?;
        let entry = self
            .entry(index)
            .ok_or(HistoryError::MissingEntry { index })?;
        Ok(entry.to_state(index, history_id).to_value()?)
    }
}

fn entry_at_mut(entries: &mut [Option<Entry>], index: i64) -> Option<&mut Entry> {
    usize::try_from(index)
        .ok()
        .and_then(|i| entries.get_mut(i))
        .and_then(Option::as_mut)
}

fn index_of(state: Option<&Value>) -> i64 {
    state
        .and_then(HistoryState::from_value)
        .map_or(-1, |state| state.index)
}
