//! Set-up and restore.
//!
//! `set_up` works out how the document was loaded and rebuilds a consistent
//! stack for it:
//! - a payload at the active index means a reload, so the stack is replayed
//!   from the payloads of every index
//! - a pending index in the recovery record means the tab came back after a
//!   browser restart with its payloads gone
//! - an unchanged tab length means a redirect hand-off was skipped by moving
//!   forward into the rewritten range
//! - otherwise the application was entered from outside

use super::{
    Bookkeeping, HistoryManager, ReplaceOptions, CURRENT_INDEX, HISTORY_LENGTH, MAX_INDEX,
    SETTLE_DELAY,
};
use crate::config::{ConfigError, ResolvedSetUp, SetUpOptions, WhenBrowserRestart};
use crate::error::{HistoryError, HistoryResult};
use crate::navigation::{redirect, HandOff, HistoryId, HistoryState};
use crate::screen::EMPTY;
use crate::storage::{NamespacedStorage, RecoveryStorage};
use log::*;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// How `set_up` found the document.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetUpReason {
    /// Entered from outside, or a skipped redirect was compensated.
    Initial,
    /// Reloaded; the stack was rebuilt from the stored payloads.
    Restore,
    /// Reopened after a browser restart and started over at index 0.
    BrowserRestart,
    /// The recovery strategy left this document.
    Exited,
}

impl SetUpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetUpReason::Initial => "initial",
            SetUpReason::Restore => "restore",
            SetUpReason::BrowserRestart => "browserRestart",
            SetUpReason::Exited => "exited",
        }
    }
}

impl fmt::Display for SetUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl HistoryManager {
    /// Establish the stack for this document. Unset options are taken from
    /// the configured defaults.
    ///
    pub async fn set_up(&mut self, options: SetUpOptions) -> HistoryResult<SetUpReason> {
        if !self.is_supported() {
            return Err(HistoryError::Unsupported);
        }
        let resolved = options.merged_with(&self.config.init_options).resolve()?;
        info!(
            "Setting up namespace '{}' (when browser restart: {:?})",
            resolved.namespace, resolved.when_browser_restart
        );
        let recovery = RecoveryStorage::new(Rc::clone(&self.local_storage), &resolved.namespace);
        recovery.truncate(resolved.storage_truncate);
        let tab = NamespacedStorage::new(
            Rc::clone(&self.session_storage),
            &["tab", &resolved.namespace],
        );

        let result = self.establish(&resolved, &recovery, &tab).await;
        self.during_silent_operation = false;
        let reason = result?;

        if reason != SetUpReason::Exited {
            self.finalize(recovery, tab, resolved.storage_truncate)?;
        }
        info!("Set up finished: {}", reason);
        Ok(reason)
    }

    async fn establish(
        &mut self,
        resolved: &ResolvedSetUp,
        recovery: &RecoveryStorage,
        tab: &NamespacedStorage,
    ) -> HistoryResult<SetUpReason> {
        if let Some(state) = self.current_state() {
            return self.restore(state).await;
        }
        if let Some(pending) = recovery.get::<i64>(CURRENT_INDEX) {
            return self.recover_from_restart(pending, resolved, recovery).await;
        }
        if tab.get::<usize>(HISTORY_LENGTH) == Some(self.history.length()) {
            info!("History length unchanged without a payload; blocking skipped entries");
            self.initialize_context()?;
            self.push_force_back().await?;
            return Ok(SetUpReason::Initial);
        }
        self.initialize_context()?;
        Ok(SetUpReason::Initial)
    }

    /// Start a new context: fresh history id and an `empty` entry at index 0.
    ///
    fn initialize_context(&mut self) -> HistoryResult<()> {
        let history_id = HistoryId::mint();
        debug!("Starting context {}", history_id);
        self.history_id = Some(history_id);
        self.entries.clear();
        self.replace_with(
            EMPTY,
            Value::Null,
            ReplaceOptions {
                silent: false,
                initialize: true,
            },
        )
    }

    async fn restore(&mut self, state: HistoryState) -> HistoryResult<SetUpReason> {
        self.during_silent_operation = true;
        self.history_id = Some(state.history_id);
        let index = state.index;
        let furthest = self
            .context_storage()?
            .get::<i64>(MAX_INDEX)
            .map_or(index, |max| max.max(index));
        info!(
            "Restoring context {} at index {} (furthest {})",
            state.history_id, index, furthest
        );

        if index != 0 {
            self.history.go(-index);
            self.next_change().await?;
        }
        self.entries.clear();
        let position = self.replay_stored_entries(furthest).await?;
        if position != index {
            self.history.go(index - position);
            self.next_change().await?;
        }
        self.sync_observed();
        Ok(SetUpReason::Restore)
    }

    /// Walk forward from index 0 up to `furthest`, creating an entry from the
    /// payload of every index without showing it. Stops early at a payload of
    /// another context. Returns the index the primitive rests on.
    ///
    async fn replay_stored_entries(&mut self, furthest: i64) -> HistoryResult<i64> {
        let steps = furthest.max(0) as usize + 1;
        let mut position = 0;
        for _ in 0..steps {
            let state = match self.current_state() {
                Some(state) if Some(state.history_id) == self.history_id => state,
                _ => {
                    warn!("Stopping replay at index {}: payload of another context", position);
                    return Ok(position);
                }
            };
            position = state.index;
            let entry = self.create_entry(&state.screen_type, state.options, position)?;
            self.put_entry(position, entry);
            trace!("Replayed index {}", position);
            if position >= furthest {
                return Ok(position);
            }
            tokio::time::sleep(SETTLE_DELAY).await;
            self.history.forward();
            self.next_change().await?;
            position += 1;
        }
        Err(HistoryError::NavigationStalled { steps })
    }

    async fn recover_from_restart(
        &mut self,
        pending: i64,
        resolved: &ResolvedSetUp,
        recovery: &RecoveryStorage,
    ) -> HistoryResult<SetUpReason> {
        self.during_silent_operation = true;
        info!("Recovering after browser restart (pending index {})", pending);
        recovery.remove(CURRENT_INDEX);
        let furthest = recovery.get::<i64>(MAX_INDEX).unwrap_or(pending);

        if pending != 0 {
            match resolved.when_browser_restart {
                WhenBrowserRestart::BackToPreviousDocument => {
                    self.back_to_previous_document().await?;
                    return Ok(SetUpReason::Exited);
                }
                WhenBrowserRestart::Redirect => {
                    let redirect_html_url = resolved
                        .redirect_html_url
                        .as_deref()
                        .ok_or(ConfigError::RedirectUrlNotSet)?;
                    return self.hand_off_to_redirect(pending, redirect_html_url).await;
                }
                WhenBrowserRestart::None => {}
            }
        }

        self.initialize_context()?;
        if furthest.max(pending) > 0 {
            self.push_force_back().await?;
        }
        Ok(SetUpReason::BrowserRestart)
    }

    /// Step back to index 0 and load the redirect document, which rewrites
    /// the stale entries and loads this location again.
    ///
    async fn hand_off_to_redirect(
        &mut self,
        pending: i64,
        redirect_html_url: &str,
    ) -> HistoryResult<SetUpReason> {
        self.history.go(-pending);
        self.next_change().await?;
        let path_hash = redirect::path_hash(&self.history.href(), &self.history.origin());
        let url = HandOff::replace_back_then_redirect(&path_hash).url(redirect_html_url)?;
        info!("Handing off to {}", url);
        self.history.assign(&url);
        Ok(SetUpReason::Exited)
    }

    /// Go back to the document that was active before this one. Every
    /// listener is removed first; the walk ends when the notification channel
    /// closes.
    ///
    pub async fn back_to_previous_document(&mut self) -> HistoryResult<()> {
        self.listeners.clear();
        let was_silent = self.during_silent_operation;
        self.during_silent_operation = true;
        let result = self.leave_document().await;
        self.during_silent_operation = was_silent;
        result
    }

    async fn leave_document(&mut self) -> HistoryResult<()> {
        let steps = self.history.length() + 1;
        for _ in 0..steps {
            self.history.back();
            if self.changes.recv().await.is_none() {
                info!("Left the document");
                return Ok(());
            }
        }
        Err(HistoryError::NavigationStalled { steps })
    }

    fn finalize(
        &mut self,
        recovery: RecoveryStorage,
        tab: NamespacedStorage,
        storage_truncate: Option<usize>,
    ) -> HistoryResult<()> {
        let context = self.context_storage()?;
        self.bookkeeping = Some(Bookkeeping {
            recovery,
            tab,
            context,
        });
        let current = self.current_index();
        self.refresh_current_index(current)?;
        self.refresh_max_index();
        self.record_position(current);
        self.record_max_index(self.max_index());
        if let Some(bookkeeping) = &self.bookkeeping {
            bookkeeping.recovery.truncate(storage_truncate);
        }
        Ok(())
    }
}
