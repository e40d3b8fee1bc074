//! Stack-mutating operations: replace, push, go and collapse.

use super::{entry_at_mut, HistoryManager};
use crate::error::{HistoryError, HistoryResult};
use crate::events::HistoryEvent;
use crate::screen::FORCE_BACK;
use log::*;
use serde_json::Value;

/// Options of [`HistoryManager::replace_with`].
///
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOptions {
    /// Write the entry without showing it.
    pub silent: bool,
    /// Target index 0 instead of the current index.
    pub initialize: bool,
}

impl HistoryManager {
    /// Replace the entry at the current index.
    ///
    pub fn replace(&mut self, screen_type: &str, options: Value) -> HistoryResult<()> {
        self.replace_with(screen_type, options, ReplaceOptions::default())
    }

    /// Replace the entry at the current index, or at index 0 when
    /// initializing. An entry of the same type keeps its controller and only
    /// takes the new options. The payload is rewritten in place.
    ///
    pub fn replace_with(
        &mut self,
        screen_type: &str,
        options: Value,
        replace: ReplaceOptions,
    ) -> HistoryResult<()> {
        self.handle_pending()?;
        let index = if replace.initialize {
            0
        } else {
            self.current_index()
        };
        if index < 0 {
            return Err(HistoryError::NotSetUp);
        }
        let history_id = self.history_id.ok_or(HistoryError::HistoryIdUninitialized)?;
        info!("Replacing index {} with '{}'", index, screen_type);

        let reuse = self
            .entry(index)
            .map_or(false, |entry| entry.screen_type() == screen_type);
        let state = if reuse {
            let entry = entry_at_mut(&mut self.entries, index)
                .ok_or(HistoryError::MissingEntry { index })?;
            entry.set_options(options);
            entry.to_state(index, history_id)
        } else {
            let entry = self.create_entry(screen_type, options, index)?;
            let state = entry.to_state(index, history_id);
            self.put_entry(index, entry);
            state
        };
        self.history.replace_state(Some(state.to_value()?));

        let shown = self.entry(index).map_or(false, |entry| entry.is_shown());
        if !shown && !replace.silent {
            self.show_at(index)?;
        }
        self.refresh_max_index();
        Ok(())
    }

    /// Push a new entry after the current index. Entries beyond the current
    /// index are discarded first.
    ///
    pub fn push(&mut self, screen_type: &str, options: Value) -> HistoryResult<()> {
        self.handle_pending()?;
        let current = self.current_index();
        if current < 0 {
            return Err(HistoryError::NotSetUp);
        }
        let history_id = self.history_id.ok_or(HistoryError::HistoryIdUninitialized)?;
        let index = current + 1;
        info!("Pushing '{}' at index {}", screen_type, index);

        let entry = self.create_entry(screen_type, options, index)?;
        let state = entry.to_state(index, history_id).to_value()?;
        self.entries.truncate(index as usize);
        self.history.push_state(state);
        self.put_entry(index, entry);

        self.refresh_current_index(index)?;
        if !self.entry(index).map_or(false, |entry| entry.is_shown()) {
            self.show_at(index)?;
        }
        self.refresh_max_index();
        Ok(())
    }

    /// Move to `index`, showing and hiding the entries crossed.
    ///
    pub async fn go(&mut self, index: i64) -> HistoryResult<()> {
        self.check_target(index)?;
        self.go_to(index, false).await
    }

    /// Move to `index` without showing or hiding anything. The new position
    /// is recorded as observed without publishing a change.
    ///
    pub async fn go_silently(&mut self, index: i64) -> HistoryResult<()> {
        self.check_target(index)?;
        self.go_to(index, true).await?;
        let current = self.current_index();
        self.observed_current.sync(current);
        Ok(())
    }

    fn check_target(&self, index: i64) -> HistoryResult<()> {
        if index < 0 || index > self.max_index() {
            return Err(HistoryError::MissingEntry { index });
        }
        Ok(())
    }

    pub(super) async fn go_to(&mut self, index: i64, silent: bool) -> HistoryResult<()> {
        self.handle_pending()?;
        let current = self.current_index();
        if current == index {
            return Ok(());
        }
        debug!("Going from {} to {} (silent: {})", current, index, silent);
        let was_silent = self.during_silent_operation;
        if silent {
            self.during_silent_operation = true;
        }
        let result = self.travel(index - current).await;
        self.during_silent_operation = was_silent;
        result
    }

    async fn travel(&mut self, delta: i64) -> HistoryResult<()> {
        self.history.go(delta);
        let change = self.next_change().await?;
        self.on_position_changed(change)
    }

    /// Replace `[start, end)` with the entry at `end`, shifting later entries
    /// down. Settles at the index the current entry moved to.
    ///
    pub async fn collapse(&mut self, start: i64, end: i64) -> HistoryResult<()> {
        self.handle_pending()?;
        let max = self.max_index();
        if start < 0 || start >= end || end > max {
            return Err(HistoryError::InvalidRange { start, end, max });
        }
        let removed = end - start;
        let current = self.current_index();
        let target = if current < start {
            current
        } else if current >= end {
            current - removed
        } else {
            start
        };
        info!(
            "Collapsing [{}, {}) with current index {} -> {}",
            start, end, current, target
        );

        self.during_silent_operation = true;
        let result = self.rewrite_collapsed(start, end).await;
        self.during_silent_operation = false;
        result?;

        self.go_to(target, true).await?;
        self.settle_after_collapse(target)
    }

    /// Rewrite the primitive from `start` onwards so it mirrors the shortened
    /// stack.
    ///
    async fn rewrite_collapsed(&mut self, start: i64, end: i64) -> HistoryResult<()> {
        let dropped: Vec<_> = self.entries.drain(start as usize..end as usize).collect();
        for (offset, entry) in dropped.iter().enumerate().rev() {
            let Some(entry) = entry else { continue };
            if entry.is_shown() {
                trace!("Hiding collapsed index {}", start + offset as i64);
                let screen = self.screens.get(entry.screen_type())?;
                screen.hide(entry.controller(), entry.options());
            }
        }

        let current = self.current_index();
        if current != start {
            self.history.go(start - current);
            self.next_change().await?;
        }
        let state = self.state_at(start)?;
        self.history.replace_state(Some(state));

        if self.max_index() == start {
            return self.push_force_back().await;
        }
        for index in start + 1..=self.max_index() {
            let state = self.state_at(index)?;
            self.history.push_state(state);
        }
        Ok(())
    }

    fn settle_after_collapse(&mut self, target: i64) -> HistoryResult<()> {
        for index in (target + 1..=self.max_index()).rev() {
            self.hide_at(index)?;
        }
        if !self.entry(target).map_or(true, |entry| entry.is_shown()) {
            self.show_at(target)?;
        }
        if let Some(change) = self.observed_current.refresh(target) {
            self.listeners
                .emit(&HistoryEvent::CurrentIndexChanged(change));
        }
        // The primitive shrank even when the current index did not move.
        self.record_position(target);
        self.refresh_max_index();
        Ok(())
    }

    /// Push a `forceBack` entry after the current index and step back over
    /// it, so a forward gesture into stale entries bounces straight back.
    ///
    pub(super) async fn push_force_back(&mut self) -> HistoryResult<()> {
        let was_silent = self.during_silent_operation;
        self.during_silent_operation = true;
        let result = self.step_over_force_back().await;
        self.during_silent_operation = was_silent;
        result
    }

    async fn step_over_force_back(&mut self) -> HistoryResult<()> {
        let current = self.current_index();
        if current < 0 {
            return Err(HistoryError::NotSetUp);
        }
        let history_id = self.history_id.ok_or(HistoryError::HistoryIdUninitialized)?;
        let index = current + 1;
        debug!("Pushing forceBack at index {}", index);
        let entry = self.create_entry(FORCE_BACK, Value::Null, index)?;
        let state = entry.to_state(index, history_id).to_value()?;
        self.entries.truncate(index as usize);
        self.history.push_state(state);
        self.put_entry(index, entry);
        self.history.back();
        self.next_change().await?;
        Ok(())
    }
}
