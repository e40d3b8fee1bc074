//! Position-change dispatch.
//!
//! An observed change of the current index hides every entry passed on the
//! way down and shows every entry reached on the way up, then records the
//! new position.

use super::{entry_at_mut, index_of, HistoryManager, CURRENT_INDEX, HISTORY_LENGTH, MAX_INDEX};
use crate::error::HistoryResult;
use crate::events::{Change, HistoryEvent};
use crate::navigation::PositionChanged;
use crate::screen::ShowEffect;
use log::*;
use std::rc::Rc;

impl HistoryManager {
    pub(super) fn on_position_changed(&mut self, change: PositionChanged) -> HistoryResult<()> {
        if self.during_silent_operation {
            trace!("Ignoring position change during silent operation");
            return Ok(());
        }
        let current = index_of(change.state.as_ref());
        self.refresh_current_index(current)
    }

    pub(super) fn refresh_current_index(&mut self, current: i64) -> HistoryResult<()> {
        match self.observed_current.refresh(current) {
            Some(change) => self.dispatch_current_change(change),
            None => Ok(()),
        }
    }

    fn dispatch_current_change(&mut self, change: Change) -> HistoryResult<()> {
        debug!(
            "Current index {:?} -> {}",
            change.previous, change.current
        );
        self.hide_passed(change)?;
        self.show_reached(change)?;
        self.record_position(change.current);
        self.listeners
            .emit(&HistoryEvent::CurrentIndexChanged(change));
        Ok(())
    }

    /// Hide shown entries in `(current, previous]`, highest first.
    ///
    fn hide_passed(&mut self, change: Change) -> HistoryResult<()> {
        let Some(previous) = change.previous else {
            return Ok(());
        };
        if change.current == -1 || change.current >= previous {
            return Ok(());
        }
        for index in (change.current + 1..=previous).rev() {
            self.hide_at(index)?;
        }
        Ok(())
    }

    /// Show every entry in `(previous, current]`, lowest first. A first
    /// observation counts from index 0.
    ///
    fn show_reached(&mut self, change: Change) -> HistoryResult<()> {
        let previous = change.previous.unwrap_or(0);
        if change.current < previous {
            return Ok(());
        }
        for index in previous + 1..=change.current {
            if self.show_at(index)? == ShowEffect::StepBack {
                break;
            }
        }
        Ok(())
    }

    pub(super) fn show_at(&mut self, index: i64) -> HistoryResult<ShowEffect> {
        let Some(entry) = entry_at_mut(&mut self.entries, index) else {
            return Ok(ShowEffect::Stay);
        };
        let screen = self.screens.get(entry.screen_type())?;
        trace!("Showing '{}' at index {}", entry.screen_type(), index);
        let effect = screen.show(entry.controller(), entry.options());
        entry.set_shown(true);
        let event = HistoryEvent::Show {
            screen_type: entry.screen_type().to_owned(),
            controller: Rc::clone(entry.controller()),
        };
        self.listeners.emit(&event);
        if effect == ShowEffect::StepBack {
            debug!("Stepping back from index {}", index);
            self.history.back();
        }
        Ok(effect)
    }

    pub(super) fn hide_at(&mut self, index: i64) -> HistoryResult<()> {
        let Some(entry) = entry_at_mut(&mut self.entries, index) else {
            return Ok(());
        };
        if !entry.is_shown() {
            return Ok(());
        }
        let screen = self.screens.get(entry.screen_type())?;
        trace!("Hiding '{}' at index {}", entry.screen_type(), index);
        screen.hide(entry.controller(), entry.options());
        entry.set_shown(false);
        Ok(())
    }

    pub(super) fn refresh_max_index(&mut self) {
        let max = self.max_index();
        if let Some(change) = self.observed_max.refresh(max) {
            debug!("Max index {:?} -> {}", change.previous, change.current);
            self.record_max_index(max);
            self.listeners.emit(&HistoryEvent::MaxIndexChanged(change));
        }
    }

    /// Record both indexes as observed without dispatching anything.
    ///
    pub(super) fn sync_observed(&mut self) {
        let current = self.current_index();
        let max = self.max_index();
        self.observed_current.sync(current);
        self.observed_max.sync(max);
    }

    pub(super) fn record_position(&self, current: i64) {
        let Some(bookkeeping) = &self.bookkeeping else {
            return;
        };
        bookkeeping.recovery.set(CURRENT_INDEX, &current);
        if let Err(e) = bookkeeping.tab.set(HISTORY_LENGTH, &self.history.length()) {
            warn!("Failed to record history length: {}", e);
        }
    }

    pub(super) fn record_max_index(&self, max: i64) {
        let Some(bookkeeping) = &self.bookkeeping else {
            return;
        };
        if let Err(e) = bookkeeping.context.set(MAX_INDEX, &max) {
            warn!("Failed to record max index for the context: {}", e);
        }
        bookkeeping.recovery.set(MAX_INDEX, &max);
    }
}
