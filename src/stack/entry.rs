//! Screen descriptor held at one index of the stack.

use crate::navigation::{HistoryId, HistoryState};
use crate::screen::Controller;
use serde_json::Value;
use std::fmt;

pub struct Entry {
    screen_type: String,
    options: Value,
    controller: Controller,
    is_shown: bool,
}

impl Entry {
    pub(crate) fn new(screen_type: &str, options: Value, controller: Controller) -> Self {
        Entry {
            screen_type: screen_type.to_owned(),
            options,
            controller,
            is_shown: false,
        }
    }

    pub fn screen_type(&self) -> &str {
        &self.screen_type
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    /// Controller created by the screen factory. Its identity is kept for
    /// the lifetime of the entry.
    ///
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn is_shown(&self) -> bool {
        self.is_shown
    }

    pub(crate) fn set_options(&mut self, options: Value) {
        self.options = options;
    }

    pub(crate) fn set_shown(&mut self, shown: bool) {
        self.is_shown = shown;
    }

    /// Return the payload written to the primitive for this entry at `index`.
    ///
    pub(crate) fn to_state(&self, index: i64, history_id: HistoryId) -> HistoryState {
        HistoryState {
            screen_type: self.screen_type.clone(),
            options: self.options.clone(),
            index,
            history_id,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("screen_type", &self.screen_type)
            .field("options", &self.options)
            .field("is_shown", &self.is_shown)
            .finish_non_exhaustive()
    }
}
