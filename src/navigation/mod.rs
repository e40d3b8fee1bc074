//! Navigation primitive boundary.
//!
//! The manager never talks to a browser directly. It drives an implementation
//! of [`NavigationPrimitive`] and consumes the position-changed notifications
//! the primitive emits on a [`PositionChanges`] channel. The channel closes
//! when the document that owns it is unloaded.

mod error;
mod memory;
pub mod redirect;

pub use error::NavigationError;
pub use memory::MemoryHistory;
pub use redirect::{Command, HandOff, Instruction};

use crate::storage::monotonic_millis;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Receiving end of the position-changed notifications of one document.
///
pub type PositionChanges = UnboundedReceiver<PositionChanged>;

/// Sending end of the position-changed notifications of one document.
///
pub type PositionSender = UnboundedSender<PositionChanged>;

/// Notification that the active history index changed, carrying the payload
/// found at the new position.
///
#[derive(Debug, Clone, PartialEq)]
pub struct PositionChanged {
    pub state: Option<Value>,
}

/// Identifier of a navigation context, a run of entries sharing index 0.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(i64);

impl HistoryId {
    /// Return a fresh identifier derived from the current time.
    ///
    pub fn mint() -> Self {
        HistoryId(monotonic_millis())
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for HistoryId {
    fn from(value: i64) -> Self {
        HistoryId(value)
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload the manager writes to every index it owns.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    #[serde(rename = "type")]
    pub screen_type: String,
    #[serde(default)]
    pub options: Value,
    pub index: i64,
    pub history_id: HistoryId,
}

impl HistoryState {
    /// Decode a raw payload. Payloads written by anything other than the
    /// manager decode to `None`.
    ///
    pub fn from_value(value: &Value) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(state) => Some(state),
            Err(e) => {
                trace!("Ignoring foreign history payload {}: {}", value, e);
                None
            }
        }
    }

    pub fn to_value(&self) -> Result<Value, NavigationError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Ordered, integer-indexed history of one browser tab.
///
/// `push_state` and `replace_state` are synchronous and never notify.
/// `go`, `back` and `forward` are asynchronous: the move is reported later as
/// a [`PositionChanged`] on the document's channel, and moving into another
/// document closes that channel instead.
pub trait NavigationPrimitive {
    /// Payload stored at the active index.
    fn state(&self) -> Option<Value>;

    /// Total number of entries in the tab.
    fn length(&self) -> usize;

    fn push_state(&mut self, state: Value);

    fn replace_state(&mut self, state: Option<Value>);

    /// Move by `delta` entries. Out-of-range moves are ignored.
    fn go(&mut self, delta: i64);

    fn back(&mut self) {
        self.go(-1);
    }

    fn forward(&mut self) {
        self.go(1);
    }

    /// Full URL of the active entry.
    fn href(&self) -> String;

    /// Scheme, host and port of the active entry.
    fn origin(&self) -> String;

    /// Load another document at `url`, leaving the current one.
    fn assign(&mut self, url: &str);
}
