//! In-memory navigation primitive.
//!
//! Behaves like a single browser tab. Entries belong to documents: moving
//! between entries of the loaded document emits a notification, while moving
//! into another document unloads the current one and closes its channel.

use super::{NavigationPrimitive, PositionChanged, PositionChanges, PositionSender};
use log::*;
use regex::Regex;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
struct Slot {
    document: u64,
    url: String,
    state: Option<Value>,
}

#[derive(Debug)]
struct Tab {
    slots: Vec<Slot>,
    index: usize,
    next_document: u64,
    sender: Option<PositionSender>,
}

impl Tab {
    fn active(&self) -> &Slot {
        &self.slots[self.index]
    }

    fn truncate_forward(&mut self) {
        self.slots.truncate(self.index + 1);
    }

    fn attach(&mut self) -> PositionChanges {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sender = Some(tx);
        rx
    }
}

/// Shared handle to an in-memory tab. Clones drive the same tab, so a test
/// can hand one clone to the manager and keep another for user gestures.
///
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    tab: Rc<RefCell<Tab>>,
}

impl MemoryHistory {
    /// Open a tab on `url` and return it with the channel of the loaded
    /// document.
    ///
    pub fn open(url: &str) -> (Self, PositionChanges) {
        let mut tab = Tab {
            slots: vec![Slot {
                document: 0,
                url: url.to_owned(),
                state: None,
            }],
            index: 0,
            next_document: 1,
            sender: None,
        };
        let changes = tab.attach();
        (
            MemoryHistory {
                tab: Rc::new(RefCell::new(tab)),
            },
            changes,
        )
    }

    /// Load the active document again, as a reload does, and return its new
    /// channel. Payloads are kept.
    ///
    pub fn load(&self) -> PositionChanges {
        debug!("Loading document at {}", self.href());
        self.tab.borrow_mut().attach()
    }

    /// Simulate a browser restart that restores the tab: entries and
    /// position survive, their payloads do not.
    ///
    pub fn restart_browser(&self) -> PositionChanges {
        let mut tab = self.tab.borrow_mut();
        for slot in tab.slots.iter_mut() {
            slot.state = None;
        }
        tab.attach()
    }

    /// Return whether the active document still has an open channel.
    ///
    pub fn is_loaded(&self) -> bool {
        self.tab.borrow().sender.is_some()
    }

    pub fn position(&self) -> usize {
        self.tab.borrow().index
    }

    /// Return the payloads of every entry in order.
    ///
    pub fn states(&self) -> Vec<Option<Value>> {
        self.tab
            .borrow()
            .slots
            .iter()
            .map(|slot| slot.state.clone())
            .collect()
    }

    pub fn go(&self, delta: i64) {
        let mut tab = self.tab.borrow_mut();
        let target = tab.index as i64 + delta;
        if delta == 0 || target < 0 || target >= tab.slots.len() as i64 {
            trace!("Ignoring out-of-range move by {}", delta);
            return;
        }
        let target = target as usize;
        let leaving = tab.slots[target].document != tab.active().document;
        tab.index = target;
        if leaving {
            debug!("Leaving document for {}", tab.active().url);
            tab.sender = None;
            return;
        }
        let state = tab.active().state.clone();
        if let Some(sender) = &tab.sender {
            // A closed receiver means nobody is listening any more.
            let _ = sender.send(PositionChanged { state });
        }
    }

    pub fn back(&self) {
        self.go(-1);
    }

    pub fn forward(&self) {
        self.go(1);
    }

    pub fn push_state(&self, state: Value) {
        let mut tab = self.tab.borrow_mut();
        tab.truncate_forward();
        let slot = Slot {
            document: tab.active().document,
            url: tab.active().url.clone(),
            state: Some(state),
        };
        tab.slots.push(slot);
        tab.index += 1;
    }

    pub fn replace_state(&self, state: Option<Value>) {
        let mut tab = self.tab.borrow_mut();
        let index = tab.index;
        tab.slots[index].state = state;
    }

    pub fn href(&self) -> String {
        self.tab.borrow().active().url.clone()
    }

    pub fn assign(&self, url: &str) {
        let mut tab = self.tab.borrow_mut();
        tab.truncate_forward();
        let document = tab.next_document;
        tab.next_document += 1;
        tab.slots.push(Slot {
            document,
            url: url.to_owned(),
            state: None,
        });
        tab.index += 1;
        tab.sender = None;
        debug!("Assigned document {}", url);
    }
}

impl NavigationPrimitive for MemoryHistory {
    fn state(&self) -> Option<Value> {
        self.tab.borrow().active().state.clone()
    }

    fn length(&self) -> usize {
        self.tab.borrow().slots.len()
    }

    fn push_state(&mut self, state: Value) {
        MemoryHistory::push_state(self, state);
    }

    fn replace_state(&mut self, state: Option<Value>) {
        MemoryHistory::replace_state(self, state);
    }

    fn go(&mut self, delta: i64) {
        MemoryHistory::go(self, delta);
    }

    fn href(&self) -> String {
        MemoryHistory::href(self)
    }

    fn origin(&self) -> String {
        origin_of(&self.href())
    }

    fn assign(&mut self, url: &str) {
        MemoryHistory::assign(self, url);
    }
}

/// Return the scheme, host and port part of `url`, or an empty string when
/// the URL is not absolute.
///
pub(crate) fn origin_of(url: &str) -> String {
    match Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^/?#]*") {
        Ok(pattern) => pattern
            .find(url)
            .map(|found| found.as_str().to_owned())
            .unwrap_or_default(),
        Err(e) => {
            error!("Invalid origin pattern: {}", e);
            String::new()
        }
    }
}
