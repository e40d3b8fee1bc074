//! Manager events.
//!
//! This module contains the typed event emitter consumers subscribe to:
//! - `HistoryEvent`: index changes and screen shows, addressed by topic
//! - `Listeners`: subscription bookkeeping and dispatch
//! - `Observable`: last observed index values

mod observable;

pub use observable::{Change, Observable};

use crate::screen::Controller;
use std::rc::Rc;

pub const CHANGE_CURRENT_INDEX: &str = "change:currentIndex";
pub const CHANGE_MAX_INDEX: &str = "change:maxIndex";
pub const SHOW: &str = "show";

/// Specify the events published by the manager.
///
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    CurrentIndexChanged(Change),
    MaxIndexChanged(Change),
    Show {
        screen_type: String,
        controller: Controller,
    },
}

impl HistoryEvent {
    /// Return whether a subscription to `topic` receives this event. A show
    /// is delivered on `show` and on `show:<type>`.
    ///
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            HistoryEvent::CurrentIndexChanged(_) => topic == CHANGE_CURRENT_INDEX,
            HistoryEvent::MaxIndexChanged(_) => topic == CHANGE_MAX_INDEX,
            HistoryEvent::Show { screen_type, .. } => {
                topic == SHOW
                    || topic
                        .strip_prefix(SHOW)
                        .and_then(|rest| rest.strip_prefix(':'))
                        .map_or(false, |rest| rest == screen_type)
            }
        }
    }
}

pub type Handler = Rc<dyn Fn(&HistoryEvent)>;

/// Identifies one subscription.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    topic: String,
    handler: Handler,
}

/// Subscriptions, dispatched in registration order.
///
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl Listeners {
    pub fn new() -> Self {
        Listeners::default()
    }

    /// Subscribe `handler` to `topic`. Subscribing the same handler to the
    /// same topic again returns the existing subscription.
    ///
    pub fn on(&mut self, topic: &str, handler: Handler) -> ListenerId {
        if let Some(existing) = self
            .listeners
            .iter()
            .find(|l| l.topic == topic && Rc::ptr_eq(&l.handler, &handler))
        {
            return existing.id;
        }
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            topic: topic.to_owned(),
            handler,
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    ///
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn emit(&self, event: &HistoryEvent) {
        let handlers: Vec<Handler> = self
            .listeners
            .iter()
            .filter(|l| event.matches(&l.topic))
            .map(|l| Rc::clone(&l.handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}
