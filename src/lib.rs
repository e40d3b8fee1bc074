//! Maps a browser-style navigation history onto a stack of application
//! screens.
//!
//! Register screen types on a [`HistoryManager`], call
//! [`HistoryManager::set_up`] once per document load, then push, replace, go
//! and collapse. Back and forward gestures reported by the navigation
//! primitive are turned into show and hide calls on the registered screens.

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod logger;
pub mod navigation;
pub mod screen;
pub mod stack;
pub mod storage;

pub use config::{Config, SetUpOptions, WhenBrowserRestart};
pub use error::{HistoryError, HistoryResult};
pub use events::{HistoryEvent, CHANGE_CURRENT_INDEX, CHANGE_MAX_INDEX, SHOW};
pub use navigation::{MemoryHistory, NavigationPrimitive};
pub use screen::{Controller, ScreenCallbacks};
pub use stack::{HistoryManager, Host, ReplaceOptions, SetUpReason};
pub use storage::{KeyValueStore, MemoryStorage};
