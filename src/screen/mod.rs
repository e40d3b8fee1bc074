//! Screen registry.
//!
//! Maps a screen type name to the callbacks that create, show and hide its
//! controllers. Two types are always present: `empty`, the placeholder held
//! at index 0, and `forceBack`, which steps straight back whenever it is shown.

mod error;

pub use error::ScreenError;

use log::*;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub const EMPTY: &str = "empty";
pub const FORCE_BACK: &str = "forceBack";

/// Opaque application object created once per entry.
///
pub type Controller = Rc<dyn Any>;

pub type Factory = Box<dyn Fn(Option<&Controller>, &Value) -> Controller>;
pub type Callback = Box<dyn Fn(&Controller, &Value)>;

/// Factory, show and hide callbacks of one screen type. Unset callbacks do
/// nothing, and the default factory returns a unit controller.
///
pub struct ScreenCallbacks {
    factory: Factory,
    show: Callback,
    hide: Callback,
}

impl Default for ScreenCallbacks {
    fn default() -> Self {
        ScreenCallbacks {
            factory: Box::new(|_, _| unit_controller()),
            show: Box::new(|_, _| {}),
            hide: Box::new(|_, _| {}),
        }
    }
}

impl ScreenCallbacks {
    pub fn new() -> Self {
        ScreenCallbacks::default()
    }

    /// Set the factory, called with the controller of the previous index
    /// (none at index 0) and the entry options.
    ///
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(Option<&Controller>, &Value) -> Controller + 'static,
    {
        self.factory = Box::new(factory);
        self
    }

    pub fn show<F>(mut self, show: F) -> Self
    where
        F: Fn(&Controller, &Value) + 'static,
    {
        self.show = Box::new(show);
        self
    }

    pub fn hide<F>(mut self, hide: F) -> Self
    where
        F: Fn(&Controller, &Value) + 'static,
    {
        self.hide = Box::new(hide);
        self
    }
}

impl fmt::Debug for ScreenCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenCallbacks").finish_non_exhaustive()
    }
}

/// What the manager must do after a screen was shown.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowEffect {
    Stay,
    StepBack,
}

/// Specifying the different screen kinds.
///
#[derive(Debug)]
pub enum Screen {
    Empty,
    ForceBack,
    Custom(ScreenCallbacks),
}

impl Screen {
    pub fn create(&self, parent: Option<&Controller>, options: &Value) -> Controller {
        match self {
            Screen::Empty | Screen::ForceBack => unit_controller(),
            Screen::Custom(callbacks) => (callbacks.factory)(parent, options),
        }
    }

    pub fn show(&self, controller: &Controller, options: &Value) -> ShowEffect {
        match self {
            Screen::Empty => ShowEffect::Stay,
            Screen::ForceBack => ShowEffect::StepBack,
            Screen::Custom(callbacks) => {
                (callbacks.show)(controller, options);
                ShowEffect::Stay
            }
        }
    }

    pub fn hide(&self, controller: &Controller, options: &Value) {
        if let Screen::Custom(callbacks) = self {
            (callbacks.hide)(controller, options);
        }
    }
}

/// Screen kinds keyed by type name.
///
#[derive(Debug)]
pub struct ScreenRegistry {
    screens: HashMap<String, Screen>,
}

impl Default for ScreenRegistry {
    fn default() -> Self {
        let mut screens = HashMap::new();
        screens.insert(EMPTY.to_owned(), Screen::Empty);
        screens.insert(FORCE_BACK.to_owned(), Screen::ForceBack);
        ScreenRegistry { screens }
    }
}

impl ScreenRegistry {
    /// Return a registry holding only the built-in screens.
    ///
    pub fn new() -> Self {
        ScreenRegistry::default()
    }

    /// Register callbacks for a screen type, replacing any earlier
    /// registration under the same name.
    ///
    pub fn register(&mut self, screen_type: &str, callbacks: ScreenCallbacks) {
        debug!("Registering screen type '{}'", screen_type);
        self.screens
            .insert(screen_type.to_owned(), Screen::Custom(callbacks));
    }

    pub fn get(&self, screen_type: &str) -> Result<&Screen, ScreenError> {
        self.screens
            .get(screen_type)
            .ok_or_else(|| ScreenError::UnknownType {
                screen_type: screen_type.to_owned(),
            })
    }

    pub fn contains(&self, screen_type: &str) -> bool {
        self.screens.contains_key(screen_type)
    }
}

fn unit_controller() -> Controller {
    Rc::new(())
}
