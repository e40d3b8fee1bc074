//! Scripted demo session.
//!
//! Drives a [`HistoryManager`] over an in-memory tab from a list of steps
//! and reports the stack after each one.

use crate::config::{Config, SetUpOptions};
use crate::navigation::{MemoryHistory, PositionChanges};
use crate::screen::{Controller, ScreenCallbacks};
use crate::stack::{HistoryManager, Host, SetUpReason};
use crate::storage::MemoryStorage;
use anyhow::{anyhow, Context, Result};
use log::*;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

const DEMO_URL: &str = "https://demo.example/index.html";
const DEMO_SCREENS: [&str; 3] = ["list", "detail", "settings"];

/// One scripted action.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Push(String),
    Replace(String),
    Back,
    Forward,
    Go(i64),
    Collapse(i64, i64),
    Reload,
    Restart,
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, argument) = match s.split_once(':') {
            Some((name, argument)) => (name, Some(argument)),
            None => (s, None),
        };
        let step = match (name, argument) {
            ("push", Some(screen_type)) => Step::Push(screen_type.to_owned()),
            ("replace", Some(screen_type)) => Step::Replace(screen_type.to_owned()),
            ("back", None) => Step::Back,
            ("forward", None) => Step::Forward,
            ("go", Some(index)) => Step::Go(index.parse().context("Invalid index")?),
            ("collapse", Some(range)) => {
                let (start, end) = range
                    .split_once('-')
                    .ok_or_else(|| anyhow!("Expected collapse:<start>-<end>, got '{}'", s))?;
                Step::Collapse(
                    start.parse().context("Invalid start index")?,
                    end.parse().context("Invalid end index")?,
                )
            }
            ("reload", None) => Step::Reload,
            ("restart", None) => Step::Restart,
            _ => return Err(anyhow!("Unknown step '{}'", s)),
        };
        Ok(step)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Push(screen_type) => write!(f, "push:{}", screen_type),
            Step::Replace(screen_type) => write!(f, "replace:{}", screen_type),
            Step::Back => write!(f, "back"),
            Step::Forward => write!(f, "forward"),
            Step::Go(index) => write!(f, "go:{}", index),
            Step::Collapse(start, end) => write!(f, "collapse:{}-{}", start, end),
            Step::Reload => write!(f, "reload"),
            Step::Restart => write!(f, "restart"),
        }
    }
}

/// Oversees the demo tab, its stores and the manager of the loaded document.
///
pub struct App {
    config: Config,
    namespace: String,
    history: MemoryHistory,
    local_storage: MemoryStorage,
    session_storage: MemoryStorage,
}

impl App {
    /// Run `steps` against a fresh demo tab. Returns one transcript line for
    /// set-up and for every step.
    ///
    pub async fn start(config: Config, namespace: &str, steps: &[Step]) -> Result<Vec<String>> {
        info!("Starting demo session...");
        let (history, changes) = MemoryHistory::open(DEMO_URL);
        let mut app = App {
            config,
            namespace: namespace.to_owned(),
            history,
            local_storage: MemoryStorage::new(),
            session_storage: MemoryStorage::new(),
        };
        let mut transcript = Vec::new();
        let (mut manager, reason) = app.load(changes).await?;
        transcript.push(app.describe(&format!("setUp:{}", reason), &manager));

        for step in steps {
            debug!("Running step {}", step);
            match step {
                Step::Push(screen_type) => manager.push(screen_type, Value::Null)?,
                Step::Replace(screen_type) => manager.replace(screen_type, Value::Null)?,
                Step::Back | Step::Forward => {
                    let before = app.history.position();
                    if *step == Step::Back {
                        app.history.back();
                    } else {
                        app.history.forward();
                    }
                    if app.history.position() == before {
                        warn!("Nothing to move to for {}", step);
                    } else {
                        manager.handle_next().await?;
                    }
                }
                Step::Go(index) => manager.go(*index).await?,
                Step::Collapse(start, end) => manager.collapse(*start, *end).await?,
                Step::Reload => {
                    let changes = app.history.load();
                    let (reloaded, reason) = app.load(changes).await?;
                    manager = reloaded;
                    transcript.push(app.describe(&format!("{} -> {}", step, reason), &manager));
                    continue;
                }
                Step::Restart => {
                    let changes = app.history.restart_browser();
                    app.session_storage = MemoryStorage::new();
                    let (restarted, reason) = app.load(changes).await?;
                    manager = restarted;
                    transcript.push(app.describe(&format!("{} -> {}", step, reason), &manager));
                    if reason == SetUpReason::Exited {
                        break;
                    }
                    continue;
                }
            }
            // Settle any step back triggered by a forceBack entry.
            manager.handle_pending()?;
            transcript.push(app.describe(&step.to_string(), &manager));
        }

        info!("Exiting demo session...");
        Ok(transcript)
    }

    /// Create and set up the manager of a freshly loaded document.
    ///
    async fn load(&self, changes: PositionChanges) -> Result<(HistoryManager, SetUpReason)> {
        let host = Host::new(
            self.history.clone(),
            changes,
            Rc::new(self.local_storage.clone()),
            Rc::new(self.session_storage.clone()),
        );
        let mut manager = HistoryManager::new(host, self.config.clone());
        for screen_type in DEMO_SCREENS {
            manager.register(screen_type, demo_screen(screen_type));
        }
        let reason = manager.set_up(SetUpOptions::new(&self.namespace)).await?;
        Ok((manager, reason))
    }

    fn describe(&self, label: &str, manager: &HistoryManager) -> String {
        let stack: Vec<String> = (0..=manager.max_index())
            .map(|index| match manager.entry(index) {
                Some(entry) if entry.is_shown() => format!("*{}", entry.screen_type()),
                Some(entry) => entry.screen_type().to_owned(),
                None => "-".to_owned(),
            })
            .collect();
        format!(
            "{:<24} current={} max={} [{}]",
            label,
            manager.current_index(),
            manager.max_index(),
            stack.join(", ")
        )
    }
}

fn demo_screen(screen_type: &'static str) -> ScreenCallbacks {
    ScreenCallbacks::new()
        .factory(move |parent, options| {
            debug!(
                "Creating {} (parent: {}, options: {})",
                screen_type,
                parent.is_some(),
                options
            );
            let controller: Controller = Rc::new(screen_type);
            controller
        })
        .show(move |_, _| info!("Showing {}", screen_type))
        .hide(move |_, _| info!("Hiding {}", screen_type))
}
