use super::*;
use crate::config::{SetUpOptions, WhenBrowserRestart};
use crate::events::{Change, HistoryEvent, CHANGE_CURRENT_INDEX, CHANGE_MAX_INDEX};
use crate::navigation::{HandOff, MemoryHistory};
use crate::screen::{ScreenError, EMPTY, FORCE_BACK};
use crate::storage::MemoryStorage;
use fake::{uuid::UUIDv4, Fake};
use serde_json::json;
use std::cell::RefCell;
use tokio::sync::mpsc;
use uuid::Uuid;

const APP_URL: &str = "https://app.example/index.html";
const REDIRECT_URL: &str = "https://app.example/redirect.html";

type Calls = Rc<RefCell<Vec<String>>>;

struct Fixture {
    history: MemoryHistory,
    local: MemoryStorage,
    session: MemoryStorage,
    calls: Calls,
    namespace: String,
}

impl Fixture {
    fn open() -> (Self, PositionChanges) {
        let (history, changes) = MemoryHistory::open(APP_URL);
        (Fixture::with_history(history), changes)
    }

    fn with_history(history: MemoryHistory) -> Self {
        let namespace: Uuid = UUIDv4.fake();
        Fixture {
            history,
            local: MemoryStorage::new(),
            session: MemoryStorage::new(),
            calls: Rc::default(),
            namespace: namespace.to_string(),
        }
    }

    fn manager(&self, changes: PositionChanges) -> HistoryManager {
        self.manager_with(changes, Config::default())
    }

    fn manager_with(&self, changes: PositionChanges, config: Config) -> HistoryManager {
        let host = Host::new(
            self.history.clone(),
            changes,
            Rc::new(self.local.clone()),
            Rc::new(self.session.clone()),
        );
        let mut manager = HistoryManager::new(host, config);
        for screen_type in ["A", "B", "C", "D", "E"] {
            manager.register(screen_type, recording(screen_type, &self.calls));
        }
        manager
    }

    fn options(&self) -> SetUpOptions {
        SetUpOptions::new(&self.namespace)
    }

    fn recovery(&self) -> RecoveryStorage {
        RecoveryStorage::new(Rc::new(self.local.clone()), &self.namespace)
    }

    fn tab(&self) -> NamespacedStorage {
        NamespacedStorage::new(Rc::new(self.session.clone()), &["tab", &self.namespace])
    }

    fn take_calls(&self) -> Vec<String> {
        self.calls.borrow_mut().drain(..).collect()
    }

    /// Open a manager, set it up and push `screens` in order.
    async fn started(&self, changes: PositionChanges, screens: &[&str]) -> HistoryManager {
        let mut manager = self.manager(changes);
        manager.set_up(self.options()).await.unwrap();
        for screen_type in screens {
            manager.push(screen_type, Value::Null).unwrap();
        }
        self.take_calls();
        manager
    }
}

fn recording(screen_type: &str, calls: &Calls) -> ScreenCallbacks {
    let (factory_log, show_log, hide_log) = (Rc::clone(calls), Rc::clone(calls), Rc::clone(calls));
    let (factory_name, show_name, hide_name) = (
        screen_type.to_owned(),
        screen_type.to_owned(),
        screen_type.to_owned(),
    );
    ScreenCallbacks::new()
        .factory(move |_, _| {
            factory_log
                .borrow_mut()
                .push(format!("factory:{}", factory_name));
            let controller: Controller = Rc::new(());
            controller
        })
        .show(move |_, _| show_log.borrow_mut().push(format!("show:{}", show_name)))
        .hide(move |_, _| hide_log.borrow_mut().push(format!("hide:{}", hide_name)))
}

fn state_type(state: &Option<Value>) -> Option<String> {
    state
        .as_ref()
        .and_then(HistoryState::from_value)
        .map(|state| state.screen_type)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Primitive that drops every payload written to it.
struct Forgetful;

impl NavigationPrimitive for Forgetful {
    fn state(&self) -> Option<Value> {
        None
    }

    fn length(&self) -> usize {
        1
    }

    fn push_state(&mut self, _state: Value) {}

    fn replace_state(&mut self, _state: Option<Value>) {}

    fn go(&mut self, _delta: i64) {}

    fn href(&self) -> String {
        APP_URL.to_string()
    }

    fn origin(&self) -> String {
        "https://app.example".to_string()
    }

    fn assign(&mut self, _url: &str) {}
}

#[tokio::test]
async fn initial_set_up_starts_a_fresh_context() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.manager(changes);

    let reason = manager.set_up(fixture.options()).await.unwrap();

    assert_eq!(reason, SetUpReason::Initial);
    assert!(manager.history_id().is_some());
    assert_eq!(manager.entry(0).unwrap().screen_type(), EMPTY);
    assert_eq!(manager.max_index(), 0);
    assert_eq!(manager.current_index(), 0);
    assert!(!manager.is_silent());
    assert_eq!(fixture.recovery().get::<i64>(CURRENT_INDEX), Some(0));
}

#[tokio::test]
async fn configured_defaults_fill_set_up_options() {
    let (fixture, changes) = Fixture::open();
    let mut config = Config::new();
    config.init_options = SetUpOptions::new(&fixture.namespace);
    let mut manager = fixture.manager_with(changes, config);

    let reason = manager.set_up(SetUpOptions::default()).await.unwrap();

    assert_eq!(reason, SetUpReason::Initial);
    assert_eq!(fixture.recovery().get::<i64>(MAX_INDEX), Some(0));
}

#[tokio::test]
async fn push_shows_the_new_entry() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &[]).await;

    manager.push("A", json!({ "id": 1 })).unwrap();

    assert_eq!(fixture.take_calls(), strings(&["factory:A", "show:A"]));
    assert_eq!(manager.current_index(), 1);
    assert_eq!(manager.max_index(), 1);
    assert!(manager.entry(1).unwrap().is_shown());
    assert_eq!(state_type(&fixture.history.state()), Some("A".to_string()));
}

#[tokio::test]
async fn replacing_twice_shows_once() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &[]).await;

    manager.replace("A", json!({ "v": 1 })).unwrap();
    manager.replace("A", json!({ "v": 2 })).unwrap();

    assert_eq!(fixture.take_calls(), strings(&["factory:A", "show:A"]));
    assert_eq!(manager.entry(0).unwrap().options(), &json!({ "v": 2 }));
    assert_eq!(manager.max_index(), 0);
    let state = HistoryState::from_value(&fixture.history.state().unwrap()).unwrap();
    assert_eq!(state.options, json!({ "v": 2 }));
    assert_eq!(state.index, 0);
}

#[tokio::test]
async fn user_gestures_hide_and_show_entries() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;

    fixture.history.back();
    manager.handle_next().await.unwrap();
    assert_eq!(fixture.take_calls(), strings(&["hide:B"]));
    assert_eq!(manager.current_index(), 1);
    assert!(!manager.entry(2).unwrap().is_shown());

    fixture.history.forward();
    assert_eq!(manager.handle_pending().unwrap(), 1);
    assert_eq!(fixture.take_calls(), strings(&["show:B"]));
    assert_eq!(manager.current_index(), 2);
}

#[tokio::test]
async fn going_forward_from_index_zero_shows_each_entry_once() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;
    manager.go(0).await.unwrap();
    fixture.take_calls();

    manager.go(2).await.unwrap();

    assert_eq!(fixture.take_calls(), strings(&["show:A", "show:B"]));
    assert_eq!(manager.current_index(), 2);
    assert!(manager.entry(0).unwrap().is_shown());
}

#[tokio::test]
async fn push_after_going_back_discards_the_future() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;

    manager.go(0).await.unwrap();
    assert_eq!(fixture.take_calls(), strings(&["hide:B", "hide:A"]));

    manager.push("C", Value::Null).unwrap();
    assert_eq!(fixture.take_calls(), strings(&["factory:C", "show:C"]));
    assert_eq!(manager.max_index(), 1);
    assert_eq!(manager.entry(1).unwrap().screen_type(), "C");
    assert_eq!(fixture.history.length(), 2);
}

#[tokio::test]
async fn silent_go_dispatches_nothing() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;
    let changed = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&changed);
    manager.on(
        CHANGE_CURRENT_INDEX,
        Rc::new(move |_: &HistoryEvent| *counter.borrow_mut() += 1),
    );

    manager.go_silently(0).await.unwrap();

    assert!(fixture.take_calls().is_empty());
    assert_eq!(*changed.borrow(), 0);
    assert_eq!(manager.current_index(), 0);
    assert!(!manager.is_silent());
}

#[tokio::test]
async fn go_to_a_missing_index_is_rejected() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A"]).await;
    let error = manager.go(4).await.unwrap_err();
    assert!(matches!(error, HistoryError::MissingEntry { index: 4 }));
}

#[tokio::test]
async fn collapse_shifts_later_entries_down() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B", "C", "D", "E"]).await;

    manager.collapse(2, 4).await.unwrap();

    assert_eq!(manager.max_index(), 3);
    assert_eq!(manager.current_index(), 3);
    assert_eq!(fixture.take_calls(), strings(&["hide:C", "hide:B"]));
    assert_eq!(manager.entry(2).unwrap().screen_type(), "D");
    assert_eq!(manager.entry(3).unwrap().screen_type(), "E");
    assert!(!manager.is_silent());

    let states = fixture.history.states();
    assert_eq!(states.len(), 4);
    let rewritten = HistoryState::from_value(states[2].as_ref().unwrap()).unwrap();
    assert_eq!(rewritten.screen_type, "D");
    assert_eq!(rewritten.index, 2);
    assert_eq!(fixture.recovery().get::<i64>(MAX_INDEX), Some(3));
}

#[tokio::test]
async fn collapse_above_the_current_index_records_the_new_length() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B", "C", "D", "E"]).await;
    manager.go(1).await.unwrap();
    fixture.take_calls();

    manager.collapse(2, 4).await.unwrap();

    assert_eq!(manager.current_index(), 1);
    assert_eq!(manager.max_index(), 3);
    assert_eq!(fixture.history.length(), 4);
    assert_eq!(fixture.tab().get::<usize>(HISTORY_LENGTH), Some(4));
    assert_eq!(fixture.recovery().get::<i64>(CURRENT_INDEX), Some(1));
}

#[tokio::test]
async fn collapse_from_inside_the_range_settles_on_start() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B", "C", "D", "E"]).await;
    manager.go(3).await.unwrap();
    assert_eq!(fixture.take_calls(), strings(&["hide:E", "hide:D"]));

    manager.collapse(2, 4).await.unwrap();

    assert_eq!(fixture.take_calls(), strings(&["hide:C", "hide:B", "show:D"]));
    assert_eq!(manager.current_index(), 2);
    assert_eq!(manager.max_index(), 3);
    assert!(manager.entry(2).unwrap().is_shown());
    assert!(!manager.entry(3).unwrap().is_shown());
}

#[tokio::test]
async fn collapse_at_the_tail_leaves_a_force_back() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B", "C"]).await;

    manager.collapse(1, 3).await.unwrap();

    assert_eq!(fixture.take_calls(), strings(&["hide:B", "hide:A"]));
    assert_eq!(manager.current_index(), 1);
    assert_eq!(manager.max_index(), 2);
    assert_eq!(manager.entry(1).unwrap().screen_type(), "C");
    assert_eq!(manager.entry(2).unwrap().screen_type(), FORCE_BACK);
    assert_eq!(
        state_type(&fixture.history.states()[2]),
        Some(FORCE_BACK.to_string())
    );

    // Moving forward onto the forceBack entry bounces straight back.
    fixture.history.forward();
    manager.handle_next().await.unwrap();
    assert_eq!(manager.handle_pending().unwrap(), 1);
    assert_eq!(fixture.history.position(), 1);
    assert_eq!(manager.current_index(), 1);
    assert!(!manager.entry(2).unwrap().is_shown());
}

#[tokio::test]
async fn invalid_collapse_range_is_rejected() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;

    let error = manager.collapse(1, 1).await.unwrap_err();
    assert!(matches!(error, HistoryError::InvalidRange { start: 1, end: 1, max: 2 }));
    let error = manager.collapse(0, 3).await.unwrap_err();
    assert!(matches!(error, HistoryError::InvalidRange { .. }));
    assert_eq!(manager.max_index(), 2);
}

#[tokio::test]
async fn reload_restores_the_stack_without_showing() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;
    manager.go(1).await.unwrap();
    let history_id = manager.history_id();
    drop(manager);
    fixture.take_calls();

    let changes = fixture.history.load();
    let mut restored = fixture.manager(changes);
    let reason = restored.set_up(fixture.options()).await.unwrap();

    assert_eq!(reason, SetUpReason::Restore);
    assert_eq!(restored.history_id(), history_id);
    assert_eq!(fixture.take_calls(), strings(&["factory:A", "factory:B"]));
    assert_eq!(restored.max_index(), 2);
    assert_eq!(restored.current_index(), 1);
    assert_eq!(fixture.history.position(), 1);
    assert_eq!(restored.entry(0).unwrap().screen_type(), EMPTY);
    assert_eq!(restored.entry(2).unwrap().screen_type(), "B");
    assert!(!restored.is_silent());
}

#[tokio::test]
async fn reload_without_context_record_replays_up_to_the_reload_index() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;
    manager.go(1).await.unwrap();
    drop(manager);
    fixture.take_calls();
    fixture.session.clear();

    let changes = fixture.history.load();
    let mut restored = fixture.manager(changes);
    let reason = restored.set_up(fixture.options()).await.unwrap();

    assert_eq!(reason, SetUpReason::Restore);
    assert_eq!(restored.max_index(), 1);
    assert_eq!(restored.current_index(), 1);
    assert_eq!(fixture.take_calls(), strings(&["factory:A"]));
    assert_eq!(fixture.history.position(), 1);
}

#[tokio::test]
async fn reload_after_leaving_below_the_max_index_walks_off_the_document() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A", "B"]).await;
    manager.go(1).await.unwrap();
    manager.unload();
    drop(manager);

    fixture.history.assign("https://other.example/page");
    fixture.history.back();
    let changes = fixture.history.load();
    let mut restored = fixture.manager(changes);
    let error = restored.set_up(fixture.options()).await.unwrap_err();

    assert!(matches!(error, HistoryError::DocumentUnloaded));
    assert_eq!(fixture.history.href(), "https://other.example/page");
    assert!(!restored.is_silent());
}

#[tokio::test]
async fn restart_with_none_starts_over() {
    let (mut fixture, changes) = Fixture::open();
    let manager = fixture.started(changes, &["A", "B"]).await;
    let history_id = manager.history_id();
    drop(manager);

    let changes = fixture.history.restart_browser();
    fixture.session = MemoryStorage::new();
    let mut manager = fixture.manager(changes);
    let reason = manager.set_up(fixture.options()).await.unwrap();

    assert_eq!(reason, SetUpReason::BrowserRestart);
    assert_ne!(manager.history_id(), history_id);
    assert_eq!(manager.current_index(), 0);
    assert_eq!(manager.max_index(), 1);
    assert_eq!(manager.entry(1).unwrap().screen_type(), FORCE_BACK);
    assert_eq!(fixture.history.position(), 2);
    assert_eq!(fixture.history.length(), 4);
    assert_eq!(fixture.recovery().get::<i64>(CURRENT_INDEX), Some(0));
}

#[tokio::test]
async fn restart_with_redirect_hands_off() {
    let (mut fixture, changes) = Fixture::open();
    drop(fixture.started(changes, &["A", "B"]).await);

    let changes = fixture.history.restart_browser();
    fixture.session = MemoryStorage::new();
    let mut manager = fixture.manager(changes);
    let options = fixture
        .options()
        .when_browser_restart(WhenBrowserRestart::Redirect)
        .redirect_html_url(REDIRECT_URL);
    let reason = manager.set_up(options).await.unwrap();

    assert_eq!(reason, SetUpReason::Exited);
    let href = fixture.history.href();
    assert!(href.starts_with(REDIRECT_URL));
    assert_eq!(
        HandOff::from_url(&href).unwrap(),
        HandOff::replace_back_then_redirect("/index.html")
    );
    assert!(fixture.recovery().get::<i64>(CURRENT_INDEX).is_none());
    assert!(!fixture.history.is_loaded());
}

#[tokio::test]
async fn restart_with_back_to_previous_document_leaves() {
    let (history, _previous) = MemoryHistory::open("https://other.example/start");
    history.assign(APP_URL);
    let changes = history.load();
    let mut fixture = Fixture::with_history(history);
    drop(fixture.started(changes, &["A", "B"]).await);

    let changes = fixture.history.restart_browser();
    fixture.session = MemoryStorage::new();
    let mut manager = fixture.manager(changes);
    let options = fixture
        .options()
        .when_browser_restart(WhenBrowserRestart::BackToPreviousDocument);
    let reason = manager.set_up(options).await.unwrap();

    assert_eq!(reason, SetUpReason::Exited);
    assert_eq!(fixture.history.href(), "https://other.example/start");
    assert!(!fixture.history.is_loaded());
    assert!(fixture.take_calls().is_empty());
}

#[tokio::test]
async fn restart_at_index_zero_reinitializes() {
    let (mut fixture, changes) = Fixture::open();
    drop(fixture.started(changes, &[]).await);

    let changes = fixture.history.restart_browser();
    fixture.session = MemoryStorage::new();
    let mut manager = fixture.manager(changes);
    let options = fixture
        .options()
        .when_browser_restart(WhenBrowserRestart::BackToPreviousDocument);
    let reason = manager.set_up(options).await.unwrap();

    assert_eq!(reason, SetUpReason::BrowserRestart);
    assert_eq!(manager.max_index(), 0);
    assert_eq!(fixture.history.length(), 1);
}

#[tokio::test]
async fn skipped_redirect_is_blocked_with_force_back() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &[]).await;
    manager.unload();
    drop(manager);

    fixture.history.replace_state(None);
    let changes = fixture.history.load();
    let mut manager = fixture.manager(changes);
    let reason = manager.set_up(fixture.options()).await.unwrap();

    assert_eq!(reason, SetUpReason::Initial);
    assert_eq!(manager.max_index(), 1);
    assert_eq!(manager.entry(1).unwrap().screen_type(), FORCE_BACK);
    assert_eq!(fixture.history.length(), 2);
    assert_eq!(fixture.history.position(), 0);
}

#[tokio::test]
async fn unload_clears_the_pending_index() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &["A"]).await;
    assert_eq!(fixture.recovery().get::<i64>(CURRENT_INDEX), Some(1));

    manager.unload();

    assert!(fixture.recovery().get::<i64>(CURRENT_INDEX).is_none());
    assert_eq!(fixture.recovery().get::<i64>(MAX_INDEX), Some(1));
}

#[tokio::test]
async fn events_are_published() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &[]).await;
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();

    let log = Rc::clone(&seen);
    let typed: Handler = Rc::new(move |event: &HistoryEvent| {
        if let HistoryEvent::Show { screen_type, .. } = event {
            log.borrow_mut().push(format!("show:{}", screen_type));
        }
    });
    manager.on("show:A", Rc::clone(&typed));
    manager.on("show:A", typed);
    let log = Rc::clone(&seen);
    manager.on(
        "show",
        Rc::new(move |_: &HistoryEvent| log.borrow_mut().push("show".to_string())),
    );
    let current_changes: Rc<RefCell<Vec<Change>>> = Rc::default();
    let log = Rc::clone(&current_changes);
    manager.on(
        CHANGE_CURRENT_INDEX,
        Rc::new(move |event: &HistoryEvent| {
            if let HistoryEvent::CurrentIndexChanged(change) = event {
                log.borrow_mut().push(*change);
            }
        }),
    );
    let max_changes: Rc<RefCell<Vec<Change>>> = Rc::default();
    let log = Rc::clone(&max_changes);
    let max_listener = manager.on(
        CHANGE_MAX_INDEX,
        Rc::new(move |event: &HistoryEvent| {
            if let HistoryEvent::MaxIndexChanged(change) = event {
                log.borrow_mut().push(*change);
            }
        }),
    );

    manager.push("A", Value::Null).unwrap();

    assert_eq!(*seen.borrow(), strings(&["show:A", "show"]));
    let step = Change {
        current: 1,
        previous: Some(0),
    };
    assert_eq!(*current_changes.borrow(), vec![step]);
    assert_eq!(*max_changes.borrow(), vec![step]);

    assert!(manager.off(max_listener));
    manager.push("B", Value::Null).unwrap();
    assert_eq!(max_changes.borrow().len(), 1);
}

#[tokio::test]
async fn unknown_screen_type_is_an_error() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.started(changes, &[]).await;

    let error = manager.push("missing", Value::Null).unwrap_err();

    assert!(matches!(
        error,
        HistoryError::Screen(ScreenError::UnknownType { .. })
    ));
    assert_eq!(manager.max_index(), 0);
    assert_eq!(fixture.history.length(), 1);
}

#[tokio::test]
async fn operations_before_set_up_fail() {
    let (fixture, changes) = Fixture::open();
    let mut manager = fixture.manager(changes);

    assert!(matches!(
        manager.push("A", Value::Null).unwrap_err(),
        HistoryError::NotSetUp
    ));
    assert!(matches!(
        manager.context_storage().unwrap_err(),
        HistoryError::HistoryIdUninitialized
    ));
}

#[tokio::test]
async fn context_storage_is_keyed_by_history_id() {
    let (fixture, changes) = Fixture::open();
    let manager = fixture.started(changes, &["A"]).await;

    let context = manager.context_storage().unwrap();

    let history_id = manager.history_id().unwrap();
    assert!(context
        .prefix()
        .ends_with(&format!("historySpecified:{}:", history_id)));
    assert_eq!(context.get::<i64>(MAX_INDEX), Some(1));
}

#[tokio::test]
async fn probe_keeps_the_active_payload() {
    let (fixture, changes) = Fixture::open();
    fixture.history.replace_state(Some(json!("mine")));
    let mut manager = fixture.manager(changes);

    assert!(manager.is_supported());
    assert_eq!(fixture.history.state(), Some(json!("mine")));
}

#[tokio::test]
async fn unsupported_primitive_refuses_set_up() {
    let (_sender, changes) = mpsc::unbounded_channel();
    let host = Host::new(
        Forgetful,
        changes,
        Rc::new(MemoryStorage::new()),
        Rc::new(MemoryStorage::new()),
    );
    let mut manager = HistoryManager::new(host, Config::default());

    assert!(!manager.is_supported());
    let error = manager.set_up(SetUpOptions::new("app")).await.unwrap_err();
    assert!(matches!(error, HistoryError::Unsupported));
}
