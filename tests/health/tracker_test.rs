//! Tests for `src/health/tracker.rs` — state store, suppression, notification.

use std::sync::{Arc, Mutex};

use vigil::health::{
    ArgKey, Args, CatalogBuilder, HealthSnapshot, HealthTracker, Severity, Text, Warnable,
    WarnableHandle,
};

struct Fixture {
    tracker: Arc<HealthTracker>,
    net_down: WarnableHandle,
    no_relay: WarnableHandle,
    login: WarnableHandle,
}

fn fixture() -> Fixture {
    let mut builder = CatalogBuilder::new();
    let net_down = builder
        .register(Warnable {
            code: "net-down",
            title: "Network down",
            severity: Severity::High,
            text: Text::Static("The network is down."),
            depends_on: &[],
            impacts_connectivity: true,
        })
        .expect("should register net-down");
    let no_relay = builder
        .register(Warnable {
            code: "no-relay",
            title: "No relay server",
            severity: Severity::High,
            text: Text::Static("No relay server is reachable."),
            depends_on: &["net-down"],
            impacts_connectivity: false,
        })
        .expect("should register no-relay");
    let login = builder
        .register(Warnable {
            code: "login",
            title: "Logged out",
            severity: Severity::Medium,
            text: Text::Templated(|args| {
                let error = args.get(ArgKey::ErrorText);
                if error.is_empty() {
                    "You are logged out.".to_owned()
                } else {
                    format!("You are logged out: {error}")
                }
            }),
            depends_on: &[],
            impacts_connectivity: false,
        })
        .expect("should register login");
    let catalog = builder.freeze().expect("catalog should freeze");
    Fixture {
        tracker: Arc::new(HealthTracker::new(Arc::new(catalog))),
        net_down,
        no_relay,
        login,
    }
}

/// Subscribe with a callback that appends every delivered snapshot.
fn record_events(tracker: &HealthTracker) -> Arc<Mutex<Vec<HealthSnapshot>>> {
    let events: Arc<Mutex<Vec<HealthSnapshot>>> = Arc::default();
    let sink = Arc::clone(&events);
    tracker.subscribe(Box::new(move |snapshot| {
        sink.lock().expect("events lock").push(snapshot.clone());
    }));
    events
}

fn event_count(events: &Arc<Mutex<Vec<HealthSnapshot>>>) -> usize {
    events.lock().expect("events lock").len()
}

#[test]
fn raw_snapshot_holds_exact_args() {
    let f = fixture();
    let args = Args::new().with(ArgKey::ErrorText, "token expired");
    f.tracker.set_unhealthy(f.login, args.clone());

    let raw = f.tracker.snapshot();
    let record = raw.get("login").expect("login should be active");
    assert_eq!(record.args, args);
    assert!(f.tracker.is_unhealthy(f.login));
}

#[test]
fn root_cause_hides_symptom_until_cleared() {
    let f = fixture();
    f.tracker.set_unhealthy(f.net_down, Args::new());
    f.tracker.set_unhealthy(f.no_relay, Args::new());

    let codes: Vec<String> = f.tracker.warnings().into_iter().map(|w| w.code).collect();
    assert_eq!(codes, vec!["net-down"]);

    f.tracker.set_healthy(f.net_down);
    let codes: Vec<String> = f.tracker.warnings().into_iter().map(|w| w.code).collect();
    assert_eq!(codes, vec!["no-relay"]);
}

#[test]
fn repeated_set_unhealthy_refreshes_without_duplicating() {
    let f = fixture();
    f.tracker
        .set_unhealthy(f.login, Args::new().with(ArgKey::ErrorText, "first"));
    let first_since = f
        .tracker
        .snapshot()
        .get("login")
        .expect("login should be active")
        .since;

    f.tracker
        .set_unhealthy(f.login, Args::new().with(ArgKey::ErrorText, "second"));
    let raw = f.tracker.snapshot();
    assert_eq!(raw.len(), 1, "refresh must not duplicate the record");
    let record = raw.get("login").expect("login should still be active");
    assert_eq!(record.args.get(ArgKey::ErrorText), "second");
    assert!(record.since >= first_since);
}

#[test]
fn overall_severity_matches_visible_maximum() {
    let f = fixture();
    assert_eq!(f.tracker.overall_severity(), None);
    assert!(!f.tracker.connectivity_impacted());

    f.tracker.set_unhealthy(f.login, Args::new());
    assert_eq!(f.tracker.overall_severity(), Some(Severity::Medium));

    f.tracker.set_unhealthy(f.net_down, Args::new());
    assert_eq!(f.tracker.overall_severity(), Some(Severity::High));
    assert!(f.tracker.connectivity_impacted());

    f.tracker.set_healthy(f.net_down);
    f.tracker.set_healthy(f.login);
    assert_eq!(f.tracker.overall_severity(), None);
}

#[test]
fn visible_order_is_stable_across_queries() {
    let f = fixture();
    // no-relay is suppressed by net-down, so make both visible: clear the
    // dependency and activate both High-severity warnables independently.
    f.tracker.set_unhealthy(f.no_relay, Args::new());
    f.tracker.set_unhealthy(f.net_down, Args::new());
    f.tracker.set_healthy(f.net_down);
    f.tracker.set_unhealthy(f.login, Args::new());

    let first: Vec<String> = f.tracker.warnings().into_iter().map(|w| w.code).collect();
    let second: Vec<String> = f.tracker.warnings().into_iter().map(|w| w.code).collect();
    assert_eq!(first, second, "queries without mutation must be stable");
    assert_eq!(first, vec!["no-relay", "login"]);
}

#[test]
fn suppressed_toggle_is_silent_until_root_cause_clears() {
    let f = fixture();
    let events = record_events(&f.tracker);

    f.tracker.set_unhealthy(f.net_down, Args::new());
    assert_eq!(event_count(&events), 1);

    // Immediately suppressed: the visible picture does not change.
    f.tracker.set_unhealthy(f.no_relay, Args::new());
    assert_eq!(event_count(&events), 1);

    // Clearing the root cause reveals the symptom: exactly one notification.
    f.tracker.set_healthy(f.net_down);
    assert_eq!(event_count(&events), 2);
    let last = events
        .lock()
        .expect("events lock")
        .last()
        .cloned()
        .expect("should have a final event");
    let codes: Vec<&str> = last.warnings.iter().map(|w| w.code.as_str()).collect();
    assert_eq!(codes, vec!["no-relay"]);
}

#[test]
fn refresh_with_identical_args_does_not_renotify() {
    let f = fixture();
    let events = record_events(&f.tracker);

    f.tracker.set_unhealthy(f.net_down, Args::new());
    f.tracker.set_unhealthy(f.net_down, Args::new());
    assert_eq!(event_count(&events), 1);

    // Changed args change the rendered text, which is a visible change.
    f.tracker
        .set_unhealthy(f.login, Args::new().with(ArgKey::ErrorText, "one"));
    f.tracker
        .set_unhealthy(f.login, Args::new().with(ArgKey::ErrorText, "two"));
    assert_eq!(event_count(&events), 3);
}

#[test]
fn set_healthy_on_healthy_warnable_is_a_silent_noop() {
    let f = fixture();
    let events = record_events(&f.tracker);
    f.tracker.set_healthy(f.login);
    assert_eq!(event_count(&events), 0);
    assert!(f.tracker.warnings().is_empty());
}

#[test]
fn unsubscribe_stops_delivery() {
    let f = fixture();
    let events: Arc<Mutex<Vec<HealthSnapshot>>> = Arc::default();
    let sink = Arc::clone(&events);
    let token = f.tracker.subscribe(Box::new(move |snapshot| {
        sink.lock().expect("events lock").push(snapshot.clone());
    }));

    f.tracker.set_unhealthy(f.net_down, Args::new());
    assert_eq!(event_count(&events), 1);

    f.tracker.unsubscribe(token);
    f.tracker.set_healthy(f.net_down);
    assert_eq!(event_count(&events), 1, "no delivery after unsubscribe");
}

#[test]
fn reentrant_subscriber_does_not_deadlock() {
    let f = fixture();
    let tracker = Arc::clone(&f.tracker);
    let login = f.login;
    f.tracker.subscribe(Box::new(move |snapshot| {
        // React to the network going down by raising a second warning from
        // inside the callback. Must neither deadlock nor be lost.
        let net_down_visible = snapshot.warnings.iter().any(|w| w.code == "net-down");
        let login_active = tracker.is_unhealthy(login);
        if net_down_visible && !login_active {
            tracker.set_unhealthy(login, Args::new());
        }
    }));

    f.tracker.set_unhealthy(f.net_down, Args::new());

    let codes: Vec<String> = f.tracker.warnings().into_iter().map(|w| w.code).collect();
    assert_eq!(codes, vec!["net-down", "login"]);
}

#[test]
fn concurrent_producers_settle_to_a_consistent_state() {
    let f = fixture();
    let handles = [f.net_down, f.no_relay, f.login];

    let mut workers = Vec::new();
    for handle in handles {
        let tracker = Arc::clone(&f.tracker);
        workers.push(std::thread::spawn(move || {
            for _ in 0..200 {
                tracker.set_unhealthy(handle, Args::new());
                tracker.set_healthy(handle);
            }
        }));
    }
    for worker in workers {
        worker.join().expect("producer thread should not panic");
    }

    assert!(f.tracker.snapshot().is_empty());
    assert!(f.tracker.warnings().is_empty());
    assert_eq!(f.tracker.overall_severity(), None);
}

#[test]
fn snapshot_serializes_for_status_consumers() {
    let f = fixture();
    f.tracker.set_unhealthy(f.net_down, Args::new());
    let json =
        serde_json::to_string(&f.tracker.current()).expect("snapshot should serialize to JSON");
    assert!(json.contains("\"net-down\""));
    assert!(json.contains("\"high\""));
}

#[tokio::test]
async fn watch_bridge_delivers_changes() {
    let f = fixture();
    let mut rx = f.tracker.watch_handle();
    assert!(rx.borrow().warnings.is_empty());

    f.tracker.set_unhealthy(f.net_down, Args::new());
    assert!(rx.has_changed().expect("watch channel should be open"));
    {
        let snapshot = rx.borrow_and_update();
        let codes: Vec<&str> = snapshot.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["net-down"]);
        assert!(snapshot.overall.connectivity_impacted);
    }

    f.tracker.set_healthy(f.net_down);
    rx.changed().await.expect("watch channel should be open");
    assert!(rx.borrow().warnings.is_empty());
}
