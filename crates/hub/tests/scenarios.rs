use hub::{EntryKind, Error, Hub, Kind, TreeChange, Value};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

/// A fixed epoch base keeps test timestamps away from the zero
/// sentinel and the relative/absolute start-time split.
const T0: f64 = 1_600_000_000.0;

fn numeric_sink(
    hub: &mut Hub,
    path: &str,
) -> Rc<RefCell<Vec<(f64, f64)>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    hub.add_numeric_push_handler(None, path, move |ts, v| {
        sink.borrow_mut().push((ts, v));
    })
    .unwrap();
    seen
}

#[test]
fn handler_added_after_push_receives_current_value_once() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/s/value", Kind::Numeric, "")
        .unwrap();
    hub.push_numeric(None, "/app/s/value", 10.0, 1.5).unwrap();

    let seen = numeric_sink(&mut hub, "/app/s/value");
    assert_eq!(*seen.borrow(), vec![(10.0, 1.5)]);

    hub.push_numeric(None, "/app/s/value", 11.0, 2.5).unwrap();
    assert_eq!(*seen.borrow(), vec![(10.0, 1.5), (11.0, 2.5)]);
}

#[test]
fn observation_min_period_throttles_routed_samples() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/s/value", Kind::Numeric, "")
        .unwrap();
    hub.create_obs("trend").unwrap();
    hub.set_min_period("trend", 1.0).unwrap();
    hub.set_source("/obs/trend", Some("/app/s/value")).unwrap();

    let seen = numeric_sink(&mut hub, "/obs/trend");
    for (offset, v) in [(0.0, 1.0), (0.5, 2.0), (1.0, 3.0), (1.6, 4.0), (2.5, 5.0)] {
        hub.push_numeric(None, "/app/s/value", T0 + offset, v)
            .unwrap();
    }

    let accepted: Vec<f64> = seen.borrow().iter().map(|(_, v)| *v).collect();
    assert_eq!(accepted, vec![1.0, 3.0, 5.0]);
}

#[test]
fn routed_samples_coerce_to_the_output_kind() {
    let mut hub = Hub::new();
    hub.create_input(None, "/a", Kind::Boolean, "").unwrap();
    hub.create_output(None, "/b", Kind::Numeric, "").unwrap();
    hub.set_source("/b", Some("/a")).unwrap();

    hub.push_boolean(None, "/a", 10.0, true).unwrap();
    assert_eq!(hub.get_numeric(None, "/b").unwrap(), (10.0, 1.0));
    assert_eq!(hub.get_data_type(None, "/b").unwrap(), Kind::Numeric);
}

#[test]
fn routing_cycles_are_rejected() {
    let mut hub = Hub::new();
    hub.create_obs("x").unwrap();
    hub.create_obs("y").unwrap();

    hub.set_source("/obs/x", Some("/obs/y")).unwrap();
    assert_eq!(
        hub.set_source("/obs/y", Some("/obs/x")),
        Err(Error::CycleDetected)
    );

    // Longer cycles are caught too, through placeholders created by
    // the routing call itself.
    hub.set_source("/route/b", Some("/route/a")).unwrap();
    hub.set_source("/route/c", Some("/route/b")).unwrap();
    assert_eq!(
        hub.set_source("/route/a", Some("/route/c")),
        Err(Error::CycleDetected)
    );
    assert_eq!(
        hub.set_source("/route/a", Some("/route/a")),
        Err(Error::CycleDetected)
    );
}

#[test]
fn json_extraction_retypes_the_observation() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/s/env", Kind::Json, "").unwrap();
    hub.create_obs("temp").unwrap();
    hub.set_json_extraction("temp", "t.h").unwrap();
    hub.set_source("/obs/temp", Some("/app/s/env")).unwrap();

    hub.push_json(None, "/app/s/env", T0, r#"{"t":{"h":77,"p":1013}}"#)
        .unwrap();

    assert_eq!(hub.get_numeric(None, "/obs/temp").unwrap(), (T0, 77.0));
    assert_eq!(hub.get_data_type(None, "/obs/temp").unwrap(), Kind::Numeric);

    // Documents without the extracted location are dropped.
    hub.push_json(None, "/app/s/env", T0 + 1.0, r#"{"other":1}"#)
        .unwrap();
    assert_eq!(hub.get_numeric(None, "/obs/temp").unwrap(), (T0, 77.0));
}

#[test]
fn update_window_holds_pushes_and_replays_the_last() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/s/value", Kind::Numeric, "")
        .unwrap();
    hub.create_obs("x").unwrap();
    hub.set_source("/obs/x", Some("/app/s/value")).unwrap();
    let seen = numeric_sink(&mut hub, "/obs/x");

    hub.start_update();
    assert!(hub.update_in_progress());
    hub.set_min_period("x", 10.0).unwrap();

    for i in 0..5 {
        hub.push_numeric(None, "/app/s/value", T0 + i as f64, i as f64)
            .unwrap();
    }
    assert!(seen.borrow().is_empty());

    hub.end_update();
    assert!(!hub.update_in_progress());
    assert_eq!(*seen.borrow(), vec![(T0 + 4.0, 4.0)]);
}

#[test]
fn update_start_end_handlers_observe_the_window() {
    let mut hub = Hub::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    hub.add_update_start_end_handler(move |starting| sink.borrow_mut().push(starting));

    hub.start_update();
    hub.end_update();
    assert_eq!(*seen.borrow(), vec![true, false]);
}

#[test]
fn overrides_replace_pushed_values() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/o/v", Kind::Numeric, "").unwrap();
    hub.push_numeric(None, "/app/o/v", T0, 1.0).unwrap();

    hub.set_override("/app/o/v", Value::Numeric(9.0)).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/o/v").unwrap().1, 9.0);

    // The override wins over pushes, re-stamped with their timestamp.
    hub.push_numeric(None, "/app/o/v", T0 + 1.0, 2.0).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/o/v").unwrap(), (T0 + 1.0, 9.0));

    hub.remove_override("/app/o/v").unwrap();
    hub.push_numeric(None, "/app/o/v", T0 + 2.0, 3.0).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/o/v").unwrap(), (T0 + 2.0, 3.0));

    // A type-mismatched override on a fixed-type I/O is a protocol
    // violation.
    let err = hub
        .set_override("/app/o/v", Value::Boolean(true))
        .unwrap_err();
    assert_eq!(err, Error::FormatMismatch);
    assert!(err.kills_session());
}

#[test]
fn defaults_win_until_something_is_pushed() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/d/v", Kind::Numeric, "").unwrap();
    hub.set_numeric_default(None, "/app/d/v", 7.0).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/d/v").unwrap().1, 7.0);

    hub.push_numeric(None, "/app/d/v", T0, 1.0).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/d/v").unwrap(), (T0, 1.0));

    // Changing a no-longer-winning default leaves the current value.
    hub.set_numeric_default(None, "/app/d/v", 8.0).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/d/v").unwrap(), (T0, 1.0));
}

#[test]
fn unit_mismatches_stop_delivery() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/u/in", Kind::Numeric, "degC")
        .unwrap();
    hub.create_output(None, "/app/u/out", Kind::Numeric, "psi")
        .unwrap();
    hub.set_source("/app/u/out", Some("/app/u/in")).unwrap();

    hub.push_numeric(None, "/app/u/in", T0, 21.5).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/u/in").unwrap(), (T0, 21.5));
    assert_eq!(hub.get_numeric(None, "/app/u/out"), Err(Error::Unavailable));
}

#[test]
fn flexible_resources_mirror_source_units() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/u/in", Kind::Numeric, "degC")
        .unwrap();
    hub.create_obs("mirror").unwrap();
    hub.set_source("/obs/mirror", Some("/app/u/in")).unwrap();

    hub.push_numeric(None, "/app/u/in", T0, 20.0).unwrap();
    assert_eq!(hub.get_units(None, "/obs/mirror").unwrap(), "degC");

    // Detaching clears mirrored units.
    hub.set_source("/obs/mirror", None).unwrap();
    assert_eq!(hub.get_units(None, "/obs/mirror").unwrap(), "");
}

#[test]
fn creation_conflicts_follow_the_promotion_rules() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/a/x", Kind::Numeric, "psi")
        .unwrap();

    // Identical re-creation is idempotent; anything else conflicts.
    assert_eq!(
        hub.create_input(None, "/app/a/x", Kind::Numeric, "psi"),
        Ok(())
    );
    assert_eq!(
        hub.create_input(None, "/app/a/x", Kind::Boolean, "psi"),
        Err(Error::Duplicate)
    );
    assert_eq!(
        hub.create_input(None, "/app/a/x", Kind::Numeric, "bar"),
        Err(Error::Duplicate)
    );
    assert_eq!(
        hub.create_output(None, "/app/a/x", Kind::Numeric, "psi"),
        Err(Error::Duplicate)
    );
    assert_eq!(hub.create_obs("/app/a/x"), Err(Error::Duplicate));

    // Observations are idempotent and exclude I/O.
    hub.create_obs("o").unwrap();
    assert_eq!(hub.create_obs("o"), Ok(()));
    assert_eq!(
        hub.create_input(None, "/obs/o", Kind::Numeric, ""),
        Err(Error::BadParameter)
    );
}

#[test]
fn placeholders_carry_admin_settings_into_promotion() {
    let mut hub = Hub::new();

    // Admin routes and defaults may precede creation.
    hub.set_source("/app/p/out", Some("/app/p/in")).unwrap();
    hub.set_default("/app/p/out", Value::Numeric(4.0)).unwrap();
    assert_eq!(
        hub.entry_kind(None, "/app/p/out").unwrap(),
        EntryKind::Placeholder
    );

    hub.create_output(None, "/app/p/out", Kind::Numeric, "")
        .unwrap();
    hub.create_input(None, "/app/p/in", Kind::Numeric, "").unwrap();
    assert_eq!(hub.entry_kind(None, "/app/p/out").unwrap(), EntryKind::Output);

    // The carried default applied at promotion; the carried route
    // delivers pushes end to end.
    assert_eq!(hub.get_numeric(None, "/app/p/out").unwrap().1, 4.0);
    hub.push_numeric(None, "/app/p/in", T0, 2.5).unwrap();
    assert_eq!(hub.get_numeric(None, "/app/p/out").unwrap(), (T0, 2.5));
}

#[test]
fn deleting_io_with_settings_leaves_a_placeholder() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/del/plain", Kind::Numeric, "")
        .unwrap();
    hub.create_input(None, "/app/del/routed", Kind::Numeric, "")
        .unwrap();
    hub.create_obs("sink").unwrap();
    hub.set_source("/obs/sink", Some("/app/del/routed")).unwrap();

    hub.delete_resource(None, "/app/del/plain").unwrap();
    assert_eq!(hub.entry_kind(None, "/app/del/plain"), Err(Error::NotFound));

    hub.delete_resource(None, "/app/del/routed").unwrap();
    assert_eq!(
        hub.entry_kind(None, "/app/del/routed").unwrap(),
        EntryKind::Placeholder
    );

    // The route still works through the placeholder.
    hub.push_numeric(None, "/app/del/routed", T0, 1.0).unwrap();
    assert_eq!(hub.get_numeric(None, "/obs/sink").unwrap(), (T0, 1.0));
}

#[test]
fn session_close_cleans_the_app_namespace() {
    let mut hub = Hub::new();
    let session = hub.open_session("sensor").unwrap();
    hub.create_input(Some(session), "temperature", Kind::Numeric, "degC")
        .unwrap();
    hub.create_input(Some(session), "kept", Kind::Numeric, "")
        .unwrap();
    hub.set_default("/app/sensor/kept", Value::Numeric(7.0))
        .unwrap();

    assert_eq!(
        hub.get_units(Some(session), "temperature").unwrap(),
        "degC"
    );

    hub.close_session(session).unwrap();
    assert_eq!(
        hub.entry_kind(None, "/app/sensor/temperature"),
        Err(Error::NotFound)
    );
    assert_eq!(
        hub.entry_kind(None, "/app/sensor/kept").unwrap(),
        EntryKind::Placeholder
    );
    assert_eq!(hub.get_numeric(None, "/app/sensor/kept").unwrap().1, 7.0);
}

#[test]
fn tree_changes_are_reported() {
    let mut hub = Hub::new();
    let events: Rc<RefCell<Vec<(String, EntryKind, TreeChange)>>> =
        Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    hub.add_resource_tree_change_handler(move |path, kind, change| {
        sink.borrow_mut().push((path.to_string(), kind, change));
    });

    hub.create_input(None, "/app/n/in", Kind::Numeric, "").unwrap();
    hub.create_obs("o").unwrap();
    hub.set_source("/obs/o", Some("/app/n/in")).unwrap();
    hub.delete_resource(None, "/app/n/in").unwrap();
    hub.delete_obs("o").unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            ("/app/n/in".to_string(), EntryKind::Input, TreeChange::Added),
            ("/obs/o".to_string(), EntryKind::Observation, TreeChange::Added),
            // Demotion to placeholder still reports a removal.
            ("/app/n/in".to_string(), EntryKind::Input, TreeChange::Removed),
            (
                "/obs/o".to_string(),
                EntryKind::Observation,
                TreeChange::Removed
            ),
        ]
    );
}

#[test]
fn observation_statistics_aggregate_the_buffer() {
    let mut hub = Hub::new();
    hub.create_obs("stats").unwrap();
    hub.set_buffer_max_count("stats", 10).unwrap();

    for (offset, v) in [(1.0, 5.0), (2.0, 1.0), (3.0, 9.0)] {
        hub.push("/obs/stats", T0 + offset, Value::Numeric(v))
            .unwrap();
    }

    assert_eq!(hub.get_min("stats", T0).unwrap(), 1.0);
    assert_eq!(hub.get_max("stats", T0).unwrap(), 9.0);
    assert_eq!(hub.get_mean("stats", T0).unwrap(), 5.0);
    let sd = hub.get_std_dev("stats", T0).unwrap();
    assert!((sd - (32.0f64 / 3.0).sqrt()).abs() < 1e-12);

    // Start times restrict the window; an empty window is NaN.
    assert_eq!(hub.get_mean("stats", T0 + 1.0).unwrap(), 5.0);
    assert!(hub.get_mean("stats", T0 + 3.0).unwrap().is_nan());

    assert_eq!(hub.get_mean("missing", T0), Err(Error::NotFound));
}

#[test]
fn read_buffer_json_emits_the_wire_format() {
    let mut hub = Hub::new();
    hub.create_obs("buf").unwrap();
    hub.set_buffer_max_count("buf", 10).unwrap();

    hub.push("/obs/buf", T0 + 0.5, Value::Numeric(1.5)).unwrap();
    hub.push("/obs/buf", T0 + 1.0, Value::Trigger).unwrap();
    hub.push("/obs/buf", T0 + 2.0, Value::String("dim".into()))
        .unwrap();

    let mut out = Vec::new();
    let completed = Rc::new(RefCell::new(None));
    let sink = completed.clone();
    hub.read_buffer_json("buf", T0, &mut out, |result| {
        *sink.borrow_mut() = Some(result);
    })
    .unwrap();

    assert_eq!(*completed.borrow(), Some(Ok(())));
    insta::assert_snapshot!(
        String::from_utf8(out).unwrap(),
        @r#"[{"t":1600000000.500,"v":1.500000},{"t":1600000001.000},{"t":1600000002.000,"v":"dim"}]"#
    );
}

#[test]
fn buffer_backups_restore_across_recreation() {
    let mut hub = Hub::new();
    hub.create_obs("backed").unwrap();
    hub.set_buffer_max_count("backed", 10).unwrap();
    hub.set_buffer_backup_period("backed", 0.5).unwrap();

    // The first buffered push is immediately due for backup.
    hub.push("/obs/backed", T0 + 1.0, Value::Numeric(4.0)).unwrap();

    hub.delete_obs("backed").unwrap();
    hub.create_obs("backed").unwrap();
    assert_eq!(hub.get_mean("backed", T0).unwrap(), 4.0);

    // Once the observation is gone and an update window closes, the
    // stale backup is collected.
    hub.delete_obs("backed").unwrap();
    hub.start_update();
    hub.end_update();
    hub.create_obs("backed").unwrap();
    assert!(hub.get_mean("backed", T0).unwrap().is_nan());
}

#[test]
fn typed_getters_enforce_kinds_and_availability() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/g/n", Kind::Numeric, "").unwrap();

    assert_eq!(hub.get_numeric(None, "/app/g/n"), Err(Error::Unavailable));
    assert_eq!(hub.get_numeric(None, "/app/g/missing"), Err(Error::NotFound));
    assert_eq!(hub.get_numeric(None, "/app"), Err(Error::Unsupported));
    assert_eq!(hub.get_numeric(None, "relative"), Err(Error::BadParameter));

    hub.push_numeric(None, "/app/g/n", T0, 1.5).unwrap();
    assert_eq!(hub.get_boolean(None, "/app/g/n"), Err(Error::FormatMismatch));
    assert_eq!(
        hub.get_json(None, "/app/g/n").unwrap(),
        (T0, "1.500000".to_string())
    );

    assert_eq!(
        hub.push_json(None, "/app/g/n", T0, "{not json"),
        Err(Error::FormatMismatch)
    );
}

#[test]
fn json_examples_snapshot_the_first_document() {
    let mut hub = Hub::new();
    hub.create_input(None, "/app/j/env", Kind::Json, "").unwrap();
    assert_eq!(
        hub.get_json_example(None, "/app/j/env"),
        Err(Error::Unavailable)
    );

    hub.push_json(None, "/app/j/env", T0, r#"{"a":1}"#).unwrap();
    hub.push_json(None, "/app/j/env", T0 + 1.0, r#"{"a":2}"#)
        .unwrap();
    assert_eq!(
        hub.get_json_example(None, "/app/j/env").unwrap(),
        r#"{"a":1}"#
    );
}
