//! Integration Tests for the Reactive System
//!
//! These tests verify that reactive containers, effects, computed values and
//! watchers work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::graph::{clear_flush_requester, flush_jobs, next_tick, set_flush_requester};
use trellis_core::reactive::{
    computed, effect, effect_with, reactive, readonly, shallow_reactive, to_ref, untracked, watch,
    EffectOptions, Flush, Target, Value, WatchOptions, WatchSource,
};

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let c = Rc::new(Cell::new(0));
    (c.clone(), c)
}

/// Test that an effect re-runs when a key it read is written.
#[test]
fn effect_tracks_read_keys() {
    let state = reactive(Target::object_from([("a", 1), ("b", 2)]));
    let (runs, r) = counter();
    let s = state.clone();
    let _e = effect(move || {
        r.set(r.get() + 1);
        s.get("a")
    });

    assert_eq!(runs.get(), 1);

    state.set("a", 10);
    assert_eq!(runs.get(), 2);

    // Unread key
    state.set("b", 20);
    assert_eq!(runs.get(), 2);

    // Same value
    state.set("a", 10);
    assert_eq!(runs.get(), 2);
}

/// Test that stale branches stop triggering after a re-run.
#[test]
fn branch_switching_drops_old_dependencies() {
    let state = reactive(Target::object_from([
        ("ok", Value::Bool(true)),
        ("text", Value::from("hello")),
    ]));
    let (runs, r) = counter();
    let s = state.clone();
    let _e = effect(move || {
        r.set(r.get() + 1);
        if s.get("ok").truthy() {
            s.get("text")
        } else {
            Value::from("off")
        }
    });

    state.set("ok", false);
    assert_eq!(runs.get(), 2);

    state.set("text", "ignored");
    assert_eq!(runs.get(), 2);
}

/// Test that an effect writing what it reads does not loop.
#[test]
fn self_mutation_terminates() {
    let state = reactive(Target::object_from([("n", 0)]));
    let s = state.clone();
    let _e = effect(move || {
        let n = s.get("n").as_i64().unwrap_or(0);
        s.set("n", n + 1);
    });

    assert_eq!(state.get("n"), Value::from(1));

    state.set("n", 5);
    assert_eq!(state.get("n"), Value::from(6));
}

/// Test that nested reactive objects are tracked through the parent.
#[test]
fn nested_objects_are_reactive() {
    let state = reactive(
        Target::from_json(serde_json::json!({ "user": { "name": "ada" } })).unwrap(),
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sn = seen.clone();
    let s = state.clone();
    let _e = effect(move || {
        if let Value::Proxy(user) = s.get("user") {
            sn.borrow_mut().push(user.get("name"));
        }
    });

    if let Value::Proxy(user) = state.get("user") {
        user.set("name", "grace");
    }
    assert_eq!(*seen.borrow(), vec![Value::from("ada"), Value::from("grace")]);
}

/// Test that shallow wrappers do not track nested writes.
#[test]
fn shallow_reactive_ignores_nested_changes() {
    let state = shallow_reactive(
        Target::from_json(serde_json::json!({ "inner": { "x": 1 } })).unwrap(),
    );
    let (runs, r) = counter();
    let s = state.clone();
    let _e = effect(move || {
        r.set(r.get() + 1);
        if let Some(inner) = s.get("inner").target() {
            let _ = inner.borrow().len();
        }
    });

    let inner = reactive(state.get("inner").target().unwrap());
    inner.set("x", 2);
    assert_eq!(runs.get(), 1);
}

/// Test that readonly wrappers reject writes and leave the target unchanged.
#[test]
fn readonly_rejects_writes() {
    let target = Target::object_from([("x", 1)]);
    let view = readonly(target.clone());
    view.set("x", 2);
    view.delete("x");
    assert_eq!(reactive(target).get("x"), Value::from(1));
}

/// Test that a computed caches its value until an input changes.
#[test]
fn computed_is_memoized() {
    let state = reactive(Target::object_from([("n", 2)]));
    let (evals, e) = counter();
    let s = state.clone();
    let doubled = computed(move || {
        e.set(e.get() + 1);
        s.get("n").as_i64().unwrap_or(0) * 2
    });

    assert_eq!(evals.get(), 0);
    assert_eq!(doubled.get(), 4);
    assert_eq!(doubled.get(), 4);
    assert_eq!(evals.get(), 1);

    state.set("n", 3);
    state.set("n", 4);
    assert_eq!(evals.get(), 1);
    assert_eq!(doubled.get(), 8);
    assert_eq!(evals.get(), 2);
}

/// Test that effects reading a computed re-run when its inputs change.
#[test]
fn computed_chains_into_effects() {
    let state = reactive(Target::object_from([("n", 1)]));
    let s = state.clone();
    let plus_one = computed(move || s.get("n").as_i64().unwrap_or(0) + 1);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sn = seen.clone();
    let _e = effect(move || sn.borrow_mut().push(plus_one.get()));

    state.set("n", 5);
    assert_eq!(*seen.borrow(), vec![2, 6]);
}

/// Test that array mutators notify length and index readers.
#[test]
fn array_mutations_trigger_readers() {
    let list = reactive(Target::array_from([1, 2, 3]));
    let lengths = Rc::new(RefCell::new(Vec::new()));
    let ln = lengths.clone();
    let l = list.clone();
    let _e = effect(move || ln.borrow_mut().push(l.len()));

    list.push(4);
    list.pop();
    list.splice(0, 1, [9, 8]);
    list.set("length", 1);

    assert_eq!(*lengths.borrow(), vec![3, 4, 3, 4, 1]);
    assert_eq!(list.get(0), Value::from(9));
}

/// Test that key iteration over a map ignores value updates.
#[test]
fn map_key_iteration_ignores_value_updates() {
    let map = reactive(Target::map_from([("a", 1)]));
    let (key_runs, kr) = counter();
    let (value_runs, vr) = counter();

    let m = map.clone();
    let _keys = effect(move || {
        kr.set(kr.get() + 1);
        m.keys().len()
    });
    let m = map.clone();
    let _values = effect(move || {
        vr.set(vr.get() + 1);
        m.values().len()
    });

    map.set("a", 2);
    assert_eq!((key_runs.get(), value_runs.get()), (1, 2));

    map.set("b", 3);
    assert_eq!((key_runs.get(), value_runs.get()), (2, 3));

    map.delete("a");
    assert_eq!((key_runs.get(), value_runs.get()), (3, 4));
}

/// Test that an outer effect re-runs when a nested effect writes what it read.
#[test]
fn outer_effect_sees_write_from_nested_effect() {
    let state = reactive(Target::object_from([("x", 0), ("y", 0)]));

    let s = state.clone();
    let _mirror = effect(move || {
        let y = s.get("y");
        s.set("x", y);
    });

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sn = seen.clone();
    let s = state.clone();
    let _writer = effect(move || {
        sn.borrow_mut().push(s.get("x"));
        s.set("y", 1);
    });

    assert_eq!(state.get("x"), Value::from(1));
    assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(1)]);
}

/// Test that inner effects created during an outer run track independently.
#[test]
fn nested_effects_track_their_own_reads() {
    let state = reactive(Target::object_from([("outer", 0), ("inner", 0)]));
    let (outer_runs, o) = counter();
    let (inner_runs, i) = counter();
    let inner_handle = Rc::new(RefCell::new(None));

    let s = state.clone();
    let slot = inner_handle.clone();
    let _outer = effect(move || {
        o.set(o.get() + 1);
        let _ = s.get("outer");
        let s2 = s.clone();
        let i2 = i.clone();
        let inner = effect(move || {
            i2.set(i2.get() + 1);
            s2.get("inner")
        });
        if let Some(previous) = slot.borrow_mut().replace(inner) {
            previous.dispose();
        }
    });

    state.set("inner", 1);
    assert_eq!((outer_runs.get(), inner_runs.get()), (1, 2));

    state.set("outer", 1);
    assert_eq!((outer_runs.get(), inner_runs.get()), (2, 3));
}

/// Test that untracked reads do not subscribe.
#[test]
fn untracked_reads_do_not_subscribe() {
    let state = reactive(Target::object_from([("x", 1)]));
    let (runs, r) = counter();
    let s = state.clone();
    let _e = effect(move || {
        r.set(r.get() + 1);
        untracked(|| s.get("x"))
    });

    state.set("x", 2);
    assert_eq!(runs.get(), 1);
}

/// Test that a scheduler replaces the synchronous re-run.
#[test]
fn scheduler_defers_rerun() {
    let state = reactive(Target::object_from([("x", 1)]));
    let (runs, r) = counter();
    let (scheduled, sc) = counter();
    let s = state.clone();
    let e = effect_with(
        move || {
            r.set(r.get() + 1);
            s.get("x")
        },
        EffectOptions::default().with_scheduler(move |_| sc.set(sc.get() + 1)),
    );

    state.set("x", 2);
    assert_eq!((runs.get(), scheduled.get()), (1, 1));

    e.run();
    assert_eq!(runs.get(), 2);
}

/// Test that post-flush watchers batch writes into one callback.
#[test]
fn post_flush_watch_batches() {
    let state = reactive(Target::object_from([("n", 0)]));
    let calls = Rc::new(RefCell::new(Vec::new()));
    let c = calls.clone();
    let s = state.clone();
    let handle = watch(
        WatchSource::getter(move || s.get("n")),
        move |old, new, _| c.borrow_mut().push((old.clone(), new.clone())),
        WatchOptions::default().flush(Flush::Post),
    );

    state.set("n", 1);
    state.set("n", 2);
    state.set("n", 3);
    assert!(calls.borrow().is_empty());

    flush_jobs();
    assert_eq!(*calls.borrow(), vec![(Value::from(0), Value::from(3))]);

    handle.stop();
    state.set("n", 4);
    flush_jobs();
    assert_eq!(calls.borrow().len(), 1);
}

/// Test that deep watchers see nested writes.
#[test]
fn deep_watch_sees_nested_writes() {
    let state = reactive(
        Target::from_json(serde_json::json!({ "a": { "b": { "c": 1 } } })).unwrap(),
    );
    let (calls, c) = counter();
    let _h = watch(&state, move |_, _, _| c.set(c.get() + 1), WatchOptions::default());

    if let Value::Proxy(a) = state.get("a") {
        if let Value::Proxy(b) = a.get("b") {
            b.set("c", 2);
        }
    }
    assert_eq!(calls.get(), 1);
}

/// Test that refs to a key read and write through the source.
#[test]
fn to_ref_links_to_source() {
    let state = reactive(Target::object_from([("x", 1)]));
    let x = to_ref(&state, "x");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sn = seen.clone();
    let _h = watch(
        x.clone(),
        move |_, new, _| sn.borrow_mut().push(new.clone()),
        WatchOptions::default(),
    );

    x.set_value(2);
    state.set("x", 3);
    assert_eq!(*seen.borrow(), vec![Value::from(2), Value::from(3)]);
}

/// Test that a flush requester on a tokio LocalSet runs queued jobs.
#[tokio::test]
async fn flush_requester_runs_on_local_set() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            set_flush_requester(|| {
                tokio::task::spawn_local(async {
                    flush_jobs();
                });
            });

            let state = reactive(Target::object_from([("n", 0)]));
            let (calls, c) = counter();
            let s = state.clone();
            let _h = watch(
                WatchSource::getter(move || s.get("n")),
                move |_, _, _| c.set(c.get() + 1),
                WatchOptions::default().flush(Flush::Post),
            );

            state.set("n", 1);
            state.set("n", 2);
            assert_eq!(calls.get(), 0);

            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            assert_eq!(calls.get(), 1);

            clear_flush_requester();
        })
        .await;
}

/// Test that awaiting the next tick flushes pending jobs.
#[tokio::test]
async fn next_tick_flushes() {
    let state = reactive(Target::object_from([("n", 0)]));
    let last = Rc::new(RefCell::new(Value::Undefined));
    let l = last.clone();
    let s = state.clone();
    let _h = watch(
        WatchSource::getter(move || s.get("n")),
        move |_, new, _| *l.borrow_mut() = new.clone(),
        WatchOptions::default().flush(Flush::Post),
    );

    state.set("n", 7);
    next_tick().await;
    assert_eq!(*last.borrow(), Value::from(7));
}
