//! Map and Set Accessors
//!
//! Keyed reads and writes on maps and sets go through the generic accessors
//! on [`Reactive`] with [`Key::Entry`] keys. This module adds the
//! collection-only operations.

use super::proxy::Reactive;
use super::value::{Container, ContainerKind, Value};
use crate::graph::{Key, TriggerOp};

impl Reactive {
    /// Insert a member into a set. Returns `false` if it was already present.
    ///
    /// On a readonly set the insert is skipped and reported as done.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        if self.kind() != ContainerKind::Set {
            self.unsupported("add");
            return false;
        }
        if self.reject_readonly("add") {
            return true;
        }

        let value = value.into().to_raw();
        let inserted = match &mut *self.raw().borrow_mut() {
            Container::Set(set) => set.insert(value.clone()),
            _ => false,
        };
        if inserted {
            self.trigger(Key::Entry(value), TriggerOp::Add, None);
        }
        inserted
    }

    /// Remove every entry of a map or set.
    pub fn clear(&self) {
        if !matches!(self.kind(), ContainerKind::Map | ContainerKind::Set) {
            self.unsupported("clear");
            return;
        }
        if self.reject_readonly("clear") {
            return;
        }

        let had_entries = {
            let target = self.raw();
            let mut data = target.borrow_mut();
            let had = !data.is_empty();
            match &mut *data {
                Container::Map(map) => map.clear(),
                Container::Set(set) => set.clear(),
                _ => {}
            }
            had
        };
        if had_entries {
            self.trigger(Key::Iterate, TriggerOp::Clear, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::reactive::effect::effect;
    use crate::reactive::proxy::{reactive, readonly};
    use crate::reactive::value::{Target, Value};
    use std::cell::Cell;
    use std::rc::Rc;

    fn count_runs(f: impl Fn() + 'static) -> Rc<Cell<i32>> {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let _e = effect(move || {
            r.set(r.get() + 1);
            f();
        });
        runs
    }

    #[test]
    fn map_keys_ignore_value_changes() {
        let map = reactive(Target::map_from([("a", 1)]));
        let m = map.clone();
        let runs = count_runs(move || {
            m.keys();
        });

        map.set("a", 2);
        assert_eq!(runs.get(), 1);

        map.set("b", 3);
        assert_eq!(runs.get(), 2);

        map.delete("a");
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn map_values_see_value_changes() {
        let map = reactive(Target::map_from([("a", 1)]));
        let m = map.clone();
        let runs = count_runs(move || {
            m.values();
        });

        map.set("a", 2);
        assert_eq!(runs.get(), 2);

        // Same value again is not a change.
        map.set("a", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn map_get_tracks_single_entry() {
        let map = reactive(Target::map());
        let m = map.clone();
        let runs = count_runs(move || {
            m.get("x");
        });

        map.set("y", 1);
        assert_eq!(runs.get(), 1);
        map.set("x", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn map_keys_accept_containers() {
        let key = Target::object();
        let map = reactive(Target::map());
        map.set(key.clone(), "v");
        assert_eq!(map.get(reactive(&key)), Value::from("v"));
        assert!(map.has(key));
    }

    #[test]
    fn set_membership_and_size() {
        let set = reactive(Target::set());
        let s1 = set.clone();
        let has_runs = count_runs(move || {
            s1.has(1);
        });
        let s2 = set.clone();
        let size_runs = count_runs(move || {
            s2.len();
        });

        assert!(set.add(1));
        assert!(!set.add(1));
        assert_eq!(has_runs.get(), 2);
        assert_eq!(size_runs.get(), 2);

        set.add(2);
        assert_eq!(has_runs.get(), 2);
        assert_eq!(size_runs.get(), 3);
    }

    #[test]
    fn readonly_sets_skip_writes_but_report_success() {
        let target = Target::set_from([1]);
        let ro = readonly(&target);

        assert!(ro.add(2));
        ro.clear();
        assert_eq!(ro.len(), 1);
        assert!(!reactive(&target).has(2));
    }

    #[test]
    fn clear_fires_every_dependency_once() {
        let map = reactive(Target::map_from([("a", 1), ("b", 2)]));
        let m = map.clone();
        let runs = count_runs(move || {
            m.get("a");
            m.get("b");
            m.len();
        });

        map.clear();
        assert_eq!(runs.get(), 2);
        assert!(map.is_empty());

        map.clear();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn for_each_visits_value_then_key() {
        let map = reactive(Target::map_from([("k", "v")]));
        let mut seen = Vec::new();
        map.for_each(|v, k| seen.push(format!("{k}={v}")));
        assert_eq!(seen, vec!["k=v".to_string()]);
    }
}
