//! WeakRegistry 单元测试

use crate::runtime::weak::WeakRegistry;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_lookup_live_value() {
    let mut registry = WeakRegistry::new();
    let value = Rc::new(42);
    registry.insert("a", &value);

    assert_eq!(registry.lookup(&"a").as_deref(), Some(&42));
    assert!(registry.contains_live(&"a"));
    assert_eq!(registry.len_live(), 1);
}

#[test]
fn test_entry_vanishes_after_last_owner_drops() {
    let mut registry = WeakRegistry::new();
    let value = Rc::new(String::from("task"));
    registry.insert(7u32, &value);

    drop(value);

    assert!(registry.lookup(&7).is_none());
    assert!(!registry.contains_live(&7));
    assert_eq!(registry.len_live(), 0);
    assert!(registry.is_empty());
    // The slot lingers until purged
    assert_eq!(registry.slots(), 1);
    assert_eq!(registry.purge(), 1);
    assert_eq!(registry.slots(), 0);
}

#[test]
fn test_registry_does_not_keep_value_alive() {
    struct DropFlag<'a>(&'a Cell<bool>);
    impl Drop for DropFlag<'_> {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    let dropped = Cell::new(false);
    let mut registry = WeakRegistry::new();
    {
        let value = Rc::new(DropFlag(&dropped));
        registry.insert(1, &value);
        assert!(!dropped.get());
    }
    assert!(dropped.get());
    assert!(registry.lookup(&1).is_none());
}

#[test]
fn test_remove_returns_live_value() {
    let mut registry = WeakRegistry::new();
    let value = Rc::new(3);
    registry.insert(1, &value);

    assert_eq!(registry.remove(&1).as_deref(), Some(&3));
    assert!(registry.lookup(&1).is_none());
    assert!(registry.remove(&1).is_none());
}

#[test]
fn test_for_each_skips_dead_entries() {
    let mut registry = WeakRegistry::new();
    let kept = Rc::new(1);
    let dropped = Rc::new(2);
    registry.insert("kept", &kept);
    registry.insert("dropped", &dropped);
    drop(dropped);

    let mut seen = Vec::new();
    registry.for_each(|key, value| seen.push((*key, *value)));
    assert_eq!(seen, vec![("kept", 1)]);

    let keys: Vec<_> = registry.iter().map(|(key, _)| *key).collect();
    assert_eq!(keys, vec!["kept"]);
}

#[test]
fn test_reinsert_after_value_died() {
    let mut registry = WeakRegistry::new();
    let first = Rc::new(1);
    registry.insert(9, &first);
    drop(first);

    // The key is free again once its value is gone
    let second = Rc::new(2);
    registry.insert(9, &second);
    assert_eq!(registry.lookup(&9).as_deref(), Some(&2));
    assert_eq!(registry.slots(), 1);
}

#[test]
fn test_debug_reports_counts() {
    let mut registry = WeakRegistry::new();
    let value = Rc::new(());
    registry.insert(1, &value);
    let debug = format!("{:?}", registry);
    assert!(debug.contains("WeakRegistry"));
    assert!(debug.contains("live: 1"));
}
