//! Property tests for the store's read and notification rules.

use proptest::prelude::*;
use shared_state::{should_deliver, StateStore, Value};

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i64..5).prop_map(Value::Int),
        (-5i32..5).prop_map(|f| Value::Float(f as f64)),
        "[a-c]{0,2}".prop_map(Value::String),
        proptest::collection::vec(any::<u8>(), 0..3).prop_map(Value::Bytes),
    ]
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-d]"
}

proptest! {
    #[test]
    fn prop_get_returns_last_write(
        writes in proptest::collection::vec((key_strategy(), value_strategy()), 1..40)
    ) {
        let store = StateStore::new();
        let mut model = std::collections::HashMap::new();
        for (key, value) in &writes {
            store.set(key.clone(), value.clone());
            model.insert(key.clone(), value.clone());
        }
        for key in ["a", "b", "c", "d"] {
            prop_assert_eq!(store.get(key), model.get(key).cloned());
        }
        prop_assert_eq!(store.len(), model.len());
    }

    #[test]
    fn prop_conditional_counts(values in proptest::collection::vec(value_strategy(), 1..30)) {
        let store = StateStore::new();
        let conditional = store.watch("k", true);
        let always = store.watch("k", false);

        // Floats come from integers, so no NaN: equality is reflexive here
        let mut expected = 0;
        let mut previous: Option<Value> = None;
        for value in &values {
            if previous.as_ref() != Some(value) {
                expected += 1;
            }
            store.set("k", value.clone());
            previous = Some(value.clone());
        }

        prop_assert_eq!(conditional.drain().len(), expected);
        prop_assert_eq!(always.drain().len(), values.len());
    }

    #[test]
    fn prop_unconditional_always_delivered(
        previous in proptest::option::of(value_strategy()),
        new in value_strategy()
    ) {
        prop_assert!(should_deliver(false, previous.as_ref(), &new));
        prop_assert!(should_deliver(true, None, &new));
        let skipped = !should_deliver(true, previous.as_ref(), &new);
        prop_assert_eq!(skipped, previous.as_ref() == Some(&new));
    }

    #[test]
    fn prop_delete_always_notifies(keys in proptest::collection::vec(key_strategy(), 1..20)) {
        let store = StateStore::new();
        let watcher = store.watch("a", true);
        for key in &keys {
            store.delete(key);
        }
        let deletes_of_a = keys.iter().filter(|k| k.as_str() == "a").count();
        prop_assert_eq!(watcher.drain().len(), deletes_of_a);
    }
}
