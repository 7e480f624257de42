//! Typed accessors and error cases.

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_state::{StateStore, StoreError, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Worker {
    id: u32,
    name: String,
    tags: Vec<String>,
}

fn worker() -> Worker {
    Worker {
        id: 7,
        name: "indexer".to_string(),
        tags: vec!["batch".to_string()],
    }
}

// --- String Accessors ---

#[test]
fn test_try_get_string_absent_is_none() {
    let store = StateStore::new();
    assert!(store.try_get_string("missing").unwrap().is_none());
}

#[test]
fn test_try_get_string_wrong_type() {
    let store = StateStore::new();
    store.set("n", 42i64);

    let result = store.try_get_string("n");
    match result {
        Err(StoreError::WrongType { key, expected, found }) => {
            assert_eq!(key, "n");
            assert_eq!(expected, "string");
            assert_eq!(found, "int");
        }
        other => panic!("Expected WrongType, got {:?}", other),
    }

    // The lenient accessor reports the same case as absent
    assert!(store.get_string("n").is_none());
}

#[test]
fn test_try_get_string_present() {
    let store = StateStore::new();
    store.set("s", "text");
    assert_eq!(store.try_get_string("s").unwrap().as_deref(), Some("text"));
}

#[test]
fn test_wrong_type_message() {
    let store = StateStore::new();
    store.set("blob", vec![0u8, 1, 2]);

    let err = store.try_get_string("blob").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Wrong type for key blob: expected string, found bytes"
    );
}

// --- Structured Values ---

#[test]
fn test_struct_round_trip() {
    let store = StateStore::new();
    store.set("worker", Value::from_serialize(&worker()).unwrap());

    let decoded: Option<Worker> = store.get_as("worker").unwrap();
    assert_eq!(decoded, Some(worker()));

    // Untyped access sees the JSON form
    assert_eq!(
        store.get_struct("worker"),
        Some(Value::Json(json!({"id": 7, "name": "indexer", "tags": ["batch"]})))
    );
}

#[test]
fn test_get_as_absent() {
    let store = StateStore::new();
    let decoded: Option<Worker> = store.get_as("nobody").unwrap();
    assert!(decoded.is_none());
}

#[test]
fn test_get_as_shape_mismatch() {
    let store = StateStore::new();
    store.set("worker", json!({"id": "not a number"}));

    let result: shared_state::Result<Option<Worker>> = store.get_as("worker");
    assert!(matches!(result, Err(StoreError::Deserialization(_))));
}

#[test]
fn test_get_as_scalars() {
    let store = StateStore::new();
    store.set("n", 5i64);
    store.set("flag", true);
    store.set("s", "hi");

    assert_eq!(store.get_as::<i64>("n").unwrap(), Some(5));
    assert_eq!(store.get_as::<bool>("flag").unwrap(), Some(true));
    assert_eq!(store.get_as::<String>("s").unwrap(), Some("hi".to_string()));
    assert!(store.get_as::<u8>("s").is_err());
}

#[test]
fn test_unrepresentable_struct() {
    use std::collections::HashMap;

    // JSON objects need string keys
    let mut map = HashMap::new();
    map.insert(vec![1u8], 1);
    let result = Value::from_serialize(&map);
    assert!(matches!(result, Err(StoreError::Serialization(_))));
}
