use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{AccountSnapshot, BookTop, PositionToClose};

/// Canonicalize by sorting object keys recursively and emitting compact
/// JSON. Hashes are computed over this form only.
pub fn canonical_json(v: &Value) -> String {
    serde_json::to_string(&sort_keys(v)).unwrap_or_else(|_| "null".to_string())
}

/// Serialize any value then canonicalize it.
pub fn canonical_json_of<T: Serialize>(v: &T) -> String {
    match serde_json::to_value(v) {
        Ok(raw) => canonical_json(&raw),
        Err(_) => "null".to_string(),
    }
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash of one tick's inputs: the stable evidence that a replay reproduced
/// the same inputs. Positions and books are sorted by symbol so input
/// collection order cannot change the hash. Correlation ids never enter it.
pub fn snapshot_hash(
    snap: &AccountSnapshot,
    positions: &[PositionToClose],
    books: &BTreeMap<String, BookTop>,
) -> String {
    let mut sorted_positions: Vec<&PositionToClose> = positions.iter().collect();
    sorted_positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let pos_data: Vec<Value> = sorted_positions
        .iter()
        .map(|p| {
            serde_json::json!({
                "symbol": p.symbol,
                "net_qty": p.net_qty,
                "today_qty": p.today_qty,
                "yesterday_qty": p.yesterday_qty,
            })
        })
        .collect();

    let book_data: BTreeMap<&str, Value> = books
        .iter()
        .map(|(sym, b)| {
            (
                sym.as_str(),
                serde_json::json!({
                    "best_bid": b.best_bid,
                    "best_ask": b.best_ask,
                    "tick": b.tick,
                }),
            )
        })
        .collect();

    let payload = serde_json::json!({
        "snap": { "equity": snap.equity, "margin_used": snap.margin_used },
        "positions": pos_data,
        "books": book_data,
    });

    sha256_hex(canonical_json(&payload).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let v = serde_json::json!({"b": {"z": 1, "a": 2}, "a": [{"y": 1, "x": 2}]});
        assert_eq!(
            canonical_json(&v),
            r#"{"a":[{"x":2,"y":1}],"b":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn canonical_roundtrip_is_identity() {
        let v = serde_json::json!({"k": [1, 2, 3], "a": {"n": 0.5}});
        let c1 = canonical_json(&v);
        let parsed: Value = serde_json::from_str(&c1).unwrap();
        assert_eq!(canonical_json(&parsed), c1);
    }

    #[test]
    fn snapshot_hash_independent_of_position_order() {
        let snap = AccountSnapshot::new(1_000_000.0, 0.0);
        let p1 = PositionToClose::new("AO", 1, 1, 0);
        let p2 = PositionToClose::new("SA", -2, 1, 1);
        let mut books = BTreeMap::new();
        books.insert("AO".to_string(), BookTop::new(100.0, 101.0, 1.0));
        books.insert("SA".to_string(), BookTop::new(200.0, 201.0, 1.0));

        let h1 = snapshot_hash(&snap, &[p1.clone(), p2.clone()], &books);
        let h2 = snapshot_hash(&snap, &[p2, p1], &books);
        assert_eq!(h1, h2);
    }

    #[test]
    fn snapshot_hash_changes_with_inputs() {
        let snap = AccountSnapshot::new(1_000_000.0, 0.0);
        let books = BTreeMap::new();
        let h1 = snapshot_hash(&snap, &[], &books);
        let h2 = snapshot_hash(&AccountSnapshot::new(999_999.0, 0.0), &[], &books);
        assert_ne!(h1, h2);
    }
}
