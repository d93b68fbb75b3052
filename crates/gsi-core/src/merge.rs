//! Deep merge of snapshot fragments into a session's cumulative state.
//!
//! The game client sends partial snapshots: a section that did not change
//! may be omitted entirely. Merging is additive so that the session state
//! always holds the most recent value ever reported for every field.
//!
//! Rules, applied per key of the incoming fragment:
//!
//! - object into object: recurse
//! - anything else (scalar, array, `null`, or a type change): the incoming
//!   value replaces the existing one
//!
//! Keys that exist only in the state are never touched.

use serde_json::{Map, Value};

/// Fold `fragment` into `state` in place.
pub fn merge(state: &mut Map<String, Value>, fragment: &Map<String, Value>) {
    for (key, incoming) in fragment {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) =
            (state.get_mut(key), incoming)
        {
            merge(existing, incoming);
            continue;
        }
        state.insert(key.clone(), incoming.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn additive_merge_keeps_existing_fields() {
        let mut state = Map::new();
        merge(&mut state, &obj(json!({"a": {"x": 1}})));
        merge(&mut state, &obj(json!({"a": {"y": 2}})));
        assert_eq!(Value::Object(state), json!({"a": {"x": 1, "y": 2}}));
    }

    #[test]
    fn scalar_overwrites_scalar() {
        let mut state = obj(json!({"hero": {"level": 1, "name": "abc"}}));
        merge(&mut state, &obj(json!({"hero": {"level": 2}})));
        assert_eq!(
            Value::Object(state),
            json!({"hero": {"level": 2, "name": "abc"}})
        );
    }

    #[test]
    fn null_overwrites() {
        let mut state = obj(json!({"hero": {"name": "abc"}}));
        merge(&mut state, &obj(json!({"hero": {"name": null}})));
        assert_eq!(Value::Object(state), json!({"hero": {"name": null}}));
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let mut state = obj(json!({"items": [1, 2, 3]}));
        merge(&mut state, &obj(json!({"items": [4]})));
        assert_eq!(Value::Object(state), json!({"items": [4]}));
    }

    #[test]
    fn type_change_replaces_subtree() {
        let mut state = obj(json!({"map": {"name": "start"}}));
        merge(&mut state, &obj(json!({"map": false})));
        assert_eq!(Value::Object(state.clone()), json!({"map": false}));

        merge(&mut state, &obj(json!({"map": {"name": "dota"}})));
        assert_eq!(Value::Object(state), json!({"map": {"name": "dota"}}));
    }

    #[test]
    fn empty_fragment_is_a_no_op() {
        let mut state = obj(json!({"player": {"kills": 3}}));
        merge(&mut state, &Map::new());
        assert_eq!(Value::Object(state), json!({"player": {"kills": 3}}));
    }

    #[test]
    fn deep_nesting_merges_at_every_level() {
        let mut state = obj(json!({"a": {"b": {"c": {"d": 1}}}}));
        merge(&mut state, &obj(json!({"a": {"b": {"c": {"e": 2}, "f": 3}}})));
        assert_eq!(
            Value::Object(state),
            json!({"a": {"b": {"c": {"d": 1, "e": 2}, "f": 3}}})
        );
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-d]", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn arb_object() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-e]", arb_json(), 0..5)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn merging_same_fragment_twice_is_idempotent(fragment in arb_object()) {
            let mut once = Map::new();
            merge(&mut once, &fragment);

            let mut twice = Map::new();
            merge(&mut twice, &fragment);
            merge(&mut twice, &fragment);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn reapplying_a_fragment_over_any_state_is_stable(
            state in arb_object(),
            fragment in arb_object(),
        ) {
            let mut merged = state;
            merge(&mut merged, &fragment);
            let snapshot = merged.clone();
            merge(&mut merged, &fragment);
            prop_assert_eq!(merged, snapshot);
        }

        #[test]
        fn merge_never_drops_existing_keys(
            state in arb_object(),
            fragment in arb_object(),
        ) {
            let keys: Vec<String> = state.keys().cloned().collect();
            let mut merged = state;
            merge(&mut merged, &fragment);
            for key in keys {
                prop_assert!(merged.contains_key(&key));
            }
        }

        #[test]
        fn non_object_fragment_values_land_verbatim(
            state in arb_object(),
            fragment in arb_object(),
        ) {
            let mut merged = state;
            merge(&mut merged, &fragment);
            for (key, value) in &fragment {
                if !value.is_object() {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }
    }
}
