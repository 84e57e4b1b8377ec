//! Pure deep-merge of a JSON delta into a JSON document (spec §8 property
//! 5, §9 "merging arbitrary profile deltas").
//!
//! Fields the delta doesn't mention are left untouched; mentioned scalars
//! are overwritten; mentioned objects are merged recursively; arrays are
//! replaced whole rather than merged element-wise.

use serde_json::Value;

pub fn merge(base: &mut Value, delta: &Value) {
    match (base, delta) {
        (Value::Object(base_map), Value::Object(delta_map)) => {
            for (key, delta_value) in delta_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge(existing, delta_value),
                    None => {
                        base_map.insert(key.clone(), delta_value.clone());
                    }
                }
            }
        }
        (base_slot, delta_value) => {
            *base_slot = delta_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unmentioned_fields_survive() {
        let mut base = json!({"a": 1, "b": 2});
        merge(&mut base, &json!({"a": 9}));
        assert_eq!(base, json!({"a": 9, "b": 2}));
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let mut base = json!({"stats": {"wins": 1, "losses": 2}});
        merge(&mut base, &json!({"stats": {"wins": 5}}));
        assert_eq!(base, json!({"stats": {"wins": 5, "losses": 2}}));
    }

    #[test]
    fn arrays_are_replaced_whole() {
        let mut base = json!({"tags": [1, 2, 3]});
        merge(&mut base, &json!({"tags": [9]}));
        assert_eq!(base, json!({"tags": [9]}));
    }

    #[test]
    fn scalar_replacing_object_overwrites_whole_subtree() {
        let mut base = json!({"loadout": {"weapon": "sword"}});
        merge(&mut base, &json!({"loadout": "none"}));
        assert_eq!(base, json!({"loadout": "none"}));
    }
}
