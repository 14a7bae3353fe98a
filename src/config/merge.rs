//! Field-by-field merging of config tiers.
//!
//! Maps merge key by key; every other value (arrays included) is replaced
//! wholesale by the higher tier.

use serde_json::Value;

/// Merge `overlay` on top of `base`.
///
/// A `null` in the overlay means "not set" and leaves the base value alone,
/// so an empty YAML key never wipes a default.
///
/// # Example
/// ```
/// use serde_json::json;
/// use taskstreak::config::deep_merge;
///
/// let defaults = json!({
///     "gamification": { "points": { "easy": 5, "hard": 20 } },
///     "calendar": { "week_start": "monday" }
/// });
/// let project = json!({ "gamification": { "points": { "hard": 40 } } });
///
/// let merged = deep_merge(defaults, project);
/// assert_eq!(merged["gamification"]["points"]["easy"], 5);
/// assert_eq!(merged["gamification"]["points"]["hard"], 40);
/// assert_eq!(merged["calendar"]["week_start"], "monday");
/// ```
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    merge_into(&mut base, overlay);
    base
}

fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge tiers lowest first.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
