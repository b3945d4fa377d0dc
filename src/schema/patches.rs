//! Post-resolution schema patches
//!
//! Corrective patches for places where the published OpenAPI document and
//! the API's actual behavior disagree. Patches are keyed by resource name
//! and applied after nullability normalization, so new workarounds slot in
//! without touching the resolver itself.

use crate::types::JsonValue;
use serde_json::Value;
use std::collections::HashMap;

/// A patch applied in place to a resolved resource schema
pub type SchemaPatch = fn(&mut JsonValue);

/// Patches keyed by resource name
pub type PatchRegistry = HashMap<String, SchemaPatch>;

/// The patches every resolver starts with
pub fn builtin_patches() -> PatchRegistry {
    let mut patches = PatchRegistry::new();
    patches.insert("members".to_string(), patch_members as SchemaPatch);
    patches
}

/// The API returns an empty `sms_subscription_status` for members that have
/// never touched SMS, but the document's enum does not list the empty
/// string. Extend the enum so those records validate.
fn patch_members(schema: &mut JsonValue) {
    let Some(status) = schema
        .pointer_mut("/properties/sms_subscription_status")
        .and_then(|v| v.as_object_mut())
    else {
        return;
    };

    if let Some(Value::Array(values)) = status.get_mut("enum") {
        let empty = Value::String(String::new());
        if !values.contains(&empty) {
            values.push(empty);
        }
    }
}
