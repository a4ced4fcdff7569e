// Copyright 2025 Cowboy AI, LLC.

//! Property bags and the lookups that gate phased rollout
//!
//! Properties are free-form JSON objects. The engine interprets only two
//! keys: `startPhase` (lock/deploy waves) and `stage` (migration and prepare
//! waves, either a list or `{"migrate": [..], "prepare": [..]}`). Everything
//! else is carried opaquely and merged structurally.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// JSON object carried as element or definition properties
pub type PropertyMap = Map<String, Value>;

/// Ordered set of stages an element definition takes part in
pub type StageSet = BTreeSet<i32>;

const START_PHASE: &str = "startPhase";
const STAGE: &str = "stage";
const STAGE_MIGRATE: &str = "migrate";
const STAGE_PREPARE: &str = "prepare";

/// Deep-merge `source` into `target`
///
/// Nested objects present on both sides are merged key by key; any other value
/// in `source` replaces the one in `target`.
pub fn deep_merge(target: &mut PropertyMap, source: &PropertyMap) {
    for (key, incoming) in source {
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                deep_merge(existing, nested);
            }
            _ => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Return a new map holding `base` with `overlay` deep-merged on top
pub fn merged(base: &PropertyMap, overlay: &PropertyMap) -> PropertyMap {
    let mut result = base.clone();
    deep_merge(&mut result, overlay);
    result
}

/// Declared start phase of an element definition, `0` when absent or unreadable
pub fn find_start_phase(properties: &PropertyMap) -> i32 {
    properties.get(START_PHASE).and_then(as_int).unwrap_or(0)
}

/// Stages an element definition takes part in during migration
///
/// Accepts `stage: [..]` and `stage: {"migrate": [..]}`; defaults to `{0}`.
pub fn find_stage_set_migrate(properties: &PropertyMap) -> StageSet {
    match properties.get(STAGE) {
        Some(Value::Object(stages)) => stage_set(stages.get(STAGE_MIGRATE)),
        other => stage_set(other),
    }
}

/// Stages an element definition takes part in during prepare
///
/// Only `stage: {"prepare": [..]}` is honoured; defaults to `{0}`.
pub fn find_stage_set_prepare(properties: &PropertyMap) -> StageSet {
    match properties.get(STAGE) {
        Some(Value::Object(stages)) => stage_set(stages.get(STAGE_PREPARE)),
        _ => default_stage_set(),
    }
}

fn stage_set(value: Option<&Value>) -> StageSet {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(as_int).collect(),
        _ => default_stage_set(),
    }
}

fn default_stage_set() -> StageSet {
    BTreeSet::from([0])
}

fn as_int(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
