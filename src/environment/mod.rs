//! # Variables & Interpolation
//!
//! Resolves `{{key}}` placeholders in case paths, headers and bodies against
//! the run's shared context, and expands suite variables once per run.
//!
//! Suite variables may use generated values so that cases creating
//! server-side entities get fresh identifiers on every run:
//! - `{{$uuid}}`: a random UUID v4
//! - `{{$short_id}}`: the first 8 hex digits of a random UUID
//! - `{{$timestamp}}`: seconds since the Unix epoch

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use uuid::Uuid;

use crate::testing::context::SharedContext;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replace every `{{key}}` in `input` with its context value.
///
/// Returns the names of unresolved keys (deduplicated, in order of
/// appearance) when any placeholder has no value. A context value that
/// itself still holds placeholders counts as unresolved; its inner names
/// are reported instead.
pub fn interpolate(input: &str, ctx: &SharedContext) -> Result<String, Vec<String>> {
    let mut missing: Vec<String> = Vec::new();
    let mut note = |key: String| {
        if !missing.contains(&key) {
            missing.push(key);
        }
    };
    let output = substitute(input, |key| match ctx.get(key) {
        Some(value) => {
            let inner = placeholders(value);
            if inner.is_empty() {
                Some(value.to_string())
            } else {
                inner.into_iter().for_each(&mut note);
                None
            }
        }
        None => {
            note(key.to_string());
            None
        }
    });

    if missing.is_empty() {
        Ok(output)
    } else {
        Err(missing)
    }
}

/// Interpolate every string inside a JSON value, keys included.
pub fn interpolate_json(value: &Value, ctx: &SharedContext) -> Result<Value, Vec<String>> {
    let mut missing = Vec::new();
    let resolved = interpolate_json_inner(value, ctx, &mut missing);
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(missing)
    }
}

fn interpolate_json_inner(value: &Value, ctx: &SharedContext, missing: &mut Vec<String>) -> Value {
    match value {
        Value::String(text) => Value::String(resolve_text(text, ctx, missing)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate_json_inner(item, ctx, missing))
                .collect(),
        ),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                let key = resolve_text(key, ctx, missing);
                resolved.insert(key, interpolate_json_inner(item, ctx, missing));
            }
            Value::Object(resolved)
        }
        other => other.clone(),
    }
}

fn resolve_text(text: &str, ctx: &SharedContext, missing: &mut Vec<String>) -> String {
    match interpolate(text, ctx) {
        Ok(resolved) => resolved,
        Err(keys) => {
            for key in keys {
                if !missing.contains(&key) {
                    missing.push(key);
                }
            }
            text.to_string()
        }
    }
}

/// Expand suite variables for one run.
///
/// Generators (`{{$uuid}}` etc.) are drawn once per variable, then
/// references to other variables or to keys already in `seed` are resolved.
/// A reference that cannot be resolved (unknown key or a cycle) is left as
/// written, so interpolation later reports it as missing.
pub fn expand_variables(
    variables: &BTreeMap<String, String>,
    seed: &SharedContext,
) -> BTreeMap<String, String> {
    let mut expanded: BTreeMap<String, String> = variables
        .iter()
        .map(|(key, template)| (key.clone(), substitute(template, generate)))
        .collect();

    // Each pass resolves one more level of nesting.
    for _ in 0..variables.len() {
        let settled: BTreeMap<String, String> = expanded
            .iter()
            .filter(|(_, value)| placeholders(value).is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut changed = false;
        for value in expanded.values_mut() {
            let next = substitute(value, |name| {
                seed.get(name)
                    .filter(|found| placeholders(found).is_empty())
                    .map(str::to_string)
                    .or_else(|| settled.get(name).cloned())
            });
            if next != *value {
                *value = next;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    expanded
}

/// Whether `name` is a generator understood by [`expand_variables`].
pub fn is_generator(name: &str) -> bool {
    matches!(name, "$uuid" | "$short_id" | "$timestamp")
}

/// Placeholder names appearing in `input`, in order.
pub fn placeholders(input: &str) -> Vec<String> {
    let mut names = Vec::new();
    substitute(input, |key| {
        names.push(key.to_string());
        None
    });
    names
}

fn generate(name: &str) -> Option<String> {
    match name {
        "$uuid" => Some(Uuid::new_v4().to_string()),
        "$short_id" => Some(Uuid::new_v4().simple().to_string()[..8].to_string()),
        "$timestamp" => Some(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|duration| duration.as_secs())
                .unwrap_or_default()
                .to_string(),
        ),
        _ => None,
    }
}

/// Scan `input` for `{{ name }}` and splice in whatever `lookup` returns.
/// Unresolved placeholders are kept as written.
fn substitute(input: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        output.push_str(&rest[..start]);
        let raw = &after_open[..end];
        let key = raw.trim();
        match (!key.is_empty()).then(|| lookup(key)).flatten() {
            Some(value) => output.push_str(&value),
            None => {
                output.push_str(OPEN);
                output.push_str(raw);
                output.push_str(CLOSE);
            }
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    output.push_str(rest);
    output
}
