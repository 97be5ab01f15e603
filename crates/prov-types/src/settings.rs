use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;

/// Trust configuration for signature validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustSettings {
    /// PEM bundle of additional anchors trusted by this caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_anchors: Option<String>,
    /// PEM bundle replacing the default trust list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_anchors: Option<String>,
    /// Allowed extended key usages, one OID per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_config: Option<String>,
    /// End-entity certificates accepted regardless of chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_list: Option<String>,
}

/// Toggles for the verification steps the engine performs while reading.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_after_reading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_trust: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_timestamp_trust: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocsp_fetch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_manifest_fetch: Option<bool>,
}

/// Caller-facing settings for the decode engine.
///
/// Keys are camelCase on this side of the boundary. Before dispatch the whole
/// tree is rewritten to lower_snake_case by [`ToolkitSettings::to_wire_json`].
/// Keys the typed fields do not know about are kept in `extra` and go through
/// the same transform, so new engine options work without a release here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolkitSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust: Option<TrustSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<VerifySettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolkitSettings {
    /// Build settings from an arbitrary JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| TypeError::Serialization(e.to_string())),
            other => Err(TypeError::SettingsNotObject(json_kind(&other).into())),
        }
    }

    /// Serialize to the wire representation the engine expects: a JSON
    /// object whose keys, at every depth, are lower_snake_case.
    pub fn to_wire_json(&self) -> Result<String, TypeError> {
        let value =
            serde_json::to_value(self).map_err(|e| TypeError::Serialization(e.to_string()))?;
        serde_json::to_string(&snake_case_keys(value))
            .map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// Wire form of optional settings. Absent settings stay absent: they never
/// become an empty object.
pub fn wire_settings(settings: Option<&ToolkitSettings>) -> Result<Option<String>, TypeError> {
    settings.map(ToolkitSettings::to_wire_json).transpose()
}

/// Recursively rewrite every object key in `value` to lower_snake_case.
///
/// Array elements are visited; scalar values are untouched.
pub fn snake_case_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (to_snake_case(&k), snake_case_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(snake_case_keys).collect()),
        scalar => scalar,
    }
}

/// Convert an identifier to lower_snake_case.
///
/// Word boundaries: any non-alphanumeric character, a lower-case letter or
/// digit followed by an upper-case letter, and the last capital of an acronym
/// followed by a lower-case letter (`HTTPHeaders` -> `http_headers`). Digits
/// stay attached to the preceding word (`sha256Digest` -> `sha256_digest`).
pub fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join("_")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
