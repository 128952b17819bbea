//! Mapping of scraped tags and provider responses onto [`MetadataResult`]

use crate::error::UpstreamError;
use crate::metadata::types::{DEFAULT_TYPE, MetadataResult, ProviderFields, RawTagSet};
use serde_json::Value;

const TITLE_KEYS: &[&str] = &["og:title", "twitter:title", "title"];
const DESCRIPTION_KEYS: &[&str] = &["og:description", "twitter:description", "description"];
const IMAGE_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "image",
];
const TYPE_KEYS: &[&str] = &["og:type", "type"];
const URL_KEYS: &[&str] = &["og:url", "url"];

fn first_of(tags: &RawTagSet, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| tags.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Build a preview from a scraped tag set.
///
/// `url` is used when the page declares no canonical URL of its own. Accepts
/// canonical (unprefixed) keys too, so feeding a result back in is a no-op.
pub fn from_tags(url: &str, tags: &RawTagSet) -> MetadataResult {
    MetadataResult {
        url: first_of(tags, URL_KEYS).unwrap_or_else(|| url.to_string()),
        title: first_of(tags, TITLE_KEYS).unwrap_or_default(),
        description: first_of(tags, DESCRIPTION_KEYS).unwrap_or_default(),
        image: first_of(tags, IMAGE_KEYS).unwrap_or_default(),
        kind: first_of(tags, TYPE_KEYS).unwrap_or_else(|| DEFAULT_TYPE.to_string()),
    }
}

fn string_field(fields: &ProviderFields, key: &str) -> Result<Option<String>, UpstreamError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(UpstreamError::SchemaMismatch(format!(
            "expected `{}` to be a string, got {}",
            key,
            json_kind(other)
        ))),
    }
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

/// Build a preview from an oEmbed-style provider response.
///
/// Every field is type-checked; a field of the wrong type fails the whole
/// response with [`UpstreamError::SchemaMismatch`].
pub fn from_provider(url: &str, fields: &ProviderFields) -> Result<MetadataResult, UpstreamError> {
    if let Some(message) = string_field(fields, "error")? {
        return Err(UpstreamError::Unavailable(format!(
            "provider rejected {}: {}",
            url, message
        )));
    }

    Ok(MetadataResult {
        url: string_field(fields, "url")?.unwrap_or_else(|| url.to_string()),
        title: string_field(fields, "title")?.unwrap_or_default(),
        description: string_field(fields, "provider_name")?.unwrap_or_default(),
        image: string_field(fields, "thumbnail_url")?.unwrap_or_default(),
        kind: DEFAULT_TYPE.to_string(),
    })
}
