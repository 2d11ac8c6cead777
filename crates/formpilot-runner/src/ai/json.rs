//! Pulling JSON out of model replies.
//!
//! Replies wrap JSON in prose or code fences often enough that parsing the
//! whole text is useless. These helpers find balanced top-level JSON values
//! inside arbitrary text.

use formpilot_page::FieldMapping;
use serde_json::Value;
use tracing::warn;

use crate::profile::Profile;
use crate::{Error, Result};

/// Balanced `[...]` or `{...}` substrings in order of their opening bracket.
/// Brackets inside string literals are ignored.
pub fn json_candidates(raw: &str) -> impl Iterator<Item = &str> + '_ {
    raw.char_indices()
        .filter(|&(_, c)| c == '[' || c == '{')
        .filter_map(move |(start, _)| balanced_end(raw, start).map(|end| &raw[start..end]))
}

/// Byte offset one past the bracket closing the one at `start`.
fn balanced_end(raw: &str, start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// First top-level JSON array in `raw`.
pub fn extract_json_array(raw: &str) -> Option<Vec<Value>> {
    json_candidates(raw).find_map(|candidate| match serde_json::from_str(candidate) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    })
}

/// First top-level JSON object in `raw`.
pub fn extract_json_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    json_candidates(raw).find_map(|candidate| match serde_json::from_str(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    })
}

/// Parse a mapping reply: the first JSON array, or an object carrying a
/// `mappings` array. Malformed entries are skipped.
pub fn parse_mappings(raw: &str) -> Result<Vec<FieldMapping>> {
    let items = json_candidates(raw)
        .find_map(|candidate| match serde_json::from_str(candidate) {
            Ok(Value::Array(items)) => Some(items),
            Ok(Value::Object(mut map)) => match map.remove("mappings") {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            _ => None,
        })
        .ok_or_else(|| Error::Mapping("no JSON mapping array in response".into()))?;

    let mappings = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<FieldMapping>(item) {
            Ok(mapping) if !mapping.id.trim().is_empty() => Some(mapping),
            Ok(_) => {
                warn!("mapping without an id skipped");
                None
            }
            Err(e) => {
                warn!("malformed mapping skipped: {}", e);
                None
            }
        })
        .collect();
    Ok(mappings)
}

/// Parse a resume-parsing reply into a profile.
pub fn parse_profile(raw: &str) -> Result<Profile> {
    let object = extract_json_object(raw)
        .ok_or_else(|| Error::ResumeParse("no JSON object in response".into()))?;
    serde_json::from_value(Value::Object(object))
        .map_err(|e| Error::ResumeParse(format!("response does not match the profile schema: {}", e)))
}
