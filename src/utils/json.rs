use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use crate::models::ParentRef;

/// Interprets the `parentId` field of an upload body.
///
/// Missing, `null`, `0` and `"0"` all mean the root. A string that is not a valid
/// folder id yields `Err` with the raw value so the caller can report the parent as
/// missing.
pub fn classify_parent(optional_value: Option<&Value>) -> Result<ParentRef, String> {
    match optional_value {
        None | Some(Value::Null) => Ok(ParentRef::Root),
        Some(Value::Number(n)) if n.as_u64() == Some(0) => Ok(ParentRef::Root),
        Some(Value::String(s)) if s.trim() == "0" => Ok(ParentRef::Root),
        Some(Value::String(s)) => Uuid::parse_str(s.trim())
            .map(ParentRef::Folder)
            .map_err(|_| s.to_owned()),
        Some(other) => Err(other.to_string()),
    }
}

/// Reads a request field that must be a string. Any other JSON type counts as absent,
/// so it is reported with the field's "Missing" message.
pub fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Reads a flag; anything but `true` is `false`.
pub fn bool_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}
