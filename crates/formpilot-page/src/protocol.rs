//! Cross-context protocol: field snapshots, mappings, and the three request
//! kinds the page side answers.

use serde::{Deserialize, Deserializer, Serialize};

use crate::navigate::NavigationResult;

/// Slot name marking an open-ended question that needs a generated answer.
pub const CUSTOM_QUESTION: &str = "custom_question";

/// One eligible control, as seen by the mapping service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Unique within one extraction pass.
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Control kind: input type, `select`, `textarea` or `button`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Nearest heading or legend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Stable id of the enclosing group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

/// A (label, value) pair of an enumerated control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

/// What the filler does with a mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingAction {
    /// Write a value into the control.
    #[default]
    Fill,
    /// Activate a button that adds a repeater instance.
    #[serde(alias = "trigger_add", alias = "triggerAdd")]
    TriggerAdd,
}

/// Semantic meaning (or action) assigned to one extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Profile slot name or [`CUSTOM_QUESTION`]. Absent for trigger-add.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    /// Informative only; nothing enforces a floor.
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: f32,
    /// Resolved value: an option for enumerated controls, or an answer.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    /// Literal question text for custom slots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    /// Zero-based index within `group_type`.
    #[serde(
        default,
        deserialize_with = "lenient_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_index: Option<usize>,
    #[serde(default, deserialize_with = "lenient_action")]
    pub action: MappingAction,
}

impl FieldMapping {
    /// A plain fill mapping for `id` into `slot`.
    pub fn fill(id: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            field_type: Some(slot.into()),
            confidence: 1.0,
            value: None,
            question: None,
            group_type: None,
            group_index: None,
            action: MappingAction::Fill,
        }
    }

    /// A trigger-add mapping for the button `id`.
    pub fn trigger_add(id: impl Into<String>) -> Self {
        Self {
            field_type: None,
            action: MappingAction::TriggerAdd,
            ..Self::fill(id, "")
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_group(mut self, group_type: impl Into<String>, index: usize) -> Self {
        self.group_type = Some(group_type.into());
        self.group_index = Some(index);
        self
    }

    /// Whether this mapping asks for a generated answer.
    pub fn is_custom_question(&self) -> bool {
        self.action == MappingAction::Fill
            && self.field_type.as_deref() == Some(CUSTOM_QUESTION)
    }
}

/// Accept strings, numbers and booleans where a string is expected; models
/// are not consistent about quoting.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// A number, a numeric string, or null (zero). Anything else also reads as
/// zero since confidence never gates a fill.
fn lenient_confidence<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// A non-negative integer, possibly quoted; null means absent.
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .map(|n| Some(n as usize))
            .ok_or_else(|| D::Error::custom(format!("invalid group index {}", n))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid group index \"{}\"", s))),
        Some(other) => Err(D::Error::custom(format!("invalid group index {}", other))),
    }
}

/// Null reads as the default action.
fn lenient_action<'de, D>(deserializer: D) -> Result<MappingAction, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<MappingAction>::deserialize(deserializer)?.unwrap_or_default())
}

/// A request from the control context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageRequest {
    /// Extract the field snapshot of the active scope.
    Analyze,
    /// Apply a batch of mappings.
    Fill { mappings: Vec<FieldMapping> },
    /// Activate the forward-progress control.
    Advance,
}

impl PageRequest {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Fill { .. } => "fill",
            Self::Advance => "advance",
        }
    }
}

/// Response to [`PageRequest::Analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub fields: Vec<FormField>,
}

/// Response to [`PageRequest::Fill`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillResponse {
    pub success: bool,
    pub filled: usize,
    pub requested: usize,
}

/// Response to [`PageRequest::Advance`].
pub type AdvanceResponse = NavigationResult;

/// The page side's answer, one variant per request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageResponse {
    Analyze(AnalyzeResponse),
    Fill(FillResponse),
    Advance(AdvanceResponse),
}

impl PageResponse {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Analyze(_) => "analyze",
            Self::Fill(_) => "fill",
            Self::Advance(_) => "advance",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_defaults() {
        let m: FieldMapping =
            serde_json::from_str(r#"{"id":"f1","fieldType":"email","confidence":0.9}"#).unwrap();
        assert_eq!(m.id, "f1");
        assert_eq!(m.field_type.as_deref(), Some("email"));
        assert_eq!(m.action, MappingAction::Fill);
        assert!(m.value.is_none());
        assert!(!m.is_custom_question());
    }

    #[test]
    fn test_mapping_trigger_add_and_groups() {
        let m: FieldMapping = serde_json::from_str(
            r#"{"id":"add_exp","action":"trigger-add","groupType":"experience","groupIndex":1}"#,
        )
        .unwrap();
        assert_eq!(m.action, MappingAction::TriggerAdd);
        assert!(m.field_type.is_none());
        assert_eq!(m.group_type.as_deref(), Some("experience"));
        assert_eq!(m.group_index, Some(1));
    }

    #[test]
    fn test_mapping_lenient_value() {
        let m: FieldMapping =
            serde_json::from_str(r#"{"id":"years","fieldType":"years_experience","value":7}"#)
                .unwrap();
        assert_eq!(m.value.as_deref(), Some("7"));

        let m: FieldMapping =
            serde_json::from_str(r#"{"id":"ok","fieldType":"consent","value":true}"#).unwrap();
        assert_eq!(m.value.as_deref(), Some("true"));
    }

    #[test]
    fn test_mapping_tolerates_null_and_quoted_numbers() {
        let m: FieldMapping = serde_json::from_str(
            r#"{"id":"a","fieldType":"email","confidence":null,"action":null,"groupIndex":null}"#,
        )
        .unwrap();
        assert_eq!(m.confidence, 0.0);
        assert_eq!(m.action, MappingAction::Fill);
        assert_eq!(m.group_index, None);

        let m: FieldMapping = serde_json::from_str(
            r#"{"id":"b","fieldType":"company","confidence":"0.8","groupType":"experience","groupIndex":"1"}"#,
        )
        .unwrap();
        assert!((m.confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(m.group_index, Some(1));

        assert!(serde_json::from_str::<FieldMapping>(r#"{"id":"c","groupIndex":"first"}"#).is_err());
    }

    #[test]
    fn test_custom_question_flag() {
        let mut m = FieldMapping::fill("why", CUSTOM_QUESTION);
        assert!(m.is_custom_question());
        m.action = MappingAction::TriggerAdd;
        assert!(!m.is_custom_question());
    }

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::to_value(PageRequest::Fill { mappings: vec![] }).unwrap();
        assert_eq!(json["kind"], "fill");
        let back: PageRequest = serde_json::from_str(r#"{"kind":"advance"}"#).unwrap();
        assert_eq!(back, PageRequest::Advance);
    }

    #[test]
    fn test_form_field_serializes_camel_case() {
        let field = FormField {
            id: "e".into(),
            name: "email".into(),
            kind: "email".into(),
            placeholder: None,
            label: Some("Email".into()),
            aria_label: Some("Work email".into()),
            autocomplete: None,
            required: true,
            context: None,
            section: None,
            options: vec![],
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "email");
        assert_eq!(json["ariaLabel"], "Work email");
        assert!(json.get("options").is_none());
    }
}
