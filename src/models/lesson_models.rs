use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{EditBlock, RawBlock};

pub const EMPTY_CONTENT_MESSAGE: &str = "No lesson content found - using empty defaults";
pub const UNTITLED_LESSON: &str = "Untitled Lesson";
pub const NEW_LESSON: &str = "New Lesson";

/// Body of `GET /api/lessoncontent/{lessonId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonContentEnvelope {
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub success: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_lenient_data")]
    pub data: LessonContentData,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonContentData {
    #[serde(default, deserialize_with = "deserialize_blocks")]
    pub content: Vec<RawBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub html_css: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub css: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub script: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub scorm_url: Option<String>,
    #[serde(default, rename = "scormUrl", deserialize_with = "deserialize_optional_string")]
    pub scorm_url_camel: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LessonContentEnvelope {
    /// Stand-in for a lesson whose content endpoint answered 404.
    pub fn empty(lesson_id: &str) -> Self {
        LessonContentEnvelope {
            success: Some(true),
            data: LessonContentData {
                lesson_id: Some(Value::String(lesson_id.to_string())),
                ..LessonContentData::default()
            },
            message: Some(EMPTY_CONTENT_MESSAGE.to_string()),
        }
    }
}

impl LessonContentData {
    /// The SCORM package URL under whichever spelling the backend used.
    pub fn scorm(&self) -> Option<&str> {
        self.scorm_url.as_deref().or(self.scorm_url_camel.as_deref())
    }
}

fn deserialize_blocks<'de, D>(deserializer: D) -> Result<Vec<RawBlock>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // `content` has been seen as null, as an array, and as a JSON-encoded
    // string of an array.
    let value = Value::deserialize(deserializer)?;
    Ok(raw_blocks_from_value(&value))
}

fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn deserialize_lenient_data<'de, D>(deserializer: D) -> Result<LessonContentData, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // A null or non-object `data` means no content rather than a failed fetch.
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            log::warn!("Malformed lesson content data ({}); using empty defaults.", e);
            LessonContentData::default()
        })),
        _ => Ok(LessonContentData::default()),
    }
}

fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    })
}

/// Reads a block list out of an array or a JSON-encoded array string.
pub fn raw_blocks_from_value(value: &Value) -> Vec<RawBlock> {
    match value {
        Value::Array(items) => items.iter().cloned().map(RawBlock::from).collect(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.into_iter().map(RawBlock::from).collect(),
            _ => {
                log::warn!("Lesson content string is not a JSON array; treating as empty.");
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}

/// What the lesson editor holds after a load: the blocks being edited, the
/// title, and the raw payloads they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonState {
    pub content_blocks: Vec<EditBlock>,
    pub lesson_title: String,
    pub lesson_data: Option<Value>,
    pub lesson_content: Option<LessonContentEnvelope>,
    pub loading: bool,
    pub fetching_content: bool,
}

impl LessonState {
    pub fn loading() -> Self {
        LessonState {
            content_blocks: Vec::new(),
            lesson_title: UNTITLED_LESSON.to_string(),
            lesson_data: None,
            lesson_content: None,
            loading: true,
            fetching_content: false,
        }
    }

    pub fn new_lesson() -> Self {
        LessonState {
            lesson_title: NEW_LESSON.to_string(),
            loading: false,
            ..LessonState::loading()
        }
    }

    pub fn set_content_blocks(&mut self, blocks: Vec<EditBlock>) {
        self.content_blocks = blocks;
    }

    pub fn set_lesson_content(&mut self, content: Option<LessonContentEnvelope>) {
        self.lesson_content = content;
    }

    pub(crate) fn settle(mut self) -> Self {
        self.loading = false;
        self.fetching_content = false;
        self
    }
}

/// Title of a lesson payload, falling back to the placeholder.
pub fn lesson_title_of(lesson: &Value) -> String {
    ["title", "lesson_title", "lessonTitle", "name"]
        .iter()
        .filter_map(|key| lesson.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(UNTITLED_LESSON)
        .to_string()
}

/// Legacy `contentBlocks` array some lesson payloads carry directly.
pub fn legacy_content_blocks(lesson: &Value) -> Vec<RawBlock> {
    lesson
        .get("contentBlocks")
        .or_else(|| lesson.get("content_blocks"))
        .map(raw_blocks_from_value)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_envelope_matches_not_found_defaults() {
        let value = serde_json::to_value(LessonContentEnvelope::empty("17")).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], EMPTY_CONTENT_MESSAGE);
        assert_eq!(value["data"]["content"], json!([]));
        assert_eq!(value["data"]["lesson_id"], "17");
        assert_eq!(value["data"]["html_css"], "");
        assert_eq!(value["data"]["css"], "");
        assert_eq!(value["data"]["script"], "");
        assert!(value["data"]["scorm_url"].is_null());
        assert!(value["data"]["scormUrl"].is_null());
    }

    #[test]
    fn envelope_tolerates_string_encoded_content_and_nulls() {
        let envelope: LessonContentEnvelope = serde_json::from_value(json!({
            "data": {
                "content": "[{\"type\":\"text\",\"html_css\":\"<p>x</p>\"}]",
                "html_css": null,
                "scormUrl": "https://cdn.example.com/pkg.zip"
            }
        }))
        .unwrap();

        assert_eq!(envelope.data.content.len(), 1);
        assert_eq!(envelope.data.html_css, "");
        assert_eq!(envelope.data.scorm(), Some("https://cdn.example.com/pkg.zip"));
    }

    #[test]
    fn null_data_reads_as_empty_content() {
        let envelope: LessonContentEnvelope =
            serde_json::from_value(json!({"success": true, "data": null})).unwrap();
        assert!(envelope.data.content.is_empty());
        assert_eq!(envelope.success, Some(true));

        let scalar: LessonContentEnvelope =
            serde_json::from_value(json!({"data": "nothing here", "message": 3})).unwrap();
        assert_eq!(scalar.data, LessonContentData::default());
        assert_eq!(scalar.message.as_deref(), Some("3"));
    }

    #[test]
    fn oddly_typed_fields_do_not_drop_blocks() {
        let envelope: LessonContentEnvelope = serde_json::from_value(json!({
            "success": "true",
            "data": {
                "content": [{"type": "quote"}],
                "scorm_url": 5,
                "scormUrl": {"nested": true}
            }
        }))
        .unwrap();
        assert_eq!(envelope.success, Some(true));
        assert_eq!(envelope.data.content.len(), 1);
        assert_eq!(envelope.data.scorm_url.as_deref(), Some("5"));
        assert_eq!(envelope.data.scorm_url_camel, None);
    }

    #[test]
    fn title_falls_back_through_known_keys() {
        assert_eq!(lesson_title_of(&json!({"title": "Intro"})), "Intro");
        assert_eq!(lesson_title_of(&json!({"title": "", "lesson_title": "Alt"})), "Alt");
        assert_eq!(lesson_title_of(&json!({})), UNTITLED_LESSON);
    }

    #[test]
    fn legacy_blocks_are_read_from_lesson_payload() {
        let lesson = json!({"contentBlocks": [{"type": "divider"}, {"type": "quote"}]});
        assert_eq!(legacy_content_blocks(&lesson).len(), 2);
        assert!(legacy_content_blocks(&json!({"title": "x"})).is_empty());
    }
}
