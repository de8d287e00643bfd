use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod lesson_models;

/// A content block as returned by the lesson-content endpoint.
///
/// Backends have shipped every field in more than one shape over time, so
/// deserialization goes through `serde_json::Value` and never fails: fields
/// of an unexpected type are simply treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct RawBlock {
    pub block_id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub order: Option<i64>,
    pub html_css: Option<String>,
    pub content: Option<Value>,
    pub details: Map<String, Value>,
    // Legacy top-level aliases older lesson payloads carry outside `details`.
    pub subtype: Option<String>,
    #[serde(rename = "textType")]
    pub text_type: Option<String>,
    #[serde(rename = "tableType")]
    pub table_type: Option<String>,
    pub gradient: Option<bool>,
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_order(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<Value> for RawBlock {
    fn from(value: Value) -> Self {
        let obj = match value {
            Value::Object(map) => map,
            _ => return RawBlock::default(),
        };
        let string_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        RawBlock {
            block_id: obj
                .get("block_id")
                .and_then(scalar_to_string)
                .or_else(|| obj.get("id").and_then(scalar_to_string)),
            block_type: string_field("type"),
            order: obj.get("order").and_then(value_to_order),
            html_css: string_field("html_css"),
            content: obj.get("content").filter(|v| !v.is_null()).cloned(),
            details: obj
                .get("details")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            subtype: string_field("subtype"),
            text_type: string_field("textType").or_else(|| string_field("text_type")),
            table_type: string_field("tableType"),
            gradient: obj.get("gradient").and_then(value_to_bool),
        }
    }
}

impl RawBlock {
    /// The `content` field as text: strings as-is, objects and arrays
    /// re-encoded as JSON.
    pub fn content_str(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn html(&self) -> &str {
        self.html_css.as_deref().unwrap_or("")
    }

    pub fn type_tag(&self) -> &str {
        self.block_type.as_deref().unwrap_or("")
    }
}

/// Editor-facing representation of one content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBlock {
    pub id: String,
    #[serde(rename = "block_id")]
    pub block_id: String,
    #[serde(flatten)]
    pub kind: BlockKind,
    pub order: i64,
    #[serde(rename = "html_css")]
    pub html_css: String,
    pub details: Map<String, Value>,
    pub is_editing: bool,
    /// When the block was mapped. Advisory only.
    pub timestamp: DateTime<Utc>,
}

impl EditBlock {
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// The `content` value as the persistence layer stores it. Audio and
    /// YouTube payloads are JSON-encoded here and nowhere else.
    pub fn content_string(&self) -> Option<String> {
        match &self.kind {
            BlockKind::Audio(audio) => serde_json::to_string(&audio.content).ok(),
            BlockKind::Youtube(yt) => serde_json::to_string(&yt.content).ok(),
            BlockKind::Statement(b) => Some(b.content.clone()),
            BlockKind::Table(b) => Some(b.content.clone()),
            BlockKind::Quote(b) => Some(b.content.clone()),
            BlockKind::Divider(b) => Some(b.content.clone()),
            BlockKind::Interactive(b) => Some(b.content.clone()),
            BlockKind::Text(b) => Some(b.content.clone()),
            BlockKind::Image(_) | BlockKind::Video(_) | BlockKind::Pdf(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Image(ImageBlock),
    Video(VideoBlock),
    Pdf(PdfBlock),
    Statement(StatementBlock),
    Table(TableBlock),
    Quote(QuoteBlock),
    Divider(DividerBlock),
    Interactive(InteractiveBlock),
    Audio(AudioBlock),
    Youtube(YoutubeBlock),
    Text(TextBlock),
}

impl BlockKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::Image(_) => "image",
            BlockKind::Video(_) => "video",
            BlockKind::Pdf(_) => "pdf",
            BlockKind::Statement(_) => "statement",
            BlockKind::Table(_) => "table",
            BlockKind::Quote(_) => "quote",
            BlockKind::Divider(_) => "divider",
            BlockKind::Interactive(_) => "interactive",
            BlockKind::Audio(_) => "audio",
            BlockKind::Youtube(_) => "youtube",
            BlockKind::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlock {
    pub image_url: String,
    pub image_title: String,
    pub image_description: String,
    pub layout: String,
    pub alignment: String,
    pub template_type: Option<String>,
    /// Caption as shown in the editor; HTML when the backend supplied it.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoBlock {
    pub video_url: String,
    pub video_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfBlock {
    pub pdf_url: String,
    pub pdf_title: String,
    pub pdf_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementBlock {
    pub statement_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableTextType {
    #[default]
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBlock {
    pub table_type: String,
    pub template_id: String,
    pub content: String,
    #[serde(default)]
    pub text_type: TableTextType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBlock {
    pub quote_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividerBlock {
    pub subtype: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveBlock {
    #[serde(alias = "subtype")]
    pub template: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBlock {
    pub content: AudioContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioContent {
    pub title: String,
    pub description: String,
    pub upload_method: String,
    pub url: String,
    pub uploaded_data: Value,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoutubeBlock {
    pub content: YoutubeContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeContent {
    pub title: String,
    pub description: String,
    pub url: String,
    pub video_id: String,
    pub embed_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    MasterHeading,
    HeadingParagraph,
    SubheadingParagraph,
    Heading,
    Subheading,
    Paragraph,
}

impl TextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextType::MasterHeading => "master_heading",
            TextType::HeadingParagraph => "heading_paragraph",
            TextType::SubheadingParagraph => "subheading_paragraph",
            TextType::Heading => "heading",
            TextType::Subheading => "subheading",
            TextType::Paragraph => "paragraph",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "master_heading" => Some(TextType::MasterHeading),
            "heading_paragraph" => Some(TextType::HeadingParagraph),
            "subheading_paragraph" => Some(TextType::SubheadingParagraph),
            "heading" => Some(TextType::Heading),
            "subheading" => Some(TextType::Subheading),
            "paragraph" => Some(TextType::Paragraph),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub text_type: TextType,
    /// Raw HTML of the block.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<bool>,
}
