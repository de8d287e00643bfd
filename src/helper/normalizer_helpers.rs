use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::helper::heuristic_helpers::{
    detect_interactive_template, detect_table_payload, explicit_text_type, extract_youtube_url,
    infer_divider_subtype, resolve_text_type, youtube_video_id, DividerSubtype,
    InteractiveTemplate,
};
use crate::helper::sanitization_helpers::strip_all_html;
use crate::models::{
    AudioBlock, AudioContent, BlockKind, DividerBlock, EditBlock, ImageBlock, InteractiveBlock,
    PdfBlock, QuoteBlock, RawBlock, StatementBlock, TableBlock, TableTextType, TextBlock,
    VideoBlock, YoutubeBlock, YoutubeContent,
};

/// Maps backend blocks to editor blocks. One output per input, ordered by
/// `order` (falling back to position) with ties kept in input order.
pub fn map_raw_blocks_to_edit_blocks(blocks: &[RawBlock]) -> Vec<EditBlock> {
    let now = Utc::now();
    let mut mapped: Vec<EditBlock> = blocks
        .iter()
        .enumerate()
        .map(|(index, block)| map_raw_block(block, index, now))
        .collect();
    mapped.sort_by_key(|b| b.order);
    mapped
}

pub fn map_raw_block(block: &RawBlock, index: usize, now: DateTime<Utc>) -> EditBlock {
    let position = index as i64 + 1;
    let id = block
        .block_id
        .clone()
        .unwrap_or_else(|| format!("block_{}", position));

    EditBlock {
        id: id.clone(),
        block_id: id,
        kind: map_kind(block, now),
        order: block.order.unwrap_or(position),
        html_css: block.html().to_string(),
        details: block.details.clone(),
        is_editing: false,
        timestamp: now,
    }
}

fn map_kind(block: &RawBlock, now: DateTime<Utc>) -> BlockKind {
    // Shape beats the tag: backends have labelled tables as text.
    if let Some(table) = detected_table(block) {
        return BlockKind::Table(map_table(block, Some(table)));
    }

    match block.type_tag() {
        "image" => BlockKind::Image(map_image(block)),
        "pdf" => BlockKind::Pdf(map_pdf(block)),
        "video" => BlockKind::Video(map_video(block)),
        "statement" => BlockKind::Statement(map_statement(block)),
        "table" => BlockKind::Table(map_table(block, None)),
        "quote" => BlockKind::Quote(map_quote(block)),
        "divider" => BlockKind::Divider(map_divider(block)),
        "interactive" => BlockKind::Interactive(map_interactive(block)),
        "audio" => BlockKind::Audio(map_audio(block, now)),
        "youtube" => BlockKind::Youtube(map_youtube(block, now)),
        _ => BlockKind::Text(map_text(block)),
    }
}

/// First non-empty value among `keys`. Numbers and booleans are rendered as
/// text.
fn detail_str(details: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match details.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// The block's content text, falling back to its rendered HTML.
fn content_or_html(block: &RawBlock) -> String {
    non_empty(block.content_str()).unwrap_or_else(|| block.html().to_string())
}

fn detected_table(block: &RawBlock) -> Option<Map<String, Value>> {
    block
        .details
        .get("content")
        .and_then(detect_table_payload)
        .or_else(|| block.content.as_ref().and_then(detect_table_payload))
}

fn map_image(block: &RawBlock) -> ImageBlock {
    let details = &block.details;
    let caption_html = detail_str(details, &["caption_html"]);
    let caption = detail_str(details, &["caption"]);
    let plain = caption
        .clone()
        .or_else(|| caption_html.as_deref().map(strip_all_html))
        .unwrap_or_default();

    ImageBlock {
        image_url: detail_str(details, &["image_url", "imageUrl"]).unwrap_or_default(),
        image_title: detail_str(details, &["alt_text", "altText"]).unwrap_or_default(),
        image_description: plain,
        layout: detail_str(details, &["layout"]).unwrap_or_else(|| "centered".to_string()),
        alignment: detail_str(details, &["alignment"]).unwrap_or_else(|| "left".to_string()),
        template_type: detail_str(details, &["template", "templateType"]),
        text: caption_html.or(caption).unwrap_or_default(),
    }
}

fn map_pdf(block: &RawBlock) -> PdfBlock {
    let details = &block.details;
    PdfBlock {
        pdf_url: detail_str(details, &["pdf_url", "pdfUrl"]).unwrap_or_default(),
        pdf_title: detail_str(details, &["caption", "pdfTitle"])
            .unwrap_or_else(|| "PDF Document".to_string()),
        pdf_description: detail_str(details, &["description", "pdfDescription"])
            .unwrap_or_default(),
    }
}

fn map_video(block: &RawBlock) -> VideoBlock {
    let details = &block.details;
    VideoBlock {
        video_url: detail_str(details, &["video_url", "videoUrl"]).unwrap_or_default(),
        video_title: detail_str(details, &["caption", "videoTitle"]).unwrap_or_default(),
    }
}

fn map_statement(block: &RawBlock) -> StatementBlock {
    StatementBlock {
        statement_type: detail_str(&block.details, &["statement_type", "statementType"])
            .unwrap_or_else(|| "statement-a".to_string()),
        content: content_or_html(block),
    }
}

fn map_table(block: &RawBlock, detected: Option<Map<String, Value>>) -> TableBlock {
    let table_type = detail_str(&block.details, &["table_type", "templateId"])
        .or_else(|| non_empty(block.table_type.clone()))
        .unwrap_or_else(|| "two_columns".to_string());

    let content = match detected {
        Some(table) => Value::Object(table).to_string(),
        None => content_or_html(block),
    };

    TableBlock {
        template_id: table_type.clone(),
        table_type,
        content,
        text_type: TableTextType::Table,
    }
}

fn map_quote(block: &RawBlock) -> QuoteBlock {
    QuoteBlock {
        quote_type: detail_str(&block.details, &["quote_type", "quoteType", "textType"])
            .or_else(|| non_empty(block.text_type.clone()))
            .unwrap_or_else(|| "quote_a".to_string()),
        content: content_or_html(block),
    }
}

fn map_divider(block: &RawBlock) -> DividerBlock {
    let subtype = detail_str(&block.details, &["divider_type"]).unwrap_or_else(|| {
        infer_divider_subtype(block.html())
            .unwrap_or(DividerSubtype::Continue)
            .as_str()
            .to_string()
    });

    DividerBlock {
        subtype,
        content: content_or_html(block),
    }
}

fn parse_content_object(block: &RawBlock) -> Option<Map<String, Value>> {
    match block.content.as_ref()? {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                log::warn!(
                    "Could not parse {} block content as JSON ({}); using details instead.",
                    block.type_tag(),
                    e
                );
                None
            }
        },
        _ => None,
    }
}

fn map_interactive(block: &RawBlock) -> InteractiveBlock {
    let template = non_empty(block.subtype.clone())
        .or_else(|| detail_str(&block.details, &["template"]))
        .or_else(|| parse_content_object(block).and_then(|obj| detail_str(&obj, &["template"])))
        .or_else(|| detect_interactive_template(block.html()).map(|t| t.as_str().to_string()))
        .unwrap_or_else(|| InteractiveTemplate::Accordion.as_str().to_string());

    InteractiveBlock {
        template,
        content: content_or_html(block),
    }
}

fn map_audio(block: &RawBlock, now: DateTime<Utc>) -> AudioBlock {
    let parsed = parse_content_object(block)
        .filter(|obj| obj.contains_key("title") || obj.contains_key("url"));
    let content = match &parsed {
        Some(obj) => audio_from(obj, &["title"], &["description"], &["url"], now),
        None => audio_from(
            &block.details,
            &["audioTitle", "title"],
            &["audioDescription", "description"],
            &["audioUrl", "audio_url"],
            now,
        ),
    };

    AudioBlock { content }
}

fn audio_from(
    source: &Map<String, Value>,
    title_keys: &[&str],
    desc_keys: &[&str],
    url_keys: &[&str],
    now: DateTime<Utc>,
) -> AudioContent {
    AudioContent {
        title: detail_str(source, title_keys).unwrap_or_default(),
        description: detail_str(source, desc_keys).unwrap_or_default(),
        upload_method: detail_str(source, &["uploadMethod"]).unwrap_or_else(|| "url".to_string()),
        url: detail_str(source, url_keys).unwrap_or_default(),
        uploaded_data: source.get("uploadedData").cloned().unwrap_or(Value::Null),
        created_at: detail_str(source, &["createdAt"]).unwrap_or_else(|| iso(now)),
    }
}

fn map_youtube(block: &RawBlock, now: DateTime<Utc>) -> YoutubeBlock {
    let parsed = parse_content_object(block)
        .filter(|obj| detail_str(obj, &["url"]).is_some());
    let mut content = match &parsed {
        Some(obj) => youtube_from(obj, &["title"], &["description"], &["url"], now),
        None => youtube_from(
            &block.details,
            &["youTubeTitle", "title"],
            &["youTubeDescription", "description"],
            &["youTubeUrl", "youtube_url"],
            now,
        ),
    };

    if content.url.is_empty() {
        if let Some(found) = extract_youtube_url(block.html()) {
            content.url = found.url;
            content.video_id = found.video_id;
            content.embed_url = found.embed_url;
        }
    }

    if content.video_id.is_empty() {
        if let Some(id) = youtube_video_id(&content.url) {
            content.video_id = id;
        }
    }
    if content.embed_url.is_empty() && !content.video_id.is_empty() {
        content.embed_url = format!("https://www.youtube.com/embed/{}", content.video_id);
    }

    YoutubeBlock { content }
}

fn youtube_from(
    source: &Map<String, Value>,
    title_keys: &[&str],
    desc_keys: &[&str],
    url_keys: &[&str],
    now: DateTime<Utc>,
) -> YoutubeContent {
    YoutubeContent {
        title: detail_str(source, title_keys).unwrap_or_default(),
        description: detail_str(source, desc_keys).unwrap_or_default(),
        url: detail_str(source, url_keys).unwrap_or_default(),
        video_id: detail_str(source, &["videoId"]).unwrap_or_default(),
        embed_url: detail_str(source, &["embedUrl"]).unwrap_or_default(),
        created_at: detail_str(source, &["createdAt"]).unwrap_or_else(|| iso(now)),
    }
}

fn map_text(block: &RawBlock) -> TextBlock {
    let html = non_empty(block.html_css.clone())
        .or_else(|| non_empty(block.content_str()))
        .unwrap_or_default();

    // First non-generic text type, top-level before details.
    let explicit = block
        .text_type
        .clone()
        .into_iter()
        .chain(detail_str(&block.details, &["textType"]))
        .chain(detail_str(&block.details, &["text_type"]))
        .find(|t| explicit_text_type(Some(t.as_str())).is_some());
    let gradient_flag = block.gradient.unwrap_or(false)
        || block.details.get("gradient").and_then(Value::as_bool).unwrap_or(false);

    let (text_type, gradient) = resolve_text_type(explicit.as_deref(), gradient_flag, &html);

    TextBlock {
        text_type,
        content: html,
        gradient: gradient.then_some(true),
    }
}

fn iso(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}
