//! Best-effort recovery of block metadata from legacy rendered HTML.
//!
//! Every function here is a fallback tier: callers consult explicit block
//! metadata first and only reach for these when it is missing. None of them
//! are guaranteed correct for arbitrary markup.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::models::TextType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DividerSubtype {
    Continue,
    NumberedDivider,
    Divider,
}

impl DividerSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            DividerSubtype::Continue => "continue",
            DividerSubtype::NumberedDivider => "numbered_divider",
            DividerSubtype::Divider => "divider",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveTemplate {
    Accordion,
    Tabs,
    LabeledGraphic,
}

impl InteractiveTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractiveTemplate::Accordion => "accordion",
            InteractiveTemplate::Tabs => "tabs",
            InteractiveTemplate::LabeledGraphic => "labeled-graphic",
        }
    }
}

fn has_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Guesses a divider's subtype from its rendered markup.
pub fn infer_divider_subtype(html: &str) -> Option<DividerSubtype> {
    let html = html.to_lowercase();
    if html.trim().is_empty() {
        return None;
    }

    let clickable = has_any(&html, &["cursor-pointer", "letter-spacing"]);
    let coloured = has_any(&html, &["bg-", "background-color", "background:"]);
    if clickable && coloured {
        return Some(DividerSubtype::Continue);
    }

    let circle = has_any(&html, &["rounded-full", "border-radius: 50%", "border-radius:50%"]);
    let rule = has_any(&html, &["<hr", "border-top"]);
    if circle && rule {
        return Some(DividerSubtype::NumberedDivider);
    }

    if rule {
        return Some(DividerSubtype::Divider);
    }

    None
}

/// Looks for the marker attributes each interactive template renders.
pub fn detect_interactive_template(html: &str) -> Option<InteractiveTemplate> {
    let html = html.to_lowercase();
    if has_any(&html, &["data-template=\"accordion\"", "data-template='accordion'"]) {
        Some(InteractiveTemplate::Accordion)
    } else if html.contains("tab-button") {
        Some(InteractiveTemplate::Tabs)
    } else if has_any(
        &html,
        &["data-template=\"labeled-graphic\"", "data-template='labeled-graphic'"],
    ) {
        Some(InteractiveTemplate::LabeledGraphic)
    } else {
        None
    }
}

/// Tag and class signals relevant to text-type inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtmlSignals {
    pub has_h1: bool,
    pub has_h2: bool,
    pub has_p: bool,
    pub gradient: bool,
    pub large_heading: bool,
}

fn tag_regex(slot: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    slot.get_or_init(|| Regex::new(pattern).expect("static tag pattern"))
}

pub fn sniff_html(html: &str) -> HtmlSignals {
    static H1: OnceLock<Regex> = OnceLock::new();
    static H2: OnceLock<Regex> = OnceLock::new();
    static P: OnceLock<Regex> = OnceLock::new();

    let lower = html.to_lowercase();
    let has_h1 = tag_regex(&H1, r"<h1[\s>/]").is_match(&lower);
    HtmlSignals {
        has_h1,
        has_h2: tag_regex(&H2, r"<h2[\s>/]").is_match(&lower),
        has_p: tag_regex(&P, r"<p[\s>/]").is_match(&lower),
        gradient: has_any(&lower, &["linear-gradient", "bg-gradient-to-r", "gradient"]),
        large_heading: has_h1 || has_any(&lower, &["text-3xl", "text-4xl", "font-extrabold"]),
    }
}

/// A gradient-styled large heading is the editor's "master heading".
pub fn is_master_heading(signals: &HtmlSignals) -> bool {
    signals.gradient && signals.large_heading
}

/// Text type from tag combination alone.
pub fn infer_text_type(signals: &HtmlSignals) -> TextType {
    match (signals.has_h1, signals.has_h2, signals.has_p) {
        (true, _, true) => TextType::HeadingParagraph,
        (false, true, true) => TextType::SubheadingParagraph,
        (true, _, false) => TextType::Heading,
        (false, true, false) => TextType::Subheading,
        _ => TextType::Paragraph,
    }
}

/// An explicit backend text type, ignoring the generic tags that carry no
/// information.
pub fn explicit_text_type(raw: Option<&str>) -> Option<TextType> {
    match TextType::parse(raw?)? {
        TextType::Paragraph => None,
        other => Some(other),
    }
}

/// Resolves a text block's type. Returns the type and whether the block is
/// rendered with a gradient.
pub fn resolve_text_type(
    explicit: Option<&str>,
    gradient_flag: bool,
    html: &str,
) -> (TextType, bool) {
    if let Some(text_type) = explicit_text_type(explicit) {
        return (text_type, text_type == TextType::MasterHeading || gradient_flag);
    }

    let signals = sniff_html(html);
    if gradient_flag || is_master_heading(&signals) {
        return (TextType::MasterHeading, true);
    }

    (infer_text_type(&signals), false)
}

/// A YouTube video located in markup or a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoutubeMatch {
    pub url: String,
    pub video_id: String,
    pub embed_url: String,
}

impl YoutubeMatch {
    fn from_id(url: String, video_id: &str) -> Self {
        YoutubeMatch {
            url,
            video_id: video_id.to_string(),
            embed_url: format!("https://www.youtube.com/embed/{}", video_id),
        }
    }
}

pub fn youtube_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn youtube_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"https?://(?:www\.)?youtube(?:-nocookie)?\.com/embed/([A-Za-z0-9_-]+)[^"'\s<>]*"#,
            r#"https?://youtu\.be/([A-Za-z0-9_-]+)[^"'\s<>]*"#,
            r#"https?://(?:www\.|m\.)?youtube\.com/watch\?v=([A-Za-z0-9_-]+)[^"'\s<>]*"#,
        ]
        .map(|p| Regex::new(p).expect("static youtube pattern"))
    })
}

/// Scrapes the first YouTube URL out of rendered HTML. Embed URLs are
/// rewritten to the canonical watch URL.
pub fn extract_youtube_url(html: &str) -> Option<YoutubeMatch> {
    let [embed, short, watch] = youtube_patterns();

    if let Some(caps) = embed.captures(html) {
        let id = &caps[1];
        return Some(YoutubeMatch::from_id(youtube_watch_url(id), id));
    }
    for pattern in [short, watch] {
        if let Some(caps) = pattern.captures(html) {
            return Some(YoutubeMatch::from_id(caps[0].to_string(), &caps[1]));
        }
    }
    None
}

/// Video id of any YouTube URL shape the scraper understands.
pub fn youtube_video_id(url: &str) -> Option<String> {
    extract_youtube_url(url).map(|m| m.video_id)
}

/// A `{headers: [...], data: [...]}` payload, either as a JSON object or a
/// string encoding one.
pub fn detect_table_payload(value: &Value) -> Option<Map<String, Value>> {
    let candidate = match value {
        Value::Object(map) => map.clone(),
        Value::String(s) if s.trim_start().starts_with('{') => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => map,
                _ => return None,
            }
        }
        _ => return None,
    };

    let is_array = |key: &str| candidate.get(key).map_or(false, Value::is_array);
    if is_array("headers") && is_array("data") {
        Some(candidate)
    } else {
        None
    }
}
