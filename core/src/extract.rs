use crate::model::{Owner, SkipReason};
use crate::store;
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use url::Url;

static IMG_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<img[^>]+src\s*=\s*(?:"(?P<d>[^"]+)"|'(?P<s>[^']+)')"#).unwrap()
});
static SHORTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:gallery|image|wp_image)[^\]]*\]").unwrap());
static IDS_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ids=["']([^"']+)["']"#).unwrap());
static SIZE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)-\d+x\d+\.(?:jpg|jpeg|png|gif|webp|svg)$").unwrap());

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// A value pulled from an owner that might denote an asset, prior to
/// resolution. Provenance is kept so skips can be recorded with the
/// matching reason tag. Variant order is the processing order: an asset
/// reachable through several provenances takes its skip reason from the
/// earliest one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Candidate {
    /// Asset parented to the owner.
    Attachment(i64),
    /// Raw id found in a structured field (numeric leaf or `ID`-keyed map).
    Field(i64),
    /// Image URL string found in a structured field.
    FieldUrl(String),
    /// `src` of an embedded img tag in body, excerpt or a string field.
    Embedded(String),
    /// Id listed in a gallery/image shortcode `ids` attribute.
    Shortcode(i64),
}

impl Candidate {
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            Candidate::Attachment(_) => SkipReason::AttachmentInUse,
            Candidate::Field(_) | Candidate::FieldUrl(_) => SkipReason::AcfFieldInUse,
            Candidate::Embedded(_) => SkipReason::EmbeddedInUse,
            Candidate::Shortcode(_) => SkipReason::ShortcodeInUse,
        }
    }
}

/// Whether a string looks like an image URL. Extension allow-list plus a
/// `-WxH` size-suffix fallback; data URIs are never image URLs here.
pub fn is_image_url(raw: &str) -> bool {
    if raw.is_empty() || raw.starts_with("data:") {
        return false;
    }
    let path = match Url::parse(raw) {
        Ok(parsed) => parsed.path().to_string(),
        // relative URL: strip query/fragment by hand
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    if path.is_empty() {
        return false;
    }
    if let Some(ext) = Path::new(&path).extension().and_then(|e| e.to_str()) {
        if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    SIZE_SUFFIX_RE.is_match(&path)
}

fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().filter(|id| *id > 0),
        Value::String(s) => s.parse::<i64>().ok().filter(|id| *id > 0),
        _ => None,
    }
}

/// Visitor over the field bag: scalars, sequences and maps recurse
/// uniformly, leaves classify as raw ids, embedded-asset maps or image
/// URLs.
fn collect_field_candidates(value: &Value, out: &mut HashSet<Candidate>) {
    match value {
        Value::Number(_) => {
            if let Some(id) = value_as_id(value) {
                out.insert(Candidate::Field(id));
            }
        }
        Value::String(s) => {
            if let Some(id) = value_as_id(value) {
                out.insert(Candidate::Field(id));
            } else if is_image_url(s) {
                out.insert(Candidate::FieldUrl(s.clone()));
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_field_candidates(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(id) = map
                .get("ID")
                .or_else(|| map.get("id"))
                .and_then(value_as_id)
            {
                out.insert(Candidate::Field(id));
            }
            for item in map.values() {
                collect_field_candidates(item, out);
            }
        }
        _ => {}
    }
}

fn collect_text_candidates(text: &str, out: &mut HashSet<Candidate>) {
    for cap in IMG_SRC_RE.captures_iter(text) {
        if let Some(src) = cap.name("d").or_else(|| cap.name("s")) {
            out.insert(Candidate::Embedded(src.as_str().to_string()));
        }
    }
    for shortcode in SHORTCODE_RE.find_iter(text) {
        if let Some(ids) = IDS_ATTR_RE.captures(shortcode.as_str()) {
            for token in ids[1].split(',') {
                if let Ok(id) = token.trim().parse::<i64>() {
                    if id > 0 {
                        out.insert(Candidate::Shortcode(id));
                    }
                }
            }
        }
    }
}

/// Produce the deduplicated candidate set for one owner. Pure read.
pub fn extract(conn: &Connection, owner: &Owner) -> Result<HashSet<Candidate>> {
    let mut out = HashSet::new();
    for id in store::assets_by_parent(conn, owner.id)? {
        out.insert(Candidate::Attachment(id));
    }

    let fields = store::structured_fields(conn, owner.id)?;
    for value in fields.values() {
        collect_field_candidates(value, &mut out);
    }

    let mut sources: Vec<&str> = vec![&owner.body, &owner.excerpt];
    for value in fields.values() {
        if let Value::String(s) = value {
            sources.push(s);
        }
    }
    for text in sources {
        if !text.is_empty() {
            collect_text_candidates(text, &mut out);
        }
    }
    Ok(out)
}

/// Number of media items associated with an owner: parented attachments
/// plus distinct asset references in its structured fields. Backs the
/// pre-deletion warning.
pub fn count_media(conn: &Connection, owner_id: i64) -> Result<usize> {
    let attachments = store::assets_by_parent(conn, owner_id)?.len();
    let fields = store::structured_fields(conn, owner_id)?;
    let mut refs = HashSet::new();
    for value in fields.values() {
        collect_field_candidates(value, &mut refs);
    }
    Ok(attachments + refs.len())
}
