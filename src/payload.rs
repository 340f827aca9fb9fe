//! Decoding of raw Zotero items into LIDIA records.
//!
//! A LIDIA annotation is an ordinary Zotero annotation whose comment starts
//! with [`LIDIA_PREFIX`] followed by a YAML mapping:
//!
//! ```text
//! ~~~~LIDIA~~~~
//! lidiaId: a1b2
//! argname: Binding principle A
//! arglang: nld
//! relationType: supports
//! relationTo: c3d4
//! termgroups:
//!   - termtype: definiendum
//!     articleterm: anaphor
//!     lexiconterm: anaphor
//! ```
//!
//! Decoding is permissive: missing keys take defaults and scalars of any
//! type are read as strings. Only a missing prefix, undecodable YAML or a
//! value outside an enumerated set rejects the item.

use serde_json::{Map, Value};

use crate::error::IngestError;
use crate::models::{
    Annotation, BaseFields, Continuation, LidiaRecord, Publication, RawItem, RelationType,
    SortIndex, TermGroupEntry, TermType, Vocab,
};

pub const LIDIA_PREFIX: &str = "~~~~LIDIA~~~~";

/// Language code used when the payload names none.
pub const UNSPECIFIED_LANGUAGE: &str = "unspecified";

/// Strip the sentinel and decode the remainder as a mapping.
///
/// An empty payload decodes to an empty mapping.
pub fn decode_comment(comment: &str) -> Result<Map<String, Value>, IngestError> {
    let body = comment
        .strip_prefix(LIDIA_PREFIX)
        .ok_or(IngestError::NotLidia)?;

    if body.trim().is_empty() {
        return Ok(Map::new());
    }

    let yaml: serde_yaml::Value = serde_yaml::from_str(body)
        .map_err(|e| IngestError::MalformedPayload(format!("YAML parse error: {}", e)))?;

    let json = serde_json::to_value(yaml).map_err(|e| {
        IngestError::MalformedPayload(format!("YAML to JSON conversion failed: {}", e))
    })?;

    match json {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(IngestError::MalformedPayload(format!(
            "expected a mapping, found {}",
            value_kind(&other)
        ))),
    }
}

/// Decode a raw annotation item into an annotation or a continuation.
pub fn parse_annotation_item(item: &RawItem) -> Result<LidiaRecord, IngestError> {
    let data = item.content.get("data").unwrap_or(&Value::Null);
    let comment = data
        .get("annotationComment")
        .and_then(Value::as_str)
        .unwrap_or("");
    let anno = decode_comment(comment)?;

    let lidia_id = ident(&anno, "lidiaId").unwrap_or_else(|| item.zotero_id.clone());

    let parent_attachment = data
        .get("parentItem")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| attachment_href(&item.content).and_then(attachment_id_from_url));

    let base = BaseFields {
        lidia_id,
        zotero_annotation: Some(item.zotero_id.clone()),
        parent_attachment,
        textselection: data
            .get("annotationText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        sort_index: SortIndex::new(
            data.get("annotationSortIndex")
                .and_then(Value::as_str)
                .unwrap_or(""),
        ),
    };

    if anno.get("argcont").map(truthy).unwrap_or(false) {
        return Ok(LidiaRecord::Continuation(Continuation { base }));
    }

    let relation_type = match ident(&anno, "relationType") {
        Some(s) => s.parse::<RelationType>().map_err(|v| IngestError::InvalidField {
            field: "relationType",
            value: v,
        })?,
        None => RelationType::None,
    };

    Ok(LidiaRecord::Annotation(Annotation {
        base,
        argname: scalar(&anno, "argname").unwrap_or_default(),
        arglang: ident(&anno, "arglang").unwrap_or_else(|| UNSPECIFIED_LANGUAGE.to_string()),
        description: scalar(&anno, "description").unwrap_or_default(),
        page_start: scalar(&anno, "pagestart"),
        page_end: scalar(&anno, "pageend"),
        relation_type,
        relation_to: ident(&anno, "relationTo"),
        termgroups: parse_termgroups(anno.get("termgroups"))?,
    }))
}

fn parse_termgroups(value: Option<&Value>) -> Result<Vec<TermGroupEntry>, IngestError> {
    let entries = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(IngestError::MalformedPayload(format!(
                "termgroups must be a list, found {}",
                value_kind(other)
            )))
        }
    };

    let empty = Map::new();
    let mut groups = Vec::with_capacity(entries.len());
    for entry in entries {
        let tg = match entry {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(IngestError::MalformedPayload(format!(
                    "termgroup entry must be a mapping, found {}",
                    value_kind(other)
                )))
            }
        };

        let termtype = match ident(tg, "termtype") {
            Some(s) => s.parse::<TermType>().map_err(|v| IngestError::InvalidField {
                field: "termtype",
                value: v,
            })?,
            None => TermType::Undefined,
        };

        let category = match scalar(tg, "category") {
            Some(c) if c == "custom" => scalar(tg, "customcategory").or(Some(c)),
            other => other,
        };

        let lexiconterm = match scalar(tg, "lexiconterm") {
            Some(t) if t == "custom" => scalar(tg, "customterm").map(|c| (Vocab::Custom, c)),
            Some(t) => Some((Vocab::Lol, t)),
            None => None,
        };

        groups.push(TermGroupEntry {
            termtype,
            articleterm: scalar(tg, "articleterm"),
            category,
            lexiconterm,
        });
    }
    Ok(groups)
}

/// Decode a raw publication item. A missing attachment link leaves
/// `attachment_id` empty.
pub fn parse_publication_item(item: &RawItem) -> Publication {
    let title = item
        .content
        .get("data")
        .and_then(|d| d.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Publication {
        zotero_id: item.zotero_id.clone(),
        attachment_id: attachment_href(&item.content).and_then(attachment_id_from_url),
        title,
    }
}

fn attachment_href(content: &Value) -> Option<&str> {
    content
        .get("links")?
        .get("attachment")?
        .get("href")?
        .as_str()
}

/// Last path segment of an attachment URL.
pub fn attachment_id_from_url(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a scalar as a non-empty string, text kept as authored.
fn scalar(map: &Map<String, Value>, key: &str) -> Option<String> {
    let s = match map.get(key)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Identifiers and enumerated values: trimmed, empty means absent.
fn ident(map: &Map<String, Value>, key: &str) -> Option<String> {
    scalar(map, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
