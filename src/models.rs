//! Core data types for raw items and the normalized annotation schema.
//!
//! Annotations come in two variants that share a common shape
//! ([`BaseFields`]): a full [`Annotation`] and a [`Continuation`] that
//! extends a preceding annotation. Both live in one identity space keyed
//! by `lidia_id`.

use std::fmt;
use std::str::FromStr;

/// An item as fetched from the remote library, before normalization.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub zotero_id: String,
    pub content: serde_json::Value,
}

/// Position of an annotation in its PDF, e.g. `00024|000002|00069`.
///
/// Components are zero-padded so lexicographic order is document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortIndex(pub String);

impl SortIndex {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 1-based page number: first component plus one. `None` when the
    /// index is empty or the component is not numeric.
    pub fn page_number(&self) -> Option<i64> {
        let first = self.0.split('|').next()?.trim();
        first.parse::<i64>().ok().and_then(|p| p.checked_add(1))
    }
}

/// Render a page range: `25` when start equals end, otherwise `25–27`.
pub fn format_page_range(start: i64, end: i64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}\u{2013}{}", start, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Annotation,
    Continuation,
}

impl AnnotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Annotation => "annotation",
            AnnotationKind::Continuation => "continuation",
        }
    }
}

impl FromStr for AnnotationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annotation" => Ok(AnnotationKind::Annotation),
            "continuation" => Ok(AnnotationKind::Continuation),
            other => Err(format!("unknown annotation kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationType {
    #[default]
    None,
    Contradicts,
    Generalizes,
    Invalidates,
    SpecialCase,
    Supports,
}

impl RelationType {
    /// Stored value; the empty string means no relation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::None => "",
            RelationType::Contradicts => "contradicts",
            RelationType::Generalizes => "generalizes",
            RelationType::Invalidates => "invalidates",
            RelationType::SpecialCase => "specialcase",
            RelationType::Supports => "supports",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationType::None => "None",
            RelationType::Contradicts => "Contradicts",
            RelationType::Generalizes => "Generalizes",
            RelationType::Invalidates => "Invalidates",
            RelationType::SpecialCase => "Is a special case of",
            RelationType::Supports => "Supports",
        }
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(RelationType::None),
            "contradicts" => Ok(RelationType::Contradicts),
            "generalizes" => Ok(RelationType::Generalizes),
            "invalidates" => Ok(RelationType::Invalidates),
            "specialcase" => Ok(RelationType::SpecialCase),
            "supports" => Ok(RelationType::Supports),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermType {
    #[default]
    Undefined,
    Definiendum,
    Definiens,
    Other,
}

impl TermType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermType::Undefined => "",
            TermType::Definiendum => "definiendum",
            TermType::Definiens => "definiens",
            TermType::Other => "other",
        }
    }
}

impl FromStr for TermType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(TermType::Undefined),
            "definiendum" => Ok(TermType::Definiendum),
            "definiens" => Ok(TermType::Definiens),
            "other" => Ok(TermType::Other),
            other => Err(other.to_string()),
        }
    }
}

/// Vocabulary a lexicon term belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocab {
    /// Lexicon of Linguistics.
    Lol,
    Custom,
}

impl Vocab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vocab::Lol => "lol",
            Vocab::Custom => "custom",
        }
    }
}

impl fmt::Display for Vocab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by both annotation variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseFields {
    pub lidia_id: String,
    pub zotero_annotation: Option<String>,
    pub parent_attachment: Option<String>,
    pub textselection: String,
    pub sort_index: SortIndex,
}

/// Full annotation as decoded from a LIDIA payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub base: BaseFields,
    pub argname: String,
    pub arglang: String,
    pub description: String,
    pub page_start: Option<String>,
    pub page_end: Option<String>,
    pub relation_type: RelationType,
    pub relation_to: Option<String>,
    pub termgroups: Vec<TermGroupEntry>,
}

/// Extra highlighted passage belonging to a preceding annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Continuation {
    pub base: BaseFields,
}

/// One decoded annotation item.
#[derive(Debug, Clone, PartialEq)]
pub enum LidiaRecord {
    Annotation(Annotation),
    Continuation(Continuation),
}

impl LidiaRecord {
    pub fn base(&self) -> &BaseFields {
        match self {
            LidiaRecord::Annotation(a) => &a.base,
            LidiaRecord::Continuation(c) => &c.base,
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            LidiaRecord::Annotation(_) => AnnotationKind::Annotation,
            LidiaRecord::Continuation(_) => AnnotationKind::Continuation,
        }
    }
}

/// A term group entry with `custom` substitutions already applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermGroupEntry {
    pub termtype: TermType,
    pub articleterm: Option<String>,
    pub category: Option<String>,
    pub lexiconterm: Option<(Vocab, String)>,
}

/// Normalized publication derived from a raw publication item.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub zotero_id: String,
    pub attachment_id: Option<String>,
    pub title: Option<String>,
}
