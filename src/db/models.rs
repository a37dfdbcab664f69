use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Coarse classification of a page, derived from its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Schema,
    Tutorial,
    Guide,
    Reference,
}

impl ContentType {
    pub fn from_category(category: &str) -> Self {
        match category {
            "schema" => ContentType::Schema,
            "tutorials" => ContentType::Tutorial,
            "develop" | "usage" => ContentType::Guide,
            _ => ContentType::Reference,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Schema => "schema",
            ContentType::Tutorial => "tutorial",
            ContentType::Guide => "guide",
            ContentType::Reference => "reference",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Query,
    Mutation,
    Type,
    Interface,
    Union,
}

impl ElementKind {
    pub const ALL: [ElementKind; 5] = [
        ElementKind::Query,
        ElementKind::Mutation,
        ElementKind::Type,
        ElementKind::Interface,
        ElementKind::Union,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Query => "query",
            ElementKind::Mutation => "mutation",
            ElementKind::Type => "type",
            ElementKind::Interface => "interface",
            ElementKind::Union => "union",
        }
    }

    /// Case-insensitive lookup used for tool-call filters.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fenced code block, owned by its document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
    pub context: Option<String>,
    pub line_number: usize,
}

/// A heuristically detected schema declaration, owned by its document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlElement {
    pub kind: ElementKind,
    pub name: String,
    pub fields: Vec<String>,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub description: Option<String>,
    pub searchable_text: String,
}

/// A parsed markdown page together with everything extracted from it.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub file_path: String,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub content_type: ContentType,
    pub headers: Vec<String>,
    pub content_md: String,
    pub last_modified: DateTime<Utc>,
    pub searchable_text: String,
    pub code_blocks: Vec<CodeBlock>,
    pub elements: Vec<GraphQlElement>,
}

/// A stored document as returned by `get_document`.
///
/// `content_type` is kept as text: it is whatever the indexer wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub file_path: String,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub content_type: String,
    pub headers: Vec<String>,
    pub content_md: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub file_path: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHit {
    pub document: DocumentSummary,
    /// bm25 score; lower is more relevant. Substring fallback hits carry `f64::MAX`.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementHit {
    pub kind: String,
    pub name: String,
    pub fields: Vec<String>,
    pub parameters: Vec<String>,
    pub file_path: String,
    pub document_title: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementDetails {
    pub kind: String,
    pub name: String,
    pub fields: Vec<String>,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub description: Option<String>,
    pub file_path: String,
    pub document_title: String,
    pub examples: Vec<CodeBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeExample {
    pub file_path: String,
    pub document_title: String,
    pub block: CodeBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubcategoryCount {
    /// `None` collects the documents that sit directly under the category.
    pub name: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryNode {
    pub name: String,
    pub total: usize,
    pub subcategories: Vec<SubcategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TutorialStep {
    pub document: DocumentSummary,
    pub examples: Vec<CodeBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedDocument {
    pub document: DocumentSummary,
    pub same_category: bool,
    pub shared_keywords: usize,
    pub score: i64,
}

/// Snapshot record written at the end of every successful ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionMetadata {
    pub fingerprint: String,
    pub total_documents: usize,
    pub ingested_at: DateTime<Utc>,
}
