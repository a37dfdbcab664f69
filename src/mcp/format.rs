//! Markdown rendering of query results for tool responses.
use crate::db::models::{
    CategoryNode, CodeBlock, CodeExample, DocumentHit, DocumentSummary, ElementDetails,
    ElementHit, RelatedDocument, StoredDocument, TutorialStep,
};

const SEPARATOR: &str = "\n---\n\n";
const NONE: &str = "None";

/// At most `max` characters of `text`, cut on a character boundary.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n... (truncated)", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn category_path(category: &str, subcategory: Option<&str>) -> String {
    match subcategory {
        Some(sub) => format!("{category}/{sub}"),
        None => category.to_string(),
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items.join(", ")
    }
}

fn code_fence(block: &CodeBlock, max_preview: usize) -> String {
    format!(
        "```{}\n{}\n```",
        block.language,
        preview(&block.code, max_preview)
    )
}

fn summary_lines(doc: &DocumentSummary) -> Vec<String> {
    vec![
        format!("### {}", doc.title),
        format!("**Path:** {}", doc.file_path),
        format!(
            "**Category:** {}",
            category_path(&doc.category, doc.subcategory.as_deref())
        ),
        format!("**Type:** {}", doc.content_type),
    ]
}

pub fn search_results(hits: &[DocumentHit], queries: &[String]) -> String {
    if hits.is_empty() {
        return format!(
            "No matching documentation found for: {}",
            queries.join(", ")
        );
    }
    hits.iter()
        .map(|hit| {
            let mut lines = summary_lines(&hit.document);
            if let Some(d) = &hit.document.description {
                lines.push(format!("**Description:** {d}"));
            }
            lines.join("\n") + "\n"
        })
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub fn document(doc: &StoredDocument) -> String {
    let mut lines = vec![
        format!("# {}", doc.title),
        String::new(),
        format!("**Path:** {}", doc.file_path),
        format!(
            "**Category:** {}",
            category_path(&doc.category, doc.subcategory.as_deref())
        ),
        format!("**Type:** {}", doc.content_type),
        format!("**Keywords:** {}", list_or_none(&doc.keywords)),
        format!("**Last modified:** {}", doc.last_modified.to_rfc3339()),
        String::new(),
    ];
    if let Some(d) = &doc.description {
        lines.push(format!("**Description:** {d}"));
        lines.push(String::new());
    }
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(doc.content_md.clone());
    lines.join("\n")
}

pub fn document_not_found(file_path: &str) -> String {
    format!(
        "Document not found: {file_path}\n\nTip: Use search_documentation to find the correct file path."
    )
}

pub fn element_hits(hits: &[ElementHit], keyword: &str) -> String {
    if hits.is_empty() {
        return format!("No GraphQL elements found matching: {keyword}");
    }
    hits.iter()
        .map(|e| {
            format!(
                "### `{}` **{}**\n**Source:** {} ({})\n**Fields:** {}\n**Parameters:** {}\n",
                e.kind,
                e.name,
                e.document_title,
                e.file_path,
                list_or_none(&e.fields),
                list_or_none(&e.parameters)
            )
        })
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub fn element_details(details: &[ElementDetails], name: &str, max_preview: usize) -> String {
    if details.is_empty() {
        return format!(
            "GraphQL element not found: {name}\n\nTip: Use search_graphql_elements to find similar elements."
        );
    }
    details
        .iter()
        .map(|e| {
            let mut lines = vec![format!("# `{}` **{}**", e.kind, e.name), String::new()];
            if !e.parameters.is_empty() {
                lines.push(format!("**Parameters:** {}", e.parameters.join(", ")));
            }
            if !e.fields.is_empty() {
                lines.push(format!("**Fields:** {}", e.fields.join(", ")));
            }
            if let Some(rt) = &e.return_type {
                lines.push(format!("**Returns:** {rt}"));
            }
            if let Some(d) = &e.description {
                lines.push(format!("**Description:** {d}"));
            }
            lines.push(format!("**Source Document:** {}", e.document_title));
            lines.push(format!("**Path:** {}", e.file_path));
            lines.push(String::new());
            if !e.examples.is_empty() {
                lines.push("**Example Code:**".to_string());
                lines.push(String::new());
                for block in &e.examples {
                    lines.push(code_fence(block, max_preview));
                    lines.push(String::new());
                }
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub fn categories(tree: &[CategoryNode]) -> String {
    if tree.is_empty() {
        return "No documents indexed.".to_string();
    }
    let mut lines = vec!["# Documentation Categories".to_string(), String::new()];
    for node in tree {
        lines.push(format!("## {} ({} documents)", node.name, node.total));
        lines.push(String::new());
        for sub in &node.subcategories {
            lines.push(format!(
                "  - `{}`: {} documents",
                sub.name.as_deref().unwrap_or("(top level)"),
                sub.count
            ));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn tutorial(name: &str, steps: &[TutorialStep], max_preview: usize) -> String {
    if steps.is_empty() {
        return format!(
            "Tutorial not found: {name}\n\nTip: Use list_categories to see the available tutorials."
        );
    }
    let mut lines = vec![format!("# {} Tutorial", capitalize(name)), String::new()];
    for (i, step) in steps.iter().enumerate() {
        lines.push(format!("## Step {}: {}", i + 1, step.document.title));
        lines.push(String::new());
        lines.push(format!("**File:** {}", step.document.file_path));
        lines.push(String::new());
        if let Some(d) = &step.document.description {
            lines.push(d.clone());
            lines.push(String::new());
        }
        for block in &step.examples {
            lines.push(code_fence(block, max_preview));
            lines.push(String::new());
        }
        lines.push("---".to_string());
        lines.push(String::new());
    }
    lines.join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn examples(hits: &[CodeExample], keyword: &str, max_preview: usize) -> String {
    if hits.is_empty() {
        return format!("No code examples found matching: {keyword}");
    }
    hits.iter()
        .map(|ex| {
            let language = if ex.block.language.is_empty() {
                "unknown"
            } else {
                ex.block.language.as_str()
            };
            let mut out = format!(
                "### {}\n**File:** {} (line {})\n**Language:** {}\n",
                ex.document_title, ex.file_path, ex.block.line_number, language
            );
            if let Some(ctx) = &ex.block.context {
                out.push_str(&format!("**Context:** {ctx}\n"));
            }
            out.push('\n');
            out.push_str(&code_fence(&ex.block, max_preview));
            out.push('\n');
            out
        })
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

pub fn related(file_path: &str, related: &[RelatedDocument]) -> String {
    if related.is_empty() {
        return format!("No related documents found for: {file_path}");
    }
    let mut lines = vec![format!("# Related Documents for: {file_path}"), String::new()];
    for r in related {
        let mut reasons = Vec::new();
        if r.same_category {
            reasons.push("Same category".to_string());
        }
        if r.shared_keywords > 0 {
            reasons.push(format!("{} shared keyword(s)", r.shared_keywords));
        }
        lines.extend(summary_lines(&r.document));
        lines.push(format!("**Relationship:** {}", reasons.join(", ")));
        if let Some(d) = &r.document.description {
            lines.push(format!("**Description:** {}", preview(d, 150)));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SubcategoryCount;

    fn summary(path: &str, title: &str) -> DocumentSummary {
        DocumentSummary {
            file_path: path.into(),
            title: title.into(),
            description: None,
            category: "schema".into(),
            subcategory: Some("cart".into()),
            content_type: "schema".into(),
        }
    }

    fn block(code: &str) -> CodeBlock {
        CodeBlock {
            language: "graphql".into(),
            code: code.into(),
            context: Some("Example request".into()),
            line_number: 4,
        }
    }

    #[test]
    fn test_preview_cuts_on_char_boundary() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 6), "abcdef");
        assert_eq!(preview("ééééé", 2), "éé\n... (truncated)");
    }

    #[test]
    fn test_empty_results_are_explicit() {
        assert_eq!(
            search_results(&[], &["zzz".into(), "yyy".into()]),
            "No matching documentation found for: zzz, yyy"
        );
        assert!(element_hits(&[], "cart").contains("cart"));
        assert!(element_details(&[], "Cart", 10).starts_with("GraphQL element not found: Cart"));
        assert!(tutorial("nope", &[], 10).starts_with("Tutorial not found: nope"));
        assert!(examples(&[], "x", 10).starts_with("No code examples"));
        assert!(related("a.md", &[]).starts_with("No related documents"));
        assert_eq!(categories(&[]), "No documents indexed.");
    }

    #[test]
    fn test_search_results() {
        let hits = vec![
            DocumentHit {
                document: summary("schema/cart/a.md", "A"),
                score: -1.0,
            },
            DocumentHit {
                document: summary("schema/cart/b.md", "B"),
                score: -0.5,
            },
        ];
        let out = search_results(&hits, &["cart".into()]);
        assert!(out.starts_with("### A\n**Path:** schema/cart/a.md\n**Category:** schema/cart"));
        assert_eq!(out.matches("---").count(), 1);
    }

    #[test]
    fn test_tutorial_steps_numbered() {
        let steps = vec![
            TutorialStep {
                document: summary("tutorials/checkout/1.md", "Create cart"),
                examples: vec![block("mutation { createEmptyCart }")],
            },
            TutorialStep {
                document: summary("tutorials/checkout/2.md", "Add items"),
                examples: vec![],
            },
        ];
        let out = tutorial("checkout", &steps, 400);
        assert!(out.starts_with("# Checkout Tutorial"));
        assert!(out.contains("## Step 1: Create cart"));
        assert!(out.contains("## Step 2: Add items"));
        assert!(out.contains("```graphql\nmutation { createEmptyCart }\n```"));
    }

    #[test]
    fn test_examples_truncate_code() {
        let hit = CodeExample {
            file_path: "schema/cart/a.md".into(),
            document_title: "A".into(),
            block: block(&"x".repeat(50)),
        };
        let out = examples(&[hit], "x", 10);
        assert!(out.contains("**Context:** Example request"));
        assert!(out.contains(&format!("{}\n... (truncated)\n```", "x".repeat(10))));
    }

    #[test]
    fn test_categories_tree() {
        let tree = vec![CategoryNode {
            name: "schema".into(),
            total: 3,
            subcategories: vec![
                SubcategoryCount {
                    name: None,
                    count: 1,
                },
                SubcategoryCount {
                    name: Some("cart".into()),
                    count: 2,
                },
            ],
        }];
        let out = categories(&tree);
        assert!(out.contains("## schema (3 documents)"));
        assert!(out.contains("  - `(top level)`: 1 documents"));
        assert!(out.contains("  - `cart`: 2 documents"));
    }

    #[test]
    fn test_related_relationship() {
        let r = RelatedDocument {
            document: summary("schema/cart/b.md", "B"),
            same_category: true,
            shared_keywords: 2,
            score: 4,
        };
        let out = related("schema/cart/a.md", &[r]);
        assert!(out.contains("**Relationship:** Same category, 2 shared keyword(s)"));
    }
}
