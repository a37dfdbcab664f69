//! Schema-element detection inside GraphQL code samples.
//!
//! Detection is pattern based and best effort: it can both miss declarations and
//! report things that are not declarations. The store and the query layer only
//! depend on [`ElementExtractor`], so a grammar-backed implementation can replace
//! [`HeuristicExtractor`] without touching them.
use crate::db::models::{ElementKind, GraphQlElement};
use regex::Regex;
use std::collections::HashSet;

/// Turns the text of one code block into the schema elements it declares.
pub trait ElementExtractor: Send + Sync {
    fn extract(&self, code: &str) -> Vec<GraphQlElement>;
}

/// Words that open GraphQL syntax rather than name a field.
const RESERVED: &[&str] = &[
    "query",
    "mutation",
    "subscription",
    "fragment",
    "type",
    "interface",
    "union",
    "input",
    "enum",
    "scalar",
    "schema",
    "extend",
    "implements",
    "on",
];

pub struct HeuristicExtractor {
    declaration: Regex,
    field: Regex,
    parameter: Regex,
    max_fields: usize,
}

impl HeuristicExtractor {
    pub fn new(max_fields: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            // query products / type Query / extend type Cart, at the start of a line
            declaration: Regex::new(
                r"(?m)^[ \t]*(?:extend[ \t]+)?(query|mutation|type|interface|union)[ \t]+([A-Za-z_]\w*)",
            )?,
            // identifier followed by `(`, `:` or `{`; group 1 is set for `$var` / `@directive`
            field: Regex::new(r"([$@]?)\b([A-Za-z_]\w*)\s*[(:{]")?,
            // ($search: String)
            parameter: Regex::new(r"\$(\w+)\s*:")?,
            max_fields,
        })
    }

    fn fields(&self, segment: &str, own_name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        for caps in self.field.captures_iter(segment) {
            if fields.len() >= self.max_fields {
                break;
            }
            if !caps[1].is_empty() {
                continue;
            }
            let name = &caps[2];
            if name == own_name || RESERVED.contains(&name) {
                continue;
            }
            if seen.insert(name.to_string()) {
                fields.push(name.to_string());
            }
        }
        fields
    }

    fn parameters(&self, segment: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.parameter
            .captures_iter(segment)
            .map(|caps| caps[1].to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }
}

impl ElementExtractor for HeuristicExtractor {
    fn extract(&self, code: &str) -> Vec<GraphQlElement> {
        // (line start, keyword start, kind, name)
        let declarations: Vec<(usize, usize, ElementKind, &str)> = self
            .declaration
            .captures_iter(code)
            .filter_map(|caps| {
                let keyword = caps.get(1)?;
                let kind = ElementKind::parse(keyword.as_str())?;
                Some((caps.get(0)?.start(), keyword.start(), kind, caps.get(2)?.as_str()))
            })
            .collect();

        let mut elements = Vec::with_capacity(declarations.len());
        for (i, &(line_start, start, kind, name)) in declarations.iter().enumerate() {
            let end = declarations
                .get(i + 1)
                .map_or(code.len(), |&(next, _, _, _)| next);
            let segment = &code[start..end];

            let fields = self.fields(segment, name);
            let parameters = self.parameters(segment);
            let return_type = return_type(segment, name);
            let description = leading_description(&code[..line_start]);

            let mut text = vec![kind.as_str().to_string(), name.to_string()];
            text.extend(fields.iter().cloned());
            text.extend(parameters.iter().cloned());
            if let Some(d) = &description {
                text.push(d.clone());
            }

            elements.push(GraphQlElement {
                kind,
                name: name.to_string(),
                fields,
                parameters,
                return_type,
                description,
                searchable_text: text.join(" "),
            });
        }
        elements
    }
}

/// `name(args): ReturnType` within the element's own segment.
fn return_type(segment: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"\b{}\s*(?:\([^)]*\))?\s*:\s*([\[\]\w!]+)",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(segment).map(|caps| caps[1].to_string())
}

/// SDL description string or `#` comment directly above a declaration.
///
/// A string only counts when it stands alone: the opening quotes start their
/// line, so a field value like `name: "foo"` on the line above is not taken.
fn leading_description(before: &str) -> Option<String> {
    let trimmed = before.trim_end();

    if let Some(rest) = trimmed.strip_suffix("\"\"\"") {
        let open = rest.rfind("\"\"\"")?;
        if !starts_line(rest, open) {
            return None;
        }
        return clean_description(&rest[open + 3..]);
    }

    let last_line = trimmed.lines().last()?.trim();

    if let Some(inner) = last_line
        .strip_prefix('"')
        .and_then(|l| l.strip_suffix('"'))
    {
        if inner.contains('"') {
            return None;
        }
        return clean_description(inner);
    }

    let comment = last_line.strip_prefix('#')?;
    clean_description(comment)
}

/// Only whitespace precedes byte `at` on its line.
fn starts_line(text: &str, at: usize) -> bool {
    let line_start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    text[line_start..at].trim().is_empty()
}

fn clean_description(raw: &str) -> Option<String> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}
