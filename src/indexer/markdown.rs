use crate::db::models::{CodeBlock, ContentType, Document, GraphQlElement};
use crate::frontmatter;
use crate::indexer::ParseError;
use crate::indexer::graphql::ElementExtractor;
use crate::indexer::source::SourceFile;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::fs;
use std::ops::Range;
use std::path::Path;

/// How far above a fence to look for prose describing the block.
const CONTEXT_LOOKBACK: usize = 5;

/// Builds [`Document`] records from markdown files.
pub struct DocumentParser {
    schema_language: String,
    extractor: Box<dyn ElementExtractor>,
    inline_code: Regex,
    link: Regex,
}

impl DocumentParser {
    pub fn new(
        schema_language: &str,
        extractor: Box<dyn ElementExtractor>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            schema_language: schema_language.to_lowercase(),
            extractor,
            inline_code: Regex::new(r"`([^`\n]+)`")?,
            link: Regex::new(r"!?\[([^\]]*)\]\([^)]*\)")?,
        })
    }

    pub fn parse_file(&self, file: &SourceFile) -> Result<Document, ParseError> {
        let content = fs::read_to_string(&file.path).map_err(|source| ParseError::Io {
            path: file.rel_path.clone(),
            source,
        })?;
        self.parse_content(file, &content)
    }

    pub fn parse_content(&self, file: &SourceFile, content: &str) -> Result<Document, ParseError> {
        let (metadata, body) =
            frontmatter::parse(content).map_err(|source| ParseError::Frontmatter {
                path: file.rel_path.clone(),
                source,
            })?;
        let metadata = metadata.unwrap_or_default();

        let (category, subcategory) = derive_category(&file.rel_path);
        let outline = outline(&body);

        let title = metadata
            .title
            .or_else(|| {
                outline
                    .headers
                    .iter()
                    .find(|(level, _)| *level == HeadingLevel::H1)
                    .map(|(_, text)| text.clone())
            })
            .unwrap_or_else(|| file_stem(&file.rel_path));

        let elements: Vec<GraphQlElement> = outline
            .code_blocks
            .iter()
            .filter(|b| b.language == self.schema_language)
            .flat_map(|b| self.extractor.extract(&b.code))
            .collect();

        let headers: Vec<String> = outline.headers.into_iter().map(|(_, text)| text).collect();
        let searchable_text = build_searchable_text(
            &title,
            metadata.description.as_deref(),
            &metadata.keywords,
            &headers,
            &self.clean_content(&body, &outline.code_ranges),
        );

        Ok(Document {
            file_path: file.rel_path.clone(),
            title,
            description: metadata.description,
            keywords: metadata.keywords,
            content_type: ContentType::from_category(&category),
            category,
            subcategory,
            headers,
            content_md: body,
            last_modified: file.modified,
            searchable_text,
            code_blocks: outline.code_blocks,
            elements,
        })
    }

    /// Prose only: the fenced blocks at `code` (byte ranges into `body`) dropped,
    /// link and inline-code markup unwrapped, whitespace collapsed.
    pub fn clean_content(&self, body: &str, code: &[Range<usize>]) -> String {
        let mut prose = String::with_capacity(body.len());
        let mut pos = 0;
        for range in code {
            prose.push_str(&body[pos..range.start]);
            prose.push(' ');
            pos = range.end;
        }
        prose.push_str(&body[pos..]);

        let text = self.link.replace_all(&prose, "$1");
        let text = self.inline_code.replace_all(&text, "$1");
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// `(category, subcategory)` from a root-relative path.
///
/// Top-level files belong to `root`. The subcategory is the second segment, and
/// only exists when that segment is a directory.
pub fn derive_category(rel_path: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = rel_path.split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [] | [_] => ("root".to_string(), None),
        [category, _] => (category.to_string(), None),
        [category, subcategory, ..] => (category.to_string(), Some(subcategory.to_string())),
    }
}

fn file_stem(rel_path: &str) -> String {
    Path::new(rel_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel_path.to_string())
}

pub fn build_searchable_text(
    title: &str,
    description: Option<&str>,
    keywords: &[String],
    headers: &[String],
    prose: &str,
) -> String {
    let mut parts: Vec<&str> = vec![title];
    parts.extend(description);
    parts.extend(keywords.iter().map(String::as_str));
    parts.extend(headers.iter().map(String::as_str));
    parts.push(prose);
    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct Outline {
    pub headers: Vec<(HeadingLevel, String)>,
    pub code_blocks: Vec<CodeBlock>,
    /// Byte range of each fenced block, fences included.
    pub code_ranges: Vec<Range<usize>>,
}

/// Headings and fenced code blocks of a markdown body, in document order.
pub fn outline(body: &str) -> Outline {
    let lines: Vec<&str> = body.lines().collect();
    let mut outline = Outline::default();

    let mut heading: Option<(HeadingLevel, String)> = None;
    // (language, 1-based fence line, code)
    let mut block: Option<(String, usize, String)> = None;

    for (event, range) in Parser::new_ext(body, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => heading = Some((level, String::new())),
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = heading.take() {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        outline.headers.push((level, text));
                    }
                }
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let language = info
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_lowercase();
                let line = body[..range.start].matches('\n').count() + 1;
                block = Some((language, line, String::new()));
                outline.code_ranges.push(range);
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, line_number, code)) = block.take() {
                    let code = code.trim_end_matches(['\n', '\r']).to_string();
                    outline.code_blocks.push(CodeBlock {
                        language,
                        code,
                        context: block_context(&lines, line_number - 1),
                        line_number,
                    });
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, code)) = block.as_mut() {
                    code.push_str(&text);
                } else if let Some((_, h)) = heading.as_mut() {
                    h.push_str(&text);
                }
            }
            _ => {}
        }
    }

    outline
}

/// Prose just above the fence on line index `fence`: up to five preceding lines,
/// stopping at a blank line or heading once some text has been collected, and
/// always at another fence.
fn block_context(lines: &[&str], fence: usize) -> Option<String> {
    let mut collected: Vec<&str> = Vec::new();
    for line in lines[..fence.min(lines.len())]
        .iter()
        .rev()
        .take(CONTEXT_LOOKBACK)
    {
        let line = line.trim();
        // never reach into the previous code block
        if line.starts_with("```") || line.starts_with("~~~") {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            if !collected.is_empty() {
                break;
            }
            continue;
        }
        collected.push(line);
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    Some(collected.join(" "))
}
