/// YAML frontmatter splitting and decoding for Markdown pages.
///
/// Only the keys the index uses are decoded; everything else in the block is ignored.
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("frontmatter not closed")]
    NotClosed,

    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Deserialize, Default)]
struct RawMetadata {
    title: Option<String>,
    description: Option<String>,
    /// Usually a list, but single values show up too, and YAML types bare
    /// words like `2.4` or `yes` as scalars rather than strings.
    keywords: Option<serde_yaml::Value>,
}

fn keyword_list(value: serde_yaml::Value) -> Vec<String> {
    match value {
        serde_yaml::Value::Sequence(items) => items.into_iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => scalar_text(tagged.value),
        _ => None,
    }
}

/// Metadata decoded from a frontmatter block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

/// Split frontmatter from markdown content. Returns `(Option<Metadata>, body)`.
///
/// Content without a leading `---` line has no frontmatter; that is not an error.
pub fn parse(content: &str) -> Result<(Option<Metadata>, String), FrontmatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');

    match lines.next() {
        Some(first) if first.trim() == "---" => {}
        _ => return Ok((None, content.to_string())),
    }

    // Byte offsets keep the body exactly as written, line endings included.
    let yaml_start = content.find('\n').map_or(content.len(), |i| i + 1);
    let mut offset = yaml_start;
    let mut split = None;
    for line in lines {
        if line.trim() == "---" {
            split = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let (yaml_end, body_start) = split.ok_or(FrontmatterError::NotClosed)?;

    let yaml = &content[yaml_start..yaml_end];
    let body = &content[body_start..];

    let raw: RawMetadata = if yaml.trim().is_empty() {
        RawMetadata::default()
    } else {
        serde_yaml::from_str(yaml)?
    };

    let keywords = raw
        .keywords
        .map(keyword_list)
        .unwrap_or_default()
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    let metadata = Metadata {
        title: non_empty(raw.title),
        description: non_empty(raw.description),
        keywords,
    };

    Ok((Some(metadata), body.to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
