use crate::indexer::ParseError;
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// A markdown file found under the documentation root.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Root-relative, `/`-separated.
    pub rel_path: String,
    pub modified: DateTime<Utc>,
    pub len: u64,
}

#[derive(Debug, Default)]
pub struct Corpus {
    pub files: Vec<SourceFile>,
    /// Entries that could not be stat'ed or collided with an earlier relative path.
    pub skipped: usize,
}

/// Recursively collects `*.md` files under `root` in a stable, name-sorted order.
///
/// Hidden files and ignore files are not honoured: the whole tree is documentation.
pub fn discover(root: &Path) -> Corpus {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut corpus = Corpus::default();
    let mut seen = HashSet::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                corpus.skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) || !is_markdown(path) {
            continue;
        }

        let rel_path = match relative_path(root, path) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("{}", e);
                corpus.skipped += 1;
                continue;
            }
        };
        if !seen.insert(rel_path.clone()) {
            tracing::warn!("Duplicate document path {}, keeping the first one", rel_path);
            corpus.skipped += 1;
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", rel_path, e);
                corpus.skipped += 1;
                continue;
            }
        };
        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(t) => t.into(),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", rel_path, e);
                corpus.skipped += 1;
                continue;
            }
        };

        corpus.files.push(SourceFile {
            path: path.to_path_buf(),
            rel_path,
            modified,
            len: metadata.len(),
        });
    }

    corpus
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// Root-relative path with `/` separators regardless of platform.
pub fn relative_path(root: &Path, path: &Path) -> Result<String, ParseError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| ParseError::OutsideRoot(path.display().to_string()))?;

    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

/// Content fingerprint of a corpus: every file's relative path, mtime and size,
/// salted with the settings that change what ingestion produces.
pub fn fingerprint(files: &[SourceFile], salt: &str) -> String {
    let mut ordered: Vec<&SourceFile> = files.iter().collect();
    ordered.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"\n");
    for f in ordered {
        hasher.update(f.rel_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(f.modified.timestamp().to_le_bytes());
        hasher.update(f.modified.timestamp_subsec_nanos().to_le_bytes());
        hasher.update(f.len.to_le_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discover_sorted_markdown_only() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("schema/products")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("schema/products/b.md"), "b").unwrap();
        fs::write(root.join("schema/products/a.md"), "a").unwrap();
        fs::write(root.join("index.md"), "i").unwrap();
        fs::write(root.join("notes.txt"), "n").unwrap();
        fs::write(root.join(".hidden/secret.md"), "h").unwrap();
        fs::write(root.join(".gitignore"), "index.md\n").unwrap();

        let corpus = discover(root);
        let rels: Vec<&str> = corpus.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(
            rels,
            vec![".hidden/secret.md", "index.md", "schema/products/a.md", "schema/products/b.md"]
        );
        assert_eq!(corpus.skipped, 0);
        assert_eq!(corpus.files[1].len, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_duplicate_rel_path_first_wins() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        // both names decode to "a\u{FFFD}.md"
        let first = root.join(OsStr::from_bytes(b"a\xfe.md"));
        let second = root.join(OsStr::from_bytes(b"a\xff.md"));
        fs::write(&second, "second").unwrap();
        fs::write(&first, "first").unwrap();
        fs::write(root.join("b.md"), "b").unwrap();

        let corpus = discover(root);
        let rels: Vec<&str> = corpus.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["a\u{FFFD}.md", "b.md"]);
        assert_eq!(corpus.files[0].path, first);
        assert_eq!(corpus.skipped, 1);
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let corpus = discover(&dir.path().join("nope"));
        assert!(corpus.files.is_empty());
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/docs");
        assert_eq!(
            relative_path(root, Path::new("/docs/schema/cart/index.md")).unwrap(),
            "schema/cart/index.md"
        );
        assert!(matches!(
            relative_path(root, Path::new("/elsewhere/a.md")),
            Err(ParseError::OutsideRoot(_))
        ));
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let file = |rel: &str, len: u64| SourceFile {
            path: PathBuf::from(rel),
            rel_path: rel.to_string(),
            modified: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            len,
        };
        let a = vec![file("a.md", 10), file("b.md", 20)];
        let reordered = vec![file("b.md", 20), file("a.md", 10)];
        let resized = vec![file("a.md", 11), file("b.md", 20)];

        let base = fingerprint(&a, "graphql:20");
        assert_eq!(base.len(), 64);
        assert_eq!(base, fingerprint(&reordered, "graphql:20"));
        assert_ne!(base, fingerprint(&resized, "graphql:20"));
        assert_ne!(base, fingerprint(&a, "graphql:10"));
        assert_ne!(base, fingerprint(&a[..1], "graphql:20"));
    }
}
