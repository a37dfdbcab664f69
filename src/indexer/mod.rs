pub mod core;
pub mod graphql;
pub mod markdown;
pub mod source;

use crate::frontmatter::FrontmatterError;
use thiserror::Error;

/// Reasons a single markdown file is left out of the index.
///
/// None of these abort an ingestion run; the file is logged and skipped.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Frontmatter {
        path: String,
        #[source]
        source: FrontmatterError,
    },

    #[error("{0} is not under the documentation root")]
    OutsideRoot(String),
}
