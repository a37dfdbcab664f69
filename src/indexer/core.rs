use crate::config::Config;
use crate::db::Db;
use crate::indexer::graphql::{ElementExtractor, HeuristicExtractor};
use crate::indexer::markdown::DocumentParser;
use crate::indexer::source::{self, Corpus};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as TokioMutex;

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub discovered: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub code_blocks: usize,
    pub elements: usize,
    /// The corpus was unchanged and the stored index was kept as is.
    pub fast_path: bool,
    pub fingerprint: String,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

pub struct Indexer {
    pub db: Arc<TokioMutex<Db>>,
    pub root: PathBuf,
    parser: DocumentParser,
    salt: String,
}

impl Indexer {
    pub fn new(db: Arc<TokioMutex<Db>>, root: &Path, config: &Config) -> Result<Self> {
        let extractor = HeuristicExtractor::new(config.max_fields_per_element)
            .context("failed to build schema element patterns")?;
        Self::with_extractor(db, root, config, Box::new(extractor))
    }

    pub fn with_extractor(
        db: Arc<TokioMutex<Db>>,
        root: &Path,
        config: &Config,
        extractor: Box<dyn ElementExtractor>,
    ) -> Result<Self> {
        let parser = DocumentParser::new(&config.schema_language, extractor)
            .context("failed to build markdown patterns")?;
        Ok(Self {
            db,
            root: root.to_path_buf(),
            parser,
            salt: config.ingest_salt(),
        })
    }

    /// Brings the store in line with the documentation root.
    ///
    /// An unchanged corpus (same fingerprint as the last run) leaves the store
    /// untouched unless `force` is set. Otherwise every file is parsed, files that
    /// fail are logged and skipped, and the store contents are replaced in one
    /// transaction.
    pub async fn ingest(&self, force: bool) -> Result<IngestReport> {
        let started = Instant::now();
        anyhow::ensure!(
            self.root.is_dir(),
            "documentation directory {} does not exist",
            self.root.display()
        );

        let Corpus { files, skipped } = source::discover(&self.root);
        let fingerprint = source::fingerprint(&files, &self.salt);
        tracing::info!(
            "Discovered {} markdown files under {}",
            files.len(),
            self.root.display()
        );

        let mut report = IngestReport {
            discovered: files.len() + skipped,
            skipped,
            fingerprint: fingerprint.clone(),
            ..Default::default()
        };

        if !force {
            let db = self.db.lock().await;
            let previous = db.ingestion_metadata()?;
            if previous.is_some_and(|m| m.fingerprint == fingerprint) {
                report.fast_path = true;
                report.parsed = db.count_rows("documents")?;
                report.code_blocks = db.count_rows("code_blocks")?;
                report.elements = db.count_rows("graphql_elements")?;
                report.elapsed = started.elapsed();
                tracing::info!("Documentation unchanged, keeping existing index");
                return Ok(report);
            }
        }

        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            match self.parser.parse_file(file) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!("Skipping {}", e);
                    report.skipped += 1;
                }
            }
        }

        report.parsed = documents.len();
        report.code_blocks = documents.iter().map(|d| d.code_blocks.len()).sum();
        report.elements = documents.iter().map(|d| d.elements.len()).sum();

        {
            let mut db = self.db.lock().await;
            db.replace_all(&documents, &fingerprint, documents.len())
                .context("failed to write index")?;
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            "Indexed {} documents ({} code blocks, {} schema elements, {} skipped) in {:.2?}",
            report.parsed,
            report.code_blocks,
            report.elements,
            report.skipped,
            report.elapsed
        );
        Ok(report)
    }
}
