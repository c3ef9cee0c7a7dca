//! Index builder: one sequential pass from pages to shard files.
//!
//! The build is a consuming state machine. [`IndexBuilder::new`] starts
//! streaming, [`IndexBuilder::add_page`] / [`IndexBuilder::ingest`] accumulate
//! everything in memory, and [`IndexBuilder::flush`] (or
//! [`IndexBuilder::finish`]) writes document shards, then index shards, then
//! metadata. Flushing takes `self`, so there is no way back to streaming.

use crate::docstore;
use crate::dump::{open_dump, PageReader, RawPage};
use crate::error::{IndexError, Result};
use crate::lexical::IndexAccumulator;
use crate::partition::doc_shard;
use crate::postings;
use crate::sanitize::Sanitizer;
use crate::storage::{ShardStore, StagedDir};
use crate::types::{DocId, IndexMeta, Page, StoredDocument, DOC_SHARD_COUNT};
use bytes::Bytes;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory holding document shards.
pub const DOCS_DIR: &str = "docs";

/// Directory holding index shards and metadata.
pub const INDEX_DIR: &str = "index";

/// Metadata file path, relative to the output root.
pub const META_PATH: &str = "index/meta.json";

/// Default output root.
pub const DEFAULT_OUTPUT_DIR: &str = "public";

/// Accepted documents between progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Relative path of a document shard file.
pub fn doc_shard_path(shard: u32) -> String {
    format!("{}/shard_{:05}.bin", DOCS_DIR, shard)
}

/// Relative path of an index shard file.
pub fn index_shard_path(shard: u32) -> String {
    format!("{}/shard_{:04}.bin", INDEX_DIR, shard)
}

/// Build settings.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root that receives `docs/` and `index/`.
    pub output_dir: PathBuf,
    /// Draw a terminal spinner while streaming.
    pub show_progress: bool,
    /// Log progress every this many accepted documents.
    pub progress_interval: u64,
}

impl BuildConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            show_progress: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

/// Counters for one build. Every page read lands in exactly one bucket:
/// `documents`, `skipped_namespace`, `malformed_pages`, `duplicate_pages`
/// or `rejected_documents`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub pages_read: u64,
    pub documents: u64,
    pub skipped_namespace: u64,
    pub malformed_pages: u64,
    pub duplicate_pages: u64,
    pub rejected_documents: u64,
    /// Tokens too long to index, across all documents.
    pub skipped_terms: u64,
    pub postings: u64,
    pub doc_shards_written: u64,
    pub index_shards_written: u64,
}

impl BuildReport {
    /// Emit the end-of-run summary.
    pub fn log_summary(&self) {
        info!(
            pages = self.pages_read,
            documents = self.documents,
            other_namespace = self.skipped_namespace,
            postings = self.postings,
            doc_shards = self.doc_shards_written,
            index_shards = self.index_shards_written,
            "done"
        );
        if self.malformed_pages + self.duplicate_pages + self.rejected_documents > 0 {
            warn!(
                malformed = self.malformed_pages,
                duplicates = self.duplicate_pages,
                rejected = self.rejected_documents,
                "some pages were skipped"
            );
        }
        if self.skipped_terms > 0 {
            warn!(terms = self.skipped_terms, "over-long terms were not indexed");
        }
    }
}

/// What happened to a page handed to [`IndexBuilder::add_page`].
#[derive(Debug)]
pub enum PageOutcome {
    /// Stored and indexed.
    Indexed,
    /// Not in the article namespace.
    OtherNamespace,
    /// Its id was already accepted.
    Duplicate,
    /// Title or content does not fit the document shard layout.
    Rejected(IndexError),
}

/// Accumulates documents and postings for every shard in memory.
pub struct IndexBuilder {
    config: BuildConfig,
    sanitizer: Sanitizer,
    index: IndexAccumulator,
    /// One list per document shard, in insertion order.
    doc_shards: Vec<Vec<StoredDocument>>,
    seen: HashSet<DocId>,
    report: BuildReport,
    progress: ProgressBar,
}

impl IndexBuilder {
    /// Create a builder; compiles the sanitizer pattern set once.
    pub fn new(config: BuildConfig) -> Result<Self> {
        let progress = if config.show_progress {
            streaming_progress_bar()
        } else {
            ProgressBar::hidden()
        };

        Ok(Self {
            config,
            sanitizer: Sanitizer::new()?,
            index: IndexAccumulator::new(),
            doc_shards: (0..DOC_SHARD_COUNT).map(|_| Vec::new()).collect(),
            seen: HashSet::new(),
            report: BuildReport::default(),
            progress,
        })
    }

    /// Number of documents accepted so far.
    pub fn doc_count(&self) -> u64 {
        self.report.documents
    }

    /// Counters so far.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Filter, sanitize, tokenize and accumulate one page.
    pub fn add_page(&mut self, page: Page) -> PageOutcome {
        self.report.pages_read += 1;

        if !page.is_article() {
            self.report.skipped_namespace += 1;
            return PageOutcome::OtherNamespace;
        }
        if self.seen.contains(&page.id) {
            warn!(id = page.id, title = %page.title, "skipping duplicate page id");
            self.report.duplicate_pages += 1;
            return PageOutcome::Duplicate;
        }

        let content = self.sanitizer.sanitize(&page.text);
        if let Err(e) = docstore::check_lengths(&page.title, &content) {
            warn!(id = page.id, error = %e, "rejecting document");
            self.report.rejected_documents += 1;
            return PageOutcome::Rejected(e);
        }

        let skipped = self.index.add_document(page.id, &content);
        if skipped > 0 {
            debug!(id = page.id, skipped, "dropped over-long terms");
            self.report.skipped_terms += skipped as u64;
        }

        self.seen.insert(page.id);
        self.doc_shards[doc_shard(page.id) as usize].push(StoredDocument {
            id: page.id,
            title: page.title,
            content,
        });

        self.report.documents += 1;
        self.progress.inc(1);
        if self.report.documents % self.config.progress_interval == 0 {
            info!("indexed {} docs", self.report.documents);
        }

        PageOutcome::Indexed
    }

    /// Validate a raw page; malformed ones are counted and skipped.
    pub fn add_raw(&mut self, raw: RawPage) -> Option<PageOutcome> {
        match raw.into_page() {
            Ok(page) => Some(self.add_page(page)),
            Err(e) => {
                warn!(error = %e, "skipping malformed page");
                self.report.pages_read += 1;
                self.report.malformed_pages += 1;
                None
            }
        }
    }

    /// Drain a page stream. Stream-level errors abort.
    pub fn ingest<R: BufRead>(&mut self, pages: &mut PageReader<R>) -> Result<()> {
        while let Some(raw) = pages.next_page()? {
            self.add_raw(raw);
        }
        Ok(())
    }

    /// Encode and write every non-empty shard, then the metadata.
    pub fn flush(self, store: &mut dyn ShardStore) -> Result<BuildReport> {
        let IndexBuilder {
            index,
            doc_shards,
            mut report,
            progress,
            ..
        } = self;
        progress.finish_and_clear();
        report.postings = index.posting_count();

        info!("total: {} docs, writing doc shards...", report.documents);
        for (shard, docs) in doc_shards.into_iter().enumerate() {
            if docs.is_empty() {
                continue;
            }
            let data = docstore::encode_shard(&docs)?;
            store.put(&doc_shard_path(shard as u32), data)?;
            report.doc_shards_written += 1;
        }

        info!("total: {} docs, writing index shards...", report.documents);
        for (shard, shard_postings) in index.into_shards() {
            let terms = shard_postings.len();
            let data = postings::encode_shard(shard_postings)?;
            debug!(shard, terms, bytes = data.len(), "encoded index shard");
            store.put(&index_shard_path(shard), data)?;
            report.index_shards_written += 1;
        }

        let mut meta = serde_json::to_vec(&IndexMeta::new(report.documents))?;
        meta.push(b'\n');
        store.put(META_PATH, Bytes::from(meta))?;

        Ok(report)
    }

    /// Flush into a staging directory and swap it into the output root.
    pub fn finish(self) -> Result<BuildReport> {
        let mut staged = StagedDir::create(&self.config.output_dir)?;
        debug!(staging = %staged.staging_path().display(), "staging output");

        let report = self.flush(&mut staged)?;
        info!(
            files = staged.files_written(),
            bytes = staged.bytes_written(),
            output = %staged.root().display(),
            "committing output"
        );
        staged.commit(&[DOCS_DIR, INDEX_DIR])?;

        Ok(report)
    }
}

/// Run a full build from a dump file into `config.output_dir`.
pub fn build_index(dump: &Path, config: BuildConfig) -> Result<BuildReport> {
    info!(
        dump = %dump.display(),
        output = %config.output_dir.display(),
        "building index"
    );
    let mut pages = open_dump(dump)?;
    let mut builder = IndexBuilder::new(config)?;
    builder.ingest(&mut pages)?;

    let report = builder.finish()?;
    report.log_summary();
    Ok(report)
}

fn streaming_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} docs {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message("indexing");
    pb
}
