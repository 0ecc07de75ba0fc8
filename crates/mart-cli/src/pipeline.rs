//! The staged transform-and-load pipeline.
//!
//! Customers and products are cleaned on two scoped threads; joining both is
//! the barrier before any surrogate key is assigned. Keying and loading run
//! sequentially in dependency order: customers, products, orders, order items.
//! Cancellation is observed between stages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use mart_ingest::{IngestError, RecordStream, SourcePaths, open_source};
use mart_load::{LoadCandidate, LoadError, ReferentialLoader, RetryPolicy, Storage};
use mart_model::{
    CleanRecord, ConfigError, Issue, PipelineConfig, RawRecord, SourceKind, StageOutput,
};
use mart_report::{QualityAccumulator, QualityReport};
use mart_transform::{
    Deduplicator, KeyMap, MissingValueResolver, NaturalKeyRule, Standardizer, customer_drafts,
    product_drafts, sales_lines, split_sales,
};

use crate::logging::loggable_detail;

/// Lazy rows of one source.
pub type RowStream = Box<dyn Iterator<Item = Result<RawRecord, IngestError>> + Send>;

/// One raw source and the file name it is reported under.
pub struct Source {
    pub file: String,
    pub rows: RowStream,
}

impl Source {
    pub fn new<I>(file: impl Into<String>, rows: I) -> Self
    where
        I: Iterator<Item = Result<RawRecord, IngestError>> + Send + 'static,
    {
        Self {
            file: file.into(),
            rows: Box::new(rows),
        }
    }

    /// Source backed by records already in memory.
    pub fn from_records(file: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self::new(file, records.into_iter().map(Ok))
    }

    fn from_stream(stream: RecordStream) -> Self {
        let file = stream
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| stream.kind().default_file_name().to_string());
        Self::new(file, stream)
    }
}

/// The three sources of a run.
pub struct Sources {
    pub customers: Source,
    pub products: Source,
    pub sales: Source,
}

impl Sources {
    /// Open every discovered file; any unreadable source fails the run.
    pub fn open(paths: &SourcePaths) -> Result<Self, IngestError> {
        Ok(Self {
            customers: Source::from_stream(open_source(SourceKind::Customers, &paths.customers)?),
            products: Source::from_stream(open_source(SourceKind::Products, &paths.products)?),
            sales: Source::from_stream(open_source(SourceKind::Sales, &paths.sales)?),
        })
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self, stage: &'static str) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            warn!(stage, "run cancelled");
            return Err(PipelineError::Cancelled { stage });
        }
        Ok(())
    }
}

/// Fatal run errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("run cancelled before {stage}")]
    Cancelled { stage: &'static str },
}

/// A failed run, with everything gathered up to the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    #[source]
    pub error: PipelineError,
    pub report: QualityReport,
    /// Keys committed before the failure; each names a stored row.
    pub keys: KeyMap,
    pub issues: Vec<Issue>,
}

/// A completed run.
#[derive(Debug)]
pub struct RunOutcome<S> {
    pub report: QualityReport,
    pub keys: KeyMap,
    pub store: S,
    /// Every issue raised, in stage order.
    pub issues: Vec<Issue>,
}

/// Result of cleaning one source on its own thread.
struct Cleaned<T> {
    quality: QualityAccumulator,
    issues: Vec<Issue>,
    outcome: Result<Vec<T>, PipelineError>,
}

/// Per-source accounting shared by the cleaning stages.
struct Ledger {
    quality: QualityAccumulator,
    issues: Vec<Issue>,
}

impl Ledger {
    fn new() -> Self {
        Self {
            quality: QualityAccumulator::new(),
            issues: Vec::new(),
        }
    }

    fn observe<T>(&mut self, output: StageOutput<T>) -> Vec<T> {
        self.quality.observe(&output);
        for issue in &output.issues {
            debug!(
                kind = %issue.kind,
                record = %issue.record,
                field = issue.field.as_deref().unwrap_or("-"),
                detail = %loggable_detail(issue),
                "issue"
            );
        }
        self.issues.extend(output.issues);
        output.records
    }

    fn finish<T>(self, outcome: Result<Vec<T>, PipelineError>) -> Cleaned<T> {
        Cleaned {
            quality: self.quality,
            issues: self.issues,
            outcome,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelToken,
}

impl Pipeline {
    /// Validate `config` and build a pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Dedupe, resolve and standardize one source.
    fn clean(&self, kind: SourceKind, source: Source, ledger: &mut Ledger) -> Result<Vec<CleanRecord>, PipelineError> {
        let _span = info_span!("clean", source = %kind, file = %source.file).entered();
        ledger.quality.register_file(kind, source.file);

        let deduped = {
            let _span = info_span!("dedupe", source = %kind).entered();
            let mut deduplicator = Deduplicator::new(NaturalKeyRule::for_source(kind));
            let mut processed = 0usize;
            for row in source.rows {
                let row = row?;
                processed += 1;
                ledger.quality.record_processed(kind, 1);
                deduplicator.admit(row);
            }
            let deduped = ledger.observe(deduplicator.finish());
            info!(processed, unique = deduped.len(), "deduplicated");
            deduped
        };
        self.cancel.check("missing-value resolution")?;

        let resolver = MissingValueResolver::new(self.config.policies.clone());
        let resolved = ledger.observe(resolver.resolve(kind, deduped));
        self.cancel.check("standardization")?;

        let standardized = ledger.observe(Standardizer::new(&self.config).standardize(kind, resolved));
        info!(clean = standardized.len(), "cleaned");
        Ok(standardized)
    }

    fn clean_typed<T, F>(&self, kind: SourceKind, source: Source, to_drafts: F) -> Cleaned<T>
    where
        F: FnOnce(Vec<CleanRecord>) -> StageOutput<T>,
    {
        let mut ledger = Ledger::new();
        let outcome = self
            .clean(kind, source, &mut ledger)
            .map(|records| ledger.observe(to_drafts(records)));
        ledger.finish(outcome)
    }

    /// Run every stage against `store`.
    ///
    /// # Errors
    ///
    /// Fails on an unreadable source, exhausted insert retries, or
    /// cancellation; the failure carries the partial report, the issues and
    /// the keys committed so far. Keys are only committed for stored rows, so
    /// a failed run leaves no dangling key.
    pub fn run<S: Storage>(&self, sources: Sources, store: S) -> Result<RunOutcome<S>, PipelineFailure> {
        let _span = info_span!("pipeline").entered();
        let mut quality = QualityAccumulator::new();
        let mut issues = Vec::new();
        for (kind, source) in [
            (SourceKind::Customers, &sources.customers),
            (SourceKind::Products, &sources.products),
            (SourceKind::Sales, &sources.sales),
        ] {
            quality.register_file(kind, source.file.clone());
        }

        let mut loader = ReferentialLoader::new(store, RetryPolicy::from(&self.config.retry));
        let result = self.run_stages(sources, &mut loader, &mut quality, &mut issues);
        let (store, keys) = loader.into_parts();
        match result {
            Ok(()) => {
                let report = quality.finalize();
                info!(
                    loaded = report.total_loaded(),
                    quarantined = report.total_quarantined(),
                    issues = issues.len(),
                    "run complete"
                );
                Ok(RunOutcome {
                    report,
                    keys,
                    store,
                    issues,
                })
            }
            Err(error) => {
                error!(%error, keys = keys.len(), "run failed");
                Err(PipelineFailure {
                    error,
                    report: quality.snapshot(),
                    keys,
                    issues,
                })
            }
        }
    }

    fn run_stages<S: Storage>(
        &self,
        sources: Sources,
        loader: &mut ReferentialLoader<S>,
        quality: &mut QualityAccumulator,
        issues: &mut Vec<Issue>,
    ) -> Result<(), PipelineError> {
        self.cancel.check("cleaning")?;
        let Sources {
            customers,
            products,
            sales,
        } = sources;

        let (customers, products) = thread::scope(|scope| {
            let customers =
                scope.spawn(|| self.clean_typed(SourceKind::Customers, customers, customer_drafts));
            let products =
                scope.spawn(|| self.clean_typed(SourceKind::Products, products, product_drafts));
            (
                customers.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
                products.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            )
        });
        quality.merge(customers.quality);
        quality.merge(products.quality);
        issues.extend(customers.issues);
        issues.extend(products.issues);
        let customers = customers.outcome?;
        let products = products.outcome?;

        self.cancel.check("customer load")?;
        load(loader, customers, quality, issues, Accounting::Records)?;

        self.cancel.check("product load")?;
        load(loader, products, quality, issues, Accounting::Records)?;

        let sales = self.clean_typed(SourceKind::Sales, sales, sales_lines);
        quality.merge(sales.quality);
        issues.extend(sales.issues);
        let split = split_sales(sales.outcome?);
        info!(orders = split.orders.len(), items = split.items.len(), "split sales");

        self.cancel.check("order load")?;
        // Sales rows are accounted for by their order items; order-level
        // problems are kept as issues only.
        load(loader, split.orders, quality, issues, Accounting::IssuesOnly)?;

        self.cancel.check("order item load")?;
        load(loader, split.items, quality, issues, Accounting::Records)?;

        Ok(())
    }
}

/// What a load batch contributes to the report.
#[derive(Clone, Copy)]
enum Accounting {
    /// Issues and terminal states.
    Records,
    IssuesOnly,
}

/// Load one batch, counting whatever it handled even when it fails.
fn load<S: Storage, C: LoadCandidate>(
    loader: &mut ReferentialLoader<S>,
    candidates: Vec<C>,
    quality: &mut QualityAccumulator,
    issues: &mut Vec<Issue>,
    accounting: Accounting,
) -> Result<(), PipelineError> {
    let mut output = StageOutput::new();
    let result = loader.load_into(candidates, &mut output);
    match accounting {
        Accounting::Records => quality.observe(&output),
        Accounting::IssuesOnly => quality.record_issues(&output.issues),
    }
    issues.extend(output.issues);
    result.map_err(PipelineError::from)
}
