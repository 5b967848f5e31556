//! Entity extraction driver
//!
//! Sequences preprocessing, span labeling, repair, and aggregation over a
//! corpus, one row at a time in corpus order.

use std::collections::BTreeMap;

use wayang_core::{CorpusRow, EntityRecord, NerConfig, Result, RowFailurePolicy, WayangError};

use crate::aggregate::{CanonicalEntity, EntityAggregator, Sighting};
use crate::repair::{preprocess_text, SpanFilter, SpanRejection};
use crate::SpanLabeler;

/// Outcome of processing one corpus row
#[derive(Debug)]
pub enum RowOutcome {
    /// Labeled and aggregated
    Processed { spans: usize, accepted: usize },
    /// Preprocessed text below the minimum length; the model was not called
    TooShort,
    /// The labeler failed for this row
    Failed(WayangError),
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub rows_seen: usize,
    pub rows_processed: usize,
    pub rows_too_short: usize,
    pub rows_failed: usize,
    pub spans_seen: usize,
    pub spans_accepted: usize,
    pub rejections: BTreeMap<SpanRejection, usize>,
}

impl PipelineStats {
    fn record(&mut self, outcome: &RowOutcome) {
        self.rows_seen += 1;
        match outcome {
            RowOutcome::Processed { spans, accepted } => {
                self.rows_processed += 1;
                self.spans_seen += spans;
                self.spans_accepted += accepted;
            }
            RowOutcome::TooShort => self.rows_too_short += 1,
            RowOutcome::Failed(_) => self.rows_failed += 1,
        }
    }
}

/// Result of a full corpus pass
#[derive(Debug)]
pub struct PipelineRun {
    /// Canonical entities sorted by display name
    pub entities: Vec<CanonicalEntity>,
    pub stats: PipelineStats,
}

impl PipelineRun {
    /// Entities in their persisted form
    pub fn records(&self) -> Vec<EntityRecord> {
        self.entities.iter().map(CanonicalEntity::to_record).collect()
    }
}

/// Single-pass entity extraction pipeline
pub struct NerPipeline<L: SpanLabeler> {
    labeler: L,
    filter: SpanFilter,
    min_text_chars: usize,
    progress_every: usize,
    failure_policy: RowFailurePolicy,
}

impl<L: SpanLabeler> NerPipeline<L> {
    /// Create a pipeline around a labeler
    pub fn new(labeler: L, config: &NerConfig) -> Self {
        Self {
            labeler,
            filter: SpanFilter::from_config(config),
            min_text_chars: config.min_text_chars,
            progress_every: config.progress_every.max(1),
            failure_policy: config.failure_policy,
        }
    }

    /// Set failure policy
    pub fn with_failure_policy(mut self, policy: RowFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Process one row into the aggregator
    pub async fn process_row(
        &self,
        row: &CorpusRow,
        aggregator: &mut EntityAggregator,
        rejections: &mut BTreeMap<SpanRejection, usize>,
    ) -> RowOutcome {
        let text = preprocess_text(&row.text);
        if text.chars().count() < self.min_text_chars {
            return RowOutcome::TooShort;
        }

        let spans = match self.labeler.label(&text).await {
            Ok(spans) => spans,
            Err(e) => return RowOutcome::Failed(e),
        };

        let document_id = row.title.trim();
        let mut accepted = 0;
        for span in &spans {
            match self.filter.accept(&text, span) {
                Ok(span) => {
                    aggregator.observe(Sighting::from_span(span, document_id));
                    accepted += 1;
                }
                Err(reason) => *rejections.entry(reason).or_default() += 1,
            }
        }

        RowOutcome::Processed {
            spans: spans.len(),
            accepted,
        }
    }

    /// Run the pipeline over every row in order
    pub async fn run<I>(&self, rows: I) -> Result<PipelineRun>
    where
        I: IntoIterator<Item = CorpusRow>,
    {
        let rows = rows.into_iter();
        let (total_hint, _) = rows.size_hint();

        let mut aggregator = EntityAggregator::new();
        let mut stats = PipelineStats::default();
        let mut rejections = BTreeMap::new();

        tracing::info!(rows = total_hint, "starting entity extraction");

        for (index, row) in rows.enumerate() {
            if index % self.progress_every == 0 {
                tracing::info!("processing row {}/{}", index + 1, total_hint);
            }

            let outcome = self
                .process_row(&row, &mut aggregator, &mut rejections)
                .await;
            stats.record(&outcome);

            if let RowOutcome::Failed(error) = outcome {
                match self.failure_policy {
                    RowFailurePolicy::Skip => {
                        tracing::warn!(row = index, title = %row.title, %error, "skipped row");
                    }
                    RowFailurePolicy::Abort => {
                        tracing::error!(row = index, title = %row.title, %error, "aborting run");
                        return Err(error);
                    }
                }
            }
        }

        stats.rejections = rejections;
        let entities = aggregator.into_table();

        tracing::info!(
            entities = entities.len(),
            processed = stats.rows_processed,
            failed = stats.rows_failed,
            "entity extraction finished"
        );

        Ok(PipelineRun { entities, stats })
    }
}
