use crate::domain::model::{CrossTab, Dataset, DateRange, GroupingSpec, PublishSummary, Report};
use crate::domain::ports::{Pipeline, QuerySource, ReportSink, SentimentScorer};
use crate::domain::services::{self, Classifier};
use crate::utils::error::Result;

/// Lead-response report: query, triage, pivot, publish.
pub struct LeadPipeline<Q: QuerySource, K: ReportSink, S: SentimentScorer> {
    source: Q,
    sink: K,
    classifier: Classifier<S>,
    groupings: Vec<GroupingSpec>,
}

impl<Q: QuerySource, K: ReportSink, S: SentimentScorer> LeadPipeline<Q, K, S> {
    pub fn new(source: Q, sink: K, scorer: S) -> Self {
        Self::with_groupings(source, sink, scorer, services::default_groupings())
    }

    pub fn with_groupings(source: Q, sink: K, scorer: S, groupings: Vec<GroupingSpec>) -> Self {
        Self {
            source,
            sink,
            classifier: Classifier::new(scorer),
            groupings,
        }
    }

    pub fn groupings(&self) -> &[GroupingSpec] {
        &self.groupings
    }
}

#[async_trait::async_trait]
impl<Q: QuerySource, K: ReportSink, S: SentimentScorer> Pipeline for LeadPipeline<Q, K, S> {
    async fn extract(&self, range: &DateRange) -> Result<Dataset> {
        tracing::debug!("Fetching lead responses for {}", range);
        self.source.fetch(range).await
    }

    fn classify(&self, dataset: Dataset) -> Result<Dataset> {
        self.classifier.classify_dataset(dataset)
    }

    fn sanitize(&self, dataset: Dataset) -> Dataset {
        services::sanitize_dataset(dataset)
    }

    fn aggregate(&self, dataset: &Dataset) -> Result<Vec<CrossTab>> {
        services::aggregate_all(dataset, &self.groupings)
    }

    async fn load(&self, report: &Report) -> Result<PublishSummary> {
        self.sink.publish(report).await
    }
}
