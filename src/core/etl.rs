use crate::core::Pipeline;
use crate::domain::model::{DateRange, PublishSummary, Report};
use crate::utils::error::Result;
use std::fmt;
use std::sync::Mutex;

/// Run progress. Stages only ever move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Configured,
    Queried,
    Classified,
    Sanitized,
    Aggregated,
    Published,
    Done,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Configured => Some(Stage::Queried),
            Stage::Queried => Some(Stage::Classified),
            Stage::Classified => Some(Stage::Sanitized),
            Stage::Sanitized => Some(Stage::Aggregated),
            Stage::Aggregated => Some(Stage::Published),
            Stage::Published => Some(Stage::Done),
            Stage::Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configured => "configured",
            Stage::Queried => "queried",
            Stage::Classified => "classified",
            Stage::Sanitized => "sanitized",
            Stage::Aggregated => "aggregated",
            Stage::Published => "published",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub range: DateRange,
    pub rows: usize,
    pub publish: PublishSummary,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    stage: Mutex<Stage>,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            stage: Mutex::new(Stage::Configured),
        }
    }

    /// Last stage the run completed.
    pub fn stage(&self) -> Stage {
        self.stage
            .lock()
            .map(|s| *s)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn advance(&self) {
        let mut stage = self
            .stage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(next) = stage.next() {
            tracing::debug!("Stage {} -> {}", *stage, next);
            *stage = next;
        }
    }

    /// Any failure aborts the run; nothing is retried.
    pub async fn run(&self, range: DateRange) -> Result<RunSummary> {
        let result = self.run_stages(range).await;
        if let Err(e) = &result {
            tracing::error!("Run aborted after stage '{}': {}", self.stage(), e);
        }
        result
    }

    async fn run_stages(&self, range: DateRange) -> Result<RunSummary> {
        tracing::info!("Starting lead triage run for {}", range);

        // Extract
        let raw = self.pipeline.extract(&range).await?;
        self.advance();
        tracing::info!("Fetched {} records", raw.len());

        // Transform
        let classified = self.pipeline.classify(raw)?;
        self.advance();

        let sanitized = self.pipeline.sanitize(classified);
        self.advance();

        let aggregations = self.pipeline.aggregate(&sanitized)?;
        self.advance();
        tracing::info!("Built {} cross-tabulations", aggregations.len());

        // Load
        let report = Report {
            range,
            dataset: sanitized,
            aggregations,
        };
        let publish = self.pipeline.load(&report).await?;
        self.advance();
        tracing::info!(
            "Published {} sheets to {}",
            publish.sheets_written,
            publish.destination
        );

        self.advance();
        Ok(RunSummary {
            range,
            rows: report.dataset.len(),
            publish,
        })
    }
}
