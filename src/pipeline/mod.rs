//! Analysis pipeline
//!
//! One run walks a fixed sequence of stages:
//!
//! ```text
//! Pending -> CollectingSources -> Normalizing -> Detecting -> Scoring
//!         -> Flagging -> Aggregated -> Completed
//! ```
//!
//! Any non-terminal stage may move to `Failed`. Missing sources never fail a
//! run; they only degrade it. Only an invalid identifier or a broken
//! invariant does.
//!
//! [`RiskEngine`] wraps the pipeline with the report cache, so concurrent
//! requests for the same token share one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, ReportCache};
use crate::config::Config;
use crate::detectors::Detectors;
use crate::error::{Error, Result};
use crate::flags::FlagGenerator;
use crate::metrics::{Normalizer, SourceSet};
use crate::report::{Aggregator, Report, WeightsConfig};
use crate::scoring::{ReportKind, Scorer, TradingSignals};
use crate::token::TokenId;

pub mod collect;

pub use collect::{collect_sources, Collected, CollectedSource, ReportSink, SourceCollector, StaticCollector};

/// Stage of a single analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStage {
    Pending,
    CollectingSources,
    Normalizing,
    Detecting,
    Scoring,
    Flagging,
    Aggregated,
    Completed,
    Failed,
}

impl AnalysisStage {
    /// The only forward transition from this stage
    pub fn next(&self) -> Option<AnalysisStage> {
        match self {
            AnalysisStage::Pending => Some(AnalysisStage::CollectingSources),
            AnalysisStage::CollectingSources => Some(AnalysisStage::Normalizing),
            AnalysisStage::Normalizing => Some(AnalysisStage::Detecting),
            AnalysisStage::Detecting => Some(AnalysisStage::Scoring),
            AnalysisStage::Scoring => Some(AnalysisStage::Flagging),
            AnalysisStage::Flagging => Some(AnalysisStage::Aggregated),
            AnalysisStage::Aggregated => Some(AnalysisStage::Completed),
            AnalysisStage::Completed | AnalysisStage::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStage::Completed | AnalysisStage::Failed)
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Record of one run's progress
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    token: String,
    stage: AnalysisStage,
    transitions: Vec<AnalysisStage>,
    failure: Option<Error>,
}

impl AnalysisRun {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            stage: AnalysisStage::Pending,
            transitions: vec![AnalysisStage::Pending],
            failure: None,
        }
    }

    pub fn stage(&self) -> AnalysisStage {
        self.stage
    }

    /// Every stage visited, in order
    pub fn transitions(&self) -> &[AnalysisStage] {
        &self.transitions
    }

    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Move to the next stage; anything out of order is a defect
    pub fn advance(&mut self, to: AnalysisStage) -> Result<()> {
        let allowed = self.stage.next() == Some(to)
            || (to == AnalysisStage::Failed && !self.stage.is_terminal());
        if !allowed {
            return Err(Error::Internal(format!(
                "illegal stage transition {} -> {} for {}",
                self.stage, to, self.token
            )));
        }

        debug!(token = %self.token, from = %self.stage, to = %to, "Stage transition");
        self.stage = to;
        self.transitions.push(to);
        Ok(())
    }

    /// Mark the run failed with `error`
    pub fn fail(&mut self, error: &Error) {
        if self.stage.is_terminal() {
            return;
        }
        if error.is_defect() {
            error!(token = %self.token, stage = %self.stage, error = %error, "Analysis aborted by defect");
        } else {
            warn!(token = %self.token, stage = %self.stage, error = %error, "Analysis failed");
        }
        self.stage = AnalysisStage::Failed;
        self.transitions.push(AnalysisStage::Failed);
        self.failure = Some(error.clone());
    }
}

/// Normalize, detect, score, flag and aggregate
#[derive(Debug, Clone)]
pub struct Pipeline {
    normalizer: Normalizer,
    detectors: Detectors,
    scorer: Scorer,
    flags: FlagGenerator,
    aggregator: Aggregator,
    weights: WeightsConfig,
    source_timeout: Duration,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Pipeline {
    pub fn from_config(config: &Config) -> Self {
        Self {
            normalizer: Normalizer::new(config.normalizer.clone()),
            detectors: Detectors::new(config.detectors.clone()),
            scorer: Scorer::new(config.scoring.clone()),
            flags: FlagGenerator::new(config.flags.clone()),
            aggregator: Aggregator::new(),
            weights: config.weights.clone(),
            source_timeout: config.engine.source_timeout(),
        }
    }

    /// Collect from `collectors` and build a report
    pub async fn analyze(
        &self,
        kind: ReportKind,
        token_id: &str,
        collectors: &[Arc<dyn SourceCollector>],
        deadline: Duration,
    ) -> Result<Report> {
        self.analyze_tracked(kind, token_id, collectors, deadline).await.1
    }

    /// Same as [`Pipeline::analyze`], also returning the run record
    pub async fn analyze_tracked(
        &self,
        kind: ReportKind,
        token_id: &str,
        collectors: &[Arc<dyn SourceCollector>],
        deadline: Duration,
    ) -> (AnalysisRun, Result<Report>) {
        let started = Instant::now();
        let mut run = AnalysisRun::new(token_id);

        let token = match TokenId::parse(token_id) {
            Ok(token) => token,
            Err(e) => {
                run.fail(&e);
                return (run, Err(e));
            }
        };

        if let Err(e) = run.advance(AnalysisStage::CollectingSources) {
            run.fail(&e);
            return (run, Err(e));
        }

        let collected = collect_sources(collectors, &token, self.source_timeout, deadline).await;
        if !collected.unavailable.is_empty() {
            info!(
                token = %token.short(),
                unavailable = ?collected.unavailable,
                "Continuing with partial sources"
            );
        }

        let outcome = self.run_stages(&mut run, kind, token, collected, Utc::now(), started);
        if let Err(e) = &outcome {
            run.fail(e);
        }
        (run, outcome)
    }

    /// Build a report from sources that were gathered elsewhere
    pub fn evaluate(
        &self,
        kind: ReportKind,
        token: TokenId,
        collected: Collected,
        now: DateTime<Utc>,
    ) -> Result<Report> {
        let mut run = AnalysisRun::new(token.as_str());
        run.advance(AnalysisStage::CollectingSources)?;
        self.run_stages(&mut run, kind, token, collected, now, Instant::now())
    }

    fn run_stages(
        &self,
        run: &mut AnalysisRun,
        kind: ReportKind,
        token: TokenId,
        collected: Collected,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<Report> {
        run.advance(AnalysisStage::Normalizing)?;
        let set = SourceSet::from_payloads(collected.payloads);
        let bundle = self.normalizer.normalize_set(token, &set, now);

        run.advance(AnalysisStage::Detecting)?;
        let detections = self.detectors.run(&bundle, collected.history.as_deref());
        let signals = TradingSignals::resolve(&bundle, &detections);

        run.advance(AnalysisStage::Scoring)?;
        let scores = self.scorer.score(kind, &bundle, signals, &self.weights);

        run.advance(AnalysisStage::Flagging)?;
        let flags = self.flags.generate(&bundle, signals, &scores);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let report = self
            .aggregator
            .aggregate(kind, &bundle.token, scores, flags, now, elapsed_ms)?;
        run.advance(AnalysisStage::Aggregated)?;
        run.advance(AnalysisStage::Completed)?;

        Ok(report)
    }
}

/// Cached, coalescing front door to the pipeline
pub struct RiskEngine {
    pipeline: Arc<Pipeline>,
    cache: ReportCache,
    collectors: Vec<Arc<dyn SourceCollector>>,
    sink: Option<Arc<dyn ReportSink>>,
    kind: ReportKind,
    default_deadline: Duration,
}

impl RiskEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::from_config(config)),
            cache: ReportCache::new(config.cache.clone()),
            collectors: Vec::new(),
            sink: None,
            kind: config.engine.report_kind,
            default_deadline: config.engine.collection_deadline(),
        }
    }

    pub fn with_collector(mut self, collector: Arc<dyn SourceCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_kind(mut self, kind: ReportKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// Cached report for `token_id`, or a fresh run shared with any
    /// concurrent caller. `deadline_ms == 0` uses the configured deadline.
    pub async fn get_or_compute(
        &self,
        token_id: &str,
        force_refresh: bool,
        deadline_ms: u32,
    ) -> Result<Arc<Report>> {
        let token = TokenId::parse(token_id)?;
        let key = CacheKey::new(self.kind, &token);
        let deadline = if deadline_ms == 0 {
            self.default_deadline
        } else {
            Duration::from_millis(u64::from(deadline_ms))
        };

        let pipeline = Arc::clone(&self.pipeline);
        let collectors = self.collectors.clone();
        let sink = self.sink.clone();
        let kind = self.kind;

        self.cache
            .get_or_compute(key, force_refresh, move || async move {
                let report = pipeline
                    .analyze(kind, token.as_str(), &collectors, deadline)
                    .await?;

                if let Some(sink) = sink {
                    if let Err(e) = sink.persist(&report).await {
                        warn!(token = %token.short(), error = %e, "Failed to persist report");
                    }
                }

                Ok::<_, Error>(report)
            })
            .await
    }
}
