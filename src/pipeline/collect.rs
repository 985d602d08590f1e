//! Source collection
//!
//! Collectors run concurrently. Each one gets the smaller of its own timeout
//! and the caller's deadline; whatever has not answered by then is treated
//! as unavailable.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::detectors::Transaction;
use crate::error::{Error, Result};
use crate::metrics::SourcePayload;
use crate::report::Report;
use crate::token::TokenId;

/// What a collector hands back
#[derive(Debug, Clone)]
pub enum CollectedSource {
    Metrics(SourcePayload),
    History(Vec<Transaction>),
}

/// Adapter that fetches one source for a token
#[async_trait]
pub trait SourceCollector: Send + Sync {
    /// Collector name for logging
    fn name(&self) -> &str;

    async fn collect(&self, token: &TokenId) -> Result<CollectedSource>;
}

/// Receives every freshly computed report
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, report: &Report) -> Result<()>;
}

/// Serves a payload that is already in memory
#[derive(Debug, Clone)]
pub struct StaticCollector {
    name: String,
    output: Option<CollectedSource>,
    delay: Option<Duration>,
}

impl StaticCollector {
    pub fn metrics(name: &str, payload: SourcePayload) -> Self {
        Self {
            name: name.to_string(),
            output: Some(CollectedSource::Metrics(payload)),
            delay: None,
        }
    }

    pub fn history(name: &str, transactions: Vec<Transaction>) -> Self {
        Self {
            name: name.to_string(),
            output: Some(CollectedSource::History(transactions)),
            delay: None,
        }
    }

    /// A collector whose source is down
    pub fn unavailable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            output: None,
            delay: None,
        }
    }

    /// Answer only after `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SourceCollector for StaticCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, _token: &TokenId) -> Result<CollectedSource> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.output
            .clone()
            .ok_or_else(|| Error::Io(format!("source '{}' unavailable", self.name)))
    }
}

/// Everything collection produced for one run
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub payloads: Vec<SourcePayload>,
    pub history: Option<Vec<Transaction>>,
    /// Names of collectors that failed or timed out
    pub unavailable: Vec<String>,
}

impl Collected {
    /// Wrap payloads that were gathered elsewhere
    pub fn from_payloads(payloads: Vec<SourcePayload>, history: Option<Vec<Transaction>>) -> Self {
        Self {
            payloads,
            history,
            unavailable: Vec::new(),
        }
    }
}

/// Run every collector concurrently, bounded by `per_source` and `deadline`
pub async fn collect_sources(
    collectors: &[Arc<dyn SourceCollector>],
    token: &TokenId,
    per_source: Duration,
    deadline: Duration,
) -> Collected {
    let timeout = per_source.min(deadline);

    let outcomes = join_all(collectors.iter().map(|collector| async move {
        let outcome = tokio::time::timeout(timeout, collector.collect(token)).await;
        (collector.name(), outcome)
    }))
    .await;

    let mut collected = Collected::default();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(Ok(CollectedSource::Metrics(payload))) => {
                debug!(source = name, kind = %payload.kind(), "Source collected");
                collected.payloads.push(payload);
            }
            Ok(Ok(CollectedSource::History(transactions))) => {
                if collected.history.is_some() {
                    warn!(source = name, "Second transaction history ignored");
                    continue;
                }
                debug!(source = name, records = transactions.len(), "History collected");
                collected.history = Some(transactions);
            }
            Ok(Err(e)) => {
                warn!(source = name, error = %e, "Source failed, marking unavailable");
                collected.unavailable.push(name.to_string());
            }
            Err(_) => {
                warn!(
                    source = name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Source timed out, marking unavailable"
                );
                collected.unavailable.push(name.to_string());
            }
        }
    }

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::TxKind;
    use crate::metrics::fixtures;

    fn token() -> TokenId {
        TokenId::parse(fixtures::TOKEN).unwrap()
    }

    #[tokio::test]
    async fn test_collects_all_sources() {
        let collectors: Vec<Arc<dyn SourceCollector>> = fixtures::clean_sources()
            .into_iter()
            .map(|p| Arc::new(StaticCollector::metrics("fixture", p)) as Arc<dyn SourceCollector>)
            .collect();

        let collected = collect_sources(
            &collectors,
            &token(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(collected.payloads.len(), 4);
        assert!(collected.unavailable.is_empty());
        assert!(collected.history.is_none());
    }

    #[tokio::test]
    async fn test_slow_and_failed_sources_become_unavailable() {
        let mut sources = fixtures::clean_sources().into_iter();
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![
            Arc::new(StaticCollector::metrics("market", sources.next().unwrap())),
            Arc::new(
                StaticCollector::metrics("holders", sources.next().unwrap())
                    .with_delay(Duration::from_secs(10)),
            ),
            Arc::new(StaticCollector::unavailable("rugcheck")),
        ];

        let collected = collect_sources(
            &collectors,
            &token(),
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await;

        assert_eq!(collected.payloads.len(), 1);
        assert_eq!(collected.unavailable, vec!["holders".to_string(), "rugcheck".to_string()]);
    }

    #[tokio::test]
    async fn test_first_history_wins() {
        let at = fixtures::now();
        let collectors: Vec<Arc<dyn SourceCollector>> = vec![
            Arc::new(StaticCollector::history(
                "primary",
                vec![Transaction::new(TxKind::PoolCreated, "creator", 100, at)],
            )),
            Arc::new(StaticCollector::history("secondary", vec![])),
        ];

        let collected = collect_sources(
            &collectors,
            &token(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(collected.history.map(|h| h.len()), Some(1));
    }
}
