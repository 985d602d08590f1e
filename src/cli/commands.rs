//! CLI command implementations

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::detectors::Transaction;
use crate::flags::Flag;
use crate::metrics::SourcePayload;
use crate::pipeline::{RiskEngine, StaticCollector};
use crate::report::Report;
use crate::scoring::ReportKind;

/// Options for `risk-scan analyze`
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions<'a> {
    pub sources: Option<&'a Path>,
    pub history: Option<&'a Path>,
    pub kind: Option<ReportKind>,
    pub json: bool,
    pub deadline_ms: u32,
}

/// Analyze one token from payload files
pub async fn analyze(config: &Config, token: &str, options: AnalyzeOptions<'_>) -> Result<()> {
    let mut engine = RiskEngine::new(config);
    if let Some(kind) = options.kind {
        engine = engine.with_kind(kind);
    }

    if let Some(path) = options.sources {
        let payloads = load_sources(path).await?;
        info!(count = payloads.len(), path = %path.display(), "Loaded source payloads");
        for payload in payloads {
            let name = payload.kind().to_string();
            engine = engine.with_collector(Arc::new(StaticCollector::metrics(&name, payload)));
        }
    }

    if let Some(path) = options.history {
        let history = load_history(path).await?;
        info!(records = history.len(), path = %path.display(), "Loaded transaction history");
        engine = engine.with_collector(Arc::new(StaticCollector::history("history", history)));
    }

    let report = engine
        .get_or_compute(token, false, options.deadline_ms)
        .await
        .with_context(|| format!("Analysis of {} failed", token))?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(report.as_ref())?);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// Read a JSON array of source payloads
pub async fn load_sources(path: &Path) -> Result<Vec<SourcePayload>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read sources file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid sources file {}", path.display()))
}

/// Read a JSON array of transaction records
pub async fn load_history(path: &Path) -> Result<Vec<Transaction>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read history file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid history file {}", path.display()))
}

/// Human-readable report
pub fn print_report(report: &Report) {
    println!("\n=== {} RISK REPORT ===\n", report.kind.as_str().to_uppercase());
    println!("Token: {} ({})", report.token_name, report.token_symbol);
    println!("Address: {}", report.token_address);
    println!("Score: {}/100", report.composite_score);
    println!("Risk: {}", report.risk_level);
    println!("{}", report.recommendation);

    println!("\n=== CATEGORIES ===\n");
    for score in report.categories.values() {
        println!(
            "{:<20} {:>3}/{:<3} (weight {:.2})",
            score.category.name(),
            score.score,
            score.max_score,
            score.weight
        );
        for finding in &score.findings {
            if finding.deduction > 0 {
                println!("    -{:<3} {}", finding.deduction, finding.message);
            } else {
                println!("          {}", finding.message);
            }
        }
    }

    print_flags("RED FLAGS", &report.red_flags);
    print_flags("GREEN FLAGS", &report.green_flags);

    println!("\nAnalyzed at {} in {}ms", report.analyzed_at.to_rfc3339(), report.analysis_time_ms);
}

fn print_flags(title: &str, flags: &[Flag]) {
    println!("\n=== {} ===\n", title);
    if flags.is_empty() {
        println!("None.");
        return;
    }
    for flag in flags {
        println!("{} [{}] {}", flag.severity.emoji(), flag.category, flag.message);
    }
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::TxKind;
    use crate::metrics::fixtures;
    use std::io::Write;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_load_sources_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&fixtures::clean_sources()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let payloads = load_sources(file.path()).await.unwrap();
        assert_eq!(payloads.len(), 4);
        assert_eq!(payloads[0].kind(), crate::metrics::SourceKind::Market);
    }

    #[tokio::test]
    async fn test_load_history_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let history = vec![
            Transaction::new(TxKind::PoolCreated, "creator", 10, fixtures::now()),
            Transaction::new(TxKind::Buy, "buyer", 11, fixtures::now()).amount(0.5),
        ];
        file.write_all(serde_json::to_string(&history).unwrap().as_bytes())
            .unwrap();

        let loaded = load_history(file.path()).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].kind, TxKind::Buy);
    }

    #[tokio::test]
    async fn test_bad_sources_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = load_sources(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid sources file"));
    }

    #[tokio::test]
    async fn test_analyze_without_sources() {
        let options = AnalyzeOptions {
            json: true,
            ..Default::default()
        };
        assert_ok!(analyze(&Config::default(), fixtures::TOKEN, options).await);
    }

    #[tokio::test]
    async fn test_analyze_rejects_bad_token() {
        let err = analyze(&Config::default(), "bogus", AnalyzeOptions::default())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid identifier"));
    }
}
