use std::fmt::Write as _;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::client::MetadataRepository;
use crate::errors::{Result, StorageError};
use crate::models::TableFilter;

const DEFAULT_CONCURRENCY: usize = 4;
/// Neighbours listed per direction in the markdown details section.
const MARKDOWN_PREVIEW: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageCheckResult {
    pub table: String,
    pub fqn: String,
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
    pub upstream_count: usize,
    pub downstream_count: usize,
    pub has_lineage: bool,
    pub complete: bool,
    pub issues: Vec<String>,
}

impl LineageCheckResult {
    fn empty(fqn: &str) -> Self {
        Self {
            table: short_name(fqn).to_string(),
            fqn: fqn.to_string(),
            upstream: Vec::new(),
            downstream: Vec::new(),
            upstream_count: 0,
            downstream_count: 0,
            has_lineage: false,
            complete: false,
            issues: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageReport {
    pub total: usize,
    pub with_lineage: usize,
    pub without_lineage: usize,
    pub completion_rate: f64,
    pub with_issues: usize,
    pub details: Vec<LineageCheckResult>,
}

impl LineageReport {
    pub fn from_results(details: Vec<LineageCheckResult>) -> Self {
        let total = details.len();
        let with_lineage = details.iter().filter(|d| d.has_lineage).count();
        let with_issues = details.iter().filter(|d| !d.issues.is_empty()).count();
        Self {
            total,
            with_lineage,
            without_lineage: total - with_lineage,
            completion_rate: if total == 0 {
                0.0
            } else {
                with_lineage as f64 / total as f64
            },
            with_issues,
            details,
        }
    }
}

fn short_name(fqn: &str) -> &str {
    fqn.rsplit('.').next().unwrap_or(fqn)
}

/// Audits the lineage already recorded in the metadata repository.
pub struct LineageVerifier {
    repository: Arc<dyn MetadataRepository>,
    concurrency: usize,
}

impl LineageVerifier {
    pub fn new(repository: Arc<dyn MetadataRepository>) -> Self {
        Self {
            repository,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Never fails: lookup errors are reported as issues of the entity.
    pub async fn check_entity(&self, fqn: &str) -> LineageCheckResult {
        log::debug!("checking lineage of {fqn}");
        let mut result = LineageCheckResult::empty(fqn);

        let lineage = match self.repository.get_lineage(fqn, 1, 1).await {
            Ok(lineage) => lineage,
            Err(StorageError::NotFound(_)) => {
                log::warn!("table not found in metadata repository: {fqn}");
                result.issues.push(format!("Table not found: {fqn}"));
                return result;
            }
            Err(err) => {
                log::error!("lineage lookup for {fqn} failed: {err}");
                result.issues.push(format!("Error checking lineage: {err}"));
                return result;
            }
        };

        result.upstream_count = lineage.upstream.len();
        result.downstream_count = lineage.downstream.len();
        result.upstream = lineage.upstream;
        result.downstream = lineage.downstream;
        result.has_lineage = result.upstream_count > 0 || result.downstream_count > 0;

        if result.table.contains("stg_") && result.upstream_count == 0 {
            result
                .issues
                .push(format!("Staging table {} has no upstream lineage", result.table));
        }
        if (fqn.contains("marts") || result.table.contains("mart_")) && result.upstream_count == 0 {
            result
                .issues
                .push(format!("Mart table {} has no upstream lineage", result.table));
        }
        result.complete = result.issues.is_empty();
        result
    }

    /// Checks every table matching `filter`; details keep the listing order.
    pub async fn check_all(&self, filter: &TableFilter) -> Result<LineageReport> {
        let tables = self.repository.list_tables(filter).await?;
        log::info!("checking lineage of {} table(s)", tables.len());

        let details: Vec<LineageCheckResult> = stream::iter(tables.iter())
            .map(|fqn| self.check_entity(fqn))
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = LineageReport::from_results(details);
        log::info!(
            "lineage check: {} total, {} with lineage, {} without, {:.1}% complete, {} with issues",
            report.total,
            report.with_lineage,
            report.without_lineage,
            report.completion_rate * 100.0,
            report.with_issues
        );
        Ok(report)
    }
}

/// Plain-text view of one entity's neighbours.
pub fn render_ascii(result: &LineageCheckResult) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Lineage: {}", result.table);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "FQN: {}", result.fqn);
    let _ = writeln!(out);

    for (label, count, neighbours) in [
        ("Upstream", result.upstream_count, &result.upstream),
        ("Downstream", result.downstream_count, &result.downstream),
    ] {
        let _ = writeln!(out, "{label} ({count}):");
        if neighbours.is_empty() {
            let _ = writeln!(out, "   (none)");
        }
        for fqn in neighbours {
            let _ = writeln!(out, "   └─ {}", short_name(fqn));
            let _ = writeln!(out, "      ({fqn})");
        }
        let _ = writeln!(out);
    }

    if result.issues.is_empty() {
        let _ = writeln!(out, "No issues detected");
    } else {
        let _ = writeln!(out, "Issues ({}):", result.issues.len());
        for issue in &result.issues {
            let _ = writeln!(out, "   - {issue}");
        }
    }
    let _ = writeln!(out, "{rule}");
    out
}

/// Markdown report for a whole verification run.
pub fn render_markdown(report: &LineageReport, service: &str, database: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Lineage report\n");
    let _ = writeln!(out, "**Service**: {service}");
    if let Some(database) = database {
        let _ = writeln!(out, "**Database**: {database}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- **Total tables**: {}", report.total);
    let _ = writeln!(out, "- **With lineage**: {}", report.with_lineage);
    let _ = writeln!(out, "- **Without lineage**: {}", report.without_lineage);
    let _ = writeln!(out, "- **Completion rate**: {:.1}%", report.completion_rate * 100.0);
    let _ = writeln!(out, "- **With issues**: {}", report.with_issues);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Tables without lineage\n");
    let missing: Vec<_> = report.details.iter().filter(|d| !d.has_lineage).collect();
    if missing.is_empty() {
        let _ = writeln!(out, "Every table has lineage.");
    }
    for detail in missing {
        let _ = writeln!(out, "- `{}`", detail.fqn);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Tables with issues\n");
    let flagged: Vec<_> = report.details.iter().filter(|d| !d.issues.is_empty()).collect();
    if flagged.is_empty() {
        let _ = writeln!(out, "No issues detected.\n");
    }
    for detail in flagged {
        let _ = writeln!(out, "### `{}`\n", detail.table);
        let _ = writeln!(out, "FQN: `{}`\n", detail.fqn);
        for issue in &detail.issues {
            let _ = writeln!(out, "- {issue}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Details\n");
    for detail in &report.details {
        let _ = writeln!(out, "### `{}`\n", detail.table);
        let _ = writeln!(out, "- **FQN**: `{}`", detail.fqn);
        for (label, count, neighbours) in [
            ("Upstream", detail.upstream_count, &detail.upstream),
            ("Downstream", detail.downstream_count, &detail.downstream),
        ] {
            let _ = writeln!(out, "- **{label}**: {count}");
            for fqn in neighbours.iter().take(MARKDOWN_PREVIEW) {
                let _ = writeln!(out, "  - `{}`", short_name(fqn));
            }
            if neighbours.len() > MARKDOWN_PREVIEW {
                let _ = writeln!(out, "  - ... ({} more)", neighbours.len() - MARKDOWN_PREVIEW);
            }
        }
        let _ = writeln!(out);
    }
    out
}
