//! Output formatting for attribution runs.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::aggregate::NodeView;
use crate::error::{DepcovError, Result};
use crate::extract::Format;
use crate::model::{percentage, Counter, CoverageUsage};

/// How a [`RunReport`] is rendered.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Text,
    Markdown,
    Json,
}

impl Style {
    pub fn formatter(&self) -> &'static dyn ReportFormatter {
        match self {
            Style::Text => &TextFormatter,
            Style::Markdown => &MarkdownFormatter,
            Style::Json => &JsonFormatter,
        }
    }
}

/// Where one report package was attributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributedPackage {
    pub package: String,
    /// `group:artifact:version`, `project` or `unresolved`.
    pub owner: String,
}

/// Everything one attribution run produced, ready to be formatted.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Path of the coverage report that was read.
    pub report: String,
    pub format: Format,
    /// RFC 3339 timestamp of when the run finished.
    pub generated_at: String,
    pub dependencies: usize,
    pub pruned: usize,
    /// Node views keyed by output path.
    pub views: BTreeMap<String, NodeView>,
    /// Dependencies only, each counted once.
    pub grand_total: CoverageUsage,
    /// Packages owned by the project itself.
    pub project: CoverageUsage,
    pub overall_total: CoverageUsage,
    /// The report's own footer total, if it had one.
    pub report_total: Option<CoverageUsage>,
    pub attribution: Vec<AttributedPackage>,
}

impl RunReport {
    pub fn new(report: impl Into<String>, format: Format) -> Self {
        Self {
            report: report.into(),
            format,
            generated_at: chrono::Utc::now().to_rfc3339(),
            dependencies: 0,
            pruned: 0,
            views: BTreeMap::new(),
            grand_total: CoverageUsage::default(),
            project: CoverageUsage::default(),
            overall_total: CoverageUsage::default(),
            report_total: None,
            attribution: Vec::new(),
        }
    }

    /// Store a node view. Writing the same view twice is a no-op; a
    /// different view for an already written path is an error.
    pub fn insert_view(&mut self, view: NodeView) -> Result<()> {
        match self.views.get(&view.path) {
            Some(existing) if *existing == view => Ok(()),
            Some(_) => Err(DepcovError::Emit {
                path: view.path,
                message: "a different view was already written to this path".to_string(),
            }),
            None => {
                self.views.insert(view.path.clone(), view);
                Ok(())
            }
        }
    }

    pub fn unresolved_count(&self) -> usize {
        self.attribution
            .iter()
            .filter(|a| a.owner == "unresolved")
            .count()
    }

    /// Format using a specific formatter.
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }
}

/// Trait for formatting run reports.
pub trait ReportFormatter {
    /// Format the report to a string.
    fn format(&self, report: &RunReport) -> String;
}

fn ratio(c: &Counter) -> String {
    let covered = c.covered();
    let total = c.total;
    let pct = c.percentage();
    format!("{covered}/{total} ({pct}%)")
}

fn summary(u: &CoverageUsage) -> String {
    format!(
        "instructions {}, branches {}, lines {}",
        ratio(&u.instructions),
        ratio(&u.branches),
        ratio(&u.lines)
    )
}

/// Share of the denominator's instructions that the view accounts for.
fn share(view: &NodeView) -> u64 {
    percentage(
        view.aggregate.instructions.total,
        view.denominator.instructions.total,
    )
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &RunReport) -> String {
        let mut out = String::new();

        let path = &report.report;
        let format = report.format;
        writeln!(out, "Dependency coverage for {path} ({format})").unwrap();
        let deps = report.dependencies;
        let pruned = report.pruned;
        let unresolved = report.unresolved_count();
        writeln!(
            out,
            "{deps} dependencies, {pruned} pruned, {unresolved} unresolved packages"
        )
        .unwrap();

        if report.views.is_empty() {
            out.push_str("\nNo dependencies in the manifest.\n");
        }
        for view in report.views.values() {
            out.push('\n');
            writeln!(out, "{}", view.path).unwrap();
            let root = if view.is_root { ", direct" } else { "" };
            writeln!(out, "  {} ({}{root})", view.coordinate, view.scope).unwrap();
            writeln!(out, "  own:        {}", summary(&view.own)).unwrap();
            writeln!(out, "  transitive: {}", summary(&view.transitive)).unwrap();
            if !view.is_root || view.denominator != view.aggregate {
                writeln!(out, "  share:      {}% of parent instructions", share(view)).unwrap();
            }
        }

        out.push('\n');
        writeln!(out, "Dependency total: {}", summary(&report.grand_total)).unwrap();
        writeln!(out, "Project:          {}", summary(&report.project)).unwrap();
        writeln!(out, "Overall total:    {}", summary(&report.overall_total)).unwrap();
        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &RunReport) -> String {
        let mut md = String::new();

        let overall = report.overall_total.instructions.percentage();
        writeln!(md, "### Dependency Coverage: {overall}%\n").unwrap();

        if report.views.is_empty() {
            md.push_str("No dependencies in the manifest.\n");
        } else {
            md.push_str("| Path | Dependency | Own | Transitive | Share |\n");
            md.push_str("|:-----|:-----------|----:|-----------:|------:|\n");
            for view in report.views.values() {
                writeln!(
                    md,
                    "| `{}` | {} | {} | {} | {}% |",
                    view.path,
                    view.coordinate,
                    ratio(&view.own.instructions),
                    ratio(&view.transitive.instructions),
                    share(view)
                )
                .unwrap();
            }
        }

        md.push_str("\n| Total | Instructions | Branches | Lines | Methods | Classes |\n");
        md.push_str("|:------|-------------:|---------:|------:|--------:|--------:|\n");
        for (label, u) in [
            ("Dependencies", &report.grand_total),
            ("Project", &report.project),
            ("Overall", &report.overall_total),
        ] {
            writeln!(
                md,
                "| {label} | {} | {} | {} | {} | {} |",
                ratio(&u.instructions),
                ratio(&u.branches),
                ratio(&u.lines),
                ratio(&u.methods),
                ratio(&u.classes)
            )
            .unwrap();
        }

        let unresolved = report.unresolved_count();
        if unresolved > 0 {
            writeln!(md, "\n<sub>{unresolved} report packages were not attributed</sub>").unwrap();
        }
        md
    }
}

/// JSON formatter. Counters use the `(type, missed, covered)` shape of
/// JaCoCo XML counters.
pub struct JsonFormatter;

fn counters_json(u: &CoverageUsage) -> Value {
    Value::Array(
        u.counters()
            .map(|(metric, missed, covered)| {
                json!({ "type": metric.as_str(), "missed": missed, "covered": covered })
            })
            .collect(),
    )
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &RunReport) -> String {
        let views: Vec<Value> = report
            .views
            .values()
            .map(|v| {
                let packages: serde_json::Map<String, Value> = v
                    .packages
                    .iter()
                    .map(|(name, u)| (name.clone(), counters_json(u)))
                    .collect();
                json!({
                    "path": v.path,
                    "dependency": v.coordinate.to_string(),
                    "scope": v.scope,
                    "direct": v.is_root,
                    "own": counters_json(&v.own),
                    "transitive": counters_json(&v.transitive),
                    "aggregate": counters_json(&v.aggregate),
                    "denominator": counters_json(&v.denominator),
                    "packages": packages,
                })
            })
            .collect();

        let attribution: serde_json::Map<String, Value> = report
            .attribution
            .iter()
            .map(|a| (a.package.clone(), Value::String(a.owner.clone())))
            .collect();

        let value = json!({
            "report": report.report,
            "format": report.format.as_str(),
            "generated_at": report.generated_at,
            "dependencies": report.dependencies,
            "pruned": report.pruned,
            "totals": {
                "dependencies": counters_json(&report.grand_total),
                "project": counters_json(&report.project),
                "overall": counters_json(&report.overall_total),
                "report": report.report_total.as_ref().map(counters_json),
            },
            "views": views,
            "attribution": attribution,
        });
        format!("{value:#}\n")
    }
}
