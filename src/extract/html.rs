/// Extractor for the JaCoCo HTML session index (`index.html`).
///
/// The coverage table has one `<tbody>` row per package and a `Total` row
/// in `<tfoot>`. After the name cell, each row carries 12 cells:
///
///   1  instructions   "missed of total" text or red/green bar images
///   2  instruction coverage %   (ignored)
///   3  branches       same form as instructions
///   4  branch coverage %        (ignored)
///   5  missed complexity       6  total complexity
///   7  missed lines            8  total lines
///   9  missed methods         10  total methods
///  11  missed classes         12  total classes
///
/// Numbers may carry locale grouping separators (`1,234`).
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::{add_counts, count_or_zero, parse_count, Format, ReportExtractor};
use crate::error::Result;
use crate::model::{Counter, CoverageUsage, PackageUsage};

/// Cells expected after the package name cell.
pub const EXPECTED_FIELDS: usize = 12;

static TBODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tbody[^>]*>(.*?)</tbody>").unwrap());
static TFOOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tfoot[^>]*>(.*?)</tfoot>").unwrap());
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").unwrap());
/// Matches both `<td ...>content</td>` and self-closed `<td .../>`.
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td([^>]*?)(?:/>|>(.*?)</td>)").unwrap());
static BAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img[^>]*?src="[^"]*?(red|green)bar\.gif"[^>]*?title="([^"]*)""#).unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static OF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^(.+?)\s+of\s+(.+)$").unwrap());

/// JaCoCo HTML report extractor.
pub struct HtmlExtractor;

impl ReportExtractor for HtmlExtractor {
    fn format(&self) -> Format {
        Format::Html
    }

    fn can_extract(&self, path: &Path, content: &[u8]) -> bool {
        if super::has_extension(path, &["html", "htm"]) {
            return true;
        }
        let head = super::sniff_head(content).to_lowercase();
        head.contains("<!doctype html") || head.contains("<html") || head.contains("<table")
    }

    fn extract_streaming(
        &self,
        input: &[u8],
        emit: &mut dyn FnMut(PackageUsage) -> Result<()>,
    ) -> Result<Option<CoverageUsage>> {
        let html = String::from_utf8_lossy(input);

        match TBODY_RE.captures(&html) {
            Some(body) => {
                for row in ROW_RE.captures_iter(&body[1]) {
                    if let Some(pkg) = parse_row(&row[1]) {
                        emit(pkg)?;
                    }
                }
            }
            None => debug!("report has no package table body"),
        }

        let total = TFOOT_RE
            .captures(&html)
            .and_then(|foot| {
                ROW_RE
                    .captures_iter(&foot[1])
                    .find_map(|row| parse_row(&row[1]))
            })
            .map(|row| row.usage);
        Ok(total)
    }
}

/// Inner HTML of every cell in a row, in order. Self-closed cells are empty.
fn cells(row: &str) -> Vec<&str> {
    CELL_RE
        .captures_iter(row)
        .map(|c| c.get(2).map_or("", |m| m.as_str()))
        .collect()
}

/// Visible text of a cell.
fn cell_text(cell: &str) -> String {
    TAG_RE
        .replace_all(cell, "")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .trim()
        .to_string()
}

fn parse_row(row: &str) -> Option<PackageUsage> {
    let cells = cells(row);
    let (name, fields) = cells.split_first()?;
    let package = cell_text(name);
    if package.is_empty() {
        return None;
    }
    if fields.len() < EXPECTED_FIELDS {
        warn!(
            package = %package,
            found = fields.len(),
            expected = EXPECTED_FIELDS,
            "short report row, missing cells count as 0"
        );
    }

    let field = |i: usize| fields.get(i).copied().unwrap_or("");
    let count = |i: usize, label: &str| count_or_zero(&cell_text(field(i)), &package, label);

    let usage = CoverageUsage {
        instructions: parse_pair(field(0), &package, "instructions"),
        branches: parse_pair(field(2), &package, "branches"),
        complexity: Counter::new(count(4, "missed complexity"), count(5, "complexity")),
        lines: Counter::new(count(6, "missed lines"), count(7, "lines")),
        methods: Counter::new(count(8, "missed methods"), count(9, "methods")),
        classes: Counter::new(count(10, "missed classes"), count(11, "classes")),
    };
    Some(PackageUsage { package, usage })
}

/// Parse an instruction or branch cell: either `missed of total` text or
/// a pair of bar images whose titles hold missed (red) and covered (green).
fn parse_pair(cell: &str, package: &str, field: &str) -> Counter {
    let mut bars = BAR_RE.captures_iter(cell).peekable();
    if bars.peek().is_some() {
        let (mut missed, mut covered) = (0, 0);
        for bar in bars {
            let n = count_or_zero(&bar[2], package, field);
            if bar[1].eq_ignore_ascii_case("red") {
                missed = add_counts(missed, n, package, field);
            } else {
                covered = add_counts(covered, n, package, field);
            }
        }
        return Counter::new(missed, add_counts(missed, covered, package, field));
    }

    let text = cell_text(cell);
    if text.is_empty() {
        return Counter::default();
    }
    match OF_RE.captures(&text) {
        Some(c) => match (parse_count(&c[1]), parse_count(&c[2])) {
            (Some(missed), Some(total)) => Counter::new(missed, total),
            _ => {
                warn!(package, field, value = %text, "unparsable counter pair, using 0");
                Counter::default()
            }
        },
        None => {
            warn!(package, field, value = %text, "expected 'missed of total', using 0");
            Counter::default()
        }
    }
}
