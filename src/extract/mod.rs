//! Extraction of per-package coverage counters from generated reports.
//!
//! Two report shapes are understood:
//!   - the HTML session index (`index.html`), one table row per package
//!     with the counters in fixed column positions and a `Total` footer;
//!   - the XML report (`jacoco.xml`), one `<package>` element per package
//!     with `<counter>` children and report-level counters as the total.
pub mod html;
pub mod xml;

use std::path::Path;

use tracing::{info, warn};

use crate::error::{DepcovError, Result};
use crate::model::{CoverageUsage, PackageUsage};

pub use html::HtmlExtractor;
pub use xml::XmlExtractor;

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Xml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Xml => "xml",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = DepcovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Format::Html),
            "xml" => Ok(Format::Xml),
            _ => Err(DepcovError::Parse(format!(
                "Unknown format: '{s}'. Supported: html, xml"
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything pulled out of one report.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub packages: Vec<PackageUsage>,
    /// The report's own footer total, when it has one.
    pub total: Option<CoverageUsage>,
}

impl Extraction {
    /// Sum of all extracted package rows.
    pub fn package_sum(&self) -> CoverageUsage {
        self.packages.iter().map(|p| p.usage).sum()
    }
}

/// Every report extractor implements this trait.
pub trait ReportExtractor {
    fn format(&self) -> Format;

    /// Whether this extractor recognizes the file.
    fn can_extract(&self, path: &Path, content: &[u8]) -> bool;

    /// Call `emit` once per package row and return the footer total, if any.
    fn extract_streaming(
        &self,
        input: &[u8],
        emit: &mut dyn FnMut(PackageUsage) -> Result<()>,
    ) -> Result<Option<CoverageUsage>>;

    /// Collect all package rows into an [`Extraction`].
    fn extract(&self, input: &[u8]) -> Result<Extraction> {
        let mut packages = Vec::new();
        let total = self.extract_streaming(input, &mut |p| {
            packages.push(p);
            Ok(())
        })?;
        Ok(Extraction { packages, total })
    }
}

fn extractor_for(format: Format) -> &'static dyn ReportExtractor {
    match format {
        Format::Html => &HtmlExtractor,
        Format::Xml => &XmlExtractor,
    }
}

/// Detect the report format from file name and content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    let extractors: [&dyn ReportExtractor; 2] = [&XmlExtractor, &HtmlExtractor];
    extractors
        .into_iter()
        .find(|e| e.can_extract(path, content))
        .map(|e| e.format())
}

/// Read a report, detect its format (or use the override) and extract it.
pub fn extract_file(path: &Path, format_override: Option<Format>) -> Result<(Format, Extraction)> {
    let content = std::fs::read(path)?;
    let format = match format_override {
        Some(f) => f,
        None => detect_format(path, &content).ok_or(DepcovError::UnknownFormat)?,
    };
    let extraction = extractor_for(format).extract(&content)?;

    info!(
        report = %path.display(),
        %format,
        packages = extraction.packages.len(),
        "extracted coverage report"
    );
    if let Some(total) = extraction.total {
        let sum = extraction.package_sum();
        if sum != total {
            warn!(
                report = %path.display(),
                "package rows do not add up to the report total ({} of {} instructions missed in rows, {} of {} in total)",
                sum.instructions.missed,
                sum.instructions.total,
                total.instructions.missed,
                total.instructions.total,
            );
        }
    }
    Ok((format, extraction))
}

/// Parse an integer that may carry grouping separators
/// (`1,234`, `1.234`, `1 234`, `1'234`). Returns `None` for anything else.
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | '\'' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Like [`parse_count`], but logs and yields zero for unparsable text.
/// Blank cells are zero without a warning.
pub(crate) fn count_or_zero(text: &str, package: &str, field: &str) -> u64 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }
    match parse_count(text) {
        Some(n) => n,
        None => {
            warn!(package, field, value = text, "unparsable number, using 0");
            0
        }
    }
}

/// `a + b`, clamped at `u64::MAX` with a warning on overflow.
pub(crate) fn add_counts(a: u64, b: u64, package: &str, field: &str) -> u64 {
    a.checked_add(b).unwrap_or_else(|| {
        warn!(package, field, "counter overflows u64, clamping");
        u64::MAX
    })
}

/// Read the first bytes of a file as text, for format sniffing.
pub(crate) fn sniff_head(content: &[u8]) -> String {
    let head_len = content.len().min(4096);
    String::from_utf8_lossy(&content[..head_len]).into_owned()
}

pub(crate) fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_grouping() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("1.234.567"), Some(1_234_567));
        assert_eq!(parse_count(" 5 000 "), Some(5000));
        assert_eq!(parse_count("12\u{a0}345"), Some(12345));
        assert_eq!(parse_count("0"), Some(0));
    }

    #[test]
    fn test_parse_count_rejects_garbage() {
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("n/a"), None);
        assert_eq!(parse_count("-5"), None);
    }

    #[test]
    fn test_count_or_zero() {
        assert_eq!(count_or_zero("1,234", "p", "lines"), 1234);
        assert_eq!(count_or_zero("abc", "p", "lines"), 0);
        assert_eq!(count_or_zero("  ", "p", "lines"), 0);
    }

    #[test]
    fn test_add_counts_clamps() {
        assert_eq!(add_counts(2, 3, "p", "lines"), 5);
        assert_eq!(add_counts(u64::MAX - 1, 5, "p", "lines"), u64::MAX);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("HTML".parse::<Format>().unwrap(), Format::Html);
        assert_eq!("xml".parse::<Format>().unwrap(), Format::Xml);
        assert!("csv".parse::<Format>().is_err());
    }

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(
            detect_format(Path::new("site/index.html"), b""),
            Some(Format::Html)
        );
        assert_eq!(detect_format(Path::new("random.dat"), b"hello"), None);
    }

    #[test]
    fn test_detect_by_content() {
        let xml = br#"<?xml version="1.0"?><!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd"><report name="x">"#;
        assert_eq!(detect_format(Path::new("out.txt"), xml), Some(Format::Xml));

        let html = b"<!DOCTYPE html><html><body><table class=\"coverage\">";
        assert_eq!(detect_format(Path::new("out"), html), Some(Format::Html));
    }

    #[test]
    fn test_extract_file_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.dat");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(
            extract_file(&path, None),
            Err(DepcovError::UnknownFormat)
        ));
    }
}
