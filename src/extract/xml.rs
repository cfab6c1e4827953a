/// Extractor for JaCoCo XML reports.
///
/// Only package-level and report-level counters are read:
///   <report name="...">
///     <sessioninfo .../>
///     <package name="com/example">
///       <class ...> ... </class>            (ignored)
///       <sourcefile ...> ... </sourcefile>  (ignored)
///       <counter type="INSTRUCTION" missed="2" covered="10"/>   <- package
///       ...
///     </package>
///     <counter type="INSTRUCTION" missed="7" covered="90"/>     <- total
///   </report>
///
/// Multi-module reports wrap packages in `<group>` elements; group-level
/// counters are skipped since the packages already carry them.
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{add_counts, count_or_zero, Format, ReportExtractor};
use crate::error::{DepcovError, Result};
use crate::model::{Counter, CoverageUsage, Metric, PackageUsage};

/// JaCoCo XML report extractor.
pub struct XmlExtractor;

impl ReportExtractor for XmlExtractor {
    fn format(&self) -> Format {
        Format::Xml
    }

    fn can_extract(&self, path: &Path, content: &[u8]) -> bool {
        if super::has_extension(path, &["xml"]) {
            return true;
        }
        let head = super::sniff_head(content);
        let trimmed = head.trim_start();
        (trimmed.starts_with("<?xml") || trimmed.starts_with("<report"))
            && head.contains("<report")
            && (head.contains("JACOCO") || head.contains("jacoco") || head.contains("<package"))
    }

    fn extract_streaming(
        &self,
        input: &[u8],
        emit: &mut dyn FnMut(PackageUsage) -> Result<()>,
    ) -> Result<Option<CoverageUsage>> {
        extract_streaming(input, emit)
    }
}

fn xml_err(source: quick_xml::Error, reader: &Reader<&[u8]>) -> DepcovError {
    DepcovError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Parse one `<counter>` element into its metric and counter.
fn read_counter(e: &BytesStart, package: &str) -> Option<(Metric, Counter)> {
    let kind = get_attr(e, b"type")?;
    let Some(metric) = Metric::from_counter_type(&kind) else {
        tracing::debug!(package, counter = kind, "ignoring unknown counter type");
        return None;
    };
    let field = metric.as_str();
    let missed = count_or_zero(&get_attr(e, b"missed").unwrap_or_default(), package, field);
    let covered = count_or_zero(&get_attr(e, b"covered").unwrap_or_default(), package, field);
    Some((metric, Counter::new(missed, add_counts(missed, covered, package, field))))
}

fn extract_streaming(
    input: &[u8],
    emit: &mut dyn FnMut(PackageUsage) -> Result<()>,
) -> Result<Option<CoverageUsage>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    let mut buf = Vec::new();

    // Names of the currently open elements.
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<PackageUsage> = None;
    let mut total: Option<CoverageUsage> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.name().as_ref() {
                    b"package" if is_start => {
                        let name = get_attr(e, b"name").unwrap_or_default();
                        current = Some(PackageUsage {
                            package: name.replace('/', "."),
                            usage: CoverageUsage::default(),
                        });
                    }
                    b"counter" => match stack.last().map(Vec::as_slice) {
                        Some(b"package") => {
                            if let Some(pkg) = current.as_mut() {
                                if let Some((metric, counter)) = read_counter(e, &pkg.package) {
                                    *pkg.usage.counter_mut(metric) = counter;
                                }
                            }
                        }
                        Some(b"report") => {
                            if let Some((metric, counter)) = read_counter(e, "<total>") {
                                let usage = total.get_or_insert_with(CoverageUsage::default);
                                *usage.counter_mut(metric) = counter;
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                }
                if is_start {
                    stack.push(e.name().as_ref().to_vec());
                }
            }
            Ok(Event::End(ref e)) => {
                stack.pop();
                if e.name().as_ref() == b"package" {
                    if let Some(pkg) = current.take() {
                        if !pkg.package.is_empty() {
                            emit(pkg)?;
                        }
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(total)
}
