#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use depcov::archive::LocalRepository;
use depcov::config::{Overrides, RunConfig};
use depcov::model::Coordinate;
use tempfile::TempDir;

/// `(package, missed instructions, total instructions)` for every row of
/// the sample report.
pub const PACKAGES: [(&str, u64, u64); 7] = [
    ("org.acme.web", 10, 50),
    ("org.acme.core", 20, 100),
    ("org.util.json", 5, 20),
    ("io.sample.http", 30, 100),
    ("io.sample.codec", 0, 10),
    ("com.example.app", 25, 100),
    ("org.junit.runner", 100, 100),
];

/// Which jar ships which package.
pub const JARS: [(&str, &str); 5] = [
    ("org.acme:acme-web:2.0.0", "org/acme/web"),
    ("org.acme:acme-core:1.2.0", "org/acme/core"),
    ("org.util:tiny-json:0.3.1", "org/util/json"),
    ("io.sample:http-client:4.1", "io/sample/http"),
    ("io.sample:codec:1.0", "io/sample/codec"),
];

/// A temporary project with a manifest, a local repository and reports.
/// The caller must hold onto the value to keep the directory alive.
pub struct Project {
    pub dir: TempDir,
    pub manifest: PathBuf,
    pub repo: PathBuf,
    pub classes: PathBuf,
    pub xml_report: PathBuf,
    pub html_report: PathBuf,
}

impl Project {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> RunConfig {
        RunConfig::resolve(
            self.manifest.clone(),
            None,
            Overrides {
                local_repo: Some(self.repo.clone()),
                project_classes: vec![self.classes.clone()],
                ..Overrides::default()
            },
        )
        .unwrap()
    }
}

/// Write a jar for `coordinate` into the Maven-layout repository at `repo`.
pub fn write_jar(repo: &Path, coordinate: &str, entries: &[&str]) {
    let coordinate: Coordinate = coordinate.parse().unwrap();
    let path = LocalRepository::new(repo).jar_path(&coordinate);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
    let options = zip::write::FileOptions::default();
    writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
    writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
    for entry in entries {
        writer.start_file(*entry, options).unwrap();
        writer.write_all(&[0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
    }
    writer.finish().unwrap();
}

/// Drop an empty `.class` file for `package` under a classes directory.
pub fn write_class(classes: &Path, package: &str, class: &str) {
    let dir = classes.join(package.replace('.', "/"));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{class}.class")), b"").unwrap();
}

/// A JaCoCo XML report with an INSTRUCTION and a LINE counter per package
/// and report-level totals.
pub fn jacoco_xml(rows: &[(&str, u64, u64)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <!DOCTYPE report PUBLIC \"-//JACOCO//DTD Report 1.1//EN\" \"report.dtd\">\n\
         <report name=\"sample\">\n  <sessioninfo id=\"ci\" start=\"1\" dump=\"2\"/>\n",
    );
    for (package, missed, total) in rows {
        let covered = total - missed;
        let name = package.replace('.', "/");
        writeln!(xml, "  <package name=\"{name}\">").unwrap();
        writeln!(
            xml,
            "    <class name=\"{name}/Impl\"><counter type=\"INSTRUCTION\" missed=\"999\" covered=\"999\"/></class>"
        )
        .unwrap();
        writeln!(
            xml,
            "    <counter type=\"INSTRUCTION\" missed=\"{missed}\" covered=\"{covered}\"/>"
        )
        .unwrap();
        writeln!(xml, "    <counter type=\"LINE\" missed=\"1\" covered=\"9\"/>").unwrap();
        writeln!(xml, "  </package>").unwrap();
    }
    let missed: u64 = rows.iter().map(|r| r.1).sum();
    let covered: u64 = rows.iter().map(|r| r.2 - r.1).sum();
    let lines = rows.len();
    writeln!(
        xml,
        "  <counter type=\"INSTRUCTION\" missed=\"{missed}\" covered=\"{covered}\"/>"
    )
    .unwrap();
    writeln!(
        xml,
        "  <counter type=\"LINE\" missed=\"{lines}\" covered=\"{}\"/>",
        lines * 9
    )
    .unwrap();
    xml.push_str("</report>\n");
    xml
}

/// A JaCoCo HTML session index with the same numbers as [`jacoco_xml`].
/// Odd rows render instructions as bar images, even rows as text.
pub fn jacoco_html(rows: &[(&str, u64, u64)]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"en\"><head><title>sample</title></head><body>\n\
         <table class=\"coverage\" cellspacing=\"0\" id=\"coveragetable\">\n\
         <thead><tr><td class=\"sortable\" id=\"a\">Element</td><td class=\"down sortable bar\" id=\"b\">Missed Instructions</td><td class=\"sortable ctr2\" id=\"c\">Cov.</td><td class=\"sortable bar\" id=\"d\">Missed Branches</td><td class=\"sortable ctr2\" id=\"e\">Cov.</td><td class=\"sortable ctr1\" id=\"f\">Missed</td><td class=\"sortable ctr2\" id=\"g\">Cxty</td><td class=\"sortable ctr1\" id=\"h\">Missed</td><td class=\"sortable ctr2\" id=\"i\">Lines</td><td class=\"sortable ctr1\" id=\"j\">Missed</td><td class=\"sortable ctr2\" id=\"k\">Methods</td><td class=\"sortable ctr1\" id=\"l\">Missed</td><td class=\"sortable ctr2\" id=\"m\">Classes</td></tr></thead>\n",
    );

    let missed: u64 = rows.iter().map(|r| r.1).sum();
    let total: u64 = rows.iter().map(|r| r.2).sum();
    let n = rows.len();
    writeln!(
        html,
        "<tfoot><tr><td>Total</td><td class=\"bar\">{} of {}</td><td class=\"ctr2\">n/a</td><td class=\"bar\">0 of 0</td><td class=\"ctr2\">n/a</td><td class=\"ctr1\">0</td><td class=\"ctr2\">0</td><td class=\"ctr1\">{n}</td><td class=\"ctr2\">{}</td><td class=\"ctr1\">0</td><td class=\"ctr2\">0</td><td class=\"ctr1\">0</td><td class=\"ctr2\">0</td></tr></tfoot>",
        group(missed),
        group(total),
        n * 10
    )
    .unwrap();

    html.push_str("<tbody>\n");
    for (i, (package, missed, total)) in rows.iter().enumerate() {
        let covered = total - missed;
        let instructions = if i % 2 == 1 {
            format!(
                "<img src=\"jacoco-resources/redbar.gif\" width=\"10\" height=\"10\" title=\"{missed}\" alt=\"{missed}\"/><img src=\"jacoco-resources/greenbar.gif\" width=\"40\" height=\"10\" title=\"{covered}\" alt=\"{covered}\"/>"
            )
        } else {
            format!("{} of {}", group(*missed), group(*total))
        };
        writeln!(
            html,
            "<tr><td id=\"a{i}\"><a href=\"{package}/index.html\" class=\"el_package\">{package}</a></td><td class=\"bar\" id=\"b{i}\">{instructions}</td><td class=\"ctr2\" id=\"c{i}\">n/a</td><td class=\"bar\" id=\"d{i}\"/><td class=\"ctr2\" id=\"e{i}\">n/a</td><td class=\"ctr1\" id=\"f{i}\">0</td><td class=\"ctr2\" id=\"g{i}\">0</td><td class=\"ctr1\" id=\"h{i}\">1</td><td class=\"ctr2\" id=\"i{i}\">10</td><td class=\"ctr1\" id=\"j{i}\">0</td><td class=\"ctr2\" id=\"k{i}\">0</td><td class=\"ctr1\" id=\"l{i}\">0</td><td class=\"ctr2\" id=\"m{i}\">0</td></tr>"
        )
        .unwrap();
    }
    html.push_str("</tbody>\n</table></body></html>\n");
    html
}

/// Render with a comma thousands separator.
pub fn group(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// The sample project: `tests/fixtures/lockfile.json`, jars for every
/// non-pruned dependency, project classes and both report formats.
pub fn sample_project() -> Project {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let manifest = root.join("lockfile.json");
    std::fs::write(&manifest, include_str!("../fixtures/lockfile.json")).unwrap();

    let repo = root.join("m2");
    for (coordinate, package_path) in JARS {
        let class = format!("{package_path}/Impl.class");
        write_jar(&repo, coordinate, &[class.as_str(), "LICENSE.txt"]);
    }

    let classes = root.join("target").join("classes");
    write_class(&classes, "com.example.app", "Main");

    let xml_report = root.join("jacoco.xml");
    std::fs::write(&xml_report, jacoco_xml(&PACKAGES)).unwrap();
    let html_report = root.join("index.html");
    std::fs::write(&html_report, jacoco_html(&PACKAGES)).unwrap();

    Project {
        dir,
        manifest,
        repo,
        classes,
        xml_report,
        html_report,
    }
}
