//! Uniform in-memory representation of coverage counters and dependency
//! identity. Extractors produce `CoverageUsage` values which the aggregator
//! attributes to nodes of the dependency graph.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DepcovError;

/// Compute a floored coverage percentage, returning 0 when the total is zero.
#[must_use]
pub fn percentage(covered: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        covered.saturating_mul(100) / total
    }
}

/// A (missed, total) pair for one metric category. Sums saturate at
/// `u64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub missed: u64,
    pub total: u64,
}

impl Counter {
    #[must_use]
    pub fn new(missed: u64, total: u64) -> Self {
        Self { missed, total }
    }

    #[must_use]
    pub fn covered(&self) -> u64 {
        self.total.saturating_sub(self.missed)
    }

    #[must_use]
    pub fn percentage(&self) -> u64 {
        percentage(self.covered(), self.total)
    }

    /// Field-wise difference, clamped at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            missed: self.missed.saturating_sub(other.missed),
            total: self.total.saturating_sub(other.total),
        }
    }
}

impl Add for Counter {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            missed: self.missed.saturating_add(rhs.missed),
            total: self.total.saturating_add(rhs.total),
        }
    }
}

impl AddAssign for Counter {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Which metric a counter measures, in report column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Instruction,
    Branch,
    Complexity,
    Line,
    Method,
    Class,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Instruction,
        Metric::Branch,
        Metric::Complexity,
        Metric::Line,
        Metric::Method,
        Metric::Class,
    ];

    /// Counter type name as used by JaCoCo XML.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Instruction => "INSTRUCTION",
            Metric::Branch => "BRANCH",
            Metric::Complexity => "COMPLEXITY",
            Metric::Line => "LINE",
            Metric::Method => "METHOD",
            Metric::Class => "CLASS",
        }
    }

    pub fn from_counter_type(s: &str) -> Option<Self> {
        Metric::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Additive record of the six coverage counters.
///
/// Addition is field-wise, so it is commutative and associative, and
/// `CoverageUsage::default()` is the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageUsage {
    pub instructions: Counter,
    pub branches: Counter,
    pub complexity: Counter,
    pub lines: Counter,
    pub methods: Counter,
    pub classes: Counter,
}

impl CoverageUsage {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn counter(&self, metric: Metric) -> Counter {
        match metric {
            Metric::Instruction => self.instructions,
            Metric::Branch => self.branches,
            Metric::Complexity => self.complexity,
            Metric::Line => self.lines,
            Metric::Method => self.methods,
            Metric::Class => self.classes,
        }
    }

    pub fn counter_mut(&mut self, metric: Metric) -> &mut Counter {
        match metric {
            Metric::Instruction => &mut self.instructions,
            Metric::Branch => &mut self.branches,
            Metric::Complexity => &mut self.complexity,
            Metric::Line => &mut self.lines,
            Metric::Method => &mut self.methods,
            Metric::Class => &mut self.classes,
        }
    }

    /// `(type, missed, covered)` triples in JaCoCo XML counter order.
    pub fn counters(&self) -> impl Iterator<Item = (Metric, u64, u64)> + '_ {
        [
            Metric::Instruction,
            Metric::Branch,
            Metric::Line,
            Metric::Complexity,
            Metric::Method,
            Metric::Class,
        ]
        .into_iter()
        .map(|m| {
            let c = self.counter(m);
            (m, c.missed, c.covered())
        })
    }

    /// Field-wise difference, clamped at zero. Used to derive the
    /// transitive share of an aggregate.
    #[must_use]
    pub fn saturating_sub(&self, other: &Self) -> Self {
        let mut out = *self;
        for m in Metric::ALL {
            *out.counter_mut(m) = self.counter(m).saturating_sub(other.counter(m));
        }
        out
    }
}

impl Add for CoverageUsage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for CoverageUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.instructions += rhs.instructions;
        self.branches += rhs.branches;
        self.complexity += rhs.complexity;
        self.lines += rhs.lines;
        self.methods += rhs.methods;
        self.classes += rhs.classes;
    }
}

impl<'a> AddAssign<&'a CoverageUsage> for CoverageUsage {
    fn add_assign(&mut self, rhs: &'a CoverageUsage) {
        *self += *rhs;
    }
}

impl Sum for CoverageUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, u| acc + u)
    }
}

/// Coverage extracted for one package row of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUsage {
    /// Dotted package name, e.g. `com.example.util`.
    pub package: String,
    pub usage: CoverageUsage,
}

/// (groupId, artifactId, version) identity of a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl Coordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// Directory name for this dependency's report views: separator
    /// characters in the ids become dots and the version is suffixed,
    /// e.g. `org.acme.acme.core-v1.2.0`.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!(
            "{}.{}-v{}",
            self.group_id.replace('-', "."),
            self.artifact_id.replace('-', "."),
            self.version
        )
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = DepcovError;

    /// Parses `group:artifact:version`. Longer ids such as
    /// `group:artifact:type:version` keep the first two and the last segment.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 3 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(DepcovError::MalformedManifest(format!(
                "'{s}' is not a group:artifact:version coordinate"
            )));
        }
        Ok(Coordinate::new(parts[0], parts[1], parts[parts.len() - 1]))
    }
}

/// Dependency scope as declared in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Runtime,
    Test,
    Provided,
    System,
    Import,
    #[serde(other)]
    Other,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::Provided => "provided",
            Scope::System => "system",
            Scope::Import => "import",
            Scope::Other => "other",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
