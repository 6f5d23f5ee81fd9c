//! Base/head result comparison.
//!
//! Suites are aligned by exact name in base order, then tests by exact name
//! in base-suite order. Only pairs present on both sides yield a
//! [`ComparisonEntry`]. A base suite with no head counterpart is reported as a
//! [`ComparisonWarning`]; a base test with no head counterpart is skipped.
//! Nothing here fails: a zero base count produces an entry whose percentage
//! is unavailable plus a division-by-zero warning.

use crate::format::{format_number, NOT_AVAILABLE};
use crate::result::{BenchmarkResult, Suite};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Shields.io static badge endpoint.
pub const BADGE_BASE_URL: &str = "https://img.shields.io/badge";

/// Classification of a percentage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    /// More than 20% faster.
    Excellent,
    /// More than 5% faster.
    Good,
    /// Within the noise band, or not computable.
    Neutral,
    /// More than 5% slower.
    Caution,
    /// More than 20% slower.
    Regression,
}

impl SeverityTier {
    /// Classify a percentage change.
    ///
    /// Rules are checked in order and the first match wins:
    /// `> 20` excellent, `> 5` good, `< -20` regression, `< -5` caution,
    /// otherwise neutral. NaN falls through to neutral.
    ///
    /// The neutral band is symmetric around zero. Identical base and head
    /// results (0%) must classify as neutral rather than as a slowdown, and
    /// the slower tiers must stay reachable, so caution starts below `-5`
    /// mirroring the `> 5` cut for good.
    pub fn classify(percent: f64) -> Self {
        if percent > 20.0 {
            SeverityTier::Excellent
        } else if percent > 5.0 {
            SeverityTier::Good
        } else if percent < -20.0 {
            SeverityTier::Regression
        } else if percent < -5.0 {
            SeverityTier::Caution
        } else {
            SeverityTier::Neutral
        }
    }

    /// Badge color for this tier.
    pub fn color(self) -> &'static str {
        match self {
            SeverityTier::Excellent => "brightgreen",
            SeverityTier::Good => "green",
            SeverityTier::Neutral => "yellow",
            SeverityTier::Caution => "orange",
            SeverityTier::Regression => "red",
        }
    }

    /// Lowercase tier name.
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityTier::Excellent => "excellent",
            SeverityTier::Good => "good",
            SeverityTier::Neutral => "neutral",
            SeverityTier::Caution => "caution",
            SeverityTier::Regression => "regression",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One matched test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    /// Test name.
    pub test_name: String,
    /// Base throughput.
    pub base_count: f64,
    /// Head throughput.
    pub head_count: f64,
    /// `head_count - base_count`.
    pub abs_diff: f64,
    /// `(head - base) * 100 / base`; `None` when the base count is zero.
    pub percent_diff: Option<f64>,
    /// Severity of the change.
    pub tier: SeverityTier,
    /// Badge image URL encoding the rounded percentage and tier color.
    pub badge: String,
}

impl ComparisonEntry {
    /// Compare two counts of the same test.
    pub fn new(test_name: impl Into<String>, base_count: f64, head_count: f64) -> Self {
        let abs_diff = head_count - base_count;
        let percent_diff = if base_count == 0.0 {
            None
        } else {
            Some(abs_diff * 100.0 / base_count)
        };
        let tier = percent_diff.map_or(SeverityTier::Neutral, SeverityTier::classify);
        Self {
            test_name: test_name.into(),
            base_count,
            head_count,
            abs_diff,
            percent_diff,
            tier,
            badge: badge_url(percent_diff, tier),
        }
    }
}

/// All entries of one matched suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteComparison {
    /// Suite name.
    pub name: String,
    /// Entries in base order.
    pub entries: Vec<ComparisonEntry>,
}

/// Which result a missing item was expected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The base (target branch) result.
    Base,
    /// The head (PR branch) result.
    Head,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Base => "base",
            Side::Head => "head",
        })
    }
}

/// Non-fatal comparison findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComparisonWarning {
    /// A base suite has no counterpart in the other result.
    SuiteMissing {
        /// Suite name.
        suite: String,
        /// Result the suite is missing from.
        missing_from: Side,
    },
    /// A matched test has a zero base count.
    DivisionByZero {
        /// Suite name.
        suite: String,
        /// Test name.
        test: String,
    },
}

impl fmt::Display for ComparisonWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonWarning::SuiteMissing {
                suite,
                missing_from,
            } => write!(f, "suite '{}' is missing from the {} result", suite, missing_from),
            ComparisonWarning::DivisionByZero { suite, test } => write!(
                f,
                "test '{}' in suite '{}' has a zero base count; percentage is {}",
                test, suite, NOT_AVAILABLE
            ),
        }
    }
}

/// Full comparison of two results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Matched suites in base order. Suites may have no entries.
    pub suites: Vec<SuiteComparison>,
    /// Findings that did not stop the comparison.
    pub warnings: Vec<ComparisonWarning>,
}

impl Comparison {
    /// Number of entries across all suites.
    pub fn entry_count(&self) -> usize {
        self.suites.iter().map(|s| s.entries.len()).sum()
    }

    /// Iterate every entry with its suite name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ComparisonEntry)> {
        self.suites
            .iter()
            .flat_map(|s| s.entries.iter().map(move |e| (s.name.as_str(), e)))
    }

    /// Entry count per tier, in tier order excellent..regression.
    pub fn tier_counts(&self) -> [(SeverityTier, usize); 5] {
        let mut counts = [
            (SeverityTier::Excellent, 0),
            (SeverityTier::Good, 0),
            (SeverityTier::Neutral, 0),
            (SeverityTier::Caution, 0),
            (SeverityTier::Regression, 0),
        ];
        for (_, entry) in self.entries() {
            if let Some(slot) = counts.iter_mut().find(|(tier, _)| *tier == entry.tier) {
                slot.1 += 1;
            }
        }
        counts
    }
}

/// Compare a base result against a head result.
pub fn compare(base: &BenchmarkResult, head: &BenchmarkResult) -> Comparison {
    let mut comparison = Comparison::default();

    for base_suite in &base.suites {
        let Some(head_suite) = head.suite(&base_suite.name) else {
            warn!(suite = %base_suite.name, "Suite not defined in both results, skipping");
            comparison.warnings.push(ComparisonWarning::SuiteMissing {
                suite: base_suite.name.clone(),
                missing_from: Side::Head,
            });
            continue;
        };
        let suite = compare_suite(base_suite, head_suite, &mut comparison.warnings);
        comparison.suites.push(suite);
    }

    for head_suite in &head.suites {
        if base.suite(&head_suite.name).is_none() {
            debug!(suite = %head_suite.name, "Suite only present in head result, skipping");
        }
    }

    comparison
}

fn compare_suite(
    base: &Suite,
    head: &Suite,
    warnings: &mut Vec<ComparisonWarning>,
) -> SuiteComparison {
    let mut entries = Vec::with_capacity(base.tests.len());
    for base_test in &base.tests {
        let Some(head_test) = head.test(&base_test.name) else {
            debug!(suite = %base.name, test = %base_test.name, "Test missing from head result, skipping");
            continue;
        };
        let entry = ComparisonEntry::new(&base_test.name, base_test.count, head_test.count);
        if entry.percent_diff.is_none() {
            warn!(suite = %base.name, test = %base_test.name, "Zero base count, percentage not available");
            warnings.push(ComparisonWarning::DivisionByZero {
                suite: base.name.clone(),
                test: base_test.name.clone(),
            });
        }
        entries.push(entry);
    }
    SuiteComparison {
        name: base.name.clone(),
        entries,
    }
}

/// Build the badge URL for a percentage change.
///
/// The label is the percentage rounded to whole numbers with an explicit
/// sign. Shields.io reserves `-` and `_` as separators, so they are doubled;
/// everything else outside `[A-Za-z0-9.]` is percent-encoded.
pub fn badge_url(percent: Option<f64>, tier: SeverityTier) -> String {
    let message = match percent {
        Some(p) => format!("{}%", format_number(p, 0, true)),
        None => NOT_AVAILABLE.to_string(),
    };
    format!(
        "{}/performance-{}-{}.svg",
        BADGE_BASE_URL,
        escape_badge_text(&message),
        tier.color()
    )
}

fn escape_badge_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        match ch {
            '-' => out.push_str("--"),
            '_' => out.push_str("__"),
            c if c.is_ascii_alphanumeric() || c == '.' => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::result::TestMeasurement;
    use serde_json::json;

    fn result(value: serde_json::Value) -> BenchmarkResult {
        normalize(&value).unwrap()
    }

    #[test]
    fn test_excellent_example() {
        let base = result(json!({ "suiteA": [ { "name": "t1", "count": 1000 } ] }));
        let head = result(json!({ "suiteA": [ { "name": "t1", "count": 1300 } ] }));
        let comparison = compare(&base, &head);

        assert!(comparison.warnings.is_empty());
        let entry = &comparison.suites[0].entries[0];
        assert_eq!(entry.percent_diff, Some(30.0));
        assert_eq!(entry.tier, SeverityTier::Excellent);
        assert_eq!(format_number(entry.abs_diff, 2, true), "+300");
        assert_eq!(
            entry.badge,
            "https://img.shields.io/badge/performance-%2B30%25-brightgreen.svg"
        );
    }

    #[test]
    fn test_suite_missing_from_head() {
        let base = result(json!({ "suiteA": [ { "name": "t1", "count": 1000 } ] }));
        let head = result(json!({ "suiteB": [ { "name": "t1", "count": 1000 } ] }));
        let comparison = compare(&base, &head);

        assert_eq!(comparison.entry_count(), 0);
        assert!(comparison.suites.is_empty());
        assert_eq!(
            comparison.warnings,
            vec![ComparisonWarning::SuiteMissing {
                suite: "suiteA".to_string(),
                missing_from: Side::Head,
            }]
        );
        assert!(comparison.warnings[0].to_string().contains("'suiteA'"));
    }

    #[test]
    fn test_missing_test_leaves_siblings_intact() {
        let base = result(json!({ "s": [
            { "name": "a", "count": 100 },
            { "name": "gone", "count": 100 },
            { "name": "c", "count": 100 }
        ] }));
        let head = result(json!({ "s": [
            { "name": "c", "count": 90 },
            { "name": "a", "count": 110 },
            { "name": "new", "count": 1 }
        ] }));
        let comparison = compare(&base, &head);
        let names: Vec<_> = comparison.suites[0]
            .entries
            .iter()
            .map(|e| e.test_name.as_str())
            .collect();
        assert_eq!(names, ["a", "c"]);
        assert!(comparison.warnings.is_empty());
        assert!((comparison.suites[0].entries[1].percent_diff.unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_base_count() {
        let base = BenchmarkResult::new(vec![Suite::new("s", vec![TestMeasurement::new("t", 0.0)])]);
        let head = BenchmarkResult::new(vec![Suite::new("s", vec![TestMeasurement::new("t", 50.0)])]);
        let comparison = compare(&base, &head);

        let entry = &comparison.suites[0].entries[0];
        assert_eq!(entry.percent_diff, None);
        assert_eq!(entry.abs_diff, 50.0);
        assert_eq!(entry.tier, SeverityTier::Neutral);
        assert_eq!(entry.badge, "https://img.shields.io/badge/performance-N%2FA-yellow.svg");
        assert!(matches!(
            comparison.warnings[0],
            ComparisonWarning::DivisionByZero { .. }
        ));
    }

    #[test]
    fn test_identical_results_are_neutral() {
        let raw = json!([
            { "name": "s1", "tests": [ { "name": "a", "count": 12.5 }, { "name": "b", "count": 0.1 } ] },
            { "name": "s2", "tests": [ { "name": "c", "count": 99999 } ] }
        ]);
        let comparison = compare(&result(raw.clone()), &result(raw));
        assert_eq!(comparison.entry_count(), 3);
        for (_, entry) in comparison.entries() {
            assert_eq!(entry.abs_diff, 0.0);
            assert_eq!(entry.percent_diff, Some(0.0));
            assert_eq!(entry.tier, SeverityTier::Neutral);
        }
    }

    #[test]
    fn test_percent_formula() {
        for (base, head) in [(3.0, 7.0), (1000.0, 999.0), (0.5, 0.25), (123456.0, 654321.0)] {
            let entry = ComparisonEntry::new("t", base, head);
            let expected = (head - base) * 100.0 / base;
            assert!((entry.percent_diff.unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_classification_chain() {
        assert_eq!(SeverityTier::classify(20.0001), SeverityTier::Excellent);
        assert_eq!(SeverityTier::classify(20.0), SeverityTier::Good);
        assert_eq!(SeverityTier::classify(5.0001), SeverityTier::Good);
        assert_eq!(SeverityTier::classify(5.0), SeverityTier::Neutral);
        assert_eq!(SeverityTier::classify(0.0), SeverityTier::Neutral);
        assert_eq!(SeverityTier::classify(-5.0), SeverityTier::Neutral);
        assert_eq!(SeverityTier::classify(-5.0001), SeverityTier::Caution);
        assert_eq!(SeverityTier::classify(-20.0), SeverityTier::Caution);
        assert_eq!(SeverityTier::classify(-20.0001), SeverityTier::Regression);
        assert_eq!(SeverityTier::classify(f64::NAN), SeverityTier::Neutral);
        assert_eq!(SeverityTier::classify(f64::INFINITY), SeverityTier::Excellent);
        assert_eq!(SeverityTier::classify(f64::NEG_INFINITY), SeverityTier::Regression);
    }

    #[test]
    fn test_negative_badge_escaping() {
        let url = badge_url(Some(-12.4), SeverityTier::Caution);
        assert_eq!(url, "https://img.shields.io/badge/performance---12%25-orange.svg");
        let url = badge_url(Some(1234.0), SeverityTier::Excellent);
        assert_eq!(url, "https://img.shields.io/badge/performance-%2B1%2C234%25-brightgreen.svg");
    }

    #[test]
    fn test_tier_counts() {
        let base = result(json!({ "s": [
            { "name": "a", "count": 100 },
            { "name": "b", "count": 100 },
            { "name": "c", "count": 100 }
        ] }));
        let head = result(json!({ "s": [
            { "name": "a", "count": 150 },
            { "name": "b", "count": 100 },
            { "name": "c", "count": 50 }
        ] }));
        let counts = compare(&base, &head).tier_counts();
        assert_eq!(counts[0], (SeverityTier::Excellent, 1));
        assert_eq!(counts[2], (SeverityTier::Neutral, 1));
        assert_eq!(counts[4], (SeverityTier::Regression, 1));
    }
}
