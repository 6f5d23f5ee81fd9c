//! Markdown output generation for comparison reports.
//!
//! This module renders a [`Comparison`] into the comment body posted on a
//! pull request: one section per suite with a table of base count, head
//! count, absolute difference and a badge for the percentage change.

use crate::compare::{Comparison, ComparisonEntry, SuiteComparison};
use crate::format::{format_number, format_percent, DEFAULT_PRECISION};
use std::fmt::{self, Write};

/// Report heading.
pub const REPORT_TITLE: &str = "## Benchmark results";

/// Rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Decimal places for counts and absolute differences.
    pub decimal_precision: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            decimal_precision: DEFAULT_PRECISION,
        }
    }
}

/// Render a comparison as a markdown document.
///
/// Suites without entries are omitted; their warnings were already logged by
/// the comparator.
pub fn render(comparison: &Comparison, options: &ReportOptions) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut output, comparison, options);
    output
}

fn write_report(out: &mut String, comparison: &Comparison, options: &ReportOptions) -> fmt::Result {
    writeln!(out, "{}", REPORT_TITLE)?;
    writeln!(out)?;

    if comparison.entry_count() == 0 {
        writeln!(out, "_No comparable benchmarks were found between base and head._")?;
        return Ok(());
    }

    for suite in comparison.suites.iter().filter(|s| !s.entries.is_empty()) {
        write_suite(out, suite, options)?;
    }
    Ok(())
}

fn write_suite(out: &mut String, suite: &SuiteComparison, options: &ReportOptions) -> fmt::Result {
    writeln!(out, "### Suite: {}", escape_cell(&suite.name))?;
    writeln!(out)?;
    writeln!(
        out,
        "| Test | Base (ops/sec) | Head (ops/sec) | Diff (ops/sec) | Change |"
    )?;
    writeln!(out, "| ---- | -------------- | -------------- | -------------- | ------ |")?;
    for entry in &suite.entries {
        write_row(out, entry, options)?;
    }
    writeln!(out)
}

fn write_row(out: &mut String, entry: &ComparisonEntry, options: &ReportOptions) -> fmt::Result {
    let precision = options.decimal_precision;
    let percent = format_percent(entry.percent_diff);
    let label = if entry.percent_diff.is_some() {
        format!("{}%", percent)
    } else {
        percent
    };
    writeln!(
        out,
        "| **{}** | `{}` | `{}` | `{}` | ![Performance: {}]({}) |",
        escape_cell(&entry.test_name),
        format_number(entry.base_count, precision, false),
        format_number(entry.head_count, precision, false),
        format_number(entry.abs_diff, precision, true),
        label,
        entry.badge
    )
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::normalize::normalize;
    use serde_json::json;

    #[test]
    fn test_renders_suite_table() {
        let base = normalize(&json!({ "suiteA": [ { "name": "t1", "count": 1000 } ] })).unwrap();
        let head = normalize(&json!({ "suiteA": [ { "name": "t1", "count": 1300 } ] })).unwrap();
        let report = render(&compare(&base, &head), &ReportOptions::default());

        assert!(report.starts_with("## Benchmark results\n"));
        assert!(report.contains("### Suite: suiteA"));
        assert!(report.contains(
            "| **t1** | `1,000` | `1,300` | `+300` | ![Performance: +30%](https://img.shields.io/badge/performance-%2B30%25-brightgreen.svg) |"
        ));
    }

    #[test]
    fn test_identical_results_render_zero_diffs() {
        let raw = json!({ "s": [ { "name": "a", "count": 1234.5678 }, { "name": "b", "count": 5 } ] });
        let result = normalize(&raw).unwrap();
        let report = render(&compare(&result, &result), &ReportOptions::default());
        assert!(report.contains("| **a** | `1,234.57` | `1,234.57` | `0` | ![Performance: 0%]("));
        assert!(report.contains("| **b** | `5` | `5` | `0` |"));
        assert!(report.contains("-yellow.svg"));
    }

    #[test]
    fn test_precision_option() {
        let base = normalize(&json!({ "s": [ { "name": "a", "count": 10.123456 } ] })).unwrap();
        let head = normalize(&json!({ "s": [ { "name": "a", "count": 11.5 } ] })).unwrap();
        let report = render(
            &compare(&base, &head),
            &ReportOptions {
                decimal_precision: 4,
            },
        );
        assert!(report.contains("`10.1235` | `11.5` | `+1.3765`"));
    }

    #[test]
    fn test_empty_suites_are_omitted() {
        let base = normalize(&json!({
            "kept": [ { "name": "a", "count": 1 } ],
            "unmatched_tests": [ { "name": "x", "count": 1 } ],
            "base_only": [ { "name": "y", "count": 1 } ]
        }))
        .unwrap();
        let head = normalize(&json!({
            "kept": [ { "name": "a", "count": 1 } ],
            "unmatched_tests": [ { "name": "z", "count": 1 } ]
        }))
        .unwrap();
        let report = render(&compare(&base, &head), &ReportOptions::default());
        assert!(report.contains("### Suite: kept"));
        assert!(!report.contains("unmatched_tests"));
        assert!(!report.contains("base_only"));
    }

    #[test]
    fn test_no_entries() {
        let base = normalize(&json!({ "a": [ { "name": "t", "count": 1 } ] })).unwrap();
        let head = normalize(&json!({ "b": [ { "name": "t", "count": 1 } ] })).unwrap();
        let report = render(&compare(&base, &head), &ReportOptions::default());
        assert!(report.contains("No comparable benchmarks"));
        assert!(!report.contains("### Suite"));
    }

    #[test]
    fn test_not_available_percentage() {
        let base = normalize(&json!({ "s": [ { "name": "t", "count": 0 } ] })).unwrap();
        let head = normalize(&json!({ "s": [ { "name": "t", "count": 7 } ] })).unwrap();
        let report = render(&compare(&base, &head), &ReportOptions::default());
        assert!(report.contains("| **t** | `0` | `7` | `+7` | ![Performance: N/A]("));
    }

    #[test]
    fn test_pipes_in_names_are_escaped() {
        let base = normalize(&json!({ "s": [ { "name": "a|b", "count": 1 } ] })).unwrap();
        let report = render(&compare(&base, &base), &ReportOptions::default());
        assert!(report.contains("**a\\|b**"));
    }
}
