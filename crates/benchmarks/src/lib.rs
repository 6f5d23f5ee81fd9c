//! Benchmark comparison for Benchwatch.
//!
//! This crate turns two raw benchmark artifacts (base branch and PR head)
//! into a markdown report.
//!
//! # Quick Start
//!
//! ```
//! use benchwatch_benchmarks::{build_report, normalize::normalize_str, ReportOptions};
//!
//! let base = normalize_str(r#"{ "suiteA": [ { "name": "t1", "count": 1000 } ] }"#).unwrap();
//! let head = normalize_str(r#"{ "suiteA": [ { "name": "t1", "count": 1300 } ] }"#).unwrap();
//!
//! let report = build_report(&base, &head, &ReportOptions::default());
//! assert_eq!(report.comparison.suites[0].entries[0].percent_diff, Some(30.0));
//! assert!(report.body.contains("`+300`"));
//! ```
//!
//! # Modules
//!
//! - [`result`] - The canonical `BenchmarkResult` struct
//! - [`normalize`] - Raw artifact parsing for both supported shapes
//! - [`compare`] - Suite/test alignment, deltas and severity tiers
//! - [`format`] - Number formatting
//! - [`markdown`] - Markdown report generation
//! - [`io`] - Reading and writing result files

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod compare;
pub mod format;
pub mod io;
pub mod markdown;
pub mod normalize;
pub mod result;

pub use compare::{compare, Comparison, ComparisonEntry, ComparisonWarning, SeverityTier};
pub use markdown::{render, ReportOptions};
pub use normalize::MalformedResultError;
pub use result::{BenchmarkResult, Suite, TestMeasurement};

/// A comparison together with its rendered markdown.
#[derive(Debug, Clone)]
pub struct Report {
    /// Structured comparison.
    pub comparison: Comparison,
    /// Rendered markdown body.
    pub body: String,
}

/// Compare two results and render the report.
pub fn build_report(
    base: &BenchmarkResult,
    head: &BenchmarkResult,
    options: &ReportOptions,
) -> Report {
    let comparison = compare(base, head);
    let body = render(&comparison, options);
    Report { comparison, body }
}
