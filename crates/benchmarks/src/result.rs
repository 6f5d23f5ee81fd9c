//! Benchmark result types.
//!
//! This module provides the canonical in-memory form every raw artifact is
//! normalized into: ordered suites of ordered, named throughput measurements.

use serde::{Deserialize, Serialize};

/// A single named benchmark's throughput count (operations per unit time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMeasurement {
    /// Test name, unique within its suite.
    pub name: String,
    /// Measured throughput. Always finite and non-negative.
    pub count: f64,
}

impl TestMeasurement {
    /// Create a new measurement.
    pub fn new(name: impl Into<String>, count: f64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// A named group of related benchmark tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    /// Suite name, unique within a result.
    pub name: String,
    /// Measurements in the order the benchmark reported them.
    pub tests: Vec<TestMeasurement>,
}

impl Suite {
    /// Create a new suite.
    pub fn new(name: impl Into<String>, tests: Vec<TestMeasurement>) -> Self {
        Self {
            name: name.into(),
            tests,
        }
    }

    /// Look up a test by exact name.
    pub fn test(&self, name: &str) -> Option<&TestMeasurement> {
        self.tests.iter().find(|t| t.name == name)
    }
}

/// Canonical benchmark result.
///
/// Serializes as the array-of-suites artifact shape, so a canonical result
/// written to disk can be read back by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkResult {
    /// Suites in reported order.
    pub suites: Vec<Suite>,
}

impl BenchmarkResult {
    /// Create a result from suites.
    pub fn new(suites: Vec<Suite>) -> Self {
        Self { suites }
    }

    /// Look up a suite by exact name.
    pub fn suite(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name == name)
    }

    /// Total number of measurements across all suites.
    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    /// Whether the result holds no suites.
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}
