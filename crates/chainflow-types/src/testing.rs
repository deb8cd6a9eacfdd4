//! Workflow testing framework types: suites of cases with declarative
//! assertions, and the recorded outcome of running them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::execution::TestModeConfig;

/// How an assertion compares the actual value at `path` with `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    Equals,
    Contains,
    Exists,
    /// `expected` names a JSON type: string, number, boolean, array, object, null.
    Type,
    /// `expected` is `{ "min": n?, "max": n? }`, both inclusive.
    Range,
    /// `expected` is a boolean expression over `actual` and `output`.
    Custom,
}

/// One check against the run output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Dotted path into `{success, status, output, steps, error}`.
    pub path: String,
    pub kind: AssertionKind,
    #[serde(default)]
    pub expected: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A single scenario: trigger data in, assertions out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub trigger_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_mode_config: Option<TestModeConfig>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

/// An ordered collection of test cases for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    pub created_at: DateTime<Utc>,
}

/// Result of evaluating one assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub path: String,
    pub kind: AssertionKind,
    pub passed: bool,
    pub expected: Value,
    /// `null` when the path did not resolve.
    pub actual: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub case_id: String,
    pub case_name: String,
    pub passed: bool,
    pub assertions: Vec<AssertionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// One run of a whole suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: Uuid,
    pub suite_id: Uuid,
    pub workflow_id: Uuid,
    pub passed: u32,
    pub failed: u32,
    pub results: Vec<TestResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl TestRun {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
