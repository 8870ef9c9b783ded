use crate::error::RequestError;

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Reported in place of a total time or peak memory that cannot be trusted.
pub const UNMEASURED: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JudgeRequest {
    #[validate(length(min = 1))]
    pub source_code: String,

    #[validate(length(min = 1))]
    pub language_id: String,

    #[validate]
    pub problem: Problem,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[validate(length(min = 1))]
    pub test_cases: Vec<TestCaseData>,

    #[validate(range(min = 0.001, max = 60.0))]
    pub time_limit_seconds: f64,

    #[validate(range(min = 1, max = 65536))]
    pub memory_limit_mb: u64,

    #[validate(range(min = 0.0))]
    pub max_point: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseData {
    pub stdin: String,
    pub expected_stdout: String,
}

impl JudgeRequest {
    /// Parses and validates a request. Missing fields are reported as malformed.
    pub fn from_json(text: &str) -> Result<Self, RequestError> {
        let request: JudgeRequest = serde_json::from_str(text)?;
        request.validate()?;
        Ok(request)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, RequestError> {
        let request: JudgeRequest = serde_json::from_value(value)?;
        request.validate()?;
        Ok(request)
    }
}

impl Problem {
    pub fn time_limit_ms(&self) -> u64 {
        (self.time_limit_seconds * 1000.0).round() as u64
    }

    pub fn memory_limit_kb(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
    #[serde(rename = "RTE")]
    RuntimeError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictStatus {
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
    #[serde(rename = "RTE")]
    RuntimeError,
    #[serde(rename = "CE")]
    CompileError,
    #[serde(rename = "IE")]
    InternalError,
}

impl CaseStatus {
    pub fn abbr(self) -> &'static str {
        VerdictStatus::from(self).abbr()
    }
}

impl VerdictStatus {
    pub fn abbr(self) -> &'static str {
        match self {
            VerdictStatus::Accepted => "AC",
            VerdictStatus::WrongAnswer => "WA",
            VerdictStatus::TimeLimitExceeded => "TLE",
            VerdictStatus::MemoryLimitExceeded => "MLE",
            VerdictStatus::RuntimeError => "RTE",
            VerdictStatus::CompileError => "CE",
            VerdictStatus::InternalError => "IE",
        }
    }
}

impl From<CaseStatus> for VerdictStatus {
    fn from(status: CaseStatus) -> Self {
        match status {
            CaseStatus::Accepted => VerdictStatus::Accepted,
            CaseStatus::WrongAnswer => VerdictStatus::WrongAnswer,
            CaseStatus::TimeLimitExceeded => VerdictStatus::TimeLimitExceeded,
            CaseStatus::MemoryLimitExceeded => VerdictStatus::MemoryLimitExceeded,
            CaseStatus::RuntimeError => VerdictStatus::RuntimeError,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbr())
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbr())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub ordinal: usize,
    pub status: CaseStatus,
    pub cpu_time_ms: u64,
    pub memory_kb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_excerpt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeVerdict {
    pub status: VerdictStatus,
    pub total_cpu_time_ms: i64,
    pub peak_memory_kb: i64,
    pub score: f64,
    pub per_test_outcomes: Vec<ExecutionOutcome>,
    pub diagnostics: Diagnostics,
}

impl JudgeVerdict {
    pub fn compile_error(log: String) -> Self {
        Self::terminal(
            VerdictStatus::CompileError,
            Diagnostics {
                compile_log: Some(log),
                internal_error: None,
            },
        )
    }

    pub fn internal_error(message: String) -> Self {
        Self::terminal(
            VerdictStatus::InternalError,
            Diagnostics {
                compile_log: None,
                internal_error: Some(message),
            },
        )
    }

    fn terminal(status: VerdictStatus, diagnostics: Diagnostics) -> Self {
        Self {
            status,
            total_cpu_time_ms: 0,
            peak_memory_kb: 0,
            score: 0.0,
            per_test_outcomes: Vec::new(),
            diagnostics,
        }
    }

    /// The message shown to the submitter.
    pub fn summary(&self) -> String {
        match self.status {
            VerdictStatus::Accepted => "Accepted".to_owned(),
            VerdictStatus::WrongAnswer => "Wrong Answer".to_owned(),
            VerdictStatus::TimeLimitExceeded => "Time Limit Exceeded".to_owned(),
            VerdictStatus::MemoryLimitExceeded => "Memory Limit Exceeded".to_owned(),
            VerdictStatus::RuntimeError => "Runtime Error".to_owned(),
            VerdictStatus::CompileError => match self.diagnostics.compile_log {
                Some(ref log) if !log.is_empty() => format!("Compile Error\n{}", log),
                _ => "Compile Error".to_owned(),
            },
            VerdictStatus::InternalError => "Judging failed, please retry".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"{
        "sourceCode": "print(input())",
        "languageId": "python3",
        "problem": {
            "testCases": [
                { "stdin": "1\n", "expectedStdout": "1\n" },
                { "stdin": "2\n", "expectedStdout": "2\n" }
            ],
            "timeLimitSeconds": 1.5,
            "memoryLimitMb": 256,
            "maxPoint": 100
        }
    }"#;

    #[test]
    fn parse_request() {
        let request = JudgeRequest::from_json(REQUEST).unwrap();
        assert_eq!(request.language_id, "python3");
        assert_eq!(request.problem.test_cases.len(), 2);
        assert_eq!(request.problem.test_cases[1].expected_stdout, "2\n");
        assert_eq!(request.problem.time_limit_ms(), 1500);
        assert_eq!(request.problem.memory_limit_kb(), 256 * 1024);
    }

    #[test]
    fn missing_field_is_malformed() {
        let text = r#"{ "sourceCode": "x", "languageId": "c11" }"#;
        let err = JudgeRequest::from_json(text).unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[test]
    fn empty_fields_are_invalid() {
        let mut request: JudgeRequest = serde_json::from_str(REQUEST).unwrap();
        request.problem.test_cases.clear();
        assert!(request.validate().is_err());

        let mut request: JudgeRequest = serde_json::from_str(REQUEST).unwrap();
        request.source_code.clear();
        assert!(request.validate().is_err());

        let mut request: JudgeRequest = serde_json::from_str(REQUEST).unwrap();
        request.problem.time_limit_seconds = 0.0;
        assert!(request.validate().is_err());

        let mut request: JudgeRequest = serde_json::from_str(REQUEST).unwrap();
        request.problem.max_point = -1.0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn oversized_limits_are_invalid() {
        let text = REQUEST
            .replace("\"timeLimitSeconds\": 1.5", "\"timeLimitSeconds\": 1e300")
            .replace("\"memoryLimitMb\": 256", "\"memoryLimitMb\": 18446744073709551615");
        let err = JudgeRequest::from_json(&text).unwrap_err();
        assert!(matches!(err, RequestError::Invalid(_)), "{:?}", err);

        let mut request: JudgeRequest = serde_json::from_str(REQUEST).unwrap();
        request.problem.time_limit_seconds = 60.0;
        request.problem.memory_limit_mb = 65536;
        assert!(request.validate().is_ok());

        request.problem.memory_limit_mb = 65537;
        assert!(request.validate().is_err());

        request.problem.memory_limit_mb = u64::MAX;
        assert_eq!(request.problem.memory_limit_kb(), u64::MAX);
    }

    #[test]
    fn verdict_shape() {
        let verdict = JudgeVerdict {
            status: VerdictStatus::TimeLimitExceeded,
            total_cpu_time_ms: UNMEASURED,
            peak_memory_kb: 2048,
            score: 50.0,
            per_test_outcomes: vec![ExecutionOutcome {
                ordinal: 1,
                status: CaseStatus::TimeLimitExceeded,
                cpu_time_ms: 1000,
                memory_kb: 2048,
                stderr_excerpt: None,
            }],
            diagnostics: Diagnostics::default(),
        };

        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(value["status"], "TLE");
        assert_eq!(value["totalCpuTimeMs"], -1);
        assert_eq!(value["peakMemoryKb"], 2048);
        assert_eq!(value["perTestOutcomes"][0]["status"], "TLE");
        assert_eq!(value["perTestOutcomes"][0]["cpuTimeMs"], 1000);
        assert!(value["perTestOutcomes"][0].get("stderrExcerpt").is_none());
        assert!(value["diagnostics"].get("compileLog").is_none());
    }

    #[test]
    fn terminal_verdicts() {
        let ce = JudgeVerdict::compile_error("main.c:1: error".to_owned());
        assert_eq!(ce.status, VerdictStatus::CompileError);
        assert_eq!(ce.score, 0.0);
        assert!(ce.per_test_outcomes.is_empty());
        assert!(ce.summary().contains("main.c:1: error"));

        let ie = JudgeVerdict::internal_error("disk full".to_owned());
        assert_eq!(ie.status, VerdictStatus::InternalError);
        assert_eq!(ie.diagnostics.internal_error.as_deref(), Some("disk full"));
        assert_eq!(ie.summary(), "Judging failed, please retry");
    }
}
