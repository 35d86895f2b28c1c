use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MicroSecond;

/// One input / expected-output pair
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// A complete evaluation request, as accepted by the command-line front end
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvaluationRequest {
    pub language: String,
    pub source_code: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Per-case limit overriding the configured one
    #[serde(default)]
    pub time_limit: Option<MicroSecond>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Internal Error")]
    InternalError,
}

/// What the case loop does after a case finished with a given status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Abort,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Accepted => "Accepted",
            Status::WrongAnswer => "Wrong Answer",
            Status::CompilationError => "Compilation Error",
            Status::TimeLimitExceeded => "Time Limit Exceeded",
            Status::RuntimeError => "Runtime Error",
            Status::InternalError => "Internal Error",
        }
    }

    /// Case loop transition table
    pub fn loop_control(self) -> LoopControl {
        match self {
            Status::Accepted | Status::WrongAnswer | Status::RuntimeError => LoopControl::Continue,
            Status::TimeLimitExceeded | Status::CompilationError | Status::InternalError => {
                LoopControl::Abort
            }
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub status: Status,
    pub message: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl CaseResult {
    pub fn new(status: Status, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: details.into(),
            stdout: None,
            stderr: None,
        }
    }

    pub fn with_output(mut self, stdout: String, stderr: String) -> Self {
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub overall_status: Status,
    pub passed_cases: usize,
    pub total_cases: usize,
}

impl EvaluationSummary {
    /// Derives the summary from the ordered case results
    ///
    /// `fatal` is the status of the condition that stopped the pipeline early,
    /// if any. Without one, the verdict is Accepted when every case passed,
    /// Wrong Answer when any case produced wrong output, and Runtime Error
    /// when the only failures are crashes.
    pub fn aggregate(results: &[CaseResult], total_cases: usize, fatal: Option<Status>) -> Self {
        let passed_cases = results
            .iter()
            .filter(|r| r.status == Status::Accepted)
            .count();

        let overall_status = match fatal {
            Some(status) => status,
            None if results.iter().any(|r| r.status == Status::WrongAnswer) => Status::WrongAnswer,
            None if results.iter().any(|r| r.status != Status::Accepted) => Status::RuntimeError,
            None => Status::Accepted,
        };

        Self {
            overall_status,
            passed_cases,
            total_cases,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub summary: EvaluationSummary,
    pub case_results: Vec<CaseResult>,
}

impl EvaluationResult {
    /// A result made of a single case describing a condition that prevented
    /// any case from being graded
    pub fn fatal(total_cases: usize, case: CaseResult) -> Self {
        let status = case.status;
        Self {
            summary: EvaluationSummary {
                overall_status: status,
                passed_cases: 0,
                total_cases,
            },
            case_results: vec![case],
        }
    }

    pub fn internal_error(
        total_cases: usize,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::fatal(
            total_cases,
            CaseResult::new(Status::InternalError, message, details),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn case(status: Status) -> CaseResult {
        CaseResult::new(status, status.as_str(), "")
    }

    #[test]
    fn test_status_serializes_as_display_string() {
        for status in [
            Status::Accepted,
            Status::WrongAnswer,
            Status::CompilationError,
            Status::TimeLimitExceeded,
            Status::RuntimeError,
            Status::InternalError,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn test_loop_control_table() {
        assert_eq!(Status::Accepted.loop_control(), LoopControl::Continue);
        assert_eq!(Status::WrongAnswer.loop_control(), LoopControl::Continue);
        assert_eq!(Status::RuntimeError.loop_control(), LoopControl::Continue);
        assert_eq!(Status::TimeLimitExceeded.loop_control(), LoopControl::Abort);
        assert_eq!(Status::InternalError.loop_control(), LoopControl::Abort);
    }

    #[test]
    fn test_aggregate_all_accepted() {
        let results = vec![case(Status::Accepted), case(Status::Accepted)];
        let summary = EvaluationSummary::aggregate(&results, 2, None);
        assert_eq!(summary.overall_status, Status::Accepted);
        assert_eq!(summary.passed_cases, 2);
        assert_eq!(summary.total_cases, 2);
    }

    #[test]
    fn test_aggregate_wrong_answer_wins_over_position() {
        let results = vec![
            case(Status::RuntimeError),
            case(Status::Accepted),
            case(Status::WrongAnswer),
        ];
        let summary = EvaluationSummary::aggregate(&results, 3, None);
        assert_eq!(summary.overall_status, Status::WrongAnswer);
        assert_eq!(summary.passed_cases, 1);
    }

    #[test]
    fn test_aggregate_runtime_error_only() {
        let results = vec![case(Status::Accepted), case(Status::RuntimeError)];
        let summary = EvaluationSummary::aggregate(&results, 2, None);
        assert_eq!(summary.overall_status, Status::RuntimeError);
    }

    #[test]
    fn test_aggregate_fatal_keeps_total() {
        let results = vec![case(Status::Accepted), case(Status::TimeLimitExceeded)];
        let summary = EvaluationSummary::aggregate(&results, 5, Some(Status::TimeLimitExceeded));
        assert_eq!(summary.overall_status, Status::TimeLimitExceeded);
        assert_eq!(summary.passed_cases, 1);
        assert_eq!(summary.total_cases, 5);
    }

    #[test]
    fn test_aggregate_no_cases_is_accepted() {
        let summary = EvaluationSummary::aggregate(&[], 0, None);
        assert_eq!(summary.overall_status, Status::Accepted);
        assert_eq!(summary.total_cases, 0);
    }

    #[test]
    fn test_request_without_optional_fields() {
        let request: EvaluationRequest =
            serde_json::from_str(r#"{ "language": "python", "source_code": "print(1)" }"#).unwrap();
        assert!(request.test_cases.is_empty());
        assert!(request.time_limit.is_none());
    }
}
