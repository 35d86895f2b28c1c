use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::checker;
use crate::config::{Config, JudgeConfig};
use crate::registry::{LanguageProfile, LanguageRegistry};
use crate::sandbox::{self, CompileOutcome, RunOutcome, Workspace};
use crate::verdict::{
    CaseResult, EvaluationRequest, EvaluationResult, EvaluationSummary, LoopControl, Status,
    TestCase,
};

/// Entry point of the judging pipeline
///
/// Cheap to clone; every clone shares the same read-only registry. Any number
/// of evaluations may run concurrently, each in its own workspace.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: Arc<LanguageRegistry>,
    time_limit: Duration,
    compile_time_limit: Duration,
    workspace_root: PathBuf,
}

impl Evaluator {
    pub fn new(registry: Arc<LanguageRegistry>, judge: &JudgeConfig) -> Self {
        Self {
            registry,
            time_limit: judge.time_limit.into(),
            compile_time_limit: judge.compile_time_limit.into(),
            workspace_root: judge.workspace_root(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Arc::new(config.registry()?), &config.judge))
    }

    /// Evaluator over the process-wide registry with default limits
    pub fn global() -> Self {
        Self::new(LanguageRegistry::global(), &JudgeConfig::default())
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_compile_time_limit(mut self, compile_time_limit: Duration) -> Self {
        self.compile_time_limit = compile_time_limit;
        self
    }

    pub fn with_workspace_root(mut self, workspace_root: impl Into<PathBuf>) -> Self {
        self.workspace_root = workspace_root.into();
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Judges `source_code` against `test_cases`
    ///
    /// Never fails: every failure mode, including a panic inside the
    /// pipeline, is reported in the returned result.
    pub async fn evaluate(
        &self,
        language: &str,
        source_code: &str,
        test_cases: &[TestCase],
    ) -> EvaluationResult {
        let total_cases = test_cases.len();
        let pipeline = Pipeline {
            evaluator: self.clone(),
            language: language.to_owned(),
            source_code: source_code.to_owned(),
            test_cases: test_cases.to_vec(),
        };

        match tokio::spawn(pipeline.run()).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Evaluation of a {language} submission aborted: {e}");
                EvaluationResult::internal_error(
                    total_cases,
                    "Evaluation aborted unexpectedly",
                    e.to_string(),
                )
            }
        }
    }

    /// Judges a request, honoring its time limit override
    pub async fn evaluate_request(&self, request: EvaluationRequest) -> EvaluationResult {
        let evaluator = match request.time_limit {
            Some(limit) => self.clone().with_time_limit(limit.into()),
            None => self.clone(),
        };
        evaluator
            .evaluate(&request.language, &request.source_code, &request.test_cases)
            .await
    }
}

/// Judges a submission with the process-wide registry and default limits
pub async fn evaluate(
    language: &str,
    source_code: &str,
    test_cases: &[TestCase],
) -> EvaluationResult {
    Evaluator::global()
        .evaluate(language, source_code, test_cases)
        .await
}

/// States of one evaluation
enum Stage<'a> {
    Start,
    LanguageResolved(&'a LanguageProfile),
    CompileSkipped {
        profile: &'a LanguageProfile,
        workspace: Workspace,
    },
    Compiled {
        profile: &'a LanguageProfile,
        workspace: Workspace,
    },
    CaseLoop {
        profile: &'a LanguageProfile,
        workspace: Workspace,
        index: usize,
        results: Vec<CaseResult>,
    },
    Aggregated {
        workspace: Option<Workspace>,
        result: EvaluationResult,
    },
    End(EvaluationResult),
}

impl Stage<'_> {
    fn name(&self) -> &'static str {
        match self {
            Stage::Start => "Start",
            Stage::LanguageResolved(_) => "LanguageResolved",
            Stage::CompileSkipped { .. } => "CompileSkipped",
            Stage::Compiled { .. } => "Compiled",
            Stage::CaseLoop { .. } => "CaseLoop",
            Stage::Aggregated { .. } => "Aggregated",
            Stage::End(_) => "End",
        }
    }
}

struct Pipeline {
    evaluator: Evaluator,
    language: String,
    source_code: String,
    test_cases: Vec<TestCase>,
}

impl Pipeline {
    async fn run(self) -> EvaluationResult {
        let registry = Arc::clone(&self.evaluator.registry);
        let mut stage = Stage::Start;

        loop {
            log::trace!("Evaluation stage: {}", stage.name());
            stage = match stage {
                Stage::Start => match registry.resolve(&self.language) {
                    Some(profile) => Stage::LanguageResolved(profile),
                    None => Stage::Aggregated {
                        workspace: None,
                        result: self.unsupported_language(&registry),
                    },
                },

                Stage::LanguageResolved(profile) => self.prepare(profile).await,

                Stage::CompileSkipped { profile, workspace }
                | Stage::Compiled { profile, workspace } => Stage::CaseLoop {
                    profile,
                    workspace,
                    index: 0,
                    results: Vec::with_capacity(self.test_cases.len()),
                },

                Stage::CaseLoop {
                    profile,
                    workspace,
                    index,
                    mut results,
                } => match self.test_cases.get(index) {
                    None => Stage::Aggregated {
                        result: self.conclude(results, None),
                        workspace: Some(workspace),
                    },
                    Some(case) => {
                        let case_result = self.run_case(&workspace, profile, index, case).await;
                        let status = case_result.status;
                        results.push(case_result);

                        match status.loop_control() {
                            LoopControl::Continue => Stage::CaseLoop {
                                profile,
                                workspace,
                                index: index + 1,
                                results,
                            },
                            LoopControl::Abort => {
                                log::info!(
                                    "Case {} ended with {status}, skipping {} remaining case(s)",
                                    index + 1,
                                    self.test_cases.len() - index - 1
                                );
                                Stage::Aggregated {
                                    result: self.conclude(results, Some(status)),
                                    workspace: Some(workspace),
                                }
                            }
                        }
                    }
                },

                Stage::Aggregated { workspace, result } => {
                    if let Some(workspace) = workspace {
                        workspace.release();
                    }
                    Stage::End(result)
                }

                Stage::End(result) => {
                    log::info!(
                        "Evaluated {} submission: {} ({}/{})",
                        self.language,
                        result.summary.overall_status,
                        result.summary.passed_cases,
                        result.summary.total_cases
                    );
                    return result;
                }
            };
        }
    }

    /// Materializes the source and compiles it if the language needs it
    async fn prepare<'a>(&self, profile: &'a LanguageProfile) -> Stage<'a> {
        let total_cases = self.test_cases.len();

        let workspace = match Workspace::acquire(&self.evaluator.workspace_root) {
            Ok(workspace) => workspace,
            Err(e) => {
                log::error!("Failed to acquire workspace: {e:#}");
                return Stage::Aggregated {
                    workspace: None,
                    result: EvaluationResult::internal_error(
                        total_cases,
                        "Failed to prepare the workspace",
                        format!("{e:#}"),
                    ),
                };
            }
        };

        if let Err(e) = workspace.write_source(profile, &self.source_code) {
            log::error!("Failed to write submission: {e:#}");
            return Stage::Aggregated {
                workspace: Some(workspace),
                result: EvaluationResult::internal_error(
                    total_cases,
                    "Failed to write the submission",
                    format!("{e:#}"),
                ),
            };
        }

        if !profile.requires_compilation() {
            return Stage::CompileSkipped { profile, workspace };
        }

        let compile_time_limit = self.evaluator.compile_time_limit;
        match sandbox::compile(&workspace, profile, compile_time_limit).await {
            Ok(CompileOutcome::Success) => Stage::Compiled { profile, workspace },
            Ok(CompileOutcome::Failure(diagnostic)) => {
                log::info!("{} submission failed to compile", profile.name);
                Stage::Aggregated {
                    workspace: Some(workspace),
                    result: EvaluationResult::fatal(
                        total_cases,
                        CaseResult::new(
                            Status::CompilationError,
                            "Compilation Error",
                            diagnostic,
                        ),
                    ),
                }
            }
            Err(e) => {
                log::error!("Failed to run the {} compiler: {e:#}", profile.name);
                Stage::Aggregated {
                    workspace: Some(workspace),
                    result: EvaluationResult::internal_error(
                        total_cases,
                        "Failed to run the compiler",
                        format!("{e:#}"),
                    ),
                }
            }
        }
    }

    /// Runs and grades a single case
    async fn run_case(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        index: usize,
        case: &TestCase,
    ) -> CaseResult {
        let case_no = index + 1;
        let time_limit = self.evaluator.time_limit;

        let outcome = match sandbox::run(workspace, profile, &case.input, time_limit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Failed to run case {case_no}: {e:#}");
                return CaseResult::new(
                    Status::InternalError,
                    "Failed to run the program",
                    format!("Case {case_no}: {e:#}"),
                );
            }
        };

        match outcome {
            RunOutcome::Completed { stdout, stderr } => {
                if checker::equal(&stdout, &case.expected_output) {
                    CaseResult::new(
                        Status::Accepted,
                        "Accepted",
                        format!("Case {case_no}: output matches the expected output"),
                    )
                    .with_output(stdout, stderr)
                } else {
                    CaseResult::new(
                        Status::WrongAnswer,
                        "Wrong Answer",
                        format!(
                            "Case {case_no}: expected {}, got {}",
                            preview(&case.expected_output),
                            preview(&stdout)
                        ),
                    )
                    .with_output(stdout, stderr)
                }
            }
            RunOutcome::TimedOut => CaseResult::new(
                Status::TimeLimitExceeded,
                "Time Limit Exceeded",
                format!(
                    "Case {case_no}: program did not finish within {} ms",
                    time_limit.as_millis()
                ),
            ),
            RunOutcome::Crashed {
                exit_code,
                signal,
                stdout,
                stderr,
            } => {
                let reason = match (exit_code, signal) {
                    (Some(code), _) => format!("Process exited with code: {code}"),
                    (None, Some(signal)) => format!("Process killed by signal: {signal}"),
                    (None, None) => "Process terminated abnormally".to_string(),
                };
                let details = if stderr.trim().is_empty() {
                    format!("Case {case_no}: {reason}")
                } else {
                    format!("Case {case_no}: {reason}\n{}", stderr.trim_end())
                };
                CaseResult::new(Status::RuntimeError, "Runtime Error", details)
                    .with_output(stdout, stderr)
            }
        }
    }

    fn conclude(&self, results: Vec<CaseResult>, fatal: Option<Status>) -> EvaluationResult {
        EvaluationResult {
            summary: EvaluationSummary::aggregate(&results, self.test_cases.len(), fatal),
            case_results: results,
        }
    }

    fn unsupported_language(&self, registry: &LanguageRegistry) -> EvaluationResult {
        log::warn!("Rejected submission in unsupported language `{}`", self.language);
        EvaluationResult::internal_error(
            self.test_cases.len(),
            format!("Unsupported programming language: {}", self.language),
            format!("Supported languages: {}", registry.names().join(", ")),
        )
    }
}

const PREVIEW_CHARS: usize = 200;

/// Debug-quoted prefix of an output, for diagnostics
fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head:?}...")
    } else {
        format!("{head:?}")
    }
}
