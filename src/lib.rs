pub mod checker;
pub mod config;
pub mod evaluator;
pub mod registry;
pub mod sandbox;
pub mod verdict;

pub use evaluator::{Evaluator, evaluate};
pub use registry::{LanguageProfile, LanguageRegistry};
pub use verdict::{
    CaseResult, EvaluationRequest, EvaluationResult, EvaluationSummary, Status, TestCase,
};
