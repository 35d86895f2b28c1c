//! End-to-end tests against real language toolchains.
//!
//! Each test checks for its toolchain first and is skipped when it is not
//! installed on the host.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use oj_judge::config::{Config, MicroSecond};
use oj_judge::sandbox::COMPILATION_FAILED;
use oj_judge::{Evaluator, Status, TestCase};

static TEST_ROOT_COUNTER: AtomicU32 = AtomicU32::new(0);

fn has_tool(tool: &str) -> bool {
    let found = std::process::Command::new("which")
        .arg(tool)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);
    if !found {
        eprintln!("`{tool}` not found, skipping");
    }
    found
}

fn create_test_evaluator() -> (Evaluator, PathBuf) {
    let test_id = TEST_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    let root = std::env::temp_dir()
        .join("oj-judge-toolchain")
        .join(format!("{}-{}", std::process::id(), test_id));
    let _ = fs::remove_dir_all(&root);

    let mut config = Config::builtin();
    config.judge.workspace_root = Some(root.clone());
    config.judge.time_limit = MicroSecond(5_000_000);
    (Evaluator::from_config(&config).unwrap(), root)
}

fn assert_no_workspace_left(root: &PathBuf) {
    let leftover = fs::read_dir(root).map(|e| e.count()).unwrap_or(0);
    assert_eq!(leftover, 0, "workspace leaked under {}", root.display());
}

#[tokio::test]
async fn test_python_hello_world() {
    if !has_tool("python3") {
        return;
    }
    let (evaluator, root) = create_test_evaluator();
    let cases = vec![TestCase::new("", "Hello, World!")];

    let result = evaluator
        .evaluate("python", "print('Hello, World!')", &cases)
        .await;

    assert_eq!(result.summary.overall_status, Status::Accepted);
    assert_eq!(result.summary.passed_cases, 1);
    assert_eq!(result.summary.total_cases, 1);
    assert_no_workspace_left(&root);
}

#[tokio::test]
async fn test_python_wrong_answer() {
    if !has_tool("python3") {
        return;
    }
    let (evaluator, root) = create_test_evaluator();
    let cases = vec![TestCase::new("", "Hello, World!")];

    let result = evaluator
        .evaluate("python", "print('Wrong Output!')", &cases)
        .await;

    assert_eq!(result.summary.overall_status, Status::WrongAnswer);
    assert_eq!(result.summary.passed_cases, 0);
    assert_no_workspace_left(&root);
}

#[tokio::test]
async fn test_python_a_plus_b() {
    if !has_tool("python3") {
        return;
    }
    let (evaluator, root) = create_test_evaluator();
    let source = "\na = input()\nb = input()\nprint(int(a) + int(b))\n";
    let cases = vec![
        TestCase::new("1\n2", "3"),
        TestCase::new("5\n7", "12"),
        TestCase::new("-1\n1", "0"),
    ];

    let result = evaluator.evaluate("python", source, &cases).await;

    assert_eq!(result.summary.overall_status, Status::Accepted);
    assert_eq!(result.summary.passed_cases, 3);
    assert_eq!(result.summary.total_cases, 3);
    assert_no_workspace_left(&root);
}

#[tokio::test]
async fn test_python_exception_is_runtime_error() {
    if !has_tool("python3") {
        return;
    }
    let (evaluator, root) = create_test_evaluator();
    let cases = vec![TestCase::new("", "")];

    let result = evaluator
        .evaluate("python", "raise ValueError('bad input')", &cases)
        .await;

    assert_eq!(result.summary.overall_status, Status::RuntimeError);
    assert!(result.case_results[0].details.contains("ValueError"));
    assert_no_workspace_left(&root);
}

#[tokio::test]
async fn test_python_infinite_loop() {
    if !has_tool("python3") {
        return;
    }
    let (evaluator, root) = create_test_evaluator();
    let evaluator = evaluator.with_time_limit(Duration::from_secs(1));
    let cases = vec![TestCase::new("", ""), TestCase::new("", "")];

    let start_time = Instant::now();
    let result = evaluator.evaluate("python", "while True: pass", &cases).await;

    assert_eq!(result.summary.overall_status, Status::TimeLimitExceeded);
    assert_eq!(result.case_results.len(), 1);
    assert!(start_time.elapsed() < Duration::from_secs(5));
    assert_no_workspace_left(&root);
}

#[tokio::test]
async fn test_cpp_compile_error() {
    if !has_tool("g++") {
        return;
    }
    let (evaluator, root) = create_test_evaluator();
    let source = "#include <iostream>\nint main() { return 0";
    let cases = vec![TestCase::new("", "")];

    let result = evaluator.evaluate("cpp", source, &cases).await;

    assert_eq!(result.summary.overall_status, Status::CompilationError);
    assert!(result.case_results[0].details.contains(COMPILATION_FAILED));
    assert_no_workspace_left(&root);
}

#[tokio::test]
async fn test_cpp_a_plus_b() {
    if !has_tool("g++") {
        return;
    }
    let (evaluator, root) = create_test_evaluator();
    let source = r#"
#include <iostream>
int main() {
    long long a, b;
    std::cin >> a >> b;
    std::cout << a + b << std::endl;
    return 0;
}
"#;
    let cases = vec![
        TestCase::new("1\n2", "3"),
        TestCase::new("5\n7", "12"),
        TestCase::new("-1\n1", "0"),
    ];

    let result = evaluator.evaluate("c++", source, &cases).await;

    assert_eq!(result.summary.overall_status, Status::Accepted);
    assert_eq!(result.summary.passed_cases, 3);
    assert_no_workspace_left(&root);
}
