use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;

use oj_judge::config::CliArgs;
use oj_judge::{EvaluationRequest, Evaluator};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().context("Failed to load configuration")?;

    let registry = config
        .registry()
        .context("Invalid language configuration")?
        .install_global()?;
    log::info!("Loaded languages: {:?}", registry.names());

    let evaluator = Evaluator::new(registry, &config.judge);
    let request = read_request(cli.request_path.as_deref())?;
    log::info!(
        "Evaluating {} submission against {} case(s)",
        request.language,
        request.test_cases.len()
    );

    // ======= PREPARATION END, EXECUTION START =======

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, abandoning evaluation");
            return Ok(());
        }
        result = evaluator.evaluate_request(request) => result,
    };

    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");

    Ok(())
}

/// Reads the evaluation request from a file, or stdin when no path is given
fn read_request(path: Option<&str>) -> Result<EvaluationRequest> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {path}"))?,
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read request from stdin")?;
            content
        }
    };
    serde_json::from_str(&content).context("Failed to parse evaluation request")
}
