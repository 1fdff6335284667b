use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use testflow::checkpoint::{CheckpointStore, FileCheckpointStore};
use testflow::config::{load_config, TestflowConfig};
use testflow::errors::WorkflowError;
use testflow::events::ProgressChannel;
use testflow::llm::{HttpLlmClient, LlmClient};
use testflow::observability::init_logging;
use testflow::state::RunId;
use testflow::workflow::{failure_string, RunOutcome, RunRequest, WorkflowExecutor};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "testflow", about = "Generate unit tests for a source file with an LLM")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "TESTFLOW_CONFIG")]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the workflow over one source file and print the generated tests
    Generate(GenerateArgs),
    /// Continue a checkpointed run
    Resume(ResumeArgs),
    /// List stored checkpoints
    Checkpoints(CheckpointsArgs),
}

#[derive(Debug, Args, Clone)]
struct GenerateArgs {
    /// Source file to generate tests for.
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Project root offered to the lookup tools.
    #[arg(long)]
    project_root: Option<PathBuf>,
    /// Directory for run checkpoints.
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
    /// Derive the run id from the file path and content, so an interrupted
    /// run over unchanged input resumes from its checkpoint.
    #[arg(long)]
    run_id_from_content: bool,
}

#[derive(Debug, Args, Clone)]
struct ResumeArgs {
    /// Run id printed by an earlier `generate`.
    #[arg(value_name = "RUN_ID")]
    run_id: String,
    /// Directory holding the run's checkpoints.
    #[arg(long)]
    checkpoint_dir: PathBuf,
}

#[derive(Debug, Args, Clone)]
struct CheckpointsArgs {
    /// Directory holding checkpoints.
    #[arg(long)]
    checkpoint_dir: PathBuf,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let mut config = self.load()?;
        if self.json_logs {
            config.logging.json = true;
        }
        init_logging(&config.logging);

        match self.command {
            Command::Generate(args) => generate(config, args).await,
            Command::Resume(args) => resume(config, args).await,
            Command::Checkpoints(args) => list_checkpoints(&args.checkpoint_dir).await,
        }
    }

    fn load(&self) -> anyhow::Result<TestflowConfig> {
        if let Some(path) = &self.config {
            return load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()));
        }
        let mut config = TestflowConfig::new();
        config.apply_env_overrides();
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

async fn generate(mut config: TestflowConfig, args: GenerateArgs) -> anyhow::Result<ExitCode> {
    if let Some(root) = args.project_root {
        config.tools.project_root = Some(root);
    }
    if let Some(dir) = args.checkpoint_dir {
        config.workflow.checkpoint_dir = Some(dir);
    }
    if args.run_id_from_content && config.workflow.checkpoint_dir.is_none() {
        bail!("--run-id-from-content needs --checkpoint-dir or workflow.checkpoint_dir");
    }

    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let executor = build_executor(&config)?;

    let result = if args.run_id_from_content {
        let run_id = RunId::derive(&args.file.to_string_lossy(), &source);
        let existing = executor
            .checkpoint_store()
            .load(&run_id)
            .await
            .context("failed to read checkpoint")?;
        if existing.is_some() {
            info!(run_id = %run_id, "Resuming from existing checkpoint");
            executor.resume(run_id).await
        } else {
            executor
                .run_request(RunRequest::new(source).with_run_id(run_id))
                .await
        }
    } else {
        executor.run_request(RunRequest::new(source)).await
    };

    Ok(report(result))
}

async fn resume(mut config: TestflowConfig, args: ResumeArgs) -> anyhow::Result<ExitCode> {
    let run_id: RunId = args
        .run_id
        .parse()
        .with_context(|| format!("invalid run id '{}'", args.run_id))?;
    config.workflow.checkpoint_dir = Some(args.checkpoint_dir);

    let executor = build_executor(&config)?;
    Ok(report(executor.resume(run_id).await))
}

async fn list_checkpoints(dir: &Path) -> anyhow::Result<ExitCode> {
    let store = FileCheckpointStore::new(dir);
    let records = store
        .list()
        .await
        .with_context(|| format!("failed to list checkpoints in {}", dir.display()))?;

    for record in records {
        let line = serde_json::json!({
            "run_id": record.run_id,
            "last_stage": record.last_stage,
            "complete": record.is_complete(),
            "intact": record.is_intact(),
            "saved_at": record.saved_at,
        });
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

fn build_executor(config: &TestflowConfig) -> anyhow::Result<WorkflowExecutor> {
    let client: Arc<dyn LlmClient> =
        Arc::new(HttpLlmClient::new(&config.llm).context("failed to build LLM client")?);

    let channel = Arc::new(ProgressChannel::new());
    channel.on_progress(|stage| eprintln!("[{stage}] done"));

    WorkflowExecutor::standard(client, config, channel).context("failed to build workflow")
}

/// Prints the generated tests to stdout, or the failure string to stderr.
fn report(result: Result<RunOutcome, WorkflowError>) -> ExitCode {
    match result {
        Ok(outcome) => {
            info!(run_id = %outcome.run_id, duration_ms = outcome.duration_ms, "Tests generated");
            println!("{}", outcome.result);
            ExitCode::SUCCESS
        }
        Err(err) => {
            warn!(error = %err, "Workflow failed");
            eprintln!("{}", failure_string(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "testflow",
            "--json-logs",
            "generate",
            "src/Calculator.java",
            "--checkpoint-dir",
            "/tmp/runs",
            "--run-id-from-content",
        ])
        .unwrap();

        assert!(cli.json_logs);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.file, PathBuf::from("src/Calculator.java"));
        assert_eq!(args.checkpoint_dir, Some(PathBuf::from("/tmp/runs")));
        assert!(args.run_id_from_content);
        assert_eq!(args.project_root, None);
    }

    #[test]
    fn test_resume_requires_checkpoint_dir() {
        let err = Cli::try_parse_from(["testflow", "resume", "abc"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_generate_has_no_output_file_flag() {
        let err = Cli::try_parse_from([
            "testflow",
            "generate",
            "src/Calculator.java",
            "--output",
            "CalculatorTest.java",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_report_exit_codes() {
        let outcome = RunOutcome {
            run_id: RunId::new(),
            result: "class CalculatorTest {}".to_string(),
            stages_completed: Vec::new(),
            duration_ms: 1.0,
        };
        assert_eq!(report(Ok(outcome)), ExitCode::SUCCESS);
        assert_eq!(
            report(Err(WorkflowError::Consistency("no result produced".to_string()))),
            ExitCode::FAILURE
        );
    }
}
