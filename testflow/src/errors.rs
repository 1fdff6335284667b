//! Error types for the testflow workflow.
//!
//! Stage-level failures are captured as [`StageError`] and lifted into
//! [`WorkflowError`] by the executor, which is the single error type callers
//! observe. Error listeners receive a [`GraphError`] carrying the phase that
//! produced the failure.

use crate::core::{Phase, StageId};
use crate::state::RunId;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the cause of stage and graph failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared, cloneable error cause.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// A message-only error, used as a cause when nothing richer is available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlainError(pub String);

impl PlainError {
    /// Creates a new plain error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Classifies why a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFailureKind {
    /// The capability call or the stage logic failed.
    Execution,
    /// The stage produced output that was rejected.
    OutputValidation,
}

/// A failure raised by a stage, tagged with the stage that produced it.
#[derive(Debug, Clone)]
pub struct StageError {
    /// The stage that failed.
    pub stage: StageId,
    /// What kind of failure this is.
    pub kind: StageFailureKind,
    /// Human-readable message.
    pub message: String,
    cause: SharedError,
}

impl StageError {
    /// Creates an execution failure with an underlying cause.
    #[must_use]
    pub fn new(stage: StageId, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            stage,
            kind: StageFailureKind::Execution,
            message: message.into(),
            cause: Arc::from(cause.into()),
        }
    }

    /// Creates an execution failure whose cause is the message itself.
    #[must_use]
    pub fn message(stage: StageId, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(stage, message.clone(), PlainError(message))
    }

    /// Creates an output validation failure.
    #[must_use]
    pub fn output_validation(stage: StageId, message: impl Into<String>) -> Self {
        let mut error = Self::message(stage, message);
        error.kind = StageFailureKind::OutputValidation;
        error
    }

    /// Creates a failure for a required state field that is absent.
    #[must_use]
    pub fn missing_field(stage: StageId, field: &str) -> Self {
        Self::message(stage, format!("required field '{field}' is missing from session state"))
    }

    /// Returns the underlying cause.
    #[must_use]
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Returns a shared handle to the cause.
    #[must_use]
    pub fn shared_cause(&self) -> SharedError {
        Arc::clone(&self.cause)
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage '{}' failed: {}", self.stage, self.message)
    }
}

impl StdError for StageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Errors raised by checkpoint persistence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// Reading or writing the backing storage failed.
    #[error("checkpoint io error: {0}")]
    Io(String),

    /// A checkpoint could not be encoded or decoded.
    #[error("checkpoint serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for CheckpointError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised by tool invocations.
///
/// These are fed back to the model as tool results; they never abort a stage
/// on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool '{0}' not found")]
    NotFound(String),

    /// The arguments did not match the tool's input schema.
    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments {
        /// The tool name.
        tool: String,
        /// What was wrong.
        message: String,
    },

    /// The tool ran but failed.
    #[error("tool '{tool}' failed: {message}")]
    ExecutionFailed {
        /// The tool name.
        tool: String,
        /// What went wrong.
        message: String,
    },
}

impl ToolError {
    /// Creates an invalid-arguments error.
    #[must_use]
    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Creates an execution failure.
    #[must_use]
    pub fn execution_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {message}")]
    Io {
        /// The file that was read.
        path: String,
        /// The underlying error.
        message: String,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid config syntax: {0}")]
    Parse(String),

    /// A value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Errors raised by LLM capability calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// The transport failed.
    #[error("http error: {0}")]
    Http(String),

    /// The provider returned an error or an unusable response.
    #[error("response error: {0}")]
    Response(String),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The model kept requesting tools past the configured round limit.
    #[error("model requested tools for more than {rounds} rounds")]
    ToolLoopExhausted {
        /// The configured round limit.
        rounds: usize,
    },
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// The error type returned by workflow runs.
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    /// The stage graph or a capability could not be constructed.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A stage capability call failed.
    #[error("{0}")]
    StageExecution(StageError),

    /// A stage produced output that failed validation.
    #[error("stage '{stage}' produced invalid output: {message}")]
    OutputValidation {
        /// The stage whose output was rejected.
        stage: StageId,
        /// Why the output was rejected.
        message: String,
    },

    /// The input or final state did not have the expected shape.
    #[error("inconsistent workflow state: {0}")]
    Consistency(String),

    /// A stage exceeded its time budget.
    #[error("stage '{stage}' timed out after {}ms", .after.as_millis())]
    Timeout {
        /// The stage that timed out.
        stage: StageId,
        /// The configured budget.
        after: Duration,
    },

    /// The run was cancelled.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// Another execution of the same run is already active.
    #[error("run {0} is already executing")]
    RunInProgress(RunId),

    /// Checkpoint persistence failed.
    #[error("{0}")]
    Checkpoint(#[from] CheckpointError),

    /// No checkpoint exists for the requested run.
    #[error("no checkpoint found for run {0}")]
    CheckpointNotFound(RunId),
}

impl WorkflowError {
    /// Lifts a stage error, keeping output validation failures distinct.
    #[must_use]
    pub fn from_stage_error(err: StageError) -> Self {
        match err.kind {
            StageFailureKind::OutputValidation => Self::OutputValidation {
                stage: err.stage,
                message: err.message,
            },
            StageFailureKind::Execution => Self::StageExecution(err),
        }
    }

    /// Returns the phase to which this error is attributed.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::StageExecution(err) => Phase::Stage(err.stage),
            Self::OutputValidation { stage, .. } | Self::Timeout { stage, .. } => {
                Phase::Stage(*stage)
            }
            Self::Initialization(_) => Phase::Initialization,
            Self::Consistency(_)
            | Self::Cancelled(_)
            | Self::RunInProgress(_)
            | Self::Checkpoint(_)
            | Self::CheckpointNotFound(_) => Phase::Execution,
        }
    }

    /// Returns the stage this error is attributed to, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        self.phase().stage()
    }

    /// Converts the error into the payload delivered to error listeners.
    #[must_use]
    pub fn to_graph_error(&self) -> GraphError {
        let cause: SharedError = match self {
            Self::StageExecution(err) => err.shared_cause(),
            other => Arc::new(other.clone()),
        };
        GraphError {
            phase: self.phase(),
            message: self.to_string(),
            cause,
        }
    }
}

impl From<StageError> for WorkflowError {
    fn from(err: StageError) -> Self {
        Self::from_stage_error(err)
    }
}

/// The payload delivered to error listeners.
#[derive(Debug, Clone)]
pub struct GraphError {
    /// The phase that produced the failure.
    pub phase: Phase,
    /// Human-readable message.
    pub message: String,
    /// The underlying cause.
    pub cause: SharedError,
}

impl GraphError {
    /// Creates a graph error.
    #[must_use]
    pub fn new(phase: Phase, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            phase,
            message: message.into(),
            cause: Arc::from(cause.into()),
        }
    }

    /// Returns the phase identifier (`"dependency"`, `"execution"`, ...).
    #[must_use]
    pub const fn phase_name(&self) -> &'static str {
        self.phase.as_str()
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)
    }
}

impl StdError for GraphError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}
