//! Stage identifiers and error phases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one of the fixed workflow stages.
///
/// Matching on stage identity is always exact; the string forms are only used
/// at the edges (logs, events, checkpoints, listener payloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Inspects the source and the build manifest for test dependencies.
    Dependency,
    /// Analyzes the class under test and its surroundings.
    Context,
    /// Produces the final test artifact.
    Generation,
}

impl StageId {
    /// All stages in pipeline order.
    pub const ALL: [Self; 3] = [Self::Dependency, Self::Context, Self::Generation];

    /// Returns the stable string identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dependency => "dependency",
            Self::Context => "context",
            Self::Generation => "generation",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown stage identifier '{s}'"))
    }
}

/// Where in the workflow an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Raised by a specific stage.
    Stage(StageId),
    /// Raised while assembling the stage graph.
    Initialization,
    /// Raised by the executor outside of any stage.
    Execution,
}

impl Phase {
    /// Returns the phase identifier reported to error listeners.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stage(stage) => stage.as_str(),
            Self::Initialization => "initialization",
            Self::Execution => "execution",
        }
    }

    /// Returns the stage when the phase is stage-scoped.
    #[must_use]
    pub const fn stage(self) -> Option<StageId> {
        match self {
            Self::Stage(stage) => Some(stage),
            Self::Initialization | Self::Execution => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
