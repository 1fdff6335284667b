//! Core domain types for testflow.
//!
//! This module contains the fundamental types shared across the crate:
//! - Stage identifiers and error phases
//! - Workflow lifecycle events

mod event;
mod status;

pub use event::{EventKind, WorkflowEvent};
pub use status::{Phase, StageId};
