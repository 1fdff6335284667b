//! Session state threaded through the workflow.
//!
//! A [`SessionState`] is a mapping of named fields plus an append-only message
//! history. Stages never mutate it in place; they return a [`StateUpdate`]
//! which the executor merges into a new state.

mod message;
mod run_id;
mod session;

pub use message::{Message, Role};
pub use run_id::RunId;
pub use session::{fields, SessionState, StateUpdate, NOT_AVAILABLE};
