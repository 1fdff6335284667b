//! Cooperative cancellation for workflow runs.

mod token;

pub use token::CancellationToken;
