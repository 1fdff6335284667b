//! Small helpers for timestamps and content hashing.

mod hashing;
mod timestamps;

pub use hashing::{sha256_hex, truncate_chars};
pub use timestamps::{format_iso8601, iso_timestamp, now_utc, Timestamp};
