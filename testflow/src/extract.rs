//! Normalization of raw model output into a clean artifact.

use std::sync::LazyLock;

use regex::Regex;

/// Prefix of the failure string returned by the single-string entry point.
pub const FAILURE_PREFIX: &str = "Error during test generation: ";

/// Texts that mean "nothing was produced" and must never be returned as a result.
pub const NO_RESULT_SENTINELS: &[&str] = &[
    "No result generated",
    "No tests generated",
    "not available",
];

// First fenced block; the info string (`java`, `kotlin`, ...) is optional.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[^\n`]*\r?\n([\s\S]*?)```").expect("static regex is valid")
});

static NARRATIVE_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#|here's the\b|here is the\b|the following\b|sure\b|certainly\b)",
    )
    .expect("static regex is valid")
});

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\.\.\.|todo|tbd|n/?a|none|null|placeholder|<[^>\n]*>)\s*$")
        .expect("static regex is valid")
});

/// Extracts the artifact from raw model output.
///
/// If the text contains a fenced block, the interior of the first block is
/// returned. Otherwise any leading narrative lines ("Here's the...",
/// "# Tests", "Sure, ...") are dropped and the rest is returned unchanged.
///
/// # Examples
///
/// ```
/// use testflow::extract::extract_artifact;
///
/// let raw = "Here are the tests:\n```java\nclass FooTest {}\n```\nEnjoy!";
/// assert_eq!(extract_artifact(raw), "class FooTest {}");
/// ```
#[must_use]
pub fn extract_artifact(raw: &str) -> String {
    if let Some(body) = FENCED_BLOCK.captures(raw).and_then(|c| c.get(1)) {
        return body.as_str().trim_end_matches(['\n', '\r']).to_string();
    }

    let mut rest = raw;
    while !rest.is_empty() {
        let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
        if !NARRATIVE_OPENER.is_match(line) {
            break;
        }
        rest = tail.trim_start_matches(['\n', '\r']);
    }
    rest.to_string()
}

/// Rejects artifacts that are empty, placeholders, or error reports.
///
/// # Errors
///
/// Returns a description of the problem when the artifact is unusable.
pub fn validate_artifact(text: &str) -> Result<(), String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("generated output is empty".to_string());
    }
    if PLACEHOLDER.is_match(trimmed) {
        return Err(format!("generated output is a placeholder: '{trimmed}'"));
    }
    if NO_RESULT_SENTINELS
        .iter()
        .any(|s| trimmed.eq_ignore_ascii_case(s))
    {
        return Err(format!("generated output is a no-result marker: '{trimmed}'"));
    }
    if trimmed.starts_with(FAILURE_PREFIX.trim_end()) || trimmed.starts_with("Error:") {
        return Err("generated output is an error report".to_string());
    }
    Ok(())
}
