//! Prompt templates and the test target they are rendered for.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("static regex is valid"));

/// The language and libraries generated tests are written for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTarget {
    /// Source language, e.g. `Java`.
    #[serde(default = "default_language")]
    pub language: String,
    /// Unit test framework, e.g. `JUnit 5`.
    #[serde(default = "default_framework")]
    pub framework: String,
    /// Mocking library, e.g. `Mockito`.
    #[serde(default = "default_mocking_library")]
    pub mocking_library: String,
}

fn default_language() -> String {
    "Java".to_string()
}

fn default_framework() -> String {
    "JUnit 5".to_string()
}

fn default_mocking_library() -> String {
    "Mockito".to_string()
}

impl Default for TestTarget {
    fn default() -> Self {
        Self {
            language: default_language(),
            framework: default_framework(),
            mocking_library: default_mocking_library(),
        }
    }
}

impl TestTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(
        language: impl Into<String>,
        framework: impl Into<String>,
        mocking_library: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            framework: framework.into(),
            mocking_library: mocking_library.into(),
        }
    }

    fn vars(&self) -> [(&'static str, &str); 3] {
        [
            ("language", self.language.as_str()),
            ("framework", self.framework.as_str()),
            ("mocking_library", self.mocking_library.as_str()),
        ]
    }

    /// Renders a template with this target's variables.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        render_prompt(template, &self.vars())
    }
}

/// Replaces `{{name}}` placeholders in one pass.
///
/// Unknown placeholders are left as they are, and substituted values are
/// never re-scanned, so source text containing `{{...}}` passes through
/// untouched.
///
/// ```
/// use testflow::stages::render_prompt;
///
/// let out = render_prompt("Analyze {{code}} ({{other}})", &[("code", "{{x}}")]);
/// assert_eq!(out, "Analyze {{x}} ({{other}})");
/// ```
#[must_use]
pub fn render_prompt(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

/// System prompt of the dependency stage.
pub const DEPENDENCY_SYSTEM: &str = "\
You are dependency_checker, an expert in {{language}} build and dependency management.
Your job is to identify every testing dependency needed to write effective unit tests \
for the source file you are given.

Work out:
1. Which testing libraries should be used ({{framework}}, {{mocking_library}}, and any others the code calls for).
2. Which versions of those libraries are compatible with the project.
3. Any test-only dependencies implied by the structure of the code.

Consider the design of the class, the technologies it uses, and version compatibility.
Your analysis is handed to the test generator, so make it detailed and structured.";

/// User prompt of the dependency stage.
pub const DEPENDENCY_USER: &str = "Analyze the testing dependencies of this source file:\n\n{{code}}";

/// System prompt of the context stage.
pub const CONTEXT_SYSTEM: &str = "\
You are context_analyzer, an expert in {{language}} code analysis with deep knowledge of \
object-oriented design and testing practice.
Your job is to understand the source file you are given in its context: the relations \
between classes and any patterns that should shape the testing strategy.

Cover:
1. The public methods that should be tested.
2. The collaborators of the class and how to mock them with {{mocking_library}}.
3. The design patterns in use and how they affect the testing approach.
4. Edge cases and special conditions worth testing.

Your analysis guides test generation, so structure it to make writing complete tests easy.";

/// User prompt of the context stage.
pub const CONTEXT_USER: &str = "\
Source file:

{{code}}

Dependency analysis:

{{dependency_analysis}}";

/// System prompt of the generation stage.
pub const GENERATION_SYSTEM: &str = "\
You are test_generator, an expert {{language}} developer who writes high quality \
{{framework}} tests.

Your output MUST contain ONLY the complete, valid source of the test file. Do not add \
explanations or any text that is not part of the code. The output is written directly \
to a source file.

Requirements:
1. Use well-formed doc comments or line comments only.
2. Declare the package of the original class, placed in the test source tree.
3. Include every import the test needs.
4. Use only the testing libraries named in the dependency analysis.
5. Follow {{framework}} naming conventions for test methods.
6. Cover the main use cases and the edge cases named in the context analysis.
7. Mock external collaborators with {{mocking_library}}.
8. Give assertions clear messages describing the expected result.";

/// User prompt of the generation stage.
pub const GENERATION_USER: &str = "\
Original source:

{{code}}

Dependency analysis:

{{dependency_analysis}}

Context analysis:

{{context_analysis}}";
