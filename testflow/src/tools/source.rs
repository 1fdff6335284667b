//! On-demand lookups over the project's source files.
//!
//! Nothing is indexed ahead of time; each call walks the project root. All
//! paths handed to the model are relative to that root, and reads outside it
//! are refused.

use super::manifest::is_skipped_dir;
use super::registry::string_arg;
use super::{Tool, ToolDefinition};
use crate::errors::ToolError;
use crate::utils::truncate_chars;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::debug;
use walkdir::WalkDir;

/// Tool name: find source files by base name.
pub const FIND_SOURCE_FILES_BY_NAME: &str = "find_source_files_by_name";
/// Tool name: find classes whose name contains a pattern.
pub const FIND_CLASSES_BY_NAME_PATTERN: &str = "find_classes_by_name_pattern";
/// Tool name: read a source file.
pub const GET_SOURCE_FILE_CONTENT: &str = "get_source_file_content";
/// Tool name: list the methods declared by a class.
pub const FIND_METHODS_IN_CLASS: &str = "find_methods_in_class";

const MAX_FILE_CHARS: usize = 64_000;

static COMMENT_OR_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"//[^\n]*|/\*[\s\S]*?\*/|"(?:\\.|[^"\\\n])*"|'(?:\\.|[^'\\\n])*'"#)
        .expect("static regex is valid")
});

static PACKAGE_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpackage\s+([\w.]+)").expect("static regex is valid"));

static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|interface|enum|record)\s+(\w+)").expect("static regex is valid")
});

static METHOD_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:@[\w.]+\s+)*(?:[\w<>\[\]?,.]+[ \t]+)*(\w+)[ \t]*\(([^()]*)\)[^;{}]*[{;]",
    )
    .expect("static regex is valid")
});

// Annotations with arguments, e.g. `@RequestParam("id")`.
static ANNOTATION_WITH_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.]+\s*\([^()]*\)").expect("static regex is valid"));

static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.]+\s*").expect("static regex is valid"));

const NOT_METHODS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "synchronized", "return", "new", "try", "else",
    "do", "throw",
];

/// Walks the project root for source files with one extension.
#[derive(Debug, Clone)]
pub struct SourceIndex {
    root: PathBuf,
    extension: String,
}

impl SourceIndex {
    /// Creates an index over `root` for files ending in `.{extension}`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Returns the relative paths of files whose base name is `name`.
    ///
    /// `name` may be given with or without the extension.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Vec<String> {
        let suffix = format!(".{}", self.extension);
        let stem = name.strip_suffix(&suffix).unwrap_or(name);
        self.source_files()
            .filter(|p| p.file_stem().and_then(|s| s.to_str()) == Some(stem))
            .map(|p| self.relative(&p))
            .collect()
    }

    /// Returns qualified names of declared types whose name contains `pattern`.
    #[must_use]
    pub fn find_classes(&self, pattern: &str) -> Vec<String> {
        let mut found = Vec::new();
        for path in self.source_files() {
            let Ok(content) = std::fs::read_to_string(&path) else {
                debug!(path = %path.display(), "Skipping unreadable source file");
                continue;
            };
            let masked = mask_comments_and_literals(&content);
            let package = package_of(&masked);
            for caps in TYPE_DECL.captures_iter(&masked) {
                let name = &caps[1];
                if name.contains(pattern) {
                    found.push(qualify(package, name));
                }
            }
        }
        found
    }

    /// Reads a file given relative to the project root.
    ///
    /// # Errors
    ///
    /// Fails for absolute paths, paths escaping the root, and unreadable files.
    pub fn read(&self, relative: &str) -> Result<String, ToolError> {
        let requested = Path::new(relative);
        if requested.is_absolute()
            || requested
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(ToolError::invalid_arguments(
                GET_SOURCE_FILE_CONTENT,
                format!("path '{relative}' must be relative to the project root"),
            ));
        }

        let full = self.root.join(requested);
        let not_found = || {
            ToolError::execution_failed(GET_SOURCE_FILE_CONTENT, format!("file not found: {relative}"))
        };
        let canonical = full.canonicalize().map_err(|_| not_found())?;
        let root = self.root.canonicalize().map_err(|_| not_found())?;
        if !canonical.starts_with(&root) {
            return Err(ToolError::invalid_arguments(
                GET_SOURCE_FILE_CONTENT,
                format!("path '{relative}' resolves outside the project root"),
            ));
        }
        if !canonical.is_file() {
            return Err(not_found());
        }

        std::fs::read_to_string(&canonical).map_err(|e| {
            ToolError::execution_failed(GET_SOURCE_FILE_CONTENT, format!("cannot read {relative}: {e}"))
        })
    }

    /// Lists method signatures, as `name(Type param, ...)`, declared directly
    /// in the class `qualified_name` (`com.acme.Foo` or just `Foo`).
    ///
    /// Returns `None` if no file declares the class.
    #[must_use]
    pub fn methods_of(&self, qualified_name: &str) -> Option<Vec<String>> {
        let (package, simple) = match qualified_name.rsplit_once('.') {
            Some((package, simple)) => (Some(package), simple),
            None => (None, qualified_name),
        };

        for path in self.source_files() {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let masked = mask_comments_and_literals(&content);
            if package.is_some_and(|p| package_of(&masked) != p) {
                continue;
            }
            if let Some(body) = class_body(&masked, simple) {
                return Some(method_signatures(body));
            }
        }
        None
    }
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

fn package_of(masked: &str) -> &str {
    PACKAGE_DECL
        .captures(masked)
        .and_then(|c| c.get(1))
        .map_or("", |m| m.as_str())
}

/// Blanks out comments and string/char literals, preserving byte offsets and
/// line breaks, so brace matching and declaration regexes see only code.
fn mask_comments_and_literals(source: &str) -> String {
    blank_matches(&COMMENT_OR_LITERAL, source)
}

fn blank_matches(re: &Regex, text: &str) -> String {
    re.replace_all(text, |caps: &regex::Captures<'_>| {
        caps[0]
            .chars()
            .map(|c| if c == '\n' { "\n".to_string() } else { " ".repeat(c.len_utf8()) })
            .collect::<String>()
    })
    .into_owned()
}

/// Returns the text between the braces of the type declaration `name`.
fn class_body<'a>(masked: &'a str, name: &str) -> Option<&'a str> {
    let decl = TYPE_DECL
        .captures_iter(masked)
        .find(|c| &c[1] == name)?
        .get(0)?;
    let open = decl.end() + masked[decl.end()..].find('{')?;

    let mut depth = 0usize;
    for (offset, byte) in masked.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&masked[open + 1..open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn method_signatures(body: &str) -> Vec<String> {
    let body = blank_matches(&ANNOTATION_WITH_ARGS, body);
    let mut depth_at = Vec::with_capacity(body.len());
    let mut depth = 0i32;
    for byte in body.bytes() {
        depth_at.push(depth);
        match byte {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
        }
    }

    METHOD_DECL
        .captures_iter(&body)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            if depth_at.get(name.start()) != Some(&0) || NOT_METHODS.contains(&name.as_str()) {
                return None;
            }
            let params: Vec<String> = split_top_level(&caps[2])
                .into_iter()
                .map(|p| normalize_param(&p))
                .filter(|p| !p.is_empty())
                .collect();
            Some(format!("{}({})", name.as_str(), params.join(", ")))
        })
        .collect()
}

fn split_top_level(params: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut angle = 0i32;
    for c in params.chars() {
        match c {
            '<' => angle += 1,
            '>' => angle -= 1,
            ',' if angle == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn normalize_param(param: &str) -> String {
    let without_annotations = ANNOTATION.replace_all(param, "");
    without_annotations
        .split_whitespace()
        .filter(|token| *token != "final")
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tool: find source files by base name.
#[derive(Debug, Clone)]
pub struct FindSourceFilesTool {
    index: Arc<SourceIndex>,
}

impl FindSourceFilesTool {
    /// Creates the tool over a shared index.
    #[must_use]
    pub const fn new(index: Arc<SourceIndex>) -> Self {
        Self { index }
    }
}

impl Tool for FindSourceFilesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(FIND_SOURCE_FILES_BY_NAME)
            .with_description(
                "Finds source files in the project whose base name matches exactly. \
                 Returns paths relative to the project root.",
            )
            .with_string_param("name", "File base name, with or without extension")
    }

    fn invoke(&self, args: &Value) -> Result<Value, ToolError> {
        let name = string_arg(FIND_SOURCE_FILES_BY_NAME, args, "name")?;
        Ok(json!({ "files": self.index.find_by_name(name.trim()) }))
    }
}

/// Tool: find classes whose name contains a pattern.
#[derive(Debug, Clone)]
pub struct FindClassesTool {
    index: Arc<SourceIndex>,
}

impl FindClassesTool {
    /// Creates the tool over a shared index.
    #[must_use]
    pub const fn new(index: Arc<SourceIndex>) -> Self {
        Self { index }
    }
}

impl Tool for FindClassesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(FIND_CLASSES_BY_NAME_PATTERN)
            .with_description(
                "Finds classes, interfaces, enums and records whose simple name contains \
                 the given text (case-sensitive). Returns fully qualified names.",
            )
            .with_string_param("pattern", "Text the type name must contain")
    }

    fn invoke(&self, args: &Value) -> Result<Value, ToolError> {
        let pattern = string_arg(FIND_CLASSES_BY_NAME_PATTERN, args, "pattern")?.trim();
        if pattern.is_empty() {
            return Err(ToolError::invalid_arguments(
                FIND_CLASSES_BY_NAME_PATTERN,
                "'pattern' must not be empty",
            ));
        }
        Ok(json!({ "classes": self.index.find_classes(pattern) }))
    }
}

/// Tool: read a source file.
#[derive(Debug, Clone)]
pub struct SourceFileContentTool {
    index: Arc<SourceIndex>,
}

impl SourceFileContentTool {
    /// Creates the tool over a shared index.
    #[must_use]
    pub const fn new(index: Arc<SourceIndex>) -> Self {
        Self { index }
    }
}

impl Tool for SourceFileContentTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(GET_SOURCE_FILE_CONTENT)
            .with_description("Returns the content of a file, given its path relative to the project root.")
            .with_string_param("path", "Path relative to the project root")
    }

    fn invoke(&self, args: &Value) -> Result<Value, ToolError> {
        let path = string_arg(GET_SOURCE_FILE_CONTENT, args, "path")?.trim();
        let content = self.index.read(path)?;
        Ok(json!({
            "path": path,
            "content": truncate_chars(&content, MAX_FILE_CHARS),
        }))
    }
}

/// Tool: list the methods declared by a class.
#[derive(Debug, Clone)]
pub struct ClassMethodsTool {
    index: Arc<SourceIndex>,
}

impl ClassMethodsTool {
    /// Creates the tool over a shared index.
    #[must_use]
    pub const fn new(index: Arc<SourceIndex>) -> Self {
        Self { index }
    }
}

impl Tool for ClassMethodsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(FIND_METHODS_IN_CLASS)
            .with_description(
                "Lists the methods and constructors declared directly in a class, as \
                 `name(Type param, ...)` signatures.",
            )
            .with_string_param("class_name", "Fully qualified class name, e.g. com.acme.Foo")
    }

    fn invoke(&self, args: &Value) -> Result<Value, ToolError> {
        let class_name = string_arg(FIND_METHODS_IN_CLASS, args, "class_name")?.trim();
        let methods = self.index.methods_of(class_name).ok_or_else(|| {
            ToolError::execution_failed(FIND_METHODS_IN_CLASS, format!("class not found: {class_name}"))
        })?;
        Ok(json!({ "class": class_name, "methods": methods }))
    }
}
