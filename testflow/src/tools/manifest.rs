//! Build manifest inspection.
//!
//! Locates the project's build file (Maven `pom.xml`, or Gradle
//! `build.gradle.kts` / `build.gradle`) and reports its coordinates, declared
//! dependencies, and which of them are test libraries.

use super::{Tool, ToolDefinition};
use crate::errors::ToolError;
use crate::utils::truncate_chars;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Name under which the tool is advertised.
pub const ANALYZE_BUILD_MANIFEST: &str = "analyze_build_manifest";

const MAX_RAW_CHARS: usize = 8_000;

/// Directories never searched for build files or sources.
pub(crate) const SKIPPED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    ".git",
    ".gradle",
    ".idea",
];

const TEST_LIBRARY_MARKERS: &[&str] = &[
    "junit",
    "mockito",
    "assertj",
    "hamcrest",
    "testng",
    "spock",
    "kotest",
    "mockk",
    "testcontainers",
];

static XML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex is valid"));

static POM_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<parent>.*?</parent>|<dependencyManagement>.*?</dependencyManagement>|<build>.*?</build>|<profiles>.*?</profiles>|<reporting>.*?</reporting>",
    )
    .expect("static regex is valid")
});

static POM_DEPENDENCIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<dependencies>(.*?)</dependencies>").expect("static regex is valid"));

static POM_DEPENDENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<dependency>(.*?)</dependency>").expect("static regex is valid"));

static POM_PROPERTIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<properties>(.*?)</properties>").expect("static regex is valid"));

// The regex crate has no backreferences; open and close names are compared after matching.
static XML_LEAF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([\w.\-]+)>\s*([^<]*?)\s*</([\w.\-]+)>").expect("static regex is valid")
});

static GRADLE_DEPENDENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(implementation|api|compileOnly|runtimeOnly|testImplementation|testRuntimeOnly|testCompileOnly|annotationProcessor|kapt)\s*\(?\s*["']([^"':\s]+):([^"':\s]+)(?::([^"'\s]+))?["']"#,
    )
    .expect("static regex is valid")
});

static GRADLE_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(group|version|description)\s*=\s*["']([^"']*)["']"#)
        .expect("static regex is valid")
});

/// The kind of build file found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    /// Maven `pom.xml`.
    Maven,
    /// Gradle `build.gradle` or `build.gradle.kts`.
    Gradle,
}

impl BuildSystem {
    fn for_file_name(name: &str) -> Option<(Self, u8)> {
        match name {
            "pom.xml" => Some((Self::Maven, 0)),
            "build.gradle.kts" => Some((Self::Gradle, 1)),
            "build.gradle" => Some((Self::Gradle, 2)),
            _ => None,
        }
    }
}

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Group coordinate.
    pub group_id: String,
    /// Artifact coordinate.
    pub artifact_id: String,
    /// Declared version, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Maven scope or Gradle configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Dependency {
    /// Returns true if this looks like a testing library.
    #[must_use]
    pub fn is_test_library(&self) -> bool {
        let scoped_for_tests = self
            .scope
            .as_deref()
            .is_some_and(|s| s.starts_with("test"));
        let coordinates = format!("{}:{}", self.group_id, self.artifact_id).to_lowercase();
        scoped_for_tests
            || TEST_LIBRARY_MARKERS
                .iter()
                .any(|marker| coordinates.contains(marker))
    }
}

/// The parsed contents of a build file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestSummary {
    /// Which build system the file belongs to.
    pub build_system: BuildSystem,
    /// Top-level project coordinates and metadata.
    pub project_info: BTreeMap<String, String>,
    /// Declared properties (Maven only).
    pub properties: BTreeMap<String, String>,
    /// Declared dependencies, in file order.
    pub dependencies: Vec<Dependency>,
}

impl ManifestSummary {
    /// Returns `group:artifact` for each test library.
    #[must_use]
    pub fn test_libraries(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .filter(|d| d.is_test_library())
            .map(|d| format!("{}:{}", d.group_id, d.artifact_id))
            .collect()
    }
}

/// Finds the build file closest to `root`, preferring Maven over Gradle at
/// the same depth.
#[must_use]
pub fn find_manifest(root: &Path) -> Option<(PathBuf, BuildSystem)> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let (system, priority) = BuildSystem::for_file_name(e.file_name().to_str()?)?;
            Some((e.depth(), priority, e.into_path(), system))
        })
        .min_by(|a, b| (a.0, a.1, &a.2).cmp(&(b.0, b.1, &b.2)))
        .map(|(_, _, path, system)| (path, system))
}

pub(crate) fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Parses a Maven `pom.xml`.
#[must_use]
pub fn parse_pom(content: &str) -> ManifestSummary {
    let without_comments = XML_COMMENT.replace_all(content, "");
    let relevant = POM_NOISE.replace_all(&without_comments, "");

    let dependencies = POM_DEPENDENCIES
        .captures(&relevant)
        .and_then(|c| c.get(1))
        .map(|block| {
            POM_DEPENDENCY
                .captures_iter(block.as_str())
                .filter_map(|c| c.get(1))
                .filter_map(|dep| {
                    let fields = leaf_tags(dep.as_str());
                    Some(Dependency {
                        group_id: fields.get("groupId")?.clone(),
                        artifact_id: fields.get("artifactId")?.clone(),
                        version: fields.get("version").cloned(),
                        scope: fields.get("scope").cloned(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let properties = POM_PROPERTIES
        .captures(&relevant)
        .and_then(|c| c.get(1))
        .map(|block| leaf_tags(block.as_str()))
        .unwrap_or_default();

    let top_level = POM_DEPENDENCIES.replace_all(&relevant, "");
    let top_level = POM_PROPERTIES.replace_all(&top_level, "");
    let all_leaves = leaf_tags(&top_level);
    let project_info = ["groupId", "artifactId", "version", "name", "description"]
        .into_iter()
        .filter_map(|key| all_leaves.get(key).map(|v| (key.to_string(), v.clone())))
        .collect();

    ManifestSummary {
        build_system: BuildSystem::Maven,
        project_info,
        properties,
        dependencies,
    }
}

/// Parses a Gradle build script (Groovy or Kotlin DSL).
#[must_use]
pub fn parse_gradle(content: &str) -> ManifestSummary {
    let dependencies = GRADLE_DEPENDENCY
        .captures_iter(content)
        .map(|c| Dependency {
            group_id: c[2].to_string(),
            artifact_id: c[3].to_string(),
            version: c.get(4).map(|m| m.as_str().to_string()),
            scope: Some(c[1].to_string()),
        })
        .collect();

    let project_info = GRADLE_PROPERTY
        .captures_iter(content)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();

    ManifestSummary {
        build_system: BuildSystem::Gradle,
        project_info,
        properties: BTreeMap::new(),
        dependencies,
    }
}

// First occurrence wins for repeated leaf tags.
fn leaf_tags(xml: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for caps in XML_LEAF.captures_iter(xml) {
        if caps[1] == caps[3] {
            out.entry(caps[1].to_string())
                .or_insert_with(|| caps[2].to_string());
        }
    }
    out
}

/// Tool that locates and summarizes the project's build file.
#[derive(Debug, Clone)]
pub struct BuildManifestTool {
    root: PathBuf,
}

impl BuildManifestTool {
    /// Creates the tool for a project root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Tool for BuildManifestTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(ANALYZE_BUILD_MANIFEST).with_description(
            "Finds the project's build file (pom.xml or build.gradle), returns its \
             content, project coordinates, declared dependencies, and the test \
             libraries available.",
        )
    }

    fn invoke(&self, _args: &Value) -> Result<Value, ToolError> {
        let Some((path, system)) = find_manifest(&self.root) else {
            info!(root = %self.root.display(), "No build manifest found");
            return Ok(json!({
                "found": false,
                "message": "no build manifest (pom.xml, build.gradle.kts, build.gradle) found under the project root",
            }));
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ToolError::execution_failed(
                ANALYZE_BUILD_MANIFEST,
                format!("cannot read {}: {e}", path.display()),
            )
        })?;
        let summary = match system {
            BuildSystem::Maven => parse_pom(&content),
            BuildSystem::Gradle => parse_gradle(&content),
        };
        debug!(
            path = %path.display(),
            dependencies = summary.dependencies.len(),
            "Build manifest parsed"
        );

        let relative = path.strip_prefix(&self.root).unwrap_or(path.as_path());
        Ok(json!({
            "found": true,
            "manifest_path": relative.to_string_lossy(),
            "build_system": summary.build_system,
            "project_info": summary.project_info,
            "properties": summary.properties,
            "dependencies": summary.dependencies,
            "test_libraries": summary.test_libraries(),
            "raw_content": truncate_chars(&content, MAX_RAW_CHARS),
        }))
    }
}
