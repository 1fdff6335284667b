//! Tool capabilities offered to stages.
//!
//! This module provides:
//! - Tool definitions and the per-stage [`ToolSet`]
//! - Build manifest inspection (`analyze_build_manifest`)
//! - Source lookups (`find_source_files_by_name`, `find_classes_by_name_pattern`,
//!   `get_source_file_content`, `find_methods_in_class`)

mod definitions;
mod manifest;
mod registry;
mod source;

pub use definitions::ToolDefinition;
pub use manifest::{
    find_manifest, parse_gradle, parse_pom, BuildManifestTool, BuildSystem, Dependency,
    ManifestSummary, ANALYZE_BUILD_MANIFEST,
};
pub use registry::{Tool, ToolSet};
pub use source::{
    ClassMethodsTool, FindClassesTool, FindSourceFilesTool, SourceFileContentTool, SourceIndex,
    FIND_CLASSES_BY_NAME_PATTERN, FIND_METHODS_IN_CLASS, FIND_SOURCE_FILES_BY_NAME,
    GET_SOURCE_FILE_CONTENT,
};

use std::path::Path;
use std::sync::Arc;

impl ToolSet {
    /// The tools offered to the dependency stage.
    #[must_use]
    pub fn dependency_tools(project_root: &Path) -> Self {
        Self::new().with(BuildManifestTool::new(project_root))
    }

    /// The tools offered to the context stage.
    #[must_use]
    pub fn context_tools(project_root: &Path, source_extension: &str) -> Self {
        let index = Arc::new(SourceIndex::new(project_root, source_extension));
        Self::new()
            .with(FindSourceFilesTool::new(Arc::clone(&index)))
            .with(FindClassesTool::new(Arc::clone(&index)))
            .with(SourceFileContentTool::new(Arc::clone(&index)))
            .with(ClassMethodsTool::new(index))
    }
}

#[cfg(test)]
mod source_tests;
