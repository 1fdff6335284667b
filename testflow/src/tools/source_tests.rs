//! Tests for the source lookup tools over a temporary project.

#[cfg(test)]
mod tests {
    use crate::errors::ToolError;
    use crate::tools::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    const INVOICE: &str = r#"package com.acme.billing;

import java.util.List;
import java.util.Map;

/**
 * class NotARealClass in a comment.
 */
public class InvoiceService {
    private final Map<String, Integer> cache = new HashMap<>();

    public InvoiceService(InvoiceRepository repository) {
        this.repository = repository;
    }

    @Override
    public String toString() {
        return "InvoiceService{}";
    }

    public Invoice create(final String customerId, Map<String, List<Integer>> lines) throws IOException {
        if (customerId == null) {
            throw new IllegalArgumentException("customer {");
        }
        for (int i = 0; i < 3; i++) {
            log(i);
        }
        return new Invoice(customerId);
    }

    private static <T> List<T> copy(@NonNull List<T> items, @Size(max = 3) int limit) {
        return items;
    }

    static class InvoiceLine {
        void hidden(int x) {}
    }
}
"#;

    const REPO: &str = r#"package com.acme.billing;

public interface InvoiceRepository {
    Invoice find(String id);
    void save(Invoice invoice);
}
"#;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("src/main/java/com/acme/billing");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("InvoiceService.java"), INVOICE).unwrap();
        std::fs::write(pkg.join("InvoiceRepository.java"), REPO).unwrap();
        std::fs::create_dir_all(dir.path().join("target/generated")).unwrap();
        std::fs::write(
            dir.path().join("target/generated/InvoiceService.java"),
            "class InvoiceServiceCopy {}",
        )
        .unwrap();
        dir
    }

    fn tools(root: &Path) -> ToolSet {
        ToolSet::context_tools(root, "java")
    }

    #[test]
    fn test_context_tools_registered() {
        let dir = project();
        assert_eq!(
            tools(dir.path()).names(),
            vec![
                FIND_CLASSES_BY_NAME_PATTERN.to_string(),
                FIND_METHODS_IN_CLASS.to_string(),
                FIND_SOURCE_FILES_BY_NAME.to_string(),
                GET_SOURCE_FILE_CONTENT.to_string(),
            ]
        );
        assert_eq!(
            ToolSet::dependency_tools(dir.path()).names(),
            vec![ANALYZE_BUILD_MANIFEST.to_string()]
        );
    }

    #[test]
    fn test_find_source_files_by_name() {
        let dir = project();
        let out = tools(dir.path())
            .invoke(FIND_SOURCE_FILES_BY_NAME, &json!({"name": "InvoiceService"}))
            .unwrap();
        assert_eq!(
            out,
            json!({"files": ["src/main/java/com/acme/billing/InvoiceService.java"]})
        );

        let out = tools(dir.path())
            .invoke(FIND_SOURCE_FILES_BY_NAME, &json!({"name": "InvoiceService.java"}))
            .unwrap();
        assert_eq!(out["files"].as_array().map(Vec::len), Some(1));

        let out = tools(dir.path())
            .invoke(FIND_SOURCE_FILES_BY_NAME, &json!({"name": "Invoice"}))
            .unwrap();
        assert_eq!(out, json!({"files": []}));
    }

    #[test]
    fn test_find_classes_by_name_pattern() {
        let dir = project();
        let out = tools(dir.path())
            .invoke(FIND_CLASSES_BY_NAME_PATTERN, &json!({"pattern": "Invoice"}))
            .unwrap();
        assert_eq!(
            out,
            json!({"classes": [
                "com.acme.billing.InvoiceRepository",
                "com.acme.billing.InvoiceService",
                "com.acme.billing.InvoiceLine"
            ]})
        );
    }

    #[test]
    fn test_find_classes_rejects_empty_pattern() {
        let dir = project();
        let err = tools(dir.path())
            .invoke(FIND_CLASSES_BY_NAME_PATTERN, &json!({"pattern": "  "}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_get_source_file_content() {
        let dir = project();
        let out = tools(dir.path())
            .invoke(
                GET_SOURCE_FILE_CONTENT,
                &json!({"path": "src/main/java/com/acme/billing/InvoiceRepository.java"}),
            )
            .unwrap();
        assert_eq!(out["content"], REPO);
    }

    #[test]
    fn test_get_source_file_content_refuses_escape() {
        let dir = project();
        let set = tools(dir.path());

        for path in ["../secret.txt", "/etc/passwd", "src/../../x"] {
            let err = set
                .invoke(GET_SOURCE_FILE_CONTENT, &json!({"path": path}))
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments { .. }), "{path}");
        }

        let err = set
            .invoke(GET_SOURCE_FILE_CONTENT, &json!({"path": "Missing.java"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[test]
    fn test_find_methods_in_class() {
        let dir = project();
        let out = tools(dir.path())
            .invoke(
                FIND_METHODS_IN_CLASS,
                &json!({"class_name": "com.acme.billing.InvoiceService"}),
            )
            .unwrap();
        assert_eq!(
            out["methods"],
            json!([
                "InvoiceService(InvoiceRepository repository)",
                "toString()",
                "create(String customerId, Map<String, List<Integer>> lines)",
                "copy(List<T> items, int limit)"
            ])
        );
    }

    #[test]
    fn test_find_methods_in_interface() {
        let dir = project();
        let out = tools(dir.path())
            .invoke(FIND_METHODS_IN_CLASS, &json!({"class_name": "InvoiceRepository"}))
            .unwrap();
        assert_eq!(out["methods"], json!(["find(String id)", "save(Invoice invoice)"]));
    }

    #[test]
    fn test_find_methods_unknown_class() {
        let dir = project();
        let err = tools(dir.path())
            .invoke(
                FIND_METHODS_IN_CLASS,
                &json!({"class_name": "com.other.InvoiceService"}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("class not found"));
    }
}
