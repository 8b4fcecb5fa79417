use anyhow::{bail, Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use projrag_core::models::Document;
use projrag_core::RagError;

/// Reject project names that are not a single directory component.
pub fn check_project_name(project: &str) -> Result<()> {
    let trimmed = project.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        bail!(RagError::Usage(format!(
            "project name must be a single directory name, got '{}'",
            project
        )));
    }
    Ok(())
}

/// Read every `.txt` file directly inside `dir` as a [`Document`] of `project`.
///
/// Subdirectories and other extensions are ignored. Documents are sorted by
/// filename so repeated runs see the same order.
pub fn discover_documents(project: &str, dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        bail!(RagError::ProjectDirectoryNotFound(dir.to_path_buf()));
    }

    let mut docs = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        docs.push(Document::new(project, filename, text));
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_top_level_txt_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.txt"), "second").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "first").unwrap();
        std::fs::write(tmp.path().join("notes.md"), "# ignored").unwrap();
        std::fs::write(tmp.path().join("data.TXT.bak"), "ignored").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested/c.txt"), "ignored").unwrap();

        let docs = discover_documents("demo", tmp.path()).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(docs[0].text, "first");
        assert_eq!(docs[0].project, "demo");
    }

    #[test]
    fn test_missing_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = discover_documents("demo", &tmp.path().join("nope")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::ProjectDirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_project_name_must_be_one_component() {
        assert!(check_project_name("demo").is_ok());
        assert!(check_project_name("my-project_2").is_ok());

        for bad in ["", "  ", ".", "..", "a/b", "../etc", "a\\b"] {
            let err = check_project_name(bad).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<RagError>(), Some(RagError::Usage(_))),
                "{:?} accepted",
                bad
            );
        }
    }
}
