//! Document loading from a flat directory of text files.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{RagError, Result};

/// A source document, identified by its file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub source_path: PathBuf,
    pub content: String,
}

/// Returns true when `path` has one of `extensions` (case-insensitive,
/// leading dot optional).
fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Loads every eligible file directly inside `dir` (no recursion).
///
/// Documents come back sorted by file name. Two files sharing a stem would
/// share a document id, so that is rejected as a configuration error.
pub fn load_documents(dir: &Path, extensions: &[String]) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(RagError::Configuration(format!(
            "documents directory does not exist: {}",
            dir.display()
        )));
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        RagError::Configuration(format!("cannot list {}: {e}", dir.display()))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            RagError::Configuration(format!("cannot list {}: {e}", dir.display()))
        })?;
        let path = entry.path();
        if path.is_file() && has_allowed_extension(&path, extensions) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(first) = seen.get(&stem) {
            return Err(RagError::Configuration(format!(
                "duplicate document id `{stem}`: {} and {}",
                first.display(),
                path.display()
            )));
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            RagError::Configuration(format!(
                "cannot read {} as UTF-8 text: {e}",
                path.display()
            ))
        })?;

        debug!(
            "Loaded {} ({} chars)",
            path.display(),
            content.chars().count()
        );
        seen.insert(stem.clone(), path.clone());
        docs.push(Document {
            id: stem.clone(),
            title: stem,
            source_path: path,
            content,
        });
    }

    if docs.is_empty() {
        return Err(RagError::EmptyCorpus {
            dir: dir.to_path_buf(),
        });
    }

    info!("Loaded {} document(s) from {}", docs.len(), dir.display());
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["txt".to_string(), ".md".to_string()]
    }

    #[test]
    fn test_loads_txt_and_md_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "# B").unwrap();
        fs::write(dir.path().join("a.txt"), "A").unwrap();
        fs::write(dir.path().join("c.pdf"), "binary-ish").unwrap();
        fs::write(dir.path().join("noext"), "nothing").unwrap();
        fs::create_dir(dir.path().join("nested.md")).unwrap();

        let docs = load_documents(dir.path(), &exts()).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(docs[0].title, "a");
        assert_eq!(docs[1].content, "# B");
        assert_eq!(docs[1].source_path, dir.path().join("b.md"));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.MD"), "upper").unwrap();
        fs::write(dir.path().join("notes.Txt"), "mixed").unwrap();

        let docs = load_documents(dir.path(), &exts()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "README");
    }

    #[test]
    fn test_subdirectories_are_not_walked() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("deep.md"), "deep").unwrap();
        fs::write(dir.path().join("top.md"), "top").unwrap();

        let docs = load_documents(dir.path(), &exts()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "top");
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let err = load_documents(&dir.path().join("absent"), &exts()).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn test_empty_corpus() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("image.png"), "png").unwrap();
        let err = load_documents(dir.path(), &exts()).unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus { .. }));
    }

    #[test]
    fn test_duplicate_stem_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("faq.md"), "one").unwrap();
        fs::write(dir.path().join("faq.txt"), "two").unwrap();

        let err = load_documents(dir.path(), &exts()).unwrap_err();
        match err {
            RagError::Configuration(msg) => {
                assert!(msg.contains("faq.md"), "{msg}");
                assert!(msg.contains("faq.txt"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_configuration_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();
        let err = load_documents(dir.path(), &exts()).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn test_empty_file_is_still_a_document() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("blank.md"), "").unwrap();
        let docs = load_documents(dir.path(), &exts()).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.is_empty());
    }
}
