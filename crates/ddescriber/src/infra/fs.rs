//! Reading and writing test documents.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Read a document as UTF-8 text.
pub fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Replace a document's contents. The text is written to a sibling temporary file first and
/// then renamed over the original, so readers never observe a partial write.
pub fn write_document(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    temp.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    temp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_replaces_existing_contents() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("spec.js");
        fs::write(&path, "iit('a');\n")?;

        write_document(&path, "it('a');\n")?;

        assert_eq!(read_document(&path)?, "it('a');\n");
        assert_eq!(fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn read_reports_missing_files() {
        let err = read_document(Path::new("does/not/exist.js")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.js"));
    }
}
