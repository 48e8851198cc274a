//! Source tree enumeration.

use std::path::Path;

use mdpress_render::SOURCE_EXTENSION;

/// Enumerate markdown sources under `root` as sorted forward-slash
/// relative paths.
///
/// Hidden files and directories are skipped. A missing root yields an
/// empty list.
pub(crate) fn scan_sources(root: &Path) -> std::io::Result<Vec<String>> {
    let mut sources = Vec::new();
    if root.is_dir() {
        scan_directory(root, "", &mut sources)?;
    }
    sources.sort();
    Ok(sources)
}

fn scan_directory(dir: &Path, prefix: &str, sources: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        if entry.file_type()?.is_dir() {
            scan_directory(&entry.path(), &relative, sources)?;
        } else if entry
            .path()
            .extension()
            .is_some_and(|ext| ext == SOURCE_EXTENSION)
        {
            sources.push(relative);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scan_returns_sorted_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b/c.md"), "").unwrap();
        std::fs::write(dir.path().join("a.md"), "").unwrap();

        let sources = scan_sources(dir.path()).unwrap();

        assert_eq!(sources, vec!["a.md".to_owned(), "b/c.md".to_owned()]);
    }

    #[test]
    fn scan_skips_hidden_and_non_markdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/x.md"), "").unwrap();
        std::fs::write(dir.path().join(".draft.md"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join("page.md"), "").unwrap();

        let sources = scan_sources(dir.path()).unwrap();

        assert_eq!(sources, vec!["page.md".to_owned()]);
    }

    #[test]
    fn scan_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let sources = scan_sources(&dir.path().join("nope")).unwrap();

        assert!(sources.is_empty());
    }
}
