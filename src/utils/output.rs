//! Output tree helpers: file writes, static copies, cleaning.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Files never copied into the output.
pub const IGNORED_FILE_NAME: &[&str] = &[".DS_Store"];

/// Write `data` to `path`, creating parent directories.
pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

/// Recursively copy `src` into `dst`. A missing `src` copies nothing.
///
/// Returns the number of files copied.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let relative = entry.path().strip_prefix(src)?;
        let dest = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("failed to create {}", dest.display()))?;
        } else if !IGNORED_FILE_NAME.contains(&entry.file_name().to_string_lossy().as_ref()) {
            fs::copy(entry.path(), &dest).with_context(|| {
                format!("failed to copy {} to {}", entry.path().display(), dest.display())
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove everything inside `dir`, keeping the directory itself.
pub fn clean_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/index.html");
        write_file(&path, b"hi").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hi");
    }

    #[test]
    fn test_copy_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("static");
        fs::create_dir_all(src.join("css")).unwrap();
        fs::write(src.join("css/site.css"), "body{}").unwrap();
        fs::write(src.join("logo.svg"), "<svg/>").unwrap();
        fs::write(src.join(".DS_Store"), "").unwrap();

        let dst = dir.path().join("public/static");
        assert_eq!(copy_dir(&src, &dst).unwrap(), 2);
        assert_eq!(fs::read_to_string(dst.join("css/site.css")).unwrap(), "body{}");
        assert!(!dst.join(".DS_Store").exists());
    }

    #[test]
    fn test_copy_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(copy_dir(&dir.path().join("nope"), dir.path()).unwrap(), 0);
    }

    #[test]
    fn test_clean_dir_keeps_root() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("public");
        write_file(&out.join("posts/a/index.html"), b"x").unwrap();
        write_file(&out.join("feed.xml"), b"x").unwrap();

        clean_dir(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);

        clean_dir(&dir.path().join("missing")).unwrap();
    }
}
