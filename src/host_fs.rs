//! Filesystem-backed [`DocumentStore`].
//!
//! The CLI has no editors, so buffer and preview sources are always absent
//! and every document sits in a background view. Engine paths are relative to
//! the vault root, with forward slashes on every platform.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::Mapping;
use walkdir::WalkDir;

use titlesync_core::error::{Result, SyncError};
use titlesync_core::frontmatter;
use titlesync_core::host::{DocumentStore, Notifier, PreviewScan, ViewKind};

pub struct FsHost {
    root: PathBuf,
}

impl FsHost {
    pub fn new(root: PathBuf) -> Self {
        FsHost { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Turn an absolute path under the root into an engine path
    pub fn relativize(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for component in rel.components() {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(out)
    }

    fn read(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.abs(path)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SyncError::DocumentNotFound { path: path.into() },
            _ => SyncError::ReadFailed { path: path.into() },
        })
    }
}

impl DocumentStore for FsHost {
    fn exists(&self, path: &str) -> bool {
        self.abs(path).is_file()
    }

    fn read_cached(&self, path: &str) -> Result<String> {
        // No intermediate cache on a plain filesystem
        self.read(path)
    }

    fn read_fresh(&self, path: &str) -> Result<String> {
        self.read(path)
    }

    fn open_buffer_text(&self, _path: &str) -> Option<String> {
        None
    }

    fn scan_preview_editors(&self, _path: &str) -> PreviewScan {
        PreviewScan::None
    }

    fn view_kind(&self, _path: &str) -> ViewKind {
        ViewKind::Background
    }

    fn list_paths(&self) -> Vec<String> {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.relativize(entry.path()))
            .filter(|path| path.to_lowercase().ends_with(".md"))
            .collect()
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let source = self.abs(old_path);
        let target = self.abs(new_path);
        if !source.is_file() {
            return Err(SyncError::DocumentNotFound {
                path: old_path.into(),
            });
        }
        if target.exists() {
            return Err(SyncError::RenameTargetExists {
                path: new_path.into(),
            });
        }
        fs::rename(source, target)?;
        Ok(())
    }

    fn update_frontmatter(
        &self,
        path: &str,
        mutator: &mut dyn FnMut(&mut Mapping),
    ) -> Result<bool> {
        let content = self.read(path)?;
        match frontmatter::edit(&content, path, |m| mutator(m))? {
            Some(updated) => {
                fs::write(self.abs(path), updated)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn replace_in_buffer(&self, _path: &str, _old: &str, _new: &str) -> Result<bool> {
        // No edit buffers here; the alias always takes the rewrite path
        Ok(false)
    }
}

/// Notifier writing to stderr
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn host() -> (TempDir, FsHost) {
        let dir = TempDir::new().unwrap();
        let host = FsHost::new(dir.path().to_path_buf());
        (dir, host)
    }

    #[test]
    fn lists_only_markdown_relative_paths() {
        let (dir, host) = host();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.md"), "# A\n").unwrap();
        fs::write(dir.path().join("sub/b.md"), "# B\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let mut paths = host.list_paths();
        paths.sort();
        assert_eq!(paths, vec!["a.md".to_string(), "sub/b.md".to_string()]);
    }

    #[test]
    fn rename_refuses_existing_target() {
        let (dir, host) = host();
        fs::write(dir.path().join("a.md"), "# A\n").unwrap();
        fs::write(dir.path().join("b.md"), "# B\n").unwrap();

        let err = host.rename("a.md", "b.md").unwrap_err();
        assert!(matches!(err, SyncError::RenameTargetExists { .. }));
        assert!(host.exists("a.md"));
    }

    #[test]
    fn update_frontmatter_writes_through() {
        let (dir, host) = host();
        fs::write(dir.path().join("a.md"), "# A\n").unwrap();

        let changed = host
            .update_frontmatter("a.md", &mut |mapping| {
                mapping.insert("marker".into(), "x".into());
            })
            .unwrap();
        assert!(changed);
        let content = fs::read_to_string(dir.path().join("a.md")).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("marker: x"));
    }

    #[test]
    fn missing_document_maps_to_not_found() {
        let (_dir, host) = host();
        let err = host.read_fresh("ghost.md").unwrap_err();
        assert!(matches!(err, SyncError::DocumentNotFound { .. }));
    }
}
