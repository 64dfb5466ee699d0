//! Filesystem capability backed by local directories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::capability::{FileInfo, FileSystem};
use crate::error::CapabilityError;
use crate::filename;
use crate::request::Directory;

/// Maps each `Directory` to a folder under a root, overridable per directory
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    overrides: HashMap<Directory, PathBuf>,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_directory(mut self, directory: Directory, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(directory, path.into());
        self
    }

    pub fn directory_path(&self, directory: Directory) -> PathBuf {
        self.overrides
            .get(&directory)
            .cloned()
            .unwrap_or_else(|| self.root.join(directory.as_str()))
    }

    fn file_path(&self, name: &str, directory: Directory) -> Result<PathBuf, CapabilityError> {
        let safe = filename::sanitize(name);
        if safe != name.trim() {
            return Err(CapabilityError::new(format!("Invalid file name: {}", name)));
        }
        Ok(self.directory_path(directory).join(safe))
    }
}

async fn file_info(path: &Path) -> Result<FileInfo, CapabilityError> {
    let metadata = tokio::fs::metadata(path).await?;
    let modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(FileInfo {
        name,
        size: metadata.len(),
        modified_at,
        uri: path.to_string_lossy().to_string(),
    })
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn write_file(
        &self,
        name: &str,
        data: &[u8],
        directory: Directory,
    ) -> Result<String, CapabilityError> {
        let path = self.file_path(name, directory)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;

        Ok(path.to_string_lossy().to_string())
    }

    async fn read_dir(&self, directory: Directory) -> Result<Vec<FileInfo>, CapabilityError> {
        let dir = self.directory_path(directory);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(file_info(&entry.path()).await?);
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(files)
    }

    async fn delete_file(&self, name: &str, directory: Directory) -> Result<(), CapabilityError> {
        let path = self.file_path(name, directory)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    async fn stat(
        &self,
        name: &str,
        directory: Directory,
    ) -> Result<Option<FileInfo>, CapabilityError> {
        let path = self.file_path(name, directory)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(Some(file_info(&path).await?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_list_stat_delete() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());

        let uri = fs
            .write_file("a.txt", b"hello", Directory::Documents)
            .await
            .unwrap();
        assert!(uri.ends_with("a.txt"));
        fs.write_file("b.txt", b"hi", Directory::Documents).await.unwrap();

        let files = fs.read_dir(Directory::Documents).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let info = fs.stat("a.txt", Directory::Documents).await.unwrap().unwrap();
        assert_eq!(info.size, 5);

        fs.delete_file("a.txt", Directory::Documents).await.unwrap();
        assert!(fs.stat("a.txt", Directory::Documents).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        assert!(fs.read_dir(Directory::Cache).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new(dir.path());
        assert!(fs
            .write_file("../escape.txt", b"x", Directory::Documents)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("Downloads");
        let fs = LocalFileSystem::new(dir.path()).with_directory(Directory::Downloads, &downloads);

        fs.write_file("x.bin", &[1, 2, 3], Directory::Downloads)
            .await
            .unwrap();
        assert!(downloads.join("x.bin").exists());
    }
}
