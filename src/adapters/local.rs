use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use crate::{
    adapters::{Facade, ReadHandle, WriteHandle},
    model::fs::{FacadeError, FsEntry},
};

const DEFAULT_NAME: &str = "local";

/// [`Facade`] over a directory of the local disk.
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FacadeError> {
        let mut resolved = self.root.clone();
        for component in path.split('/') {
            match component {
                "" | "." => continue,
                ".." => return Err(FacadeError::InvalidPath(path.to_string())),
                c if c.contains('\0') => return Err(FacadeError::InvalidPath(path.to_string())),
                c => resolved.push(c),
            }
        }

        Ok(resolved)
    }

    fn entry(name: String, metadata: &std::fs::Metadata) -> FsEntry {
        FsEntry {
            name,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified_time: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: metadata.is_dir(),
        }
    }
}

#[async_trait]
impl Facade for LocalFs {
    fn name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_NAME.to_string())
    }

    async fn stat(&self, path: &str) -> Result<FsEntry, FacadeError> {
        let resolved = self.resolve(path)?;
        let metadata = fs::metadata(&resolved)
            .await
            .map_err(|err| FacadeError::from_io(path, err))?;

        let name = path
            .rsplit('/')
            .find(|c| !c.is_empty())
            .map(|c| c.to_string())
            .unwrap_or_else(|| self.name());

        Ok(Self::entry(name, &metadata))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FsEntry>, FacadeError> {
        let resolved = self.resolve(path)?;
        let mut dir = fs::read_dir(&resolved)
            .await
            .map_err(|err| FacadeError::from_io(path, err))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| FacadeError::from_io(path, err))?
        {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(name) => {
                    warn!(path = path, name = ?name, "skipping non utf-8 entry");
                    continue;
                }
            };

            // follows symlinks, entries that vanish mid-listing are skipped
            let metadata = match fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(FacadeError::from_io(path, err)),
            };

            entries.push(Self::entry(name, &metadata));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(entries)
    }

    async fn open(&self, path: &str) -> Result<Box<dyn ReadHandle>, FacadeError> {
        let resolved = self.resolve(path)?;
        let file = fs::File::open(&resolved)
            .await
            .map_err(|err| FacadeError::from_io(path, err))?;

        let metadata = file
            .metadata()
            .await
            .map_err(|err| FacadeError::from_io(path, err))?;
        if metadata.is_dir() {
            return Err(FacadeError::IsADirectory(path.to_string()));
        }

        Ok(Box::new(file))
    }

    async fn create(&self, path: &str) -> Result<Box<dyn WriteHandle>, FacadeError> {
        let resolved = self.resolve(path)?;
        if resolved == self.root {
            return Err(FacadeError::InvalidPath(path.to_string()));
        }

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| FacadeError::from_io(path, err))?;
        }

        let file = fs::File::create(&resolved)
            .await
            .map_err(|err| FacadeError::from_io(path, err))?;

        Ok(Box::new(file))
    }

    async fn mkdir_all(&self, path: &str) -> Result<(), FacadeError> {
        let resolved = self.resolve(path)?;
        fs::create_dir_all(&resolved)
            .await
            .map_err(|err| FacadeError::from_io(path, err))
    }

    async fn remove(&self, path: &str) -> Result<(), FacadeError> {
        let resolved = self.resolve(path)?;
        let metadata = fs::symlink_metadata(&resolved)
            .await
            .map_err(|err| FacadeError::from_io(path, err))?;

        let res = if metadata.is_dir() {
            fs::remove_dir(&resolved).await
        } else {
            fs::remove_file(&resolved).await
        };

        res.map_err(|err| FacadeError::from_io(path, err))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), FacadeError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if source == self.root || target == self.root {
            return Err(FacadeError::InvalidPath(to.to_string()));
        }

        fs::rename(&source, &target)
            .await
            .map_err(|err| FacadeError::from_io(to, err))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn setup() -> (tempfile::TempDir, LocalFs) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("folder/subfolder")).unwrap();
        std::fs::write(dir.path().join("file"), b"0123456789").unwrap();
        std::fs::write(dir.path().join("folder/file"), b"abc").unwrap();
        let fs = LocalFs::new(dir.path());
        (dir, fs)
    }

    #[test]
    fn test_name() {
        let cases = vec![
            ("/tmp/data", "data"),
            ("/tmp/data/", "data"),
            ("/", DEFAULT_NAME),
        ];

        for (root, expected) in cases {
            assert_eq!(LocalFs::new(root).name(), expected, "failed for case: {}", root);
        }
    }

    #[test]
    fn test_resolve() {
        let fs = LocalFs::new("/srv");

        let cases = vec![
            ("", Some("/srv")),
            ("file", Some("/srv/file")),
            ("folder/./file", Some("/srv/folder/file")),
            ("../etc", None),
            ("folder/../../etc", None),
        ];

        for (input, expected) in cases {
            let result = fs.resolve(input).ok();
            assert_eq!(
                result,
                expected.map(PathBuf::from),
                "failed for case: {}",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_stat() {
        let (_dir, fs) = setup();

        let file = fs.stat("file").await.unwrap();
        assert_eq!(file.name, "file");
        assert_eq!(file.size, 10);
        assert!(!file.is_dir);

        let folder = fs.stat("folder/subfolder").await.unwrap();
        assert_eq!(folder.name, "subfolder");
        assert!(folder.is_dir);

        assert!(fs.stat("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_read_dir() {
        let (_dir, fs) = setup();

        let entries = fs.read_dir("").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["file", "folder"]);

        let entries = fs.read_dir("folder").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["file", "subfolder"]);

        assert!(matches!(
            fs.read_dir("file").await,
            Err(FacadeError::NotADirectory(_))
        ));
        assert!(matches!(
            fs.read_dir("missing").await,
            Err(FacadeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_and_open() {
        let (_dir, fs) = setup();

        let mut hdl = fs.create("new/nested/file").await.unwrap();
        hdl.write_all(b"hello").await.unwrap();
        hdl.flush().await.unwrap();
        drop(hdl);

        let mut hdl = fs.open("new/nested/file").await.unwrap();
        let mut buf = String::new();
        hdl.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "hello");

        assert!(matches!(
            fs.open("folder").await,
            Err(FacadeError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.create("").await,
            Err(FacadeError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let (dir, fs) = setup();

        assert!(matches!(
            fs.remove("folder").await,
            Err(FacadeError::DirectoryNotEmpty(_))
        ));

        fs.remove("folder/file").await.unwrap();
        fs.remove("folder/subfolder").await.unwrap();
        fs.remove("folder").await.unwrap();
        assert!(!dir.path().join("folder").exists());

        assert!(fs.remove("folder").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rename() {
        let (dir, fs) = setup();

        std::fs::write(dir.path().join("folder/.file.tmp"), b"replaced").unwrap();
        fs.rename("folder/.file.tmp", "folder/file").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("folder/file")).unwrap(), b"replaced");
        assert!(!dir.path().join("folder/.file.tmp").exists());

        assert!(fs.rename("missing", "other").await.unwrap_err().is_not_found());
        assert!(matches!(
            fs.rename("file", "").await,
            Err(FacadeError::InvalidPath(_))
        ));
        assert!(matches!(
            fs.rename("file", "../escape").await,
            Err(FacadeError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_mkdir_all() {
        let (dir, fs) = setup();

        fs.mkdir_all("a/b/c").await.unwrap();
        assert!(dir.path().join("a/b/c").is_dir());

        fs.mkdir_all("a/b/c").await.unwrap();
    }
}
