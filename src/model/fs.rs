use std::time::SystemTime;

/// One entry as reported by a [`crate::adapters::Facade`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEntry {
    pub name: String,
    pub size: u64,
    pub modified_time: SystemTime,
    pub is_dir: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FacadeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FacadeError::NotFound(_))
    }

    /// Classifies an io error raised while touching `path`.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return FacadeError::NotFound(path.to_string());
        }

        match err.raw_os_error() {
            Some(libc::ENOENT) => FacadeError::NotFound(path.to_string()),
            Some(libc::ENOTDIR) => FacadeError::NotADirectory(path.to_string()),
            Some(libc::EISDIR) => FacadeError::IsADirectory(path.to_string()),
            Some(libc::ENOTEMPTY) => FacadeError::DirectoryNotEmpty(path.to_string()),
            _ => FacadeError::Io {
                path: path.to_string(),
                source: err,
            },
        }
    }
}
