use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::model::fs::{FacadeError, FsEntry};

pub mod local;

/// Readable, seekable handle returned by [`Facade::open`].
pub trait ReadHandle: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> ReadHandle for T {}

/// Writable handle returned by [`Facade::create`]. Data is durable once
/// `flush` has returned.
pub trait WriteHandle: AsyncWrite + Send + Unpin {}

impl<T: AsyncWrite + Send + Unpin> WriteHandle for T {}

/// Filesystem access the gateway is built on. Paths are relative,
/// `/`-separated and already normalized; `""` is the root.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait Facade: Send + Sync + 'static {
    /// Name of the filesystem root, exposed as the bucket name.
    fn name(&self) -> String;

    async fn stat(&self, path: &str) -> Result<FsEntry, FacadeError>;

    /// Lists one directory level in a stable order.
    async fn read_dir(&self, path: &str) -> Result<Vec<FsEntry>, FacadeError>;

    async fn open(&self, path: &str) -> Result<Box<dyn ReadHandle>, FacadeError>;

    /// Creates or truncates the file at `path`, creating missing parents.
    async fn create(&self, path: &str) -> Result<Box<dyn WriteHandle>, FacadeError>;

    async fn mkdir_all(&self, path: &str) -> Result<(), FacadeError>;

    /// Removes a file or an empty directory.
    async fn remove(&self, path: &str) -> Result<(), FacadeError>;

    /// Moves the file at `from` to `to`, replacing any file at `to`.
    async fn rename(&self, from: &str, to: &str) -> Result<(), FacadeError>;
}
