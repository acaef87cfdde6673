use std::time::SystemTime;

use tokio::io::AsyncRead;

use crate::model::fs::FacadeError;

pub const SLASH_SEPARATOR: &str = "/";

/// Upper bound on keys returned by a single listing call.
pub const MAX_OBJECT_LIST: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    pub created: SystemTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub bucket: String,
    pub name: String,
    pub modified_time: SystemTime,
    pub size: u64,
    pub is_dir: bool,
    pub etag: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListObjectsInfo {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedObject {
    pub object_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendType {
    Gateway,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageInfo {
    pub backend: BackendType,
    pub gateway_online: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// Expected MD5 of the body, lowercase hex.
    pub md5_hex: Option<String>,
}

/// Streamed object body returned by `get_object_reader`.
pub struct ObjectReader {
    pub info: ObjectInfo,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// A single byte range as carried by an HTTP `Range` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpRange {
    FromTo { start: u64, end: Option<u64> },
    Suffix(u64),
}

impl HttpRange {
    /// Resolves the range against an object of `size` bytes into
    /// `(offset, length)`.
    pub fn resolve(&self, size: u64) -> Result<(u64, u64), GatewayError> {
        match *self {
            HttpRange::FromTo { start, end } => {
                if start >= size {
                    return Err(GatewayError::InvalidRange(format!(
                        "start {} beyond object size {}",
                        start, size
                    )));
                }

                let last = match end {
                    Some(end) if end < start => {
                        return Err(GatewayError::InvalidRange(format!(
                            "end {} before start {}",
                            end, start
                        )));
                    }
                    Some(end) => end.min(size - 1),
                    None => size - 1,
                };

                Ok((start, last - start + 1))
            }
            HttpRange::Suffix(0) => Err(GatewayError::InvalidRange(
                "zero length suffix".to_string(),
            )),
            HttpRange::Suffix(len) => {
                let len = len.min(size);
                Ok((size - len, len))
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListMultipartsInfo {
    pub key_marker: String,
    pub upload_id_marker: String,
    pub max_uploads: usize,
    pub uploads: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartInfo {
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartInfo {
    pub bucket: String,
    pub object: String,
    pub upload_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPartsInfo {
    pub parts: Vec<PartInfo>,
    pub is_truncated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletePart {
    pub part_number: u32,
    pub etag: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("not supported")]
    NotSupported,

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("invalid object name: {0}")]
    ObjectNameInvalid(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("bad digest: expected {expected}, computed {computed}")]
    BadDigest { expected: String, computed: String },

    #[error("operation canceled")]
    Canceled,

    #[error(transparent)]
    Facade(#[from] FacadeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        match self {
            GatewayError::ObjectNotFound { .. } | GatewayError::BucketNotFound(_) => true,
            GatewayError::Facade(err) => err.is_not_found(),
            _ => false,
        }
    }
}
