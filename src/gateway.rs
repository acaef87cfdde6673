use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::{
    adapters::Facade,
    model::{
        fs::FsEntry,
        s3::{GatewayError, ListObjectsInfo, ObjectInfo, MAX_OBJECT_LIST, SLASH_SEPARATOR},
    },
    util::object::join_key,
};

pub mod bucket;
pub mod objects;
pub mod walk;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// What the walk producer does when a subdirectory cannot be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WalkErrorPolicy {
    /// Stop the walk and deliver the error as the final item.
    #[default]
    Abort,
    /// Log the failure and continue with the remaining entries.
    SkipSubtree,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayOptions {
    /// Overrides the bucket name derived from the facade.
    pub bucket: Option<String>,
    pub walk_errors: WalkErrorPolicy,
}

/// Object layer over a single [`Facade`]. The facade root is the only
/// bucket.
pub struct FsGateway<F: Facade> {
    pub facade: Arc<F>,
    pub bucket: String,
    pub options: GatewayOptions,
}

impl<F: Facade> FsGateway<F> {
    pub fn new(facade: Arc<F>, options: GatewayOptions) -> Self {
        let bucket = options.bucket.clone().unwrap_or_else(|| facade.name());

        Self {
            facade,
            bucket,
            options,
        }
    }

    pub fn check_bucket(&self, bucket: &str) -> Result<(), GatewayError> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(GatewayError::BucketNotFound(bucket.to_string()))
        }
    }
}

pub fn object_info(bucket: &str, name: &str, entry: &FsEntry) -> ObjectInfo {
    ObjectInfo {
        bucket: bucket.to_string(),
        name: name.to_string(),
        modified_time: entry.modified_time,
        size: if entry.is_dir { 0 } else { entry.size },
        is_dir: entry.is_dir,
        etag: None,
    }
}

enum Listed {
    Object(ObjectInfo),
    Prefix(String),
}

/// Turns one directory level into a listing page.
///
/// With a `/` delimiter directories fold into common prefixes. Keys are
/// ordered lexicographically, those not after `marker` are skipped and at
/// most `max_keys` are kept (`< 0` means the maximum).
pub fn build_listing(
    bucket: &str,
    dir: &str,
    entries: &[FsEntry],
    marker: &str,
    delimiter: &str,
    max_keys: i32,
) -> ListObjectsInfo {
    let max_keys = if max_keys < 0 {
        MAX_OBJECT_LIST
    } else {
        (max_keys as usize).min(MAX_OBJECT_LIST)
    };

    let mut result = ListObjectsInfo::default();
    if max_keys == 0 {
        return result;
    }

    let mut candidates: Vec<(String, Listed)> = entries
        .iter()
        .map(|entry| {
            let info = object_info(bucket, &join_key(dir, &entry.name), entry);
            if info.is_dir && delimiter == SLASH_SEPARATOR {
                let prefix = format!("{}{}", info.name, SLASH_SEPARATOR);
                (prefix.clone(), Listed::Prefix(prefix))
            } else {
                (info.name.clone(), Listed::Object(info))
            }
        })
        .filter(|(key, _)| key.as_str() > marker)
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    result.is_truncated = candidates.len() > max_keys;

    let mut last = None;
    for (key, listed) in candidates.into_iter().take(max_keys) {
        match listed {
            Listed::Object(info) => result.objects.push(info),
            Listed::Prefix(prefix) => result.prefixes.push(prefix),
        }
        last = Some(key);
    }

    if result.is_truncated {
        result.next_marker = last;
    }

    result
}

/// Copies `reader` into `writer` until EOF or until `ctx` is canceled.
pub async fn copy_with_cancel<R, W>(
    ctx: &CancellationToken,
    reader: &mut R,
    writer: &mut W,
) -> Result<u64, GatewayError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let copied = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Err(GatewayError::Canceled),
        res = tokio::io::copy(&mut *reader, &mut *writer) => res?,
    };
    writer.flush().await?;

    Ok(copied)
}

/// Streams `data` into `hdl`, returning the byte count and the MD5 of the
/// body as lowercase hex. `hdl` is flushed before returning.
pub async fn write_body<R, W>(
    ctx: &CancellationToken,
    data: &mut R,
    hdl: &mut W,
) -> Result<(u64, String), GatewayError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut digest = md5::Context::new();
    let mut written = 0u64;

    loop {
        let n = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(GatewayError::Canceled),
            res = data.read(&mut buf) => res?,
        };
        if n == 0 {
            break;
        }

        digest.consume(&buf[..n]);
        hdl.write_all(&buf[..n]).await?;
        written += n as u64;
    }

    hdl.flush().await?;

    Ok((written, format!("{:x}", digest.compute())))
}
