use std::{
    io::SeekFrom,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, span, warn, Instrument, Level};

use crate::{
    adapters::Facade,
    gateway::{
        build_listing, copy_with_cancel, object_info,
        walk::{WalkItem, Walker},
        write_body, FsGateway,
    },
    model::{
        fs::{FacadeError, FsEntry},
        s3::{
            DeletedObject, GatewayError, HttpRange, ListObjectsInfo, ObjectInfo, ObjectReader,
            PutOptions,
        },
    },
    util::object::{clean_key, is_dir_key, staging_key},
};

// Uploads are written next to their key and renamed into place.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

impl<F: Facade> FsGateway<F> {
    fn object_error(&self, bucket: &str, key: &str, err: FacadeError) -> GatewayError {
        if err.is_not_found() {
            GatewayError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
        } else {
            err.into()
        }
    }

    fn writable_key(&self, bucket: &str, key: &str) -> Result<String, GatewayError> {
        self.check_bucket(bucket)?;

        let path = clean_key(key)?;
        if path.is_empty() {
            return Err(GatewayError::ObjectNameInvalid(key.to_string()));
        }

        Ok(path)
    }

    async fn discard(&self, path: &str) {
        if let Err(err) = self.facade.remove(path).await {
            warn!(error_message=%err, error_group="remove", key=path, "failed to discard partial object");
        }
    }

    async fn stat_written(&self, path: &str, key: &str) -> Result<FsEntry, GatewayError> {
        self.facade.stat(path).await.map_err(|err| {
            error!(error_message=%err, error_group="stat", key=key);
            err.into()
        })
    }

    /// Lists exactly one directory level; `prefix` names the directory.
    pub async fn list_dir(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i32,
    ) -> Result<ListObjectsInfo, GatewayError> {
        info!(
            bucket = bucket,
            prefix = prefix,
            marker = marker,
            delimiter = delimiter,
            max_keys = max_keys,
            "called"
        );

        self.check_bucket(bucket)?;
        let dir = clean_key(prefix)?;

        let entries = self.facade.read_dir(&dir).await.map_err(|err| {
            error!(error_message=%err, error_group="read_dir", prefix=prefix);
            err
        })?;

        Ok(build_listing(
            bucket, &dir, &entries, marker, delimiter, max_keys,
        ))
    }

    pub async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, GatewayError> {
        info!(bucket = bucket, key = key, "called");

        self.check_bucket(bucket)?;
        let path = clean_key(key)?;

        match self.facade.stat(&path).await {
            Ok(entry) => Ok(object_info(bucket, &path, &entry)),
            Err(err) => {
                error!(error_message=%err, error_group="stat", key=key);
                Err(self.object_error(bucket, key, err))
            }
        }
    }

    /// Opens `key` positioned at the start of `range`. Directories read as
    /// empty.
    pub async fn open_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<HttpRange>,
    ) -> Result<ObjectReader, GatewayError> {
        let info = self.stat_object(bucket, key).await?;

        if info.is_dir {
            return Ok(ObjectReader {
                info,
                reader: Box::new(tokio::io::empty()),
            });
        }

        let (offset, length) = match range {
            Some(range) => range.resolve(info.size)?,
            None => (0, info.size),
        };

        let mut hdl = self.facade.open(&info.name).await.map_err(|err| {
            error!(error_message=%err, error_group="open", key=key);
            self.object_error(bucket, key, err)
        })?;

        if offset > 0 {
            hdl.seek(SeekFrom::Start(offset)).await?;
        }

        Ok(ObjectReader {
            info,
            reader: Box::new(hdl.take(length)),
        })
    }

    /// Copies the object (or `range` of it) into `writer`, returning the
    /// number of bytes written.
    pub async fn read_object(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        range: Option<HttpRange>,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, GatewayError> {
        let mut object = self.open_object(bucket, key, range).await?;

        copy_with_cancel(ctx, &mut object.reader, writer)
            .await
            .map_err(|err| {
                error!(error_message=%err, error_group="copy", key=key);
                err
            })
    }

    pub async fn write_object(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
        opts: &PutOptions,
    ) -> Result<ObjectInfo, GatewayError> {
        info!(bucket = bucket, key = key, md5 = ?opts.md5_hex, "called");

        let path = self.writable_key(bucket, key)?;

        if is_dir_key(key) {
            let mut probe = [0u8; 1];
            if data.read(&mut probe).await? > 0 {
                return Err(GatewayError::ObjectNameInvalid(key.to_string()));
            }

            self.facade.mkdir_all(&path).await.map_err(|err| {
                error!(error_message=%err, error_group="mkdir", key=key);
                err
            })?;

            let entry = self.stat_written(&path, key).await?;
            return Ok(object_info(bucket, &path, &entry));
        }

        let staging = staging_key(&path, STAGING_SEQ.fetch_add(1, Ordering::Relaxed));

        let mut hdl = self.facade.create(&staging).await.map_err(|err| {
            error!(error_message=%err, error_group="create", key=key);
            err
        })?;

        let res = write_body(ctx, data, &mut hdl).await;
        drop(hdl);

        let (size, etag) = match res {
            Ok(written) => written,
            Err(err) => {
                error!(error_message=%err, error_group="write", key=key);
                self.discard(&staging).await;
                return Err(err);
            }
        };

        if let Some(expected) = &opts.md5_hex {
            if !expected.eq_ignore_ascii_case(&etag) {
                self.discard(&staging).await;
                return Err(GatewayError::BadDigest {
                    expected: expected.clone(),
                    computed: etag,
                });
            }
        }

        if let Err(err) = self.facade.rename(&staging, &path).await {
            error!(error_message=%err, error_group="rename", key=key);
            self.discard(&staging).await;
            return Err(err.into());
        }

        let entry = self.stat_written(&path, key).await?;

        Ok(ObjectInfo {
            size,
            etag: Some(etag),
            ..object_info(bucket, &path, &entry)
        })
    }

    pub async fn remove_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, GatewayError> {
        info!(bucket = bucket, key = key, "called");

        let path = self.writable_key(bucket, key)?;

        let entry = self.facade.stat(&path).await.map_err(|err| {
            error!(error_message=%err, error_group="stat", key=key);
            self.object_error(bucket, key, err)
        })?;

        self.facade.remove(&path).await.map_err(|err| {
            error!(error_message=%err, error_group="remove", key=key);
            self.object_error(bucket, key, err)
        })?;

        Ok(object_info(bucket, &path, &entry))
    }

    /// Deletes `keys` one after another. The result holds one outcome per
    /// key, in input order.
    pub async fn remove_objects(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        keys: &[String],
    ) -> Vec<Result<DeletedObject, GatewayError>> {
        let mut results = Vec::with_capacity(keys.len());

        for key in keys {
            if ctx.is_cancelled() {
                results.push(Err(GatewayError::Canceled));
                continue;
            }

            let res = self
                .remove_object(bucket, key)
                .await
                .map(|_| DeletedObject {
                    object_name: key.clone(),
                });
            results.push(res);
        }

        results
    }

    /// Spawns the walk producer and returns without waiting for it.
    pub fn start_walk(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        prefix: &str,
        results: mpsc::Sender<WalkItem>,
    ) -> Result<(), GatewayError> {
        info!(bucket = bucket, prefix = prefix, "called");

        self.check_bucket(bucket)?;
        let dir = clean_key(prefix)?;

        let walker = Walker {
            facade: self.facade.clone(),
            bucket: bucket.to_string(),
            policy: self.options.walk_errors,
            ctx: ctx.clone(),
            results,
        };

        let span = span!(Level::INFO, "walk_producer", context = "walk", prefix = %dir);
        tokio::spawn(walker.run(dir).instrument(span));

        Ok(())
    }
}
