use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, span, Instrument, Level};

use crate::{
    adapters::Facade,
    gateway::{walk::WalkItem, FsGateway},
    model::s3::{
        BucketInfo, CompletePart, DeletedObject, GatewayError, HttpRange, ListMultipartsInfo,
        ListObjectsInfo, ListPartsInfo, MultipartInfo, ObjectInfo, ObjectReader, PartInfo,
        PutOptions, StorageInfo,
    },
};

/// Operations an object-storage protocol server drives.
///
/// Every call takes the request's cancellation token. Multipart uploads are
/// not supported and report [`GatewayError::NotImplemented`].
#[async_trait]
pub trait ObjectLayer: Send + Sync {
    async fn shutdown(&self, ctx: &CancellationToken) -> Result<(), GatewayError>;

    async fn storage_info(&self, ctx: &CancellationToken) -> StorageInfo;

    async fn make_bucket(&self, ctx: &CancellationToken, bucket: &str) -> Result<(), GatewayError>;

    async fn get_bucket_info(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
    ) -> Result<BucketInfo, GatewayError>;

    async fn list_buckets(&self, ctx: &CancellationToken) -> Result<Vec<BucketInfo>, GatewayError>;

    async fn delete_bucket(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        force: bool,
    ) -> Result<(), GatewayError>;

    async fn list_objects(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i32,
    ) -> Result<ListObjectsInfo, GatewayError>;

    /// Starts a recursive walk of `prefix` and returns immediately. Leaf
    /// objects arrive on `results`; a failed walk ends with one `Err` item.
    /// The channel closes when the walk is over.
    async fn walk(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        prefix: &str,
        results: mpsc::Sender<WalkItem>,
    ) -> Result<(), GatewayError>;

    async fn get_object_info(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectInfo, GatewayError>;

    async fn get_object_reader(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        range: Option<HttpRange>,
    ) -> Result<ObjectReader, GatewayError>;

    async fn get_object(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        range: Option<HttpRange>,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, GatewayError>;

    async fn put_object(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
        opts: &PutOptions,
    ) -> Result<ObjectInfo, GatewayError>;

    async fn delete_object(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectInfo, GatewayError>;

    /// One outcome per key, in input order.
    async fn delete_objects(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        keys: &[String],
    ) -> Vec<Result<DeletedObject, GatewayError>>;

    async fn list_multipart_uploads(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        prefix: &str,
        key_marker: &str,
        upload_id_marker: &str,
        delimiter: &str,
        max_uploads: i32,
    ) -> Result<ListMultipartsInfo, GatewayError>;

    async fn new_multipart_upload(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
    ) -> Result<String, GatewayError>;

    async fn put_object_part(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_id: u32,
        data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<PartInfo, GatewayError>;

    async fn get_multipart_info(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<MultipartInfo, GatewayError>;

    async fn list_object_parts(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: i32,
    ) -> Result<ListPartsInfo, GatewayError>;

    async fn abort_multipart_upload(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), GatewayError>;

    async fn complete_multipart_upload(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletePart],
    ) -> Result<ObjectInfo, GatewayError>;
}

fn not_implemented(op: &'static str, bucket: &str, key: &str) -> GatewayError {
    let span = span!(Level::INFO, "multipart", context = op);
    let _e = span.enter();
    info!(bucket = bucket, key = key, "called");

    GatewayError::NotImplemented(op)
}

#[async_trait]
impl<F: Facade> ObjectLayer for FsGateway<F> {
    async fn shutdown(&self, _ctx: &CancellationToken) -> Result<(), GatewayError> {
        let span = span!(Level::INFO, "shutdown", context = "shutdown");
        let _e = span.enter();
        info!("called");

        Ok(())
    }

    async fn storage_info(&self, _ctx: &CancellationToken) -> StorageInfo {
        let span = span!(Level::INFO, "storage_info", context = "storage_info");
        let _e = span.enter();
        info!("called");

        self.storage()
    }

    async fn make_bucket(&self, _ctx: &CancellationToken, bucket: &str) -> Result<(), GatewayError> {
        let span = span!(Level::INFO, "make_bucket", context = "make_bucket");
        let _e = span.enter();
        info!(bucket = bucket, "called");

        self.create_bucket(bucket)
    }

    async fn get_bucket_info(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
    ) -> Result<BucketInfo, GatewayError> {
        let span = span!(Level::INFO, "get_bucket_info", context = "get_bucket_info");
        let _e = span.enter();
        info!(bucket = bucket, "called");

        Ok(self.bucket_info(bucket))
    }

    async fn list_buckets(&self, _ctx: &CancellationToken) -> Result<Vec<BucketInfo>, GatewayError> {
        let span = span!(Level::INFO, "list_buckets", context = "list_buckets");
        let _e = span.enter();
        info!("called");

        Ok(self.buckets())
    }

    async fn delete_bucket(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        force: bool,
    ) -> Result<(), GatewayError> {
        let span = span!(Level::INFO, "delete_bucket", context = "delete_bucket");
        let _e = span.enter();
        info!(bucket = bucket, force = force, "called");

        self.remove_bucket(bucket, force)
    }

    async fn list_objects(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i32,
    ) -> Result<ListObjectsInfo, GatewayError> {
        let span = span!(Level::INFO, "list_objects", context = "list_objects");
        self.list_dir(bucket, prefix, marker, delimiter, max_keys)
            .instrument(span)
            .await
    }

    async fn walk(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        prefix: &str,
        results: mpsc::Sender<WalkItem>,
    ) -> Result<(), GatewayError> {
        let span = span!(Level::INFO, "walk", context = "walk");
        span.in_scope(|| self.start_walk(ctx, bucket, prefix, results))
    }

    async fn get_object_info(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectInfo, GatewayError> {
        let span = span!(Level::INFO, "get_object_info", context = "get_object_info");
        self.stat_object(bucket, key).instrument(span).await
    }

    async fn get_object_reader(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        range: Option<HttpRange>,
    ) -> Result<ObjectReader, GatewayError> {
        let span = span!(Level::INFO, "get_object_reader", context = "get_object_reader", range = ?range);
        self.open_object(bucket, key, range).instrument(span).await
    }

    async fn get_object(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        range: Option<HttpRange>,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, GatewayError> {
        let span = span!(Level::INFO, "get_object", context = "get_object", range = ?range);
        self.read_object(ctx, bucket, key, range, writer)
            .instrument(span)
            .await
    }

    async fn put_object(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        data: &mut (dyn AsyncRead + Send + Unpin),
        opts: &PutOptions,
    ) -> Result<ObjectInfo, GatewayError> {
        let span = span!(Level::INFO, "put_object", context = "put_object");
        self.write_object(ctx, bucket, key, data, opts)
            .instrument(span)
            .await
    }

    async fn delete_object(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectInfo, GatewayError> {
        let span = span!(Level::INFO, "delete_object", context = "delete_object");
        self.remove_object(bucket, key).instrument(span).await
    }

    async fn delete_objects(
        &self,
        ctx: &CancellationToken,
        bucket: &str,
        keys: &[String],
    ) -> Vec<Result<DeletedObject, GatewayError>> {
        let span = span!(Level::INFO, "delete_objects", context = "delete_objects", count = keys.len());
        self.remove_objects(ctx, bucket, keys).instrument(span).await
    }

    async fn list_multipart_uploads(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        prefix: &str,
        _key_marker: &str,
        _upload_id_marker: &str,
        _delimiter: &str,
        _max_uploads: i32,
    ) -> Result<ListMultipartsInfo, GatewayError> {
        Err(not_implemented("list_multipart_uploads", bucket, prefix))
    }

    async fn new_multipart_upload(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
    ) -> Result<String, GatewayError> {
        Err(not_implemented("new_multipart_upload", bucket, key))
    }

    async fn put_object_part(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        _upload_id: &str,
        _part_id: u32,
        _data: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<PartInfo, GatewayError> {
        Err(not_implemented("put_object_part", bucket, key))
    }

    async fn get_multipart_info(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        _upload_id: &str,
    ) -> Result<MultipartInfo, GatewayError> {
        Err(not_implemented("get_multipart_info", bucket, key))
    }

    async fn list_object_parts(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        _upload_id: &str,
        _part_number_marker: u32,
        _max_parts: i32,
    ) -> Result<ListPartsInfo, GatewayError> {
        Err(not_implemented("list_object_parts", bucket, key))
    }

    async fn abort_multipart_upload(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        _upload_id: &str,
    ) -> Result<(), GatewayError> {
        Err(not_implemented("abort_multipart_upload", bucket, key))
    }

    async fn complete_multipart_upload(
        &self,
        _ctx: &CancellationToken,
        bucket: &str,
        key: &str,
        _upload_id: &str,
        _parts: &[CompletePart],
    ) -> Result<ObjectInfo, GatewayError> {
        Err(not_implemented("complete_multipart_upload", bucket, key))
    }
}
