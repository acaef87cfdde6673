use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    adapters::Facade,
    gateway::{object_info, WalkErrorPolicy},
    model::s3::{GatewayError, ObjectInfo},
    util::object::join_key,
};

pub type WalkItem = Result<ObjectInfo, GatewayError>;

/// Depth-first producer feeding leaf objects into a channel.
pub struct Walker<F: Facade> {
    pub facade: Arc<F>,
    pub bucket: String,
    pub policy: WalkErrorPolicy,
    pub ctx: CancellationToken,
    pub results: mpsc::Sender<WalkItem>,
}

impl<F: Facade> Walker<F> {
    /// Walks `prefix` to completion. On failure, cancellation included, the
    /// error is logged and sent as the last item; that send only gives up
    /// once the receiver is gone. The channel closes when `self` is dropped.
    pub async fn run(self, prefix: String) {
        let err = match self.walk_dir(prefix.clone(), true).await {
            Ok(()) => {
                debug!(prefix = %prefix, "walk completed");
                return;
            }
            Err(err) => err,
        };

        if matches!(err, GatewayError::Canceled) {
            warn!(prefix = %prefix, "walk canceled");
        } else {
            error!(error_message=%err, error_group="walk", prefix=%prefix);
        }

        if self.results.send(Err(err)).await.is_err() {
            debug!(prefix = %prefix, "receiver dropped before the walk ended");
        }
    }

    fn walk_dir(&self, dir: String, top: bool) -> BoxFuture<'_, Result<(), GatewayError>> {
        async move {
            if self.ctx.is_cancelled() {
                return Err(GatewayError::Canceled);
            }

            let entries = match self.facade.read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if !top && self.policy == WalkErrorPolicy::SkipSubtree => {
                    warn!(error_message=%err, error_group="read_dir", dir=%dir, "skipping subtree");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            for entry in entries {
                let path = join_key(&dir, &entry.name);

                if entry.is_dir {
                    self.walk_dir(path, false).await?;
                    continue;
                }

                let info = object_info(&self.bucket, &path, &entry);
                tokio::select! {
                    biased;
                    _ = self.ctx.cancelled() => return Err(GatewayError::Canceled),
                    res = self.results.send(Ok(info)) => {
                        if res.is_err() {
                            // receiver dropped
                            return Err(GatewayError::Canceled);
                        }
                    }
                }
            }

            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        adapters::{local::LocalFs, ReadHandle, WriteHandle},
        gateway::{FsGateway, GatewayOptions},
        model::fs::{FacadeError, FsEntry},
    };

    const BUCKET: &str = "bucket";

    /// Local facade whose `read_dir` fails for one directory.
    struct FailingFs {
        inner: LocalFs,
        fail: String,
    }

    #[async_trait]
    impl Facade for FailingFs {
        fn name(&self) -> String {
            self.inner.name()
        }

        async fn stat(&self, path: &str) -> Result<FsEntry, FacadeError> {
            self.inner.stat(path).await
        }

        async fn read_dir(&self, path: &str) -> Result<Vec<FsEntry>, FacadeError> {
            if path == self.fail {
                return Err(FacadeError::Io {
                    path: path.to_string(),
                    source: std::io::Error::other("injected failure"),
                });
            }
            self.inner.read_dir(path).await
        }

        async fn open(&self, path: &str) -> Result<Box<dyn ReadHandle>, FacadeError> {
            self.inner.open(path).await
        }

        async fn create(&self, path: &str) -> Result<Box<dyn WriteHandle>, FacadeError> {
            self.inner.create(path).await
        }

        async fn mkdir_all(&self, path: &str) -> Result<(), FacadeError> {
            self.inner.mkdir_all(path).await
        }

        async fn remove(&self, path: &str) -> Result<(), FacadeError> {
            self.inner.remove(path).await
        }

        async fn rename(&self, from: &str, to: &str) -> Result<(), FacadeError> {
            self.inner.rename(from, to).await
        }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for folder in ["d1/d2/d3", "e", "g"] {
            std::fs::create_dir_all(dir.path().join(folder)).unwrap();
        }
        for file in ["a", "d1/b", "d1/d2/c", "d1/d2/d3/d", "e/f"] {
            std::fs::write(dir.path().join(file), file.as_bytes()).unwrap();
        }
        dir
    }

    fn gateway<F: Facade>(facade: F, walk_errors: WalkErrorPolicy) -> FsGateway<F> {
        FsGateway::new(
            Arc::new(facade),
            GatewayOptions {
                bucket: Some(BUCKET.to_string()),
                walk_errors,
            },
        )
    }

    async fn collect<F: Facade>(
        gw: &FsGateway<F>,
        ctx: &CancellationToken,
        prefix: &str,
    ) -> Vec<WalkItem> {
        let (tx, mut rx) = mpsc::channel(2);
        gw.start_walk(ctx, BUCKET, prefix, tx).unwrap();

        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    fn names(items: &[WalkItem]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .map(|info| info.name.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_walk_completeness() {
        let dir = tree();
        let gw = gateway(LocalFs::new(dir.path()), WalkErrorPolicy::Abort);

        let items = collect(&gw, &CancellationToken::new(), "").await;

        assert!(items.iter().all(|item| item.is_ok()));
        let names = names(&items);
        assert_eq!(names, vec!["a", "d1/b", "d1/d2/c", "d1/d2/d3/d", "e/f"]);

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        for item in &items {
            let info = item.as_ref().unwrap();
            assert_eq!(info.bucket, BUCKET);
            assert!(!info.is_dir);
            assert_eq!(info.size, info.name.len() as u64);
        }
    }

    #[tokio::test]
    async fn test_walk_prefix() {
        let dir = tree();
        let gw = gateway(LocalFs::new(dir.path()), WalkErrorPolicy::Abort);

        let cases = vec![
            ("d1", vec!["d1/b", "d1/d2/c", "d1/d2/d3/d"]),
            ("/d1/d2/", vec!["d1/d2/c", "d1/d2/d3/d"]),
            ("g", vec![]),
        ];

        for (prefix, expected) in cases {
            let items = collect(&gw, &CancellationToken::new(), prefix).await;
            assert_eq!(names(&items), expected, "failed for case: {}", prefix);
            assert!(
                items.iter().all(|item| item.is_ok()),
                "failed for case: {}",
                prefix
            );
        }
    }

    #[tokio::test]
    async fn test_walk_abort_on_error() {
        let dir = tree();
        let facade = FailingFs {
            inner: LocalFs::new(dir.path()),
            fail: "d1/d2".to_string(),
        };
        let gw = gateway(facade, WalkErrorPolicy::Abort);

        let items = collect(&gw, &CancellationToken::new(), "").await;

        assert_eq!(names(&items), vec!["a", "d1/b"]);
        assert!(matches!(
            items.last(),
            Some(Err(GatewayError::Facade(FacadeError::Io { .. })))
        ));
        assert_eq!(items.iter().filter(|item| item.is_err()).count(), 1);
    }

    #[tokio::test]
    async fn test_walk_skip_subtree() {
        let dir = tree();
        let facade = FailingFs {
            inner: LocalFs::new(dir.path()),
            fail: "d1/d2".to_string(),
        };
        let gw = gateway(facade, WalkErrorPolicy::SkipSubtree);

        let items = collect(&gw, &CancellationToken::new(), "").await;

        assert!(items.iter().all(|item| item.is_ok()));
        assert_eq!(names(&items), vec!["a", "d1/b", "e/f"]);
    }

    #[tokio::test]
    async fn test_walk_missing_root() {
        let dir = tree();
        let gw = gateway(LocalFs::new(dir.path()), WalkErrorPolicy::SkipSubtree);

        let items = collect(&gw, &CancellationToken::new(), "missing").await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(GatewayError::Facade(FacadeError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_walk_canceled() {
        let dir = tree();
        let gw = gateway(LocalFs::new(dir.path()), WalkErrorPolicy::Abort);
        let ctx = CancellationToken::new();
        ctx.cancel();

        let items = collect(&gw, &ctx, "").await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(GatewayError::Canceled)));
    }

    #[tokio::test]
    async fn test_walk_canceled_with_full_buffer() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("f{}", i)), b"x").unwrap();
        }
        let gw = gateway(LocalFs::new(dir.path()), WalkErrorPolicy::Abort);
        let ctx = CancellationToken::new();

        let (tx, mut rx) = mpsc::channel(1);
        gw.start_walk(&ctx, BUCKET, "", tx).unwrap();

        let mut items = vec![rx.recv().await.unwrap()];
        // lets the producer fill the buffer and block on the next send
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        ctx.cancel();

        while let Some(item) = rx.recv().await {
            items.push(item);
        }

        assert!(names(&items).len() < 10);
        assert!(matches!(items.last(), Some(Err(GatewayError::Canceled))));
        assert_eq!(items.iter().filter(|item| item.is_err()).count(), 1);
        assert!(items[..items.len() - 1].iter().all(|item| item.is_ok()));
    }

    #[tokio::test]
    async fn test_walk_rejects_before_spawning() {
        let dir = tree();
        let gw = gateway(LocalFs::new(dir.path()), WalkErrorPolicy::Abort);
        let ctx = CancellationToken::new();

        let (tx, mut rx) = mpsc::channel(1);
        assert!(matches!(
            gw.start_walk(&ctx, "other", "", tx),
            Err(GatewayError::BucketNotFound(_))
        ));
        assert!(rx.recv().await.is_none());

        let (tx, mut rx) = mpsc::channel(1);
        assert!(matches!(
            gw.start_walk(&ctx, BUCKET, "../", tx),
            Err(GatewayError::ObjectNameInvalid(_))
        ));
        assert!(rx.recv().await.is_none());
    }
}
