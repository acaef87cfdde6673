use std::time::SystemTime;

use crate::{
    adapters::Facade,
    gateway::FsGateway,
    model::s3::{BackendType, BucketInfo, GatewayError, StorageInfo},
};

// The facade has no notion of bucket creation time.
const BUCKET_CREATED: SystemTime = SystemTime::UNIX_EPOCH;

impl<F: Facade> FsGateway<F> {
    pub fn buckets(&self) -> Vec<BucketInfo> {
        vec![BucketInfo {
            name: self.bucket.clone(),
            created: BUCKET_CREATED,
        }]
    }

    /// Reports `bucket` without checking that it exists.
    pub fn bucket_info(&self, bucket: &str) -> BucketInfo {
        BucketInfo {
            name: bucket.to_string(),
            created: BUCKET_CREATED,
        }
    }

    /// Succeeds only for the bucket the gateway already serves.
    pub fn create_bucket(&self, bucket: &str) -> Result<(), GatewayError> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(GatewayError::NotSupported)
        }
    }

    pub fn remove_bucket(&self, _bucket: &str, _force: bool) -> Result<(), GatewayError> {
        Err(GatewayError::NotSupported)
    }

    pub fn storage(&self) -> StorageInfo {
        StorageInfo {
            backend: BackendType::Gateway,
            gateway_online: true,
        }
    }
}
