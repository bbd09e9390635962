//! Object storage upload (S3)
//!
//! Unlike the rest of the pipeline, the uploader does not abort on failure:
//! every client error is logged and reported as `false`, and the calling
//! context turns that into a nonzero exit.

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::Path;
use tracing::{error, info};

/// Upload one local file to a bucket/key
///
/// The key defaults to the file's base name. Credentials and region come
/// from the ambient AWS environment.
pub async fn upload(local_path: &Path, bucket: &str, key: Option<&str>) -> bool {
    let key = match key {
        Some(k) => k.to_string(),
        None => match local_path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                error!("Cannot derive object key from {}", local_path.display());
                return false;
            }
        },
    };

    let data = match tokio::fs::read(local_path).await {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            error!("Failed to read {}: {e}", local_path.display());
            return false;
        }
    };

    let store = match AmazonS3Builder::from_env().with_bucket_name(bucket).build() {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to create S3 client for bucket {bucket}: {e}");
            return false;
        }
    };

    match store.put(&ObjectPath::from(key.as_str()), data.into()).await {
        Ok(_) => {
            info!("Uploaded {} to s3://{bucket}/{key}", local_path.display());
            true
        }
        Err(e) => {
            error!(
                "Failed to upload {} to s3://{bucket}/{key}: {e}",
                local_path.display()
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_missing_file_returns_false() {
        let ok = upload(Path::new("/nonexistent/report.csv"), "bucket", Some("key")).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_upload_root_path_has_no_key() {
        let ok = upload(Path::new("/"), "bucket", None).await;
        assert!(!ok);
    }
}
