//! Object storage for uploaded videos
//!
//! Wraps the S3 client for the two operations the service needs: uploading a
//! remuxed file under a derived key, and expanding a persisted locator into a
//! short-lived presigned GET URL at read time.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::locator::VideoLocator;
use crate::models::Video;

/// Validity window of signed video URLs
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct VideoStore {
    client: Client,
    bucket: String,
}

impl VideoStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Bucket new uploads are written to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a local file under the given key
    pub async fn put_video(&self, key: &str, content_type: &str, path: &Path) -> Result<()> {
        info!("Uploading {} to s3://{}/{}", path.display(), self.bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .context("failed to open upload body")?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .context("failed to put object to S3")?;

        Ok(())
    }

    /// Generate a presigned, time-boxed GET URL for a stored object
    pub async fn presign_get(&self, locator: &VideoLocator, ttl: Duration) -> Result<String> {
        let presigning_config = PresigningConfig::builder()
            .expires_in(ttl)
            .build()
            .context("failed to build presigning config")?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(locator.bucket())
            .key(locator.key())
            .presigned(presigning_config)
            .await
            .context("failed to generate presigned URL")?;

        Ok(presigned_request.uri().to_string())
    }

    /// Substitute a record's persisted locator with a signed fetch URL.
    ///
    /// A record without a video attached is returned unchanged. This is a
    /// read-time transform; it never touches persisted state.
    pub async fn resolve_video_url(&self, mut video: Video) -> Result<Video> {
        let Some(raw) = video.video_url.as_deref() else {
            return Ok(video);
        };

        let locator = VideoLocator::decode(raw)?;
        let signed = self.presign_get(&locator, SIGNED_URL_TTL).await?;

        video.video_url = Some(signed);
        Ok(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{Credentials, Region};
    use chrono::Utc;
    use uuid::Uuid;

    // Presigning is local request signing; no network involved.
    fn test_store() -> VideoStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .region(Region::new("us-east-1"))
            .build();
        VideoStore::new(Client::from_conf(config), "clips".to_string())
    }

    fn test_video(video_url: Option<String>) -> Video {
        Video {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            title: "a title".to_string(),
            description: "a description".to_string(),
            user_id: Uuid::new_v4(),
            thumbnail_url: None,
            video_url,
        }
    }

    #[tokio::test]
    async fn test_resolve_without_locator_is_unchanged() {
        let store = test_store();
        let video = store.resolve_video_url(test_video(None)).await.unwrap();
        assert_eq!(video.video_url, None);
    }

    #[tokio::test]
    async fn test_resolve_substitutes_signed_url() {
        let store = test_store();
        let video = test_video(Some("clips,landscape/abc.mp4".to_string()));

        let resolved = store.resolve_video_url(video).await.unwrap();
        let url = resolved.video_url.unwrap();

        assert!(url.contains("landscape/abc.mp4"));
        assert!(url.contains("clips"));
        assert!(url.contains("X-Amz-Expires=600"));
    }

    #[tokio::test]
    async fn test_repeated_resolve_targets_same_object() {
        let store = test_store();
        let stored = test_video(Some("clips,landscape/abc.mp4".to_string()));

        let first = store.resolve_video_url(stored.clone()).await.unwrap();
        let second = store.resolve_video_url(stored.clone()).await.unwrap();

        // Each expansion signs anew, but both URLs resolve to the same
        // bucket and key, and the stored record keeps the opaque locator.
        for resolved in [&first, &second] {
            let url = resolved.video_url.as_deref().unwrap();
            assert!(url.contains("clips"));
            assert!(url.contains("landscape/abc.mp4"));
            assert!(url.contains("X-Amz-Signature="));
        }
        assert_eq!(
            stored.video_url.as_deref(),
            Some("clips,landscape/abc.mp4")
        );
    }

    #[tokio::test]
    async fn test_resolve_malformed_locator_fails() {
        let store = test_store();
        let video = test_video(Some("not-a-locator".to_string()));
        assert!(store.resolve_video_url(video).await.is_err());
    }
}
