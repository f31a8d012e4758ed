//! Service configuration loaded from environment variables
//!
//! Configuration is built once at startup and threaded through the
//! application state; handlers never read the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};

/// Where uploaded thumbnails are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailStorage {
    /// Base64 data URL stored directly in the record
    Inline,
    /// File under the assets root, record stores a relative path
    Filesystem,
}

impl FromStr for ThumbnailStorage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inline" => Ok(ThumbnailStorage::Inline),
            "filesystem" => Ok(ThumbnailStorage::Filesystem),
            other => Err(anyhow!("unknown thumbnail storage strategy: {}", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Secret for validating HS256 bearer tokens
    pub jwt_secret: String,
    /// Bucket new video uploads are written to
    pub s3_bucket: String,
    /// Directory for filesystem-stored thumbnails
    pub assets_root: PathBuf,
    /// Thumbnail storage strategy, fixed at startup
    pub thumbnail_storage: ThumbnailStorage,
    /// Directory for per-request scratch files
    pub scratch_dir: PathBuf,
    /// Address the HTTP server binds to
    pub bind_addr: String,
}

impl AppConfig {
    /// Create a new AppConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: secret for bearer token validation (required)
    /// - `S3_BUCKET`: upload bucket name (required)
    /// - `ASSETS_ROOT`: thumbnail directory (default: `./assets`)
    /// - `THUMBNAIL_STORAGE`: `inline` or `filesystem` (default: `filesystem`)
    /// - `SCRATCH_DIR`: scratch file directory (default: system temp dir)
    /// - `BIND_ADDR`: listen address (default: `0.0.0.0:3001`)
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow!("JWT_SECRET environment variable not set"))?;

        let s3_bucket =
            env::var("S3_BUCKET").map_err(|_| anyhow!("S3_BUCKET environment variable not set"))?;

        let assets_root = env::var("ASSETS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./assets"));

        let thumbnail_storage = env::var("THUMBNAIL_STORAGE")
            .unwrap_or_else(|_| "filesystem".to_string())
            .parse()?;

        let scratch_dir = env::var("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());

        Ok(Self {
            jwt_secret,
            s3_bucket,
            assets_root,
            thumbnail_storage,
            scratch_dir,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "JWT_SECRET",
            "S3_BUCKET",
            "ASSETS_ROOT",
            "THUMBNAIL_STORAGE",
            "SCRATCH_DIR",
            "BIND_ADDR",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_config_requires_secret_and_bucket() {
        clear_env();
        assert!(AppConfig::from_env().is_err());

        unsafe { env::set_var("JWT_SECRET", "secret") };
        assert!(AppConfig::from_env().is_err());

        unsafe { env::set_var("S3_BUCKET", "clips") };
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.s3_bucket, "clips");
        assert_eq!(config.thumbnail_storage, ThumbnailStorage::Filesystem);
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_thumbnail_storage_parsing() {
        assert_eq!(
            "inline".parse::<ThumbnailStorage>().unwrap(),
            ThumbnailStorage::Inline
        );
        assert_eq!(
            "filesystem".parse::<ThumbnailStorage>().unwrap(),
            ThumbnailStorage::Filesystem
        );
        assert!("s3".parse::<ThumbnailStorage>().is_err());
    }
}
