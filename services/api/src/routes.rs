//! API service routes and upload handlers

use std::error::Error as _;
use std::io;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Extension, Multipart, Path, State},
    http::{HeaderMap, header},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use futures::TryStreamExt;
use rand::RngCore;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::ThumbnailStorage,
    error::{ApiError, ApiResult},
    locator::VideoLocator,
    middleware::{AuthUser, auth_middleware},
    models::Video,
    processing::AspectRatio,
    state::AppState,
};

/// Only accepted content type for video uploads, matched exactly
const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Multipart field carrying the thumbnail image
const THUMBNAIL_FIELD: &str = "thumbnail";

/// Transport-layer cap on video upload bodies (1 GiB)
const VIDEO_UPLOAD_LIMIT: usize = 1 << 30;

/// Transport-layer cap on thumbnail multipart bodies (10 MiB)
const THUMBNAIL_UPLOAD_LIMIT: usize = 10 << 20;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/videos/:video_id", get(get_video))
        .route(
            "/videos/:video_id/thumbnail",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(THUMBNAIL_UPLOAD_LIMIT)),
        )
        .route(
            "/videos/:video_id/video",
            put(upload_video).layer(DefaultBodyLimit::max(VIDEO_UPLOAD_LIMIT)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "clipstream-api"
    }))
}

/// Get a video by ID, with its locator expanded into a signed URL
pub async fn get_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_video_id(&video_id)?;
    let video = fetch_owned_video(&state, video_id, &user).await?;

    let video = state
        .store
        .resolve_video_url(video)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(video))
}

/// Upload a thumbnail image for a video
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_video_id(&video_id)?;
    let mut video = fetch_owned_video(&state, video_id, &user).await?;

    info!("Uploading thumbnail for video {} by user {}", video_id, user.id);

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Error parsing multipart form: {}", e)))?
    {
        if field.name() == Some(THUMBNAIL_FIELD) {
            let content_type = field
                .content_type()
                .ok_or_else(|| {
                    ApiError::BadRequest("Thumbnail field has no content type".to_string())
                })?
                .to_string();

            let data = field.bytes().await.map_err(|e| {
                ApiError::BadRequest(format!("Error reading thumbnail: {}", e))
            })?;

            upload = Some((content_type, data));
            break;
        }
    }

    let (content_type, data) = upload.ok_or_else(|| {
        ApiError::BadRequest(format!("Missing multipart field '{}'", THUMBNAIL_FIELD))
    })?;

    let reference = match state.config.thumbnail_storage {
        ThumbnailStorage::Inline => inline_thumbnail(&content_type, &data),
        ThumbnailStorage::Filesystem => {
            let ext = thumbnail_extension(&content_type)?;
            let filename = format!("{}.{}", video_id, ext);
            tokio::fs::write(state.config.assets_root.join(&filename), &data)
                .await
                .map_err(|e| ApiError::Internal(e.into()))?;
            format!("/assets/{}", filename)
        }
    };

    video.thumbnail_url = Some(reference);
    state.video_repository.update(&video).await?;

    Ok(Json(video))
}

/// Upload a video file: probe its aspect ratio, remux it for progressive
/// playback, store it, and persist the resulting locator.
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_video_id(&video_id)?;
    let mut video = fetch_owned_video(&state, video_id, &user).await?;

    let content_type = require_video_content_type(&headers)?;

    info!("Uploading video {} for user {}", video_id, user.id);

    // Scratch file is removed on drop, on every exit path.
    let scratch = tempfile::Builder::new()
        .prefix("clipstream-upload-")
        .suffix(".mp4")
        .tempfile_in(&state.config.scratch_dir)
        .map_err(|e| ApiError::Internal(e.into()))?;

    stream_body_to_file(body, scratch.path()).await?;

    let classification = state
        .processor
        .aspect_ratio(scratch.path())
        .await
        .map_err(ApiError::Internal)?
        .unwrap_or(AspectRatio::Other);

    // Remuxed sibling file is also removed on drop.
    let remuxed = state
        .processor
        .remux_for_fast_start(scratch.path())
        .await
        .map_err(ApiError::Internal)?;

    let key = format!("{}/{}.mp4", classification.as_str(), random_object_id());

    // A failed upload aborts the request; a locator is never persisted for
    // an object that was not stored.
    state
        .store
        .put_video(&key, content_type, remuxed.path())
        .await
        .map_err(ApiError::Internal)?;

    let locator = VideoLocator::new(state.store.bucket(), &key)
        .map_err(|e| ApiError::Internal(e.into()))?;

    video.video_url = Some(locator.encode());
    state.video_repository.update(&video).await?;

    let video = state
        .store
        .resolve_video_url(video)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(video))
}

/// Parse the path-supplied video ID
fn parse_video_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid video ID".to_string()))
}

/// Fetch a video record and verify the authenticated user owns it.
/// Runs before any file I/O in the upload handlers.
async fn fetch_owned_video(
    state: &AppState,
    video_id: Uuid,
    user: &AuthUser,
) -> Result<Video, ApiError> {
    let video = state
        .video_repository
        .get(video_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No video with ID {}", video_id)))?;

    ensure_owner(&video, user)?;
    Ok(video)
}

fn ensure_owner(video: &Video, user: &AuthUser) -> Result<(), ApiError> {
    if video.user_id != user.id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Require the request to declare exactly the accepted video content type
fn require_video_content_type(headers: &HeaderMap) -> Result<&'static str, ApiError> {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if declared != VIDEO_CONTENT_TYPE {
        return Err(ApiError::BadRequest(format!(
            "Video uploads must declare Content-Type {}",
            VIDEO_CONTENT_TYPE
        )));
    }

    Ok(VIDEO_CONTENT_TYPE)
}

/// Stream a request body into a scratch file, enforcing the transport cap
async fn stream_body_to_file(body: Body, path: &std::path::Path) -> Result<(), ApiError> {
    let limited = Body::new(http_body_util::Limited::new(body, VIDEO_UPLOAD_LIMIT));
    let mut reader = StreamReader::new(limited.into_data_stream().map_err(io::Error::other));

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| {
            if is_length_limit(&e) {
                ApiError::BadRequest(format!(
                    "Video upload exceeds the {} byte limit",
                    VIDEO_UPLOAD_LIMIT
                ))
            } else {
                ApiError::Internal(e.into())
            }
        })?;

    file.flush().await.map_err(|e| ApiError::Internal(e.into()))?;
    Ok(())
}

fn is_length_limit(err: &io::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Build an inline data-URL thumbnail reference
fn inline_thumbnail(content_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(data))
}

/// Map an accepted thumbnail content type to a file extension
fn thumbnail_extension(content_type: &str) -> Result<&'static str, ApiError> {
    match content_type {
        "image/jpeg" => Ok("jpg"),
        "image/png" => Ok("png"),
        other => Err(ApiError::BadRequest(format!(
            "Thumbnails must be image/jpeg or image/png, got {}",
            other
        ))),
    }
}

/// 32 cryptographically random bytes, base64 URL-safe without padding
fn random_object_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;

    fn test_video(user_id: Uuid) -> Video {
        Video {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            title: "a title".to_string(),
            description: "a description".to_string(),
            user_id,
            thumbnail_url: None,
            video_url: None,
        }
    }

    #[test]
    fn test_parse_video_id() {
        assert!(parse_video_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_video_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_ensure_owner() {
        let owner = AuthUser { id: Uuid::new_v4() };
        let video = test_video(owner.id);
        assert!(ensure_owner(&video, &owner).is_ok());

        let stranger = AuthUser { id: Uuid::new_v4() };
        assert!(matches!(
            ensure_owner(&video, &stranger),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn test_content_type_must_match_exactly() {
        let mut headers = HeaderMap::new();
        assert!(require_video_content_type(&headers).is_err());

        for wrong in ["video/webm", "video/MP4", "video/mp4; codecs=avc1", ""] {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(wrong).unwrap());
            assert!(
                require_video_content_type(&headers).is_err(),
                "accepted {:?}",
                wrong
            );
        }

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        assert_eq!(require_video_content_type(&headers).unwrap(), "video/mp4");
    }

    #[test]
    fn test_inline_thumbnail_data_url() {
        let reference = inline_thumbnail("image/png", b"pixels");
        assert_eq!(reference, format!("data:image/png;base64,{}", STANDARD.encode(b"pixels")));
    }

    #[test]
    fn test_thumbnail_extension() {
        assert_eq!(thumbnail_extension("image/jpeg").unwrap(), "jpg");
        assert_eq!(thumbnail_extension("image/png").unwrap(), "png");
        assert!(thumbnail_extension("image/gif").is_err());
        assert!(thumbnail_extension("IMAGE/PNG").is_err());
    }

    #[test]
    fn test_random_object_id_shape() {
        let id = random_object_id();
        // 32 bytes base64-encoded without padding
        assert_eq!(id.len(), 43);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(id, random_object_id());
    }

    #[tokio::test]
    async fn test_stream_body_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.mp4");

        let body = Body::from("mp4 bytes");
        stream_body_to_file(body, &path).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"mp4 bytes");
    }
}
