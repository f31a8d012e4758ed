//! Repositories for database operations

use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::Video;

/// Video repository for database operations
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    /// Create a new video repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a video by ID
    pub async fn get(&self, id: Uuid) -> DatabaseResult<Option<Video>> {
        let row = sqlx::query(
            r#"
            SELECT id, created_at, updated_at, title, description, user_id,
                   thumbnail_url, video_url
            FROM videos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        match row {
            Some(row) => {
                let video = Video {
                    id: row.get("id"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                    title: row.get("title"),
                    description: row.get("description"),
                    user_id: row.get("user_id"),
                    thumbnail_url: row.get("thumbnail_url"),
                    video_url: row.get("video_url"),
                };
                Ok(Some(video))
            }
            None => Ok(None),
        }
    }

    /// Replace a video record in full; the caller preserves any fields it
    /// does not intend to change.
    pub async fn update(&self, video: &Video) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE videos
            SET title = $2, description = $3, thumbnail_url = $4,
                video_url = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(video.id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(())
    }
}
