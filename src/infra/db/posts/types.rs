use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostRecord;

pub(super) const POST_COLUMNS: &str = "id, title, body, author_id, tags, views, likes, dislikes, \
     comment_count, engagement_score, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) author_id: Uuid,
    pub(crate) tags: Vec<String>,
    pub(crate) views: i64,
    pub(crate) likes: i64,
    pub(crate) dislikes: i64,
    pub(crate) comment_count: i64,
    pub(crate) engagement_score: f64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            body: row.body,
            author_id: row.author_id,
            tags: row.tags,
            views: row.views,
            likes: row.likes,
            dislikes: row.dislikes,
            comment_count: row.comment_count,
            engagement_score: row.engagement_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
