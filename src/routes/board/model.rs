use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::FieldErrors;
use crate::routes::record::WorshipType;

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub page: Option<i64>,
}

/// One page of the board. Pages are 1-based; anything before the first or
/// past the last page is an empty page, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: i64) -> Self {
        Self {
            page: page.unwrap_or(1),
            page_size: page_size.max(1),
        }
    }

    /// Row offset of the first entry, `None` when the page cannot hold rows.
    pub fn offset(&self) -> Option<i64> {
        if self.page < 1 {
            return None;
        }
        (self.page - 1).checked_mul(self.page_size)
    }

    pub fn total_pages(&self, total_count: i64) -> i64 {
        if total_count <= 0 {
            0
        } else {
            (total_count + self.page_size - 1) / self.page_size
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BoardEntry {
    pub id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub worship_type: WorshipType,
    pub title: String,
    pub content: String,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BoardEntryView {
    #[serde(flatten)]
    pub entry: BoardEntry,
    pub worship_type_label: &'static str,
}

impl From<BoardEntry> for BoardEntryView {
    fn from(entry: BoardEntry) -> Self {
        let worship_type_label = entry.worship_type.label();
        Self {
            entry,
            worship_type_label,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoardPage {
    pub records: Vec<BoardEntryView>,
    pub page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub page_range: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub record_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    pub content: Option<String>,
}

impl CommentForm {
    pub fn validate(self) -> Result<String, FieldErrors> {
        let content = self.content.unwrap_or_default().trim().to_string();
        if content.is_empty() {
            return Err(FieldErrors::single("content", "이 필드는 필수 항목입니다."));
        }
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
pub struct BoardDetail {
    pub record: BoardEntryView,
    pub comments: Vec<CommentView>,
    pub user_liked: bool,
}

const ENTRY_SELECT: &str = "SELECT r.id, r.user_id, u.real_name AS author_name, r.date,
        r.worship_type, r.title, r.content,
        (SELECT COUNT(*) FROM likes l WHERE l.record_id = r.id) AS like_count,
        r.created_at, r.updated_at
     FROM worship_records r
     JOIN users u ON u.id = r.user_id";

const ENTRY_ORDER: &str = "ORDER BY r.date DESC, r.created_at DESC, r.id DESC";

pub struct Board;

impl Board {
    pub async fn count_shared(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM worship_records WHERE is_shared")
            .fetch_one(pool)
            .await
    }

    pub async fn list_shared(pool: &PgPool, page: PageRequest) -> Result<BoardPage, sqlx::Error> {
        let total_count = Self::count_shared(pool).await?;
        let total_pages = page.total_pages(total_count);

        let records = match page.offset() {
            Some(offset) if offset < total_count => {
                let query =
                    format!("{ENTRY_SELECT} WHERE r.is_shared {ENTRY_ORDER} LIMIT $1 OFFSET $2");
                sqlx::query_as::<_, BoardEntry>(&query)
                    .bind(page.page_size)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?
            }
            _ => Vec::new(),
        };

        Ok(BoardPage {
            records: records.into_iter().map(BoardEntryView::from).collect(),
            page: page.page,
            total_pages,
            total_count,
            page_range: (1..=total_pages).collect(),
        })
    }

    /// A shared record, whoever owns it. Unshared records are invisible here.
    pub async fn find_shared(pool: &PgPool, record_id: i64) -> Result<Option<BoardEntry>, sqlx::Error> {
        let query = format!("{ENTRY_SELECT} WHERE r.id = $1 AND r.is_shared");
        sqlx::query_as::<_, BoardEntry>(&query)
            .bind(record_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn detail(
        pool: &PgPool,
        record_id: i64,
        viewer_id: i64,
    ) -> Result<Option<BoardDetail>, sqlx::Error> {
        let Some(entry) = Self::find_shared(pool, record_id).await? else {
            return Ok(None);
        };

        let comments = Comment::list_for_record(pool, record_id).await?;
        let user_liked = Like::exists(pool, record_id, viewer_id).await?;

        Ok(Some(BoardDetail {
            record: BoardEntryView::from(entry),
            comments,
            user_liked,
        }))
    }
}

impl Comment {
    /// Insert a comment only if the record is still shared. `None` means the
    /// record is gone or private.
    pub async fn create(
        pool: &PgPool,
        record_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (record_id, user_id, content)
             SELECT r.id, $2, $3 FROM worship_records r WHERE r.id = $1 AND r.is_shared
             RETURNING id, record_id, user_id, content, created_at",
        )
        .bind(record_id)
        .bind(author_id)
        .bind(content)
        .fetch_optional(pool)
        .await?;

        if let Some(ref c) = comment {
            tracing::info!(comment_id = c.id, record_id, author_id, "Created comment");
        }
        Ok(comment)
    }

    /// Oldest first, so the thread reads as a conversation.
    pub async fn list_for_record(pool: &PgPool, record_id: i64) -> Result<Vec<CommentView>, sqlx::Error> {
        sqlx::query_as::<_, CommentView>(
            "SELECT c.id, c.user_id, u.real_name AS author_name, c.content, c.created_at
             FROM comments c
             JOIN users u ON u.id = c.user_id
             WHERE c.record_id = $1
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(record_id)
        .fetch_all(pool)
        .await
    }
}

pub struct Like;

impl Like {
    pub async fn exists(pool: &PgPool, record_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE record_id = $1 AND user_id = $2)",
        )
        .bind(record_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Like the record if the user has not, unlike it otherwise, and report
    /// whether it is liked now. Runs as one transaction; a concurrent insert
    /// for the same pair hits the unique constraint and is absorbed by
    /// `ON CONFLICT DO NOTHING`. `None` means the record is missing or not
    /// shared.
    pub async fn toggle(
        pool: &PgPool,
        record_id: i64,
        user_id: i64,
    ) -> Result<Option<bool>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let shared = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM worship_records WHERE id = $1 AND is_shared FOR SHARE",
        )
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?;

        if shared.is_none() {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM likes WHERE record_id = $1 AND user_id = $2")
            .bind(record_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = if removed > 0 {
            false
        } else {
            sqlx::query(
                "INSERT INTO likes (record_id, user_id) VALUES ($1, $2)
                 ON CONFLICT (record_id, user_id) DO NOTHING",
            )
            .bind(record_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;

        tracing::debug!(record_id, user_id, liked, "Toggled like");
        Ok(Some(liked))
    }
}
