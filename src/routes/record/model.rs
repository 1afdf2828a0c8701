use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::FieldErrors;

pub const TITLE_MAX_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorshipType {
    #[default]
    Family,
    Personal,
    Dawn,
    Other,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown worship type: {0}")]
pub struct UnknownWorshipType(pub String);

impl WorshipType {
    pub const ALL: [WorshipType; 4] = [
        WorshipType::Family,
        WorshipType::Personal,
        WorshipType::Dawn,
        WorshipType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorshipType::Family => "family",
            WorshipType::Personal => "personal",
            WorshipType::Dawn => "dawn",
            WorshipType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorshipType::Family => "가정예배",
            WorshipType::Personal => "개인예배",
            WorshipType::Dawn => "새벽예배",
            WorshipType::Other => "기타",
        }
    }
}

impl fmt::Display for WorshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorshipType {
    type Err = UnknownWorshipType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorshipType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownWorshipType(s.to_string()))
    }
}

impl TryFrom<String> for WorshipType {
    type Error = UnknownWorshipType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorshipRecord {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub worship_type: WorshipType,
    pub title: String,
    pub content: String,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record as shown in the owner's own list and edit views.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub id: i64,
    pub date: NaiveDate,
    pub worship_type: WorshipType,
    pub worship_type_label: &'static str,
    pub title: String,
    pub content: String,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorshipRecord> for RecordView {
    fn from(record: WorshipRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            worship_type: record.worship_type,
            worship_type_label: record.worship_type.label(),
            title: record.title,
            content: record.content,
            is_shared: record.is_shared,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub records: Vec<RecordView>,
}

#[derive(Debug, Serialize)]
pub struct WorshipTypeChoice {
    pub value: WorshipType,
    pub label: &'static str,
}

/// Payload for the new/edit record form.
#[derive(Debug, Serialize)]
pub struct RecordFormView {
    pub edit: bool,
    pub id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub worship_type: WorshipType,
    pub title: String,
    pub content: String,
    pub is_shared: bool,
    pub worship_types: Vec<WorshipTypeChoice>,
}

impl RecordFormView {
    fn choices() -> Vec<WorshipTypeChoice> {
        WorshipType::ALL
            .into_iter()
            .map(|t| WorshipTypeChoice {
                value: t,
                label: t.label(),
            })
            .collect()
    }

    pub fn blank() -> Self {
        Self {
            edit: false,
            id: None,
            date: None,
            worship_type: WorshipType::default(),
            title: String::new(),
            content: String::new(),
            is_shared: false,
            worship_types: Self::choices(),
        }
    }

    pub fn for_record(record: WorshipRecord) -> Self {
        Self {
            edit: true,
            id: Some(record.id),
            date: Some(record.date),
            worship_type: record.worship_type,
            title: record.title,
            content: record.content,
            is_shared: record.is_shared,
            worship_types: Self::choices(),
        }
    }
}

/// Raw form fields as posted by the browser. Everything is optional here so
/// that missing fields become field errors rather than a rejected body.
#[derive(Debug, Default, Deserialize)]
pub struct RecordForm {
    pub date: Option<String>,
    pub worship_type: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_shared: Option<String>,
}

/// Validated record fields, shared by create and edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInput {
    pub date: NaiveDate,
    pub worship_type: WorshipType,
    pub title: String,
    pub content: String,
    pub is_shared: bool,
}

// Checkbox semantics: an unchecked box is simply absent from the body.
fn checkbox_value(raw: Option<&str>) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        None => false,
        Some(v) => !matches!(v.as_str(), "" | "false" | "0" | "off"),
    }
}

impl RecordForm {
    pub fn validate(self) -> Result<RecordInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("date", "이 필드는 필수 항목입니다.");
                None
            }
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("date", "올바른 날짜를 입력하세요.");
                    None
                }
            },
        };

        let worship_type = match self.worship_type.as_deref().map(str::trim) {
            None | Some("") => WorshipType::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                errors.add(
                    "worship_type",
                    format!("올바르게 선택해 주세요. '{}' 이/가 선택가능항목에 없습니다.", raw),
                );
                WorshipType::default()
            }),
        };

        let title = self.title.unwrap_or_default().trim().to_string();
        if title.is_empty() {
            errors.add("title", "이 필드는 필수 항목입니다.");
        } else {
            let len = title.chars().count();
            if len > TITLE_MAX_LEN {
                errors.add(
                    "title",
                    format!(
                        "이 값이 최대 {} 개의 글자인지 확인하세요(입력값 {} 자).",
                        TITLE_MAX_LEN, len
                    ),
                );
            }
        }

        let content = self.content.unwrap_or_default().trim().to_string();
        let is_shared = checkbox_value(self.is_shared.as_deref());

        match date {
            Some(date) if errors.is_empty() => Ok(RecordInput {
                date,
                worship_type,
                title,
                content,
                is_shared,
            }),
            _ => Err(errors),
        }
    }
}

/// Row shape of the tree export.
#[derive(Debug, Serialize, FromRow)]
pub struct Fruit {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub worship_type: WorshipType,
    pub title: String,
}

const RECORD_COLUMNS: &str =
    "id, user_id, date, worship_type, title, content, is_shared, created_at, updated_at";

// Newest worship date first, newest entry first within a day.
const RECORD_ORDER: &str = "ORDER BY date DESC, created_at DESC, id DESC";

impl WorshipRecord {
    pub async fn create(
        pool: &PgPool,
        owner_id: i64,
        input: &RecordInput,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO worship_records (user_id, date, worship_type, title, content, is_shared)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {RECORD_COLUMNS}"
        );
        let record = sqlx::query_as::<_, WorshipRecord>(&query)
            .bind(owner_id)
            .bind(input.date)
            .bind(input.worship_type.as_str())
            .bind(&input.title)
            .bind(&input.content)
            .bind(input.is_shared)
            .fetch_one(pool)
            .await?;

        tracing::info!(
            record_id = record.id,
            owner_id,
            is_shared = record.is_shared,
            "Created worship record"
        );
        Ok(record)
    }

    pub async fn list_own(pool: &PgPool, owner_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM worship_records WHERE user_id = $1 {RECORD_ORDER}"
        );
        sqlx::query_as::<_, WorshipRecord>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// The record only if it exists and belongs to `owner_id`.
    pub async fn find_owned(
        pool: &PgPool,
        owner_id: i64,
        record_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query =
            format!("SELECT {RECORD_COLUMNS} FROM worship_records WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, WorshipRecord>(&query)
            .bind(record_id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite all editable fields. The owner filter is part of the
    /// statement, so a guessed id of someone else's record updates nothing.
    pub async fn update_owned(
        pool: &PgPool,
        owner_id: i64,
        record_id: i64,
        input: &RecordInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE worship_records
             SET date = $3, worship_type = $4, title = $5, content = $6, is_shared = $7,
                 updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {RECORD_COLUMNS}"
        );
        let record = sqlx::query_as::<_, WorshipRecord>(&query)
            .bind(record_id)
            .bind(owner_id)
            .bind(input.date)
            .bind(input.worship_type.as_str())
            .bind(&input.title)
            .bind(&input.content)
            .bind(input.is_shared)
            .fetch_optional(pool)
            .await?;

        if let Some(ref r) = record {
            tracing::info!(record_id = r.id, owner_id, "Updated worship record");
        }
        Ok(record)
    }

    /// Delete an owned record with its likes and comments in one
    /// transaction. Returns false when the caller does not own such a record.
    pub async fn delete_owned(
        pool: &PgPool,
        owner_id: i64,
        record_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM worship_records WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(record_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM likes WHERE record_id = $1")
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM comments WHERE record_id = $1")
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM worship_records WHERE id = $1")
            .bind(record_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(record_id, owner_id, "Deleted worship record");
        Ok(true)
    }

    /// Every record of the owner for the tree view, shared or not.
    pub async fn tree_data(pool: &PgPool, owner_id: i64) -> Result<Vec<Fruit>, sqlx::Error> {
        let query = format!(
            "SELECT id, date, worship_type, title FROM worship_records WHERE user_id = $1 {RECORD_ORDER}"
        );
        sqlx::query_as::<_, Fruit>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }
}
