// Postgres implementation of CommentStore.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use refrain_common::time::year_bounds_ms;
use refrain_common::{Comment, TargetRecord, Tier};

use crate::error::{Result, StoreError};
use crate::{CommentStore, InsertOutcome, KeywordMatches, ObserveOutcome, RawFilter};

pub struct PgCommentStore {
    pool: PgPool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TargetRow {
    id: String,
    title: Option<String>,
    artist: Option<String>,
    publish_year: Option<i32>,
    api_total: Option<i64>,
    updated_at_ms: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CommentRow {
    id: String,
    target_id: String,
    text: String,
    engagement: i64,
    timestamp_ms: Option<i64>,
    tier: String,
    author: Option<String>,
    deleted_at_ms: Option<i64>,
    last_seen_at_ms: Option<i64>,
}

impl From<TargetRow> for TargetRecord {
    fn from(r: TargetRow) -> Self {
        TargetRecord {
            id: r.id,
            title: r.title,
            artist: r.artist,
            publish_year: r.publish_year,
            api_total: r.api_total,
            updated_at_ms: r.updated_at_ms,
        }
    }
}

impl CommentRow {
    fn into_comment(self) -> Comment {
        let tier = self.tier.parse().unwrap_or_else(|_| {
            warn!(id = %self.id, tier = %self.tier, "Unknown tier in store, treating as recent");
            Tier::Recent
        });
        Comment {
            id: self.id,
            target_id: self.target_id,
            text: self.text,
            engagement: self.engagement,
            timestamp_ms: self.timestamp_ms,
            tier,
            author: self.author,
            deleted_at_ms: self.deleted_at_ms,
            last_seen_at_ms: self.last_seen_at_ms,
        }
    }
}

const COMMENT_COLUMNS: &str = "id, target_id, text, engagement, timestamp_ms, tier, author, deleted_at_ms, last_seen_at_ms";

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_target(&self, target_id: &str) -> Result<()> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM targets WHERE id = $1)")
            .bind(target_id)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::NotFound(target_id.to_string()))
        }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn target(&self, target_id: &str) -> Result<Option<TargetRecord>> {
        let row = sqlx::query_as::<_, TargetRow>(
            r#"
            SELECT id, title, artist, publish_year, api_total, updated_at_ms
            FROM targets
            WHERE id = $1
            "#,
        )
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TargetRecord::from))
    }

    async fn upsert_target(&self, target: &TargetRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO targets (id, title, artist, publish_year, api_total, updated_at_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                title = COALESCE(EXCLUDED.title, targets.title),
                artist = COALESCE(EXCLUDED.artist, targets.artist),
                publish_year = COALESCE(EXCLUDED.publish_year, targets.publish_year),
                api_total = COALESCE(EXCLUDED.api_total, targets.api_total),
                updated_at_ms = EXCLUDED.updated_at_ms
            "#,
        )
        .bind(&target.id)
        .bind(&target.title)
        .bind(&target.artist)
        .bind(target.publish_year)
        .bind(target.api_total)
        .bind(target.updated_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn existing_ids(&self, target_id: &str) -> Result<HashSet<String>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM comments WHERE target_id = $1")
            .bind(target_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn count(&self, target_id: &str) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE target_id = $1 AND deleted_at_ms IS NULL",
        )
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn insert_new(&self, comments: &[Comment]) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();
        let mut tx = self.pool.begin().await?;

        for c in comments {
            let result = sqlx::query(
                r#"
                INSERT INTO comments
                    (id, target_id, text, engagement, timestamp_ms, tier, author, last_seen_at_ms)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&c.id)
            .bind(&c.target_id)
            .bind(&c.text)
            .bind(c.engagement)
            .bind(c.timestamp_ms)
            .bind(c.tier.as_str())
            .bind(&c.author)
            .bind(c.last_seen_at_ms)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                outcome.inserted += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        tx.commit().await?;
        debug!(inserted = outcome.inserted, skipped = outcome.skipped, "Stored comment batch");
        Ok(outcome)
    }

    async fn observe(&self, comments: &[Comment], seen_at_ms: i64) -> Result<ObserveOutcome> {
        let mut outcome = ObserveOutcome::default();
        let mut tx = self.pool.begin().await?;

        for c in comments {
            // xmax = 0 only for freshly inserted rows.
            let inserted = sqlx::query_scalar::<_, bool>(
                r#"
                INSERT INTO comments
                    (id, target_id, text, engagement, timestamp_ms, tier, author, last_seen_at_ms)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET
                    engagement = EXCLUDED.engagement,
                    last_seen_at_ms = EXCLUDED.last_seen_at_ms,
                    deleted_at_ms = NULL
                RETURNING (xmax = 0)
                "#,
            )
            .bind(&c.id)
            .bind(&c.target_id)
            .bind(&c.text)
            .bind(c.engagement)
            .bind(c.timestamp_ms)
            .bind(c.tier.as_str())
            .bind(&c.author)
            .bind(seen_at_ms)
            .fetch_one(&mut *tx)
            .await?;

            if inserted {
                outcome.inserted += 1;
            } else {
                outcome.refreshed += 1;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn comments(&self, target_id: &str, limit: usize) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE target_id = $1 AND deleted_at_ms IS NULL
            ORDER BY seq
            LIMIT $2
            "#
        ))
        .bind(target_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentRow::into_comment).collect())
    }

    async fn search(
        &self,
        target_id: &str,
        keyword: &str,
        min_engagement: i64,
        limit: usize,
    ) -> Result<KeywordMatches> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM comments
            WHERE target_id = $1 AND deleted_at_ms IS NULL
              AND strpos(text, $2) > 0 AND engagement >= $3
            "#,
        )
        .bind(target_id)
        .bind(keyword)
        .bind(min_engagement)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE target_id = $1 AND deleted_at_ms IS NULL
              AND strpos(text, $2) > 0 AND engagement >= $3
            ORDER BY engagement DESC, seq
            LIMIT $4
            "#
        ))
        .bind(target_id)
        .bind(keyword)
        .bind(min_engagement)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(KeywordMatches {
            total,
            comments: rows.into_iter().map(CommentRow::into_comment).collect(),
        })
    }

    async fn raw(&self, target_id: &str, filter: RawFilter) -> Result<Vec<Comment>> {
        let (start, end) = match filter.year {
            Some(year) => {
                let (s, e) = year_bounds_ms(year);
                (Some(s), Some(e))
            }
            None => (None, None),
        };

        // The year filter runs in SQL so the limit applies after it.
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE target_id = $1 AND deleted_at_ms IS NULL
              AND engagement >= $2
              AND ($3::BIGINT IS NULL OR timestamp_ms >= $3)
              AND ($4::BIGINT IS NULL OR timestamp_ms < $4)
            ORDER BY engagement DESC, seq
            LIMIT $5
            "#
        ))
        .bind(target_id)
        .bind(filter.min_engagement)
        .bind(start)
        .bind(end)
        .bind(filter.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentRow::into_comment).collect())
    }

    async fn mark_missing(&self, target_id: &str, seen: &HashSet<String>, at_ms: i64) -> Result<u64> {
        self.ensure_target(target_id).await?;
        let seen: Vec<String> = seen.iter().cloned().collect();
        let result = sqlx::query(
            r#"
            UPDATE comments SET deleted_at_ms = $3
            WHERE target_id = $1 AND deleted_at_ms IS NULL
              AND NOT (id = ANY($2))
            "#,
        )
        .bind(target_id)
        .bind(&seen)
        .bind(at_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
