//! SQLite 存储 (sqlx)
//!
//! `(story_id, key)` 唯一约束由数据库保证，冲突行在写入时静默忽略。

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

use crate::core::error::{CrawlError, Result};
use crate::core::model::{Chapter, NewChapter, NewStory, Source, Story};
use crate::interfaces::Store;

/// IN 列表单次绑定的键数上限
const KEY_CHUNK: usize = 500;

const CREATE_STORIES: &str = r#"
CREATE TABLE IF NOT EXISTS stories (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE,
    title      TEXT NOT NULL,
    source     TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

const CREATE_CHAPTERS: &str = r#"
CREATE TABLE IF NOT EXISTS chapters (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    story_id   INTEGER NOT NULL REFERENCES stories(id),
    "key"      INTEGER NOT NULL,
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (story_id, "key")
)
"#;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 连接数据库并确保表结构存在
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!("存储已就绪: {}", url);
        Ok(store)
    }

    /// 单连接内存库，连接关闭即丢弃
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_STORIES).execute(&self.pool).await?;
        sqlx::query(CREATE_CHAPTERS).execute(&self.pool).await?;
        Ok(())
    }

    fn story_from_row(row: &SqliteRow) -> Result<Story> {
        let source: String = row.try_get("source")?;
        Ok(Story {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            title: row.try_get("title")?,
            source: Source::from_str(&source)
                .map_err(|_| CrawlError::Parse(format!("unknown source: {}", source)))?,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_story_by_name(&self, name: &str) -> Result<Option<Story>> {
        let row = sqlx::query("SELECT id, name, title, source FROM stories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::story_from_row).transpose()
    }

    async fn save_story(&self, story: &NewStory) -> Result<Story> {
        sqlx::query(
            "INSERT INTO stories (name, title, source) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(&story.name)
        .bind(&story.title)
        .bind(story.source.as_ref())
        .execute(&self.pool)
        .await?;

        self.find_story_by_name(&story.name)
            .await?
            .ok_or_else(|| CrawlError::Custom(format!("story {} vanished after insert", story.name)))
    }

    async fn backfill_title(&self, story_id: i64, title: &str) -> Result<()> {
        sqlx::query("UPDATE stories SET title = ? WHERE id = ?")
            .bind(title)
            .bind(story_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn existing_chapter_keys(
        &self,
        story_id: i64,
        candidates: &BTreeSet<u32>,
    ) -> Result<BTreeSet<u32>> {
        let keys: Vec<u32> = candidates.iter().copied().collect();
        let mut existing = BTreeSet::new();

        for chunk in keys.chunks(KEY_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(r#"SELECT "key" FROM chapters WHERE story_id = "#);
            qb.push_bind(story_id);
            qb.push(r#" AND "key" IN ("#);
            let mut separated = qb.separated(", ");
            for key in chunk {
                separated.push_bind(i64::from(*key));
            }
            separated.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in rows {
                let key: i64 = row.try_get(0)?;
                existing.insert(key as u32);
            }
        }
        Ok(existing)
    }

    async fn save_chapters(&self, batch: Vec<NewChapter>) -> Result<Vec<Chapter>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let submitted = batch.len();
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(submitted);

        for chapter in batch {
            let row = sqlx::query(
                r#"INSERT INTO chapters (story_id, "key", title, content) VALUES (?, ?, ?, ?)
                   ON CONFLICT(story_id, "key") DO NOTHING
                   RETURNING id"#,
            )
            .bind(chapter.story_id)
            .bind(i64::from(chapter.key))
            .bind(&chapter.title)
            .bind(&chapter.content)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                saved.push(Chapter {
                    id: row.try_get("id")?,
                    story_id: chapter.story_id,
                    key: chapter.key,
                    title: chapter.title,
                    content: chapter.content,
                });
            }
        }

        tx.commit().await?;
        debug!("写入章节 {}/{}", saved.len(), submitted);
        Ok(saved)
    }

    async fn count_chapters(&self, story_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE story_id = ?")
            .bind(story_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
