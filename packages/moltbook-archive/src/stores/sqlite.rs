//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - Local archives
//! - Single-server deployments
//! - Testing with persistent data
//!
//! Every upsert is a single `INSERT ... ON CONFLICT ... DO UPDATE ...
//! RETURNING id` statement, so concurrent cycles resolve natural-key
//! collisions inside the database.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ArchiveError, Result};
use crate::metrics::TextMetrics;
use crate::traits::store::{AgentStore, CommentStore, JobStore, PostStore, SubmoltStore};
use crate::types::{
    candidate::FoundCounts,
    job::{JobSummary, ScrapeJob},
    record::{
        AgentRecord, AgentUpsert, CommentRecord, CommentUpsert, PostRecord, PostUpsert,
        SubmoltRecord, SubmoltUpsert, Upserted,
    },
};

/// SQLite-based archive store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite://moltbook.db?mode=rwc` - File-based, create if missing
    /// - `sqlite::memory:` - use [`SqliteStore::in_memory`] instead
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(ArchiveError::storage)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(ArchiveError::storage)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Uses a single long-lived connection, since each SQLite memory
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(ArchiveError::storage)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(ArchiveError::storage)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS submolts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
                description TEXT,
                member_count INTEGER,
                first_seen_at TEXT NOT NULL,
                last_scraped_at TEXT
            );

            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE CHECK (length(trim(username)) > 0),
                display_name TEXT,
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT,
                post_count INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ArchiveError::storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE CHECK (length(trim(external_id)) > 0),
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                content TEXT,
                url TEXT,
                upvotes INTEGER NOT NULL DEFAULT 0,
                downvotes INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0,
                posted_at TEXT,
                agent_id TEXT REFERENCES agents(id),
                submolt_id TEXT REFERENCES submolts(id),
                word_count INTEGER NOT NULL DEFAULT 0,
                char_count INTEGER NOT NULL DEFAULT 0,
                unique_words INTEGER NOT NULL DEFAULT 0,
                avg_word_length REAL NOT NULL DEFAULT 0,
                link_count INTEGER NOT NULL DEFAULT 0,
                scraped_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posts_agent_id ON posts(agent_id);
            CREATE INDEX IF NOT EXISTS idx_posts_submolt_id ON posts(submolt_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ArchiveError::storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE CHECK (length(trim(external_id)) > 0),
                content TEXT NOT NULL CHECK (length(trim(content)) > 0),
                agent_id TEXT REFERENCES agents(id),
                post_id TEXT REFERENCES posts(id),
                upvotes INTEGER NOT NULL DEFAULT 0,
                posted_at TEXT,
                word_count INTEGER NOT NULL DEFAULT 0,
                char_count INTEGER NOT NULL DEFAULT 0,
                scraped_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_comments_agent_id ON comments(agent_id);
            CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ArchiveError::storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scrape_jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                scope TEXT NOT NULL,
                target_id TEXT,
                posts_scraped INTEGER NOT NULL DEFAULT 0,
                agents_discovered INTEGER NOT NULL DEFAULT 0,
                submolts_discovered INTEGER NOT NULL DEFAULT 0,
                comments_scraped INTEGER NOT NULL DEFAULT 0,
                write_failures INTEGER NOT NULL DEFAULT 0,
                posts_found INTEGER NOT NULL DEFAULT 0,
                agents_found INTEGER NOT NULL DEFAULT 0,
                submolts_found INTEGER NOT NULL DEFAULT 0,
                comments_found INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_scrape_jobs_status ON scrape_jobs(status);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ArchiveError::storage)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Constraint failures become `Constraint` errors; everything else is a
/// storage error.
fn write_error(table: &'static str, e: sqlx::Error) -> ArchiveError {
    let reason = e
        .as_database_error()
        .filter(|db| {
            matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            )
        })
        .map(|db| db.message().to_string());

    match reason {
        Some(reason) => ArchiveError::Constraint { table, reason },
        None => ArchiveError::storage(e),
    }
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ArchiveError::storage_msg(format!("Invalid date '{}': {}", raw, e)))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| ArchiveError::storage_msg(format!("Invalid id '{}': {}", raw, e)))
}

fn parse_opt_id(raw: Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_id).transpose()
}

fn count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn upserted(fresh: Uuid, returned: &str) -> Result<Upserted> {
    let id = parse_id(returned)?;
    Ok(if id == fresh {
        Upserted::inserted(id)
    } else {
        Upserted::updated(id)
    })
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct SubmoltRow {
    id: String,
    name: String,
    description: Option<String>,
    member_count: Option<i64>,
    first_seen_at: String,
    last_scraped_at: Option<String>,
}

impl SubmoltRow {
    fn into_record(self) -> Result<SubmoltRecord> {
        Ok(SubmoltRecord {
            id: parse_id(&self.id)?,
            name: self.name,
            description: self.description,
            member_count: self.member_count.map(count),
            first_seen_at: parse_ts(&self.first_seen_at)?,
            last_scraped_at: parse_opt_ts(self.last_scraped_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct AgentRow {
    id: String,
    username: String,
    display_name: Option<String>,
    first_seen_at: String,
    last_seen_at: Option<String>,
    post_count: i64,
    comment_count: i64,
}

impl AgentRow {
    fn into_record(self) -> Result<AgentRecord> {
        Ok(AgentRecord {
            id: parse_id(&self.id)?,
            username: self.username,
            display_name: self.display_name,
            first_seen_at: parse_ts(&self.first_seen_at)?,
            last_seen_at: parse_opt_ts(self.last_seen_at)?,
            post_count: count(self.post_count),
            comment_count: count(self.comment_count),
        })
    }
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: String,
    external_id: String,
    title: String,
    content: Option<String>,
    url: Option<String>,
    upvotes: i64,
    downvotes: i64,
    comment_count: i64,
    posted_at: Option<String>,
    agent_id: Option<String>,
    submolt_id: Option<String>,
    word_count: i64,
    char_count: i64,
    unique_words: i64,
    avg_word_length: f64,
    link_count: i64,
    scraped_at: String,
}

impl PostRow {
    fn into_record(self) -> Result<PostRecord> {
        Ok(PostRecord {
            id: parse_id(&self.id)?,
            external_id: self.external_id,
            title: self.title,
            content: self.content,
            url: self.url,
            upvotes: count(self.upvotes),
            downvotes: count(self.downvotes),
            comment_count: count(self.comment_count),
            posted_at: parse_opt_ts(self.posted_at)?,
            agent_id: parse_opt_id(self.agent_id)?,
            submolt_id: parse_opt_id(self.submolt_id)?,
            metrics: TextMetrics {
                word_count: count(self.word_count) as usize,
                char_count: count(self.char_count) as usize,
                unique_words: count(self.unique_words) as usize,
                avg_word_length: self.avg_word_length,
                link_count: count(self.link_count) as usize,
            },
            scraped_at: parse_ts(&self.scraped_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: String,
    external_id: String,
    content: String,
    agent_id: Option<String>,
    post_id: Option<String>,
    upvotes: i64,
    posted_at: Option<String>,
    word_count: i64,
    char_count: i64,
    scraped_at: String,
}

impl CommentRow {
    fn into_record(self) -> Result<CommentRecord> {
        Ok(CommentRecord {
            id: parse_id(&self.id)?,
            external_id: self.external_id,
            content: self.content,
            agent_id: parse_opt_id(self.agent_id)?,
            post_id: parse_opt_id(self.post_id)?,
            upvotes: count(self.upvotes),
            posted_at: parse_opt_ts(self.posted_at)?,
            word_count: count(self.word_count),
            char_count: count(self.char_count),
            scraped_at: parse_ts(&self.scraped_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    status: String,
    scope: String,
    target_id: Option<String>,
    posts_scraped: i64,
    agents_discovered: i64,
    submolts_discovered: i64,
    comments_scraped: i64,
    write_failures: i64,
    posts_found: i64,
    agents_found: i64,
    submolts_found: i64,
    comments_found: i64,
    error_message: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<ScrapeJob> {
        let n = |v: i64| count(v) as usize;
        Ok(ScrapeJob {
            id: parse_id(&self.id)?,
            status: self.status.parse()?,
            scope: self
                .scope
                .parse()
                .map_err(|_| ArchiveError::storage_msg(format!("Invalid scope: {}", self.scope)))?,
            target_id: self.target_id,
            summary: JobSummary {
                posts_scraped: n(self.posts_scraped),
                agents_discovered: n(self.agents_discovered),
                submolts_discovered: n(self.submolts_discovered),
                comments_scraped: n(self.comments_scraped),
                write_failures: n(self.write_failures),
                found: FoundCounts {
                    posts: n(self.posts_found),
                    agents: n(self.agents_found),
                    submolts: n(self.submolts_found),
                    comments: n(self.comments_found),
                },
            },
            error_message: self.error_message,
            created_at: parse_ts(&self.created_at)?,
            started_at: parse_opt_ts(self.started_at)?,
            completed_at: parse_opt_ts(self.completed_at)?,
        })
    }
}

const POST_COLUMNS: &str = "id, external_id, title, content, url, upvotes, downvotes, \
    comment_count, posted_at, agent_id, submolt_id, word_count, char_count, unique_words, \
    avg_word_length, link_count, scraped_at";

const COMMENT_COLUMNS: &str = "id, external_id, content, agent_id, post_id, upvotes, \
    posted_at, word_count, char_count, scraped_at";

#[async_trait]
impl SubmoltStore for SqliteStore {
    async fn get_submolt(&self, name: &str) -> Result<Option<SubmoltRecord>> {
        sqlx::query_as::<_, SubmoltRow>("SELECT * FROM submolts WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ArchiveError::storage)?
            .map(SubmoltRow::into_record)
            .transpose()
    }

    async fn upsert_submolt(&self, submolt: &SubmoltUpsert) -> Result<Upserted> {
        let fresh = Uuid::new_v4();
        let (id,): (String,) = sqlx::query_as(
            r#"
            INSERT INTO submolts (id, name, description, member_count, first_seen_at, last_scraped_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(name) DO UPDATE SET
                last_scraped_at = excluded.last_scraped_at,
                member_count = COALESCE(excluded.member_count, submolts.member_count),
                description = COALESCE(excluded.description, submolts.description)
            RETURNING id
            "#,
        )
        .bind(fresh.to_string())
        .bind(&submolt.name)
        .bind(&submolt.description)
        .bind(submolt.member_count.map(i64::from))
        .bind(ts(submolt.seen_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error("submolts", e))?;

        upserted(fresh, &id)
    }

    async fn list_submolts(&self) -> Result<Vec<SubmoltRecord>> {
        sqlx::query_as::<_, SubmoltRow>("SELECT * FROM submolts ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(ArchiveError::storage)?
            .into_iter()
            .map(SubmoltRow::into_record)
            .collect()
    }
}

#[async_trait]
impl AgentStore for SqliteStore {
    async fn get_agent(&self, username: &str) -> Result<Option<AgentRecord>> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM agents WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(ArchiveError::storage)?
            .map(AgentRow::into_record)
            .transpose()
    }

    async fn get_agent_by_id(&self, id: Uuid) -> Result<Option<AgentRecord>> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(ArchiveError::storage)?
            .map(AgentRow::into_record)
            .transpose()
    }

    async fn upsert_agent(&self, agent: &AgentUpsert) -> Result<Upserted> {
        let fresh = Uuid::new_v4();
        let (id,): (String,) = sqlx::query_as(
            r#"
            INSERT INTO agents (id, username, display_name, first_seen_at, last_seen_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(username) DO UPDATE SET
                last_seen_at = excluded.last_seen_at,
                display_name = COALESCE(excluded.display_name, agents.display_name)
            RETURNING id
            "#,
        )
        .bind(fresh.to_string())
        .bind(&agent.username)
        .bind(&agent.display_name)
        .bind(ts(agent.seen_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error("agents", e))?;

        upserted(fresh, &id)
    }

    async fn set_agent_counts(
        &self,
        id: Uuid,
        post_count: u32,
        comment_count: u32,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE agents SET post_count = ?1, comment_count = ?2 WHERE id = ?3",
        )
        .bind(i64::from(post_count))
        .bind(i64::from(comment_count))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("agents", e))?;

        if result.rows_affected() == 0 {
            return Err(ArchiveError::NotFound {
                entity: "agent",
                key: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<AgentRecord>> {
        sqlx::query_as::<_, AgentRow>("SELECT * FROM agents ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(ArchiveError::storage)?
            .into_iter()
            .map(AgentRow::into_record)
            .collect()
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn get_post(&self, external_id: &str) -> Result<Option<PostRecord>> {
        sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {} FROM posts WHERE external_id = ?",
            POST_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ArchiveError::storage)?
        .map(PostRow::into_record)
        .transpose()
    }

    async fn upsert_post(&self, post: &PostUpsert) -> Result<Upserted> {
        let fresh = Uuid::new_v4();
        let (id,): (String,) = sqlx::query_as(
            r#"
            INSERT INTO posts (
                id, external_id, title, content, url, upvotes, downvotes, comment_count,
                posted_at, agent_id, submolt_id, word_count, char_count, unique_words,
                avg_word_length, link_count, scraped_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ON CONFLICT(external_id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                url = excluded.url,
                upvotes = excluded.upvotes,
                downvotes = excluded.downvotes,
                comment_count = excluded.comment_count,
                posted_at = excluded.posted_at,
                agent_id = excluded.agent_id,
                submolt_id = excluded.submolt_id,
                word_count = excluded.word_count,
                char_count = excluded.char_count,
                unique_words = excluded.unique_words,
                avg_word_length = excluded.avg_word_length,
                link_count = excluded.link_count,
                scraped_at = excluded.scraped_at
            RETURNING id
            "#,
        )
        .bind(fresh.to_string())
        .bind(&post.external_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.url)
        .bind(i64::from(post.upvotes))
        .bind(i64::from(post.downvotes))
        .bind(i64::from(post.comment_count))
        .bind(post.posted_at.map(ts))
        .bind(post.agent_id.map(|id| id.to_string()))
        .bind(post.submolt_id.map(|id| id.to_string()))
        .bind(post.metrics.word_count as i64)
        .bind(post.metrics.char_count as i64)
        .bind(post.metrics.unique_words as i64)
        .bind(post.metrics.avg_word_length)
        .bind(post.metrics.link_count as i64)
        .bind(ts(post.scraped_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error("posts", e))?;

        upserted(fresh, &id)
    }

    async fn count_posts_by_agent(&self, agent_id: Uuid) -> Result<u32> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(ArchiveError::storage)?;
        Ok(count(n))
    }

    async fn posts_by_agent(&self, agent_id: Uuid) -> Result<Vec<PostRecord>> {
        sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {} FROM posts WHERE agent_id = ? ORDER BY scraped_at, external_id",
            POST_COLUMNS
        ))
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(ArchiveError::storage)?
        .into_iter()
        .map(PostRow::into_record)
        .collect()
    }

    async fn list_posts(&self) -> Result<Vec<PostRecord>> {
        sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {} FROM posts ORDER BY external_id",
            POST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(ArchiveError::storage)?
        .into_iter()
        .map(PostRow::into_record)
        .collect()
    }
}

#[async_trait]
impl CommentStore for SqliteStore {
    async fn get_comment(&self, external_id: &str) -> Result<Option<CommentRecord>> {
        sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {} FROM comments WHERE external_id = ?",
            COMMENT_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ArchiveError::storage)?
        .map(CommentRow::into_record)
        .transpose()
    }

    async fn upsert_comment(&self, comment: &CommentUpsert) -> Result<Upserted> {
        let fresh = Uuid::new_v4();
        let (id,): (String,) = sqlx::query_as(
            r#"
            INSERT INTO comments (
                id, external_id, content, agent_id, post_id, upvotes, posted_at,
                word_count, char_count, scraped_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(external_id) DO UPDATE SET
                content = excluded.content,
                agent_id = excluded.agent_id,
                post_id = excluded.post_id,
                upvotes = excluded.upvotes,
                posted_at = excluded.posted_at,
                word_count = excluded.word_count,
                char_count = excluded.char_count,
                scraped_at = excluded.scraped_at
            RETURNING id
            "#,
        )
        .bind(fresh.to_string())
        .bind(&comment.external_id)
        .bind(&comment.content)
        .bind(comment.agent_id.map(|id| id.to_string()))
        .bind(comment.post_id.map(|id| id.to_string()))
        .bind(i64::from(comment.upvotes))
        .bind(comment.posted_at.map(ts))
        .bind(comment.metrics.word_count as i64)
        .bind(comment.metrics.char_count as i64)
        .bind(ts(comment.scraped_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error("comments", e))?;

        upserted(fresh, &id)
    }

    async fn count_comments_by_agent(&self, agent_id: Uuid) -> Result<u32> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(ArchiveError::storage)?;
        Ok(count(n))
    }

    async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>> {
        sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {} FROM comments WHERE post_id = ? ORDER BY scraped_at, external_id",
            COMMENT_COLUMNS
        ))
        .bind(post_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(ArchiveError::storage)?
        .into_iter()
        .map(CommentRow::into_record)
        .collect()
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn create_job(&self, job: &ScrapeJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrape_jobs (id, status, scope, target_id, error_message, created_at, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.status.as_str())
        .bind(job.scope.as_str())
        .bind(&job.target_id)
        .bind(&job.error_message)
        .bind(ts(job.created_at))
        .bind(job.started_at.map(ts))
        .bind(job.completed_at.map(ts))
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("scrape_jobs", e))?;

        Ok(())
    }

    async fn update_job(&self, job: &ScrapeJob) -> Result<()> {
        let summary = &job.summary;
        let result = sqlx::query(
            r#"
            UPDATE scrape_jobs SET
                status = ?, posts_scraped = ?, agents_discovered = ?, submolts_discovered = ?,
                comments_scraped = ?, write_failures = ?, posts_found = ?, agents_found = ?,
                submolts_found = ?, comments_found = ?, error_message = ?, started_at = ?,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(summary.posts_scraped as i64)
        .bind(summary.agents_discovered as i64)
        .bind(summary.submolts_discovered as i64)
        .bind(summary.comments_scraped as i64)
        .bind(summary.write_failures as i64)
        .bind(summary.found.posts as i64)
        .bind(summary.found.agents as i64)
        .bind(summary.found.submolts as i64)
        .bind(summary.found.comments as i64)
        .bind(&job.error_message)
        .bind(job.started_at.map(ts))
        .bind(job.completed_at.map(ts))
        .bind(job.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("scrape_jobs", e))?;

        if result.rows_affected() == 0 {
            return Err(ArchiveError::NotFound {
                entity: "scrape job",
                key: job.id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ScrapeJob>> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM scrape_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(ArchiveError::storage)?
            .map(JobRow::into_job)
            .transpose()
    }

    async fn has_active_job(&self) -> Result<bool> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM scrape_jobs WHERE status IN ('pending', 'running')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(ArchiveError::storage)?;
        Ok(n > 0)
    }

    async fn list_jobs(&self, limit: usize) -> Result<Vec<ScrapeJob>> {
        sqlx::query_as::<_, JobRow>(
            "SELECT * FROM scrape_jobs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(ArchiveError::storage)?
        .into_iter()
        .map(JobRow::into_job)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::{JobStatus, ScrapeScope};
    use chrono::Duration;

    fn post(external_id: &str, agent_id: Option<Uuid>) -> PostUpsert {
        PostUpsert {
            external_id: external_id.into(),
            title: "Stored title".into(),
            content: Some("Body with https://x.test link".into()),
            url: Some(format!("https://x.test/post/{}", external_id)),
            upvotes: 3,
            downvotes: 1,
            comment_count: 2,
            posted_at: None,
            agent_id,
            submolt_id: None,
            metrics: TextMetrics::for_post("Stored title", Some("Body with https://x.test link")),
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_agent_upsert_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t0 = Utc::now();

        let first = store
            .upsert_agent(&AgentUpsert {
                username: "bot".into(),
                display_name: Some("Bot".into()),
                seen_at: t0,
            })
            .await
            .unwrap();
        let second = store
            .upsert_agent(&AgentUpsert {
                username: "bot".into(),
                display_name: None,
                seen_at: t0 + Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(first.is_insert());
        assert!(!second.is_insert());
        assert_eq!(first.id, second.id);

        let agent = store.get_agent("bot").await.unwrap().unwrap();
        assert_eq!(agent.display_name.as_deref(), Some("Bot"));
        assert_eq!(store.list_agents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_post_round_trip_and_counts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let agent = store
            .upsert_agent(&AgentUpsert {
                username: "bot".into(),
                display_name: None,
                seen_at: Utc::now(),
            })
            .await
            .unwrap();

        let inserted = store.upsert_post(&post("p1", Some(agent.id))).await.unwrap();
        let updated = store.upsert_post(&post("p1", Some(agent.id))).await.unwrap();
        assert!(inserted.is_insert());
        assert_eq!(updated.id, inserted.id);

        let stored = store.get_post("p1").await.unwrap().unwrap();
        assert_eq!(stored.agent_id, Some(agent.id));
        assert_eq!(stored.metrics.link_count, 1);
        assert_eq!(store.count_posts_by_agent(agent.id).await.unwrap(), 1);

        store.set_agent_counts(agent.id, 1, 0).await.unwrap();
        assert_eq!(store.get_agent_by_id(agent.id).await.unwrap().unwrap().post_count, 1);
    }

    #[tokio::test]
    async fn test_constraint_violations() {
        let store = SqliteStore::in_memory().await.unwrap();

        let orphan = post("p1", Some(Uuid::new_v4()));
        assert!(matches!(
            store.upsert_post(&orphan).await,
            Err(ArchiveError::Constraint { table: "posts", .. })
        ));

        let mut untitled = post("p2", None);
        untitled.title = " ".into();
        assert!(matches!(
            store.upsert_post(&untitled).await,
            Err(ArchiveError::Constraint { .. })
        ));
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut job = ScrapeJob::new(ScrapeScope::Submolt, Some("agentops".into()));
        store.create_job(&job).await.unwrap();
        assert!(store.has_active_job().await.unwrap());

        job.start(Utc::now()).unwrap();
        let summary = JobSummary {
            posts_scraped: 4,
            found: FoundCounts {
                posts: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        job.complete(summary, Utc::now()).unwrap();
        store.update_job(&job).await.unwrap();

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.summary, summary);
        assert_eq!(stored.target_id.as_deref(), Some("agentops"));
        assert!(!store.has_active_job().await.unwrap());
    }
}
