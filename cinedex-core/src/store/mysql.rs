//! MySQL-backed search index and failure log.
//!
//! Queries use runtime binding (`?` placeholders) so the crate builds
//! without a live database; the schema is bootstrapped at startup with
//! idempotent `CREATE TABLE IF NOT EXISTS` statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinedex_model::{CollectType, FailureRecord, SearchInfo};
use sqlx::MySqlPool;
use tracing::info;

use super::{FailureStore, SearchStore, VodQuery};
use crate::error::Result;

/// Create every table the service owns. Safe to run on every boot.
pub async fn init_schema(pool: &MySqlPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search (
            mid BIGINT NOT NULL PRIMARY KEY,
            name VARCHAR(255) NOT NULL DEFAULT '',
            sub_title VARCHAR(255) NOT NULL DEFAULT '',
            initial VARCHAR(16) NOT NULL DEFAULT '',
            cid BIGINT NOT NULL DEFAULT 0,
            pid BIGINT NOT NULL DEFAULT 0,
            c_name VARCHAR(64) NOT NULL DEFAULT '',
            update_stamp BIGINT NOT NULL DEFAULT 0,
            remarks VARCHAR(128) NOT NULL DEFAULT '',
            hits BIGINT NOT NULL DEFAULT 0,
            KEY idx_cid_stamp (cid, update_stamp),
            KEY idx_pid_stamp (pid, update_stamp),
            KEY idx_name (name),
            KEY idx_sub_title (sub_title)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS failure_records (
            id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
            origin_id VARCHAR(64) NOT NULL DEFAULT '',
            origin_name VARCHAR(128) NOT NULL DEFAULT '',
            uri VARCHAR(512) NOT NULL DEFAULT '',
            collect_type VARCHAR(16) NOT NULL DEFAULT 'video',
            page_number BIGINT NOT NULL DEFAULT 0,
            hour BIGINT NOT NULL DEFAULT 0,
            cause TEXT NOT NULL,
            status INT NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            KEY idx_status_created (status, created_at)
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
            user_name VARCHAR(64) NOT NULL,
            password VARCHAR(128) NOT NULL DEFAULT '',
            salt VARCHAR(64) NOT NULL DEFAULT '',
            email VARCHAR(128) NOT NULL DEFAULT '',
            gender INT NOT NULL DEFAULT 0,
            nick_name VARCHAR(64) NOT NULL DEFAULT '',
            status INT NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                ON UPDATE CURRENT_TIMESTAMP,
            UNIQUE KEY uk_user_name (user_name)
        ) ENGINE=InnoDB AUTO_INCREMENT=10000 DEFAULT CHARSET=utf8mb4
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
            link VARCHAR(512) NOT NULL DEFAULT '',
            uid BIGINT NOT NULL DEFAULT 0,
            relevance_id BIGINT NOT NULL DEFAULT 0,
            type INT NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                ON UPDATE CURRENT_TIMESTAMP
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
        "#,
    )
    .execute(pool)
    .await?;

    info!("database schema verified");
    Ok(())
}

#[derive(Clone, Debug)]
pub struct MySqlSearchStore {
    pool: MySqlPool,
}

impl MySqlSearchStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchStore for MySqlSearchStore {
    async fn upsert(&self, rows: &[SearchInfo]) -> Result<()> {
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO search
                    (mid, name, sub_title, initial, cid, pid, c_name,
                     update_stamp, remarks, hits)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    name = VALUES(name),
                    sub_title = VALUES(sub_title),
                    initial = VALUES(initial),
                    cid = VALUES(cid),
                    pid = VALUES(pid),
                    c_name = VALUES(c_name),
                    update_stamp = VALUES(update_stamp),
                    remarks = VALUES(remarks),
                    hits = VALUES(hits)
                "#,
            )
            .bind(row.mid)
            .bind(&row.name)
            .bind(&row.sub_title)
            .bind(&row.initial)
            .bind(row.cid)
            .bind(row.pid)
            .bind(&row.c_name)
            .bind(row.update_stamp)
            .bind(&row.remarks)
            .bind(row.hits)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn truncate(&self) -> Result<()> {
        sqlx::query("TRUNCATE TABLE search")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, q: &VodQuery) -> Result<(i64, Vec<SearchInfo>)> {
        let mut where_sql = String::from(" WHERE 1=1");
        if q.type_id > 0 {
            where_sql.push_str(" AND (cid = ? OR pid = ?)");
        }
        if !q.keyword.is_empty() {
            where_sql.push_str(" AND (name LIKE ? OR sub_title LIKE ?)");
        }
        if q.hours > 0 {
            where_sql.push_str(" AND update_stamp >= ?");
        }

        let pattern = format!("%{}%", q.keyword);
        let stamp_floor = Utc::now().timestamp() - q.hours * 3600;

        let count_sql = format!("SELECT COUNT(*) FROM search{where_sql}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if q.type_id > 0 {
            count_query = count_query.bind(q.type_id).bind(q.type_id);
        }
        if !q.keyword.is_empty() {
            count_query = count_query.bind(&pattern).bind(&pattern);
        }
        if q.hours > 0 {
            count_query = count_query.bind(stamp_floor);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let page = q.page.max(1);
        let page_size = q.page_size.max(1);
        let offset = (page - 1) * page_size;
        let rows_sql = format!(
            "SELECT mid, name, sub_title, initial, cid, pid, c_name, \
             update_stamp, remarks, hits FROM search{where_sql} \
             ORDER BY update_stamp DESC LIMIT ? OFFSET ?"
        );
        let mut rows_query = sqlx::query_as::<_, SearchInfo>(&rows_sql);
        if q.type_id > 0 {
            rows_query = rows_query.bind(q.type_id).bind(q.type_id);
        }
        if !q.keyword.is_empty() {
            rows_query = rows_query.bind(&pattern).bind(&pattern);
        }
        if q.hours > 0 {
            rows_query = rows_query.bind(stamp_floor);
        }
        let rows = rows_query
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((total, rows))
    }

    async fn by_mid(&self, mid: i64) -> Result<Option<SearchInfo>> {
        let row = sqlx::query_as::<_, SearchInfo>(
            "SELECT mid, name, sub_title, initial, cid, pid, c_name, \
             update_stamp, remarks, hits FROM search WHERE mid = ?",
        )
        .bind(mid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn count(&self) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM search")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

#[derive(Clone, Debug)]
pub struct MySqlFailureStore {
    pool: MySqlPool,
}

impl MySqlFailureStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FailureStore for MySqlFailureStore {
    async fn append(&self, record: &FailureRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO failure_records
                (origin_id, origin_name, uri, collect_type, page_number,
                 hour, cause, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.origin_id)
        .bind(&record.origin_name)
        .bind(&record.uri)
        .bind(record.collect_type)
        .bind(record.page_number)
        .bind(record.hour)
        .bind(&record.cause)
        .bind(record.status)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<FailureRecord>> {
        let rows = sqlx::query_as::<_, FailureRecord>(
            "SELECT id, origin_id, origin_name, uri, collect_type, \
             page_number, hour, cause, status, created_at \
             FROM failure_records WHERE status = 1 ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_retried(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE failure_records SET status = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_class_retried(
        &self,
        collect_type: CollectType,
        since: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE failure_records SET status = 0 \
             WHERE collect_type = ? AND created_at >= ? AND status = 1",
        )
        .bind(collect_type)
        .bind(since)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
