//! 已读游标数据访问层（DAO）
//!
//! 负责 local_read_cursors 表的所有 sqlx 操作

use crate::im::read_cursor::models::LocalReadCursor;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

/// 已读游标 DAO（基于 sqlx）
#[derive(Clone)]
pub struct ReadCursorDao {
    db: Pool<Sqlite>,
}

impl ReadCursorDao {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// 初始化数据库表结构
    pub async fn init_db(&self) -> Result<()> {
        info!("[ReadCursorDAO/DB] 初始化已读游标表结构");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS local_read_cursors (
                conversation_id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL,
                update_time INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.db)
        .await
        .context("创建已读游标表失败")?;
        Ok(())
    }

    /// 插入或覆盖某个会话的已读游标
    pub async fn upsert_cursor(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO local_read_cursors (conversation_id, message_id, update_time)
            VALUES (?, ?, ?)
            ON CONFLICT(conversation_id) DO UPDATE SET
                message_id = excluded.message_id,
                update_time = excluded.update_time
            "#,
        )
        .bind(conversation_id)
        .bind(message_id)
        .bind(now)
        .execute(&self.db)
        .await
        .context("写入已读游标失败")?;

        debug!(
            "[ReadCursorDAO] 写入已读游标: conversationID={}, messageID={}",
            conversation_id, message_id
        );
        Ok(())
    }

    /// 读取所有已读游标
    pub async fn get_all_cursors(&self) -> Result<Vec<LocalReadCursor>> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id, message_id, update_time
            FROM local_read_cursors
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("查询已读游标失败")?;

        let cursors: Vec<LocalReadCursor> = rows
            .into_iter()
            .map(|row| LocalReadCursor {
                conversation_id: row.get("conversation_id"),
                message_id: row.get("message_id"),
                update_time: row.get("update_time"),
            })
            .collect();

        debug!("[ReadCursorDAO] 获取已读游标，共 {} 条", cursors.len());
        Ok(cursors)
    }

    /// 查询单个会话的已读游标
    pub async fn get_cursor(&self, conversation_id: &str) -> Result<Option<LocalReadCursor>> {
        let row = sqlx::query(
            r#"
            SELECT conversation_id, message_id, update_time
            FROM local_read_cursors
            WHERE conversation_id = ?
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.db)
        .await
        .context("查询已读游标失败")?;

        Ok(row.map(|row| LocalReadCursor {
            conversation_id: row.get("conversation_id"),
            message_id: row.get("message_id"),
            update_time: row.get("update_time"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::db::create_sqlite_pool;

    async fn memory_dao() -> ReadCursorDao {
        let pool = create_sqlite_pool("sqlite::memory:").await.unwrap();
        let dao = ReadCursorDao::new(pool);
        dao.init_db().await.unwrap();
        dao
    }

    #[tokio::test]
    async fn upsert_overwrites_previous_cursor() {
        let dao = memory_dao().await;
        dao.upsert_cursor("A", "m1").await.unwrap();
        dao.upsert_cursor("A", "m2").await.unwrap();
        dao.upsert_cursor("B", "m9").await.unwrap();

        let a = dao.get_cursor("A").await.unwrap().unwrap();
        assert_eq!(a.message_id, "m2");
        assert!(a.update_time > 0);

        let all = dao.get_all_cursors().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(dao.get_cursor("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn init_db_is_repeatable() {
        let dao = memory_dao().await;
        dao.upsert_cursor("A", "m1").await.unwrap();
        dao.init_db().await.unwrap();
        assert_eq!(dao.get_all_cursors().await.unwrap().len(), 1);
    }
}
