//! 已读游标存储接口及 SQLite 实现

use crate::im::read_cursor::dao::ReadCursorDao;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use tracing::{info, warn};

/// 已读游标存储
///
/// 写入方是 UI 边界（打开会话时调用），读取方是会话存储的每一次对账。
/// 单次读写各自原子即可，两者之间不需要额外加锁。
#[async_trait]
pub trait ReadCursorStore: Send + Sync {
    /// 记录某会话最后已读的消息，覆盖旧值
    async fn record_read(&self, conversation_id: &str, message_id: &str) -> Result<()>;

    /// 读取全部游标：conversationID -> messageID
    async fn all_cursors(&self) -> Result<HashMap<String, String>>;
}

/// 基于 SQLite 的已读游标存储（重启后仍然保留）
#[derive(Clone)]
pub struct SqliteReadCursorStore {
    dao: ReadCursorDao,
}

impl SqliteReadCursorStore {
    /// 使用共享连接池创建存储，并确保表结构存在
    pub async fn open(db: Pool<Sqlite>) -> Result<Self> {
        let dao = ReadCursorDao::new(db);
        dao.init_db().await.context("初始化已读游标存储失败")?;
        info!("[ReadCursor] 已读游标存储就绪");
        Ok(Self { dao })
    }
}

#[async_trait]
impl ReadCursorStore for SqliteReadCursorStore {
    async fn record_read(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        if conversation_id.is_empty() || message_id.is_empty() {
            warn!(
                "[ReadCursor] 忽略无效的已读游标: conversationID='{}', messageID='{}'",
                conversation_id, message_id
            );
            anyhow::bail!("已读游标的会话ID和消息ID不能为空");
        }
        self.dao.upsert_cursor(conversation_id, message_id).await
    }

    async fn all_cursors(&self) -> Result<HashMap<String, String>> {
        let cursors = self.dao.get_all_cursors().await?;
        Ok(cursors
            .into_iter()
            .map(|c| (c.conversation_id, c.message_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::db::create_sqlite_pool;

    #[tokio::test]
    async fn record_read_is_visible_to_next_read() {
        let pool = create_sqlite_pool("sqlite::memory:").await.unwrap();
        let store = SqliteReadCursorStore::open(pool).await.unwrap();

        assert!(store.all_cursors().await.unwrap().is_empty());

        store.record_read("A", "1").await.unwrap();
        store.record_read("A", "1").await.unwrap();
        store.record_read("B", "7").await.unwrap();
        store.record_read("A", "2").await.unwrap();

        let cursors = store.all_cursors().await.unwrap();
        assert_eq!(cursors.len(), 2);
        assert_eq!(cursors.get("A").map(String::as_str), Some("2"));
        assert_eq!(cursors.get("B").map(String::as_str), Some("7"));
    }

    #[tokio::test]
    async fn empty_ids_are_rejected() {
        let pool = create_sqlite_pool("sqlite::memory:").await.unwrap();
        let store = SqliteReadCursorStore::open(pool).await.unwrap();

        assert!(store.record_read("", "1").await.is_err());
        assert!(store.record_read("A", "").await.is_err());
        assert!(store.all_cursors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cursors_survive_reopen() {
        let path = std::env::temp_dir().join(format!(
            "matchchat-cursor-{}.db",
            uuid::Uuid::new_v4()
        ));
        let url = format!("sqlite://{}?mode=rwc", path.display());

        {
            let pool = create_sqlite_pool(&url).await.unwrap();
            let store = SqliteReadCursorStore::open(pool.clone()).await.unwrap();
            store.record_read("A", "3").await.unwrap();
            pool.close().await;
        }

        let pool = create_sqlite_pool(&url).await.unwrap();
        let store = SqliteReadCursorStore::open(pool.clone()).await.unwrap();
        let cursors = store.all_cursors().await.unwrap();
        assert_eq!(cursors.get("A").map(String::as_str), Some("3"));
        pool.close().await;
        let _ = std::fs::remove_file(path);
    }
}
