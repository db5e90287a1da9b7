//! SQLite 数据库工具：统一创建连接池

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::info;

/// 创建 SQLite 连接池
///
/// `:memory:` 数据库每个连接都是独立的库，因此只允许一个连接
pub async fn create_sqlite_pool(db_url: &str) -> Result<Pool<Sqlite>> {
    let in_memory = db_url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { 5 };
    info!(
        "[DB] 创建SQLite连接池: {}, 最大连接数: {}",
        db_url, max_connections
    );
    let mut options = SqlitePoolOptions::new().max_connections(max_connections);
    if in_memory {
        // 连接被回收时内存库随之丢失
        options = options.idle_timeout(None).max_lifetime(None);
    }
    let pool = options
        .connect(db_url)
        .await
        .context(format!("连接SQLite数据库失败: {}", db_url))?;
    Ok(pool)
}
