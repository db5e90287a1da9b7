//! 已读游标模块
//!
//! 本地持久化每个会话最后一条已读消息 ID，用于计算未读数

pub mod dao;
pub mod models;
pub mod store;

pub use dao::ReadCursorDao;
pub use models::LocalReadCursor;
pub use store::{ReadCursorStore, SqliteReadCursorStore};
