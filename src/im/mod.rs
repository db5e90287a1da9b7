pub mod client;
pub mod conversation;
pub mod db;
pub mod message;
pub mod push;
pub mod read_cursor;
pub mod relationship;
pub mod serialization;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出会话同步相关类型
pub use conversation::{ConversationFetcher, ConversationListener, ConversationStore};
