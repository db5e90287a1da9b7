//! 会话模块
//!
//! 会话列表的对账引擎：合并服务器全量拉取、推送事件和本地已读游标，
//! 维护按创建时间倒序的会话列表及未读数，并向订阅方发布快照

pub mod api;
pub mod listener;
pub mod models;
pub mod projector;
pub mod service;
pub mod types;

// 重新导出主要类型和函数
pub use api::{ConversationApi, ConversationFetcher};
pub use listener::{ConversationListener, EmptyConversationListener};
pub use models::{Conversation, ConversationPhase, ConversationSnapshot, Participants};
pub use projector::{ConversationItem, ConversationListProjector, ConversationRow};
pub use service::ConversationStore;
pub use types::AllConversationsResp;
