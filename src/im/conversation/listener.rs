//! 会话监听器回调接口

use crate::im::conversation::models::Conversation;
use async_trait::async_trait;

/// 会话监听器
///
/// 回调在存储释放内部锁之后触发，实现方可以安全地回调存储的方法
#[async_trait]
pub trait ConversationListener: Send + Sync {
    /// 全量拉取开始
    async fn on_sync_server_start(&self);

    /// 全量拉取完成并已发布
    async fn on_sync_server_finish(&self);

    /// 全量拉取失败，本地仍保留上一次的快照
    async fn on_sync_server_failed(&self, error: String);

    /// 新会话
    async fn on_new_conversation(&self, conversations: Vec<Conversation>);

    /// 会话变更（可用状态、新消息、未读数）
    async fn on_conversation_changed(&self, conversations: Vec<Conversation>);

    /// 总未读消息数变更
    async fn on_total_unread_message_count_changed(&self, total_unread_count: u32);
}

/// 空实现（默认监听器）
pub struct EmptyConversationListener;

#[async_trait]
impl ConversationListener for EmptyConversationListener {
    async fn on_sync_server_start(&self) {}
    async fn on_sync_server_finish(&self) {}
    async fn on_sync_server_failed(&self, _error: String) {}
    async fn on_new_conversation(&self, _conversations: Vec<Conversation>) {}
    async fn on_conversation_changed(&self, _conversations: Vec<Conversation>) {}
    async fn on_total_unread_message_count_changed(&self, _total_unread_count: u32) {}
}
