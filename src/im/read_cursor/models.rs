//! 已读游标本地模型定义

use serde::{Deserialize, Serialize};

/// 单个会话的已读游标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalReadCursor {
    #[serde(rename = "conversationID")]
    pub conversation_id: String,
    /// 最后一条已读消息 ID
    #[serde(rename = "messageID")]
    pub message_id: String,
    /// 写入时间（毫秒）
    #[serde(rename = "updateTime")]
    pub update_time: i64,
}
