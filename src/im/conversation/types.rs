//! 会话 API DTO（响应结构体）

use crate::im::conversation::models::Conversation;
use crate::im::serialization::deserialize_vec_or_null;
use serde::Deserialize;

/// 全量会话响应（可直接从 API 响应的 data 字段反序列化）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllConversationsResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub conversations: Vec<Conversation>,
}
