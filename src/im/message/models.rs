//! 消息模型定义

use crate::im::serialization::deserialize_string_or_null;
use serde::{Deserialize, Serialize};

/// 会话中的一条消息
///
/// 创建后不再修改，只会被追加到所属会话的消息序列末尾
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 消息 ID，会话内唯一
    #[serde(rename = "messageID")]
    pub id: String,
    /// 所属会话 ID
    #[serde(
        rename = "conversationID",
        default,
        deserialize_with = "deserialize_string_or_null"
    )]
    pub conversation_id: String,
    #[serde(
        rename = "senderID",
        default,
        deserialize_with = "deserialize_string_or_null"
    )]
    pub sender_id: String,
    #[serde(default, deserialize_with = "deserialize_string_or_null")]
    pub body: String,
    /// 发送时间（毫秒）
    #[serde(rename = "sentAt", default)]
    pub sent_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_null_sender_decodes_as_empty() {
        let m: Message =
            serde_json::from_str(r#"{"messageID":"1","conversationID":null,"body":"hi"}"#).unwrap();
        assert_eq!(m.id, "1");
        assert!(m.conversation_id.is_empty());
        assert!(m.sender_id.is_empty());
        assert_eq!(m.body, "hi");
        assert_eq!(m.sent_at, 0);
    }
}
