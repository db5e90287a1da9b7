//! 推送消息载荷
//!
//! 推送通道送来的消息字段都可能缺失，转换为 [`Message`] 前必须先校验

use crate::im::message::models::Message;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// 推送事件里携带的消息载荷（未校验）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "messageID", default)]
    pub id: Option<String>,
    #[serde(rename = "conversationID", default)]
    pub conversation_id: Option<String>,
    #[serde(rename = "senderID", default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "sentAt", default)]
    pub sent_at: Option<i64>,
}

impl MessagePayload {
    /// 校验并转换为消息
    ///
    /// 载荷未携带会话 ID 时沿用事件上的会话 ID；两者都存在但不一致时拒绝
    pub fn into_message(self, event_conversation_id: &str) -> Result<Message> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => bail!("推送消息缺少消息ID"),
        };

        let conversation_id = match self.conversation_id {
            Some(cid) if !cid.is_empty() => {
                if !event_conversation_id.is_empty() && cid != event_conversation_id {
                    bail!(
                        "推送消息的会话ID不一致: 事件={}, 消息={}",
                        event_conversation_id,
                        cid
                    );
                }
                cid
            }
            _ => event_conversation_id.to_string(),
        };
        if conversation_id.is_empty() {
            bail!("推送消息缺少会话ID: messageID={}", id);
        }

        Ok(Message {
            id,
            conversation_id,
            sender_id: self.sender_id.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            sent_at: self.sent_at.unwrap_or_default(),
        })
    }
}
