//! 推送事件定义
//!
//! 推送解码器（外部协作方）交付的事件形如
//! `{"kind": "matched" | "opened" | "message", "conversationID": "...", "message": {...}}`

use crate::im::message::types::MessagePayload;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 已解码的推送事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PushEvent {
    /// 配对成功，服务器已为双方创建会话
    Matched {
        #[serde(rename = "conversationID", alias = "conversationId", default)]
        conversation_id: String,
    },
    /// 会话已开放，可以互发消息
    Opened {
        #[serde(rename = "conversationID", alias = "conversationId", default)]
        conversation_id: String,
    },
    /// 新消息
    Message {
        #[serde(rename = "conversationID", alias = "conversationId", default)]
        conversation_id: String,
        #[serde(alias = "messagePayload", default)]
        message: Option<MessagePayload>,
    },
}

impl PushEvent {
    /// 从 JSON 解码；未知 kind 或格式错误返回错误
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("解析推送事件失败")
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            PushEvent::Matched { conversation_id }
            | PushEvent::Opened { conversation_id }
            | PushEvent::Message {
                conversation_id, ..
            } => conversation_id,
        }
    }

    /// 事件类型名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::Matched { .. } => "matched",
            PushEvent::Opened { .. } => "opened",
            PushEvent::Message { .. } => "message",
        }
    }

    pub fn matched(conversation_id: impl Into<String>) -> Self {
        PushEvent::Matched {
            conversation_id: conversation_id.into(),
        }
    }

    pub fn opened(conversation_id: impl Into<String>) -> Self {
        PushEvent::Opened {
            conversation_id: conversation_id.into(),
        }
    }

    pub fn message(conversation_id: impl Into<String>, payload: MessagePayload) -> Self {
        PushEvent::Message {
            conversation_id: conversation_id.into(),
            message: Some(payload),
        }
    }
}
