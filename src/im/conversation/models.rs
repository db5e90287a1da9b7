//! 会话模型定义

use crate::im::message::models::Message;
use crate::im::serialization::{deserialize_string_or_null, deserialize_vec_or_null};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 会话参与者（非拥有引用，只保存 ID 和展示名）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participants {
    /// 当前用户 ID
    #[serde(rename = "userID", default, deserialize_with = "deserialize_string_or_null")]
    pub user_id: String,
    /// 对方用户 ID
    #[serde(
        rename = "peerUserID",
        default,
        deserialize_with = "deserialize_string_or_null"
    )]
    pub peer_user_id: String,
    #[serde(
        rename = "peerNickname",
        default,
        deserialize_with = "deserialize_string_or_null"
    )]
    pub peer_nickname: String,
}

/// 两个用户之间的会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// 会话 ID（服务器分配）
    #[serde(rename = "conversationID")]
    pub id: String,
    #[serde(default)]
    pub participants: Participants,
    /// 按时间顺序的消息，内存中只追加
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub messages: Vec<Message>,
    /// 创建时间（毫秒），会话列表唯一的排序键（倒序）
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
    /// 配对后尚未开放的会话为 false
    #[serde(default)]
    pub available: bool,
    /// 未读数（每次对账重新计算，不持久化，也不信任服务器的值）
    #[serde(rename = "unreadCount", default, skip_deserializing)]
    pub unread_count: u32,
}

impl Conversation {
    pub fn new(id: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            participants: Participants::default(),
            messages: Vec::new(),
            created_at,
            available: false,
            unread_count: 0,
        }
    }

    pub fn contains_message(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    pub fn latest_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// 按已读游标计算未读数
    ///
    /// - 无游标：全部未读
    /// - 游标指向第 i 条：`len - (i + 1)`
    /// - 游标已不在消息列表中（本地重置等）：视为已读到末尾，记为 0
    pub fn unread_for_cursor(&self, last_read_message_id: Option<&str>) -> u32 {
        let total = self.messages.len();
        let unread = match last_read_message_id {
            None => total,
            Some(cursor) => match self.messages.iter().position(|m| m.id == cursor) {
                Some(index) => total.saturating_sub(index + 1),
                None => 0,
            },
        };
        u32::try_from(unread).unwrap_or(u32::MAX)
    }

    /// 去除重复消息 ID（保留首次出现），返回去除的条数
    pub(crate) fn dedup_messages(&mut self) -> usize {
        let before = self.messages.len();
        let mut seen = HashSet::with_capacity(before);
        self.messages.retain(|m| seen.insert(m.id.clone()));
        before - self.messages.len()
    }
}

/// 单个会话在存储中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    /// 本地没有该会话
    Absent,
    /// 正在从服务器拉取（matched 单拉或 opened 回退全量拉取）
    PendingFetch,
    /// 已存在但尚未开放
    Pending,
    /// 已开放，可以收发消息
    Available,
}

/// 发布给订阅方的不可变快照，按 created_at 倒序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationSnapshot {
    /// 每次发布递增
    pub version: u64,
    pub conversations: Vec<Conversation>,
}

impl ConversationSnapshot {
    pub fn total_unread(&self) -> u32 {
        self.conversations
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.unread_count))
    }

    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.conversations.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }
}
