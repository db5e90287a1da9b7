//! 会话列表投影：把存储快照和会话状态转换为界面直接可用的行
//!
//! 只做展示层推导，不修改存储；投影结果是最新快照和最新会话状态的纯函数

use crate::im::conversation::models::{Conversation, ConversationSnapshot};
use crate::im::relationship::{resolve, MatchState, SessionState, UserProfile};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// 列表中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConversationRow {
    Conversation(ConversationItem),
    /// 列表为空时的占位行
    Placeholder,
}

/// 会话行的展示数据
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationItem {
    #[serde(rename = "conversationID")]
    pub conversation_id: String,
    #[serde(rename = "peerUserID")]
    pub peer_user_id: String,
    pub peer_nickname: String,
    /// 最后一条消息的正文预览
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    pub unread_count: u32,
    pub available: bool,
    pub match_state: MatchState,
}

impl ConversationItem {
    fn from_conversation(conversation: &Conversation, session: &SessionState) -> Self {
        let peer = UserProfile::new(conversation.participants.peer_user_id.clone());
        let latest = conversation.latest_message();
        Self {
            conversation_id: conversation.id.clone(),
            peer_user_id: peer.user_id.clone(),
            peer_nickname: conversation.participants.peer_nickname.clone(),
            last_message: latest.map(|m| m.body.clone()),
            last_message_at: latest.map(|m| m.sent_at),
            unread_count: conversation.unread_count,
            available: conversation.available,
            match_state: resolve(session, &peer).state,
        }
    }
}

/// 投影：保持存储的顺序，空列表替换为单个占位行
pub fn project(conversations: &[Conversation], session: &SessionState) -> Vec<ConversationRow> {
    if conversations.is_empty() {
        return vec![ConversationRow::Placeholder];
    }
    conversations
        .iter()
        .map(|c| ConversationRow::Conversation(ConversationItem::from_conversation(c, session)))
        .collect()
}

/// 持续投影的后台任务
///
/// 快照或会话状态任一变化都会重新投影；结果不变时不通知订阅者
pub struct ConversationListProjector {
    rows: watch::Receiver<Arc<Vec<ConversationRow>>>,
    handle: JoinHandle<()>,
}

impl ConversationListProjector {
    pub fn spawn(
        mut snapshots: watch::Receiver<Arc<ConversationSnapshot>>,
        mut session: watch::Receiver<Arc<SessionState>>,
    ) -> Self {
        let initial = {
            let snapshot = snapshots.borrow_and_update().clone();
            let state = session.borrow_and_update().clone();
            project(&snapshot.conversations, &state)
        };
        let (tx, rows) = watch::channel(Arc::new(initial));

        let handle = tokio::spawn(async move {
            info!("[Projector] 会话列表投影任务已启动");
            loop {
                tokio::select! {
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = session.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let snapshot = snapshots.borrow_and_update().clone();
                let state = session.borrow_and_update().clone();
                let projected = project(&snapshot.conversations, &state);
                let published = tx.send_if_modified(|current| {
                    if **current == projected {
                        return false;
                    }
                    *current = Arc::new(projected);
                    true
                });
                if published {
                    debug!(
                        "[Projector] 重新投影: snapshot version={}, 行数={}",
                        snapshot.version,
                        tx.borrow().len()
                    );
                }
            }
            info!("[Projector] 上游已关闭，投影任务退出");
        });

        Self { rows, handle }
    }

    /// 最新投影结果
    pub fn rows(&self) -> Arc<Vec<ConversationRow>> {
        self.rows.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<ConversationRow>>> {
        self.rows.clone()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for ConversationListProjector {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
