//! 测试辅助：日志初始化、可编排的会话拉取服务、记录型监听器

use crate::im::conversation::api::ConversationFetcher;
use crate::im::conversation::listener::ConversationListener;
use crate::im::conversation::models::{Conversation, Participants};
use crate::im::message::models::Message;
use crate::im::read_cursor::store::ReadCursorStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

static INIT_LOGGER: Once = Once::new();

pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::EnvFilter;

        let filter_layer = EnvFilter::new("info,matchchat_sdk_core=debug,sqlx=warn");

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_test_writer();

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    });
}

pub fn message(conversation_id: &str, id: &str) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: "peer".to_string(),
        body: format!("body {}", id),
        sent_at: 0,
    }
}

pub fn conversation(id: &str, created_at: i64, message_ids: &[&str]) -> Conversation {
    let mut c = Conversation::new(id, created_at);
    c.available = true;
    c.participants = Participants {
        user_id: "me".to_string(),
        peer_user_id: format!("peer-{}", id),
        peer_nickname: format!("Peer {}", id),
    };
    c.messages = message_ids.iter().map(|m| message(id, m)).collect();
    c
}

/// 内存中的会话拉取服务，可模拟失败和延迟
#[derive(Default)]
pub struct FakeFetcher {
    conversations: Mutex<Vec<Conversation>>,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_get: AtomicBool,
    get_delay: Mutex<Option<Duration>>,
    list_delay: Mutex<Option<Duration>>,
}

impl FakeFetcher {
    pub fn with(conversations: Vec<Conversation>) -> Self {
        let fetcher = Self::default();
        fetcher.set(conversations);
        fetcher
    }

    pub fn set(&self, conversations: Vec<Conversation>) {
        *self.conversations.lock().unwrap() = conversations;
    }

    pub fn add(&self, conversation: Conversation) {
        self.conversations.lock().unwrap().push(conversation);
    }

    pub fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock().unwrap() = Some(delay);
    }

    /// 全量拉取的延迟；列表内容在调用时即已确定
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        *self.list_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl ConversationFetcher for FakeFetcher {
    async fn list_conversations(&self, _user_id: &str) -> Result<Vec<Conversation>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("模拟全量拉取失败");
        }
        let conversations = self.conversations.lock().unwrap().clone();
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(conversations)
    }

    async fn get_conversation(
        &self,
        _user_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.get_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_get.load(Ordering::SeqCst) {
            anyhow::bail!("模拟单个会话拉取失败");
        }
        self.conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("会话不存在: {}", conversation_id))
    }
}

/// 内存游标存储，可模拟读取失败
#[derive(Default)]
pub struct MemoryCursors {
    cursors: Mutex<HashMap<String, String>>,
    pub fail_reads: AtomicBool,
}

#[async_trait]
impl ReadCursorStore for MemoryCursors {
    async fn record_read(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        self.cursors
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), message_id.to_string());
        Ok(())
    }

    async fn all_cursors(&self) -> Result<HashMap<String, String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("模拟游标读取失败");
        }
        Ok(self.cursors.lock().unwrap().clone())
    }
}

/// 记录所有回调的监听器
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<String>>,
    pub totals: Mutex<Vec<u32>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ConversationListener for RecordingListener {
    async fn on_sync_server_start(&self) {
        self.push("start".to_string());
    }
    async fn on_sync_server_finish(&self) {
        self.push("finish".to_string());
    }
    async fn on_sync_server_failed(&self, _error: String) {
        self.push("failed".to_string());
    }
    async fn on_new_conversation(&self, conversations: Vec<Conversation>) {
        let ids: Vec<String> = conversations.into_iter().map(|c| c.id).collect();
        self.push(format!("new:{}", ids.join(",")));
    }
    async fn on_conversation_changed(&self, conversations: Vec<Conversation>) {
        let ids: Vec<String> = conversations.into_iter().map(|c| c.id).collect();
        self.push(format!("changed:{}", ids.join(",")));
    }
    async fn on_total_unread_message_count_changed(&self, total_unread_count: u32) {
        self.totals.lock().unwrap().push(total_unread_count);
    }
}
