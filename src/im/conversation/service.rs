//! 会话对账服务层
//!
//! 会话列表在内存中由一把异步互斥锁保护。全量拉取替换、matched 插入、
//! opened 更新、消息追加以及未读数重算都在这把锁内完成，锁内的每次变更
//! 都紧跟一次对账：读取全部已读游标、重算所有会话的未读数、发布完整快照。
//!
//! 网络 I/O（全量拉取、单个会话拉取）在锁外进行，期间其他会话的事件照常处理。
//! 全量拉取进行期间的推送变更会记入变更日志，替换时重放到拉取结果上；
//! 比已生效的拉取更早发起的全量拉取结果直接丢弃。
//! 同一会话 ID 的 matched 单拉与 opened 回退拉取通过按 ID 的异步锁串行化。

use crate::im::conversation::api::ConversationFetcher;
use crate::im::conversation::listener::{ConversationListener, EmptyConversationListener};
use crate::im::conversation::models::{Conversation, ConversationPhase, ConversationSnapshot};
use crate::im::message::models::Message;
use crate::im::push::event::PushEvent;
use crate::im::read_cursor::store::ReadCursorStore;
use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

type FetchLocks = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// 全量拉取期间发生的推送变更
#[derive(Debug, Clone)]
enum Mutation {
    Inserted(Conversation),
    Opened(String),
    Appended(Message),
}

/// 锁内状态
#[derive(Default)]
struct StoreState {
    /// 按 created_at 倒序的会话列表
    conversations: Vec<Conversation>,
    /// 每次推送变更递增
    mutation_seq: u64,
    /// (序号, 变更)，只在有全量拉取进行时记录
    journal: Vec<(u64, Mutation)>,
}

impl StoreState {
    fn record(&mut self, mutation: Mutation, populating: bool) {
        self.mutation_seq += 1;
        if populating {
            self.journal.push((self.mutation_seq, mutation));
        } else if !self.journal.is_empty() {
            self.journal.clear();
        }
    }
}

/// 全量拉取的代次记录
#[derive(Debug, Default)]
struct PopulateTracker {
    next_generation: u64,
    /// 最近一次生效的代次
    applied_generation: u64,
    /// 进行中的代次 -> 发起时的变更序号
    in_flight: HashMap<u64, u64>,
}

/// 进行中的全量拉取登记；任务被取消时同样会注销
struct PopulateLease<'a> {
    tracker: &'a std::sync::Mutex<PopulateTracker>,
    generation: u64,
}

impl Drop for PopulateLease<'_> {
    fn drop(&mut self) {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.generation);
    }
}

/// 按会话 ID 的拉取锁；没有其他任务持有或等待时在释放时移除
struct FetchLease<'a> {
    locks: &'a FetchLocks,
    conversation_id: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for FetchLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // 表内一份加上本租约一份
        let idle = locks
            .get(&self.conversation_id)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2);
        if idle {
            locks.remove(&self.conversation_id);
        }
    }
}

/// 会话存储（对账引擎）
pub struct ConversationStore {
    user_id: String,
    fetcher: Arc<dyn ConversationFetcher>,
    cursors: Arc<dyn ReadCursorStore>,
    listener: Arc<dyn ConversationListener>,
    state: Mutex<StoreState>,
    populates: std::sync::Mutex<PopulateTracker>,
    /// 存在条目即表示该会话有拉取在进行或排队
    fetch_locks: FetchLocks,
    snapshot_tx: watch::Sender<Arc<ConversationSnapshot>>,
}

impl ConversationStore {
    /// 创建会话存储（使用默认空监听器）
    pub fn new(
        user_id: impl Into<String>,
        fetcher: Arc<dyn ConversationFetcher>,
        cursors: Arc<dyn ReadCursorStore>,
    ) -> Self {
        Self::with_listener(user_id, fetcher, cursors, Arc::new(EmptyConversationListener))
    }

    /// 创建会话存储（带自定义监听器）
    pub fn with_listener(
        user_id: impl Into<String>,
        fetcher: Arc<dyn ConversationFetcher>,
        cursors: Arc<dyn ReadCursorStore>,
        listener: Arc<dyn ConversationListener>,
    ) -> Self {
        let user_id = user_id.into();
        info!("[ConvStore] 创建会话存储，用户ID: {}", user_id);
        let (snapshot_tx, _rx) = watch::channel(Arc::new(ConversationSnapshot::default()));
        Self {
            user_id,
            fetcher,
            cursors,
            listener,
            state: Mutex::new(StoreState::default()),
            populates: std::sync::Mutex::new(PopulateTracker::default()),
            fetch_locks: std::sync::Mutex::new(HashMap::new()),
            snapshot_tx,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// 订阅快照；接收端总能拿到最新一次发布的快照
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConversationSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// 最近一次发布的快照
    pub fn snapshot(&self) -> Arc<ConversationSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn get_conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.snapshot_tx.borrow().get(conversation_id).cloned()
    }

    /// 获取总未读消息数
    pub fn total_unread_count(&self) -> u32 {
        self.snapshot_tx.borrow().total_unread()
    }

    /// 查询单个会话所处阶段
    pub async fn phase(&self, conversation_id: &str) -> ConversationPhase {
        {
            let state = self.state.lock().await;
            if let Some(c) = state.conversations.iter().find(|c| c.id == conversation_id) {
                return if c.available {
                    ConversationPhase::Available
                } else {
                    ConversationPhase::Pending
                };
            }
        }
        let locks = self
            .fetch_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks.contains_key(conversation_id) {
            ConversationPhase::PendingFetch
        } else {
            ConversationPhase::Absent
        }
    }

    /// 全量拉取并整体替换内存中的会话列表
    ///
    /// 拉取期间的推送变更在替换后重放；拉取失败时保留上一次的快照，
    /// 错误返回给调用方并通知监听器
    pub async fn populate(&self) -> Result<()> {
        info!("[ConvStore] 🔄 开始全量拉取会话，用户ID: {}", self.user_id);
        self.listener.on_sync_server_start().await;

        let (generation, since) = {
            let state = self.state.lock().await;
            let mut tracker = self.populates.lock().unwrap_or_else(PoisonError::into_inner);
            tracker.next_generation += 1;
            let generation = tracker.next_generation;
            tracker.in_flight.insert(generation, state.mutation_seq);
            (generation, state.mutation_seq)
        };
        let _lease = PopulateLease {
            tracker: &self.populates,
            generation,
        };

        let fetched = match self.fetcher.list_conversations(&self.user_id).await {
            Ok(list) => list,
            Err(e) => {
                error!("[ConvStore] ❌ 全量拉取会话失败，保留当前快照: {:?}", e);
                self.listener.on_sync_server_failed(e.to_string()).await;
                return Err(e.context("全量拉取会话失败"));
            }
        };
        let mut fresh = Self::normalize(fetched);

        let applied = {
            let mut state = self.state.lock().await;
            let (stale, oldest_other) = {
                let mut tracker = self.populates.lock().unwrap_or_else(PoisonError::into_inner);
                let stale = generation < tracker.applied_generation;
                if !stale {
                    tracker.applied_generation = generation;
                }
                let oldest_other = tracker
                    .in_flight
                    .iter()
                    .filter(|(g, _)| **g != generation)
                    .map(|(_, seq)| *seq)
                    .min();
                (stale, oldest_other)
            };

            let applied = if stale {
                info!(
                    "[ConvStore] 已有更新的全量拉取生效，丢弃本次结果: generation={}",
                    generation
                );
                None
            } else {
                let replayed = Self::replay(&mut fresh, &state.journal, since);
                let previous_total = self.snapshot_tx.borrow().total_unread();
                let previous: HashMap<String, Conversation> = state
                    .conversations
                    .drain(..)
                    .map(|c| (c.id.clone(), c))
                    .collect();
                state.conversations = fresh;
                let snapshot = self
                    .reconcile_and_publish(state.conversations.as_mut_slice())
                    .await;

                let mut new_ids = Vec::new();
                let mut changed_ids = Vec::new();
                for c in &snapshot.conversations {
                    match previous.get(&c.id) {
                        None => new_ids.push(c.id.clone()),
                        Some(old) if old != c => changed_ids.push(c.id.clone()),
                        Some(_) => {}
                    }
                }
                let removed = previous
                    .keys()
                    .filter(|id| snapshot.get(id).is_none())
                    .count();
                info!(
                    "[ConvStore] 全量替换完成 - 会话数: {}, 新增: {}, 变更: {}, 移除: {}, 重放: {}",
                    snapshot.len(),
                    new_ids.len(),
                    changed_ids.len(),
                    removed,
                    replayed
                );
                Some((snapshot, previous_total, new_ids, changed_ids))
            };

            match oldest_other {
                Some(seq) => state.journal.retain(|(s, _)| *s > seq),
                None => state.journal.clear(),
            }
            applied
        };

        if let Some((snapshot, previous_total, new_ids, changed_ids)) = applied {
            self.notify(&snapshot, previous_total, &new_ids, &changed_ids)
                .await;
        }
        self.listener.on_sync_server_finish().await;
        Ok(())
    }

    /// matched 推送：本地没有该会话时拉取单个会话并插入
    ///
    /// 已存在时不做任何事；拉取失败时会话保持缺失，等下一次全量拉取自愈
    pub async fn handle_matched(&self, conversation_id: &str) -> Result<()> {
        if conversation_id.is_empty() {
            warn!("[ConvStore] matched 事件缺少会话ID，丢弃");
            bail!("matched 事件缺少会话ID");
        }

        let lease = self.fetch_lease(conversation_id);
        let _guard = lease.lock.lock().await;
        self.fetch_and_insert(conversation_id).await
    }

    /// opened 推送：会话存在时原地置为可用；不存在时回退为一次全量拉取
    pub async fn handle_opened(&self, conversation_id: &str) -> Result<()> {
        if conversation_id.is_empty() {
            warn!("[ConvStore] opened 事件缺少会话ID，丢弃");
            bail!("opened 事件缺少会话ID");
        }

        let lease = self.fetch_lease(conversation_id);
        let _guard = lease.lock.lock().await;
        self.open_or_refetch(conversation_id).await
    }

    /// message 推送：追加到已存在的会话，按消息 ID 去重
    pub async fn handle_message(&self, message: Message) -> Result<()> {
        if message.id.is_empty() || message.conversation_id.is_empty() {
            warn!(
                "[ConvStore] 消息缺少ID或会话ID，丢弃: messageID='{}', conversationID='{}'",
                message.id, message.conversation_id
            );
            bail!("消息缺少ID或会话ID");
        }
        let conversation_id = message.conversation_id.clone();

        let (snapshot, previous_total) = {
            let mut state = self.state.lock().await;
            let Some(index) = state
                .conversations
                .iter()
                .position(|c| c.id == conversation_id)
            else {
                info!(
                    "[ConvStore] 消息所属会话不在本地，丢弃: conversationID={}, messageID={}",
                    conversation_id, message.id
                );
                return Ok(());
            };
            if state.conversations[index].contains_message(&message.id) {
                debug!(
                    "[ConvStore] 重复消息，忽略: conversationID={}, messageID={}",
                    conversation_id, message.id
                );
                return Ok(());
            }

            let previous_total = self.snapshot_tx.borrow().total_unread();
            debug!(
                "[ConvStore] 追加消息: conversationID={}, messageID={}",
                conversation_id, message.id
            );
            state.record(Mutation::Appended(message.clone()), self.populating());
            state.conversations[index].messages.push(message);
            let snapshot = self
                .reconcile_and_publish(state.conversations.as_mut_slice())
                .await;
            (snapshot, previous_total)
        };

        self.notify(&snapshot, previous_total, &[], &[conversation_id])
            .await;
        Ok(())
    }

    /// 应用一个推送事件；载荷不合法时返回错误且不修改状态
    pub async fn apply_push_event(&self, event: PushEvent) -> Result<()> {
        debug!(
            "[ConvStore] 处理推送事件: kind={}, conversationID={}",
            event.kind(),
            event.conversation_id()
        );
        match event {
            PushEvent::Matched { conversation_id } => self.handle_matched(&conversation_id).await,
            PushEvent::Opened { conversation_id } => self.handle_opened(&conversation_id).await,
            PushEvent::Message {
                conversation_id,
                message,
            } => {
                let payload = message.ok_or_else(|| {
                    anyhow::anyhow!("message 事件缺少消息载荷: conversationID={}", conversation_id)
                })?;
                let message = payload.into_message(&conversation_id)?;
                self.handle_message(message).await
            }
        }
    }

    /// UI 打开会话时调用：记录已读游标并立即重新发布
    pub async fn mark_read(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        self.cursors
            .record_read(conversation_id, message_id)
            .await
            .context("记录已读游标失败")?;
        info!(
            "[ConvStore] 📖 已读游标更新: conversationID={}, messageID={}",
            conversation_id, message_id
        );
        self.refresh_unread().await;
        Ok(())
    }

    /// 不做变更，仅重新对账并发布
    pub async fn refresh_unread(&self) {
        let (snapshot, previous_total, changed_ids) = {
            let mut state = self.state.lock().await;
            let previous_total = self.snapshot_tx.borrow().total_unread();
            let before: HashMap<String, u32> = state
                .conversations
                .iter()
                .map(|c| (c.id.clone(), c.unread_count))
                .collect();
            let snapshot = self
                .reconcile_and_publish(state.conversations.as_mut_slice())
                .await;
            let changed_ids: Vec<String> = snapshot
                .conversations
                .iter()
                .filter(|c| before.get(&c.id) != Some(&c.unread_count))
                .map(|c| c.id.clone())
                .collect();
            (snapshot, previous_total, changed_ids)
        };

        self.notify(&snapshot, previous_total, &[], &changed_ids)
            .await;
    }

    async fn contains(&self, conversation_id: &str) -> bool {
        self.state
            .lock()
            .await
            .conversations
            .iter()
            .any(|c| c.id == conversation_id)
    }

    /// 是否有全量拉取正在进行
    fn populating(&self) -> bool {
        !self
            .populates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .is_empty()
    }

    /// 调用方必须持有该会话的拉取锁
    async fn fetch_and_insert(&self, conversation_id: &str) -> Result<()> {
        if self.contains(conversation_id).await {
            debug!(
                "[ConvStore] matched 会话已存在，忽略: conversationID={}",
                conversation_id
            );
            return Ok(());
        }

        info!(
            "[ConvStore] 🆕 matched 会话不在本地，拉取单个会话: conversationID={}",
            conversation_id
        );
        let conversation = match self
            .fetcher
            .get_conversation(&self.user_id, conversation_id)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "[ConvStore] ⚠️ 拉取单个会话失败，等待下一次全量拉取: conversationID={}, 错误: {:?}",
                    conversation_id, e
                );
                return Err(e.context(format!("拉取单个会话失败: {}", conversation_id)));
            }
        };
        if conversation.id != conversation_id {
            warn!(
                "[ConvStore] 服务器返回的会话ID不一致: 请求={}, 返回={}",
                conversation_id, conversation.id
            );
            bail!(
                "服务器返回的会话ID不一致: 请求={}, 返回={}",
                conversation_id,
                conversation.id
            );
        }

        self.insert_conversation(conversation).await;
        Ok(())
    }

    /// 按 created_at 插入，不改变已有会话的相对顺序
    async fn insert_conversation(&self, mut conversation: Conversation) {
        let dropped = conversation.dedup_messages();
        if dropped > 0 {
            warn!(
                "[ConvStore] 会话 {} 含 {} 条重复消息，已去重",
                conversation.id, dropped
            );
        }
        let conversation_id = conversation.id.clone();

        let (snapshot, previous_total) = {
            let mut state = self.state.lock().await;
            if state.conversations.iter().any(|c| c.id == conversation_id) {
                debug!(
                    "[ConvStore] 会话在拉取期间已由全量拉取写入，忽略: conversationID={}",
                    conversation_id
                );
                return;
            }
            let previous_total = self.snapshot_tx.borrow().total_unread();
            let index = state
                .conversations
                .partition_point(|c| c.created_at >= conversation.created_at);
            info!(
                "[ConvStore] 插入会话: conversationID={}, 位置: {}, available: {}",
                conversation_id, index, conversation.available
            );
            state.record(Mutation::Inserted(conversation.clone()), self.populating());
            state.conversations.insert(index, conversation);
            let snapshot = self
                .reconcile_and_publish(state.conversations.as_mut_slice())
                .await;
            (snapshot, previous_total)
        };

        self.notify(&snapshot, previous_total, &[conversation_id], &[])
            .await;
    }

    /// 调用方必须持有该会话的拉取锁
    async fn open_or_refetch(&self, conversation_id: &str) -> Result<()> {
        let (snapshot, previous_total) = {
            let mut state = self.state.lock().await;
            let Some(index) = state
                .conversations
                .iter()
                .position(|c| c.id == conversation_id)
            else {
                drop(state);
                info!(
                    "[ConvStore] opened 会话不在本地，回退为全量拉取: conversationID={}",
                    conversation_id
                );
                return self.populate().await;
            };
            if state.conversations[index].available {
                debug!(
                    "[ConvStore] 会话已是可用状态: conversationID={}",
                    conversation_id
                );
                return Ok(());
            }

            let previous_total = self.snapshot_tx.borrow().total_unread();
            state.record(Mutation::Opened(conversation_id.to_string()), self.populating());
            state.conversations[index].available = true;
            info!("[ConvStore] 会话已开放: conversationID={}", conversation_id);
            let snapshot = self
                .reconcile_and_publish(state.conversations.as_mut_slice())
                .await;
            (snapshot, previous_total)
        };

        self.notify(&snapshot, previous_total, &[], &[conversation_id.to_string()])
            .await;
        Ok(())
    }

    /// 对账：读取全部游标，重算所有会话的未读数并发布快照
    ///
    /// 调用方必须持有状态锁
    async fn reconcile_and_publish(&self, list: &mut [Conversation]) -> Arc<ConversationSnapshot> {
        let cursors = match self.cursors.all_cursors().await {
            Ok(cursors) => cursors,
            Err(e) => {
                warn!(
                    "[ConvStore] ⚠️ 读取已读游标失败，按无游标计算未读数: {:?}",
                    e
                );
                HashMap::new()
            }
        };

        for conv in list.iter_mut() {
            conv.unread_count = conv.unread_for_cursor(cursors.get(&conv.id).map(String::as_str));
        }
        debug_assert!(list
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));

        let version = self.snapshot_tx.borrow().version + 1;
        let snapshot = Arc::new(ConversationSnapshot {
            version,
            conversations: list.to_vec(),
        });
        self.snapshot_tx.send_replace(snapshot.clone());
        debug!(
            "[ConvStore] 📢 发布快照: version={}, 会话数={}, 总未读数={}",
            version,
            snapshot.len(),
            snapshot.total_unread()
        );
        snapshot
    }

    async fn notify(
        &self,
        snapshot: &ConversationSnapshot,
        previous_total: u32,
        new_ids: &[String],
        changed_ids: &[String],
    ) {
        let pick = |ids: &[String]| -> Vec<Conversation> {
            ids.iter()
                .filter_map(|id| snapshot.get(id).cloned())
                .collect()
        };

        if !new_ids.is_empty() {
            self.listener.on_new_conversation(pick(new_ids)).await;
        }
        if !changed_ids.is_empty() {
            self.listener.on_conversation_changed(pick(changed_ids)).await;
        }
        let total = snapshot.total_unread();
        if total != previous_total {
            debug!(
                "[ConvStore] 总未读数变更: {} -> {}",
                previous_total, total
            );
            self.listener
                .on_total_unread_message_count_changed(total)
                .await;
        }
    }

    /// 去掉空 ID 和重复会话（保留首次出现），消息去重，按 created_at 倒序排列
    fn normalize(fetched: Vec<Conversation>) -> Vec<Conversation> {
        let mut seen = HashSet::with_capacity(fetched.len());
        let mut fresh: Vec<Conversation> = Vec::with_capacity(fetched.len());
        for mut conv in fetched {
            if conv.id.is_empty() {
                warn!("[ConvStore] 服务器返回了空ID的会话，忽略");
                continue;
            }
            if !seen.insert(conv.id.clone()) {
                warn!("[ConvStore] 服务器返回了重复会话，忽略: {}", conv.id);
                continue;
            }
            conv.dedup_messages();
            for m in conv.messages.iter_mut().filter(|m| m.conversation_id.is_empty()) {
                m.conversation_id = conv.id.clone();
            }
            fresh.push(conv);
        }
        fresh.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        fresh
    }

    /// 把序号大于 `since` 的变更重放到拉取结果上，返回实际生效的条数
    ///
    /// 拉取结果已包含的会话和消息保持服务器版本
    fn replay(fresh: &mut Vec<Conversation>, journal: &[(u64, Mutation)], since: u64) -> usize {
        let mut replayed = 0;
        for (_, mutation) in journal.iter().filter(|(seq, _)| *seq > since) {
            match mutation {
                Mutation::Inserted(conversation) => {
                    if fresh.iter().any(|c| c.id == conversation.id) {
                        continue;
                    }
                    let index = fresh.partition_point(|c| c.created_at >= conversation.created_at);
                    fresh.insert(index, conversation.clone());
                }
                Mutation::Opened(id) => match fresh.iter_mut().find(|c| &c.id == id) {
                    Some(c) if !c.available => c.available = true,
                    _ => continue,
                },
                Mutation::Appended(message) => {
                    match fresh
                        .iter_mut()
                        .find(|c| c.id == message.conversation_id)
                    {
                        Some(c) if !c.contains_message(&message.id) => {
                            c.messages.push(message.clone())
                        }
                        _ => continue,
                    }
                }
            }
            replayed += 1;
        }
        if replayed > 0 {
            debug!("[ConvStore] 重放拉取期间的推送变更: {} 条", replayed);
        }
        replayed
    }

    fn fetch_lease(&self, conversation_id: &str) -> FetchLease<'_> {
        let lock = self
            .fetch_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        FetchLease {
            locks: &self.fetch_locks,
            conversation_id: conversation_id.to_string(),
            lock,
        }
    }
}
