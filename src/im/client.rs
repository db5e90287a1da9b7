//! 客户端装配
//!
//! 把连接池、已读游标存储、HTTP 拉取服务、会话存储、推送总线、分发任务
//! 和列表投影组装在一起，供 UI 层或 CLI 直接使用。

use crate::im::conversation::{
    api::{ConversationApi, ConversationFetcher},
    listener::{ConversationListener, EmptyConversationListener},
    projector::{project, ConversationListProjector, ConversationRow},
    service::ConversationStore,
};
use crate::im::db::create_sqlite_pool;
use crate::im::push::{spawn_push_dispatcher, PushEvent, PushEventBus};
use crate::im::read_cursor::{ReadCursorStore, SqliteReadCursorStore};
use crate::im::relationship::{Session, SessionState};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// 用户 ID
    pub user_id: String,
    /// 认证 token
    pub token: String,
    /// HTTP API 基础地址
    pub api_base_url: String,
    /// 已读游标使用的本地 SQLite 数据库 URL
    ///
    /// 例如：`sqlite://matchchat.db?mode=rwc`
    pub db_url: String,
    /// 推送总线缓冲容量
    pub push_buffer: usize,
}

impl ClientConfig {
    /// 创建默认配置
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            api_base_url: "http://localhost:10002".to_string(),
            db_url: "sqlite://matchchat.db?mode=rwc".to_string(),
            push_buffer: crate::im::push::bus::DEFAULT_PUSH_BUFFER,
        }
    }
}

/// 聊天客户端
pub struct ChatClient {
    config: ClientConfig,
    store: Arc<ConversationStore>,
    bus: PushEventBus,
    session: Arc<Session>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    projector: Mutex<Option<ConversationListProjector>>,
}

impl ChatClient {
    /// 按配置创建真实的协作方（SQLite 游标存储 + HTTP 拉取服务）
    pub async fn connect(
        config: ClientConfig,
        listener: Option<Arc<dyn ConversationListener>>,
    ) -> Result<Self> {
        info!(
            "[Client] 🔧 初始化客户端，用户ID: {}, API: {}",
            config.user_id, config.api_base_url
        );
        let pool = create_sqlite_pool(&config.db_url).await?;
        let cursors = SqliteReadCursorStore::open(pool)
            .await
            .context("打开已读游标存储失败")?;
        let fetcher = ConversationApi::with_token(config.api_base_url.clone(), &config.token)?;

        Ok(Self::with_collaborators(
            config,
            Arc::new(fetcher),
            Arc::new(cursors),
            listener.unwrap_or_else(|| Arc::new(EmptyConversationListener)),
        ))
    }

    /// 使用注入的协作方创建客户端
    pub fn with_collaborators(
        config: ClientConfig,
        fetcher: Arc<dyn ConversationFetcher>,
        cursors: Arc<dyn ReadCursorStore>,
        listener: Arc<dyn ConversationListener>,
    ) -> Self {
        let store = Arc::new(ConversationStore::with_listener(
            config.user_id.clone(),
            fetcher,
            cursors,
            listener,
        ));
        let bus = PushEventBus::new(config.push_buffer);
        let session = Arc::new(Session::new(SessionState::new(config.user_id.clone())));
        Self {
            config,
            store,
            bus,
            session,
            dispatcher: Mutex::new(None),
            projector: Mutex::new(None),
        }
    }

    /// 启动分发任务和列表投影，然后执行首次全量拉取
    ///
    /// 首次拉取失败不会中断启动，后续 opened 回退或 [`ChatClient::refresh`] 会再次拉取
    pub async fn start(&self) -> Result<()> {
        {
            let mut dispatcher = self
                .dispatcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if dispatcher.is_some() {
                warn!("[Client] 客户端已启动，忽略重复启动");
                return Ok(());
            }
            // 先订阅，拉取期间到达的推送事件不会丢失
            let subscription = self.bus.subscribe();
            *dispatcher = Some(spawn_push_dispatcher(self.store.clone(), subscription));
        }
        {
            let projector =
                ConversationListProjector::spawn(self.store.subscribe(), self.session.subscribe());
            *self
                .projector
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(projector);
        }
        info!("[Client] 🚀 后台任务已启动，开始首次全量拉取");

        if let Err(e) = self.store.populate().await {
            error!("[Client] ❌ 首次全量拉取失败，稍后重试: {:?}", e);
        }
        Ok(())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// 推送总线；推送解码方通过它投递事件
    pub fn bus(&self) -> &PushEventBus {
        &self.bus
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// 投递一个已解码的推送事件，返回收到的订阅者数量
    pub fn publish(&self, event: PushEvent) -> usize {
        self.bus.publish(event)
    }

    /// 当前会话列表行
    pub fn rows(&self) -> Arc<Vec<ConversationRow>> {
        let projector = self
            .projector
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match projector.as_ref() {
            Some(p) => p.rows(),
            None => Arc::new(project(
                &self.store.snapshot().conversations,
                &self.session.current(),
            )),
        }
    }

    /// 订阅会话列表行；未启动时返回 None
    pub fn subscribe_rows(&self) -> Option<watch::Receiver<Arc<Vec<ConversationRow>>>> {
        self.projector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(ConversationListProjector::subscribe)
    }

    /// UI 打开会话时调用
    pub async fn mark_read(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        self.store.mark_read(conversation_id, message_id).await
    }

    /// 手动触发全量拉取
    pub async fn refresh(&self) -> Result<()> {
        self.store.populate().await
    }

    /// 停止后台任务
    pub async fn shutdown(&self) {
        let mut handles = Vec::new();
        if let Some(handle) = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            handles.push(handle);
        }
        if let Some(projector) = self
            .projector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            projector.abort();
        }
        for result in futures_util::future::join_all(handles).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    warn!("[Client] 后台任务异常退出: {:?}", e);
                }
            }
        }
        info!("[Client] 👋 客户端已停止");
    }
}
