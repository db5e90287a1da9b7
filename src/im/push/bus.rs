//! 推送事件总线
//!
//! 基于 tokio broadcast 的多订阅者广播：
//! - 事件按到达顺序投递，不重排
//! - 投递时已订阅的每个订阅者恰好收到一次
//! - 不回放历史：订阅之前发布的事件不会收到
//! - 订阅者落后超过容量时，最旧的事件被丢弃并记录告警

use crate::im::push::event::PushEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// 默认缓冲容量
pub const DEFAULT_PUSH_BUFFER: usize = 256;

/// 推送事件总线，通过构造参数注入给需要的组件
#[derive(Clone)]
pub struct PushEventBus {
    tx: broadcast::Sender<PushEvent>,
}

impl PushEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 发布事件，返回收到事件的订阅者数量（无订阅者时为 0，事件丢弃）
    pub fn publish(&self, event: PushEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!("[PushBus] 事件已投递给 {} 个订阅者", receivers);
                receivers
            }
            Err(broadcast::error::SendError(event)) => {
                debug!(
                    "[PushBus] 当前无订阅者，丢弃事件: kind={}, conversationID={}",
                    event.kind(),
                    event.conversation_id()
                );
                0
            }
        }
    }

    pub fn subscribe(&self) -> PushSubscription {
        PushSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for PushEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_PUSH_BUFFER)
    }
}

/// 单个订阅者
pub struct PushSubscription {
    rx: broadcast::Receiver<PushEvent>,
}

impl PushSubscription {
    /// 等待下一个事件；总线所有发送端关闭后返回 None
    pub async fn recv(&mut self) -> Option<PushEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[PushBus] ⚠️ 订阅者处理过慢，丢失 {} 个事件", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
