//! 推送分发任务：按到达顺序把事件逐个应用到会话存储

use crate::im::conversation::service::ConversationStore;
use crate::im::push::bus::PushSubscription;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 启动分发任务
///
/// 订阅必须在调用前建立，这样调用之后发布的事件都不会丢失。
/// 单个事件处理失败只记录告警，任务继续处理后续事件；总线关闭后任务结束。
pub fn spawn_push_dispatcher(
    store: Arc<ConversationStore>,
    mut subscription: PushSubscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("[PushDispatch] 推送分发任务已启动");
        while let Some(event) = subscription.recv().await {
            let kind = event.kind();
            let conversation_id = event.conversation_id().to_string();
            if let Err(e) = store.apply_push_event(event).await {
                warn!(
                    "[PushDispatch] ⚠️ 推送事件处理失败: kind={}, conversationID={}, 错误: {:?}",
                    kind, conversation_id, e
                );
            }
        }
        info!("[PushDispatch] 推送总线已关闭，分发任务退出");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::message::types::MessagePayload;
    use crate::im::push::bus::PushEventBus;
    use crate::im::push::event::PushEvent;
    use crate::im::testing::{conversation, init_test_logger, FakeFetcher, MemoryCursors};

    fn payload(id: &str) -> MessagePayload {
        MessagePayload {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn applies_events_in_order_and_survives_bad_ones() {
        init_test_logger();
        let fetcher = Arc::new(FakeFetcher::with(vec![conversation("A", 100, &[])]));
        let store = Arc::new(ConversationStore::new(
            "me",
            fetcher.clone(),
            Arc::new(MemoryCursors::default()),
        ));
        store.populate().await.unwrap();

        let bus = PushEventBus::new(16);
        let handle = spawn_push_dispatcher(store.clone(), bus.subscribe());

        let mut c = conversation("C", 300, &[]);
        c.available = false;
        fetcher.add(c);

        bus.publish(PushEvent::Message {
            conversation_id: "A".to_string(),
            message: None,
        });
        bus.publish(PushEvent::matched("C"));
        bus.publish(PushEvent::opened("C"));
        bus.publish(PushEvent::message("C", payload("1")));
        bus.publish(PushEvent::message("C", payload("2")));
        drop(bus);
        handle.await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.ids(), vec!["C", "A"]);
        let c = snapshot.get("C").unwrap();
        assert!(c.available);
        let ids: Vec<&str> = c.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(c.unread_count, 2);
    }
}
