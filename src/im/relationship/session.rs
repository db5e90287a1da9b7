//! 会话（登录态）：关系集合的唯一修改入口
//!
//! 每次实际变更都会通过 watch 通道发布新的 [`SessionState`]，
//! 订阅方（首页、用户详情、会话列表）据此重新计算关系

use crate::im::relationship::models::SessionState;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// 会话状态持有者
pub struct Session {
    tx: watch::Sender<Arc<SessionState>>,
}

impl Session {
    pub fn new(state: SessionState) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(state));
        Self { tx }
    }

    /// 当前状态快照
    pub fn current(&self) -> Arc<SessionState> {
        self.tx.borrow().clone()
    }

    pub fn user_id(&self) -> String {
        self.tx.borrow().user_id.clone()
    }

    /// 订阅状态变更
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionState>> {
        self.tx.subscribe()
    }

    /// 修改状态；只有内容确实变化时才发布，返回是否发布
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        let changed = self.tx.send_if_modified(|current| {
            let mut next = (**current).clone();
            f(&mut next);
            if next == **current {
                return false;
            }
            *current = Arc::new(next);
            true
        });
        if changed {
            debug!("[Session] 会话状态已更新并发布");
        }
        changed
    }

    /// 配对成功：从所有待定集合中移除
    pub fn record_match(&self, user_id: &str) -> bool {
        info!("[Session] 记录配对: userID={}", user_id);
        self.update(|s| {
            let r = &mut s.relations;
            r.who_sent_me.remove(user_id);
            r.who_i_sent.remove(user_id);
            r.unmatched.remove(user_id);
            r.matched.insert(user_id.to_string());
        })
    }

    pub fn record_request_sent(&self, user_id: &str) -> bool {
        self.update(|s| {
            s.relations.who_i_sent.insert(user_id.to_string());
        })
    }

    pub fn record_request_received(&self, user_id: &str) -> bool {
        self.update(|s| {
            s.relations.who_sent_me.insert(user_id.to_string());
        })
    }

    /// 解除配对 / 屏蔽
    pub fn record_unmatch(&self, user_id: &str) -> bool {
        info!("[Session] 记录解除配对: userID={}", user_id);
        self.update(|s| {
            let r = &mut s.relations;
            r.matched.remove(user_id);
            r.who_sent_me.remove(user_id);
            r.who_i_sent.remove(user_id);
            r.unmatched.insert(user_id.to_string());
        })
    }

    /// 星级评分，范围限制在 1-5
    pub fn rate(&self, user_id: &str, stars: u8) -> bool {
        let stars = stars.clamp(1, 5);
        self.update(|s| {
            s.relations.star_ratings.insert(user_id.to_string(), stars);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::relationship::models::{MatchState, UserProfile};
    use crate::im::relationship::resolver::resolve;

    #[tokio::test]
    async fn publishes_only_real_changes() {
        let session = Session::new(SessionState::new("me"));
        let mut rx = session.subscribe();
        rx.borrow_and_update();

        assert!(session.record_request_sent("a"));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!session.record_request_sent("a"));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn match_clears_pending_sets() {
        let session = Session::new(SessionState::new("me"));
        session.record_request_sent("a");
        session.record_request_received("a");
        session.record_match("a");

        let state = session.current();
        assert!(state.relations.matched.contains("a"));
        assert!(!state.relations.who_i_sent.contains("a"));
        assert!(!state.relations.who_sent_me.contains("a"));
        assert_eq!(resolve(&state, &UserProfile::new("a")).state, MatchState::IsMatched);

        session.record_unmatch("a");
        let state = session.current();
        assert_eq!(resolve(&state, &UserProfile::new("a")).state, MatchState::IsUnmatched);
    }

    #[tokio::test]
    async fn rate_clamps_stars() {
        let session = Session::new(SessionState::new("me"));
        session.rate("a", 9);
        session.rate("b", 0);
        let state = session.current();
        assert_eq!(state.relations.star_ratings.get("a"), Some(&5));
        assert_eq!(state.relations.star_ratings.get("b"), Some(&1));
        assert_eq!(session.user_id(), "me");
    }
}
