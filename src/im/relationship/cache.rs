//! 按用户缓存的关系结果
//!
//! 列表类界面为每个条目缓存一份关系，会话状态变化后只刷新真正变化的条目

use crate::im::relationship::models::{Relationship, SessionState, UserProfile};
use crate::im::relationship::resolver::resolve;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RelationshipCache {
    entries: HashMap<String, Relationship>,
}

impl RelationshipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<&Relationship> {
        self.entries.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按新的会话状态重新计算，返回关系有变化（含新增）的用户 ID，顺序与 `users` 一致
    ///
    /// 不在 `users` 中的缓存条目会被移除
    pub fn refresh(&mut self, session: &SessionState, users: &[UserProfile]) -> Vec<String> {
        let mut changed = Vec::new();
        let mut next = HashMap::with_capacity(users.len());

        for user in users {
            let fresh = resolve(session, user);
            let is_changed = match self.entries.get(&user.user_id) {
                Some(previous) => fresh.is_different(previous),
                None => true,
            };
            if is_changed {
                changed.push(user.user_id.clone());
            }
            next.insert(user.user_id.clone(), fresh);
        }

        debug!(
            "[Relation] 刷新关系缓存: 条目数={}, 变化数={}",
            next.len(),
            changed.len()
        );
        self.entries = next;
        changed
    }
}
