//! 关系模型定义

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 两个用户之间的配对状态，任意时刻只有一种成立
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchState {
    /// 已配对
    IsMatched,
    /// 对方向我发出了请求
    IsWhoSentMe,
    /// 我向对方发出了请求
    IsWhoISent,
    /// 已解除配对 / 已屏蔽
    IsUnmatched,
    /// 无任何关系
    Nothing,
}

impl MatchState {
    /// 是否可以互发消息
    pub fn can_chat(self) -> bool {
        matches!(self, MatchState::IsMatched)
    }

    /// 是否可以发起配对请求
    pub fn can_send_request(self) -> bool {
        matches!(self, MatchState::Nothing)
    }

    /// 是否可以接受 / 拒绝对方的请求
    pub fn can_respond(self) -> bool {
        matches!(self, MatchState::IsWhoSentMe)
    }

    /// 是否可以撤回自己发出的请求
    pub fn can_cancel_request(self) -> bool {
        matches!(self, MatchState::IsWhoISent)
    }
}

/// 经纬度坐标（度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// 参与关系计算的另一位用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            nickname: String::new(),
            location: None,
        }
    }
}

/// 当前用户的四个关系集合以及星级评分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSets {
    pub matched: HashSet<String>,
    pub who_sent_me: HashSet<String>,
    pub who_i_sent: HashSet<String>,
    /// 已解除配对或已屏蔽的用户
    pub unmatched: HashSet<String>,
    /// 当前用户给出的星级评分（1-5）
    pub star_ratings: HashMap<String, u8>,
}

/// 会话状态：当前用户 ID、位置以及关系集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub relations: RelationshipSets,
}

impl SessionState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// 关系计算结果（计算值，不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub state: MatchState,
    /// 与对方的距离（公里），任一方位置未知时为 None
    pub distance_km: Option<f64>,
    pub star_rating: Option<u8>,
}

impl Relationship {
    /// 与缓存中的旧值比较，决定是否需要刷新
    ///
    /// 只比较配对状态和星级评分；距离的细微变化不触发刷新
    pub fn is_different(&self, previous: &Relationship) -> bool {
        self.state != previous.state || self.star_rating != previous.star_rating
    }

    /// 距离展示文案
    pub fn distance_label(&self) -> Option<String> {
        self.distance_km.map(|km| {
            if km < 1.0 {
                "< 1 km".to_string()
            } else {
                format!("{} km", km.round() as u64)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relationship(state: MatchState, star_rating: Option<u8>) -> Relationship {
        Relationship {
            state,
            distance_km: None,
            star_rating,
        }
    }

    #[test]
    fn rating_added_after_match_is_different() {
        let before = relationship(MatchState::IsMatched, None);
        let after = relationship(MatchState::IsMatched, Some(4));
        assert!(after.is_different(&before));
    }

    #[test]
    fn distance_change_alone_is_not_different() {
        let before = relationship(MatchState::Nothing, None);
        let mut after = before.clone();
        after.distance_km = Some(12.0);
        assert!(!after.is_different(&before));
        assert!(relationship(MatchState::IsWhoISent, None).is_different(&before));
    }

    #[test]
    fn distance_label_formats() {
        let mut r = relationship(MatchState::Nothing, None);
        assert_eq!(r.distance_label(), None);
        r.distance_km = Some(0.4);
        assert_eq!(r.distance_label().as_deref(), Some("< 1 km"));
        r.distance_km = Some(12.6);
        assert_eq!(r.distance_label().as_deref(), Some("13 km"));
    }

    #[test]
    fn legal_actions_follow_state() {
        assert!(MatchState::IsMatched.can_chat());
        assert!(!MatchState::IsWhoISent.can_chat());
        assert!(MatchState::Nothing.can_send_request());
        assert!(!MatchState::IsUnmatched.can_send_request());
        assert!(MatchState::IsWhoSentMe.can_respond());
        assert!(MatchState::IsWhoISent.can_cancel_request());
    }
}
