//! 关系解析：纯函数，无 I/O

use crate::im::relationship::models::{
    GeoPoint, MatchState, Relationship, SessionState, UserProfile,
};

/// 地球平均半径（公里）
const EARTH_RADIUS_KM: f64 = 6371.0;

/// 计算当前用户与 `other` 的关系
///
/// 关系集合在过渡期间可能重叠，按固定优先级判定：
/// 已配对 > 对方发来请求 > 我发出请求 > 已解除配对 > 无关系
pub fn resolve(session: &SessionState, other: &UserProfile) -> Relationship {
    let relations = &session.relations;
    let id = other.user_id.as_str();

    let state = if id.is_empty() || id == session.user_id {
        MatchState::Nothing
    } else if relations.matched.contains(id) {
        MatchState::IsMatched
    } else if relations.who_sent_me.contains(id) {
        MatchState::IsWhoSentMe
    } else if relations.who_i_sent.contains(id) {
        MatchState::IsWhoISent
    } else if relations.unmatched.contains(id) {
        MatchState::IsUnmatched
    } else {
        MatchState::Nothing
    };

    let distance = match (session.location, other.location) {
        (Some(a), Some(b)) => Some(distance_km(a, b)),
        _ => None,
    };

    Relationship {
        state,
        distance_km: distance,
        star_rating: relations.star_ratings.get(id).copied(),
    }
}

/// 两点间的大圆距离（haversine，公里）
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionState {
        let mut s = SessionState::new("me");
        s.relations.matched.insert("m".to_string());
        s.relations.who_sent_me.insert("r".to_string());
        s.relations.who_i_sent.insert("s".to_string());
        s.relations.unmatched.insert("u".to_string());
        s
    }

    #[test]
    fn classifies_each_set() {
        let s = session();
        assert_eq!(resolve(&s, &UserProfile::new("m")).state, MatchState::IsMatched);
        assert_eq!(resolve(&s, &UserProfile::new("r")).state, MatchState::IsWhoSentMe);
        assert_eq!(resolve(&s, &UserProfile::new("s")).state, MatchState::IsWhoISent);
        assert_eq!(resolve(&s, &UserProfile::new("u")).state, MatchState::IsUnmatched);
        assert_eq!(resolve(&s, &UserProfile::new("x")).state, MatchState::Nothing);
    }

    #[test]
    fn matched_wins_over_sent_request() {
        let mut s = session();
        s.relations.who_i_sent.insert("m".to_string());
        s.relations.who_sent_me.insert("m".to_string());
        assert_eq!(resolve(&s, &UserProfile::new("m")).state, MatchState::IsMatched);
    }

    #[test]
    fn received_wins_over_sent_and_unmatched() {
        let mut s = session();
        s.relations.who_i_sent.insert("r".to_string());
        s.relations.unmatched.insert("r".to_string());
        assert_eq!(resolve(&s, &UserProfile::new("r")).state, MatchState::IsWhoSentMe);

        s.relations.unmatched.insert("s".to_string());
        assert_eq!(resolve(&s, &UserProfile::new("s")).state, MatchState::IsWhoISent);
    }

    #[test]
    fn self_is_nothing() {
        let mut s = session();
        s.relations.matched.insert("me".to_string());
        assert_eq!(resolve(&s, &UserProfile::new("me")).state, MatchState::Nothing);
    }

    #[test]
    fn star_rating_is_attached() {
        let mut s = session();
        s.relations.star_ratings.insert("m".to_string(), 5);
        let r = resolve(&s, &UserProfile::new("m"));
        assert_eq!(r.star_rating, Some(5));
        assert_eq!(resolve(&s, &UserProfile::new("s")).star_rating, None);
    }

    #[test]
    fn distance_requires_both_locations() {
        let mut s = session();
        let mut other = UserProfile::new("m");
        assert_eq!(resolve(&s, &other).distance_km, None);

        s.location = Some(GeoPoint {
            latitude: 48.8566,
            longitude: 2.3522,
        });
        assert_eq!(resolve(&s, &other).distance_km, None);

        other.location = Some(GeoPoint {
            latitude: 51.5074,
            longitude: -0.1278,
        });
        let km = resolve(&s, &other).distance_km.unwrap();
        // 巴黎到伦敦约 344 公里
        assert!((km - 344.0).abs() < 5.0, "distance was {}", km);
    }

    #[test]
    fn distance_to_same_point_is_zero() {
        let p = GeoPoint {
            latitude: 10.0,
            longitude: 20.0,
        };
        assert!(distance_km(p, p).abs() < 1e-9);
    }
}
