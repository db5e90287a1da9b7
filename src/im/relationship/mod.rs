//! 关系模块
//!
//! 根据会话（Session）中的关系集合，计算当前用户与任意用户之间的配对关系

pub mod cache;
pub mod models;
pub mod resolver;
pub mod session;

pub use cache::RelationshipCache;
pub use models::{GeoPoint, MatchState, Relationship, RelationshipSets, SessionState, UserProfile};
pub use resolver::{distance_km, resolve};
pub use session::Session;
