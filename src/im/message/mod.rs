//! 消息模块
//!
//! 消息模型以及推送消息载荷的解码校验

pub mod models;
pub mod types;

pub use models::Message;
pub use types::MessagePayload;
