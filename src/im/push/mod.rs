//! 推送事件模块
//!
//! 已解码推送事件的进程内广播，以及把事件应用到会话存储的分发任务

pub mod bus;
pub mod dispatcher;
pub mod event;

pub use bus::{PushEventBus, PushSubscription};
pub use dispatcher::spawn_push_dispatcher;
pub use event::PushEvent;
