pub mod im;

// 重新导出常用类型，方便外部使用
pub use im::{
    client::{ChatClient, ClientConfig},
    conversation::{
        Conversation, ConversationListProjector, ConversationRow, ConversationSnapshot,
        ConversationStore,
    },
    push::{PushEvent, PushEventBus},
    read_cursor::{ReadCursorStore, SqliteReadCursorStore},
    relationship::{resolve, MatchState, Relationship, Session, SessionState},
};
