//! 用例服务
//!
//! 串联限流、序号分配、缓存失效与事件发布的交互契约。

pub mod conversation_service;
pub mod message_service;

pub use conversation_service::{ConversationService, CreateConversationCommand};
pub use message_service::{MessageService, SendMessageCommand};
