//! 导师对话系统核心领域模型
//!
//! 包含会话、消息等核心实体，以及领域事件和错误定义。

pub mod conversation;
pub mod errors;
pub mod events;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use conversation::*;
pub use errors::*;
pub use events::*;
pub use message::*;
pub use value_objects::*;
