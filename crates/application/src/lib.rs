//! 应用层实现
//!
//! 进程内的资源控制核心：滑动窗口限流、TTL 缓存、会话缓存协调、
//! 消息序号分配与进程内事件总线，以及串联它们的用例服务。
//! 持久化与传输层是外部协作方，经 `repository` 中的接口注入。

pub mod cache;
pub mod clock;
pub mod conversation_cache;
pub mod error;
pub mod event_bus;
pub mod rate_limiter;
pub mod repository;
pub mod sequencer;
pub mod services;

pub use cache::{CacheError, CacheStats, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use conversation_cache::{ConversationCacheCoordinator, ConversationCacheStats};
pub use error::{ApplicationError, ApplicationResult};
pub use event_bus::{EventBus, EventBusError, EventHandler, Subscription};
pub use rate_limiter::{
    AdmissionController, LimiterAction, LimiterKey, RateLimitDecision, RateLimitError,
    RateLimitPolicy, SlidingWindowLimiter, SubjectKind,
};
pub use repository::{ConversationStore, MessageStore};
pub use sequencer::{MessageSequencer, SequenceError};
pub use services::{
    ConversationService, CreateConversationCommand, MessageService, SendMessageCommand,
};
