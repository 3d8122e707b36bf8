//! 消息服务
//!
//! 写路径编排：准入检查 → 序号分配 → 持久化 → 缓存同步失效 → 事件发布。
//! 缓存失效与写操作在同一逻辑步骤内完成，写后读不会命中写前数据。

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use domain::{
    ConversationEvent, ConversationId, MessageId, MessageRecord, MessageRole, RequestIdentity,
};

use crate::clock::Clock;
use crate::conversation_cache::ConversationCacheCoordinator;
use crate::error::{ApplicationError, ApplicationResult};
use crate::event_bus::EventBus;
use crate::rate_limiter::{AdmissionController, LimiterAction};
use crate::repository::MessageStore;
use crate::sequencer::MessageSequencer;

/// 发送消息命令
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    /// 会话ID
    pub conversation_id: ConversationId,
    /// 消息角色
    pub role: MessageRole,
    /// 消息内容
    pub content: String,
}

/// 消息服务。
pub struct MessageService {
    admission: Arc<AdmissionController>,
    sequencer: Arc<MessageSequencer>,
    cache: Arc<ConversationCacheCoordinator>,
    event_bus: Arc<EventBus>,
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
}

impl MessageService {
    pub fn new(
        admission: Arc<AdmissionController>,
        sequencer: Arc<MessageSequencer>,
        cache: Arc<ConversationCacheCoordinator>,
        event_bus: Arc<EventBus>,
        store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            admission,
            sequencer,
            cache,
            event_bus,
            store,
            clock,
        }
    }

    /// 保存一条消息。
    ///
    /// 序号签发后若持久化失败，该序号不回收（接受永久空洞），
    /// 调用方重试会拿到新的序号。
    pub async fn send_message(
        &self,
        identity: &RequestIdentity,
        command: SendMessageCommand,
    ) -> ApplicationResult<MessageRecord> {
        let decision = self.admission.check(identity, LimiterAction::SendMessage);
        if !decision.allowed {
            return Err(ApplicationError::RateLimited(decision));
        }

        let order = self.sequencer.next_order(command.conversation_id).await?;
        let message = MessageRecord::new(
            MessageId::new(Uuid::new_v4()),
            command.conversation_id,
            identity.user_id,
            command.role,
            command.content,
            order,
            self.clock.now(),
        )?;

        if let Err(err) = self.store.append_message(message.clone()).await {
            warn!(
                conversation_id = %command.conversation_id,
                order,
                "message persistence failed, issued order becomes a permanent gap"
            );
            return Err(err.into());
        }

        // 与写操作同一逻辑步骤内同步失效，然后才发布事件
        self.cache.invalidate_conversation(command.conversation_id);
        self.event_bus.publish(&ConversationEvent::MessageAppended {
            conversation_id: command.conversation_id,
            message_id: message.id,
            sender_id: identity.user_id,
            order,
            timestamp: Utc::now(),
        });

        Ok(message)
    }

    /// 读取会话消息：优先命中缓存，未命中回源并回填。
    pub async fn get_messages(
        &self,
        identity: &RequestIdentity,
        conversation_id: ConversationId,
    ) -> ApplicationResult<Vec<MessageRecord>> {
        let decision = self.admission.check(identity, LimiterAction::Api);
        if !decision.allowed {
            return Err(ApplicationError::RateLimited(decision));
        }

        if let Some(records) = self.cache.get_conversation_messages(conversation_id) {
            return Ok(records);
        }

        let records = self.store.list_messages(conversation_id).await?;
        self.cache
            .set_conversation_messages(conversation_id, records.clone())?;
        Ok(records)
    }
}
