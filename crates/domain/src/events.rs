//! 会话事件定义
//!
//! 定义写路径产生的全部领域事件类型，供进程内事件总线分发给
//! 缓存失效、分析统计、搜索索引等订阅方。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationStatus;
use crate::value_objects::{ConversationId, MessageId, UserId};

/// 会话事件枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConversationEvent {
    /// 会话创建事件
    ConversationCreated {
        conversation_id: ConversationId,
        owner_id: UserId,
        mentor: String,
        timestamp: DateTime<Utc>,
    },

    /// 会话元数据更新事件
    ConversationUpdated {
        conversation_id: ConversationId,
        updated_by: UserId,
        timestamp: DateTime<Utc>,
    },

    /// 会话删除事件
    ConversationDeleted {
        conversation_id: ConversationId,
        deleted_by: UserId,
        timestamp: DateTime<Utc>,
    },

    /// 收藏状态切换事件
    FavoriteToggled {
        conversation_id: ConversationId,
        user_id: UserId,
        favorite: bool,
        timestamp: DateTime<Utc>,
    },

    /// 会话状态变更事件
    StatusChanged {
        conversation_id: ConversationId,
        old_status: ConversationStatus,
        new_status: ConversationStatus,
        changed_by: UserId,
        timestamp: DateTime<Utc>,
    },

    /// 消息追加事件
    MessageAppended {
        conversation_id: ConversationId,
        message_id: MessageId,
        sender_id: UserId,
        order: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ConversationEvent {
    /// 获取事件所属的会话ID
    pub fn conversation_id(&self) -> ConversationId {
        match self {
            ConversationEvent::ConversationCreated {
                conversation_id, ..
            } => *conversation_id,
            ConversationEvent::ConversationUpdated {
                conversation_id, ..
            } => *conversation_id,
            ConversationEvent::ConversationDeleted {
                conversation_id, ..
            } => *conversation_id,
            ConversationEvent::FavoriteToggled {
                conversation_id, ..
            } => *conversation_id,
            ConversationEvent::StatusChanged {
                conversation_id, ..
            } => *conversation_id,
            ConversationEvent::MessageAppended {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// 获取事件的时间戳
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ConversationEvent::ConversationCreated { timestamp, .. } => *timestamp,
            ConversationEvent::ConversationUpdated { timestamp, .. } => *timestamp,
            ConversationEvent::ConversationDeleted { timestamp, .. } => *timestamp,
            ConversationEvent::FavoriteToggled { timestamp, .. } => *timestamp,
            ConversationEvent::StatusChanged { timestamp, .. } => *timestamp,
            ConversationEvent::MessageAppended { timestamp, .. } => *timestamp,
        }
    }

    /// 获取事件类型名称（用于订阅路由、日志和监控）
    pub fn event_type(&self) -> &'static str {
        match self {
            ConversationEvent::ConversationCreated { .. } => "conversation_created",
            ConversationEvent::ConversationUpdated { .. } => "conversation_updated",
            ConversationEvent::ConversationDeleted { .. } => "conversation_deleted",
            ConversationEvent::FavoriteToggled { .. } => "favorite_toggled",
            ConversationEvent::StatusChanged { .. } => "status_changed",
            ConversationEvent::MessageAppended { .. } => "message_appended",
        }
    }
}
