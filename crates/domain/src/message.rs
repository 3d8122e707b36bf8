//! 消息模型

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ConversationId, MessageId, Timestamp, UserId};

/// 消息内容长度上限。
pub const MAX_MESSAGE_CONTENT_LEN: usize = 4000;

/// 消息角色：用户提问或导师回复。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Mentor,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Mentor => "mentor",
        }
    }
}

/// 一条会话消息。
///
/// `order` 为会话内的消息序号：单调递增，成功写入之间无重复；
/// 写入失败产生的空洞被接受且不复用。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub role: MessageRole,
    pub content: String,
    pub order: u64,
    pub created_at: Timestamp,
}

impl MessageRecord {
    /// 创建消息，内容为空或超长时拒绝。
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        sender_id: UserId,
        role: MessageRole,
        content: String,
        order: u64,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::EmptyMessageContent);
        }
        if content.len() > MAX_MESSAGE_CONTENT_LEN {
            return Err(DomainError::MessageContentTooLong {
                actual: content.len(),
                max: MAX_MESSAGE_CONTENT_LEN,
            });
        }
        Ok(Self {
            id,
            conversation_id,
            sender_id,
            role,
            content,
            order,
            created_at,
        })
    }
}
