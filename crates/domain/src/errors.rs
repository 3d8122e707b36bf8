//! 领域层错误定义

use thiserror::Error;

/// 领域层错误类型
#[derive(Debug, Error)]
pub enum DomainError {
    /// 消息内容为空
    #[error("message content is empty")]
    EmptyMessageContent,

    /// 消息内容过长
    #[error("message content too long: {actual} > {max}")]
    MessageContentTooLong { actual: usize, max: usize },

    /// 会话标题为空
    #[error("conversation title is empty")]
    EmptyConversationTitle,

    /// 查询参数非法
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// 仓储错误：外部持久化协作方返回的失败。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// 目标记录不存在
    #[error("record not found")]
    NotFound,

    /// 写入冲突
    #[error("conflict: {0}")]
    Conflict(String),

    /// 存储层故障
    #[error("storage error: {0}")]
    Storage(String),
}
