//! 应用层错误定义

use thiserror::Error;

use domain::{ConversationId, DomainError, RepositoryError};

use crate::cache::CacheError;
use crate::rate_limiter::RateLimitDecision;
use crate::sequencer::SequenceError;

/// 应用层错误类型
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 领域校验失败
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// 持久化协作方失败
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 请求被限流。携带完整决策，供边界层构造 429 响应
    #[error("rate limit exceeded")]
    RateLimited(RateLimitDecision),

    /// 序号分配失败
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),

    /// 缓存操作被拒绝（空键或零 TTL，属编程错误）
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// 会话不存在
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),
}

impl ApplicationError {
    /// 若为限流拒绝，取出决策。
    pub fn rate_limit_decision(&self) -> Option<&RateLimitDecision> {
        match self {
            ApplicationError::RateLimited(decision) => Some(decision),
            _ => None,
        }
    }
}

/// 应用层结果类型
pub type ApplicationResult<T> = Result<T, ApplicationError>;
