//! 外部协作方接口
//!
//! 持久化由进程外的存储负责，核心只依赖这些窄接口。
//! 具体实现（数据库仓储）由上层装配时注入。

use async_trait::async_trait;

use domain::{
    ConversationDetail, ConversationId, ConversationListPage, ConversationListQuery,
    ConversationStatus, ConversationUpdate, MessageRecord, RepositoryError, UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 读取会话已持久化的最大消息序号，用于序号计数器播种。
    /// 会话尚无消息时返回 0。
    async fn load_last_message_order(
        &self,
        conversation_id: ConversationId,
    ) -> Result<u64, RepositoryError>;

    /// 持久化一条消息。
    async fn append_message(&self, message: MessageRecord) -> Result<(), RepositoryError>;

    /// 拉取会话全部消息（缓存未命中时回源）。
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<MessageRecord>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 创建会话。
    async fn create(
        &self,
        conversation: ConversationDetail,
    ) -> Result<ConversationDetail, RepositoryError>;

    /// 按 ID 查找会话详情。
    async fn find_detail(
        &self,
        id: ConversationId,
    ) -> Result<Option<ConversationDetail>, RepositoryError>;

    /// 按查询形状拉取某用户的一页会话列表。
    async fn list_for_user(
        &self,
        user_id: UserId,
        query: &ConversationListQuery,
    ) -> Result<ConversationListPage, RepositoryError>;

    /// 应用元数据更新，返回更新后的详情。
    async fn apply_update(
        &self,
        id: ConversationId,
        update: ConversationUpdate,
    ) -> Result<ConversationDetail, RepositoryError>;

    /// 切换收藏状态，返回切换后的值。
    async fn toggle_favorite(&self, id: ConversationId) -> Result<bool, RepositoryError>;

    /// 变更会话状态，返回变更前的状态。
    async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<ConversationStatus, RepositoryError>;

    /// 删除会话。
    async fn delete(&self, id: ConversationId) -> Result<(), RepositoryError>;
}
