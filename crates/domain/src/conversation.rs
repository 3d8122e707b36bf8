//! 会话模型与列表查询形状

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ConversationId, Timestamp, UserId};

/// 列表查询每页数量上限。
pub const MAX_PAGE_LIMIT: u32 = 100;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Archived,
    Completed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Archived => "archived",
            ConversationStatus::Completed => "completed",
        }
    }
}

/// 列表排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Title,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
        }
    }
}

/// 列表排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// 会话列表查询参数。
///
/// 任何影响查询结果的字段都会参与缓存键构造。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationListQuery {
    /// 页码（从 1 开始）
    pub page: u32,
    /// 每页数量
    pub limit: u32,
    /// 标题/内容搜索词
    pub search: Option<String>,
    /// 导师筛选
    pub mentor: Option<String>,
    /// 状态筛选
    pub status: Option<ConversationStatus>,
    /// 标签筛选
    pub tags: Vec<String>,
    /// 排序字段
    pub sort_by: SortField,
    /// 排序方向
    pub sort_order: SortOrder,
}

impl Default for ConversationListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            search: None,
            mentor: None,
            status: None,
            tags: Vec::new(),
            sort_by: SortField::UpdatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

impl ConversationListQuery {
    /// 校验分页参数。
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.page == 0 {
            return Err(DomainError::InvalidQuery("page must be >= 1".to_string()));
        }
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(DomainError::InvalidQuery(format!(
                "limit must be in 1..={}",
                MAX_PAGE_LIMIT
            )));
        }
        Ok(())
    }
}

/// 列表视图中的会话摘要。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub mentor: String,
    pub status: ConversationStatus,
    pub favorite: bool,
    pub message_count: u64,
    pub last_activity_at: Timestamp,
}

/// 一页会话列表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationListPage {
    pub items: Vec<ConversationSummary>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// 会话详情。
///
/// 内嵌消息计数与最后活跃时间，因此消息追加也会使详情缓存失效。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: ConversationId,
    pub owner_id: UserId,
    pub title: String,
    pub mentor: String,
    pub status: ConversationStatus,
    pub favorite: bool,
    pub tags: Vec<String>,
    pub message_count: u64,
    pub last_message_order: u64,
    pub last_activity_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ConversationDetail {
    /// 创建一个新会话，标题为空时拒绝。
    pub fn new(
        id: ConversationId,
        owner_id: UserId,
        title: String,
        mentor: String,
        tags: Vec<String>,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        if title.trim().is_empty() {
            return Err(DomainError::EmptyConversationTitle);
        }
        Ok(Self {
            id,
            owner_id,
            title,
            mentor,
            status: ConversationStatus::Active,
            favorite: false,
            tags,
            message_count: 0,
            last_message_order: 0,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    /// 转为列表摘要。
    pub fn to_summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            mentor: self.mentor.clone(),
            status: self.status,
            favorite: self.favorite,
            message_count: self.message_count,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// 会话元数据更新（部分字段）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    pub title: Option<String>,
    pub mentor: Option<String>,
    pub tags: Option<Vec<String>>,
}
