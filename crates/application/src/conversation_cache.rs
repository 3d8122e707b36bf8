//! 会话缓存协调器
//!
//! 在通用 TTL 缓存之上提供领域相关的键构造与失效策略。
//!
//! 失效纪律：详情与消息缓存在写路径上同步显式失效（陈旧对用户可见）；
//! 列表缓存的查询形状无法廉价枚举，统一依赖短 TTL 自然衰减，
//! 陈旧窗口以配置的列表 TTL 为上界。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use config::CacheConfig;
use domain::{
    ConversationDetail, ConversationId, ConversationListPage, ConversationListQuery, MessageRecord,
    UserId,
};

use crate::cache::{CacheError, CacheStats, TtlCache};
use crate::clock::Clock;

/// 三类缓存的聚合诊断快照。
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConversationCacheStats {
    pub lists: CacheStats,
    pub details: CacheStats,
    pub messages: CacheStats,
}

/// 会话缓存协调器。
pub struct ConversationCacheCoordinator {
    lists: Arc<TtlCache<ConversationListPage>>,
    details: Arc<TtlCache<ConversationDetail>>,
    messages: Arc<TtlCache<Vec<MessageRecord>>>,
    list_ttl: Duration,
    detail_ttl: Duration,
    messages_ttl: Duration,
    sweep_interval: Duration,
}

impl ConversationCacheCoordinator {
    pub fn from_config(clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        Self {
            lists: Arc::new(TtlCache::new(Arc::clone(&clock))),
            details: Arc::new(TtlCache::new(Arc::clone(&clock))),
            messages: Arc::new(TtlCache::new(clock)),
            list_ttl: Duration::from_secs(config.list_ttl_secs),
            detail_ttl: Duration::from_secs(config.detail_ttl_secs),
            messages_ttl: Duration::from_secs(config.messages_ttl_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// 列表缓存键。任何影响查询结果的字段都必须参与键构造；
    /// 自由文本字段转义分隔符，保证不同查询不会碰撞。
    fn list_key(user_id: UserId, query: &ConversationListQuery) -> String {
        let search = escape_field(query.search.as_deref().unwrap_or(""));
        let mentor = escape_field(query.mentor.as_deref().unwrap_or(""));
        let status = query.status.map(|s| s.as_str()).unwrap_or("");
        let tags = query
            .tags
            .iter()
            .map(|tag| escape_field(tag))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "conv_list:{}:{}:{}:{}:{}:{}:{}:{}:{}",
            user_id,
            query.page,
            query.limit,
            search,
            mentor,
            status,
            tags,
            query.sort_by.as_str(),
            query.sort_order.as_str()
        )
    }

    fn detail_key(id: ConversationId) -> String {
        format!("conversation:{}", id)
    }

    fn messages_key(id: ConversationId) -> String {
        format!("messages:{}", id)
    }

    pub fn get_conversation_list(
        &self,
        user_id: UserId,
        query: &ConversationListQuery,
    ) -> Option<ConversationListPage> {
        self.lists.get(&Self::list_key(user_id, query))
    }

    pub fn set_conversation_list(
        &self,
        user_id: UserId,
        query: &ConversationListQuery,
        page: ConversationListPage,
    ) -> Result<(), CacheError> {
        self.lists
            .set(&Self::list_key(user_id, query), page, self.list_ttl)
    }

    pub fn get_conversation_detail(&self, id: ConversationId) -> Option<ConversationDetail> {
        self.details.get(&Self::detail_key(id))
    }

    pub fn set_conversation_detail(
        &self,
        id: ConversationId,
        detail: ConversationDetail,
    ) -> Result<(), CacheError> {
        self.details
            .set(&Self::detail_key(id), detail, self.detail_ttl)
    }

    pub fn get_conversation_messages(&self, id: ConversationId) -> Option<Vec<MessageRecord>> {
        self.messages.get(&Self::messages_key(id))
    }

    pub fn set_conversation_messages(
        &self,
        id: ConversationId,
        records: Vec<MessageRecord>,
    ) -> Result<(), CacheError> {
        self.messages
            .set(&Self::messages_key(id), records, self.messages_ttl)
    }

    /// 元数据级变更（更新、收藏、状态切换）后的同步失效：仅详情。
    pub fn invalidate_detail(&self, id: ConversationId) {
        self.details.delete(&Self::detail_key(id));
    }

    /// 会话级失效：详情与消息列表一并移除。
    ///
    /// 用于会话删除，以及消息追加——详情内嵌消息计数与最后活跃时间，
    /// 追加后同样不能再命中旧详情。
    pub fn invalidate_conversation(&self, id: ConversationId) {
        self.details.delete(&Self::detail_key(id));
        self.messages.delete(&Self::messages_key(id));
    }

    /// 清空三类缓存。
    pub fn clear(&self) {
        self.lists.clear();
        self.details.clear();
        self.messages.clear();
    }

    pub fn stats(&self) -> ConversationCacheStats {
        ConversationCacheStats {
            lists: self.lists.stats(),
            details: self.details.stats(),
            messages: self.messages.stats(),
        }
    }

    /// 为三类缓存各启动一个后台清扫任务。
    pub fn spawn_sweepers(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            TtlCache::spawn_sweeper(Arc::clone(&self.lists), self.sweep_interval),
            TtlCache::spawn_sweeper(Arc::clone(&self.details), self.sweep_interval),
            TtlCache::spawn_sweeper(Arc::clone(&self.messages), self.sweep_interval),
        ]
    }
}

fn escape_field(raw: &str) -> String {
    raw.replace(':', "%3A").replace(',', "%2C")
}
