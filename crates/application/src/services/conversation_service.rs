//! 会话服务
//!
//! 读路径走缓存回源回填；会话级变更在存储写入成功后同步失效
//! 对应缓存条目并发布领域事件。列表缓存不做显式失效，靠短 TTL 衰减。

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use domain::{
    ConversationDetail, ConversationEvent, ConversationId, ConversationListPage,
    ConversationListQuery, ConversationStatus, ConversationUpdate, RepositoryError,
    RequestIdentity,
};

use crate::clock::Clock;
use crate::conversation_cache::ConversationCacheCoordinator;
use crate::error::{ApplicationError, ApplicationResult};
use crate::event_bus::EventBus;
use crate::rate_limiter::{AdmissionController, LimiterAction};
use crate::repository::ConversationStore;

/// 创建会话命令
#[derive(Debug, Clone)]
pub struct CreateConversationCommand {
    /// 会话标题
    pub title: String,
    /// 导师标识
    pub mentor: String,
    /// 标签
    pub tags: Vec<String>,
}

/// 会话服务。
pub struct ConversationService {
    admission: Arc<AdmissionController>,
    cache: Arc<ConversationCacheCoordinator>,
    event_bus: Arc<EventBus>,
    store: Arc<dyn ConversationStore>,
    clock: Arc<dyn Clock>,
}

impl ConversationService {
    pub fn new(
        admission: Arc<AdmissionController>,
        cache: Arc<ConversationCacheCoordinator>,
        event_bus: Arc<EventBus>,
        store: Arc<dyn ConversationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            admission,
            cache,
            event_bus,
            store,
            clock,
        }
    }

    fn admit(
        &self,
        identity: &RequestIdentity,
        action: LimiterAction,
    ) -> ApplicationResult<()> {
        let decision = self.admission.check(identity, action);
        if !decision.allowed {
            return Err(ApplicationError::RateLimited(decision));
        }
        Ok(())
    }

    fn map_not_found(err: RepositoryError, id: ConversationId) -> ApplicationError {
        match err {
            RepositoryError::NotFound => ApplicationError::NotFound(id),
            other => other.into(),
        }
    }

    /// 创建会话。新会话尚无缓存条目，列表视图靠 TTL 衰减收敛。
    pub async fn create_conversation(
        &self,
        identity: &RequestIdentity,
        command: CreateConversationCommand,
    ) -> ApplicationResult<ConversationDetail> {
        self.admit(identity, LimiterAction::CreateConversation)?;

        let detail = ConversationDetail::new(
            ConversationId::new(Uuid::new_v4()),
            identity.user_id,
            command.title,
            command.mentor,
            command.tags,
            self.clock.now(),
        )?;
        let created = self.store.create(detail).await?;

        self.event_bus.publish(&ConversationEvent::ConversationCreated {
            conversation_id: created.id,
            owner_id: created.owner_id,
            mentor: created.mentor.clone(),
            timestamp: Utc::now(),
        });
        Ok(created)
    }

    /// 拉取一页会话列表：优先命中缓存，未命中回源并回填。
    pub async fn list_conversations(
        &self,
        identity: &RequestIdentity,
        query: &ConversationListQuery,
    ) -> ApplicationResult<ConversationListPage> {
        self.admit(identity, LimiterAction::Api)?;
        query.validate()?;

        if let Some(page) = self.cache.get_conversation_list(identity.user_id, query) {
            return Ok(page);
        }

        let page = self.store.list_for_user(identity.user_id, query).await?;
        self.cache
            .set_conversation_list(identity.user_id, query, page.clone())?;
        Ok(page)
    }

    /// 读取会话详情：优先命中缓存，未命中回源并回填。
    pub async fn get_conversation(
        &self,
        identity: &RequestIdentity,
        id: ConversationId,
    ) -> ApplicationResult<ConversationDetail> {
        self.admit(identity, LimiterAction::Api)?;

        if let Some(detail) = self.cache.get_conversation_detail(id) {
            return Ok(detail);
        }

        let detail = self
            .store
            .find_detail(id)
            .await?
            .ok_or(ApplicationError::NotFound(id))?;
        self.cache.set_conversation_detail(id, detail.clone())?;
        Ok(detail)
    }

    /// 更新会话元数据，成功后同步失效详情缓存。
    pub async fn update_conversation(
        &self,
        identity: &RequestIdentity,
        id: ConversationId,
        update: ConversationUpdate,
    ) -> ApplicationResult<ConversationDetail> {
        self.admit(identity, LimiterAction::Api)?;

        let updated = self
            .store
            .apply_update(id, update)
            .await
            .map_err(|err| Self::map_not_found(err, id))?;

        self.cache.invalidate_detail(id);
        self.event_bus.publish(&ConversationEvent::ConversationUpdated {
            conversation_id: id,
            updated_by: identity.user_id,
            timestamp: Utc::now(),
        });
        Ok(updated)
    }

    /// 切换收藏状态，成功后同步失效详情缓存。
    pub async fn toggle_favorite(
        &self,
        identity: &RequestIdentity,
        id: ConversationId,
    ) -> ApplicationResult<bool> {
        self.admit(identity, LimiterAction::Api)?;

        let favorite = self
            .store
            .toggle_favorite(id)
            .await
            .map_err(|err| Self::map_not_found(err, id))?;

        self.cache.invalidate_detail(id);
        self.event_bus.publish(&ConversationEvent::FavoriteToggled {
            conversation_id: id,
            user_id: identity.user_id,
            favorite,
            timestamp: Utc::now(),
        });
        Ok(favorite)
    }

    /// 变更会话状态，成功后同步失效详情缓存。
    pub async fn set_status(
        &self,
        identity: &RequestIdentity,
        id: ConversationId,
        status: ConversationStatus,
    ) -> ApplicationResult<()> {
        self.admit(identity, LimiterAction::Api)?;

        let old_status = self
            .store
            .set_status(id, status)
            .await
            .map_err(|err| Self::map_not_found(err, id))?;

        self.cache.invalidate_detail(id);
        self.event_bus.publish(&ConversationEvent::StatusChanged {
            conversation_id: id,
            old_status,
            new_status: status,
            changed_by: identity.user_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// 删除会话，成功后同步失效详情与消息缓存。
    pub async fn delete_conversation(
        &self,
        identity: &RequestIdentity,
        id: ConversationId,
    ) -> ApplicationResult<()> {
        self.admit(identity, LimiterAction::Api)?;

        self.store
            .delete(id)
            .await
            .map_err(|err| Self::map_not_found(err, id))?;

        self.cache.invalidate_conversation(id);
        self.event_bus.publish(&ConversationEvent::ConversationDeleted {
            conversation_id: id,
            deleted_by: identity.user_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
