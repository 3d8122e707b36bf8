//! 集成测试框架
//!
//! 提供内存存储实现与核心组件装配工具，所有测试通过
//! `ManualClock` 确定性地推进时间，不依赖真实时钟。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use application::{
    AdmissionController, Clock, ConversationCacheCoordinator, ConversationService,
    ConversationStore, EventBus, ManualClock, MessageSequencer, MessageService, MessageStore,
};
use config::AppConfig;
use domain::{
    ConversationDetail, ConversationId, ConversationListPage, ConversationListQuery,
    ConversationStatus, ConversationUpdate, MessageRecord, RepositoryError, SortField, SortOrder,
    UserId,
};

/// 内存消息存储，支持注入一次性写入失败。
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<HashMap<ConversationId, Vec<MessageRecord>>>,
    fail_next_append: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让下一次 `append_message` 失败（模拟存储故障）。
    pub fn fail_next_append(&self) {
        self.fail_next_append.store(true, Ordering::SeqCst);
    }

    pub fn message_count(&self, conversation_id: ConversationId) -> usize {
        self.messages
            .read()
            .unwrap()
            .get(&conversation_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn load_last_message_order(
        &self,
        conversation_id: ConversationId,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .messages
            .read()
            .unwrap()
            .get(&conversation_id)
            .and_then(|records| records.iter().map(|m| m.order).max())
            .unwrap_or(0))
    }

    async fn append_message(&self, message: MessageRecord) -> Result<(), RepositoryError> {
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Storage("injected write failure".to_string()));
        }
        self.messages
            .write()
            .unwrap()
            .entry(message.conversation_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        let mut records = self
            .messages
            .read()
            .unwrap()
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        records.sort_by_key(|m| m.order);
        Ok(records)
    }
}

/// 内存会话存储。
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, ConversationDetail>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.read().unwrap().len()
    }
}

fn matches_query(detail: &ConversationDetail, query: &ConversationListQuery) -> bool {
    if let Some(status) = query.status {
        if detail.status != status {
            return false;
        }
    }
    if let Some(mentor) = &query.mentor {
        if &detail.mentor != mentor {
            return false;
        }
    }
    if let Some(search) = &query.search {
        if !detail.title.contains(search.as_str()) {
            return false;
        }
    }
    if !query.tags.is_empty() && !query.tags.iter().any(|tag| detail.tags.contains(tag)) {
        return false;
    }
    true
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(
        &self,
        conversation: ConversationDetail,
    ) -> Result<ConversationDetail, RepositoryError> {
        self.conversations
            .write()
            .unwrap()
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_detail(
        &self,
        id: ConversationId,
    ) -> Result<Option<ConversationDetail>, RepositoryError> {
        Ok(self.conversations.read().unwrap().get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        query: &ConversationListQuery,
    ) -> Result<ConversationListPage, RepositoryError> {
        let mut matched: Vec<ConversationDetail> = self
            .conversations
            .read()
            .unwrap()
            .values()
            .filter(|detail| detail.owner_id == user_id && matches_query(detail, query))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = match query.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Title => a.title.cmp(&b.title),
            };
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as u64;
        let items = matched
            .iter()
            .skip(((query.page - 1) * query.limit) as usize)
            .take(query.limit as usize)
            .map(ConversationDetail::to_summary)
            .collect();

        Ok(ConversationListPage {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn apply_update(
        &self,
        id: ConversationId,
        update: ConversationUpdate,
    ) -> Result<ConversationDetail, RepositoryError> {
        let mut conversations = self.conversations.write().unwrap();
        let detail = conversations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(title) = update.title {
            detail.title = title;
        }
        if let Some(mentor) = update.mentor {
            detail.mentor = mentor;
        }
        if let Some(tags) = update.tags {
            detail.tags = tags;
        }
        Ok(detail.clone())
    }

    async fn toggle_favorite(&self, id: ConversationId) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.write().unwrap();
        let detail = conversations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        detail.favorite = !detail.favorite;
        Ok(detail.favorite)
    }

    async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<ConversationStatus, RepositoryError> {
        let mut conversations = self.conversations.write().unwrap();
        let detail = conversations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        let old_status = detail.status;
        detail.status = status;
        Ok(old_status)
    }

    async fn delete(&self, id: ConversationId) -> Result<(), RepositoryError> {
        self.conversations
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

/// 装配好的核心组件集合。
pub struct CoreHarness {
    pub clock: Arc<ManualClock>,
    pub config: AppConfig,
    pub admission: Arc<AdmissionController>,
    pub event_bus: Arc<EventBus>,
    pub cache: Arc<ConversationCacheCoordinator>,
    pub sequencer: Arc<MessageSequencer>,
    pub message_store: Arc<InMemoryMessageStore>,
    pub conversation_store: Arc<InMemoryConversationStore>,
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
}

/// 使用默认配置装配核心组件。
pub fn build_core() -> CoreHarness {
    build_core_with(AppConfig::default())
}

/// 使用给定配置装配核心组件，时间源为 `ManualClock`。
pub fn build_core_with(config: AppConfig) -> CoreHarness {
    init_tracing();
    config.validate().expect("test config must be valid");

    let clock = Arc::new(ManualClock::new());
    let dyn_clock = clock.clone() as Arc<dyn Clock>;

    let message_store = Arc::new(InMemoryMessageStore::new());
    let conversation_store = Arc::new(InMemoryConversationStore::new());

    let admission = Arc::new(
        AdmissionController::from_config(Arc::clone(&dyn_clock), &config.rate_limit)
            .expect("test rate limit config must be valid"),
    );
    let cache = Arc::new(ConversationCacheCoordinator::from_config(
        Arc::clone(&dyn_clock),
        &config.cache,
    ));
    let event_bus = Arc::new(EventBus::from_config(&config.event_bus));
    let sequencer = Arc::new(MessageSequencer::new(
        message_store.clone() as Arc<dyn MessageStore>
    ));

    let conversation_service = ConversationService::new(
        Arc::clone(&admission),
        Arc::clone(&cache),
        Arc::clone(&event_bus),
        conversation_store.clone() as Arc<dyn ConversationStore>,
        Arc::clone(&dyn_clock),
    );
    let message_service = MessageService::new(
        Arc::clone(&admission),
        Arc::clone(&sequencer),
        Arc::clone(&cache),
        Arc::clone(&event_bus),
        message_store.clone() as Arc<dyn MessageStore>,
        dyn_clock,
    );

    CoreHarness {
        clock,
        config,
        admission,
        event_bus,
        cache,
        sequencer,
        message_store,
        conversation_store,
        conversation_service,
        message_service,
    }
}

/// 初始化测试日志（重复调用安全）。
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
