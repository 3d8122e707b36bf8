//! 消息序号分配器
//!
//! 每个会话维护一个进程内权威计数器，保证并发追加下序号单调递增、
//! 无重复；成功写入之间无空洞。首次使用时从持久化存储读取最后序号
//! 播种，此后递增完全在内存中原子完成，不再与存储层竞争。
//!
//! 序号签发后若下游写入失败，该序号不回收：并发下安全回收需要第二次
//! 原子协调，空洞是刻意选择的代价。消费方只应依赖"唯一且单调"。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use domain::{ConversationId, RepositoryError};

use crate::repository::MessageStore;

/// 序号分配错误
#[derive(Debug, Error)]
pub enum SequenceError {
    /// 播种查询失败，调用方可重试或放弃本次追加
    #[error("sequence seed unavailable: {0}")]
    SeedUnavailable(#[from] RepositoryError),
}

/// 消息序号分配器。
pub struct MessageSequencer {
    counters: DashMap<ConversationId, Arc<AtomicU64>>,
    store: Arc<dyn MessageStore>,
}

impl MessageSequencer {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            counters: DashMap::new(),
            store,
        }
    }

    /// 分配下一个消息序号。
    ///
    /// 计数器缺失时先从存储读取最后序号播种；并发播种时首个插入者
    /// 获胜，落败者复用已插入的计数器（重复播种只读不写，无害）。
    pub async fn next_order(
        &self,
        conversation_id: ConversationId,
    ) -> Result<u64, SequenceError> {
        if let Some(counter) = self.counters.get(&conversation_id) {
            return Ok(counter.fetch_add(1, Ordering::SeqCst) + 1);
        }

        let seed = self.store.load_last_message_order(conversation_id).await?;
        debug!(%conversation_id, seed, "seeded message sequence counter");

        let counter = self
            .counters
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(AtomicU64::new(seed)))
            .clone();
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 最近一次签发的序号（尚未播种时为 None）。
    pub fn last_assigned(&self, conversation_id: ConversationId) -> Option<u64> {
        self.counters
            .get(&conversation_id)
            .map(|counter| counter.load(Ordering::SeqCst))
    }

    /// 驱逐某会话的计数器（内存压力时使用）。
    /// 下次分配会重新从存储播种。
    pub fn evict(&self, conversation_id: ConversationId) {
        self.counters.remove(&conversation_id);
    }

    /// 当前驻留的计数器数量。
    pub fn tracked_conversations(&self) -> usize {
        self.counters.len()
    }
}
