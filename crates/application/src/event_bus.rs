//! 进程内事件总线
//!
//! 写路径通过事件总线与副作用（分析统计、搜索索引等）解耦：
//! 同步订阅者按注册顺序在发布方的调用栈内执行，单个订阅者失败
//! 只记录日志，不影响发布方与其余订阅者；后台订阅者经广播通道
//! 异步消费，不阻塞发布方。
//!
//! 仅保证同一事件类型内的订阅者顺序，不保证不同事件类型之间的顺序。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::error;

use config::EventBusConfig;
use domain::ConversationEvent;

/// 同步订阅者回调。
pub type EventHandler = Arc<dyn Fn(&ConversationEvent) -> anyhow::Result<()> + Send + Sync>;

/// 事件总线错误类型
#[derive(Debug, Error)]
pub enum EventBusError {
    /// 单个事件类型的订阅者达到上限（防止泄漏式累积）
    #[error("subscriber limit reached for event '{event_type}': {limit}")]
    SubscriberLimit {
        event_type: &'static str,
        limit: usize,
    },

    /// 订阅表锁中毒
    #[error("event bus registry lock poisoned")]
    Poisoned,
}

/// 订阅凭据，用于取消订阅。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    event_type: &'static str,
}

/// 进程内事件总线。
pub struct EventBus {
    registry: RwLock<HashMap<&'static str, Vec<(u64, EventHandler)>>>,
    next_id: AtomicU64,
    max_subscribers_per_event: usize,
    async_tx: broadcast::Sender<ConversationEvent>,
}

impl EventBus {
    pub fn from_config(config: &EventBusConfig) -> Self {
        let (async_tx, _) = broadcast::channel(config.async_channel_capacity);
        Self {
            registry: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_subscribers_per_event: config.max_subscribers_per_event,
            async_tx,
        }
    }

    /// 注册同步订阅者，按注册顺序接收同类型事件。
    pub fn subscribe(
        &self,
        event_type: &'static str,
        handler: EventHandler,
    ) -> Result<Subscription, EventBusError> {
        let mut registry = self.registry.write().map_err(|_| EventBusError::Poisoned)?;
        let handlers = registry.entry(event_type).or_default();
        if handlers.len() >= self.max_subscribers_per_event {
            return Err(EventBusError::SubscriberLimit {
                event_type,
                limit: self.max_subscribers_per_event,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        handlers.push((id, handler));
        Ok(Subscription { id, event_type })
    }

    /// 取消订阅，返回凭据是否仍然有效。
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let Ok(mut registry) = self.registry.write() else {
            return false;
        };
        let Some(handlers) = registry.get_mut(subscription.event_type) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        handlers.len() < before
    }

    /// 发布事件。
    ///
    /// 返回时全部同步订阅者已执行完毕（或失败并被记录）；
    /// 随后投递到异步广播通道，无接收者时发送失败属正常，忽略。
    pub fn publish(&self, event: &ConversationEvent) {
        let handlers: Vec<EventHandler> = match self.registry.read() {
            Ok(registry) => registry
                .get(event.event_type())
                .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default(),
            Err(_) => {
                error!("event bus registry lock poisoned, dropping event");
                Vec::new()
            }
        };

        for handler in handlers {
            if let Err(err) = handler(event) {
                error!(
                    event_type = event.event_type(),
                    error = %err,
                    "event subscriber failed"
                );
            }
        }

        let _ = self.async_tx.send(event.clone());
    }

    /// 订阅异步广播流，供不阻塞发布方的后台消费者使用。
    pub fn subscribe_async(&self) -> broadcast::Receiver<ConversationEvent> {
        self.async_tx.subscribe()
    }

    /// 某事件类型当前的同步订阅者数量。
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.registry
            .read()
            .map(|registry| registry.get(event_type).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}
