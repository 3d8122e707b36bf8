//! 通用 TTL 缓存
//!
//! 与领域概念无关的过期键值存储。正确性由 `get` 的惰性过期检查保证，
//! 后台清扫只负责约束内存占用，清扫周期是调优参数而非正确性前提。
//! 不同键的操作互不阻塞；同一键的读写经分片锁线性化。

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::clock::Clock;

/// 缓存错误类型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// 缓存键为空
    #[error("cache key must not be empty")]
    EmptyKey,

    /// TTL 为零
    #[error("cache ttl must be positive")]
    ZeroTtl,
}

/// 缓存条目：值与绝对过期时刻。只会被整体覆盖，不做部分更新。
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// 缓存诊断快照。
///
/// `expired` 统计已过期但尚未清扫的条目，清扫周期之间非零属正常现象。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub active: usize,
}

/// 通用过期缓存。
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// 写入条目，无条件覆盖既有值；空键或零 TTL 当场拒绝。
    pub fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        if ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }
        let expires_at = self.clock.monotonic() + ttl;
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    /// 读取未过期的值；命中过期条目时顺带删除并按未命中处理。
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.monotonic();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // 已过期：仅当条目仍满足过期条件时删除，避免覆盖并发写入的新值
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// 删除条目，返回删除前是否存在。
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 存在性检查，遵循过期语义但不返回值。
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.monotonic();
        self.entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > now)
    }

    /// 清空全部条目。
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// 诊断快照。
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.monotonic();
        let mut expired = 0;
        let mut active = 0;
        for entry in self.entries.iter() {
            if entry.expires_at <= now {
                expired += 1;
            } else {
                active += 1;
            }
        }
        CacheStats {
            total: expired + active,
            expired,
            active,
        }
    }

    /// 清除全部已过期条目，返回清除数量。
    pub fn sweep(&self) -> usize {
        let now = self.clock.monotonic();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// 启动周期清扫任务（仅内存回收）。
    pub fn spawn_sweeper(cache: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // 首个 tick 立即完成，跳过
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}
