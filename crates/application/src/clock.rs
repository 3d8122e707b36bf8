//! 时间源抽象
//!
//! 核心组件统一通过 `Clock` 取时间：壁钟时间用于消息记录与事件，
//! 单调时间用于限流窗口与缓存过期计算。测试中注入 `ManualClock`
//! 以确定性地推进时间。

use std::sync::RwLock;
use std::time::{Duration, Instant};

use domain::Timestamp;

pub trait Clock: Send + Sync {
    /// 壁钟时间。
    fn now(&self) -> Timestamp;

    /// 单调时间。
    fn monotonic(&self) -> Instant;
}

/// 系统时钟。
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        time::OffsetDateTime::now_utc()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// 手动时钟：通过 `advance` 推进时间，壁钟与单调时间同步前进。
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    base: Timestamp,
    offset: RwLock<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            base: time::OffsetDateTime::now_utc(),
            offset: RwLock::new(Duration::ZERO),
        }
    }

    /// 向前推进时间。
    pub fn advance(&self, delta: Duration) {
        let mut offset = self.offset.write().expect("clock offset lock poisoned");
        *offset += delta;
    }

    fn offset(&self) -> Duration {
        *self.offset.read().expect("clock offset lock poisoned")
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.base + self.offset()
    }

    fn monotonic(&self) -> Instant {
        self.origin + self.offset()
    }
}
