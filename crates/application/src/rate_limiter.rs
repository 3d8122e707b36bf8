//! 滑动窗口限流器
//!
//! 每个限流键维护当前窗口内的请求时间戳序列，准入判定精确无近似。
//! 过期时间戳在每次检查时惰性剔除，正确性不依赖后台清扫；
//! 周期清扫只负责回收闲置键占用的内存。
//!
//! 同一请求同时受用户配额与 IP 配额约束，任一拒绝即整体拒绝。

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use config::RateLimitConfig;
use domain::{RequestIdentity, UserId};

use crate::clock::Clock;

/// 限流错误类型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    /// 配额或窗口为零（构造期拒绝）
    #[error("invalid rate limit policy: max_requests={max_requests}, window_ms={window_ms}")]
    InvalidPolicy { max_requests: u32, window_ms: u64 },
}

/// 限流策略：窗口长度内允许的最大请求数。
///
/// 只能通过 `new` 构造，非法取值在此处拒绝而非在检查时发现。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    max_requests: u32,
    window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        if max_requests == 0 || window.is_zero() {
            return Err(RateLimitError::InvalidPolicy {
                max_requests,
                window_ms: window.as_millis() as u64,
            });
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// 限流主体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    User,
    Ip,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "user",
            SubjectKind::Ip => "ip",
        }
    }
}

/// 受限动作标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterAction {
    Api,
    CreateConversation,
    SendMessage,
}

impl LimiterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterAction::Api => "api",
            LimiterAction::CreateConversation => "create_conversation",
            LimiterAction::SendMessage => "send_message",
        }
    }
}

/// 限流键：`user:{id}:{action}` 或 `ip:{addr}:{action}`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey(String);

impl LimiterKey {
    pub fn user(user_id: UserId, action: LimiterAction) -> Self {
        Self(format!(
            "{}:{}:{}",
            SubjectKind::User.as_str(),
            user_id,
            action.as_str()
        ))
    }

    pub fn ip(addr: &str, action: LimiterAction) -> Self {
        Self(format!(
            "{}:{}:{}",
            SubjectKind::Ip.as_str(),
            addr,
            action.as_str()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 准入决策。
///
/// 字段足以在 HTTP 边界构造 429 响应（`retry_after_ms` + `remaining`）；
/// 拒绝是正常控制流分支，不是错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_ms: Option<u64>,
}

impl RateLimitDecision {
    fn admitted(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_ms: None,
        }
    }

    fn rejected(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_ms: Some(retry_after.as_millis() as u64),
        }
    }
}

/// 滑动窗口限流器。
///
/// 同一键的"剔除过期 + 判定 + 记录"在分片锁内原子完成，
/// 两个并发请求不可能同时占用最后一个配额；不同键互不阻塞。
pub struct SlidingWindowLimiter {
    windows: DashMap<LimiterKey, VecDeque<Instant>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// 检查并记录一次请求。
    ///
    /// 仅在准入时写入时间戳；拒绝时返回距最旧时间戳离开窗口的等待时长。
    pub fn check(&self, key: &LimiterKey, policy: &RateLimitPolicy) -> RateLimitDecision {
        let now = self.clock.monotonic();
        let mut entry = self.windows.entry(key.clone()).or_default();
        let window = entry.value_mut();

        // 惰性剔除：窗口外（t <= now - W）的时间戳全部丢弃
        while window
            .front()
            .is_some_and(|&t| t + policy.window() <= now)
        {
            window.pop_front();
        }

        if window.len() >= policy.max_requests() as usize {
            let oldest = window.front().copied().unwrap_or(now);
            let retry_after = (oldest + policy.window()).saturating_duration_since(now);
            debug!(
                key = key.as_str(),
                retry_after_ms = retry_after.as_millis() as u64,
                "rate limit exceeded"
            );
            return RateLimitDecision::rejected(retry_after);
        }

        window.push_back(now);
        RateLimitDecision::admitted(policy.max_requests() - window.len() as u32)
    }

    /// 清理已无有效时间戳的闲置键，返回清理数量。
    ///
    /// `max_retention` 取该限流器上使用过的最大窗口长度。
    pub fn cleanup_idle(&self, max_retention: Duration) -> usize {
        let now = self.clock.monotonic();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            while window.front().is_some_and(|&t| t + max_retention <= now) {
                window.pop_front();
            }
            !window.is_empty()
        });
        before - self.windows.len()
    }

    /// 当前跟踪的限流键数量。
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// 用户侧按动作划分的配额集合。
#[derive(Debug, Clone, Copy)]
struct UserPolicies {
    api: RateLimitPolicy,
    create_conversation: RateLimitPolicy,
    send_message: RateLimitPolicy,
}

/// 请求准入控制器。
///
/// 维护两个独立的限流器实例：用户键（较紧配额）与 IP 键（较宽配额）。
/// 先查用户配额再查 IP 配额；用户侧已占用的配额在 IP 侧拒绝时不回收，
/// 以保持单次检查即单个临界区。
pub struct AdmissionController {
    user_limiter: SlidingWindowLimiter,
    ip_limiter: SlidingWindowLimiter,
    user_policies: UserPolicies,
    ip_policy: RateLimitPolicy,
    sweep_interval: Duration,
}

impl AdmissionController {
    /// 根据配置构造控制器，零配额或零窗口在此处拒绝。
    pub fn from_config(
        clock: Arc<dyn Clock>,
        config: &RateLimitConfig,
    ) -> Result<Self, RateLimitError> {
        let user_policies = UserPolicies {
            api: RateLimitPolicy::new(
                config.user_api_max,
                Duration::from_secs(config.user_api_window_secs),
            )?,
            create_conversation: RateLimitPolicy::new(
                config.create_conversation_max,
                Duration::from_secs(config.create_conversation_window_secs),
            )?,
            send_message: RateLimitPolicy::new(
                config.send_message_max,
                Duration::from_secs(config.send_message_window_secs),
            )?,
        };
        let ip_policy =
            RateLimitPolicy::new(config.ip_max, Duration::from_secs(config.ip_window_secs))?;

        Ok(Self {
            user_limiter: SlidingWindowLimiter::new(Arc::clone(&clock)),
            ip_limiter: SlidingWindowLimiter::new(clock),
            user_policies,
            ip_policy,
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        })
    }

    fn user_policy(&self, action: LimiterAction) -> &RateLimitPolicy {
        match action {
            LimiterAction::Api => &self.user_policies.api,
            LimiterAction::CreateConversation => &self.user_policies.create_conversation,
            LimiterAction::SendMessage => &self.user_policies.send_message,
        }
    }

    /// 检查一次请求：先用户配额后 IP 配额，任一拒绝即整体拒绝。
    pub fn check(&self, identity: &RequestIdentity, action: LimiterAction) -> RateLimitDecision {
        let user_decision = self.user_limiter.check(
            &LimiterKey::user(identity.user_id, action),
            self.user_policy(action),
        );
        if !user_decision.allowed {
            return user_decision;
        }

        let ip_decision = self.ip_limiter.check(
            &LimiterKey::ip(&identity.client_addr, action),
            &self.ip_policy,
        );
        if !ip_decision.allowed {
            return ip_decision;
        }

        // 整体剩余额度取两侧较小值
        RateLimitDecision::admitted(user_decision.remaining.min(ip_decision.remaining))
    }

    /// 清理两侧限流器的闲置键，返回清理总数。
    pub fn sweep(&self) -> usize {
        let user_retention = self
            .user_policies
            .api
            .window()
            .max(self.user_policies.create_conversation.window())
            .max(self.user_policies.send_message.window());
        self.user_limiter.cleanup_idle(user_retention)
            + self.ip_limiter.cleanup_idle(self.ip_policy.window())
    }

    /// 启动周期清扫任务（仅内存回收，不承担正确性）。
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // 首个 tick 立即完成，跳过
            loop {
                ticker.tick().await;
                let removed = controller.sweep();
                if removed > 0 {
                    debug!(removed, "swept idle limiter keys");
                }
            }
        })
    }

    /// 两侧限流器当前跟踪的键数量（用户侧, IP 侧）。
    pub fn tracked_keys(&self) -> (usize, usize) {
        (
            self.user_limiter.tracked_keys(),
            self.ip_limiter.tracked_keys(),
        )
    }
}
