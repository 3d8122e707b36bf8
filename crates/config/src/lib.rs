//! 统一配置中心
//!
//! 提供资源控制核心的全局配置管理，包括：
//! - 限流配额与时间窗口
//! - 缓存 TTL 与清扫周期
//! - 事件总线容量
//!
//! 非法配额（零值）在 `validate` 中于启动期拒绝，而非在调用期发现。

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 配额、窗口或 TTL 为零
    #[error("config field '{0}' must be positive")]
    NonPositive(&'static str),
}

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 限流配置
    pub rate_limit: RateLimitConfig,
    /// 缓存配置
    pub cache: CacheConfig,
    /// 事件总线配置
    pub event_bus: EventBusConfig,
}

/// 限流配置
///
/// 用户侧配额按动作区分，IP 侧使用统一的宽松配额；
/// 同一请求两侧都要通过。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 通用 API：窗口内最大请求数
    pub user_api_max: u32,
    /// 通用 API：窗口长度（秒）
    pub user_api_window_secs: u64,
    /// 创建会话：窗口内最大请求数
    pub create_conversation_max: u32,
    /// 创建会话：窗口长度（秒）
    pub create_conversation_window_secs: u64,
    /// 发送消息：窗口内最大请求数
    pub send_message_max: u32,
    /// 发送消息：窗口长度（秒）
    pub send_message_window_secs: u64,
    /// IP 配额：窗口内最大请求数
    pub ip_max: u32,
    /// IP 配额：窗口长度（秒）
    pub ip_window_secs: u64,
    /// 闲置键清扫周期（秒），仅内存回收
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user_api_max: 100,
            user_api_window_secs: 60,
            create_conversation_max: 20,
            create_conversation_window_secs: 3600,
            send_message_max: 100,
            send_message_window_secs: 3600,
            ip_max: 200,
            ip_window_secs: 60,
            sweep_interval_secs: 300,
        }
    }
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 列表缓存 TTL（秒）。列表缓存仅靠 TTL 衰减失效，
    /// 该值同时是列表视图的最大陈旧窗口。
    pub list_ttl_secs: u64,
    /// 详情缓存 TTL（秒）
    pub detail_ttl_secs: u64,
    /// 消息列表缓存 TTL（秒）
    pub messages_ttl_secs: u64,
    /// 过期条目清扫周期（秒），仅内存回收
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_ttl_secs: 300,
            detail_ttl_secs: 1800,
            messages_ttl_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

/// 事件总线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// 单个事件类型的同步订阅者上限（防止泄漏式累积）
    pub max_subscribers_per_event: usize,
    /// 异步广播通道容量
    pub async_channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_subscribers_per_event: 32,
            async_channel_capacity: 256,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            event_bus: EventBusConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置，未设置的项使用默认值。
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rate_limit: RateLimitConfig {
                user_api_max: env_u32("MENTOR_RATE_USER_API_MAX", defaults.rate_limit.user_api_max),
                user_api_window_secs: env_u64(
                    "MENTOR_RATE_USER_API_WINDOW_SECS",
                    defaults.rate_limit.user_api_window_secs,
                ),
                create_conversation_max: env_u32(
                    "MENTOR_RATE_CREATE_CONVERSATION_MAX",
                    defaults.rate_limit.create_conversation_max,
                ),
                create_conversation_window_secs: env_u64(
                    "MENTOR_RATE_CREATE_CONVERSATION_WINDOW_SECS",
                    defaults.rate_limit.create_conversation_window_secs,
                ),
                send_message_max: env_u32(
                    "MENTOR_RATE_SEND_MESSAGE_MAX",
                    defaults.rate_limit.send_message_max,
                ),
                send_message_window_secs: env_u64(
                    "MENTOR_RATE_SEND_MESSAGE_WINDOW_SECS",
                    defaults.rate_limit.send_message_window_secs,
                ),
                ip_max: env_u32("MENTOR_RATE_IP_MAX", defaults.rate_limit.ip_max),
                ip_window_secs: env_u64(
                    "MENTOR_RATE_IP_WINDOW_SECS",
                    defaults.rate_limit.ip_window_secs,
                ),
                sweep_interval_secs: env_u64(
                    "MENTOR_RATE_SWEEP_INTERVAL_SECS",
                    defaults.rate_limit.sweep_interval_secs,
                ),
            },
            cache: CacheConfig {
                list_ttl_secs: env_u64("MENTOR_CACHE_LIST_TTL_SECS", defaults.cache.list_ttl_secs),
                detail_ttl_secs: env_u64(
                    "MENTOR_CACHE_DETAIL_TTL_SECS",
                    defaults.cache.detail_ttl_secs,
                ),
                messages_ttl_secs: env_u64(
                    "MENTOR_CACHE_MESSAGES_TTL_SECS",
                    defaults.cache.messages_ttl_secs,
                ),
                sweep_interval_secs: env_u64(
                    "MENTOR_CACHE_SWEEP_INTERVAL_SECS",
                    defaults.cache.sweep_interval_secs,
                ),
            },
            event_bus: EventBusConfig {
                max_subscribers_per_event: env_usize(
                    "MENTOR_EVENT_MAX_SUBSCRIBERS",
                    defaults.event_bus.max_subscribers_per_event,
                ),
                async_channel_capacity: env_usize(
                    "MENTOR_EVENT_ASYNC_CAPACITY",
                    defaults.event_bus.async_channel_capacity,
                ),
            },
        }
    }

    /// 校验配置：任何配额、窗口或 TTL 为零都视为启动期错误。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rl = &self.rate_limit;
        check_positive(rl.user_api_max as u64, "rate_limit.user_api_max")?;
        check_positive(rl.user_api_window_secs, "rate_limit.user_api_window_secs")?;
        check_positive(
            rl.create_conversation_max as u64,
            "rate_limit.create_conversation_max",
        )?;
        check_positive(
            rl.create_conversation_window_secs,
            "rate_limit.create_conversation_window_secs",
        )?;
        check_positive(rl.send_message_max as u64, "rate_limit.send_message_max")?;
        check_positive(
            rl.send_message_window_secs,
            "rate_limit.send_message_window_secs",
        )?;
        check_positive(rl.ip_max as u64, "rate_limit.ip_max")?;
        check_positive(rl.ip_window_secs, "rate_limit.ip_window_secs")?;
        check_positive(rl.sweep_interval_secs, "rate_limit.sweep_interval_secs")?;

        let cache = &self.cache;
        check_positive(cache.list_ttl_secs, "cache.list_ttl_secs")?;
        check_positive(cache.detail_ttl_secs, "cache.detail_ttl_secs")?;
        check_positive(cache.messages_ttl_secs, "cache.messages_ttl_secs")?;
        check_positive(cache.sweep_interval_secs, "cache.sweep_interval_secs")?;

        let bus = &self.event_bus;
        check_positive(
            bus.max_subscribers_per_event as u64,
            "event_bus.max_subscribers_per_event",
        )?;
        check_positive(
            bus.async_channel_capacity as u64,
            "event_bus.async_channel_capacity",
        )?;
        Ok(())
    }
}

fn check_positive(value: u64, field: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NonPositive(field));
    }
    Ok(())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
