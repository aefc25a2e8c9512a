//! 事件系统统一错误定义
//!
//! 聚焦配置装载、表达式解析、目标调用、调度与事务标记等最小必要集合，
//! 便于上层统一转换为 `EventError`。
//!
use thiserror::Error;

/// 统一错误类型（事件系统最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    // --- 配置/装载 ---
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    // --- 绑定/调用 ---
    #[error("binding resolution error: expression={expression}, reason={reason}")]
    BindingResolution { expression: String, reason: String },
    #[error("target invocation failed: event={event_type}, target={target}: {source}")]
    TargetInvocation {
        event_type: String,
        target: String,
        #[source]
        source: anyhow::Error,
    },

    // --- 调度 ---
    #[error("scheduling failure: {reason}")]
    Scheduling { reason: String },

    // --- 事务 ---
    #[error("transaction error: {reason}")]
    Transaction { reason: String },

    // --- 通用 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl EventError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn binding_resolution(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BindingResolution {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    pub fn scheduling(reason: impl Into<String>) -> Self {
        Self::Scheduling {
            reason: reason.into(),
        }
    }

    pub fn transaction(reason: impl Into<String>) -> Self {
        Self::Transaction {
            reason: reason.into(),
        }
    }

    /// 将目标返回的失败归一化：
    /// - 已是 `EventError`（如嵌套分发、绑定解析失败）则原样返回；
    /// - 其他失败包装为 `TargetInvocation`，原始错误保留在 `source` 中。
    pub(crate) fn from_target_failure(
        event_type: &str,
        target: &str,
        err: anyhow::Error,
    ) -> Self {
        match err.downcast::<EventError>() {
            Ok(inner) => inner,
            Err(source) => Self::TargetInvocation {
                event_type: event_type.to_string(),
                target: target.to_string(),
                source,
            },
        }
    }
}

/// 统一 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;
