//! 作用域组件（Component）协议
//!
//! 观察者与方法表达式在投递时需要一个"活的"组件实例。实例的创建与查找由外部的
//! 作用域组件注册表负责，本模块只定义其最小协议：
//! - `ScopeType`：组件的生命周期作用域；
//! - `ScopeHandle`：显式传递的"当前活跃作用域"句柄，避免隐式的环境查找；
//! - `Component`：按方法名调用的组件实例；
//! - `ComponentRegistry`：`resolve(name, scope, create)`，纯粹由入参决定结果。
//!
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::context::DispatchContext;
use crate::event::Params;

/// 应用作用域的固定实例键
pub const APPLICATION_SCOPE_KEY: &str = "application";

/// 组件生命周期作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    /// 无状态：每次解析都是新实例，从不缓存
    Stateless,
    Event,
    Page,
    Conversation,
    Session,
    Business,
    Application,
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeType::Stateless => "stateless",
            ScopeType::Event => "event",
            ScopeType::Page => "page",
            ScopeType::Conversation => "conversation",
            ScopeType::Session => "session",
            ScopeType::Business => "business",
            ScopeType::Application => "application",
        };
        f.write_str(name)
    }
}

/// 当前活跃作用域句柄
///
/// 记录每个活跃作用域对应的实例键（如某个会话 ID）。应用作用域始终活跃；
/// 句柄本身不可变，`with` 返回新的句柄，克隆开销仅为一次 `Arc` 计数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeHandle {
    active: Arc<BTreeMap<ScopeType, String>>,
}

impl Default for ScopeHandle {
    fn default() -> Self {
        Self::application()
    }
}

impl ScopeHandle {
    /// 仅应用作用域活跃（后台任务、定时投递使用）
    pub fn application() -> Self {
        let mut active = BTreeMap::new();
        active.insert(ScopeType::Application, APPLICATION_SCOPE_KEY.to_string());
        Self {
            active: Arc::new(active),
        }
    }

    /// 激活一个作用域实例，返回新句柄
    pub fn with(&self, scope: ScopeType, key: impl Into<String>) -> Self {
        let mut active = (*self.active).clone();
        active.insert(scope, key.into());
        Self {
            active: Arc::new(active),
        }
    }

    /// 返回某作用域当前的实例键；作用域未激活时为 `None`
    pub fn key(&self, scope: ScopeType) -> Option<&str> {
        self.active.get(&scope).map(String::as_str)
    }

    pub fn is_active(&self, scope: ScopeType) -> bool {
        scope == ScopeType::Stateless || self.active.contains_key(&scope)
    }
}

/// 可按方法名调用的组件实例
#[async_trait]
pub trait Component: Send + Sync {
    /// 方法的参数个数；未知方法返回 `None`
    fn arity(&self, method: &str) -> Option<usize>;

    /// 调用指定方法
    async fn call(
        &self,
        method: &str,
        ctx: &DispatchContext,
        params: &Params,
    ) -> anyhow::Result<()>;
}

/// 作用域组件注册表：按名称、作用域与创建策略解析实例
pub trait ComponentRegistry: Send + Sync {
    /// - `create = false`：实例不存在时返回 `None`；
    /// - `create = true`：不存在时尝试创建，所需作用域未激活等情况下仍可能返回 `None`。
    fn resolve(
        &self,
        name: &str,
        scope: &ScopeHandle,
        create: bool,
    ) -> Option<Arc<dyn Component>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_scope_is_always_active() {
        let handle = ScopeHandle::default();
        assert_eq!(handle.key(ScopeType::Application), Some(APPLICATION_SCOPE_KEY));
        assert!(handle.is_active(ScopeType::Stateless));
        assert!(!handle.is_active(ScopeType::Session));
    }

    #[test]
    fn with_does_not_mutate_the_original_handle() {
        let base = ScopeHandle::application();
        let session = base.with(ScopeType::Session, "s-1");
        assert_eq!(session.key(ScopeType::Session), Some("s-1"));
        assert_eq!(base.key(ScopeType::Session), None);
    }
}
