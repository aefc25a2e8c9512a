use crate::error::AppError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use herald_core::component::{Component, ComponentRegistry, ScopeHandle, ScopeType};
use std::fmt;
use std::sync::Arc;

type ComponentFactory = Arc<dyn Fn() -> Arc<dyn Component> + Send + Sync>;

/// 组件定义：名称、作用域与实例工厂
#[derive(Clone)]
pub struct ComponentDefinition {
    name: String,
    scope: ScopeType,
    factory: ComponentFactory,
}

impl ComponentDefinition {
    pub fn new<F, C>(name: impl Into<String>, scope: ScopeType, factory: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Component + 'static,
    {
        Self {
            name: name.into(),
            scope,
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Component>),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> ScopeType {
        self.scope
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// (作用域类型, 作用域实例键, 组件名)
type InstanceKey = (ScopeType, String, String);

/// 基于内存的作用域组件注册表
/// - 组件定义按名称注册，一个名称只能定义一次
/// - 实例按 (作用域, 作用域实例键, 组件名) 存放，作用域结束时整体清理
/// - 无状态组件不缓存，每次解析（且允许创建时）都产生新实例
#[derive(Default)]
pub struct InMemoryComponentRegistry {
    definitions: DashMap<String, ComponentDefinition>,
    instances: DashMap<InstanceKey, Arc<dyn Component>>,
}

impl InMemoryComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册组件定义
    pub fn define(&self, definition: ComponentDefinition) -> Result<(), AppError> {
        match self.definitions.entry(definition.name.clone()) {
            Entry::Occupied(_) => Err(AppError::AlreadyDefinedComponent {
                component: definition.name,
            }),
            Entry::Vacant(slot) => {
                tracing::debug!(component = %definition.name, scope = %definition.scope, "component defined");
                slot.insert(definition);
                Ok(())
            }
        }
    }

    /// 将已有实例放入当前作用域（覆盖同名实例）
    pub fn install(
        &self,
        name: &str,
        scope: &ScopeHandle,
        instance: Arc<dyn Component>,
    ) -> Result<(), AppError> {
        let slot = self.slot(name, scope)?;
        self.instances.insert(slot, instance);
        Ok(())
    }

    /// 结束一个作用域实例，丢弃其中的全部组件实例，返回丢弃数量
    pub fn end_scope(&self, scope: ScopeType, key: &str) -> usize {
        let before = self.instances.len();
        self.instances
            .retain(|(ty, scope_key, _), _| !(*ty == scope && scope_key == key));
        let removed = before.saturating_sub(self.instances.len());
        tracing::debug!(%scope, key, removed, "scope ended");
        removed
    }

    /// 已定义的组件名（排序）
    pub fn defined_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// 当前缓存的实例数
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn slot(&self, name: &str, scope: &ScopeHandle) -> Result<InstanceKey, AppError> {
        let Some(definition) = self.definitions.get(name).map(|d| d.scope) else {
            return Err(AppError::UndefinedComponent {
                component: name.to_string(),
            });
        };
        let key = scope
            .key(definition)
            .ok_or_else(|| AppError::InactiveScope {
                component: name.to_string(),
                scope: definition.to_string(),
            })?;
        Ok((definition, key.to_string(), name.to_string()))
    }
}

impl ComponentRegistry for InMemoryComponentRegistry {
    fn resolve(
        &self,
        name: &str,
        scope: &ScopeHandle,
        create: bool,
    ) -> Option<Arc<dyn Component>> {
        // 克隆定义后立即释放分片锁，工厂可能再次访问注册表
        let definition = self.definitions.get(name).map(|d| d.value().clone())?;

        if definition.scope == ScopeType::Stateless {
            return create.then(|| (definition.factory)());
        }

        let key = scope.key(definition.scope)?;
        let slot = (definition.scope, key.to_string(), name.to_string());
        if let Some(instance) = self.instances.get(&slot) {
            return Some(instance.value().clone());
        }
        if !create {
            return None;
        }

        let created = (definition.factory)();
        // 并发创建时以先写入者为准
        Some(self.instances.entry(slot).or_insert(created).value().clone())
    }
}
