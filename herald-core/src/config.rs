//! 事件声明配置（EventsConfig）
//!
//! 启动时读取一次的 JSON 文档：
//!
//! ```json
//! {
//!   "events": [
//!     {
//!       "type": "order.placed",
//!       "actions": [{ "expression": "#{billing.charge}" }],
//!       "observers": [{ "component": "audit", "method": "record", "create": true }]
//!     }
//!   ]
//! }
//! ```
//!
//! 文件不存在不是错误（视为无配置）；缺少 `type`、`expression`、`component`、`method`
//! 的条目在装载时报 `Configuration` 错误并中止启动。同一类型出现多次时按出现顺序合并。
//!
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::binding::BindingRegistry;
use crate::error::{EventError, EventResult};
use crate::eventing::{ObserverIndexBuilder, ObserverMethod};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "HERALD_EVENTS_CONFIG";
/// 未指定时的默认配置文件
pub const DEFAULT_CONFIG_PATH: &str = "events.json";

/// 配置文档根
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub events: Vec<EventDeclaration>,
}

/// 一个事件类型的声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDeclaration {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionDeclaration>,
    #[serde(default)]
    pub observers: Vec<ObserverDeclaration>,
}

/// 绑定：一个目标表达式
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDeclaration {
    #[serde(default)]
    pub expression: Option<String>,
}

/// 观察者：组件名 + 方法名 + 创建策略（缺省为创建）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverDeclaration {
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default = "default_create")]
    pub create: bool,
}

fn default_create() -> bool {
    true
}

impl EventsConfig {
    /// 解析并校验
    pub fn from_json_str(json: &str) -> EventResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件装载；文件不存在时返回 `Ok(None)`
    pub fn load(path: impl AsRef<Path>) -> EventResult<Option<Self>> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let config = Self::from_json_str(&json)?;
                tracing::info!(
                    path = %path.display(),
                    event_types = config.events.len(),
                    "loaded event configuration"
                );
                Ok(Some(config))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no event configuration found, starting empty");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 从 `HERALD_EVENTS_CONFIG` 指定的路径装载，未设置时使用 `events.json`
    pub fn load_default() -> EventResult<Option<Self>> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(path),
            None => Self::load(DEFAULT_CONFIG_PATH),
        }
    }

    /// 校验必填字段
    pub fn validate(&self) -> EventResult<()> {
        for (i, event) in self.events.iter().enumerate() {
            let event_type = event
                .event_type
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| EventError::configuration(format!("events[{i}]: missing event type")))?;

            for (j, action) in event.actions.iter().enumerate() {
                if action.expression.as_deref().is_none_or(str::is_empty) {
                    return Err(EventError::configuration(format!(
                        "event `{event_type}` actions[{j}]: missing expression"
                    )));
                }
            }

            for (j, observer) in event.observers.iter().enumerate() {
                if observer.component.as_deref().is_none_or(str::is_empty) {
                    return Err(EventError::configuration(format!(
                        "event `{event_type}` observers[{j}]: missing component"
                    )));
                }
                if observer.method.as_deref().is_none_or(str::is_empty) {
                    return Err(EventError::configuration(format!(
                        "event `{event_type}` observers[{j}]: missing method"
                    )));
                }
            }
        }
        Ok(())
    }

    /// 一次遍历同时填充声明绑定与观察者索引（启动阶段）
    pub fn apply(
        &self,
        bindings: &mut BindingRegistry,
        observers: &mut ObserverIndexBuilder,
    ) -> EventResult<()> {
        self.validate()?;
        for event in &self.events {
            let Some(event_type) = event.event_type.as_deref() else {
                continue;
            };
            for expression in event.actions.iter().filter_map(|a| a.expression.as_deref()) {
                bindings.declare(event_type, expression)?;
            }
            for observer in &event.observers {
                if let (Some(component), Some(method)) =
                    (observer.component.as_deref(), observer.method.as_deref())
                {
                    observers.observe(
                        event_type,
                        ObserverMethod::new(component, method, observer.create),
                    );
                }
            }
        }
        Ok(())
    }
}
