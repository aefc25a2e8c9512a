//! 观察者索引（ObserverIndex）
//!
//! 启动时由配置（以及程序化声明）一次性构建，之后只读；运行时不会再追加。
//! 投递时按 (组件名, 方法名, 创建策略) 通过作用域组件注册表解析实例。
//!
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 观察者声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverMethod {
    /// 所属组件名
    pub component: String,
    /// 方法名
    pub method: String,
    /// 实例不存在时是否创建（否则跳过本次投递）
    pub create: bool,
}

impl ObserverMethod {
    pub fn new(component: impl Into<String>, method: impl Into<String>, create: bool) -> Self {
        Self {
            component: component.into(),
            method: method.into(),
            create,
        }
    }
}

/// 事件类型 → 有序观察者声明（只读）
#[derive(Debug, Clone, Default)]
pub struct ObserverIndex {
    by_type: HashMap<String, Arc<[ObserverMethod]>>,
}

impl ObserverIndex {
    pub fn builder() -> ObserverIndexBuilder {
        ObserverIndexBuilder::default()
    }

    /// 某事件类型的观察者（声明顺序）；无声明时为空切片
    pub fn resolve(&self, event_type: &str) -> &[ObserverMethod] {
        self.by_type
            .get(event_type)
            .map(|list| &list[..])
            .unwrap_or(&[])
    }

    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// 启动阶段收集观察者声明，`build` 后冻结
#[derive(Debug, Default)]
pub struct ObserverIndexBuilder {
    by_type: HashMap<String, Vec<ObserverMethod>>,
}

impl ObserverIndexBuilder {
    pub fn observe(&mut self, event_type: impl Into<String>, observer: ObserverMethod) -> &mut Self {
        self.by_type.entry(event_type.into()).or_default().push(observer);
        self
    }

    pub fn build(self) -> ObserverIndex {
        ObserverIndex {
            by_type: self
                .by_type
                .into_iter()
                .map(|(ty, list)| (ty, Arc::from(list)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order_per_type() {
        let mut builder = ObserverIndex::builder();
        builder
            .observe("user.created", ObserverMethod::new("audit", "record", true))
            .observe("user.created", ObserverMethod::new("mailer", "welcome", false))
            .observe("user.deleted", ObserverMethod::new("audit", "record", true));
        let index = builder.build();

        let observers = index.resolve("user.created");
        assert_eq!(observers.len(), 2);
        assert_eq!(observers[0].component, "audit");
        assert_eq!(observers[1].component, "mailer");
        assert!(!observers[1].create);
        assert_eq!(index.event_types(), vec!["user.created", "user.deleted"]);
    }

    #[test]
    fn unknown_type_resolves_to_nothing() {
        let index = ObserverIndex::builder().build();
        assert!(index.resolve("x").is_empty());
        assert!(index.is_empty());
    }
}
