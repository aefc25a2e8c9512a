//! 绑定注册表（BindingRegistry）
//!
//! 每个事件类型维护两份有序目标列表：
//! - 声明列表：启动时由配置编译生成，之后只读；
//! - 运行时列表：`register` 追加，写时复制（copy-on-write）；新列表在锁外构建，
//!   分片锁内仅做指针比较与替换，冲突时重试。
//!
//! 查找返回两份列表的快照（声明在前、运行时在后），持有快照期间不会看到
//! 并发注册造成的部分写入。
//!
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use super::target::{Target, TargetCompiler};
use crate::error::EventResult;

type TargetList = Arc<[Arc<dyn Target>]>;

/// 事件类型 → 有序目标列表
pub struct BindingRegistry {
    declared: HashMap<String, TargetList>,
    runtime: DashMap<String, TargetList>,
    compiler: Arc<dyn TargetCompiler>,
}

impl BindingRegistry {
    pub fn new(compiler: Arc<dyn TargetCompiler>) -> Self {
        Self {
            declared: HashMap::new(),
            runtime: DashMap::new(),
            compiler,
        }
    }

    /// 启动阶段追加一个声明绑定（按声明顺序）
    ///
    /// 需要 `&mut self`：注册表一旦放入 `Arc` 共享，声明列表即不可再变。
    pub fn declare(&mut self, event_type: &str, expression: &str) -> EventResult<()> {
        let target = self.compiler.compile(expression)?;
        let list = self.declared.entry(event_type.to_string()).or_insert_with(empty);
        *list = append(list, target);
        Ok(())
    }

    /// 运行时注册：编译表达式并追加到该类型的运行时列表
    pub fn register(&self, event_type: &str, expression: &str) -> EventResult<()> {
        let target = self.compiler.compile(expression)?;
        self.register_target(event_type, target);
        Ok(())
    }

    /// 运行时注册一个已构造的目标
    pub fn register_target(&self, event_type: &str, target: Arc<dyn Target>) {
        tracing::debug!(event_type, target = target.describe(), "registering event binding");
        loop {
            // 在锁外复制列表，分片写锁内只比较并替换指针
            let current = self.runtime.get(event_type).map(|list| list.value().clone());
            let next = append(current.as_ref().unwrap_or(&empty()), target.clone());
            match self.runtime.entry(event_type.to_string()) {
                Entry::Occupied(mut entry) => {
                    if current.as_ref().is_some_and(|seen| Arc::ptr_eq(seen, entry.get())) {
                        entry.insert(next);
                        return;
                    }
                }
                Entry::Vacant(entry) => {
                    if current.is_none() {
                        entry.insert(next);
                        return;
                    }
                }
            }
            // 期间有其他写者替换了列表，基于新快照重试
        }
    }

    /// 返回声明列表 + 运行时列表的快照
    pub fn lookup(&self, event_type: &str) -> Bindings {
        Bindings {
            declared: self.declared.get(event_type).cloned(),
            runtime: self.runtime.get(event_type).map(|list| list.value().clone()),
        }
    }

    /// 已有绑定的事件类型（去重、排序）
    pub fn registered_event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .declared
            .keys()
            .cloned()
            .chain(self.runtime.iter().map(|e| e.key().clone()))
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    }
}

fn empty() -> TargetList {
    Arc::from(Vec::new())
}

fn append(list: &TargetList, target: Arc<dyn Target>) -> TargetList {
    list.iter().cloned().chain(std::iter::once(target)).collect()
}

/// 某事件类型的绑定快照
#[derive(Clone, Default)]
pub struct Bindings {
    declared: Option<TargetList>,
    runtime: Option<TargetList>,
}

impl Bindings {
    /// 按调用顺序迭代：声明绑定在前，运行时绑定在后
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Target>> {
        self.declared
            .iter()
            .chain(self.runtime.iter())
            .flat_map(|list| list.iter())
    }

    pub fn len(&self) -> usize {
        self.declared.as_ref().map_or(0, |l| l.len()) + self.runtime.as_ref().map_or(0, |l| l.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::target::FnTarget;
    use crate::error::EventError;
    use assert_matches::assert_matches;

    /// 把表达式原文当作目标名的编译器，仅用于观察顺序
    struct NamingCompiler;

    impl TargetCompiler for NamingCompiler {
        fn compile(&self, expression: &str) -> EventResult<Arc<dyn Target>> {
            if expression.is_empty() {
                return Err(EventError::configuration("empty expression"));
            }
            Ok(Arc::new(FnTarget::new(expression, |_ctx, _params| async {
                Ok(())
            })))
        }
    }

    fn names(bindings: &Bindings) -> Vec<String> {
        bindings.iter().map(|t| t.describe().to_string()).collect()
    }

    #[test]
    fn declared_bindings_precede_runtime_bindings() {
        let mut registry = BindingRegistry::new(Arc::new(NamingCompiler));
        registry.declare("order.placed", "declared-1").unwrap();
        registry.declare("order.placed", "declared-2").unwrap();
        let registry = Arc::new(registry);

        registry.register("order.placed", "runtime-1").unwrap();
        registry.register("order.placed", "runtime-2").unwrap();

        assert_eq!(
            names(&registry.lookup("order.placed")),
            vec!["declared-1", "declared-2", "runtime-1", "runtime-2"]
        );
    }

    #[test]
    fn unknown_type_yields_empty_snapshot() {
        let registry = BindingRegistry::new(Arc::new(NamingCompiler));
        assert!(registry.lookup("nobody.listens").is_empty());
    }

    #[test]
    fn malformed_target_is_rejected_without_touching_the_list() {
        let registry = BindingRegistry::new(Arc::new(NamingCompiler));
        registry.register("a", "ok").unwrap();
        assert_matches!(registry.register("a", ""), Err(EventError::Configuration { .. }));
        assert_eq!(names(&registry.lookup("a")), vec!["ok"]);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_registrations() {
        let registry = BindingRegistry::new(Arc::new(NamingCompiler));
        registry.register("a", "first").unwrap();
        let snapshot = registry.lookup("a");
        registry.register("a", "second").unwrap();

        assert_eq!(names(&snapshot), vec!["first"]);
        assert_eq!(names(&registry.lookup("a")), vec!["first", "second"]);
    }

    #[test]
    fn concurrent_registrations_are_all_visible() {
        let registry = Arc::new(BindingRegistry::new(Arc::new(NamingCompiler)));

        std::thread::scope(|s| {
            for w in 0..8 {
                let registry = registry.clone();
                s.spawn(move || {
                    for i in 0..50 {
                        registry.register("hot", &format!("w{w}-{i}")).unwrap();
                        // 读者只会看到完整列表
                        let snapshot = registry.lookup("hot");
                        assert_eq!(snapshot.iter().count(), snapshot.len());
                    }
                });
            }
        });

        let all = names(&registry.lookup("hot"));
        assert_eq!(all.len(), 400);
        // 同一写者的注册保持调用顺序
        for w in 0..8 {
            let mine: Vec<_> = all.iter().filter(|n| n.starts_with(&format!("w{w}-"))).collect();
            let expected: Vec<String> = (0..50).map(|i| format!("w{w}-{i}")).collect();
            assert_eq!(mine, expected.iter().collect::<Vec<_>>());
        }
        assert_eq!(registry.registered_event_types(), vec!["hot".to_string()]);
    }

    #[test]
    fn racing_first_registrations_on_a_new_type_are_not_lost() {
        let registry = Arc::new(BindingRegistry::new(Arc::new(NamingCompiler)));
        let start = std::sync::Barrier::new(16);

        std::thread::scope(|s| {
            for w in 0..16 {
                let registry = registry.clone();
                let start = &start;
                s.spawn(move || {
                    start.wait();
                    registry.register("fresh", &format!("w{w}")).unwrap();
                });
            }
        });

        let mut all = names(&registry.lookup("fresh"));
        all.sort();
        let mut expected: Vec<String> = (0..16).map(|w| format!("w{w}")).collect();
        expected.sort();
        assert_eq!(all, expected);
    }
}
