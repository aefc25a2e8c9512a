//! 同步分发（Dispatcher）
//!
//! 一次 `dispatch` 即一轮完整投递：
//! 1. 按顺序调用绑定（声明在前、运行时在后）；
//! 2. 再按声明顺序调用观察者（实例经作用域组件注册表解析）；
//! 3. 任一目标失败立即停止，失败原样返回给调用方，后续绑定与观察者都不再调用。
//!
//! 分发运行在调用方的任务上。目标内部可以再次 raise（允许重入，不做环检测，
//! 自触发死循环由调用方负责避免）。
//!
use std::sync::Arc;

use super::observer::{ObserverIndex, ObserverMethod};
use crate::binding::BindingRegistry;
use crate::component::ComponentRegistry;
use crate::context::DispatchContext;
use crate::error::{EventError, EventResult};
use crate::event::{Event, Params};

/// 合并绑定注册表与观察者索引的分发引擎
pub struct Dispatcher {
    bindings: Arc<BindingRegistry>,
    observers: Arc<ObserverIndex>,
    components: Arc<dyn ComponentRegistry>,
}

impl Dispatcher {
    pub fn new(
        bindings: Arc<BindingRegistry>,
        observers: Arc<ObserverIndex>,
        components: Arc<dyn ComponentRegistry>,
    ) -> Self {
        Self {
            bindings,
            observers,
            components,
        }
    }

    pub fn bindings(&self) -> &Arc<BindingRegistry> {
        &self.bindings
    }

    pub fn observers(&self) -> &Arc<ObserverIndex> {
        &self.observers
    }

    /// 投递一个事件
    pub async fn dispatch(&self, ctx: &DispatchContext, event: &Event) -> EventResult<()> {
        let event_type = event.event_type();
        let params = event.params();
        tracing::debug!(event_type, params = params.len(), "processing event");

        for target in self.bindings.lookup(event_type).iter() {
            target
                .invoke(ctx, params)
                .await
                .map_err(|err| EventError::from_target_failure(event_type, target.describe(), err))?;
        }

        for observer in self.observers.resolve(event_type) {
            self.notify(ctx, event_type, observer, params).await?;
        }

        Ok(())
    }

    async fn notify(
        &self,
        ctx: &DispatchContext,
        event_type: &str,
        observer: &ObserverMethod,
        params: &Params,
    ) -> EventResult<()> {
        let Some(instance) = self
            .components
            .resolve(&observer.component, ctx.scope(), observer.create)
        else {
            if observer.create {
                // 仅影响这一次观察者调用，不中断后续投递
                tracing::error!(
                    event_type,
                    component = %observer.component,
                    method = %observer.method,
                    "observer instance could not be created, skipping"
                );
            } else {
                tracing::debug!(
                    event_type,
                    component = %observer.component,
                    "observer instance not present in scope, skipping"
                );
            }
            return Ok(());
        };

        let target = format!("{}.{}", observer.component, observer.method);
        match instance.arity(&observer.method) {
            None => Err(EventError::binding_resolution(
                &target,
                format!("component `{}` has no method `{}`", observer.component, observer.method),
            )),
            Some(arity) if arity != params.len() => Err(EventError::binding_resolution(
                &target,
                format!("expected {arity} parameter(s), got {}", params.len()),
            )),
            Some(_) => instance
                .call(&observer.method, ctx, params)
                .await
                .map_err(|err| EventError::from_target_failure(event_type, &target, err)),
        }
    }
}
