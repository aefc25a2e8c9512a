//! 可调用目标（Target）与目标编译器（TargetCompiler）
//!
//! 编译与调用是两个阶段：
//! - 编译期：表达式无法解析 → `EventError::Configuration`；
//! - 调用期：引用无法解析为可调用方法 → `EventError::BindingResolution`。
//!
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::DispatchContext;
use crate::error::{EventError, EventResult};
use crate::event::Params;

/// 绑定到事件类型上的可调用目标
#[async_trait]
pub trait Target: Send + Sync {
    /// 目标描述（表达式原文或闭包名），用于日志与错误
    fn describe(&self) -> &str;

    /// 以给定参数调用目标
    async fn invoke(&self, ctx: &DispatchContext, params: &Params) -> anyhow::Result<()>;
}

/// 目标编译器：将文本表达式编译为 `Target`
pub trait TargetCompiler: Send + Sync {
    fn compile(&self, expression: &str) -> EventResult<Arc<dyn Target>>;
}

type TargetFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type TargetFn = Arc<dyn Fn(DispatchContext, Params) -> TargetFuture + Send + Sync>;

/// 以闭包实现的目标，便于进程内直接注册
#[derive(Clone)]
pub struct FnTarget {
    name: String,
    arity: Option<usize>,
    f: TargetFn,
}

impl FnTarget {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(DispatchContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            arity: None,
            f: Arc::new(move |ctx, params| Box::pin(f(ctx, params))),
        }
    }

    /// 固定参数个数，调用时不匹配则报 `BindingResolution`
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

#[async_trait]
impl Target for FnTarget {
    fn describe(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, ctx: &DispatchContext, params: &Params) -> anyhow::Result<()> {
        if let Some(expected) = self.arity {
            if expected != params.len() {
                return Err(EventError::binding_resolution(
                    &self.name,
                    format!("expected {expected} parameter(s), got {}", params.len()),
                )
                .into());
            }
        }
        (self.f)(ctx.clone(), params.clone()).await
    }
}

/// `FnTarget::new` 的简写，直接得到 trait object
pub fn target_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Target>
where
    F: Fn(DispatchContext, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnTarget::new(name, f))
}
