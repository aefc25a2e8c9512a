//! 回滚判定（Rollback decision）
//!
//! 包裹一次工作单元调用，根据返回的结果值或失败分类决定是否将当前事务标记为
//! rollback-only。判定只产生"标记"这一副作用：工作单元的返回值与失败总是原样返回。
//!
//! 正常返回（值 `R`）：
//! - 未声明回滚结果集：不处理；
//! - 声明了空集：总是回滚；
//! - `R` 在结果集中，或 `R` 缺省且结果集包含 [`REDISPLAY`]：回滚。
//!
//! 失败返回（仅对 `ComponentKind::Plain` 组件生效）：
//! - 未归类为应用级失败的非受检失败：回滚；
//! - 应用级失败且其自身回滚标记为 true：回滚。
//!
//! 标记本身失败（如当前没有事务）时只记录日志并吞掉，不会掩盖原始结果。
//!
use std::future::Future;
use thiserror::Error;

use crate::context::DispatchContext;
use crate::error::EventError;

/// "重新显示"哨兵结果：声明在结果集中时，缺省返回值也会触发回滚
pub const REDISPLAY: &str = "redisplay";

/// 方法声明的回滚结果集
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RollbackPolicy {
    /// 未声明
    #[default]
    Undeclared,
    /// 声明了结果集；空集表示无论结果如何都回滚
    IfOutcome(Vec<String>),
}

impl RollbackPolicy {
    pub fn always() -> Self {
        Self::IfOutcome(Vec::new())
    }

    pub fn if_outcome<I, S>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::IfOutcome(outcomes.into_iter().map(Into::into).collect())
    }

    /// 给定结果（`None` 表示缺省返回值）是否要求回滚
    pub fn requires_rollback(&self, outcome: Option<&str>) -> bool {
        match self {
            RollbackPolicy::Undeclared => false,
            RollbackPolicy::IfOutcome(outcomes) => {
                outcomes.is_empty()
                    || match outcome {
                        Some(o) => outcomes.iter().any(|x| x == o),
                        None => outcomes.iter().any(|x| x == REDISPLAY),
                    }
            }
        }
    }
}

/// 工作单元的返回值中可用于判定的"结果"
pub trait ActionOutcome {
    fn outcome(&self) -> Option<&str>;
}

impl ActionOutcome for () {
    fn outcome(&self) -> Option<&str> {
        None
    }
}

impl ActionOutcome for String {
    fn outcome(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl ActionOutcome for &str {
    fn outcome(&self) -> Option<&str> {
        Some(*self)
    }
}

impl<T: ActionOutcome> ActionOutcome for Option<T> {
    fn outcome(&self) -> Option<&str> {
        self.as_ref().and_then(ActionOutcome::outcome)
    }
}

/// 失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 非受检失败（缺陷、基础设施故障等）
    Unchecked,
    /// 受检失败（调用方预期并处理的业务分支）
    Checked,
    /// 显式标注的应用级失败，自带回滚标记
    Application { rollback: bool },
}

impl FailureKind {
    pub fn requires_rollback(self) -> bool {
        match self {
            FailureKind::Unchecked => true,
            FailureKind::Checked => false,
            FailureKind::Application { rollback } => rollback,
        }
    }
}

/// 将失败归类，供回滚判定使用
pub trait ClassifyFailure {
    fn failure_kind(&self) -> FailureKind;
}

/// 应用级失败：是否回滚由自身标记决定
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ApplicationFailure {
    rollback: bool,
    #[source]
    source: anyhow::Error,
}

impl ApplicationFailure {
    pub fn new(rollback: bool, source: impl Into<anyhow::Error>) -> Self {
        Self {
            rollback,
            source: source.into(),
        }
    }

    pub fn rollback(&self) -> bool {
        self.rollback
    }
}

/// 受检失败：调用方预期的失败，从不触发回滚
#[derive(Debug, Error)]
#[error("{source}")]
pub struct CheckedFailure {
    #[source]
    source: anyhow::Error,
}

impl CheckedFailure {
    pub fn new(source: impl Into<anyhow::Error>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl ClassifyFailure for anyhow::Error {
    fn failure_kind(&self) -> FailureKind {
        if let Some(app) = self.downcast_ref::<ApplicationFailure>() {
            FailureKind::Application {
                rollback: app.rollback,
            }
        } else if self.is::<CheckedFailure>() {
            FailureKind::Checked
        } else {
            FailureKind::Unchecked
        }
    }
}

impl ClassifyFailure for EventError {
    fn failure_kind(&self) -> FailureKind {
        FailureKind::Unchecked
    }
}

/// 组件类别：只有普通组件由本判定接管失败回滚，托管事务组件交给其容器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComponentKind {
    #[default]
    Plain,
    ManagedTransaction,
}

/// 回滚判定拦截器
#[derive(Debug, Clone, Default)]
pub struct RollbackInterceptor {
    kind: ComponentKind,
    policy: RollbackPolicy,
}

impl RollbackInterceptor {
    pub fn new(kind: ComponentKind, policy: RollbackPolicy) -> Self {
        Self { kind, policy }
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn policy(&self) -> &RollbackPolicy {
        &self.policy
    }

    /// 执行工作单元并做回滚判定，结果原样返回
    pub async fn around<F, Fut, R, E>(&self, ctx: &DispatchContext, work: F) -> Result<R, E>
    where
        F: FnOnce(DispatchContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: ActionOutcome,
        E: ClassifyFailure,
    {
        match work(ctx.clone()).await {
            Ok(result) => {
                if self.policy.requires_rollback(result.outcome()) {
                    mark_rollback_only(ctx, "declared rollback outcome");
                }
                Ok(result)
            }
            Err(err) => {
                if self.kind == ComponentKind::Plain && err.failure_kind().requires_rollback() {
                    mark_rollback_only(ctx, "failure requires rollback");
                }
                Err(err)
            }
        }
    }

    /// 将工作单元包装为带回滚判定的可调用对象
    pub fn wrap<F>(self, work: F) -> Intercepted<F> {
        Intercepted {
            interceptor: self,
            work,
        }
    }
}

/// 已包装的工作单元
pub struct Intercepted<F> {
    interceptor: RollbackInterceptor,
    work: F,
}

impl<F> Intercepted<F> {
    pub async fn call<Fut, R, E>(&self, ctx: &DispatchContext) -> Result<R, E>
    where
        F: Fn(DispatchContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: ActionOutcome,
        E: ClassifyFailure,
    {
        self.interceptor.around(ctx, &self.work).await
    }

    pub fn interceptor(&self) -> &RollbackInterceptor {
        &self.interceptor
    }
}

fn mark_rollback_only(ctx: &DispatchContext, reason: &'static str) {
    let marked = match ctx.transaction() {
        Some(tx) => tx.set_rollback_only(),
        None => Err(EventError::transaction("no active transaction")),
    };
    match marked {
        Ok(()) => tracing::debug!(reason, "transaction marked rollback-only"),
        Err(err) => tracing::warn!(reason, error = %err, "could not mark transaction rollback-only"),
    }
}
