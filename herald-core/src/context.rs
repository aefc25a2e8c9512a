use bon::Builder;

use crate::component::ScopeHandle;
use crate::transaction::Transaction;

/// 分发上下文（Dispatch Context）
///
/// 承载一次分发所需的横切信息，显式地向下传递而不是依赖环境查找：
/// - 作用域句柄（`ScopeHandle`）：观察者与方法表达式据此解析组件实例；
/// - 当前事务（`Transaction`，可选）：`raise_on_success` 的排队目标，
///   回滚判定据此标记 rollback-only。
///
/// 典型用法：
/// ```rust
/// use herald_core::component::{ScopeHandle, ScopeType};
/// use herald_core::context::DispatchContext;
/// use herald_core::transaction::Transaction;
///
/// let ctx = DispatchContext::builder()
///     .scope(ScopeHandle::application().with(ScopeType::Session, "s-42"))
///     .transaction(Transaction::begin())
///     .build();
/// assert!(ctx.transaction().is_some());
/// ```
#[derive(Builder, Clone, Debug, Default)]
pub struct DispatchContext {
    /// 活跃作用域（默认仅应用作用域）
    #[builder(default)]
    scope: ScopeHandle,
    /// 当前事务（可选）
    transaction: Option<Transaction>,
}

impl DispatchContext {
    /// 后台上下文：仅应用作用域，无事务
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn scope(&self) -> &ScopeHandle {
        &self.scope
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// 同一作用域下绑定另一个事务
    pub fn with_transaction(&self, transaction: Transaction) -> Self {
        Self {
            scope: self.scope.clone(),
            transaction: Some(transaction),
        }
    }
}
