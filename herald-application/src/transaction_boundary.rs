//! 事务边界（TransactionBoundary）
//!
//! 用事务包裹一次工作单元：
//! 1. 上下文中已有活跃事务时直接加入，由最外层边界负责完成；
//! 2. 否则开启新事务，经回滚判定执行工作单元；
//! 3. 工作单元成功（或失败但其分类不要求回滚）且事务未被标记 rollback-only 时提交，
//!    随后按入队顺序投递 `raise_on_success` 排队的事件；否则回滚并丢弃队列。
//!
//! 提交后的投递失败只记录日志，不影响后续排队事件，也不改变工作单元的结果。
//!
use herald_core::context::DispatchContext;
use herald_core::event::Event;
use herald_core::eventing::Dispatcher;
use herald_core::transaction::{
    ActionOutcome, ClassifyFailure, RollbackInterceptor, Transaction, TransactionOutcome,
};
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
pub struct TransactionBoundary {
    dispatcher: Arc<Dispatcher>,
    interceptor: RollbackInterceptor,
}

impl TransactionBoundary {
    pub fn new(dispatcher: Arc<Dispatcher>, interceptor: RollbackInterceptor) -> Self {
        Self {
            dispatcher,
            interceptor,
        }
    }

    pub fn interceptor(&self) -> &RollbackInterceptor {
        &self.interceptor
    }

    /// 在事务中执行工作单元，结果原样返回
    pub async fn run<F, Fut, R, E>(&self, ctx: &DispatchContext, work: F) -> Result<R, E>
    where
        F: FnOnce(DispatchContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: ActionOutcome,
        E: ClassifyFailure,
    {
        if ctx.transaction().is_some_and(Transaction::is_active) {
            return self.interceptor.around(ctx, work).await;
        }

        let tx = Transaction::begin();
        let result = self
            .interceptor
            .around(&ctx.with_transaction(tx.clone()), work)
            .await;

        // 不要求回滚的失败（受检失败、rollback = false 的应用级失败）仍然提交
        let success = match &result {
            Ok(_) => true,
            Err(err) => !err.failure_kind().requires_rollback(),
        };
        match tx.complete(success) {
            Ok(TransactionOutcome::Committed(events)) => {
                let after_commit = DispatchContext::builder()
                    .scope(ctx.scope().clone())
                    .build();
                self.flush(&after_commit, &tx, events).await;
            }
            Ok(TransactionOutcome::RolledBack { discarded }) => {
                tracing::debug!(transaction_id = %tx.id(), discarded, "transaction rolled back, queued events discarded");
            }
            Err(err) => {
                // 工作单元自行完成了事务
                tracing::warn!(transaction_id = %tx.id(), error = %err, "transaction already completed by unit of work");
            }
        }

        result
    }

    /// 包装为可重复调用的事务化工作单元
    pub fn wrap<F>(&self, work: F) -> Transactional<F> {
        Transactional {
            boundary: self.clone(),
            work,
        }
    }

    async fn flush(&self, ctx: &DispatchContext, tx: &Transaction, events: Vec<Event>) {
        for event in events {
            if let Err(err) = self.dispatcher.dispatch(ctx, &event).await {
                tracing::error!(
                    transaction_id = %tx.id(),
                    event_type = event.event_type(),
                    error = %err,
                    "post-commit event delivery failed"
                );
            }
        }
    }
}

/// 已包装的事务化工作单元
pub struct Transactional<F> {
    boundary: TransactionBoundary,
    work: F,
}

impl<F> Transactional<F> {
    pub async fn call<Fut, R, E>(&self, ctx: &DispatchContext) -> Result<R, E>
    where
        F: Fn(DispatchContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: ActionOutcome,
        E: ClassifyFailure,
    {
        self.boundary.run(ctx, &self.work).await
    }
}
