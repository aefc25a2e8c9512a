//! 事务（Transaction）
//!
//! - `Transaction`：事务句柄，持有状态与"仅在成功时投递"的事件队列；
//! - `rollback`：工作单元的回滚判定（按返回结果与失败分类标记 rollback-only）。
//!
mod rollback;
mod state;

pub use rollback::{
    ActionOutcome, ApplicationFailure, CheckedFailure, ClassifyFailure, ComponentKind,
    FailureKind, Intercepted, REDISPLAY, RollbackInterceptor, RollbackPolicy,
};
pub use state::{Transaction, TransactionOutcome, TransactionStatus};
