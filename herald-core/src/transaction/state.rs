use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::error::{EventError, EventResult};
use crate::event::Event;

/// 事务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    /// 已标记 rollback-only，完成时必然回滚
    MarkedRollback,
    Committed,
    RolledBack,
}

/// 事务完成结果
#[derive(Debug)]
pub enum TransactionOutcome {
    /// 提交成功，附带按入队顺序待投递的事件
    Committed(Vec<Event>),
    /// 已回滚，排队事件全部丢弃
    RolledBack { discarded: usize },
}

/// 事务句柄
///
/// 持有事务状态与"仅在成功时投递"的事件队列。队列只属于这一个事务，
/// 完成后即被取走或丢弃，不会跨事务共享；克隆句柄只增加引用计数。
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    state: Mutex<State>,
}

struct State {
    status: TransactionStatus,
    queue: Vec<Event>,
}

impl Transaction {
    /// 开启一个新事务
    pub fn begin() -> Self {
        let id = Uuid::new_v4();
        tracing::trace!(transaction_id = %id, "transaction begun");
        Self {
            inner: Arc::new(Inner {
                id,
                state: Mutex::new(State {
                    status: TransactionStatus::Active,
                    queue: Vec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn status(&self) -> TransactionStatus {
        self.state().status
    }

    /// 尚未完成（包括已标记 rollback-only）
    pub fn is_active(&self) -> bool {
        matches!(
            self.status(),
            TransactionStatus::Active | TransactionStatus::MarkedRollback
        )
    }

    pub fn is_rollback_only(&self) -> bool {
        self.status() == TransactionStatus::MarkedRollback
    }

    /// 标记为 rollback-only；事务已完成时报错
    pub fn set_rollback_only(&self) -> EventResult<()> {
        let mut state = self.state();
        let status = state.status;
        match status {
            TransactionStatus::Active | TransactionStatus::MarkedRollback => {
                state.status = TransactionStatus::MarkedRollback;
                Ok(())
            }
            done => Err(EventError::transaction(format!(
                "cannot mark transaction {} rollback-only: already {done:?}",
                self.inner.id
            ))),
        }
    }

    /// 追加一个仅在提交成功后投递的事件
    pub fn enqueue(&self, event: Event) -> EventResult<()> {
        let mut state = self.state();
        let status = state.status;
        match status {
            TransactionStatus::Active | TransactionStatus::MarkedRollback => {
                state.queue.push(event);
                Ok(())
            }
            done => Err(EventError::transaction(format!(
                "cannot enqueue {} on transaction {}: already {done:?}",
                event.event_type(),
                self.inner.id
            ))),
        }
    }

    /// 当前排队等待提交的事件数
    pub fn pending_events(&self) -> usize {
        self.state().queue.len()
    }

    /// 完成事务：`success` 且未标记 rollback-only 时提交并取走队列，否则回滚并丢弃队列。
    ///
    /// 每个事务只能完成一次，重复完成报错，队列因此至多被取走一次。
    pub fn complete(&self, success: bool) -> EventResult<TransactionOutcome> {
        let mut state = self.state();
        let status = state.status;
        let outcome = match status {
            TransactionStatus::Active if success => {
                state.status = TransactionStatus::Committed;
                TransactionOutcome::Committed(std::mem::take(&mut state.queue))
            }
            TransactionStatus::Active | TransactionStatus::MarkedRollback => {
                state.status = TransactionStatus::RolledBack;
                let discarded = std::mem::take(&mut state.queue).len();
                TransactionOutcome::RolledBack { discarded }
            }
            done => {
                return Err(EventError::transaction(format!(
                    "transaction {} already completed: {done:?}",
                    self.inner.id
                )));
            }
        };
        tracing::debug!(transaction_id = %self.inner.id, status = ?state.status, "transaction completed");
        Ok(outcome)
    }

    pub fn commit(&self) -> EventResult<TransactionOutcome> {
        self.complete(true)
    }

    pub fn rollback(&self) -> EventResult<TransactionOutcome> {
        self.complete(false)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}
