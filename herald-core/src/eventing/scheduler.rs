//! 调度器（Scheduler）
//!
//! 将一次分发安排到调用方之外的任务上执行：立即异步、相对延迟、绝对时刻，
//! 以及带重复间隔的两种变体。`schedule` 立即返回，不等待投递。
//!
//! - 投递失败（包括目标 panic）只记录日志，不会阻止重复计划的下一次触发；
//! - 取消在下一次触发之前生效，正在进行的那次投递会执行完毕；
//! - 基于 tokio 定时器，负载下可能延后，但绝不会提前触发。
//!
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::dispatcher::Dispatcher;
use crate::context::DispatchContext;
use crate::error::{EventError, EventResult};
use crate::event::Event;

/// 投递时间规格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// 立即在后台投递
    Immediate,
    /// 相对延迟后投递一次
    After(Duration),
    /// 在绝对时刻投递一次
    At(DateTime<Utc>),
    /// 从绝对时刻开始，按间隔重复
    AtEvery {
        expiration: DateTime<Utc>,
        interval: Duration,
    },
    /// 相对延迟后开始，按间隔重复
    AfterEvery { delay: Duration, interval: Duration },
}

impl Timer {
    /// 距首次触发的时长；绝对时刻已过去时为零
    fn initial_delay(&self) -> Duration {
        match *self {
            Timer::Immediate => Duration::ZERO,
            Timer::After(delay) | Timer::AfterEvery { delay, .. } => delay,
            Timer::At(expiration) | Timer::AtEvery { expiration, .. } => {
                (expiration - Utc::now()).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }

    fn interval(&self) -> Option<Duration> {
        match *self {
            Timer::AtEvery { interval, .. } | Timer::AfterEvery { interval, .. } => Some(interval),
            _ => None,
        }
    }
}

/// 单个计划的句柄：可克隆，任意持有者都可以取消
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    id: Uuid,
    token: CancellationToken,
}

impl ScheduleHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 取消计划：尚未触发的不再触发，进行中的投递执行完毕
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// 调度器：持有分发引擎与运行时句柄，统一关闭
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    runtime: Handle,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Scheduler {
    pub fn new(dispatcher: Arc<Dispatcher>, runtime: Handle) -> Self {
        Self {
            dispatcher,
            runtime,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// 安排一次（或重复的）后台分发，立即返回句柄
    pub fn schedule(&self, event: Event, timer: Timer) -> EventResult<ScheduleHandle> {
        if self.token.is_cancelled() {
            return Err(EventError::scheduling("scheduler has been shut down"));
        }
        if timer.interval().is_some_and(|i| i.is_zero()) {
            return Err(EventError::scheduling("repeat interval must be greater than zero"));
        }

        let handle = ScheduleHandle {
            id: Uuid::new_v4(),
            token: self.token.child_token(),
        };
        let start = Instant::now()
            .checked_add(timer.initial_delay())
            .ok_or_else(|| EventError::scheduling("initial delay is out of range"))?;
        if timer.interval().is_some_and(|i| start.checked_add(i).is_none()) {
            return Err(EventError::scheduling("repeat interval is out of range"));
        }
        let dispatcher = self.dispatcher.clone();
        let token = handle.token.clone();
        let id = handle.id;

        tracing::debug!(event_type = event.event_type(), schedule_id = %id, ?timer, "event scheduled");

        match timer.interval() {
            None => {
                self.tracker.spawn_on(
                    async move {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => {}
                            _ = time::sleep_until(start) => fire(&dispatcher, &event, id).await,
                        }
                    },
                    &self.runtime,
                );
            }
            Some(interval) => {
                self.tracker.spawn_on(
                    async move {
                        let mut ticker = time::interval_at(start, interval);
                        // 迟到的触发之后，下一次按 "当前时刻 + 间隔" 重新计时
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                        loop {
                            tokio::select! {
                                biased;
                                _ = token.cancelled() => break,
                                _ = ticker.tick() => fire(&dispatcher, &event, id).await,
                            }
                        }
                    },
                    &self.runtime,
                );
            }
        }

        Ok(handle)
    }

    /// 取消全部计划；之后的 `schedule` 调用返回错误
    pub fn shutdown(&self) {
        tracing::info!(in_flight = self.tracker.len(), "scheduler shutting down");
        self.token.cancel();
        self.tracker.close();
    }

    /// 等待所有计划任务结束（需先 `shutdown`，否则重复计划会一直运行）
    pub async fn join(&self) {
        self.tracker.wait().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// 一次触发：在后台上下文中分发，失败与 panic 只记录日志
async fn fire(dispatcher: &Dispatcher, event: &Event, id: Uuid) {
    let ctx = DispatchContext::detached();
    let outcome = AssertUnwindSafe(dispatcher.dispatch(&ctx, event))
        .catch_unwind()
        .await;

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => EventError::scheduling(format!("scheduled dispatch failed: {err}")),
        Err(_panic) => EventError::scheduling("scheduled dispatch panicked"),
    };
    tracing::error!(
        event_type = event.event_type(),
        schedule_id = %id,
        error = %failure,
        "scheduled event delivery failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingRegistry, MethodExpressionCompiler, target_fn};
    use crate::component::{Component, ComponentRegistry, ScopeHandle};
    use crate::eventing::ObserverIndex;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, OnceLock};

    struct NoComponents;

    impl ComponentRegistry for NoComponents {
        fn resolve(&self, _: &str, _: &ScopeHandle, _: bool) -> Option<Arc<dyn Component>> {
            None
        }
    }

    fn scheduler() -> (Arc<BindingRegistry>, Scheduler) {
        let components: Arc<dyn ComponentRegistry> = Arc::new(NoComponents);
        let bindings = Arc::new(BindingRegistry::new(Arc::new(MethodExpressionCompiler::new(
            components.clone(),
        ))));
        let dispatcher = Arc::new(Dispatcher::new(
            bindings.clone(),
            Arc::new(ObserverIndex::default()),
            components,
        ));
        (bindings, Scheduler::new(dispatcher, Handle::current()))
    }

    fn counting(bindings: &BindingRegistry, event_type: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bindings.register_target(
            event_type,
            target_fn("count", move |_ctx, _params| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        count
    }

    async fn wait_for(count: &AtomicUsize, n: usize) {
        let _ = time::timeout(Duration::from_secs(2), async {
            while count.load(Ordering::SeqCst) < n {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delayed_event_fires_once_and_never_early() {
        let (bindings, scheduler) = scheduler();
        let fired_at = Arc::new(Mutex::new(Vec::new()));
        let f = fired_at.clone();
        bindings.register_target(
            "reminder",
            target_fn("stamp", move |_ctx, _params| {
                let f = f.clone();
                async move {
                    f.lock().unwrap().push(std::time::Instant::now());
                    Ok(())
                }
            }),
        );

        let begin = std::time::Instant::now();
        scheduler
            .schedule(Event::new("reminder", crate::params![]), Timer::After(Duration::from_millis(100)))
            .unwrap();
        assert!(begin.elapsed() < Duration::from_millis(50), "schedule must not block");

        time::sleep(Duration::from_millis(300)).await;
        let fired = fired_at.lock().unwrap().clone();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].duration_since(begin) >= Duration::from_millis(100));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn immediate_and_absolute_timers_fire() {
        let (bindings, scheduler) = scheduler();
        let count = counting(&bindings, "tick");

        scheduler.schedule(Event::new("tick", crate::params![]), Timer::Immediate).unwrap();
        scheduler
            .schedule(
                Event::new("tick", crate::params![]),
                Timer::At(Utc::now() + chrono::Duration::milliseconds(50)),
            )
            .unwrap();
        // 已过去的绝对时刻立即触发
        scheduler
            .schedule(
                Event::new("tick", crate::params![]),
                Timer::At(Utc::now() - chrono::Duration::seconds(5)),
            )
            .unwrap();

        wait_for(&count, 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeating_schedule_stops_after_cancel() {
        let (bindings, scheduler) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let handle_slot: Arc<OnceLock<ScheduleHandle>> = Arc::new(OnceLock::new());
        {
            let count = count.clone();
            let slot = handle_slot.clone();
            bindings.register_target(
                "heartbeat",
                target_fn("beat", move |_ctx, _params| {
                    let count = count.clone();
                    let slot = slot.clone();
                    async move {
                        // 第三次触发时取消，本次投递仍会完成
                        if count.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                            if let Some(handle) = slot.get() {
                                handle.cancel();
                            }
                        }
                        Ok(())
                    }
                }),
            );
        }

        let handle = scheduler
            .schedule(
                Event::new("heartbeat", crate::params![]),
                Timer::AfterEvery {
                    delay: Duration::from_millis(50),
                    interval: Duration::from_millis(50),
                },
            )
            .unwrap();
        handle_slot.set(handle.clone()).unwrap();

        wait_for(&count, 3).await;
        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_firings_do_not_stop_repeats() {
        let (bindings, scheduler) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bindings.register_target(
            "flaky",
            target_fn("flaky", move |_ctx, _params| {
                let c = c.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) {
                        0 => anyhow::bail!("first firing fails"),
                        1 => panic!("second firing panics"),
                        _ => Ok(()),
                    }
                }
            }),
        );

        let handle = scheduler
            .schedule(
                Event::new("flaky", crate::params![]),
                Timer::AtEvery {
                    expiration: Utc::now(),
                    interval: Duration::from_millis(20),
                },
            )
            .unwrap();

        wait_for(&count, 4).await;
        handle.cancel();
        assert!(count.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_cancels_everything_and_rejects_new_work() {
        let (bindings, scheduler) = scheduler();
        let count = counting(&bindings, "later");

        let handle = scheduler
            .schedule(Event::new("later", crate::params![]), Timer::After(Duration::from_millis(100)))
            .unwrap();
        scheduler.shutdown();
        time::timeout(Duration::from_secs(1), scheduler.join())
            .await
            .unwrap();

        assert!(handle.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_matches!(
            scheduler.schedule(Event::new("later", crate::params![]), Timer::Immediate),
            Err(EventError::Scheduling { .. })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_interval_is_rejected() {
        let (_bindings, scheduler) = scheduler();
        assert_matches!(
            scheduler.schedule(
                Event::new("spin", crate::params![]),
                Timer::AfterEvery {
                    delay: Duration::ZERO,
                    interval: Duration::ZERO
                }
            ),
            Err(EventError::Scheduling { .. })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unrepresentable_delays_are_rejected() {
        let (bindings, scheduler) = scheduler();
        let count = counting(&bindings, "far");

        assert_matches!(
            scheduler.schedule(Event::new("far", crate::params![]), Timer::After(Duration::MAX)),
            Err(EventError::Scheduling { .. })
        );
        assert_matches!(
            scheduler.schedule(
                Event::new("far", crate::params![]),
                Timer::AfterEvery {
                    delay: Duration::MAX,
                    interval: Duration::from_secs(1)
                }
            ),
            Err(EventError::Scheduling { .. })
        );
        assert_matches!(
            scheduler.schedule(
                Event::new("far", crate::params![]),
                Timer::AfterEvery {
                    delay: Duration::ZERO,
                    interval: Duration::MAX
                }
            ),
            Err(EventError::Scheduling { .. })
        );

        // 被拒绝的计划不产生后台任务，调度器仍可正常使用
        scheduler.schedule(Event::new("far", crate::params![]), Timer::Immediate).unwrap();
        wait_for(&count, 1).await;
        scheduler.shutdown();
        time::timeout(Duration::from_secs(1), scheduler.join())
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
