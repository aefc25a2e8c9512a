/// 调度器示例
/// 展示同步分发、延迟投递与周期投递，以及周期计划在第 3 次触发后被取消
use anyhow::Result as AnyResult;
use chrono::Utc;
use herald_core::binding::{BindingRegistry, Target, TargetCompiler, target_fn};
use herald_core::component::{Component, ComponentRegistry, ScopeHandle};
use herald_core::context::DispatchContext;
use herald_core::error::EventResult;
use herald_core::event::Event;
use herald_core::eventing::{Dispatcher, ObserverIndex, ScheduleHandle, Scheduler, Timer};
use herald_core::params;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

// ============================================================================
// 打印型编译器：任何表达式都编译为打印自身的目标
// ============================================================================

struct PrintCompiler;

impl TargetCompiler for PrintCompiler {
    fn compile(&self, expression: &str) -> EventResult<Arc<dyn Target>> {
        let name = expression.to_string();
        Ok(target_fn(expression, move |_ctx, params| {
            let name = name.clone();
            async move {
                println!("[{}] {name} <- {:?}", Utc::now().format("%H:%M:%S%.3f"), params);
                Ok(())
            }
        }))
    }
}

/// 本示例不使用观察者
struct NoComponents;

impl ComponentRegistry for NoComponents {
    fn resolve(&self, _name: &str, _scope: &ScopeHandle, _create: bool) -> Option<Arc<dyn Component>> {
        None
    }
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let mut bindings = BindingRegistry::new(Arc::new(PrintCompiler));
    bindings.declare("report.ready", "declared-printer")?;
    let bindings = Arc::new(bindings);
    bindings.register("report.ready", "runtime-printer")?;

    let dispatcher = Arc::new(Dispatcher::new(
        bindings.clone(),
        Arc::new(ObserverIndex::default()),
        Arc::new(NoComponents),
    ));

    // 同步分发
    dispatcher
        .dispatch(&DispatchContext::detached(), &Event::new("report.ready", params!["daily"]))
        .await?;

    let scheduler = Scheduler::new(dispatcher, tokio::runtime::Handle::current());

    // 延迟投递
    scheduler.schedule(
        Event::new("report.ready", params!["delayed"]),
        Timer::After(Duration::from_millis(100)),
    )?;

    // 周期投递：第 3 次触发后取消
    let beats = Arc::new(AtomicUsize::new(0));
    let handle_slot: Arc<OnceLock<ScheduleHandle>> = Arc::default();
    {
        let beats = beats.clone();
        let slot = handle_slot.clone();
        bindings.register_target(
            "heartbeat",
            target_fn("heartbeat", move |_ctx, _params| {
                let beats = beats.clone();
                let slot = slot.clone();
                async move {
                    let n = beats.fetch_add(1, Ordering::SeqCst) + 1;
                    println!("heartbeat #{n}");
                    if n == 3 {
                        if let Some(handle) = slot.get() {
                            handle.cancel();
                        }
                    }
                    Ok(())
                }
            }),
        );
    }
    let handle = scheduler.schedule(
        Event::new("heartbeat", params![]),
        Timer::AtEvery {
            expiration: Utc::now() + chrono::Duration::milliseconds(50),
            interval: Duration::from_millis(50),
        },
    )?;
    let _ = handle_slot.set(handle);

    tokio::time::sleep(Duration::from_millis(400)).await;
    println!("heartbeats fired: {}", beats.load(Ordering::SeqCst));

    scheduler.shutdown();
    scheduler.join().await;
    Ok(())
}
