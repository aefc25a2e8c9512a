//! 事件门面（Events）
//!
//! 进程内唯一的事件入口，显式构建、显式关闭，以 `Arc<Events>` 传给调用方：
//! - 启动时读取事件声明配置，生成声明绑定与观察者索引；
//! - `raise`：在调用方任务上同步分发；
//! - `raise_async` / `raise_timed`：交给调度器在后台分发，立即返回；
//! - `raise_on_success`：排入当前事务，提交成功后才分发；
//! - `register` / `register_target`：运行时追加绑定。
//!
use crate::transaction_boundary::TransactionBoundary;
use herald_core::binding::{BindingRegistry, MethodExpressionCompiler, Target, TargetCompiler};
use herald_core::component::ComponentRegistry;
use herald_core::config::EventsConfig;
use herald_core::context::DispatchContext;
use herald_core::error::{EventError, EventResult};
use herald_core::event::{Event, Params};
use herald_core::eventing::{Dispatcher, ObserverIndexBuilder, ScheduleHandle, Scheduler, Timer};
use herald_core::transaction::RollbackInterceptor;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct Events {
    dispatcher: Arc<Dispatcher>,
    scheduler: Scheduler,
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("bound_types", &self.dispatcher.bindings().registered_event_types())
            .field("shut_down", &self.scheduler.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[bon::bon]
impl Events {
    /// 构建并初始化事件门面
    ///
    /// - `components`：观察者与方法表达式使用的作用域组件注册表；
    /// - `config`：事件声明；
    /// - `config_path`：未给出 `config` 时从该文件装载，缺省读取 `HERALD_EVENTS_CONFIG`
    ///   或 `events.json`，文件不存在时从空注册表启动；
    /// - `observers`：程序化声明的观察者，排在配置声明之前；
    /// - `compiler`：目标表达式编译器，缺省为 `#{component.method}`；
    /// - `runtime`：调度器使用的 Tokio 运行时，缺省取当前运行时。
    #[builder]
    pub fn new(
        components: Arc<dyn ComponentRegistry>,
        config: Option<EventsConfig>,
        #[builder(into)] config_path: Option<PathBuf>,
        observers: Option<ObserverIndexBuilder>,
        compiler: Option<Arc<dyn TargetCompiler>>,
        runtime: Option<Handle>,
    ) -> EventResult<Self> {
        let runtime = match runtime {
            Some(handle) => handle,
            None => Handle::try_current()
                .map_err(|err| EventError::scheduling(format!("no tokio runtime available: {err}")))?,
        };
        let compiler: Arc<dyn TargetCompiler> = match compiler {
            Some(compiler) => compiler,
            None => Arc::new(MethodExpressionCompiler::new(components.clone())),
        };

        let config = match (config, config_path) {
            (Some(config), _) => Some(config),
            (None, Some(path)) => EventsConfig::load(path)?,
            (None, None) => EventsConfig::load_default()?,
        };

        let mut bindings = BindingRegistry::new(compiler);
        let mut observers = observers.unwrap_or_default();
        if let Some(config) = &config {
            config.apply(&mut bindings, &mut observers)?;
        }
        let observers = observers.build();

        tracing::info!(
            declared_types = bindings.registered_event_types().len(),
            observed_types = observers.event_types().len(),
            "events initialized"
        );

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(bindings),
            Arc::new(observers),
            components,
        ));
        let scheduler = Scheduler::new(dispatcher.clone(), runtime);
        Ok(Self {
            dispatcher,
            scheduler,
        })
    }
}

impl Events {
    /// 同步分发：在当前任务上依次调用绑定与观察者，首个失败原样返回
    pub async fn raise(
        &self,
        ctx: &DispatchContext,
        event_type: &str,
        params: Params,
    ) -> EventResult<()> {
        self.dispatcher
            .dispatch(ctx, &Event::new(event_type, params))
            .await
    }

    /// 立即在后台分发，失败只记录日志
    pub fn raise_async(&self, event_type: &str, params: Params) -> EventResult<ScheduleHandle> {
        self.raise_timed(event_type, Timer::Immediate, params)
    }

    /// 按计时规格在后台分发（一次或重复）
    pub fn raise_timed(
        &self,
        event_type: &str,
        timer: Timer,
        params: Params,
    ) -> EventResult<ScheduleHandle> {
        self.scheduler.schedule(Event::new(event_type, params), timer)
    }

    /// 排入当前活跃事务，提交成功后分发；无活跃事务时报错
    pub fn raise_on_success(
        &self,
        ctx: &DispatchContext,
        event_type: &str,
        params: Params,
    ) -> EventResult<()> {
        let Some(tx) = ctx.transaction().filter(|tx| tx.is_active()) else {
            return Err(EventError::transaction(format!(
                "raise_on_success({event_type}) requires an active transaction"
            )));
        };
        tx.enqueue(Event::new(event_type, params))
    }

    /// 运行时注册一个目标表达式
    pub fn register(&self, event_type: &str, expression: &str) -> EventResult<()> {
        self.dispatcher.bindings().register(event_type, expression)
    }

    /// 运行时注册一个已构造的目标
    pub fn register_target(&self, event_type: &str, target: Arc<dyn Target>) {
        self.dispatcher.bindings().register_target(event_type, target);
    }

    /// 以给定回滚判定构造事务边界
    pub fn transaction_boundary(&self, interceptor: RollbackInterceptor) -> TransactionBoundary {
        TransactionBoundary::new(self.dispatcher.clone(), interceptor)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// 取消全部计划，之后的后台分发请求返回错误
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    /// 等待进行中的后台分发结束（需先 `shutdown`）
    pub async fn join(&self) {
        self.scheduler.join().await;
    }
}
