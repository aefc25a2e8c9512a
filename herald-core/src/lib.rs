//! 进程内事件通知与延迟投递引擎（herald-core）
//!
//! 组件之间按事件类型名通信，互不持有直接引用：
//! - `binding`：事件类型到可调用目标的绑定（启动声明 + 运行时注册）；
//! - `eventing`：观察者索引、同步分发器与调度器（立即异步/延迟/定时/周期）；
//! - `transaction`：事务句柄、"仅在成功时投递"的事件队列与回滚判定；
//! - `component`：作用域与组件注册表协议，观察者实例由此解析；
//! - `config`：启动时读取的事件声明文档。
//!
//! 所有投递都在本进程内完成，不做持久化，也不保证跨进程重启的投递。
//!
//! 典型用法：
//! 1. 实现 `ComponentRegistry`（或使用上层提供的内存实现）；
//! 2. 用 `EventsConfig` 与 `BindingRegistry`/`ObserverIndex` 构建 `Dispatcher`；
//! 3. 同步 `dispatch`，或交给 `Scheduler` 在后台投递；
//! 4. 用 `RollbackInterceptor` 包裹工作单元，决定事务是否回滚。
//!
pub mod binding;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod eventing;
pub mod transaction;

#[doc(hidden)]
pub use serde_json;
