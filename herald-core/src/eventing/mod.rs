//! 事件子系统（eventing）
//!
//! 提供事件分发与延迟投递的运行时：
//! - `ObserverIndex`：启动时构建的只读观察者声明索引；
//! - `Dispatcher`：同步分发，先绑定、后观察者，失败即停；
//! - `Scheduler`：立即异步/延迟/定时/周期投递，运行在调用方之外的任务上。
//!
mod dispatcher;
mod observer;
#[cfg(feature = "scheduler")]
mod scheduler;

pub use dispatcher::Dispatcher;
pub use observer::{ObserverIndex, ObserverIndexBuilder, ObserverMethod};
#[cfg(feature = "scheduler")]
pub use scheduler::{ScheduleHandle, Scheduler, Timer};
