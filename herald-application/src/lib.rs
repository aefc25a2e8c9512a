//! 事件门面与应用层构件（herald-application）
//!
//! - `Events`：显式构建的事件入口（raise 各变体、运行时注册、关闭）；
//! - `InMemoryComponentRegistry`：基于内存的作用域组件注册表；
//! - `TransactionBoundary`：以事务包裹工作单元，提交后投递排队事件。
//!
pub mod component_registry;
pub mod error;
pub mod events;
pub mod transaction_boundary;

pub use component_registry::{ComponentDefinition, InMemoryComponentRegistry};
pub use events::Events;
pub use transaction_boundary::{TransactionBoundary, Transactional};
