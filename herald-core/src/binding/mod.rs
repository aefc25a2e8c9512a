//! 绑定（binding）
//!
//! 事件类型与可调用目标的关联：
//! - `Target`/`TargetCompiler`：可调用目标及其编译协议；
//! - `MethodExpressionCompiler`：默认的 `#{component.method}` 表达式编译器；
//! - `BindingRegistry`：声明绑定 + 运行时绑定的有序注册表。
//!
mod expression;
mod registry;
mod target;

pub use expression::{MethodExpression, MethodExpressionCompiler};
pub use registry::{BindingRegistry, Bindings};
pub use target::{FnTarget, Target, TargetCompiler, target_fn};
