//! 方法表达式（`#{component.method}`）
//!
//! 默认的 `TargetCompiler` 实现。组件名本身可以带点（如 `#{billing.invoices.issue}`
//! 指向组件 `billing.invoices` 的 `issue` 方法），以最后一个点分隔方法名。
//! 编译只做语法检查；组件与方法在调用时才解析。
//!
use async_trait::async_trait;
use std::sync::Arc;

use super::target::{Target, TargetCompiler};
use crate::component::ComponentRegistry;
use crate::context::DispatchContext;
use crate::error::{EventError, EventResult};
use crate::event::Params;

/// 已编译的方法表达式
pub struct MethodExpression {
    expression: String,
    component: String,
    method: String,
    components: Arc<dyn ComponentRegistry>,
}

impl MethodExpression {
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

#[async_trait]
impl Target for MethodExpression {
    fn describe(&self) -> &str {
        &self.expression
    }

    async fn invoke(&self, ctx: &DispatchContext, params: &Params) -> anyhow::Result<()> {
        let instance = self
            .components
            .resolve(&self.component, ctx.scope(), true)
            .ok_or_else(|| {
                EventError::binding_resolution(
                    &self.expression,
                    format!("component `{}` could not be resolved", self.component),
                )
            })?;

        match instance.arity(&self.method) {
            None => Err(EventError::binding_resolution(
                &self.expression,
                format!("component `{}` has no method `{}`", self.component, self.method),
            )
            .into()),
            Some(arity) if arity != params.len() => Err(EventError::binding_resolution(
                &self.expression,
                format!("expected {arity} parameter(s), got {}", params.len()),
            )
            .into()),
            Some(_) => instance.call(&self.method, ctx, params).await,
        }
    }
}

/// 解析 `#{a.b.method}` 形式的表达式，编译结果在调用时通过组件注册表解析实例
#[derive(Clone)]
pub struct MethodExpressionCompiler {
    components: Arc<dyn ComponentRegistry>,
}

impl MethodExpressionCompiler {
    pub fn new(components: Arc<dyn ComponentRegistry>) -> Self {
        Self { components }
    }
}

impl TargetCompiler for MethodExpressionCompiler {
    fn compile(&self, expression: &str) -> EventResult<Arc<dyn Target>> {
        let (component, method) = parse_method_expression(expression)?;
        Ok(Arc::new(MethodExpression {
            expression: expression.to_string(),
            component,
            method,
            components: self.components.clone(),
        }))
    }
}

fn parse_method_expression(expression: &str) -> EventResult<(String, String)> {
    let body = expression
        .trim()
        .strip_prefix("#{")
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| {
            EventError::configuration(format!(
                "method expression must have the form #{{component.method}}: {expression}"
            ))
        })?;

    let Some((component, method)) = body.rsplit_once('.') else {
        return Err(EventError::configuration(format!(
            "method expression has no method segment: {expression}"
        )));
    };

    if !component.split('.').all(is_identifier) || !is_identifier(method) {
        return Err(EventError::configuration(format!(
            "malformed method expression: {expression}"
        )));
    }

    Ok((component.to_string(), method.to_string()))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ScopeHandle};
    use assert_matches::assert_matches;
    use std::sync::Mutex;

    struct Greeter {
        greeted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Component for Greeter {
        fn arity(&self, method: &str) -> Option<usize> {
            (method == "greet").then_some(1)
        }

        async fn call(
            &self,
            _method: &str,
            _ctx: &DispatchContext,
            params: &Params,
        ) -> anyhow::Result<()> {
            let who: String = params.arg(0)?;
            self.greeted.lock().unwrap().push(who);
            Ok(())
        }
    }

    struct OneComponent(Arc<Greeter>);

    impl ComponentRegistry for OneComponent {
        fn resolve(
            &self,
            name: &str,
            _scope: &ScopeHandle,
            _create: bool,
        ) -> Option<Arc<dyn Component>> {
            (name == "front.desk").then(|| self.0.clone() as Arc<dyn Component>)
        }
    }

    fn compiler() -> (Arc<Greeter>, MethodExpressionCompiler) {
        let greeter = Arc::new(Greeter {
            greeted: Mutex::new(Vec::new()),
        });
        let registry = Arc::new(OneComponent(greeter.clone()));
        (greeter, MethodExpressionCompiler::new(registry))
    }

    #[test]
    fn parses_dotted_component_names() {
        let (component, method) = parse_method_expression("#{front.desk.greet}").unwrap();
        assert_eq!(component, "front.desk");
        assert_eq!(method, "greet");
    }

    #[test]
    fn rejects_unparseable_expressions() {
        for bad in ["front.desk.greet", "#{greet}", "#{front..greet}", "#{front.9x}", "#{}"] {
            assert_matches!(
                parse_method_expression(bad),
                Err(EventError::Configuration { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn compiled_expression_invokes_component_method() {
        let (greeter, compiler) = compiler();
        let target = compiler.compile("#{front.desk.greet}").unwrap();
        target
            .invoke(&DispatchContext::detached(), &crate::params!["alice"])
            .await
            .unwrap();
        assert_eq!(*greeter.greeted.lock().unwrap(), vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn unresolvable_references_fail_at_call_time() {
        let (_greeter, compiler) = compiler();
        let ctx = DispatchContext::detached();

        // 编译阶段成功，调用阶段失败
        let missing_component = compiler.compile("#{back.office.greet}").unwrap();
        let err = missing_component.invoke(&ctx, &crate::params!["x"]).await.unwrap_err();
        assert_matches!(err.downcast::<EventError>(), Ok(EventError::BindingResolution { .. }));

        let missing_method = compiler.compile("#{front.desk.wave}").unwrap();
        let err = missing_method.invoke(&ctx, &crate::params!["x"]).await.unwrap_err();
        assert_matches!(err.downcast::<EventError>(), Ok(EventError::BindingResolution { .. }));

        let wrong_arity = compiler.compile("#{front.desk.greet}").unwrap();
        let err = wrong_arity.invoke(&ctx, &crate::params![]).await.unwrap_err();
        assert_matches!(err.downcast::<EventError>(), Ok(EventError::BindingResolution { .. }));
    }
}
