use async_trait::async_trait;
use herald_application::error::AppError;
use herald_application::{ComponentDefinition, Events, InMemoryComponentRegistry};
use herald_core::component::{Component, ScopeHandle, ScopeType};
use herald_core::config::EventsConfig;
use herald_core::context::DispatchContext;
use herald_core::event::Params;
use herald_core::eventing::Timer;
use herald_core::params;
use herald_core::transaction::{ComponentKind, REDISPLAY, RollbackInterceptor, RollbackPolicy};
use std::sync::Arc;
use std::time::Duration;

/// 会话内的预订列表，收到 `booking.confirmed` 时刷新
struct BookingList;

#[async_trait]
impl Component for BookingList {
    fn arity(&self, method: &str) -> Option<usize> {
        (method == "refresh").then_some(1)
    }

    async fn call(&self, method: &str, ctx: &DispatchContext, params: &Params) -> anyhow::Result<()> {
        let hotel: String = params.arg(0)?;
        let user = ctx.scope().key(ScopeType::Session).unwrap_or("?");
        println!("BookingList.{method}: user={user}, hotel={hotel}");
        Ok(())
    }
}

/// 无状态的邮件通知
struct Mailer;

#[async_trait]
impl Component for Mailer {
    fn arity(&self, method: &str) -> Option<usize> {
        (method == "send_confirmation").then_some(1)
    }

    async fn call(&self, method: &str, _ctx: &DispatchContext, params: &Params) -> anyhow::Result<()> {
        println!("Mailer.{method}: hotel={}", params.arg::<String>(0)?);
        Ok(())
    }
}

const CONFIG: &str = r##"{
    "events": [
        {
            "type": "booking.confirmed",
            "actions": [{ "expression": "#{mailer.send_confirmation}" }],
            "observers": [{ "component": "booking.list", "method": "refresh", "create": false }]
        }
    ]
}"##;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let components = Arc::new(InMemoryComponentRegistry::new());
    components.define(ComponentDefinition::new("booking.list", ScopeType::Session, || BookingList))?;
    components.define(ComponentDefinition::new("mailer", ScopeType::Stateless, || Mailer))?;

    let events = Events::builder()
        .components(components.clone())
        .config(EventsConfig::from_json_str(CONFIG)?)
        .build()?;

    let session = ScopeHandle::application().with(ScopeType::Session, "gavin");
    // 用户打开过预订列表
    components.install("booking.list", &session, Arc::new(BookingList))?;
    let ctx = DispatchContext::builder().scope(session).build();

    let confirm = events
        .transaction_boundary(RollbackInterceptor::new(
            ComponentKind::Plain,
            RollbackPolicy::if_outcome([REDISPLAY]),
        ))
        .wrap(|ctx: DispatchContext| {
            let events = &events;
            async move {
                let hotel = "Marriott Courtyard";
                events.raise_on_success(&ctx, "booking.confirmed", params![hotel])?;
                println!("booking persisted, confirmation queued until commit");
                Ok::<_, anyhow::Error>(Some("confirmed".to_string()))
            }
        });

    match confirm.call(&ctx).await {
        Ok(outcome) => println!("confirm outcome: {outcome:?}"),
        Err(err) => println!("confirm failed: {err}"),
    }

    events.raise_timed(
        "booking.confirmed",
        Timer::After(Duration::from_millis(50)),
        params!["Hilton Diagonal Mar"],
    )?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    events.shutdown();
    events.join().await;
    Ok(())
}
