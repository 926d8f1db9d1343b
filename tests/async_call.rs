use ferrous_inject::{CallArgs, Callable, DiError, Parameter, Strategy, TypeRegistry};
use std::sync::Arc;
use std::time::Duration;

struct Database {
    url: String,
}

struct Session;

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .add_instance(Database {
            url: "postgres://localhost".to_string(),
        })
        .unwrap()
        .add_factory(Strategy::Scoped, Callable::new("Session", |_| Ok(Session)))
        .unwrap();
    registry
}

#[tokio::test]
async fn test_call_async_binds_then_awaits() {
    let resolver = registry().build().unwrap();

    let handler = Callable::new("fetch", |args| {
        let db = args.get::<Database>("db")?;
        let id = *args.get::<u32>("id")?;
        Ok(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, DiError>(format!("{}/users/{}", db.url, id))
        })
    })
    .param(Parameter::of::<Database>("db"))
    .param(Parameter::of::<u32>("id"));

    let out = resolver
        .call_async(&handler, CallArgs::new().named("id", 7u32))
        .await
        .unwrap();
    assert_eq!(out, "postgres://localhost/users/7");
}

#[tokio::test]
async fn test_call_async_reports_binding_errors_before_awaiting() {
    let resolver = registry().build().unwrap();

    let handler = Callable::new("open", |args| {
        let session = args.get::<Session>("session")?;
        Ok(async move { Ok::<_, DiError>(Arc::strong_count(&session)) })
    })
    .param(Parameter::of::<Session>("session"));

    assert!(matches!(
        resolver.call_async(&handler, CallArgs::new()).await,
        Err(DiError::ScopedOutsideSession { .. })
    ));

    let session = resolver.get_scoped_session();
    // the session cache holds one reference, the handler another
    assert_eq!(session.call_async(&handler, CallArgs::new()).await.unwrap(), 2);
    session.close_session();
}
