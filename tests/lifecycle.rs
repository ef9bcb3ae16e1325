//! Supervisor lifecycle over real sockets.

use std::time::{Duration, Instant};

use hulk_boot::{RunState, ServiceBuilder, ServiceError};
use serde_json::{json, Value};
use tokio::net::TcpListener;

mod common;

use common::RunningService;

#[tokio::test]
async fn test_zero_rpc_port_fails_before_binding() {
    let supervisor = ServiceBuilder::new(common::config(0, 38951))
        .with_gateway(true)
        .build()
        .unwrap();
    let states = supervisor.subscribe_state();

    let result = supervisor.run_until(std::future::pending()).await;

    match result {
        Err(ServiceError::Configuration(message)) => assert!(message.contains("grpc.port")),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert_eq!(*states.borrow(), RunState::Stopped);
    assert!(!common::is_listening(38951).await);
}

#[tokio::test]
async fn test_registration_failure_binds_nothing() {
    let supervisor = ServiceBuilder::new(common::config(38952, 38953))
        .with_gateway(true)
        .attach_gateway(|_ctx, _router| Err("database unavailable".into()))
        .build()
        .unwrap();

    assert!(!common::is_listening(38952).await);
    let result = supervisor.run_until(std::future::pending()).await;

    assert!(matches!(result, Err(ServiceError::Registration(_))));
    assert!(!common::is_listening(38952).await);
    assert!(!common::is_listening(38953).await);
}

#[tokio::test]
async fn test_interrupt_returns_ok_and_closes_ports() {
    let supervisor = ServiceBuilder::new(common::config(38954, 38955))
        .with_gateway(true)
        .build()
        .unwrap();

    let service = RunningService::start(supervisor).await;
    assert!(common::is_listening(38954).await);
    assert!(common::is_listening(38955).await);

    let started = Instant::now();
    let states = service.states.clone();
    assert!(service.stop().await.is_ok());
    assert!(started.elapsed() < Duration::from_secs(3) + Duration::from_millis(500));
    assert_eq!(*states.borrow(), RunState::Stopped);

    assert!(common::wait_closed(38954, Duration::from_secs(1)).await);
    assert!(common::wait_closed(38955, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_gateway_disabled_serves_rpc_only() {
    let supervisor = ServiceBuilder::new(common::config(38956, 38957))
        .attach_gateway(|_ctx, _router| panic!("gateway hook must not run"))
        .build()
        .unwrap();

    let service = RunningService::start(supervisor).await;
    assert!(common::is_listening(38956).await);
    assert!(!common::is_listening(38957).await);

    assert!(service.stop().await.is_ok());
}

#[tokio::test]
async fn test_port_in_use_is_network_error() {
    let _occupied = TcpListener::bind("127.0.0.1:38958").await.unwrap();

    let supervisor = ServiceBuilder::new(common::config(38959, 38958))
        .with_gateway(true)
        .build()
        .unwrap();
    let states = supervisor.subscribe_state();

    let result = supervisor.run_until(std::future::pending()).await;

    assert!(matches!(result, Err(ServiceError::Network { .. })));
    assert_eq!(*states.borrow(), RunState::Stopped);
    // The RPC socket bound before the failure was released.
    assert!(common::wait_closed(38959, Duration::from_secs(1)).await);
}

fn slow_gateway(rpc_port: i64, http_port: i64, handler_ms: u64, drain_ms: u64) -> ServiceBuilder {
    ServiceBuilder::new(common::config(rpc_port, http_port))
        .with_gateway(true)
        .gateway_drain(Duration::from_millis(drain_ms))
        .attach_gateway(move |_ctx, router| {
            router.get("/v1/slow", move |_: Value| async move {
                tokio::time::sleep(Duration::from_millis(handler_ms)).await;
                Ok::<_, tonic::Status>(json!({ "done": true }))
            })?;
            Ok(())
        })
}

#[tokio::test]
async fn test_slow_gateway_request_is_cut_at_drain_limit() {
    // The handler would finish well inside the client timeout; only a force-close fails it.
    let supervisor = slow_gateway(38960, 38961, 2_000, 300).build().unwrap();
    let service = RunningService::start(supervisor).await;

    let requested = Instant::now();
    let in_flight = tokio::spawn(async move {
        let result = common::client()
            .get("http://127.0.0.1:38961/v1/slow")
            .send()
            .await;
        (result, requested.elapsed())
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    assert!(service.stop().await.is_ok());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(1_500));

    let (result, waited) = in_flight.await.unwrap();
    assert!(result.is_err(), "request outlived the drain limit: {result:?}");
    assert!(waited < Duration::from_millis(1_800));
}

#[tokio::test]
async fn test_request_inside_drain_limit_completes() {
    let supervisor = slow_gateway(38964, 38965, 400, 2_000).build().unwrap();
    let service = RunningService::start(supervisor).await;

    let in_flight = tokio::spawn(async {
        common::client()
            .get("http://127.0.0.1:38965/v1/slow")
            .send()
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(service.stop().await.is_ok());
    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "done": true }));
}

#[tokio::test]
async fn test_gateway_hook_token_cancelled_at_stop() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let supervisor = ServiceBuilder::new(common::config(38962, 38963))
        .with_gateway(true)
        .attach_gateway(move |ctx, _router| {
            let _ = tx.send(ctx);
            Ok(())
        })
        .build()
        .unwrap();

    let service = RunningService::start(supervisor).await;
    let ctx = rx.await.unwrap();
    assert!(!ctx.is_cancelled());

    service.stop().await.unwrap();
    assert!(ctx.is_cancelled());
}
