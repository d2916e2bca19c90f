//! Supervisor behavior: profile gating, creation ordering, restart
//! policy, and the status endpoint.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use schema_stack::config::{HealthCheckConfig, StackConfig, SupervisorConfig};
use schema_stack::lifecycle::Shutdown;
use schema_stack::orchestrator::runtime::bind_listener;
use schema_stack::orchestrator::{
    ProbeSpec, RestartPolicy, RunningService, ServiceDescriptor, ServiceRuntime, SpawnError,
    StartContext, SupervisedUnit, Supervisor, SupervisorError, PROXY_SERVICE_NAME,
};

mod common;

fn stack_config(service_port: u16, proxy_port: u16, status_port: Option<u16>) -> StackConfig {
    let mut config = StackConfig::default();
    config.service.bind_address = format!("127.0.0.1:{service_port}");
    config.proxy.bind_address = format!("127.0.0.1:{proxy_port}");
    config.service.health_check = Some(HealthCheckConfig {
        interval_secs: 1,
        timeout_secs: 1,
        path: "/v1/health".to_string(),
        retries: 2,
        start_period_secs: 0,
    });
    config.supervisor.restart_base_delay_ms = 10;
    config.supervisor.restart_max_delay_ms = 100;
    config.supervisor.status_enabled = status_port.is_some();
    if let Some(port) = status_port {
        config.supervisor.status_address = format!("127.0.0.1:{port}");
    }
    config.observability.metrics_enabled = false;
    config
}

#[tokio::test]
async fn default_profile_omits_proxy() {
    let config = stack_config(28301, 28302, None);
    let supervisor = Supervisor::from_config(&config, None).unwrap();
    let registry = supervisor.registry();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    assert!(
        common::wait_until(Duration::from_secs(3), || registry
            .get("sql-schema-parser")
            .is_some())
        .await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Only the application service exists; the proxy was never created.
    assert!(registry.get(PROXY_SERVICE_NAME).is_none());
    assert_eq!(registry.snapshot().len(), 1);

    let client = common::test_client();
    let res = client.get("http://127.0.0.1:28301/v1/health").send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(client.get("http://127.0.0.1:28302/").send().await.is_err());

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn production_profile_creates_proxy_after_service() {
    let config = stack_config(28311, 28312, None);
    let supervisor = Supervisor::from_config(&config, Some("production".to_string())).unwrap();
    let registry = supervisor.registry();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    assert!(
        common::wait_until(Duration::from_secs(3), || registry
            .get(PROXY_SERVICE_NAME)
            .is_some())
        .await
    );

    let service = registry.get("sql-schema-parser").unwrap();
    let proxy = registry.get(PROXY_SERVICE_NAME).unwrap();
    assert!(
        service.created_seq < proxy.created_seq,
        "proxy must be created after its upstream"
    );
    assert!(service.created_at_ms <= proxy.created_at_ms);

    // Requests on the public port reach the service.
    let client = common::test_client();
    let res = client.get("http://127.0.0.1:28312/v1/health").send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    // The probe loop marks the service healthy.
    assert!(
        common::wait_until(Duration::from_secs(5), || {
            registry.get("sql-schema-parser").unwrap().state == "healthy"
        })
        .await
    );

    shutdown.trigger();
    assert!(
        common::wait_until(Duration::from_secs(5), || {
            registry.snapshot().iter().all(|s| s.state == "stopped")
        })
        .await
    );
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn bound_port_fails_deployment() {
    let config = stack_config(28321, 28322, None);
    let _holder = std::net::TcpListener::bind("127.0.0.1:28321").unwrap();

    let supervisor = Supervisor::from_config(&config, None).unwrap();
    let shutdown = Shutdown::new();

    match supervisor.run(shutdown).await {
        Err(SupervisorError::Spawn(SpawnError::PortConflict { name, .. })) => {
            assert_eq!(name, "sql-schema-parser");
        }
        other => panic!("expected port conflict, got {other:?}"),
    }
}

/// A runtime whose instances answer probes per a shared flag, for
/// driving the supervisor through unhealthy episodes.
struct FlakyRuntime {
    healthy: Arc<AtomicBool>,
    starts: Arc<AtomicU32>,
}

impl ServiceRuntime for FlakyRuntime {
    fn start(
        &self,
        name: &str,
        addr: SocketAddr,
        ctx: StartContext,
    ) -> Result<RunningService, SpawnError> {
        let std_listener = bind_listener(name, addr)?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        let healthy = self.healthy.clone();
        let mut shutdown = ctx.shutdown;

        let task = tokio::spawn(async move {
            let listener = TcpListener::from_std(std_listener).unwrap();
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((mut socket, _)) = accepted else { break };
                        let ok = healthy.load(Ordering::SeqCst);
                        tokio::spawn(async move {
                            let mut buf = [0u8; 1024];
                            let _ = socket.read(&mut buf).await;
                            let response = if ok {
                                "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
                            } else {
                                "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\ndown"
                            };
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        });
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });

        Ok(RunningService { addr, task })
    }
}

fn flaky_unit(
    port: u16,
    restart: RestartPolicy,
    start_period: Duration,
    healthy: Arc<AtomicBool>,
    starts: Arc<AtomicU32>,
) -> SupervisedUnit {
    SupervisedUnit {
        descriptor: ServiceDescriptor {
            name: "flaky".to_string(),
            addr: format!("127.0.0.1:{port}").parse().unwrap(),
            env: BTreeMap::new(),
            restart,
            probe: Some(ProbeSpec {
                interval: Duration::from_millis(100),
                timeout: Duration::from_millis(200),
                path: "/v1/health".to_string(),
                retries: 2,
                start_period,
            }),
            profiles: Vec::new(),
        },
        runtime: Arc::new(FlakyRuntime { healthy, starts }),
    }
}

fn test_supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        restart_base_delay_ms: 10,
        restart_max_delay_ms: 50,
        status_enabled: false,
        status_address: "127.0.0.1:0".to_string(),
    }
}

#[tokio::test]
async fn unhealthy_episode_restarts_exactly_once() {
    let healthy = Arc::new(AtomicBool::new(true));
    let starts = Arc::new(AtomicU32::new(0));
    let unit = flaky_unit(
        28331,
        RestartPolicy::UnlessStopped,
        Duration::from_secs(1),
        healthy.clone(),
        starts.clone(),
    );

    let supervisor = Supervisor::new(vec![unit], &test_supervisor_config(), None);
    let registry = supervisor.registry();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    assert!(
        common::wait_until(Duration::from_secs(3), || {
            registry.get("flaky").map(|s| s.state == "healthy").unwrap_or(false)
        })
        .await
    );

    let first_instance = registry.get("flaky").unwrap().instance_id.clone();

    // Take the instance down: retries consecutive failures follow.
    healthy.store(false, Ordering::SeqCst);
    assert!(
        common::wait_until(Duration::from_secs(3), || {
            registry.get("flaky").unwrap().restarts == 1
        })
        .await
    );

    // Recover inside the replacement's start period: the episode ends
    // with exactly one restart.
    healthy.store(true, Ordering::SeqCst);
    assert!(
        common::wait_until(Duration::from_secs(3), || {
            registry.get("flaky").unwrap().state == "healthy"
        })
        .await
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = registry.get("flaky").unwrap();
    assert_eq!(status.restarts, 1, "one unhealthy episode, one restart");
    assert_eq!(starts.load(Ordering::SeqCst), 2, "initial start plus one replacement");
    assert_ne!(status.instance_id, first_instance, "replacement gets a fresh instance id");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn restart_policy_no_disables_restarts() {
    let healthy = Arc::new(AtomicBool::new(true));
    let starts = Arc::new(AtomicU32::new(0));
    let unit = flaky_unit(
        28341,
        RestartPolicy::No,
        Duration::from_secs(1),
        healthy.clone(),
        starts.clone(),
    );

    let supervisor = Supervisor::new(vec![unit], &test_supervisor_config(), None);
    let registry = supervisor.registry();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    assert!(
        common::wait_until(Duration::from_secs(3), || {
            registry.get("flaky").map(|s| s.state == "healthy").unwrap_or(false)
        })
        .await
    );

    healthy.store(false, Ordering::SeqCst);
    assert!(
        common::wait_until(Duration::from_secs(3), || {
            registry.get("flaky").unwrap().state == "unhealthy"
        })
        .await
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = registry.get("flaky").unwrap();
    assert_eq!(status.restarts, 0);
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(status.state, "unhealthy");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_failures_inside_start_period_are_forgiven() {
    let healthy = Arc::new(AtomicBool::new(false));
    let starts = Arc::new(AtomicU32::new(0));
    let unit = flaky_unit(
        28351,
        RestartPolicy::UnlessStopped,
        Duration::from_secs(3),
        healthy.clone(),
        starts.clone(),
    );

    let supervisor = Supervisor::new(vec![unit], &test_supervisor_config(), None);
    let registry = supervisor.registry();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    // Failing probes, but still inside the start period: no restart,
    // state stays "starting".
    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = registry.get("flaky").unwrap();
    assert_eq!(status.state, "starting");
    assert_eq!(status.restarts, 0);

    // The service warms up before the grace expires.
    healthy.store(true, Ordering::SeqCst);
    assert!(
        common::wait_until(Duration::from_secs(3), || {
            registry.get("flaky").unwrap().state == "healthy"
        })
        .await
    );
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn status_endpoint_reports_the_stack() {
    let config = stack_config(28361, 28362, Some(28363));
    let supervisor = Supervisor::from_config(&config, Some("production".to_string())).unwrap();
    let registry = supervisor.registry();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.run(shutdown).await })
    };

    assert!(
        common::wait_until(Duration::from_secs(3), || registry
            .get(PROXY_SERVICE_NAME)
            .is_some())
        .await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = common::test_client();
    let res = client.get("http://127.0.0.1:28363/status").send().await.unwrap();
    assert_eq!(res.status(), 200);

    let body: serde_json::Value = res.json().await.unwrap();
    let services = body.as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0]["name"], "sql-schema-parser");
    assert_eq!(services[1]["name"], PROXY_SERVICE_NAME);
    assert!(services[0]["created_at_ms"].as_u64().unwrap() > 0);
    assert!(services[0]["created_seq"].as_u64().unwrap() < services[1]["created_seq"].as_u64().unwrap());

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
