use crate::common::*;
use std::time::Duration;
use toolhub::config::secrets::MemorySecretStore;
use toolhub::orchestrator::state::HubStatus;
use toolhub::ui::logs::LogSource;
use toolhub::HubError;

const LONG_RUNNING: &str = r#"    echo $$ > "$PWD/up.pid"
    echo "INFO hub up on $TILT_PORT"
    exec sleep 60"#;

#[tokio::test]
async fn start_stop_cycle() {
    let hub = TestHub::new("cycle", LONG_RUNNING);
    let manager = hub.manager();

    manager.start().await.expect("start should succeed");
    assert_eq!(manager.status(), HubStatus::Starting);

    // Nothing answers the proxy health check, so the readiness deadline
    // passes and the hub is assumed running.
    assert!(wait_for_status(&manager, HubStatus::Running, Duration::from_secs(5)).await);
    assert!(wait_for_log(&manager, "hub up on", Duration::from_secs(5)).await);
    let port = manager.ports().control_plane.to_string();
    assert!(manager
        .get_logs(0)
        .iter()
        .any(|l| l.source == LogSource::Stdout && l.text.contains(&port)));

    let pid: i32 = std::fs::read_to_string(hub.marker("up.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(process_alive(pid));

    manager.stop().await.expect("stop should succeed");
    assert_eq!(manager.status(), HubStatus::Stopped);
    assert!(hub.marker("down.called").exists(), "teardown command should run");
    assert!(!process_alive(pid), "orchestrator process should be gone");
}

#[tokio::test]
async fn second_start_is_already_running() {
    let hub = TestHub::new("twice", LONG_RUNNING);
    let manager = hub.manager();

    manager.start().await.unwrap();
    assert!(matches!(manager.start().await, Err(HubError::AlreadyRunning)));

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn repeated_stop_is_not_running() {
    let hub = TestHub::new("restop", LONG_RUNNING);
    let manager = hub.manager();

    manager.start().await.unwrap();
    manager.stop().await.unwrap();
    assert!(matches!(manager.stop().await, Err(HubError::NotRunning)));
    assert!(matches!(manager.stop().await, Err(HubError::NotRunning)));
    assert_eq!(manager.status(), HubStatus::Stopped);
}

#[tokio::test]
async fn unexpected_exit_sets_error() {
    let hub = TestHub::new("crash", "    echo booting\n    echo 'fatal: bad config' >&2\n    exit 3");
    let manager = hub.manager();

    manager.start().await.unwrap();
    assert!(wait_for_status(&manager, HubStatus::Error, Duration::from_secs(5)).await);
    assert!(wait_for_log(&manager, "exited unexpectedly", Duration::from_secs(5)).await);
    assert!(wait_for_log(&manager, "bad config", Duration::from_secs(5)).await);
    assert!(wait_for_log(&manager, "booting", Duration::from_secs(5)).await);

    let logs = manager.get_logs(0);
    assert!(logs.iter().any(|l| l.source == LogSource::Stdout && l.text == "booting"));
    assert!(logs
        .iter()
        .any(|l| l.source == LogSource::Stderr && l.text.contains("bad config")));

    // Readiness must not resurrect a dead hub.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(manager.status(), HubStatus::Error);

    // Error is not a stoppable state, but the hub can be started again.
    assert!(matches!(manager.stop().await, Err(HubError::NotRunning)));
    manager.start().await.unwrap();
    assert!(wait_for_status(&manager, HubStatus::Error, Duration::from_secs(5)).await);
}

#[tokio::test]
async fn busy_control_plane_port_is_reported() {
    let hub = TestHub::new("busy", LONG_RUNNING);
    let settings = hub.settings();
    let port = settings.ports.control_plane;
    let _holder = std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();

    let manager = hub.manager_with(settings, MemorySecretStore::new());
    match manager.start().await {
        Err(HubError::PortInUse { port: reported, .. }) => assert_eq!(reported, port),
        other => panic!("expected PortInUse, got {other:?}"),
    }
    assert_eq!(manager.status(), HubStatus::Error);
    // Cleanup ran the orchestrator's teardown before giving up.
    assert!(hub.marker("down.called").exists());
}

#[tokio::test]
async fn restart_runs_a_fresh_process() {
    let hub = TestHub::new("restart", LONG_RUNNING);
    let manager = hub.manager();

    manager.start().await.unwrap();
    assert!(wait_for_log(&manager, "hub up", Duration::from_secs(5)).await);
    let first = std::fs::read_to_string(hub.marker("up.pid")).unwrap();

    manager.restart().await.unwrap();
    assert!(matches!(
        manager.status(),
        HubStatus::Starting | HubStatus::Running
    ));
    assert!(wait_for_log(&manager, "hub up", Duration::from_secs(5)).await);
    let mut second = first.clone();
    for _ in 0..100 {
        second = std::fs::read_to_string(hub.marker("up.pid")).unwrap_or_default();
        if !second.is_empty() && second != first {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_ne!(first, second);

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn restart_from_stopped_just_starts() {
    let hub = TestHub::new("coldrestart", LONG_RUNNING);
    let manager = hub.manager();

    manager.restart().await.unwrap();
    assert_eq!(manager.status(), HubStatus::Starting);
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn env_file_and_secrets_reach_the_child() {
    let hub = TestHub::new(
        "env",
        r#"    echo "token=$GH_TOKEN org=$GH_ORG broken=${BROKEN:-unset}"
    exec sleep 60"#,
    );
    let manager = hub.manager_with(
        hub.settings(),
        MemorySecretStore::with_secrets([("gh", "s3cret")]),
    );
    manager.workspace().init(&manager.ports()).unwrap();
    manager.update_env_var("GH_ORG", "acme").unwrap();
    manager.set_env_var_from_secret("GH_TOKEN", "gh").unwrap();
    manager.update_env_var("BROKEN", "@secret:missing").unwrap();

    manager.start().await.unwrap();
    assert!(wait_for_log(&manager, "token=", Duration::from_secs(5)).await);

    let logs = manager.get_logs(0);
    assert!(logs
        .iter()
        .any(|l| l.text == "token=s3cret org=acme broken=unset"));
    assert!(logs
        .iter()
        .any(|l| l.source == LogSource::Hub && l.text.contains("BROKEN")));

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn missing_proxy_binary_is_a_prerequisite_error() {
    let hub = TestHub::new("noproxy", LONG_RUNNING);
    let mut settings = hub.settings();
    settings.proxy_bin = hub.dir.path().join("bin/no-such-proxy").to_string_lossy().into_owned();
    let manager = hub.manager_with(settings, MemorySecretStore::new());

    assert!(matches!(
        manager.start().await,
        Err(HubError::MissingPrerequisite { .. })
    ));
    assert_eq!(manager.status(), HubStatus::Stopped);
}

#[tokio::test]
async fn externally_started_hub_is_adopted_and_stoppable() {
    let hub = TestHub::new("adopt", LONG_RUNNING);
    let manager = hub.manager();
    manager.workspace().init(&manager.ports()).unwrap();

    let server = serve_ok(manager.ports().control_plane).await;
    assert_eq!(manager.status(), HubStatus::Stopped);
    assert!(manager.is_running().await);
    assert_eq!(manager.status(), HubStatus::Running);

    manager.stop().await.unwrap();
    assert_eq!(manager.status(), HubStatus::Stopped);
    assert!(hub.marker("down.called").exists());
    server.abort();
}

#[tokio::test]
async fn is_running_falls_back_to_cached_status() {
    let hub = TestHub::new("probe", LONG_RUNNING);
    let manager = hub.manager();
    assert!(!manager.is_running().await);

    manager.start().await.unwrap();
    assert!(wait_for_status(&manager, HubStatus::Running, Duration::from_secs(5)).await);
    // The fake orchestrator serves nothing; the cached status decides.
    assert!(manager.is_running().await);

    manager.stop().await.unwrap();
    assert!(!manager.is_running().await);
}

#[tokio::test]
async fn hub_status_reports_endpoints() {
    let hub = TestHub::new("snapshot", LONG_RUNNING);
    let manager = hub.manager();
    manager.workspace().init(&manager.ports()).unwrap();
    manager.toggle_server("memory", false).unwrap();

    let snapshot = manager.hub_status().await.unwrap();
    assert_eq!(snapshot.status, HubStatus::Stopped);
    assert!(!snapshot.running);

    let memory = snapshot.endpoints.iter().find(|e| e.name == "memory").unwrap();
    assert_eq!(memory.status.as_str(), "disabled");
    let fetch = snapshot.endpoints.iter().find(|e| e.name == "fetch").unwrap();
    assert_eq!(fetch.status.as_str(), "unknown");
    assert_eq!(
        fetch.url,
        format!("http://localhost:{}/mcp/fetch/mcp", manager.ports().proxy)
    );
}

#[tokio::test]
async fn start_clears_previous_logs() {
    let hub = TestHub::new("clear", "    echo once\n    exit 1");
    let manager = hub.manager();

    manager.start().await.unwrap();
    assert!(wait_for_status(&manager, HubStatus::Error, Duration::from_secs(5)).await);
    assert!(wait_for_log(&manager, "exited unexpectedly", Duration::from_secs(5)).await);
    assert!(wait_for_log(&manager, "once", Duration::from_secs(5)).await);
    let first_run = manager.get_logs(0).len();
    assert!(first_run >= 2);

    manager.start().await.unwrap();
    assert!(wait_for_status(&manager, HubStatus::Error, Duration::from_secs(5)).await);
    assert!(wait_for_log(&manager, "once", Duration::from_secs(5)).await);
    let occurrences = manager
        .get_logs(0)
        .iter()
        .filter(|l| l.text == "once")
        .count();
    assert_eq!(occurrences, 1);
}
