//! End-to-end server runtime over a real Unix socket in a temporary home.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use proxywatch_core::Command;
use proxywatch_daemon::paths::{config_path, endpoint, proxy_log_path, runtime_root};
use proxywatch_daemon::{claim_singleton, run, send_command, DaemonError, Reply, Role};
use tempfile::TempDir;
use tokio::task::JoinHandle;

fn settings_path(home: &Path) -> PathBuf {
    runtime_root(home).join("proxy-settings.yaml")
}

fn write_settings(home: &Path, body: &str) {
    // Write-then-rename so the poll loop never sees a half-written file.
    let target = settings_path(home);
    let tmp = target.with_extension("yaml.tmp");
    fs::write(&tmp, body).expect("write settings");
    fs::rename(&tmp, &target).expect("rename settings");
}

fn prepare_home(initial_settings: &str) -> TempDir {
    let home = TempDir::new().expect("home");
    fs::create_dir_all(runtime_root(home.path())).expect("runtime root");
    fs::write(config_path(home.path()), "poll_interval_ms: 20\n").expect("config");
    write_settings(home.path(), initial_settings);
    home
}

fn start_server(home: &Path, initial: Command) -> JoinHandle<Result<(), DaemonError>> {
    let server = match claim_singleton(home).expect("claim") {
        Role::Server(server) => server,
        Role::Client(_) => panic!("fresh home must yield the server role"),
    };
    let handle = tokio::spawn(run(server, initial));
    let socket = endpoint(home);
    assert!(
        wait_until(Duration::from_secs(5), || socket.exists()),
        "server did not bind its socket in time"
    );
    handle
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

async fn send(home: &Path, command: Command) -> Result<Reply, DaemonError> {
    let socket = endpoint(home);
    tokio::task::spawn_blocking(move || send_command(&socket, command))
        .await
        .expect("join client")
}

fn log_lines(home: &Path) -> Vec<String> {
    fs::read_to_string(proxy_log_path(home))
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

async fn wait_for_lines(home: &Path, count: usize) -> Vec<String> {
    let home = home.to_path_buf();
    tokio::task::spawn_blocking(move || {
        wait_until(Duration::from_secs(5), || log_lines(&home).len() >= count);
        log_lines(&home)
    })
    .await
    .expect("join wait")
}

async fn settle() {
    // Several poll intervals.
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logs_transitions_and_obeys_start_stop() {
    let home = prepare_home("ProxyEnable: 1\nProxyServer: \"10.0.0.1:8080\"\n");
    let server = start_server(home.path(), Command::None);

    let lines = wait_for_lines(home.path(), 1).await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("\tproxy on, 10.0.0.1:8080"), "got: {lines:?}");

    settle().await;
    assert_eq!(log_lines(home.path()).len(), 1, "unchanged settings must not log");

    assert_eq!(send(home.path(), Command::Start).await.expect("start"), Reply::NoOp);
    assert_eq!(send(home.path(), Command::Stop).await.expect("stop"), Reply::Applied);
    assert_eq!(send(home.path(), Command::Stop).await.expect("stop again"), Reply::NoOp);

    write_settings(home.path(), "ProxyEnable: 0\nProxyServer: \"10.0.0.1:8080\"\n");
    settle().await;
    assert_eq!(log_lines(home.path()).len(), 1, "disarmed monitor must not log");

    assert_eq!(send(home.path(), Command::None).await.expect("start"), Reply::Applied);
    let lines = wait_for_lines(home.path(), 2).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with("\tproxy off"), "got: {lines:?}");
    assert!(!lines[1].contains("10.0.0.1"));

    assert_eq!(send(home.path(), Command::Quit).await.expect("quit"), Reply::QuitSent);
    server.await.expect("join server").expect("server result");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn launched_with_stop_starts_disarmed() {
    let home = prepare_home("ProxyEnable: 1\nProxyServer: a:1\n");
    let server = start_server(home.path(), Command::Stop);

    settle().await;
    assert!(log_lines(home.path()).is_empty());
    assert_eq!(send(home.path(), Command::Stop).await.expect("stop"), Reply::NoOp);

    send(home.path(), Command::Quit).await.expect("quit");
    server.await.expect("join server").expect("server result");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quit_releases_socket_and_lock() {
    let home = prepare_home("ProxyEnable: 0\n");
    let server = start_server(home.path(), Command::Start);

    match claim_singleton(home.path()).expect("second claim") {
        Role::Client(client) => assert_eq!(client.endpoint, endpoint(home.path())),
        Role::Server(_) => panic!("lock must be held while the server runs"),
    }

    send(home.path(), Command::Quit).await.expect("quit");
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after quit")
        .expect("join server")
        .expect("server result");

    assert!(!endpoint(home.path()).exists(), "socket must be removed");
    assert!(matches!(
        claim_singleton(home.path()).expect("reclaim"),
        Role::Server(_)
    ));
    assert!(matches!(
        send(home.path(), Command::Start).await,
        Err(DaemonError::ServerNotRunning { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_never_double_apply() {
    let home = prepare_home("ProxyEnable: 0\n");
    let server = start_server(home.path(), Command::Start);

    let mut clients = Vec::new();
    for _ in 0..8 {
        let socket = endpoint(home.path());
        clients.push(tokio::task::spawn_blocking(move || {
            send_command(&socket, Command::Stop)
        }));
    }
    let mut applied = 0;
    for client in clients {
        if client.await.expect("join").expect("reply") == Reply::Applied {
            applied += 1;
        }
    }
    assert_eq!(applied, 1, "exactly one concurrent stop should take effect");
    assert_eq!(send(home.path(), Command::Start).await.expect("start"), Reply::Applied);

    send(home.path(), Command::Quit).await.expect("quit");
    server.await.expect("join server").expect("server result");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mixed_clients_leave_a_consistent_state() {
    let home = prepare_home("ProxyEnable: 0\n");
    let server = start_server(home.path(), Command::Start);

    let mut clients = Vec::new();
    for i in 0..16 {
        let socket = endpoint(home.path());
        let command = if i % 2 == 0 { Command::Stop } else { Command::Start };
        clients.push(tokio::task::spawn_blocking(move || {
            (command, send_command(&socket, command))
        }));
    }
    let (mut starts, mut stops) = (0i32, 0i32);
    for client in clients {
        let (command, reply) = client.await.expect("join");
        if reply.expect("reply") == Reply::Applied {
            match command {
                Command::Start => starts += 1,
                _ => stops += 1,
            }
        }
    }

    // Launched armed: applied stops lead applied starts by zero or one.
    let lead = stops - starts;
    assert!(lead == 0 || lead == 1, "starts={starts} stops={stops}");
    let armed = lead == 0;
    let expected = if armed { Reply::NoOp } else { Reply::Applied };
    assert_eq!(send(home.path(), Command::Start).await.expect("start"), expected);

    send(home.path(), Command::Quit).await.expect("quit");
    server.await.expect("join server").expect("server result");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn settings_without_enable_flag_stop_the_server_with_an_error() {
    let home = prepare_home("ProxyServer: a:1\n");
    let server = match claim_singleton(home.path()).expect("claim") {
        Role::Server(server) => server,
        Role::Client(_) => panic!("fresh home must yield the server role"),
    };

    let result = tokio::time::timeout(Duration::from_secs(5), run(server, Command::None))
        .await
        .expect("server should stop");
    assert!(matches!(result, Err(DaemonError::Source(_))), "got: {result:?}");
    assert!(!endpoint(home.path()).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fresh_home_gets_a_disabled_settings_file() {
    let home = TempDir::new().expect("home");
    fs::create_dir_all(runtime_root(home.path())).expect("runtime root");
    fs::write(config_path(home.path()), "poll_interval_ms: 20\n").expect("config");
    let server = start_server(home.path(), Command::None);

    settle().await;
    assert_eq!(
        fs::read_to_string(settings_path(home.path())).expect("settings"),
        "ProxyEnable: 0\n"
    );
    assert!(log_lines(home.path()).is_empty(), "disabled default matches the initial cache");

    send(home.path(), Command::Quit).await.expect("quit");
    server.await.expect("join server").expect("server result");
}
